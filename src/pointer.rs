//! JSON Pointer parsing and evaluation.
//!
//! Pointers use the strict grammar: a fragment is either empty, `#`, or
//! starts with `#/`. Evaluation chases `$ref` nodes encountered mid-walk, so
//! a pointer landing on another pointer still terminates at a concrete
//! value.

use std::collections::HashSet;

use serde_json::Value;

use crate::error::Error;
use crate::location;
use crate::registry::Refs;

/// The concrete value a pointer resolved to, along with where it actually
/// lives after any `$ref` chasing.
#[derive(Debug, Clone)]
pub struct Target {
    /// Canonical location of the document containing the value.
    pub location: String,
    /// JSON Pointer fragment of the value within that document (`#` for the
    /// whole document).
    pub pointer: String,
    /// The value itself.
    pub value: Value,
}

/// Returns the `$ref` string if this value is a ref node.
pub fn ref_value(value: &Value) -> Option<&str> {
    value.as_object()?.get("$ref")?.as_str()
}

/// Returns true if this value is a ref node with sibling keys (OAS 3.1
/// style).
pub fn has_siblings(value: &Value) -> bool {
    match value.as_object() {
        Some(map) => ref_value(value).is_some() && map.len() > 1,
        None => false,
    }
}

/// Parses a pointer fragment into its unescaped tokens.
///
/// # Errors
///
/// Returns `InvalidPointer` unless the fragment is empty, `#`, or starts
/// with `#/`.
pub fn parse(hash: &str) -> Result<Vec<String>, Error> {
    if hash.is_empty() || hash == "#" {
        return Ok(Vec::new());
    }
    if !hash.starts_with("#/") {
        return Err(Error::InvalidPointer {
            pointer: hash.to_string(),
        });
    }

    Ok(hash[2..]
        .split('/')
        .map(|token| {
            location::decode_token(token)
                .replace("~1", "/")
                .replace("~0", "~")
        })
        .collect())
}

/// Joins tokens back into a pointer fragment, escaping `~` and `/`.
pub fn join(tokens: &[String]) -> String {
    let mut out = String::from("#");
    for token in tokens {
        out.push('/');
        out.push_str(&token.replace('~', "~0").replace('/', "~1"));
    }
    out
}

/// Evaluates `hash` against the registry document at `location`.
///
/// Whenever the walk lands on a `$ref` node before the last token, the ref
/// is resolved (relative to its containing document) and the walk continues
/// inside the new target. When `follow_trailing` is true the same chasing
/// applies to the final value, guaranteeing a concrete (non-ref) result.
///
/// # Errors
///
/// `MissingPointer` names the first token that does not exist;
/// `InvalidPointer` rejects malformed fragments; `Circular` is returned when
/// a pure pointer-to-pointer loop never reaches a concrete value.
pub fn resolve_target(
    refs: &Refs,
    location: &str,
    hash: &str,
    follow_trailing: bool,
) -> Result<Target, Error> {
    let mut loc = location.to_string();
    let mut tokens = parse(hash)?;
    let mut i = 0_usize;
    // Guard keyed by the position of each ref node chased. There are
    // finitely many ref nodes, so landing on the same one twice within a
    // single resolution means the chain loops. (Guarding on the remaining
    // pointer instead would not terminate: a ref whose target path passes
    // through the ref node itself grows the remainder on every chase.)
    let mut chased: HashSet<String> = HashSet::new();

    let mut current: &Value = refs.document(&loc)?;

    loop {
        // Chase a ref node before continuing (or finishing) the walk.
        if let Some(ref_str) = ref_value(current) {
            if i < tokens.len() || follow_trailing {
                let ref_pos = format!("{loc}{}", join(&tokens[..i]));
                if chased.contains(&ref_pos) {
                    return Err(Error::Circular { pointer: ref_pos });
                }
                chased.insert(ref_pos);

                let file = location::strip_hash(ref_str);
                let target_loc = if file.is_empty() {
                    loc.clone()
                } else {
                    location::resolve(&loc, file)?
                };
                let mut new_tokens = parse(location::get_hash(ref_str))?;
                new_tokens.extend(tokens.drain(i..));

                loc = target_loc;
                tokens = new_tokens;
                i = 0;
                current = refs.document(&loc)?;
                continue;
            }
        }

        if i >= tokens.len() {
            break;
        }

        let token = &tokens[i];
        let missing = || Error::MissingPointer {
            token: token.clone(),
            pointer: format!("{loc}{}", join(&tokens[..=i])),
        };
        current = match current {
            Value::Object(map) => map.get(token).ok_or_else(missing)?,
            Value::Array(arr) => token
                .parse::<usize>()
                .ok()
                .and_then(|n| arr.get(n))
                .ok_or_else(missing)?,
            _ => return Err(missing()),
        };
        i += 1;
    }

    Ok(Target {
        pointer: join(&tokens),
        value: current.clone(),
        location: loc,
    })
}

/// Installs `new_value` at the given token path, creating missing
/// intermediate containers along the way (mkdir-p semantics).
pub fn set_pointer(doc: &mut Value, tokens: &[String], new_value: Value) {
    let Some((token, rest)) = tokens.split_first() else {
        *doc = new_value;
        return;
    };

    if let Value::Array(arr) = doc {
        if let Ok(n) = token.parse::<usize>() {
            while arr.len() <= n {
                arr.push(Value::Null);
            }
            set_pointer(&mut arr[n], rest, new_value);
            return;
        }
    }

    if !doc.is_object() {
        *doc = Value::Object(serde_json::Map::new());
    }
    if let Value::Object(map) = doc {
        let child = map.entry(token.clone()).or_insert(Value::Null);
        set_pointer(child, rest, new_value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PathType;
    use serde_json::json;

    fn registry(doc: Value) -> Refs {
        let mut refs = Refs::new("/root.json");
        refs.add("/root.json".into(), PathType::File, doc);
        refs
    }

    #[test]
    fn parse_strict_grammar() {
        assert_eq!(parse("").unwrap(), Vec::<String>::new());
        assert_eq!(parse("#").unwrap(), Vec::<String>::new());
        assert_eq!(parse("#/a/b").unwrap(), vec!["a", "b"]);
        assert_eq!(parse("#/a~1b/c~0d").unwrap(), vec!["a/b", "c~d"]);
        assert!(matches!(
            parse("#definitions"),
            Err(Error::InvalidPointer { .. })
        ));
        assert!(matches!(parse("/a/b"), Err(Error::InvalidPointer { .. })));
    }

    #[test]
    fn join_escapes() {
        assert_eq!(join(&["a/b".into(), "c~d".into()]), "#/a~1b/c~0d");
        assert_eq!(join(&[]), "#");
    }

    #[test]
    fn ref_node_detection() {
        assert_eq!(ref_value(&json!({ "$ref": "#/a" })), Some("#/a"));
        assert_eq!(ref_value(&json!({ "$ref": 42 })), None);
        assert_eq!(ref_value(&json!("plain")), None);
        assert!(!has_siblings(&json!({ "$ref": "#/a" })));
        assert!(has_siblings(&json!({ "$ref": "#/a", "description": "x" })));
    }

    #[test]
    fn walks_objects_and_arrays() {
        let refs = registry(json!({ "a": { "b": [10, { "c": true }] } }));
        let target = resolve_target(&refs, "/root.json", "#/a/b/1/c", true).unwrap();
        assert_eq!(target.value, json!(true));
        assert_eq!(target.pointer, "#/a/b/1/c");
        assert_eq!(target.location, "/root.json");
    }

    #[test]
    fn missing_token_is_named() {
        let refs = registry(json!({ "a": {} }));
        let err = resolve_target(&refs, "/root.json", "#/a/nope/deep", true).unwrap_err();
        match err {
            Error::MissingPointer { token, pointer } => {
                assert_eq!(token, "nope");
                assert!(pointer.ends_with("#/a/nope"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn chases_refs_mid_walk() {
        // /a points at /b; walking through /a must land inside /b's value.
        let refs = registry(json!({
            "a": { "$ref": "#/b" },
            "b": { "x": { "y": 1 } }
        }));
        let target = resolve_target(&refs, "/root.json", "#/a/x/y", true).unwrap();
        assert_eq!(target.value, json!(1));
        assert_eq!(target.location, "/root.json");
        assert_eq!(target.pointer, "#/b/x/y");
    }

    #[test]
    fn chases_trailing_ref_when_asked() {
        let refs = registry(json!({
            "a": { "$ref": "#/b" },
            "b": { "$ref": "#/c" },
            "c": "done"
        }));
        let target = resolve_target(&refs, "/root.json", "#/a", true).unwrap();
        assert_eq!(target.value, json!("done"));
        assert_eq!(target.pointer, "#/c");

        let raw = resolve_target(&refs, "/root.json", "#/a", false).unwrap();
        assert_eq!(raw.value, json!({ "$ref": "#/b" }));
        assert_eq!(raw.pointer, "#/a");
    }

    #[test]
    fn pure_pointer_loop_errors() {
        let refs = registry(json!({
            "a": { "$ref": "#/b" },
            "b": { "$ref": "#/a" }
        }));
        let err = resolve_target(&refs, "/root.json", "#/a", true).unwrap_err();
        assert!(matches!(err, Error::Circular { .. }));
    }

    #[test]
    fn ref_target_through_itself_errors() {
        // The target path passes through the ref node, so every chase grows
        // the remaining pointer; this must terminate with a circular error,
        // not walk forever.
        let refs = registry(json!({ "a": { "$ref": "#/a/b" } }));
        let err = resolve_target(&refs, "/root.json", "#/a", true).unwrap_err();
        match err {
            Error::Circular { pointer } => assert_eq!(pointer, "/root.json#/a"),
            other => panic!("unexpected error: {other}"),
        }

        // The same shape reached mid-walk from a longer pointer.
        let refs = registry(json!({ "a": { "$ref": "#/a/b" } }));
        let err = resolve_target(&refs, "/root.json", "#/a/b/c", true).unwrap_err();
        assert!(matches!(err, Error::Circular { .. }));
    }

    #[test]
    fn set_creates_intermediate_containers() {
        let mut doc = json!({});
        set_pointer(
            &mut doc,
            &["a".into(), "b".into(), "0".into()],
            json!("deep"),
        );
        assert_eq!(doc, json!({ "a": { "b": { "0": "deep" } } }));
    }

    #[test]
    fn set_fills_arrays() {
        let mut doc = json!({ "list": [1] });
        set_pointer(&mut doc, &["list".into(), "2".into()], json!(3));
        assert_eq!(doc, json!({ "list": [1, null, 3] }));
    }

    #[test]
    fn set_replaces_existing() {
        let mut doc = json!({ "a": { "b": 1 } });
        set_pointer(&mut doc, &["a".into(), "b".into()], json!(2));
        assert_eq!(doc, json!({ "a": { "b": 2 } }));
    }
}

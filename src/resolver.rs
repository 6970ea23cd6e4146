//! Resolution: load a root document and crawl its external `$ref`s.
//!
//! Every reachable document is fetched exactly once and registered in a
//! [`Refs`] registry under its canonical location. Fragments are never
//! evaluated here; a `$ref` whose target document loads successfully is
//! resolved even if its fragment points at nothing (that surfaces later,
//! during dereferencing).

use std::collections::HashSet;
use std::collections::VecDeque;

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, ErrorGroup, ErrorRecord};
use crate::location;
use crate::pointer;
use crate::reader;
use crate::registry::Refs;
use crate::types::{Options, Source};

/// Reads and parses a single document, without following any `$ref`s.
///
/// # Errors
///
/// `Read`/`Download` if the location cannot be fetched, `Parser` if the
/// content is malformed, `EmptyContent` for blank content when disallowed.
pub fn parse(source: impl Into<Source>, options: &Options) -> Result<Value, Error> {
    let (_, value) = load_root(source.into(), options)?;
    Ok(value)
}

/// Reads the root document and recursively resolves every external `$ref`,
/// producing the full registry of reachable documents.
///
/// Each distinct canonical location is fetched at most once; two refs
/// spelled differently but normalizing to the same location share one
/// fetch and one registry entry.
///
/// # Errors
///
/// Aborts on the first failing ref by default. With
/// `options.continue_on_error`, failures are collected and returned
/// together as `Error::Group` after the crawl finishes.
pub fn resolve(source: impl Into<Source>, options: &Options) -> Result<Refs, Error> {
    let (root_loc, root_value) = load_root(source.into(), options)?;
    debug!(root = %root_loc, "resolving");

    let mut refs = Refs::new(root_loc.clone());
    refs.add(
        root_loc.clone(),
        location::path_type(&root_loc),
        root_value,
    );

    let mut queue: VecDeque<String> = VecDeque::new();
    let mut queued: HashSet<String> = HashSet::new();
    queue.push_back(root_loc.clone());
    queued.insert(root_loc.clone());

    let mut errors: Vec<ErrorRecord> = Vec::new();

    while let Some(loc) = queue.pop_front() {
        let doc = refs.document(&loc)?.clone();
        for (target, path) in scan_refs(&doc, &loc) {
            let target_loc = match target {
                Ok(target_loc) => target_loc,
                Err(e) => {
                    if options.continue_on_error {
                        errors.push(ErrorRecord {
                            error: Box::new(e),
                            path,
                            source: loc.clone(),
                        });
                        continue;
                    }
                    return Err(e);
                }
            };

            if refs.contains_location(&target_loc) || queued.contains(&target_loc) {
                continue;
            }

            match fetch(&target_loc, options) {
                Ok(value) => {
                    refs.add(target_loc.clone(), location::path_type(&target_loc), value);
                    queued.insert(target_loc.clone());
                    queue.push_back(target_loc);
                }
                Err(e) => {
                    if options.continue_on_error {
                        errors.push(ErrorRecord {
                            error: Box::new(e),
                            path,
                            source: loc.clone(),
                        });
                        // Don't retry this location for every ref to it.
                        queued.insert(target_loc);
                        continue;
                    }
                    return Err(e);
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(refs)
    } else {
        Err(Error::Group(ErrorGroup {
            root: root_loc,
            errors,
            refs,
        }))
    }
}

/// Loads the root document and computes its canonical location.
///
/// In-memory values get the current working directory as a synthetic base,
/// so relative external refs inside them still resolve.
pub(crate) fn load_root(source: Source, options: &Options) -> Result<(String, Value), Error> {
    match source {
        Source::Value(value) => Ok((location::cwd(), value)),
        Source::Location(raw) => {
            let loc = absolutize(&raw)?;
            let (content, _) = reader::read_location(&loc, options)?;
            let value = reader::parse_content(&content, &loc, options)?;
            Ok((loc, value))
        }
    }
}

/// Turns a user-supplied location string into a canonical location.
fn absolutize(raw: &str) -> Result<String, Error> {
    let raw = location::strip_hash(raw);
    if location::is_http(raw) {
        return Ok(raw.to_string());
    }

    // `file://` inputs are decoded to a plain path first, then re-encoded,
    // so both spellings canonicalize identically.
    let path = if location::get_protocol(raw).as_deref() == Some("file") {
        location::to_file_system_path(raw, false)
    } else {
        raw.to_string()
    };
    let encoded = location::from_file_system_path(&path);

    if is_absolute(&encoded) {
        Ok(encoded)
    } else {
        location::resolve(&location::cwd(), &encoded)
    }
}

fn is_absolute(loc: &str) -> bool {
    loc.starts_with('/')
        || (loc.len() >= 2 && loc.as_bytes()[1] == b':' && loc.as_bytes()[0].is_ascii_alphabetic())
}

fn fetch(loc: &str, options: &Options) -> Result<Value, Error> {
    let (content, _) = reader::read_location(loc, options)?;
    reader::parse_content(&content, loc, options)
}

/// Collects every external `$ref` in `doc`, in document order.
///
/// Returns the canonical target location (or the normalization error) plus
/// the key/index trail to the ref node, for error reporting.
fn scan_refs(doc: &Value, containing: &str) -> Vec<(Result<String, Error>, Vec<String>)> {
    let mut found = Vec::new();
    let mut path = Vec::new();
    walk(doc, containing, &mut path, &mut found);
    found
}

fn walk(
    value: &Value,
    containing: &str,
    path: &mut Vec<String>,
    found: &mut Vec<(Result<String, Error>, Vec<String>)>,
) {
    match value {
        Value::Object(map) => {
            if let Some(ref_str) = pointer::ref_value(value) {
                let file = location::strip_hash(ref_str);
                if !file.is_empty() {
                    found.push((location::resolve(containing, file), path.clone()));
                }
            }
            for (key, child) in map {
                path.push(key.clone());
                walk(child, containing, path, found);
                path.pop();
            }
        }
        Value::Array(arr) => {
            for (i, child) in arr.iter().enumerate() {
                path.push(i.to_string());
                walk(child, containing, path, found);
                path.pop();
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scan_finds_external_refs_in_order() {
        let doc = json!({
            "a": { "$ref": "one.json#/x" },
            "b": [{ "$ref": "#/a" }, { "$ref": "two.yaml" }]
        });
        let found = scan_refs(&doc, "/schemas/root.json");
        let locs: Vec<_> = found
            .iter()
            .map(|(r, _)| r.as_ref().unwrap().clone())
            .collect();
        // internal #/a is skipped
        assert_eq!(locs, vec!["/schemas/one.json", "/schemas/two.yaml"]);
        assert_eq!(found[0].1, vec!["a"]);
        assert_eq!(found[1].1, vec!["b", "1"]);
    }

    #[test]
    fn scan_ignores_non_string_ref() {
        let doc = json!({ "a": { "$ref": 42 } });
        assert!(scan_refs(&doc, "/root.json").is_empty());
    }

    #[test]
    fn value_source_resolves_against_cwd() {
        let (loc, value) = load_root(
            Source::Value(json!({ "x": 1 })),
            &Options::default(),
        )
        .unwrap();
        assert!(loc.ends_with('/'));
        assert_eq!(value, json!({ "x": 1 }));
    }

    #[test]
    fn absolutize_keeps_http() {
        assert_eq!(
            absolutize("http://example.com/a.json#/x").unwrap(),
            "http://example.com/a.json"
        );
    }

    #[test]
    fn absolutize_relative_path_uses_cwd() {
        let loc = absolutize("sub/doc.json").unwrap();
        assert!(loc.starts_with(&location::cwd()));
        assert!(loc.ends_with("sub/doc.json"));
    }

    #[cfg(unix)]
    #[test]
    fn absolutize_file_url_matches_plain_path() {
        assert_eq!(
            absolutize("file:///schemas/root.json").unwrap(),
            absolutize("/schemas/root.json").unwrap()
        );
    }
}

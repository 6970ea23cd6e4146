//! Bundling: inline every external document into the root.
//!
//! Each distinct external location is copied once into the root document's
//! `$defs`, keyed by its path relative to the root's directory, and every
//! external `$ref` is rewritten to point into that namespace. The result is
//! a single self-contained document with no external refs; internal refs in
//! the root document are left exactly as written.

use std::collections::{HashSet, VecDeque};

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::error::Error;
use crate::location;
use crate::pointer;
use crate::registry::Refs;
use crate::resolver;
use crate::types::{Options, Source};

/// Resolves a root document and bundles every external ref into it.
///
/// # Errors
///
/// Everything [`resolver::resolve`] can fail with, plus `Resolver` if the
/// root document is not an object and external documents need inlining.
pub fn bundle(source: impl Into<Source>, options: &Options) -> Result<Value, Error> {
    bundle_with_refs(source, options).map(|(value, _)| value)
}

/// Like [`bundle`], but also returns the registry built along the way.
pub fn bundle_with_refs(
    source: impl Into<Source>,
    options: &Options,
) -> Result<(Value, Refs), Error> {
    let refs = resolver::resolve(source, options)?;
    let value = bundle_refs(&refs)?;
    Ok((value, refs))
}

/// Bundles an already-resolved registry.
pub fn bundle_refs(refs: &Refs) -> Result<Value, Error> {
    let root_loc = refs.root_location().to_string();
    debug!(root = %root_loc, "bundling");

    let root_dir = match root_loc.rfind('/') {
        Some(i) => root_loc[..=i].to_string(),
        None => root_loc.clone(),
    };

    let mut doc = refs.document(&root_loc)?.clone();

    let mut bundler = Bundler {
        refs,
        root_loc,
        root_dir,
        inlined: IndexMap::new(),
        pending: VecDeque::new(),
        used: HashSet::new(),
    };

    // Existing $defs keys are reserved so inlined documents never clobber
    // them.
    if let Some(defs) = doc.get("$defs").and_then(Value::as_object) {
        for key in defs.keys() {
            bundler.used.insert(key.clone());
        }
    }

    let root_loc = bundler.root_loc.clone();
    bundler.rewrite(&mut doc, &root_loc)?;

    while let Some(loc) = bundler.pending.pop_front() {
        let key = bundler.inlined[&loc].clone();
        let mut inlined = bundler.refs.document(&loc)?.clone();
        bundler.rewrite(&mut inlined, &loc)?;

        let Some(map) = doc.as_object_mut() else {
            return Err(Error::Resolver {
                location: root_loc.clone(),
                message: "cannot bundle external documents into a non-object root".to_string(),
            });
        };
        let defs = map
            .entry("$defs".to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        if let Some(defs) = defs.as_object_mut() {
            defs.insert(key, inlined);
        }
    }

    Ok(doc)
}

struct Bundler<'a> {
    refs: &'a Refs,
    root_loc: String,
    root_dir: String,
    /// Canonical location → `$defs` key, in inlining order.
    inlined: IndexMap<String, String>,
    pending: VecDeque<String>,
    used: HashSet<String>,
}

impl Bundler<'_> {
    /// Rewrites every `$ref` in `value`, which came from the document at
    /// `containing`.
    fn rewrite(&mut self, value: &mut Value, containing: &str) -> Result<(), Error> {
        match value {
            Value::Object(_) => {
                if let Some(ref_str) = pointer::ref_value(value).map(str::to_string) {
                    if let Some(rewritten) = self.rewrite_ref(&ref_str, containing)? {
                        if let Some(map) = value.as_object_mut() {
                            map.insert("$ref".to_string(), Value::String(rewritten));
                        }
                    }
                }
                if let Some(map) = value.as_object_mut() {
                    for (_, child) in map.iter_mut() {
                        self.rewrite(child, containing)?;
                    }
                }
            }
            Value::Array(items) => {
                for child in items {
                    self.rewrite(child, containing)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Computes the replacement ref string, or `None` to leave it as
    /// written.
    fn rewrite_ref(&mut self, ref_str: &str, containing: &str) -> Result<Option<String>, Error> {
        let file = location::strip_hash(ref_str);
        let hash = location::get_hash(ref_str);

        if file.is_empty() {
            // Internal ref: untouched in the root document, rebased into
            // the $defs namespace inside an inlined document.
            if containing == self.root_loc {
                return Ok(None);
            }
            let key = self.key_for(containing);
            return Ok(Some(format!(
                "#/$defs/{}{}",
                escape_token(&key),
                fragment_tail(hash)
            )));
        }

        let target_loc = location::resolve(containing, file)?;
        if target_loc == self.root_loc {
            // A ref back into the root becomes internal.
            return Ok(Some(hash.to_string()));
        }

        let key = self.ensure_inlined(&target_loc);
        Ok(Some(format!(
            "#/$defs/{}{}",
            escape_token(&key),
            fragment_tail(hash)
        )))
    }

    /// The `$defs` key for an already-registered location.
    fn key_for(&self, loc: &str) -> String {
        match self.inlined.get(loc) {
            Some(key) => key.clone(),
            // Unreachable in practice: inlined documents are only rewritten
            // after registration.
            None => loc.to_string(),
        }
    }

    /// Registers a location for inlining (once) and returns its key.
    fn ensure_inlined(&mut self, loc: &str) -> String {
        if let Some(key) = self.inlined.get(loc) {
            return key.clone();
        }

        let base = loc
            .strip_prefix(&self.root_dir)
            .unwrap_or(loc)
            .to_string();
        let mut key = base.clone();
        let mut n = 2;
        while !self.used.insert(key.clone()) {
            key = format!("{base}_{n}");
            n += 1;
        }

        self.inlined.insert(loc.to_string(), key.clone());
        self.pending.push_back(loc.to_string());
        key
    }
}

/// Escapes a `$defs` key for use as a single pointer token.
fn escape_token(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

/// The pointer tail carried over from the original ref's fragment.
fn fragment_tail(hash: &str) -> &str {
    if hash == "#" {
        ""
    } else {
        &hash[1..]
    }
}

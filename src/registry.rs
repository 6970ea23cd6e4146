//! The reference registry: canonical locations mapped to parsed documents.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::Error;
use crate::location;
use crate::pointer;
use crate::types::PathType;

#[derive(Debug, Clone)]
struct Entry {
    path_type: PathType,
    value: Value,
}

/// All documents touched while resolving a root document.
///
/// Entries are keyed by canonical location and kept in first-discovery
/// order. Each distinct location has exactly one entry, inserted after a
/// single fetch; every reader of that location sees the same value.
#[derive(Debug, Clone)]
pub struct Refs {
    root: String,
    entries: IndexMap<String, Entry>,
}

impl Refs {
    /// Creates an empty registry rooted at the given canonical location.
    pub fn new(root_location: impl Into<String>) -> Self {
        Self {
            root: root_location.into(),
            entries: IndexMap::new(),
        }
    }

    /// Canonical location of the root document. Relative pointer strings
    /// passed to `get`/`set`/`exists` are resolved against this.
    pub fn root_location(&self) -> &str {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn add(&mut self, location: String, path_type: PathType, value: Value) {
        self.entries.insert(location, Entry { path_type, value });
    }

    /// Whether a document for this canonical location has been registered.
    pub fn contains_location(&self, location: &str) -> bool {
        self.entries.contains_key(location)
    }

    /// The parsed document registered for this canonical location.
    pub(crate) fn document(&self, location: &str) -> Result<&Value, Error> {
        self.entries
            .get(location)
            .map(|entry| &entry.value)
            .ok_or_else(|| Error::Resolver {
                location: location.to_string(),
                message: "location is not in the reference registry".to_string(),
            })
    }

    /// All registered locations in first-discovery order, optionally
    /// filtered by type. File locations are returned in decoded
    /// filesystem-path form.
    pub fn paths(&self, filter: Option<PathType>) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, entry)| filter.map_or(true, |t| entry.path_type == t))
            .map(|(loc, entry)| display_path(loc, entry.path_type))
            .collect()
    }

    /// Location → parsed value for every registered document, in
    /// first-discovery order, optionally filtered by type.
    pub fn values(&self, filter: Option<PathType>) -> IndexMap<String, &Value> {
        self.entries
            .iter()
            .filter(|(_, entry)| filter.map_or(true, |t| entry.path_type == t))
            .map(|(loc, entry)| (display_path(loc, entry.path_type), &entry.value))
            .collect()
    }

    /// Whether the given pointer string resolves to an existing value.
    pub fn exists(&self, pointer_str: &str) -> bool {
        self.get(pointer_str).is_ok()
    }

    /// Resolves a pointer string to a concrete value, chasing any `$ref`
    /// nodes along the way.
    ///
    /// # Errors
    ///
    /// `Resolver` if the location is not in the registry, `MissingPointer`
    /// if the fragment path does not exist, `InvalidPointer` for malformed
    /// fragments.
    pub fn get(&self, pointer_str: &str) -> Result<Value, Error> {
        let (loc, hash) = self.split(pointer_str)?;
        pointer::resolve_target(self, &loc, &hash, true).map(|target| target.value)
    }

    /// Installs a value at the given pointer, creating intermediate
    /// containers as needed. Never fails on a missing fragment path.
    ///
    /// # Errors
    ///
    /// `Resolver` if the location is not in the registry, `InvalidPointer`
    /// for malformed fragments.
    pub fn set(&mut self, pointer_str: &str, value: Value) -> Result<(), Error> {
        let (loc, hash) = self.split(pointer_str)?;
        let tokens = pointer::parse(&hash)?;
        let entry = self
            .entries
            .get_mut(&loc)
            .ok_or_else(|| Error::Resolver {
                location: loc.clone(),
                message: "location is not in the reference registry".to_string(),
            })?;
        pointer::set_pointer(&mut entry.value, &tokens, value);
        Ok(())
    }

    /// Splits a pointer string into a canonical location and fragment,
    /// resolving relative locations against the root document.
    fn split(&self, pointer_str: &str) -> Result<(String, String), Error> {
        let hash = location::get_hash(pointer_str).to_string();
        let file = location::strip_hash(pointer_str);
        let loc = if file.is_empty() {
            self.root.clone()
        } else {
            location::resolve(&self.root, file)?
        };
        Ok((loc, hash))
    }
}

fn display_path(location: &str, path_type: PathType) -> String {
    match path_type {
        PathType::File => location::to_file_system_path(location, false),
        _ => location.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Refs {
        let mut refs = Refs::new("/schemas/root.json");
        refs.add(
            "/schemas/root.json".into(),
            PathType::File,
            json!({ "definitions": { "$ref": "defs.json" } }),
        );
        refs.add(
            "/schemas/defs.json".into(),
            PathType::File,
            json!({ "name": { "type": "string" } }),
        );
        refs.add(
            "http://example.com/remote.json".into(),
            PathType::Http,
            json!({ "ok": true }),
        );
        refs
    }

    #[test]
    fn paths_preserve_discovery_order() {
        let refs = sample();
        assert_eq!(
            refs.paths(None),
            vec![
                "/schemas/root.json",
                "/schemas/defs.json",
                "http://example.com/remote.json"
            ]
        );
    }

    #[test]
    fn paths_filter_by_type() {
        let refs = sample();
        assert_eq!(
            refs.paths(Some(PathType::File)),
            vec!["/schemas/root.json", "/schemas/defs.json"]
        );
        assert_eq!(
            refs.paths(Some(PathType::Http)),
            vec!["http://example.com/remote.json"]
        );
        assert!(refs.paths(Some(PathType::Unknown)).is_empty());
    }

    #[test]
    fn values_map_locations_to_documents() {
        let refs = sample();
        let values = refs.values(Some(PathType::Http));
        assert_eq!(values.len(), 1);
        assert_eq!(
            values["http://example.com/remote.json"],
            &json!({ "ok": true })
        );
    }

    #[test]
    fn get_resolves_relative_locations_against_root() {
        let refs = sample();
        assert_eq!(
            refs.get("defs.json#/name/type").unwrap(),
            json!("string")
        );
        // same-document lookup
        assert!(refs.exists("#/definitions"));
    }

    #[test]
    fn get_unknown_location_fails() {
        let refs = sample();
        let err = refs.get("missing.json#/x").unwrap_err();
        assert!(matches!(err, Error::Resolver { .. }));
    }

    #[test]
    fn get_missing_fragment_fails_with_token() {
        let refs = sample();
        let err = refs.get("defs.json#/name/nope").unwrap_err();
        assert!(matches!(err, Error::MissingPointer { token, .. } if token == "nope"));
    }

    #[test]
    fn set_creates_missing_path() {
        let mut refs = sample();
        refs.set("defs.json#/brand/new/0", json!(1)).unwrap();
        assert_eq!(refs.get("defs.json#/brand/new/0").unwrap(), json!(1));
    }
}

//! Resolve, dereference, and bundle JSON Schema `$ref`s.
//!
//! Schemas routinely split across files: a `$ref` can point inside the same
//! document, into a neighboring file, or at an HTTP URL, and targets can
//! chain and cycle. This crate crawls the whole graph and offers three
//! levels of processing:
//!
//! - [`parse`] reads a single document, following nothing.
//! - [`resolve`] crawls every reachable document into a [`Refs`] registry,
//!   fetching each distinct location exactly once.
//! - [`dereference`] replaces every `$ref` with its target, producing a
//!   [`DocGraph`] in which refs to the same target share one node and
//!   circular refs form real cycles.
//! - [`bundle`] inlines every external document into the root's `$defs`,
//!   yielding a single self-contained schema.
//!
//! ```
//! use schemaref::{dereference, Options};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), schemaref::Error> {
//! let schema = json!({
//!     "properties": { "name": { "$ref": "#/definitions/name" } },
//!     "definitions": { "name": { "type": "string" } }
//! });
//!
//! let result = dereference(schema, &Options::default())?;
//!
//! // Both positions resolve to the *same* node.
//! assert_eq!(
//!     result.node_at("#/properties/name"),
//!     result.node_at("#/definitions/name"),
//! );
//! assert_eq!(
//!     result.to_value()?["properties"]["name"],
//!     json!({ "type": "string" }),
//! );
//! # Ok(())
//! # }
//! ```

mod bundle;
mod dereference;
mod error;
mod graph;
pub mod location;
mod pointer;
mod reader;
mod registry;
mod resolver;
mod types;

pub use bundle::{bundle, bundle_refs, bundle_with_refs};
pub use dereference::{dereference, dereference_refs, Dereferenced};
pub use error::{Error, ErrorGroup, ErrorRecord};
pub use graph::{DocGraph, Node, NodeId};
pub use pointer::{ref_value, Target};
pub use reader::{BinaryParser, ContentParser, FileReader, JsonParser, Reader, TextParser, YamlParser};
#[cfg(feature = "remote")]
pub use reader::HttpReader;
pub use registry::Refs;
pub use resolver::{parse, resolve};
pub use types::{
    CircularPolicy, DereferenceOptions, FileOptions, HttpOptions, MediaOptions, Options,
    ParseOptions, PathType, ResolveOptions, Source, HTTP_REDIRECTS, HTTP_TIMEOUT,
};

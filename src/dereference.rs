//! Dereferencing: replace every `$ref` with its target.
//!
//! The output is a [`DocGraph`], not a plain value, because dereferencing
//! is fundamentally graph-shaped: every ref to a given target resolves to
//! the *same* node (compare [`NodeId`]s to test for sharing), and circular
//! refs become real cycles instead of infinite expansions.
//!
//! Construction memoizes on `{location}{pointer}` keys, so a target is
//! built once no matter how many refs point at it, and a position that was
//! built as part of the plain tree is reused when a ref later lands on it.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, ErrorGroup, ErrorRecord};
use crate::graph::{DocGraph, Node, NodeId};
use crate::location;
use crate::pointer;
use crate::registry::Refs;
use crate::resolver;
use crate::types::{CircularPolicy, Options, Source};

/// The result of a dereference run.
#[derive(Debug)]
pub struct Dereferenced {
    /// The arena holding every node of the dereferenced document.
    pub graph: DocGraph,
    /// The root document's node.
    pub root: NodeId,
    /// The registry the run was built from.
    pub refs: Refs,
    circular: bool,
    circular_refs: Vec<String>,
}

impl Dereferenced {
    /// Whether any circular `$ref` was encountered.
    pub fn circular(&self) -> bool {
        self.circular
    }

    /// The `{location}{pointer}` of every circular ref node, in discovery
    /// order, deduplicated.
    pub fn circular_refs(&self) -> &[String] {
        &self.circular_refs
    }

    /// The node at a pointer fragment under the root, if it exists.
    pub fn node_at(&self, pointer_str: &str) -> Option<NodeId> {
        self.graph.get(self.root, pointer_str)
    }

    /// Serializes the dereferenced document back into a plain value.
    ///
    /// # Errors
    ///
    /// `Circular` if the document contains cycles; plain values cannot
    /// express them.
    pub fn to_value(&self) -> Result<Value, Error> {
        self.graph.to_value(self.root)
    }
}

/// Resolves a root document and replaces every `$ref` with its target.
///
/// # Errors
///
/// Everything [`resolver::resolve`] can fail with, plus `MissingPointer` /
/// `InvalidPointer` for bad fragments and `Circular` when a cycle is found
/// under [`CircularPolicy::Error`]. With `options.continue_on_error`, ref
/// failures are collected into `Error::Group` and each failing ref node is
/// kept verbatim.
pub fn dereference(source: impl Into<Source>, options: &Options) -> Result<Dereferenced, Error> {
    match resolver::resolve(source, options) {
        Ok(refs) => run(refs, options, Vec::new()),
        // Continue past a failed crawl: dereference what did resolve and
        // report the crawl failures together with any new ones.
        Err(Error::Group(group)) if options.continue_on_error => {
            run(group.refs, options, group.errors)
        }
        Err(e) => Err(e),
    }
}

/// Dereferences an already-resolved registry.
pub fn dereference_refs(refs: Refs, options: &Options) -> Result<Dereferenced, Error> {
    run(refs, options, Vec::new())
}

fn run(
    refs: Refs,
    options: &Options,
    carried: Vec<ErrorRecord>,
) -> Result<Dereferenced, Error> {
    let root_loc = refs.root_location().to_string();
    debug!(root = %root_loc, "dereferencing");
    let root_doc = refs.document(&root_loc)?.clone();

    let mut run = Derefer {
        refs,
        options,
        graph: DocGraph::new(),
        memo: HashMap::new(),
        in_progress: HashMap::new(),
        circular: false,
        circular_refs: Vec::new(),
        errors: carried,
    };

    let root = run.build(&root_doc, &root_loc, &[])?;

    if !run.errors.is_empty() {
        return Err(Error::Group(ErrorGroup {
            root: root_loc,
            errors: run.errors,
            refs: run.refs,
        }));
    }

    Ok(Dereferenced {
        graph: run.graph,
        root,
        refs: run.refs,
        circular: run.circular,
        circular_refs: run.circular_refs,
    })
}

struct Derefer<'a> {
    refs: Refs,
    options: &'a Options,
    graph: DocGraph,
    /// Completed (or reserved) nodes, keyed by `{location}{pointer}`.
    memo: HashMap<String, NodeId>,
    /// Container nodes currently under construction. A ref landing on one
    /// of these keys is circular.
    in_progress: HashMap<String, NodeId>,
    circular: bool,
    circular_refs: Vec<String>,
    errors: Vec<ErrorRecord>,
}

impl Derefer<'_> {
    fn build(&mut self, value: &Value, loc: &str, tokens: &[String]) -> Result<NodeId, Error> {
        let key = format!("{loc}{}", pointer::join(tokens));
        if let Some(&id) = self.memo.get(&key) {
            return Ok(id);
        }

        if let Some(ref_str) = pointer::ref_value(value) {
            let ref_str = ref_str.to_string();
            return match self.build_ref(value, &ref_str, loc, tokens, &key) {
                Ok(id) => Ok(id),
                Err(e) if self.options.continue_on_error => {
                    // A ref that already failed during the crawl fails again
                    // here; report each ref node once.
                    let seen = self
                        .errors
                        .iter()
                        .any(|r| r.source == loc && r.path == tokens);
                    if !seen {
                        self.errors.push(ErrorRecord {
                            error: Box::new(e),
                            path: tokens.to_vec(),
                            source: loc.to_string(),
                        });
                    }
                    // Keep the failing ref node verbatim.
                    let id = self.graph.add_value(value);
                    self.memo.insert(key, id);
                    Ok(id)
                }
                Err(e) => Err(e),
            };
        }

        match value {
            Value::Object(map) => {
                let id = self.graph.reserve();
                self.memo.insert(key.clone(), id);
                self.in_progress.insert(key.clone(), id);
                let mut children = IndexMap::new();
                for (child_key, child) in map {
                    let mut child_tokens = tokens.to_vec();
                    child_tokens.push(child_key.clone());
                    children.insert(child_key.clone(), self.build(child, loc, &child_tokens)?);
                }
                self.graph.set(id, Node::Object(children));
                self.in_progress.remove(&key);
                Ok(id)
            }
            Value::Array(items) => {
                let id = self.graph.reserve();
                self.memo.insert(key.clone(), id);
                self.in_progress.insert(key.clone(), id);
                let mut children = Vec::with_capacity(items.len());
                for (i, child) in items.iter().enumerate() {
                    let mut child_tokens = tokens.to_vec();
                    child_tokens.push(i.to_string());
                    children.push(self.build(child, loc, &child_tokens)?);
                }
                self.graph.set(id, Node::Array(children));
                self.in_progress.remove(&key);
                Ok(id)
            }
            leaf => {
                let id = self.graph.add(Node::Leaf(leaf.clone()));
                self.memo.insert(key, id);
                Ok(id)
            }
        }
    }

    fn build_ref(
        &mut self,
        value: &Value,
        ref_str: &str,
        loc: &str,
        tokens: &[String],
        key: &str,
    ) -> Result<NodeId, Error> {
        let file = location::strip_hash(ref_str);
        let target_loc = if file.is_empty() {
            loc.to_string()
        } else {
            location::resolve(loc, file)?
        };
        let hash = location::get_hash(ref_str);
        let target = pointer::resolve_target(&self.refs, &target_loc, hash, true)?;
        let target_key = format!("{}{}", target.location, target.pointer);

        let target_id = if let Some(&ancestor) = self.in_progress.get(&target_key) {
            // The ref points back into a container still being built.
            self.circular = true;
            if !self.circular_refs.contains(&key.to_string()) {
                self.circular_refs.push(key.to_string());
            }
            if self.options.dereference.circular == CircularPolicy::Error {
                return Err(Error::Circular {
                    pointer: key.to_string(),
                });
            }
            ancestor
        } else if let Some(&done) = self.memo.get(&target_key) {
            done
        } else {
            let target_tokens = pointer::parse(&target.pointer)?;
            self.build(&target.value, &target.location, &target_tokens)?
        };

        // $ref with siblings: an object target is extended with the sibling
        // keys (siblings win on collision); any other target replaces the
        // node outright and the siblings are dropped. A circular target is
        // still an unfilled placeholder at this point, so siblings on a
        // circular ref are dropped too and the node aliases the ancestor.
        let id = if pointer::has_siblings(value) {
            match self.graph.node(target_id).clone() {
                Node::Object(mut merged) => {
                    if let Some(map) = value.as_object() {
                        for (sibling_key, sibling) in map {
                            if sibling_key == "$ref" {
                                continue;
                            }
                            let mut sibling_tokens = tokens.to_vec();
                            sibling_tokens.push(sibling_key.clone());
                            let child = self.build(sibling, loc, &sibling_tokens)?;
                            merged.insert(sibling_key.clone(), child);
                        }
                    }
                    self.graph.add(Node::Object(merged))
                }
                _ => target_id,
            }
        } else {
            target_id
        };

        self.memo.insert(key.to_string(), id);
        Ok(id)
    }
}

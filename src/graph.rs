//! Arena-indexed document graph.
//!
//! Dereferencing produces a graph, not a tree: two positions that resolve
//! through the same `$ref` target share one node, and circular refs form
//! real cycles. Nodes live in a flat arena and refer to each other by
//! index, so sharing and cycles cost nothing to represent and node identity
//! is a plain `NodeId` comparison.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::Error;
use crate::pointer;

/// Index of a node in a [`DocGraph`] arena.
///
/// Two equal ids are the same node, which is how shared `$ref` targets are
/// detected: positions that dereferenced to one target carry one id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// A single graph node.
#[derive(Debug, Clone)]
pub enum Node {
    /// A scalar: null, bool, number, or string.
    Leaf(Value),
    Array(Vec<NodeId>),
    /// Key order is preserved from the source document.
    Object(IndexMap<String, NodeId>),
}

/// The arena holding every node of a dereferenced document.
#[derive(Debug, Clone, Default)]
pub struct DocGraph {
    nodes: Vec<Node>,
}

impl DocGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a node and returns its id.
    pub fn add(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Reserves an id whose node will be filled in later via [`set`].
    ///
    /// Container nodes need their id before their children are built, so
    /// a child ref can point back at an ancestor still under construction.
    ///
    /// [`set`]: DocGraph::set
    pub(crate) fn reserve(&mut self) -> NodeId {
        self.add(Node::Leaf(Value::Null))
    }

    pub(crate) fn set(&mut self, id: NodeId, node: Node) {
        self.nodes[id.0] = node;
    }

    /// The node behind an id.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Walks a pointer fragment from `root` down the graph.
    ///
    /// Returns `None` if the path does not exist or the fragment is
    /// malformed.
    pub fn get(&self, root: NodeId, pointer_str: &str) -> Option<NodeId> {
        let tokens = pointer::parse(pointer_str).ok()?;
        let mut current = root;
        for token in &tokens {
            current = match self.node(current) {
                Node::Object(map) => *map.get(token)?,
                Node::Array(items) => {
                    let n = token.parse::<usize>().ok()?;
                    *items.get(n)?
                }
                Node::Leaf(_) => return None,
            };
        }
        Some(current)
    }

    /// Whether any cycle is reachable from `root`.
    pub fn is_cyclic(&self, root: NodeId) -> bool {
        let mut on_stack = vec![false; self.nodes.len()];
        let mut done = vec![false; self.nodes.len()];
        self.find_cycle(root, &mut on_stack, &mut done, &mut Vec::new())
            .is_some()
    }

    /// Serializes the subgraph under `root` back into a plain value.
    ///
    /// Shared nodes are duplicated in the output (plain values cannot
    /// express sharing).
    ///
    /// # Errors
    ///
    /// `Circular` if a cycle is reachable from `root`, naming the pointer
    /// path where it was found.
    pub fn to_value(&self, root: NodeId) -> Result<Value, Error> {
        let mut on_stack = vec![false; self.nodes.len()];
        let mut done = vec![false; self.nodes.len()];
        if let Some(path) = self.find_cycle(root, &mut on_stack, &mut done, &mut Vec::new()) {
            return Err(Error::Circular {
                pointer: pointer::join(&path),
            });
        }
        Ok(self.build_value(root))
    }

    fn build_value(&self, id: NodeId) -> Value {
        match self.node(id) {
            Node::Leaf(value) => value.clone(),
            Node::Array(items) => {
                Value::Array(items.iter().map(|child| self.build_value(*child)).collect())
            }
            Node::Object(map) => {
                let mut out = serde_json::Map::new();
                for (key, child) in map {
                    out.insert(key.clone(), self.build_value(*child));
                }
                Value::Object(out)
            }
        }
    }

    /// DFS cycle search; returns the token path to the first back edge.
    fn find_cycle(
        &self,
        id: NodeId,
        on_stack: &mut [bool],
        done: &mut [bool],
        path: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        if on_stack[id.0] {
            return Some(path.clone());
        }
        if done[id.0] {
            return None;
        }
        on_stack[id.0] = true;
        let found = match self.node(id) {
            Node::Leaf(_) => None,
            Node::Array(items) => items.iter().enumerate().find_map(|(i, child)| {
                path.push(i.to_string());
                let found = self.find_cycle(*child, on_stack, done, path);
                path.pop();
                found
            }),
            Node::Object(map) => map.iter().find_map(|(key, child)| {
                path.push(key.clone());
                let found = self.find_cycle(*child, on_stack, done, path);
                path.pop();
                found
            }),
        };
        on_stack[id.0] = false;
        done[id.0] = true;
        found
    }

    /// Copies a plain value into the arena, returning the new subtree's
    /// root id.
    pub(crate) fn add_value(&mut self, value: &Value) -> NodeId {
        match value {
            Value::Array(items) => {
                let children: Vec<NodeId> =
                    items.iter().map(|child| self.add_value(child)).collect();
                self.add(Node::Array(children))
            }
            Value::Object(map) => {
                let children: IndexMap<String, NodeId> = map
                    .iter()
                    .map(|(key, child)| (key.clone(), self.add_value(child)))
                    .collect();
                self.add(Node::Object(children))
            }
            leaf => self.add(Node::Leaf(leaf.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_plain_values() {
        let mut graph = DocGraph::new();
        let doc = json!({ "a": [1, { "b": "x" }], "c": null });
        let root = graph.add_value(&doc);
        assert_eq!(graph.to_value(root).unwrap(), doc);
    }

    #[test]
    fn shared_nodes_duplicate_on_serialize() {
        let mut graph = DocGraph::new();
        let shared = graph.add_value(&json!({ "type": "string" }));
        let mut map = IndexMap::new();
        map.insert("first".to_string(), shared);
        map.insert("second".to_string(), shared);
        let root = graph.add(Node::Object(map));

        assert_eq!(graph.get(root, "#/first"), graph.get(root, "#/second"));
        assert_eq!(
            graph.to_value(root).unwrap(),
            json!({
                "first": { "type": "string" },
                "second": { "type": "string" }
            })
        );
    }

    #[test]
    fn get_walks_objects_and_arrays() {
        let mut graph = DocGraph::new();
        let root = graph.add_value(&json!({ "a": [10, { "b": true }] }));
        let id = graph.get(root, "#/a/1/b").unwrap();
        match graph.node(id) {
            Node::Leaf(v) => assert_eq!(v, &json!(true)),
            other => panic!("unexpected node: {other:?}"),
        }
        assert!(graph.get(root, "#/a/9").is_none());
        assert!(graph.get(root, "#/nope").is_none());
        assert!(graph.get(root, "not-a-pointer").is_none());
    }

    #[test]
    fn cycle_detection_and_serialization_failure() {
        let mut graph = DocGraph::new();
        let root = graph.reserve();
        let mut map = IndexMap::new();
        map.insert("self".to_string(), root);
        graph.set(root, Node::Object(map));

        assert!(graph.is_cyclic(root));
        let err = graph.to_value(root).unwrap_err();
        match err {
            Error::Circular { pointer } => assert_eq!(pointer, "#/self"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn diamond_sharing_is_not_a_cycle() {
        let mut graph = DocGraph::new();
        let shared = graph.add_value(&json!(1));
        let mut map = IndexMap::new();
        map.insert("a".to_string(), shared);
        map.insert("b".to_string(), shared);
        let root = graph.add(Node::Object(map));
        assert!(!graph.is_cyclic(root));
    }
}

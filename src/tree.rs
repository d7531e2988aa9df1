//! Arena-backed intermediate tree.
//!
//! Every source adapter produces a [`Tree`], and every consumer (annotation,
//! fill, flatten, label encoding) walks one. Nodes live in a flat `Vec`
//! addressed by [`NodeId`]; children are id lists. The arena is append-only,
//! so a tree can never contain a cycle, and every walk carries an explicit
//! depth counter checked against [`MAX_DEPTH`].
//!
//! Trees are transient: built for one decode or encode call, then dropped.

use crate::error::KeytreeError;

/// Maximum nesting depth any walk will follow.
pub const MAX_DEPTH: usize = 128;

/// Index of a node inside its [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(usize);

/// Shape category a node was bound to during annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Struct,
    Map,
    Slice,
    Scalar,
    Dynamic,
}

/// Field metadata carried onto a node during annotation or encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tag {
    pub allow_empty: bool,
    pub hidden: bool,
    pub description: &'static str,
}

/// One configuration key and its value or children.
#[derive(Debug, Clone, Default)]
pub struct Node {
    /// Path segment as it appeared in the source. Array elements use the
    /// literal form `[i]`.
    pub name: String,
    /// Exact struct field name this node resolved to during annotation.
    pub field_name: String,
    /// Unparsed leaf payload. Only meaningful on leaves.
    pub value: String,
    pub children: Vec<NodeId>,
    pub category: Option<Category>,
    pub tag: Tag,
    /// Set when an allow-empty toggle was given a falsy value; the filler
    /// skips the whole subtree.
    pub disabled: bool,
    /// Untyped escape hatch. When set, `children` is empty and the value is
    /// copied verbatim into a dynamic map field.
    pub raw: Option<serde_json::Value>,
}

impl Node {
    pub fn named(name: impl Into<String>) -> Self {
        Node {
            name: name.into(),
            ..Node::default()
        }
    }

    pub fn leaf(name: impl Into<String>, value: impl Into<String>) -> Self {
        Node {
            name: name.into(),
            value: value.into(),
            ..Node::default()
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty() && self.raw.is_none()
    }
}

/// Append-only node arena. The root is always the node the tree was
/// created with.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub fn new(root: Node) -> Self {
        Tree { nodes: vec![root] }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Append `node` under `parent` and return its id.
    pub fn push(&mut self, parent: NodeId, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Detach the most recently pushed child of `parent`. The node stays in
    /// the arena but is no longer reachable.
    pub fn pop_child(&mut self, parent: NodeId) {
        self.nodes[parent.0].children.pop();
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// True for array-element names like `[3]`.
pub fn is_index_name(name: &str) -> bool {
    name.len() > 2
        && name.starts_with('[')
        && name.ends_with(']')
        && name[1..name.len() - 1].bytes().all(|b| b.is_ascii_digit())
}

/// Parse the index out of an `[i]` name.
pub fn index_of(name: &str) -> Option<usize> {
    if !is_index_name(name) {
        return None;
    }
    name[1..name.len() - 1].parse().ok()
}

/// Join a path segment onto a prefix. Array-element names attach directly
/// to the preceding segment, without a separator.
pub fn join_path(prefix: &str, name: &str, separator: char) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else if name.starts_with('[') {
        format!("{prefix}{name}")
    } else {
        format!("{prefix}{separator}{name}")
    }
}

pub(crate) fn check_depth(depth: usize, path: &str) -> Result<(), KeytreeError> {
    if depth > MAX_DEPTH {
        return Err(KeytreeError::DepthExceeded {
            path: path.to_string(),
        });
    }
    Ok(())
}

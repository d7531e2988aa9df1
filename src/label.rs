//! Label codec: flat dotted-path string maps ⇄ trees.
//!
//! Labels are the shared wire format for CLI flags, environment variables and
//! orchestrator metadata: `app.servers[0].host = "a"` style keys, all rooted
//! at one fixed segment. Decoding merges keys into a shared tree (repeated
//! prefixes share nodes, names compare case-insensitively); encoding is the
//! inverse traversal, expanding any verbatim dynamic subtree back into dotted
//! and bracketed keys.

use std::collections::BTreeMap;

use crate::error::KeytreeError;
use crate::tree::{self, Node, NodeId, Tree, join_path};

/// Decode a label map into a tree rooted at `root`.
///
/// Every key must start with the `root` segment (case-insensitively). When
/// `filters` is non-empty, only keys starting with one of the filters
/// (case-insensitive prefix match) participate; everything else is skipped.
///
/// Keys are processed in sorted order so the resulting tree does not depend
/// on the iteration order of the source map.
pub fn decode(
    labels: impl IntoIterator<Item = (String, String)>,
    root: &str,
    filters: &[&str],
) -> Result<Tree, KeytreeError> {
    let mut pairs: Vec<(String, String)> = labels
        .into_iter()
        .filter(|(key, _)| matches_filters(key, filters))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    log::trace!("decoding {} labels under '{root}'", pairs.len());

    let mut tree = Tree::new(Node::named(root));
    for (key, value) in pairs {
        insert(&mut tree, &key, value, root)?;
    }
    Ok(tree)
}

/// Encode a tree back into a flat label map.
pub fn encode(tree: &Tree) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    let root = tree.root();
    let node = tree.node(root);
    if node.children.is_empty() && node.raw.is_none() && node.value.is_empty() {
        return out;
    }
    let prefix = node.name.clone();
    walk(tree, root, &prefix, &mut out);
    out
}

fn matches_filters(key: &str, filters: &[&str]) -> bool {
    if filters.is_empty() {
        return true;
    }
    filters
        .iter()
        .any(|f| key.get(..f.len()).is_some_and(|p| p.eq_ignore_ascii_case(f)))
}

fn insert(tree: &mut Tree, key: &str, value: String, root: &str) -> Result<(), KeytreeError> {
    let raw_segments: Vec<&str> = key.split('.').collect();
    let first = raw_segments.first().copied().unwrap_or("");
    if !first.eq_ignore_ascii_case(root) {
        return Err(KeytreeError::InvalidKey {
            key: key.to_string(),
            reason: format!("expected root segment '{root}'"),
        });
    }

    let mut segments: Vec<String> = Vec::new();
    for raw in &raw_segments[1..] {
        expand_segment(raw, key, &mut segments)?;
    }
    tree::check_depth(segments.len(), key)?;

    let mut current = tree.root();
    for segment in &segments {
        current = descend(tree, current, segment);
    }
    tree.node_mut(current).value = value;
    Ok(())
}

/// Split one raw dot-segment into name and index parts: `servers[0]` becomes
/// the two node names `servers` and `[0]`. Brackets must trail a name.
fn expand_segment(raw: &str, key: &str, out: &mut Vec<String>) -> Result<(), KeytreeError> {
    let invalid = |reason: String| KeytreeError::InvalidKey {
        key: key.to_string(),
        reason,
    };

    if raw.is_empty() {
        return Err(invalid("empty path segment".to_string()));
    }
    if raw.starts_with('[') {
        return Err(invalid("a segment cannot start with '['".to_string()));
    }

    let Some(open) = raw.find('[') else {
        out.push(raw.to_string());
        return Ok(());
    };

    out.push(raw[..open].to_string());
    let mut rest = &raw[open..];
    while !rest.is_empty() {
        if !rest.starts_with('[') {
            return Err(invalid(format!("trailing characters after index: '{rest}'")));
        }
        let Some(end) = rest.find(']') else {
            return Err(invalid("unterminated index".to_string()));
        };
        let group = &rest[..=end];
        if tree::index_of(group).is_none() {
            return Err(invalid(format!("malformed index '{group}'")));
        }
        out.push(group.to_string());
        rest = &rest[end + 1..];
    }
    Ok(())
}

/// Descend into the child named `name`, merging case-insensitively with an
/// existing child rather than creating a duplicate.
fn descend(tree: &mut Tree, parent: NodeId, name: &str) -> NodeId {
    let existing = tree
        .children(parent)
        .iter()
        .copied()
        .find(|&id| tree.node(id).name.eq_ignore_ascii_case(name));
    match existing {
        Some(id) => id,
        None => tree.push(parent, Node::named(name)),
    }
}

fn walk(tree: &Tree, id: NodeId, prefix: &str, out: &mut BTreeMap<String, String>) {
    let node = tree.node(id);
    if let Some(raw) = &node.raw {
        expand_raw(prefix, raw, out);
        return;
    }
    if node.children.is_empty() {
        out.insert(prefix.to_string(), node.value.clone());
        return;
    }
    if !node.value.is_empty() {
        out.insert(prefix.to_string(), node.value.clone());
    }
    for &child in &node.children {
        let name = &tree.node(child).name;
        walk(tree, child, &join_path(prefix, name, '.'), out);
    }
}

fn expand_raw(prefix: &str, value: &serde_json::Value, out: &mut BTreeMap<String, String>) {
    use serde_json::Value;
    match value {
        Value::Object(entries) => {
            for (key, val) in entries {
                expand_raw(&join_path(prefix, key, '.'), val, out);
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                expand_raw(&format!("{prefix}[{i}]"), item, out);
            }
        }
        other => {
            out.insert(prefix.to_string(), crate::encode::scalar_string(other));
        }
    }
}

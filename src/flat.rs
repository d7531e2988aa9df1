//! Flatten: project an encoded tree into sorted documentation entries.
//!
//! One entry per scalar leaf (hidden fields excluded), one presence-toggle
//! entry per allow-empty section, and a placeholder-keyed entry for every
//! map, expanding into the map's first child with the placeholder standing
//! in for the dynamic key. Output is sorted lexicographically so the listing
//! is diff-stable no matter how the source maps iterate.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::KeytreeError;
use crate::schema::{PLACEHOLDER, Schema};
use crate::tree::{Category, NodeId, Tree, join_path};

/// One documentation row: a flag-style path, its description, its default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatEntry {
    pub name: String,
    pub description: String,
    pub default: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Case {
    Lower,
    Upper,
}

/// Rendering options for flattened paths.
#[derive(Debug, Clone)]
pub struct FlatOpts {
    pub case: Case,
    pub separator: char,
}

impl Default for FlatOpts {
    fn default() -> Self {
        FlatOpts {
            case: Case::Lower,
            separator: '.',
        }
    }
}

/// Flatten an encoded tree into sorted entries.
pub fn flatten(tree: &Tree, opts: &FlatOpts) -> Vec<FlatEntry> {
    let mut entries = Vec::new();
    let root = tree.root();
    let prefix = tree.node(root).name.clone();
    for &child in tree.children(root) {
        let child_prefix = join_path(&prefix, &tree.node(child).name, opts.separator);
        walk(tree, child, &child_prefix, opts, &mut entries);
    }
    for entry in &mut entries {
        entry.name = match opts.case {
            Case::Lower => entry.name.to_lowercase(),
            Case::Upper => entry.name.to_uppercase(),
        };
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    entries
}

/// Generate, encode and flatten `T` in one call — the listing a help screen
/// or reference document wants.
pub fn entries<T>(root: &str, opts: &FlatOpts) -> Result<Vec<FlatEntry>, KeytreeError>
where
    T: Schema + Default + Serialize + DeserializeOwned,
{
    let mut value = T::default();
    let desc = T::schema();
    crate::generate::generate(&mut value, &desc)?;
    let tree = crate::encode::encode(&value, &desc, root)?;
    Ok(flatten(&tree, opts))
}

fn walk(tree: &Tree, id: NodeId, prefix: &str, opts: &FlatOpts, out: &mut Vec<FlatEntry>) {
    let node = tree.node(id);
    match node.category {
        Some(Category::Map) | Some(Category::Dynamic) => {
            let placeholder_prefix = join_path(prefix, PLACEHOLDER, opts.separator);
            match node.children.first() {
                None => push_entry(out, node, &placeholder_prefix, ""),
                Some(&first) if tree.node(first).is_leaf() => {
                    // scalar-valued map: the placeholder entry carries the
                    // map's own description
                    push_entry(out, node, &placeholder_prefix, &tree.node(first).value);
                }
                Some(&first) => walk(tree, first, &placeholder_prefix, opts, out),
            }
        }
        Some(Category::Struct) => {
            if node.children.is_empty() {
                // presence toggle of an allow-empty section
                push_entry(out, node, prefix, &node.value);
                return;
            }
            if node.tag.allow_empty {
                push_entry(out, node, prefix, "true");
            }
            for &child in &node.children {
                let child_prefix = join_path(prefix, &tree.node(child).name, opts.separator);
                walk(tree, child, &child_prefix, opts, out);
            }
        }
        Some(Category::Slice) if !node.children.is_empty() => {
            for &child in &node.children {
                let child_prefix = join_path(prefix, &tree.node(child).name, opts.separator);
                walk(tree, child, &child_prefix, opts, out);
            }
        }
        _ => push_entry(out, node, prefix, &node.value),
    }
}

fn push_entry(out: &mut Vec<FlatEntry>, node: &crate::tree::Node, name: &str, default: &str) {
    if node.tag.hidden {
        return;
    }
    out.push(FlatEntry {
        name: name.to_string(),
        description: node.tag.description.to_string(),
        default: default.to_string(),
    });
}

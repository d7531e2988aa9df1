//! Metadata annotation: binding a source tree to a descriptor.
//!
//! Annotation is the only place field names are resolved (case-insensitively,
//! honoring aliases and embedded structs) and the only place unknown keys,
//! standalone sections and unsupported shapes are detected. After it runs,
//! every node carries its resolved field name, shape category and tag
//! markers, disabled toggles are flagged, and dynamic subtrees have been
//! captured into their verbatim form — the filler can then trust the tree.

use crate::error::KeytreeError;
use crate::schema::{Descriptor, Field, Kind};
use crate::tree::{self, Category, NodeId, Tag, Tree, join_path};

/// Annotate `tree` against the struct described by `desc`.
pub fn annotate(tree: &mut Tree, desc: &Descriptor) -> Result<(), KeytreeError> {
    let root = tree.root();
    tree.node_mut(root).category = Some(Category::Struct);
    if tree.node(root).children.is_empty() {
        return Ok(());
    }
    let path = tree.node(root).name.clone();
    annotate_fields(tree, root, desc, &path, 0)
}

/// Resolve and annotate every child of a struct-kinded node.
fn annotate_fields(
    tree: &mut Tree,
    id: NodeId,
    desc: &Descriptor,
    path: &str,
    depth: usize,
) -> Result<(), KeytreeError> {
    tree::check_depth(depth, path)?;
    let children: Vec<NodeId> = tree.children(id).to_vec();
    for child_id in children {
        let name = tree.node(child_id).name.clone();
        let child_path = join_path(path, &name, '.');
        let Some(field) = desc.resolve(&name) else {
            return Err(KeytreeError::UnknownField {
                path: path.to_string(),
                name,
            });
        };

        let node = tree.node_mut(child_id);
        node.field_name = field.name.to_string();
        node.category = Some(field.kind.category());
        node.tag = Tag {
            allow_empty: field.allow_empty,
            hidden: field.hidden,
            description: field.doc,
        };

        if field.single.is_some() {
            annotate_single(tree, child_id, field, &child_path, depth + 1)?;
        } else {
            annotate_value(tree, child_id, &field.kind, &child_path, depth + 1)?;
        }
    }
    Ok(())
}

fn annotate_value(
    tree: &mut Tree,
    id: NodeId,
    kind: &Kind,
    path: &str,
    depth: usize,
) -> Result<(), KeytreeError> {
    tree::check_depth(depth, path)?;
    match kind {
        Kind::Struct(desc) => {
            check_presence(tree, id, path)?;
            if tree.node(id).disabled || tree.node(id).children.is_empty() {
                return Ok(());
            }
            annotate_fields(tree, id, desc, path, depth)
        }
        Kind::Map(element) => {
            check_presence(tree, id, path)?;
            if tree.node(id).disabled {
                return Ok(());
            }
            let children: Vec<NodeId> = tree.children(id).to_vec();
            for child_id in children {
                // map keys are literal and case-sensitive, unlike fields
                let name = tree.node(child_id).name.clone();
                let child_path = join_path(path, &name, '.');
                let node = tree.node_mut(child_id);
                node.field_name = name;
                node.category = Some(element.category());
                annotate_value(tree, child_id, element, &child_path, depth + 1)?;
            }
            Ok(())
        }
        Kind::Dynamic => {
            check_presence(tree, id, path)?;
            if tree.node(id).disabled {
                return Ok(());
            }
            let raw = if tree.node(id).children.is_empty() {
                serde_json::Value::Object(serde_json::Map::new())
            } else {
                raw_of(tree, id)
            };
            let node = tree.node_mut(id);
            node.raw = Some(raw);
            node.children.clear();
            Ok(())
        }
        Kind::Slice(element) => annotate_slice(tree, id, element, path, depth),
        _ => {
            if !tree.node(id).children.is_empty() {
                return Err(KeytreeError::Unsupported {
                    path: path.to_string(),
                    reason: "cannot descend into a scalar field".to_string(),
                });
            }
            Ok(())
        }
    }
}

fn annotate_slice(
    tree: &mut Tree,
    id: NodeId,
    element: &Kind,
    path: &str,
    depth: usize,
) -> Result<(), KeytreeError> {
    match element {
        Kind::Struct(desc) => {
            let mut children: Vec<NodeId> = tree.children(id).to_vec();
            if children.is_empty() {
                return Err(KeytreeError::Standalone {
                    path: path.to_string(),
                });
            }
            for &child_id in &children {
                let name = &tree.node(child_id).name;
                if !tree::is_index_name(name) {
                    return Err(KeytreeError::Unsupported {
                        path: path.to_string(),
                        reason: format!("expected an indexed element, got '{name}'"),
                    });
                }
            }
            // child order is index order, not insertion order
            children.sort_by_key(|&c| tree::index_of(&tree.node(c).name).unwrap_or(usize::MAX));
            tree.node_mut(id).children = children.clone();
            for child_id in children {
                let name = tree.node(child_id).name.clone();
                let child_path = join_path(path, &name, '.');
                tree.node_mut(child_id).category = Some(Category::Struct);
                annotate_fields(tree, child_id, desc, &child_path, depth + 1)?;
            }
            Ok(())
        }
        Kind::Map(_) | Kind::Slice(_) | Kind::Dynamic => Err(KeytreeError::Unsupported {
            path: path.to_string(),
            reason: "unsupported slice element kind".to_string(),
        }),
        _ => {
            if !tree.children(id).is_empty() {
                return Err(KeytreeError::Unsupported {
                    path: path.to_string(),
                    reason: "scalar elements take a single comma-separated value".to_string(),
                });
            }
            Ok(())
        }
    }
}

/// Annotate a slice field collapsed onto an alias: the node's children are
/// either one indexed group or the single element's fields directly.
fn annotate_single(
    tree: &mut Tree,
    id: NodeId,
    field: &Field,
    path: &str,
    depth: usize,
) -> Result<(), KeytreeError> {
    let Kind::Slice(element) = &field.kind else {
        return Err(KeytreeError::Unsupported {
            path: path.to_string(),
            reason: "a single-element alias requires a slice field".to_string(),
        });
    };
    let Kind::Struct(desc) = element.as_ref() else {
        return Err(KeytreeError::Unsupported {
            path: path.to_string(),
            reason: "a single-element alias requires struct elements".to_string(),
        });
    };

    check_presence(tree, id, path)?;
    if tree.node(id).disabled || tree.node(id).children.is_empty() {
        return Ok(());
    }

    let children: Vec<NodeId> = tree.children(id).to_vec();
    let indexed = children
        .iter()
        .all(|&c| tree::is_index_name(&tree.node(c).name));
    if indexed {
        if children.len() > 1 {
            return Err(KeytreeError::SingleElement {
                path: path.to_string(),
            });
        }
        let group = children[0];
        let group_path = join_path(path, &tree.node(group).name.clone(), '.');
        tree.node_mut(group).category = Some(Category::Struct);
        return annotate_fields(tree, group, desc, &group_path, depth + 1);
    }
    annotate_fields(tree, id, desc, path, depth)
}

/// A value on a struct-, map- or dynamic-kinded node is a presence toggle:
/// truthy enables the node, `"false"` disables the whole subtree. A childless
/// node with no value needs the allow-empty marker.
fn check_presence(tree: &mut Tree, id: NodeId, path: &str) -> Result<(), KeytreeError> {
    let node = tree.node_mut(id);
    if node.value.is_empty() {
        if node.children.is_empty() && !node.tag.allow_empty {
            return Err(KeytreeError::Standalone {
                path: path.to_string(),
            });
        }
        return Ok(());
    }
    match node.value.as_str() {
        "true" => Ok(()),
        "false" => {
            node.disabled = true;
            Ok(())
        }
        other => Err(KeytreeError::Parse {
            path: path.to_string(),
            value: other.to_string(),
            expected: "bool",
        }),
    }
}

/// Collapse a subtree into a verbatim dynamic value: leaves become strings,
/// indexed children become arrays, everything else nests as objects.
fn raw_of(tree: &Tree, id: NodeId) -> serde_json::Value {
    use serde_json::Value;
    let node = tree.node(id);
    if node.children.is_empty() {
        return Value::String(node.value.clone());
    }
    let indexed = node
        .children
        .iter()
        .all(|&c| tree::is_index_name(&tree.node(c).name));
    if indexed {
        let mut items: Vec<(usize, Value)> = node
            .children
            .iter()
            .map(|&c| {
                let index = tree::index_of(&tree.node(c).name).unwrap_or(usize::MAX);
                (index, raw_of(tree, c))
            })
            .collect();
        items.sort_by_key(|(index, _)| *index);
        Value::Array(items.into_iter().map(|(_, value)| value).collect())
    } else {
        let mut entries = serde_json::Map::new();
        for &child in &node.children {
            entries.insert(tree.node(child).name.clone(), raw_of(tree, child));
        }
        Value::Object(entries)
    }
}

//! Encode: walk a live config struct into a stringified tree.
//!
//! The mirror of fill: the object is serialized once, then walked alongside
//! its descriptor. Scalars stringify (fixed 6-decimal floats, `true`/`false`
//! booleans), absent optional sections vanish unless an allow-empty toggle
//! has to survive, empty maps are skipped, scalar slices join into one
//! comma-and-space-separated value and struct slices emit `[i]` children.
//! The resulting tree feeds the label codec and the flattener.

use serde::Serialize;
use serde_json::Value;

use crate::error::KeytreeError;
use crate::schema::{Descriptor, Field, Kind, Unit};
use crate::tree::{self, Category, Node, NodeId, Tag, Tree, join_path};

/// Encode `value` into a tree rooted at `root`.
pub fn encode<T: Serialize>(
    value: &T,
    desc: &Descriptor,
    root: &str,
) -> Result<Tree, KeytreeError> {
    let value = serde_json::to_value(value)?;
    let mut tree = Tree::new(Node::named(root));
    let root_id = tree.root();
    tree.node_mut(root_id).category = Some(Category::Struct);
    encode_fields(&mut tree, root_id, &value, desc, root, 0)?;
    Ok(tree)
}

/// Emit one child per registered field, promoting embedded fields' children
/// directly into the parent.
fn encode_fields(
    tree: &mut Tree,
    id: NodeId,
    value: &Value,
    desc: &Descriptor,
    path: &str,
    depth: usize,
) -> Result<(), KeytreeError> {
    tree::check_depth(depth, path)?;
    let Some(object) = value.as_object() else {
        return Err(KeytreeError::Unsupported {
            path: path.to_string(),
            reason: "expected an object".to_string(),
        });
    };
    for field in desc.fields() {
        if field.embedded {
            if let Kind::Struct(inner) = &field.kind {
                encode_fields(tree, id, value, inner, path, depth)?;
            }
            continue;
        }
        let Some(field_value) = object.get(field.name) else {
            continue;
        };
        encode_field(tree, id, field, field_value, path, depth)?;
    }
    Ok(())
}

fn encode_field(
    tree: &mut Tree,
    parent: NodeId,
    field: &Field,
    value: &Value,
    path: &str,
    depth: usize,
) -> Result<(), KeytreeError> {
    let name = field.key();
    let child_path = join_path(path, name, '.');
    let tag = Tag {
        allow_empty: field.allow_empty,
        hidden: field.hidden,
        description: field.doc,
    };
    if field.single.is_some() {
        return encode_single(tree, parent, field, value, tag, &child_path, depth);
    }
    encode_kind(tree, parent, name, &field.kind, value, tag, &child_path, depth)
}

#[allow(clippy::too_many_arguments)]
fn encode_kind(
    tree: &mut Tree,
    parent: NodeId,
    name: &str,
    kind: &Kind,
    value: &Value,
    tag: Tag,
    path: &str,
    depth: usize,
) -> Result<(), KeytreeError> {
    tree::check_depth(depth, path)?;
    match kind {
        Kind::Struct(desc) => {
            if value.is_null() {
                // an absent allow-empty section still round-trips its toggle
                if tag.allow_empty {
                    let node_id = push_node(tree, parent, name, Category::Struct, tag);
                    tree.node_mut(node_id).value = "false".to_string();
                }
                return Ok(());
            }
            let node_id = push_node(tree, parent, name, Category::Struct, tag);
            encode_fields(tree, node_id, value, desc, path, depth + 1)?;
            if tree.node(node_id).children.is_empty() {
                if tag.allow_empty {
                    tree.node_mut(node_id).value = "true".to_string();
                } else {
                    tree.pop_child(parent);
                }
            }
            Ok(())
        }
        Kind::Map(element) => {
            let Some(entries) = value.as_object() else {
                if value.is_null() {
                    return Ok(());
                }
                return Err(mismatch(path, "map"));
            };
            if entries.is_empty() {
                return Ok(());
            }
            let node_id = push_node(tree, parent, name, Category::Map, tag);
            // deterministic output regardless of the map's iteration order
            let mut pairs: Vec<(&String, &Value)> = entries.iter().collect();
            pairs.sort_by(|a, b| a.0.cmp(b.0));
            for (key, entry) in pairs {
                let entry_path = join_path(path, key, '.');
                encode_kind(
                    tree,
                    node_id,
                    key,
                    element.as_ref(),
                    entry,
                    Tag::default(),
                    &entry_path,
                    depth + 1,
                )?;
            }
            Ok(())
        }
        Kind::Slice(element) => {
            let Some(items) = value.as_array() else {
                if value.is_null() {
                    return Ok(());
                }
                return Err(mismatch(path, "slice"));
            };
            match element.as_ref() {
                Kind::Struct(_) => {
                    if items.is_empty() {
                        return Ok(());
                    }
                    let node_id = push_node(tree, parent, name, Category::Slice, tag);
                    for (i, item) in items.iter().enumerate() {
                        let element_name = format!("[{i}]");
                        let element_path = join_path(path, &element_name, '.');
                        encode_kind(
                            tree,
                            node_id,
                            &element_name,
                            element.as_ref(),
                            item,
                            Tag::default(),
                            &element_path,
                            depth + 1,
                        )?;
                    }
                    Ok(())
                }
                Kind::Map(_) | Kind::Slice(_) | Kind::Dynamic => Err(KeytreeError::Unsupported {
                    path: path.to_string(),
                    reason: "unsupported slice element kind".to_string(),
                }),
                scalar => {
                    let mut parts = Vec::with_capacity(items.len());
                    for item in items {
                        parts.push(scalar_text(scalar, item, path)?);
                    }
                    let node_id = push_node(tree, parent, name, Category::Slice, tag);
                    tree.node_mut(node_id).value = parts.join(", ");
                    Ok(())
                }
            }
        }
        Kind::Dynamic => {
            let Some(entries) = value.as_object() else {
                if value.is_null() {
                    return Ok(());
                }
                return Err(mismatch(path, "dynamic map"));
            };
            if entries.is_empty() {
                return Ok(());
            }
            let node_id = push_node(tree, parent, name, Category::Dynamic, tag);
            tree.node_mut(node_id).raw = Some(value.clone());
            Ok(())
        }
        scalar => {
            if value.is_null() {
                return Ok(());
            }
            let text = scalar_text(scalar, value, path)?;
            let node_id = push_node(tree, parent, name, Category::Scalar, tag);
            tree.node_mut(node_id).value = text;
            Ok(())
        }
    }
}

/// A slice collapsed onto an alias emits the element's fields as direct
/// children of the alias node; more than one element is a hard error.
fn encode_single(
    tree: &mut Tree,
    parent: NodeId,
    field: &Field,
    value: &Value,
    tag: Tag,
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
    let Some(items) = value.as_array() else {
        if value.is_null() {
            return Ok(());
        }
        return Err(mismatch(path, "slice"));
    };
    if items.len() > 1 {
        return Err(KeytreeError::SingleElement {
            path: path.to_string(),
        });
    }
    let Some(item) = items.first() else {
        return Ok(());
    };
    let node_id = push_node(tree, parent, field.key(), Category::Slice, tag);
    encode_fields(tree, node_id, item, desc, path, depth + 1)?;
    if tree.node(node_id).children.is_empty() {
        tree.pop_child(parent);
    }
    Ok(())
}

fn push_node(tree: &mut Tree, parent: NodeId, name: &str, category: Category, tag: Tag) -> NodeId {
    let mut node = Node::named(name);
    node.field_name = name.to_string();
    node.category = Some(category);
    node.tag = tag;
    tree.push(parent, node)
}

fn mismatch(path: &str, expected: &str) -> KeytreeError {
    KeytreeError::Unsupported {
        path: path.to_string(),
        reason: format!("value does not match its declared {expected} kind"),
    }
}

fn scalar_text(kind: &Kind, value: &Value, path: &str) -> Result<String, KeytreeError> {
    let bad = || mismatch(path, "scalar");
    match kind {
        Kind::String => value.as_str().map(str::to_string).ok_or_else(bad),
        Kind::Bool => value.as_bool().map(|b| b.to_string()).ok_or_else(bad),
        Kind::Int(_) => value.as_i64().map(|i| i.to_string()).ok_or_else(bad),
        Kind::UInt(_) => value.as_u64().map(|u| u.to_string()).ok_or_else(bad),
        Kind::Float(_) => value.as_f64().map(|f| format!("{f:.6}")).ok_or_else(bad),
        Kind::Duration(unit) => {
            let secs = value.get("secs").and_then(Value::as_u64).ok_or_else(bad)?;
            let nanos = value.get("nanos").and_then(Value::as_u64).ok_or_else(bad)?;
            Ok(format_duration(secs, nanos as u32, *unit))
        }
        _ => Err(bad()),
    }
}

/// Stringify a dynamic value's leaf with the same rules the encoder uses.
pub(crate) fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                format!("{:.6}", n.as_f64().unwrap_or(0.0))
            }
        }
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Canonical duration text: the bare count when the value is whole in the
/// declared unit, otherwise the largest sub-second unit that divides it
/// evenly. Every form re-decodes to the identical value.
fn format_duration(secs: u64, nanos: u32, unit: Unit) -> String {
    let total_nanos = u128::from(secs) * 1_000_000_000 + u128::from(nanos);
    match unit {
        Unit::Nanos => total_nanos.to_string(),
        Unit::Seconds => {
            if nanos == 0 {
                secs.to_string()
            } else if total_nanos % 1_000_000 == 0 {
                format!("{}ms", total_nanos / 1_000_000)
            } else if total_nanos % 1_000 == 0 {
                format!("{}us", total_nanos / 1_000)
            } else {
                format!("{total_nanos}ns")
            }
        }
    }
}

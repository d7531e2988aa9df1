//! File adapter: TOML or YAML files to trees.
//!
//! The format is selected by file extension; anything else is a hard error.
//! The parsed document is converted straight into tree form — bypassing the
//! label stage — with scalars stringified under the same rules the encoder
//! uses, so file sources and label sources meet the annotator identically.

use std::path::{Path, PathBuf};

use crate::error::KeytreeError;
use crate::tree::{self, Node, NodeId, Tree};

/// Read and decode a config file into a tree rooted at `root`.
pub fn decode_file(path: impl AsRef<Path>, root: &str) -> Result<Tree, KeytreeError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| KeytreeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    log::debug!("decoding {} as .{extension}", path.display());
    from_content(&content, &extension, path, root)
}

/// Decode in-memory config content; `extension` selects the format.
pub fn decode_content(content: &str, extension: &str, root: &str) -> Result<Tree, KeytreeError> {
    let extension = extension.to_ascii_lowercase();
    let synthetic: PathBuf = Path::new("config").with_extension(&extension);
    from_content(content, &extension, &synthetic, root)
}

fn from_content(
    content: &str,
    extension: &str,
    path: &Path,
    root: &str,
) -> Result<Tree, KeytreeError> {
    match extension {
        "toml" => {
            let table: toml::Table = content.parse().map_err(|source| KeytreeError::ParseToml {
                path: path.to_path_buf(),
                source,
            })?;
            let mut tree = Tree::new(Node::named(root));
            let root_id = tree.root();
            for (key, value) in &table {
                push_toml(&mut tree, root_id, key, value, 0)?;
            }
            Ok(tree)
        }
        "yml" | "yaml" => {
            let value: serde_yaml::Value =
                serde_yaml::from_str(content).map_err(|source| KeytreeError::ParseYaml {
                    path: path.to_path_buf(),
                    source,
                })?;
            let mut tree = Tree::new(Node::named(root));
            let root_id = tree.root();
            match value {
                serde_yaml::Value::Mapping(entries) => {
                    for (key, value) in &entries {
                        let name = yaml_key(key, root)?;
                        push_yaml(&mut tree, root_id, name, value, 0)?;
                    }
                }
                serde_yaml::Value::Null => {}
                _ => {
                    return Err(KeytreeError::Unsupported {
                        path: root.to_string(),
                        reason: "the top level must be a mapping".to_string(),
                    });
                }
            }
            Ok(tree)
        }
        _ => Err(KeytreeError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

fn push_toml(
    tree: &mut Tree,
    parent: NodeId,
    name: &str,
    value: &toml::Value,
    depth: usize,
) -> Result<(), KeytreeError> {
    tree::check_depth(depth, name)?;
    match value {
        toml::Value::Table(entries) => {
            let node = tree.push(parent, Node::named(name));
            for (key, child) in entries {
                push_toml(tree, node, key, child, depth + 1)?;
            }
        }
        toml::Value::Array(items) => {
            if items.iter().any(toml::Value::is_table) {
                let node = tree.push(parent, Node::named(name));
                for (i, item) in items.iter().enumerate() {
                    let toml::Value::Table(entries) = item else {
                        return Err(KeytreeError::Unsupported {
                            path: name.to_string(),
                            reason: "arrays cannot mix tables and scalars".to_string(),
                        });
                    };
                    let element = tree.push(node, Node::named(format!("[{i}]")));
                    for (key, child) in entries {
                        push_toml(tree, element, key, child, depth + 2)?;
                    }
                }
            } else {
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    parts.push(toml_scalar(item, name)?);
                }
                tree.push(parent, Node::leaf(name, parts.join(",")));
            }
        }
        scalar => {
            let text = toml_scalar(scalar, name)?;
            tree.push(parent, Node::leaf(name, text));
        }
    }
    Ok(())
}

fn toml_scalar(value: &toml::Value, path: &str) -> Result<String, KeytreeError> {
    match value {
        toml::Value::String(s) => Ok(s.clone()),
        toml::Value::Integer(i) => Ok(i.to_string()),
        toml::Value::Float(f) => Ok(format!("{f:.6}")),
        toml::Value::Boolean(b) => Ok(b.to_string()),
        toml::Value::Datetime(d) => Ok(d.to_string()),
        other => Err(KeytreeError::Unsupported {
            path: path.to_string(),
            reason: format!("cannot stringify a {}", other.type_str()),
        }),
    }
}

fn push_yaml(
    tree: &mut Tree,
    parent: NodeId,
    name: &str,
    value: &serde_yaml::Value,
    depth: usize,
) -> Result<(), KeytreeError> {
    tree::check_depth(depth, name)?;
    match value {
        serde_yaml::Value::Mapping(entries) => {
            let node = tree.push(parent, Node::named(name));
            for (key, child) in entries {
                let key = yaml_key(key, name)?;
                push_yaml(tree, node, key, child, depth + 1)?;
            }
        }
        serde_yaml::Value::Sequence(items) => {
            if items.iter().any(serde_yaml::Value::is_mapping) {
                let node = tree.push(parent, Node::named(name));
                for (i, item) in items.iter().enumerate() {
                    push_yaml(tree, node, &format!("[{i}]"), item, depth + 1)?;
                }
            } else {
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    parts.push(yaml_scalar(item, name)?);
                }
                tree.push(parent, Node::leaf(name, parts.join(",")));
            }
        }
        serde_yaml::Value::Tagged(tagged) => {
            push_yaml(tree, parent, name, &tagged.value, depth)?;
        }
        scalar => {
            let text = yaml_scalar(scalar, name)?;
            tree.push(parent, Node::leaf(name, text));
        }
    }
    Ok(())
}

fn yaml_key<'a>(key: &'a serde_yaml::Value, path: &str) -> Result<&'a str, KeytreeError> {
    key.as_str().ok_or_else(|| KeytreeError::Unsupported {
        path: path.to_string(),
        reason: "map keys must be strings".to_string(),
    })
}

fn yaml_scalar(value: &serde_yaml::Value, path: &str) -> Result<String, KeytreeError> {
    match value {
        serde_yaml::Value::Null => Ok(String::new()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::String(s) => Ok(s.clone()),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Ok(u.to_string())
            } else {
                Ok(format!("{:.6}", n.as_f64().unwrap_or(0.0)))
            }
        }
        _ => Err(KeytreeError::Unsupported {
            path: path.to_string(),
            reason: "cannot stringify this value".to_string(),
        }),
    }
}

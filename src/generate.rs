//! Generate: default-populate an object so every branch is representable.
//!
//! Walks the descriptor over the object's current state: optional sections
//! are materialized through their defaults hooks, empty maps get one entry
//! keyed by the placeholder token, struct slices get one representative
//! element, scalar slices become non-nil. Existing values are never
//! overwritten, which makes the pass idempotent — documentation and
//! round-trip tooling rely on that.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::KeytreeError;
use crate::merge;
use crate::schema::{Descriptor, Kind, PLACEHOLDER};
use crate::tree::{self, join_path};

/// Default-populate `target` in place.
pub fn generate<T>(target: &mut T, desc: &Descriptor) -> Result<(), KeytreeError>
where
    T: Serialize + DeserializeOwned,
{
    let current = serde_json::to_value(&*target)?;
    let generated = generate_struct(desc, current, "", 0)?;
    *target = serde_json::from_value(generated)?;
    Ok(())
}

fn generate_struct(
    desc: &Descriptor,
    current: Value,
    path: &str,
    depth: usize,
) -> Result<Value, KeytreeError> {
    tree::check_depth(depth, path)?;
    let with_defaults = if current.is_null() {
        desc.defaults_value()
    } else {
        merge::deep_merge(desc.defaults_value(), current)
    };
    let mut object = match with_defaults {
        Value::Object(entries) => entries,
        _ => Map::new(),
    };
    for field in desc.fields() {
        if field.embedded {
            if let Kind::Struct(inner) = &field.kind {
                let merged = generate_struct(inner, Value::Object(object), path, depth)?;
                object = match merged {
                    Value::Object(entries) => entries,
                    _ => Map::new(),
                };
            }
            continue;
        }
        let field_path = join_path(path, field.name, '.');
        let current_value = object.remove(field.name).unwrap_or(Value::Null);
        let generated = generate_kind(&field.kind, current_value, &field_path, depth + 1)?;
        object.insert(field.name.to_string(), generated);
    }
    Ok(Value::Object(object))
}

fn generate_kind(
    kind: &Kind,
    current: Value,
    path: &str,
    depth: usize,
) -> Result<Value, KeytreeError> {
    tree::check_depth(depth, path)?;
    match kind {
        Kind::Struct(desc) => generate_struct(desc, current, path, depth),
        Kind::Map(element) => {
            let entries = match current {
                Value::Object(entries) => entries,
                _ => Map::new(),
            };
            let mut out = Map::new();
            if entries.is_empty() {
                // a template entry so documentation always has one
                let entry_path = join_path(path, PLACEHOLDER, '.');
                out.insert(
                    PLACEHOLDER.to_string(),
                    generate_kind(element.as_ref(), Value::Null, &entry_path, depth + 1)?,
                );
            } else {
                for (key, value) in entries {
                    let entry_path = join_path(path, &key, '.');
                    let generated =
                        generate_kind(element.as_ref(), value, &entry_path, depth + 1)?;
                    out.insert(key, generated);
                }
            }
            Ok(Value::Object(out))
        }
        Kind::Slice(element) => match element.as_ref() {
            Kind::Struct(_) => {
                let items = match current {
                    Value::Array(items) => items,
                    _ => Vec::new(),
                };
                let mut out = Vec::new();
                if items.is_empty() {
                    let element_path = format!("{path}[0]");
                    out.push(generate_kind(
                        element.as_ref(),
                        Value::Null,
                        &element_path,
                        depth + 1,
                    )?);
                } else {
                    for (i, item) in items.into_iter().enumerate() {
                        let element_path = format!("{path}[{i}]");
                        out.push(generate_kind(element.as_ref(), item, &element_path, depth + 1)?);
                    }
                }
                Ok(Value::Array(out))
            }
            _ => Ok(match current {
                Value::Array(items) => Value::Array(items),
                _ => Value::Array(Vec::new()),
            }),
        },
        Kind::Dynamic => {
            let mut entries = match current {
                Value::Object(entries) => entries,
                _ => Map::new(),
            };
            if entries.is_empty() {
                entries.insert(PLACEHOLDER.to_string(), Value::String(String::new()));
            }
            Ok(Value::Object(entries))
        }
        scalar => Ok(if current.is_null() {
            scalar.zero()
        } else {
            current
        }),
    }
}

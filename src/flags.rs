//! Flag adapter: tokenize argv into a label map.
//!
//! Supports `--name=value`, `--name value`, single-dash forms, and bare
//! toggles for bool- and section-kinded flags (consulting the descriptor to
//! know which names take no value). `--` ends flag scanning. Repeated
//! occurrences of a scalar-slice flag accumulate comma-joined; scalar flags
//! are last-write-wins.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::error::KeytreeError;
use crate::schema::{Descriptor, Kind};

/// How a flag consumes tokens, derived from its kind in the descriptor.
enum FlagShape {
    /// Needs no value; bare occurrence records `"true"`.
    Toggle,
    /// Scalar-slice destination; repeats accumulate comma-joined.
    Accumulate,
    /// Everything else: one value, last write wins.
    Value,
}

/// Decode flag arguments into a label map rooted at `root`.
pub fn decode(
    args: impl IntoIterator<Item = String>,
    desc: &Descriptor,
    root: &str,
) -> Result<BTreeMap<String, String>, KeytreeError> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg == "--" {
            break;
        }
        let stripped = if let Some(name) = arg.strip_prefix("--") {
            name
        } else if let Some(name) = arg.strip_prefix('-') {
            name
        } else {
            return Err(KeytreeError::InvalidFlag {
                flag: arg.clone(),
                reason: "expected a leading '-'".to_string(),
            });
        };
        if stripped.is_empty() {
            return Err(KeytreeError::InvalidFlag {
                flag: arg.clone(),
                reason: "empty flag name".to_string(),
            });
        }

        let (name, inline_value) = match stripped.split_once('=') {
            Some((name, value)) => (name.to_string(), Some(value.to_string())),
            None => (stripped.to_string(), None),
        };
        let shape = flag_shape(desc, &name);
        let value = match inline_value {
            Some(value) => value,
            None => match shape {
                FlagShape::Toggle => "true".to_string(),
                _ => args.next().ok_or_else(|| KeytreeError::InvalidFlag {
                    flag: arg.clone(),
                    reason: "expected a value".to_string(),
                })?,
            },
        };

        let key = format!("{root}.{}", name.to_lowercase());
        match shape {
            FlagShape::Accumulate => match out.entry(key) {
                Entry::Occupied(mut occupied) => {
                    let joined = occupied.get_mut();
                    joined.push(',');
                    joined.push_str(&value);
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(value);
                }
            },
            _ => {
                out.insert(key, value);
            }
        }
    }
    Ok(out)
}

/// Walk the descriptor along a dotted flag name to learn how the flag
/// consumes tokens. Map segments match any key; unknown names fall back to
/// value-taking so annotation reports them with their full path later.
fn flag_shape(desc: &Descriptor, name: &str) -> FlagShape {
    let mut kind: Option<&Kind> = None;
    for raw in name.split('.') {
        let (segment, has_index) = match raw.find('[') {
            Some(open) => (&raw[..open], true),
            None => (raw, false),
        };
        let next = match kind {
            None => match desc.resolve(segment) {
                Some(field) => &field.kind,
                None => return FlagShape::Value,
            },
            Some(Kind::Struct(inner)) => match inner.resolve(segment) {
                Some(field) => &field.kind,
                None => return FlagShape::Value,
            },
            Some(Kind::Map(element)) => element.as_ref(),
            Some(_) => return FlagShape::Value,
        };
        kind = Some(if has_index {
            match next {
                Kind::Slice(element) => element.as_ref(),
                other => other,
            }
        } else {
            next
        });
    }
    match kind {
        Some(Kind::Bool) | Some(Kind::Struct(_)) => FlagShape::Toggle,
        Some(Kind::Slice(element)) => match element.as_ref() {
            Kind::Struct(_) => FlagShape::Value,
            _ => FlagShape::Accumulate,
        },
        _ => FlagShape::Value,
    }
}

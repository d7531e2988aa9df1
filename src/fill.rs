//! Fill: write an annotated tree into a live config struct.
//!
//! The tree is first turned into a typed JSON overlay — every leaf parsed at
//! its field's declared kind — which is then deep-merged on top of the
//! current state of the target and deserialized back. Fields the source does
//! not mention keep their current values; optional sections the source does
//! mention are materialized from their defaults hook first, so declared
//! defaults always apply before source values override them.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::KeytreeError;
use crate::merge;
use crate::schema::{Descriptor, Field, Kind, Unit};
use crate::tree::{self, Category, NodeId, Tree, join_path};

/// Fill `target` from an annotated tree.
pub fn fill<T>(target: &mut T, tree: &Tree, desc: &Descriptor) -> Result<(), KeytreeError>
where
    T: Serialize + DeserializeOwned,
{
    let root = tree.root();
    let root_node = tree.node(root);
    if root_node.children.is_empty() && root_node.raw.is_none() {
        return Ok(());
    }
    if root_node.category != Some(Category::Struct) {
        return Err(KeytreeError::InvalidRoot);
    }
    let path = root_node.name.clone();
    log::debug!("filling from {} top-level nodes", root_node.children.len());
    let overlay = struct_overlay(tree, root, desc, &path, 0)?;
    let base = serde_json::to_value(&*target)?;
    let merged = merge::deep_merge(base, overlay);
    *target = serde_json::from_value(merged)?;
    Ok(())
}

fn struct_overlay(
    tree: &Tree,
    id: NodeId,
    desc: &Descriptor,
    path: &str,
    depth: usize,
) -> Result<Value, KeytreeError> {
    tree::check_depth(depth, path)?;
    let mut overlay = Map::new();
    for &child_id in tree.children(id) {
        let child = tree.node(child_id);
        if child.disabled {
            continue;
        }
        let child_path = join_path(path, &child.name, '.');
        // re-resolved defensively; annotation already bound the name
        let Some(field) = desc.field_named(&child.field_name) else {
            return Err(KeytreeError::UnknownField {
                path: path.to_string(),
                name: child.name.clone(),
            });
        };
        let value = if field.single.is_some() {
            single_overlay(tree, child_id, field, &child_path, depth + 1)?
        } else {
            value_overlay(tree, child_id, &field.kind, field.optional, &child_path, depth + 1)?
        };
        overlay.insert(field.name.to_string(), value);
    }
    Ok(Value::Object(overlay))
}

/// Build the typed value one node contributes.
///
/// `materialize` carries pointer-allocation semantics: when a section is
/// freshly created (an optional field, a map value, a slice element), its
/// defaults hook runs before source values overlay it.
fn value_overlay(
    tree: &Tree,
    id: NodeId,
    kind: &Kind,
    materialize: bool,
    path: &str,
    depth: usize,
) -> Result<Value, KeytreeError> {
    tree::check_depth(depth, path)?;
    let node = tree.node(id);
    match kind {
        Kind::Struct(desc) => {
            if node.children.is_empty() {
                return Ok(if materialize {
                    desc.zero_value()
                } else {
                    Value::Object(Map::new())
                });
            }
            let children = struct_overlay(tree, id, desc, path, depth)?;
            if materialize {
                Ok(merge::deep_merge(desc.zero_value(), children))
            } else {
                Ok(children)
            }
        }
        Kind::Map(element) => {
            let mut entries = Map::new();
            for &child_id in &node.children {
                let child = tree.node(child_id);
                if child.disabled {
                    continue;
                }
                let child_path = join_path(path, &child.name, '.');
                let value =
                    value_overlay(tree, child_id, element.as_ref(), true, &child_path, depth + 1)?;
                // map keys are literal and case-sensitive
                entries.insert(child.name.clone(), value);
            }
            Ok(Value::Object(entries))
        }
        Kind::Dynamic => Ok(node
            .raw
            .clone()
            .unwrap_or_else(|| Value::Object(Map::new()))),
        Kind::Slice(element) => slice_overlay(tree, id, element.as_ref(), path, depth),
        scalar => parse_scalar(scalar, &node.value, path),
    }
}

fn slice_overlay(
    tree: &Tree,
    id: NodeId,
    element: &Kind,
    path: &str,
    depth: usize,
) -> Result<Value, KeytreeError> {
    let node = tree.node(id);
    match element {
        Kind::Struct(_) => {
            // children were ordered by index during annotation
            let mut items = Vec::new();
            for &child_id in &node.children {
                let child_path = join_path(path, &tree.node(child_id).name, '.');
                items.push(value_overlay(
                    tree,
                    child_id,
                    element,
                    true,
                    &child_path,
                    depth + 1,
                )?);
            }
            Ok(Value::Array(items))
        }
        _ => {
            if node.value.is_empty() {
                return Ok(Value::Array(Vec::new()));
            }
            let mut items = Vec::new();
            for token in node.value.split(',') {
                items.push(parse_scalar(element, token, path)?);
            }
            Ok(Value::Array(items))
        }
    }
}

/// A slice field collapsed onto an alias builds a one-element slice from the
/// node's children (or its single indexed group).
fn single_overlay(
    tree: &Tree,
    id: NodeId,
    field: &Field,
    path: &str,
    depth: usize,
) -> Result<Value, KeytreeError> {
    let Kind::Slice(element) = &field.kind else {
        return Err(KeytreeError::Unsupported {
            path: path.to_string(),
            reason: "a single-element alias requires a slice field".to_string(),
        });
    };
    let node = tree.node(id);
    if node.children.is_empty() {
        return Ok(Value::Array(Vec::new()));
    }
    let indexed = node
        .children
        .iter()
        .all(|&c| tree::is_index_name(&tree.node(c).name));
    let element_value = if indexed {
        // annotation guarantees at most one group here
        let group = node.children[0];
        let group_path = join_path(path, &tree.node(group).name, '.');
        value_overlay(tree, group, element.as_ref(), true, &group_path, depth + 1)?
    } else {
        value_overlay(tree, id, element.as_ref(), true, path, depth)?
    };
    Ok(Value::Array(vec![element_value]))
}

fn parse_scalar(kind: &Kind, raw: &str, path: &str) -> Result<Value, KeytreeError> {
    let parse_err = |expected: &'static str| KeytreeError::Parse {
        path: path.to_string(),
        value: raw.to_string(),
        expected,
    };
    match kind {
        Kind::String => Ok(Value::String(raw.to_string())),
        Kind::Bool => match raw {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(parse_err("bool")),
        },
        Kind::Int(bits) => {
            let token = raw.trim();
            let value = match bits {
                8 => token.parse::<i8>().map(i64::from),
                16 => token.parse::<i16>().map(i64::from),
                32 => token.parse::<i32>().map(i64::from),
                _ => token.parse::<i64>(),
            }
            .map_err(|_| parse_err("integer"))?;
            Ok(Value::from(value))
        }
        Kind::UInt(bits) => {
            let token = raw.trim();
            let value = match bits {
                8 => token.parse::<u8>().map(u64::from),
                16 => token.parse::<u16>().map(u64::from),
                32 => token.parse::<u32>().map(u64::from),
                _ => token.parse::<u64>(),
            }
            .map_err(|_| parse_err("unsigned integer"))?;
            Ok(Value::from(value))
        }
        Kind::Float(bits) => {
            let token = raw.trim();
            let value = if *bits == 32 {
                token.parse::<f32>().map(f64::from)
            } else {
                token.parse::<f64>()
            }
            .map_err(|_| parse_err("float"))?;
            serde_json::Number::from_f64(value)
                .map(Value::Number)
                .ok_or_else(|| parse_err("float"))
        }
        Kind::Duration(unit) => {
            let token = raw.trim();
            let duration = if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
                // a bare integer counts in the field's declared unit
                let count = token.parse::<u64>().map_err(|_| parse_err("duration"))?;
                match unit {
                    Unit::Seconds => Duration::from_secs(count),
                    Unit::Nanos => Duration::from_nanos(count),
                }
            } else {
                parse_duration(token).ok_or_else(|| parse_err("duration"))?
            };
            Ok(serde_json::json!({
                "secs": duration.as_secs(),
                "nanos": duration.subsec_nanos(),
            }))
        }
        _ => Err(KeytreeError::Unsupported {
            path: path.to_string(),
            reason: "expected a scalar kind".to_string(),
        }),
    }
}

/// Parse a unit-suffixed duration like `1h30m`, `250ms` or `1.5s`.
fn parse_duration(input: &str) -> Option<Duration> {
    if input.is_empty() {
        return None;
    }
    let mut total_nanos: u128 = 0;
    let mut rest = input;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(rest.len());
        if number_end == 0 {
            return None;
        }
        let (number, tail) = rest.split_at(number_end);
        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_end);
        let scale: u128 = match unit {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60_000_000_000,
            "h" => 3_600_000_000_000,
            _ => return None,
        };
        if number.contains('.') {
            let value: f64 = number.parse().ok()?;
            total_nanos += (value * scale as f64) as u128;
        } else {
            let value: u128 = number.parse().ok()?;
            total_nanos += value.checked_mul(scale)?;
        }
        rest = next;
    }
    u64::try_from(total_nanos).ok().map(Duration::from_nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::annotate;
    use crate::label;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    fn decode(pairs: &[(&str, &str)]) -> Tree {
        let labels: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        label::decode(labels, "app", &[]).unwrap()
    }

    fn fill_from<T>(target: &mut T, desc: &Descriptor, pairs: &[(&str, &str)])
    where
        T: Serialize + DeserializeOwned,
    {
        let mut tree = decode(pairs);
        annotate(&mut tree, desc).unwrap();
        fill(target, &tree, desc).unwrap();
    }

    fn fill_err<T>(target: &mut T, desc: &Descriptor, pairs: &[(&str, &str)]) -> KeytreeError
    where
        T: Serialize + DeserializeOwned,
    {
        let mut tree = decode(pairs);
        match annotate(&mut tree, desc) {
            Err(err) => err,
            Ok(()) => fill(target, &tree, desc).unwrap_err(),
        }
    }

    #[derive(Serialize, Deserialize, Default, Debug, PartialEq)]
    struct Tls {
        min_version: String,
        cert: String,
    }

    impl Tls {
        fn schema() -> Descriptor {
            Descriptor::new()
                .field(Field::new("min_version", Kind::String))
                .field(Field::new("cert", Kind::String))
                .defaults(tls_defaults)
        }
    }

    fn tls_defaults() -> Value {
        serde_json::json!({ "min_version": "1.2", "cert": "" })
    }

    #[derive(Serialize, Deserialize, Default, Debug, PartialEq)]
    struct App {
        name: String,
        region: String,
        zone: String,
        tls: Option<Tls>,
    }

    impl App {
        fn schema() -> Descriptor {
            Descriptor::new()
                .field(Field::new("name", Kind::String))
                .field(Field::new("region", Kind::String))
                .field(Field::new("zone", Kind::String))
                .field(Field::new("tls", Kind::Struct(Tls::schema())).optional())
        }
    }

    #[test]
    fn defaults_apply_then_source_overrides() {
        // a bare section toggle materializes the section with its defaults,
        // while untouched fields keep their current values
        let mut app = App::default();
        fill_from(
            &mut app,
            &App::schema(),
            &[("app.name", "bar"), ("app.region", "bir"), ("app.tls", "true")],
        );
        assert_eq!(app.name, "bar");
        assert_eq!(app.region, "bir");
        assert_eq!(app.zone, "");
        assert_eq!(
            app.tls,
            Some(Tls {
                min_version: "1.2".into(),
                cert: String::new(),
            })
        );
    }

    #[test]
    fn source_values_override_section_defaults() {
        let mut app = App::default();
        fill_from(&mut app, &App::schema(), &[("app.tls.min_version", "1.3")]);
        let tls = app.tls.unwrap();
        assert_eq!(tls.min_version, "1.3");
        assert_eq!(tls.cert, "");
    }

    #[test]
    fn unmentioned_optional_section_stays_none() {
        let mut app = App::default();
        fill_from(&mut app, &App::schema(), &[("app.name", "x")]);
        assert_eq!(app.tls, None);
    }

    #[test]
    fn disabled_section_is_skipped_even_with_children() {
        let desc = Descriptor::new()
            .field(Field::new("tls", Kind::Struct(Tls::schema())).optional().allow_empty());
        #[derive(Serialize, Deserialize, Default)]
        struct Holder {
            tls: Option<Tls>,
        }
        let mut holder = Holder::default();
        fill_from(
            &mut holder,
            &desc,
            &[("app.tls", "false"), ("app.tls.min_version", "1.3")],
        );
        assert!(holder.tls.is_none());
    }

    #[derive(Serialize, Deserialize, Default, Debug, PartialEq)]
    struct Server {
        host: String,
    }

    fn server_schema() -> Descriptor {
        Descriptor::new().field(Field::new("host", Kind::String))
    }

    #[test]
    fn indexed_labels_build_a_slice_in_index_order() {
        #[derive(Serialize, Deserialize, Default, Debug, PartialEq)]
        struct Cluster {
            servers: Vec<Server>,
        }
        let desc = Descriptor::new().field(Field::new(
            "servers",
            Kind::slice(Kind::Struct(server_schema())),
        ));
        let mut cluster = Cluster::default();
        fill_from(
            &mut cluster,
            &desc,
            &[("app.servers[1].host", "b"), ("app.servers[0].host", "a")],
        );
        assert_eq!(
            cluster.servers,
            vec![Server { host: "a".into() }, Server { host: "b".into() }]
        );
    }

    #[test]
    fn dynamic_map_is_copied_verbatim() {
        #[derive(Serialize, Deserialize, Default, Debug, PartialEq)]
        struct Holder {
            metadata: serde_json::Map<String, Value>,
        }
        let desc = Descriptor::new().field(Field::new("metadata", Kind::Dynamic));
        let mut holder = Holder::default();
        fill_from(
            &mut holder,
            &desc,
            &[("app.metadata.aaa", "x"), ("app.metadata.bbb.ccc", "y")],
        );
        let expected: serde_json::Map<String, Value> =
            serde_json::from_value(serde_json::json!({ "aaa": "x", "bbb": { "ccc": "y" } }))
                .unwrap();
        assert_eq!(holder.metadata, expected);
    }

    #[test]
    fn comma_split_scalar_slice() {
        #[derive(Serialize, Deserialize, Default, Debug, PartialEq)]
        struct Holder {
            tags: Vec<String>,
        }
        let desc = Descriptor::new().field(Field::new("tags", Kind::slice(Kind::String)));
        let mut holder = Holder::default();
        fill_from(&mut holder, &desc, &[("app.tags", "foo,bar")]);
        assert_eq!(holder.tags, vec!["foo".to_string(), "bar".to_string()]);
    }

    #[test]
    fn string_tokens_are_not_trimmed() {
        #[derive(Serialize, Deserialize, Default)]
        struct Holder {
            tags: Vec<String>,
        }
        let desc = Descriptor::new().field(Field::new("tags", Kind::slice(Kind::String)));
        let mut holder = Holder::default();
        fill_from(&mut holder, &desc, &[("app.tags", "foo, bar")]);
        assert_eq!(holder.tags, vec!["foo".to_string(), " bar".to_string()]);
    }

    #[test]
    fn numeric_slice_tokens_are_trimmed() {
        #[derive(Serialize, Deserialize, Default)]
        struct Holder {
            weights: Vec<u32>,
        }
        let desc = Descriptor::new().field(Field::new("weights", Kind::slice(Kind::UInt(32))));
        let mut holder = Holder::default();
        fill_from(&mut holder, &desc, &[("app.weights", "1, 2, 3")]);
        assert_eq!(holder.weights, vec![1, 2, 3]);
    }

    #[test]
    fn empty_value_yields_empty_slice() {
        #[derive(Serialize, Deserialize, Default)]
        struct Holder {
            tags: Vec<String>,
        }
        let desc = Descriptor::new().field(Field::new("tags", Kind::slice(Kind::String)));
        let mut holder = Holder {
            tags: vec!["old".into()],
        };
        fill_from(&mut holder, &desc, &[("app.tags", "")]);
        assert!(holder.tags.is_empty());
    }

    #[test]
    fn map_entries_use_literal_keys() {
        #[derive(Serialize, Deserialize, Default)]
        struct Holder {
            servers: BTreeMap<String, Server>,
        }
        let desc = Descriptor::new().field(Field::new(
            "servers",
            Kind::map(Kind::Struct(server_schema())),
        ));
        let mut holder = Holder::default();
        fill_from(&mut holder, &desc, &[("app.servers.Primary.host", "a")]);
        assert!(holder.servers.contains_key("Primary"));
        assert_eq!(holder.servers["Primary"].host, "a");
    }

    #[test]
    fn aliased_single_element_slice() {
        #[derive(Serialize, Deserialize, Default, Debug, PartialEq)]
        struct Rule {
            from: String,
            to: String,
        }
        #[derive(Serialize, Deserialize, Default, Debug, PartialEq)]
        struct Holder {
            redirections: Vec<Rule>,
        }
        let rule = Descriptor::new()
            .field(Field::new("from", Kind::String))
            .field(Field::new("to", Kind::String));
        let desc = Descriptor::new().field(
            Field::new("redirections", Kind::slice(Kind::Struct(rule))).single("redirect"),
        );
        let mut holder = Holder::default();
        fill_from(
            &mut holder,
            &desc,
            &[("app.redirect.from", "http"), ("app.redirect.to", "https")],
        );
        assert_eq!(
            holder.redirections,
            vec![Rule {
                from: "http".into(),
                to: "https".into(),
            }]
        );
    }

    #[test]
    fn integer_width_is_enforced() {
        #[derive(Serialize, Deserialize, Default)]
        struct Holder {
            small: u8,
        }
        let desc = Descriptor::new().field(Field::new("small", Kind::UInt(8)));
        let mut holder = Holder::default();
        let err = fill_err(&mut holder, &desc, &[("app.small", "300")]);
        assert!(matches!(err, KeytreeError::Parse { .. }));
    }

    #[test]
    fn strict_bool_parse() {
        #[derive(Serialize, Deserialize, Default)]
        struct Holder {
            debug: bool,
        }
        let desc = Descriptor::new().field(Field::new("debug", Kind::Bool));
        let mut holder = Holder::default();
        let err = fill_err(&mut holder, &desc, &[("app.debug", "yes")]);
        assert!(matches!(err, KeytreeError::Parse { expected: "bool", .. }));
    }

    #[test]
    fn embedded_fields_fill_inline() {
        #[derive(Serialize, Deserialize, Default, Debug, PartialEq)]
        struct Common {
            level: String,
        }
        #[derive(Serialize, Deserialize, Default, Debug, PartialEq)]
        struct Holder {
            #[serde(flatten)]
            common: Common,
            host: String,
        }
        let common = Descriptor::new().field(Field::new("level", Kind::String));
        let desc = Descriptor::new()
            .field(Field::new("common", Kind::Struct(common)).embedded())
            .field(Field::new("host", Kind::String));
        let mut holder = Holder::default();
        fill_from(
            &mut holder,
            &desc,
            &[("app.level", "info"), ("app.host", "h")],
        );
        assert_eq!(holder.common.level, "info");
        assert_eq!(holder.host, "h");
    }

    // -- durations ---------------------------------------------------------

    #[derive(Serialize, Deserialize, Default)]
    struct Timed {
        wait: Duration,
    }

    fn timed_schema(unit: Unit) -> Descriptor {
        Descriptor::new().field(Field::new("wait", Kind::Duration(unit)))
    }

    #[test]
    fn bare_integer_uses_declared_unit() {
        let mut timed = Timed::default();
        fill_from(&mut timed, &timed_schema(Unit::Seconds), &[("app.wait", "30")]);
        assert_eq!(timed.wait, Duration::from_secs(30));

        let mut timed = Timed::default();
        fill_from(&mut timed, &timed_schema(Unit::Nanos), &[("app.wait", "30")]);
        assert_eq!(timed.wait, Duration::from_nanos(30));
    }

    #[test]
    fn suffixed_durations_parse() {
        let cases = [
            ("250ms", Duration::from_millis(250)),
            ("1h30m", Duration::from_secs(5400)),
            ("1.5s", Duration::from_millis(1500)),
            ("10us", Duration::from_micros(10)),
            ("7ns", Duration::from_nanos(7)),
        ];
        for (input, expected) in cases {
            let mut timed = Timed::default();
            fill_from(&mut timed, &timed_schema(Unit::Seconds), &[("app.wait", input)]);
            assert_eq!(timed.wait, expected, "input {input}");
        }
    }

    #[test]
    fn garbage_duration_is_a_parse_error() {
        let mut timed = Timed::default();
        let err = fill_err(&mut timed, &timed_schema(Unit::Seconds), &[("app.wait", "soon")]);
        assert!(matches!(err, KeytreeError::Parse { expected: "duration", .. }));
    }

    #[test]
    fn unannotated_tree_is_rejected() {
        let mut app = App::default();
        let tree = decode(&[("app.name", "x")]);
        let err = fill(&mut app, &tree, &App::schema()).unwrap_err();
        assert!(matches!(err, KeytreeError::InvalidRoot));
    }

    #[test]
    fn empty_tree_is_a_no_op() {
        let mut app = App {
            name: "keep".into(),
            ..App::default()
        };
        let mut tree = Tree::new(crate::tree::Node::named("app"));
        annotate(&mut tree, &App::schema()).unwrap();
        fill(&mut app, &tree, &App::schema()).unwrap();
        assert_eq!(app.name, "keep");
    }
}

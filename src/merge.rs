use serde_json::{Map, Value};

/// Deep-merge `overlay` on top of `base`.
/// If both sides have an object for the same key, recurse.
/// Otherwise, `overlay`'s value wins.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(base_obj), Value::Object(overlay_obj)) => {
            Value::Object(merge_objects(base_obj, overlay_obj))
        }
        (_, overlay) => overlay,
    }
}

pub fn merge_objects(
    mut base: Map<String, Value>,
    overlay: Map<String, Value>,
) -> Map<String, Value> {
    for (key, overlay_val) in overlay {
        match (base.remove(&key), overlay_val) {
            (Some(Value::Object(base_obj)), Value::Object(overlay_obj)) => {
                base.insert(key, Value::Object(merge_objects(base_obj, overlay_obj)));
            }
            (_, overlay_val) => {
                base.insert(key, overlay_val);
            }
        }
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn disjoint_keys_merge() {
        let merged = deep_merge(json!({"host": "localhost"}), json!({"port": 3000}));
        assert_eq!(merged, json!({"host": "localhost", "port": 3000}));
    }

    #[test]
    fn same_scalar_key_overlay_wins() {
        let merged = deep_merge(json!({"port": 8080}), json!({"port": 3000}));
        assert_eq!(merged, json!({"port": 3000}));
    }

    #[test]
    fn nested_objects_recurse() {
        let base = json!({"database": {"url": "postgres://old", "pool_size": 5}});
        let overlay = json!({"database": {"pool_size": 20}});
        let merged = deep_merge(base, overlay);
        assert_eq!(
            merged,
            json!({"database": {"url": "postgres://old", "pool_size": 20}})
        );
    }

    #[test]
    fn overlay_scalar_replaces_object() {
        let base = json!({"database": {"url": "x"}});
        let overlay = json!({"database": "flat_string"});
        assert_eq!(deep_merge(base, overlay), json!({"database": "flat_string"}));
    }

    #[test]
    fn overlay_object_replaces_null() {
        let base = json!({"tls": null});
        let overlay = json!({"tls": {"cert": "/etc/cert.pem"}});
        assert_eq!(
            deep_merge(base, overlay),
            json!({"tls": {"cert": "/etc/cert.pem"}})
        );
    }

    #[test]
    fn empty_overlay_returns_base() {
        let base = json!({"port": 8080});
        assert_eq!(deep_merge(base.clone(), json!({})), base);
    }

    #[test]
    fn arrays_are_replaced_not_merged() {
        let base = json!({"tags": ["a", "b", "c"]});
        let overlay = json!({"tags": ["d"]});
        assert_eq!(deep_merge(base, overlay), json!({"tags": ["d"]}));
    }

    #[test]
    fn deeply_nested_three_levels() {
        let base = json!({"a": {"b": {"c": {"val": 1, "other": "keep"}}}});
        let overlay = json!({"a": {"b": {"c": {"val": 99}}}});
        let merged = deep_merge(base, overlay);
        assert_eq!(merged, json!({"a": {"b": {"c": {"val": 99, "other": "keep"}}}}));
    }
}

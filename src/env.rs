//! Env adapter: prefixed environment variables to a label map.
//!
//! Variables matching the prefix (case-insensitively) are stripped of it,
//! lower-cased, and their underscore-delimited segments become dot path
//! segments one-for-one. Values pass through untouched — typing happens
//! later, against the descriptor.
//!
//! Takes an iterator so tests can pass synthetic data instead of
//! `std::env::vars()`.

use std::collections::BTreeMap;

/// Build a label map rooted at `root` from variables matching `prefix`.
///
/// The prefix includes its trailing separator, e.g. `"MYAPP_"`.
pub fn decode(
    vars: impl IntoIterator<Item = (String, String)>,
    prefix: &str,
    root: &str,
) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for (key, value) in vars {
        let Some(rest) = strip_prefix_ci(&key, prefix) else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }
        let segments: Vec<String> = rest.split('_').map(str::to_lowercase).collect();
        if segments.iter().any(String::is_empty) {
            continue;
        }
        out.insert(format!("{root}.{}", segments.join(".")), value);
    }
    out
}

fn strip_prefix_ci<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    let head = key.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&key[prefix.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn simple_key() {
        let out = decode(vars(&[("MYAPP_HOST", "0.0.0.0")]), "MYAPP_", "app");
        assert_eq!(out["app.host"], "0.0.0.0");
    }

    #[test]
    fn underscores_become_dots() {
        let out = decode(vars(&[("MYAPP_DATABASE_URL", "pg://db")]), "MYAPP_", "app");
        assert_eq!(out["app.database.url"], "pg://db");
    }

    #[test]
    fn segments_are_lowercased() {
        let out = decode(vars(&[("MYAPP_TLS_CERT", "/c")]), "MYAPP_", "app");
        assert_eq!(out["app.tls.cert"], "/c");
    }

    #[test]
    fn prefix_matches_case_insensitively() {
        let out = decode(vars(&[("myapp_host", "x")]), "MYAPP_", "app");
        assert_eq!(out["app.host"], "x");
    }

    #[test]
    fn values_pass_through_untouched() {
        let out = decode(vars(&[("MYAPP_RATE", "1.5")]), "MYAPP_", "app");
        assert_eq!(out["app.rate"], "1.5");
    }

    #[test]
    fn non_matching_prefix_ignored() {
        let out = decode(vars(&[("OTHER_HOST", "x")]), "MYAPP_", "app");
        assert!(out.is_empty());
    }

    #[test]
    fn bare_prefix_ignored() {
        let out = decode(vars(&[("MYAPP_", "x")]), "MYAPP_", "app");
        assert!(out.is_empty());
    }

    #[test]
    fn double_underscore_ignored() {
        let out = decode(vars(&[("MYAPP_A__B", "x")]), "MYAPP_", "app");
        assert!(out.is_empty());
    }

    #[test]
    fn multiple_vars_combined() {
        let out = decode(
            vars(&[
                ("APP_HOST", "0.0.0.0"),
                ("APP_PORT", "3000"),
                ("APP_DATABASE_URL", "pg://"),
            ]),
            "APP_",
            "app",
        );
        assert_eq!(out.len(), 3);
        assert_eq!(out["app.host"], "0.0.0.0");
        assert_eq!(out["app.port"], "3000");
        assert_eq!(out["app.database.url"], "pg://");
    }
}

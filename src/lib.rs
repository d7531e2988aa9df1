//! Bidirectional mapping between flat configuration sources and nested,
//! strongly typed config structs. Register a schema, point at your sources,
//! and go.
//!
//! Keytree converts between the flat textual representations configuration
//! actually arrives in — CLI flags, prefixed environment variables, dotted
//! label maps (container/orchestrator metadata), TOML/YAML files — and a
//! nested Rust struct, in both directions.
//!
//! ```ignore
//! let mut config = ServerConfig::default();
//! keytree::from_env(&mut config, std::env::vars(), "MYAPP_", "app")?;
//! keytree::from_flags(&mut config, std::env::args().skip(1), "app")?;
//! ```
//!
//! # The tree pivot
//!
//! Every source funnels through one intermediate representation: a [`Tree`]
//! of nodes, one per configuration key. Flags and env vars become a label
//! map (`app.db.pool = "5"` style dotted paths) and the label codec builds
//! the tree; files parse straight into tree form. The pipeline is then the
//! same for every source:
//!
//! ```text
//! flags ─┐
//! env  ──┤→ label map → ┐
//! labels ┘              ├→ Tree → annotate → fill → &mut T
//! files ────────────────┘
//! ```
//!
//! [`annotate`](annotate::annotate) binds each node to the schema — resolves
//! field names case-insensitively, records shape categories and tag markers,
//! rejects unknown keys and malformed shapes. [`fill`](fill::fill) parses
//! every leaf at its field's declared kind and merges the result onto the
//! target's current state: keys the source does not mention keep their
//! values, and optional sections the source mentions are materialized from
//! their defaults hook before source values override them.
//!
//! The reverse path serves documentation and export:
//! [`encode`](encode::encode) walks a live struct into a stringified tree,
//! [`label::encode`] flattens it back to a label map, and
//! [`flatten`](flat::flatten) projects it into sorted
//! `(path, description, default)` rows for help screens and reference docs.
//! [`generate`](generate::generate) default-populates an object first so
//! every branch — including one template entry per map, keyed by
//! [`PLACEHOLDER`] — is representable in that output.
//!
//! # Schema descriptors
//!
//! There is no reflection: each config type registers a [`Descriptor`]
//! describing its surface, built once per type as plain data.
//!
//! ```ignore
//! impl Schema for ServerConfig {
//!     fn schema() -> Descriptor {
//!         Descriptor::new()
//!             .field(Field::new("host", Kind::String).doc("Bind address."))
//!             .field(Field::new("port", Kind::UInt(16)).doc("Bind port."))
//!             .field(
//!                 Field::new("tls", Kind::Struct(TlsConfig::schema()))
//!                     .optional()
//!                     .allow_empty()
//!                     .doc("TLS settings."),
//!             )
//!     }
//! }
//! ```
//!
//! The descriptor decides how leaves parse (integer widths, strict bools,
//! duration units), which names toggle bare on the command line, what the
//! generated documentation says, and which fields are off-limits — a field
//! you do not register is invisible to every direction of the engine and
//! survives fills untouched.
//!
//! Markers worth knowing:
//!
//! - **`optional()`** — the Rust field is an `Option`; it stays `None`
//!   until a source mentions it, at which point the section's defaults hook
//!   runs first and source values overlay it.
//! - **`allow_empty()`** — the section may appear with zero children, gated
//!   by a boolean toggle leaf. A `"false"` toggle disables the whole
//!   subtree even if children are present.
//! - **`embedded()`** — a `#[serde(flatten)]` struct whose fields are
//!   addressed as if they were the parent's.
//! - **`single(alias)`** — legacy aliasing of a one-element struct slice
//!   onto another key; more than one element is a hard error.
//! - **`hidden()`** — excluded from flattened documentation output.
//! - **[`Kind::Dynamic`]** — the untyped escape hatch: the subtree is
//!   carried verbatim into a `serde_json::Map` field, no questions asked.
//!
//! # Sources
//!
//! | Source | Syntax | Entry point |
//! |--------|--------|-------------|
//! | Flags | `--db.pool=5`, `--db.pool 5`, bare toggles, `--` ends | [`from_flags`] |
//! | Env | `MYAPP_DB_POOL=5`, `_` nests, lowercased | [`from_env`] |
//! | Labels | `app.db.pool = "5"` map entries | [`from_labels`] |
//! | Files | TOML or YAML by extension | [`from_file`] |
//!
//! Each one-call helper composes the module-level pieces; use those directly
//! when you need the tree in between.
//!
//! # Error handling
//!
//! All fallible operations return [`KeytreeError`]. Errors carry the full
//! dotted path they occurred at and abort the call; nothing is retried and
//! nothing is partially applied on the error path. Falling back to another
//! source is the caller's decision.
//!
//! # Concurrency
//!
//! Everything here is synchronous and allocation-local: each call builds its
//! own private tree and touches only the object you hand it. Calls on
//! different objects need no locking; calls on the same object must be
//! serialized by the caller. Object graphs are trees — cycles are a caller
//! bug the engine does not detect (walks are depth-bounded, so a cycle
//! surfaces as a depth error rather than a hang).

pub mod annotate;
pub mod encode;
pub mod env;
pub mod error;
pub mod file;
pub mod fill;
pub mod flags;
pub mod flat;
pub mod generate;
pub mod label;
pub(crate) mod merge;
pub mod schema;
pub mod tree;

#[cfg(test)]
mod fixtures;

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

pub use error::KeytreeError;
pub use flat::{Case, FlatEntry, FlatOpts};
pub use schema::{Descriptor, Field, Kind, PLACEHOLDER, Schema, Unit, defaults_of};
pub use tree::{Category, Node, NodeId, Tag, Tree};

/// Fill `target` from a label map.
pub fn from_labels<T>(
    target: &mut T,
    labels: impl IntoIterator<Item = (String, String)>,
    root: &str,
    filters: &[&str],
) -> Result<(), KeytreeError>
where
    T: Schema + Serialize + DeserializeOwned,
{
    let desc = T::schema();
    let mut tree = label::decode(labels, root, filters)?;
    annotate::annotate(&mut tree, &desc)?;
    fill::fill(target, &tree, &desc)
}

/// Fill `target` from command-line arguments (without the program name).
pub fn from_flags<T>(
    target: &mut T,
    args: impl IntoIterator<Item = String>,
    root: &str,
) -> Result<(), KeytreeError>
where
    T: Schema + Serialize + DeserializeOwned,
{
    let desc = T::schema();
    let labels = flags::decode(args, &desc, root)?;
    let mut tree = label::decode(labels, root, &[])?;
    annotate::annotate(&mut tree, &desc)?;
    fill::fill(target, &tree, &desc)
}

/// Fill `target` from environment variables matching `prefix`.
pub fn from_env<T>(
    target: &mut T,
    vars: impl IntoIterator<Item = (String, String)>,
    prefix: &str,
    root: &str,
) -> Result<(), KeytreeError>
where
    T: Schema + Serialize + DeserializeOwned,
{
    let labels = env::decode(vars, prefix, root);
    from_labels(target, labels, root, &[])
}

/// Fill `target` from a TOML or YAML file, selected by extension.
pub fn from_file<T>(target: &mut T, path: impl AsRef<Path>, root: &str) -> Result<(), KeytreeError>
where
    T: Schema + Serialize + DeserializeOwned,
{
    let desc = T::schema();
    let mut tree = file::decode_file(path, root)?;
    annotate::annotate(&mut tree, &desc)?;
    fill::fill(target, &tree, &desc)
}

/// Encode `value` into a flat label map rooted at `root`.
pub fn to_labels<T>(value: &T, root: &str) -> Result<BTreeMap<String, String>, KeytreeError>
where
    T: Schema + Serialize,
{
    let tree = encode::encode(value, &T::schema(), root)?;
    Ok(label::encode(&tree))
}

//! Per-type schema descriptors.
//!
//! A [`Descriptor`] is the explicit registration of a config struct's
//! surface: one [`Field`] per configurable field, each carrying a [`Kind`],
//! documentation, and decode-time markers. Descriptors are what the rest of
//! the engine walks instead of reflecting over live types — annotation binds
//! source trees to them, the filler and encoder parse and stringify by them,
//! and the flattener reads documentation from them.
//!
//! Registration is plain data, built once per type:
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
//!                     .doc("TLS settings."),
//!             )
//!     }
//! }
//! ```

use serde::Serialize;
use serde_json::{Map, Value};

use crate::tree::Category;

/// Literal token standing in for a dynamic map key in generated defaults
/// and documentation output.
pub const PLACEHOLDER: &str = "<key>";

/// Unit a bare integer is read in for a duration field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    /// Human-scale durations: a bare `30` means thirty seconds.
    Seconds,
    /// Machine-scale durations: a bare `30` means thirty nanoseconds.
    Nanos,
}

/// The closed set of shapes the engine can bind a field to.
///
/// Integer and float kinds carry the bit width the source value must fit;
/// parsing happens at that width, not at the widest type.
#[derive(Debug, Clone)]
pub enum Kind {
    String,
    Bool,
    /// Signed integer of the given bit width (8, 16, 32 or 64).
    Int(u8),
    /// Unsigned integer of the given bit width (8, 16, 32 or 64).
    UInt(u8),
    /// Float of the given bit width (32 or 64).
    Float(u8),
    /// A `std::time::Duration` field, with the unit bare integers are read in.
    Duration(Unit),
    /// A nested configuration struct.
    Struct(Descriptor),
    /// A string-keyed map of the given element kind.
    Map(Box<Kind>),
    /// A sequence of the given element kind.
    Slice(Box<Kind>),
    /// Fully dynamic `map[string] -> anything` escape hatch. Decoding stops
    /// at this boundary and the subtree is carried verbatim.
    Dynamic,
}

impl Kind {
    pub fn map(element: Kind) -> Kind {
        Kind::Map(Box::new(element))
    }

    pub fn slice(element: Kind) -> Kind {
        Kind::Slice(Box::new(element))
    }

    pub fn category(&self) -> Category {
        match self {
            Kind::Struct(_) => Category::Struct,
            Kind::Map(_) => Category::Map,
            Kind::Slice(_) => Category::Slice,
            Kind::Dynamic => Category::Dynamic,
            _ => Category::Scalar,
        }
    }

    /// The value a freshly materialized field of this kind starts from.
    pub(crate) fn zero(&self) -> Value {
        match self {
            Kind::String => Value::String(String::new()),
            Kind::Bool => Value::Bool(false),
            Kind::Int(_) => Value::from(0i64),
            Kind::UInt(_) => Value::from(0u64),
            Kind::Float(_) => Value::from(0.0f64),
            Kind::Duration(_) => serde_json::json!({ "secs": 0, "nanos": 0 }),
            Kind::Struct(d) => d.zero_value(),
            Kind::Map(_) | Kind::Dynamic => Value::Object(Map::new()),
            Kind::Slice(_) => Value::Array(Vec::new()),
        }
    }
}

/// One registered field of a config struct.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: &'static str,
    pub kind: Kind,
    pub doc: &'static str,
    /// The Rust field is an `Option`; the filler materializes it (defaults
    /// first) only when the source mentions it.
    pub optional: bool,
    /// The field may legitimately appear with zero children, gated by an
    /// explicit boolean toggle leaf.
    pub allow_empty: bool,
    /// Excluded from flattened documentation output.
    pub hidden: bool,
    /// A `#[serde(flatten)]` struct whose fields are addressed as if they
    /// were the parent's.
    pub embedded: bool,
    /// Alias exposing a one-element struct slice under another name, with
    /// the element's fields as direct children. At most one element.
    pub single: Option<&'static str>,
}

impl Field {
    pub fn new(name: &'static str, kind: Kind) -> Self {
        Field {
            name,
            kind,
            doc: "",
            optional: false,
            allow_empty: false,
            hidden: false,
            embedded: false,
            single: None,
        }
    }

    pub fn doc(mut self, doc: &'static str) -> Self {
        self.doc = doc;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn allow_empty(mut self) -> Self {
        self.allow_empty = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn embedded(mut self) -> Self {
        self.embedded = true;
        self
    }

    pub fn single(mut self, alias: &'static str) -> Self {
        self.single = Some(alias);
        self
    }

    /// The name this field answers to in sources.
    pub fn key(&self) -> &'static str {
        self.single.unwrap_or(self.name)
    }
}

/// The registered surface of one config struct.
#[derive(Debug, Clone, Default)]
pub struct Descriptor {
    fields: Vec<Field>,
    defaults: Option<fn() -> Value>,
}

impl Descriptor {
    pub fn new() -> Self {
        Descriptor::default()
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Register the default-construction hook invoked when this struct is
    /// materialized behind an `Option` or as a fresh map/slice element.
    /// Usually [`defaults_of`].
    pub fn defaults(mut self, hook: fn() -> Value) -> Self {
        self.defaults = Some(hook);
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub(crate) fn defaults_value(&self) -> Value {
        match self.defaults {
            Some(hook) => hook(),
            None => Value::Object(Map::new()),
        }
    }

    /// The complete value a freshly materialized instance starts from:
    /// every registered field at its kind's zero, with the defaults hook
    /// merged on top. Sparse source overlays merge onto this, mirroring
    /// zero-then-fill allocation.
    pub(crate) fn zero_value(&self) -> Value {
        let mut object = Map::new();
        for field in &self.fields {
            if field.embedded {
                if let Kind::Struct(inner) = &field.kind
                    && let Value::Object(entries) = inner.zero_value()
                {
                    for (key, value) in entries {
                        object.insert(key, value);
                    }
                }
                continue;
            }
            let value = if field.optional {
                Value::Null
            } else {
                field.kind.zero()
            };
            object.insert(field.name.to_string(), value);
        }
        crate::merge::deep_merge(Value::Object(object), self.defaults_value())
    }

    /// Case-insensitive lookup by source key, honoring aliases and
    /// descending into embedded fields transparently.
    pub fn resolve(&self, name: &str) -> Option<&Field> {
        for field in &self.fields {
            if field.key().eq_ignore_ascii_case(name) {
                return Some(field);
            }
        }
        for field in &self.fields {
            if field.embedded
                && let Kind::Struct(inner) = &field.kind
                && let Some(found) = inner.resolve(name)
            {
                return Some(found);
            }
        }
        None
    }

    /// Exact lookup by resolved field name, descending into embedded fields.
    pub fn field_named(&self, name: &str) -> Option<&Field> {
        for field in &self.fields {
            if field.name == name {
                return Some(field);
            }
        }
        for field in &self.fields {
            if field.embedded
                && let Kind::Struct(inner) = &field.kind
                && let Some(found) = inner.field_named(name)
            {
                return Some(found);
            }
        }
        None
    }
}

/// Types that register a [`Descriptor`] for their configuration surface.
pub trait Schema {
    fn schema() -> Descriptor;
}

/// Serialize `T::default()` into a defaults value for a descriptor hook.
pub fn defaults_of<T: Default + Serialize>() -> Value {
    serde_json::to_value(T::default()).unwrap_or_default()
}

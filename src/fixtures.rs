#[cfg(test)]
pub mod test {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use serde::{Deserialize, Serialize};

    use crate::schema::{Descriptor, Field, Kind, Schema, Unit, defaults_of};

    /// Kitchen-sink fixture exercising every shape the engine supports.
    #[derive(Serialize, Deserialize, Default, Debug, PartialEq)]
    pub struct ServerConfig {
        pub host: String,
        pub port: u16,
        pub debug: bool,
        pub rate: f64,
        pub poll_interval: Duration,
        pub tags: Vec<String>,
        pub weights: Vec<u32>,
        pub api_token: String,
        pub tls: Option<TlsConfig>,
        pub endpoints: BTreeMap<String, Endpoint>,
        pub metadata: serde_json::Map<String, serde_json::Value>,
        pub peers: Vec<Endpoint>,
        pub redirections: Vec<Redirect>,
    }

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    pub struct TlsConfig {
        pub min_version: String,
        pub cert: String,
    }

    impl Default for TlsConfig {
        fn default() -> Self {
            TlsConfig {
                min_version: "1.2".to_string(),
                cert: String::new(),
            }
        }
    }

    #[derive(Serialize, Deserialize, Default, Debug, PartialEq)]
    pub struct Endpoint {
        pub address: String,
        pub weight: u32,
    }

    #[derive(Serialize, Deserialize, Default, Debug, PartialEq)]
    pub struct Redirect {
        pub from: String,
        pub to: String,
    }

    impl Schema for ServerConfig {
        fn schema() -> Descriptor {
            Descriptor::new()
                .field(Field::new("host", Kind::String).doc("Address the server binds."))
                .field(Field::new("port", Kind::UInt(16)).doc("Port the server listens on."))
                .field(Field::new("debug", Kind::Bool).doc("Enable debug output."))
                .field(Field::new("rate", Kind::Float(64)).doc("Request rate limit."))
                .field(
                    Field::new("poll_interval", Kind::Duration(Unit::Seconds))
                        .doc("How often to poll upstreams."),
                )
                .field(Field::new("tags", Kind::slice(Kind::String)).doc("Free-form labels."))
                .field(Field::new("weights", Kind::slice(Kind::UInt(32))))
                .field(Field::new("api_token", Kind::String).hidden())
                .field(
                    Field::new("tls", Kind::Struct(TlsConfig::schema()))
                        .optional()
                        .allow_empty()
                        .doc("TLS settings."),
                )
                .field(
                    Field::new("endpoints", Kind::map(Kind::Struct(Endpoint::schema())))
                        .doc("Named upstream endpoints."),
                )
                .field(
                    Field::new("metadata", Kind::Dynamic)
                        .doc("Opaque metadata passed through untouched."),
                )
                .field(Field::new("peers", Kind::slice(Kind::Struct(Endpoint::schema()))))
                .field(
                    Field::new("redirections", Kind::slice(Kind::Struct(Redirect::schema())))
                        .single("redirect"),
                )
        }
    }

    impl Schema for TlsConfig {
        fn schema() -> Descriptor {
            Descriptor::new()
                .field(Field::new("min_version", Kind::String).doc("Lowest accepted TLS version."))
                .field(Field::new("cert", Kind::String).doc("Path to the certificate."))
                .defaults(defaults_of::<TlsConfig>)
        }
    }

    impl Schema for Endpoint {
        fn schema() -> Descriptor {
            Descriptor::new()
                .field(Field::new("address", Kind::String).doc("Upstream address."))
                .field(Field::new("weight", Kind::UInt(32)))
        }
    }

    impl Schema for Redirect {
        fn schema() -> Descriptor {
            Descriptor::new()
                .field(Field::new("from", Kind::String))
                .field(Field::new("to", Kind::String))
        }
    }

    #[test]
    fn fixture_schema_resolves_its_own_fields() {
        let desc = ServerConfig::schema();
        assert!(desc.resolve("HOST").is_some());
        assert!(desc.resolve("redirect").is_some());
        assert!(desc.resolve("redirections").is_none());
    }
}

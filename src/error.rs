use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeytreeError {
    #[error("unknown field '{name}' under '{path}'")]
    UnknownField { path: String, name: String },

    #[error("unsupported shape at '{path}': {reason}")]
    Unsupported { path: String, reason: String },

    #[error("'{path}' needs child values or an allow-empty toggle")]
    Standalone { path: String },

    #[error("invalid value '{value}' for {expected} at '{path}'")]
    Parse {
        path: String,
        value: String,
        expected: &'static str,
    },

    #[error("the root must be a tree annotated against a struct descriptor")]
    InvalidRoot,

    #[error("'{path}' accepts at most one element")]
    SingleElement { path: String },

    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("invalid flag '{flag}': {reason}")]
    InvalidFlag { flag: String, reason: String },

    #[error("nesting at '{path}' exceeds the depth bound")]
    DepthExceeded { path: String },

    #[error("unsupported config format for {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to parse {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("value conversion failed: {0}")]
    Convert(#[from] serde_json::Error),
}

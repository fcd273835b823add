use std::io;

use http::status::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;

/// Crate-wide error type.
///
/// Note what is *not* here: an unresolvable path, an ambiguous match, a
/// skipped collection during a registry build, or a traversal that hit its
/// depth bound are all ordinary values in this crate (`None`,
/// [`crate::registry::Resolution::Multiple`], a partial registry, a partial
/// chain), never errors. `WaypathError` covers the store/config/schema
/// failures that a caller may want to surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum WaypathError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("Schema error: {0}")]
    Schema(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("Entity store error: {0}")]
    Store(String),
}

impl WaypathError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WaypathError::Config(_) => StatusCode::BAD_REQUEST,
            WaypathError::NotFound(_) => StatusCode::NOT_FOUND,
            WaypathError::Schema(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WaypathError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WaypathError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<io::Error> for WaypathError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => WaypathError::NotFound(format!("{x}")),
            _ => WaypathError::Config(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<toml::de::Error> for WaypathError {
    fn from(src: toml::de::Error) -> WaypathError {
        WaypathError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for WaypathError {
    fn from(src: toml::ser::Error) -> WaypathError {
        WaypathError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for WaypathError {
    fn from(src: JsonError) -> WaypathError {
        WaypathError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

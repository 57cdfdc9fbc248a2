use thiserror::Error;
use wasm_bindgen::JsValue;

/// Failure to obtain the parcel feature collection.
///
/// Any of these aborts a metrics computation; callers surface it to the user
/// as "metrics unavailable" instead of substituting data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("Failed to fetch feature collection from {url}: {reason}")]
    Network { url: String, reason: String },
    #[error("Feature collection request to {url} failed with HTTP status {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("Failed to parse feature collection: {0}")]
    Parse(String),
    #[error("Document is not a feature collection: {0}")]
    InvalidStructure(String),
}

/// Rejected engine configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid configuration field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("Failed to read configuration: {0}")]
    Malformed(String),
}

impl From<LoadError> for JsValue {
    fn from(err: LoadError) -> Self {
        JsValue::from_str(&format!("Carbon metrics unavailable: {}", err))
    }
}

impl From<ConfigError> for JsValue {
    fn from(err: ConfigError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

pub type LoadResult<T> = Result<T, LoadError>;

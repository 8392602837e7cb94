use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocateMunicipalityError {
    #[error("Failed to read cache file '{0}'")]
    CacheRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to write cache file '{0}'")]
    CacheWrite(PathBuf, #[source] std::io::Error),

    #[error("Failed to decode cache data from '{0}'")]
    CacheDecode(PathBuf, #[source] Box<bincode::error::DecodeError>),

    #[error("Failed to encode cache data")]
    CacheEncode(#[source] Box<bincode::error::EncodeError>),

    #[error("Failed to read municipality file '{0}'")]
    FileRead(PathBuf, #[source] std::io::Error),

    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to parse municipality JSON data")]
    JsonParse(#[from] serde_json::Error),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Geocode {0} not found. Please use a valid IBGE geocode")]
    GeocodeNotFound(u32),

    #[error("Municipality '{0}' not found")]
    NameNotFound(String),

    #[error("Municipality '{name}' not found in {uf}")]
    NameNotFoundInUf { name: String, uf: String },

    #[error("Municipality '{name}' exists in more than one state ({}); look it up with a UF", .ufs.join(", "))]
    AmbiguousName { name: String, ufs: Vec<String> },
}

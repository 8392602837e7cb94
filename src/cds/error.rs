use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Could not determine the home directory")]
    HomeDirResolution,

    #[error("Failed to read credentials file '{0}'")]
    FileRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to write credentials file '{0}'")]
    FileWrite(PathBuf, #[source] std::io::Error),

    #[error("Credentials file '{0}' has no '{1}:' entry")]
    MissingField(PathBuf, &'static str),

    #[error("Credentials file '{0}' has a malformed key line; expected 'UID:API-key'")]
    MalformedKey(PathBuf),

    #[error("Invalid UID '{0}'. Expected six digits, e.g. 153228")]
    InvalidUid(String),

    #[error("Invalid API key. Expected a UUID")]
    InvalidKey(#[source] uuid::Error),

    #[error("Invalid API key. Unsupported UUID version {0}")]
    UnsupportedKeyVersion(usize),

    #[error("Failed to read credentials from the terminal")]
    Prompt(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum CdsError {
    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to parse the reply from {0}")]
    MalformedReply(String, #[source] reqwest::Error),

    #[error("Task reply from {0} carries no request id")]
    MissingRequestId(String),

    #[error("Retrieval task {request_id} failed: {message}")]
    TaskFailed { request_id: String, message: String },

    #[error("Completed task {0} carries no download location")]
    MissingLocation(String),

    #[error("Download or file I/O failed for '{0}'")]
    DownloadIo(PathBuf, #[source] std::io::Error),

    #[error("Failed to persist download at '{0}'")]
    Persist(PathBuf, #[source] tempfile::PersistError),
}

// Error types shared by the library modules. The binary wraps these in
// `anyhow` with extra context; the library keeps them typed so callers
// can tell an HTTP rejection apart from a transport failure.

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by `NoIPFraudClient`.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Transport-level failure (DNS, TLS, timeout, connection reset).
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service answered with a non-success status code.
    #[error("{action} failed: {status} - {body}")]
    Status {
        action: &'static str,
        status: u16,
        body: String,
    },

    /// The body could not be decoded as the expected JSON shape.
    #[error("Invalid response from {action}: {source}")]
    Decode {
        action: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Login response did not contain a token")]
    MissingToken,

    #[error("Campaign not found: {0}")]
    CampaignNotFound(String),

    #[error("Token cannot be used as a header value")]
    InvalidToken(#[from] reqwest::header::InvalidHeaderValue),
}

/// Errors reading or writing the cached session file.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session file is corrupt: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while probing a server over SFTP.
#[derive(Error, Debug)]
pub enum SftpError {
    #[error("Key file not found: {}", .0.display())]
    KeyNotFound(PathBuf),

    #[error("Could not connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Authentication failed for user {0}")]
    Authentication(String),

    #[error("SSH error: {0}")]
    Ssh(#[from] ssh2::Error),
}

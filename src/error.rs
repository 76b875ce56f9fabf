use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unable to read credentials file {path}: {source}")]
    CredentialsRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to parse client secret file: {0}")]
    InvalidCredentials(String),

    #[error("Unable to read authorization code: {0}")]
    AuthorizationCode(String),

    #[error("OAuth error: {0}")]
    OAuth(String),

    #[error("Invalid or expired access token: {0}")]
    InvalidToken(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Gmail API error: {operation} failed ({status}): {message}")]
    Api {
        operation: String,
        status: u16,
        message: String,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Rate limited. Try again later.")]
    RateLimited,

    #[error("Server error: {0}")]
    Server(String),
}

pub type Result<T> = std::result::Result<T, Error>;

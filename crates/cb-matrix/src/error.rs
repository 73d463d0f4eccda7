//! Error types for cb-matrix

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatrixError {
    #[error("Matrix API error ({status}): {errcode}: {message}")]
    ApiError {
        status: u16,
        errcode: String,
        message: String,
    },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Matrix token not configured")]
    TokenNotConfigured,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rate limited")]
    RateLimited,
}

pub type Result<T> = std::result::Result<T, MatrixError>;

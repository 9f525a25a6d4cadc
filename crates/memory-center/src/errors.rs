use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("pattern not found: {0}")]
    NotFound(String),

    #[error("pattern storage io error: {0}")]
    Io(#[from] io::Error),

    #[error("pattern serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("remote pattern store error: {0}")]
    Remote(String),
}

pub type Result<T> = std::result::Result<T, PatternError>;

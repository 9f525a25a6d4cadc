use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("model endpoint unreachable: {0}")]
    Unavailable(String),

    #[error("model endpoint returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("model response invalid: {0}")]
    InvalidResponse(String),

    #[error("model returned an empty response")]
    EmptyResponse,

    #[error("provider misconfigured: {0}")]
    Config(String),
}

impl LlmError {
    /// Network failures and server-side errors; the caller may try later.
    pub fn is_unavailable(&self) -> bool {
        match self {
            LlmError::Unavailable(_) => true,
            LlmError::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;

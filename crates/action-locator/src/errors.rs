//! Error types for locator system

use llm_provider::LlmError;
use memory_center::PatternError;
use perceiver_structural::SelectorError;
use thiserror::Error;

/// Locator error enumeration
#[derive(Debug, Error, Clone)]
pub enum LocatorError {
    /// No strategy produced a confident candidate
    #[error("Element not found: {0}")]
    NotFound(String),

    /// A strategy failed unexpectedly; the chain continues without it
    #[error("Strategy '{strategy}' failed: {reason}")]
    StrategyFault { strategy: String, reason: String },

    /// Model endpoint or backend unreachable
    #[error("External service unavailable: {0}")]
    ExternalServiceUnavailable(String),

    /// Model output could not be interpreted
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Selector hint or stored selector does not parse
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LocatorError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, LocatorError::ExternalServiceUnavailable(_))
    }

    /// Get error severity (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            LocatorError::Internal(_) => 3,
            LocatorError::ExternalServiceUnavailable(_) => 2,
            LocatorError::StrategyFault { .. }
            | LocatorError::MalformedResponse(_)
            | LocatorError::InvalidSelector(_) => 1,
            LocatorError::NotFound(_) => 0,
        }
    }
}

impl From<SelectorError> for LocatorError {
    fn from(err: SelectorError) -> Self {
        LocatorError::InvalidSelector(err.to_string())
    }
}

impl From<LlmError> for LocatorError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::InvalidResponse(_) | LlmError::EmptyResponse => {
                LocatorError::MalformedResponse(err.to_string())
            }
            LlmError::Config(_) => LocatorError::Internal(err.to_string()),
            LlmError::Unavailable(_) | LlmError::Http { .. } => {
                LocatorError::ExternalServiceUnavailable(err.to_string())
            }
        }
    }
}

impl From<PatternError> for LocatorError {
    fn from(err: PatternError) -> Self {
        match err {
            PatternError::NotFound(id) => LocatorError::NotFound(format!("pattern {id}")),
            PatternError::Remote(reason) => LocatorError::ExternalServiceUnavailable(reason),
            other => LocatorError::Internal(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, LocatorError>;

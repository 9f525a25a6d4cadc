use thiserror::Error;

use perceiver_structural::SelectorError;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum RecipeErrorKind {
    #[error("missing required field: {0}")]
    MissingField(String),
    #[error("step '{step}' missing required field: {field}")]
    StepMissingField { step: String, field: String },
    #[error("workflow must have at least one step")]
    NoSteps,
    #[error("invalid validation type '{0}'")]
    InvalidValidation(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("workflow not found: {0}")]
    NotFound(String),
    #[error("step index {index} out of range (workflow has {len} steps)")]
    StepOutOfRange { index: usize, len: usize },
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("io error: {0}")]
    Io(String),
}

#[derive(Clone, Debug, Error, PartialEq)]
#[error(transparent)]
pub struct RecipeError(pub RecipeErrorKind);

impl RecipeError {
    pub fn new(kind: RecipeErrorKind) -> Self {
        Self(kind)
    }

    pub fn kind(&self) -> &RecipeErrorKind {
        &self.0
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self(RecipeErrorKind::InvalidInput(msg.into()))
    }
}

impl From<RecipeErrorKind> for RecipeError {
    fn from(kind: RecipeErrorKind) -> Self {
        RecipeError(kind)
    }
}

impl From<SelectorError> for RecipeError {
    fn from(err: SelectorError) -> Self {
        RecipeError::invalid_input(err.to_string())
    }
}

impl From<regex::Error> for RecipeError {
    fn from(err: regex::Error) -> Self {
        RecipeError::invalid_input(err.to_string())
    }
}

impl From<serde_json::Error> for RecipeError {
    fn from(err: serde_json::Error) -> Self {
        RecipeError(RecipeErrorKind::Parse(err.to_string()))
    }
}

impl From<serde_yaml::Error> for RecipeError {
    fn from(err: serde_yaml::Error) -> Self {
        RecipeError(RecipeErrorKind::Parse(err.to_string()))
    }
}

impl From<std::io::Error> for RecipeError {
    fn from(err: std::io::Error) -> Self {
        RecipeError(RecipeErrorKind::Io(err.to_string()))
    }
}

pub type Result<T> = std::result::Result<T, RecipeError>;

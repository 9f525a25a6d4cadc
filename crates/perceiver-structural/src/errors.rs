use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("unexpected '{ch}' at offset {offset} in selector")]
    UnexpectedChar { ch: char, offset: usize },
    #[error("selector ended unexpectedly")]
    UnexpectedEnd,
    #[error("unsupported pseudo-class ':{0}'")]
    UnsupportedPseudo(String),
    #[error("invalid :nth-of-type argument '{0}'")]
    InvalidNth(String),
}

pub type SelectorResult<T> = Result<T, SelectorError>;

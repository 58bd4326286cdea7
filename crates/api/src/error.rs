use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenscopeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("error parsing namespace {0}")]
    InvalidNamespace(String),
    #[error("missing namespace")]
    MissingNamespace,
    #[error("unable to determine namespace for {0}")]
    UnresolvedNamespace(String),
    #[error("invalid alias pattern: {0}")]
    AliasPattern(String),
    #[error("alias rules did not reach a fixpoint for {0}")]
    AliasLoop(String),
    #[error("invalid glob pattern: {0}")]
    Pattern(String),
}

pub type Result<T> = std::result::Result<T, GenscopeError>;

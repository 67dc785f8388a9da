use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("unknown environment: {0}")]
    UnknownKind(String),

    #[error("invalid environment argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, EnvError>;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SiloError>;

/// Failure conditions surfaced by the engine. Absence of an object is
/// not an error: get and delete report it through their operation
/// outcome enums instead.
#[derive(Debug, Error)]
pub enum SiloError {
    #[error("chunk {key} is corrupted or missing")]
    Corruption { key: String },

    #[error("partial failure: {0}")]
    PartialFailure(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("engine is shutting down")]
    ShuttingDown,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Missing artifact: {0}")]
    MissingArtifact(String),

    #[error("Stale artifact: {0}")]
    StaleArtifact(String),

    #[error("Encoding failure: {0}")]
    EncodingFailure(String),

    #[error("Degenerate vector: norm is zero")]
    DegenerateVector,

    #[error("Cannot fit on an empty corpus")]
    EmptyCorpus,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Shorthand for the length check every transform performs.
    pub fn check_dim(expected: usize, actual: usize) -> Result<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(Error::DimensionMismatch { expected, actual })
        }
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PackDiffError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Path error: {0}")]
    Path(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid exclusion pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Comparison error: {0}")]
    Comparison(String),

    #[error("Version table error: {0}")]
    Version(String),
}

impl PackDiffError {
    /// Attach the offending path to an I/O failure
    pub fn io_at(path: &std::path::Path, err: std::io::Error) -> Self {
        PackDiffError::Io(std::io::Error::new(
            err.kind(),
            format!("{}: {}", path.display(), err),
        ))
    }
}

pub type Result<T> = std::result::Result<T, PackDiffError>;

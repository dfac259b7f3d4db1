use thiserror::Error;

/// Failures surfaced by the loaders and the renderer construction path.
///
/// The raw-format parser itself never errors (it reports `None`); these are
/// what the layers above turn that into, plus the usual IO suspects.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Malformed brace file, missing required field, undecodable bitmap, or
    /// an unknown province id in metadata. Fatal to the operation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A referenced country or history file was not found.
    #[error("missing resource: {0}")]
    MissingResource(String),

    /// The persisted province index does not match the current bitmap.
    /// Delete and rebuild.
    #[error("stale province index: {0}")]
    StaleCache(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

pub type Result<T> = std::result::Result<T, ReplayError>;

impl ReplayError {
    pub fn invalid(message: impl Into<String>) -> ReplayError {
        return ReplayError::InvalidInput(message.into());
    }

    pub fn missing(message: impl Into<String>) -> ReplayError {
        return ReplayError::MissingResource(message.into());
    }

    pub fn stale(message: impl Into<String>) -> ReplayError {
        return ReplayError::StaleCache(message.into());
    }
}

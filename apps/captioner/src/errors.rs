use thiserror::Error;

/// Failure of a single composition call.
///
/// Font problems and download problems never surface here — they are
/// recovered where they happen (fallback font, original remote URL kept).
/// What remains is either bad input or a storage failure with no fallback.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// The source image could not be read or decoded.
    #[error("image load failed: {0}")]
    ImageLoad(String),

    /// The reference pointed into the store, but the backing file is gone.
    #[error("local asset not found: {0}")]
    AssetNotFound(String),

    /// The rendered output could not be persisted.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// PNG encoding of the rendered image failed.
    #[error("image encode failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

use thiserror::Error;

/// Errors surfaced by the embedding provider.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The uploaded bytes could not be decoded into a raster image.
    #[error("image decode failed: {0}")]
    Decode(String),
    /// The model produced no usable output (degenerate vector, dimension
    /// mismatch, runtime failure).
    #[error("inference failure: {0}")]
    Inference(String),
    /// A persisted vector could not be reconstructed (wrong byte length,
    /// dimension mismatch against the configured model).
    #[error("embedding encoding error: {0}")]
    Encoding(String),
}

//! Embedding provider for sock images.
//!
//! This crate wraps an opaque pretrained image-to-vector function behind the
//! [`EmbeddingProvider`] trait and owns the [`EmbeddingVector`] value type.
//! Vectors are fixed-length (model-dependent, 512 by default) and always
//! unit L2-normalized, so cosine similarity reduces to a dot product.
//!
//! The provider is explicitly constructed at startup and injected wherever
//! embeddings are needed; model initialization is lazy, idempotent, and
//! thread-safe (initialize-once-use-many).

mod error;
mod provider;
mod vector;

pub use error::EmbeddingError;
pub use provider::{EmbeddingProvider, MosaicEmbedder};
pub use vector::EmbeddingVector;

use serde::{Deserialize, Serialize};

/// Configuration for the default embedding model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Output vector dimension. Model-dependent per deployment (e.g. 512 for
    /// a CLIP-style model, 1280 for an EfficientNet backbone).
    pub dimension: usize,
    /// Patch grid used by the default provider's feature stage.
    pub grid: usize,
    /// Seed for the projection; fixed so embeddings are reproducible across
    /// processes.
    pub seed: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimension: 512,
            grid: 16,
            seed: 0x5000_4d41,
        }
    }
}

impl EmbeddingConfig {
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn with_grid(mut self, grid: usize) -> Self {
        self.grid = grid;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

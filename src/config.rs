use std::path::PathBuf;

use embedding::EmbeddingConfig;
use store::BackendConfig;

/// Service-level configuration, combining the stage configs with the match
/// policy and the media location.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub embedding: EmbeddingConfig,
    pub backend: BackendConfig,
    /// Minimum similarity for a candidate, in the selected backend's score
    /// space. Default 0.75.
    pub match_threshold: f32,
    /// Maximum candidates per search. Default 10.
    pub match_limit: usize,
    /// Store-query oversampling multiplier. Default 2.0.
    pub oversample_factor: f32,
    /// Directory holding original and background-removed image files.
    pub media_dir: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            embedding: EmbeddingConfig::default(),
            backend: BackendConfig::default(),
            match_threshold: 0.75,
            match_limit: 10,
            oversample_factor: 2.0,
            media_dir: std::env::temp_dir().join("sockmatch-media"),
        }
    }
}

impl ServiceConfig {
    pub fn with_embedding(mut self, embedding: EmbeddingConfig) -> Self {
        self.embedding = embedding;
        self
    }

    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_match_threshold(mut self, threshold: f32) -> Self {
        self.match_threshold = threshold;
        self
    }

    pub fn with_match_limit(mut self, limit: usize) -> Self {
        self.match_limit = limit;
        self
    }

    pub fn with_oversample_factor(mut self, factor: f32) -> Self {
        self.oversample_factor = factor;
        self
    }

    pub fn with_media_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.media_dir = dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServiceConfig::default();
        assert!((config.match_threshold - 0.75).abs() < f32::EPSILON);
        assert_eq!(config.match_limit, 10);
        assert!((config.oversample_factor - 2.0).abs() < f32::EPSILON);
        assert_eq!(config.embedding.dimension, 512);
    }

    #[test]
    fn builders_apply() {
        let config = ServiceConfig::default()
            .with_match_threshold(0.85)
            .with_match_limit(5)
            .with_media_dir("/tmp/socks");
        assert!((config.match_threshold - 0.85).abs() < f32::EPSILON);
        assert_eq!(config.match_limit, 5);
        assert_eq!(config.media_dir, PathBuf::from("/tmp/socks"));
    }
}

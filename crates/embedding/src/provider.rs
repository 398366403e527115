use std::sync::OnceLock;

use image::imageops::FilterType;

use crate::{EmbeddingConfig, EmbeddingError, EmbeddingVector};

/// Image-to-vector function shared by every component that needs embeddings.
///
/// Implementations are constructed once at process startup and passed by
/// reference (`Arc<dyn EmbeddingProvider>`) into the service; there is no
/// implicit global. Inference must not mutate provider state, so a single
/// instance can serve concurrent requests.
pub trait EmbeddingProvider: Send + Sync {
    /// Dimension of every vector this provider produces.
    fn dimension(&self) -> usize;

    /// Embed raw image bytes. Deterministic for fixed input bytes.
    ///
    /// Fails with [`EmbeddingError::Decode`] on corrupt or unsupported bytes
    /// and [`EmbeddingError::Inference`] on model failure; neither leaves any
    /// partial state behind.
    fn embed(&self, image_bytes: &[u8]) -> Result<EmbeddingVector, EmbeddingError>;
}

/// Deterministic default provider standing in for the pretrained network.
///
/// The real deployment wires a trained vision model behind
/// [`EmbeddingProvider`]; this implementation keeps the same contract with a
/// cheap, fully reproducible computation. The image is canonicalized to RGB,
/// downsampled to a fixed patch grid, and the per-channel patch means are
/// pushed through a seeded random projection into the configured dimension.
/// Identical bytes always map to the same unit vector, and visually unrelated
/// images land in clearly different directions.
pub struct MosaicEmbedder {
    config: EmbeddingConfig,
    // Row-major projection matrix, dimension x (grid*grid*3 + 1). Built once
    // on first use and read-only afterwards.
    projection: OnceLock<Vec<f32>>,
}

impl MosaicEmbedder {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            config,
            projection: OnceLock::new(),
        }
    }

    fn raw_feature_len(&self) -> usize {
        // Trailing bias term keeps the feature vector away from all-zero for
        // mid-gray images.
        self.config.grid * self.config.grid * 3 + 1
    }

    fn projection(&self) -> &[f32] {
        self.projection.get_or_init(|| {
            let rows = self.config.dimension;
            let cols = self.raw_feature_len();
            let mut rng = fastrand::Rng::with_seed(self.config.seed);
            (0..rows * cols).map(|_| rng.f32() * 2.0 - 1.0).collect()
        })
    }

    fn patch_features(&self, image: &image::RgbImage) -> Vec<f32> {
        let grid = self.config.grid as u32;
        let small = image::imageops::resize(image, grid, grid, FilterType::Triangle);
        let mut features = Vec::with_capacity(self.raw_feature_len());
        for pixel in small.pixels() {
            for channel in pixel.0 {
                features.push(channel as f32 / 255.0 - 0.5);
            }
        }
        features.push(1.0);
        features
    }
}

impl Default for MosaicEmbedder {
    fn default() -> Self {
        Self::new(EmbeddingConfig::default())
    }
}

impl EmbeddingProvider for MosaicEmbedder {
    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn embed(&self, image_bytes: &[u8]) -> Result<EmbeddingVector, EmbeddingError> {
        let decoded = image::load_from_memory(image_bytes)
            .map_err(|e| EmbeddingError::Decode(e.to_string()))?;
        // Any pixel format is canonicalized to 3-channel RGB before inference.
        let rgb = decoded.to_rgb8();

        let features = self.patch_features(&rgb);
        let projection = self.projection();
        let cols = self.raw_feature_len();

        let mut raw = vec![0f32; self.config.dimension];
        for (row, out) in raw.iter_mut().enumerate() {
            let offset = row * cols;
            let mut acc = 0f32;
            for (j, f) in features.iter().enumerate() {
                acc += projection[offset + j] * f;
            }
            *out = acc;
        }

        EmbeddingVector::unit(raw)
    }
}

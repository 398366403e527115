//! Perceptual feature extraction for sock images.
//!
//! Three independent sub-algorithms, all pure functions over a decoded pixel
//! buffer (ideally the background-removed variant when one exists):
//!
//! - [`extract_palette`] — dominant-color palette via fixed-seed k-means,
//! - [`classify_pattern`] — solid / striped / textured / complex / unknown,
//! - [`texture_descriptor`] — grayscale statistics plus an LBP histogram.
//!
//! None of them ever returns an error: internal failures degrade to the
//! documented defaults (`unknown` pattern, empty palette, `None` texture).
//! Logging the degradation is the caller's job, not this crate's.

mod palette;
mod pattern;
mod raster;
mod texture;

pub use palette::extract_palette;
pub use pattern::classify_pattern;
pub use texture::texture_descriptor;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Closed set of pattern classes a sock image can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternLabel {
    Solid,
    Striped,
    Textured,
    Complex,
    #[default]
    Unknown,
}

impl PatternLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternLabel::Solid => "solid",
            PatternLabel::Striped => "striped",
            PatternLabel::Textured => "textured",
            PatternLabel::Complex => "complex",
            PatternLabel::Unknown => "unknown",
        }
    }
}

/// Grayscale and local-binary-pattern statistics. All four fields are
/// computed together or the descriptor is absent entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureDescriptor {
    /// Mean grayscale intensity in [0, 255].
    pub mean: f32,
    /// Grayscale standard deviation.
    pub std_dev: f32,
    /// Mean Sobel gradient magnitude.
    pub mean_gradient: f32,
    /// Normalized 10-bin histogram of the 8-neighbor LBP code.
    pub lbp_histogram: [f32; 10],
}

/// Derived feature set persisted alongside a sock record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureSet {
    /// Highest-ranked palette color, lowercase `#rrggbb`.
    pub dominant_color: Option<String>,
    /// Ordered palette, at most five entries.
    pub palette: Vec<String>,
    pub pattern: PatternLabel,
    pub texture: Option<TextureDescriptor>,
}

/// Run all three extractors over one decoded image.
pub fn extract_features(image: &DynamicImage) -> FeatureSet {
    let palette = extract_palette(image);
    FeatureSet {
        dominant_color: palette.first().cloned(),
        palette,
        pattern: classify_pattern(image),
        texture: texture_descriptor(image),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn pattern_labels_serialize_as_lowercase_strings() {
        for (label, expected) in [
            (PatternLabel::Solid, "\"solid\""),
            (PatternLabel::Striped, "\"striped\""),
            (PatternLabel::Textured, "\"textured\""),
            (PatternLabel::Complex, "\"complex\""),
            (PatternLabel::Unknown, "\"unknown\""),
        ] {
            assert_eq!(serde_json::to_string(&label).unwrap(), expected);
            assert_eq!(label.as_str(), expected.trim_matches('"'));
        }
    }

    #[test]
    fn default_feature_set_is_the_degraded_state() {
        let features = FeatureSet::default();
        assert!(features.dominant_color.is_none());
        assert!(features.palette.is_empty());
        assert_eq!(features.pattern, PatternLabel::Unknown);
        assert!(features.texture.is_none());
    }

    #[test]
    fn extract_features_on_solid_red() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, Rgb([255, 0, 0])));
        let features = extract_features(&img);
        assert_eq!(features.dominant_color.as_deref(), Some("#ff0000"));
        assert_eq!(features.pattern, PatternLabel::Solid);
        assert!(features.texture.is_some());
    }
}

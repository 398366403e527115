//! Background removal seam.
//!
//! Production hosts wire in a real matting model behind [`BackgroundRemover`];
//! the bundled [`BorderKeyRemover`] is a deterministic heuristic good enough
//! for the derived-feature pipeline: it keys on the average border color and
//! makes everything close to it transparent.

use image::{DynamicImage, Rgba, RgbaImage};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("background removal failed: {0}")]
pub struct BackgroundError(pub String);

pub trait BackgroundRemover: Send + Sync {
    fn remove_background(&self, image: &DynamicImage) -> Result<DynamicImage, BackgroundError>;
}

/// Border-keyed heuristic remover.
pub struct BorderKeyRemover {
    /// RGB Euclidean distance below which a pixel counts as background.
    pub tolerance: f32,
}

impl Default for BorderKeyRemover {
    fn default() -> Self {
        Self { tolerance: 40.0 }
    }
}

impl BorderKeyRemover {
    pub fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance;
        self
    }

    fn key_color(rgba: &RgbaImage) -> [f32; 3] {
        let (width, height) = rgba.dimensions();
        let mut sum = [0f64; 3];
        let mut count = 0u64;
        for x in 0..width {
            for y in [0, height - 1] {
                let p = rgba.get_pixel(x, y);
                sum[0] += p[0] as f64;
                sum[1] += p[1] as f64;
                sum[2] += p[2] as f64;
                count += 1;
            }
        }
        for y in 0..height {
            for x in [0, width - 1] {
                let p = rgba.get_pixel(x, y);
                sum[0] += p[0] as f64;
                sum[1] += p[1] as f64;
                sum[2] += p[2] as f64;
                count += 1;
            }
        }
        [
            (sum[0] / count as f64) as f32,
            (sum[1] / count as f64) as f32,
            (sum[2] / count as f64) as f32,
        ]
    }
}

impl BackgroundRemover for BorderKeyRemover {
    fn remove_background(&self, image: &DynamicImage) -> Result<DynamicImage, BackgroundError> {
        let mut rgba = image.to_rgba8();
        if rgba.width() == 0 || rgba.height() == 0 {
            return Err(BackgroundError("empty image".into()));
        }

        let key = Self::key_color(&rgba);
        let tolerance_sq = self.tolerance * self.tolerance;
        let mut kept = 0usize;
        for pixel in rgba.pixels_mut() {
            let dr = pixel[0] as f32 - key[0];
            let dg = pixel[1] as f32 - key[1];
            let db = pixel[2] as f32 - key[2];
            if dr * dr + dg * dg + db * db <= tolerance_sq {
                *pixel = Rgba([pixel[0], pixel[1], pixel[2], 0]);
            } else {
                kept += 1;
            }
        }

        if kept == 0 {
            return Err(BackgroundError(
                "keyed out every pixel; no foreground found".into(),
            ));
        }
        Ok(DynamicImage::ImageRgba8(rgba))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn sock_on_white() -> DynamicImage {
        let mut img = RgbImage::from_pixel(64, 64, Rgb([255, 255, 255]));
        for y in 16..48 {
            for x in 24..40 {
                img.put_pixel(x, y, Rgb([200, 30, 30]));
            }
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn keys_out_the_border_color() {
        let removed = BorderKeyRemover::default()
            .remove_background(&sock_on_white())
            .unwrap();
        let rgba = removed.to_rgba8();
        assert_eq!(rgba.get_pixel(0, 0)[3], 0);
        assert_eq!(rgba.get_pixel(32, 32)[3], 255);
        assert_eq!(rgba.get_pixel(32, 32)[0], 200);
    }

    #[test]
    fn uniform_image_has_no_foreground() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([255, 255, 255])));
        assert!(BorderKeyRemover::default().remove_background(&img).is_err());
    }

    #[test]
    fn tolerance_widens_the_key() {
        let mut img = RgbImage::from_pixel(16, 16, Rgb([250, 250, 250]));
        img.put_pixel(8, 8, Rgb([230, 230, 230]));
        let image = DynamicImage::ImageRgb8(img);

        // Tight tolerance keeps the slightly darker pixel.
        let kept = BorderKeyRemover::default()
            .with_tolerance(10.0)
            .remove_background(&image)
            .unwrap();
        assert_eq!(kept.to_rgba8().get_pixel(8, 8)[3], 255);

        // A wide tolerance keys it out too, leaving nothing.
        assert!(BorderKeyRemover::default()
            .with_tolerance(60.0)
            .remove_background(&image)
            .is_err());
    }
}

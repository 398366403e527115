use image::DynamicImage;

/// Grayscale plane with f32 intensities in [0, 255].
pub(crate) struct GrayBuffer {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl GrayBuffer {
    pub(crate) fn from_image(image: &DynamicImage) -> Self {
        let luma = image.to_luma8();
        let (width, height) = (luma.width() as usize, luma.height() as usize);
        let data = luma.pixels().map(|p| p.0[0] as f32).collect();
        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    pub(crate) fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }
}

/// Per-pixel Sobel gradient magnitude. Border pixels are left at zero.
pub(crate) fn sobel_magnitude(gray: &GrayBuffer) -> Vec<f32> {
    let (w, h) = (gray.width, gray.height);
    let mut out = vec![0f32; w * h];
    if w < 3 || h < 3 {
        return out;
    }
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let gx = gray.at(x + 1, y - 1) + 2.0 * gray.at(x + 1, y) + gray.at(x + 1, y + 1)
                - gray.at(x - 1, y - 1)
                - 2.0 * gray.at(x - 1, y)
                - gray.at(x - 1, y + 1);
            let gy = gray.at(x - 1, y + 1) + 2.0 * gray.at(x, y + 1) + gray.at(x + 1, y + 1)
                - gray.at(x - 1, y - 1)
                - 2.0 * gray.at(x, y - 1)
                - gray.at(x + 1, y - 1);
            out[y * w + x] = (gx * gx + gy * gy).sqrt();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma};

    #[test]
    fn flat_image_has_zero_gradient() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(16, 16, Luma([128])));
        let gray = GrayBuffer::from_image(&img);
        let mag = sobel_magnitude(&gray);
        assert!(mag.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn vertical_step_produces_horizontal_gradient() {
        let mut img = GrayImage::from_pixel(16, 16, Luma([0]));
        for y in 0..16 {
            for x in 8..16 {
                img.put_pixel(x, y, Luma([255]));
            }
        }
        let gray = GrayBuffer::from_image(&DynamicImage::ImageLuma8(img));
        let mag = sobel_magnitude(&gray);
        // Pixels adjacent to the step must light up.
        assert!(mag[5 * 16 + 7] > 500.0);
        assert!(mag[5 * 16 + 2] == 0.0);
    }
}

use image::DynamicImage;

use crate::raster::{sobel_magnitude, GrayBuffer};
use crate::TextureDescriptor;

/// Number of bins the LBP codes are folded into.
const LBP_BINS: usize = 10;

/// Compute the texture descriptor: grayscale mean and standard deviation,
/// mean Sobel gradient magnitude, and a 10-bin histogram of the 8-neighbor
/// local-binary-pattern code over interior pixels.
///
/// The four values are computed together or not at all: images too small for
/// an interior (under 3×3) yield `None` rather than a partial descriptor.
pub fn texture_descriptor(image: &DynamicImage) -> Option<TextureDescriptor> {
    let gray = GrayBuffer::from_image(image);
    if gray.width < 3 || gray.height < 3 {
        return None;
    }

    let pixel_count = gray.data.len() as f64;
    let mean = gray.data.iter().map(|&v| v as f64).sum::<f64>() / pixel_count;
    let variance = gray
        .data
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / pixel_count;

    let magnitude = sobel_magnitude(&gray);
    let mean_gradient = magnitude.iter().map(|&v| v as f64).sum::<f64>() / pixel_count;

    Some(TextureDescriptor {
        mean: mean as f32,
        std_dev: variance.sqrt() as f32,
        mean_gradient: mean_gradient as f32,
        lbp_histogram: lbp_histogram(&gray),
    })
}

/// 8-neighbor LBP: each interior pixel gets a byte with one bit per neighbor
/// that is >= the center, then codes are folded into [`LBP_BINS`] bins and
/// normalized to fractions.
fn lbp_histogram(gray: &GrayBuffer) -> [f32; LBP_BINS] {
    let mut counts = [0usize; LBP_BINS];
    let mut total = 0usize;
    // Clockwise from the top-left neighbor.
    const NEIGHBORS: [(isize, isize); 8] = [
        (-1, -1),
        (0, -1),
        (1, -1),
        (1, 0),
        (1, 1),
        (0, 1),
        (-1, 1),
        (-1, 0),
    ];

    for y in 1..gray.height - 1 {
        for x in 1..gray.width - 1 {
            let center = gray.at(x, y);
            let mut code = 0u16;
            for (bit, (dx, dy)) in NEIGHBORS.iter().enumerate() {
                let nx = (x as isize + dx) as usize;
                let ny = (y as isize + dy) as usize;
                if gray.at(nx, ny) >= center {
                    code |= 1 << bit;
                }
            }
            counts[(code as usize * LBP_BINS) / 256] += 1;
            total += 1;
        }
    }

    let mut histogram = [0f32; LBP_BINS];
    if total > 0 {
        for (bin, &count) in counts.iter().enumerate() {
            histogram[bin] = count as f32 / total as f32;
        }
    }
    histogram
}

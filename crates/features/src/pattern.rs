use image::imageops::FilterType;
use image::DynamicImage;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::raster::{sobel_magnitude, GrayBuffer};
use crate::PatternLabel;

/// Gradient magnitude above which a pixel counts as an edge. Sobel magnitudes
/// on 8-bit intensities span roughly [0, 1442]; 100 sits where standard edge
/// detectors place their lower hysteresis bound.
const EDGE_THRESHOLD: f32 = 100.0;

/// Edge-density boundary below which a sock reads as solid.
const SOLID_DENSITY: f32 = 0.05;

/// Edge-density boundary above which a sock reads as complex.
const COMPLEX_DENSITY: f32 = 0.15;

/// Side length of the square plane fed to the FFT.
const SPECTRUM_SIZE: usize = 128;

/// Half-width of the square window zeroed around the DC component.
const DC_WINDOW: usize = 20;

/// Ratio of peak to mean magnitude that signals a periodic (striped) pattern.
const PEAK_RATIO: f32 = 10.0;

/// Classify the visual pattern of a sock image.
///
/// Edge density decides the coarse class: below [`SOLID_DENSITY`] the sock is
/// solid, above [`COMPLEX_DENSITY`] it is complex. The middle band is split by
/// the frequency domain: a dominant off-DC peak in the magnitude spectrum
/// means a periodic repeat (striped), otherwise irregular detail (textured).
/// Never fails; degenerate inputs classify as [`PatternLabel::Unknown`].
pub fn classify_pattern(image: &DynamicImage) -> PatternLabel {
    classify_inner(image).unwrap_or(PatternLabel::Unknown)
}

fn classify_inner(image: &DynamicImage) -> Option<PatternLabel> {
    let gray = GrayBuffer::from_image(image);
    if gray.width < 3 || gray.height < 3 {
        return None;
    }

    let magnitude = sobel_magnitude(&gray);
    let edges = magnitude.iter().filter(|&&m| m > EDGE_THRESHOLD).count();
    let density = edges as f32 / magnitude.len() as f32;

    if density < SOLID_DENSITY {
        return Some(PatternLabel::Solid);
    }
    if density >= COMPLEX_DENSITY {
        return Some(PatternLabel::Complex);
    }

    if has_dominant_frequency(image) {
        Some(PatternLabel::Striped)
    } else {
        Some(PatternLabel::Textured)
    }
}

/// 2D magnitude spectrum test: zero a square window of ±[`DC_WINDOW`] bins
/// around the DC component and compare the remaining peak against
/// [`PEAK_RATIO`]× the remaining mean.
fn has_dominant_frequency(image: &DynamicImage) -> bool {
    let n = SPECTRUM_SIZE;
    let small = image
        .resize_exact(n as u32, n as u32, FilterType::Triangle)
        .to_luma8();

    let mut plane: Vec<Complex<f32>> = small
        .pixels()
        .map(|p| Complex::new(p.0[0] as f32, 0.0))
        .collect();

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n);

    // Rows in place, then columns through a scratch buffer.
    for row in plane.chunks_exact_mut(n) {
        fft.process(row);
    }
    let mut column = vec![Complex::new(0.0, 0.0); n];
    for x in 0..n {
        for (y, value) in column.iter_mut().enumerate() {
            *value = plane[y * n + x];
        }
        fft.process(&mut column);
        for (y, value) in column.iter().enumerate() {
            plane[y * n + x] = *value;
        }
    }

    let mut peak = 0f32;
    let mut sum = 0f64;
    let mut kept = 0usize;
    for y in 0..n {
        for x in 0..n {
            // Wrap-around distance to the DC bin at (0, 0); equivalent to the
            // centered window after an fftshift.
            let dy = y.min(n - y);
            let dx = x.min(n - x);
            if dx <= DC_WINDOW && dy <= DC_WINDOW {
                continue;
            }
            let mag = plane[y * n + x].norm();
            peak = peak.max(mag);
            sum += mag as f64;
            kept += 1;
        }
    }
    if kept == 0 {
        return false;
    }
    let mean = (sum / kept as f64) as f32;
    mean > 0.0 && peak > PEAK_RATIO * mean
}

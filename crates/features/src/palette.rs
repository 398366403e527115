use std::collections::HashSet;

use image::DynamicImage;

/// Minimum RGB Euclidean distance between two selected palette colors.
const MIN_COLOR_DISTANCE: f32 = 30.0;

/// Saturation boundary between the "vivid" and "muted" candidate pools.
const HIGH_SATURATION: f32 = 0.4;

/// Most colors to report.
const PALETTE_SIZE: usize = 5;

/// Upper bound on pixels fed to clustering; larger images are sampled with a
/// fixed stride so the result stays deterministic.
const MAX_SAMPLES: usize = 16_384;

const KMEANS_SEED: u64 = 42;
const KMEANS_ROUNDS: usize = 10;

/// Extract an ordered dominant-color palette as lowercase `#rrggbb` strings.
///
/// Near-transparent pixels (alpha ≤ 50%) are discarded when the image carries
/// an alpha channel, so a background-removed sock contributes only foreground
/// colors. Remaining pixels are clustered with a fixed-seed k-means and up to
/// five mutually distinct colors are picked, vivid clusters first. Returns an
/// empty vector when no pixel qualifies; never fails.
pub fn extract_palette(image: &DynamicImage) -> Vec<String> {
    let pixels = opaque_pixels(image);
    if pixels.is_empty() {
        return Vec::new();
    }

    let sampled = sample(&pixels);
    let distinct: HashSet<[u8; 3]> = sampled.iter().copied().collect();
    let k = distinct.len().min(15);
    if k == 0 {
        return Vec::new();
    }

    let data: Vec<[f32; 3]> = sampled
        .iter()
        .map(|p| [p[0] as f32, p[1] as f32, p[2] as f32])
        .collect();
    let (centers, counts) = kmeans(&data, &distinct, k);

    select_colors(&centers, &counts)
        .into_iter()
        .map(|c| {
            format!(
                "#{:02x}{:02x}{:02x}",
                c[0].round().clamp(0.0, 255.0) as u8,
                c[1].round().clamp(0.0, 255.0) as u8,
                c[2].round().clamp(0.0, 255.0) as u8
            )
        })
        .collect()
}

fn opaque_pixels(image: &DynamicImage) -> Vec<[u8; 3]> {
    if image.color().has_alpha() {
        image
            .to_rgba8()
            .pixels()
            .filter(|p| p.0[3] > 127)
            .map(|p| [p.0[0], p.0[1], p.0[2]])
            .collect()
    } else {
        image
            .to_rgb8()
            .pixels()
            .map(|p| [p.0[0], p.0[1], p.0[2]])
            .collect()
    }
}

fn sample(pixels: &[[u8; 3]]) -> Vec<[u8; 3]> {
    if pixels.len() <= MAX_SAMPLES {
        return pixels.to_vec();
    }
    let stride = pixels.len().div_ceil(MAX_SAMPLES);
    pixels.iter().step_by(stride).copied().collect()
}

/// Plain Lloyd iterations with seeded initialization over the distinct-color
/// set, so identical input always yields identical clusters.
fn kmeans(data: &[[f32; 3]], distinct: &HashSet<[u8; 3]>, k: usize) -> (Vec<[f32; 3]>, Vec<usize>) {
    let mut pool: Vec<[u8; 3]> = distinct.iter().copied().collect();
    pool.sort_unstable();
    let mut rng = fastrand::Rng::with_seed(KMEANS_SEED);
    rng.shuffle(&mut pool);

    let mut centers: Vec<[f32; 3]> = pool
        .iter()
        .take(k)
        .map(|p| [p[0] as f32, p[1] as f32, p[2] as f32])
        .collect();
    let mut assignment = vec![0usize; data.len()];

    for _ in 0..KMEANS_ROUNDS {
        let mut moved = false;
        for (i, point) in data.iter().enumerate() {
            let nearest = nearest_center(point, &centers);
            if assignment[i] != nearest {
                assignment[i] = nearest;
                moved = true;
            }
        }

        let mut sums = vec![[0f64; 3]; k];
        let mut counts = vec![0usize; k];
        for (point, &cluster) in data.iter().zip(assignment.iter()) {
            counts[cluster] += 1;
            for c in 0..3 {
                sums[cluster][c] += point[c] as f64;
            }
        }
        for (cluster, center) in centers.iter_mut().enumerate() {
            if counts[cluster] > 0 {
                for c in 0..3 {
                    center[c] = (sums[cluster][c] / counts[cluster] as f64) as f32;
                }
            }
            // Empty clusters keep their previous center.
        }

        if !moved {
            break;
        }
    }

    let mut counts = vec![0usize; k];
    for &cluster in &assignment {
        counts[cluster] += 1;
    }
    (centers, counts)
}

fn nearest_center(point: &[f32; 3], centers: &[[f32; 3]]) -> usize {
    let mut best = 0;
    let mut best_dist = f32::MAX;
    for (i, center) in centers.iter().enumerate() {
        let d = distance_sq(point, center);
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

fn distance_sq(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    dr * dr + dg * dg + db * db
}

fn saturation(color: &[f32; 3]) -> f32 {
    let max = color[0].max(color[1]).max(color[2]);
    let min = color[0].min(color[1]).min(color[2]);
    if max <= 0.0 {
        return 0.0;
    }
    (max - min) / max
}

/// Rank clusters by `freq^0.7 * (1 + 2*saturation)` and greedily pick up to
/// five mutually distinct colors, vivid pool before muted pool.
fn select_colors(centers: &[[f32; 3]], counts: &[usize]) -> Vec<[f32; 3]> {
    struct Candidate {
        color: [f32; 3],
        saturation: f32,
        score: f32,
    }

    let mut candidates: Vec<Candidate> = centers
        .iter()
        .zip(counts.iter())
        .filter(|(_, &count)| count > 0)
        .map(|(center, &count)| {
            let sat = saturation(center);
            Candidate {
                color: *center,
                saturation: sat,
                score: (count as f32).powf(0.7) * (1.0 + 2.0 * sat),
            }
        })
        .collect();
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut selected: Vec<[f32; 3]> = Vec::new();
    let pick = |pool: &[&Candidate], selected: &mut Vec<[f32; 3]>| {
        for candidate in pool {
            if selected.len() >= PALETTE_SIZE {
                break;
            }
            let distinct = selected
                .iter()
                .all(|s| distance_sq(&candidate.color, s).sqrt() >= MIN_COLOR_DISTANCE);
            if distinct {
                selected.push(candidate.color);
            }
        }
    };

    let vivid: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| c.saturation > HIGH_SATURATION)
        .collect();
    let muted: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| c.saturation <= HIGH_SATURATION)
        .collect();

    pick(&vivid, &mut selected);
    pick(&muted, &mut selected);
    selected
}

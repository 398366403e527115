//! Perceptual color comparison over `#rrggbb` strings.

/// Parsed RGB triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Parse a `#rrggbb` hex color. Case-insensitive; the leading `#` is
/// required. Anything else yields `None`.
pub fn parse_hex(color: &str) -> Option<Rgb> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Rgb { r, g, b })
}

/// Red-mean weighted color similarity in [0, 1].
///
/// The weights shift with the mean red level so the metric tracks human
/// sensitivity better than plain RGB distance:
/// `w_r = 2 + r_mean/256`, `w_g = 4`, `w_b = 2 + (255 - r_mean)/256`.
/// The weighted distance is normalized by its maximum (765) and inverted.
///
/// This is a secondary signal for presenting candidates; ranking is always
/// driven by embedding similarity.
pub fn color_similarity(a: &str, b: &str) -> Option<f32> {
    let a = parse_hex(a)?;
    let b = parse_hex(b)?;

    let r_mean = (a.r as f32 + b.r as f32) / 2.0;
    let dr = a.r as f32 - b.r as f32;
    let dg = a.g as f32 - b.g as f32;
    let db = a.b as f32 - b.b as f32;

    let w_r = 2.0 + r_mean / 256.0;
    let w_g = 4.0;
    let w_b = 2.0 + (255.0 - r_mean) / 256.0;

    let dist = (w_r * dr * dr + w_g * dg * dg + w_b * db * db).sqrt();
    Some(1.0 - (dist / 765.0).min(1.0))
}

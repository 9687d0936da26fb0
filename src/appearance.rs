//! Appearance descriptors for re-identification.
//!
//! A box is described by per-channel colour histograms of its upper and lower
//! halves, L2-normalised, so jersey and shorts colours are kept apart.

use crate::bbox::{BBox, Ltrb};
use crate::frame::Frame;

pub const BINS: usize = 16;
pub const FEATURE_LEN: usize = 2 * 3 * BINS;

pub type Feature = Vec<f32>;

/// Computes the descriptor of `bbox` in `frame`. `None` when the box is empty after clipping.
pub fn embed(frame: &Frame, bbox: &BBox<Ltrb>) -> Option<Feature> {
    let crop = frame.crop(bbox)?;
    let h = crop.height();
    let mut feature = vec![0.0f32; FEATURE_LEN];

    for (_, y, px) in crop.enumerate_pixels() {
        let half = if y < h / 2 { 0 } else { 1 };

        for c in 0..3 {
            let bin = px.0[c] as usize * BINS / 256;
            feature[half * 3 * BINS + c * BINS + bin] += 1.0;
        }
    }

    normalize(&mut feature);
    Some(feature)
}

pub fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

/// `1 - cos(a, b)` for normalised vectors, in `0..=2`.
#[inline]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>()
}

/// Exponential moving average of normalised features, renormalised.
pub fn smooth(prev: &mut Feature, next: &[f32], alpha: f32) {
    for (p, n) in prev.iter_mut().zip(next) {
        *p = alpha * *p + (1.0 - alpha) * n;
    }

    normalize(prev);
}

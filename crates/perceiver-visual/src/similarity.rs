//! Pixel similarity between a recorded reference image and a live capture
//!
//! Both images are resized to the smaller common width/height, then compared
//! channel by channel on RGB. The score is `1 - mean_abs_diff / 255`, so two
//! identical images score 1.0 and an all-black vs all-white pair scores 0.0.
//!
//! Scoring never fails: anything that cannot be decoded or compared scores
//! 0.0 and the reason is logged at debug level.

use crate::decode::{decode_base64, decode_image};
use crate::errors::VisualError;
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use tracing::debug;

/// Similarity in `[0, 1]` between two encoded images.
pub fn similarity(reference: &[u8], live: &[u8]) -> f64 {
    match try_similarity(reference, live) {
        Ok(score) => score,
        Err(err) => {
            debug!(error = %err, "image comparison failed, scoring 0");
            0.0
        }
    }
}

/// Like [`similarity`], with the reference given as base64 (optionally a
/// `data:` URL).
pub fn similarity_base64(reference: &str, live: &[u8]) -> f64 {
    match decode_base64(reference) {
        Ok(bytes) => similarity(&bytes, live),
        Err(err) => {
            debug!(error = %err, "reference image unreadable, scoring 0");
            0.0
        }
    }
}

/// Fallible form of [`similarity`].
pub fn try_similarity(reference: &[u8], live: &[u8]) -> Result<f64, VisualError> {
    let reference = decode_image(reference)?;
    let live = decode_image(live)?;
    Ok(compare(&reference, &live))
}

fn compare(a: &DynamicImage, b: &DynamicImage) -> f64 {
    let (aw, ah) = a.dimensions();
    let (bw, bh) = b.dimensions();
    let width = aw.min(bw);
    let height = ah.min(bh);

    let a = fit(a, width, height).to_rgb8();
    let b = fit(b, width, height).to_rgb8();

    let mut total: u64 = 0;
    for (pa, pb) in a.pixels().zip(b.pixels()) {
        for channel in 0..3 {
            total += (pa[channel] as i16 - pb[channel] as i16).unsigned_abs() as u64;
        }
    }

    let samples = (width as u64) * (height as u64) * 3;
    if samples == 0 {
        return 0.0;
    }
    let mean = total as f64 / samples as f64;
    (1.0 - mean / 255.0).clamp(0.0, 1.0)
}

fn fit(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    if image.dimensions() == (width, height) {
        image.clone()
    } else {
        image.resize_exact(width, height, FilterType::Triangle)
    }
}

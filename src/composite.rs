//! Final compositing of a cleaned page.
//!
//! Starting from the desaturated image, foreground pixels are restored from the
//! original and high-contrast watermark residue is painted white. Low-spread
//! residue keeps its desaturated gray so the overlay edge does not turn harsh.

use image::RgbImage;

use crate::color::{channel_spread, WHITE};
use crate::refine::Refinement;

/// Compose the cleaned image from `original` and its [`Refinement`].
///
/// - [`Refinement::text`] pixels are copied from `original` unchanged.
/// - [`Refinement::refined`] pixels whose original channel spread is at least
///   `whiten_spread` become white; the rest keep their desaturated value.
/// - Everything else comes from [`Refinement::desaturated`], which leaves
///   unmasked pixels untouched.
#[must_use]
pub fn composite(original: &RgbImage, refinement: &Refinement, whiten_spread: u8) -> RgbImage {
    let mut result = refinement.desaturated.clone();

    for (x, y, px) in result.enumerate_pixels_mut() {
        let source = *original.get_pixel(x, y);
        if refinement.text.get(x, y) {
            *px = source;
        } else if refinement.refined.get(x, y) && channel_spread(source) >= whiten_spread {
            *px = WHITE;
        }
    }

    result
}

//! Splitting the candidate mask into watermark overlay and foreground content.
//!
//! A flat overlay, once stripped of its saturation, lands in a light,
//! low-saturation band. Dark strokes and saturated graphics stay outside that
//! band and are handed back to the compositor as text.

use image::RgbImage;

use crate::color::Hsv;
use crate::mask::Mask;

/// Output of [`refine_mask`].
#[derive(Debug, Clone)]
pub struct Refinement {
    /// The source image with every masked pixel desaturated.
    pub desaturated: RgbImage,
    /// Masked pixels confirmed as watermark-on-background.
    pub refined: Mask,
    /// Masked pixels presumed to be foreground content.
    pub text: Mask,
}

/// Desaturate the masked pixels of `image` and split `mask` into
/// [`Refinement::refined`] and [`Refinement::text`].
///
/// A masked pixel stays in the refined mask only if, after desaturation, its
/// saturation is at most `max_saturation` and its value is at least `min_value`.
///
/// # Panics
///
/// Panics if `mask` and `image` differ in size.
#[must_use]
pub fn refine_mask(image: &RgbImage, mask: &Mask, max_saturation: u8, min_value: u8) -> Refinement {
    assert_eq!(
        (mask.width(), mask.height()),
        image.dimensions(),
        "mask does not match image"
    );

    let mut desaturated = image.clone();
    let mut refined = Mask::new(image.width(), image.height());

    for (x, y, px) in desaturated.enumerate_pixels_mut() {
        if !mask.get(x, y) {
            continue;
        }
        let hsv = Hsv::from_rgb(*px).desaturated();
        *px = hsv.to_rgb();
        if hsv.saturation <= max_saturation && hsv.value >= min_value {
            refined.set(x, y, true);
        }
    }

    let text = mask.difference(&refined);
    Refinement {
        desaturated,
        refined,
        text,
    }
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    fn sample() -> (RgbImage, Mask) {
        let img = RgbImage::from_fn(4, 1, |x, _| match x {
            0 => Rgb([250, 200, 200]),
            1 => Rgb([30, 30, 30]),
            2 => Rgb([200, 20, 20]),
            _ => Rgb([180, 240, 180]),
        });
        let mask = Mask::from_fn(4, 1, |x, _| x < 3);
        (img, mask)
    }

    #[test]
    fn light_pixels_are_refined_dark_pixels_are_text() {
        let (img, mask) = sample();
        let r = refine_mask(&img, &mask, 30, 175);

        assert!(r.refined.get(0, 0));
        assert!(r.text.get(1, 0));
        assert!(r.refined.get(2, 0));
        assert!(!r.refined.get(3, 0));
        assert!(!r.text.get(3, 0));
    }

    #[test]
    fn refined_and_text_partition_the_mask() {
        let (img, mask) = sample();
        let r = refine_mask(&img, &mask, 30, 175);

        assert!(r.refined.is_subset_of(&mask));
        assert!(r.refined.intersection(&r.text).is_empty());
        assert_eq!(r.refined.union(&r.text), mask);
    }

    #[test]
    fn only_masked_pixels_are_desaturated() {
        let (img, mask) = sample();
        let r = refine_mask(&img, &mask, 30, 175);

        assert_eq!(*r.desaturated.get_pixel(0, 0), Rgb([250, 250, 250]));
        assert_eq!(*r.desaturated.get_pixel(1, 0), Rgb([30, 30, 30]));
        assert_eq!(*r.desaturated.get_pixel(3, 0), Rgb([180, 240, 180]));
    }

    #[test]
    fn value_floor_is_configurable() {
        let (img, mask) = sample();
        let r = refine_mask(&img, &mask, 30, 251);
        assert!(r.refined.is_empty());
        assert_eq!(r.text, mask);
    }
}

//! Binary pixel masks and the tolerance-band watermark mask builder.

use image::{Rgb, RgbImage};

use crate::color::Color;
use crate::morphology::{self, Kernel};

/// A binary per-pixel mask aligned with an image.
///
/// `true` marks a candidate watermark pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    data: Vec<bool>,
}

impl Mask {
    /// Create an all-clear mask.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![false; width as usize * height as usize],
        }
    }

    /// Build a mask by evaluating `f` at every pixel position.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Mask width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Mask height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether the pixel at `(x, y)` is set.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.data[self.offset(x, y)]
    }

    /// Set or clear the pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        let i = self.offset(x, y);
        self.data[i] = value;
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        assert!(x < self.width && y < self.height, "({x}, {y}) out of bounds");
        y as usize * self.width as usize + x as usize
    }

    /// Number of set pixels.
    #[must_use]
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    /// Whether no pixel is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.data.contains(&true)
    }

    /// Row-major view of the mask.
    #[must_use]
    pub fn as_slice(&self) -> &[bool] {
        &self.data
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [bool] {
        &mut self.data
    }

    /// Pixels set in either mask.
    #[must_use]
    pub fn union(&self, other: &Mask) -> Mask {
        self.zip_with(other, |a, b| a || b)
    }

    /// Pixels set in both masks.
    #[must_use]
    pub fn intersection(&self, other: &Mask) -> Mask {
        self.zip_with(other, |a, b| a && b)
    }

    /// Pixels set in `self` but not in `other`.
    #[must_use]
    pub fn difference(&self, other: &Mask) -> Mask {
        self.zip_with(other, |a, b| a && !b)
    }

    /// Whether every pixel set in `self` is also set in `other`.
    #[must_use]
    pub fn is_subset_of(&self, other: &Mask) -> bool {
        self.data.iter().zip(&other.data).all(|(&a, &b)| !a || b)
    }

    fn zip_with(&self, other: &Mask, f: impl Fn(bool, bool) -> bool) -> Mask {
        assert_eq!(
            (self.width, self.height),
            (other.width, other.height),
            "mask dimensions differ"
        );
        Mask {
            width: self.width,
            height: self.height,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        }
    }
}

/// An inclusive per-channel color range around a target color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToleranceBand {
    /// Lower bound, per channel.
    pub lower: Color,
    /// Upper bound, per channel.
    pub upper: Color,
}

impl ToleranceBand {
    /// Band `target ± base_tolerance * multiplier`, clamped to `[0, 255]`.
    #[must_use]
    pub fn new(target: Color, base_tolerance: u8, multiplier: u8) -> Self {
        let tol = i32::from(base_tolerance) * i32::from(multiplier);
        let bound = |c: u8, delta: i32| {
            u8::try_from((i32::from(c) + delta).clamp(0, 255)).unwrap_or(u8::MAX)
        };
        Self {
            lower: Rgb(target.0.map(|c| bound(c, -tol))),
            upper: Rgb(target.0.map(|c| bound(c, tol))),
        }
    }

    /// Whether every channel of `px` falls inside the band.
    #[must_use]
    pub fn contains(&self, px: Color) -> bool {
        (0..3).all(|ch| self.lower[ch] <= px[ch] && px[ch] <= self.upper[ch])
    }
}

/// Pixels of `image` inside a single band.
#[must_use]
pub fn in_range(image: &RgbImage, band: &ToleranceBand) -> Mask {
    Mask::from_fn(image.width(), image.height(), |x, y| {
        band.contains(*image.get_pixel(x, y))
    })
}

/// Union of the in-range masks for multipliers `1..=max_multiplier`.
///
/// No morphology is applied.
#[must_use]
pub fn color_range_mask(
    image: &RgbImage,
    target: Color,
    base_tolerance: u8,
    max_multiplier: u8,
) -> Mask {
    let mut mask = Mask::new(image.width(), image.height());
    for multiplier in 1..=max_multiplier {
        let band = ToleranceBand::new(target, base_tolerance, multiplier);
        mask = mask.union(&in_range(image, &band));
    }
    mask
}

/// Parameters for [`build_watermark_mask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskParams {
    /// Per-channel tolerance of the first band.
    pub base_tolerance: u8,
    /// Number of bands to union (multipliers `1..=bands`).
    pub bands: u8,
    /// Side of the elliptical structuring element.
    pub kernel_size: u32,
    /// Closing passes.
    pub close_iterations: u32,
    /// Dilation passes after closing.
    pub dilate_iterations: u32,
}

/// Build the candidate watermark mask for `target`.
///
/// Unions the tolerance bands, closes small gaps, then dilates to reach the
/// anti-aliased fringe of the overlay.
#[must_use]
pub fn build_watermark_mask(image: &RgbImage, target: Color, params: &MaskParams) -> Mask {
    let raw = color_range_mask(image, target, params.base_tolerance, params.bands);
    let kernel = Kernel::ellipse(params.kernel_size, params.kernel_size);
    let closed = morphology::close(&raw, &kernel, params.close_iterations);
    morphology::dilate(&closed, &kernel, params.dilate_iterations)
}

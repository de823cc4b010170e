//! Binary morphology on [`Mask`]es.
//!
//! Each operation walks the structuring element's hit offsets and combines
//! whole shifted rows of the source into the destination, OR for dilation and
//! AND for erosion. Offsets that fall outside the image are skipped, so the
//! border neither grows a dilation nor eats into an erosion.

use std::ops::Range;

use crate::mask::Mask;

/// A structuring element, stored as hit offsets relative to its anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kernel {
    width: u32,
    height: u32,
    offsets: Vec<(i32, i32)>,
}

impl Kernel {
    /// Elliptical element inscribed in a `width` x `height` box, anchored at the center.
    ///
    /// Row `i` spans `c ± round(c * sqrt(1 - (i - r)^2 / r^2))`. For a 5x5 box
    /// this yields a full 5x3 core plus a single center pixel on the top and
    /// bottom rows.
    #[must_use]
    pub fn ellipse(width: u32, height: u32) -> Self {
        let r = i32::try_from(height / 2).unwrap_or(0);
        let c = i32::try_from(width / 2).unwrap_or(0);
        let w = i32::try_from(width).unwrap_or(0);
        let inv_r2 = if r == 0 {
            0.0
        } else {
            1.0 / f64::from(r * r)
        };

        let mut offsets = Vec::new();
        for i in 0..i32::try_from(height).unwrap_or(0) {
            let dy = i - r;
            if dy.abs() > r {
                continue;
            }
            #[allow(clippy::cast_possible_truncation)]
            let dx = (f64::from(c) * (f64::from(r * r - dy * dy) * inv_r2).sqrt()).round() as i32;
            let j1 = (c - dx).max(0);
            let j2 = (c + dx + 1).min(w);
            for j in j1..j2 {
                offsets.push((j - c, dy));
            }
        }

        Self {
            width,
            height,
            offsets,
        }
    }

    /// Full rectangular element anchored at the center.
    #[cfg(test)]
    fn rect(width: u32, height: u32) -> Self {
        let cx = i32::try_from(width / 2).unwrap_or(0);
        let cy = i32::try_from(height / 2).unwrap_or(0);
        let mut offsets = Vec::new();
        for y in 0..i32::try_from(height).unwrap_or(0) {
            for x in 0..i32::try_from(width).unwrap_or(0) {
                offsets.push((x - cx, y - cy));
            }
        }
        Self {
            width,
            height,
            offsets,
        }
    }

    /// Bounding box width.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Bounding box height.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Hit offsets `(dx, dy)` relative to the anchor.
    pub fn offsets(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.offsets.iter().copied()
    }
}

/// Destination columns reached by a horizontal shift of `dx`, plus the first source column.
fn column_span(width: usize, dx: i32) -> Option<(Range<usize>, usize)> {
    let shift = dx.unsigned_abs() as usize;
    if shift >= width {
        return None;
    }
    Some(if dx >= 0 {
        (0..width - shift, shift)
    } else {
        (shift..width, 0)
    })
}

fn source_row(y: usize, dy: i32, height: usize) -> Option<usize> {
    let sy = if dy >= 0 {
        y.checked_add(dy.unsigned_abs() as usize)?
    } else {
        y.checked_sub(dy.unsigned_abs() as usize)?
    };
    (sy < height).then_some(sy)
}

fn dilate_once(src: &Mask, kernel: &Kernel) -> Mask {
    let width = src.width() as usize;
    let height = src.height() as usize;
    let mut out = Mask::new(src.width(), src.height());
    let src_data = src.as_slice();
    let dst_data = out.as_mut_slice();

    for (dx, dy) in kernel.offsets() {
        let Some((cols, src_x)) = column_span(width, dx) else {
            continue;
        };
        let len = cols.len();
        for y in 0..height {
            let Some(sy) = source_row(y, dy, height) else {
                continue;
            };
            let dst_row = &mut dst_data[y * width + cols.start..y * width + cols.end];
            let src_row = &src_data[sy * width + src_x..sy * width + src_x + len];
            for (d, &s) in dst_row.iter_mut().zip(src_row) {
                *d |= s;
            }
        }
    }
    out
}

fn erode_once(src: &Mask, kernel: &Kernel) -> Mask {
    let width = src.width() as usize;
    let height = src.height() as usize;
    let mut out = Mask::from_fn(src.width(), src.height(), |_, _| true);
    let src_data = src.as_slice();
    let dst_data = out.as_mut_slice();

    for (dx, dy) in kernel.offsets() {
        let Some((cols, src_x)) = column_span(width, dx) else {
            continue;
        };
        let len = cols.len();
        for y in 0..height {
            let Some(sy) = source_row(y, dy, height) else {
                continue;
            };
            let dst_row = &mut dst_data[y * width + cols.start..y * width + cols.end];
            let src_row = &src_data[sy * width + src_x..sy * width + src_x + len];
            for (d, &s) in dst_row.iter_mut().zip(src_row) {
                *d &= s;
            }
        }
    }
    out
}

/// Dilate `mask` by `kernel`, `iterations` times.
#[must_use]
pub fn dilate(mask: &Mask, kernel: &Kernel, iterations: u32) -> Mask {
    (0..iterations).fold(mask.clone(), |acc, _| dilate_once(&acc, kernel))
}

/// Erode `mask` by `kernel`, `iterations` times.
#[must_use]
pub fn erode(mask: &Mask, kernel: &Kernel, iterations: u32) -> Mask {
    (0..iterations).fold(mask.clone(), |acc, _| erode_once(&acc, kernel))
}

/// Morphological closing: `iterations` dilations followed by as many erosions.
#[must_use]
pub fn close(mask: &Mask, kernel: &Kernel, iterations: u32) -> Mask {
    erode(&dilate(mask, kernel, iterations), kernel, iterations)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(kernel: &Kernel) -> Vec<String> {
        let cx = i32::try_from(kernel.width() / 2).unwrap();
        let cy = i32::try_from(kernel.height() / 2).unwrap();
        let hits: Vec<_> = kernel.offsets().collect();
        (0..i32::try_from(kernel.height()).unwrap())
            .map(|y| {
                (0..i32::try_from(kernel.width()).unwrap())
                    .map(|x| {
                        if hits.contains(&(x - cx, y - cy)) {
                            'x'
                        } else {
                            '.'
                        }
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn ellipse_5x5_shape() {
        let kernel = Kernel::ellipse(5, 5);
        assert_eq!(
            render(&kernel),
            vec!["..x..", "xxxxx", "xxxxx", "xxxxx", "..x.."]
        );
        assert_eq!(kernel.offsets().count(), 17);
    }

    #[test]
    fn ellipse_3x3_is_a_cross() {
        let kernel = Kernel::ellipse(3, 3);
        assert_eq!(render(&kernel), vec![".x.", "xxx", ".x."]);
    }

    #[test]
    fn dilating_a_point_stamps_the_kernel() {
        let mut mask = Mask::new(9, 9);
        mask.set(4, 4, true);
        let kernel = Kernel::ellipse(5, 5);
        let out = dilate(&mask, &kernel, 1);

        assert_eq!(out.count(), 17);
        assert!(out.get(2, 4));
        assert!(out.get(4, 2));
        assert!(out.get(2, 3));
        assert!(!out.get(2, 2));
    }

    #[test]
    fn dilation_is_clipped_at_the_border() {
        let mut mask = Mask::new(4, 4);
        mask.set(0, 0, true);
        let out = dilate(&mask, &Kernel::rect(3, 3), 1);
        assert_eq!(out.count(), 4);
    }

    #[test]
    fn erosion_ignores_the_border() {
        let full = Mask::from_fn(6, 6, |_, _| true);
        let out = erode(&full, &Kernel::ellipse(5, 5), 3);
        assert_eq!(out, full);
    }

    #[test]
    fn erosion_shrinks_interior_blocks() {
        let mask = Mask::from_fn(20, 20, |x, y| (5..15).contains(&x) && (5..15).contains(&y));
        let out = erode(&mask, &Kernel::rect(3, 3), 1);
        assert!(out.get(6, 6));
        assert!(!out.get(5, 5));
        assert_eq!(out.count(), 64);
    }

    #[test]
    fn closing_fills_a_one_pixel_gap() {
        let mask = Mask::from_fn(40, 30, |x, y| {
            (10..=19).contains(&y) && ((10..=19).contains(&x) || (21..=30).contains(&x))
        });
        assert!(!mask.get(20, 15));

        let closed = close(&mask, &Kernel::ellipse(5, 5), 1);
        assert!(closed.get(20, 15));
        assert!(mask.is_subset_of(&closed));
        assert!(!closed.get(5, 5));
    }

    #[test]
    fn zero_iterations_is_identity() {
        let mask = Mask::from_fn(5, 5, |x, y| x == y);
        assert_eq!(dilate(&mask, &Kernel::ellipse(5, 5), 0), mask);
        assert_eq!(erode(&mask, &Kernel::ellipse(5, 5), 0), mask);
    }
}

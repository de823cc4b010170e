//! Per-pixel color helpers shared by the detection, refinement and compositing stages.

use image::Rgb;

/// A single 8-bit RGB color.
pub type Color = Rgb<u8>;

/// Pure white.
pub const WHITE: Color = Rgb([255, 255, 255]);

/// Difference between the largest and smallest channel of a pixel.
///
/// Used as a cheap colorfulness proxy: neutral grays have a spread of zero.
#[must_use]
pub fn channel_spread(px: Color) -> u8 {
    let [r, g, b] = px.0;
    r.max(g).max(b) - r.min(g).min(b)
}

/// Sum of the three channels of a pixel.
#[must_use]
pub fn channel_sum(px: Color) -> u32 {
    px.0.iter().map(|&c| u32::from(c)).sum()
}

/// An 8-bit HSV triple.
///
/// `value` is the maximum channel and `saturation` is `255 * (max - min) / max`,
/// both in `0..=255`. Hue is kept in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    /// Hue in degrees, `[0, 360)`.
    pub hue: f32,
    /// Saturation, `0..=255`.
    pub saturation: u8,
    /// Value (brightness), `0..=255`.
    pub value: u8,
}

impl Hsv {
    /// Convert an RGB pixel to HSV.
    #[must_use]
    pub fn from_rgb(px: Color) -> Self {
        let [r, g, b] = px.0;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = f32::from(max - min);

        let saturation = if max == 0 {
            0
        } else {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                (255.0 * delta / f32::from(max)).round() as u8
            }
        };

        let (rf, gf, bf) = (f32::from(r), f32::from(g), f32::from(b));
        let hue = if max == min {
            0.0
        } else if max == r {
            60.0 * ((gf - bf) / delta)
        } else if max == g {
            60.0 * ((bf - rf) / delta + 2.0)
        } else {
            60.0 * ((rf - gf) / delta + 4.0)
        };
        let hue = if hue < 0.0 { hue + 360.0 } else { hue };

        Self {
            hue,
            saturation,
            value: max,
        }
    }

    /// The same color with its saturation removed.
    #[must_use]
    pub fn desaturated(self) -> Self {
        Self {
            saturation: 0,
            ..self
        }
    }

    /// Convert back to RGB.
    #[must_use]
    pub fn to_rgb(self) -> Color {
        if self.saturation == 0 {
            return Rgb([self.value; 3]);
        }

        let v = f32::from(self.value);
        let s = f32::from(self.saturation) / 255.0;
        let sector = (self.hue / 60.0).rem_euclid(6.0);
        let f = sector - sector.floor();
        let p = v * (1.0 - s);
        let q = v * (1.0 - s * f);
        let t = v * (1.0 - s * (1.0 - f));

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (r, g, b) = match sector as u8 {
            0 => (v, t, p),
            1 => (q, v, p),
            2 => (p, v, t),
            3 => (p, q, v),
            4 => (t, p, v),
            _ => (v, p, q),
        };

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let to_u8 = |c: f32| c.round().clamp(0.0, 255.0) as u8;
        Rgb([to_u8(r), to_u8(g), to_u8(b)])
    }
}

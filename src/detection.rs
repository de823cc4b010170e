//! Watermark color inference from a coarse color histogram.
//!
//! Watermark overlays are light and carry a deliberate hue offset from gray,
//! while text is dark and page background is neutral. The detector scans the
//! histogram from the most frequent bin down and returns the first bin that is
//! neither dark nor gray.

use image::{Rgb, RgbImage};

use crate::color::{channel_spread, channel_sum, Color};

/// Buckets per channel.
pub const BINS_PER_CHANNEL: usize = 8;
/// Channel levels covered by one bucket.
const BUCKET_WIDTH: u8 = 32;
/// Total number of joint histogram bins.
pub const BIN_COUNT: usize = BINS_PER_CHANNEL * BINS_PER_CHANNEL * BINS_PER_CHANNEL;

/// One cell of the 8x8x8 color histogram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramBin {
    /// Flat bin index, `r * 64 + g * 8 + b`.
    pub index: usize,
    /// Number of pixels falling in this bin.
    pub count: u64,
    /// Share of image pixels falling in this bin, in `[0, 1]`.
    ///
    /// Informational only; ranking uses [`HistogramBin::count`].
    pub frequency: f32,
    /// Bucket midpoint color.
    pub center: Color,
}

impl HistogramBin {
    fn new(index: usize, count: u64, total: u64) -> Self {
        let bucket = |i: usize| {
            // i < 8, so the product fits in u8.
            #[allow(clippy::cast_possible_truncation)]
            let i = i as u8;
            i * BUCKET_WIDTH + BUCKET_WIDTH / 2
        };
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
        let frequency = if total == 0 {
            0.0
        } else {
            (count as f64 / total as f64) as f32
        };
        let r = index / (BINS_PER_CHANNEL * BINS_PER_CHANNEL);
        let g = (index / BINS_PER_CHANNEL) % BINS_PER_CHANNEL;
        let b = index % BINS_PER_CHANNEL;
        Self {
            index,
            count,
            frequency,
            center: Rgb([bucket(r), bucket(g), bucket(b)]),
        }
    }
}

fn bin_counts(image: &RgbImage) -> Vec<u64> {
    let mut counts = vec![0u64; BIN_COUNT];
    for px in image.pixels() {
        let [r, g, b] = px.0.map(|c| usize::from(c / BUCKET_WIDTH));
        counts[r * BINS_PER_CHANNEL * BINS_PER_CHANNEL + g * BINS_PER_CHANNEL + b] += 1;
    }
    counts
}

fn bins_from_counts(counts: &[u64]) -> Vec<HistogramBin> {
    let total = counts.iter().sum();
    counts
        .iter()
        .enumerate()
        .map(|(index, &count)| HistogramBin::new(index, count, total))
        .collect()
}

/// Build the normalized joint histogram of an image.
///
/// Frequencies are divided by the pixel count so they are comparable across
/// image sizes. An empty image yields all-zero bins.
#[must_use]
pub fn color_histogram(image: &RgbImage) -> Vec<HistogramBin> {
    bins_from_counts(&bin_counts(image))
}

/// Sort bins by descending pixel count, breaking ties by ascending index.
fn rank_bins(bins: &mut [HistogramBin]) {
    bins.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.index.cmp(&b.index)));
}

/// Whether a bin center looks like a watermark tint rather than text or paper.
fn is_candidate(center: Color, min_sum: u32, min_spread: u8) -> bool {
    channel_sum(center) >= min_sum && channel_spread(center) >= min_spread
}

/// Infer the watermark color of an image.
///
/// Returns the center of the most frequent populated bin whose channel sum is
/// at least `min_sum` and whose channel spread is at least `min_spread`, or
/// `fallback` when no bin qualifies.
#[must_use]
pub fn detect_watermark_color(
    image: &RgbImage,
    min_sum: u32,
    min_spread: u8,
    fallback: Color,
) -> Color {
    pick_color(color_histogram(image), min_sum, min_spread, fallback)
}

fn pick_color(
    mut bins: Vec<HistogramBin>,
    min_sum: u32,
    min_spread: u8,
    fallback: Color,
) -> Color {
    rank_bins(&mut bins);
    bins.iter()
        .take_while(|bin| bin.count > 0)
        .find(|bin| is_candidate(bin.center, min_sum, min_spread))
        .map_or(fallback, |bin| bin.center)
}

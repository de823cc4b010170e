//! Core watermark removal engine and document batch driver.

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use log::{debug, info, warn};

use crate::color::Color;
use crate::composite;
use crate::detection;
use crate::document::{self, Diagnostic, Encoder, Rasterizer};
use crate::error::{Error, Result};
use crate::mask::{self, Mask, MaskParams};
use crate::refine;

/// Stage directory holding rendered pages in debug mode.
pub const EXTRACTED_STAGE: &str = "images_extracted";
/// Stage directory holding cleaned pages in debug mode.
pub const CLEANED_STAGE: &str = "images_cleaned";

/// Thresholds of the cleaning algorithm.
///
/// The defaults were tuned on scanned office documents with a light pink or
/// blue diagonal overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanOptions {
    /// Color used when no histogram bin qualifies as a watermark tint.
    pub fallback_color: Color,
    /// Minimum channel sum of a candidate bin center (rejects dark text).
    pub min_color_sum: u32,
    /// Minimum channel spread of a candidate bin center (rejects gray paper).
    pub min_color_spread: u8,
    /// Per-channel tolerance of the first band.
    pub base_tolerance: u8,
    /// Number of tolerance bands unioned into the mask.
    pub tolerance_bands: u8,
    /// Side of the elliptical structuring element.
    pub kernel_size: u32,
    /// Closing passes over the raw mask.
    pub close_iterations: u32,
    /// Dilation passes after closing.
    pub dilate_iterations: u32,
    /// Highest desaturated saturation still counted as overlay.
    pub max_saturation: u8,
    /// Lowest value (brightness) still counted as overlay.
    pub min_value: u8,
    /// Original channel spread at which overlay residue is painted white.
    pub whiten_spread: u8,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            fallback_color: Rgb([230, 230, 230]),
            min_color_sum: 150,
            min_color_spread: 20,
            base_tolerance: 80,
            tolerance_bands: 3,
            kernel_size: 5,
            close_iterations: 1,
            dilate_iterations: 5,
            max_saturation: 30,
            min_value: 175,
            whiten_spread: 50,
        }
    }
}

impl CleanOptions {
    fn mask_params(&self) -> MaskParams {
        MaskParams {
            base_tolerance: self.base_tolerance,
            bands: self.tolerance_bands,
            kernel_size: self.kernel_size,
            close_iterations: self.close_iterations,
            dilate_iterations: self.dilate_iterations,
        }
    }
}

/// Options controlling document processing.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// Render resolution in dots per inch.
    pub dpi: u32,
    /// Persist every stage's pages as PNG files under [`ProcessOptions::work_dir`].
    pub debug: bool,
    /// Root for debug stage directories.
    pub work_dir: PathBuf,
    /// Enable verbose logging.
    pub verbose: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Algorithm thresholds.
    pub clean: CleanOptions,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            dpi: 300,
            debug: false,
            work_dir: PathBuf::from("."),
            verbose: false,
            quiet: false,
            clean: CleanOptions::default(),
        }
    }
}

/// How a page left the cleaning pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanOutcome {
    /// The mask was empty and the page was returned as-is.
    Unchanged {
        /// Detected (or fallback) watermark color.
        color: Color,
    },
    /// The page went through refinement and compositing.
    Cleaned {
        /// Detected (or fallback) watermark color.
        color: Color,
        /// Pixels in the candidate mask.
        masked: usize,
        /// Pixels treated as watermark overlay.
        refined: usize,
        /// Pixels preserved as foreground.
        text: usize,
    },
}

impl CleanOutcome {
    /// Whether compositing ran.
    #[must_use]
    pub fn is_cleaned(&self) -> bool {
        matches!(self, Self::Cleaned { .. })
    }

    /// The watermark color used for the mask.
    #[must_use]
    pub fn color(&self) -> Color {
        match *self {
            Self::Unchanged { color } | Self::Cleaned { color, .. } => color,
        }
    }
}

/// A cleaned page image and its outcome.
#[derive(Debug, Clone)]
pub struct CleanedPage {
    /// The output image.
    pub image: RgbImage,
    /// What the pipeline did.
    pub outcome: CleanOutcome,
}

/// Per-page record of a processed document.
#[derive(Debug, Clone)]
pub struct PageReport {
    /// Zero-based page index.
    pub index: usize,
    /// What the pipeline did.
    pub outcome: CleanOutcome,
    /// Render and decode events for this page.
    pub diagnostics: Vec<Diagnostic>,
}

/// Result of processing a single document.
#[derive(Debug)]
pub struct DocumentResult {
    /// Path of the input document.
    pub path: PathBuf,
    /// Path the cleaned document was (or would have been) written to.
    pub output: PathBuf,
    /// Whether a cleaned document was written.
    pub success: bool,
    /// Page records in page order. Empty on failure.
    pub pages: Vec<PageReport>,
    /// Human-readable status message.
    pub message: String,
}

impl DocumentResult {
    /// Number of pages that went through compositing.
    #[must_use]
    pub fn cleaned_pages(&self) -> usize {
        self.pages.iter().filter(|p| p.outcome.is_cleaned()).count()
    }

    /// Number of pages replaced by a placeholder.
    #[must_use]
    pub fn placeholder_pages(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| {
                p.diagnostics
                    .iter()
                    .any(|d| d.kind == document::DiagnosticKind::Placeholder)
            })
            .count()
    }
}

/// Results of a batch, in input order.
#[derive(Debug, Default)]
pub struct BatchSummary {
    /// One entry per input document.
    pub documents: Vec<DocumentResult>,
}

impl BatchSummary {
    /// Number of documents written successfully.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.documents.iter().filter(|d| d.success).count()
    }

    /// Number of documents that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.documents.len() - self.succeeded()
    }

    /// A batch succeeds when at least one document succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.succeeded() > 0
    }
}

/// The watermark engine.
///
/// Holds the algorithm thresholds; create once and reuse for every page. All
/// methods take `&self`, so one engine can serve parallel workers.
#[derive(Debug, Clone, Default)]
pub struct WatermarkEngine {
    options: CleanOptions,
}

impl WatermarkEngine {
    /// Create an engine with the default thresholds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with custom thresholds.
    #[must_use]
    pub fn with_options(options: CleanOptions) -> Self {
        Self { options }
    }

    /// The thresholds in use.
    #[must_use]
    pub fn options(&self) -> &CleanOptions {
        &self.options
    }

    /// Infer the watermark color of an image.
    #[must_use]
    pub fn detect_color(&self, image: &RgbImage) -> Color {
        detection::detect_watermark_color(
            image,
            self.options.min_color_sum,
            self.options.min_color_spread,
            self.options.fallback_color,
        )
    }

    /// Build the candidate watermark mask for `color`.
    #[must_use]
    pub fn build_mask(&self, image: &RgbImage, color: Color) -> Mask {
        mask::build_watermark_mask(image, color, &self.options.mask_params())
    }

    /// Run the full pipeline on one page.
    ///
    /// The input is never modified. An empty mask short-circuits and returns a
    /// copy of the input.
    #[must_use]
    pub fn clean(&self, image: &RgbImage) -> CleanedPage {
        let color = self.detect_color(image);
        let mask = self.build_mask(image, color);

        if mask.is_empty() {
            return CleanedPage {
                image: image.clone(),
                outcome: CleanOutcome::Unchanged { color },
            };
        }

        let refinement = refine::refine_mask(
            image,
            &mask,
            self.options.max_saturation,
            self.options.min_value,
        );
        let cleaned = composite::composite(image, &refinement, self.options.whiten_spread);

        CleanedPage {
            image: cleaned,
            outcome: CleanOutcome::Cleaned {
                color,
                masked: mask.count(),
                refined: refinement.refined.count(),
                text: refinement.text.count(),
            },
        }
    }

    /// Clean every page. Result `i` always belongs to page `i`.
    ///
    /// Uses parallel iteration when the `cli` feature is enabled (via rayon).
    #[must_use]
    pub fn clean_pages(&self, pages: &[RgbImage]) -> Vec<CleanedPage> {
        #[cfg(feature = "cli")]
        {
            use rayon::prelude::*;
            pages.par_iter().map(|page| self.clean(page)).collect()
        }

        #[cfg(not(feature = "cli"))]
        {
            pages.iter().map(|page| self.clean(page)).collect()
        }
    }

    /// Rasterize, clean and reassemble one document.
    ///
    /// Never panics on document errors; failures are reported in the returned
    /// [`DocumentResult`].
    #[must_use]
    pub fn process_document(
        &self,
        rasterizer: &dyn Rasterizer,
        encoder: &dyn Encoder,
        input: &Path,
        output: &Path,
        opts: &ProcessOptions,
    ) -> DocumentResult {
        let mut result = DocumentResult {
            path: input.to_path_buf(),
            output: output.to_path_buf(),
            success: false,
            pages: Vec::new(),
            message: String::new(),
        };

        match self.run_document(rasterizer, encoder, input, output, opts) {
            Ok(pages) => {
                result.pages = pages;
                result.success = true;
                result.message = "Watermark removed".to_string();
                log_pages(input, &result.pages);
                info!(
                    "{}: {} pages, {} cleaned -> {}",
                    input.display(),
                    result.pages.len(),
                    result.cleaned_pages(),
                    output.display()
                );
            }
            Err(e) => {
                warn!("{}: {e}", input.display());
                result.message = e.to_string();
            }
        }

        result
    }

    fn run_document(
        &self,
        rasterizer: &dyn Rasterizer,
        encoder: &dyn Encoder,
        input: &Path,
        output: &Path,
        opts: &ProcessOptions,
    ) -> Result<Vec<PageReport>> {
        let rasterized = rasterizer.rasterize(input, opts.dpi)?;
        let stage_root = opts.debug.then(|| stage_root(&opts.work_dir, input));

        let pages = match &stage_root {
            Some(root) => {
                let dir = root.join(EXTRACTED_STAGE);
                document::write_stage(&dir, &rasterized.pages)?;
                document::read_stage(&dir)?
            }
            None => rasterized.pages,
        };

        let cleaned = self.clean_pages(&pages);
        drop(pages);

        let mut diagnostics = rasterized.diagnostics;
        let mut reports = Vec::with_capacity(cleaned.len());
        let mut images = Vec::with_capacity(cleaned.len());
        for (index, page) in cleaned.into_iter().enumerate() {
            let (own, rest): (Vec<_>, Vec<_>) =
                diagnostics.into_iter().partition(|d| d.page == index);
            diagnostics = rest;
            reports.push(PageReport {
                index,
                outcome: page.outcome,
                diagnostics: own,
            });
            images.push(page.image);
        }

        let images = match &stage_root {
            Some(root) => {
                let dir = root.join(CLEANED_STAGE);
                document::write_stage(&dir, &images)?;
                document::read_stage(&dir)?
            }
            None => images,
        };

        if images.is_empty() {
            return Err(Error::Reassembly {
                path: output.to_path_buf(),
            });
        }
        encoder.encode(&images, opts.dpi, output)?;

        Ok(reports)
    }

    /// Process every document in `inputs`, writing each to `output_dir` under
    /// its own file name.
    ///
    /// A failing document never stops the batch.
    #[must_use]
    pub fn process_batch(
        &self,
        rasterizer: &dyn Rasterizer,
        encoder: &dyn Encoder,
        inputs: &[PathBuf],
        output_dir: &Path,
        opts: &ProcessOptions,
    ) -> BatchSummary {
        let documents: Vec<DocumentResult> = inputs
            .iter()
            .map(|input| {
                let output = default_output_path(input, output_dir);
                self.process_document(rasterizer, encoder, input, &output, opts)
            })
            .collect();

        let summary = BatchSummary { documents };
        info!(
            "batch finished: {} of {} documents succeeded",
            summary.succeeded(),
            summary.documents.len()
        );
        summary
    }
}

fn log_pages(input: &Path, pages: &[PageReport]) {
    for page in pages {
        for diagnostic in &page.diagnostics {
            warn!("{}: {diagnostic}", input.display());
        }
        match page.outcome {
            CleanOutcome::Unchanged { color } => debug!(
                "{} page {}: no watermark pixels for {:?}, unchanged",
                input.display(),
                page.index + 1,
                color.0
            ),
            CleanOutcome::Cleaned {
                color,
                masked,
                refined,
                text,
            } => debug!(
                "{} page {}: color {:?}, masked {masked}, refined {refined}, text {text}",
                input.display(),
                page.index + 1,
                color.0
            ),
        }
    }
}

/// Stage directory root for a document: `<work_dir>/<document stem>`.
#[must_use]
pub fn stage_root(work_dir: &Path, input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    work_dir.join(stem.as_ref())
}

/// Output path for a document: `output_dir` joined with the input's file name.
#[must_use]
pub fn default_output_path(input: &Path, output_dir: &Path) -> PathBuf {
    output_dir.join(input.file_name().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watermarked_page() -> RgbImage {
        let mut img = RgbImage::from_pixel(60, 60, Rgb([255, 255, 255]));
        for y in 0..60 {
            for x in 0..60 {
                if (x + y) % 12 < 4 {
                    img.put_pixel(x, y, Rgb([250, 190, 190]));
                }
            }
        }
        for x in 10..50 {
            img.put_pixel(x, 30, Rgb([20, 20, 20]));
        }
        img
    }

    #[test]
    fn default_options_match_documented_values() {
        let opts = CleanOptions::default();
        assert_eq!(opts.fallback_color, Rgb([230, 230, 230]));
        assert_eq!(opts.base_tolerance, 80);
        assert_eq!(opts.tolerance_bands, 3);
        assert_eq!(opts.max_saturation, 30);
        assert_eq!(opts.min_value, 175);
        assert_eq!(opts.whiten_spread, 50);
    }

    #[test]
    fn clean_removes_tint_and_keeps_text() {
        let engine = WatermarkEngine::new();
        let img = watermarked_page();
        let page = engine.clean(&img);

        assert!(page.outcome.is_cleaned());
        assert_eq!(page.outcome.color(), Rgb([240, 176, 176]));
        assert_eq!(*page.image.get_pixel(0, 0), Rgb([255, 255, 255]));
        assert_eq!(*page.image.get_pixel(20, 30), Rgb([20, 20, 20]));
        assert!(page
            .image
            .pixels()
            .all(|px| *px == Rgb([255, 255, 255]) || *px == Rgb([20, 20, 20])));
    }

    #[test]
    fn cleaned_outcome_counts_partition_the_mask() {
        let engine = WatermarkEngine::new();
        let page = engine.clean(&watermarked_page());
        match page.outcome {
            CleanOutcome::Cleaned {
                masked,
                refined,
                text,
                ..
            } => {
                assert_eq!(masked, refined + text);
                assert_eq!(text, 40);
            }
            CleanOutcome::Unchanged { .. } => panic!("expected a cleaned page"),
        }
    }

    #[test]
    fn empty_mask_returns_input_unchanged() {
        let engine = WatermarkEngine::with_options(CleanOptions {
            base_tolerance: 5,
            tolerance_bands: 1,
            ..CleanOptions::default()
        });
        let img = RgbImage::from_fn(40, 40, |x, _| {
            if x % 2 == 0 {
                Rgb([10, 10, 10])
            } else {
                Rgb([90, 60, 140])
            }
        });

        let page = engine.clean(&img);
        assert_eq!(
            page.outcome,
            CleanOutcome::Unchanged {
                color: Rgb([80, 48, 144])
            }
        );
        assert_eq!(page.image, img);
    }

    #[test]
    fn white_page_passes_through() {
        let engine = WatermarkEngine::new();
        let img = RgbImage::from_pixel(50, 50, Rgb([255, 255, 255]));
        let page = engine.clean(&img);
        assert_eq!(page.outcome.color(), Rgb([230, 230, 230]));
        assert_eq!(page.image, img);
    }

    #[test]
    fn clean_pages_keeps_page_order() {
        let engine = WatermarkEngine::new();
        let pages: Vec<RgbImage> = (0..8u8)
            .map(|i| RgbImage::from_pixel(10, 10, Rgb([i * 10, i * 10, i * 10])))
            .collect();
        let cleaned = engine.clean_pages(&pages);

        assert_eq!(cleaned.len(), pages.len());
        for (page, out) in pages.iter().zip(&cleaned) {
            assert_eq!(&out.image, page);
        }
    }

    #[test]
    fn batch_success_needs_one_document() {
        let mut summary = BatchSummary::default();
        assert!(!summary.is_success());

        summary.documents.push(DocumentResult {
            path: PathBuf::from("a.pdf"),
            output: PathBuf::from("out/a.pdf"),
            success: false,
            pages: Vec::new(),
            message: "broken".to_string(),
        });
        assert!(!summary.is_success());
        assert_eq!(summary.failed(), 1);

        summary.documents.push(DocumentResult {
            path: PathBuf::from("b.pdf"),
            output: PathBuf::from("out/b.pdf"),
            success: true,
            pages: Vec::new(),
            message: String::new(),
        });
        assert!(summary.is_success());
        assert_eq!(summary.succeeded(), 1);
    }

    #[test]
    fn output_and_stage_paths() {
        let input = Path::new("/docs/report.pdf");
        assert_eq!(
            default_output_path(input, Path::new("output")),
            PathBuf::from("output/report.pdf")
        );
        assert_eq!(
            stage_root(Path::new("/tmp/work"), input),
            PathBuf::from("/tmp/work/report")
        );
    }
}

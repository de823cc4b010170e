//! Document-level plumbing: rasterizer and encoder seams, placeholder pages,
//! ordered fallback strategies, and the on-disk page stages used in debug mode.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};

use crate::error::{Error, Result};

/// Default placeholder page width, in inches (US Letter).
pub const PLACEHOLDER_WIDTH_IN: f32 = 8.5;
/// Default placeholder page height, in inches (US Letter).
pub const PLACEHOLDER_HEIGHT_IN: f32 = 11.0;
/// Highest supported render resolution. A placeholder page at this DPI is
/// about 1.6 GB of RGB data.
pub const MAX_DPI: u32 = 2400;

/// What a [`Diagnostic`] is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A render strategy failed and the next one was tried.
    RenderFallback,
    /// A bitmap decode strategy failed and the next one was tried.
    DecodeFallback,
    /// A page could not be produced and a blank placeholder was substituted.
    Placeholder,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RenderFallback => "render fallback",
            Self::DecodeFallback => "decode fallback",
            Self::Placeholder => "placeholder",
        })
    }
}

/// A structured note recorded while producing a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Zero-based page index.
    pub page: usize,
    /// Category of the event.
    pub kind: DiagnosticKind,
    /// Human-readable detail.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page {}: {}: {}", self.page + 1, self.kind, self.message)
    }
}

/// Pages produced by a [`Rasterizer`], in document order.
#[derive(Debug, Default)]
pub struct RasterizedDocument {
    /// One image per page. Failed pages hold a [`blank_page`].
    pub pages: Vec<RgbImage>,
    /// Fallbacks and substitutions recorded while rendering.
    pub diagnostics: Vec<Diagnostic>,
}

/// Turns a paged document into one RGB raster per page.
pub trait Rasterizer {
    /// Render every page of `path` at `dpi`.
    ///
    /// Page-level failures must be replaced by [`blank_page`] and reported in
    /// [`RasterizedDocument::diagnostics`] instead of failing the document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DocumentOpen`] if the document cannot be opened.
    fn rasterize(&self, path: &Path, dpi: u32) -> Result<RasterizedDocument>;
}

/// Writes an ordered sequence of page images as a paged document.
pub trait Encoder {
    /// Write `pages` to `output`, one image per page, in the given order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Reassembly`] if `pages` is empty, or an I/O error if
    /// the output cannot be written.
    fn encode(&self, pages: &[RgbImage], dpi: u32, output: &Path) -> Result<()>;
}

/// A white page of the default size at `dpi`.
///
/// `dpi` should not exceed [`MAX_DPI`]; far larger values overflow the image
/// buffer size.
#[must_use]
pub fn blank_page(dpi: u32) -> RgbImage {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let (width, height) = (
        (PLACEHOLDER_WIDTH_IN * dpi as f32) as u32,
        (PLACEHOLDER_HEIGHT_IN * dpi as f32) as u32,
    );
    RgbImage::from_pixel(width, height, Rgb([255, 255, 255]))
}

/// Try `strategies` in order until one succeeds.
///
/// Each failed attempt is recorded in `diagnostics` as `kind`. Returns the
/// error of the last attempt if every strategy fails.
///
/// # Errors
///
/// Returns the last strategy's error, or [`Error::PageRender`] when
/// `strategies` is empty.
pub fn first_success<S, T, F>(
    strategies: &[S],
    page: usize,
    kind: DiagnosticKind,
    diagnostics: &mut Vec<Diagnostic>,
    mut attempt: F,
) -> Result<T>
where
    S: Copy + fmt::Debug,
    F: FnMut(S) -> Result<T>,
{
    let mut last_error = None;
    for &strategy in strategies {
        match attempt(strategy) {
            Ok(value) => return Ok(value),
            Err(e) => {
                diagnostics.push(Diagnostic {
                    page,
                    kind,
                    message: format!("{strategy:?} failed: {e}"),
                });
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| Error::PageRender {
        page,
        reason: "no strategies to try".to_string(),
    }))
}

/// Produce `page_count` pages with `render`, substituting [`blank_page`] for
/// every page that fails.
///
/// `render` receives the page index and the diagnostics list so it can record
/// its own fallbacks. A failed page is recorded as
/// [`DiagnosticKind::Placeholder`] and never stops later pages.
#[must_use]
pub fn rasterize_pages<F>(page_count: usize, dpi: u32, mut render: F) -> RasterizedDocument
where
    F: FnMut(usize, &mut Vec<Diagnostic>) -> Result<RgbImage>,
{
    let mut out = RasterizedDocument {
        pages: Vec::with_capacity(page_count),
        diagnostics: Vec::new(),
    };
    for index in 0..page_count {
        match render(index, &mut out.diagnostics) {
            Ok(image) => out.pages.push(image),
            Err(e) => {
                out.diagnostics.push(Diagnostic {
                    page: index,
                    kind: DiagnosticKind::Placeholder,
                    message: e.to_string(),
                });
                out.pages.push(blank_page(dpi));
            }
        }
    }
    out
}

/// File name for a persisted page: `page_NNN.png`, 1-based.
///
/// The index is zero-padded to at least three digits, and wider when the
/// document has more pages, so lexicographic order is page order.
#[must_use]
pub fn page_file_name(index: usize, page_count: usize) -> String {
    let width = page_count.max(1).to_string().len().max(3);
    format!("page_{:0width$}.png", index + 1)
}

/// Replace the contents of `dir` with one PNG per page.
///
/// # Errors
///
/// Returns an error if the directory cannot be recreated or a page cannot be
/// written.
pub fn write_stage(dir: &Path, pages: &[RgbImage]) -> Result<Vec<PathBuf>> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;

    pages
        .iter()
        .enumerate()
        .map(|(index, page)| -> Result<PathBuf> {
            let path = dir.join(page_file_name(index, pages.len()));
            page.save_with_format(&path, image::ImageFormat::Png)?;
            Ok(path)
        })
        .collect()
}

/// Page files in `dir`, sorted by file name.
///
/// # Errors
///
/// Returns an error if `dir` cannot be read.
pub fn stage_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("page_") && n.ends_with(".png"))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Load every page file of `dir` in file-name order.
///
/// # Errors
///
/// Returns an error if the directory or any page cannot be read.
pub fn read_stage(dir: &Path) -> Result<Vec<RgbImage>> {
    stage_files(dir)?
        .iter()
        .map(|path| -> Result<RgbImage> { Ok(image::open(path)?.to_rgb8()) })
        .collect()
}

/// Check if a file has a `.pdf` extension.
#[must_use]
pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// All PDF files directly inside `dir`, sorted by path.
///
/// # Errors
///
/// Returns an error if `dir` cannot be read.
pub fn find_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut docs: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
        .map(|e| e.path())
        .filter(|p| is_pdf(p))
        .collect();
    docs.sort();
    Ok(docs)
}

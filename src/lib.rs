//! Remove light colored watermark overlays from scanned PDF documents.
//!
//! Each page is rendered to a raster image, and the overlay's tint is inferred
//! from a coarse color histogram. Pixels near that tint are masked, and the mask
//! is split into overlay and foreground content. Overlay pixels are desaturated
//! or painted white while text keeps its original pixels, and the cleaned pages
//! are reassembled into a new PDF.
//!
//! # Quick Start
//!
//! ```no_run
//! use pdf_watermark_removal::WatermarkEngine;
//!
//! let engine = WatermarkEngine::new();
//! let img = image::open("page.png").unwrap().to_rgb8();
//! let page = engine.clean(&img);
//! page.image.save("cleaned.png").unwrap();
//! ```
//!
//! # Documents
//!
//! Whole documents go through a [`Rasterizer`] and an [`Encoder`]. With the
//! `pdfium` feature, [`pdf::PdfiumRasterizer`] renders pages through the
//! Pdfium library and [`PdfEncoder`] writes one image per page.
//!
//! ```no_run
//! # #[cfg(feature = "pdfium")]
//! # fn main() -> pdf_watermark_removal::Result<()> {
//! use std::path::Path;
//! use pdf_watermark_removal::pdf::PdfiumRasterizer;
//! use pdf_watermark_removal::{PdfEncoder, ProcessOptions, WatermarkEngine};
//!
//! let engine = WatermarkEngine::new();
//! let rasterizer = PdfiumRasterizer::new()?;
//! let result = engine.process_document(
//!     &rasterizer,
//!     &PdfEncoder,
//!     Path::new("scan.pdf"),
//!     Path::new("output/scan.pdf"),
//!     &ProcessOptions::default(),
//! );
//! println!("{}: {}", result.path.display(), result.message);
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "pdfium"))]
//! # fn main() {}
//! ```

#![deny(missing_docs)]

pub mod color;
pub mod composite;
pub mod detection;
pub mod document;
mod engine;
pub mod error;
pub mod mask;
pub mod morphology;
pub mod pdf;
pub mod refine;

pub use document::{find_documents, Diagnostic, DiagnosticKind, Encoder, Rasterizer};
pub use engine::{
    default_output_path, stage_root, BatchSummary, CleanOptions, CleanOutcome, CleanedPage,
    DocumentResult, PageReport, ProcessOptions, WatermarkEngine, CLEANED_STAGE, EXTRACTED_STAGE,
};
pub use error::{Error, Result};
pub use pdf::PdfEncoder;

//! Error types for the pdf-watermark-removal crate.

use std::path::PathBuf;

/// Errors that can occur while rasterizing, cleaning, or reassembling documents.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input document could not be opened or parsed.
    #[error("failed to open document {}: {reason}", path.display())]
    DocumentOpen {
        /// Path of the document.
        path: PathBuf,
        /// Backend-supplied reason.
        reason: String,
    },

    /// A page could not be rendered by any render strategy.
    #[error("failed to render page {}: {reason}", page + 1)]
    PageRender {
        /// Zero-based page index.
        page: usize,
        /// Reason reported by the last attempted strategy.
        reason: String,
    },

    /// A rendered bitmap could not be decoded into an RGB image.
    #[error("failed to decode page {} bitmap: {reason}", page + 1)]
    Decode {
        /// Zero-based page index.
        page: usize,
        /// Why the decode path rejected the bitmap.
        reason: String,
    },

    /// There were no cleaned pages to write back into a document.
    #[error("no pages to reassemble into {}", path.display())]
    Reassembly {
        /// Output document path.
        path: PathBuf,
    },

    /// The rendering backend could not be initialized.
    #[error("rendering backend unavailable: {0}")]
    Backend(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error occurred while loading or saving an intermediate image.
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let io_err = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(io_err.to_string().contains("gone"));

        let open = Error::DocumentOpen {
            path: PathBuf::from("report.pdf"),
            reason: "bad xref".to_string(),
        };
        let msg = open.to_string();
        assert!(msg.contains("report.pdf"));
        assert!(msg.contains("bad xref"));

        let render = Error::PageRender {
            page: 4,
            reason: "out of memory".to_string(),
        };
        assert!(render.to_string().contains("page 5"));

        let empty = Error::Reassembly {
            path: PathBuf::from("out/report.pdf"),
        };
        assert!(empty.to_string().contains("out/report.pdf"));
    }
}

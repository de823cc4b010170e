//! PDF back ends: a `pdf-writer` encoder and, with the `pdfium` feature, a
//! PDFium-based rasterizer.

use std::fs;
use std::path::Path;

use image::RgbImage;
use miniz_oxide::deflate::compress_to_vec_zlib;
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref};

use crate::document::Encoder;
use crate::error::{Error, Result};

/// Points per inch in PDF user space.
const POINTS_PER_INCH: f32 = 72.0;

/// zlib level for page images.
const COMPRESSION_LEVEL: u8 = 6;

/// Writes each page as a full-bleed, Flate-compressed RGB image.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfEncoder;

impl PdfEncoder {
    /// Build the PDF bytes for `pages` at `dpi`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Reassembly`] with an empty path if `pages` is empty.
    pub fn to_bytes(pages: &[RgbImage], dpi: u32) -> Result<Vec<u8>> {
        if pages.is_empty() {
            return Err(Error::Reassembly {
                path: Default::default(),
            });
        }

        let mut pdf = Pdf::new();

        // Catalog(1), Pages(2), then Page/Contents/Image per page.
        let catalog_id = Ref::new(1);
        let pages_id = Ref::new(2);
        let object_id = |page: usize, slot: usize| {
            Ref::new(i32::try_from(3 + page * 3 + slot).unwrap_or(i32::MAX))
        };

        pdf.catalog(catalog_id).pages(pages_id);
        pdf.pages(pages_id)
            .kids((0..pages.len()).map(|i| object_id(i, 0)))
            .count(i32::try_from(pages.len()).unwrap_or(i32::MAX));

        for (i, page) in pages.iter().enumerate() {
            write_page(
                &mut pdf,
                page,
                dpi,
                pages_id,
                object_id(i, 0),
                object_id(i, 1),
                object_id(i, 2),
            );
        }

        Ok(pdf.finish())
    }
}

impl Encoder for PdfEncoder {
    fn encode(&self, pages: &[RgbImage], dpi: u32, output: &Path) -> Result<()> {
        let bytes = Self::to_bytes(pages, dpi).map_err(|_| Error::Reassembly {
            path: output.to_path_buf(),
        })?;
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(output, bytes)?;
        Ok(())
    }
}

fn write_page(
    pdf: &mut Pdf,
    image: &RgbImage,
    dpi: u32,
    pages_id: Ref,
    page_id: Ref,
    contents_id: Ref,
    image_id: Ref,
) {
    let (width, height) = image.dimensions();
    #[allow(clippy::cast_precision_loss)]
    let (width_pt, height_pt) = (
        width as f32 * POINTS_PER_INCH / dpi.max(1) as f32,
        height as f32 * POINTS_PER_INCH / dpi.max(1) as f32,
    );

    let compressed = compress_to_vec_zlib(image.as_raw(), COMPRESSION_LEVEL);
    let mut xobject = pdf.image_xobject(image_id, &compressed);
    xobject.filter(Filter::FlateDecode);
    xobject.width(i32::try_from(width).unwrap_or(i32::MAX));
    xobject.height(i32::try_from(height).unwrap_or(i32::MAX));
    xobject.color_space().device_rgb();
    xobject.bits_per_component(8);
    xobject.finish();

    // Scale the unit image square up to the page.
    let mut content = Content::new();
    content.save_state();
    content.transform([width_pt, 0.0, 0.0, height_pt, 0.0, 0.0]);
    content.x_object(Name(b"Im0"));
    content.restore_state();
    let content_data = content.finish();
    pdf.stream(contents_id, &content_data);

    let mut page = pdf.page(page_id);
    page.parent(pages_id);
    page.media_box(Rect::new(0.0, 0.0, width_pt, height_pt));
    page.contents(contents_id);
    page.resources().x_objects().pair(Name(b"Im0"), image_id);
    page.finish();
}

#[cfg(feature = "pdfium")]
pub use self::pdfium::{DecodeStrategy, PdfiumRasterizer, RenderStrategy};

#[cfg(feature = "pdfium")]
mod pdfium {
    use std::path::Path;

    use image::{Rgb, RgbImage};
    use pdfium_render::prelude::*;

    use crate::document::{
        first_success, rasterize_pages, Diagnostic, DiagnosticKind, RasterizedDocument, Rasterizer,
    };
    use crate::error::{Error, Result};

    /// Render attempts, tried in declaration order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum RenderStrategy {
        /// Requested DPI, annotations included.
        Full,
        /// Requested DPI, annotations skipped.
        WithoutAnnotations,
        /// PDFium's native 72 DPI.
        NativeResolution,
    }

    impl RenderStrategy {
        /// All strategies in fallback order.
        pub const ORDER: [Self; 3] = [
            Self::Full,
            Self::WithoutAnnotations,
            Self::NativeResolution,
        ];

        fn config(self, dpi: u32) -> PdfRenderConfig {
            #[allow(clippy::cast_precision_loss)]
            let scale = dpi as f32 / 72.0;
            match self {
                Self::Full => PdfRenderConfig::new().scale_page_by_factor(scale),
                Self::WithoutAnnotations => PdfRenderConfig::new()
                    .scale_page_by_factor(scale)
                    .render_annotations(false),
                Self::NativeResolution => PdfRenderConfig::new(),
            }
        }
    }

    /// Ways of turning a BGRA bitmap buffer into RGB, tried in declaration order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum DecodeStrategy {
        /// Tightly packed rows of `width * 4` bytes.
        Packed,
        /// Rows padded to a common stride.
        Strided,
    }

    impl DecodeStrategy {
        /// All strategies in fallback order.
        pub const ORDER: [Self; 2] = [Self::Packed, Self::Strided];

        /// Decode `raw` BGRA bytes of a `width` x `height` bitmap.
        ///
        /// # Errors
        ///
        /// Returns [`Error::Decode`] if the buffer length does not fit this layout.
        pub fn decode(self, raw: &[u8], width: u32, height: u32, page: usize) -> Result<RgbImage> {
            let row_bytes = width as usize * 4;
            let rows = height as usize;
            let stride = match self {
                Self::Packed => {
                    if raw.len() != row_bytes * rows {
                        return Err(Error::Decode {
                            page,
                            reason: format!(
                                "expected {} packed bytes, got {}",
                                row_bytes * rows,
                                raw.len()
                            ),
                        });
                    }
                    row_bytes
                }
                Self::Strided => {
                    if rows == 0 || raw.len() % rows != 0 || raw.len() / rows < row_bytes {
                        return Err(Error::Decode {
                            page,
                            reason: format!(
                                "{} bytes do not form {rows} rows of at least {row_bytes}",
                                raw.len()
                            ),
                        });
                    }
                    raw.len() / rows
                }
            };

            Ok(RgbImage::from_fn(width, height, |x, y| {
                let i = y as usize * stride + x as usize * 4;
                Rgb([raw[i + 2], raw[i + 1], raw[i]])
            }))
        }
    }

    /// Rasterizer backed by a dynamically loaded PDFium library.
    pub struct PdfiumRasterizer {
        pdfium: Pdfium,
    }

    impl PdfiumRasterizer {
        /// Bind PDFium from `./`, then `./vendor/pdfium/lib/`, then the system paths.
        ///
        /// # Errors
        ///
        /// Returns [`Error::Backend`] if no PDFium library can be loaded.
        pub fn new() -> Result<Self> {
            let bindings =
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                    .or_else(|_| {
                        Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                            "./vendor/pdfium/lib/",
                        ))
                    })
                    .or_else(|_| Pdfium::bind_to_system_library())
                    .map_err(|e| Error::Backend(format!("failed to load PDFium: {e:?}")))?;

            Ok(Self {
                pdfium: Pdfium::new(bindings),
            })
        }

        fn render_page(
            page: &PdfPage,
            index: usize,
            dpi: u32,
            diagnostics: &mut Vec<Diagnostic>,
        ) -> Result<RgbImage> {
            let bitmap = first_success(
                &RenderStrategy::ORDER,
                index,
                DiagnosticKind::RenderFallback,
                diagnostics,
                |strategy| {
                    page.render_with_config(&strategy.config(dpi))
                        .map_err(|e| Error::PageRender {
                            page: index,
                            reason: format!("{e:?}"),
                        })
                },
            )?;

            let width = u32::try_from(bitmap.width()).map_err(|_| Error::Decode {
                page: index,
                reason: "negative bitmap width".to_string(),
            })?;
            let height = u32::try_from(bitmap.height()).map_err(|_| Error::Decode {
                page: index,
                reason: "negative bitmap height".to_string(),
            })?;
            let raw = bitmap.as_raw_bytes();

            first_success(
                &DecodeStrategy::ORDER,
                index,
                DiagnosticKind::DecodeFallback,
                diagnostics,
                |strategy| strategy.decode(&raw, width, height, index),
            )
        }
    }

    impl Rasterizer for PdfiumRasterizer {
        fn rasterize(&self, path: &Path, dpi: u32) -> Result<RasterizedDocument> {
            let document =
                self.pdfium
                    .load_pdf_from_file(path, None)
                    .map_err(|e| Error::DocumentOpen {
                        path: path.to_path_buf(),
                        reason: format!("{e:?}"),
                    })?;

            let pages = document.pages();
            let page_count = usize::from(pages.len());
            Ok(rasterize_pages(page_count, dpi, |index, diagnostics| {
                let page_index = PdfPageIndex::try_from(index).map_err(|_| Error::PageRender {
                    page: index,
                    reason: "page index out of range".to_string(),
                })?;
                let page = pages.get(page_index).map_err(|e| Error::PageRender {
                    page: index,
                    reason: format!("{e:?}"),
                })?;
                Self::render_page(&page, index, dpi, diagnostics)
            }))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn bgra(pixels: &[[u8; 4]]) -> Vec<u8> {
            pixels.iter().flatten().copied().collect()
        }

        #[test]
        fn packed_decode_swaps_to_rgb() {
            let raw = bgra(&[[10, 20, 30, 255], [40, 50, 60, 255]]);
            let img = DecodeStrategy::Packed.decode(&raw, 2, 1, 0).unwrap();
            assert_eq!(*img.get_pixel(0, 0), Rgb([30, 20, 10]));
            assert_eq!(*img.get_pixel(1, 0), Rgb([60, 50, 40]));
        }

        #[test]
        fn packed_decode_rejects_padding() {
            let raw = vec![0u8; 12];
            assert!(matches!(
                DecodeStrategy::Packed.decode(&raw, 2, 1, 5),
                Err(Error::Decode { page: 5, .. })
            ));
        }

        #[test]
        fn strided_decode_skips_row_padding() {
            let mut raw = bgra(&[[1, 2, 3, 255]]);
            raw.extend_from_slice(&[0; 4]);
            raw.extend(bgra(&[[4, 5, 6, 255]]));
            raw.extend_from_slice(&[0; 4]);

            let img = DecodeStrategy::Strided.decode(&raw, 1, 2, 0).unwrap();
            assert_eq!(*img.get_pixel(0, 0), Rgb([3, 2, 1]));
            assert_eq!(*img.get_pixel(0, 1), Rgb([6, 5, 4]));
        }

        #[test]
        fn render_strategies_end_at_native_resolution() {
            assert_eq!(RenderStrategy::ORDER[0], RenderStrategy::Full);
            assert_eq!(
                RenderStrategy::ORDER[RenderStrategy::ORDER.len() - 1],
                RenderStrategy::NativeResolution
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    fn count(haystack: &[u8], needle: &[u8]) -> usize {
        haystack.windows(needle.len()).filter(|w| *w == needle).count()
    }

    #[test]
    fn one_page_per_image() {
        let pages = vec![
            RgbImage::from_pixel(30, 40, Rgb([255, 255, 255])),
            RgbImage::from_pixel(30, 40, Rgb([200, 10, 10])),
            RgbImage::from_pixel(30, 40, Rgb([0, 0, 0])),
        ];
        let bytes = PdfEncoder::to_bytes(&pages, 10).unwrap();

        assert!(bytes.starts_with(b"%PDF-"));
        assert_eq!(count(&bytes, b"/Parent 2 0 R"), 3);
        assert_eq!(count(&bytes, b"/Subtype /Image"), 3);
        assert_eq!(count(&bytes, b"/Count 3"), 1);
    }

    #[test]
    fn media_box_follows_dpi() {
        let pages = vec![RgbImage::from_pixel(85, 110, Rgb([255, 255, 255]))];
        let bytes = PdfEncoder::to_bytes(&pages, 10).unwrap();
        // 85 x 110 px at 10 dpi is US Letter, 612 x 792 pt.
        assert_eq!(count(&bytes, b"/MediaBox"), 1);
        assert!(count(&bytes, b"612") >= 1);
        assert!(count(&bytes, b"792") >= 1);
    }

    #[test]
    fn empty_input_is_a_reassembly_error() {
        assert!(matches!(
            PdfEncoder::to_bytes(&[], 300),
            Err(Error::Reassembly { .. })
        ));
    }

    #[test]
    fn encode_writes_file_and_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("output").join("doc.pdf");
        let pages = vec![RgbImage::from_pixel(4, 4, Rgb([1, 2, 3]))];

        PdfEncoder.encode(&pages, 72, &output).unwrap();
        let bytes = std::fs::read(&output).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn encode_reports_output_path_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("empty.pdf");
        match PdfEncoder.encode(&[], 72, &output) {
            Err(Error::Reassembly { path }) => assert_eq!(path, output),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!output.exists());
    }
}

//! Document composer – assembles captured pages into one paginated PDF
//! using `printpdf` (v0.8 ops-based API).
//!
//! Every page keeps the physical size of its own variant. The bitmap is
//! stretched to exactly fill that page; pixel size and physical size are
//! configured independently.

use std::io::Cursor;

use ::image::{DynamicImage, RgbaImage};
use printpdf::*;

use crate::error::ExportError;
use crate::raster::RasterPage;
use crate::variant::{PageGeometry, TemplateVariant};

/// One page of an export, in print order.
#[derive(Debug, Clone)]
pub struct DocumentPage {
    pub variant: TemplateVariant,
    pub geometry: PageGeometry,
    pub image: RgbaImage,
}

/// Ordered pages; geometry may differ from page to page.
#[derive(Debug, Clone, Default)]
pub struct ExportDocument {
    pub pages: Vec<DocumentPage>,
}

/// Keep `pages` in the order given. Composition itself cannot fail.
pub fn compose(pages: Vec<RasterPage>) -> ExportDocument {
    ExportDocument {
        pages: pages
            .into_iter()
            .map(|p| DocumentPage {
                variant: p.variant,
                geometry: p.variant.geometry,
                image: p.image,
            })
            .collect(),
    }
}

impl ExportDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Serialise to PDF bytes.
    pub fn to_pdf_bytes(&self, title: &str) -> Result<Vec<u8>, ExportError> {
        let mut doc = PdfDocument::new(title);
        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let mut pages = Vec::with_capacity(self.pages.len());

        for (index, page) in self.pages.iter().enumerate() {
            let (px_width, px_height) = page.image.dimensions();
            if px_width == 0 || px_height == 0 {
                return Err(ExportError::Capture(format!("page {} has no pixels", index + 1)));
            }

            // PDF images carry no alpha here; flatten to RGB first.
            let rgb = DynamicImage::ImageRgba8(page.image.clone()).to_rgb8();
            let mut png = Cursor::new(Vec::new());
            rgb.write_to(&mut png, ::image::ImageFormat::Png)
                .map_err(|e| ExportError::Capture(format!("page {} encode: {e}", index + 1)))?;
            let raw = RawImage::decode_from_bytes(png.get_ref(), &mut warnings)
                .map_err(|e| ExportError::Capture(format!("page {} embed: {e}", index + 1)))?;
            let xobj_id = doc.add_image(&raw);

            let geometry = page.geometry;
            let (scale_x, scale_y) = image_scale(&geometry, px_width, px_height);
            let ops = vec![Op::UseXobject {
                id: xobj_id,
                transform: XObjectTransform {
                    translate_x: Some(Pt(0.0)),
                    translate_y: Some(Pt(0.0)),
                    dpi: Some(72.0),
                    scale_x: Some(scale_x),
                    scale_y: Some(scale_y),
                    rotate: None,
                },
            }];
            pages.push(PdfPage::new(
                Mm(geometry.width_mm()),
                Mm(geometry.height_mm()),
                ops,
            ));
            log::trace!(
                "page {}: {} {}x{} px on {:.2}x{:.2} in",
                index + 1,
                page.variant.label(),
                px_width,
                px_height,
                geometry.width_in,
                geometry.height_in
            );
        }

        for w in &warnings {
            log::debug!("pdf: {w:?}");
        }

        doc.with_pages(pages);
        Ok(doc.save(&PdfSaveOptions::default(), &mut Vec::new()))
    }
}

/// Point scale that stretches a `px_width` × `px_height` bitmap over the
/// page. At 72 dpi one image pixel is one point before scaling.
fn image_scale(geometry: &PageGeometry, px_width: u32, px_height: u32) -> (f32, f32) {
    (
        geometry.width_pt() / px_width as f32,
        geometry.height_pt() / px_height as f32,
    )
}

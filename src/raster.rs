//! Rasterizer – turns one [`RenderDescriptor`] into a fixed-size bitmap.
//!
//! Order is strict: lay out the surface, wait for every referenced image to
//! settle (loaded, failed or timed out), then paint. Nothing is painted
//! while a load is pending. The canvas lives only inside
//! [`Rasterizer::capture_cancellable`] and is dropped on every path.

use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;

use crate::cancel::CancelToken;
use crate::descriptor::RenderDescriptor;
use crate::dom::parse_html;
use crate::error::ExportError;
use crate::fonts::FontManager;
use crate::frame::Frame;
use crate::images::{load_all, ImageFetcher};
use crate::layout::compute_frame;
use crate::paint::{paint_frame, Canvas};
use crate::style::build_styled_tree;
use crate::variant::TemplateVariant;

#[derive(Debug, Clone, thiserror::Error)]
pub enum CaptureError {
    #[error("capture surface {width}x{height} is empty")]
    EmptySurface { width: u32, height: u32 },
    #[error("layout failed: {0}")]
    Layout(String),
    #[error("capture cancelled")]
    Cancelled,
}

impl From<CaptureError> for ExportError {
    fn from(e: CaptureError) -> Self {
        match e {
            CaptureError::Cancelled => ExportError::Cancelled,
            other => ExportError::Capture(other.to_string()),
        }
    }
}

/// A captured bitmap plus the variant it was captured from.
#[derive(Debug, Clone)]
pub struct RasterPage {
    pub variant: TemplateVariant,
    pub width_px: u32,
    pub height_px: u32,
    pub image: RgbaImage,
}

pub struct Rasterizer {
    fonts: Arc<FontManager>,
    fetcher: Arc<dyn ImageFetcher>,
    image_timeout: Duration,
}

impl Rasterizer {
    pub fn new(fonts: Arc<FontManager>, fetcher: Arc<dyn ImageFetcher>, image_timeout: Duration) -> Self {
        if !fonts.has_real_fonts() {
            log::warn!("no font file loaded; text will be drawn as greeked blocks");
        }
        Self {
            fonts,
            fetcher,
            image_timeout,
        }
    }

    /// Lay out `descriptor` on a `width` × `height` CSS px surface.
    pub fn layout_frame(
        &self,
        descriptor: &RenderDescriptor,
        width: f32,
        height: f32,
    ) -> Result<Frame, CaptureError> {
        let dom = parse_html(&descriptor.to_html());
        let styled = build_styled_tree(&dom, None);
        compute_frame(&styled, width, height, &self.fonts)
            .map_err(|e| CaptureError::Layout(e.to_string()))
    }

    pub async fn capture(
        &self,
        descriptor: &RenderDescriptor,
        width: f32,
        height: f32,
        scale: f32,
    ) -> Result<RasterPage, CaptureError> {
        self.capture_cancellable(descriptor, width, height, scale, &CancelToken::new())
            .await
    }

    /// Capture at `round(width × scale)` × `round(height × scale)` pixels.
    /// `cancel` is checked before and after the image wait.
    pub async fn capture_cancellable(
        &self,
        descriptor: &RenderDescriptor,
        width: f32,
        height: f32,
        scale: f32,
        cancel: &CancelToken,
    ) -> Result<RasterPage, CaptureError> {
        let width_px = (width * scale).round().max(0.0) as u32;
        let height_px = (height * scale).round().max(0.0) as u32;
        if width_px == 0 || height_px == 0 {
            return Err(CaptureError::EmptySurface {
                width: width_px,
                height: height_px,
            });
        }

        let frame = self.layout_frame(descriptor, width, height)?;
        if cancel.is_cancelled() {
            return Err(CaptureError::Cancelled);
        }

        let refs: Vec<_> = frame
            .image_boxes()
            .into_iter()
            .filter_map(|b| b.image.as_ref())
            .map(|slot| (slot.src.as_str(), slot.kind))
            .collect();
        let images = load_all(self.fetcher.as_ref(), &refs, self.image_timeout).await;
        if cancel.is_cancelled() {
            return Err(CaptureError::Cancelled);
        }

        let mut canvas = Canvas::new(width_px, height_px, scale);
        paint_frame(&mut canvas, &frame, &images, &self.fonts);
        log::debug!(
            "captured {} at {width_px}x{height_px} px ({} image(s), {} loaded)",
            descriptor.variant.label(),
            images.len(),
            images.values().filter(|i| i.is_ready()).count()
        );

        Ok(RasterPage {
            variant: descriptor.variant,
            width_px,
            height_px,
            image: canvas.into_image(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{block, image, text, ImageKind};
    use crate::variant::{PageGeometry, Side, VariantId};
    use async_trait::async_trait;
    use std::io::Cursor;

    struct SolidPng;

    #[async_trait]
    impl ImageFetcher for SolidPng {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, String> {
            let img = RgbaImage::from_pixel(32, 32, ::image::Rgba([0, 0, 255, 255]));
            let mut out = Cursor::new(Vec::new());
            img.write_to(&mut out, ::image::ImageFormat::Png)
                .map_err(|e| e.to_string())?;
            Ok(out.into_inner())
        }
    }

    fn rasterizer() -> Rasterizer {
        Rasterizer::new(
            Arc::new(FontManager::default()),
            Arc::new(SolidPng),
            Duration::from_secs(1),
        )
    }

    fn descriptor() -> RenderDescriptor {
        RenderDescriptor {
            variant: TemplateVariant {
                id: VariantId::Primary,
                side: Side::Front,
                geometry: PageGeometry::PORTRAIT_CARD,
            },
            root: block(
                "flex flex-col items-center",
                "",
                vec![image(40, 40, "qr", ImageKind::Qr), text("", "Hello")],
            ),
        }
    }

    #[tokio::test]
    async fn output_size_follows_scale() {
        let page = rasterizer()
            .capture(&descriptor(), 204.0, 320.0, 3.0)
            .await
            .unwrap();
        assert_eq!((page.width_px, page.height_px), (612, 960));
        assert_eq!(page.image.dimensions(), (612, 960));
        // The QR sits centred at the top: x 82..122 CSS px.
        assert_eq!(page.image.get_pixel(102 * 3, 20 * 3).0, [0, 0, 255, 255]);
    }

    #[tokio::test]
    async fn zero_sized_surface_is_rejected() {
        let err = rasterizer()
            .capture(&descriptor(), 0.0, 320.0, 3.0)
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::EmptySurface { width: 0, .. }));
        assert!(matches!(ExportError::from(err), ExportError::Capture(_)));
    }

    #[tokio::test]
    async fn cancelled_capture_stops_before_paint() {
        let token = CancelToken::new();
        token.cancel();
        let err = rasterizer()
            .capture_cancellable(&descriptor(), 204.0, 320.0, 1.0, &token)
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::Cancelled));
        assert!(matches!(ExportError::from(err), ExportError::Cancelled));
    }
}

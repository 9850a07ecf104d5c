//! Painter – draws a laid-out [`Frame`] onto an RGBA pixel surface at a
//! fixed device scale.

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};

use crate::descriptor::ImageKind;
use crate::fonts::{FontKey, FontManager};
use crate::frame::{Frame, LayoutBox, TextContent};
use crate::images::{LoadedImage, LoadedImages};

const PLACEHOLDER_FILL: [f32; 4] = [0.90, 0.91, 0.92, 1.0];
const PLACEHOLDER_EDGE: [f32; 4] = [0.62, 0.64, 0.67, 1.0];

/// An RGBA surface; drawing coordinates are CSS px, multiplied by `scale`.
pub struct Canvas {
    image: RgbaImage,
    scale: f32,
}

impl Canvas {
    /// White surface of `width_px` × `height_px` device pixels.
    pub fn new(width_px: u32, height_px: u32, scale: f32) -> Self {
        Self {
            image: RgbaImage::from_pixel(width_px, height_px, Rgba([255, 255, 255, 255])),
            scale,
        }
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Device-pixel bounds of a CSS rectangle, clipped to the surface.
    fn device_rect(&self, x: f32, y: f32, w: f32, h: f32) -> (u32, u32, u32, u32) {
        let clamp_x = |v: f32| (v * self.scale).round().clamp(0.0, self.image.width() as f32) as u32;
        let clamp_y = |v: f32| (v * self.scale).round().clamp(0.0, self.image.height() as f32) as u32;
        (clamp_x(x), clamp_y(y), clamp_x(x + w), clamp_y(y + h))
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: [f32; 4]) {
        let (x0, y0, x1, y1) = self.device_rect(x, y, w, h);
        for py in y0..y1 {
            for px in x0..x1 {
                self.blend(px, py, color, 1.0);
            }
        }
    }

    pub fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32, width: f32, color: [f32; 4]) {
        self.fill_rect(x, y, w, width, color);
        self.fill_rect(x, y + h - width, w, width, color);
        self.fill_rect(x, y + width, width, h - 2.0 * width, color);
        self.fill_rect(x + w - width, y + width, width, h - 2.0 * width, color);
    }

    /// Grey box with a darker edge, shown in place of a missing photo or
    /// signature.
    pub fn placeholder(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.fill_rect(x, y, w, h, PLACEHOLDER_FILL);
        self.stroke_rect(x, y, w, h, 1.0, PLACEHOLDER_EDGE);
    }

    pub fn draw_image(&mut self, x: f32, y: f32, w: f32, h: f32, img: &DynamicImage, kind: ImageKind) {
        let (x0, y0, x1, y1) = self.device_rect(x, y, w, h);
        let (bw, bh) = (x1.saturating_sub(x0), y1.saturating_sub(y0));
        if bw == 0 || bh == 0 {
            return;
        }
        let fitted = match kind {
            ImageKind::Photo => img.resize_to_fill(bw, bh, FilterType::Triangle),
            ImageKind::Signature => img.resize(bw, bh, FilterType::Triangle),
            ImageKind::Barcode | ImageKind::Qr => img.resize_exact(bw, bh, FilterType::Nearest),
        }
        .to_rgba8();
        // Contained images are centred in their box.
        let dx = (bw - fitted.width().min(bw)) / 2;
        let dy = (bh - fitted.height().min(bh)) / 2;
        imageops::overlay(&mut self.image, &fitted, (x0 + dx) as i64, (y0 + dy) as i64);
    }

    pub fn draw_text(&mut self, x: f32, y: f32, text: &TextContent, fonts: &FontManager) {
        let key = FontKey::new(&text.font_family, text.bold);
        let size = text.font_size * self.scale;
        let line_height = text.line_height * self.scale;
        let ascent = fonts.ascender_px(size, &key);
        let half_leading = (line_height - size) / 2.0;
        let [r, g, b, a] = text.color;

        for line in &text.lines {
            let coverage = fonts.line_coverage(&line.text, size, &key);
            let left = ((x + line.x_offset) * self.scale).round() as i64 - 1;
            let top = ((y + line.y_offset) * self.scale + half_leading + ascent - coverage.baseline)
                .round() as i64;
            for cy in 0..coverage.height {
                for cx in 0..coverage.width {
                    let alpha = coverage.at(cx, cy);
                    let (px, py) = (left + cx as i64, top + cy as i64);
                    if alpha <= 0.0
                        || px < 0
                        || py < 0
                        || px >= self.image.width() as i64
                        || py >= self.image.height() as i64
                    {
                        continue;
                    }
                    self.blend(px as u32, py as u32, [r, g, b, a], alpha);
                }
            }
        }
    }

    /// Source-over blend of `color` scaled by `coverage`.
    fn blend(&mut self, px: u32, py: u32, color: [f32; 4], coverage: f32) {
        let alpha = (color[3] * coverage).clamp(0.0, 1.0);
        let dst = self.image.get_pixel_mut(px, py);
        for (i, channel) in color.iter().take(3).enumerate() {
            let d = dst.0[i] as f32 / 255.0;
            dst.0[i] = ((channel * alpha + d * (1.0 - alpha)) * 255.0).round() as u8;
        }
        let da = dst.0[3] as f32 / 255.0;
        dst.0[3] = ((alpha + da * (1.0 - alpha)) * 255.0).round() as u8;
    }
}

/// Paint every box of `frame` in document order. Failed photos and
/// signatures become placeholders; failed codec images leave their slot
/// empty.
pub fn paint_frame(
    canvas: &mut Canvas,
    frame: &Frame,
    images: &LoadedImages,
    fonts: &FontManager,
) {
    for b in &frame.boxes {
        paint_box(canvas, b, images, fonts);
    }
}

fn paint_box(canvas: &mut Canvas, b: &LayoutBox, images: &LoadedImages, fonts: &FontManager) {
    if let Some(bg) = b.background_color {
        canvas.fill_rect(b.x, b.y, b.width, b.height, bg);
    }
    if let Some(slot) = &b.image {
        match images.get(&slot.src) {
            Some(LoadedImage::Ready(img)) => {
                canvas.draw_image(b.x, b.y, b.width, b.height, img, slot.kind)
            }
            _ if slot.kind.hide_on_failure() => {
                log::trace!("hiding {} slot {:?}", slot.kind.as_str(), slot.src);
            }
            _ => canvas.placeholder(b.x, b.y, b.width, b.height),
        }
    }
    if let Some(text) = &b.text {
        canvas.draw_text(b.x, b.y, text, fonts);
    }
    if let Some(border) = &b.border {
        canvas.stroke_rect(b.x, b.y, b.width, b.height, border.width, border.color);
    }
    for child in &b.children {
        paint_box(canvas, child, images, fonts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ImageSlot;

    fn slot(src: &str, kind: ImageKind) -> LayoutBox {
        let mut b = LayoutBox::new(10.0, 10.0, 20.0, 20.0);
        b.image = Some(ImageSlot {
            src: src.into(),
            kind,
        });
        b
    }

    fn paint(boxes: Vec<LayoutBox>, images: &LoadedImages) -> RgbaImage {
        let frame = Frame {
            width: 40.0,
            height: 40.0,
            boxes,
        };
        let mut canvas = Canvas::new(80, 80, 2.0);
        paint_frame(&mut canvas, &frame, images, &FontManager::default());
        canvas.into_image()
    }

    fn failed() -> LoadedImage {
        LoadedImage::Failed {
            reason: "404".into(),
        }
    }

    #[test]
    fn failed_photo_becomes_placeholder() {
        let images = LoadedImages::from([("p".to_string(), failed())]);
        let img = paint(vec![slot("p", ImageKind::Photo)], &images);
        // Centre of the slot, in device px.
        assert_ne!(img.get_pixel(40, 40).0, [255, 255, 255, 255]);
    }

    #[test]
    fn failed_qr_is_hidden() {
        let images = LoadedImages::from([("q".to_string(), failed())]);
        let img = paint(vec![slot("q", ImageKind::Qr)], &images);
        assert!(img.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn ready_image_is_scaled_into_its_box() {
        let red = DynamicImage::ImageRgba8(RgbaImage::from_pixel(5, 5, Rgba([255, 0, 0, 255])));
        let images = LoadedImages::from([("b".to_string(), LoadedImage::Ready(red))]);
        let img = paint(vec![slot("b", ImageKind::Barcode)], &images);
        assert_eq!(img.get_pixel(20, 20).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(59, 59).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(60, 60).0, [255, 255, 255, 255]);
        assert_eq!(img.get_pixel(19, 19).0, [255, 255, 255, 255]);
    }

    #[test]
    fn background_is_clipped_to_surface() {
        let mut b = LayoutBox::new(30.0, 30.0, 100.0, 100.0);
        b.background_color = Some([0.0, 0.0, 0.0, 1.0]);
        let img = paint(vec![b], &LoadedImages::new());
        assert_eq!(img.get_pixel(79, 79).0, [0, 0, 0, 255]);
        assert_eq!(img.get_pixel(59, 59).0, [255, 255, 255, 255]);
    }
}

//! Frame – the frozen result of laying out one card surface. Every box has
//! surface-absolute coordinates in CSS pixels and carries exactly what the
//! painter needs, so a frame can be dumped to JSON and inspected offline.

use serde::{Deserialize, Serialize};

use crate::descriptor::ImageKind;

/// A laid-out card surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub width: f32,
    pub height: f32,
    pub boxes: Vec<LayoutBox>,
}

/// A positioned rectangle with optional content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutBox {
    /// Position relative to the surface top-left, in px.
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,

    pub background_color: Option<[f32; 4]>,
    pub border: Option<BorderStyle>,

    pub text: Option<TextContent>,
    pub image: Option<ImageSlot>,

    pub children: Vec<LayoutBox>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorderStyle {
    pub width: f32,
    pub color: [f32; 4],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    /// Pre-wrapped lines of text.
    pub lines: Vec<TextLine>,
    pub font_family: String,
    pub font_size: f32,
    pub bold: bool,
    pub color: [f32; 4],
    pub line_height: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    /// Offsets from the box origin; alignment is already applied.
    pub x_offset: f32,
    pub y_offset: f32,
}

/// An image slot; the pixels are resolved separately by URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSlot {
    pub src: String,
    pub kind: ImageKind,
}

impl LayoutBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            ..Default::default()
        }
    }
}

impl Frame {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Depth-first walk over every box.
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a LayoutBox)) {
        fn walk<'a>(b: &'a LayoutBox, f: &mut impl FnMut(&'a LayoutBox)) {
            f(b);
            for child in &b.children {
                walk(child, f);
            }
        }
        for b in &self.boxes {
            walk(b, f);
        }
    }

    /// Every image box, in paint order.
    pub fn image_boxes(&self) -> Vec<&LayoutBox> {
        let mut found = Vec::new();
        self.visit(&mut |b| {
            if b.image.is_some() {
                found.push(b);
            }
        });
        found
    }

    /// Every printed line of text, in paint order.
    pub fn text_lines(&self) -> Vec<&str> {
        let mut found = Vec::new();
        self.visit(&mut |b| {
            if let Some(text) = &b.text {
                found.extend(text.lines.iter().map(|l| l.text.as_str()));
            }
        });
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_keeps_image_kind() {
        let mut b = LayoutBox::new(1.0, 2.0, 30.0, 40.0);
        b.image = Some(ImageSlot {
            src: "https://x/qr".into(),
            kind: ImageKind::Qr,
        });
        let frame = Frame {
            width: 204.0,
            height: 320.0,
            boxes: vec![b],
        };
        let json = frame.to_json().unwrap();
        assert!(json.contains("\"qr\""));
        let back = Frame::from_json(&json).unwrap();
        assert_eq!(back.image_boxes().len(), 1);
        assert_eq!(back.image_boxes()[0].height, 40.0);
    }
}

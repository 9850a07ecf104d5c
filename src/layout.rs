//! Layout engine – uses Taffy to compute flexbox layout for one card surface
//! from a styled DOM tree, then freezes the result into a [`Frame`].
//!
//! The surface has a fixed size; content that does not fit overflows and is
//! clipped by the painter. Text leaves are measured through Taffy's measure
//! callback so wrapping always happens at the width a box finally gets.

use std::collections::HashMap;

use taffy::prelude::*;
use taffy::TaffyResult;

use crate::descriptor::{FitRequest, ImageKind};
use crate::dom::Tag;
use crate::fonts::{fit_font_size, wrap_text, FontKey, FontManager};
use crate::frame::{BorderStyle, Frame, ImageSlot, LayoutBox, TextContent, TextLine};
use crate::style::{self, ComputedStyle, StyledNode, TextAlign};

/// Measured content of a leaf node.
#[derive(Debug, Clone)]
enum Leaf {
    Text {
        text: String,
        style: ComputedStyle,
    },
    /// Lines that shrink together to a line budget.
    Fit {
        lines: Vec<String>,
        style: ComputedStyle,
        fit: FitRequest,
    },
}

impl Leaf {
    fn style(&self) -> &ComputedStyle {
        match self {
            Leaf::Text { style, .. } | Leaf::Fit { style, .. } => style,
        }
    }

    /// Font size and wrapped lines at `max_width`.
    fn shape(&self, max_width: f32, fonts: &FontManager) -> (f32, Vec<String>) {
        let key = font_key(self.style());
        match self {
            Leaf::Text { text, style } => (
                style.font_size,
                wrap_text(text, style.font_size, &key, max_width, fonts),
            ),
            Leaf::Fit { lines, style, fit } => {
                let fitted = fit_font_size(lines, style.font_size, fit, &key, max_width, fonts);
                (fitted.font_size, fitted.lines)
            }
        }
    }

    fn measure(&self, max_width: f32, fonts: &FontManager) -> Size<f32> {
        let (font_size, lines) = self.shape(max_width, fonts);
        let key = font_key(self.style());
        let width = lines
            .iter()
            .map(|l| fonts.measure_text_width(l, font_size, &key))
            .fold(0.0f32, f32::max);
        Size {
            width,
            height: lines.len() as f32 * fonts.line_height_px(font_size, self.style().line_height),
        }
    }
}

fn font_key(style: &ComputedStyle) -> FontKey {
    FontKey::new(&style.font_family, style.bold())
}

// ---------------------------------------------------------------------------
// Build Taffy tree from styled nodes
// ---------------------------------------------------------------------------

struct LayoutBuilder<'a> {
    taffy: TaffyTree<Leaf>,
    fonts: &'a FontManager,
    node_styles: HashMap<NodeId, ComputedStyle>,
    node_images: HashMap<NodeId, ImageSlot>,
}

impl<'a> LayoutBuilder<'a> {
    fn new(fonts: &'a FontManager) -> Self {
        let mut taffy = TaffyTree::new();
        // Rounding would let the final width fall short of the measured one
        // and re-wrap a line that fit during measurement.
        taffy.disable_rounding();
        Self {
            taffy,
            fonts,
            node_styles: HashMap::new(),
            node_images: HashMap::new(),
        }
    }

    /// All text content below `node`.
    fn collect_text(node: &StyledNode) -> String {
        match node {
            StyledNode::Text { text, .. } => text.clone(),
            StyledNode::Element { children, .. } => {
                children.iter().map(Self::collect_text).collect()
            }
        }
    }

    fn all_text(children: &[StyledNode]) -> bool {
        children.iter().all(|c| matches!(c, StyledNode::Text { .. }))
    }

    fn build_node(&mut self, styled: &StyledNode) -> TaffyResult<Option<NodeId>> {
        match styled {
            StyledNode::Text { text, style } => {
                let text = normalise(text, style);
                if text.is_empty() {
                    return Ok(None);
                }
                self.build_leaf(Leaf::Text {
                    text,
                    style: style.clone(),
                })
                .map(Some)
            }
            StyledNode::Element {
                tag,
                style,
                children,
                attrs,
            } => {
                if style.display == style::Display::None {
                    return Ok(None);
                }
                self.build_element_node(tag, style, children, attrs).map(Some)
            }
        }
    }

    /// A measured leaf; box decoration of `style` applies around the text.
    fn build_leaf(&mut self, leaf: Leaf) -> TaffyResult<NodeId> {
        let style = leaf.style().clone();
        let node = self.taffy.new_leaf_with_context(to_taffy(&style), leaf)?;
        self.node_styles.insert(node, style);
        Ok(node)
    }

    fn build_element_node(
        &mut self,
        tag: &Tag,
        style: &ComputedStyle,
        children: &[StyledNode],
        attrs: &HashMap<String, String>,
    ) -> TaffyResult<NodeId> {
        if *tag == Tag::Img {
            let node = self.taffy.new_leaf(to_taffy(style))?;
            let kind = attrs
                .get("data-kind")
                .and_then(|k| ImageKind::parse(k))
                .unwrap_or(ImageKind::Photo);
            self.node_images.insert(
                node,
                ImageSlot {
                    src: attrs.get("src").cloned().unwrap_or_default(),
                    kind,
                },
            );
            self.node_styles.insert(node, style.clone());
            return Ok(node);
        }

        if let Some(fit) = fit_request(attrs) {
            let lines: Vec<String> = children
                .iter()
                .map(|c| normalise(&Self::collect_text(c), style))
                .filter(|l| !l.is_empty())
                .collect();
            return self.build_leaf(Leaf::Fit {
                lines,
                style: style.clone(),
                fit,
            });
        }

        // A paragraph holding only text becomes one wrapped text leaf.
        if *tag == Tag::P && !children.is_empty() && Self::all_text(children) {
            let raw: String = children.iter().map(Self::collect_text).collect();
            let text = normalise(&raw, style);
            if !text.is_empty() {
                return self.build_leaf(Leaf::Text {
                    text,
                    style: style.clone(),
                });
            }
        }

        let mut child_nodes = Vec::with_capacity(children.len());
        for child in children {
            if let Some(id) = self.build_node(child)? {
                child_nodes.push(id);
            }
        }
        let node = self
            .taffy
            .new_with_children(to_taffy(style), &child_nodes)?;
        self.node_styles.insert(node, style.clone());
        Ok(node)
    }

    /// Freeze the computed layout into surface-absolute boxes.
    fn extract(&self, node: NodeId, offset_x: f32, offset_y: f32) -> TaffyResult<LayoutBox> {
        let layout = self.taffy.layout(node)?;
        let x = offset_x + layout.location.x;
        let y = offset_y + layout.location.y;
        let mut lb = LayoutBox::new(x, y, layout.size.width, layout.size.height);

        if let Some(style) = self.node_styles.get(&node) {
            if !style.background_color.is_transparent() {
                let c = style.background_color;
                lb.background_color = Some([c.r, c.g, c.b, c.a]);
            }
            if style.border_width > 0.0 {
                let c = style.border_color;
                lb.border = Some(BorderStyle {
                    width: style.border_width,
                    color: [c.r, c.g, c.b, c.a],
                });
            }
        }

        if let Some(leaf) = self.taffy.get_node_context(node) {
            let left = layout.padding.left + layout.border.left;
            let top = layout.padding.top + layout.border.top;
            let content_width =
                layout.size.width - left - layout.padding.right - layout.border.right;
            lb.text = Some(self.text_content(leaf, content_width, left, top));
        }
        lb.image = self.node_images.get(&node).cloned();

        for &child in self.taffy.children(node)?.iter() {
            lb.children.push(self.extract(child, x, y)?);
        }
        Ok(lb)
    }

    fn text_content(&self, leaf: &Leaf, content_width: f32, left: f32, top: f32) -> TextContent {
        let style = leaf.style();
        // Tolerance for float drift between measurement and final width.
        let (font_size, lines) = leaf.shape(content_width + 0.01, self.fonts);
        let key = font_key(style);
        let line_height = self.fonts.line_height_px(font_size, style.line_height);
        let lines = lines
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let slack = content_width - self.fonts.measure_text_width(&text, font_size, &key);
                let x_offset = match style.text_align {
                    TextAlign::Left => 0.0,
                    TextAlign::Center => slack / 2.0,
                };
                TextLine {
                    text,
                    x_offset: left + x_offset,
                    y_offset: top + i as f32 * line_height,
                }
            })
            .collect();
        let c = style.color;
        TextContent {
            lines,
            font_family: style.font_family.clone(),
            font_size,
            bold: style.bold(),
            color: [c.r, c.g, c.b, c.a],
            line_height,
        }
    }
}

fn to_taffy(s: &ComputedStyle) -> Style {
    let mut ts = Style {
        display: taffy::Display::Flex,
        ..Default::default()
    };

    match s.display {
        style::Display::Flex => {
            ts.flex_direction = match s.flex_direction {
                style::FlexDirection::Row => taffy::FlexDirection::Row,
                style::FlexDirection::Column => taffy::FlexDirection::Column,
            };
            ts.justify_content = Some(match s.justify_content {
                style::JustifyContent::Start => taffy::JustifyContent::Start,
                style::JustifyContent::Center => taffy::JustifyContent::Center,
            });
            ts.align_items = Some(match s.align_items {
                style::AlignItems::Start => taffy::AlignItems::Start,
                style::AlignItems::Center => taffy::AlignItems::Center,
                style::AlignItems::Stretch => taffy::AlignItems::Stretch,
            });
        }
        style::Display::Block => {
            ts.flex_direction = taffy::FlexDirection::Column;
        }
        style::Display::None => ts.display = taffy::Display::None,
    }

    ts.size = Size {
        width: dim_to_taffy(s.width),
        height: dim_to_taffy(s.height),
    };
    ts.flex_grow = s.flex_grow;
    ts.flex_shrink = s.flex_shrink;

    ts.margin = Rect {
        top: LengthPercentageAuto::Length(s.margin.top),
        right: LengthPercentageAuto::Length(s.margin.right),
        bottom: LengthPercentageAuto::Length(s.margin.bottom),
        left: LengthPercentageAuto::Length(s.margin.left),
    };
    ts.padding = Rect {
        top: LengthPercentage::Length(s.padding.top),
        right: LengthPercentage::Length(s.padding.right),
        bottom: LengthPercentage::Length(s.padding.bottom),
        left: LengthPercentage::Length(s.padding.left),
    };
    let bw = LengthPercentage::Length(s.border_width);
    ts.border = Rect {
        top: bw,
        right: bw,
        bottom: bw,
        left: bw,
    };
    ts.gap = Size {
        width: LengthPercentage::Length(s.gap),
        height: LengthPercentage::Length(s.gap),
    };
    ts
}

fn dim_to_taffy(d: style::Dimension) -> taffy::Dimension {
    match d {
        style::Dimension::Auto => taffy::Dimension::Auto,
        style::Dimension::Px(v) => taffy::Dimension::Length(v),
        style::Dimension::Percent(v) => taffy::Dimension::Percent(v / 100.0),
    }
}

/// Collapse whitespace runs and apply text transforms.
fn normalise(text: &str, style: &ComputedStyle) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if style.uppercase {
        collapsed.to_uppercase()
    } else {
        collapsed
    }
}

fn fit_request(attrs: &HashMap<String, String>) -> Option<FitRequest> {
    let max_lines = attrs.get("data-fit-lines")?.parse().ok()?;
    let number = |name: &str, default: f32| {
        attrs
            .get(name)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    };
    Some(FitRequest {
        max_lines,
        min_font_px: number("data-fit-min", 0.0),
        step_px: number("data-fit-step", 1.0),
    })
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Lay out a styled tree on a fixed `width` × `height` px surface.
pub fn compute_frame(
    styled_nodes: &[StyledNode],
    width: f32,
    height: f32,
    fonts: &FontManager,
) -> TaffyResult<Frame> {
    let mut builder = LayoutBuilder::new(fonts);

    let mut child_ids = Vec::new();
    for node in styled_nodes {
        if let Some(id) = builder.build_node(node)? {
            child_ids.push(id);
        }
    }

    let root_style = Style {
        display: taffy::Display::Flex,
        flex_direction: taffy::FlexDirection::Column,
        size: Size {
            width: taffy::Dimension::Length(width),
            height: taffy::Dimension::Length(height),
        },
        ..Default::default()
    };
    let root = builder.taffy.new_with_children(root_style, &child_ids)?;

    builder.taffy.compute_layout_with_measure(
        root,
        Size {
            width: AvailableSpace::Definite(width),
            height: AvailableSpace::Definite(height),
        },
        |known, available, _node, leaf, _style| {
            let Some(leaf) = leaf else {
                return Size::ZERO;
            };
            let max_width = known.width.unwrap_or(match available.width {
                AvailableSpace::Definite(w) => w,
                AvailableSpace::MaxContent => f32::INFINITY,
                AvailableSpace::MinContent => f32::MIN_POSITIVE,
            });
            let measured = leaf.measure(max_width, fonts);
            Size {
                width: known.width.unwrap_or(measured.width),
                height: known.height.unwrap_or(measured.height),
            }
        },
    )?;

    let root_box = builder.extract(root, 0.0, 0.0)?;
    Ok(Frame {
        width,
        height,
        boxes: root_box.children,
    })
}

//! Style resolver – maps inline styles and Tailwind-like utility classes on
//! descriptor markup to a flat [`ComputedStyle`] consumed by the layout
//! engine. Only what card templates use is supported.

use std::collections::HashMap;

use crate::dom::{DomNode, ElementNode, Tag};

/// Fully resolved style for one element.
#[derive(Debug, Clone)]
pub struct ComputedStyle {
    // Display / flex
    pub display: Display,
    pub flex_direction: FlexDirection,
    pub flex_grow: f32,
    pub flex_shrink: f32,
    pub justify_content: JustifyContent,
    pub align_items: AlignItems,
    pub gap: f32,

    // Sizing (px)
    pub width: Dimension,
    pub height: Dimension,

    // Spacing (px)
    pub margin: Edges,
    pub padding: Edges,

    // Border
    pub border_width: f32,
    pub border_color: Color,

    // Typography
    pub font_size: f32,
    pub font_weight: FontWeight,
    pub font_family: String,
    pub color: Color,
    pub text_align: TextAlign,
    pub line_height: f32,
    pub uppercase: bool,

    pub background_color: Color,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: Display::Block,
            flex_direction: FlexDirection::Row,
            flex_grow: 0.0,
            flex_shrink: 1.0,
            justify_content: JustifyContent::Start,
            align_items: AlignItems::Stretch,
            gap: 0.0,
            width: Dimension::Auto,
            height: Dimension::Auto,
            margin: Edges::default(),
            padding: Edges::default(),
            border_width: 0.0,
            border_color: Color::BLACK,
            font_size: 10.0,
            font_weight: FontWeight::Normal,
            font_family: "Helvetica".to_string(),
            color: Color::BLACK,
            text_align: TextAlign::Left,
            line_height: 1.2,
            uppercase: false,
            background_color: Color::TRANSPARENT,
        }
    }
}

impl ComputedStyle {
    pub fn bold(&self) -> bool {
        self.font_weight == FontWeight::Bold
    }

    /// Style of a bare text run: inherits typography, drops box decoration.
    fn for_text(&self) -> Self {
        Self {
            margin: Edges::default(),
            padding: Edges::default(),
            border_width: 0.0,
            background_color: Color::TRANSPARENT,
            width: Dimension::Auto,
            height: Dimension::Auto,
            flex_grow: 0.0,
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Block,
    Flex,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlexDirection {
    Row,
    Column,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JustifyContent {
    Start,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignItems {
    Start,
    Center,
    Stretch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dimension {
    Auto,
    Px(f32),
    Percent(f32),
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Edges {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

/// RGBA colour (0.0 – 1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::rgb8(0, 0, 0);
    pub const WHITE: Self = Self::rgb8(255, 255, 255);
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    pub const fn rgb8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: 1.0,
        }
    }

    pub fn is_transparent(&self) -> bool {
        self.a < 0.001
    }

    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }
}

/// Tailwind colour subset used by card templates.
fn palette(name: &str) -> Option<Color> {
    Some(match name {
        "white" => Color::WHITE,
        "gray-100" => Color::rgb8(243, 244, 246),
        "gray-300" => Color::rgb8(209, 213, 219),
        "gray-500" => Color::rgb8(107, 114, 128),
        "gray-700" => Color::rgb8(55, 65, 81),
        "gray-900" => Color::rgb8(17, 24, 39),
        "red-600" => Color::rgb8(220, 38, 38),
        "blue-900" => Color::rgb8(30, 58, 138),
        _ => return None,
    })
}

// ---------------------------------------------------------------------------
// Style resolution
// ---------------------------------------------------------------------------

/// Resolve the style for an element, inheriting typography from its parent.
pub fn resolve_style(element: &ElementNode, parent: Option<&ComputedStyle>) -> ComputedStyle {
    let mut style = ComputedStyle::default();
    if let Tag::Unknown(_) = element.tag {
        style.display = Display::None;
    }

    if let Some(p) = parent {
        style.font_size = p.font_size;
        style.font_weight = p.font_weight;
        style.font_family = p.font_family.clone();
        style.color = p.color;
        style.text_align = p.text_align;
        style.line_height = p.line_height;
        style.uppercase = p.uppercase;
    }

    for class in element.classes() {
        apply_class(&mut style, class);
    }
    if let Some(inline) = element.inline_style() {
        apply_inline_style(&mut style, inline);
    }
    style
}

/// Apply one utility class. Unrecognised classes are ignored.
fn apply_class(s: &mut ComputedStyle, class: &str) {
    match class {
        "flex" => s.display = Display::Flex,
        "flex-row" => s.flex_direction = FlexDirection::Row,
        "flex-col" => s.flex_direction = FlexDirection::Column,
        "flex-1" => {
            s.flex_grow = 1.0;
            s.flex_shrink = 1.0;
        }

        "justify-center" => s.justify_content = JustifyContent::Center,
        "items-start" => s.align_items = AlignItems::Start,
        "items-center" => s.align_items = AlignItems::Center,

        "font-bold" => s.font_weight = FontWeight::Bold,
        "uppercase" => s.uppercase = true,
        "text-center" => s.text_align = TextAlign::Center,

        // Card-scale type ramp.
        "text-2xs" => s.font_size = 6.0,
        "text-xs" => s.font_size = 7.0,
        "text-sm" => s.font_size = 8.0,
        "text-base" => s.font_size = 10.0,

        "leading-tight" => s.line_height = 1.1,
        "w-full" => s.width = Dimension::Percent(100.0),
        "border" => s.border_width = 1.0,

        _ => {
            if !try_color_class(s, class) {
                try_spacing_class(s, class);
            }
        }
    }
}

fn try_color_class(s: &mut ComputedStyle, class: &str) -> bool {
    let (target, name) = if let Some(name) = class.strip_prefix("text-") {
        (&mut s.color, name)
    } else if let Some(name) = class.strip_prefix("bg-") {
        (&mut s.background_color, name)
    } else if let Some(name) = class.strip_prefix("border-") {
        (&mut s.border_color, name)
    } else {
        return false;
    };
    match palette(name) {
        Some(color) => {
            *target = color;
            true
        }
        None => false,
    }
}

/// `px-{n}`, `py-{n}`, `mt-{n}`, `gap-{n}` with 1 unit = 2 px at card scale.
fn try_spacing_class(s: &mut ComputedStyle, class: &str) {
    let Some((prefix, value)) = class.rsplit_once('-') else {
        return;
    };
    let Ok(units) = value.parse::<f32>() else {
        return;
    };
    let v = units * 2.0;
    match prefix {
        "px" => {
            s.padding.left = v;
            s.padding.right = v;
        }
        "py" => {
            s.padding.top = v;
            s.padding.bottom = v;
        }
        "mt" => s.margin.top = v,
        "gap" => s.gap = v,
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Inline style parsing (sizes only)
// ---------------------------------------------------------------------------

fn apply_inline_style(s: &mut ComputedStyle, style_str: &str) {
    for decl in style_str.split(';') {
        let Some((prop, val)) = decl.split_once(':') else {
            continue;
        };
        let val = val.trim();
        match prop.trim() {
            "width" => s.width = parse_dimension(val),
            "height" => s.height = parse_dimension(val),
            "font-size" => {
                if let Some(px) = parse_px(val) {
                    s.font_size = px;
                }
            }
            _ => {}
        }
    }
}

fn parse_px(s: &str) -> Option<f32> {
    s.trim().trim_end_matches("px").parse().ok()
}

fn parse_dimension(s: &str) -> Dimension {
    let s = s.trim();
    if let Some(pct) = s.strip_suffix('%') {
        pct.parse().map(Dimension::Percent).unwrap_or(Dimension::Auto)
    } else {
        parse_px(s).map(Dimension::Px).unwrap_or(Dimension::Auto)
    }
}

// ---------------------------------------------------------------------------
// Styled DOM tree
// ---------------------------------------------------------------------------

/// A DOM node annotated with its computed style.
#[derive(Debug, Clone)]
pub enum StyledNode {
    Element {
        tag: Tag,
        style: ComputedStyle,
        children: Vec<StyledNode>,
        /// Original attributes (`src`, `data-kind`, `data-fit-*`).
        attrs: HashMap<String, String>,
    },
    Text {
        text: String,
        style: ComputedStyle,
    },
}

/// Build a styled tree from a DOM tree, resolving styles top-down.
pub fn build_styled_tree(
    nodes: &[DomNode],
    parent_style: Option<&ComputedStyle>,
) -> Vec<StyledNode> {
    let mut result = Vec::new();
    for node in nodes {
        match node {
            DomNode::Element(e) => {
                let style = resolve_style(e, parent_style);
                let children = build_styled_tree(&e.children, Some(&style));
                result.push(StyledNode::Element {
                    tag: e.tag.clone(),
                    style,
                    children,
                    attrs: e.attributes.clone(),
                });
            }
            DomNode::Text(text) if !text.trim().is_empty() => {
                let style = parent_style.map(ComputedStyle::for_text).unwrap_or_default();
                result.push(StyledNode::Text {
                    text: text.clone(),
                    style,
                });
            }
            DomNode::Text(_) => {}
        }
    }
    result
}

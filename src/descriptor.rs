//! Render descriptors – the self-contained output of the card renderer.
//!
//! A descriptor is a small tree of blocks, text runs and image references
//! (already resolved to URLs). It serialises to the controlled HTML subset
//! understood by [`crate::dom`] / [`crate::style`], so the rasterizer never
//! needs to look at an [`crate::employee::EmployeeRecord`].

use serde::{Deserialize, Serialize};

use crate::variant::TemplateVariant;

/// What an image slot holds; decides how a failed load degrades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Photo,
    Signature,
    Barcode,
    Qr,
}

impl ImageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageKind::Photo => "photo",
            ImageKind::Signature => "signature",
            ImageKind::Barcode => "barcode",
            ImageKind::Qr => "qr",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "photo" => Some(ImageKind::Photo),
            "signature" => Some(ImageKind::Signature),
            "barcode" => Some(ImageKind::Barcode),
            "qr" => Some(ImageKind::Qr),
            _ => None,
        }
    }

    /// Codec-service images are hidden when they fail; a broken barcode is
    /// worse than none. Photos and signatures show a placeholder instead.
    pub fn hide_on_failure(&self) -> bool {
        matches!(self, ImageKind::Barcode | ImageKind::Qr)
    }
}

/// Request to shrink a text group until it fits `max_lines`, never going
/// below `min_font_px`. Content is never truncated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitRequest {
    pub max_lines: usize,
    pub min_font_px: f32,
    pub step_px: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Block {
        class: String,
        style: String,
        children: Vec<Node>,
    },
    Text {
        class: String,
        value: String,
    },
    Image {
        style: String,
        src: String,
        kind: ImageKind,
    },
    /// Lines that shrink together, e.g. the two printed name lines.
    FitGroup {
        class: String,
        style: String,
        fit: FitRequest,
        lines: Vec<String>,
    },
}

pub fn block(class: &str, style: &str, children: Vec<Node>) -> Node {
    Node::Block {
        class: class.to_string(),
        style: style.to_string(),
        children,
    }
}

pub fn text(class: &str, value: impl Into<String>) -> Node {
    Node::Text {
        class: class.to_string(),
        value: value.into(),
    }
}

pub fn fit_group(class: &str, style: &str, fit: FitRequest, lines: Vec<String>) -> Node {
    Node::FitGroup {
        class: class.to_string(),
        style: style.to_string(),
        fit,
        lines,
    }
}

pub fn image(width: u32, height: u32, src: impl Into<String>, kind: ImageKind) -> Node {
    Node::Image {
        style: format!("width: {width}px; height: {height}px"),
        src: src.into(),
        kind,
    }
}

/// Descriptor for one printable side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderDescriptor {
    pub variant: TemplateVariant,
    pub root: Node,
}

impl RenderDescriptor {
    /// Serialise to the HTML subset parsed by [`crate::dom::parse_html`].
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        write_node(&self.root, &mut out);
        out
    }

    /// Every referenced image with its kind, in document order.
    pub fn images(&self) -> Vec<(&str, ImageKind)> {
        let mut found = Vec::new();
        collect_images(&self.root, &mut found);
        found
    }

    /// Every visible text value, in document order.
    pub fn texts(&self) -> Vec<&str> {
        let mut found = Vec::new();
        collect_texts(&self.root, &mut found);
        found
    }
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Block {
            class,
            style,
            children,
        } => {
            out.push_str("<div");
            write_attr(out, "class", class);
            write_attr(out, "style", style);
            out.push('>');
            for child in children {
                write_node(child, out);
            }
            out.push_str("</div>");
        }
        Node::Text { class, value } => {
            out.push_str("<p");
            write_attr(out, "class", class);
            out.push('>');
            out.push_str(&escape(value));
            out.push_str("</p>");
        }
        Node::Image { style, src, kind } => {
            out.push_str("<img");
            write_attr(out, "src", src);
            write_attr(out, "data-kind", kind.as_str());
            write_attr(out, "style", style);
            out.push_str(" />");
        }
        Node::FitGroup {
            class,
            style,
            fit,
            lines,
        } => {
            out.push_str("<div");
            write_attr(out, "class", class);
            write_attr(out, "style", style);
            write_attr(out, "data-fit-lines", &fit.max_lines.to_string());
            write_attr(out, "data-fit-min", &fit.min_font_px.to_string());
            write_attr(out, "data-fit-step", &fit.step_px.to_string());
            out.push('>');
            for line in lines {
                out.push_str("<p>");
                out.push_str(&escape(line));
                out.push_str("</p>");
            }
            out.push_str("</div>");
        }
    }
}

fn write_attr(out: &mut String, name: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&escape(value));
    out.push('"');
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn collect_images<'a>(node: &'a Node, found: &mut Vec<(&'a str, ImageKind)>) {
    match node {
        Node::Block { children, .. } => {
            for child in children {
                collect_images(child, found);
            }
        }
        Node::Image { src, kind, .. } => found.push((src.as_str(), *kind)),
        Node::Text { .. } | Node::FitGroup { .. } => {}
    }
}

fn collect_texts<'a>(node: &'a Node, found: &mut Vec<&'a str>) {
    match node {
        Node::Block { children, .. } => {
            for child in children {
                collect_texts(child, found);
            }
        }
        Node::Text { value, .. } => found.push(value),
        Node::FitGroup { lines, .. } => found.extend(lines.iter().map(String::as_str)),
        Node::Image { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{parse_html, DomNode, Tag};
    use crate::variant::{PageGeometry, Side, VariantId};

    fn descriptor(root: Node) -> RenderDescriptor {
        RenderDescriptor {
            variant: TemplateVariant {
                id: VariantId::Primary,
                side: Side::Front,
                geometry: PageGeometry::PORTRAIT_CARD,
            },
            root,
        }
    }

    #[test]
    fn html_round_trips_through_the_parser() {
        let d = descriptor(block(
            "flex flex-col",
            "",
            vec![
                text("font-bold", "Tom & Jerry <Ltd>"),
                image(40, 50, "https://x/p.png?a=1&b=2", ImageKind::Photo),
            ],
        ));
        let dom = parse_html(&d.to_html());
        let DomNode::Element(root) = &dom[0] else {
            panic!("expected element");
        };
        assert_eq!(root.tag, Tag::Div);
        let DomNode::Element(p) = &root.children[0] else {
            panic!("expected <p>");
        };
        assert!(matches!(&p.children[0], DomNode::Text(t) if t == "Tom & Jerry <Ltd>"));
        let DomNode::Element(img) = &root.children[1] else {
            panic!("expected <img>");
        };
        assert_eq!(img.src(), Some("https://x/p.png?a=1&b=2"));
        assert_eq!(img.attr("data-kind"), Some("photo"));
    }

    #[test]
    fn fit_group_carries_its_request() {
        let d = descriptor(fit_group(
            "font-bold",
            "font-size: 20px",
            FitRequest {
                max_lines: 2,
                min_font_px: 11.0,
                step_px: 1.0,
            },
            vec!["A B.".into(), "C".into()],
        ));
        let html = d.to_html();
        assert!(html.contains("data-fit-lines=\"2\""));
        assert!(html.contains("data-fit-min=\"11\""));
        assert_eq!(d.texts(), vec!["A B.", "C"]);
    }

    #[test]
    fn images_are_listed_in_document_order() {
        let d = descriptor(block(
            "",
            "",
            vec![
                image(1, 1, "a", ImageKind::Photo),
                block("", "", vec![image(1, 1, "b", ImageKind::Qr)]),
            ],
        ));
        assert_eq!(d.images(), vec![("a", ImageKind::Photo), ("b", ImageKind::Qr)]);
    }
}

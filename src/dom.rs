//! Descriptor markup parser – turns the HTML subset emitted by
//! [`crate::descriptor`] into a small DOM tree.
//!
//! Supported elements:
//! - Structural: div, p
//! - Replaced: img (self-closing, carries `data-kind`)
//! - Styling via `class` and `style` attributes, fitting via `data-fit-*`

use std::collections::HashMap;

// ---------------------------------------------------------------------------
// DOM types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Div,
    P,
    Img,
    /// Anything else is kept in the tree but never displayed.
    Unknown(String),
}

impl Tag {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "div" => Tag::Div,
            "p" => Tag::P,
            "img" => Tag::Img,
            _ => Tag::Unknown(name.to_string()),
        }
    }

    fn is_void(&self) -> bool {
        matches!(self, Tag::Img)
    }
}

#[derive(Debug, Clone)]
pub enum DomNode {
    Element(ElementNode),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct ElementNode {
    pub tag: Tag,
    pub attributes: HashMap<String, String>,
    pub children: Vec<DomNode>,
}

impl ElementNode {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn classes(&self) -> Vec<&str> {
        self.attr("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn inline_style(&self) -> Option<&str> {
        self.attr("style")
    }

    pub fn src(&self) -> Option<&str> {
        self.attr("src")
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse markup into a list of top-level DOM nodes.
///
/// Descriptor markup is machine-generated and well-formed, so a small
/// recursive-descent parser is enough; unclosed elements are closed at EOF.
pub fn parse_html(html: &str) -> Vec<DomNode> {
    Parser { input: html, pos: 0 }.nodes()
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn nodes(&mut self) -> Vec<DomNode> {
        let mut nodes = Vec::new();
        loop {
            self.skip_blank_between_tags();
            if self.eof() || self.at("</") {
                return nodes;
            }
            if let Some(node) = self.node() {
                nodes.push(node);
            }
        }
    }

    fn node(&mut self) -> Option<DomNode> {
        if self.at("<!--") {
            self.skip_past("-->");
            None
        } else if self.at("<!") || self.at("<?") {
            self.skip_past(">");
            None
        } else if self.at("<") {
            Some(self.element())
        } else {
            Some(self.text())
        }
    }

    fn text(&mut self) -> DomNode {
        let start = self.pos;
        self.advance_while(|c| c != '<');
        DomNode::Text(decode_entities(&self.input[start..self.pos]))
    }

    fn element(&mut self) -> DomNode {
        self.bump(); // '<'
        let mut elem = ElementNode::new(Tag::from_name(&self.name()));

        loop {
            self.advance_while(char::is_whitespace);
            if self.eof() || self.at(">") || self.at("/>") {
                break;
            }
            let before = self.pos;
            let (key, value) = self.attribute();
            if self.pos == before {
                // Stray character inside a tag; step over it.
                self.bump();
                continue;
            }
            elem.attributes.insert(key, value);
        }

        if self.at("/>") {
            self.pos += 2;
            return DomNode::Element(elem);
        }
        if self.at(">") {
            self.bump();
        }
        if elem.tag.is_void() {
            return DomNode::Element(elem);
        }

        elem.children = self.nodes();

        if self.at("</") {
            self.pos += 2;
            self.name();
            self.skip_past(">");
        }
        DomNode::Element(elem)
    }

    fn name(&mut self) -> String {
        let start = self.pos;
        self.advance_while(|c| c.is_alphanumeric() || c == '-' || c == '_');
        self.input[start..self.pos].to_string()
    }

    fn attribute(&mut self) -> (String, String) {
        let key = self.name();
        self.advance_while(char::is_whitespace);
        if !self.at("=") {
            return (key, String::new());
        }
        self.bump();
        self.advance_while(char::is_whitespace);
        let input = self.input;
        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                let start = self.pos;
                self.advance_while(|c| c != quote);
                let raw = &input[start..self.pos];
                self.bump();
                raw
            }
            _ => {
                let start = self.pos;
                self.advance_while(|c| !c.is_whitespace() && c != '>' && c != '/');
                &input[start..self.pos]
            }
        };
        (key, decode_entities(value))
    }

    /// Whitespace between tags is insignificant; whitespace before text is
    /// part of the text.
    fn skip_blank_between_tags(&mut self) {
        let saved = self.pos;
        self.advance_while(char::is_whitespace);
        if !self.eof() && !self.at("<") {
            self.pos = saved;
        }
    }

    fn skip_past(&mut self, marker: &str) {
        match self.input[self.pos..].find(marker) {
            Some(offset) => self.pos += offset + marker.len(),
            None => self.pos = self.input.len(),
        }
    }

    fn advance_while(&mut self, keep: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if !keep(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn at(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }
}

fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", "\u{00A0}")
        .replace("&amp;", "&")
}

//! Font loading, text measurement and glyph coverage using `ttf-parser`.
//!
//! With a TTF/OTF loaded, advances come from the face and glyph outlines are
//! filled with a small scanline rasterizer. Without one, widths use an
//! average-advance heuristic and glyphs are drawn as greeked blocks so the
//! layout stays deterministic either way.

use std::collections::HashMap;
use std::path::Path;

use crate::descriptor::FitRequest;

/// Average advance as a fraction of the font size when no face is loaded.
const AVG_ADVANCE: f32 = 0.5;
const AVG_ADVANCE_BOLD: f32 = 0.55;

/// Vertical samples per pixel row when filling outlines.
const SUBSAMPLES: usize = 4;
/// Straight segments per flattened quadratic / cubic curve.
const QUAD_STEPS: usize = 8;
const CUBIC_STEPS: usize = 12;

/// A loaded font face with metrics.
#[derive(Clone)]
pub struct FontData {
    /// Raw font bytes (kept alive for ttf-parser's zero-copy API).
    pub bytes: Vec<u8>,
    pub units_per_em: f32,
    pub ascender: f32,
    pub descender: f32,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct FontKey {
    pub family: String,
    pub bold: bool,
}

impl FontKey {
    pub fn new(family: &str, bold: bool) -> Self {
        Self {
            family: family.to_string(),
            bold,
        }
    }
}

/// Manages loaded faces. Empty by default, which means heuristic metrics.
#[derive(Default)]
pub struct FontManager {
    fonts: HashMap<FontKey, FontData>,
    default_key: Option<FontKey>,
}

impl FontManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a TTF/OTF font from bytes.
    pub fn load_font(
        &mut self,
        family: &str,
        bold: bool,
        bytes: Vec<u8>,
    ) -> Result<(), String> {
        let face =
            ttf_parser::Face::parse(&bytes, 0).map_err(|e| format!("failed to parse font: {e}"))?;
        let data = FontData {
            units_per_em: face.units_per_em() as f32,
            ascender: face.ascender() as f32,
            descender: face.descender() as f32,
            bytes,
        };
        let key = FontKey::new(family, bold);
        log::debug!("loaded font {key:?} ({} bytes)", data.bytes.len());
        if self.default_key.is_none() {
            self.default_key = Some(key.clone());
        }
        self.fonts.insert(key, data);
        Ok(())
    }

    /// Read a font file from disk and register it under `family`.
    pub fn load_font_file(&mut self, family: &str, bold: bool, path: &Path) -> Result<(), String> {
        let bytes =
            std::fs::read(path).map_err(|e| format!("cannot read font {}: {e}", path.display()))?;
        self.load_font(family, bold, bytes)
    }

    pub fn has_real_fonts(&self) -> bool {
        !self.fonts.is_empty()
    }

    /// Exact face, then the same family in any weight, then the default.
    fn face_data(&self, key: &FontKey) -> Option<&FontData> {
        self.fonts
            .get(key)
            .or_else(|| {
                self.fonts
                    .iter()
                    .find(|(k, _)| k.family == key.family)
                    .map(|(_, d)| d)
            })
            .or_else(|| self.default_key.as_ref().and_then(|k| self.fonts.get(k)))
    }

    /// Width of `text` at `font_size` px.
    pub fn measure_text_width(&self, text: &str, font_size: f32, key: &FontKey) -> f32 {
        let heuristic = || {
            let avg = if key.bold { AVG_ADVANCE_BOLD } else { AVG_ADVANCE };
            text.chars().count() as f32 * font_size * avg
        };
        let Some(data) = self.face_data(key) else {
            return heuristic();
        };
        let Ok(face) = ttf_parser::Face::parse(&data.bytes, 0) else {
            return heuristic();
        };
        let scale = font_size / data.units_per_em;
        text.chars()
            .map(|ch| match face.glyph_index(ch) {
                Some(gid) => face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale,
                None => font_size * AVG_ADVANCE,
            })
            .sum()
    }

    pub fn line_height_px(&self, font_size: f32, line_height_factor: f32) -> f32 {
        font_size * line_height_factor
    }

    pub fn ascender_px(&self, font_size: f32, key: &FontKey) -> f32 {
        match self.face_data(key) {
            Some(data) => data.ascender * font_size / data.units_per_em,
            None => font_size * 0.75,
        }
    }

    fn descender_px(&self, font_size: f32, key: &FontKey) -> f32 {
        match self.face_data(key) {
            Some(data) => -data.descender * font_size / data.units_per_em,
            None => font_size * 0.25,
        }
    }

    /// Rasterize one line of text into an alpha mask.
    pub fn line_coverage(&self, text: &str, font_size: f32, key: &FontKey) -> Coverage {
        let ascent = self.ascender_px(font_size, key);
        let descent = self.descender_px(font_size, key);
        let width = self.measure_text_width(text, font_size, key).ceil() as usize + 2;
        let height = (ascent + descent).ceil() as usize + 2;
        let baseline = ascent.ceil() + 1.0;

        let edges = match self.face_data(key) {
            Some(data) => match ttf_parser::Face::parse(&data.bytes, 0) {
                Ok(face) => glyph_edges(&face, text, font_size / data.units_per_em, baseline),
                Err(_) => greeked_edges(text, font_size, key.bold, baseline),
            },
            None => greeked_edges(text, font_size, key.bold, baseline),
        };
        Coverage::fill(width, height, baseline, &edges)
    }
}

// ---------------------------------------------------------------------------
// Coverage masks
// ---------------------------------------------------------------------------

/// Per-pixel glyph coverage (0.0 – 1.0) for one text line.
#[derive(Debug, Clone)]
pub struct Coverage {
    pub width: usize,
    pub height: usize,
    /// Baseline row, measured from the top of the mask.
    pub baseline: f32,
    pub alpha: Vec<f32>,
}

impl Coverage {
    pub fn at(&self, x: usize, y: usize) -> f32 {
        self.alpha[y * self.width + x]
    }

    /// Nonzero-winding scanline fill of closed edge loops.
    fn fill(width: usize, height: usize, baseline: f32, edges: &[Edge]) -> Self {
        let mut alpha = vec![0.0f32; width * height];
        let mut crossings: Vec<(f32, i32)> = Vec::new();
        let sample_weight = 1.0 / SUBSAMPLES as f32;

        for row in 0..height {
            for sub in 0..SUBSAMPLES {
                let y = row as f32 + (sub as f32 + 0.5) * sample_weight;
                crossings.clear();
                for e in edges {
                    let (top, bottom) = if e.y0 < e.y1 { (e.y0, e.y1) } else { (e.y1, e.y0) };
                    if e.y0 == e.y1 || y < top || y >= bottom {
                        continue;
                    }
                    let x = e.x0 + (y - e.y0) * (e.x1 - e.x0) / (e.y1 - e.y0);
                    crossings.push((x, if e.y1 > e.y0 { 1 } else { -1 }));
                }
                crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

                let mut winding = 0;
                for pair in crossings.windows(2) {
                    winding += pair[0].1;
                    if winding != 0 {
                        add_span(&mut alpha[row * width..(row + 1) * width], pair[0].0, pair[1].0, sample_weight);
                    }
                }
            }
        }
        for a in &mut alpha {
            *a = a.min(1.0);
        }
        Self {
            width,
            height,
            baseline,
            alpha,
        }
    }
}

fn add_span(row: &mut [f32], from: f32, to: f32, weight: f32) {
    let from = from.max(0.0);
    let to = to.min(row.len() as f32);
    if to <= from {
        return;
    }
    let first = from.floor() as usize;
    let last = (to.ceil() as usize).min(row.len());
    for (px, cell) in row.iter_mut().enumerate().take(last).skip(first) {
        let left = (px as f32).max(from);
        let right = (px as f32 + 1.0).min(to);
        if right > left {
            *cell += (right - left) * weight;
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
}

/// Collects flattened outline edges in mask pixel space (y down).
struct EdgeCollector {
    edges: Vec<Edge>,
    scale: f32,
    origin_x: f32,
    baseline: f32,
    start: (f32, f32),
    last: (f32, f32),
}

impl EdgeCollector {
    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin_x + x * self.scale, self.baseline - y * self.scale)
    }

    fn push(&mut self, to: (f32, f32)) {
        self.edges.push(Edge {
            x0: self.last.0,
            y0: self.last.1,
            x1: to.0,
            y1: to.1,
        });
        self.last = to;
    }
}

impl ttf_parser::OutlineBuilder for EdgeCollector {
    fn move_to(&mut self, x: f32, y: f32) {
        let p = self.map(x, y);
        self.start = p;
        self.last = p;
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let p = self.map(x, y);
        self.push(p);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let p0 = self.last;
        let c = self.map(x1, y1);
        let p = self.map(x, y);
        for i in 1..=QUAD_STEPS {
            let t = i as f32 / QUAD_STEPS as f32;
            let u = 1.0 - t;
            self.push((
                u * u * p0.0 + 2.0 * u * t * c.0 + t * t * p.0,
                u * u * p0.1 + 2.0 * u * t * c.1 + t * t * p.1,
            ));
        }
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let p0 = self.last;
        let c1 = self.map(x1, y1);
        let c2 = self.map(x2, y2);
        let p = self.map(x, y);
        for i in 1..=CUBIC_STEPS {
            let t = i as f32 / CUBIC_STEPS as f32;
            let u = 1.0 - t;
            let (a, b, c, d) = (u * u * u, 3.0 * u * u * t, 3.0 * u * t * t, t * t * t);
            self.push((
                a * p0.0 + b * c1.0 + c * c2.0 + d * p.0,
                a * p0.1 + b * c1.1 + c * c2.1 + d * p.1,
            ));
        }
    }

    fn close(&mut self) {
        if self.last != self.start {
            let start = self.start;
            self.push(start);
        }
    }
}

fn glyph_edges(face: &ttf_parser::Face<'_>, text: &str, scale: f32, baseline: f32) -> Vec<Edge> {
    let mut collector = EdgeCollector {
        edges: Vec::new(),
        scale,
        origin_x: 1.0,
        baseline,
        start: (0.0, 0.0),
        last: (0.0, 0.0),
    };
    for ch in text.chars() {
        match face.glyph_index(ch) {
            Some(gid) => {
                face.outline_glyph(gid, &mut collector);
                collector.origin_x += face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale;
            }
            None => collector.origin_x += scale * face.units_per_em() as f32 * AVG_ADVANCE,
        }
    }
    collector.edges
}

/// One block per visible character: tall for capitals and digits, short for
/// everything else.
fn greeked_edges(text: &str, font_size: f32, bold: bool, baseline: f32) -> Vec<Edge> {
    let advance = font_size * if bold { AVG_ADVANCE_BOLD } else { AVG_ADVANCE };
    let mut edges = Vec::new();
    let mut x = 1.0;
    for ch in text.chars() {
        if !ch.is_whitespace() {
            let top = baseline
                - font_size
                    * if ch.is_uppercase() || ch.is_ascii_digit() {
                        0.7
                    } else {
                        0.5
                    };
            let (left, right) = (x + advance * 0.15, x + advance * 0.85);
            edges.push(Edge { x0: left, y0: top, x1: left, y1: baseline });
            edges.push(Edge { x0: right, y0: baseline, x1: right, y1: top });
        }
        x += advance;
    }
    edges
}

// ---------------------------------------------------------------------------
// Wrapping and fitting
// ---------------------------------------------------------------------------

/// Word-wrap text to fit within `max_width` pixels. Returns a vec of lines.
///
/// A single word wider than the line is kept whole on its own line.
pub fn wrap_text(
    text: &str,
    font_size: f32,
    key: &FontKey,
    max_width: f32,
    fonts: &FontManager,
) -> Vec<String> {
    if max_width <= 0.0 || text.is_empty() {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if !current.is_empty()
                && fonts.measure_text_width(&candidate, font_size, key) > max_width
            {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            } else {
                current = candidate;
            }
        }
        lines.push(current);
    }
    lines
}

/// Result of shrinking a group of lines to a line budget.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedText {
    pub font_size: f32,
    /// Wrapped output, one entry per printed line.
    pub lines: Vec<String>,
}

/// Step the font size down from `base` until every entry of `lines`,
/// wrapped at `max_width`, fits in `fit.max_lines` rows, or the floor is
/// reached. Content is never dropped; at the floor the text overflows.
pub fn fit_font_size(
    lines: &[String],
    base: f32,
    fit: &FitRequest,
    key: &FontKey,
    max_width: f32,
    fonts: &FontManager,
) -> FittedText {
    let floor = fit.min_font_px.min(base);
    let step = if fit.step_px > 0.0 { fit.step_px } else { 1.0 };
    let mut size = base;
    loop {
        let wrapped: Vec<String> = lines
            .iter()
            .flat_map(|l| wrap_text(l, size, key, max_width, fonts))
            .collect();
        if wrapped.len() <= fit.max_lines || size <= floor {
            return FittedText {
                font_size: size,
                lines: wrapped,
            };
        }
        size = (size - step).max(floor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regular() -> FontKey {
        FontKey::new("Helvetica", false)
    }

    #[test]
    fn heuristic_text_width() {
        let mgr = FontManager::default();
        let w = mgr.measure_text_width("Hello", 16.0, &regular());
        // 5 chars × 16 × 0.5 = 40
        assert!((w - 40.0).abs() < 0.1);
    }

    #[test]
    fn word_wrap_basic() {
        let mgr = FontManager::default();
        let lines = wrap_text("Hello world foo bar", 16.0, &regular(), 60.0, &mgr);
        assert!(lines.len() >= 2, "Expected wrapping, got {lines:?}");
    }

    #[test]
    fn long_word_is_never_split() {
        let mgr = FontManager::default();
        let lines = wrap_text("Supercalifragilistic", 16.0, &regular(), 20.0, &mgr);
        assert_eq!(lines, vec!["Supercalifragilistic".to_string()]);
    }

    #[test]
    fn fit_shrinks_until_two_lines() {
        let mgr = FontManager::default();
        let fit = FitRequest {
            max_lines: 2,
            min_font_px: 11.0,
            step_px: 1.0,
        };
        // "Maria Cristina" is 14 chars: 14 × 0.5 × size <= 150 needs size <= 21.
        let lines = vec!["Maria Cristina".to_string(), "Santos".to_string()];
        let fitted = fit_font_size(&lines, 24.0, &fit, &regular(), 150.0, &mgr);
        assert_eq!(fitted.lines.len(), 2);
        assert_eq!(fitted.font_size, 21.0);
    }

    #[test]
    fn fit_stops_at_floor_without_truncating() {
        let mgr = FontManager::default();
        let fit = FitRequest {
            max_lines: 2,
            min_font_px: 11.0,
            step_px: 1.0,
        };
        let lines = vec![
            "Maximiliano Bartolome Crisostomo".to_string(),
            "Dela Cruz-Villanueva".to_string(),
        ];
        let fitted = fit_font_size(&lines, 20.0, &fit, &regular(), 80.0, &mgr);
        assert_eq!(fitted.font_size, 11.0);
        assert!(fitted.lines.len() > 2);
        let joined = fitted.lines.join(" ");
        for word in ["Maximiliano", "Bartolome", "Crisostomo", "Dela", "Cruz-Villanueva"] {
            assert!(joined.contains(word));
        }
    }

    #[test]
    fn greeked_line_covers_visible_characters_only() {
        let mgr = FontManager::default();
        let cov = mgr.line_coverage("A B", 10.0, &regular());
        let row = (cov.baseline - 2.0) as usize;
        let column_sum = |from: usize, to: usize| (from..to).map(|x| cov.at(x, row)).sum::<f32>();
        // Cells are 5 px wide starting at x = 1.
        assert!(column_sum(2, 6) > 2.0);
        assert!(column_sum(7, 11) < 0.01);
        assert!(column_sum(12, 16) > 2.0);
    }

    #[test]
    fn scanline_fill_of_square_is_solid() {
        let square = [
            Edge { x0: 2.0, y0: 2.0, x1: 2.0, y1: 6.0 },
            Edge { x0: 2.0, y0: 6.0, x1: 6.0, y1: 6.0 },
            Edge { x0: 6.0, y0: 6.0, x1: 6.0, y1: 2.0 },
            Edge { x0: 6.0, y0: 2.0, x1: 2.0, y1: 2.0 },
        ];
        let cov = Coverage::fill(8, 8, 6.0, &square);
        assert!((cov.at(3, 3) - 1.0).abs() < 1e-4);
        assert_eq!(cov.at(0, 0), 0.0);
        assert_eq!(cov.at(7, 3), 0.0);
        let total: f32 = cov.alpha.iter().sum();
        assert!((total - 16.0).abs() < 1e-3);
    }
}

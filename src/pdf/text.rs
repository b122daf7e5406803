//! Positioned text extraction and marker search
//!
//! Interprets a page's content stream just far enough to know where each
//! shown glyph lands in default user space (bottom-left origin), then lets
//! callers look up the bounding box of a piece of text.

use std::collections::HashMap;
use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};
use crate::error::Result;
use super::fonts::{as_number, resolve, FontMetrics};
use super::geometry::{Matrix, Rect};

/// A glyph with its position on the page
#[derive(Debug, Clone)]
pub struct PositionedGlyph {
    /// Unicode text of the glyph (usually one character)
    pub text: String,
    /// Bounding box in user space
    pub bbox: Rect,
    /// Baseline origin in user space
    pub origin: (f32, f32),
    /// Effective font size in user space
    pub font_size: f32,
}

/// The text of one page with a mapping back to glyph boxes
#[derive(Debug, Clone, Default)]
pub struct PageText {
    glyphs: Vec<PositionedGlyph>,
    chars: Vec<char>,
    /// Glyph index for each char; `None` for inserted separators
    owners: Vec<Option<usize>>,
}

impl PageText {
    /// Extract the positioned text of a page
    pub fn extract(doc: &Document, page_id: ObjectId) -> Result<PageText> {
        let fonts = page_fonts(doc, page_id);
        let content = doc.get_page_content(page_id)?;
        Self::from_content(&content, &fonts)
    }

    /// Interpret raw content stream bytes with the given font resources
    pub fn from_content(content: &[u8], fonts: &HashMap<Vec<u8>, FontMetrics>) -> Result<PageText> {
        let content = Content::decode(content)?;
        let mut interpreter = Interpreter::new(fonts);

        for op in &content.operations {
            interpreter.execute(&op.operator, &op.operands);
        }

        Ok(interpreter.page)
    }

    /// The assembled page text, with separators between lines and words
    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn glyphs(&self) -> &[PositionedGlyph] {
        &self.glyphs
    }

    /// Bounding box of the first occurrence of `needle`
    pub fn find(&self, needle: &str) -> Option<Rect> {
        let needle: Vec<char> = needle.chars().collect();
        if needle.is_empty() || needle.len() > self.chars.len() {
            return None;
        }

        let start = self.chars
            .windows(needle.len())
            .position(|window| window == needle.as_slice())?;

        self.owners[start..start + needle.len()]
            .iter()
            .flatten()
            .map(|&idx| self.glyphs[idx].bbox)
            .reduce(|acc, bbox| acc.union(&bbox))
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.find(needle).is_some()
    }

    fn push_glyph(&mut self, glyph: PositionedGlyph) {
        if let Some(last) = self.glyphs.last() {
            let size = last.font_size.max(glyph.font_size).max(1.0);
            let dy = (glyph.origin.1 - last.origin.1).abs();
            let gap = glyph.bbox.x0 - last.bbox.x1;
            let at_whitespace = self.chars.last().map_or(true, |c| c.is_whitespace())
                || glyph.text.starts_with(char::is_whitespace);

            if dy > size * 0.5 {
                self.push_separator('\n');
            } else if gap > size * 0.25 && !at_whitespace {
                self.push_separator(' ');
            }
        }

        let idx = self.glyphs.len();
        for c in glyph.text.chars() {
            self.chars.push(c);
            self.owners.push(Some(idx));
        }
        self.glyphs.push(glyph);
    }

    fn push_separator(&mut self, c: char) {
        self.chars.push(c);
        self.owners.push(None);
    }
}

/// Font metrics for every font resource of a page, keyed by resource name
pub fn page_fonts(doc: &Document, page_id: ObjectId) -> HashMap<Vec<u8>, FontMetrics> {
    let mut fonts = HashMap::new();

    let Some(resources) = page_resources(doc, page_id) else {
        return fonts;
    };

    let font_dict = resources.get(b"Font").ok()
        .map(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_dict().ok());

    if let Some(font_dict) = font_dict {
        for (name, value) in font_dict.iter() {
            if let Ok(dict) = resolve(doc, value).as_dict() {
                fonts.insert(name.clone(), FontMetrics::from_dict(doc, dict));
            }
        }
    }

    fonts
}

/// The page's Resources dictionary, following inheritance through /Parent
pub(crate) fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&lopdf::Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;

    // Page trees are shallow; the bound guards against cyclic /Parent links
    for _ in 0..32 {
        if let Ok(res) = node.get(b"Resources") {
            return resolve(doc, res).as_dict().ok();
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }

    None
}

/// Text state parameters, saved and restored with the graphics state
#[derive(Debug, Clone)]
struct TextState {
    font: Option<Vec<u8>>,
    size: f32,
    char_spacing: f32,
    word_spacing: f32,
    h_scale: f32,
    leading: f32,
    rise: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: None,
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct GraphicsState {
    ctm: Matrix,
    text: TextState,
}

struct Interpreter<'a> {
    fonts: &'a HashMap<Vec<u8>, FontMetrics>,
    fallback: FontMetrics,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    page: PageText,
}

impl<'a> Interpreter<'a> {
    fn new(fonts: &'a HashMap<Vec<u8>, FontMetrics>) -> Self {
        Self {
            fonts,
            fallback: FontMetrics::helvetica(),
            state: GraphicsState::default(),
            stack: Vec::new(),
            text_matrix: Matrix::identity(),
            line_matrix: Matrix::identity(),
            page: PageText::default(),
        }
    }

    fn execute(&mut self, operator: &str, operands: &[Object]) {
        let num = |i: usize| operands.get(i).and_then(as_number);

        match operator {
            "q" => self.stack.push(self.state.clone()),
            "Q" => {
                if let Some(state) = self.stack.pop() {
                    self.state = state;
                }
            }
            "cm" => {
                if let Some(m) = matrix_operands(operands) {
                    self.state.ctm = m.then(&self.state.ctm);
                }
            }
            "BT" => {
                self.text_matrix = Matrix::identity();
                self.line_matrix = Matrix::identity();
            }
            "Tf" => {
                self.state.text.font = operands.first()
                    .and_then(|o| o.as_name().ok())
                    .map(|name| name.to_vec());
                self.state.text.size = num(1).unwrap_or(0.0);
            }
            "Tc" => self.state.text.char_spacing = num(0).unwrap_or(0.0),
            "Tw" => self.state.text.word_spacing = num(0).unwrap_or(0.0),
            "Tz" => self.state.text.h_scale = num(0).unwrap_or(100.0) / 100.0,
            "TL" => self.state.text.leading = num(0).unwrap_or(0.0),
            "Ts" => self.state.text.rise = num(0).unwrap_or(0.0),
            "Td" => self.move_line(num(0).unwrap_or(0.0), num(1).unwrap_or(0.0)),
            "TD" => {
                let ty = num(1).unwrap_or(0.0);
                self.state.text.leading = -ty;
                self.move_line(num(0).unwrap_or(0.0), ty);
            }
            "Tm" => {
                if let Some(m) = matrix_operands(operands) {
                    self.text_matrix = m;
                    self.line_matrix = m;
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(bytes) = operands.first().and_then(string_bytes) {
                    self.show(bytes);
                }
            }
            "'" => {
                self.next_line();
                if let Some(bytes) = operands.first().and_then(string_bytes) {
                    self.show(bytes);
                }
            }
            "\"" => {
                self.state.text.word_spacing = num(0).unwrap_or(0.0);
                self.state.text.char_spacing = num(1).unwrap_or(0.0);
                self.next_line();
                if let Some(bytes) = operands.get(2).and_then(string_bytes) {
                    self.show(bytes);
                }
            }
            "TJ" => {
                let Some(Ok(items)) = operands.first().map(|o| o.as_array()) else {
                    return;
                };
                for item in items {
                    if let Some(bytes) = string_bytes(item) {
                        self.show(bytes);
                    } else if let Some(adjust) = as_number(item) {
                        let ts = &self.state.text;
                        let tx = -adjust / 1000.0 * ts.size * ts.h_scale;
                        self.text_matrix = Matrix::translation(tx, 0.0).then(&self.text_matrix);
                    }
                }
            }
            _ => {}
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translation(tx, ty).then(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = self.state.text.leading;
        self.move_line(0.0, -leading);
    }

    fn show(&mut self, bytes: &[u8]) {
        let ts = self.state.text.clone();
        let fonts = self.fonts;
        let metrics = ts.font.as_ref()
            .and_then(|name| fonts.get(name))
            .unwrap_or(&self.fallback);

        for decoded in metrics.decode(bytes) {
            let w0 = metrics.width(decoded.code) / 1000.0;
            let render = self.text_matrix.then(&self.state.ctm);

            let glyph_box = Rect::new(
                0.0,
                ts.rise + metrics.descent / 1000.0 * ts.size,
                w0 * ts.size * ts.h_scale,
                ts.rise + metrics.ascent / 1000.0 * ts.size,
            );

            let glyph = PositionedGlyph {
                text: decoded.text,
                bbox: render.apply_rect(&glyph_box),
                origin: render.apply(0.0, ts.rise),
                font_size: ts.size * render.vertical_scale(),
            };
            self.page.push_glyph(glyph);

            let mut advance = w0 * ts.size + ts.char_spacing;
            if decoded.is_space {
                advance += ts.word_spacing;
            }
            self.text_matrix = Matrix::translation(advance * ts.h_scale, 0.0).then(&self.text_matrix);
        }
    }
}

fn matrix_operands(operands: &[Object]) -> Option<Matrix> {
    if operands.len() < 6 {
        return None;
    }
    let mut values = [0.0f32; 6];
    for (slot, obj) in values.iter_mut().zip(operands) {
        *slot = as_number(obj)?;
    }
    Some(Matrix::from_operands(values))
}

fn string_bytes(obj: &Object) -> Option<&[u8]> {
    match obj {
        Object::String(bytes, _) => Some(bytes),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn helvetica_fonts() -> HashMap<Vec<u8>, FontMetrics> {
        let mut fonts = HashMap::new();
        fonts.insert(b"F1".to_vec(), FontMetrics::helvetica());
        fonts
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn test_single_line_text_and_box() {
        let content = b"BT /F1 12 Tf 72 700 Td (Paciente: Fulano) Tj ET";
        let page = PageText::from_content(content, &helvetica_fonts()).unwrap();

        assert_eq!(page.text(), "Paciente: Fulano");

        let rect = page.find("Paciente:").unwrap();
        assert!(close(rect.x0, 72.0));
        assert!(close(rect.x1, 72.0 + 50.028));
        assert!(close(rect.y0, 700.0 - 0.207 * 12.0));
        assert!(close(rect.y1, 700.0 + 0.718 * 12.0));
    }

    #[test]
    fn test_lines_are_separated() {
        let content = b"BT /F1 12 Tf 14 TL 72 700 Td (Paciente:) Tj T* (Bras\xEDlia, 10 de maio) Tj ET";
        let page = PageText::from_content(content, &helvetica_fonts()).unwrap();

        assert_eq!(page.text(), "Paciente:\nBrasília, 10 de maio");

        let rect = page.find("Brasília,").unwrap();
        assert!(close(rect.x0, 72.0));
        assert!(close(rect.y0, 686.0 - 0.207 * 12.0));
    }

    #[test]
    fn test_tj_array_with_kerning_stays_joined() {
        let content = b"BT /F1 10 Tf 100 500 Td [(Pac) -20 (iente:)] TJ ET";
        let page = PageText::from_content(content, &helvetica_fonts()).unwrap();

        assert_eq!(page.text(), "Paciente:");
        let rect = page.find("Paciente:").unwrap();
        // kerning of -20 moves the second run 0.2pt to the right
        assert!(close(rect.x1, 100.0 + 41.69 + 0.2));
    }

    #[test]
    fn test_word_gap_inserts_space() {
        let content = b"BT /F1 12 Tf 72 700 Td (Paciente:) Tj 80 0 Td (MARIA) Tj ET";
        let page = PageText::from_content(content, &helvetica_fonts()).unwrap();

        assert_eq!(page.text(), "Paciente: MARIA");
    }

    #[test]
    fn test_ctm_and_graphics_state() {
        // Flipped coordinate system like Google Docs exports, restored by Q
        let content = b"q 1 0 0 -1 0 792 cm BT /F1 12 Tf 1 0 0 -1 72 100 Tm (Paciente:) Tj ET Q \
                        BT /F1 12 Tf 72 50 Td (Bras\xEDlia,) Tj ET";
        let page = PageText::from_content(content, &helvetica_fonts()).unwrap();

        let rect = page.find("Paciente:").unwrap();
        // Tm flips back, so the glyphs are upright with baseline at 792 - 100
        assert!(close(rect.x0, 72.0));
        assert!(close(rect.y0, 692.0 - 0.207 * 12.0));

        let rect = page.find("Brasília,").unwrap();
        assert!(close(rect.y0, 50.0 - 0.207 * 12.0));
    }

    #[test]
    fn test_scaled_text_matrix() {
        let content = b"BT /F1 1 Tf 12 0 0 12 72 700 Tm (Paciente:) Tj ET";
        let page = PageText::from_content(content, &helvetica_fonts()).unwrap();

        let rect = page.find("Paciente:").unwrap();
        assert!(close(rect.width(), 50.028));
        assert!(close(page.glyphs()[0].font_size, 12.0));
    }

    #[test]
    fn test_missing_marker() {
        let content = b"BT /F1 12 Tf 72 700 Td (Nome do paciente) Tj ET";
        let page = PageText::from_content(content, &helvetica_fonts()).unwrap();

        assert!(page.find("Paciente:").is_none());
        assert!(!page.contains("Brasília,"));
        assert!(page.find("").is_none());
    }

    #[test]
    fn test_unknown_font_uses_helvetica() {
        let content = b"BT /F9 12 Tf 72 700 Td (Paciente:) Tj ET";
        let page = PageText::from_content(content, &HashMap::new()).unwrap();

        let rect = page.find("Paciente:").unwrap();
        assert!(close(rect.width(), 50.028));
    }
}

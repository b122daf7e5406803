//! Font metrics and glyph decoding for marker search
//!
//! Only what is needed to measure and read text on a page: glyph widths,
//! ascent/descent, ToUnicode CMaps and WinAnsi decoding. Fonts that lack
//! width information fall back to standard Helvetica metrics.

use std::collections::HashMap;
use lopdf::{Dictionary, Document, Object, ObjectId};
use deunicode::deunicode_char;

/// Helvetica ascent/descent in 1/1000 em, used when a font has no descriptor
const DEFAULT_ASCENT: f32 = 718.0;
const DEFAULT_DESCENT: f32 = -207.0;

/// Width used for codes a font gives no width for
const FALLBACK_WIDTH: f32 = 500.0;

/// Helvetica glyph widths for chars 32-126 (1/1000 em)
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, // space ! " # $ % & ' ( )
    389, 584, 278, 333, 278, 278, 556, 556, 556, 556, // * + , - . / 0 1 2 3
    556, 556, 556, 556, 556, 556, 278, 278, 584, 584, // 4 5 6 7 8 9 : ; < =
    584, 556, 1015, 667, 667, 722, 722, 667, 611, 778, // > ? @ A B C D E F G
    722, 278, 500, 667, 556, 833, 722, 778, 667, 778, // H I J K L M N O P Q
    722, 667, 611, 722, 667, 944, 667, 667, 611, 278, // R S T U V W X Y Z [
    278, 278, 469, 556, 333, 556, 556, 500, 556, 556, // \ ] ^ _ ` a b c d e
    278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // f g h i j k l m n o
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, // p q r s t u v w x y
    500, 334, 260, 334, 584,                          // z { | } ~
];

/// WinAnsiEncoding code points for bytes 0x80-0x9F (0 = undefined)
const WIN_ANSI_HIGH: [u32; 32] = [
    0x20AC, 0, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021,
    0x02C6, 0x2030, 0x0160, 0x2039, 0x0152, 0, 0x017D, 0,
    0, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013, 0x2014,
    0x02DC, 0x2122, 0x0161, 0x203A, 0x0153, 0, 0x017E, 0x0178,
];

/// Where glyph widths come from
#[derive(Debug, Clone)]
enum Widths {
    /// `/FirstChar` + `/Widths` of a simple font
    Simple { first_char: u32, widths: Vec<f32>, missing: f32 },
    /// `/W` + `/DW` of a CID font
    Cid { widths: HashMap<u32, f32>, default: f32 },
    /// Standard-14 font without a widths array
    Standard { monospaced: bool },
}

/// A decoded character code
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedCode {
    pub code: u32,
    pub text: String,
    /// Single-byte code 32, which receives word spacing
    pub is_space: bool,
}

/// Metrics and decoding tables of one page font
#[derive(Debug, Clone)]
pub struct FontMetrics {
    widths: Widths,
    code_len: usize,
    to_unicode: Option<HashMap<u32, String>>,
    /// Ascent in 1/1000 em
    pub ascent: f32,
    /// Descent in 1/1000 em (negative)
    pub descent: f32,
}

impl FontMetrics {
    /// Metrics of standard Helvetica, used for unknown font resources
    pub fn helvetica() -> Self {
        Self {
            widths: Widths::Standard { monospaced: false },
            code_len: 1,
            to_unicode: None,
            ascent: DEFAULT_ASCENT,
            descent: DEFAULT_DESCENT,
        }
    }

    /// Read metrics from a font dictionary
    pub fn from_dict(doc: &Document, font: &Dictionary) -> Self {
        let subtype = name_of(font, b"Subtype").unwrap_or_default();
        let base_font = name_of(font, b"BaseFont").unwrap_or_default();

        let to_unicode = font.get(b"ToUnicode").ok()
            .and_then(|obj| stream_bytes(doc, obj))
            .map(|data| parse_to_unicode(&data))
            .filter(|map| !map.is_empty());

        if subtype == "Type0" {
            let descendant = font.get(b"DescendantFonts").ok()
                .map(|obj| resolve(doc, obj))
                .and_then(|obj| obj.as_array().ok())
                .and_then(|arr| arr.first())
                .map(|obj| resolve(doc, obj))
                .and_then(|obj| obj.as_dict().ok());

            let (widths, ascent, descent) = match descendant {
                Some(cid_font) => {
                    let default = number_of(doc, cid_font, b"DW").unwrap_or(1000.0);
                    let widths = cid_font.get(b"W").ok()
                        .map(|obj| resolve(doc, obj))
                        .and_then(|obj| obj.as_array().ok())
                        .map(|arr| parse_cid_widths(doc, arr))
                        .unwrap_or_default();
                    let (ascent, descent) = descriptor_metrics(doc, cid_font);
                    (Widths::Cid { widths, default }, ascent, descent)
                }
                None => (
                    Widths::Cid { widths: HashMap::new(), default: 1000.0 },
                    DEFAULT_ASCENT,
                    DEFAULT_DESCENT,
                ),
            };

            log::debug!("Type0 font {} ({} ToUnicode entries)", base_font,
                to_unicode.as_ref().map_or(0, |m| m.len()));

            return Self { widths, code_len: 2, to_unicode, ascent, descent };
        }

        let widths_array = font.get(b"Widths").ok()
            .map(|obj| resolve(doc, obj))
            .and_then(|obj| obj.as_array().ok());

        let widths = match widths_array {
            Some(arr) => Widths::Simple {
                first_char: number_of(doc, font, b"FirstChar").unwrap_or(0.0) as u32,
                widths: arr.iter().map(|w| as_number(resolve(doc, w)).unwrap_or(0.0)).collect(),
                missing: descriptor(doc, font)
                    .and_then(|d| number_of(doc, d, b"MissingWidth"))
                    .filter(|w| *w > 0.0)
                    .unwrap_or(FALLBACK_WIDTH),
            },
            None => Widths::Standard { monospaced: base_font.contains("Courier") },
        };

        let (ascent, descent) = descriptor_metrics(doc, font);

        Self { widths, code_len: 1, to_unicode, ascent, descent }
    }

    /// Split a shown string into character codes with their text
    pub fn decode(&self, bytes: &[u8]) -> Vec<DecodedCode> {
        bytes.chunks(self.code_len)
            .map(|chunk| {
                let code = chunk.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32);
                let text = match self.to_unicode.as_ref().and_then(|m| m.get(&code)) {
                    Some(text) => text.clone(),
                    None if self.code_len == 1 => win_ansi_char(code as u8).to_string(),
                    None => char::REPLACEMENT_CHARACTER.to_string(),
                };
                DecodedCode {
                    code,
                    text,
                    is_space: self.code_len == 1 && code == 32,
                }
            })
            .collect()
    }

    /// Glyph width of `code` in 1/1000 em
    pub fn width(&self, code: u32) -> f32 {
        match &self.widths {
            Widths::Simple { first_char, widths, missing } => code
                .checked_sub(*first_char)
                .and_then(|idx| widths.get(idx as usize))
                .copied()
                .unwrap_or(*missing),
            Widths::Cid { widths, default } => widths.get(&code).copied().unwrap_or(*default),
            Widths::Standard { monospaced: true } => 600.0,
            Widths::Standard { monospaced: false } => helvetica_width(code),
        }
    }
}

/// Helvetica width for a WinAnsi code; accented letters take their base letter's width
fn helvetica_width(code: u32) -> f32 {
    if (32..=126).contains(&code) {
        return HELVETICA_WIDTHS[(code - 32) as usize] as f32;
    }

    let base = deunicode_char(win_ansi_char(code as u8)).map(str::as_bytes);
    match base {
        Some(&[b]) if (32..=126).contains(&b) => HELVETICA_WIDTHS[(b - 32) as usize] as f32,
        _ => 556.0,
    }
}

/// Decode one WinAnsiEncoding byte
pub fn win_ansi_char(byte: u8) -> char {
    if (0x80..=0x9F).contains(&byte) {
        let cp = WIN_ANSI_HIGH[(byte - 0x80) as usize];
        if cp != 0 {
            if let Some(c) = char::from_u32(cp) {
                return c;
            }
        }
    }
    byte as char
}

/// Encode text as WinAnsi bytes, replacing unmappable characters with '?'
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| {
            let cp = c as u32;
            if cp < 0x80 || (0xA0..=0xFF).contains(&cp) {
                return cp as u8;
            }
            WIN_ANSI_HIGH.iter()
                .position(|&high| high == cp && high != 0)
                .map(|idx| 0x80 + idx as u8)
                .unwrap_or(b'?')
        })
        .collect()
}

/// Add standard Helvetica (one of the 14 standard PDF fonts) to the document
pub fn add_helvetica_font(doc: &mut Document) -> ObjectId {
    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"Type1".to_vec()));
    font.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
    font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));

    doc.add_object(Object::Dictionary(font))
}

/// Follow a single reference, if any
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Integer or real as f32
pub(crate) fn as_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

fn number_of(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<f32> {
    dict.get(key).ok().and_then(|obj| as_number(resolve(doc, obj)))
}

fn name_of(dict: &Dictionary, key: &[u8]) -> Option<String> {
    dict.get(key).ok()
        .and_then(|obj| obj.as_name().ok())
        .map(|name| String::from_utf8_lossy(name).into_owned())
}

fn descriptor<'a>(doc: &'a Document, font: &'a Dictionary) -> Option<&'a Dictionary> {
    font.get(b"FontDescriptor").ok()
        .map(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_dict().ok())
}

fn descriptor_metrics(doc: &Document, font: &Dictionary) -> (f32, f32) {
    let Some(desc) = descriptor(doc, font) else {
        return (DEFAULT_ASCENT, DEFAULT_DESCENT);
    };

    let ascent = number_of(doc, desc, b"Ascent").filter(|a| *a > 0.0).unwrap_or(DEFAULT_ASCENT);
    let descent = number_of(doc, desc, b"Descent")
        .map(|d| -d.abs())
        .filter(|d| *d < 0.0)
        .unwrap_or(DEFAULT_DESCENT);

    (ascent, descent)
}

/// Raw bytes of a (possibly referenced) stream, decompressed when filtered
fn stream_bytes(doc: &Document, obj: &Object) -> Option<Vec<u8>> {
    match resolve(doc, obj) {
        Object::Stream(stream) => Some(
            stream.decompressed_content().unwrap_or_else(|_| stream.content.clone()),
        ),
        _ => None,
    }
}

/// Parse a CID font `/W` array: `c [w1 w2 ...]` or `c_first c_last w`
fn parse_cid_widths(doc: &Document, arr: &[Object]) -> HashMap<u32, f32> {
    let mut widths = HashMap::new();
    let mut i = 0;

    while i < arr.len() {
        let Some(first) = as_number(resolve(doc, &arr[i])) else { break };
        let first = first as u32;

        match arr.get(i + 1).map(|obj| resolve(doc, obj)) {
            Some(Object::Array(list)) => {
                for (offset, w) in list.iter().enumerate() {
                    let Some(code) = u32::try_from(offset).ok().and_then(|o| first.checked_add(o)) else {
                        break;
                    };
                    if let Some(w) = as_number(resolve(doc, w)) {
                        widths.insert(code, w);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let last = as_number(last).map(|v| v as u32);
                let width = arr.get(i + 2).and_then(|obj| as_number(resolve(doc, obj)));
                if let (Some(last), Some(width)) = (last, width) {
                    for code in first..=last.min(first.saturating_add(0xFFFF)) {
                        widths.insert(code, width);
                    }
                }
                i += 3;
            }
            None => break,
        }
    }

    widths
}

#[derive(Debug, Clone, PartialEq)]
enum CMapToken {
    Hex(Vec<u8>),
    Word(String),
    Open,
    Close,
}

fn tokenize_cmap(data: &[u8]) -> Vec<CMapToken> {
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let b = data[i];
        match b {
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    i += 1;
                }
            }
            b'(' => {
                // Literal strings only appear in the CMap header
                while i < data.len() && data[i] != b')' {
                    if data[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
            }
            b'<' if data.get(i + 1) == Some(&b'<') => i += 2,
            b'>' => i += 1,
            b'<' => {
                let start = i + 1;
                let end = data[start..].iter().position(|&c| c == b'>').map_or(data.len(), |p| start + p);
                let digits: Vec<u8> = data[start..end].iter()
                    .copied()
                    .filter(|c| c.is_ascii_hexdigit())
                    .collect();
                tokens.push(CMapToken::Hex(hex_to_bytes(&digits)));
                i = end + 1;
            }
            b'[' => {
                tokens.push(CMapToken::Open);
                i += 1;
            }
            b']' => {
                tokens.push(CMapToken::Close);
                i += 1;
            }
            _ if b.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                while i < data.len()
                    && !data[i].is_ascii_whitespace()
                    && !b"<>[]()%".contains(&data[i])
                {
                    i += 1;
                }
                tokens.push(CMapToken::Word(String::from_utf8_lossy(&data[start..i]).into_owned()));
            }
        }
    }

    tokens
}

fn hex_to_bytes(digits: &[u8]) -> Vec<u8> {
    let nibble = |c: u8| (c as char).to_digit(16).unwrap_or(0) as u8;
    digits.chunks(2)
        .map(|pair| match pair {
            [hi, lo] => (nibble(*hi) << 4) | nibble(*lo),
            [hi] => nibble(*hi) << 4,
            _ => 0,
        })
        .collect()
}

fn bytes_to_code(bytes: &[u8]) -> u32 {
    bytes.iter().take(4).fold(0u32, |acc, b| (acc << 8) | *b as u32)
}

fn utf16_units(bytes: &[u8]) -> Vec<u16> {
    bytes.chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [single] => *single as u16,
            _ => 0,
        })
        .collect()
}

fn units_to_string(units: &[u16]) -> String {
    char::decode_utf16(units.iter().copied())
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Parse the `bfchar` and `bfrange` sections of a ToUnicode CMap
pub fn parse_to_unicode(data: &[u8]) -> HashMap<u32, String> {
    #[derive(PartialEq)]
    enum Section {
        None,
        Char,
        Range,
    }

    let tokens = tokenize_cmap(data);
    let mut map = HashMap::new();
    let mut section = Section::None;
    let mut i = 0;

    while i < tokens.len() {
        match &tokens[i] {
            CMapToken::Word(w) if w == "beginbfchar" => section = Section::Char,
            CMapToken::Word(w) if w == "beginbfrange" => section = Section::Range,
            CMapToken::Word(w) if w == "endbfchar" || w == "endbfrange" => section = Section::None,
            CMapToken::Hex(src) if section == Section::Char => {
                if let Some(CMapToken::Hex(dst)) = tokens.get(i + 1) {
                    map.insert(bytes_to_code(src), units_to_string(&utf16_units(dst)));
                    i += 1;
                }
            }
            CMapToken::Hex(lo) if section == Section::Range => {
                let lo_code = bytes_to_code(lo);
                let Some(CMapToken::Hex(hi)) = tokens.get(i + 1) else {
                    i += 1;
                    continue;
                };
                let hi_code = bytes_to_code(hi).min(lo_code.saturating_add(0xFFFF));

                match tokens.get(i + 2) {
                    Some(CMapToken::Hex(dst)) => {
                        let base = utf16_units(dst);
                        for code in lo_code..=hi_code {
                            let mut units = base.clone();
                            if let Some(last) = units.last_mut() {
                                *last = last.wrapping_add((code - lo_code) as u16);
                            }
                            map.insert(code, units_to_string(&units));
                        }
                        i += 2;
                    }
                    Some(CMapToken::Open) => {
                        let mut j = i + 3;
                        let mut code = Some(lo_code);
                        while let Some(CMapToken::Hex(dst)) = tokens.get(j) {
                            if let Some(c) = code.filter(|c| *c <= hi_code) {
                                map.insert(c, units_to_string(&utf16_units(dst)));
                            }
                            code = code.and_then(|c| c.checked_add(1));
                            j += 1;
                        }
                        // j now points at the closing bracket
                        i = j;
                    }
                    _ => i += 1,
                }
            }
            _ => {}
        }
        i += 1;
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn test_helvetica_widths() {
        let font = FontMetrics::helvetica();
        assert_eq!(font.width(b'P' as u32), 667.0);
        assert_eq!(font.width(b'i' as u32), 222.0);
        assert_eq!(font.width(b':' as u32), 278.0);
        // 0xED is iacute in WinAnsi, measured like 'i'
        assert_eq!(font.width(0xED), 222.0);
        assert_eq!(font.width(0xC7), 722.0);

        let width = b"Paciente:".iter()
            .map(|b| font.width(*b as u32))
            .sum::<f32>() * 12.0 / 1000.0;
        assert!((width - 50.028).abs() < 0.001, "got {}", width);
    }

    #[test]
    fn test_decode_win_ansi() {
        let font = FontMetrics::helvetica();
        let codes = font.decode(b"Bras\xEDlia, \x93ok\x94");
        let text: String = codes.iter().map(|c| c.text.as_str()).collect();

        assert_eq!(text, "Brasília, \u{201C}ok\u{201D}");
        assert!(codes[9].is_space);
        assert!(!codes[0].is_space);
    }

    #[test]
    fn test_encode_win_ansi() {
        assert_eq!(encode_win_ansi("ABC 12"), b"ABC 12".to_vec());
        assert_eq!(encode_win_ansi("Brasília"), b"Bras\xEDlia".to_vec());
        assert_eq!(encode_win_ansi("\u{20AC}"), vec![0x80]);
        assert_eq!(encode_win_ansi("中"), b"?".to_vec());
    }

    #[test]
    fn test_parse_to_unicode_bfchar_and_ranges() {
        let cmap = br#"/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def
/CMapName /Adobe-Identity-UCS def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
2 beginbfchar
<0003> <0020>
<0010><00ED>
endbfchar
2 beginbfrange
<0020> <0022> <0041>
<0030> <0031> [<0050> <0061>]
endbfrange
endcmap"#;

        let map = parse_to_unicode(cmap);
        assert_eq!(map.get(&0x03).map(String::as_str), Some(" "));
        assert_eq!(map.get(&0x10).map(String::as_str), Some("í"));
        assert_eq!(map.get(&0x20).map(String::as_str), Some("A"));
        assert_eq!(map.get(&0x22).map(String::as_str), Some("C"));
        assert_eq!(map.get(&0x30).map(String::as_str), Some("P"));
        assert_eq!(map.get(&0x31).map(String::as_str), Some("a"));
        assert_eq!(map.len(), 7);
    }

    #[test]
    fn test_cmap_range_at_code_limit() {
        let cmap = b"1 beginbfrange\n<FFFFFFFF> <FFFFFFFF> [<0041> <0042>]\nendbfrange\n\
                     1 beginbfchar\n<01> <0043>\nendbfchar";

        let map = parse_to_unicode(cmap);
        assert_eq!(map.get(&u32::MAX).map(String::as_str), Some("A"));
        assert_eq!(map.get(&0x01).map(String::as_str), Some("C"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_cid_widths_at_code_limit() {
        let doc = Document::with_version("1.5");
        let widths = parse_cid_widths(&doc, &[
            Object::Integer(u32::MAX as i64),
            Object::Array(vec![100.into(), 200.into(), 300.into()]),
            Object::Integer(5),
            Object::Array(vec![400.into()]),
        ]);

        assert_eq!(widths.get(&u32::MAX), Some(&100.0));
        assert_eq!(widths.get(&5), Some(&400.0));
        assert_eq!(widths.len(), 2);
    }

    #[test]
    fn test_simple_font_widths_from_dict() {
        let doc = Document::with_version("1.5");
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "TrueType",
            "BaseFont" => "Arial",
            "FirstChar" => 65,
            "Widths" => vec![600.into(), 650.into()],
        };

        let metrics = FontMetrics::from_dict(&doc, &font);
        assert_eq!(metrics.width(65), 600.0);
        assert_eq!(metrics.width(66), 650.0);
        assert_eq!(metrics.width(67), FALLBACK_WIDTH);
        assert_eq!(metrics.ascent, DEFAULT_ASCENT);
    }

    #[test]
    fn test_type0_font_from_dict() {
        let mut doc = Document::with_version("1.5");

        let descriptor_id = doc.add_object(dictionary! {
            "Type" => "FontDescriptor",
            "Ascent" => 905,
            "Descent" => -212,
        });
        let cid_font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "DW" => 750,
            "W" => vec![
                3.into(), vec![278.into(), 300.into()].into(),
                10.into(), 12.into(), 500.into(),
            ],
            "FontDescriptor" => descriptor_id,
        });
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "ABCDEF+Calibri",
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![cid_font_id.into()],
        };

        let metrics = FontMetrics::from_dict(&doc, &font);
        assert_eq!(metrics.width(3), 278.0);
        assert_eq!(metrics.width(4), 300.0);
        assert_eq!(metrics.width(11), 500.0);
        assert_eq!(metrics.width(99), 750.0);
        assert_eq!(metrics.ascent, 905.0);
        assert_eq!(metrics.descent, -212.0);

        let codes = metrics.decode(&[0x00, 0x03, 0x00, 0x0B]);
        assert_eq!(codes.len(), 2);
        assert_eq!(codes[1].code, 11);
        assert!(!codes[0].is_space);
    }

    #[test]
    fn test_courier_is_monospaced() {
        let doc = Document::with_version("1.5");
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        };

        let metrics = FontMetrics::from_dict(&doc, &font);
        assert_eq!(metrics.width(b'i' as u32), 600.0);
        assert_eq!(metrics.width(b'W' as u32), 600.0);
    }
}

//! Marker-based text overlay using lopdf
//!
//! A field is filled by finding its marker text on the page, painting a white
//! rectangle over the area to the right of the marker and drawing the new
//! value there. The original text is not removed from the content stream,
//! only covered. This assumes the value sits on the same line as the marker
//! and that nothing else lives inside the covered area.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use crate::error::Result;
use super::fonts::{add_helvetica_font, encode_win_ansi, resolve};
use super::geometry::Rect;
use super::text::{page_resources, PageText};

/// Default size of the inserted text in points
pub const DEFAULT_FONT_SIZE: f32 = 11.0;

/// Gap between the marker's right edge and the inserted text
pub const DEFAULT_TEXT_GAP: f32 = 5.0;

/// Baseline position, as a fraction of the marker height measured from its top
pub const DEFAULT_BASELINE_RATIO: f32 = 0.8;

/// Resource name our Helvetica font is registered under
const FONT_RESOURCE: &str = "FOrd";

/// How inserted values are drawn
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayStyle {
    /// Inserted text size in points
    pub font_size: f32,
    /// Horizontal gap after the marker in points
    pub text_gap: f32,
    /// Fraction of the marker height, from its top edge, where the baseline goes
    pub baseline_ratio: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            font_size: DEFAULT_FONT_SIZE,
            text_gap: DEFAULT_TEXT_GAP,
            baseline_ratio: DEFAULT_BASELINE_RATIO,
        }
    }
}

/// One field to fill: the marker that locates it and the value to draw
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub marker: String,
    pub value: String,
    /// Width of the white rectangle painted right of the marker
    pub cover_width: f32,
}

/// What happened to a field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOutcome {
    /// Marker found and value drawn
    Filled { page: u32, marker_rect: Rect },
    /// Marker absent; the field was left untouched
    MarkerNotFound,
}

impl FieldOutcome {
    pub fn is_filled(&self) -> bool {
        matches!(self, FieldOutcome::Filled { .. })
    }
}

/// Where the cover rectangle and the new text go for one field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub cover: Rect,
    pub text_x: f32,
    pub text_y: f32,
}

impl Placement {
    /// Compute the placement next to a marker
    ///
    /// The cover spans the marker's height and `cover_width` points from its
    /// right edge. The text starts `text_gap` after the marker with its
    /// baseline `baseline_ratio` of the marker height below the marker top.
    pub fn next_to(marker: &Rect, cover_width: f32, style: &OverlayStyle) -> Self {
        Self {
            cover: Rect::new(marker.x1, marker.y0, marker.x1 + cover_width, marker.y1),
            text_x: marker.x1 + style.text_gap,
            text_y: marker.y1 - style.baseline_ratio * marker.height(),
        }
    }
}

/// Locate every field's marker and overlay its value
///
/// Pages are searched in order and the first occurrence of each marker is
/// used. Fields whose marker is absent come back as
/// [`FieldOutcome::MarkerNotFound`] and leave the document unchanged.
pub fn apply_fields(
    doc: &mut Document,
    fields: &[FieldSpec],
    style: &OverlayStyle,
) -> Result<Vec<FieldOutcome>> {
    let mut outcomes = vec![FieldOutcome::MarkerNotFound; fields.len()];
    let mut placements: Vec<(ObjectId, Vec<(Placement, &str)>)> = Vec::new();

    for (page_num, page_id) in doc.get_pages() {
        if outcomes.iter().all(FieldOutcome::is_filled) {
            break;
        }

        let page_text = PageText::extract(doc, page_id)?;
        log::trace!("Page {} text: {:?}", page_num, page_text.text());
        let mut on_page = Vec::new();

        for (field, outcome) in fields.iter().zip(outcomes.iter_mut()) {
            if outcome.is_filled() {
                continue;
            }
            if let Some(marker_rect) = page_text.find(&field.marker) {
                log::debug!(
                    "Marker {:?} on page {} at ({:.1}, {:.1})-({:.1}, {:.1})",
                    field.marker, page_num, marker_rect.x0, marker_rect.y0, marker_rect.x1, marker_rect.y1
                );
                on_page.push((Placement::next_to(&marker_rect, field.cover_width, style), field.value.as_str()));
                *outcome = FieldOutcome::Filled { page: page_num, marker_rect };
            }
        }

        if !on_page.is_empty() {
            placements.push((page_id, on_page));
        }
    }

    for (field, outcome) in fields.iter().zip(&outcomes) {
        if !outcome.is_filled() {
            log::info!("Marker {:?} not found; field left unedited", field.marker);
        }
    }

    if placements.is_empty() {
        return Ok(outcomes);
    }

    let font_id = add_helvetica_font(doc);

    for (page_id, page_placements) in placements {
        wrap_page_content_in_graphics_state(doc, page_id)?;
        let font_name = add_font_to_page_resources(doc, page_id, font_id)?;

        let content = Content {
            operations: overlay_operations(&page_placements, &font_name, style.font_size),
        };
        let content_stream_id = doc.add_object(Stream::new(Dictionary::new(), content.encode()?));

        append_content_to_page(doc, page_id, content_stream_id)?;
    }

    Ok(outcomes)
}

/// Content stream operators that paint the covers and draw the values
pub fn overlay_operations(placements: &[(Placement, &str)], font_name: &str, font_size: f32) -> Vec<Operation> {
    let mut ops = vec![Operation::new("q", vec![])];

    for (placement, value) in placements {
        let cover = placement.cover;

        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new("g", vec![1.into()]));
        ops.push(Operation::new("re", vec![
            Object::Real(cover.x0),
            Object::Real(cover.y0),
            Object::Real(cover.width()),
            Object::Real(cover.height()),
        ]));
        ops.push(Operation::new("f", vec![]));
        ops.push(Operation::new("Q", vec![]));

        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new("Tf", vec![
            Object::Name(font_name.as_bytes().to_vec()),
            Object::Real(font_size),
        ]));
        ops.push(Operation::new("g", vec![0.into()]));
        ops.push(Operation::new("Tm", vec![
            1.into(), 0.into(), 0.into(), 1.into(),
            Object::Real(placement.text_x),
            Object::Real(placement.text_y),
        ]));
        ops.push(Operation::new("Tj", vec![
            Object::String(encode_win_ansi(value), StringFormat::Literal),
        ]));
        ops.push(Operation::new("ET", vec![]));
    }

    ops.push(Operation::new("Q", vec![]));
    ops
}

/// Wrap page content streams in q/Q to isolate transformations
///
/// Our overlay is positioned in default user space, so any CTM change left
/// behind by the original content must be undone first. Unbalanced `q`
/// operators in the original are closed as well.
fn wrap_page_content_in_graphics_state(doc: &mut Document, page_id: ObjectId) -> Result<()> {
    let original = doc.get_page_content(page_id)?;

    let open_states = Content::decode(&original)
        .map(|content| {
            content.operations.iter().fold(0i64, |depth, op| match op.operator.as_str() {
                "q" => depth + 1,
                "Q" => (depth - 1).max(0),
                _ => depth,
            })
        })
        .unwrap_or(0);

    let mut wrapped = b"q\n".to_vec();
    wrapped.extend_from_slice(&original);
    wrapped.push(b'\n');
    for _ in 0..open_states {
        wrapped.extend_from_slice(b"Q\n");
    }
    wrapped.extend_from_slice(b"Q\n");

    let wrapped_stream_id = doc.add_object(Stream::new(Dictionary::new(), wrapped));

    let page_dict = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page_dict.set("Contents", Object::Reference(wrapped_stream_id));

    Ok(())
}

/// Register the font in the page's Resources and return its resource name
///
/// Inherited resources are copied onto the page so setting our own
/// dictionary does not hide fonts the page got from its parents.
fn add_font_to_page_resources(doc: &mut Document, page_id: ObjectId, font_id: ObjectId) -> Result<String> {
    let mut resources = page_resources(doc, page_id).cloned().unwrap_or_default();

    let mut fonts = resources.get(b"Font").ok()
        .map(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_dict().ok())
        .cloned()
        .unwrap_or_default();

    let mut font_name = FONT_RESOURCE.to_string();
    let mut n = 1;
    while fonts.has(font_name.as_bytes()) {
        font_name = format!("{}{}", FONT_RESOURCE, n);
        n += 1;
    }

    fonts.set(font_name.as_bytes().to_vec(), Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));

    let page_dict = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page_dict.set("Resources", Object::Dictionary(resources));

    Ok(font_name)
}

/// Append a content stream to a page's Contents
///
/// Appended content is drawn on top of the original.
fn append_content_to_page(doc: &mut Document, page_id: ObjectId, new_content_id: ObjectId) -> Result<()> {
    let page_dict = doc.get_object_mut(page_id)?.as_dict_mut()?;
    let existing_content = page_dict.get(b"Contents").ok().cloned();

    match existing_content {
        Some(Object::Reference(content_id)) => {
            page_dict.set("Contents", Object::Array(vec![
                Object::Reference(content_id),
                Object::Reference(new_content_id),
            ]));
        }
        Some(Object::Array(mut content_array)) => {
            content_array.push(Object::Reference(new_content_id));
            page_dict.set("Contents", Object::Array(content_array));
        }
        _ => {
            page_dict.set("Contents", Object::Array(vec![Object::Reference(new_content_id)]));
        }
    }

    Ok(())
}

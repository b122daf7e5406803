//! PDF manipulation module

pub mod geometry;
pub mod fonts;
pub mod text;
pub mod overlay;
pub mod order;

// Re-export commonly used items
pub use geometry::{Matrix, Rect};
pub use text::{PageText, PositionedGlyph};
pub use overlay::{apply_fields, FieldOutcome, FieldSpec, OverlayStyle, Placement};
pub use order::{fill_order, FieldReport, FillReport};

//! Patient name normalization
//!
//! Names are written into the order in uppercase ASCII so they render with a
//! standard PDF font regardless of what the user typed.

use deunicode::deunicode;

/// A patient name as typed, together with its normalized form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientName {
    raw: String,
    normalized: String,
}

impl PatientName {
    /// Normalize `raw` and keep both forms
    pub fn new(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            normalized: normalize_name(raw),
        }
    }

    /// The text as the user typed it
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The normalized text written into the PDF
    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    /// True when nothing survived normalization
    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }
}

impl std::fmt::Display for PatientName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.normalized)
    }
}

/// Normalize a patient name
///
/// Uppercases the text, transliterates it to ASCII and drops anything
/// outside `[A-Z0-9 ]`. Never fails; the result may be empty.
///
/// ```
/// use pdf_orders::name::normalize_name;
///
/// assert_eq!(normalize_name("José da Conceição"), "JOSE DA CONCEICAO");
/// ```
pub fn normalize_name(name: &str) -> String {
    let mut out = deunicode(&name.to_uppercase()).to_ascii_uppercase();
    out.retain(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == ' ');
    out
}

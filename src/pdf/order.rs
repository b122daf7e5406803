//! Filling one medical-order template

use std::path::{Path, PathBuf};
use lopdf::Document;
use crate::config::Settings;
use crate::date::OrderDate;
use crate::error::{Error, Result};
use crate::name::PatientName;
use super::overlay::{apply_fields, FieldOutcome};

/// Outcome of one field in a filled order
#[derive(Debug, Clone, PartialEq)]
pub struct FieldReport {
    pub marker: String,
    pub outcome: FieldOutcome,
}

/// Result of filling one template
#[derive(Debug, Clone, PartialEq)]
pub struct FillReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub fields: Vec<FieldReport>,
}

impl FillReport {
    /// True when every marker was found
    pub fn is_complete(&self) -> bool {
        self.fields.iter().all(|f| f.outcome.is_filled())
    }

    /// Markers that were not found, in field order
    pub fn missing_markers(&self) -> Vec<&str> {
        self.fields.iter()
            .filter(|f| !f.outcome.is_filled())
            .map(|f| f.marker.as_str())
            .collect()
    }
}

/// Fill the patient's name and the order date into `input`, writing `output`
///
/// The output is written even when a marker is missing; check
/// [`FillReport::is_complete`]. The input file is never modified.
///
/// # Example
///
/// ```no_run
/// use pdf_orders::config::Settings;
/// use pdf_orders::date::OrderDate;
/// use pdf_orders::name::PatientName;
/// use pdf_orders::pdf::fill_order;
/// use std::path::Path;
///
/// let settings = Settings::default();
/// let name = PatientName::new("Maria da Silva");
/// let date = OrderDate::parse("15/03/2025", settings.required_year).unwrap();
///
/// let report = fill_order(
///     Path::new("hemograma.pdf"),
///     Path::new("pedidos_preenchidos/hemograma_15-03-2025.pdf"),
///     &name,
///     &date,
///     &settings,
/// ).expect("Failed to fill order");
/// assert!(report.is_complete());
/// ```
pub fn fill_order(
    input: &Path,
    output: &Path,
    name: &PatientName,
    date: &OrderDate,
    settings: &Settings,
) -> Result<FillReport> {
    if !input.exists() {
        return Err(Error::FileNotFound(input.to_path_buf()));
    }

    let mut doc = Document::load(input)?;
    if doc.get_pages().is_empty() {
        return Err(Error::EmptyPdf(input.to_path_buf()));
    }

    // Decompress for easier content stream parsing
    doc.decompress();

    let fields = settings.fields(name, date);
    let outcomes = apply_fields(&mut doc, &fields, &settings.overlay)?;

    // Original content streams replaced by their wrapped copies
    doc.prune_objects();
    doc.compress();
    doc.save(output)?;

    log::info!("Wrote {}", output.display());

    Ok(FillReport {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        fields: fields.into_iter()
            .zip(outcomes)
            .map(|(field, outcome)| FieldReport { marker: field.marker, outcome })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::geometry::Rect;

    fn report(outcomes: Vec<FieldOutcome>) -> FillReport {
        FillReport {
            input: PathBuf::from("a.pdf"),
            output: PathBuf::from("out/a_15-03-2025.pdf"),
            fields: ["Paciente:", "Brasília,"].iter()
                .zip(outcomes)
                .map(|(m, outcome)| FieldReport { marker: m.to_string(), outcome })
                .collect(),
        }
    }

    #[test]
    fn test_complete_report() {
        let filled = FieldOutcome::Filled { page: 1, marker_rect: Rect::new(0.0, 0.0, 1.0, 1.0) };
        let r = report(vec![filled.clone(), filled]);
        assert!(r.is_complete());
        assert!(r.missing_markers().is_empty());
    }

    #[test]
    fn test_partial_report_lists_missing() {
        let filled = FieldOutcome::Filled { page: 2, marker_rect: Rect::new(0.0, 0.0, 1.0, 1.0) };
        let r = report(vec![filled, FieldOutcome::MarkerNotFound]);
        assert!(!r.is_complete());
        assert_eq!(r.missing_markers(), vec!["Brasília,"]);
    }

    #[test]
    fn test_missing_input_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("nao_existe.pdf");
        let date = OrderDate::parse("15/03/2025", 2025).unwrap();

        let result = fill_order(
            &input,
            &dir.path().join("out.pdf"),
            &PatientName::new("Ana"),
            &date,
            &Settings::default(),
        );
        assert!(matches!(result, Err(Error::FileNotFound(p)) if p == input));
    }

    #[test]
    fn test_invalid_pdf_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("quebrado.pdf");
        std::fs::write(&input, b"this is not a pdf").unwrap();
        let date = OrderDate::parse("15/03/2025", 2025).unwrap();

        let result = fill_order(
            &input,
            &dir.path().join("out.pdf"),
            &PatientName::new("Ana"),
            &date,
            &Settings::default(),
        );
        assert!(result.is_err());
        assert!(!dir.path().join("out.pdf").exists());
    }
}

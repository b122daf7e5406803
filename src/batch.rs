//! Template discovery, output naming and the interactive session
//!
//! A session lists the templates in a folder, asks for one patient's name
//! and order date, and fills every template (or the one the user picks).
//! It repeats for as many patients as the user wants.

use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use glob::glob;
use crate::config::Settings;
use crate::date::{parse_file_stamp, OrderDate};
use crate::error::{Error, Result};
use crate::name::PatientName;
use crate::pdf::{fill_order, FillReport};
use crate::prompt::{file_label, Prompter};

/// Shown after any failure to read or write a PDF
pub const PDF_ERROR_HINT: &str =
    "Verifique se o arquivo é um PDF válido, sem senha, e se não está aberto em outro programa.";

/// Name of the scratch file older versions of the tool wrote next to templates
const LEGACY_OUTPUT_NAME: &str = "output.pdf";

/// Find the templates in `dir`: every `*.pdf` that is not a generated order
///
/// Results are sorted by path so the listing is stable.
pub fn discover_templates(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/*.pdf", glob::Pattern::escape(&dir.to_string_lossy()));

    let mut templates = Vec::new();
    for entry in glob(&pattern)? {
        match entry {
            Ok(path) if path.is_file() && !is_generated_output(&path) => templates.push(path),
            Ok(path) => log::debug!("Skipping {}", path.display()),
            Err(e) => log::warn!("Cannot read {}: {}", e.path().display(), e.error()),
        }
    }

    templates.sort();
    Ok(templates)
}

/// True for files this tool wrote: `output.pdf`, `*_editado_*` and
/// `<base>_dd-mm-yyyy[_N].pdf`
pub fn is_generated_output(path: &Path) -> bool {
    if path.file_name().is_some_and(|n| n == LEGACY_OUTPUT_NAME) {
        return true;
    }

    let Some(stem) = path.file_stem().map(|s| s.to_string_lossy()) else {
        return false;
    };

    if stem.contains("_editado_") {
        return true;
    }

    let Some((head, tail)) = stem.rsplit_once('_') else {
        return false;
    };

    if parse_file_stamp(tail).is_some() {
        return true;
    }

    // Numbered duplicate: <base>_dd-mm-yyyy_N
    if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) {
        if let Some((_, stamp)) = head.rsplit_once('_') {
            return parse_file_stamp(stamp).is_some();
        }
    }

    false
}

/// Output file for `template` in `output_dir`, never overwriting an existing file
///
/// The first choice is `<base>_dd-mm-yyyy.pdf`; when taken, `_2`, `_3`, ...
/// are appended.
pub fn output_path_for(template: &Path, date: &OrderDate, output_dir: &Path) -> PathBuf {
    let base = template.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pedido".to_string());
    let stamp = date.file_stamp();

    let mut candidate = output_dir.join(format!("{}_{}.pdf", base, stamp));
    let mut n = 2;
    while candidate.exists() {
        candidate = output_dir.join(format!("{}_{}_{}.pdf", base, stamp, n));
        n += 1;
    }
    candidate
}

/// Create the output folder if needed; returns true when it was created
pub fn ensure_output_dir(dir: &Path) -> Result<bool> {
    if dir.is_dir() {
        return Ok(false);
    }
    fs::create_dir_all(dir)?;
    log::info!("Created output directory {}", dir.display());
    Ok(true)
}

/// A template that could not be filled
#[derive(Debug)]
pub struct Failure {
    pub template: PathBuf,
    pub error: Error,
}

/// Everything filled during a session
#[derive(Debug, Default)]
pub struct SessionSummary {
    pub reports: Vec<FillReport>,
    pub failures: Vec<Failure>,
}

impl SessionSummary {
    pub fn complete(&self) -> usize {
        self.reports.iter().filter(|r| r.is_complete()).count()
    }

    pub fn partial(&self) -> usize {
        self.reports.iter().filter(|r| !r.is_complete()).count()
    }

    fn extend(&mut self, other: SessionSummary) {
        self.reports.extend(other.reports);
        self.failures.extend(other.failures);
    }
}

/// Fill every template for one patient, reporting progress to `out`
///
/// A template that fails is reported and skipped; the rest are still filled.
pub fn fill_templates<W: Write>(
    templates: &[PathBuf],
    name: &PatientName,
    date: &OrderDate,
    settings: &Settings,
    out: &mut W,
) -> Result<SessionSummary> {
    let output_dir = settings.output_path();
    if ensure_output_dir(&output_dir)? {
        writeln!(out, "Pasta de saída criada: {}", output_dir.display())?;
    }

    let mut summary = SessionSummary::default();

    for template in templates {
        writeln!(out, "Preenchendo {}...", file_label(template))?;
        let output = output_path_for(template, date, &output_dir);

        match fill_order(template, &output, name, date, settings) {
            Ok(report) => {
                if report.is_complete() {
                    writeln!(out, "  ✓ Salvo em {}", report.output.display())?;
                } else {
                    writeln!(
                        out,
                        "  ⚠ Salvo em {} (incompleto, marcador não encontrado: {})",
                        report.output.display(),
                        report.missing_markers().join(", ")
                    )?;
                }
                summary.reports.push(report);
            }
            Err(error) => {
                log::error!("Failed to fill {}: {}", template.display(), error);
                writeln!(out, "  ✗ Erro ao editar {}: {}", file_label(template), error)?;
                writeln!(out, "    {}", PDF_ERROR_HINT)?;
                summary.failures.push(Failure { template: template.clone(), error });
            }
        }
    }

    Ok(summary)
}

/// Run the interactive session until the user stops or input ends
///
/// End of input during a question returns [`Error::Cancelled`].
pub fn run_session<R: BufRead, W: Write>(
    settings: &Settings,
    prompter: &mut Prompter<R, W>,
) -> Result<SessionSummary> {
    let templates = discover_templates(&settings.templates_dir)?;
    let mut session = SessionSummary::default();

    if templates.is_empty() {
        let out = prompter.output();
        writeln!(out, "Nenhum arquivo PDF encontrado em {}.", settings.templates_dir.display())?;
        writeln!(out, "Coloque os modelos de pedido nessa pasta e execute novamente.")?;
        return Ok(session);
    }

    {
        let out = prompter.output();
        writeln!(out, "Modelos encontrados ({}):", templates.len())?;
        for template in &templates {
            writeln!(out, "  - {}", file_label(template))?;
        }
    }

    loop {
        let selected = if settings.select_single {
            vec![prompter.choose_template(&templates)?]
        } else {
            templates.clone()
        };

        let name = prompter.patient_name()?;
        let date = prompter.order_date(settings.required_year)?;

        let summary = fill_templates(&selected, &name, &date, settings, prompter.output())?;
        writeln!(
            prompter.output(),
            "Concluído: {} completo(s), {} incompleto(s), {} com erro.",
            summary.complete(),
            summary.partial(),
            summary.failures.len()
        )?;
        session.extend(summary);

        if !prompter.confirm("Preencher pedidos para outro paciente? (s/n): ")? {
            break;
        }
    }

    Ok(session)
}

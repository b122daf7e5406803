//! PDF Orders CLI tool
//!
//! Fills a patient's name and the order date into every medical-order
//! template found in a folder.

use anyhow::Context;
use clap::Parser;
use std::io;
use std::path::PathBuf;
use std::process;

use pdf_orders::batch::{run_session, PDF_ERROR_HINT};
use pdf_orders::config::{Settings, DATE_MARKER, DEFAULT_OUTPUT_DIR, NAME_MARKER};
use pdf_orders::date::REQUIRED_YEAR;
use pdf_orders::pdf::overlay::{OverlayStyle, DEFAULT_FONT_SIZE};
use pdf_orders::prompt::Prompter;
use pdf_orders::Error;

/// PDF Orders - Fill patient name and date into medical-order templates
#[derive(Parser)]
#[command(name = "pdf-orders")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Fill every template in the current folder
    pdf-orders

    # Templates in another folder, pick one of them
    pdf-orders --dir ~/pedidos --select

    # Orders for 2026, written to a custom folder
    pdf-orders --year 2026 --output-dir saida")]
struct Cli {
    /// Folder containing the PDF templates
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Output folder (relative paths are inside --dir)
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Year every order date must fall in
    #[arg(long, default_value_t = REQUIRED_YEAR)]
    year: i32,

    /// Size of the inserted text in points
    #[arg(long, default_value_t = DEFAULT_FONT_SIZE)]
    font_size: f32,

    /// Choose a single template by number instead of filling all
    #[arg(long)]
    select: bool,

    /// Label that precedes the patient's name
    #[arg(long, default_value = NAME_MARKER)]
    name_marker: String,

    /// Label that precedes the order date
    #[arg(long, default_value = DATE_MARKER)]
    date_marker: String,

    /// Print debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_settings(self) -> Settings {
        Settings {
            templates_dir: self.dir,
            output_dir: self.output_dir,
            required_year: self.year,
            name_marker: self.name_marker,
            date_marker: self.date_marker,
            overlay: OverlayStyle {
                font_size: self.font_size,
                ..OverlayStyle::default()
            },
            select_single: self.select,
            ..Settings::default()
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    if let Err(e) = run(cli) {
        if matches!(e.downcast_ref::<Error>(), Some(Error::Cancelled)) {
            eprintln!();
            eprintln!("Operação cancelada.");
            process::exit(130);
        }

        eprintln!("Erro: {:#}", e);
        eprintln!("{}", PDF_ERROR_HINT);
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = cli.into_settings();

    if !settings.templates_dir.is_dir() {
        anyhow::bail!("Pasta não encontrada: {}", settings.templates_dir.display());
    }
    if settings.overlay.font_size <= 0.0 {
        anyhow::bail!("Tamanho de fonte inválido: {}", settings.overlay.font_size);
    }

    let stdin = io::stdin();
    let mut prompter = Prompter::new(stdin.lock(), io::stdout());

    let summary = run_session(&settings, &mut prompter)
        .with_context(|| format!("Falha ao processar os modelos em {}", settings.templates_dir.display()))?;

    log::info!(
        "Session finished: {} complete, {} partial, {} failed",
        summary.complete(),
        summary.partial(),
        summary.failures.len()
    );

    println!("Até logo!");
    Ok(())
}

//! Interactive prompts
//!
//! All questions go through [`Prompter`], which reads answers from any
//! `BufRead` and writes questions to any `Write`. The binary wires it to
//! stdin/stdout; tests feed it scripted answers. End of input at any
//! question yields [`Error::Cancelled`].

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use crate::date::OrderDate;
use crate::error::{Error, Result};
use crate::name::PatientName;

/// Asks the session's questions over a line reader and a writer
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    /// Read answers from `input` and write questions to `output`
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Writer used for questions and progress messages
    pub fn output(&mut self) -> &mut W {
        &mut self.output
    }

    /// Consume the prompter, returning the writer
    pub fn into_output(self) -> W {
        self.output
    }

    /// Print `question` and read one line, without its line terminator
    pub fn ask(&mut self, question: &str) -> Result<String> {
        write!(self.output, "{}", question)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(Error::Cancelled);
        }

        let trimmed_len = line.trim_end_matches(['\r', '\n']).len();
        line.truncate(trimmed_len);
        Ok(line)
    }

    /// Yes/no question; only "s" or "sim" (any case) count as yes
    pub fn confirm(&mut self, question: &str) -> Result<bool> {
        let answer = self.ask(question)?;
        Ok(is_yes(&answer))
    }

    /// Ask for the patient's name until the user confirms the normalized form
    pub fn patient_name(&mut self) -> Result<PatientName> {
        loop {
            let raw = self.ask("Digite o nome do paciente: ")?;
            if raw.trim().is_empty() {
                writeln!(self.output, "O nome não pode ficar vazio.")?;
                continue;
            }

            let name = PatientName::new(raw.trim());
            log::debug!("Name {:?} normalized to {:?}", name.raw(), name.as_str());
            writeln!(self.output, "Nome formatado: {}", name)?;

            if self.confirm("O nome está correto? (s/n): ")? {
                return Ok(name);
            }
        }
    }

    /// Ask for the order date until it parses and falls in `required_year`
    pub fn order_date(&mut self, required_year: i32) -> Result<OrderDate> {
        loop {
            let raw = self.ask(&format!("Digite a data do pedido (DD/MM/{}): ", required_year))?;

            match OrderDate::parse(raw.trim(), required_year) {
                Ok(date) => return Ok(date),
                Err(e) => {
                    log::debug!("{}", e);
                    writeln!(
                        self.output,
                        "Data inválida. Use o formato DD/MM/{0} e certifique-se de que o ano seja {0}.",
                        required_year
                    )?;
                }
            }
        }
    }

    /// Let the user pick one template by its 1-based number
    ///
    /// A single template is returned without asking.
    pub fn choose_template(&mut self, templates: &[PathBuf]) -> Result<PathBuf> {
        match templates {
            [] => return Err(Error::General("Nenhum modelo para escolher".to_string())),
            [only] => return Ok(only.clone()),
            _ => {}
        }

        writeln!(self.output, "Vários arquivos PDF encontrados. Escolha um pelo número:")?;
        for (i, path) in templates.iter().enumerate() {
            writeln!(self.output, "{}. {}", i + 1, file_label(path))?;
        }

        loop {
            let raw = self.ask("Digite o número do arquivo: ")?;
            match raw.trim().parse::<usize>() {
                Ok(n) if (1..=templates.len()).contains(&n) => return Ok(templates[n - 1].clone()),
                Ok(_) => writeln!(self.output, "Número inválido. Tente novamente.")?,
                Err(_) => writeln!(self.output, "Por favor, digite um número válido.")?,
            }
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "s" | "sim")
}

/// File name for display, falling back to the full path
pub fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

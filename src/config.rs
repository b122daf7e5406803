//! Session settings
//!
//! Everything the filler needs besides the patient's name and the order
//! date. The binary builds this from its command line; library callers can
//! start from [`Settings::default`].

use std::path::{Path, PathBuf};
use crate::date::{OrderDate, REQUIRED_YEAR};
use crate::name::PatientName;
use crate::pdf::{FieldSpec, OverlayStyle};

/// Folder, under the templates folder, where filled orders are written
pub const DEFAULT_OUTPUT_DIR: &str = "pedidos_preenchidos";

/// Label preceding the patient's name in the templates
pub const NAME_MARKER: &str = "Paciente:";

/// Label preceding the order date in the templates
pub const DATE_MARKER: &str = "Brasília,";

/// Width of the area covered right of the name marker, in points
pub const NAME_COVER_WIDTH: f32 = 400.0;

/// Width of the area covered right of the date marker, in points
pub const DATE_COVER_WIDTH: f32 = 100.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Folder scanned for `*.pdf` templates
    pub templates_dir: PathBuf,
    /// Output folder; relative paths are resolved against `templates_dir`
    pub output_dir: PathBuf,
    /// Year every order date must fall in
    pub required_year: i32,
    pub name_marker: String,
    pub date_marker: String,
    pub name_cover_width: f32,
    pub date_cover_width: f32,
    pub overlay: OverlayStyle,
    /// Ask the user to pick one template instead of filling all of them
    pub select_single: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            templates_dir: PathBuf::from("."),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            required_year: REQUIRED_YEAR,
            name_marker: NAME_MARKER.to_string(),
            date_marker: DATE_MARKER.to_string(),
            name_cover_width: NAME_COVER_WIDTH,
            date_cover_width: DATE_COVER_WIDTH,
            overlay: OverlayStyle::default(),
            select_single: false,
        }
    }
}

impl Settings {
    /// Settings scanning `dir` with everything else at its default
    pub fn for_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            templates_dir: dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Where filled orders go
    pub fn output_path(&self) -> PathBuf {
        if self.output_dir.is_absolute() {
            self.output_dir.clone()
        } else {
            self.templates_dir.join(&self.output_dir)
        }
    }

    /// The name and date fields for one patient, in fill order
    pub fn fields(&self, name: &PatientName, date: &OrderDate) -> Vec<FieldSpec> {
        vec![
            FieldSpec {
                marker: self.name_marker.clone(),
                value: name.as_str().to_string(),
                cover_width: self.name_cover_width,
            },
            FieldSpec {
                marker: self.date_marker.clone(),
                value: date.display(),
                cover_width: self.date_cover_width,
            },
        ]
    }
}

//! PDF Orders Library
//!
//! Fills a patient's name and an order date into medical-order PDF templates.
//! This library provides functionality to:
//! - Normalize patient names to uppercase ASCII
//! - Validate order dates against a required year
//! - Locate text markers on a page with their positions
//! - Cover the old value next to a marker and draw a new one
//! - Discover templates and name outputs without overwriting
//!
//! # Example
//!
//! ```no_run
//! use pdf_orders::config::Settings;
//! use pdf_orders::date::OrderDate;
//! use pdf_orders::name::PatientName;
//! use pdf_orders::pdf::fill_order;
//! use std::path::Path;
//!
//! let settings = Settings::default();
//! let name = PatientName::new("José da Conceição");
//! let date = OrderDate::parse("15/03/2025", settings.required_year)
//!     .expect("Invalid date");
//!
//! let report = fill_order(
//!     Path::new("hemograma.pdf"),
//!     Path::new("hemograma_15-03-2025.pdf"),
//!     &name,
//!     &date,
//!     &settings,
//! ).expect("Failed to fill order");
//!
//! println!("Missing: {:?}", report.missing_markers());
//! ```

pub mod error;
pub mod name;
pub mod date;
pub mod config;
pub mod pdf;
pub mod prompt;
pub mod batch;

// Re-export commonly used items
pub use error::{Error, Result};

//! Order date parsing module
//!
//! Order dates are typed by the user as `dd/mm/yyyy` and must fall in a single
//! configured year (2025 unless overridden).

use chrono::{Datelike, NaiveDate};
use crate::error::{Error, Result};

/// Year every order date must belong to unless configured otherwise
pub const REQUIRED_YEAR: i32 = 2025;

/// A validated order date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderDate(NaiveDate);

impl OrderDate {
    /// Parse a `dd/mm/yyyy` string and require the year to be `required_year`
    ///
    /// Days and months may use one or two digits; the year must use four.
    /// Surrounding whitespace is rejected, callers trim their input first.
    pub fn parse(input: &str, required_year: i32) -> Result<Self> {
        if !has_date_shape(input) {
            return Err(Error::InvalidDate(input.to_string()));
        }

        let date = NaiveDate::parse_from_str(input, "%d/%m/%Y")
            .map_err(|_| Error::InvalidDate(input.to_string()))?;

        if date.year() != required_year {
            return Err(Error::InvalidDate(input.to_string()));
        }

        Ok(OrderDate(date))
    }

    /// Text written into the PDF: "15/03/2025"
    pub fn display(&self) -> String {
        self.0.format("%d/%m/%Y").to_string()
    }

    /// Text used in output file names: "15-03-2025"
    pub fn file_stamp(&self) -> String {
        self.0.format("%d-%m-%Y").to_string()
    }
}

impl std::fmt::Display for OrderDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display())
    }
}

/// Check whether `date_str` is a valid order date for 2025
///
/// Invalid format and wrong year both yield `false`.
pub fn validate_date(date_str: &str) -> bool {
    OrderDate::parse(date_str, REQUIRED_YEAR).is_ok()
}

/// Parse the stamp produced by [`OrderDate::file_stamp`]
pub fn parse_file_stamp(stamp: &str) -> Option<NaiveDate> {
    if stamp.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(stamp, "%d-%m-%Y").ok()
}

/// `d{1,2}/d{1,2}/dddd`, digits only
fn has_date_shape(s: &str) -> bool {
    let parts: Vec<&str> = s.split('/').collect();
    if parts.len() != 3 {
        return false;
    }

    let all_digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());

    all_digits(parts[0]) && parts[0].len() <= 2
        && all_digits(parts[1]) && parts[1].len() <= 2
        && all_digits(parts[2]) && parts[2].len() == 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_2025_dates() {
        assert!(validate_date("15/03/2025"));
        assert!(validate_date("01/01/2025"));
        assert!(validate_date("31/12/2025"));
    }

    #[test]
    fn test_accepts_single_digit_day_and_month() {
        assert!(validate_date("5/3/2025"));

        let date = OrderDate::parse("5/3/2025", REQUIRED_YEAR).unwrap();
        assert_eq!(date.display(), "05/03/2025");
    }

    #[test]
    fn test_rejects_other_years() {
        assert!(!validate_date("15/03/2024"));
        assert!(!validate_date("15/03/2026"));
        assert!(!validate_date("01/01/1999"));
    }

    #[test]
    fn test_rejects_malformed() {
        let cases = vec![
            "",
            "hoje",
            "2025-03-15",
            "15-03-2025",
            "03/15/2025",
            "15/03/25",
            "15/03/02025",
            " 15/03/2025",
            "15/03/2025 ",
            "15/03",
            "15/03/2025/1",
            "aa/bb/2025",
            "+1/03/2025",
        ];

        for case in cases {
            assert!(!validate_date(case), "should reject {:?}", case);
        }
    }

    #[test]
    fn test_rejects_impossible_calendar_dates() {
        assert!(!validate_date("31/02/2025"));
        // 2025 is not a leap year
        assert!(!validate_date("29/02/2025"));
        assert!(!validate_date("00/01/2025"));
        assert!(!validate_date("10/13/2025"));
    }

    #[test]
    fn test_parse_error_carries_input() {
        let err = OrderDate::parse("15/03/2024", REQUIRED_YEAR).unwrap_err();
        match err {
            Error::InvalidDate(text) => assert_eq!(text, "15/03/2024"),
            other => panic!("Expected InvalidDate, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_with_other_required_year() {
        assert!(OrderDate::parse("15/03/2026", 2026).is_ok());
        assert!(OrderDate::parse("15/03/2025", 2026).is_err());
    }

    #[test]
    fn test_formats() {
        let date = OrderDate::parse("07/11/2025", REQUIRED_YEAR).unwrap();
        assert_eq!(date.display(), "07/11/2025");
        assert_eq!(date.file_stamp(), "07-11-2025");
        assert_eq!(date.to_string(), "07/11/2025");
    }

    #[test]
    fn test_parse_file_stamp() {
        let date = OrderDate::parse("07/11/2025", REQUIRED_YEAR).unwrap();
        assert_eq!(parse_file_stamp(&date.file_stamp()), NaiveDate::from_ymd_opt(2025, 11, 7));

        assert_eq!(parse_file_stamp("7-11-2025"), None);
        assert_eq!(parse_file_stamp("07-11-25"), None);
        assert_eq!(parse_file_stamp("modelo"), None);
    }
}

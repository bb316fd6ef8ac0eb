//! Calendar date helpers
//!
//! Dates cross the API as `YYYY-MM-DD` strings.

use chrono::{Datelike, NaiveDate};

use crate::{CoreError, Result};

/// Wire format for calendar dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a required date, reporting the field name on failure
pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| CoreError::InvalidDate {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// Parse an optional date. Missing and blank values both mean "no date".
pub fn parse_optional_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => parse_date(field, v).map(Some),
    }
}

/// Parse a date, treating anything unparsable as absent
pub fn parse_lenient(value: Option<&str>) -> Option<NaiveDate> {
    value.and_then(|v| NaiveDate::parse_from_str(v.trim(), DATE_FORMAT).ok())
}

/// Whole years elapsed between `from` and `to`
pub fn years_between(from: NaiveDate, to: NaiveDate) -> i32 {
    let mut years = to.year() - from.year();
    if (to.month(), to.day()) < (from.month(), from.day()) {
        years -= 1;
    }
    years
}

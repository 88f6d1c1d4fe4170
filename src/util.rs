// Utility helpers for parsing and basic arithmetic.
//
// All forgiving CSV/date handling lives here so the loader and report
// builders can work with typed values.
use chrono::NaiveDate;
use num_format::{Locale, ToFormattedString};

use crate::error::{ProgressError, Result};
use crate::types::IsoWeek;

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y"];

/// Parse a date cell, trying the layouts commonly produced by spreadsheet
/// exports. Returns `None` for anything unparseable; callers treat that as a
/// row without a date rather than an error.
pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    // Tolerate a trailing time component such as `2024-03-01 00:00:00`.
    let day = s.split_whitespace().next().unwrap_or(s);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(day, fmt).ok())
}

/// Strict variant of `parse_date_safe` for user input, where an
/// unreadable date is an error rather than a missing value.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    parse_date_safe(Some(s)).ok_or_else(|| ProgressError::Parse {
        what: "date",
        input: s.to_string(),
    })
}

/// A week given on the command line: either fully qualified (`2024-W05`)
/// or a bare week number (`5`) to be resolved against the available weeks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeekSpec {
    Exact(IsoWeek),
    Number(u32),
}

impl WeekSpec {
    pub fn matches(&self, week: &IsoWeek) -> bool {
        match self {
            WeekSpec::Exact(w) => w == week,
            WeekSpec::Number(n) => week.week == *n,
        }
    }
}

/// Parse `2024-W05` or a bare `5`. Week numbers outside 1..=53 are
/// rejected.
pub fn parse_week(s: &str) -> Result<WeekSpec> {
    let err = || ProgressError::Parse {
        what: "week",
        input: s.to_string(),
    };
    let t = s.trim();
    let week = if let Some((year, week)) = t.split_once("-W").or_else(|| t.split_once("-w")) {
        let year: i32 = year.parse().map_err(|_| err())?;
        let week: u32 = week.parse().map_err(|_| err())?;
        WeekSpec::Exact(IsoWeek { year, week })
    } else {
        WeekSpec::Number(t.parse().map_err(|_| err())?)
    };
    let n = match week {
        WeekSpec::Exact(w) => w.week,
        WeekSpec::Number(n) => n,
    };
    if !(1..=53).contains(&n) {
        return Err(err());
    }
    Ok(week)
}

/// Share of `part` in `whole` as a percentage rounded to two places,
/// i.e. `round(100 * part / whole, 2)`.
///
/// An empty `whole` yields `0.0` instead of a NaN, so callers never have to
/// special-case teams or interns without any cells.
pub fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round2(part as f64 / whole as f64 * 100.0)
}

/// Round half away from zero to two decimal places.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Arithmetic mean; returns 0 for an empty slice to avoid NaNs.
pub fn average(v: &[f64]) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    let sum: f64 = v.iter().copied().sum();
    sum / v.len() as f64
}

/// Fixed-decimal rendering with locale thousands separators
/// (e.g. `1,234.50`).
pub fn format_number(n: f64, decimals: usize) -> String {
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_val: i64 = parts.next().unwrap_or("0").parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = parts.next() {
        res.push('.');
        res.push_str(frac);
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

/// Thin wrapper around `num-format` for counts in console messages
/// (e.g. `9,855 rows read`).
pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

/// `tabled` display hook for percentage columns: always two decimals.
pub fn display_pct(v: &f64) -> String {
    format_number(*v, 2)
}

/// Text stand-in for a bar chart: one block per 5 percentage points.
pub fn bar(pct: f64) -> String {
    let blocks = (pct.clamp(0.0, 100.0) / 5.0).round() as usize;
    "█".repeat(blocks)
}

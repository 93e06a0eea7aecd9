//! Cell values at the transport boundary.
//!
//! The remote store hands back loosely typed JSON scalars. They are turned
//! into [`Cell`] once, on arrival, and turned back into JSON only when a
//! row leaves for the store. Anything in between works on `Cell`.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Excel day zero for serial date numbers (accounts for the 1900 leap bug).
const EXCEL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

/// Largest serial Excel accepts (9999-12-31).
const EXCEL_MAX_SERIAL: f64 = 2_958_465.0;

/// Whole numbers beyond this lose integer precision in `f64`.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// One spreadsheet cell.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

/// Outcome of a best-effort conversion.
///
/// `Raw` keeps the original text when parsing failed, so callers can both
/// carry on with the dirty value and notice that normalization degraded.
#[derive(Debug, Clone, PartialEq)]
pub enum Coercion<T> {
    Parsed(T),
    Raw(String),
    Missing,
}

impl<T> Coercion<T> {
    pub fn parsed(self) -> Option<T> {
        match self {
            Self::Parsed(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_parsed(&self) -> Option<&T> {
        match self {
            Self::Parsed(value) => Some(value),
            _ => None,
        }
    }

    /// True when a value was present but could not be parsed.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Raw(_))
    }
}

impl Coercion<String> {
    /// The usable string either way; empty when missing.
    pub fn into_string(self) -> String {
        match self {
            Self::Parsed(s) | Self::Raw(s) => s,
            Self::Missing => String::new(),
        }
    }
}

impl Cell {
    /// Text cell; the empty string becomes [`Cell::Empty`].
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            Self::Empty
        } else {
            Self::Text(value)
        }
    }

    /// Empty, or text that is only whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(_) | Self::Date(_) => false,
        }
    }

    /// Display form with surrounding whitespace removed.
    pub fn trimmed(&self) -> String {
        match self {
            Self::Text(s) => s.trim().to_string(),
            other => other.to_string(),
        }
    }

    /// Convert a JSON scalar coming from the store.
    pub fn from_wire(value: &Value) -> Self {
        match value {
            Value::Null => Self::Empty,
            Value::String(s) => Self::text(s.as_str()),
            Value::Number(n) => n
                .as_f64()
                .map(Self::Number)
                .unwrap_or_else(|| Self::Text(n.to_string())),
            Value::Bool(b) => Self::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
            other => Self::Text(other.to_string()),
        }
    }

    /// JSON scalar to send to the store. Empty cells are written as `""`.
    pub fn to_wire(&self) -> Value {
        match self {
            Self::Empty => Value::String(String::new()),
            Self::Text(s) => Value::String(s.clone()),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(n.to_string())),
            Self::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
        }
    }

    /// Identifier form: whole numbers (`"123.0"`, `123.0`) become `"123"`,
    /// anything else is trimmed and returned raw.
    pub fn as_identifier(&self) -> Coercion<String> {
        match self {
            Self::Empty => Coercion::Missing,
            Self::Number(n) => match whole_number(*n) {
                Some(i) => Coercion::Parsed(i.to_string()),
                None => Coercion::Raw(n.to_string()),
            },
            Self::Date(d) => Coercion::Raw(d.format("%Y-%m-%d").to_string()),
            Self::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Coercion::Missing;
                }
                match trimmed.parse::<f64>().ok().and_then(whole_number) {
                    Some(i) => Coercion::Parsed(i.to_string()),
                    None => Coercion::Raw(trimmed.to_string()),
                }
            }
        }
    }

    /// Calendar date, accepting ISO dates and date-times, `DD/MM/YYYY`,
    /// and Excel serial numbers.
    pub fn as_date(&self) -> Coercion<NaiveDate> {
        match self {
            Self::Empty => Coercion::Missing,
            Self::Date(d) => Coercion::Parsed(*d),
            Self::Number(n) => match excel_serial_to_date(*n) {
                Some(d) => Coercion::Parsed(d),
                None => Coercion::Raw(n.to_string()),
            },
            Self::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Coercion::Missing;
                }
                match parse_date_text(trimmed) {
                    Some(d) => Coercion::Parsed(d),
                    None => Coercion::Raw(trimmed.to_string()),
                }
            }
        }
    }
}

fn whole_number(n: f64) -> Option<i64> {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < MAX_EXACT_INTEGER {
        Some(n as i64)
    } else {
        None
    }
}

fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial > EXCEL_MAX_SERIAL {
        return None;
    }
    let (y, m, d) = EXCEL_EPOCH;
    NaiveDate::from_ymd_opt(y, m, d)?.checked_add_signed(Duration::days(serial.trunc() as i64))
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| text.parse::<f64>().ok().and_then(excel_serial_to_date))
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => match whole_number(*n) {
                Some(i) => write!(f, "{i}"),
                None => write!(f, "{n}"),
            },
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<Value> for Cell {
    fn from(value: Value) -> Self {
        Self::from_wire(&value)
    }
}

impl From<Cell> for Value {
    fn from(cell: Cell) -> Self {
        match cell {
            Cell::Empty => Value::Null,
            other => other.to_wire(),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Self::text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<u32> for Cell {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<NaiveDate> for Cell {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

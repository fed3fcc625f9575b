use chrono::{Datelike, Duration as ChronoDur, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::fmt::{self, Display};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/* ───────────────────── Spreadsheet date-serial utilities ─────────────
The 1900 date system used by xlsx files:
  Serial 1  = 1900-01-01
  Serial 59 = 1900-02-28
  Serial 60 = 1900-02-29  (phantom, kept for Lotus compatibility)
  Serial 61 = 1900-03-01
Base date = 1899-12-31 so that serial 1 = base + 1 day = 1900-01-01.
Time is stored as fractional days (no timezone).
------------------------------------------------------------------- */

/// Base date for the 1900 date system. Serial 1 = base + 1 day = 1900-01-01.
const SERIAL_EPOCH: NaiveDate = NaiveDate::from_ymd_opt(1899, 12, 31).unwrap();
const PHANTOM_LEAP_CUTOFF: NaiveDate = NaiveDate::from_ymd_opt(1900, 3, 1).unwrap();

/// Width of an ISO calendar date token (`YYYY-MM-DD`).
pub const ISO_DATE_WIDTH: usize = "YYYY-MM-DD".len();

/// Serials read as dates when a backend hands back a bare number:
/// 1980-01-01 through 2099-12-31.
const PLAUSIBLE_SERIALS: std::ops::RangeInclusive<f64> = 29_221.0..=73_050.0;

pub fn datetime_to_serial(dt: &NaiveDateTime) -> f64 {
    let days = (dt.date() - SERIAL_EPOCH).num_days();
    // Dates on or after 1900-03-01 get +1 to account for phantom Feb 29
    let serial_days = if dt.date() >= PHANTOM_LEAP_CUTOFF {
        days + 1
    } else {
        days
    };

    let secs_in_day = dt.time().num_seconds_from_midnight() as f64;
    serial_days as f64 + secs_in_day / 86_400.0
}

pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let days = serial.trunc() as i64;
    let frac_secs = (serial.fract() * 86_400.0).round() as i64;

    // Serial 60 is phantom 1900-02-29; map to 1900-02-28
    let date = if days == 60 {
        NaiveDate::from_ymd_opt(1900, 2, 28)?
    } else {
        let offset = if days < 60 { days } else { days - 1 };
        SERIAL_EPOCH.checked_add_signed(ChronoDur::days(offset))?
    };

    let time = NaiveTime::from_num_seconds_from_midnight_opt(frac_secs.rem_euclid(86_400) as u32, 0)?;
    Some(date.and_time(time))
}

/// A value held by one spreadsheet cell.
///
/// Grid-level absence is modelled as `Option<CellValue>::None`; `Empty` exists
/// because some backends report blank-but-present cells.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Int(i64),
    Number(f64),
    Text(String),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Empty,
}

impl Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Int(i) => write!(f, "{i}"),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Boolean(b) => write!(f, "{b}"),
            CellValue::Date(d) => write!(f, "{d}"),
            CellValue::DateTime(dt) => write!(f, "{dt}"),
            CellValue::Empty => write!(f, ""),
        }
    }
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    /// Blank cells are eligible for filling: `Empty` and zero-length text.
    /// Whitespace is content.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Trimmed text view of the value. Numbers and booleans are rendered;
    /// blank and whitespace-only cells yield `None`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
            other => Some(other.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(i) => Some(*i as f64),
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => s.trim().parse::<f64>().ok(),
            CellValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            CellValue::Date(d) => {
                let dt = d.and_time(NaiveTime::MIN);
                Some(datetime_to_serial(&dt))
            }
            CellValue::DateTime(dt) => Some(datetime_to_serial(dt)),
            CellValue::Empty => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Int(i) => Some(*i),
            CellValue::Number(n) if n.fract() == 0.0 => Some(*n as i64),
            CellValue::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().filter(|n| n.fract() == 0.0).map(|n| n as i64))
            }
            _ => None,
        }
    }

    /// Interpret the cell as a calendar date.
    ///
    /// Accepts native date cells, `YYYY-MM-DD` text and 1900-system serials in
    /// the 1980..2100 range. Other numbers are not dates.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            CellValue::Date(d) => Some(*d),
            CellValue::DateTime(dt) => Some(dt.date()),
            CellValue::Int(i) => serial_date(*i as f64),
            CellValue::Number(n) => serial_date(*n),
            CellValue::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok(),
            _ => None,
        }
    }

    /// First day of the month named by the cell: `YYYY-MM` text or any date the cell holds.
    pub fn as_month(&self) -> Option<NaiveDate> {
        if let CellValue::Text(s) = self {
            let s = s.trim();
            if let Ok(d) = NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d") {
                return Some(d);
            }
        }
        self.as_date().and_then(|d| d.with_day(1))
    }

    /// Number from a provider's decimal string, kept integral when possible.
    pub fn from_numeric_str(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(i) = raw.parse::<i64>() {
            return Some(CellValue::Int(i));
        }
        raw.parse::<f64>().ok().map(CellValue::from_f64)
    }

    pub fn from_f64(n: f64) -> Self {
        if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
            CellValue::Int(n as i64)
        } else {
            CellValue::Number(n)
        }
    }

    /// Convert a parsed provider document node into a cell value.
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value as J;
        match value {
            J::Null => CellValue::Empty,
            J::Bool(b) => CellValue::Boolean(*b),
            J::Number(n) => match n.as_i64() {
                Some(i) => CellValue::Int(i),
                None => CellValue::Number(n.as_f64().unwrap_or_default()),
            },
            J::String(s) => CellValue::Text(s.clone()),
            other => CellValue::Text(other.to_string()),
        }
    }
}

fn serial_date(serial: f64) -> Option<NaiveDate> {
    if !PLAUSIBLE_SERIALS.contains(&serial) {
        return None;
    }
    serial_to_datetime(serial).map(|dt| dt.date())
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Int(i)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(d: NaiveDate) -> Self {
        CellValue::Date(d)
    }
}

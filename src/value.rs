use std::fmt;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde_json::Value as JsonValue;

use crate::decimal::NumericText;

/// Julian day number of 1970-01-01.
pub const UNIX_EPOCH_JDATE: i32 = 2_440_588;
/// Julian day number of 2000-01-01, the host's day zero.
pub const POSTGRES_EPOCH_JDATE: i32 = 2_451_545;
/// Days to add to a Unix day count to re-base it on the host epoch.
pub const UNIX_TO_HOST_DAYS: i32 = UNIX_EPOCH_JDATE - POSTGRES_EPOCH_JDATE;
/// Unix seconds at 2000-01-01T00:00:00Z.
pub const HOST_EPOCH_UNIX_SECS: i64 = 946_684_800;

const MICROS_PER_SEC: i64 = 1_000_000;

/// A single materialized cell, already in the host's representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Numeric(NumericText),
    /// Text, char and varchar bytes, copied as stored.
    Text(Vec<u8>),
    Bytea(Vec<u8>),
    /// Days since 2000-01-01.
    Date(i32),
    /// Microseconds since 2000-01-01T00:00:00Z.
    Timestamp(i64),
}

/// One output row in requested column order; `None` is a null cell.
pub type RowValues = Vec<Option<Datum>>;

impl Datum {
    pub fn date_from_unix_days(days: i64) -> Option<Datum> {
        let shifted = days.checked_add(UNIX_TO_HOST_DAYS as i64)?;
        i32::try_from(shifted).ok().map(Datum::Date)
    }

    pub fn timestamp_from_unix(seconds: i64, nanos: i64) -> Option<Datum> {
        let micros = (seconds.checked_sub(HOST_EPOCH_UNIX_SECS)?)
            .checked_mul(MICROS_PER_SEC)?
            .checked_add(nanos / 1_000)?;
        Some(Datum::Timestamp(micros))
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Datum::Date(days) => {
                let epoch = NaiveDate::from_ymd_opt(2000, 1, 1)?;
                if *days >= 0 {
                    epoch.checked_add_days(Days::new(*days as u64))
                } else {
                    epoch.checked_sub_days(Days::new(days.unsigned_abs() as u64))
                }
            }
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Datum::Timestamp(micros) => {
                let unix = micros.checked_add(HOST_EPOCH_UNIX_SECS.checked_mul(MICROS_PER_SEC)?)?;
                DateTime::from_timestamp_micros(unix)
            }
            _ => None,
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            Datum::Bool(b) => b.to_string(),
            Datum::Int16(i) => i.to_string(),
            Datum::Int32(i) => i.to_string(),
            Datum::Int64(i) => i.to_string(),
            Datum::Float32(f) => f.to_string(),
            Datum::Float64(f) => f.to_string(),
            Datum::Numeric(n) => n.text.clone(),
            Datum::Text(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            Datum::Bytea(bytes) => {
                let mut out = String::with_capacity(2 + bytes.len() * 2);
                out.push_str("\\x");
                for byte in bytes {
                    out.push_str(&format!("{byte:02x}"));
                }
                out
            }
            Datum::Date(days) => match self.as_date() {
                Some(date) => date.format("%Y-%m-%d").to_string(),
                None => format!("date({days})"),
            },
            Datum::Timestamp(micros) => match self.as_timestamp() {
                Some(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
                None => format!("timestamp({micros})"),
            },
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Datum::Int16(_)
                | Datum::Int32(_)
                | Datum::Int64(_)
                | Datum::Float32(_)
                | Datum::Float64(_)
                | Datum::Numeric(_)
        )
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Datum::Bool(b) => JsonValue::Bool(*b),
            Datum::Int16(i) => JsonValue::from(*i),
            Datum::Int32(i) => JsonValue::from(*i),
            Datum::Int64(i) => JsonValue::from(*i),
            Datum::Float32(f) => JsonValue::from(*f),
            Datum::Float64(f) => JsonValue::from(*f),
            _ => JsonValue::String(self.as_display()),
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

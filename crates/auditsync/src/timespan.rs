//! TimeSpan text codec.
//!
//! The admin service renders durations as `[d.]hh:mm:ss[.fffffff]`. Every value
//! is parsed into a `std::time::Duration` so age limits are compared by value,
//! never by their textual form.

use std::time::Duration;

use thiserror::Error;

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 3_600;
const SECS_PER_DAY: u64 = 86_400;

/// One tick is 100ns; the fraction carries at most seven digits.
const NANOS_PER_TICK: u32 = 100;
const TICK_DIGITS: usize = 7;

/// Errors produced while parsing TimeSpan text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeSpanError {
    #[error("TimeSpan value is empty")]
    Empty,

    #[error("Negative TimeSpan '{0}' is not a valid age limit")]
    Negative(String),

    #[error("Malformed TimeSpan '{value}': {reason}")]
    Malformed { value: String, reason: String },
}

/// Parses TimeSpan text (`90.00:00:00`, `00:30:00`, `1.02:03:04.5000000`).
///
/// A bare integer is read as whole days, matching how the service accepts
/// `-AuditLogAgeLimit 90`.
pub fn parse(value: &str) -> Result<Duration, TimeSpanError> {
    let text = value.trim();
    if text.is_empty() {
        return Err(TimeSpanError::Empty);
    }
    if text.starts_with('-') {
        return Err(TimeSpanError::Negative(text.to_string()));
    }

    let Some((head, clock)) = text.split_once(':') else {
        let days = component(text, text, "days")?;
        return whole_seconds(text, days, SECS_PER_DAY, 0);
    };

    let (days, hours) = match head.split_once('.') {
        Some((days, hours)) => (component(text, days, "days")?, component(text, hours, "hours")?),
        None => (0, component(text, head, "hours")?),
    };

    let mut parts = clock.split(':');
    let minutes = component(text, parts.next().unwrap_or_default(), "minutes")?;
    let (seconds, nanos) = match parts.next() {
        Some(raw) => seconds_with_fraction(text, raw)?,
        None => (0, 0),
    };
    if parts.next().is_some() {
        return Err(malformed(text, "too many ':' separators"));
    }

    if hours > 23 || minutes > 59 || seconds > 59 {
        return Err(malformed(text, "hours, minutes or seconds out of range"));
    }

    let clock_secs = hours * SECS_PER_HOUR + minutes * SECS_PER_MINUTE + seconds;
    whole_seconds(text, days, SECS_PER_DAY, clock_secs).map(|d| d + Duration::from_nanos(nanos.into()))
}

/// Formats a duration the way the service prints it.
pub fn format(duration: Duration) -> String {
    let total = duration.as_secs();
    let days = total / SECS_PER_DAY;
    let hours = (total % SECS_PER_DAY) / SECS_PER_HOUR;
    let minutes = (total % SECS_PER_HOUR) / SECS_PER_MINUTE;
    let seconds = total % SECS_PER_MINUTE;

    let mut text = if days > 0 {
        format!("{}.{:02}:{:02}:{:02}", days, hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    };

    let ticks = duration.subsec_nanos() / NANOS_PER_TICK;
    if ticks > 0 {
        text.push_str(&format!(".{:07}", ticks));
    }
    text
}

/// Converts a day count into the canonical duration.
pub fn from_days(days: u32) -> Duration {
    Duration::from_secs(u64::from(days) * SECS_PER_DAY)
}

fn malformed(value: &str, reason: &str) -> TimeSpanError {
    TimeSpanError::Malformed {
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn component(value: &str, raw: &str, name: &str) -> Result<u64, TimeSpanError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(value, &format!("{} must be a non-negative integer", name)));
    }
    raw.parse()
        .map_err(|_| malformed(value, &format!("{} out of range", name)))
}

fn seconds_with_fraction(value: &str, raw: &str) -> Result<(u64, u32), TimeSpanError> {
    let Some((whole, fraction)) = raw.split_once('.') else {
        return Ok((component(value, raw, "seconds")?, 0));
    };

    let seconds = component(value, whole, "seconds")?;
    if fraction.is_empty()
        || fraction.len() > TICK_DIGITS
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(malformed(value, "fraction must have 1 to 7 digits"));
    }

    let padded = format!("{:0<width$}", fraction, width = TICK_DIGITS);
    let ticks: u32 = padded
        .parse()
        .map_err(|_| malformed(value, "fraction out of range"))?;
    Ok((seconds, ticks * NANOS_PER_TICK))
}

fn whole_seconds(value: &str, count: u64, unit: u64, extra: u64) -> Result<Duration, TimeSpanError> {
    count
        .checked_mul(unit)
        .and_then(|secs| secs.checked_add(extra))
        .map(Duration::from_secs)
        .ok_or_else(|| malformed(value, "duration overflows"))
}

/// Serde adapter for optional TimeSpan fields on wire records.
///
/// Missing, null and blank values all deserialize to `None`.
pub mod option {
    use std::time::Duration;

    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(duration) => serializer.serialize_some(&super::format(*duration)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            Some(text) if !text.trim().is_empty() => {
                super::parse(&text).map(Some).map_err(D::Error::custom)
            }
            _ => Ok(None),
        }
    }
}

//! Creation timestamp parsing and local-calendar helpers.

use serde::{Deserialize, Deserializer, Serializer};
use time::format_description::well_known::Rfc3339;
use time::macros::{format_description, time};
use time::{Date, OffsetDateTime, UtcOffset};

/// Parse a backend `created_at` value.
///
/// Accepts RFC 3339 timestamps, the space-separated form PostgreSQL prints,
/// and bare `YYYY-MM-DD` dates (taken as UTC midnight). Returns `None` for
/// anything else.
#[must_use]
pub fn parse_created_at(raw: &str) -> Option<OffsetDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(ts) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Some(ts);
    }
    if let Some((date, rest)) = trimmed.split_once(' ') {
        let candidate = format!("{date}T{}", normalize_offset(rest));
        if let Ok(ts) = OffsetDateTime::parse(&candidate, &Rfc3339) {
            return Some(ts);
        }
    }
    Date::parse(trimmed, format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|date| date.midnight().assume_utc())
}

/// PostgreSQL prints `+00` where RFC 3339 wants `+00:00`.
fn normalize_offset(rest: &str) -> String {
    let Some(pos) = rest.rfind(['+', '-']) else {
        return rest.to_owned();
    };
    let (clock, offset) = rest.split_at(pos);
    if offset.len() == 3 {
        format!("{clock}{offset}:00")
    } else {
        rest.to_owned()
    }
}

/// Calendar day of `ts` as seen from `offset`.
#[must_use]
pub fn local_day(ts: OffsetDateTime, offset: UtcOffset) -> Date {
    ts.to_offset(offset).date()
}

/// Inclusive `[start, end]` bounds of `day` in the given offset.
#[must_use]
pub fn day_bounds(day: Date, offset: UtcOffset) -> (OffsetDateTime, OffsetDateTime) {
    let start = day.midnight().assume_offset(offset);
    let end = day.with_time(time!(23:59:59.999999999)).assume_offset(offset);
    (start, end)
}

/// Format a timestamp as RFC 3339, if representable.
#[must_use]
pub fn format_rfc3339(ts: OffsetDateTime) -> Option<String> {
    ts.format(&Rfc3339).ok()
}

/// Serde adapter that never fails on a bad `created_at`: unparseable or
/// non-string values become `None`.
pub mod lenient {
    use super::{Deserialize, Deserializer, OffsetDateTime, Serializer, format_rfc3339, parse_created_at};

    /// Serialize as an RFC 3339 string or `null`.
    ///
    /// # Errors
    /// Propagates serializer failures.
    #[allow(clippy::ref_option)]
    pub fn serialize<S>(value: &Option<OffsetDateTime>, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value.and_then(format_rfc3339) {
            Some(formatted) => s.serialize_some(&formatted),
            None => s.serialize_none(),
        }
    }

    /// Deserialize any value, keeping only parseable timestamp strings.
    ///
    /// # Errors
    /// Only fails when the input itself is malformed.
    pub fn deserialize<'de, D>(d: D) -> Result<Option<OffsetDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<serde_json::Value>::deserialize(d)?;
        Ok(raw
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .and_then(parse_created_at))
    }
}

//! Timestamp module
//!
//! Parses the modification timestamp expression from the configuration and formats
//! timestamps the way PDF date strings expect them.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use crate::error::{Error, Result};

/// Timestamp expression types
#[derive(Debug, Clone, PartialEq)]
pub enum TimestampExpression {
    /// Use the time of rendering
    Now,
    /// Use an explicit instant
    Explicit(DateTime<FixedOffset>),
    /// No timestamp (empty/null)
    None,
}

/// Parse a timestamp expression string into a TimestampExpression
///
/// Supported formats:
/// - `""` (empty) → None
/// - `"now"` → Now
/// - `"2024-11-20T10:30:00+02:00"` → Explicit instant (RFC 3339)
/// - `"2024-11-20"` → Explicit instant at midnight UTC
/// - `"@1700000000"` → Explicit instant from unix seconds
pub fn parse_timestamp_expression(expr: &str) -> Result<TimestampExpression> {
    let expr = expr.trim();

    if expr.is_empty() {
        return Ok(TimestampExpression::None);
    }

    if expr.eq_ignore_ascii_case("now") {
        return Ok(TimestampExpression::Now);
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(expr) {
        return Ok(TimestampExpression::Explicit(instant));
    }

    if let Ok(date) = NaiveDate::parse_from_str(expr, "%Y-%m-%d") {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| Error::InvalidDateExpression(expr.to_string()))?;
        return Ok(TimestampExpression::Explicit(Utc.from_utc_datetime(&midnight).fixed_offset()));
    }

    if let Some(seconds) = expr.strip_prefix('@') {
        let seconds: i64 = seconds.trim().parse()
            .map_err(|_| Error::InvalidDateExpression(format!("Invalid unix timestamp: {}", seconds)))?;
        let instant = Utc.timestamp_opt(seconds, 0)
            .single()
            .ok_or_else(|| Error::InvalidDateExpression(format!("Unix timestamp out of range: {}", seconds)))?;
        return Ok(TimestampExpression::Explicit(instant.fixed_offset()));
    }

    Err(Error::InvalidDateExpression(format!("Unable to parse timestamp expression: {}", expr)))
}

/// Resolve a TimestampExpression to an actual instant (if applicable)
pub fn resolve_timestamp(expr: &TimestampExpression) -> Option<DateTime<FixedOffset>> {
    match expr {
        TimestampExpression::None => None,
        TimestampExpression::Now => Some(Utc::now().fixed_offset()),
        TimestampExpression::Explicit(instant) => Some(*instant),
    }
}

/// Format an instant as a PDF date string
/// Example: "D:20241120103000+02'00'"
pub fn format_pdf_date(instant: &DateTime<FixedOffset>) -> String {
    let offset_seconds = instant.offset().local_minus_utc();
    let sign = if offset_seconds < 0 { '-' } else { '+' };
    let offset_minutes = offset_seconds.abs() / 60;
    format!(
        "D:{}{}{:02}'{:02}'",
        instant.format("%Y%m%d%H%M%S"),
        sign,
        offset_minutes / 60,
        offset_minutes % 60,
    )
}

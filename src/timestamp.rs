use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

pub const ZERO_UTC: &str = "1970-01-01T00:00:00Z";

pub fn now_utc() -> String {
    format_utc(OffsetDateTime::now_utc())
}

pub fn format_utc(ts: OffsetDateTime) -> String {
    ts.to_offset(UtcOffset::UTC)
        .format(&format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second]Z"
        ))
        .expect("canonical timestamp formatting for UTC should never fail")
}

/// Accepts RFC 3339 first, then the compact `YYYYMMDDThhmmssZ` form.
/// Returns the canonical second-precision UTC rendering.
pub fn parse_flexible(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(format_utc(ts));
    }
    PrimitiveDateTime::parse(
        raw,
        &format_description!("[year][month][day]T[hour][minute][second]Z"),
    )
    .ok()
    .map(|ts| format_utc(ts.assume_utc()))
}

pub fn parse_mail_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc2822) {
        return Some(format_utc(ts));
    }
    parse_flexible(raw)
}

pub fn unix_ms(canonical: &str) -> u64 {
    match OffsetDateTime::parse(canonical.trim(), &Rfc3339) {
        Ok(ts) => {
            let ms = ts.unix_timestamp_nanos() / 1_000_000;
            u64::try_from(ms).unwrap_or(0)
        }
        Err(_) => 0,
    }
}

/// Filesystem-safe stamp for backup file names, sorts chronologically.
pub fn backup_stamp() -> String {
    OffsetDateTime::now_utc()
        .format(&format_description!(
            "[year]-[month]-[day]t[hour][minute][second]"
        ))
        .expect("backup stamp formatting for UTC should never fail")
}

//! Shared helpers and constants.

use chrono::{DateTime, SecondsFormat, Utc};

pub const APP_NAME: &str = "casebook_backend";

/// Formats a timestamp as fixed-width RFC 3339 (millisecond precision, `Z`
/// suffix) so that stored timestamps sort lexically in time order.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_utc_iso() -> String {
    format_timestamp(Utc::now())
}

pub fn print_banner() {
    println!("{APP_NAME} v{}", env!("CARGO_PKG_VERSION"));
}

/// Trims a user-supplied optional string, mapping blank input to `None`.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|raw| {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_are_fixed_width() {
        let whole = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(format_timestamp(whole), "2026-01-02T03:04:05.000Z");
    }

    #[test]
    fn blank_strings_collapse_to_none() {
        assert_eq!(non_blank(Some("   ".into())), None);
        assert_eq!(non_blank(Some(" cardiology ".into())).as_deref(), Some("cardiology"));
        assert_eq!(non_blank(None), None);
    }
}

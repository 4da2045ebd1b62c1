//! Message normalization: timestamps, text cleaning, and visibility.
//!
//! The database stores timestamps on Apple's 2001 epoch — older schemas in
//! seconds, newer ones in nanoseconds — and message text full of transport
//! artifacts: the U+FFFC object-replacement character where attachments
//! were inlined, `at_<n>_<guid>` placeholder tokens, and stray control
//! bytes. This module turns both into render-ready values and decides
//! whether a row should appear in output at all.

use std::sync::OnceLock;

use chrono::{DateTime, Local, SecondsFormat, TimeZone};
use regex::Regex;

use crate::row::RawMessageRow;

/// Seconds between the Apple epoch (2001-01-01) and the Unix epoch.
pub const APPLE_EPOCH_OFFSET: i64 = 978_307_200;

/// Raw values above this are nanosecond-scale and get rescaled to seconds.
const NANOSECOND_THRESHOLD: i64 = 1_000_000_000_000;

pub(crate) fn attachment_placeholder_re() -> &'static Regex {
    static ATTACHMENT_PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();
    ATTACHMENT_PLACEHOLDER_RE.get_or_init(|| {
        Regex::new(r"(?i)\)?at_\d+_[A-F0-9-]+").expect("valid attachment placeholder regex")
    })
}

fn dash_re() -> &'static Regex {
    static DASH_RE: OnceLock<Regex> = OnceLock::new();
    DASH_RE.get_or_init(|| Regex::new(r"\p{Pd}").expect("valid dash regex"))
}

fn curly_quote_re() -> &'static Regex {
    static CURLY_QUOTE_RE: OnceLock<Regex> = OnceLock::new();
    CURLY_QUOTE_RE
        .get_or_init(|| Regex::new("[\u{2018}\u{2019}\u{201C}\u{201D}]").expect("valid quote regex"))
}

// ============================================================================
// Timestamps
// ============================================================================

/// Rescales a raw Apple-epoch value to seconds, detecting nanosecond-scale
/// values by magnitude.
pub fn apple_raw_to_seconds(raw: i64) -> i64 {
    if raw > NANOSECOND_THRESHOLD {
        raw / 1_000_000_000
    } else {
        raw
    }
}

/// Converts a raw Apple-epoch value to a local timestamp.
///
/// Returns `None` when the value does not map to a representable instant;
/// callers treat such rows as unordered rather than failing.
pub fn apple_to_local(raw: i64) -> Option<DateTime<Local>> {
    let unix = apple_raw_to_seconds(raw).checked_add(APPLE_EPOCH_OFFSET)?;
    Local.timestamp_opt(unix, 0).single()
}

/// Converts a wall-clock instant to Apple-epoch seconds.
pub fn apple_from_datetime<Tz: TimeZone>(dt: &DateTime<Tz>) -> i64 {
    dt.timestamp() - APPLE_EPOCH_OFFSET
}

/// ISO-8601 rendering for `<time datetime="...">` consumers.
pub fn iso_label(dt: &DateTime<Local>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Human clock label: `1:05 PM`.
pub fn time_human(dt: &DateTime<Local>) -> String {
    dt.format("%l:%M %p").to_string().trim().to_string()
}

/// Day label relative to `now`: `Today`, `Yesterday`, or `Month DD, YYYY`.
pub fn day_label(dt: &DateTime<Local>, now: &DateTime<Local>) -> String {
    let date = dt.date_naive();
    let today = now.date_naive();
    if date == today {
        "Today".to_string()
    } else if today.pred_opt() == Some(date) {
        "Yesterday".to_string()
    } else {
        dt.format("%B %d, %Y").to_string()
    }
}

// ============================================================================
// Text cleaning
// ============================================================================

/// Cleans raw message text for rendering.
///
/// Drops the U+FFFC object-replacement character, inline attachment
/// placeholder tokens, and C0/DEL control bytes, then trims. An
/// all-whitespace result is reported as absent text.
///
/// ```
/// use imsgkit::normalize::clean_text;
///
/// assert_eq!(clean_text("Look!\u{FFFC} at_0_ABCD-123"), Some("Look!".into()));
/// assert_eq!(clean_text(" \u{0007} "), None);
/// ```
pub fn clean_text(text: &str) -> Option<String> {
    let without_objects = text.replace('\u{FFFC}', "");
    let without_placeholders = attachment_placeholder_re().replace_all(&without_objects, "");
    let cleaned: String = without_placeholders
        .chars()
        .filter(|&c| c >= '\u{20}' && c != '\u{7F}')
        .collect();
    let trimmed = cleaned.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Normalizes text for reaction-target matching: lowercase, dash glyphs
/// unified to `-`, curly quotes to `"`, whitespace collapsed.
pub fn normalize_match_text(text: &str) -> String {
    let lower = text.to_lowercase();
    let dashes = dash_re().replace_all(&lower, "-");
    let quotes = curly_quote_re().replace_all(&dashes, "\"");
    collapse_whitespace(&quotes)
}

/// Collapses runs of whitespace into single spaces and trims.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// Visibility
// ============================================================================

/// Decides whether a row should appear in rendered output at all.
///
/// Rows with no text, no visible attachments, and no association to
/// another message are protocol housekeeping when they carry a non-zero
/// item type or the system-message flag — group renames, membership
/// changes, and the like. Everything else is visible.
pub fn is_visible(row: &RawMessageRow, cleaned_text: Option<&str>, attachment_count: usize) -> bool {
    let has_text = cleaned_text.is_some_and(|t| !t.trim().is_empty());
    if has_text || attachment_count > 0 || row.has_association() {
        return true;
    }
    !(row.item_type != 0 || row.is_system_message)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Timestamp tests
    // ========================================================================

    #[test]
    fn test_second_and_nanosecond_scales_agree() {
        let secs = 700_000_000i64;
        let nanos = secs * 1_000_000_000;
        assert_eq!(apple_to_local(secs), apple_to_local(nanos));
    }

    #[test]
    fn test_apple_to_local_maps_epoch() {
        // Apple epoch zero is 2001-01-01T00:00:00Z.
        let dt = apple_to_local(0).unwrap();
        assert_eq!(dt.timestamp(), APPLE_EPOCH_OFFSET);
    }

    #[test]
    fn test_apple_roundtrip() {
        let dt = apple_to_local(650_000_000).unwrap();
        assert_eq!(apple_from_datetime(&dt), 650_000_000);
    }

    #[test]
    fn test_unrepresentable_timestamp_is_none() {
        // Far beyond chrono's representable range.
        assert!(apple_to_local(i64::MIN).is_none());
        // A nanosecond-scale maximum still rescales into range.
        assert!(apple_to_local(i64::MAX).is_some());
    }

    #[test]
    fn test_day_label() {
        let now = Local.with_ymd_and_hms(2024, 6, 15, 18, 0, 0).unwrap();
        let today = Local.with_ymd_and_hms(2024, 6, 15, 9, 30, 0).unwrap();
        let yesterday = Local.with_ymd_and_hms(2024, 6, 14, 23, 59, 0).unwrap();
        let older = Local.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap();

        assert_eq!(day_label(&today, &now), "Today");
        assert_eq!(day_label(&yesterday, &now), "Yesterday");
        assert_eq!(day_label(&older, &now), "January 02, 2024");
    }

    #[test]
    fn test_time_human() {
        let dt = Local.with_ymd_and_hms(2024, 6, 15, 13, 5, 0).unwrap();
        assert_eq!(time_human(&dt), "1:05 PM");

        let morning = Local.with_ymd_and_hms(2024, 6, 15, 9, 30, 0).unwrap();
        assert_eq!(time_human(&morning), "9:30 AM");
    }

    // ========================================================================
    // Text cleaning tests
    // ========================================================================

    #[test]
    fn test_clean_text_strips_artifacts() {
        assert_eq!(
            clean_text("Hi\u{FFFC} there at_1_0A4E9-FF2"),
            Some("Hi there".into())
        );
        assert_eq!(clean_text("a\u{0000}b\u{001F}c\u{007F}d"), Some("abcd".into()));
    }

    #[test]
    fn test_clean_text_strips_newlines() {
        // C0 range includes \n and \t; transport text is single-line.
        assert_eq!(clean_text("line1\nline2"), Some("line1line2".into()));
    }

    #[test]
    fn test_clean_text_empty_results() {
        assert_eq!(clean_text(""), None);
        assert_eq!(clean_text("   "), None);
        assert_eq!(clean_text("\u{FFFC}at_0_ABC"), None);
    }

    #[test]
    fn test_normalize_match_text() {
        assert_eq!(normalize_match_text("Hello  World"), "hello world");
        assert_eq!(normalize_match_text("em\u{2014}dash"), "em-dash");
        assert_eq!(
            normalize_match_text("\u{201C}Quoted\u{201D} \u{2018}text\u{2019}"),
            "\"quoted\" \"text\""
        );
    }

    // ========================================================================
    // Visibility tests
    // ========================================================================

    #[test]
    fn test_empty_plain_row_is_visible() {
        // item_type 0, no system flag: empty but not housekeeping.
        let row = RawMessageRow::new(1, "A");
        assert!(is_visible(&row, None, 0));
    }

    #[test]
    fn test_housekeeping_row_is_invisible() {
        let row = RawMessageRow::new(1, "A").with_item_type(6);
        assert!(!is_visible(&row, None, 0));

        let system = RawMessageRow::new(2, "B").system_message(true);
        assert!(!is_visible(&system, None, 0));
    }

    #[test]
    fn test_content_overrides_housekeeping() {
        let row = RawMessageRow::new(1, "A").with_item_type(6);
        assert!(is_visible(&row, Some("renamed the group"), 0));
        assert!(is_visible(&row, None, 1));

        let assoc = RawMessageRow::new(2, "B")
            .with_item_type(6)
            .with_association("A", 3001);
        assert!(is_visible(&assoc, None, 0));
    }
}

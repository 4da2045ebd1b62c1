//! Handle classification, normalization, and display helpers.
//!
//! A "handle" is the raw per-message sender/recipient identifier stored in
//! the database: an email address, a phone number in any formatting, or an
//! opaque messaging ID. These helpers are shared by the identity index, the
//! group resolver, and the assembler's author-name resolution.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

/// Maximum display length for an email used as a name.
const EMAIL_NAME_CAP: usize = 20;
/// Maximum display length for a phone number used as a name.
const PHONE_NAME_CAP: usize = 16;

fn phone_like_re() -> &'static Regex {
    static PHONE_LIKE_RE: OnceLock<Regex> = OnceLock::new();
    PHONE_LIKE_RE.get_or_init(|| {
        Regex::new(r"^\+?\d[\d\s().-]*$").expect("valid phone-like regex")
    })
}

fn e164_grouping_re() -> &'static Regex {
    static E164_GROUPING_RE: OnceLock<Regex> = OnceLock::new();
    E164_GROUPING_RE.get_or_init(|| {
        Regex::new(r"^(\+\d)(\d{3})(\d{3})(\d{4})$").expect("valid E.164 grouping regex")
    })
}

/// Returns `true` for email-shaped handles.
pub fn is_email_like(handle: &str) -> bool {
    handle.contains('@')
}

/// Returns `true` for phone-shaped handles: an optional `+`, then digits
/// with common separator characters.
pub fn is_phone_like(handle: &str) -> bool {
    phone_like_re().is_match(handle.trim())
}

/// Extracts the digit characters of a handle, dropping everything else.
///
/// ```
/// assert_eq!(imsgkit::handle::digits("+1 (555) 123-4567"), "15551234567");
/// ```
pub fn digits(handle: &str) -> String {
    handle.chars().filter(char::is_ascii_digit).collect()
}

/// Pretty-prints a handle for display when no contact name is available.
///
/// Bare E.164-style numbers with a country digit and 10 national digits are
/// grouped as `+1 (555) 123-4567`; everything else passes through.
pub fn format_handle(handle: &str) -> String {
    e164_grouping_re()
        .replace(handle, "$1 ($2) $3-$4")
        .into_owned()
}

/// Resolves a display label for a message author.
///
/// Looks the lowercased handle up in `friendly_names` first; falls back to
/// [`format_handle`].
pub fn resolve_author_name(friendly_names: &HashMap<String, String>, handle: &str) -> String {
    let key = handle.to_lowercase();
    match friendly_names.get(&key) {
        Some(name) if !name.trim().is_empty() => name.clone(),
        _ => format_handle(handle),
    }
}

/// Caps long raw handles used as display names.
///
/// Emails truncate at 20 characters, phone-shaped strings at 16; anything
/// else (a real name) passes through untouched. Truncation appends `…`.
pub fn cap_handle_name(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    if is_email_like(name) {
        truncate_chars(name, EMAIL_NAME_CAP)
    } else if is_phone_like(name) {
        truncate_chars(name, PHONE_NAME_CAP)
    } else {
        name.to_string()
    }
}

/// Truncates to `max` characters, trimming trailing whitespace and
/// appending a single ellipsis when anything was cut.
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    let s = s.trim_end();
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max).collect();
    format!("{}…", cut.trim_end())
}

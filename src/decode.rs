//! Best-effort text extraction from `attributedBody` blobs.
//!
//! Modern rows often leave `message.text` NULL and store the content as a
//! serialized `NSAttributedString`. Two encodings occur in the wild: the
//! legacy `streamtyped` typedstream format and NSKeyedArchiver property
//! lists. Neither is documented, so decoding is a chain of independent
//! strategies tried in order, from the most precise to the most desperate:
//!
//! 1. [`typedstream_string`] — length-prefixed payload after the
//!    `NSString` marker
//! 2. [`keyed_archive_string`] — parse as a property list and pull the
//!    conventional string fields
//! 3. [`salvage_readable`] — scrub archive markers out of a lossy UTF-8
//!    rendering and keep the most sentence-like chunk
//! 4. [`ascii_run`] — longest printable-ASCII run that isn't a marker
//!
//! The first strategy returning a non-empty string wins. Strategies are
//! plain `fn(&[u8]) -> Option<String>` values, so new tiers slot into
//! [`STRATEGIES`] without touching existing ones.
//!
//! Every tier fails soft: an undecodable blob yields `None` and the row is
//! rendered attachment-only or not at all.

use std::io::Cursor;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, trace};

use crate::normalize::{attachment_placeholder_re, collapse_whitespace};

/// Typedstream marker preceding the string payload.
const NSSTRING_MARKER: &[u8] = b"NSString";

/// Typedstream metadata bytes between the marker and the length prefix.
const TYPEDSTREAM_META_LEN: usize = 5;

/// Escape byte announcing a two-byte little-endian length.
const LONG_LENGTH_ESCAPE: u8 = 0x81;

/// Minimum length for a last-resort ASCII run.
const MIN_ASCII_RUN: usize = 4;

/// One decoding tier.
pub type DecodeStrategy = fn(&[u8]) -> Option<String>;

/// The decoding chain, in priority order.
pub const STRATEGIES: &[(&str, DecodeStrategy)] = &[
    ("typedstream", typedstream_string),
    ("keyed-archive", keyed_archive_string),
    ("salvage", salvage_readable),
    ("ascii-run", ascii_run),
];

fn control_byte_re() -> &'static Regex {
    static CONTROL_BYTE_RE: OnceLock<Regex> = OnceLock::new();
    CONTROL_BYTE_RE
        .get_or_init(|| Regex::new(r"[\x00-\x1F\x7F]").expect("valid control byte regex"))
}

fn archive_token_re() -> &'static Regex {
    static ARCHIVE_TOKEN_RE: OnceLock<Regex> = OnceLock::new();
    ARCHIVE_TOKEN_RE.get_or_init(|| {
        Regex::new(r"(?i:\bstreamtyped\b)|\$[A-Za-z0-9_]+|\bNS[A-Za-z0-9_]+\b|\b__kIM[A-Za-z0-9_]+\b")
            .expect("valid archive token regex")
    })
}

fn sentence_chunk_re() -> &'static Regex {
    static SENTENCE_CHUNK_RE: OnceLock<Regex> = OnceLock::new();
    SENTENCE_CHUNK_RE.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9[[:punct:]]\s]{6,}").expect("valid sentence chunk regex")
    })
}

/// Decodes an `attributedBody` blob into plain text, or `None` when no
/// text is recoverable.
///
/// # Example
///
/// ```
/// // A minimal typedstream fragment: marker, 5 metadata bytes, then a
/// // one-byte-length-prefixed UTF-8 payload.
/// let mut blob = b"NSString".to_vec();
/// blob.extend_from_slice(&[0x01, 0x94, 0x84, 0x01, 0x2B]);
/// blob.push(5);
/// blob.extend_from_slice(b"Hello");
/// assert_eq!(imsgkit::decode::decode_attributed_body(&blob), Some("Hello".into()));
/// ```
pub fn decode_attributed_body(blob: &[u8]) -> Option<String> {
    for (tier, strategy) in STRATEGIES {
        if let Some(text) = strategy(blob) {
            if !text.is_empty() {
                trace!(tier, len = text.len(), "recovered text from attributedBody");
                return Some(text);
            }
        }
    }
    debug!(blob_len = blob.len(), "no text recoverable from attributedBody");
    None
}

/// Tier 1: pulls the length-prefixed `NSString` payload out of a
/// typedstream archive.
///
/// After the `NSString` class name there are five bytes of typedstream
/// metadata, then either a one-byte length or an `0x81` escape followed by
/// a two-byte little-endian length, then the UTF-8 payload.
pub fn typedstream_string(blob: &[u8]) -> Option<String> {
    let idx = find_subslice(blob, NSSTRING_MARKER)?;
    let cursor = idx + NSSTRING_MARKER.len() + TYPEDSTREAM_META_LEN;
    let &first = blob.get(cursor)?;

    let (len, start) = if first == LONG_LENGTH_ESCAPE {
        let lo = *blob.get(cursor + 1)? as usize;
        let hi = *blob.get(cursor + 2)? as usize;
        (lo | (hi << 8), cursor + 3)
    } else {
        (first as usize, cursor + 1)
    };

    let raw = blob.get(start..start.checked_add(len)?)?;
    let text = scrub_decoded(&String::from_utf8_lossy(raw).replace('\u{FFFD}', ""));
    (!text.is_empty()).then_some(text)
}

/// Tier 2: parses the blob as an NSKeyedArchiver property list.
///
/// Looks for the conventional string-holding keys, then falls back to the
/// first plain string in the archive's object table that isn't an
/// archiver-internal `$`-prefixed marker.
pub fn keyed_archive_string(blob: &[u8]) -> Option<String> {
    let value = plist::Value::from_reader(Cursor::new(blob)).ok()?;
    let dict = value.as_dictionary()?;

    for key in ["NSString", "NS.string"] {
        if let Some(text) = dict.get(key).and_then(plist::Value::as_string) {
            if !text.is_empty() {
                return Some(text.to_string());
            }
        }
    }

    dict.get("$objects")?
        .as_array()?
        .iter()
        .filter_map(plist::Value::as_string)
        .find(|s| !s.is_empty() && !s.starts_with('$'))
        .map(str::to_string)
}

/// Tier 3: heuristic salvage for archives the precise tiers miss.
///
/// Renders the bytes as lossy UTF-8, blanks control bytes and archive
/// tokens (`streamtyped`, `$class`, `NS*`, `__kIM*`), then keeps the chunk
/// with the most letters. A result still starting with the binary-plist
/// magic means the blob was never text, so it is rejected.
pub fn salvage_readable(blob: &[u8]) -> Option<String> {
    let readable = String::from_utf8_lossy(blob).replace('\u{FFFD}', "");
    let no_controls = control_byte_re().replace_all(&readable, " ");
    let no_tokens = archive_token_re().replace_all(&no_controls, " ");
    let cleaned = collapse_whitespace(&no_tokens);

    let best = sentence_chunk_re()
        .find_iter(&cleaned)
        .map(|m| m.as_str())
        .max_by_key(|s| (alpha_count(s), s.len()));

    let chosen = scrub_decoded(best.unwrap_or(&cleaned));
    if chosen.is_empty() || cleaned.starts_with("bplist") {
        None
    } else {
        Some(chosen)
    }
}

/// Tier 4: last resort — the longest printable-ASCII run of at least four
/// bytes that contains a letter and isn't an archive marker.
pub fn ascii_run(blob: &[u8]) -> Option<String> {
    let mut best: Option<&[u8]> = None;
    let mut run_start: Option<usize> = None;

    for (i, &b) in blob.iter().chain(std::iter::once(&0u8)).enumerate() {
        let printable = (0x20..=0x7E).contains(&b) && i < blob.len();
        match (printable, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                let run = &blob[start..i];
                if run.len() >= MIN_ASCII_RUN
                    && is_candidate_run(run)
                    && best.is_none_or(|b| run.len() > b.len())
                {
                    best = Some(run);
                }
                run_start = None;
            }
            _ => {}
        }
    }

    best.map(|run| String::from_utf8_lossy(run).trim().to_string())
}

fn is_candidate_run(run: &[u8]) -> bool {
    let starts_with = |prefix: &[u8]| run.starts_with(prefix);
    if starts_with(b"$") || starts_with(b"NS") || starts_with(b"IM") || starts_with(b"__kIM") {
        return false;
    }
    run.iter().any(u8::is_ascii_alphabetic)
}

/// Shared cleanup for decoded payloads: drop inline attachment
/// placeholders, collapse whitespace.
fn scrub_decoded(text: &str) -> String {
    let stripped = attachment_placeholder_re().replace_all(text, "");
    collapse_whitespace(&stripped)
}

fn alpha_count(s: &str) -> usize {
    s.chars().filter(|c| c.is_ascii_alphabetic()).count()
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a typedstream-shaped blob around a payload string.
    fn typedstream_blob(payload: &str) -> Vec<u8> {
        let bytes = payload.as_bytes();
        let mut blob = Vec::new();
        blob.extend_from_slice(&[0x04, 0x0B]); // leading junk
        blob.extend_from_slice(b"streamtyped");
        blob.extend_from_slice(NSSTRING_MARKER);
        blob.extend_from_slice(&[0x01, 0x94, 0x84, 0x01, 0x2B]); // metadata
        if bytes.len() > 127 {
            blob.push(LONG_LENGTH_ESCAPE);
            blob.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
        } else {
            blob.push(bytes.len() as u8);
        }
        blob.extend_from_slice(bytes);
        blob.extend_from_slice(&[0x86, 0x84]); // trailing junk
        blob
    }

    // ========================================================================
    // Typedstream tier
    // ========================================================================

    #[test]
    fn test_typedstream_short_string() {
        let blob = typedstream_blob("Hello, world!");
        assert_eq!(typedstream_string(&blob).as_deref(), Some("Hello, world!"));
    }

    #[test]
    fn test_typedstream_long_string() {
        let long = "word ".repeat(60); // 300 bytes, needs the 2-byte length
        let blob = typedstream_blob(&long);
        assert_eq!(typedstream_string(&blob).as_deref(), Some(long.trim()));
    }

    #[test]
    fn test_typedstream_strips_placeholders() {
        let blob = typedstream_blob("photo )at_0_89AB-CDEF here");
        assert_eq!(typedstream_string(&blob).as_deref(), Some("photo here"));
    }

    #[test]
    fn test_typedstream_truncated_blob() {
        let mut blob = typedstream_blob("Hello");
        blob.truncate(blob.len() - 4); // cut into the payload
        assert_eq!(typedstream_string(&blob), None);
    }

    #[test]
    fn test_typedstream_missing_marker() {
        assert_eq!(typedstream_string(b"no marker here"), None);
    }

    // ========================================================================
    // Keyed-archive tier
    // ========================================================================

    fn xml_plist(body: &str) -> Vec<u8> {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \
             \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n\
             <plist version=\"1.0\">{body}</plist>"
        )
        .into_bytes()
    }

    #[test]
    fn test_keyed_archive_nsstring_key() {
        let blob = xml_plist("<dict><key>NSString</key><string>Archived text</string></dict>");
        assert_eq!(keyed_archive_string(&blob).as_deref(), Some("Archived text"));
    }

    #[test]
    fn test_keyed_archive_objects_table() {
        let blob = xml_plist(
            "<dict><key>$objects</key><array>\
             <string>$null</string>\
             <string>Real content</string>\
             </array></dict>",
        );
        assert_eq!(keyed_archive_string(&blob).as_deref(), Some("Real content"));
    }

    #[test]
    fn test_keyed_archive_rejects_garbage() {
        assert_eq!(keyed_archive_string(b"\x00\x01\x02not a plist"), None);
    }

    // ========================================================================
    // Salvage + ASCII tiers
    // ========================================================================

    #[test]
    fn test_salvage_scrubs_archive_tokens() {
        let blob = b"\x04\x0bstreamtyped\x81\xe8\x03NSMutableString\x01Dinner at seven works great\x00$class__kIMMessagePartAttributeName";
        let text = salvage_readable(blob).unwrap();
        assert!(text.contains("Dinner at seven works great"), "got: {text}");
        assert!(!text.contains("streamtyped"));
        assert!(!text.contains("NSMutableString"));
        assert!(!text.contains("__kIM"));
    }

    #[test]
    fn test_salvage_rejects_bplist_prefix() {
        let blob = b"bplist00\xa1\x01_content";
        assert_eq!(salvage_readable(blob), None);
    }

    #[test]
    fn test_ascii_run_picks_longest_user_text() {
        let blob = b"\x00\x01NSData\x02$null\x03a genuinely long readable run\x04ab\x05";
        assert_eq!(
            ascii_run(blob).as_deref(),
            Some("a genuinely long readable run")
        );
    }

    #[test]
    fn test_ascii_run_requires_letters() {
        assert_eq!(ascii_run(b"\x001234567890\x00"), None);
    }

    #[test]
    fn test_ascii_run_rejects_markers() {
        assert_eq!(ascii_run(b"\x00NSAttributedString\x00"), None);
        assert_eq!(ascii_run(b"\x00__kIMFileTransfer\x00"), None);
    }

    // ========================================================================
    // Full chain
    // ========================================================================

    #[test]
    fn test_decode_prefers_typedstream() {
        let blob = typedstream_blob("Fast path wins");
        assert_eq!(
            decode_attributed_body(&blob).as_deref(),
            Some("Fast path wins")
        );
    }

    #[test]
    fn test_decode_falls_back_to_archive() {
        let blob = xml_plist("<dict><key>NS.string</key><string>Plist path</string></dict>");
        assert_eq!(decode_attributed_body(&blob).as_deref(), Some("Plist path"));
    }

    #[test]
    fn test_decode_fails_soft() {
        assert_eq!(decode_attributed_body(&[0x00, 0x01, 0x02, 0x03]), None);
        assert_eq!(decode_attributed_body(b""), None);
    }

    #[test]
    fn test_decode_utf8_payload() {
        let blob = typedstream_blob("caf\u{e9} \u{1F389}");
        assert_eq!(
            decode_attributed_body(&blob).as_deref(),
            Some("caf\u{e9} \u{1F389}")
        );
    }
}

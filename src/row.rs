//! Raw input types: message rows and attachment records as fetched from the
//! database.
//!
//! The engine never talks to SQLite itself. A caller fetches rows from the
//! `message` table (joined through `chat_message_join`) and hands them over
//! as [`RawMessageRow`] values, together with per-message attachment lists
//! and a `handle_id -> raw handle` map. Everything downstream —
//! normalization, decoding, reaction correlation — operates on these
//! in-memory values only.

use serde::{Deserialize, Serialize};

/// One raw row of the `message` table, as stored on disk.
///
/// Field names follow the database columns. `date_raw` is the Apple-epoch
/// timestamp (seconds since 2001-01-01, or nanoseconds on newer schemas);
/// the normalizer detects the scale by magnitude.
///
/// # Construction
///
/// ```rust
/// use imsgkit::row::RawMessageRow;
///
/// let row = RawMessageRow::new(42, "GUID-42")
///     .with_text("Hello!")
///     .with_date_raw(700_000_000)
///     .from_me(true);
/// assert_eq!(row.message_id, 42);
/// assert!(row.is_from_me);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMessageRow {
    /// `message.ROWID`, unique per message.
    pub message_id: i64,

    /// `message.guid`, globally unique message identifier.
    pub guid: String,

    /// Whether the local user sent this row (`message.is_from_me`).
    pub is_from_me: bool,

    /// Foreign key into the `handle` table for the sender. `None` for rows
    /// from the local user.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub handle_id: Option<i64>,

    /// `message.date`: Apple-epoch timestamp, seconds or nanoseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub date_raw: Option<i64>,

    /// Plain text, absent on many modern rows where the content lives in
    /// `attributedBody` instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub text: Option<String>,

    /// Serialized NSAttributedString blob (`message.attributedBody`).
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub attributed_body: Option<Vec<u8>>,

    /// Target GUID for tapback rows, possibly carrying a `p:<n>/`
    /// participant prefix.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub associated_message_guid: Option<String>,

    /// Tapback code (2000-range) or 0.
    #[serde(default)]
    pub associated_message_type: i64,

    /// Explicit custom-emoji override for tapbacks.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub associated_message_emoji: Option<String>,

    /// 0 for ordinary messages; non-zero values mark protocol housekeeping
    /// rows (group renames, member changes, ...).
    #[serde(default)]
    pub item_type: i64,

    /// `message.is_system_message`.
    #[serde(default)]
    pub is_system_message: bool,

    /// App-extension bundle id, used by the payment heuristic.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub balloon_bundle_id: Option<String>,

    /// Transport service: "iMessage", "SMS", ...
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub service: Option<String>,
}

impl RawMessageRow {
    /// Creates a row with only the identifying fields set.
    pub fn new(message_id: i64, guid: impl Into<String>) -> Self {
        Self {
            message_id,
            guid: guid.into(),
            is_from_me: false,
            handle_id: None,
            date_raw: None,
            text: None,
            attributed_body: None,
            associated_message_guid: None,
            associated_message_type: 0,
            associated_message_emoji: None,
            item_type: 0,
            is_system_message: false,
            balloon_bundle_id: None,
            service: None,
        }
    }

    /// Builder method to set the plain text.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Builder method to set the raw Apple-epoch timestamp.
    #[must_use]
    pub fn with_date_raw(mut self, date_raw: i64) -> Self {
        self.date_raw = Some(date_raw);
        self
    }

    /// Builder method to set the sender flag.
    #[must_use]
    pub fn from_me(mut self, from_me: bool) -> Self {
        self.is_from_me = from_me;
        self
    }

    /// Builder method to set the sender handle id.
    #[must_use]
    pub fn with_handle_id(mut self, handle_id: i64) -> Self {
        self.handle_id = Some(handle_id);
        self
    }

    /// Builder method to set the attributedBody blob.
    #[must_use]
    pub fn with_attributed_body(mut self, blob: impl Into<Vec<u8>>) -> Self {
        self.attributed_body = Some(blob.into());
        self
    }

    /// Builder method to mark this row as a tapback on another message.
    #[must_use]
    pub fn with_association(mut self, target_guid: impl Into<String>, kind: i64) -> Self {
        self.associated_message_guid = Some(target_guid.into());
        self.associated_message_type = kind;
        self
    }

    /// Builder method to set the custom tapback emoji.
    #[must_use]
    pub fn with_emoji(mut self, emoji: impl Into<String>) -> Self {
        self.associated_message_emoji = Some(emoji.into());
        self
    }

    /// Builder method to set the item type.
    #[must_use]
    pub fn with_item_type(mut self, item_type: i64) -> Self {
        self.item_type = item_type;
        self
    }

    /// Builder method to set the system-message flag.
    #[must_use]
    pub fn system_message(mut self, flag: bool) -> Self {
        self.is_system_message = flag;
        self
    }

    /// Builder method to set the balloon bundle id.
    #[must_use]
    pub fn with_balloon_bundle_id(mut self, bundle: impl Into<String>) -> Self {
        self.balloon_bundle_id = Some(bundle.into());
        self
    }

    /// Returns `true` when this row carries a non-empty associated-message
    /// GUID, i.e. it references another message.
    pub fn has_association(&self) -> bool {
        self.associated_message_guid
            .as_deref()
            .is_some_and(|g| !g.is_empty())
    }
}

/// One attachment record, already joined to its message by the caller.
///
/// Attachment *bytes* are out of scope here; the engine only needs enough
/// metadata to decide visibility and to pass the record through to a
/// renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// Original transfer name, when recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub transfer_name: Option<String>,

    /// On-disk filename, when recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub filename: Option<String>,

    /// MIME type, when recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// Coarse attachment classification for renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Video,
    Audio,
    File,
}

impl Attachment {
    /// Creates an attachment with no metadata.
    pub fn new() -> Self {
        Self {
            transfer_name: None,
            filename: None,
            mime_type: None,
        }
    }

    /// Builder method to set the transfer name.
    #[must_use]
    pub fn with_transfer_name(mut self, name: impl Into<String>) -> Self {
        self.transfer_name = Some(name.into());
        self
    }

    /// Builder method to set the filename.
    #[must_use]
    pub fn with_filename(mut self, name: impl Into<String>) -> Self {
        self.filename = Some(name.into());
        self
    }

    /// Builder method to set the MIME type.
    #[must_use]
    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    /// The name used for display and classification: transfer name first,
    /// else the basename of the filename.
    pub fn display_name(&self) -> Option<&str> {
        self.transfer_name
            .as_deref()
            .or_else(|| self.filename.as_deref().map(basename))
    }

    /// Whether this attachment should be hidden entirely from renderers.
    ///
    /// Plugin-payload attachments are bookkeeping blobs for app extensions,
    /// not user content.
    pub fn is_hidden(&self) -> bool {
        if let Some(name) = self.display_name() {
            if name.to_lowercase().ends_with(".pluginpayloadattachment") {
                return true;
            }
        }
        if let Some(mime) = &self.mime_type {
            if mime.to_lowercase().contains("pluginpayload") {
                return true;
            }
        }
        false
    }

    /// Infers a coarse kind from the MIME type and filename extension.
    pub fn kind(&self) -> AttachmentKind {
        let name = self.display_name().unwrap_or("").to_lowercase();
        let mime = self
            .mime_type
            .as_deref()
            .unwrap_or("")
            .to_lowercase();
        let has_ext = |exts: &[&str]| exts.iter().any(|e| name.ends_with(e));

        if mime.starts_with("image/")
            || has_ext(&[".jpg", ".jpeg", ".png", ".gif", ".heic", ".heif", ".webp"])
        {
            AttachmentKind::Image
        } else if mime.starts_with("video/") || has_ext(&[".mov", ".mp4", ".m4v", ".webm"]) {
            AttachmentKind::Video
        } else if mime.starts_with("audio/")
            || has_ext(&[".m4a", ".aac", ".mp3", ".wav", ".aif", ".aiff"])
        {
            AttachmentKind::Audio
        } else {
            AttachmentKind::File
        }
    }
}

impl Default for Attachment {
    fn default() -> Self {
        Self::new()
    }
}

fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_builder() {
        let row = RawMessageRow::new(7, "G-7")
            .with_text("hi")
            .with_date_raw(1_000)
            .from_me(true)
            .with_handle_id(3)
            .with_item_type(0);
        assert_eq!(row.message_id, 7);
        assert_eq!(row.guid, "G-7");
        assert_eq!(row.text.as_deref(), Some("hi"));
        assert_eq!(row.date_raw, Some(1_000));
        assert!(row.is_from_me);
        assert_eq!(row.handle_id, Some(3));
    }

    #[test]
    fn test_has_association() {
        let plain = RawMessageRow::new(1, "A");
        assert!(!plain.has_association());

        let empty_guid = RawMessageRow::new(2, "B").with_association("", 2000);
        assert!(!empty_guid.has_association());

        let tapback = RawMessageRow::new(3, "C").with_association("A", 2000);
        assert!(tapback.has_association());
    }

    #[test]
    fn test_attachment_hidden() {
        let plugin = Attachment::new().with_transfer_name("x.pluginPayloadAttachment");
        assert!(plugin.is_hidden());

        let plugin_mime = Attachment::new().with_mime_type("application/x-pluginPayload");
        assert!(plugin_mime.is_hidden());

        let photo = Attachment::new()
            .with_filename("/tmp/IMG_0001.HEIC")
            .with_mime_type("image/heic");
        assert!(!photo.is_hidden());
    }

    #[test]
    fn test_attachment_kind() {
        let img = Attachment::new().with_filename("a/b/photo.PNG");
        assert_eq!(img.kind(), AttachmentKind::Image);

        let vid = Attachment::new().with_mime_type("video/quicktime");
        assert_eq!(vid.kind(), AttachmentKind::Video);

        let audio = Attachment::new().with_transfer_name("memo.m4a");
        assert_eq!(audio.kind(), AttachmentKind::Audio);

        let other = Attachment::new().with_filename("report.pdf");
        assert_eq!(other.kind(), AttachmentKind::File);
    }

    #[test]
    fn test_display_name_prefers_transfer_name() {
        let att = Attachment::new()
            .with_transfer_name("nice.jpg")
            .with_filename("/var/store/ugly-guid.jpg");
        assert_eq!(att.display_name(), Some("nice.jpg"));

        let only_path = Attachment::new().with_filename("/var/store/photo.jpg");
        assert_eq!(only_path.display_name(), Some("photo.jpg"));
    }

    #[test]
    fn test_row_serialization_skips_absent_fields() {
        let row = RawMessageRow::new(1, "G");
        let json = serde_json::to_string(&row).unwrap();
        assert!(!json.contains("attributed_body"));
        assert!(!json.contains("balloon_bundle_id"));
        assert!(json.contains("\"guid\":\"G\""));
    }
}

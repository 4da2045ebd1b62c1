//! Render-ready output types.
//!
//! [`NormalizedMessage`] is the engine's output record: one per visible
//! message, timestamped in local time, with cleaned text, merged reactions,
//! and pass-through attachment metadata. A rendering layer consumes an
//! ordered `Vec<NormalizedMessage>` plus conversation metadata and never
//! has to look at raw rows again.
//!
//! # Serialization
//!
//! All types serialize with serde; optional fields are omitted when absent,
//! so the JSON stays compact:
//!
//! ```
//! use imsgkit::message::{ReactionRecord, Reactor};
//!
//! let reaction = ReactionRecord::new("👍", Reactor::Them, 2);
//! let json = serde_json::to_string(&reaction)?;
//! assert_eq!(json, r#"{"emoji":"👍","reactor":"them","count":2}"#);
//! # Ok::<(), serde_json::Error>(())
//! ```

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::row::Attachment;

/// Who produced a (merged) reaction.
///
/// A merged reaction may combine events from several people; it reports
/// [`Reactor::Them`] as soon as any contributor is not the local user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reactor {
    /// Every contributing event came from the local user.
    Me,
    /// At least one contributing event came from someone else.
    Them,
}

/// One merged reaction on a message: a single emoji with a contributor
/// count. Several underlying tapback/text-reaction events collapse into one
/// record per (message, emoji).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionRecord {
    /// The reaction emoji.
    pub emoji: String,
    /// Merged reactor classification.
    pub reactor: Reactor,
    /// Number of merged underlying events, always ≥ 1.
    pub count: u32,
}

impl ReactionRecord {
    /// Creates a reaction record.
    pub fn new(emoji: impl Into<String>, reactor: Reactor, count: u32) -> Self {
        Self {
            emoji: emoji.into(),
            reactor,
            count,
        }
    }
}

/// A normalized, render-ready message.
///
/// Produced by the assembler in ascending timestamp order. The `visible`
/// and `skip_render` flags are carried for callers that normalize without
/// filtering; the assembler's output list only ever contains rows with
/// `visible == true` and `skip_render == false`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedMessage {
    /// Database identifier of the underlying row.
    pub message_id: i64,

    /// GUID of the underlying row.
    pub guid: String,

    /// Whether the local user sent this message.
    pub is_from_me: bool,

    /// Raw sender handle (email/phone), when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_handle: Option<String>,

    /// Resolved display name for the sender. Only populated for group
    /// messages not sent by the local user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,

    /// Local-time send timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Local>>,

    /// ISO-8601 rendering of `sent_at`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at_iso: Option<String>,

    /// Human clock label, e.g. `1:05 PM`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at_human: Option<String>,

    /// Human day label: `Today`, `Yesterday`, or `Month DD, YYYY`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_label: Option<String>,

    /// Cleaned message text. Absent for attachment-only messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Merged reactions targeting this message, in first-seen emoji order.
    pub reactions: Vec<ReactionRecord>,

    /// Visible attachments, in input order.
    pub attachments: Vec<Attachment>,

    /// Whether this message looks like a payment (Apple Cash et al.).
    pub is_payment: bool,

    /// Dollar amount found in the text, e.g. `$20.00`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_amount: Option<String>,

    /// Whether the row passed the visibility rule.
    #[serde(skip)]
    pub visible: bool,

    /// Whether the row was consumed as a reaction and must not render.
    #[serde(skip)]
    pub skip_render: bool,
}

impl NormalizedMessage {
    /// Returns `true` if this message should appear in rendered output.
    pub fn is_rendered(&self) -> bool {
        self.visible && !self.skip_render
    }

    /// Returns `true` if this message carries neither text nor attachments.
    pub fn is_empty(&self) -> bool {
        self.text.as_deref().is_none_or(|t| t.trim().is_empty()) && self.attachments.is_empty()
    }
}

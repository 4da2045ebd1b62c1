//! Group signatures and conversation coalescing.
//!
//! The database routinely stores several `chat` rows for what a human
//! considers one conversation — the same group of people reached over
//! iMessage and SMS, or re-keyed after a member changed devices. This
//! module recognizes those duplicates by participant identity:
//!
//! - every participant handle maps to a canonical key (resolved contact
//!   key, else a canonicalized fallback),
//! - the sorted, deduplicated key set hashes to a stable **group
//!   signature**,
//! - chats sharing a signature merge into one [`GroupBucket`].
//!
//! One-to-one chats coalesce by a stricter rule: all participants must
//! resolve to exactly one contact, and any unmapped participant blocks
//! merging for that chat entirely.

use std::collections::HashMap;

use serde::Serialize;
use sha1::{Digest, Sha1};
use tracing::debug;

use crate::contacts::ContactBook;
use crate::handle;
use crate::identity::{IdentityIndex, Resolution};
use crate::normalize::apple_to_local;

/// Hex characters kept from the participant-set hash.
const SIGNATURE_LEN: usize = 12;

/// Per-participant character cap in synthesized group names.
const NAME_PART_CAP: usize = 13;

/// Total character cap for the joined part of a synthesized name.
const NAME_TOTAL_CAP: usize = 25;

/// Participants listed by name before the `(+N more)` suffix.
const NAME_LIST_MAX: usize = 3;

/// One raw participant of a chat: the handle as stored, plus the
/// uncanonicalized companion column when the schema has one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantHandle {
    pub handle: String,
    pub uncanonicalized: Option<String>,
}

impl ParticipantHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            uncanonicalized: None,
        }
    }

    #[must_use]
    pub fn with_uncanonicalized(mut self, uncanonicalized: impl Into<String>) -> Self {
        self.uncanonicalized = Some(uncanonicalized.into());
        self
    }
}

/// Aggregate facts about one underlying `chat` row, as fetched by the
/// caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSummary {
    pub chat_id: i64,
    /// Explicit user-set display name, when any.
    pub display_name: Option<String>,
    pub participants: Vec<ParticipantHandle>,
    pub message_count: u64,
    /// Raw Apple-epoch timestamp of the earliest message.
    pub first_date_raw: Option<i64>,
    /// Raw Apple-epoch timestamp of the latest message.
    pub last_date_raw: Option<i64>,
}

impl ChatSummary {
    pub fn new(chat_id: i64, participants: Vec<ParticipantHandle>) -> Self {
        Self {
            chat_id,
            display_name: None,
            participants,
            message_count: 0,
            first_date_raw: None,
            last_date_raw: None,
        }
    }

    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_stats(mut self, message_count: u64, first: Option<i64>, last: Option<i64>) -> Self {
        self.message_count = message_count;
        self.first_date_raw = first;
        self.last_date_raw = last;
        self
    }
}

/// Several underlying chats that share one participant set.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupBucket {
    /// Stable hash of the sorted participant-key set.
    pub signature: String,
    /// Sorted, deduplicated canonical participant keys.
    pub participant_keys: Vec<String>,
    /// Underlying chat ids, in first-seen order.
    pub chat_ids: Vec<i64>,
    pub message_count: u64,
    pub first_date_raw: Option<i64>,
    pub last_date_raw: Option<i64>,
    /// Explicit display names observed, with the owning chat's last
    /// activity.
    names: Vec<(String, Option<i64>)>,
}

/// One-to-one chats merged per resolved contact.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactBucket {
    /// Canonical contact key every participant of every member chat
    /// resolved to.
    pub contact_key: String,
    pub chat_ids: Vec<i64>,
    pub message_count: u64,
    pub first_date_raw: Option<i64>,
    pub last_date_raw: Option<i64>,
}

// ============================================================================
// Canonical keys and signatures
// ============================================================================

/// Canonicalized fallback key for a handle no contact claims.
///
/// Emails lowercase; phone-shaped handles become `+` plus their rightmost
/// ten digits (all digits when fewer); handles with no digits at all stay
/// as the lowercased raw string.
pub fn fallback_key(participant: &ParticipantHandle) -> String {
    let lowered = participant.handle.to_lowercase();
    if handle::is_email_like(&lowered) {
        return lowered;
    }
    let source = participant
        .uncanonicalized
        .as_deref()
        .unwrap_or(&participant.handle);
    let mut d = handle::digits(source);
    if d.is_empty() {
        return lowered;
    }
    if d.len() > 10 {
        d = d[d.len() - 10..].to_string();
    }
    format!("+{d}")
}

/// Maps a participant to its canonical key: the resolved contact key when
/// the index knows the handle, else the canonicalized fallback.
pub fn participant_key(participant: &ParticipantHandle, index: Option<&IdentityIndex>) -> String {
    if let Some(index) = index {
        if let Resolution::Contact(key) = index.resolve(
            &participant.handle,
            participant.uncanonicalized.as_deref(),
        ) {
            return key;
        }
    }
    fallback_key(participant)
}

/// Computes the stable, order-independent signature of a participant key
/// set.
///
/// ```
/// use imsgkit::group::group_signature;
///
/// let ab = group_signature(&["+15551234567".into(), "a@b.com".into()]);
/// let ba = group_signature(&["a@b.com".into(), "+15551234567".into()]);
/// assert_eq!(ab, ba);
/// assert_eq!(ab.len(), 12);
/// ```
pub fn group_signature(keys: &[String]) -> String {
    let mut sorted: Vec<&str> = keys.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut hasher = Sha1::new();
    hasher.update(sorted.join(",").as_bytes());
    let mut hex = hex::encode(hasher.finalize());
    hex.truncate(SIGNATURE_LEN);
    hex
}

// ============================================================================
// Coalescing
// ============================================================================

/// Buckets multi-party chats by participant-set signature.
///
/// Pass `None` for the index to bucket on fallback keys alone. Buckets come
/// back in first-seen order.
pub fn coalesce_groups(chats: &[ChatSummary], index: Option<&IdentityIndex>) -> Vec<GroupBucket> {
    let mut buckets: Vec<GroupBucket> = Vec::new();
    let mut by_signature: HashMap<String, usize> = HashMap::new();

    for chat in chats {
        let mut keys: Vec<String> = chat
            .participants
            .iter()
            .map(|p| participant_key(p, index))
            .collect();
        keys.sort_unstable();
        keys.dedup();
        let signature = group_signature(&keys);

        let slot = *by_signature.entry(signature.clone()).or_insert_with(|| {
            buckets.push(GroupBucket {
                signature,
                participant_keys: keys,
                chat_ids: Vec::new(),
                message_count: 0,
                first_date_raw: None,
                last_date_raw: None,
                names: Vec::new(),
            });
            buckets.len() - 1
        });

        let bucket = &mut buckets[slot];
        bucket.chat_ids.push(chat.chat_id);
        bucket.message_count += chat.message_count;
        bucket.first_date_raw = min_opt(bucket.first_date_raw, chat.first_date_raw);
        bucket.last_date_raw = max_opt(bucket.last_date_raw, chat.last_date_raw);
        if let Some(name) = chat.display_name.as_deref() {
            if !name.trim().is_empty() {
                bucket.names.push((name.to_string(), chat.last_date_raw));
            }
        }
    }

    debug!(chats = chats.len(), buckets = buckets.len(), "group coalescing done");
    buckets
}

/// Buckets one-to-one chats per resolved contact.
///
/// A chat is excluded when any participant is unmapped or when its
/// participants resolve to more than one contact key; guessing would merge
/// strangers.
pub fn coalesce_contacts(chats: &[ChatSummary], index: &IdentityIndex) -> Vec<ContactBucket> {
    let mut buckets: Vec<ContactBucket> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();

    for chat in chats {
        let mut keys: Vec<String> = Vec::new();
        let mut unmapped = false;
        for participant in &chat.participants {
            match index.resolve(&participant.handle, participant.uncanonicalized.as_deref()) {
                Resolution::Contact(key) => keys.push(key),
                Resolution::Unmapped => {
                    unmapped = true;
                    break;
                }
            }
        }
        if unmapped {
            debug!(chat_id = chat.chat_id, "unmapped participant blocks coalescing");
            continue;
        }
        keys.sort_unstable();
        keys.dedup();
        let [key] = keys.as_slice() else {
            continue;
        };

        let slot = *by_key.entry(key.clone()).or_insert_with(|| {
            buckets.push(ContactBucket {
                contact_key: key.clone(),
                chat_ids: Vec::new(),
                message_count: 0,
                first_date_raw: None,
                last_date_raw: None,
            });
            buckets.len() - 1
        });

        let bucket = &mut buckets[slot];
        bucket.chat_ids.push(chat.chat_id);
        bucket.message_count += chat.message_count;
        bucket.first_date_raw = min_opt(bucket.first_date_raw, chat.first_date_raw);
        bucket.last_date_raw = max_opt(bucket.last_date_raw, chat.last_date_raw);
    }

    buckets
}

// ============================================================================
// Display names
// ============================================================================

impl GroupBucket {
    /// Picks the display name for this bucket.
    ///
    /// Preference order: the explicit name on the most recently active
    /// underlying chat; the most frequent explicit name; a name
    /// synthesized from participant display names.
    pub fn display_name(&self, book: Option<&ContactBook>) -> String {
        self.explicit_name()
            .unwrap_or_else(|| synthesize_group_name(&self.participant_keys, book))
    }

    fn explicit_name(&self) -> Option<String> {
        if self.names.is_empty() {
            return None;
        }
        if let Some((name, _)) = self
            .names
            .iter()
            .filter(|(_, at)| at.is_some())
            .max_by_key(|(_, at)| *at)
        {
            return Some(name.clone());
        }
        // No activity timestamps at all: fall back to the most frequent.
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for (name, _) in &self.names {
            match counts.iter_mut().find(|(n, _)| n == name) {
                Some((_, c)) => *c += 1,
                None => counts.push((name, 1)),
            }
        }
        counts
            .into_iter()
            .max_by_key(|&(_, c)| c)
            .map(|(n, _)| n.to_string())
    }
}

impl ContactBucket {
    /// Display name for this contact bucket, capped for raw-handle
    /// fallbacks.
    pub fn display_name(&self, book: &ContactBook) -> String {
        let name = book
            .get(&self.contact_key)
            .map(|c| c.display_name().to_string())
            .unwrap_or_else(|| self.contact_key.clone());
        handle::cap_handle_name(&name)
    }
}

/// Synthesizes a group name from participant keys: up to three truncated
/// display names, a capped joined length, and a `(+N more)` suffix for the
/// rest.
pub fn synthesize_group_name(keys: &[String], book: Option<&ContactBook>) -> String {
    let names: Vec<String> = keys
        .iter()
        .map(|key| {
            let raw = book
                .and_then(|b| b.get(key))
                .map(|c| c.display_name().to_string())
                .unwrap_or_else(|| key.clone());
            handle::truncate_chars(&raw, NAME_PART_CAP)
        })
        .collect();

    let listed = names.iter().take(NAME_LIST_MAX).cloned().collect::<Vec<_>>();
    let base = handle::truncate_chars(&listed.join(", "), NAME_TOTAL_CAP);
    if names.len() > NAME_LIST_MAX {
        format!("{base} (+{} more)", names.len() - NAME_LIST_MAX)
    } else {
        base
    }
}

// ============================================================================
// Listings
// ============================================================================

/// Whether a listing row is a coalesced contact or a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadKind {
    Contact,
    Group,
}

/// One row of a conversation listing, ready for selection UIs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadListing {
    /// Stable export identifier: `ab:<key>` or `grp:<signature>`.
    pub id: String,
    pub name: String,
    pub kind: ThreadKind,
    pub message_count: u64,
    pub first_date_raw: Option<i64>,
    pub last_date_raw: Option<i64>,
    /// Local-time rendering of `first_date_raw`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_message_at: Option<String>,
    /// Local-time rendering of `last_date_raw`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<String>,
}

impl ThreadListing {
    /// Builds a listing row from a contact bucket.
    pub fn from_contact(bucket: &ContactBucket, book: &ContactBook) -> Self {
        Self {
            id: format!("ab:{}", bucket.contact_key),
            name: bucket.display_name(book),
            kind: ThreadKind::Contact,
            message_count: bucket.message_count,
            first_date_raw: bucket.first_date_raw,
            last_date_raw: bucket.last_date_raw,
            first_message_at: local_string(bucket.first_date_raw),
            last_message_at: local_string(bucket.last_date_raw),
        }
    }

    /// Builds a listing row from a group bucket.
    pub fn from_group(bucket: &GroupBucket, book: Option<&ContactBook>) -> Self {
        Self {
            id: format!("grp:{}", bucket.signature),
            name: bucket.display_name(book),
            kind: ThreadKind::Group,
            message_count: bucket.message_count,
            first_date_raw: bucket.first_date_raw,
            last_date_raw: bucket.last_date_raw,
            first_message_at: local_string(bucket.first_date_raw),
            last_message_at: local_string(bucket.last_date_raw),
        }
    }
}

fn local_string(raw: Option<i64>) -> Option<String> {
    raw.and_then(apple_to_local)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
}

fn min_opt(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (x, None) | (None, x) => x,
    }
}

fn max_opt(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (x, None) | (None, x) => x,
    }
}

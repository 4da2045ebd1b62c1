//! Per-conversation orchestration: raw rows in, render-ready messages out.
//!
//! The pipeline runs in a fixed order:
//!
//! 1. window-filter and normalize every row (timestamp, cleaned text)
//! 2. structured reaction correlation — needs only GUIDs, so it runs
//!    before any decoding
//! 3. decode `attributedBody` for rows still lacking text
//! 4. build the normalized-text index from decoded, cleaned text
//! 5. textual reaction correlation against that index
//! 6. emit visible, non-reaction rows in ascending timestamp order, each
//!    joined against the accumulated per-message reaction index
//!
//! Reactions accumulate in an index keyed by target row and are merged
//! once at emit time; message values themselves are built immutably in the
//! final pass. The whole thing is synchronous and single-threaded per
//! conversation; independent conversations can be assembled on separate
//! workers sharing one read-only [`IdentityIndex`](crate::identity::IdentityIndex).

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::{DateTime, Local};
use regex::Regex;
use tracing::debug;

use crate::config::ExportWindow;
use crate::decode::decode_attributed_body;
use crate::handle::resolve_author_name;
use crate::message::NormalizedMessage;
use crate::normalize::{
    apple_raw_to_seconds, apple_to_local, clean_text, day_label, is_visible, iso_label,
    normalize_match_text, time_human,
};
use crate::reaction::{
    ReactionEvent, merge_events, parse_reaction_text, strip_participant_prefix, tapback_emoji,
};
use crate::row::{Attachment, RawMessageRow};

fn payment_bundle_re() -> &'static Regex {
    static PAYMENT_BUNDLE_RE: OnceLock<Regex> = OnceLock::new();
    PAYMENT_BUNDLE_RE.get_or_init(|| {
        Regex::new(r"(?i)applepay|passkit|cash|payment").expect("valid payment bundle regex")
    })
}

fn apple_cash_re() -> &'static Regex {
    static APPLE_CASH_RE: OnceLock<Regex> = OnceLock::new();
    APPLE_CASH_RE.get_or_init(|| Regex::new(r"(?i)apple\s*cash").expect("valid apple cash regex"))
}

fn amount_re() -> &'static Regex {
    static AMOUNT_RE: OnceLock<Regex> = OnceLock::new();
    AMOUNT_RE.get_or_init(|| {
        Regex::new(r"\$\s*([0-9][0-9,]*(?:\.[0-9]{2})?)").expect("valid amount regex")
    })
}

/// Options for one conversation's assembly.
#[derive(Debug, Clone, Default)]
pub struct AssembleOptions {
    /// Whether this is a multi-party conversation; controls author-name
    /// resolution.
    pub is_group: bool,
    /// Lowercased handle -> display name, for group author labels.
    pub friendly_names: HashMap<String, String>,
    /// Optional date window; rows outside it are dropped up front.
    pub window: Option<ExportWindow>,
    /// Reference instant for `Today`/`Yesterday` labels. Defaults to the
    /// wall clock.
    pub reference_time: Option<DateTime<Local>>,
}

impl AssembleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to mark the conversation as a group.
    #[must_use]
    pub fn group(mut self, is_group: bool) -> Self {
        self.is_group = is_group;
        self
    }

    /// Builder method to set the friendly-name map.
    #[must_use]
    pub fn with_friendly_names(mut self, names: HashMap<String, String>) -> Self {
        self.friendly_names = names;
        self
    }

    /// Builder method to set a date window.
    #[must_use]
    pub fn with_window(mut self, window: ExportWindow) -> Self {
        self.window = Some(window);
        self
    }

    /// Builder method to pin the day-label reference time.
    #[must_use]
    pub fn with_reference_time(mut self, now: DateTime<Local>) -> Self {
        self.reference_time = Some(now);
        self
    }
}

/// Assembles one conversation's raw rows into render-ready messages.
pub struct MessageAssembler {
    options: AssembleOptions,
}

/// Per-row working state between pipeline passes.
struct Working {
    row: RawMessageRow,
    sent_at: Option<DateTime<Local>>,
    secs: Option<i64>,
    text: Option<String>,
    skip_render: bool,
}

impl MessageAssembler {
    /// Creates an assembler with default options.
    pub fn new() -> Self {
        Self {
            options: AssembleOptions::new(),
        }
    }

    /// Creates an assembler with the given options.
    pub fn with_options(options: AssembleOptions) -> Self {
        Self { options }
    }

    /// Returns the current options.
    pub fn options(&self) -> &AssembleOptions {
        &self.options
    }

    /// Runs the full pipeline for one conversation.
    ///
    /// `attachments` maps message ids to their attachment lists;
    /// `handles` maps `handle_id` values to raw handle strings. The result
    /// contains only visible, non-reaction rows, ordered by timestamp
    /// ascending, each carrying its merged reactions.
    pub fn assemble(
        &self,
        rows: Vec<RawMessageRow>,
        attachments: &HashMap<i64, Vec<Attachment>>,
        handles: &HashMap<i64, String>,
    ) -> Vec<NormalizedMessage> {
        let now = self.options.reference_time.unwrap_or_else(Local::now);

        let rows = match &self.options.window {
            Some(window) if !window.is_unbounded() => rows
                .into_iter()
                .filter(|r| window.admits(r.date_raw))
                .collect(),
            _ => rows,
        };

        // Pass 1: timestamps and raw-text cleanup.
        let mut working: Vec<Working> = rows
            .into_iter()
            .map(|row| Working {
                sent_at: row.date_raw.and_then(apple_to_local),
                secs: row.date_raw.map(apple_raw_to_seconds),
                text: row.text.as_deref().and_then(clean_text),
                skip_render: false,
                row,
            })
            .collect();

        // Pass 2: structured correlation on GUIDs, before any decoding.
        let mut structured: Vec<(String, ReactionEvent)> = Vec::new();
        for w in &mut working {
            if !w.row.has_association() || w.row.associated_message_type == 0 {
                continue;
            }
            let assoc = w.row.associated_message_guid.as_deref().unwrap_or_default();
            let target = strip_participant_prefix(assoc).to_string();
            let emoji = w
                .row
                .associated_message_emoji
                .as_deref()
                .filter(|e| !e.is_empty())
                .map(str::to_string)
                .or_else(|| tapback_emoji(w.row.associated_message_type).map(str::to_string));
            let Some(emoji) = emoji else {
                debug!(
                    kind = w.row.associated_message_type,
                    "association type has no emoji, row left renderable"
                );
                continue;
            };
            structured.push((target, ReactionEvent::new(emoji, w.row.is_from_me)));
            w.skip_render = true;
        }

        // Pass 3: decode attributedBody where plain text is absent.
        for w in &mut working {
            if w.text.is_some() {
                continue;
            }
            if let Some(blob) = &w.row.attributed_body {
                if let Some(decoded) = decode_attributed_body(blob) {
                    w.text = clean_text(&decoded);
                }
            }
        }

        // Reaction index: target row position -> contributing events.
        // Structured events land first, then textual ones.
        let guid_index: HashMap<String, usize> = {
            let mut index = HashMap::new();
            for (i, w) in working.iter().enumerate() {
                if !w.row.guid.is_empty() {
                    index.entry(w.row.guid.clone()).or_insert(i);
                }
            }
            index
        };
        let mut reactions: HashMap<usize, Vec<ReactionEvent>> = HashMap::new();
        for (target_guid, event) in structured {
            match guid_index.get(&target_guid) {
                Some(&i) => reactions.entry(i).or_default().push(event),
                None => debug!(%target_guid, "tapback target not in this conversation"),
            }
        }

        // Pass 4: normalized-text index over decoded, cleaned text.
        let mut text_index: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, w) in working.iter().enumerate() {
            if let Some(text) = &w.text {
                let norm = normalize_match_text(text);
                if !norm.is_empty() {
                    text_index.entry(norm).or_default().push(i);
                }
            }
        }

        // Pass 5: textual correlation for rows with no structured link.
        let mut textual: Vec<(usize, usize, ReactionEvent)> = Vec::new();
        for (i, w) in working.iter().enumerate() {
            if w.row.has_association() {
                continue;
            }
            let Some(text) = &w.text else { continue };
            let Some((emoji, quoted)) = parse_reaction_text(text) else {
                continue;
            };
            let norm = normalize_match_text(&quoted);
            let Some(candidates) = text_index.get(&norm).filter(|c| !c.is_empty()) else {
                debug!(row = w.row.message_id, "text reaction with no candidate target");
                continue;
            };
            let reaction_secs = w.secs.unwrap_or(i64::MIN);
            // Most recent candidate at or before the reaction; else the
            // first candidate, which can postdate the reaction — kept for
            // parity with observed exporter behavior.
            let target = candidates
                .iter()
                .copied()
                .filter(|&j| working[j].secs.unwrap_or(i64::MIN) <= reaction_secs)
                .max_by_key(|&j| working[j].secs.unwrap_or(i64::MIN))
                .or_else(|| candidates.first().copied());
            if let Some(j) = target {
                textual.push((i, j, ReactionEvent::new(emoji, w.row.is_from_me)));
            }
        }
        for (reaction_row, target, event) in textual {
            working[reaction_row].skip_render = true;
            reactions.entry(target).or_default().push(event);
        }

        // Pass 6: emit visible, non-reaction rows in timestamp order.
        let mut order: Vec<usize> = Vec::new();
        for (i, w) in working.iter().enumerate() {
            if w.skip_render {
                continue;
            }
            let visible_attachment_count = attachments
                .get(&w.row.message_id)
                .map_or(0, |atts| atts.iter().filter(|a| !a.is_hidden()).count());
            if !is_visible(&w.row, w.text.as_deref(), visible_attachment_count) {
                continue;
            }
            if w.sent_at.is_none() {
                debug!(row = w.row.message_id, "row without usable timestamp dropped");
                continue;
            }
            order.push(i);
        }
        order.sort_by_key(|&i| (working[i].secs, working[i].row.message_id));

        order
            .into_iter()
            .map(|i| self.emit(&working[i], reactions.get(&i), attachments, handles, &now))
            .collect()
    }

    fn emit(
        &self,
        w: &Working,
        events: Option<&Vec<ReactionEvent>>,
        attachments: &HashMap<i64, Vec<Attachment>>,
        handles: &HashMap<i64, String>,
        now: &DateTime<Local>,
    ) -> NormalizedMessage {
        let row = &w.row;
        let author_handle = row.handle_id.map(|id| {
            handles
                .get(&id)
                .cloned()
                .unwrap_or_else(|| format!("handle_{id}"))
        });
        let author_name = if self.options.is_group && !row.is_from_me {
            author_handle
                .as_deref()
                .map(|h| resolve_author_name(&self.options.friendly_names, h))
        } else {
            None
        };

        let visible_attachments: Vec<Attachment> = attachments
            .get(&row.message_id)
            .map(|atts| atts.iter().filter(|a| !a.is_hidden()).cloned().collect())
            .unwrap_or_default();

        let (is_payment, payment_amount) = payment_heuristic(row, w.text.as_deref());

        NormalizedMessage {
            message_id: row.message_id,
            guid: row.guid.clone(),
            is_from_me: row.is_from_me,
            author_handle,
            author_name,
            sent_at: w.sent_at,
            sent_at_iso: w.sent_at.as_ref().map(iso_label),
            sent_at_human: w.sent_at.as_ref().map(time_human),
            day_label: w.sent_at.as_ref().map(|dt| day_label(dt, now)),
            text: w.text.clone(),
            reactions: merge_events(events.map_or(&[][..], Vec::as_slice)),
            attachments: visible_attachments,
            is_payment,
            payment_amount,
            visible: true,
            skip_render: false,
        }
    }
}

impl Default for MessageAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Conservative payment detection: an Apple Pay-ish balloon bundle, or
/// text mentioning Apple Cash. A `$` amount is captured whenever the text
/// carries one.
fn payment_heuristic(row: &RawMessageRow, text: Option<&str>) -> (bool, Option<String>) {
    let mut is_payment = row
        .balloon_bundle_id
        .as_deref()
        .is_some_and(|b| payment_bundle_re().is_match(b));
    if !is_payment {
        is_payment = text.is_some_and(|t| apple_cash_re().is_match(t));
    }
    let amount = text
        .and_then(|t| amount_re().captures(t))
        .map(|caps| format!("${}", &caps[1]));
    (is_payment, amount)
}

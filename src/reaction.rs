//! Reaction correlation: tapbacks and legacy text reactions.
//!
//! Reactions reach the database two ways. iMessage tapbacks are structured:
//! a row with an `associated_message_guid` pointing at the target and a
//! type code in the 2000 range. SMS bridges instead deliver literal text —
//! `Loved "Let's go!"` or `Reacted 👍 to "on my way"` — with no structured
//! link at all, which has to be matched back to the quoted message by
//! normalized text.
//!
//! Both paths produce [`ReactionEvent`]s; [`merge_events`] collapses them
//! into per-emoji [`ReactionRecord`]s on the target message. The assembler
//! owns the orchestration; this module owns the per-row parsing and the
//! merge rule.

use std::sync::OnceLock;

use regex::Regex;

use crate::message::{ReactionRecord, Reactor};

/// Tapback type codes and their default emoji.
const TAPBACK_LIKE: i64 = 2000;
const TAPBACK_LOVE: i64 = 2001;
const TAPBACK_DISLIKE: i64 = 2002;
const TAPBACK_LAUGH: i64 = 2003;
const TAPBACK_EMPHASIZE: i64 = 2004;
const TAPBACK_QUESTION: i64 = 2005;
/// Custom-emoji tapbacks carry the emoji in a separate column.
const TAPBACK_CUSTOM: i64 = 2006;

/// One reaction event before merging, from either correlation strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEvent {
    pub emoji: String,
    pub from_me: bool,
}

impl ReactionEvent {
    pub fn new(emoji: impl Into<String>, from_me: bool) -> Self {
        Self {
            emoji: emoji.into(),
            from_me,
        }
    }
}

fn participant_prefix_re() -> &'static Regex {
    static PARTICIPANT_PREFIX_RE: OnceLock<Regex> = OnceLock::new();
    PARTICIPANT_PREFIX_RE
        .get_or_init(|| Regex::new(r"^p:\d+/").expect("valid participant prefix regex"))
}

fn verb_reaction_re() -> &'static Regex {
    static VERB_REACTION_RE: OnceLock<Regex> = OnceLock::new();
    VERB_REACTION_RE.get_or_init(|| {
        Regex::new(
            "(?i)^(Loved|Liked|Disliked|Laughed|Emphasized|Questioned)\\s+[\"\u{201C}\u{201D}](.+?)[\"\u{201C}\u{201D}]\\s*$",
        )
        .expect("valid verb reaction regex")
    })
}

fn generic_reaction_re() -> &'static Regex {
    static GENERIC_REACTION_RE: OnceLock<Regex> = OnceLock::new();
    GENERIC_REACTION_RE.get_or_init(|| {
        Regex::new("(?i)^Reacted\\s+(.+?)\\s+to\\s+[\"\u{201C}\u{201D}](.+?)[\"\u{201C}\u{201D}]\\s*$")
            .expect("valid generic reaction regex")
    })
}

/// Maps a tapback type code to its default emoji.
///
/// Codes outside the table — including custom-emoji tapbacks (2006), whose
/// emoji lives in its own column, and the 3000-range removal events — have
/// no default.
///
/// ```
/// assert_eq!(imsgkit::reaction::tapback_emoji(2001), Some("❤️"));
/// assert_eq!(imsgkit::reaction::tapback_emoji(3001), None);
/// ```
pub fn tapback_emoji(kind: i64) -> Option<&'static str> {
    match kind {
        TAPBACK_LIKE => Some("👍"),
        TAPBACK_LOVE => Some("❤️"),
        TAPBACK_DISLIKE => Some("👎"),
        TAPBACK_LAUGH => Some("😆"),
        TAPBACK_EMPHASIZE => Some("‼️"),
        TAPBACK_QUESTION => Some("❓"),
        TAPBACK_CUSTOM => None,
        _ => None,
    }
}

/// Strips the per-participant `p:<n>/` prefix from an associated-message
/// GUID, yielding the true target GUID.
pub fn strip_participant_prefix(guid: &str) -> &str {
    match participant_prefix_re().find(guid) {
        Some(m) => &guid[m.end()..],
        None => guid,
    }
}

/// Parses legacy SMS-style reaction text.
///
/// Two shapes are recognized, with straight or curly quotes:
///
/// - verb form: `Loved "Let's go!"` — the verb picks the emoji
/// - generic form: `Reacted 👍 to "on my way"`
///
/// Returns `(emoji, quoted target text)` on a match.
pub fn parse_reaction_text(text: &str) -> Option<(String, String)> {
    if let Some(caps) = verb_reaction_re().captures(text) {
        let emoji = match caps[1].to_lowercase().as_str() {
            "loved" => "❤️",
            "liked" => "👍",
            "disliked" => "👎",
            "laughed" => "😆",
            "emphasized" => "‼️",
            "questioned" => "❓",
            _ => return None,
        };
        return Some((emoji.to_string(), caps[2].to_string()));
    }

    generic_reaction_re()
        .captures(text)
        .map(|caps| (caps[1].trim().to_string(), caps[2].to_string()))
}

/// Merges raw reaction events into per-emoji records.
///
/// Events sharing an emoji collapse into one record whose count is the
/// number of contributors and whose reactor is [`Reactor::Them`] as soon
/// as any contributor is not the local user. First-seen emoji order is
/// preserved.
pub fn merge_events(events: &[ReactionEvent]) -> Vec<ReactionRecord> {
    let mut records: Vec<ReactionRecord> = Vec::new();
    for event in events {
        match records.iter_mut().find(|r| r.emoji == event.emoji) {
            Some(record) => {
                record.count += 1;
                if !event.from_me {
                    record.reactor = Reactor::Them;
                }
            }
            None => {
                let reactor = if event.from_me { Reactor::Me } else { Reactor::Them };
                records.push(ReactionRecord::new(event.emoji.clone(), reactor, 1));
            }
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tapback_emoji_table() {
        assert_eq!(tapback_emoji(2000), Some("👍"));
        assert_eq!(tapback_emoji(2001), Some("❤️"));
        assert_eq!(tapback_emoji(2002), Some("👎"));
        assert_eq!(tapback_emoji(2003), Some("😆"));
        assert_eq!(tapback_emoji(2004), Some("‼️"));
        assert_eq!(tapback_emoji(2005), Some("❓"));
        assert_eq!(tapback_emoji(2006), None);
        assert_eq!(tapback_emoji(0), None);
        assert_eq!(tapback_emoji(3000), None);
    }

    #[test]
    fn test_strip_participant_prefix() {
        assert_eq!(strip_participant_prefix("p:0/GUID-123"), "GUID-123");
        assert_eq!(strip_participant_prefix("p:12/GUID-123"), "GUID-123");
        assert_eq!(strip_participant_prefix("GUID-123"), "GUID-123");
        // Prefix only strips at the start.
        assert_eq!(strip_participant_prefix("X-p:0/GUID"), "X-p:0/GUID");
    }

    #[test]
    fn test_parse_verb_reactions() {
        let (emoji, quoted) = parse_reaction_text("Loved \"Let's go!\"").unwrap();
        assert_eq!(emoji, "❤️");
        assert_eq!(quoted, "Let's go!");

        let (emoji, _) = parse_reaction_text("liked \"ok\"").unwrap();
        assert_eq!(emoji, "👍");

        let (emoji, _) = parse_reaction_text("Questioned \"really?\"").unwrap();
        assert_eq!(emoji, "❓");
    }

    #[test]
    fn test_parse_verb_reaction_curly_quotes() {
        let (emoji, quoted) =
            parse_reaction_text("Emphasized \u{201C}see you at 8\u{201D}").unwrap();
        assert_eq!(emoji, "‼️");
        assert_eq!(quoted, "see you at 8");
    }

    #[test]
    fn test_parse_generic_reaction() {
        let (emoji, quoted) = parse_reaction_text("Reacted 🎉 to \"we won\"").unwrap();
        assert_eq!(emoji, "🎉");
        assert_eq!(quoted, "we won");
    }

    #[test]
    fn test_parse_rejects_ordinary_text() {
        assert_eq!(parse_reaction_text("I loved that movie"), None);
        assert_eq!(parse_reaction_text("Loved it"), None);
        assert_eq!(parse_reaction_text("Reacted badly"), None);
        // Trailing content after the quote is not a reaction.
        assert_eq!(parse_reaction_text("Loved \"x\" and more"), None);
    }

    #[test]
    fn test_merge_events_counts_and_reactor() {
        let events = vec![
            ReactionEvent::new("👍", true),
            ReactionEvent::new("👍", false),
            ReactionEvent::new("❤️", true),
        ];
        let records = merge_events(&events);
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].emoji, "👍");
        assert_eq!(records[0].count, 2);
        assert_eq!(records[0].reactor, Reactor::Them);

        assert_eq!(records[1].emoji, "❤️");
        assert_eq!(records[1].count, 1);
        assert_eq!(records[1].reactor, Reactor::Me);
    }

    #[test]
    fn test_merge_events_empty() {
        assert!(merge_events(&[]).is_empty());
    }

    #[test]
    fn test_merge_preserves_first_seen_order() {
        let events = vec![
            ReactionEvent::new("❓", false),
            ReactionEvent::new("😆", true),
            ReactionEvent::new("❓", true),
        ];
        let records = merge_events(&events);
        assert_eq!(records[0].emoji, "❓");
        assert_eq!(records[0].count, 2);
        assert_eq!(records[0].reactor, Reactor::Them);
        assert_eq!(records[1].emoji, "😆");
    }
}

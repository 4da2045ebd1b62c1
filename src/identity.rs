//! Identity resolution: mapping raw handles to canonical contact keys.
//!
//! Handles arrive in wildly inconsistent shapes — `+15551234567`,
//! `(555) 123-4567`, `alice@example.com`, `tel:+1-555-123-4567` — and the
//! address book stores its own formatting. The [`IdentityIndex`] bridges
//! the two with an exact-match index over normalized identifiers plus a
//! digit-suffix index that tolerates missing country and area codes.
//!
//! Resolution is a pure function of the handle and the loaded contact set:
//! the same handle always resolves to the same key within a run. Handles
//! that match nothing resolve to [`Resolution::Unmapped`], an explicit
//! sentinel that downstream coalescing treats as "do not merge".

use std::collections::HashMap;

use tracing::debug;

use crate::contacts::ContactBook;
use crate::handle;

/// Shortest digit suffix the index will match on.
const MIN_SUFFIX_DIGITS: usize = 7;

/// Most leading digits dropped when generating suffix variants.
const MAX_DROPPED_DIGITS: usize = 3;

/// Outcome of resolving one raw handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The handle maps to this canonical contact key.
    Contact(String),
    /// No contact claims this handle.
    Unmapped,
}

impl Resolution {
    /// The resolved key, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            Resolution::Contact(key) => Some(key),
            Resolution::Unmapped => None,
        }
    }

    /// Returns `true` when no contact claimed the handle.
    pub fn is_unmapped(&self) -> bool {
        matches!(self, Resolution::Unmapped)
    }
}

/// Lookup structures mapping raw handles to canonical contact keys.
///
/// Built once per run from the [`ContactBook`]; read-only and cheaply
/// shareable across worker threads afterward.
///
/// # Example
///
/// ```
/// use imsgkit::contacts::{Contact, ContactBook};
/// use imsgkit::identity::IdentityIndex;
///
/// let mut book = ContactBook::new();
/// book.push(Contact::new("ab:1", "Alice").with_phone("+1 (555) 123-4567"));
///
/// let index = IdentityIndex::build(&book);
/// // Full number and bare 10-digit national form agree.
/// assert_eq!(index.resolve("+15551234567", None).key(), Some("ab:1"));
/// assert_eq!(index.resolve("5551234567", None).key(), Some("ab:1"));
/// assert!(index.resolve("+19998887777", None).is_unmapped());
/// ```
#[derive(Debug, Clone, Default)]
pub struct IdentityIndex {
    /// Normalized identifier string -> contact key.
    exact: HashMap<String, String>,
    /// Digit sequence (full and suffix variants) -> contact key.
    digits: HashMap<String, String>,
}

impl IdentityIndex {
    /// Builds the index from a contact book.
    ///
    /// Every insert is first-write-wins, and contacts are visited in
    /// insertion order, so construction is deterministic: when two contacts
    /// share an identifier the earlier one keeps it.
    pub fn build(book: &ContactBook) -> Self {
        let mut index = Self::default();

        for contact in book.iter() {
            let key = &contact.key;

            for email in &contact.emails {
                index.insert_exact(email.to_lowercase(), key);
            }

            let mut phone_like: Vec<String> = contact.phones.clone();
            for id in &contact.messaging_ids {
                let id = id.trim();
                if id.is_empty() {
                    continue;
                }
                if let Some(rest) = strip_tel_scheme(id) {
                    phone_like.push(rest.to_string());
                } else if handle::is_phone_like(id) {
                    phone_like.push(id.to_string());
                } else {
                    index.insert_exact(id.to_lowercase(), key);
                }
            }

            for phone in &phone_like {
                index.insert_exact(phone.to_lowercase(), key);
                let d = handle::digits(phone);
                if d.is_empty() {
                    continue;
                }
                for variant in digit_variants(&d) {
                    index.insert_digits(variant.to_string(), key);
                }
            }
        }

        debug!(
            exact = index.exact.len(),
            digits = index.digits.len(),
            "identity index built"
        );
        index
    }

    /// Resolves a raw handle to a canonical contact key.
    ///
    /// Matchers run in a fixed, documented order; the first success wins:
    ///
    /// 1. exact index on the lowercased handle
    /// 2. digit index on the handle's digit sequence: verbatim, then with
    ///    1–3 leading digits dropped (never below 7 remaining), then the
    ///    last 10 digits
    /// 3. the same digit matchers over the uncanonicalized companion
    ///    string, when one is present
    pub fn resolve(&self, raw: &str, uncanonicalized: Option<&str>) -> Resolution {
        if let Some(key) = self.exact.get(&raw.to_lowercase()) {
            return Resolution::Contact(key.clone());
        }

        let primary = handle::digits(raw);
        let secondary = uncanonicalized.map(handle::digits).unwrap_or_default();
        for d in [primary, secondary] {
            if d.is_empty() {
                continue;
            }
            for variant in digit_variants(&d) {
                if let Some(key) = self.digits.get(variant) {
                    return Resolution::Contact(key.clone());
                }
            }
        }

        Resolution::Unmapped
    }

    /// Builds a lowercased `handle -> display name` map for a
    /// conversation's participant handles, for author labeling.
    ///
    /// Handles that resolve to no contact are simply absent from the map;
    /// the assembler then falls back to pretty-printing the handle.
    pub fn friendly_names<'a, I>(&self, handles: I, book: &ContactBook) -> HashMap<String, String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut map = HashMap::new();
        for raw in handles {
            if let Resolution::Contact(key) = self.resolve(raw, None) {
                if let Some(contact) = book.get(&key) {
                    map.entry(raw.to_lowercase())
                        .or_insert_with(|| contact.display_name().to_string());
                }
            }
        }
        map
    }

    /// Number of exact-index entries.
    pub fn exact_len(&self) -> usize {
        self.exact.len()
    }

    /// Number of digit-index entries.
    pub fn digits_len(&self) -> usize {
        self.digits.len()
    }

    fn insert_exact(&mut self, id: String, key: &str) {
        self.exact.entry(id).or_insert_with(|| key.to_string());
    }

    fn insert_digits(&mut self, d: String, key: &str) {
        self.digits.entry(d).or_insert_with(|| key.to_string());
    }
}

/// The ordered digit-sequence variants tried for a number: verbatim,
/// drop-1..3-leading-digits (keeping at least [`MIN_SUFFIX_DIGITS`]), then
/// the 10-digit tail.
fn digit_variants(d: &str) -> Vec<&str> {
    let mut variants = vec![d];
    for drop in 1..=MAX_DROPPED_DIGITS {
        if d.len().saturating_sub(drop) >= MIN_SUFFIX_DIGITS {
            variants.push(&d[drop..]);
        }
    }
    if d.len() >= 10 {
        variants.push(&d[d.len() - 10..]);
    }
    variants
}

/// Strips a `tel:` URI scheme, case-insensitively.
fn strip_tel_scheme(id: &str) -> Option<&str> {
    if id.len() >= 4 && id[..4].eq_ignore_ascii_case("tel:") {
        Some(&id[4..])
    } else {
        None
    }
}

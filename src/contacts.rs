//! Contact model and contact sources.
//!
//! A [`Contact`] is one human: a canonical key, a display name, and the
//! sets of emails, phone numbers, and messaging IDs the address book knows
//! for them. A [`ContactBook`] holds the full set, loaded once per export
//! run and read-only afterward.
//!
//! The book can be populated programmatically (e.g. from rows a caller
//! pulled out of an address-book database) or from a vCard file via
//! [`ContactBook::from_vcard`]. The vCard reader is intentionally small and
//! lenient: it understands `FN`, `EMAIL`, and `TEL` and skips anything it
//! doesn't recognize.
//!
//! # Example
//!
//! ```
//! use imsgkit::contacts::ContactBook;
//!
//! let vcf = "BEGIN:VCARD\nFN:Alice Smith\nEMAIL:alice@example.com\nTEL:+1 (555) 123-4567\nEND:VCARD\n";
//! let book = ContactBook::from_vcard(vcf);
//! assert_eq!(book.len(), 1);
//! let alice = book.iter().next().unwrap();
//! assert_eq!(alice.name, "Alice Smith");
//! assert_eq!(alice.phones, vec!["+5551234567"]);
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ImsgkitError, Result};
use crate::handle;

/// One address-book contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Canonical key this identity resolves to. Stable across runs.
    pub key: String,
    /// Display name; may be empty when the source had none.
    pub name: String,
    /// Email addresses, lowercased.
    pub emails: Vec<String>,
    /// Phone numbers in `+digits` form.
    pub phones: Vec<String>,
    /// Messaging-service IDs (may be emails, `tel:` URIs, or opaque).
    pub messaging_ids: Vec<String>,
}

impl Contact {
    /// Creates a contact with no identifiers.
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            emails: Vec::new(),
            phones: Vec::new(),
            messaging_ids: Vec::new(),
        }
    }

    /// Adds an email address (stored lowercased).
    pub fn add_email(&mut self, email: &str) {
        let email = email.trim().to_lowercase();
        if !email.is_empty() && !self.emails.contains(&email) {
            self.emails.push(email);
        }
    }

    /// Adds a phone number (stored as `+digits`).
    pub fn add_phone(&mut self, phone: &str) {
        if let Some(normalized) = normalize_phone(phone) {
            if !self.phones.contains(&normalized) {
                self.phones.push(normalized);
            }
        }
    }

    /// Adds a messaging-service ID verbatim.
    pub fn add_messaging_id(&mut self, id: &str) {
        let id = id.trim().to_string();
        if !id.is_empty() && !self.messaging_ids.contains(&id) {
            self.messaging_ids.push(id);
        }
    }

    /// Builder form of [`add_email`](Self::add_email).
    #[must_use]
    pub fn with_email(mut self, email: impl AsRef<str>) -> Self {
        self.add_email(email.as_ref());
        self
    }

    /// Builder form of [`add_phone`](Self::add_phone).
    #[must_use]
    pub fn with_phone(mut self, phone: impl AsRef<str>) -> Self {
        self.add_phone(phone.as_ref());
        self
    }

    /// Builder form of [`add_messaging_id`](Self::add_messaging_id).
    #[must_use]
    pub fn with_messaging_id(mut self, id: impl AsRef<str>) -> Self {
        self.add_messaging_id(id.as_ref());
        self
    }

    /// Name for display: the explicit name, else the first email, else the
    /// first phone, else the canonical key.
    pub fn display_name(&self) -> &str {
        if !self.name.trim().is_empty() {
            &self.name
        } else if let Some(email) = self.emails.first() {
            email
        } else if let Some(phone) = self.phones.first() {
            phone
        } else {
            &self.key
        }
    }
}

/// The full contact set for one export run.
///
/// Iteration order is insertion order, which keeps every derived structure
/// (identity indexes, friendly-name maps) deterministic.
#[derive(Debug, Clone, Default)]
pub struct ContactBook {
    contacts: Vec<Contact>,
    by_key: HashMap<String, usize>,
}

impl ContactBook {
    /// Creates an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a contact. On a duplicate canonical key the first entry wins
    /// and the new one is dropped.
    pub fn push(&mut self, contact: Contact) {
        if self.by_key.contains_key(&contact.key) {
            debug!(key = %contact.key, "duplicate contact key ignored");
            return;
        }
        self.by_key.insert(contact.key.clone(), self.contacts.len());
        self.contacts.push(contact);
    }

    /// Looks a contact up by canonical key.
    pub fn get(&self, key: &str) -> Option<&Contact> {
        self.by_key.get(key).map(|&i| &self.contacts[i])
    }

    /// Iterates contacts in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Contact> {
        self.contacts.iter()
    }

    /// Number of contacts.
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    /// Returns `true` when the book holds no contacts.
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// Parses vCard text into a book.
    ///
    /// Recognized lines: `BEGIN:VCARD`, `FN`, `EMAIL`, `TEL`, `END:VCARD`.
    /// Contacts get synthetic keys `vc:<n>` in input order. A card without
    /// an `FN` uses its first identifier as the name. Malformed lines are
    /// skipped.
    pub fn from_vcard(text: &str) -> Self {
        let mut book = Self::new();
        let mut current: Option<Contact> = None;
        let mut counter = 0usize;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let upper = line.to_uppercase();
            if upper.starts_with("BEGIN:VCARD") {
                current = Some(Contact::new(format!("vc:{counter}"), ""));
                counter += 1;
            } else if upper.starts_with("END:VCARD") {
                if let Some(mut contact) = current.take() {
                    if contact.emails.is_empty()
                        && contact.phones.is_empty()
                        && contact.messaging_ids.is_empty()
                    {
                        debug!(key = %contact.key, "vCard record with no identifiers skipped");
                        continue;
                    }
                    if contact.name.is_empty() {
                        contact.name = contact.display_name().to_string();
                    }
                    book.push(contact);
                }
            } else if let Some(contact) = current.as_mut() {
                if let Some(value) = vcard_field(line, "FN") {
                    contact.name = unescape_vcard_value(value);
                } else if let Some(value) = vcard_field(line, "EMAIL") {
                    contact.add_email(value);
                } else if let Some(value) = vcard_field(line, "TEL") {
                    contact.add_phone(value);
                }
            }
        }

        book
    }

    /// Loads a vCard file.
    ///
    /// Returns an error when the file cannot be read or contains no vCard
    /// records at all; individual malformed lines are skipped.
    pub fn from_vcard_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        if !text.to_uppercase().contains("BEGIN:VCARD") {
            return Err(ImsgkitError::contact_source(
                "no vCard records found",
                Some(path.to_path_buf()),
            ));
        }
        Ok(Self::from_vcard(&text))
    }

}

/// Extracts the value of a vCard content line for a property, tolerating
/// parameters: `EMAIL;TYPE=HOME:a@b.com` and `FN:Alice` both match.
fn vcard_field<'a>(line: &'a str, property: &str) -> Option<&'a str> {
    let upper = line.to_uppercase();
    if !upper.starts_with(property) {
        return None;
    }
    let rest = &line[property.len()..];
    // Property name must end right at a parameter or value delimiter
    // (rejects FNORD: for FN).
    if !rest.starts_with(':') && !rest.starts_with(';') {
        return None;
    }
    let value = &rest[rest.find(':')?..][1..];
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

/// Undoes the common vCard text escapes.
fn unescape_vcard_value(value: &str) -> String {
    value.replace("\\n", " ").replace("\\,", ",").trim().to_string()
}

/// Normalizes a phone string to `+digits`, dropping a leading national `1`
/// from 11-digit numbers. Returns `None` when no digits remain.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let mut d = handle::digits(raw);
    if d.is_empty() {
        return None;
    }
    if d.len() == 11 && d.starts_with('1') {
        d.remove(0);
    }
    Some(format!("+{d}"))
}

//! # Imsgkit
//!
//! A Rust library that reconstructs clean, render-ready conversations from
//! raw iMessage database rows.
//!
//! ## Overview
//!
//! The iMessage store is hostile to exporters in three specific ways, and
//! imsgkit exists to absorb all three:
//!
//! - **Opaque text** — modern rows keep their content in serialized
//!   `NSAttributedString` blobs instead of the plain `text` column. The
//!   [`decode`] module recovers text with a layered chain of strategies,
//!   from exact typedstream parsing down to heuristic salvage.
//! - **Unstable identities** — the same human appears as `+15551234567`,
//!   `(555) 123-4567`, and `alice@example.com` across rows. The
//!   [`identity`] and [`group`] modules resolve handles to canonical
//!   contact keys and recognize "the same people" across distinct chat
//!   records via order-independent participant signatures.
//! - **Scattered reactions** — tapbacks arrive as separate rows pointing
//!   at their target by GUID, and SMS bridges downgrade them to literal
//!   text like `Loved "see you soon"`. The [`reaction`] and [`assembler`]
//!   modules correlate both shapes back to the exact target message and
//!   merge them into per-emoji counts.
//!
//! The engine is a pure in-memory transformation: callers fetch rows and
//! contacts however they like, and rendering the resulting records is
//! someone else's job.
//!
//! ## Quick Start
//!
//! ```rust
//! use imsgkit::prelude::*;
//!
//! let rows = vec![
//!     RawMessageRow::new(1, "GUID-1").with_text("See you soon!").with_date_raw(700_000_000),
//!     RawMessageRow::new(2, "GUID-2")
//!         .with_date_raw(700_000_060)
//!         .with_association("GUID-1", 2001),
//! ];
//!
//! let messages = MessageAssembler::new()
//!     .assemble(rows, &Default::default(), &Default::default());
//!
//! assert_eq!(messages.len(), 1);
//! assert_eq!(messages[0].reactions[0].emoji, "❤️");
//! ```
//!
//! ## Module Structure
//!
//! - [`assembler`] — per-conversation pipeline ([`MessageAssembler`],
//!   [`AssembleOptions`](assembler::AssembleOptions))
//! - [`decode`] — attributedBody text recovery
//! - [`identity`] — handle → contact resolution ([`IdentityIndex`])
//! - [`group`] — participant signatures and conversation coalescing
//! - [`contacts`] — [`Contact`]/[`ContactBook`] model and vCard loading
//! - [`normalize`] — timestamps, text cleaning, visibility
//! - [`reaction`] — tapback tables and reaction-text parsing
//! - [`row`] / [`message`] — raw input and render-ready output types
//! - [`config`] — export windows and listing options
//! - [`handle`] — handle classification and display helpers
//! - [`error`] — unified error type ([`ImsgkitError`], [`Result`])
//!
//! ## Concurrency
//!
//! Assembly is synchronous and single-threaded per conversation. For bulk
//! exports, build the [`IdentityIndex`] once, share it read-only, and
//! assemble independent conversations on separate workers.

pub mod assembler;
pub mod config;
pub mod contacts;
pub mod decode;
pub mod error;
pub mod group;
pub mod handle;
pub mod identity;
pub mod message;
pub mod normalize;
pub mod reaction;
pub mod row;

// Re-export the main types at the crate root for convenience
pub use assembler::MessageAssembler;
pub use contacts::{Contact, ContactBook};
pub use error::{ImsgkitError, Result};
pub use identity::IdentityIndex;
pub use message::NormalizedMessage;
pub use row::RawMessageRow;

/// Convenient re-exports for common usage.
///
/// Import everything you need with a single line:
///
/// ```rust
/// use imsgkit::prelude::*;
/// ```
pub mod prelude {
    // Core flow: rows in, messages out
    pub use crate::assembler::{AssembleOptions, MessageAssembler};
    pub use crate::message::{NormalizedMessage, ReactionRecord, Reactor};
    pub use crate::row::{Attachment, AttachmentKind, RawMessageRow};

    // Identity and coalescing
    pub use crate::contacts::{Contact, ContactBook};
    pub use crate::group::{
        ChatSummary, ContactBucket, GroupBucket, ParticipantHandle, ThreadKind, ThreadListing,
    };
    pub use crate::identity::{IdentityIndex, Resolution};

    // Configuration
    pub use crate::config::{ExportWindow, ListOptions, SortKey, SortOrder};

    // Decoding
    pub use crate::decode::decode_attributed_body;

    // Error types
    pub use crate::error::{ImsgkitError, Result};
}

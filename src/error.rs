//! Unified error types for imsgkit.
//!
//! This module provides a single [`ImsgkitError`] enum that covers all error
//! cases in the library. The fallible surface is deliberately small: the
//! reconstruction engine itself degrades softly (decode failures become
//! "no text", unresolvable handles become an explicit unmapped sentinel),
//! so errors only arise at the edges — loading a contact source from disk
//! and parsing user-supplied date bounds.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A specialized [`Result`] type for imsgkit operations.
///
/// # Example
///
/// ```rust
/// use imsgkit::error::Result;
/// use imsgkit::contacts::ContactBook;
///
/// fn my_function() -> Result<ContactBook> {
///     // ... operations that may fail
///     Ok(ContactBook::new())
/// }
/// ```
pub type Result<T> = std::result::Result<T, ImsgkitError>;

/// The error type for all imsgkit operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ImsgkitError {
    /// An I/O error occurred.
    ///
    /// This typically happens when a contact source file doesn't exist or
    /// cannot be read.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A contact source could not be used.
    ///
    /// Malformed vCard *lines* are skipped silently; this error is reserved
    /// for sources that are unusable as a whole (e.g. an empty file where
    /// contacts were required).
    #[error("Unusable contact source{}: {message}", path.as_ref().map(|p| format!(" (file: {})", p.display())).unwrap_or_default())]
    ContactSource {
        /// The source path, if available
        path: Option<PathBuf>,
        /// Description of what's wrong
        message: String,
    },

    /// Invalid date bound in an export window.
    ///
    /// Date bounds accept RFC 3339 timestamps or plain YYYY-MM-DD dates.
    #[error("Invalid date '{input}'. Expected format: {expected}")]
    InvalidDate {
        /// The invalid date string that was provided
        input: String,
        /// Expected format description
        expected: &'static str,
    },
}

// ============================================================================
// Convenience constructors
// ============================================================================

impl ImsgkitError {
    /// Creates a contact source error.
    pub fn contact_source(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        ImsgkitError::ContactSource {
            path,
            message: message.into(),
        }
    }

    /// Creates an invalid date error.
    pub fn invalid_date(input: impl Into<String>) -> Self {
        ImsgkitError::InvalidDate {
            input: input.into(),
            expected: "RFC 3339 or YYYY-MM-DD",
        }
    }

    /// Returns `true` if this is an IO error.
    pub fn is_io(&self) -> bool {
        matches!(self, ImsgkitError::Io(_))
    }

    /// Returns `true` if this is a contact source error.
    pub fn is_contact_source(&self) -> bool {
        matches!(self, ImsgkitError::ContactSource { .. })
    }

    /// Returns `true` if this is a date-related error.
    pub fn is_invalid_date(&self) -> bool {
        matches!(self, ImsgkitError::InvalidDate { .. })
    }
}

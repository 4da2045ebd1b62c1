//! Export configuration types.
//!
//! Two small builder structs, no CLI framework attached:
//!
//! - [`ExportWindow`] bounds an export by date. Bounds accept RFC 3339
//!   timestamps or plain `YYYY-MM-DD` dates (interpreted as local
//!   midnight) and are compared against raw Apple-epoch values, so both
//!   second- and nanosecond-scale rows filter correctly.
//! - [`ListOptions`] sorts, window-filters, and caps conversation
//!   listings.
//!
//! # Example
//!
//! ```
//! use imsgkit::config::ExportWindow;
//!
//! let window = ExportWindow::new().with_from_str("2024-01-01")?;
//! assert!(!window.is_unbounded());
//! # Ok::<(), imsgkit::ImsgkitError>(())
//! ```

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ImsgkitError, Result};
use crate::group::ThreadListing;
use crate::normalize::{apple_from_datetime, apple_raw_to_seconds};

/// A half-open-ended date window over an export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportWindow {
    /// Inclusive lower bound.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound.
    pub to: Option<DateTime<Utc>>,
}

impl ExportWindow {
    /// Creates an unbounded window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the lower bound.
    #[must_use]
    pub fn with_from(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    /// Builder method to set the upper bound.
    #[must_use]
    pub fn with_to(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    /// Builder method to parse the lower bound from a string.
    pub fn with_from_str(mut self, input: &str) -> Result<Self> {
        self.from = Some(parse_date_flexible(input)?);
        Ok(self)
    }

    /// Builder method to parse the upper bound from a string.
    pub fn with_to_str(mut self, input: &str) -> Result<Self> {
        self.to = Some(parse_date_flexible(input)?);
        Ok(self)
    }

    /// Returns `true` when no bound is set.
    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    /// Whether a raw Apple-epoch timestamp falls inside the window.
    /// Bounds are inclusive.
    pub fn contains_raw(&self, raw: i64) -> bool {
        let secs = apple_raw_to_seconds(raw);
        if let Some(from) = &self.from {
            if secs < apple_from_datetime(from) {
                return false;
            }
        }
        if let Some(to) = &self.to {
            if secs > apple_from_datetime(to) {
                return false;
            }
        }
        true
    }

    /// Window check for optional timestamps: rows without one only pass an
    /// unbounded window.
    pub fn admits(&self, raw: Option<i64>) -> bool {
        match raw {
            Some(raw) => self.contains_raw(raw),
            None => self.is_unbounded(),
        }
    }
}

/// Parses an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (local
/// midnight).
pub fn parse_date_flexible(input: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            if let Some(local) = Local.from_local_datetime(&naive).single() {
                return Ok(local.with_timezone(&Utc));
            }
        }
    }
    Err(ImsgkitError::invalid_date(input))
}

/// Sort key for conversation listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Most recent activity (the default).
    #[default]
    LastActivity,
    /// Case-insensitive name, ties broken by message count.
    Name,
    /// Message count, ties broken by name.
    MessageCount,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Sorting, filtering, and capping for conversation listings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOptions {
    pub sort: SortKey,
    pub order: SortOrder,
    pub limit: Option<usize>,
    pub window: Option<ExportWindow>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the sort key.
    #[must_use]
    pub fn with_sort(mut self, sort: SortKey) -> Self {
        self.sort = sort;
        self
    }

    /// Builder method to set the sort direction.
    #[must_use]
    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    /// Builder method to cap the number of rows.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Builder method to drop rows whose last activity is outside a
    /// window.
    #[must_use]
    pub fn with_window(mut self, window: ExportWindow) -> Self {
        self.window = Some(window);
        self
    }

    /// Applies sorting, window filtering, and the row cap in place.
    pub fn apply(&self, rows: &mut Vec<ThreadListing>) {
        match self.sort {
            SortKey::Name => rows.sort_by(|a, b| {
                (a.name.to_lowercase(), std::cmp::Reverse(a.message_count))
                    .cmp(&(b.name.to_lowercase(), std::cmp::Reverse(b.message_count)))
            }),
            SortKey::MessageCount => rows.sort_by(|a, b| {
                (a.message_count, a.name.to_lowercase())
                    .cmp(&(b.message_count, b.name.to_lowercase()))
            }),
            SortKey::LastActivity => rows.sort_by_key(|r| r.last_date_raw.unwrap_or(i64::MIN)),
        }
        if self.order == SortOrder::Desc {
            rows.reverse();
        }
        if let Some(window) = &self.window {
            if !window.is_unbounded() {
                rows.retain(|r| r.last_date_raw.is_some_and(|raw| window.contains_raw(raw)));
            }
        }
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::ThreadKind;

    fn listing(name: &str, count: u64, last: Option<i64>) -> ThreadListing {
        ThreadListing {
            id: format!("t:{name}"),
            name: name.to_string(),
            kind: ThreadKind::Contact,
            message_count: count,
            first_date_raw: None,
            last_date_raw: last,
            first_message_at: None,
            last_message_at: None,
        }
    }

    #[test]
    fn test_parse_date_flexible() {
        assert!(parse_date_flexible("2024-01-15").is_ok());
        assert!(parse_date_flexible("2024-01-15T10:30:00Z").is_ok());
        assert!(parse_date_flexible("2024-01-15T10:30:00+02:00").is_ok());

        let err = parse_date_flexible("January 15").unwrap_err();
        assert!(err.is_invalid_date());
    }

    #[test]
    fn test_window_contains_raw() {
        let from = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let window = ExportWindow::new().with_from(from).with_to(to);

        let inside = apple_from_datetime(&Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap());
        let before = apple_from_datetime(&Utc.with_ymd_and_hms(2022, 6, 1, 0, 0, 0).unwrap());
        let after = apple_from_datetime(&Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());

        assert!(window.contains_raw(inside));
        assert!(!window.contains_raw(before));
        assert!(!window.contains_raw(after));

        // Inclusive boundaries.
        assert!(window.contains_raw(apple_from_datetime(&from)));
        assert!(window.contains_raw(apple_from_datetime(&to)));

        // Nanosecond-scale values filter identically.
        assert!(window.contains_raw(inside * 1_000_000_000));
    }

    #[test]
    fn test_window_admits_missing_timestamps() {
        assert!(ExportWindow::new().admits(None));
        let bounded = ExportWindow::new()
            .with_from(Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap());
        assert!(!bounded.admits(None));
    }

    #[test]
    fn test_sort_last_activity_desc_default() {
        let mut rows = vec![
            listing("a", 1, Some(100)),
            listing("b", 2, Some(300)),
            listing("c", 3, None),
        ];
        ListOptions::new().apply(&mut rows);
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_sort_by_name_asc() {
        let mut rows = vec![
            listing("Zoe", 1, None),
            listing("amy", 2, None),
            listing("Bob", 3, None),
        ];
        ListOptions::new()
            .with_sort(SortKey::Name)
            .with_order(SortOrder::Asc)
            .apply(&mut rows);
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["amy", "Bob", "Zoe"]);
    }

    #[test]
    fn test_sort_by_message_count_desc() {
        let mut rows = vec![
            listing("a", 5, None),
            listing("b", 20, None),
            listing("c", 1, None),
        ];
        ListOptions::new()
            .with_sort(SortKey::MessageCount)
            .apply(&mut rows);
        let counts: Vec<u64> = rows.iter().map(|r| r.message_count).collect();
        assert_eq!(counts, vec![20, 5, 1]);
    }

    #[test]
    fn test_limit_and_window() {
        let from = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let cutoff = apple_from_datetime(&from);
        let mut rows = vec![
            listing("old", 1, Some(cutoff - 100)),
            listing("new1", 2, Some(cutoff + 100)),
            listing("new2", 3, Some(cutoff + 200)),
        ];
        ListOptions::new()
            .with_window(ExportWindow::new().with_from(from))
            .with_limit(1)
            .apply(&mut rows);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "new2");
    }
}

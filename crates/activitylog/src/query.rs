//! Listing, filtering, and sorting of activity log entries.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt::{self, Write};
use std::str::FromStr;

use anyhow::bail;
use chrono::NaiveDate;

use crate::models::{AuditEntry, EventKind, SubjectRef};

/// Column entries can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortColumn {
    #[default]
    CreatedAt,
    Id,
    Event,
    LogName,
}

impl FromStr for SortColumn {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "created_at" => Ok(SortColumn::CreatedAt),
            "id" => Ok(SortColumn::Id),
            "event" => Ok(SortColumn::Event),
            "log_name" => Ok(SortColumn::LogName),
            other => bail!("unknown sort column '{other}'"),
        }
    }
}

impl fmt::Display for SortColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortColumn::CreatedAt => write!(f, "created_at"),
            SortColumn::Id => write!(f, "id"),
            SortColumn::Event => write!(f, "event"),
            SortColumn::LogName => write!(f, "log_name"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortDirection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => bail!("unknown sort direction '{other}'"),
        }
    }
}

/// Filters and ordering for listing entries.
///
/// Date bounds are inclusive and compare against the calendar date of
/// `created_at` in UTC.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityQuery {
    pub created_from: Option<NaiveDate>,
    pub created_until: Option<NaiveDate>,
    pub event: Option<EventKind>,
    pub log_name: Option<String>,
    pub subject: Option<SubjectRef>,
    pub sort: SortColumn,
    pub direction: SortDirection,
}

impl ActivityQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created_from(mut self, date: NaiveDate) -> Self {
        self.created_from = Some(date);
        self
    }

    pub fn created_until(mut self, date: NaiveDate) -> Self {
        self.created_until = Some(date);
        self
    }

    pub fn event(mut self, event: EventKind) -> Self {
        self.event = Some(event);
        self
    }

    pub fn log_name(mut self, log_name: impl Into<String>) -> Self {
        self.log_name = Some(log_name.into());
        self
    }

    pub fn subject(mut self, subject: SubjectRef) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn sorted_by(mut self, sort: SortColumn, direction: SortDirection) -> Self {
        self.sort = sort;
        self.direction = direction;
        self
    }

    /// Whether `entry` passes every filter.
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        let date = entry.created_at.date_naive();

        if self.created_from.is_some_and(|from| date < from) {
            return false;
        }
        if self.created_until.is_some_and(|until| date > until) {
            return false;
        }
        if self.event.as_ref().is_some_and(|event| &entry.event != event) {
            return false;
        }
        if let Some(log_name) = &self.log_name
            && entry.log_name.as_deref() != Some(log_name.as_str())
        {
            return false;
        }
        match &self.subject {
            Some(subject) => entry.subject.as_ref() == Some(subject),
            None => true,
        }
    }

    /// Filter and sort `entries`. Ties are broken by id so the order is
    /// stable across calls.
    pub fn apply(&self, entries: Vec<AuditEntry>) -> Vec<AuditEntry> {
        let mut matched: Vec<_> = entries.into_iter().filter(|e| self.matches(e)).collect();
        matched.sort_by(|a, b| {
            let ordering = self.compare(a, b).then_with(|| a.id.cmp(&b.id));
            match self.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });
        matched
    }

    fn compare(&self, a: &AuditEntry, b: &AuditEntry) -> Ordering {
        match self.sort {
            SortColumn::CreatedAt => a.created_at.cmp(&b.created_at),
            SortColumn::Id => a.id.cmp(&b.id),
            SortColumn::Event => a.event.as_str().cmp(b.event.as_str()),
            SortColumn::LogName => a.log_name.cmp(&b.log_name),
        }
    }

    /// Active date filters as `(key, label)` pairs, formatted with
    /// `date_format`.
    pub fn filter_indicators(&self, date_format: &str) -> Vec<(&'static str, String)> {
        let mut indicators = Vec::new();
        if let Some(from) = self.created_from {
            indicators.push((
                "created_from",
                format!("Created from {}", format_date(from, date_format)),
            ));
        }
        if let Some(until) = self.created_until {
            indicators.push((
                "created_until",
                format!("Created until {}", format_date(until, date_format)),
            ));
        }
        indicators
    }
}

/// ISO date when `format` cannot be rendered.
fn format_date(date: NaiveDate, format: &str) -> String {
    let mut out = String::new();
    match write!(out, "{}", date.format(format)) {
        Ok(()) => out,
        Err(_) => date.to_string(),
    }
}

/// Distinct event kinds present in `entries`, for the event filter.
pub fn distinct_events(entries: &[AuditEntry]) -> Vec<EventKind> {
    entries
        .iter()
        .map(|e| e.event.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Distinct non-empty log names present in `entries`.
pub fn distinct_log_names(entries: &[AuditEntry]) -> Vec<String> {
    entries
        .iter()
        .filter_map(|e| e.log_name.as_deref())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Navigation badge text: the entry count with thousands separators, or
/// nothing when the badge is turned off.
pub fn navigation_badge(count: usize, enabled: bool) -> Option<String> {
    if !enabled {
        return None;
    }

    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    Some(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::{AuditEntryDraft, EntryId};
    use chrono::{TimeZone, Utc};

    fn entry(id: EntryId, event: EventKind, log_name: &str, day: u32) -> AuditEntry {
        AuditEntryDraft::new(event)
            .log_name(log_name)
            .performed_on(SubjectRef::new("Post", id.to_string()))
            .into_entry(id, Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap())
    }

    fn sample() -> Vec<AuditEntry> {
        vec![
            entry(1, EventKind::Created, "default", 1),
            entry(2, EventKind::Updated, "billing", 2),
            entry(3, EventKind::Deleted, "default", 3),
            entry(4, EventKind::Updated, "", 4),
        ]
    }

    fn ids(entries: &[AuditEntry]) -> Vec<EntryId> {
        entries.iter().map(|e| e.id).collect()
    }

    #[test]
    fn default_sort_is_newest_first() {
        let result = ActivityQuery::new().apply(sample());
        assert_eq!(ids(&result), vec![4, 3, 2, 1]);
    }

    #[test]
    fn date_range_is_inclusive() {
        let query = ActivityQuery::new()
            .created_from(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap())
            .created_until(NaiveDate::from_ymd_opt(2024, 3, 3).unwrap())
            .sorted_by(SortColumn::Id, SortDirection::Asc);
        assert_eq!(ids(&query.apply(sample())), vec![2, 3]);
    }

    #[test]
    fn event_and_log_name_filters() {
        let query = ActivityQuery::new().event(EventKind::Updated);
        assert_eq!(ids(&query.apply(sample())), vec![4, 2]);

        let query = ActivityQuery::new().log_name("default");
        assert_eq!(ids(&query.apply(sample())), vec![3, 1]);
    }

    #[test]
    fn subject_filter() {
        let query = ActivityQuery::new().subject(SubjectRef::new("Post", "2"));
        assert_eq!(ids(&query.apply(sample())), vec![2]);
    }

    #[test]
    fn distinct_values() {
        let entries = sample();
        assert_eq!(
            distinct_events(&entries),
            vec![EventKind::Created, EventKind::Updated, EventKind::Deleted]
        );
        assert_eq!(distinct_log_names(&entries), vec!["billing", "default"]);
    }

    #[test]
    fn sort_parsing() {
        assert_eq!("LOG_NAME".parse::<SortColumn>().unwrap(), SortColumn::LogName);
        assert_eq!("asc".parse::<SortDirection>().unwrap(), SortDirection::Asc);
        assert!("subject".parse::<SortColumn>().is_err());
    }

    #[test]
    fn badge_formatting() {
        assert_eq!(navigation_badge(0, true).as_deref(), Some("0"));
        assert_eq!(navigation_badge(999, true).as_deref(), Some("999"));
        assert_eq!(navigation_badge(1234567, true).as_deref(), Some("1,234,567"));
        assert_eq!(navigation_badge(1000, false), None);
    }

    #[test]
    fn indicators_for_active_dates() {
        let query = ActivityQuery::new().created_from(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(
            query.filter_indicators("%Y-%m-%d"),
            vec![("created_from", "Created from 2024-01-05".to_string())]
        );
    }

    #[test]
    fn indicators_survive_bad_format() {
        let query =
            ActivityQuery::new().created_until(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(
            query.filter_indicators("%Q"),
            vec![("created_until", "Created until 2024-03-01".to_string())]
        );
    }
}

//! Chronological ordering and calendar-month grouping for lane timelines.

use chrono::{DateTime, Datelike, NaiveTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::models::entry::{SortDirection, TimelineEntry};

/// Anything that can be placed on a timeline.
pub trait Dated {
    fn date(&self) -> DateTime<Utc>;

    /// Orders records that share a date so the output is deterministic.
    fn tiebreak(&self) -> (DateTime<Utc>, Uuid);
}

impl Dated for TimelineEntry {
    fn date(&self) -> DateTime<Utc> {
        self.date
    }

    fn tiebreak(&self) -> (DateTime<Utc>, Uuid) {
        (self.created_at, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthGroup<T> {
    /// First day of the month, 00:00 UTC.
    pub date: DateTime<Utc>,
    pub entries: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timeline<T> {
    pub entries: Vec<T>,
    pub grouped: Vec<MonthGroup<T>>,
}

pub fn month_start(date: DateTime<Utc>) -> DateTime<Utc> {
    let day = date.date_naive();
    let first = day.with_day(1).unwrap_or(day);
    first.and_time(NaiveTime::MIN).and_utc()
}

fn compare<T: Dated>(a: &T, b: &T) -> Ordering {
    a.date()
        .cmp(&b.date())
        .then_with(|| a.tiebreak().cmp(&b.tiebreak()))
}

pub fn sort_entries<T: Dated>(entries: &mut [T], direction: SortDirection) {
    match direction {
        SortDirection::Asc => entries.sort_by(compare),
        SortDirection::Desc => entries.sort_by(|a, b| compare(b, a)),
    }
}

/// Buckets already-sorted entries by month. Entries keep their relative
/// order inside a bucket; buckets follow `direction`.
pub fn group_by_month<T: Dated + Clone>(
    sorted: &[T],
    direction: SortDirection,
) -> Vec<MonthGroup<T>> {
    let mut buckets: BTreeMap<DateTime<Utc>, Vec<T>> = BTreeMap::new();
    for entry in sorted {
        buckets
            .entry(month_start(entry.date()))
            .or_default()
            .push(entry.clone());
    }

    let groups = buckets
        .into_iter()
        .map(|(date, entries)| MonthGroup { date, entries });

    match direction {
        SortDirection::Asc => groups.collect(),
        SortDirection::Desc => groups.rev().collect(),
    }
}

pub fn build_timeline<T: Dated + Clone>(mut entries: Vec<T>, direction: SortDirection) -> Timeline<T> {
    sort_entries(&mut entries, direction);
    let grouped = group_by_month(&entries, direction);
    Timeline { entries, grouped }
}

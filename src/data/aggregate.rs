use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use chrono::{NaiveDate, Timelike};
use log::debug;
use serde::{Serialize, Serializer};

use super::error::InvalidCriteriaError;
use super::filter::FilterCriteria;
use super::model::{Borough, CollisionRecord, Table, UNKNOWN};

/// Factor labels that say nothing about the cause.
pub const NON_INFORMATIVE_FACTORS: &[&str] = &[UNKNOWN, "Unspecified"];

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// The dimension a view counts records along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GroupBy {
    HourOfDay,
    Borough,
    Date,
    /// Contributing factor of a 1-based vehicle slot.
    Factor { slot: usize },
}

impl GroupBy {
    fn key(self, record: &CollisionRecord) -> GroupKey {
        match self {
            GroupBy::HourOfDay => GroupKey::Hour(record.timestamp.hour()),
            GroupBy::Borough => GroupKey::Borough(record.borough),
            GroupBy::Date => GroupKey::Date(record.timestamp.date()),
            GroupBy::Factor { slot } => GroupKey::Factor(record.factor(slot).to_string()),
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupBy::HourOfDay => write!(f, "Hour of day"),
            GroupBy::Borough => write!(f, "Borough"),
            GroupBy::Date => write!(f, "Date"),
            GroupBy::Factor { slot } => write!(f, "Factor (vehicle {slot})"),
        }
    }
}

/// One bucket of a view.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum GroupKey {
    /// 0–23.
    Hour(u32),
    Borough(Borough),
    Date(NaiveDate),
    Factor(String),
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Hour(h) => write!(f, "{h:02}:00"),
            GroupKey::Borough(b) => write!(f, "{b}"),
            GroupKey::Date(d) => write!(f, "{d}"),
            GroupKey::Factor(s) => write!(f, "{s}"),
        }
    }
}

// ---------------------------------------------------------------------------
// AggregatedView
// ---------------------------------------------------------------------------

/// Counts of matching records per group key. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedView {
    group_by: GroupBy,
    #[serde(serialize_with = "serialize_entries")]
    counts: BTreeMap<GroupKey, u64>,
}

/// Enum keys can't be JSON object keys, so entries go out as pairs.
fn serialize_entries<S: Serializer>(
    counts: &BTreeMap<GroupKey, u64>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(counts.iter())
}

impl AggregatedView {
    pub fn group_by(&self) -> GroupBy {
        self.group_by
    }

    pub fn counts(&self) -> &BTreeMap<GroupKey, u64> {
        &self.counts
    }

    pub fn get(&self, key: &GroupKey) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum over all groups, i.e. the number of matching records.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// The `n` largest groups by count, ties broken by key order, skipping
    /// keys whose label is in `exclude`.
    pub fn top(&self, n: usize, exclude: &[&str]) -> Vec<(GroupKey, u64)> {
        let mut entries: Vec<(GroupKey, u64)> = self
            .counts
            .iter()
            .filter(|(k, _)| !exclude.contains(&k.to_string().as_str()))
            .map(|(k, c)| (k.clone(), *c))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries.truncate(n);
        entries
    }
}

// ---------------------------------------------------------------------------
// Aggregation entry-points
// ---------------------------------------------------------------------------

/// Count the records matching `criteria`, grouped by `group_by`.
///
/// Every matching record lands in exactly one group, so [`AggregatedView::total`]
/// equals the number of matches. No matches gives an empty view.
pub fn aggregate(
    table: &Table,
    criteria: &FilterCriteria,
    group_by: GroupBy,
) -> Result<AggregatedView, InvalidCriteriaError> {
    let predicate = criteria.validate()?;
    let started = Instant::now();

    let mut counts: BTreeMap<GroupKey, u64> = BTreeMap::new();
    for record in table.records().iter().filter(|r| predicate.matches(r)) {
        *counts.entry(group_by.key(record)).or_default() += 1;
    }

    debug!(
        "Aggregated {} rows by {group_by} into {} groups in {:?}",
        table.len(),
        counts.len(),
        started.elapsed()
    );
    Ok(AggregatedView { group_by, counts })
}

/// Hour-of-day views for the `n` most frequent informative factors of a
/// vehicle slot, keyed by factor label.
pub fn hourly_by_top_factors(
    table: &Table,
    criteria: &FilterCriteria,
    slot: usize,
    n: usize,
) -> Result<BTreeMap<String, AggregatedView>, InvalidCriteriaError> {
    let by_factor = aggregate(table, criteria, GroupBy::Factor { slot })?;
    let top: Vec<String> = by_factor
        .top(n, NON_INFORMATIVE_FACTORS)
        .into_iter()
        .map(|(k, _)| k.to_string())
        .collect();

    let predicate = criteria.validate()?;
    let mut views: BTreeMap<String, AggregatedView> = top
        .iter()
        .map(|f| {
            (
                f.clone(),
                AggregatedView {
                    group_by: GroupBy::HourOfDay,
                    counts: BTreeMap::new(),
                },
            )
        })
        .collect();

    for record in table.records().iter().filter(|r| predicate.matches(r)) {
        if let Some(view) = views.get_mut(record.factor(slot)) {
            *view.counts.entry(GroupBy::HourOfDay.key(record)).or_default() += 1;
        }
    }
    Ok(views)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Casualties;
    use chrono::NaiveDateTime;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 9, day)
            .unwrap()
            .and_hms_opt(hour, 15, 0)
            .unwrap()
    }

    fn record(ts: NaiveDateTime, borough: Borough, factors: &[&str]) -> CollisionRecord {
        CollisionRecord {
            collision_id: None,
            timestamp: ts,
            latitude: None,
            longitude: None,
            borough,
            on_street: UNKNOWN.into(),
            cross_street: UNKNOWN.into(),
            off_street: UNKNOWN.into(),
            casualties: Casualties::default(),
            factors: factors.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn table() -> Table {
        Table::new(
            vec![
                record(at(1, 8), Borough::Brooklyn, &["Unsafe Speed", "Unspecified"]),
                record(at(1, 17), Borough::Brooklyn, &["Unsafe Speed", "Unspecified"]),
                record(at(2, 17), Borough::Queens, &["Unspecified", "Unsafe Speed"]),
                record(at(3, 23), Borough::Manhattan, &["Driver Inattention/Distraction"]),
                record(at(3, 17), Borough::Unknown, &[UNKNOWN]),
            ],
            0,
            vec![1, 2],
        )
    }

    #[test]
    fn test_by_hour() {
        let view = aggregate(&table(), &FilterCriteria::default(), GroupBy::HourOfDay).unwrap();
        assert_eq!(view.get(&GroupKey::Hour(17)), 3);
        assert_eq!(view.get(&GroupKey::Hour(8)), 1);
        assert_eq!(view.get(&GroupKey::Hour(0)), 0);
        assert_eq!(view.total(), 5);
    }

    #[test]
    fn test_by_borough_includes_unknown() {
        let view = aggregate(&table(), &FilterCriteria::default(), GroupBy::Borough).unwrap();
        let keys: Vec<_> = view.counts().keys().cloned().collect();
        assert_eq!(
            keys,
            vec![
                GroupKey::Borough(Borough::Manhattan),
                GroupKey::Borough(Borough::Brooklyn),
                GroupKey::Borough(Borough::Queens),
                GroupKey::Borough(Borough::Unknown),
            ]
        );
        assert_eq!(view.get(&GroupKey::Borough(Borough::Brooklyn)), 2);
    }

    #[test]
    fn test_factor_slot_counts_every_record_once() {
        let view = aggregate(
            &table(),
            &FilterCriteria::default(),
            GroupBy::Factor { slot: 2 },
        )
        .unwrap();
        assert_eq!(view.total(), 5);
        assert_eq!(view.get(&GroupKey::Factor(UNKNOWN.into())), 2);
        assert_eq!(view.get(&GroupKey::Factor("Unspecified".into())), 2);
    }

    #[test]
    fn test_top_excludes_non_informative() {
        let view = aggregate(
            &table(),
            &FilterCriteria::default(),
            GroupBy::Factor { slot: 1 },
        )
        .unwrap();
        let top = view.top(15, NON_INFORMATIVE_FACTORS);
        assert_eq!(
            top,
            vec![
                (GroupKey::Factor("Unsafe Speed".into()), 2),
                (GroupKey::Factor("Driver Inattention/Distraction".into()), 1),
            ]
        );
        assert_eq!(view.top(1, &[]).len(), 1);
    }

    #[test]
    fn test_empty_match_is_empty_view() {
        let c = FilterCriteria::default().in_boroughs(["Staten Island"]);
        let view = aggregate(&table(), &c, GroupBy::HourOfDay).unwrap();
        assert!(view.is_empty());
        assert_eq!(view.group_by(), GroupBy::HourOfDay);
    }

    #[test]
    fn test_hourly_by_top_factors() {
        let views = hourly_by_top_factors(&table(), &FilterCriteria::default(), 1, 3).unwrap();
        assert_eq!(views.len(), 2);
        let speed = &views["Unsafe Speed"];
        assert_eq!(speed.get(&GroupKey::Hour(8)), 1);
        assert_eq!(speed.get(&GroupKey::Hour(17)), 1);
        assert_eq!(views["Driver Inattention/Distraction"].total(), 1);
    }

    #[test]
    fn test_view_serializes_as_pairs() {
        let c = FilterCriteria::default().in_boroughs(["Queens"]);
        let view = aggregate(&table(), &c, GroupBy::HourOfDay).unwrap();
        let json = serde_json::to_string(&view).unwrap();
        assert_eq!(json, r#"{"group_by":"HourOfDay","counts":[[{"Hour":17},1]]}"#);
    }

    #[test]
    fn test_key_labels() {
        assert_eq!(GroupKey::Hour(7).to_string(), "07:00");
        assert_eq!(GroupKey::Borough(Borough::StatenIsland).to_string(), "Staten Island");
        assert_eq!(GroupBy::Factor { slot: 2 }.to_string(), "Factor (vehicle 2)");
    }
}

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::error::InvalidCriteriaError;
use super::model::{Borough, CollisionRecord, Table};

// ---------------------------------------------------------------------------
// FilterCriteria: what the caller asked for, unvalidated
// ---------------------------------------------------------------------------

/// Inclusive timestamp range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        DateRange { start, end }
    }

    /// Whole calendar days, from the start of `first` to the end of `last`.
    pub fn days(first: NaiveDate, last: NaiveDate) -> Self {
        let end_of_day = NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999)
            .unwrap_or(NaiveTime::MIN);
        DateRange {
            start: first.and_time(NaiveTime::MIN),
            end: last.and_time(end_of_day),
        }
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.start <= ts && ts <= self.end
    }
}

/// Per-dimension restrictions. `None` means "no restriction"; a present but
/// empty set matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub date_range: Option<DateRange>,
    /// Borough names as typed by the user; checked against the known set.
    pub boroughs: Option<BTreeSet<String>>,
    /// A record matches when any of its factor labels is in this set.
    pub factors: Option<BTreeSet<String>>,
    /// Minimum number of persons injured.
    pub min_injured: Option<u32>,
}

impl FilterCriteria {
    pub fn between(mut self, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        self.date_range = Some(DateRange::new(start, end));
        self
    }

    pub fn in_boroughs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.boroughs = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_factors<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.factors = Some(labels.into_iter().map(Into::into).collect());
        self
    }

    pub fn min_injured(mut self, n: u32) -> Self {
        self.min_injured = Some(n);
        self
    }

    /// Check the criteria and turn them into a [`Predicate`].
    pub fn validate(&self) -> Result<Predicate, InvalidCriteriaError> {
        if let Some(range) = self.date_range {
            if range.start > range.end {
                return Err(InvalidCriteriaError::InvertedDateRange {
                    start: range.start,
                    end: range.end,
                });
            }
        }

        let boroughs = self
            .boroughs
            .as_ref()
            .map(|names| {
                names
                    .iter()
                    .map(|n| {
                        n.parse::<Borough>()
                            .map_err(|_| InvalidCriteriaError::UnknownBorough(n.clone()))
                    })
                    .collect::<Result<BTreeSet<_>, _>>()
            })
            .transpose()?;

        Ok(Predicate {
            date_range: self.date_range,
            boroughs,
            factors: self.factors.clone(),
            min_injured: self.min_injured,
        })
    }
}

// ---------------------------------------------------------------------------
// Predicate: validated criteria, applied per record
// ---------------------------------------------------------------------------

/// Criteria that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    date_range: Option<DateRange>,
    boroughs: Option<BTreeSet<Borough>>,
    factors: Option<BTreeSet<String>>,
    min_injured: Option<u32>,
}

impl Predicate {
    pub fn matches(&self, record: &CollisionRecord) -> bool {
        if let Some(range) = &self.date_range {
            if !range.contains(record.timestamp) {
                return false;
            }
        }
        if let Some(boroughs) = &self.boroughs {
            if !boroughs.contains(&record.borough) {
                return false;
            }
        }
        if let Some(factors) = &self.factors {
            if !record.factors.iter().any(|f| factors.contains(f)) {
                return false;
            }
        }
        if let Some(min) = self.min_injured {
            if record.casualties.persons_injured < min {
                return false;
            }
        }
        true
    }
}

/// Return indices of records that pass all active filters.
pub fn filtered_indices(
    table: &Table,
    criteria: &FilterCriteria,
) -> Result<Vec<usize>, InvalidCriteriaError> {
    let predicate = criteria.validate()?;
    Ok(table
        .records()
        .iter()
        .enumerate()
        .filter(|(_, r)| predicate.matches(r))
        .map(|(i, _)| i)
        .collect())
}

/// `[longitude, latitude]` of matching records that were geocoded.
pub fn locations(
    table: &Table,
    criteria: &FilterCriteria,
) -> Result<Vec<[f64; 2]>, InvalidCriteriaError> {
    let predicate = criteria.validate()?;
    Ok(table
        .records()
        .iter()
        .filter(|r| predicate.matches(r))
        .filter_map(CollisionRecord::position)
        .collect())
}

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::Serialize;

/// Marker stored for categorical fields the source left blank.
pub const UNKNOWN: &str = "Unknown";

// ---------------------------------------------------------------------------
// Borough – the categorical location dimension
// ---------------------------------------------------------------------------

/// One of the five NYC boroughs, or the explicit unknown marker.
///
/// Declaration order is the sort order used by views and the side panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Borough {
    Manhattan,
    Brooklyn,
    Queens,
    Bronx,
    StatenIsland,
    Unknown,
}

impl Borough {
    /// The known boroughs, in display order. `Unknown` is not a valid filter.
    pub const KNOWN: [Borough; 5] = [
        Borough::Manhattan,
        Borough::Brooklyn,
        Borough::Queens,
        Borough::Bronx,
        Borough::StatenIsland,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Borough::Manhattan => "Manhattan",
            Borough::Brooklyn => "Brooklyn",
            Borough::Queens => "Queens",
            Borough::Bronx => "Bronx",
            Borough::StatenIsland => "Staten Island",
            Borough::Unknown => UNKNOWN,
        }
    }

    /// Parse a borough cell from the dataset. Blank or unrecognised values
    /// become [`Borough::Unknown`].
    pub fn from_cell(cell: &str) -> Borough {
        cell.parse().unwrap_or(Borough::Unknown)
    }
}

impl FromStr for Borough {
    type Err = ();

    /// Case-insensitive; accepts "The Bronx" and "Staten_Island" spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect();
        match norm.as_str() {
            "manhattan" => Ok(Borough::Manhattan),
            "brooklyn" => Ok(Borough::Brooklyn),
            "queens" => Ok(Borough::Queens),
            "bronx" | "thebronx" => Ok(Borough::Bronx),
            "statenisland" => Ok(Borough::StatenIsland),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Borough {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// CollisionRecord – one row of the source table
// ---------------------------------------------------------------------------

/// Injury and fatality counts for one collision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Casualties {
    pub persons_injured: u32,
    pub persons_killed: u32,
    pub pedestrians_injured: u32,
    pub pedestrians_killed: u32,
    pub cyclists_injured: u32,
    pub cyclists_killed: u32,
    pub motorists_injured: u32,
    pub motorists_killed: u32,
}

/// A single reported collision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollisionRecord {
    pub collision_id: Option<u64>,
    /// Crash date and time combined.
    pub timestamp: NaiveDateTime,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub borough: Borough,
    pub on_street: String,
    pub cross_street: String,
    pub off_street: String,
    pub casualties: Casualties,
    /// Contributing factor per vehicle slot, in slot order. Only slots that
    /// exist in the source are present; blank cells hold [`UNKNOWN`].
    pub factors: Vec<String>,
}

impl CollisionRecord {
    /// `(longitude, latitude)` when both coordinates are known.
    pub fn position(&self) -> Option<[f64; 2]> {
        Some([self.longitude?, self.latitude?])
    }

    /// Factor for a 1-based vehicle slot, `UNKNOWN` when the slot is absent.
    pub fn factor(&self, slot: usize) -> &str {
        slot.checked_sub(1)
            .and_then(|i| self.factors.get(i))
            .map(String::as_str)
            .unwrap_or(UNKNOWN)
    }
}

// ---------------------------------------------------------------------------
// Table – the complete loaded dataset
// ---------------------------------------------------------------------------

/// The loaded dataset. Immutable once built; queries borrow it.
#[derive(Debug, Clone, Default)]
pub struct Table {
    records: Vec<CollisionRecord>,
    /// Data lines rejected as malformed during load.
    pub skipped: usize,
    /// Vehicle slots (1-based) that had a contributing-factor column.
    pub factor_slots: Vec<usize>,
}

/// Overview figures for a loaded table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSummary {
    pub rows: usize,
    pub skipped: usize,
    pub first: Option<NaiveDateTime>,
    pub last: Option<NaiveDateTime>,
    pub with_coordinates: usize,
    pub boroughs: BTreeSet<Borough>,
}

impl Table {
    pub fn new(records: Vec<CollisionRecord>, skipped: usize, factor_slots: Vec<usize>) -> Self {
        Table {
            records,
            skipped,
            factor_slots,
        }
    }

    pub fn records(&self) -> &[CollisionRecord] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn summary(&self) -> TableSummary {
        TableSummary {
            rows: self.records.len(),
            skipped: self.skipped,
            first: self.records.iter().map(|r| r.timestamp).min(),
            last: self.records.iter().map(|r| r.timestamp).max(),
            with_coordinates: self
                .records
                .iter()
                .filter(|r| r.position().is_some())
                .count(),
            boroughs: self.records.iter().map(|r| r.borough).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(hour: u32, borough: Borough) -> CollisionRecord {
        CollisionRecord {
            collision_id: None,
            timestamp: NaiveDate::from_ymd_opt(2021, 9, 11)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap(),
            latitude: Some(40.7),
            longitude: None,
            borough,
            on_street: UNKNOWN.into(),
            cross_street: UNKNOWN.into(),
            off_street: UNKNOWN.into(),
            casualties: Casualties::default(),
            factors: vec!["Unsafe Speed".into()],
        }
    }

    #[test]
    fn test_borough_parsing() {
        assert_eq!("BROOKLYN".parse::<Borough>(), Ok(Borough::Brooklyn));
        assert_eq!("The Bronx".parse::<Borough>(), Ok(Borough::Bronx));
        assert_eq!(" staten island ".parse::<Borough>(), Ok(Borough::StatenIsland));
        assert!("Hoboken".parse::<Borough>().is_err());
        assert!("Unknown".parse::<Borough>().is_err());
        assert_eq!(Borough::from_cell(""), Borough::Unknown);
    }

    #[test]
    fn test_factor_slot_lookup() {
        let r = record(3, Borough::Queens);
        assert_eq!(r.factor(1), "Unsafe Speed");
        assert_eq!(r.factor(2), UNKNOWN);
        assert_eq!(r.factor(0), UNKNOWN);
        assert_eq!(r.position(), None);
    }

    #[test]
    fn test_summary() {
        let table = Table::new(
            vec![record(5, Borough::Queens), record(1, Borough::Bronx)],
            2,
            vec![1],
        );
        let s = table.summary();
        assert_eq!(s.rows, 2);
        assert_eq!(s.skipped, 2);
        assert_eq!(s.first.map(|t| t.format("%H").to_string()), Some("01".into()));
        assert_eq!(s.with_coordinates, 0);
        assert_eq!(
            s.boroughs.into_iter().collect::<Vec<_>>(),
            vec![Borough::Queens, Borough::Bronx]
        );
    }
}

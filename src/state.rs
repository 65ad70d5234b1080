use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::NaiveDate;
use collision_dashboard::data::aggregate::{NON_INFORMATIVE_FACTORS, hourly_by_top_factors};
use collision_dashboard::data::filter::locations;
use collision_dashboard::data::model::TableSummary;
use collision_dashboard::data::{
    AggregatedView, Borough, CollisionRecord, DateRange, FilterCriteria, GroupBy, GroupKey,
    LoadOptions, Table, aggregate, load_with,
};

use crate::color::ColorMap;

/// Factors offered in the factor filter.
const FACTOR_CHOICES: usize = 15;
/// Factors drawn in the hourly breakdown chart.
const HOURLY_FACTORS: usize = 3;
/// Factors listed per vehicle in the side-by-side comparison.
const COMPARED_FACTORS: usize = 5;
/// Vehicle slots shown in the comparison.
const COMPARED_SLOTS: usize = 2;
/// Records shown in the raw data grid.
pub const SAMPLE_ROWS: usize = 100;

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Loaded table (None until a file is loaded).
    pub table: Option<Table>,
    pub summary: Option<TableSummary>,
    pub load_options: LoadOptions,

    // ---- Filter widgets ----
    pub use_date_range: bool,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub boroughs: BTreeSet<Borough>,
    pub factor: Option<String>,
    pub factor_choices: Vec<String>,
    pub min_injured: u32,
    pub max_injured: u32,
    pub group_by: GroupBy,
    /// Vehicle slot whose factors drive the hourly breakdown.
    pub hourly_slot: usize,
    pub show_sample: bool,

    // ---- Derived views (recomputed by `refresh`) ----
    pub view: Option<AggregatedView>,
    pub view_colors: ColorMap,
    pub points: Vec<[f64; 2]>,
    pub hourly_factors: BTreeMap<String, AggregatedView>,
    pub factor_colors: ColorMap,
    /// `(slot, top factors)` for the first vehicle slots, side by side.
    pub vehicle_top: Vec<(usize, Vec<(GroupKey, u64)>)>,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(load_options: LoadOptions) -> Self {
        let today = chrono::Local::now().date_naive();
        Self {
            table: None,
            summary: None,
            load_options,
            use_date_range: false,
            date_from: today,
            date_to: today,
            boroughs: Borough::KNOWN.into_iter().collect(),
            factor: None,
            factor_choices: Vec::new(),
            min_injured: 0,
            max_injured: 0,
            group_by: GroupBy::HourOfDay,
            hourly_slot: 1,
            show_sample: false,
            view: None,
            view_colors: ColorMap::default(),
            points: Vec::new(),
            hourly_factors: BTreeMap::new(),
            factor_colors: ColorMap::default(),
            vehicle_top: Vec::new(),
            status_message: None,
        }
    }

    /// Load a file and make it the current table. Errors go to the status line.
    pub fn load_path(&mut self, path: &Path) {
        match load_with(path, &self.load_options) {
            Ok(table) => self.set_table(table),
            Err(e) => {
                log::error!("Failed to load {}: {e}", path.display());
                self.status_message = Some(format!("Error: {e}"));
            }
        }
    }

    /// Ingest a newly loaded table, reset filters to cover all of it.
    pub fn set_table(&mut self, table: Table) {
        let summary = table.summary();
        if let (Some(first), Some(last)) = (summary.first, summary.last) {
            self.date_from = first.date();
            self.date_to = last.date();
        }
        self.use_date_range = false;
        self.boroughs = Borough::KNOWN.into_iter().collect();
        self.factor = None;
        self.min_injured = 0;
        self.max_injured = table
            .records()
            .iter()
            .map(|r| r.casualties.persons_injured)
            .max()
            .unwrap_or(0);

        let slot = table.factor_slots.first().copied().unwrap_or(1);
        self.hourly_slot = slot;
        self.factor_choices = aggregate(&table, &FilterCriteria::default(), GroupBy::Factor { slot })
            .map(|v| {
                v.top(FACTOR_CHOICES, NON_INFORMATIVE_FACTORS)
                    .into_iter()
                    .map(|(k, _)| k.to_string())
                    .collect()
            })
            .unwrap_or_default();

        self.summary = Some(summary);
        self.table = Some(table);
        self.status_message = None;
        self.refresh();
    }

    /// Translate the widget state into criteria.
    ///
    /// All five boroughs ticked means no borough restriction, so collisions
    /// with an unknown borough stay visible.
    pub fn criteria(&self) -> FilterCriteria {
        FilterCriteria {
            date_range: self
                .use_date_range
                .then(|| DateRange::days(self.date_from, self.date_to)),
            boroughs: (self.boroughs.len() != Borough::KNOWN.len())
                .then(|| self.boroughs.iter().map(|b| b.name().to_string()).collect()),
            factors: self.factor.clone().map(|f| BTreeSet::from([f])),
            min_injured: (self.min_injured > 0).then_some(self.min_injured),
        }
    }

    /// Recompute every derived view after a filter change.
    pub fn refresh(&mut self) {
        let Some(table) = &self.table else {
            return;
        };
        let criteria = self.criteria();

        let result = aggregate(table, &criteria, self.group_by).and_then(|view| {
            let points = locations(table, &criteria)?;
            let hourly =
                hourly_by_top_factors(table, &criteria, self.hourly_slot, HOURLY_FACTORS)?;
            let mut vehicle_top = Vec::new();
            for &slot in table.factor_slots.iter().take(COMPARED_SLOTS) {
                let by_factor = aggregate(table, &criteria, GroupBy::Factor { slot })?;
                vehicle_top.push((slot, by_factor.top(COMPARED_FACTORS, &[])));
            }
            Ok((view, points, hourly, vehicle_top))
        });

        match result {
            Ok((view, points, hourly, vehicle_top)) => {
                self.view_colors = ColorMap::new(view.counts().keys());
                let factor_keys: Vec<GroupKey> =
                    hourly.keys().cloned().map(GroupKey::Factor).collect();
                self.factor_colors = ColorMap::new(&factor_keys);
                self.view = Some(view);
                self.points = points;
                self.hourly_factors = hourly;
                self.vehicle_top = vehicle_top;
                self.status_message = None;
            }
            Err(e) => {
                log::warn!("Rejected filter: {e}");
                self.status_message = Some(format!("Invalid filter: {e}"));
            }
        }
    }

    /// Slots offered for the hourly breakdown.
    pub fn hourly_slot_choices(&self) -> &[usize] {
        self.table
            .as_ref()
            .map(|t| t.factor_slots.as_slice())
            .unwrap_or(&[])
    }

    /// Switch the hourly breakdown to another vehicle slot. Slots the table
    /// has no factor column for are ignored.
    pub fn set_hourly_slot(&mut self, slot: usize) {
        if slot == self.hourly_slot || !self.hourly_slot_choices().contains(&slot) {
            return;
        }
        self.hourly_slot = slot;
        self.refresh();
    }

    /// Leading records of the table for the raw data grid.
    pub fn sample(&self) -> &[CollisionRecord] {
        self.table
            .as_ref()
            .map(|t| &t.records()[..t.len().min(SAMPLE_ROWS)])
            .unwrap_or(&[])
    }

    /// Number of collisions in the current view.
    pub fn matching(&self) -> u64 {
        self.view.as_ref().map_or(0, AggregatedView::total)
    }

    pub fn toggle_borough(&mut self, borough: Borough) {
        if !self.boroughs.remove(&borough) {
            self.boroughs.insert(borough);
        }
        self.refresh();
    }

    pub fn select_all_boroughs(&mut self) {
        self.boroughs = Borough::KNOWN.into_iter().collect();
        self.refresh();
    }

    pub fn select_no_boroughs(&mut self) {
        self.boroughs.clear();
        self.refresh();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use collision_dashboard::data::{Casualties, CollisionRecord};

    fn table() -> Table {
        let mk = |hour: u32, borough: Borough, injured: u32, second: &str| CollisionRecord {
            collision_id: None,
            timestamp: NaiveDate::from_ymd_opt(2021, 9, 11)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap(),
            latitude: Some(40.7),
            longitude: Some(-74.0),
            borough,
            on_street: "Unknown".into(),
            cross_street: "Unknown".into(),
            off_street: "Unknown".into(),
            casualties: Casualties {
                persons_injured: injured,
                ..Casualties::default()
            },
            factors: vec!["Unsafe Speed".into(), second.into()],
        };
        Table::new(
            vec![
                mk(1, Borough::Queens, 0, "Unspecified"),
                mk(2, Borough::Unknown, 3, "Backing Unsafely"),
                mk(2, Borough::Bronx, 1, "Unspecified"),
            ],
            0,
            vec![1, 2],
        )
    }

    #[test]
    fn test_set_table_initialises_filters() {
        let mut state = AppState::new(LoadOptions::default());
        state.set_table(table());
        assert_eq!(state.max_injured, 3);
        assert_eq!(state.factor_choices, vec!["Unsafe Speed".to_string()]);
        assert_eq!(state.criteria(), FilterCriteria::default());
        assert_eq!(state.matching(), 3);
        assert_eq!(state.points.len(), 3);
        assert_eq!(state.hourly_factors.len(), 1);
    }

    #[test]
    fn test_borough_toggles_restrict_view() {
        let mut state = AppState::new(LoadOptions::default());
        state.set_table(table());
        state.select_no_boroughs();
        assert_eq!(state.matching(), 0);
        state.toggle_borough(Borough::Bronx);
        assert_eq!(state.matching(), 1);
        state.select_all_boroughs();
        assert_eq!(state.matching(), 3);
    }

    #[test]
    fn test_inverted_dates_keep_previous_view() {
        let mut state = AppState::new(LoadOptions::default());
        state.set_table(table());
        state.use_date_range = true;
        state.date_from = NaiveDate::from_ymd_opt(2021, 9, 12).unwrap();
        state.date_to = NaiveDate::from_ymd_opt(2021, 9, 10).unwrap();
        state.refresh();
        assert!(state.status_message.is_some());
        assert_eq!(state.matching(), 3);
    }

    #[test]
    fn test_hourly_slot_switches_breakdown() {
        let mut state = AppState::new(LoadOptions::default());
        state.set_table(table());
        assert_eq!(state.hourly_slot, 1);
        assert_eq!(state.hourly_slot_choices(), &[1, 2]);
        assert!(state.hourly_factors.contains_key("Unsafe Speed"));

        state.set_hourly_slot(2);
        assert_eq!(state.hourly_slot, 2);
        assert!(state.hourly_factors.contains_key("Backing Unsafely"));
        assert!(!state.hourly_factors.contains_key("Unsafe Speed"));

        // No factor column for vehicle 4.
        state.set_hourly_slot(4);
        assert_eq!(state.hourly_slot, 2);
    }

    #[test]
    fn test_vehicle_comparison_follows_filters() {
        let mut state = AppState::new(LoadOptions::default());
        state.set_table(table());
        assert_eq!(
            state.vehicle_top,
            vec![
                (1, vec![(GroupKey::Factor("Unsafe Speed".into()), 3)]),
                (
                    2,
                    vec![
                        (GroupKey::Factor("Unspecified".into()), 2),
                        (GroupKey::Factor("Backing Unsafely".into()), 1),
                    ]
                ),
            ]
        );

        state.min_injured = 2;
        state.refresh();
        assert_eq!(
            state.vehicle_top[1].1,
            vec![(GroupKey::Factor("Backing Unsafely".into()), 1)]
        );
    }

    #[test]
    fn test_sample_is_capped() {
        let mut state = AppState::new(LoadOptions::default());
        assert!(state.sample().is_empty());
        state.set_table(table());
        assert_eq!(state.sample().len(), 3);

        let many: Vec<CollisionRecord> = std::iter::repeat(table().records()[0].clone())
            .take(SAMPLE_ROWS + 20)
            .collect();
        state.set_table(Table::new(many, 0, vec![1, 2]));
        assert_eq!(state.sample().len(), SAMPLE_ROWS);
    }
}

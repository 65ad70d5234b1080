use log::debug;

use super::error::LoadError;

/// Highest vehicle number the open dataset carries a factor column for.
pub const MAX_FACTOR_SLOTS: usize = 5;

// ---------------------------------------------------------------------------
// Header normalisation
// ---------------------------------------------------------------------------

/// `"CRASH DATE"` → `"crash_date"`, `"NUMBER OF PERSONS INJURED "` →
/// `"number_of_persons_injured"`. Non-word characters are dropped.
pub fn normalize_header(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

// ---------------------------------------------------------------------------
// Resolved schema: column positions of every field we read
// ---------------------------------------------------------------------------

/// Positions of the casualty count columns. Absent columns read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CasualtyColumns {
    pub persons_injured: Option<usize>,
    pub persons_killed: Option<usize>,
    pub pedestrians_injured: Option<usize>,
    pub pedestrians_killed: Option<usize>,
    pub cyclists_injured: Option<usize>,
    pub cyclists_killed: Option<usize>,
    pub motorists_injured: Option<usize>,
    pub motorists_killed: Option<usize>,
}

/// Where each collision field lives in a source with the given headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub date: usize,
    pub time: Option<usize>,
    pub latitude: usize,
    pub longitude: usize,
    pub borough: Option<usize>,
    pub on_street: Option<usize>,
    pub cross_street: Option<usize>,
    pub off_street: Option<usize>,
    pub collision_id: Option<usize>,
    pub casualties: CasualtyColumns,
    /// `(vehicle slot, column)` pairs sorted by slot.
    pub factors: Vec<(usize, usize)>,
}

impl Schema {
    /// Resolve column positions from already-normalised headers.
    ///
    /// Well-known names win; otherwise the first header containing the
    /// relevant fragment is used, so exports with renamed columns still load.
    pub fn resolve(headers: &[String]) -> Result<Schema, LoadError> {
        let date = exact_or_containing(headers, "crash_date", &["date"])
            .ok_or(LoadError::MissingColumn("crash_date"))?;
        // A combined date-time column can double as the date column; don't
        // let it also be picked up as the time column.
        let time = exact_or_containing(headers, "crash_time", &["time"]).filter(|&t| t != date);
        let latitude = exact_or_containing(headers, "latitude", &["lat"])
            .ok_or(LoadError::MissingColumn("latitude"))?;
        let longitude = exact_or_containing(headers, "longitude", &["lon"])
            .ok_or(LoadError::MissingColumn("longitude"))?;

        let casualties = CasualtyColumns {
            // Exports without a per-person column still carry some injury total.
            persons_injured: count_column(headers, "person", "injured")
                .or_else(|| headers.iter().position(|h| h.contains("injured"))),
            persons_killed: count_column(headers, "person", "killed"),
            pedestrians_injured: count_column(headers, "pedestrian", "injured"),
            pedestrians_killed: count_column(headers, "pedestrian", "killed"),
            cyclists_injured: count_column(headers, "cyclist", "injured"),
            cyclists_killed: count_column(headers, "cyclist", "killed"),
            motorists_injured: count_column(headers, "motorist", "injured"),
            motorists_killed: count_column(headers, "motorist", "killed"),
        };

        let mut factors = Vec::new();
        for (idx, h) in headers.iter().enumerate() {
            if !h.contains("contributing_factor") {
                continue;
            }
            if let Some(slot) = factor_slot(h) {
                if !factors.iter().any(|&(s, _)| s == slot) {
                    factors.push((slot, idx));
                }
            }
        }
        factors.sort_unstable();

        let schema = Schema {
            date,
            time,
            latitude,
            longitude,
            borough: exact_or_containing(headers, "borough", &["borough"]),
            on_street: position(headers, "on_street_name"),
            cross_street: position(headers, "cross_street_name"),
            off_street: position(headers, "off_street_name"),
            collision_id: position(headers, "collision_id"),
            casualties,
            factors,
        };
        debug!("Resolved collision schema: {schema:?}");
        Ok(schema)
    }

    /// Vehicle slots that have a factor column.
    pub fn factor_slots(&self) -> Vec<usize> {
        self.factors.iter().map(|&(slot, _)| slot).collect()
    }
}

fn position(headers: &[String], name: &str) -> Option<usize> {
    headers.iter().position(|h| h == name)
}

fn exact_or_containing(headers: &[String], exact: &str, fragments: &[&str]) -> Option<usize> {
    position(headers, exact).or_else(|| {
        headers
            .iter()
            .position(|h| fragments.iter().any(|f| h.contains(f)))
    })
}

/// `number_of_cyclist_injured` and friends. Prefers the `number_of_` form.
fn count_column(headers: &[String], who: &str, what: &str) -> Option<usize> {
    let matches = |h: &String| h.contains(who) && h.contains(what);
    headers
        .iter()
        .position(|h| h.starts_with("number_of_") && matches(h))
        .or_else(|| headers.iter().position(matches))
}

/// `contributing_factor_vehicle_2` → `Some(2)`.
fn factor_slot(header: &str) -> Option<usize> {
    (1..=MAX_FACTOR_SLOTS).find(|i| {
        let tag = format!("vehicle_{i}");
        header
            .match_indices(&tag)
            .any(|(at, _)| !header[at + tag.len()..].starts_with(|c: char| c.is_ascii_digit()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|h| normalize_header(h)).collect()
    }

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header(" CRASH DATE "), "crash_date");
        assert_eq!(
            normalize_header("CONTRIBUTING FACTOR VEHICLE 1"),
            "contributing_factor_vehicle_1"
        );
        assert_eq!(normalize_header("ZIP-CODE"), "zipcode");
    }

    #[test]
    fn test_resolve_open_data_headers() {
        let h = headers(&[
            "CRASH DATE",
            "CRASH TIME",
            "BOROUGH",
            "ZIP CODE",
            "LATITUDE",
            "LONGITUDE",
            "LOCATION",
            "ON STREET NAME",
            "CROSS STREET NAME",
            "OFF STREET NAME",
            "NUMBER OF PERSONS INJURED",
            "NUMBER OF PERSONS KILLED",
            "NUMBER OF PEDESTRIANS INJURED",
            "NUMBER OF PEDESTRIANS KILLED",
            "NUMBER OF CYCLIST INJURED",
            "NUMBER OF CYCLIST KILLED",
            "NUMBER OF MOTORIST INJURED",
            "NUMBER OF MOTORIST KILLED",
            "CONTRIBUTING FACTOR VEHICLE 1",
            "CONTRIBUTING FACTOR VEHICLE 2",
            "CONTRIBUTING FACTOR VEHICLE 3",
            "COLLISION_ID",
        ]);
        let s = Schema::resolve(&h).unwrap();
        assert_eq!(s.date, 0);
        assert_eq!(s.time, Some(1));
        assert_eq!(s.borough, Some(2));
        assert_eq!(s.latitude, 4);
        assert_eq!(s.longitude, 5);
        assert_eq!(s.on_street, Some(7));
        assert_eq!(s.casualties.persons_injured, Some(10));
        assert_eq!(s.casualties.cyclists_killed, Some(15));
        assert_eq!(s.casualties.motorists_killed, Some(17));
        assert_eq!(s.factors, vec![(1, 18), (2, 19), (3, 20)]);
        assert_eq!(s.factor_slots(), vec![1, 2, 3]);
        assert_eq!(s.collision_id, Some(21));
    }

    #[test]
    fn test_resolve_falls_back_to_fragments() {
        let h = headers(&["when_date", "lat_deg", "lon_deg", "injured"]);
        let s = Schema::resolve(&h).unwrap();
        assert_eq!((s.date, s.latitude, s.longitude), (0, 1, 2));
        assert_eq!(s.time, None);
        assert_eq!(
            s.casualties,
            CasualtyColumns {
                persons_injured: Some(3),
                ..CasualtyColumns::default()
            }
        );
        assert!(s.factors.is_empty());
    }

    #[test]
    fn test_persons_injured_prefers_person_column() {
        let h = headers(&[
            "crash_date",
            "latitude",
            "longitude",
            "cyclists_injured",
            "total_persons_injured",
        ]);
        let s = Schema::resolve(&h).unwrap();
        assert_eq!(s.casualties.persons_injured, Some(4));
        assert_eq!(s.casualties.cyclists_injured, Some(3));
    }

    #[test]
    fn test_resolve_missing_required() {
        let h = headers(&["borough", "latitude", "longitude"]);
        assert!(matches!(
            Schema::resolve(&h),
            Err(LoadError::MissingColumn("crash_date"))
        ));

        let h = headers(&["crash_date", "latitude"]);
        assert!(matches!(
            Schema::resolve(&h),
            Err(LoadError::MissingColumn("longitude"))
        ));
    }

    #[test]
    fn test_factor_slot_ignores_higher_numbers() {
        assert_eq!(factor_slot("contributing_factor_vehicle_1"), Some(1));
        assert_eq!(factor_slot("contributing_factor_vehicle_12"), None);
        assert_eq!(factor_slot("contributing_factor"), None);
    }
}

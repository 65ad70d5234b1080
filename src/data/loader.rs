use std::fmt::Display;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use arrow::array::Array;
use arrow::util::display::array_value_to_string;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::{debug, info, warn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::error::LoadError;
use super::model::{Borough, Casualties, CollisionRecord, Table, UNKNOWN};
use super::schema::{Schema, normalize_header};

/// Skipped rows logged individually before only the total is reported.
const MAX_LOGGED_SKIPS: usize = 5;

/// Knobs for [`load_with`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Stop after this many data lines (well-formed or not).
    pub max_rows: Option<usize>,
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a collision table from a file path, a `file://` URI or an
/// `http(s)://` URL.
pub fn load(source: impl AsRef<Path>) -> Result<Table, LoadError> {
    load_with(source, &LoadOptions::default())
}

/// Load a collision table.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row, one collision per line (the open-data export)
/// * `.json`    – `[{ "crash_date": ..., "latitude": ..., ... }, ...]`
/// * `.parquet` – any flat schema carrying the same columns
///
/// Remote sources are downloaded to a temporary file first; the format is
/// taken from the last segment of the URL path.
pub fn load_with(source: impl AsRef<Path>, options: &LoadOptions) -> Result<Table, LoadError> {
    let (table, origin) = match resolve_source(source.as_ref())? {
        Source::Local(path) => {
            let format = Format::from_name(&path.to_string_lossy())?;
            (read_file(&path, format, options)?, path.display().to_string())
        }
        Source::Remote(url) => (load_remote(&url, options)?, url),
    };

    info!(
        "Loaded {} collisions from {} ({} malformed rows skipped)",
        table.len(),
        origin,
        table.skipped
    );
    Ok(table)
}

#[derive(Debug, PartialEq, Eq)]
enum Source {
    Local(PathBuf),
    Remote(String),
}

fn resolve_source(source: &Path) -> Result<Source, LoadError> {
    let Some(text) = source.to_str() else {
        return Ok(Source::Local(source.to_path_buf()));
    };
    if let Some(rest) = text.strip_prefix("file://") {
        return Ok(Source::Local(PathBuf::from(rest)));
    }
    let lower = text.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Ok(Source::Remote(text.to_string()));
    }
    if text.contains("://") {
        return Err(LoadError::UnsupportedSource(text.to_string()));
    }
    Ok(Source::Local(source.to_path_buf()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Csv,
    Json,
    Parquet,
}

impl Format {
    /// Format from a file name or URL; query string and fragment are ignored.
    fn from_name(name: &str) -> Result<Format, LoadError> {
        let name = name.split(['?', '#']).next().unwrap_or(name);
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Ok(Format::Csv),
            "json" => Ok(Format::Json),
            "parquet" | "pq" => Ok(Format::Parquet),
            other => Err(LoadError::UnsupportedFormat(other.to_string())),
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Format::Csv => "csv",
            Format::Json => "json",
            Format::Parquet => "parquet",
        }
    }
}

fn read_file(path: &Path, format: Format, options: &LoadOptions) -> Result<Table, LoadError> {
    match format {
        Format::Csv => load_csv(path, options),
        Format::Json => load_json(path, options),
        Format::Parquet => load_parquet(path, options),
    }
}

/// Download `url` into a temporary file and load it from there. The file is
/// removed when loading finishes.
fn load_remote(url: &str, options: &LoadOptions) -> Result<Table, LoadError> {
    let format = Format::from_name(url)?;
    info!("Downloading {url}");

    let response = ureq::get(url).call().map_err(|e| LoadError::Http {
        url: url.to_string(),
        source: Box::new(e),
    })?;

    let mut file = tempfile::Builder::new()
        .prefix("collisions-")
        .suffix(&format!(".{}", format.extension()))
        .tempfile()
        .map_err(|e| LoadError::io(url, e))?;
    let bytes = io::copy(&mut response.into_reader(), &mut file)
        .and_then(|n| file.flush().map(|()| n))
        .map_err(|e| LoadError::io(url, e))?;
    debug!("Downloaded {bytes} bytes to {}", file.path().display());

    read_file(file.path(), format, options)
}

// ---------------------------------------------------------------------------
// Row collection shared by every format
// ---------------------------------------------------------------------------

/// Turns raw cells into records, counting and logging the rows it rejects.
struct RowCollector {
    schema: Schema,
    max_rows: Option<usize>,
    seen: usize,
    records: Vec<CollisionRecord>,
    skipped: usize,
}

impl RowCollector {
    fn new(headers: &[String], options: &LoadOptions) -> Result<Self, LoadError> {
        Ok(RowCollector {
            schema: Schema::resolve(headers)?,
            max_rows: options.max_rows,
            seen: 0,
            records: Vec::new(),
            skipped: 0,
        })
    }

    fn is_full(&self) -> bool {
        self.max_rows.is_some_and(|max| self.seen >= max)
    }

    fn push(&mut self, cells: &[Option<&str>]) {
        match build_record(&self.schema, cells) {
            Ok(record) => {
                self.seen += 1;
                self.records.push(record);
            }
            Err(reason) => self.skip(reason),
        }
    }

    fn skip(&mut self, reason: impl Display) {
        self.seen += 1;
        self.skipped += 1;
        if self.skipped <= MAX_LOGGED_SKIPS {
            warn!("Skipping data line {}: {reason}", self.seen);
        }
    }

    fn finish(self) -> Table {
        if self.skipped > MAX_LOGGED_SKIPS {
            warn!("{} malformed data lines skipped in total", self.skipped);
        }
        let slots = self.schema.factor_slots();
        Table::new(self.records, self.skipped, slots)
    }
}

fn build_record(schema: &Schema, cells: &[Option<&str>]) -> Result<CollisionRecord, String> {
    let cell = |idx: Option<usize>| -> Option<&str> {
        idx.and_then(|i| cells.get(i).copied().flatten())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };
    let text = |idx: Option<usize>| cell(idx).unwrap_or(UNKNOWN).to_string();
    let count = |idx: Option<usize>| parse_count(cell(idx));

    let date = cell(Some(schema.date)).ok_or("missing crash date")?;
    let timestamp = parse_timestamp(date, cell(schema.time))?;

    let latitude = parse_coordinate(cell(Some(schema.latitude)))?;
    let longitude = parse_coordinate(cell(Some(schema.longitude)))?;
    // The export uses 0,0 for collisions it could not geocode.
    let (latitude, longitude) = match (latitude, longitude) {
        (Some(lat), Some(lon)) if lat == 0.0 && lon == 0.0 => (None, None),
        other => other,
    };

    let borough = match cell(schema.borough) {
        None => Borough::Unknown,
        Some(raw) => {
            let b = Borough::from_cell(raw);
            if b == Borough::Unknown {
                debug!("Unrecognised borough '{raw}' recorded as unknown");
            }
            b
        }
    };

    let c = &schema.casualties;
    let casualties = Casualties {
        persons_injured: count(c.persons_injured)?,
        persons_killed: count(c.persons_killed)?,
        pedestrians_injured: count(c.pedestrians_injured)?,
        pedestrians_killed: count(c.pedestrians_killed)?,
        cyclists_injured: count(c.cyclists_injured)?,
        cyclists_killed: count(c.cyclists_killed)?,
        motorists_injured: count(c.motorists_injured)?,
        motorists_killed: count(c.motorists_killed)?,
    };

    Ok(CollisionRecord {
        collision_id: cell(schema.collision_id).and_then(|s| s.parse().ok()),
        timestamp,
        latitude,
        longitude,
        borough,
        on_street: text(schema.on_street),
        cross_street: text(schema.cross_street),
        off_street: text(schema.off_street),
        casualties,
        factors: schema.factors.iter().map(|&(_, i)| text(Some(i))).collect(),
    })
}

// ---------------------------------------------------------------------------
// Cell parsers
// ---------------------------------------------------------------------------

const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%Y-%m-%d"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];
const TIME_FORMATS: &[&str] = &["%H:%M", "%H:%M:%S", "%H:%M:%S%.f"];

/// Combine a date cell with an optional time cell. A separate time cell
/// overrides any time carried by the date cell; neither means midnight.
fn parse_timestamp(date: &str, time: Option<&str>) -> Result<NaiveDateTime, String> {
    let (day, embedded) = if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(date, f).ok())
    {
        (dt.date(), dt.time())
    } else {
        let day = DATE_FORMATS
            .iter()
            .find_map(|f| NaiveDate::parse_from_str(date, f).ok())
            .ok_or_else(|| format!("unparseable crash date '{date}'"))?;
        (day, NaiveTime::MIN)
    };

    let time = match time {
        Some(t) => TIME_FORMATS
            .iter()
            .find_map(|f| NaiveTime::parse_from_str(t, f).ok())
            .ok_or_else(|| format!("unparseable crash time '{t}'"))?,
        None => embedded,
    };
    Ok(day.and_time(time))
}

fn parse_coordinate(cell: Option<&str>) -> Result<Option<f64>, String> {
    let Some(s) = cell else {
        return Ok(None);
    };
    let v: f64 = s
        .parse()
        .map_err(|_| format!("coordinate '{s}' is not a number"))?;
    Ok(v.is_finite().then_some(v))
}

/// Blank means zero. Accepts `"2.0"` as written by float-typed exports.
fn parse_count(cell: Option<&str>) -> Result<u32, String> {
    let Some(s) = cell else {
        return Ok(0);
    };
    if let Ok(n) = s.parse::<u32>() {
        return Ok(n);
    }
    match s.parse::<f64>() {
        Ok(f) if f.is_nan() => Ok(0),
        Ok(f) if f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64 => Ok(f as u32),
        _ => Err(format!("count '{s}' is not a non-negative integer")),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_csv(path: &Path, options: &LoadOptions) -> Result<Table, LoadError> {
    let file = File::open(path).map_err(|e| LoadError::io(path, e))?;
    let mut reader = csv::Reader::from_reader(file);
    let headers: Vec<String> = reader.headers()?.iter().map(normalize_header).collect();
    let mut rows = RowCollector::new(&headers, options)?;

    for result in reader.records() {
        if rows.is_full() {
            break;
        }
        match result {
            Ok(record) => {
                let cells: Vec<Option<&str>> = record.iter().map(Some).collect();
                rows.push(&cells);
            }
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => rows.skip(e),
        }
    }

    Ok(rows.finish())
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON as served by the open-data API. Keys with null
/// values are often omitted, so the header set is the union of all keys.
fn load_json(path: &Path, options: &LoadOptions) -> Result<Table, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
    let root: JsonValue = serde_json::from_str(&text)?;
    let records = root
        .as_array()
        .ok_or_else(|| LoadError::Malformed("expected top-level JSON array".into()))?;

    let mut keys: Vec<String> = Vec::new();
    for obj in records.iter().filter_map(JsonValue::as_object) {
        for key in obj.keys() {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
    }
    let headers: Vec<String> = keys.iter().map(|k| normalize_header(k)).collect();
    let mut rows = RowCollector::new(&headers, options)?;

    for rec in records {
        if rows.is_full() {
            break;
        }
        let Some(obj) = rec.as_object() else {
            rows.skip("row is not a JSON object");
            continue;
        };
        let owned: Vec<Option<String>> = keys
            .iter()
            .map(|k| obj.get(k).and_then(json_to_cell))
            .collect();
        let cells: Vec<Option<&str>> = owned.iter().map(Option::as_deref).collect();
        rows.push(&cells);
    }

    Ok(rows.finish())
}

fn json_to_cell(val: &JsonValue) -> Option<String> {
    match val {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Every column is rendered to text with Arrow's display formatter and then
/// goes through the same cell parsers as CSV, so typed and string-typed
/// exports behave alike.
fn load_parquet(path: &Path, options: &LoadOptions) -> Result<Table, LoadError> {
    let file = File::open(path).map_err(|e| LoadError::io(path, e))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let headers: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| normalize_header(f.name()))
        .collect();
    let mut rows = RowCollector::new(&headers, options)?;
    let reader = builder.build()?;

    'batches: for batch_result in reader {
        let batch = batch_result?;
        for row in 0..batch.num_rows() {
            if rows.is_full() {
                break 'batches;
            }
            let owned = batch
                .columns()
                .iter()
                .map(|col| {
                    if col.is_null(row) {
                        Ok(None)
                    } else {
                        array_value_to_string(col, row).map(Some)
                    }
                })
                .collect::<Result<Vec<Option<String>>, _>>()?;
            let cells: Vec<Option<&str>> = owned.iter().map(Option::as_deref).collect();
            rows.push(&cells);
        }
    }

    Ok(rows.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_formats() {
        let ts = parse_timestamp("09/11/2021", Some("2:39")).unwrap();
        assert_eq!(ts.to_string(), "2021-09-11 02:39:00");

        let ts = parse_timestamp("2021-09-11T00:00:00.000", Some("14:05")).unwrap();
        assert_eq!(ts.to_string(), "2021-09-11 14:05:00");

        let ts = parse_timestamp("2021-09-11 08:30:00", None).unwrap();
        assert_eq!(ts.to_string(), "2021-09-11 08:30:00");

        let ts = parse_timestamp("2021-09-11", None).unwrap();
        assert_eq!(ts.to_string(), "2021-09-11 00:00:00");

        assert!(parse_timestamp("yesterday", None).is_err());
        assert!(parse_timestamp("09/11/2021", Some("noon")).is_err());
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count(None), Ok(0));
        assert_eq!(parse_count(Some("3")), Ok(3));
        assert_eq!(parse_count(Some("2.0")), Ok(2));
        assert_eq!(parse_count(Some("NaN")), Ok(0));
        assert!(parse_count(Some("-1")).is_err());
        assert!(parse_count(Some("1.5")).is_err());
        assert!(parse_count(Some("many")).is_err());
    }

    #[test]
    fn test_parse_coordinate() {
        assert_eq!(parse_coordinate(None), Ok(None));
        assert_eq!(parse_coordinate(Some("40.71")), Ok(Some(40.71)));
        assert!(parse_coordinate(Some("north")).is_err());
    }

    #[test]
    fn test_resolve_source() {
        assert_eq!(
            resolve_source(Path::new("file:///tmp/crashes.csv")).unwrap(),
            Source::Local(PathBuf::from("/tmp/crashes.csv"))
        );
        assert_eq!(
            resolve_source(Path::new("data/crashes.csv")).unwrap(),
            Source::Local(PathBuf::from("data/crashes.csv"))
        );
        assert_eq!(
            resolve_source(Path::new("https://data.cityofnewyork.us/x.csv")).unwrap(),
            Source::Remote("https://data.cityofnewyork.us/x.csv".into())
        );
        assert!(matches!(
            resolve_source(Path::new("ftp://example.org/x.csv")),
            Err(LoadError::UnsupportedSource(_))
        ));
    }

    #[test]
    fn test_format_from_url_ignores_query() {
        assert_eq!(
            Format::from_name("https://host/api/views/h9gi-nx95/rows.csv?accessType=DOWNLOAD")
                .unwrap(),
            Format::Csv
        );
        assert_eq!(
            Format::from_name("https://host/resource/h9gi-nx95.json#top").unwrap(),
            Format::Json
        );
        assert!(matches!(
            Format::from_name("https://host/resource/h9gi-nx95"),
            Err(LoadError::UnsupportedFormat(ext)) if ext.is_empty()
        ));
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(matches!(
            load("collisions.xlsx"),
            Err(LoadError::UnsupportedFormat(ext)) if ext == "xlsx"
        ));
    }
}

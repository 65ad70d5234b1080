use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use clap::Parser;
use parquet::arrow::ArrowWriter;

/// Write a synthetic NYC collision dataset in the open-data column layout.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Number of collisions to generate.
    #[arg(long, default_value_t = 5_000)]
    rows: usize,

    /// Output file; `.csv` or `.parquet`.
    #[arg(long, default_value = "sample_collisions.csv")]
    out: PathBuf,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next_f64() * n as f64) as usize % n.max(1)
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[self.below(items.len())]
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Rough borough centres used to scatter coordinates.
const BOROUGHS: &[(&str, f64, f64)] = &[
    ("MANHATTAN", 40.7831, -73.9712),
    ("BROOKLYN", 40.6782, -73.9442),
    ("QUEENS", 40.7282, -73.7949),
    ("BRONX", 40.8448, -73.8648),
    ("STATEN ISLAND", 40.5795, -74.1502),
];

const STREETS: &[&str] = &[
    "BROADWAY",
    "ATLANTIC AVENUE",
    "QUEENS BOULEVARD",
    "GRAND CONCOURSE",
    "HYLAN BOULEVARD",
    "FLATBUSH AVENUE",
    "2 AVENUE",
];

const FACTORS: &[&str] = &[
    "Driver Inattention/Distraction",
    "Failure to Yield Right-of-Way",
    "Following Too Closely",
    "Unsafe Speed",
    "Passing or Lane Usage Improper",
    "Backing Unsafely",
    "Unspecified",
    "Unspecified",
];

/// Typical hourly shape: quiet overnight, peaks at the commutes.
const HOUR_WEIGHTS: [u32; 24] = [
    3, 2, 2, 1, 1, 2, 4, 6, 8, 7, 6, 6, 7, 7, 8, 9, 10, 10, 8, 6, 5, 4, 4, 3,
];

const HEADERS: &[&str] = &[
    "CRASH DATE",
    "CRASH TIME",
    "BOROUGH",
    "LATITUDE",
    "LONGITUDE",
    "ON STREET NAME",
    "CROSS STREET NAME",
    "NUMBER OF PERSONS INJURED",
    "NUMBER OF PERSONS KILLED",
    "NUMBER OF CYCLIST INJURED",
    "NUMBER OF MOTORIST INJURED",
    "CONTRIBUTING FACTOR VEHICLE 1",
    "CONTRIBUTING FACTOR VEHICLE 2",
    "COLLISION_ID",
];

struct Row {
    date: String,
    time: String,
    borough: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    on_street: String,
    cross_street: String,
    persons_injured: i64,
    persons_killed: i64,
    cyclists_injured: i64,
    motorists_injured: i64,
    factor_1: String,
    factor_2: String,
    id: i64,
}

fn weighted_hour(rng: &mut SimpleRng) -> u32 {
    let total: u32 = HOUR_WEIGHTS.iter().sum();
    let mut roll = rng.below(total as usize) as u32;
    for (hour, &w) in HOUR_WEIGHTS.iter().enumerate() {
        if roll < w {
            return hour as u32;
        }
        roll -= w;
    }
    23
}

fn generate(rows: usize, rng: &mut SimpleRng) -> Vec<Row> {
    (0..rows)
        .map(|i| {
            let (borough, lat, lon) = BOROUGHS[rng.below(BOROUGHS.len())];
            // Some reports carry no borough or no geocode, like the real export.
            let borough = if rng.next_f64() < 0.3 { "" } else { borough };
            let geocoded = rng.next_f64() > 0.08;

            let injured = match rng.next_f64() {
                p if p < 0.7 => 0,
                p if p < 0.9 => 1,
                p if p < 0.97 => 2,
                _ => 3 + rng.below(4) as i64,
            };
            let cyclists = if injured > 0 && rng.next_f64() < 0.1 { 1 } else { 0 };
            let has_second_vehicle = rng.next_f64() < 0.75;

            Row {
                date: format!("{:02}/{:02}/2021", 1 + rng.below(12), 1 + rng.below(28)),
                time: format!("{}:{:02}", weighted_hour(rng), rng.below(60)),
                borough: borough.to_string(),
                latitude: geocoded.then(|| rng.gauss(lat, 0.02)),
                longitude: geocoded.then(|| rng.gauss(lon, 0.02)),
                on_street: rng.pick(STREETS).to_string(),
                cross_street: rng.pick(STREETS).to_string(),
                persons_injured: injured,
                persons_killed: i64::from(rng.next_f64() < 0.002),
                cyclists_injured: cyclists,
                motorists_injured: injured - cyclists,
                factor_1: rng.pick(FACTORS).to_string(),
                factor_2: if has_second_vehicle {
                    rng.pick(FACTORS).to_string()
                } else {
                    String::new()
                },
                id: 4_400_000 + i as i64,
            }
        })
        .collect()
}

fn write_csv(path: &Path, rows: &[Row]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;
    writer.write_record(HEADERS)?;
    let coord = |v: Option<f64>| v.map(|v| format!("{v:.6}")).unwrap_or_default();
    for r in rows {
        writer.write_record([
            r.date.clone(),
            r.time.clone(),
            r.borough.clone(),
            coord(r.latitude),
            coord(r.longitude),
            r.on_street.clone(),
            r.cross_street.clone(),
            r.persons_injured.to_string(),
            r.persons_killed.to_string(),
            r.cyclists_injured.to_string(),
            r.motorists_injured.to_string(),
            r.factor_1.clone(),
            r.factor_2.clone(),
            r.id.to_string(),
        ])?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

fn write_parquet(path: &Path, rows: &[Row]) -> Result<()> {
    let strings = |f: fn(&Row) -> &str| -> ArrayRef {
        Arc::new(StringArray::from(rows.iter().map(f).collect::<Vec<_>>()))
    };
    let optional_strings = |f: fn(&Row) -> &str| -> ArrayRef {
        Arc::new(StringArray::from(
            rows.iter()
                .map(|r| Some(f(r)).filter(|s| !s.is_empty()))
                .collect::<Vec<_>>(),
        ))
    };
    let counts = |f: fn(&Row) -> i64| -> ArrayRef {
        Arc::new(Int64Array::from(rows.iter().map(f).collect::<Vec<_>>()))
    };
    let coords = |f: fn(&Row) -> Option<f64>| -> ArrayRef {
        Arc::new(Float64Array::from(rows.iter().map(f).collect::<Vec<_>>()))
    };

    let columns: Vec<(&str, ArrayRef)> = vec![
        (HEADERS[0], strings(|r| r.date.as_str())),
        (HEADERS[1], strings(|r| r.time.as_str())),
        (HEADERS[2], optional_strings(|r| r.borough.as_str())),
        (HEADERS[3], coords(|r| r.latitude)),
        (HEADERS[4], coords(|r| r.longitude)),
        (HEADERS[5], strings(|r| r.on_street.as_str())),
        (HEADERS[6], strings(|r| r.cross_street.as_str())),
        (HEADERS[7], counts(|r| r.persons_injured)),
        (HEADERS[8], counts(|r| r.persons_killed)),
        (HEADERS[9], counts(|r| r.cyclists_injured)),
        (HEADERS[10], counts(|r| r.motorists_injured)),
        (HEADERS[11], strings(|r| r.factor_1.as_str())),
        (HEADERS[12], optional_strings(|r| r.factor_2.as_str())),
        (HEADERS[13], counts(|r| r.id)),
    ];

    let schema = Arc::new(Schema::new(
        columns
            .iter()
            .map(|(name, array)| {
                let nullable = array.null_count() > 0;
                Field::new(*name, array.data_type().clone(), nullable)
            })
            .collect::<Vec<_>>(),
    ));

    let batch = RecordBatch::try_new(
        schema.clone(),
        columns.into_iter().map(|(_, array)| array).collect(),
    )
    .context("building record batch")?;

    let file = std::fs::File::create(path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut rng = SimpleRng::new(args.seed);
    let rows = generate(args.rows, &mut rng);

    let ext = args
        .out
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "csv" => write_csv(&args.out, &rows)?,
        "parquet" | "pq" => write_parquet(&args.out, &rows)?,
        other => bail!("Unsupported output extension: .{other}"),
    }

    log::info!("Wrote {} collisions to {}", rows.len(), args.out.display());
    println!("Wrote {} collisions to {}", rows.len(), args.out.display());
    Ok(())
}

/// Data layer: core types, loading, filtering and aggregation.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet  (local path, file:// or http(s)://)
///        │
///        ▼
///   ┌──────────┐
///   │  schema   │  normalise headers → resolved column positions
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse rows → Table (Vec<CollisionRecord>)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  FilterCriteria → validated predicate → matching indices
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ aggregate  │  group matching rows → AggregatedView
///   └───────────┘
/// ```

pub mod aggregate;
pub mod error;
pub mod filter;
pub mod loader;
pub mod model;
pub mod schema;

pub use aggregate::{AggregatedView, GroupBy, GroupKey, aggregate};
pub use error::{InvalidCriteriaError, LoadError};
pub use filter::{DateRange, FilterCriteria};
pub use loader::{LoadOptions, load, load_with};
pub use model::{Borough, Casualties, CollisionRecord, Table};

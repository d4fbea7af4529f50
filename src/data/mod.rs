/// Data layer: core types, loading, filtering, sorting, export and charting.
///
/// Architecture:
/// ```text
///  .csv / .tsv / .xlsx / .xls / .ods / .pdf / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  jobs    │  worker thread per load, stale generations dropped
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse bytes → Dataset (headers + typed cells)
///   └──────────┘
///        │
///        ▼
///   ┌───────────────┐
///   │ filter + sort │  FilterSpec list (AND) + SortSpec → visible row indices
///   └───────────────┘
///        │                 │
///        ▼                 ▼
///   ┌──────────┐     ┌──────────┐
///   │  export   │     │  chart    │  visible rows → CSV bytes / series
///   └──────────┘     └──────────┘
/// ```

pub mod chart;
pub mod export;
pub mod filter;
pub mod jobs;
pub mod loader;
pub mod model;
pub mod sort;

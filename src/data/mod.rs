/// Data layer: core types and loading.
///
/// Architecture:
/// ```text
///  .txt / .tsv / .csv instrument export
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  header → Metadata, sample table → time/signal
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Trace    │  immutable samples + metadata + units
///   └──────────┘
/// ```

pub mod loader;
pub mod model;

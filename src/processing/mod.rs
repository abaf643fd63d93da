/// Signal processing: smoothing, baseline, peaks, quantitation.
///
/// Architecture:
/// ```text
///   Trace (time, signal)
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  Savitzky–Golay smoothing, polynomial fits
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ baseline  │  smoothed curve → masked polynomial baseline
///   └──────────┘
///        │  smoothed − baseline
///        ▼
///   ┌──────────┐
///   │  peaks    │  apexes, prominence, boundary windows → Vec<Peak>
///   └──────────┘
///        │  per peak
///        ▼
///   ┌───────────┐  ┌──────────┐
///   │ integrate  │  │ elution   │  area (Simpson) / volume (rt × flow)
///   └───────────┘  └──────────┘
/// ```

pub mod baseline;
pub mod elution;
pub mod filter;
pub mod integrate;
pub mod peaks;

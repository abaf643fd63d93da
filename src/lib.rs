//! Peak detection and quantitation for single-channel liquid-chromatography
//! fluorescence traces.
//!
//! ```no_run
//! use rusty_chroma::{Chromatogram, DetectionParams};
//!
//! # fn main() -> rusty_chroma::Result<()> {
//! let mut chromatogram = Chromatogram::load("run.txt")?;
//! let peaks = chromatogram.detect_peaks(&DetectionParams::default())?.to_vec();
//! for peak in &peaks {
//!     let area = chromatogram.calculate_peak_area(peak)?;
//!     let volume = chromatogram.calculate_elution_volume(peak, 0.5)?;
//!     println!("{:.3} min  area {area:.4}  {volume:.3} mL", peak.retention_time);
//! }
//! # Ok(())
//! # }
//! ```

pub mod chromatogram;
pub mod config;
pub mod data;
pub mod error;
pub mod processing;
pub mod report;

pub use chromatogram::Chromatogram;
pub use config::AnalysisConfig;
pub use data::model::{Metadata, MetadataValue, Trace, TraceId};
pub use error::{ChromError, Result};
pub use processing::baseline::{BaselineModel, SmoothingParams, WindowAdjustment};
pub use processing::peaks::{DetectionParams, Peak};
pub use report::PeakSummary;

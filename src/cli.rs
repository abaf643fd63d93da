use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use rusty_chroma::AnalysisConfig;

#[derive(Parser, Debug)]
#[command(
    name = "rusty-chroma",
    version,
    about = "Detect and quantify peaks in a liquid-chromatography trace export"
)]
pub struct Cli {
    /// Instrument export (.txt/.tsv tab-delimited, .csv comma-delimited)
    pub input: PathBuf,

    /// JSON analysis config; flags below override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Flow rate (volume per trace time unit) for elution volumes
    #[arg(short, long)]
    pub flow_rate: Option<f64>,

    /// Minimum apex height [default: mean + 1 std of the detrended signal]
    #[arg(long)]
    pub min_height: Option<f64>,

    /// Minimum peak prominence [default: 1.0]
    #[arg(long)]
    pub prominence: Option<f64>,

    /// Samples around each apex searched for its boundaries [default: 100]
    #[arg(long)]
    pub peak_window_length: Option<usize>,

    /// Savitzky-Golay window length, odd [default: 25]
    #[arg(long)]
    pub sg_window_length: Option<usize>,

    /// Polynomial degree for smoothing and baseline [default: 3]
    #[arg(long)]
    pub poly_degree: Option<usize>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Write the peak table here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Csv,
    Json,
}

impl Cli {
    /// Lay the command-line flags over a (file or default) config.
    pub fn apply_overrides(&self, mut config: AnalysisConfig) -> AnalysisConfig {
        let detection = &mut config.detection;
        if let Some(v) = self.min_height {
            detection.min_height = Some(v);
        }
        if let Some(v) = self.prominence {
            detection.prominence = v;
        }
        if let Some(v) = self.peak_window_length {
            detection.peak_window_length = v;
        }
        if let Some(v) = self.sg_window_length {
            detection.sg_window_length = v;
        }
        if let Some(v) = self.poly_degree {
            detection.poly_degree = v;
        }
        if self.flow_rate.is_some() {
            config.flow_rate = self.flow_rate;
        }
        config
    }
}

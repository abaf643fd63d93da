use std::fmt::Write as _;
use std::io::Write;

use serde::Serialize;

use crate::chromatogram::Chromatogram;
use crate::data::model::{Metadata, TraceId};
use crate::error::Result;
use crate::processing::baseline::{SmoothingParams, WindowAdjustment};

/// One row of the peak table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakSummary {
    /// 1-based position in retention order.
    pub number: usize,
    pub retention_time: f64,
    pub start_time: f64,
    pub end_time: f64,
    pub height: f64,
    pub area: f64,
    /// Present when a flow rate was supplied.
    pub elution_volume: Option<f64>,
}

/// Peak table plus the run context it was computed from, for JSON output.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub trace_id: TraceId,
    pub channel: Option<String>,
    pub samples: usize,
    pub time_unit: &'a str,
    pub signal_unit: &'a str,
    /// Smoothing actually applied to the trace.
    pub smoothing: SmoothingParams,
    pub window_adjustment: Option<&'a WindowAdjustment>,
    pub flow_rate: Option<f64>,
    pub metadata: &'a Metadata,
    pub peaks: &'a [PeakSummary],
}

impl<'a> RunReport<'a> {
    pub fn new(chromatogram: &'a Chromatogram, peaks: &'a [PeakSummary], flow_rate: Option<f64>) -> Self {
        let trace = chromatogram.trace();
        let baseline = chromatogram.baseline();
        RunReport {
            trace_id: trace.id(),
            channel: trace.metadata().channel(),
            samples: trace.len(),
            time_unit: trace.time_unit(),
            signal_unit: trace.signal_unit(),
            smoothing: baseline.params(),
            window_adjustment: baseline.adjustment(),
            flow_rate,
            metadata: trace.metadata(),
            peaks,
        }
    }
}

pub fn write_csv<W: Write>(rows: &[PeakSummary], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_json<W: Write>(report: &RunReport<'_>, writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, report)?;
    Ok(())
}

/// Fixed-width table for terminals.
pub fn render_text(rows: &[PeakSummary], time_unit: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>4}  {:>10}  {:>10}  {:>10}  {:>12}  {:>12}  {:>10}",
        "#",
        format!("RT ({time_unit})"),
        "start",
        "end",
        "height",
        "area",
        "volume"
    );
    for row in rows {
        let volume = row
            .elution_volume
            .map(|v| format!("{v:.4}"))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:>4}  {:>10.4}  {:>10.4}  {:>10.4}  {:>12.4}  {:>12.4}  {:>10}",
            row.number, row.retention_time, row.start_time, row.end_time, row.height, row.area, volume
        );
    }
    out
}

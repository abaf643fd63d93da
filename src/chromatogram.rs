use std::path::Path;

use log::info;

use crate::data::loader;
use crate::data::model::{Metadata, Trace};
use crate::error::{ChromError, Result};
use crate::processing::baseline::{BaselineModel, SmoothingParams};
use crate::processing::elution::elution_volume;
use crate::processing::integrate::peak_area;
use crate::processing::peaks::{self, DetectionParams, Peak};
use crate::report::PeakSummary;

// ---------------------------------------------------------------------------
// Chromatogram
// ---------------------------------------------------------------------------

/// One loaded trace, its current baseline and the peaks last detected on it.
///
/// Areas and volumes are computed on demand from the trace and baseline;
/// nothing derived from a peak is cached here.
#[derive(Debug, Clone)]
pub struct Chromatogram {
    trace: Trace,
    baseline: BaselineModel,
    /// Ascending retention time.
    peaks: Vec<Peak>,
    /// Parameters of the last successful detection.
    params: Option<DetectionParams>,
}

impl Chromatogram {
    /// Load an instrument export and estimate a baseline with default
    /// smoothing. No peaks are detected yet.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let trace = loader::load_file(path.as_ref())?;
        Self::from_trace(trace)
    }

    pub fn from_trace(trace: Trace) -> Result<Self> {
        let baseline = BaselineModel::estimate(&trace, SmoothingParams::default())?;
        Ok(Self {
            trace,
            baseline,
            peaks: Vec::new(),
            params: None,
        })
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn metadata(&self) -> &Metadata {
        self.trace.metadata()
    }

    pub fn baseline(&self) -> &BaselineModel {
        &self.baseline
    }

    pub fn peaks(&self) -> &[Peak] {
        &self.peaks
    }

    pub fn detection_params(&self) -> Option<&DetectionParams> {
        self.params.as_ref()
    }

    /// Raw signal minus the current baseline.
    pub fn detrended(&self) -> Vec<f64> {
        self.baseline.detrend(self.trace.signal())
    }

    /// Re-estimate the baseline with the given smoothing and replace the peak
    /// collection with a fresh detection. On error the previous baseline and
    /// peaks are kept.
    pub fn detect_peaks(&mut self, params: &DetectionParams) -> Result<&[Peak]> {
        params.validate()?;
        let baseline = BaselineModel::estimate(&self.trace, params.smoothing())?;
        let peaks = peaks::detect(&self.trace, &baseline, params)?;

        info!(
            "detected {} peak(s) in {} ({} samples)",
            peaks.len(),
            self.trace.id(),
            self.trace.len()
        );
        self.baseline = baseline;
        self.peaks = peaks;
        self.params = Some(*params);
        Ok(&self.peaks)
    }

    /// Simpson-rule area of the detrended signal between the peak's
    /// boundaries.
    pub fn calculate_peak_area(&self, peak: &Peak) -> Result<f64> {
        self.check_peak(peak)?;
        let detrended = self.detrended();
        Ok(peak_area(self.trace.time(), &detrended, peak))
    }

    /// `retention_time × flow_rate`.
    pub fn calculate_elution_volume(&self, peak: &Peak, flow_rate: f64) -> Result<f64> {
        elution_volume(peak.retention_time, flow_rate)
    }

    /// One summary row per current peak, with volumes when a flow rate is
    /// given.
    pub fn peak_table(&self, flow_rate: Option<f64>) -> Result<Vec<PeakSummary>> {
        let detrended = self.detrended();
        let time = self.trace.time();

        self.peaks
            .iter()
            .enumerate()
            .map(|(i, peak)| {
                let elution_volume = flow_rate
                    .map(|rate| self.calculate_elution_volume(peak, rate))
                    .transpose()?;
                Ok(PeakSummary {
                    number: i + 1,
                    retention_time: peak.retention_time,
                    start_time: time[peak.left_boundary_index],
                    end_time: time[peak.right_boundary_index],
                    height: peak.apex_height,
                    area: peak_area(time, &detrended, peak),
                    elution_volume,
                })
            })
            .collect()
    }

    /// A peak is usable only if it came from the current detection on this
    /// chromatogram's trace.
    fn check_peak(&self, peak: &Peak) -> Result<()> {
        if peak.trace_id != self.trace.id() {
            return Err(ChromError::InvalidPeak(format!(
                "peak at {} belongs to {}, not {}",
                peak.retention_time,
                peak.trace_id,
                self.trace.id()
            )));
        }
        if !self.peaks.contains(peak) {
            return Err(ChromError::InvalidPeak(format!(
                "peak at {} is not part of the current detection",
                peak.retention_time
            )));
        }
        Ok(())
    }
}

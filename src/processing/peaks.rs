use std::ops::RangeInclusive;

use log::debug;
use serde::{Deserialize, Serialize};

use super::baseline::{BaselineModel, SmoothingParams};
use crate::data::model::{Trace, TraceId};
use crate::error::{ChromError, Result};

// ---------------------------------------------------------------------------
// Detection parameters
// ---------------------------------------------------------------------------

/// Tunables of [`crate::Chromatogram::detect_peaks`]. Missing fields in a
/// config file fall back to the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionParams {
    /// Minimum apex height. `None` means one standard deviation above the
    /// mean of the searched signal.
    pub min_height: Option<f64>,
    /// Minimum vertical drop from the apex to the higher surrounding minimum.
    pub prominence: f64,
    /// Samples around an apex considered for prominence and boundaries.
    pub peak_window_length: usize,
    pub sg_window_length: usize,
    pub poly_degree: usize,
}

impl DetectionParams {
    pub const DEFAULT_PROMINENCE: f64 = 1.0;
    pub const DEFAULT_PEAK_WINDOW_LENGTH: usize = 100;

    pub fn smoothing(&self) -> SmoothingParams {
        SmoothingParams::new(self.sg_window_length, self.poly_degree)
    }

    /// Reject values no trace could make sense of. Smoothing parameters are
    /// checked against the trace length by [`SmoothingParams::resolve`].
    pub fn validate(&self) -> Result<()> {
        if let Some(h) = self.min_height {
            if !h.is_finite() {
                return Err(ChromError::parameter(format!(
                    "min_height must be finite, got {h}"
                )));
            }
        }
        if !self.prominence.is_finite() || self.prominence < 0.0 {
            return Err(ChromError::parameter(format!(
                "prominence must be a non-negative number, got {}",
                self.prominence
            )));
        }
        if self.peak_window_length == 0 {
            return Err(ChromError::parameter("peak_window_length must be at least 1"));
        }
        Ok(())
    }

    /// Half-width of the boundary/prominence window, at least one sample.
    pub fn half_window(&self) -> usize {
        (self.peak_window_length / 2).max(1)
    }
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            min_height: None,
            prominence: Self::DEFAULT_PROMINENCE,
            peak_window_length: Self::DEFAULT_PEAK_WINDOW_LENGTH,
            sg_window_length: SmoothingParams::DEFAULT_WINDOW_LENGTH,
            poly_degree: SmoothingParams::DEFAULT_POLY_DEGREE,
        }
    }
}

// ---------------------------------------------------------------------------
// Peak
// ---------------------------------------------------------------------------

/// A detected peak, as indices into the trace it was found in.
///
/// Invariant: `left_boundary_index < apex_index < right_boundary_index`,
/// all within the trace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub trace_id: TraceId,
    pub apex_index: usize,
    /// Trace time at the apex.
    pub retention_time: f64,
    pub left_boundary_index: usize,
    pub right_boundary_index: usize,
    /// Baseline-corrected height at the apex.
    pub apex_height: f64,
}

impl Peak {
    /// Sample indices covered by the peak, boundaries included.
    pub fn window(&self) -> RangeInclusive<usize> {
        self.left_boundary_index..=self.right_boundary_index
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Find peaks in the baseline-corrected, smoothed signal of `trace`.
/// Peaks come out in ascending retention time.
pub fn detect(trace: &Trace, baseline: &BaselineModel, params: &DetectionParams) -> Result<Vec<Peak>> {
    params.validate()?;
    if baseline.trace_id() != trace.id() {
        return Err(ChromError::parameter(format!(
            "baseline belongs to {} but trace is {}",
            baseline.trace_id(),
            trace.id()
        )));
    }

    let signal = baseline.denoised_detrended();
    let min_height = params
        .min_height
        .unwrap_or_else(|| default_min_height(&signal));
    let half = params.half_window();

    let peaks: Vec<Peak> = find_apexes(&signal, min_height, params.prominence, half)
        .into_iter()
        .map(|apex| {
            let (left, right) = resolve_boundaries(&signal, apex, half);
            Peak {
                trace_id: trace.id(),
                apex_index: apex,
                retention_time: trace.time()[apex],
                left_boundary_index: left,
                right_boundary_index: right,
                apex_height: signal[apex],
            }
        })
        .collect();

    debug!(
        "{} peak(s) above height {min_height:.4} with prominence > {}",
        peaks.len(),
        params.prominence
    );
    Ok(peaks)
}

/// Mean plus one population standard deviation.
pub fn default_min_height(signal: &[f64]) -> f64 {
    if signal.is_empty() {
        return 0.0;
    }
    let n = signal.len() as f64;
    let mean = signal.iter().sum::<f64>() / n;
    let variance = signal.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    mean + variance.sqrt()
}

/// Strict local maxima taller than `min_height` whose prominence, measured
/// within `± half_window` samples, exceeds `min_prominence`.
pub(crate) fn find_apexes(signal: &[f64], min_height: f64, min_prominence: f64, half_window: usize) -> Vec<usize> {
    if signal.len() < 3 {
        return Vec::new();
    }
    (1..signal.len() - 1)
        .filter(|&i| signal[i] > signal[i - 1] && signal[i] > signal[i + 1])
        .filter(|&i| signal[i] > min_height)
        .filter(|&i| prominence(signal, i, half_window) > min_prominence)
        .collect()
}

/// Drop from the apex to the higher of the two minima reached walking
/// outward until higher terrain or the window edge.
pub(crate) fn prominence(signal: &[f64], apex: usize, half_window: usize) -> f64 {
    if apex >= signal.len() {
        return 0.0;
    }
    let height = signal[apex];
    let lo = apex.saturating_sub(half_window);
    let hi = (apex + half_window).min(signal.len() - 1);

    let left_min = (lo..apex)
        .rev()
        .map(|i| signal[i])
        .take_while(|&v| v <= height)
        .fold(height, f64::min);
    let right_min = (apex + 1..=hi)
        .map(|i| signal[i])
        .take_while(|&v| v <= height)
        .fold(height, f64::min);

    height - left_min.max(right_min)
}

/// Integration boundaries of the peak at `apex`.
///
/// Walks outward at most `half_window` samples and stops at the first
/// sample at or below zero, or at the first local minimum, whichever comes
/// first. Falls back to the window edge. Always returns
/// `left < apex < right` for an apex that is not the first or last sample.
pub(crate) fn resolve_boundaries(signal: &[f64], apex: usize, half_window: usize) -> (usize, usize) {
    let n = signal.len();
    if apex >= n {
        return (apex, apex);
    }
    let lo = apex.saturating_sub(half_window);
    let hi = (apex + half_window).min(n - 1);

    let left = (lo..apex)
        .rev()
        .find(|&i| signal[i] <= 0.0 || (i > 0 && signal[i - 1] >= signal[i]))
        .unwrap_or(lo);
    let right = (apex + 1..=hi)
        .find(|&i| signal[i] <= 0.0 || (i + 1 < n && signal[i + 1] >= signal[i]))
        .unwrap_or(hi);

    (left, right)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_apexes_requires_strict_maximum() {
        let signal = [0.0, 5.0, 5.0, 0.0, 3.0, 0.0];
        assert_eq!(find_apexes(&signal, 0.0, 0.0, 10), vec![4]);
    }

    #[test]
    fn test_find_apexes_height_and_prominence_filters() {
        let signal = [0.0, 10.0, 9.5, 9.8, 0.0, 4.0, 0.0];
        // 9.8 only rises 0.3 above the dip between it and the taller neighbour
        assert_eq!(find_apexes(&signal, 0.0, 1.0, 10), vec![1, 5]);
        assert_eq!(find_apexes(&signal, 5.0, 1.0, 10), vec![1]);
    }

    #[test]
    fn test_edges_are_never_apexes() {
        let signal = [9.0, 1.0, 2.0, 1.0, 9.0];
        assert_eq!(find_apexes(&signal, 0.0, 0.0, 10), vec![2]);
        assert!(find_apexes(&[1.0, 2.0], 0.0, 0.0, 10).is_empty());
    }

    #[test]
    fn test_prominence_is_bounded_by_window() {
        let signal = [0.0, 1.0, 2.0, 3.0, 10.0, 3.0, 2.0, 1.0, 0.0];
        assert_eq!(prominence(&signal, 4, 10), 10.0);
        assert_eq!(prominence(&signal, 4, 2), 8.0);
    }

    #[test]
    fn test_boundaries_stop_at_zero_crossing() {
        let signal = [1.0, 0.5, -0.1, 2.0, 6.0, 3.0, 0.0, 0.4, 1.0];
        assert_eq!(resolve_boundaries(&signal, 4, 10), (2, 6));
    }

    #[test]
    fn test_boundaries_stop_at_local_minimum() {
        let signal = [3.0, 2.0, 1.0, 2.0, 8.0, 4.0, 1.5, 2.5, 3.0];
        assert_eq!(resolve_boundaries(&signal, 4, 10), (2, 6));
    }

    #[test]
    fn test_boundaries_fall_back_to_window_edge() {
        let signal = [1.0, 2.0, 3.0, 4.0, 10.0, 4.0, 3.0, 2.0, 1.0];
        assert_eq!(resolve_boundaries(&signal, 4, 2), (2, 6));
        assert_eq!(resolve_boundaries(&signal, 4, 100), (0, 8));
    }

    #[test]
    fn test_boundaries_can_be_asymmetric_on_noisy_tails() {
        // A single wiggle on the right tail ends the peak early on that side
        // while the left side runs to the zero crossing.
        let signal = [-0.1, 1.0, 2.0, 4.0, 8.0, 4.0, 2.5, 2.6, 1.0, -0.1];
        let (left, right) = resolve_boundaries(&signal, 4, 10);
        assert_eq!((left, right), (0, 6));
        assert!(4 - left > right - 4);
    }

    #[test]
    fn test_apex_outside_signal_is_inert() {
        let signal = [0.0, 2.0, 0.0];
        assert_eq!(prominence(&signal, 3, 10), 0.0);
        assert_eq!(resolve_boundaries(&signal, 3, 10), (3, 3));
        assert_eq!(resolve_boundaries(&[], 0, 10), (0, 0));
    }

    #[test]
    fn test_params_validation() {
        assert!(DetectionParams::default().validate().is_ok());
        let bad = DetectionParams {
            peak_window_length: 0,
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(ChromError::Parameter(_))));
        let bad = DetectionParams {
            prominence: f64::NAN,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        assert_eq!(
            DetectionParams {
                peak_window_length: 1,
                ..Default::default()
            }
            .half_window(),
            1
        );
    }

    #[test]
    fn test_default_min_height() {
        let signal = [0.0, 0.0, 4.0, 0.0];
        // mean 1, population std sqrt(3)
        assert!((default_min_height(&signal) - (1.0 + 3.0_f64.sqrt())).abs() < 1e-12);
    }
}

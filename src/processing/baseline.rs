use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::filter::{polyfit, savitzky_golay, Polynomial};
use crate::data::model::{Trace, TraceId};
use crate::error::{ChromError, Result};

/// Residuals further than this many standard deviations above the current
/// fit are treated as peak, not baseline.
const PEAK_SIGMA: f64 = 2.0;
const MAX_ITERATIONS: usize = 100;

// ---------------------------------------------------------------------------
// Smoothing parameters
// ---------------------------------------------------------------------------

/// Savitzky–Golay settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmoothingParams {
    /// Filter window in samples; must be odd.
    pub window_length: usize,
    pub poly_degree: usize,
}

impl SmoothingParams {
    pub const DEFAULT_WINDOW_LENGTH: usize = 25;
    pub const DEFAULT_POLY_DEGREE: usize = 3;

    pub fn new(window_length: usize, poly_degree: usize) -> Self {
        Self {
            window_length,
            poly_degree,
        }
    }

    /// Fit the parameters to a trace of `n_samples` samples.
    ///
    /// A degree that is not below the requested window is a caller error.
    /// An even window is rounded up to the next odd length when the trace is
    /// long enough, otherwise down. A window longer than the trace becomes
    /// the largest odd length `<= n_samples`. The degree is lowered only when
    /// the trace length forces the window below it. Clamps are reported, not
    /// hidden.
    pub fn resolve(self, n_samples: usize) -> Result<(SmoothingParams, Option<WindowAdjustment>)> {
        if self.poly_degree >= self.window_length {
            return Err(ChromError::parameter(format!(
                "poly_degree ({}) must be less than sg_window_length ({})",
                self.poly_degree, self.window_length
            )));
        }

        let mut window = self.window_length.min(n_samples);
        if window % 2 == 0 {
            window = if window < n_samples { window + 1 } else { window.saturating_sub(1) };
        }
        let window = window.max(1);
        let applied = SmoothingParams {
            window_length: window,
            poly_degree: self.poly_degree.min(window - 1),
        };

        let adjustment = (applied != self).then_some(WindowAdjustment {
            requested: self,
            applied,
            n_samples,
        });
        Ok((applied, adjustment))
    }
}

impl Default for SmoothingParams {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW_LENGTH, Self::DEFAULT_POLY_DEGREE)
    }
}

/// Record of a smoothing window clamped to fit a short or even-length input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowAdjustment {
    pub requested: SmoothingParams,
    pub applied: SmoothingParams,
    pub n_samples: usize,
}

// ---------------------------------------------------------------------------
// BaselineModel
// ---------------------------------------------------------------------------

/// Baseline of one trace, derived from its Savitzky–Golay smoothed curve.
///
/// Immutable; estimate a new model when the trace or parameters change.
#[derive(Debug, Clone)]
pub struct BaselineModel {
    trace_id: TraceId,
    values: Vec<f64>,
    smoothed: Vec<f64>,
    params: SmoothingParams,
    adjustment: Option<WindowAdjustment>,
    baseline_degree: usize,
    iterations: usize,
}

impl BaselineModel {
    /// Smooth the trace and fit its baseline.
    ///
    /// The smoothed curve is the denoised signal. The baseline is a
    /// polynomial of degree `poly_degree` (at most `n - 1`) fitted to the
    /// smoothed curve, with samples rising more than `2σ` above the fit
    /// masked out and the fit repeated until the mask settles.
    pub fn estimate(trace: &Trace, params: SmoothingParams) -> Result<Self> {
        let (applied, adjustment) = params.resolve(trace.len())?;
        if let Some(adj) = &adjustment {
            warn!(
                "sg_window_length {} / poly_degree {} adjusted to {} / {} for a {}-sample trace",
                adj.requested.window_length,
                adj.requested.poly_degree,
                adj.applied.window_length,
                adj.applied.poly_degree,
                adj.n_samples
            );
        }

        let smoothed = savitzky_golay(trace.signal(), applied.window_length, applied.poly_degree);
        let degree = params.poly_degree.min(trace.len() - 1);
        let fit = masked_polynomial_fit(trace.time(), &smoothed, degree);
        debug!(
            "baseline: degree {} after {} iteration(s), {} of {} samples masked as peak",
            fit.polynomial.degree(),
            fit.iterations,
            fit.masked,
            trace.len()
        );

        let values = trace.time().iter().map(|&t| fit.polynomial.eval(t)).collect();
        Ok(BaselineModel {
            trace_id: trace.id(),
            values,
            smoothed,
            params: applied,
            adjustment,
            baseline_degree: fit.polynomial.degree(),
            iterations: fit.iterations,
        })
    }

    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// Baseline value per trace sample.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Savitzky–Golay smoothed signal the baseline was derived from.
    pub fn smoothed(&self) -> &[f64] {
        &self.smoothed
    }

    /// Smoothing parameters actually applied.
    pub fn params(&self) -> SmoothingParams {
        self.params
    }

    pub fn adjustment(&self) -> Option<&WindowAdjustment> {
        self.adjustment.as_ref()
    }

    pub fn baseline_degree(&self) -> usize {
        self.baseline_degree
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// `signal - baseline`, sample-wise.
    pub fn detrend(&self, signal: &[f64]) -> Vec<f64> {
        signal
            .iter()
            .zip(&self.values)
            .map(|(y, b)| y - b)
            .collect()
    }

    /// Smoothed signal minus baseline; the signal peaks are searched in.
    pub fn denoised_detrended(&self) -> Vec<f64> {
        self.detrend(&self.smoothed)
    }
}

// ---------------------------------------------------------------------------
// Peak-masked polynomial fit
// ---------------------------------------------------------------------------

struct MaskedFit {
    polynomial: Polynomial,
    iterations: usize,
    masked: usize,
}

fn masked_polynomial_fit(x: &[f64], y: &[f64], degree: usize) -> MaskedFit {
    let n = y.len();
    let (lo, hi) = y
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let floor = (hi - lo).max(hi.abs()).max(lo.abs()) * 1e-12 + f64::MIN_POSITIVE;

    let mut include = vec![true; n];
    let mut polynomial = fit_lowering_degree(x, y, &include, degree);
    let mut iterations = 1;

    while iterations < MAX_ITERATIONS {
        let residuals: Vec<f64> = x
            .iter()
            .zip(y)
            .map(|(&xi, &yi)| yi - polynomial.eval(xi))
            .collect();
        let kept = include.iter().filter(|&&keep| keep).count();
        let sigma = (residuals
            .iter()
            .zip(&include)
            .filter(|&(_, &keep)| keep)
            .map(|(r, _)| r * r)
            .sum::<f64>()
            / kept as f64)
            .sqrt();
        let threshold = PEAK_SIGMA * sigma + floor;

        let next: Vec<bool> = residuals.iter().map(|&r| r <= threshold).collect();
        if next == include || next.iter().filter(|&&keep| keep).count() <= degree + 1 {
            break;
        }
        include = next;
        polynomial = fit_lowering_degree(x, y, &include, degree);
        iterations += 1;
    }

    MaskedFit {
        polynomial,
        iterations,
        masked: include.iter().filter(|&&keep| !keep).count(),
    }
}

/// Fit at `degree`, dropping the degree until the system is solvable. A
/// constant always is, as long as one sample is included.
fn fit_lowering_degree(x: &[f64], y: &[f64], include: &[bool], degree: usize) -> Polynomial {
    (0..=degree)
        .rev()
        .find_map(|d| polyfit(x, y, include, d))
        .unwrap_or_else(|| Polynomial::constant(y.iter().sum::<f64>() / y.len().max(1) as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Metadata;

    fn trace(time: Vec<f64>, signal: Vec<f64>) -> Trace {
        Trace::new(time, signal, Metadata::default()).unwrap()
    }

    fn gaussian(t: f64, t0: f64, sigma: f64, height: f64) -> f64 {
        height * (-0.5 * ((t - t0) / sigma).powi(2)).exp()
    }

    #[test]
    fn test_resolve_keeps_valid_params() {
        let (applied, adj) = SmoothingParams::new(25, 3).resolve(1000).unwrap();
        assert_eq!(applied, SmoothingParams::new(25, 3));
        assert!(adj.is_none());
    }

    #[test]
    fn test_resolve_clamps_even_and_oversized_windows() {
        let (applied, adj) = SmoothingParams::new(24, 3).resolve(1000).unwrap();
        assert_eq!(applied, SmoothingParams::new(25, 3));
        assert!(adj.is_some());

        // an even window at the trace length can only shrink
        let (applied, _) = SmoothingParams::new(10, 3).resolve(10).unwrap();
        assert_eq!(applied, SmoothingParams::new(9, 3));

        let (applied, _) = SmoothingParams::new(25, 3).resolve(10).unwrap();
        assert_eq!(applied, SmoothingParams::new(9, 3));

        let (applied, adj) = SmoothingParams::new(25, 3).resolve(3).unwrap();
        assert_eq!(applied, SmoothingParams::new(3, 2));
        assert_eq!(adj.unwrap().requested, SmoothingParams::new(25, 3));
    }

    #[test]
    fn test_even_window_keeps_requested_degree() {
        let (applied, adj) = SmoothingParams::new(4, 3).resolve(1000).unwrap();
        assert_eq!(applied, SmoothingParams::new(5, 3));
        assert_eq!(adj.unwrap().applied, applied);

        // only a short trace may lower the degree
        let (applied, _) = SmoothingParams::new(4, 3).resolve(4).unwrap();
        assert_eq!(applied, SmoothingParams::new(3, 2));
    }

    #[test]
    fn test_resolve_rejects_degree_not_below_window() {
        assert!(matches!(
            SmoothingParams::new(5, 5).resolve(100),
            Err(ChromError::Parameter(_))
        ));
        assert!(matches!(
            SmoothingParams::new(0, 0).resolve(100),
            Err(ChromError::Parameter(_))
        ));
    }

    #[test]
    fn test_two_sample_trace_clamps_instead_of_failing() {
        let t = trace(vec![0.0, 0.1], vec![1.0, 2.0]);
        let model = BaselineModel::estimate(&t, SmoothingParams::default()).unwrap();
        assert_eq!(model.params().window_length, 1);
        assert!(model.params().window_length <= 2);
        assert_eq!(model.params().window_length % 2, 1);
        assert!(model.adjustment().is_some());
        assert_eq!(model.values().len(), 2);
    }

    #[test]
    fn test_flat_baseline_under_gaussian_is_near_zero() {
        let dt = 0.01;
        let time: Vec<f64> = (0..2001).map(|i| i as f64 * dt).collect();
        let signal: Vec<f64> = time.iter().map(|&t| gaussian(t, 10.0, 0.2, 100.0)).collect();
        let model = BaselineModel::estimate(&trace(time, signal), SmoothingParams::default()).unwrap();

        let worst = model.values().iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        assert!(worst < 0.05, "baseline strays {worst} from zero");
    }

    #[test]
    fn test_linear_drift_is_recovered() {
        let dt = 0.01;
        let time: Vec<f64> = (0..1501).map(|i| i as f64 * dt).collect();
        let drift = |t: f64| 5.0 + 0.8 * t;
        let signal: Vec<f64> = time
            .iter()
            .map(|&t| drift(t) + gaussian(t, 6.0, 0.15, 50.0))
            .collect();
        let model = BaselineModel::estimate(&trace(time.clone(), signal.clone()), SmoothingParams::default()).unwrap();

        for (&t, &b) in time.iter().zip(model.values()) {
            assert!((b - drift(t)).abs() < 0.05, "baseline {b} at t={t}");
        }
        let detrended = model.detrend(&signal);
        assert!(detrended[0].abs() < 0.05);
        assert!((detrended[600] - 50.0).abs() < 0.1);
    }
}

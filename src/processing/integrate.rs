use super::peaks::Peak;

/// Composite Simpson's rule over samples at possibly uneven `time` spacing.
///
/// With an odd number of intervals the last one is integrated with the
/// trapezoidal rule. Fewer than two samples integrate to zero.
pub fn simpson(time: &[f64], values: &[f64]) -> f64 {
    debug_assert_eq!(time.len(), values.len());
    let n = time.len().min(values.len());
    if n < 2 {
        return 0.0;
    }

    let intervals = n - 1;
    let paired = intervals - intervals % 2;

    let mut area: f64 = (0..paired)
        .step_by(2)
        .map(|i| simpson_pair(&time[i..i + 3], &values[i..i + 3]))
        .sum();
    if paired < intervals {
        area += trapezoid(time[n - 2], time[n - 1], values[n - 2], values[n - 1]);
    }
    area
}

/// Area under the detrended signal between a peak's boundaries, inclusive.
pub fn peak_area(time: &[f64], detrended: &[f64], peak: &Peak) -> f64 {
    if peak.left_boundary_index >= peak.right_boundary_index {
        return 0.0;
    }
    let window = peak.window();
    simpson(&time[window.clone()], &detrended[window])
}

/// Simpson's rule for two adjacent intervals of widths `h0` and `h1`.
fn simpson_pair(t: &[f64], y: &[f64]) -> f64 {
    let h0 = t[1] - t[0];
    let h1 = t[2] - t[1];
    if h0 <= 0.0 || h1 <= 0.0 {
        return trapezoid(t[0], t[1], y[0], y[1]) + trapezoid(t[1], t[2], y[1], y[2]);
    }
    let h = h0 + h1;
    h / 6.0
        * ((2.0 - h1 / h0) * y[0] + h * h / (h0 * h1) * y[1] + (2.0 - h0 / h1) * y[2])
}

fn trapezoid(t0: f64, t1: f64, y0: f64, y1: f64) -> f64 {
    0.5 * (t1 - t0) * (y0 + y1)
}

//! Least-squares polynomial building blocks: the Savitzky–Golay smoother and
//! the polynomial fit used for baselines.

// ---------------------------------------------------------------------------
// Savitzky–Golay smoothing
// ---------------------------------------------------------------------------

/// Smooth `data` with a Savitzky–Golay filter.
///
/// `window` must be odd, `<= data.len()` and greater than `degree`
/// ([`super::baseline::SmoothingParams::resolve`] produces such settings);
/// anything else leaves the data unsmoothed.
/// Samples closer than half a window to either end are taken from the
/// polynomial fitted to the first/last full window, so the output has the
/// same length as the input and no edge transients.
pub(crate) fn savitzky_golay(data: &[f64], window: usize, degree: usize) -> Vec<f64> {
    let n = data.len();
    if window <= 1 || window % 2 == 0 || window > n || degree >= window {
        return data.to_vec();
    }

    let half = window / 2;
    // weights[p] evaluates the fit at window position p
    let weights: Vec<Vec<f64>> = (0..window)
        .map(|p| savitzky_golay_weights(half, degree, p))
        .collect();

    let apply = |start: usize, row: &[f64]| -> f64 {
        data[start..start + window]
            .iter()
            .zip(row)
            .map(|(y, w)| y * w)
            .sum()
    };

    (0..n)
        .map(|i| {
            if i < half {
                apply(0, &weights[i])
            } else if i + half >= n {
                let start = n - window;
                apply(start, &weights[i - start])
            } else {
                apply(i - half, &weights[half])
            }
        })
        .collect()
}

/// Convolution weights that evaluate, at window position `at`, the
/// degree-`degree` least-squares polynomial through a `2 * half + 1` window.
fn savitzky_golay_weights(half: usize, degree: usize, at: usize) -> Vec<f64> {
    let window = 2 * half + 1;
    let scale = half as f64;
    let z: Vec<f64> = (0..window)
        .map(|j| (j as f64 - half as f64) / scale)
        .collect();

    let terms = degree + 1;
    let mut normal = vec![vec![0.0; terms]; terms];
    for &zj in &z {
        let powers = powers(zj, terms);
        for r in 0..terms {
            for c in 0..terms {
                normal[r][c] += powers[r] * powers[c];
            }
        }
    }

    // g = (AᵀA)⁻¹ a_at, weight_j = A_j · g
    let target = powers(z[at], terms);
    let g = match solve(normal, target) {
        Some(g) => g,
        None => {
            // Only reachable for degenerate windows; fall back to the raw sample.
            let mut identity = vec![0.0; window];
            identity[at] = 1.0;
            return identity;
        }
    };

    z.iter()
        .map(|&zj| {
            powers(zj, terms)
                .iter()
                .zip(&g)
                .map(|(a, b)| a * b)
                .sum()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Polynomial fit
// ---------------------------------------------------------------------------

/// A polynomial in the normalised variable `(x - center) / scale`.
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    coefficients: Vec<f64>,
    center: f64,
    scale: f64,
}

impl Polynomial {
    pub fn constant(value: f64) -> Self {
        Polynomial {
            coefficients: vec![value],
            center: 0.0,
            scale: 1.0,
        }
    }

    pub fn eval(&self, x: f64) -> f64 {
        let z = (x - self.center) / self.scale;
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, c| acc * z + c)
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }
}

/// Least-squares fit of a degree-`degree` polynomial to the points whose
/// `include` flag is set. Returns `None` when the system is singular, e.g.
/// fewer distinct x values than coefficients.
pub fn polyfit(x: &[f64], y: &[f64], include: &[bool], degree: usize) -> Option<Polynomial> {
    debug_assert!(x.len() == y.len() && x.len() == include.len());

    let (lo, hi) = x
        .iter()
        .zip(include)
        .filter(|&(_, &keep)| keep)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (&v, _)| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() {
        return None;
    }
    let center = 0.5 * (lo + hi);
    let scale = if hi > lo { 0.5 * (hi - lo) } else { 1.0 };

    let terms = degree + 1;
    let mut normal = vec![vec![0.0; terms]; terms];
    let mut rhs = vec![0.0; terms];
    for ((&xi, &yi), _) in x.iter().zip(y).zip(include).filter(|&(_, &keep)| keep) {
        let powers = powers((xi - center) / scale, terms);
        for r in 0..terms {
            rhs[r] += powers[r] * yi;
            for c in 0..terms {
                normal[r][c] += powers[r] * powers[c];
            }
        }
    }

    solve(normal, rhs).map(|coefficients| Polynomial {
        coefficients,
        center,
        scale,
    })
}

fn powers(z: f64, terms: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(terms);
    let mut p = 1.0;
    for _ in 0..terms {
        out.push(p);
        p *= z;
    }
    out
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    let magnitude = a
        .iter()
        .flat_map(|row| row.iter())
        .fold(0.0_f64, |m, v| m.max(v.abs()));
    let tolerance = magnitude * 1e-13;

    for col in 0..n {
        let pivot = (col..n).max_by(|&r, &s| a[r][col].abs().total_cmp(&a[s][col].abs()))?;
        if a[pivot][col].abs() <= tolerance {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            let (upper, lower) = a.split_at_mut(row);
            for (target, source) in lower[0][col..].iter_mut().zip(&upper[col][col..]) {
                *target -= factor * source;
            }
            let shift = factor * b[col];
            b[row] -= shift;
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}

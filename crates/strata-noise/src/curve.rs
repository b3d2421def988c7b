//! Monotone remapping curves over explicit control points.

use serde::{Deserialize, Serialize};

/// How a [`Curve`] interpolates between control points.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    #[default]
    Linear,
    /// Monotone cubic Hermite (Fritsch-Carlson). Never overshoots the
    /// control values.
    Cubic,
}

/// Errors raised when building a curve.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CurveError {
    #[error("curve has no control points")]
    Empty,
    #[error("control point x values must be strictly increasing (point {index})")]
    NotIncreasing { index: usize },
    #[error("control point {index} is not finite")]
    NonFinite { index: usize },
}

/// A piecewise curve. Inputs outside the control range are clamped to the
/// first or last control value.
#[derive(Clone, Debug, PartialEq)]
pub struct Curve {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Hermite tangents, one per point. Empty for linear curves.
    tangents: Vec<f64>,
}

impl Curve {
    pub fn new(points: &[[f64; 2]], interpolation: Interpolation) -> Result<Self, CurveError> {
        if points.is_empty() {
            return Err(CurveError::Empty);
        }
        for (index, p) in points.iter().enumerate() {
            if !p[0].is_finite() || !p[1].is_finite() {
                return Err(CurveError::NonFinite { index });
            }
            if index > 0 && p[0] <= points[index - 1][0] {
                return Err(CurveError::NotIncreasing { index });
            }
        }

        let xs: Vec<f64> = points.iter().map(|p| p[0]).collect();
        let ys: Vec<f64> = points.iter().map(|p| p[1]).collect();
        let tangents = match interpolation {
            Interpolation::Linear => Vec::new(),
            Interpolation::Cubic => monotone_tangents(&xs, &ys),
        };
        Ok(Self { xs, ys, tangents })
    }

    /// A curve that always returns `value`.
    pub fn constant(value: f64) -> Self {
        Self {
            xs: vec![0.0],
            ys: vec![value],
            tangents: Vec::new(),
        }
    }

    pub fn interpolation(&self) -> Interpolation {
        if self.tangents.is_empty() {
            Interpolation::Linear
        } else {
            Interpolation::Cubic
        }
    }

    pub fn sample(&self, x: f64) -> f64 {
        let last = self.xs.len() - 1;
        if x <= self.xs[0] {
            return self.ys[0];
        }
        if x >= self.xs[last] {
            return self.ys[last];
        }

        // First index whose x is greater than the input; the segment is [i-1, i].
        let i = self.xs.partition_point(|&px| px <= x);
        let (x0, x1) = (self.xs[i - 1], self.xs[i]);
        let (y0, y1) = (self.ys[i - 1], self.ys[i]);
        let h = x1 - x0;
        let t = (x - x0) / h;

        if self.tangents.is_empty() {
            return y0 + (y1 - y0) * t;
        }

        let t2 = t * t;
        let t3 = t2 * t;
        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;
        h00 * y0 + h10 * h * self.tangents[i - 1] + h01 * y1 + h11 * h * self.tangents[i]
    }
}

/// Fritsch-Carlson tangents: secant averages limited so each segment stays
/// monotone.
fn monotone_tangents(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let n = xs.len();
    if n < 2 {
        return vec![0.0; n];
    }

    let secants: Vec<f64> = (0..n - 1)
        .map(|i| (ys[i + 1] - ys[i]) / (xs[i + 1] - xs[i]))
        .collect();

    let mut m = vec![0.0; n];
    m[0] = secants[0];
    m[n - 1] = secants[n - 2];
    for i in 1..n - 1 {
        m[i] = if secants[i - 1] * secants[i] <= 0.0 {
            0.0
        } else {
            (secants[i - 1] + secants[i]) * 0.5
        };
    }

    for i in 0..n - 1 {
        if secants[i] == 0.0 {
            m[i] = 0.0;
            m[i + 1] = 0.0;
            continue;
        }
        let a = m[i] / secants[i];
        let b = m[i + 1] / secants[i];
        let s = a * a + b * b;
        if s > 9.0 {
            let tau = 3.0 / s.sqrt();
            m[i] = tau * a * secants[i];
            m[i + 1] = tau * b * secants[i];
        }
    }
    m
}

//! Signal processing over week-indexed percentile curves
//!
//! Percentiles, triangular smoothing, finite-difference derivatives, CUSUM change
//! points and local extrema. All functions are pure and operate on plain slices.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Percentile tiers reported for every simulated week
pub const PERCENTILE_TIERS: [f64; 5] = [15.0, 30.0, 50.0, 70.0, 85.0];

/// Default margin a week must exceed both neighbours by to count as an extremum
pub const EXTREMA_MARGIN: f64 = 2.0;

/// Linear-interpolated percentile of unsorted values
///
/// Uses `index = p/100 × (n-1)` and interpolates between the floor and ceil ranks.
/// Returns `None` for an empty slice; non-finite values are ignored.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(percentile_sorted(&sorted, p))
}

/// Percentile of an already sorted, non-empty slice
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let p = p.clamp(0.0, 100.0);
    let index = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let fraction = index - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// The five percentile tiers of one metric
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PercentileBand {
    pub p15: f64,
    pub p30: f64,
    pub p50: f64,
    pub p70: f64,
    pub p85: f64,
}

impl PercentileBand {
    /// Band of unsorted samples; sorts in place
    pub fn from_samples(samples: &mut [f64]) -> Option<Self> {
        if samples.is_empty() || samples.iter().any(|v| !v.is_finite()) {
            return None;
        }
        samples.sort_by(|a, b| a.total_cmp(b));
        Some(Self {
            p15: percentile_sorted(samples, PERCENTILE_TIERS[0]),
            p30: percentile_sorted(samples, PERCENTILE_TIERS[1]),
            p50: percentile_sorted(samples, PERCENTILE_TIERS[2]),
            p70: percentile_sorted(samples, PERCENTILE_TIERS[3]),
            p85: percentile_sorted(samples, PERCENTILE_TIERS[4]),
        })
    }

    /// Element-wise mean of several bands
    pub fn mean(bands: &[PercentileBand]) -> Option<Self> {
        if bands.is_empty() {
            return None;
        }
        let mean = |f: fn(&PercentileBand) -> f64| bands.iter().map(f).mean();
        Some(Self {
            p15: mean(|b| b.p15),
            p30: mean(|b| b.p30),
            p50: mean(|b| b.p50),
            p70: mean(|b| b.p70),
            p85: mean(|b| b.p85),
        })
    }

    pub fn is_ordered(&self) -> bool {
        self.p15 <= self.p30 && self.p30 <= self.p50 && self.p50 <= self.p70 && self.p70 <= self.p85
    }

    /// Distance between the outer tiers
    pub fn spread(&self) -> f64 {
        self.p85 - self.p15
    }
}

/// Smoothing windows sized from the series length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptiveWindows {
    pub local: usize,
    pub meso: usize,
}

/// `local = max(2, min(n-1, ⌊0.2n⌋))`, `meso = max(local, min(n-1, ⌊0.4n⌋))`
pub fn calculate_adaptive_windows(n: usize) -> AdaptiveWindows {
    let cap = n.saturating_sub(1);
    let local = (n / 5).min(cap).max(2);
    let meso = (n * 2 / 5).min(cap).max(local);
    AdaptiveWindows { local, meso }
}

/// Triangular-weighted moving average
///
/// A window `w` uses offsets `-h..=h` with `h = max(1, w/2)` and weights `h + 1 - |d|`;
/// edges renormalize over the available neighbours.
pub fn triangular_smooth(values: &[f64], window: usize) -> Vec<f64> {
    if values.len() < 3 || window < 2 {
        return values.to_vec();
    }
    let half = (window / 2).max(1) as isize;
    let n = values.len() as isize;

    (0..n)
        .map(|i| {
            let (mut total, mut weights) = (0.0, 0.0);
            for d in -half..=half {
                let j = i + d;
                if j < 0 || j >= n {
                    continue;
                }
                let w = (half + 1 - d.abs()) as f64;
                total += values[j as usize] * w;
                weights += w;
            }
            total / weights
        })
        .collect()
}

/// Central-difference first derivative, one-sided at the edges
pub fn velocity(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    match n {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => (0..n)
            .map(|i| {
                if i == 0 {
                    values[1] - values[0]
                } else if i == n - 1 {
                    values[n - 1] - values[n - 2]
                } else {
                    (values[i + 1] - values[i - 1]) / 2.0
                }
            })
            .collect(),
    }
}

/// Velocity of the velocity
pub fn acceleration(values: &[f64]) -> Vec<f64> {
    velocity(&velocity(values))
}

/// CUSUM change-point detector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cusum {
    /// Cumulative deviation that triggers a change point
    pub threshold: f64,

    /// Slack subtracted from every deviation before accumulating
    pub drift: f64,
}

impl Cusum {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            drift: 0.0,
        }
    }

    /// Indices where the series shifts level
    ///
    /// Positive and negative sums reset on every trigger and the reference level is
    /// re-anchored to the triggering value, so one step yields one change point.
    pub fn detect(&self, values: &[f64]) -> Vec<usize> {
        let mut change_points = Vec::new();
        let Some(&first) = values.first() else {
            return change_points;
        };

        let mut reference = first;
        let (mut positive, mut negative) = (0.0_f64, 0.0_f64);
        for (i, &x) in values.iter().enumerate().skip(1) {
            positive = (positive + x - reference - self.drift).max(0.0);
            negative = (negative + reference - x - self.drift).max(0.0);
            if positive > self.threshold || negative > self.threshold {
                change_points.push(i);
                positive = 0.0;
                negative = 0.0;
                reference = x;
            }
        }
        change_points
    }
}

/// Kind of local extremum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Extremum {
    Peak,
    Trough,
}

/// Interior points exceeding (or falling below) both neighbours by more than `margin`
pub fn local_extrema(values: &[f64], margin: f64) -> Vec<(usize, Extremum)> {
    if values.len() < 3 {
        return Vec::new();
    }
    (1..values.len() - 1)
        .filter_map(|i| {
            let (prev, cur, next) = (values[i - 1], values[i], values[i + 1]);
            if cur - prev > margin && cur - next > margin {
                Some((i, Extremum::Peak))
            } else if prev - cur > margin && next - cur > margin {
                Some((i, Extremum::Trough))
            } else {
                None
            }
        })
        .collect()
}

/// Least-squares slope and coefficient of determination of `values` against their index
pub fn linear_fit(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    if n < 2 {
        return (0.0, 0.0);
    }
    let nf = n as f64;
    let mean_x = (nf - 1.0) / 2.0;
    let mean_y = values.iter().mean();

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let slope = sxy / sxx;
    let r_squared = if syy > f64::EPSILON {
        (sxy * sxy / (sxx * syy)).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (slope, r_squared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_percentile_interpolation() {
        assert_eq!(percentile(&[10.0, 20.0, 30.0, 40.0], 50.0), Some(25.0));
        assert_eq!(percentile(&[40.0, 10.0, 30.0, 20.0], 0.0), Some(10.0));
        assert_eq!(percentile(&[40.0, 10.0, 30.0, 20.0], 100.0), Some(40.0));
        assert_eq!(percentile(&[7.0], 85.0), Some(7.0));
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn test_adaptive_windows() {
        assert_eq!(
            calculate_adaptive_windows(10),
            AdaptiveWindows { local: 2, meso: 4 }
        );
        assert_eq!(
            calculate_adaptive_windows(50),
            AdaptiveWindows { local: 10, meso: 20 }
        );
        let tiny = calculate_adaptive_windows(3);
        assert_eq!(tiny.local, 2);
        assert!(tiny.meso >= tiny.local);
    }

    #[test]
    fn test_cusum_single_step() {
        let cusum = Cusum::new(15.0);
        assert_eq!(cusum.detect(&[10.0, 10.0, 10.0, 50.0, 50.0, 50.0]), vec![3]);
    }

    #[test]
    fn test_cusum_flat_and_empty() {
        let cusum = Cusum::new(15.0);
        assert!(cusum.detect(&[]).is_empty());
        assert!(cusum.detect(&[20.0; 12]).is_empty());
    }

    #[test]
    fn test_cusum_detects_drop() {
        let cusum = Cusum::new(15.0);
        assert_eq!(cusum.detect(&[60.0, 61.0, 60.0, 30.0, 31.0]), vec![3]);
    }

    #[test]
    fn test_triangular_smooth_preserves_constant() {
        let smoothed = triangular_smooth(&[5.0; 8], 4);
        assert!(smoothed.iter().all(|v| (v - 5.0).abs() < 1e-12));
    }

    #[test]
    fn test_triangular_smooth_dampens_spike() {
        let series = [0.0, 0.0, 0.0, 30.0, 0.0, 0.0, 0.0];
        let smoothed = triangular_smooth(&series, 2);
        assert!(smoothed[3] < 30.0);
        assert!(smoothed[2] > 0.0);
        assert!((smoothed[3] - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_derivatives() {
        let linear: Vec<f64> = (0..6).map(|i| 3.0 * i as f64).collect();
        assert!(velocity(&linear).iter().all(|v| (v - 3.0).abs() < 1e-12));
        assert!(acceleration(&linear).iter().all(|a| a.abs() < 1e-12));

        let quadratic: Vec<f64> = (0..7).map(|i| (i * i) as f64).collect();
        let acc = acceleration(&quadratic);
        assert!((acc[3] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_local_extrema_margin() {
        let series = [10.0, 20.0, 10.0, 11.0, 10.0, 2.0, 10.0];
        let extrema = local_extrema(&series, EXTREMA_MARGIN);
        assert_eq!(extrema, vec![(1, Extremum::Peak), (5, Extremum::Trough)]);
    }

    #[test]
    fn test_linear_fit() {
        let (slope, r2) = linear_fit(&[1.0, 3.0, 5.0, 7.0]);
        assert!((slope - 2.0).abs() < 1e-12);
        assert!((r2 - 1.0).abs() < 1e-12);

        let (flat_slope, flat_r2) = linear_fit(&[4.0, 4.0, 4.0]);
        assert_eq!(flat_slope, 0.0);
        assert_eq!(flat_r2, 0.0);
    }

    #[test]
    fn test_band_mean() {
        let a = PercentileBand { p15: 10.0, p30: 20.0, p50: 30.0, p70: 40.0, p85: 50.0 };
        let b = PercentileBand { p15: 20.0, p30: 30.0, p50: 40.0, p70: 50.0, p85: 60.0 };
        let mean = PercentileBand::mean(&[a, b]).unwrap();
        assert_eq!(mean.p50, 35.0);
        assert!(mean.is_ordered());
        assert_eq!(mean.spread(), 40.0);
    }

    proptest! {
        #[test]
        fn test_band_is_ordered(mut samples in prop::collection::vec(0.0f64..100.0, 1..300)) {
            let band = PercentileBand::from_samples(&mut samples).unwrap();
            prop_assert!(band.is_ordered());
        }
    }
}

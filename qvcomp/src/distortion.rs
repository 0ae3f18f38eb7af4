use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::alphabet::Symbol;

/// The distortion measure used to score reproduction errors.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Default)]
pub enum DistortionMetric {
    /// Mean squared error, `(i - j)^2`.
    #[default]
    Mse,
    /// Absolute (L1) error, `|i - j|`.
    Manhattan,
    /// Lorentzian error, `log2(1 + |i - j|)`.
    Lorentz,
}

impl DistortionMetric {
    /// Returns the cost of reproducing symbol `x` as symbol `y`.
    ///
    /// # Examples
    /// ```
    /// use qvcomp::distortion::DistortionMetric;
    ///
    /// assert_eq!(DistortionMetric::Mse.cost(1, 4), 9.0);
    /// assert_eq!(DistortionMetric::Manhattan.cost(1, 4), 3.0);
    /// assert_eq!(DistortionMetric::Lorentz.cost(1, 4), 2.0);
    /// ```
    #[must_use]
    pub fn cost(&self, x: Symbol, y: Symbol) -> f64 {
        let diff = (x as f64 - y as f64).abs();
        match self {
            DistortionMetric::Mse => diff * diff,
            DistortionMetric::Manhattan => diff,
            DistortionMetric::Lorentz => (1.0 + diff).log2(),
        }
    }
}

impl Display for DistortionMetric {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DistortionMetric::Mse => write!(f, "MSE"),
            DistortionMetric::Manhattan => write!(f, "L1"),
            DistortionMetric::Lorentz => write!(f, "log(1+L1)"),
        }
    }
}

/// Pairwise symbol-to-symbol costs under a [`DistortionMetric`], precomputed
/// for O(1) lookup.
///
/// The table is symmetric and has a zero diagonal.
#[derive(Debug, Clone)]
pub struct DistortionTable {
    metric: DistortionMetric,
    size: usize,
    values: Vec<f64>,
}

impl DistortionTable {
    /// Builds the table for all symbol pairs in `[0, size)`.
    ///
    /// # Examples
    /// ```
    /// use qvcomp::distortion::{DistortionMetric, DistortionTable};
    ///
    /// let table = DistortionTable::new(DistortionMetric::Mse, 4);
    /// assert_eq!(table.get(0, 3), 9.0);
    /// assert_eq!(table.get(2, 2), 0.0);
    /// ```
    #[must_use]
    pub fn new(metric: DistortionMetric, size: usize) -> Self {
        let mut values = Vec::with_capacity(size * size);
        for x in 0..size {
            for y in 0..size {
                values.push(metric.cost(x as Symbol, y as Symbol));
            }
        }

        Self {
            metric,
            size,
            values,
        }
    }

    /// Returns the metric this table was built from.
    #[inline]
    #[must_use]
    pub fn metric(&self) -> DistortionMetric {
        self.metric
    }

    /// Returns the number of symbols the table covers.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the cost of reproducing symbol `x` as symbol `y`.
    ///
    /// # Panics
    /// This function panics if either symbol is out of range.
    #[inline]
    #[must_use]
    pub fn get(&self, x: Symbol, y: Symbol) -> f64 {
        assert!((x as usize) < self.size && (y as usize) < self.size);
        self.values[x as usize * self.size + y as usize]
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use crate::distortion::{DistortionMetric, DistortionTable};

    #[test]
    fn test_metric_costs() {
        assert_abs_diff_eq!(DistortionMetric::Mse.cost(3, 0), 9.0);
        assert_abs_diff_eq!(DistortionMetric::Manhattan.cost(3, 0), 3.0);
        assert_abs_diff_eq!(DistortionMetric::Lorentz.cost(3, 0), 2.0);
        assert_abs_diff_eq!(DistortionMetric::Lorentz.cost(0, 1), 1.0);
    }

    #[test]
    fn test_table_symmetric_zero_diagonal() {
        for metric in [
            DistortionMetric::Mse,
            DistortionMetric::Manhattan,
            DistortionMetric::Lorentz,
        ] {
            let table = DistortionTable::new(metric, 8);

            for x in 0..8 {
                assert_abs_diff_eq!(table.get(x, x), 0.0);
                for y in 0..8 {
                    assert_abs_diff_eq!(table.get(x, y), table.get(y, x));
                    assert!(table.get(x, y) >= 0.0);
                }
            }
        }
    }

    #[test]
    fn test_metric_display() {
        assert_eq!(DistortionMetric::Mse.to_string(), "MSE");
        assert_eq!(DistortionMetric::Manhattan.to_string(), "L1");
        assert_eq!(DistortionMetric::Lorentz.to_string(), "log(1+L1)");
    }
}

use std::fmt::{Display, Formatter};

use itertools::Itertools;

use crate::alphabet::{Alphabet, Symbol};
use crate::distortion::DistortionTable;
use crate::error::{CodebookError, CodebookResult};
use crate::pmf::Pmf;

/// A scalar quantizer: a total map from input symbols to reproduction
/// symbols, together with its output alphabet.
///
/// The output alphabet is the sorted set of distinct values the map takes.
/// A quantizer also carries the mixing ratio it was designed for and the
/// expected distortion over the source distribution it was designed on; both
/// are recorded for bookkeeping and do not take part in equality.
#[derive(Debug, Clone)]
pub struct Quantizer {
    map: Vec<Symbol>,
    output_alphabet: Alphabet,
    ratio: f64,
    expected_distortion: f64,
}

impl Quantizer {
    /// Designs a quantizer with at most `max_states` output symbols that
    /// minimizes the expected distortion of `source` under `distortion`.
    ///
    /// When `max_states` covers the whole support of `source`, the result is
    /// the identity on the support and the expected distortion is zero.
    /// Otherwise the support is split into contiguous cells, each reproduced
    /// by the symbol minimizing the probability-weighted cell cost (ties go
    /// to the smallest symbol). Symbols outside the support map to the
    /// nearest reproduction point.
    ///
    /// # Errors
    /// Returns [`CodebookError::EmptyDistribution`] if `source` has no
    /// support.
    ///
    /// # Panics
    /// This function panics if `source` is not normalized, if its alphabet
    /// does not match the distortion table, or if `max_states` is zero.
    pub fn design(
        source: &Pmf,
        distortion: &DistortionTable,
        max_states: u32,
        ratio: f64,
    ) -> CodebookResult<Self> {
        assert!(max_states >= 1);
        assert!(source.is_ready(), "source PMF has not been normalized");
        assert_eq!(source.len(), distortion.size());
        debug_assert!(source.alphabet().is_trivial());

        let n = source.len();
        let probs: Vec<f64> = (0..n)
            .map(|index| source.probability_indexed(index).get())
            .collect();
        let support: Vec<usize> = (0..n).filter(|&x| probs[x] > 0.0).collect();
        if support.is_empty() {
            return Err(CodebookError::EmptyDistribution);
        }

        let states = (max_states as usize).min(support.len());
        let rep_for_support = if states == support.len() {
            support.iter().map(|&x| x as Symbol).collect_vec()
        } else {
            Self::partition_support(&probs, &support, distortion, states)
        };

        let reps = rep_for_support.iter().copied().sorted().dedup().collect_vec();

        let mut map = vec![0 as Symbol; n];
        for (position, &x) in support.iter().enumerate() {
            map[x] = rep_for_support[position];
        }
        for x in 0..n {
            if probs[x] > 0.0 {
                continue;
            }
            let mut best = reps[0];
            let mut best_cost = distortion.get(x as Symbol, best);
            for &rep in &reps[1..] {
                let cost = distortion.get(x as Symbol, rep);
                if cost < best_cost {
                    best = rep;
                    best_cost = cost;
                }
            }
            map[x] = best;
        }

        let expected_distortion = (0..n)
            .map(|x| probs[x] * distortion.get(x as Symbol, map[x]))
            .sum();

        Ok(Self {
            map,
            output_alphabet: Alphabet::new(reps),
            ratio,
            expected_distortion,
        })
    }

    /// Splits the support into `states` contiguous cells minimizing the
    /// total weighted distortion, and returns the reproduction symbol for
    /// every support position.
    fn partition_support(
        probs: &[f64],
        support: &[usize],
        distortion: &DistortionTable,
        states: usize,
    ) -> Vec<Symbol> {
        let n = probs.len();
        let len = support.len();

        // prefix[r][t]: cost of reproducing the first t support positions as r
        let mut prefix = vec![vec![0.0_f64; len + 1]; n];
        for (r, row) in prefix.iter_mut().enumerate() {
            for (t, &x) in support.iter().enumerate() {
                row[t + 1] = row[t] + probs[x] * distortion.get(x as Symbol, r as Symbol);
            }
        }
        let cell = |first: usize, last: usize| -> (Symbol, f64) {
            let mut best_rep = 0;
            let mut best_cost = f64::INFINITY;
            for (r, row) in prefix.iter().enumerate() {
                let cost = row[last + 1] - row[first];
                if cost < best_cost {
                    best_cost = cost;
                    best_rep = r;
                }
            }
            (best_rep as Symbol, best_cost)
        };

        let mut cost = vec![vec![f64::INFINITY; len]; states];
        let mut split = vec![vec![0_usize; len]; states];
        for last in 0..len {
            cost[0][last] = cell(0, last).1;
        }
        for k in 1..states {
            for last in k..len {
                for first in k..=last {
                    let candidate = cost[k - 1][first - 1] + cell(first, last).1;
                    if candidate < cost[k][last] {
                        cost[k][last] = candidate;
                        split[k][last] = first;
                    }
                }
            }
        }

        let mut bounds = vec![0_usize; states + 1];
        bounds[states] = len;
        let mut last = len - 1;
        for k in (1..states).rev() {
            let first = split[k][last];
            bounds[k] = first;
            last = first - 1;
        }

        let mut rep_for_support = vec![0 as Symbol; len];
        for k in 0..states {
            let (rep, _) = cell(bounds[k], bounds[k + 1] - 1);
            for position in bounds[k]..bounds[k + 1] {
                rep_for_support[position] = rep;
            }
        }

        rep_for_support
    }

    /// Reconstructs a quantizer from a raw reproduction map.
    ///
    /// The expected distortion is not known for a reconstructed quantizer
    /// and is reported as zero.
    ///
    /// # Examples
    /// ```
    /// use qvcomp::alphabet::Alphabet;
    /// use qvcomp::quantizer::Quantizer;
    ///
    /// let quantizer = Quantizer::from_map([0, 0, 3, 3], 0.5);
    /// assert_eq!(quantizer.states(), 2);
    /// assert_eq!(quantizer.output_alphabet(), &Alphabet::new([0, 3]));
    /// ```
    #[must_use]
    pub fn from_map<T: Into<Vec<Symbol>>>(map: T, ratio: f64) -> Self {
        let map = map.into();
        let output_alphabet =
            Alphabet::new(map.iter().copied().sorted().dedup().collect_vec());

        Self {
            map,
            output_alphabet,
            ratio,
            expected_distortion: 0.0,
        }
    }

    /// Returns the reproduction symbol for `symbol`.
    ///
    /// # Panics
    /// This function panics if `symbol` is outside the quantizer's domain.
    #[inline]
    #[must_use]
    pub fn quantize(&self, symbol: Symbol) -> Symbol {
        self.map[symbol as usize]
    }

    /// Returns the full reproduction map.
    #[inline]
    #[must_use]
    pub fn map(&self) -> &[Symbol] {
        &self.map
    }

    /// Returns the number of input symbols this quantizer covers.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the quantizer covers no symbols.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns the set of distinct reproduction symbols.
    #[inline]
    #[must_use]
    pub fn output_alphabet(&self) -> &Alphabet {
        &self.output_alphabet
    }

    /// Returns the number of distinct reproduction symbols.
    #[inline]
    #[must_use]
    pub fn states(&self) -> usize {
        self.output_alphabet.len()
    }

    /// Returns the mixing ratio recorded at design time.
    #[inline]
    #[must_use]
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Returns the expected distortion over the source distribution this
    /// quantizer was designed on.
    #[inline]
    #[must_use]
    pub fn expected_distortion(&self) -> f64 {
        self.expected_distortion
    }
}

impl PartialEq for Quantizer {
    fn eq(&self, other: &Self) -> bool {
        self.map == other.map
    }
}

impl Eq for Quantizer {}

impl Display for Quantizer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.map.iter().join(" "))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use rand::Rng;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    use crate::alphabet::{Alphabet, Symbol};
    use crate::distortion::{DistortionMetric, DistortionTable};
    use crate::pmf::Pmf;
    use crate::quantizer::Quantizer;

    fn skewed_pmf() -> Pmf {
        Pmf::from_probabilities(&Alphabet::trivial(4), [0.5, 0.25, 0.0, 0.25])
    }

    #[test]
    fn test_design_single_state() {
        let table = DistortionTable::new(DistortionMetric::Mse, 4);

        let quantizer = Quantizer::design(&skewed_pmf(), &table, 1, 1.0).unwrap();

        assert_eq!(quantizer.map(), [1, 1, 1, 1]);
        assert_eq!(quantizer.states(), 1);
        assert_abs_diff_eq!(quantizer.expected_distortion(), 1.5);
    }

    #[test]
    fn test_design_two_states() {
        let table = DistortionTable::new(DistortionMetric::Mse, 4);

        let quantizer = Quantizer::design(&skewed_pmf(), &table, 2, 0.5).unwrap();

        assert_eq!(quantizer.map(), [0, 0, 3, 3]);
        assert_eq!(quantizer.output_alphabet(), &Alphabet::new([0, 3]));
        assert_abs_diff_eq!(quantizer.expected_distortion(), 0.25);
        assert_abs_diff_eq!(quantizer.ratio(), 0.5);
    }

    #[test]
    fn test_design_identity_on_support() {
        let table = DistortionTable::new(DistortionMetric::Mse, 4);

        let quantizer = Quantizer::design(&skewed_pmf(), &table, 3, 1.0).unwrap();

        // 2 is outside the support and equidistant from 1 and 3
        assert_eq!(quantizer.map(), [0, 1, 1, 3]);
        assert_abs_diff_eq!(quantizer.expected_distortion(), 0.0);
    }

    #[test]
    fn test_design_state_surplus() {
        let table = DistortionTable::new(DistortionMetric::Mse, 4);

        let quantizer = Quantizer::design(&skewed_pmf(), &table, 100, 1.0).unwrap();

        assert_eq!(quantizer.states(), 3);
        assert_abs_diff_eq!(quantizer.expected_distortion(), 0.0);
    }

    #[test]
    fn test_design_uniform_source() {
        let table = DistortionTable::new(DistortionMetric::Mse, 4);
        let pmf = Pmf::from_probabilities(&Alphabet::trivial(4), [0.25; 4]);

        let quantizer = Quantizer::design(&pmf, &table, 2, 1.0).unwrap();

        assert_eq!(quantizer.states(), 2);
        assert_abs_diff_eq!(quantizer.expected_distortion(), 0.5);
    }

    #[test]
    fn test_design_gap_support() {
        let table = DistortionTable::new(DistortionMetric::Mse, 4);
        let pmf = Pmf::from_probabilities(&Alphabet::trivial(4), [0.5, 0.0, 0.0, 0.5]);

        let quantizer = Quantizer::design(&pmf, &table, 2, 1.0).unwrap();

        assert_eq!(quantizer.map(), [0, 0, 3, 3]);
        assert_abs_diff_eq!(quantizer.expected_distortion(), 0.0);
    }

    #[test]
    fn test_design_manhattan() {
        let table = DistortionTable::new(DistortionMetric::Manhattan, 4);
        let pmf = Pmf::from_probabilities(&Alphabet::trivial(4), [0.25; 4]);

        let quantizer = Quantizer::design(&pmf, &table, 2, 1.0).unwrap();

        assert_abs_diff_eq!(quantizer.expected_distortion(), 0.5);
    }

    #[test]
    fn test_from_map() {
        let quantizer = Quantizer::from_map([0, 0, 2, 2, 2], 0.25);

        assert_eq!(quantizer.quantize(1), 0);
        assert_eq!(quantizer.quantize(4), 2);
        assert_eq!(quantizer.output_alphabet(), &Alphabet::new([0, 2]));
        assert_abs_diff_eq!(quantizer.ratio(), 0.25);
    }

    #[test]
    fn test_equality_ignores_bookkeeping() {
        let table = DistortionTable::new(DistortionMetric::Mse, 4);
        let designed = Quantizer::design(&skewed_pmf(), &table, 2, 0.3).unwrap();
        let reconstructed = Quantizer::from_map([0, 0, 3, 3], 0.9);

        assert_eq!(designed, reconstructed);
    }

    /// Lloyd-style baseline: nearest-reproduction assignment alternating
    /// with cell-wise reproduction updates, starting from evenly spaced
    /// support symbols.
    fn kmeans_baseline(
        probs: &[f64],
        table: &DistortionTable,
        states: usize,
    ) -> f64 {
        let n = probs.len();
        let support: Vec<usize> = (0..n).filter(|&x| probs[x] > 0.0).collect();
        let states = states.min(support.len());
        let mut reps: Vec<Symbol> = (0..states)
            .map(|k| support[k * support.len() / states] as Symbol)
            .collect();

        for _ in 0..50 {
            let mut assignment = vec![0_usize; n];
            for &x in &support {
                let mut best = 0;
                for (k, &rep) in reps.iter().enumerate() {
                    if table.get(x as Symbol, rep) < table.get(x as Symbol, reps[best]) {
                        best = k;
                    }
                }
                assignment[x] = best;
            }

            let mut changed = false;
            for k in 0..states {
                let members: Vec<usize> = support
                    .iter()
                    .copied()
                    .filter(|&x| assignment[x] == k)
                    .collect();
                if members.is_empty() {
                    continue;
                }
                let mut best_rep = reps[k];
                let mut best_cost = f64::INFINITY;
                for r in 0..n {
                    let cost: f64 = members
                        .iter()
                        .map(|&x| probs[x] * table.get(x as Symbol, r as Symbol))
                        .sum();
                    if cost < best_cost {
                        best_cost = cost;
                        best_rep = r as Symbol;
                    }
                }
                if best_rep != reps[k] {
                    reps[k] = best_rep;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        support
            .iter()
            .map(|&x| {
                probs[x]
                    * reps
                        .iter()
                        .map(|&rep| table.get(x as Symbol, rep))
                        .fold(f64::INFINITY, f64::min)
            })
            .sum()
    }

    #[test]
    fn test_designer_beats_kmeans_baseline() {
        let mut rand = Xoshiro256PlusPlus::seed_from_u64(7);

        for _ in 0..200 {
            let n = rand.gen_range(2..=8);
            let states = rand.gen_range(1..=n as u32);
            let metric = match rand.gen_range(0..3) {
                0 => DistortionMetric::Mse,
                1 => DistortionMetric::Manhattan,
                _ => DistortionMetric::Lorentz,
            };
            let table = DistortionTable::new(metric, n);

            let mut weights: Vec<f64> = (0..n).map(|_| rand.gen_range(0.0..1.0)).collect();
            if weights.iter().sum::<f64>() == 0.0 {
                weights[0] = 1.0;
            }
            let alphabet = Alphabet::trivial(n);
            let mut pmf = Pmf::new(&alphabet);
            for (x, &w) in weights.iter().enumerate() {
                pmf.add_mass(x as Symbol, w);
            }
            pmf.renormalize().unwrap();

            let probs: Vec<f64> = (0..n)
                .map(|x| pmf.probability_indexed(x).get())
                .collect();
            let designed = Quantizer::design(&pmf, &table, states, 1.0).unwrap();
            let baseline = kmeans_baseline(&probs, &table, states as usize);

            assert!(
                designed.expected_distortion() <= baseline + 1e-9,
                "designed {} worse than baseline {} ({} states, {} symbols, {})",
                designed.expected_distortion(),
                baseline,
                states,
                n,
                metric,
            );
        }
    }
}

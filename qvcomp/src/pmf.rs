use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::ops::{Add, Mul};

use derive_more::Deref;
use serde::{Deserialize, Serialize};

use crate::alphabet::{Alphabet, Symbol};
use crate::error::{CodebookError, CodebookResult};

/// Probability, as a float between 0.0 and 1.0.
#[derive(Copy, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Probability(f64);

impl Probability {
    /// Zero (impossible) probability
    pub const ZERO: Probability = Probability(0.0);
    /// One (certain) probability
    pub const ONE: Probability = Probability(1.0);
    const EQ_THRESHOLD: Probability = Probability(1e-9);

    /// Creates a new `Probability` object.
    ///
    /// # Examples
    /// ```
    /// use qvcomp::pmf::Probability;
    ///
    /// let prob = Probability::new(0.5);
    /// assert_eq!(prob.get(), 0.5);
    /// ```
    ///
    /// # Panics
    /// This function panics if the value is not a finite number between 0.0
    /// and 1.0.
    #[must_use]
    pub fn new(value: f64) -> Self {
        assert!(value.is_finite());
        assert!(value == 0.0 || value.is_sign_positive());
        assert!(value <= 1.0);

        Self(value)
    }

    /// Value of this `Probability` object, as a float.
    #[inline]
    #[must_use]
    pub fn get(&self) -> f64 {
        self.0
    }
}

impl PartialEq for Probability {
    fn eq(&self, other: &Self) -> bool {
        (self.get() - other.get()).abs() <= Self::EQ_THRESHOLD.get()
    }
}

impl Eq for Probability {}

impl From<f64> for Probability {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl PartialOrd for Probability {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.0.partial_cmp(&other.0)
    }
}

impl Ord for Probability {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Shannon entropy, as a non-negative number of bits per symbol.
#[derive(Deref, Copy, Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Entropy(f64);

impl Entropy {
    /// `Entropy` with a value of `0.0`.
    pub const ZERO: Entropy = Entropy(0.0);

    /// Creates a new `Entropy` object.
    ///
    /// # Examples
    /// ```
    /// use qvcomp::pmf::Entropy;
    ///
    /// let entropy = Entropy::new(0.5);
    /// assert_eq!(entropy.get(), 0.5);
    /// ```
    ///
    /// # Panics
    /// This function panics if the value is negative, or is not finite.
    #[must_use]
    pub fn new(value: f64) -> Self {
        assert!(value.is_finite());
        assert!(value == 0.0 || value.is_sign_positive());

        Self(value)
    }

    /// Value of this `Entropy` object, as a float.
    #[inline]
    #[must_use]
    pub fn get(&self) -> f64 {
        self.0
    }
}

impl Add for Entropy {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(*self + *rhs)
    }
}

impl Mul<f64> for Entropy {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self::Output {
        Self::new(*self * rhs)
    }
}

impl From<f64> for Entropy {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl Display for Entropy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}bits", self.0)
    }
}

/// A probability mass function over an [`Alphabet`].
///
/// A `Pmf` starts its life as a vector of raw counts. [`Pmf::renormalize`]
/// turns the counts into probabilities and marks the distribution "ready";
/// probability and entropy queries are only valid on a ready distribution.
#[derive(Debug, Clone)]
pub struct Pmf {
    alphabet: Alphabet,
    mass: Vec<f64>,
    ready: bool,
}

impl Pmf {
    /// Creates a new all-zero `Pmf` over the given alphabet.
    ///
    /// # Examples
    /// ```
    /// use qvcomp::alphabet::Alphabet;
    /// use qvcomp::pmf::Pmf;
    ///
    /// let pmf = Pmf::new(&Alphabet::trivial(4));
    /// assert_eq!(pmf.len(), 4);
    /// assert_eq!(pmf.total_mass(), 0.0);
    /// ```
    #[must_use]
    pub fn new(alphabet: &Alphabet) -> Self {
        Self {
            mass: vec![0.0; alphabet.len()],
            alphabet: alphabet.clone(),
            ready: false,
        }
    }

    /// Creates a ready `Pmf` from the given probabilities.
    ///
    /// # Examples
    /// ```
    /// use qvcomp::alphabet::Alphabet;
    /// use qvcomp::pmf::Pmf;
    ///
    /// let pmf = Pmf::from_probabilities(&Alphabet::trivial(2), [0.25, 0.75]);
    /// assert_eq!(pmf.probability(1).get(), 0.75);
    /// ```
    ///
    /// # Panics
    /// This function panics if the probabilities do not sum up to 1.
    #[must_use]
    pub fn from_probabilities<T: Into<Vec<f64>>>(alphabet: &Alphabet, probabilities: T) -> Self {
        let mass = probabilities.into();
        assert_eq!(mass.len(), alphabet.len());
        let total: f64 = mass.iter().sum();
        assert!((total - 1.0).abs() <= 1e-9);

        Self {
            alphabet: alphabet.clone(),
            mass,
            ready: true,
        }
    }

    /// Returns the alphabet this distribution is defined over.
    #[inline]
    #[must_use]
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// Returns the number of components of this distribution.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.mass.len()
    }

    /// Returns `true` if this distribution has no components.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mass.is_empty()
    }

    /// Returns `true` if this distribution has been normalized.
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Adds one observation of `symbol` to the raw counts.
    ///
    /// # Panics
    /// This function panics if the distribution is already normalized, or if
    /// `symbol` is not a member of the alphabet.
    pub fn increment(&mut self, symbol: Symbol) {
        self.add_mass(symbol, 1.0);
    }

    /// Adds `weight` raw mass at `symbol`.
    ///
    /// # Panics
    /// This function panics if the distribution is already normalized, or if
    /// `symbol` is not a member of the alphabet.
    pub fn add_mass(&mut self, symbol: Symbol, weight: f64) {
        let index = self
            .alphabet
            .index_of(symbol)
            .expect("symbol not in the PMF alphabet");
        self.add_mass_indexed(index, weight);
    }

    /// Adds `weight` raw mass at component `index`.
    ///
    /// # Panics
    /// This function panics if the distribution is already normalized.
    pub fn add_mass_indexed(&mut self, index: usize, weight: f64) {
        assert!(!self.ready, "cannot add mass to a normalized PMF");
        self.mass[index] += weight;
    }

    /// Returns the sum of all components.
    #[must_use]
    pub fn total_mass(&self) -> f64 {
        self.mass.iter().sum()
    }

    /// Returns the number of components with non-zero mass.
    #[must_use]
    pub fn support_size(&self) -> usize {
        self.mass.iter().filter(|&&x| x > 0.0).count()
    }

    /// Divides all components by the total mass and marks the distribution
    /// ready.
    ///
    /// # Errors
    /// Returns [`CodebookError::EmptyDistribution`] if the total mass is
    /// zero.
    pub fn renormalize(&mut self) -> CodebookResult<()> {
        let total = self.total_mass();
        if total <= 0.0 {
            return Err(CodebookError::EmptyDistribution);
        }

        for value in &mut self.mass {
            *value /= total;
        }
        self.ready = true;

        Ok(())
    }

    /// Returns the probability of `symbol`.
    ///
    /// # Panics
    /// This function panics if the distribution is not normalized, or if
    /// `symbol` is not a member of the alphabet.
    #[must_use]
    pub fn probability(&self, symbol: Symbol) -> Probability {
        let index = self
            .alphabet
            .index_of(symbol)
            .expect("symbol not in the PMF alphabet");
        self.probability_indexed(index)
    }

    /// Returns the probability of the component at `index`.
    ///
    /// # Panics
    /// This function panics if the distribution is not normalized.
    #[must_use]
    pub fn probability_indexed(&self, index: usize) -> Probability {
        assert!(self.ready, "PMF has not been normalized");
        Probability::new(self.mass[index])
    }

    /// Returns the Shannon entropy of this distribution, with the convention
    /// `0 * log2(0) = 0`.
    ///
    /// # Examples
    /// ```
    /// use qvcomp::alphabet::Alphabet;
    /// use qvcomp::pmf::Pmf;
    ///
    /// let pmf = Pmf::from_probabilities(&Alphabet::trivial(4), [0.25; 4]);
    /// assert_eq!(pmf.entropy().get(), 2.0);
    /// ```
    ///
    /// # Panics
    /// This function panics if the distribution is not normalized.
    #[must_use]
    pub fn entropy(&self) -> Entropy {
        assert!(self.ready, "PMF has not been normalized");

        let bits: f64 = self
            .mass
            .iter()
            .filter(|&&p| p > 0.0)
            .map(|&p| -p * p.log2())
            .sum();
        // -0.0 shows up when a component is exactly 1.0
        Entropy::new(bits.max(0.0))
    }

    /// Replaces this distribution with `alpha * self + beta * other`,
    /// component-wise over the raw values.
    ///
    /// The result is left un-normalized; the caller is responsible for a
    /// subsequent [`Pmf::renormalize`] where needed.
    ///
    /// # Panics
    /// This function panics if the two distributions have different lengths.
    pub fn combine(&mut self, other: &Pmf, alpha: f64, beta: f64) {
        assert_eq!(self.len(), other.len());

        for (value, &rhs) in self.mass.iter_mut().zip(other.mass.iter()) {
            *value = alpha * *value + beta * rhs;
        }
        self.ready = false;
    }
}

impl PartialEq for Pmf {
    fn eq(&self, other: &Self) -> bool {
        self.alphabet == other.alphabet
            && self.ready == other.ready
            && self
                .mass
                .iter()
                .zip(other.mass.iter())
                .all(|(&a, &b)| (a - b).abs() <= Probability::EQ_THRESHOLD.get())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use crate::alphabet::Alphabet;
    use crate::error::CodebookError;
    use crate::pmf::{Entropy, Pmf, Probability};

    #[test]
    fn test_counts_and_renormalize() {
        let mut pmf = Pmf::new(&Alphabet::trivial(4));
        pmf.increment(0);
        pmf.increment(0);
        pmf.increment(1);
        pmf.increment(3);

        assert!(!pmf.is_ready());
        assert_abs_diff_eq!(pmf.total_mass(), 4.0);
        assert_eq!(pmf.support_size(), 3);

        pmf.renormalize().unwrap();

        assert!(pmf.is_ready());
        assert_abs_diff_eq!(pmf.probability(0).get(), 0.5);
        assert_abs_diff_eq!(pmf.probability(1).get(), 0.25);
        assert_abs_diff_eq!(pmf.probability(2).get(), 0.0);
        assert_abs_diff_eq!(pmf.probability(3).get(), 0.25);
        assert_abs_diff_eq!(pmf.total_mass(), 1.0);
    }

    #[test]
    fn test_renormalize_empty() {
        let mut pmf = Pmf::new(&Alphabet::trivial(4));

        let result = pmf.renormalize();

        assert!(matches!(result, Err(CodebookError::EmptyDistribution)));
        assert!(!pmf.is_ready());
    }

    #[test]
    fn test_entropy_point_mass() {
        let mut pmf = Pmf::new(&Alphabet::trivial(2));
        pmf.increment(1);
        pmf.renormalize().unwrap();

        assert_abs_diff_eq!(pmf.entropy().get(), 0.0);
    }

    #[test]
    fn test_entropy_coin_flip() {
        let pmf = Pmf::from_probabilities(&Alphabet::trivial(2), [0.5, 0.5]);

        assert_abs_diff_eq!(pmf.entropy().get(), 1.0);
    }

    #[test]
    fn test_entropy_skewed() {
        let pmf = Pmf::from_probabilities(&Alphabet::trivial(4), [0.5, 0.25, 0.0, 0.25]);

        assert_abs_diff_eq!(pmf.entropy().get(), 1.5);
    }

    #[test]
    fn test_combine() {
        let alphabet = Alphabet::trivial(3);
        let mut out = Pmf::new(&alphabet);
        let mut other = Pmf::new(&alphabet);
        other.increment(0);
        other.increment(2);
        other.renormalize().unwrap();

        out.combine(&other, 1.0, 0.5);

        assert!(!out.is_ready());
        assert_abs_diff_eq!(out.total_mass(), 0.5);
        out.renormalize().unwrap();
        assert_abs_diff_eq!(out.probability(0).get(), 0.5);
        assert_abs_diff_eq!(out.probability(1).get(), 0.0);
        assert_abs_diff_eq!(out.probability(2).get(), 0.5);
    }

    #[test]
    fn test_pmf_over_sparse_alphabet() {
        let alphabet = Alphabet::new([1, 4, 9]);
        let mut pmf = Pmf::new(&alphabet);
        pmf.increment(4);
        pmf.increment(9);
        pmf.renormalize().unwrap();

        assert_abs_diff_eq!(pmf.probability(1).get(), 0.0);
        assert_abs_diff_eq!(pmf.probability(4).get(), 0.5);
        assert_abs_diff_eq!(pmf.probability_indexed(2).get(), 0.5);
    }

    #[test]
    #[should_panic]
    fn test_increment_after_renormalize() {
        let mut pmf = Pmf::new(&Alphabet::trivial(2));
        pmf.increment(0);
        pmf.renormalize().unwrap();
        pmf.increment(1);
    }

    #[test]
    #[should_panic]
    fn test_increment_unknown_symbol() {
        let mut pmf = Pmf::new(&Alphabet::new([0, 2]));
        pmf.increment(1);
    }

    #[test]
    fn test_probability_equality_threshold() {
        assert_eq!(Probability::new(0.5), Probability::new(0.5 + 1e-12));
        assert_ne!(Probability::new(0.5), Probability::new(0.6));
    }

    #[test]
    fn test_entropy_scaling() {
        let entropy = Entropy::new(1.5) * 0.5;

        assert_abs_diff_eq!(entropy.get(), 0.75);
        assert_eq!((Entropy::new(1.0) + Entropy::new(0.5)).get(), 1.5);
    }
}

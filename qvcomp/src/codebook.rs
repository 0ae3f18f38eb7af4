use std::fmt::{Display, Formatter};
use std::io::Write;

use byteorder::{BigEndian, WriteBytesExt};
use rand::SeedableRng;
use sha3::{Digest, Sha3_256};

use crate::alphabet::{Alphabet, Symbol};
use crate::error::{CodebookError, CodebookResult};
use crate::pmf::Entropy;
use crate::quantizer::Quantizer;
use crate::well::Well1024a;

/// Default seed of the quantizer selector PRNG.
pub const DEFAULT_SELECTOR_SEED: u64 = 1024;

/// The state counts and mixing ratio realizing an entropy target.
///
/// An integer-state scalar quantizer can only hit rates of the form
/// `log2(n)`. Mixing a `low`-state and a `high`-state quantizer, choosing
/// the low one with probability `ratio`, turns the state count into a
/// continuous rate knob: the expected rate is
/// `ratio * log2(low) + (1 - ratio) * log2(high)`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BitAllocation {
    low: u32,
    high: u32,
    ratio: f64,
}

impl BitAllocation {
    /// Computes the allocation for the given entropy target, in bits per
    /// symbol.
    ///
    /// `low` is `floor(2^H)`, `high` is `ceil(2^H)`, and the ratio solves
    /// `H = ratio * log2(low) + (1 - ratio) * log2(high)`. A target hitting
    /// an integer state count exactly (including zero entropy) yields
    /// `low == high` and a ratio of one.
    ///
    /// # Examples
    /// ```
    /// use qvcomp::codebook::BitAllocation;
    /// use qvcomp::pmf::Entropy;
    ///
    /// let allocation = BitAllocation::for_entropy(Entropy::new(0.75));
    /// assert_eq!(allocation.low(), 1);
    /// assert_eq!(allocation.high(), 2);
    /// assert_eq!(allocation.ratio(), 0.25);
    /// ```
    #[must_use]
    pub fn for_entropy(target: Entropy) -> Self {
        let bits = target.get();
        if bits <= 0.0 {
            return Self {
                low: 1,
                high: 1,
                ratio: 1.0,
            };
        }

        let states = bits.exp2();
        let low = states.floor() as u32;
        let high = states.ceil() as u32;
        if low == high {
            return Self {
                low,
                high,
                ratio: 1.0,
            };
        }

        let h_lo = (low as f64).log2();
        let h_hi = (high as f64).log2();
        let ratio = (bits - h_hi) / (h_lo - h_hi);

        Self { low, high, ratio }
    }

    /// Returns the number of states of the low quantizer.
    #[inline]
    #[must_use]
    pub fn low(&self) -> u32 {
        self.low
    }

    /// Returns the number of states of the high quantizer.
    #[inline]
    #[must_use]
    pub fn high(&self) -> u32 {
        self.high
    }

    /// Returns the probability of selecting the low quantizer.
    #[inline]
    #[must_use]
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Returns the expected rate of the mixed quantizer pair.
    #[must_use]
    pub fn mixed_entropy(&self) -> Entropy {
        let bits = self.ratio * (self.low as f64).log2()
            + (1.0 - self.ratio) * (self.high as f64).log2();
        Entropy::new(bits)
    }
}

/// A low/high quantizer pair with its mixing ratio.
///
/// The ratio is also kept quantized to hundredths (`qratio`), which is the
/// precision the interchange codebook format carries.
#[derive(Debug, Clone)]
pub struct QuantizerPair {
    low: Quantizer,
    high: Quantizer,
    ratio: f64,
    qratio: u8,
}

impl QuantizerPair {
    /// Creates a new quantizer pair.
    ///
    /// # Panics
    /// This function panics if the ratio is not in `[0, 1]`.
    #[must_use]
    pub fn new(low: Quantizer, high: Quantizer, ratio: f64) -> Self {
        assert!((0.0..=1.0).contains(&ratio));

        Self {
            low,
            high,
            ratio,
            qratio: (ratio * 100.0).floor() as u8,
        }
    }

    /// Reconstructs a pair from a ratio already quantized to hundredths.
    ///
    /// # Panics
    /// This function panics if `qratio` is larger than 100.
    #[must_use]
    pub fn with_qratio(low: Quantizer, high: Quantizer, qratio: u8) -> Self {
        assert!(qratio <= 100);

        Self {
            low,
            high,
            ratio: qratio as f64 / 100.0,
            qratio,
        }
    }

    /// Returns the low quantizer.
    #[inline]
    #[must_use]
    pub fn low(&self) -> &Quantizer {
        &self.low
    }

    /// Returns the high quantizer.
    #[inline]
    #[must_use]
    pub fn high(&self) -> &Quantizer {
        &self.high
    }

    /// Returns the probability of selecting the low quantizer.
    #[inline]
    #[must_use]
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Returns the mixing ratio quantized to hundredths.
    #[inline]
    #[must_use]
    pub fn qratio(&self) -> u8 {
        self.qratio
    }

    /// Returns the expected distortion of the mixed pair over the source it
    /// was designed on.
    #[must_use]
    pub fn expected_distortion(&self) -> f64 {
        self.ratio * self.low.expected_distortion()
            + (1.0 - self.ratio) * self.high.expected_distortion()
    }
}

impl PartialEq for QuantizerPair {
    fn eq(&self, other: &Self) -> bool {
        self.low == other.low && self.high == other.high && self.qratio == other.qratio
    }
}

impl Eq for QuantizerPair {}

/// An automatically-generated identifier of a codebook.
///
/// The identifier is a SHA-3 256-bit checksum over the full codebook
/// contents: column count, per-column input alphabets, and every stored
/// quantizer pair in context order.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct CodebookIdentifier([u8; 32]);

impl CodebookIdentifier {
    /// Creates a new instance of `CodebookIdentifier`.
    #[must_use]
    pub fn new(value: [u8; 32]) -> Self {
        Self(value)
    }
}

impl From<[u8; 32]> for CodebookIdentifier {
    fn from(value: [u8; 32]) -> Self {
        Self::new(value)
    }
}

impl Display for CodebookIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for val in &self.0[..4] {
            write!(f, "{:02x}", val)?;
        }
        Ok(())
    }
}

/// Per-column table of conditional quantizer pairs, keyed by the previous
/// column's quantized output symbol.
///
/// Columns are opened left to right; a closed column is never modified
/// again. The store owns the selector PRNG used by [`choose`]; the PRNG is
/// advanced only by `choose` calls, never while the store is being built.
///
/// [`choose`]: CondQuantizerStore::choose
#[derive(Debug, Clone)]
pub struct CondQuantizerStore {
    columns: usize,
    input_alphabets: Vec<Alphabet>,
    pairs: Vec<Vec<Option<QuantizerPair>>>,
    well: Well1024a,
}

impl CondQuantizerStore {
    /// Creates an empty store for `columns` columns, with the default
    /// selector seed.
    ///
    /// # Panics
    /// This function panics if `columns` is zero.
    #[must_use]
    pub fn new(columns: usize) -> Self {
        Self::with_seed(columns, DEFAULT_SELECTOR_SEED)
    }

    /// Creates an empty store with the given selector seed.
    ///
    /// # Panics
    /// This function panics if `columns` is zero.
    #[must_use]
    pub fn with_seed(columns: usize, seed: u64) -> Self {
        assert!(columns >= 1);

        Self {
            columns,
            input_alphabets: Vec::with_capacity(columns),
            pairs: Vec::with_capacity(columns),
            well: Well1024a::seed_from_u64(seed),
        }
    }

    /// Returns the number of columns this store was created for.
    #[inline]
    #[must_use]
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Returns the number of columns opened so far.
    #[inline]
    #[must_use]
    pub fn open_columns(&self) -> usize {
        self.input_alphabets.len()
    }

    /// Opens the next column with the given input alphabet.
    ///
    /// # Panics
    /// This function panics if all columns have already been opened, or if
    /// the input alphabet is empty.
    pub fn open_column(&mut self, input_union: Alphabet) {
        assert!(self.input_alphabets.len() < self.columns);
        assert!(!input_union.is_empty());

        self.pairs.push(vec![None; input_union.len()]);
        self.input_alphabets.push(input_union);
    }

    /// Returns the input alphabet of `column`.
    ///
    /// # Panics
    /// This function panics if `column` has not been opened.
    #[inline]
    #[must_use]
    pub fn input_alphabet(&self, column: usize) -> &Alphabet {
        &self.input_alphabets[column]
    }

    /// Stores a quantizer pair for the given context symbol.
    ///
    /// # Errors
    /// Returns [`CodebookError::AlphabetLookupMiss`] if `prev` is not in the
    /// column's input alphabet.
    ///
    /// # Panics
    /// This function panics if `column` has not been opened.
    pub fn store_pair(
        &mut self,
        column: usize,
        prev: Symbol,
        pair: QuantizerPair,
    ) -> CodebookResult<()> {
        let index = self.context_index(column, prev)?;
        self.pairs[column][index] = Some(pair);
        Ok(())
    }

    /// Returns the quantizer pair stored for the given context symbol.
    ///
    /// # Errors
    /// Returns [`CodebookError::AlphabetLookupMiss`] if `prev` is not in the
    /// column's input alphabet, and
    /// [`CodebookError::InternalInvariantViolated`] if no pair has been
    /// stored for it yet.
    pub fn pair(&self, column: usize, prev: Symbol) -> CodebookResult<&QuantizerPair> {
        let index = self.context_index(column, prev)?;
        self.pair_at(column, index)
    }

    /// Returns the quantizer pair at the raw context index, for iteration
    /// over a column.
    ///
    /// # Errors
    /// Returns [`CodebookError::InternalInvariantViolated`] if no pair has
    /// been stored at the index.
    ///
    /// # Panics
    /// This function panics if `column` has not been opened or the index is
    /// out of bounds.
    pub fn pair_at(&self, column: usize, index: usize) -> CodebookResult<&QuantizerPair> {
        self.pairs[column][index]
            .as_ref()
            .ok_or_else(|| CodebookError::invariant(column, format!("context {} is empty", index)))
    }

    /// Selects the low or high quantizer for the given context by drawing
    /// from the selector PRNG.
    ///
    /// Encoder and decoder must issue the same sequence of `choose` calls on
    /// identically seeded stores for their selections to agree.
    ///
    /// # Errors
    /// Returns [`CodebookError::AlphabetLookupMiss`] if `prev` is not in the
    /// column's input alphabet.
    pub fn choose(&mut self, column: usize, prev: Symbol) -> CodebookResult<&Quantizer> {
        let index = self.context_index(column, prev)?;
        let draw = self.well.next_f64();
        let pair = self.pairs[column][index]
            .as_ref()
            .ok_or_else(|| CodebookError::invariant(column, format!("context {} is empty", index)))?;

        Ok(if draw < pair.ratio {
            &pair.low
        } else {
            &pair.high
        })
    }

    /// Re-seeds the selector PRNG, restarting the selection sequence.
    pub fn reseed(&mut self, seed: u64) {
        self.well = Well1024a::seed_from_u64(seed);
    }

    /// Returns the union of the output alphabets of every quantizer stored
    /// at `column`. This is the input alphabet the next column must be
    /// opened with.
    ///
    /// # Errors
    /// Returns [`CodebookError::InternalInvariantViolated`] if the column is
    /// not fully populated.
    pub fn output_union(&self, column: usize) -> CodebookResult<Alphabet> {
        let mut union: Option<Alphabet> = None;
        for index in 0..self.input_alphabets[column].len() {
            let pair = self.pair_at(column, index)?;
            let pair_union = pair.low.output_alphabet().union(pair.high.output_alphabet());
            union = Some(match union {
                Some(current) => current.union(&pair_union),
                None => pair_union,
            });
        }

        union.ok_or_else(|| CodebookError::invariant(column, "column has no contexts"))
    }

    /// Returns the identifier of this codebook.
    ///
    /// See the [`CodebookIdentifier`] docs for more information on how the
    /// identifier is generated.
    #[must_use]
    pub fn identifier(&self) -> CodebookIdentifier {
        let mut hasher = Sha3_256::new();

        hasher.write_u32::<BigEndian>(self.columns as u32).unwrap();
        for (column, alphabet) in self.input_alphabets.iter().enumerate() {
            hasher.write_u32::<BigEndian>(alphabet.len() as u32).unwrap();
            hasher.write_all(alphabet.symbols()).unwrap();

            for slot in &self.pairs[column] {
                match slot {
                    Some(pair) => {
                        hasher.write_all(pair.low.map()).unwrap();
                        hasher.write_all(pair.high.map()).unwrap();
                        hasher.write_u8(pair.qratio).unwrap();
                    }
                    None => {
                        hasher.write_u8(0).unwrap();
                    }
                }
            }
        }

        CodebookIdentifier::new(hasher.finalize().into())
    }

    fn context_index(&self, column: usize, prev: Symbol) -> CodebookResult<usize> {
        self.input_alphabets[column]
            .index_of(prev)
            .ok_or(CodebookError::AlphabetLookupMiss {
                column,
                symbol: prev,
            })
    }
}

impl PartialEq for CondQuantizerStore {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
            && self.input_alphabets == other.input_alphabets
            && self.pairs == other.pairs
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use rand::Rng;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    use crate::alphabet::Alphabet;
    use crate::codebook::{BitAllocation, CondQuantizerStore, QuantizerPair};
    use crate::error::CodebookError;
    use crate::pmf::Entropy;
    use crate::quantizer::Quantizer;

    #[test]
    fn test_allocation_zero_entropy() {
        let allocation = BitAllocation::for_entropy(Entropy::ZERO);

        assert_eq!(allocation.low(), 1);
        assert_eq!(allocation.high(), 1);
        assert_abs_diff_eq!(allocation.ratio(), 1.0);
    }

    #[test]
    fn test_allocation_integer_entropy() {
        let allocation = BitAllocation::for_entropy(Entropy::new(1.0));

        assert_eq!(allocation.low(), 2);
        assert_eq!(allocation.high(), 2);
        assert_abs_diff_eq!(allocation.ratio(), 1.0);
    }

    #[test]
    fn test_allocation_fractional_entropy() {
        let allocation = BitAllocation::for_entropy(Entropy::new(0.75));

        assert_eq!(allocation.low(), 1);
        assert_eq!(allocation.high(), 2);
        assert_abs_diff_eq!(allocation.ratio(), 0.25);
    }

    #[test]
    fn test_allocation_wide_entropy() {
        let allocation = BitAllocation::for_entropy(Entropy::new(1.5));

        assert_eq!(allocation.low(), 2);
        assert_eq!(allocation.high(), 3);
        assert_abs_diff_eq!(
            allocation.ratio(),
            (1.5 - 3.0_f64.log2()) / (1.0 - 3.0_f64.log2())
        );
    }

    #[test]
    fn test_allocation_identity() {
        let mut rand = Xoshiro256PlusPlus::seed_from_u64(11);

        for _ in 0..1000 {
            let bits = rand.gen_range(0.0..6.0);
            let allocation = BitAllocation::for_entropy(Entropy::new(bits));

            assert!((0.0..=1.0).contains(&allocation.ratio()));
            if allocation.low() != allocation.high() {
                assert_abs_diff_eq!(
                    allocation.mixed_entropy().get(),
                    bits,
                    epsilon = 1e-12
                );
            }
        }
    }

    #[test]
    fn test_pair_qratio() {
        let low = Quantizer::from_map([0, 0], 0.37);
        let high = Quantizer::from_map([0, 1], 0.63);

        let pair = QuantizerPair::new(low, high, 0.37);

        assert_eq!(pair.qratio(), 37);
        assert_abs_diff_eq!(pair.ratio(), 0.37);
    }

    fn simple_store(seed: u64) -> CondQuantizerStore {
        let mut store = CondQuantizerStore::with_seed(2, seed);
        store.open_column(Alphabet::trivial(1));
        store
            .store_pair(
                0,
                0,
                QuantizerPair::new(
                    Quantizer::from_map([0, 0, 2, 2], 0.5),
                    Quantizer::from_map([0, 1, 2, 3], 0.5),
                    0.5,
                ),
            )
            .unwrap();
        store.open_column(Alphabet::trivial(4));
        for prev in 0..4 {
            store
                .store_pair(
                    1,
                    prev,
                    QuantizerPair::new(
                        Quantizer::from_map([1, 1, 1, 1], 1.0),
                        Quantizer::from_map([0, 0, 3, 3], 0.0),
                        1.0,
                    ),
                )
                .unwrap();
        }
        store
    }

    #[test]
    fn test_store_and_fetch() {
        let store = simple_store(0);

        assert_eq!(store.columns(), 2);
        assert_eq!(store.open_columns(), 2);
        assert_eq!(store.input_alphabet(0), &Alphabet::trivial(1));
        let pair = store.pair(1, 2).unwrap();
        assert_eq!(pair.low().map(), [1, 1, 1, 1]);
        assert_eq!(
            store.pair_at(1, 2).unwrap().low().map(),
            pair.low().map()
        );
    }

    #[test]
    fn test_fetch_missing_context() {
        let store = simple_store(0);

        let result = store.pair(0, 3);

        assert!(matches!(
            result,
            Err(CodebookError::AlphabetLookupMiss {
                column: 0,
                symbol: 3
            })
        ));
    }

    #[test]
    fn test_choose_missing_context() {
        let mut store = simple_store(0);

        let result = store.choose(0, 2);

        assert!(matches!(
            result,
            Err(CodebookError::AlphabetLookupMiss {
                column: 0,
                symbol: 2
            })
        ));
    }

    #[test]
    fn test_choose_extreme_ratios() {
        let mut store = simple_store(0);

        // column 1 has ratio 1.0, so the low quantizer is always selected
        for prev in 0..4 {
            let quantizer = store.choose(1, prev).unwrap();
            assert_eq!(quantizer.map(), [1, 1, 1, 1]);
        }
    }

    #[test]
    fn test_choose_deterministic_lockstep() {
        let mut a = simple_store(77);
        let mut b = simple_store(77);

        for _ in 0..200 {
            let qa = a.choose(0, 0).unwrap().map().to_vec();
            let qb = b.choose(0, 0).unwrap().map().to_vec();
            assert_eq!(qa, qb);
        }
    }

    #[test]
    fn test_choose_mixes_both_quantizers() {
        let mut store = simple_store(3);

        let mut low_count = 0;
        for _ in 0..1000 {
            if store.choose(0, 0).unwrap().states() == 2 {
                low_count += 1;
            }
        }

        // ratio is 0.5; either extreme would indicate a broken selector
        assert!(low_count > 300);
        assert!(low_count < 700);
    }

    #[test]
    fn test_output_union() {
        let store = simple_store(0);

        assert_eq!(store.output_union(0).unwrap(), Alphabet::trivial(4));
        assert_eq!(store.output_union(1).unwrap(), Alphabet::new([0, 1, 3]));
    }

    #[test]
    fn test_identifier_stable_and_unique() {
        let a = simple_store(0);
        let b = simple_store(123);

        // the selector seed is not part of the identity
        assert_eq!(a.identifier(), b.identifier());

        let mut c = simple_store(0);
        c.reseed(5);
        assert_eq!(a.identifier(), c.identifier());

        let mut d = CondQuantizerStore::new(1);
        d.open_column(Alphabet::trivial(1));
        d.store_pair(
            0,
            0,
            QuantizerPair::new(
                Quantizer::from_map([0, 0, 2, 2], 1.0),
                Quantizer::from_map([0, 1, 2, 3], 0.0),
                1.0,
            ),
        )
        .unwrap();
        assert_ne!(a.identifier(), d.identifier());
    }

    #[test]
    fn test_store_equality_ignores_selector_state() {
        let a = simple_store(1);
        let mut b = simple_store(2);

        assert_eq!(a, b);

        let _ = b.choose(0, 0).unwrap();
        assert_eq!(a, b);
    }
}

use std::fmt::{Display, Formatter};

use itertools::Itertools;

/// A single quality value, as an index into an [`Alphabet`].
pub type Symbol = u8;

/// The largest alphabet size supported by the codebook pipeline.
pub const MAX_ALPHABET_SIZE: usize = 64;

/// An ordered set of unique symbols.
///
/// Alphabets are immutable after construction. Symbols are kept in ascending
/// order, and an auxiliary index makes `symbol -> position` lookups O(1).
#[derive(Debug, Clone)]
pub struct Alphabet {
    symbols: Vec<Symbol>,
    indices: [u8; 256],
}

const INDEX_NOT_FOUND: u8 = u8::MAX;

impl Alphabet {
    /// Creates an alphabet out of the given symbols.
    ///
    /// # Examples
    /// ```
    /// use qvcomp::alphabet::Alphabet;
    ///
    /// let alphabet = Alphabet::new([1, 4, 7]);
    /// assert_eq!(alphabet.len(), 3);
    /// assert_eq!(alphabet.index_of(4), Some(1));
    /// ```
    ///
    /// # Panics
    /// This function panics if the symbols are not strictly ascending, or if
    /// there are more of them than [`MAX_ALPHABET_SIZE`].
    #[must_use]
    pub fn new<T: Into<Vec<Symbol>>>(symbols: T) -> Self {
        let symbols = symbols.into();
        assert!(symbols.len() <= MAX_ALPHABET_SIZE);
        assert!(symbols.windows(2).all(|pair| pair[0] < pair[1]));

        let mut indices = [INDEX_NOT_FOUND; 256];
        for (index, &symbol) in symbols.iter().enumerate() {
            indices[symbol as usize] = index as u8;
        }

        Self { symbols, indices }
    }

    /// Creates the alphabet `{0, 1, ..., size - 1}`.
    ///
    /// # Examples
    /// ```
    /// use qvcomp::alphabet::Alphabet;
    ///
    /// let alphabet = Alphabet::trivial(4);
    /// assert_eq!(alphabet.symbols(), [0, 1, 2, 3]);
    /// ```
    #[must_use]
    pub fn trivial(size: usize) -> Self {
        assert!(size >= 1);
        assert!(size <= MAX_ALPHABET_SIZE);

        Self::new((0..size as Symbol).collect_vec())
    }

    /// Returns the number of symbols in this alphabet.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Returns `true` if this alphabet contains no symbols.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Returns `true` if `symbol` is a member of this alphabet.
    #[inline]
    #[must_use]
    pub fn contains(&self, symbol: Symbol) -> bool {
        self.indices[symbol as usize] != INDEX_NOT_FOUND
    }

    /// Returns the position of `symbol` within this alphabet, or `None` if
    /// the symbol is not a member.
    #[inline]
    #[must_use]
    pub fn index_of(&self, symbol: Symbol) -> Option<usize> {
        match self.indices[symbol as usize] {
            INDEX_NOT_FOUND => None,
            index => Some(index as usize),
        }
    }

    /// Returns the symbol at the given position.
    ///
    /// # Panics
    /// This function panics if `index` is out of bounds.
    #[inline]
    #[must_use]
    pub fn symbol_at(&self, index: usize) -> Symbol {
        self.symbols[index]
    }

    /// Returns the symbols of this alphabet, in ascending order.
    #[inline]
    #[must_use]
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Returns `true` if the symbols form the contiguous range
    /// `0..self.len()`.
    #[must_use]
    pub fn is_trivial(&self) -> bool {
        self.symbols
            .iter()
            .enumerate()
            .all(|(index, &symbol)| symbol as usize == index)
    }

    /// Returns the union of this alphabet and `other`, in ascending symbol
    /// order.
    ///
    /// # Examples
    /// ```
    /// use qvcomp::alphabet::Alphabet;
    ///
    /// let a = Alphabet::new([0, 2]);
    /// let b = Alphabet::new([0, 1, 3]);
    /// assert_eq!(a.union(&b), Alphabet::new([0, 1, 2, 3]));
    /// ```
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let symbols = self
            .symbols
            .iter()
            .merge(other.symbols.iter())
            .copied()
            .dedup()
            .collect_vec();

        Self::new(symbols)
    }
}

impl PartialEq for Alphabet {
    fn eq(&self, other: &Self) -> bool {
        self.symbols == other.symbols
    }
}

impl Eq for Alphabet {}

impl Display for Alphabet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}}", self.symbols.iter().join(", "))
    }
}

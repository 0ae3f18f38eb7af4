use log::debug;

use crate::alphabet::{Alphabet, Symbol};
use crate::error::{CodebookError, CodebookResult};
use crate::pmf::{Entropy, Pmf};
use crate::qual::QualityCorpus;

/// Per-column conditional statistics of a training corpus.
///
/// For `C` columns over an alphabet of size `A`, the store holds
/// `1 + A * (C - 1)` distributions: one unconditional distribution for
/// column 0 and one distribution per (column, previous symbol) pair for the
/// remaining columns, all in a flat array resolved by the accessors. The
/// per-column marginal distributions are derived from these.
///
/// Conditional distributions of contexts that never occur in the corpus are
/// kept as raw all-zero vectors; their predecessor marginal weight is zero,
/// so consumers never sample them.
///
/// The store is read-only after construction.
#[derive(Debug, Clone)]
pub struct CondPmfStore {
    alphabet: Alphabet,
    columns: usize,
    pmfs: Vec<Pmf>,
    marginals: Vec<Pmf>,
}

impl CondPmfStore {
    /// Counts all conditional occurrences in `corpus` and derives the
    /// per-column marginals.
    ///
    /// # Errors
    /// Returns [`CodebookError::TrainingCorpusEmpty`] if the corpus has no
    /// lines, and [`CodebookError::ConfigurationInvalid`] if the corpus
    /// contains symbols outside `alphabet`.
    pub fn from_corpus(corpus: &QualityCorpus, alphabet: &Alphabet) -> CodebookResult<Self> {
        if corpus.is_empty() {
            return Err(CodebookError::TrainingCorpusEmpty);
        }
        if corpus
            .max_symbol()
            .map_or(false, |symbol| !alphabet.contains(symbol))
        {
            return Err(CodebookError::ConfigurationInvalid(format!(
                "corpus contains symbols outside the alphabet {}",
                alphabet
            )));
        }

        let columns = corpus.columns();
        let count = 1 + alphabet.len() * (columns - 1);
        let mut pmfs = vec![Pmf::new(alphabet); count];

        for line in corpus.lines() {
            pmfs[0].increment(line[0]);
            for column in 1..columns {
                let index = Self::pmf_index(alphabet.len(), column, line[column - 1]);
                pmfs[index].increment(line[column]);
            }
        }

        let mut seen = 0_usize;
        for pmf in &mut pmfs {
            if pmf.total_mass() > 0.0 {
                pmf.renormalize()?;
                seen += 1;
            }
        }
        debug!(
            "gathered statistics for {} columns, {}/{} contexts observed",
            columns,
            seen,
            pmfs.len()
        );

        let marginals = Self::derive_marginals(alphabet, columns, &pmfs)?;

        Ok(Self {
            alphabet: alphabet.clone(),
            columns,
            pmfs,
            marginals,
        })
    }

    /// Derives `marg[c] = sum_s marg[c-1](s) * cond[c | s]`.
    fn derive_marginals(
        alphabet: &Alphabet,
        columns: usize,
        pmfs: &[Pmf],
    ) -> CodebookResult<Vec<Pmf>> {
        let mut marginals: Vec<Pmf> = Vec::with_capacity(columns);
        marginals.push(pmfs[0].clone());

        for column in 1..columns {
            let mut marginal = Pmf::new(alphabet);
            for (index, &symbol) in alphabet.symbols().iter().enumerate() {
                let weight = marginals[column - 1].probability_indexed(index).get();
                if weight == 0.0 {
                    continue;
                }
                let cond = &pmfs[Self::pmf_index(alphabet.len(), column, symbol)];
                marginal.combine(cond, 1.0, weight);
            }
            marginal.renormalize()?;
            marginals.push(marginal);
        }

        Ok(marginals)
    }

    #[inline]
    fn pmf_index(alphabet_size: usize, column: usize, prev: Symbol) -> usize {
        if column == 0 {
            0
        } else {
            1 + (column - 1) * alphabet_size + prev as usize
        }
    }

    /// Returns the alphabet the statistics are defined over.
    #[inline]
    #[must_use]
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// Returns the number of columns covered by the statistics.
    #[inline]
    #[must_use]
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Returns the distribution of `column` conditioned on the previous
    /// column's value. For column 0 the single unconditional distribution is
    /// returned and `prev` is ignored.
    ///
    /// # Panics
    /// This function panics if `column` or `prev` are out of range.
    #[must_use]
    pub fn cond_pmf(&self, column: usize, prev: Symbol) -> &Pmf {
        assert!(column < self.columns);
        assert!((prev as usize) < self.alphabet.len());
        &self.pmfs[Self::pmf_index(self.alphabet.len(), column, prev)]
    }

    /// Returns the marginal distribution of `column`.
    ///
    /// # Panics
    /// This function panics if `column` is out of range.
    #[must_use]
    pub fn marginal(&self, column: usize) -> &Pmf {
        &self.marginals[column]
    }

    /// Returns the entropy of `column` conditioned on the previous column,
    /// `sum_s marg[c-1](s) * H(cond[c | s])`. For column 0 this is the
    /// unconditional entropy.
    #[must_use]
    pub fn conditional_entropy(&self, column: usize) -> Entropy {
        if column == 0 {
            return self.cond_pmf(0, 0).entropy();
        }

        let mut bits = 0.0;
        for (index, &symbol) in self.alphabet.symbols().iter().enumerate() {
            let weight = self.marginals[column - 1].probability_indexed(index).get();
            if weight == 0.0 {
                continue;
            }
            bits += weight * self.cond_pmf(column, symbol).entropy().get();
        }

        Entropy::new(bits)
    }
}

use log::{debug, trace};
use rayon::prelude::*;

use crate::alphabet::Alphabet;
use crate::codebook::{BitAllocation, CondQuantizerStore, QuantizerPair};
use crate::distortion::DistortionTable;
use crate::error::{CodebookError, CodebookResult};
use crate::pmf::{Entropy, Pmf};
use crate::quantizer::Quantizer;
use crate::stats::CondPmfStore;

/// Generates the full conditional quantizer store for a set of column
/// statistics.
///
/// Columns are processed left to right. For every column the generator
/// derives the distribution of the current source symbol conditioned on the
/// previous column's quantized output, sizes a low/high quantizer pair for
/// each such context from the entropy budget, and stores the pair under the
/// context symbol. Two distributions are carried between iterations: the
/// per-source-symbol distribution of the previous quantizer output, and the
/// per-output distribution of the current source symbol.
#[derive(Debug)]
pub struct CodebookGenerator<'a> {
    stats: &'a CondPmfStore,
    distortion: &'a DistortionTable,
    comp: f64,
}

impl<'a> CodebookGenerator<'a> {
    /// Creates a new `CodebookGenerator` instance.
    ///
    /// `comp` is the entropy budget multiplier: every context's rate target
    /// is its source entropy times `comp`.
    ///
    /// # Panics
    /// This function panics if the distortion table does not cover the
    /// statistics alphabet.
    #[must_use]
    pub fn new(stats: &'a CondPmfStore, distortion: &'a DistortionTable, comp: f64) -> Self {
        assert_eq!(stats.alphabet().len(), distortion.size());

        Self {
            stats,
            distortion,
            comp,
        }
    }

    /// Runs the generation and returns the resulting codebook.
    ///
    /// # Errors
    /// Returns [`CodebookError::ConfigurationInvalid`] for an unusable
    /// `comp` value; any internal inconsistency surfaces as the
    /// corresponding [`CodebookError`] variant.
    pub fn generate(&self) -> CodebookResult<GeneratedCodebook> {
        if !self.comp.is_finite() || self.comp < 0.0 {
            return Err(CodebookError::ConfigurationInvalid(format!(
                "comp must be a non-negative finite number, got {}",
                self.comp
            )));
        }

        let columns = self.stats.columns();
        let mut store = CondQuantizerStore::new(columns);
        let mut column_distortion = Vec::with_capacity(columns);
        let mut column_rate = Vec::with_capacity(columns);

        // Column 0 has a single, unconditional context
        let (pair, allocation) = self.design_pair(self.stats.cond_pmf(0, 0))?;
        column_distortion.push(pair.expected_distortion());
        column_rate.push(allocation.mixed_entropy().get());
        store.open_column(Alphabet::new(vec![0]));
        store.store_pair(0, 0, pair)?;

        let mut prev_qpmf: Vec<Pmf> = Vec::new();

        for column in 1..columns {
            let union = store.output_union(column - 1)?;
            trace!("column {}: input alphabet {}", column, union);

            let qpmf = self.propagate_qpmf(&store, column, &union, &prev_qpmf)?;
            let sources = self.derive_sources(column, &union, &qpmf)?;
            store.open_column(union.clone());

            let designed: CodebookResult<Vec<(QuantizerPair, BitAllocation)>> = sources
                .par_iter()
                .map(|(pmf, _weight)| self.design_pair(pmf))
                .collect();
            let designed = designed?;

            let mut distortion = 0.0;
            let mut rate = 0.0;
            for (index, (pair, allocation)) in designed.into_iter().enumerate() {
                let weight = sources[index].1;
                distortion += weight * pair.expected_distortion();
                rate += weight * allocation.mixed_entropy().get();
                store.store_pair(column, union.symbol_at(index), pair)?;
            }
            column_distortion.push(distortion);
            column_rate.push(rate);

            prev_qpmf = qpmf;
        }

        let result = GeneratedCodebook {
            quantizers: store,
            column_distortion,
            column_rate,
        };
        debug!(
            "generated codebook {}: {} columns, {:.4} bits/symbol, expected distortion {:.4}",
            result.quantizers.identifier(),
            columns,
            result.expected_rate(),
            result.expected_distortion()
        );

        Ok(result)
    }

    /// Sizes and designs the low/high quantizer pair for one context.
    fn design_pair(&self, source: &Pmf) -> CodebookResult<(QuantizerPair, BitAllocation)> {
        let allocation = BitAllocation::for_entropy(source.entropy() * self.comp);
        let low = Quantizer::design(source, self.distortion, allocation.low(), allocation.ratio())?;
        let high = Quantizer::design(
            source,
            self.distortion,
            allocation.high(),
            1.0 - allocation.ratio(),
        )?;

        Ok((
            QuantizerPair::new(low, high, allocation.ratio()),
            allocation,
        ))
    }

    /// Computes, for every source symbol `k`, the distribution of the
    /// previous column's quantized output over `union`.
    ///
    /// The quantizer pair applied at column `c - 1` depends on its own left
    /// context `j`, so the contributions of every `j` are accumulated,
    /// weighted by the probability that symbol `k` is seen with context `j`.
    /// That weight Bayes-chains the previous iteration's output
    /// distributions with the conditional column statistics and the
    /// column `c - 2` marginal. For column 1 there is a single context with
    /// certain weight.
    fn propagate_qpmf(
        &self,
        store: &CondQuantizerStore,
        column: usize,
        union: &Alphabet,
        prev_qpmf: &[Pmf],
    ) -> CodebookResult<Vec<Pmf>> {
        let alphabet = self.stats.alphabet();
        let size = alphabet.len();
        let contexts = store.input_alphabet(column - 1).len();

        let mut rows: Vec<Pmf> = (0..size).map(|_| Pmf::new(union)).collect();
        for (k, row) in rows.iter_mut().enumerate() {
            let symbol = alphabet.symbol_at(k);

            let mut weights = vec![0.0_f64; contexts];
            if column == 1 {
                weights[0] = 1.0;
            } else {
                let marginal = self.stats.marginal(column - 2);
                for x in 0..size {
                    let mass = marginal.probability_indexed(x).get();
                    if mass == 0.0 || !prev_qpmf[x].is_ready() {
                        continue;
                    }
                    let cond = self.stats.cond_pmf(column - 1, alphabet.symbol_at(x));
                    let transition = cond.probability_indexed(k).get() * mass;
                    if transition == 0.0 {
                        continue;
                    }
                    for (j, weight) in weights.iter_mut().enumerate() {
                        *weight += prev_qpmf[x].probability_indexed(j).get() * transition;
                    }
                }
            }

            for (j, &weight) in weights.iter().enumerate() {
                if weight == 0.0 {
                    continue;
                }
                let pair = store.pair_at(column - 1, j)?;
                let low_index = union
                    .index_of(pair.low().quantize(symbol))
                    .ok_or_else(|| {
                        CodebookError::invariant(column, "low output not in the union")
                    })?;
                row.add_mass_indexed(low_index, weight * pair.ratio());
                let high_index = union
                    .index_of(pair.high().quantize(symbol))
                    .ok_or_else(|| {
                        CodebookError::invariant(column, "high output not in the union")
                    })?;
                row.add_mass_indexed(high_index, weight * (1.0 - pair.ratio()));
            }

            // a source symbol that cannot occur at column c - 1 leaves an
            // empty row; downstream marginal weights are zero for it as well
            if row.total_mass() > 0.0 {
                row.renormalize()?;
            }
        }

        Ok(rows)
    }

    /// Computes, for every previous output symbol in `union`, the source
    /// distribution of the current column together with the raw probability
    /// of that output occurring at all.
    fn derive_sources(
        &self,
        column: usize,
        union: &Alphabet,
        qpmf: &[Pmf],
    ) -> CodebookResult<Vec<(Pmf, f64)>> {
        let alphabet = self.stats.alphabet();
        let size = alphabet.len();
        let marginal = self.stats.marginal(column - 1);

        let mut sources = Vec::with_capacity(union.len());
        for index in 0..union.len() {
            let mut row = Pmf::new(alphabet);
            for x in 0..size {
                let mass = marginal.probability_indexed(x).get();
                if mass == 0.0 || !qpmf[x].is_ready() {
                    continue;
                }
                let output_prob = qpmf[x].probability_indexed(index).get() * mass;
                if output_prob == 0.0 {
                    continue;
                }
                let cond = self.stats.cond_pmf(column, alphabet.symbol_at(x));
                for k in 0..size {
                    row.add_mass_indexed(k, output_prob * cond.probability_indexed(k).get());
                }
            }

            let weight = row.total_mass();
            if weight > 0.0 {
                row.renormalize()?;
            } else {
                // the output symbol is unreachable; keep the context
                // well-defined with a uniform source so a pair is stored
                trace!(
                    "column {}: output {} is unreachable, using a uniform source",
                    column,
                    union.symbol_at(index)
                );
                row = Pmf::from_probabilities(alphabet, vec![1.0 / size as f64; size]);
            }
            sources.push((row, weight));
        }

        Ok(sources)
    }
}

/// The result of codebook generation: the conditional quantizer store plus
/// the expected per-column rate and distortion over the training statistics.
#[derive(Debug)]
pub struct GeneratedCodebook {
    quantizers: CondQuantizerStore,
    column_distortion: Vec<f64>,
    column_rate: Vec<f64>,
}

impl GeneratedCodebook {
    /// Returns the conditional quantizer store.
    #[inline]
    #[must_use]
    pub fn quantizers(&self) -> &CondQuantizerStore {
        &self.quantizers
    }

    /// Consumes the result, returning the conditional quantizer store.
    #[must_use]
    pub fn into_quantizers(self) -> CondQuantizerStore {
        self.quantizers
    }

    /// Returns the expected distortion of each column.
    #[inline]
    #[must_use]
    pub fn column_distortion(&self) -> &[f64] {
        &self.column_distortion
    }

    /// Returns the expected rate of each column, in bits per symbol.
    #[inline]
    #[must_use]
    pub fn column_rate(&self) -> &[f64] {
        &self.column_rate
    }

    /// Returns the expected distortion per symbol, averaged over columns.
    #[must_use]
    pub fn expected_distortion(&self) -> f64 {
        self.column_distortion.iter().sum::<f64>() / self.column_distortion.len() as f64
    }

    /// Returns the expected rate in bits per symbol, averaged over columns.
    #[must_use]
    pub fn expected_rate(&self) -> f64 {
        self.column_rate.iter().sum::<f64>() / self.column_rate.len() as f64
    }

    /// Returns the expected rate as an [`Entropy`].
    #[must_use]
    pub fn rate(&self) -> Entropy {
        Entropy::new(self.expected_rate())
    }
}

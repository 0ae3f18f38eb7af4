use log::debug;

use crate::alphabet::Symbol;
use crate::codebook::CondQuantizerStore;
use crate::distortion::DistortionTable;
use crate::error::{CodebookError, CodebookResult};
use crate::qual::QualityCorpus;

/// Applies a conditional quantizer store to quality lines, producing the
/// lossy reconstruction the decoder will emit.
///
/// For every symbol the encoder asks the store to select the low or high
/// quantizer for the current column and left context, emits the reproduction
/// symbol, and carries it as the next column's context. The selection
/// sequence comes from the store's own PRNG, so an encoder and a decoder
/// built around identically seeded stores stay in lockstep.
#[derive(Debug)]
pub struct LossyEncoder {
    store: CondQuantizerStore,
}

impl LossyEncoder {
    /// Creates a new `LossyEncoder` instance owning the given store.
    #[must_use]
    pub fn new(store: CondQuantizerStore) -> Self {
        Self { store }
    }

    /// Returns the underlying quantizer store.
    #[inline]
    #[must_use]
    pub fn store(&self) -> &CondQuantizerStore {
        &self.store
    }

    /// Consumes this encoder, returning the underlying store.
    #[must_use]
    pub fn into_store(self) -> CondQuantizerStore {
        self.store
    }

    /// Encodes a single line, pushing the reproduction symbols into `output`.
    ///
    /// # Errors
    /// Returns [`CodebookError::InternalInvariantViolated`] if the line
    /// width does not match the store, or any error surfaced by the store
    /// lookups.
    pub fn encode_line(&mut self, line: &[Symbol], output: &mut Vec<Symbol>) -> CodebookResult<()> {
        if line.len() != self.store.columns() {
            return Err(CodebookError::invariant(
                0,
                format!(
                    "line width {} does not match the {}-column store",
                    line.len(),
                    self.store.columns()
                ),
            ));
        }

        let mut prev: Symbol = 0;
        for (column, &symbol) in line.iter().enumerate() {
            let quantizer = self.store.choose(column, prev)?;
            let reproduction = quantizer.quantize(symbol);
            output.push(reproduction);
            prev = reproduction;
        }

        Ok(())
    }

    /// Encodes a whole corpus, returning the lossy lines together with the
    /// realized distortion per symbol.
    pub fn encode_corpus(
        &mut self,
        corpus: &QualityCorpus,
        distortion: &DistortionTable,
    ) -> CodebookResult<LossyOutput> {
        let mut data = Vec::with_capacity(corpus.line_count() * corpus.columns());
        let mut total = 0.0;

        for line in corpus.lines() {
            let start = data.len();
            self.encode_line(line, &mut data)?;
            for (&original, &reproduction) in line.iter().zip(&data[start..]) {
                total += distortion.get(original, reproduction);
            }
        }

        let symbols = corpus.line_count() * corpus.columns();
        let realized_distortion = if symbols == 0 {
            0.0
        } else {
            total / symbols as f64
        };
        debug!(
            "encoded {} lines, {} distortion {:.4} per symbol",
            corpus.line_count(),
            distortion.metric(),
            realized_distortion
        );

        Ok(LossyOutput {
            lines: QualityCorpus::from_lines(
                data.chunks_exact(corpus.columns().max(1))
                    .map(<[Symbol]>::to_vec),
            ),
            distortion: realized_distortion,
        })
    }
}

/// The result of lossily encoding a corpus.
#[derive(Debug)]
pub struct LossyOutput {
    lines: QualityCorpus,
    distortion: f64,
}

impl LossyOutput {
    /// Returns the lossy reconstruction of the input lines.
    #[inline]
    #[must_use]
    pub fn lines(&self) -> &QualityCorpus {
        &self.lines
    }

    /// Consumes this output, returning the reconstructed lines.
    #[must_use]
    pub fn into_lines(self) -> QualityCorpus {
        self.lines
    }

    /// Returns the realized distortion per symbol.
    #[inline]
    #[must_use]
    pub fn distortion(&self) -> f64 {
        self.distortion
    }
}

use lazy_static::lazy_static;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::alphabet::Symbol;
use crate::qual::reader::{QualReader, QualReaderParams};
use crate::qual::QualityCorpus;

/// Four quality lines over the alphabet `{0, 1, 2, 3}`, in Phred+33 text
/// form.
pub const FOUR_LINE_QUAL_STR: &str = "!!!\n!\"!\n\"\"#\n$#\"\n";

lazy_static! {
    /// The corpus parsed from [`FOUR_LINE_QUAL_STR`]:
    /// `[[0,0,0], [0,1,0], [1,1,2], [3,2,1]]`.
    pub static ref FOUR_LINE_CORPUS: QualityCorpus = {
        let params = QualReaderParams::builder().alphabet_size(4).build();
        QualReader::with_params(FOUR_LINE_QUAL_STR.as_bytes(), params)
            .read_corpus()
            .expect("test corpus must parse")
    };

    /// 64 random-walk quality lines of width 16 over the default 41-symbol
    /// alphabet, resembling real per-base quality profiles.
    pub static ref RANDOM_QV_CORPUS: QualityCorpus = random_walk_corpus(64, 16, 41, 2718);
}

/// Generates correlated quality lines: each line starts high and drifts by
/// small steps, as sequencer quality strings do.
#[must_use]
pub fn random_walk_corpus(
    lines: usize,
    columns: usize,
    alphabet_size: usize,
    seed: u64,
) -> QualityCorpus {
    let mut rand = Xoshiro256PlusPlus::seed_from_u64(seed);
    let max = (alphabet_size - 1) as i32;

    let mut result = Vec::with_capacity(lines);
    for _ in 0..lines {
        let mut value: i32 = rand.gen_range(max / 2..=max);
        let mut line = Vec::with_capacity(columns);
        for _ in 0..columns {
            value = (value + rand.gen_range(-2..=1)).clamp(0, max);
            line.push(value as Symbol);
        }
        result.push(line);
    }

    QualityCorpus::from_lines(result)
}

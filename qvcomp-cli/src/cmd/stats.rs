use std::path::Path;

use anyhow::Context;
use qvcomp::alphabet::Alphabet;
use qvcomp::codebook::BitAllocation;
use qvcomp::stats::CondPmfStore;

use crate::cmd::load_corpus;

pub fn run(input: &Path, comp: f64, alphabet_size: usize) -> anyhow::Result<()> {
    let corpus = load_corpus(input, alphabet_size)?;
    let stats = CondPmfStore::from_corpus(&corpus, &Alphabet::trivial(alphabet_size))
        .context("Failed to gather training statistics")?;

    println!("column, marginal entropy, conditional entropy, low states, high states, ratio");
    for column in 0..stats.columns() {
        let marginal = stats.marginal(column).entropy();
        let conditional = stats.conditional_entropy(column);
        let allocation = BitAllocation::for_entropy(conditional * comp);

        println!(
            "{}, {:.4}, {:.4}, {}, {}, {:.4}",
            column,
            marginal.get(),
            conditional.get(),
            allocation.low(),
            allocation.high(),
            allocation.ratio()
        );
    }

    Ok(())
}

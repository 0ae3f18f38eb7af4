pub mod encode;
pub mod generate;
pub mod stats;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::Context;
use log::info;
use qvcomp::qual::reader::{QualReader, QualReaderParams};
use qvcomp::qual::QualityCorpus;

pub(crate) fn load_corpus(path: &Path, alphabet_size: usize) -> anyhow::Result<QualityCorpus> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open quality file {}", path.display()))?;
    let params = QualReaderParams::builder()
        .alphabet_size(alphabet_size)
        .build();
    let corpus = QualReader::with_params(BufReader::new(file), params)
        .read_corpus()
        .with_context(|| format!("Failed to parse quality file {}", path.display()))?;

    info!(
        "loaded {} lines of {} columns ({} bytes) from {}",
        corpus.line_count(),
        corpus.columns(),
        corpus.size_bytes(),
        path.display()
    );

    Ok(corpus)
}

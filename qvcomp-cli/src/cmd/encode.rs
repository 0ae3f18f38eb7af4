use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use log::info;
use qvcomp::codebook_serializer::read_codebook;
use qvcomp::distortion::{DistortionMetric, DistortionTable};
use qvcomp::encoder::LossyEncoder;
use qvcomp::qual::writer::QualWriter;

use crate::cmd::load_corpus;

pub fn run(
    input: &Path,
    codebook: &Path,
    output: &Path,
    distortion: DistortionMetric,
) -> anyhow::Result<()> {
    let start = Instant::now();

    let file = File::open(codebook)
        .with_context(|| format!("Failed to open codebook file {}", codebook.display()))?;
    let store = read_codebook(BufReader::new(file))
        .with_context(|| format!("Failed to parse codebook file {}", codebook.display()))?;
    let alphabet_size = store.pair_at(0, 0).map(|pair| pair.low().len())?;
    info!(
        "loaded codebook {} for {} columns",
        store.identifier(),
        store.columns()
    );

    let corpus = load_corpus(input, alphabet_size)?;
    let table = DistortionTable::new(distortion, alphabet_size);

    let mut encoder = LossyEncoder::new(store);
    let result = encoder
        .encode_corpus(&corpus, &table)
        .context("Failed to encode the quality file")?;

    let file = File::create(output)
        .with_context(|| format!("Failed to create output file {}", output.display()))?;
    let mut writer = QualWriter::new(BufWriter::new(file));
    writer.write_corpus(result.lines())?;
    writer.flush()?;

    info!(
        "encoded {} lines, {} distortion {:.4}, took {:.4} seconds",
        corpus.line_count(),
        distortion,
        result.distortion(),
        start.elapsed().as_secs_f64()
    );

    Ok(())
}

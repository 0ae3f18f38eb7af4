use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use log::info;
use qvcomp::clustering::Clustering;
use qvcomp::codebook_generator::CodebookGenerator;
use qvcomp::codebook_serializer::write_codebook;
use qvcomp::config::CodebookConfig;
use qvcomp::stats::CondPmfStore;

use crate::cmd::load_corpus;

pub fn run(input: &Path, output: &Path, config: &CodebookConfig) -> anyhow::Result<()> {
    let start = Instant::now();
    let corpus = load_corpus(input, config.alphabet_size())?;

    let mut clustering = Clustering::with_threshold(config.cluster_threshold());
    let clusters = clustering.make_clusters(&corpus, config.clusters());
    if config.clusters() > 1 {
        info!("clustered the corpus into {} clusters", clusters.len());
    }

    let alphabet = config.alphabet();
    let table = config.distortion_table();
    let multiple = clusters.len() > 1;
    for (index, cluster) in clusters.iter().enumerate() {
        let subset = corpus.subset(cluster.lines());
        let stats = CondPmfStore::from_corpus(&subset, &alphabet)
            .context("Failed to gather training statistics")?;
        let codebook = CodebookGenerator::new(&stats, &table, config.comp())
            .generate()
            .context("Failed to generate a codebook")?;

        info!(
            "cluster {}: codebook {} for {} lines, {:.4} bits/symbol, expected {} distortion {:.4}",
            index,
            codebook.quantizers().identifier(),
            cluster.lines().len(),
            codebook.expected_rate(),
            config.distortion(),
            codebook.expected_distortion()
        );

        let path = cluster_path(output, index, multiple);
        let file = File::create(&path)
            .with_context(|| format!("Failed to create codebook file {}", path.display()))?;
        write_codebook(codebook.quantizers(), BufWriter::new(file))
            .with_context(|| format!("Failed to write codebook file {}", path.display()))?;
    }

    info!(
        "codebook generation took {:.4} seconds",
        start.elapsed().as_secs_f64()
    );

    Ok(())
}

fn cluster_path(output: &Path, index: usize, multiple: bool) -> PathBuf {
    if multiple {
        let mut path = output.as_os_str().to_owned();
        path.push(format!(".{}", index));
        PathBuf::from(path)
    } else {
        output.to_path_buf()
    }
}

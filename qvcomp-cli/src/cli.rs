use std::path::PathBuf;

use clap::{ArgEnum, Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use qvcomp::distortion::DistortionMetric;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
pub struct Cli {
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    #[clap(subcommand)]
    pub command: Commands,
}

/// The distortion measure to optimize for.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ArgEnum)]
pub enum DistortionCli {
    /// Mean squared error
    Mse,
    /// Absolute (L1) error
    Manhattan,
    /// log2(1 + L1) error
    Lorentz,
}

impl From<DistortionCli> for DistortionMetric {
    fn from(distortion: DistortionCli) -> Self {
        match distortion {
            DistortionCli::Mse => DistortionMetric::Mse,
            DistortionCli::Manhattan => DistortionMetric::Manhattan,
            DistortionCli::Lorentz => DistortionMetric::Lorentz,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train codebooks from a quality value file
    Generate {
        /// Input quality value file path
        #[clap(value_parser)]
        input: PathBuf,

        /// Output codebook file path; with more than one cluster, the
        /// cluster index is appended
        #[clap(value_parser)]
        output: PathBuf,

        /// Bits of rate per bit of source entropy per symbol
        #[clap(short = 'f', long, value_parser, default_value_t = 0.5)]
        comp: f64,

        /// Distortion measure to optimize for
        #[clap(short, long, arg_enum, value_parser, default_value = "mse")]
        distortion: DistortionCli,

        /// Number of training clusters
        #[clap(short, long, value_parser, default_value_t = 1)]
        clusters: usize,

        /// Centroid movement threshold declaring the clustering stable
        #[clap(short = 'T', long, value_parser, default_value_t = 4.0)]
        cluster_threshold: f64,

        /// Number of distinct quality values
        #[clap(short, long, value_parser, default_value_t = 41)]
        alphabet_size: usize,
    },

    /// Apply a codebook to a quality value file, writing the lossy
    /// reconstruction
    Encode {
        /// Input quality value file path
        #[clap(value_parser)]
        input: PathBuf,

        /// Codebook file path
        #[clap(value_parser)]
        codebook: PathBuf,

        /// Output quality value file path
        #[clap(value_parser)]
        output: PathBuf,

        /// Distortion measure to report
        #[clap(short, long, arg_enum, value_parser, default_value = "mse")]
        distortion: DistortionCli,
    },

    /// Print per-column rate statistics of a quality value file
    Stats {
        /// Input quality value file path
        #[clap(value_parser)]
        input: PathBuf,

        /// Bits of rate per bit of source entropy per symbol
        #[clap(short = 'f', long, value_parser, default_value_t = 0.5)]
        comp: f64,

        /// Number of distinct quality values
        #[clap(short, long, value_parser, default_value_t = 41)]
        alphabet_size: usize,
    },
}

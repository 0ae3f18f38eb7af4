use clap::Parser;
use cli::{Cli, Commands};
use human_panic::setup_panic;
use qvcomp::config::CodebookConfig;

use crate::logging::init_logging;

mod cli;
mod cmd;
mod logging;

fn main() -> anyhow::Result<()> {
    setup_panic!();

    let cli: Cli = Cli::parse();

    init_logging(cli.verbose.log_level_filter()).expect("Could not initialize logging");

    match &cli.command {
        Commands::Generate {
            input,
            output,
            comp,
            distortion,
            clusters,
            cluster_threshold,
            alphabet_size,
        } => {
            let config = CodebookConfig::builder()
                .alphabet_size(*alphabet_size)
                .distortion((*distortion).into())
                .comp(*comp)
                .clusters(*clusters)
                .cluster_threshold(*cluster_threshold)
                .build()?;
            cmd::generate::run(input, output, &config)?;
        }
        Commands::Encode {
            input,
            codebook,
            output,
            distortion,
        } => {
            cmd::encode::run(input, codebook, output, (*distortion).into())?;
        }
        Commands::Stats {
            input,
            comp,
            alphabet_size,
        } => {
            cmd::stats::run(input, *comp, *alphabet_size)?;
        }
    }

    Ok(())
}

mod cluster;
mod condition;
mod inputs;
mod matrix;

use anyhow::Result;
use clap::{Command, arg};
use log::LevelFilter;

pub mod consts {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
    pub const BIN_NAME: &str = "tsrkit";
}

fn build_parser() -> Command {
    Command::new(consts::BIN_NAME)
        .bin_name(consts::BIN_NAME)
        .version(consts::VERSION)
        .about("Cluster transcription start sites into transcription start regions and slice the resulting tables.")
        .subcommand_required(true)
        .arg(
            arg!(-v --verbose)
                .global(true)
                .action(clap::ArgAction::SetTrue)
                .help("Log debug messages (RUST_LOG takes precedence)"),
        )
        .subcommand(cluster::cli::create_cluster_cli())
        .subcommand(condition::cli::create_condition_cli())
        .subcommand(matrix::cli::create_matrix_cli())
}

fn init_logging(verbose: bool) {
    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}

fn main() -> Result<()> {
    let app = build_parser();
    let matches = app.get_matches();

    init_logging(matches.get_flag("verbose"));

    match matches.subcommand() {
        //
        // CLUSTER
        //
        Some((cluster::cli::CLUSTER_CMD, matches)) => {
            cluster::handlers::run_cluster(matches)?;
        }

        //
        // CONDITION
        //
        Some((condition::cli::CONDITION_CMD, matches)) => {
            condition::handlers::run_condition(matches)?;
        }

        //
        // MATRIX
        //
        Some((matrix::cli::MATRIX_CMD, matches)) => {
            matrix::handlers::run_matrix(matches)?;
        }

        _ => unreachable!("Subcommand not found"),
    };

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_is_consistent() {
        build_parser().debug_assert();
    }
}

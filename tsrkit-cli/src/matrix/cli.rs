use clap::{Arg, Command, arg};

use crate::inputs::tss_args;

pub const MATRIX_CMD: &str = "matrix";

pub fn create_matrix_cli() -> Command {
    tss_args(
        Command::new(MATRIX_CMD)
            .about("Cluster TSSs from several samples and write the TSR by sample count matrix."),
    )
    .arg(
        Arg::new("cpm")
            .long("cpm")
            .action(clap::ArgAction::SetTrue)
            .help("Cluster on counts-per-million scores instead of raw counts"),
    )
    .arg(
        arg!(--output <OUTPUT>)
            .required(false)
            .help("Output matrix, gzipped when ending in .gz (default: stdout)"),
    )
}

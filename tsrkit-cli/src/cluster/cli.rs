use clap::{Arg, Command, arg};

use crate::inputs::tss_args;

pub const CLUSTER_CMD: &str = "cluster";

pub fn create_cluster_cli() -> Command {
    tss_args(
        Command::new(CLUSTER_CMD)
            .about("Cluster TSSs into TSRs, mark dominant TSSs and compute TSR shape metrics."),
    )
    .arg(
        Arg::new("per-sample")
            .long("per-sample")
            .action(clap::ArgAction::SetTrue)
            .help("Cluster every sample on its own instead of pooling them"),
    )
    .arg(
        arg!(--output <OUTPUT>)
            .required(false)
            .help("Output TSR table, gzipped when ending in .gz (default: stdout)"),
    )
    .arg(
        Arg::new("tss-output")
            .long("tss-output")
            .required(false)
            .help("Also write the TSS table with TSR membership and dominance"),
    )
}

use std::io::Write;

use anyhow::{Context, Result};
use clap::ArgMatches;

use tsrkit_cluster::{ClusterMode, process};
use tsrkit_core::utils::write_table;

use crate::inputs::{load_tss, output_writer, resolve_config};

pub fn run_cluster(matches: &ArgMatches) -> Result<()> {
    let config = resolve_config(matches)?;
    let mode = if matches.get_flag("per-sample") {
        ClusterMode::PerSample
    } else {
        ClusterMode::Pooled
    };

    let mut tss = load_tss(matches)?;
    let tsrs = process(&mut tss, &config, mode).context("Failed to cluster TSSs")?;

    let mut writer = output_writer(matches.get_one::<String>("output"))?;
    write_table(&tsrs, &mut writer)?;
    writer.flush()?;

    if let Some(path) = matches.get_one::<String>("tss-output") {
        let mut writer = output_writer(Some(path))?;
        write_table(&tss, &mut writer)?;
        writer.flush()?;
    }

    Ok(())
}

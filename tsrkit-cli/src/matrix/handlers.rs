use std::io::Write;

use anyhow::{Context, Result};
use clap::ArgMatches;

use tsrkit_cluster::{ClusterMode, CountMatrix, CpmNormalizer, normalize_tss, process};

use crate::inputs::{load_tss, output_writer, resolve_config};

pub fn run_matrix(matches: &ArgMatches) -> Result<()> {
    let config = resolve_config(matches)?;
    let mut tss = load_tss(matches)?;

    if matches.get_flag("cpm") {
        normalize_tss(&mut tss, &CpmNormalizer).context("Failed to normalize TSS counts")?;
    }

    let tsrs = process(&mut tss, &config, ClusterMode::Pooled).context("Failed to cluster TSSs")?;
    let counts = CountMatrix::from_tsrs(&tss, &tsrs)?;
    log::info!(
        "Built a {} x {} count matrix",
        counts.n_rows(),
        counts.n_samples()
    );

    let mut writer = output_writer(matches.get_one::<String>("output"))?;
    counts.write_tsv(&mut writer)?;
    writer.flush()?;

    Ok(())
}

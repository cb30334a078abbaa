use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::ArgMatches;
use serde::Serialize;

use tsrkit_condition::{Conditioning, OrderSpec, Partition, QuantileSpec, condition};
use tsrkit_core::models::{DelimitedTable, Table};

use crate::inputs::output_writer;

#[derive(Serialize)]
struct ConditionOutput<'a> {
    table: &'a str,
    n_rows: usize,
    conditioning: &'a Conditioning,
    partitions: Vec<Partition>,
}

fn build_conditioning(matches: &ArgMatches) -> Conditioning {
    let mut conditioning = Conditioning::new();

    if let Some(column) = matches.get_one::<String>("group-by") {
        conditioning = conditioning.group_by(column);
    }
    if let Some(column) = matches.get_one::<String>("quantile-by") {
        let n_bins = matches.get_one::<usize>("bins").copied().unwrap_or(5);
        let mut spec = QuantileSpec::new(column, n_bins);
        if matches.get_flag("ascending") {
            spec = spec.ascending();
        }
        conditioning = conditioning.quantile_by(spec);
    }
    if let Some(column) = matches.get_one::<String>("order-by") {
        let mut spec = OrderSpec::new(column);
        if matches.get_flag("descending") {
            spec = spec.descending();
        }
        conditioning = conditioning.order_by(spec);
    }

    conditioning
}

pub fn run_condition(matches: &ArgMatches) -> Result<()> {
    let table_path = matches
        .get_one::<String>("table")
        .context("A path to a table is required")?;

    let table = DelimitedTable::try_from(Path::new(table_path))
        .with_context(|| format!("Failed to read table {}", table_path))?;
    let conditioning = build_conditioning(matches);

    let partitions = condition(&table, &conditioning)
        .with_context(|| format!("Cannot condition {}", table_path))?;

    let output = ConditionOutput {
        table: table_path,
        n_rows: table.num_rows(),
        conditioning: &conditioning,
        partitions,
    };

    let mut writer = output_writer(matches.get_one::<String>("output"))?;
    serde_json::to_writer_pretty(&mut writer, &output)?;
    writeln!(writer)?;
    writer.flush()?;

    Ok(())
}

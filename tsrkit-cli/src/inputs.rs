//! Arguments and loading shared by the subcommands that read TSS files.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command, arg, value_parser};
use indicatif::{ProgressBar, ProgressStyle};

use tsrkit_core::config::TsrConfig;
use tsrkit_core::models::TssTable;
use tsrkit_core::utils::get_dynamic_writer;

pub fn tss_args(command: Command) -> Command {
    command
        .arg(
            arg!(--tss <TSS>)
                .required(true)
                .num_args(1..)
                .help("One or more TSS tables (tsv or tsv.gz): sample chrom position strand count [normalized_score]"),
        )
        .arg(
            arg!(--config <CONFIG>)
                .required(false)
                .help("TOML file with [clustering] and [metrics] sections"),
        )
        .arg(
            Arg::new("max-distance")
                .long("max-distance")
                .required(false)
                .value_parser(value_parser!(u32))
                .help("Maximum gap between positions merged into one TSR"),
        )
        .arg(
            arg!(--threshold <THRESHOLD>)
                .required(false)
                .value_parser(value_parser!(f64))
                .help("Minimum TSS score taking part in clustering"),
        )
        .arg(
            Arg::new("n-samples")
                .long("n-samples")
                .required(false)
                .value_parser(value_parser!(usize))
                .help("Minimum number of samples supporting a position"),
        )
}

///
/// Load the configuration file if given, then apply command line overrides.
///
pub fn resolve_config(matches: &ArgMatches) -> Result<TsrConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => TsrConfig::try_from(Path::new(path))
            .with_context(|| format!("Failed to load config {}", path))?,
        None => TsrConfig::default(),
    };

    if let Some(&d) = matches.get_one::<u32>("max-distance") {
        config.clustering.max_distance = d;
    }
    if let Some(&t) = matches.get_one::<f64>("threshold") {
        config.clustering.threshold = t;
    }
    if let Some(&n) = matches.get_one::<usize>("n-samples") {
        config.clustering.n_samples = n;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

///
/// Read every `--tss` file and concatenate them into one table sorted by
/// (chr, strand, position, sample).
///
pub fn load_tss(matches: &ArgMatches) -> Result<TssTable> {
    let paths: Vec<&String> = matches
        .get_many::<String>("tss")
        .context("At least one --tss file is required")?
        .collect();

    let pb = ProgressBar::new(paths.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")?
            .progress_chars("##-"),
    );

    let mut tables = Vec::with_capacity(paths.len());
    for path in paths {
        pb.set_message(path.clone());
        let table = TssTable::try_from(path.as_str())
            .with_context(|| format!("Failed to read TSS table {}", path))?;
        tables.push(table);
        pb.inc(1);
    }
    pb.finish_and_clear();

    let mut tss = TssTable::concat(tables).context("TSS tables overlap")?;
    tss.sort();
    log::info!(
        "Loaded {} TSSs from {} samples",
        tss.len(),
        tss.samples().len()
    );
    Ok(tss)
}

/// A file writer (gzip when the name ends in .gz) or stdout.
pub fn output_writer(path: Option<&String>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => get_dynamic_writer(Path::new(path))
            .with_context(|| format!("Failed to create {}", path)),
        None => Ok(Box::new(io::stdout().lock())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    fn parse(args: &[&str]) -> ArgMatches {
        tss_args(Command::new("test")).get_matches_from(args)
    }

    #[rstest]
    fn test_flags_override_defaults() {
        let matches = parse(&["test", "--tss", "a.tsv", "--max-distance", "40", "--threshold", "2.5"]);
        let config = resolve_config(&matches).unwrap();
        assert_eq!(config.clustering.max_distance, 40);
        assert_eq!(config.clustering.threshold, 2.5);
        assert_eq!(config.clustering.n_samples, 1);
    }

    #[rstest]
    fn test_flags_override_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[clustering]\nmax_distance = 10\nn_samples = 2\n").unwrap();
        let path = file.path().to_str().unwrap();

        let matches = parse(&["test", "--tss", "a.tsv", "--config", path, "--n-samples", "3"]);
        let config = resolve_config(&matches).unwrap();
        assert_eq!(config.clustering.max_distance, 10);
        assert_eq!(config.clustering.n_samples, 3);
    }

    #[rstest]
    fn test_invalid_override_rejected() {
        let matches = parse(&["test", "--tss", "a.tsv", "--threshold", "0"]);
        assert!(resolve_config(&matches).is_err());
    }

    #[rstest]
    fn test_load_multiple_files() {
        let mut a = NamedTempFile::new().unwrap();
        writeln!(a, "#sample\tchrom\tposition\tstrand\tcount\nx\tchr1\t10\t+\t3").unwrap();
        let mut b = NamedTempFile::new().unwrap();
        writeln!(b, "y\tchr1\t12\t+\t1\ny\tchr1\t10\t+\t4").unwrap();

        let matches = parse(&[
            "test",
            "--tss",
            a.path().to_str().unwrap(),
            b.path().to_str().unwrap(),
        ]);
        let tss = load_tss(&matches).unwrap();
        assert_eq!(tss.len(), 3);
        assert_eq!(tss.samples(), vec!["x", "y"]);
        let order: Vec<(u32, &str)> = tss
            .records
            .iter()
            .map(|r| (r.position, r.sample.as_str()))
            .collect();
        assert_eq!(order, vec![(10, "x"), (10, "y"), (12, "y")]);
    }
}

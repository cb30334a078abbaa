//! Clustering of TSS records into transcription start regions.
//!
//! Every (chromosome, strand) partition is processed independently in three
//! steps:
//!
//! 1. drop TSS records scoring below the threshold,
//! 2. keep only positions supported by enough samples ([`supported_records`]),
//! 3. greedily merge the pooled, sorted positions ([`merge_sorted_positions`]).
//!
//! Partitions run on the rayon pool; the concatenated result is sorted by
//! (chromosome, strand, start, sample) so the output never depends on worker
//! completion order.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::{debug, info};
use rayon::prelude::*;

use tsrkit_core::config::ClusteringConfig;
use tsrkit_core::models::{Strand, TsrRecord, TsrTable, TssRecord, TssTable};
use tsrkit_core::{Result, TsrError};

/// How samples are combined into clustering runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClusterMode {
    /// All samples pooled into one coordinate space; positions need support
    /// from `n_samples` samples.
    #[default]
    Pooled,
    /// One independent run per sample.
    PerSample,
}

/// A merged interval over a slice of sorted positions.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedInterval {
    pub start: u32,
    pub end: u32,
    pub score: f64,
    /// Index range of the constituent points in the merged input.
    pub first: usize,
    pub last: usize,
}

/// One clustering run over a single chromosome and strand.
struct Partition<'a> {
    label: String,
    samples: Vec<String>,
    chr: &'a str,
    strand: Strand,
    min_support: usize,
    records: Vec<&'a TssRecord>,
}

///
/// Keep the records scoring at least `threshold`.
///
pub fn passing_threshold<'a>(records: &[&'a TssRecord], threshold: f64) -> Vec<&'a TssRecord> {
    records
        .iter()
        .filter(|r| r.score() >= threshold)
        .copied()
        .collect()
}

///
/// Keep the records whose position is present in at least `min_support`
/// distinct samples. Input records are expected to share chromosome and
/// strand and to have already passed the score threshold.
///
pub fn supported_records<'a>(records: &[&'a TssRecord], min_support: usize) -> Vec<&'a TssRecord> {
    if min_support <= 1 {
        return records.to_vec();
    }

    let mut support: HashMap<u32, BTreeSet<&str>> = HashMap::new();
    for record in records {
        support
            .entry(record.position)
            .or_default()
            .insert(record.sample.as_str());
    }

    records
        .iter()
        .filter(|r| support.get(&r.position).map_or(0, |s| s.len()) >= min_support)
        .copied()
        .collect()
}

///
/// Greedily merge ascending `(position, score)` points: a point joins the
/// current interval when its gap to the interval end is at most
/// `max_distance`. Repeated positions always merge.
///
pub fn merge_sorted_positions(points: &[(u32, f64)], max_distance: u32) -> Vec<MergedInterval> {
    let mut merged: Vec<MergedInterval> = Vec::new();
    let Some(&(first_pos, first_score)) = points.first() else {
        return merged;
    };

    let mut current = MergedInterval {
        start: first_pos,
        end: first_pos,
        score: first_score,
        first: 0,
        last: 0,
    };

    for (idx, &(pos, score)) in points.iter().enumerate().skip(1) {
        if pos - current.end <= max_distance {
            current.end = pos;
            current.score += score;
            current.last = idx;
        } else {
            merged.push(current);
            current = MergedInterval {
                start: pos,
                end: pos,
                score,
                first: idx,
                last: idx,
            };
        }
    }
    merged.push(current);

    merged
}

fn cluster_partition(partition: Partition<'_>, config: &ClusteringConfig) -> Vec<TsrRecord> {
    let passing = passing_threshold(&partition.records, config.threshold);
    let mut retained = supported_records(&passing, partition.min_support);
    retained.sort_by(|a, b| (a.position, &a.sample).cmp(&(b.position, &b.sample)));

    let points: Vec<(u32, f64)> = retained.iter().map(|r| (r.position, r.score())).collect();
    let merged = merge_sorted_positions(&points, config.max_distance);

    debug!(
        "{}:{} [{}] {} of {} TSS retained, {} TSRs",
        partition.chr,
        partition.strand,
        partition.label,
        retained.len(),
        partition.records.len(),
        merged.len()
    );

    merged
        .into_iter()
        .map(|interval| {
            let members = &retained[interval.first..=interval.last];
            let contributing: BTreeSet<&str> = members.iter().map(|r| r.sample.as_str()).collect();
            TsrRecord {
                sample: partition.label.clone(),
                samples: partition.samples.clone(),
                chr: partition.chr.to_string(),
                start: interval.start,
                end: interval.end,
                strand: partition.strand,
                score: interval.score,
                n_tss: members.len() as u32,
                n_samples: contributing.len() as u32,
                dominant: None,
                metrics: None,
                attributes: Default::default(),
            }
        })
        .collect()
}

fn run_partitions(partitions: Vec<Partition<'_>>, config: &ClusteringConfig) -> Result<TsrTable> {
    let n_partitions = partitions.len();
    let records: Vec<TsrRecord> = partitions
        .into_par_iter()
        .map(|p| cluster_partition(p, config))
        .flatten()
        .collect();

    let mut table = TsrTable::from_records(records)?;
    table.sort();

    info!(
        "Clustered {} partitions into {} TSRs",
        n_partitions,
        table.len()
    );
    Ok(table)
}

///
/// Cluster TSS records of one or more samples into TSRs.
///
/// All samples are pooled per chromosome and strand. A position takes part in
/// merging only if it scores at least `threshold` in at least `n_samples`
/// samples. TSRs of a single-sample table carry that sample's name; pooled
/// TSRs carry the configured consensus label.
///
/// # Arguments
/// - tss: TSS table, left untouched
/// - config: distance threshold, score threshold and sample support
///
pub fn cluster_tss(tss: &TssTable, config: &ClusteringConfig) -> Result<TsrTable> {
    config.validate()?;
    if tss.is_empty() {
        return Ok(TsrTable::default());
    }

    let samples: Vec<String> = tss.samples().into_iter().map(String::from).collect();
    if config.n_samples > samples.len() {
        return Err(TsrError::Configuration(format!(
            "minimum sample support {} exceeds the {} samples present",
            config.n_samples,
            samples.len()
        )));
    }
    let label = match samples.as_slice() {
        [only] => only.clone(),
        _ => config.consensus_label.clone(),
    };

    let mut groups: BTreeMap<(&str, Strand), Vec<&TssRecord>> = BTreeMap::new();
    for record in &tss.records {
        groups
            .entry((record.chr.as_str(), record.strand))
            .or_default()
            .push(record);
    }

    let partitions = groups
        .into_iter()
        .map(|((chr, strand), records)| Partition {
            label: label.clone(),
            samples: samples.clone(),
            chr,
            strand,
            min_support: config.n_samples,
            records,
        })
        .collect();

    run_partitions(partitions, config)
}

///
/// Cluster every sample independently; each TSR belongs to one sample.
///
/// `n_samples` does not apply here since every run holds a single sample.
///
pub fn cluster_per_sample(tss: &TssTable, config: &ClusteringConfig) -> Result<TsrTable> {
    config.validate()?;
    if config.n_samples > 1 {
        log::warn!(
            "Ignoring sample support of {} for per-sample clustering",
            config.n_samples
        );
    }

    let mut groups: BTreeMap<(&str, &str, Strand), Vec<&TssRecord>> = BTreeMap::new();
    for record in &tss.records {
        groups
            .entry((record.sample.as_str(), record.chr.as_str(), record.strand))
            .or_default()
            .push(record);
    }

    let partitions = groups
        .into_iter()
        .map(|((sample, chr, strand), records)| Partition {
            label: sample.to_string(),
            samples: vec![sample.to_string()],
            chr,
            strand,
            min_support: 1,
            records,
        })
        .collect();

    run_partitions(partitions, config)
}

///
/// Cluster according to `mode`.
///
pub fn cluster(tss: &TssTable, config: &ClusteringConfig, mode: ClusterMode) -> Result<TsrTable> {
    match mode {
        ClusterMode::Pooled => cluster_tss(tss, config),
        ClusterMode::PerSample => cluster_per_sample(tss, config),
    }
}

//! Assigns TSS records to their containing TSR and marks one dominant TSS
//! per TSR.

use std::cmp::Ordering;
use std::collections::HashMap;

use log::{info, warn};
use serde::Serialize;

use tsrkit_core::models::{DominantTss, Strand, TsrTable, TssRecord, TssTable};
use tsrkit_core::{Result, TsrError};

/// Outcome counts of one association run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AssociationSummary {
    pub associated: usize,
    pub unassociated: usize,
    /// TSRs that ended up without any member TSS.
    pub empty_tsrs: usize,
}

type IndexKey<'a> = (&'a str, &'a str, Strand);

/// Non-overlapping `(start, end, row)` intervals per (sample, chr, strand),
/// sorted by start.
struct TsrIndex<'a> {
    intervals: HashMap<IndexKey<'a>, Vec<(u32, u32, usize)>>,
}

impl<'a> TsrIndex<'a> {
    fn build(tsrs: &'a TsrTable) -> Result<Self> {
        let mut intervals: HashMap<IndexKey<'a>, Vec<(u32, u32, usize)>> = HashMap::new();
        for (row, tsr) in tsrs.records.iter().enumerate() {
            for sample in &tsr.samples {
                intervals
                    .entry((sample.as_str(), tsr.chr.as_str(), tsr.strand))
                    .or_default()
                    .push((tsr.start, tsr.end, row));
            }
        }

        for ((sample, chr, strand), list) in intervals.iter_mut() {
            list.sort_unstable();
            if let Some(pair) = list.windows(2).find(|w| w[1].0 <= w[0].1) {
                return Err(TsrError::DataIntegrity(format!(
                    "TSRs {}:{}-{}:{} and {}:{}-{}:{} overlap for sample {}, a TSS could map to both",
                    chr, pair[0].0, pair[0].1, strand, chr, pair[1].0, pair[1].1, strand, sample
                )));
            }
        }

        Ok(TsrIndex { intervals })
    }

    fn find(&self, tss: &TssRecord) -> Option<usize> {
        let list = self
            .intervals
            .get(&(tss.sample.as_str(), tss.chr.as_str(), tss.strand))?;
        let idx = list.partition_point(|&(start, _, _)| start <= tss.position);
        if idx == 0 {
            return None;
        }
        let (_, end, row) = list[idx - 1];
        (tss.position <= end).then_some(row)
    }
}

///
/// Ordering of dominance candidates: `Greater` means `a` beats `b`.
///
/// Higher score wins; ties go to the smaller position, then to the
/// lexically smaller sample.
///
pub fn dominance_order(a: &TssRecord, b: &TssRecord) -> Ordering {
    a.score()
        .total_cmp(&b.score())
        .then_with(|| b.position.cmp(&a.position))
        .then_with(|| b.sample.cmp(&a.sample))
}

///
/// Associate every TSS with the TSR containing it and mark dominant TSSs.
///
/// Membership is containment on (chromosome, strand, position in
/// `[start, end]`) within the TSR's sample group. Previous membership,
/// dominance and metrics are cleared first, so rerunning on the same inputs
/// yields the same assignments.
///
/// # Arguments
/// - tss: the full, unfiltered TSS table
/// - tsrs: TSRs produced from that table
///
pub fn associate(tss: &mut TssTable, tsrs: &mut TsrTable) -> Result<AssociationSummary> {
    let (membership, dominant) = {
        let index = TsrIndex::build(tsrs)?;
        let membership: Vec<Option<usize>> = tss.records.iter().map(|r| index.find(r)).collect();

        let mut dominant: Vec<Option<usize>> = vec![None; tsrs.len()];
        for (tss_row, tsr_row) in membership.iter().enumerate() {
            let Some(tsr_row) = *tsr_row else { continue };
            let candidate = &tss.records[tss_row];
            let better = match dominant[tsr_row] {
                None => true,
                Some(best) => dominance_order(candidate, &tss.records[best]) == Ordering::Greater,
            };
            if better {
                dominant[tsr_row] = Some(tss_row);
            }
        }
        (membership, dominant)
    };

    tss.clear_association();
    tsrs.clear_association();

    let mut summary = AssociationSummary::default();
    for (record, tsr_row) in tss.records.iter_mut().zip(&membership) {
        record.tsr = *tsr_row;
        match tsr_row {
            Some(_) => summary.associated += 1,
            None => summary.unassociated += 1,
        }
    }

    for (tsr, best) in tsrs.records.iter_mut().zip(&dominant) {
        match best {
            Some(row) => {
                let record = &mut tss.records[*row];
                record.is_dominant = true;
                tsr.dominant = Some(DominantTss {
                    index: *row,
                    position: record.position,
                });
            }
            None => summary.empty_tsrs += 1,
        }
    }

    if summary.empty_tsrs > 0 {
        warn!("{} TSRs have no member TSS", summary.empty_tsrs);
    }
    info!(
        "Associated {} TSS with {} TSRs ({} unassociated)",
        summary.associated,
        tsrs.len(),
        summary.unassociated
    );

    Ok(summary)
}

///
/// Rows of the TSS table that belong to each TSR, ordered by position then
/// sample. Requires a prior [`associate`] run against `tsrs`.
///
pub fn members_by_tsr(tss: &TssTable, tsrs: &TsrTable) -> Result<Vec<Vec<usize>>> {
    let mut members: Vec<Vec<usize>> = vec![Vec::new(); tsrs.len()];
    for (row, record) in tss.records.iter().enumerate() {
        if let Some(tsr_row) = record.tsr {
            let tsr = tsrs.records.get(tsr_row).ok_or_else(|| {
                TsrError::DataIntegrity(format!(
                    "TSS {} references TSR row {} but the table has {} rows",
                    record.key(),
                    tsr_row,
                    tsrs.len()
                ))
            })?;
            if !tsr.owns_sample(&record.sample) || !tsr.contains(record.position) {
                return Err(TsrError::DataIntegrity(format!(
                    "TSS {} is not a member of TSR {}",
                    record.key(),
                    tsr.id()
                )));
            }
            members[tsr_row].push(row);
        }
    }
    for rows in &mut members {
        rows.sort_by(|&a, &b| {
            let (a, b) = (&tss.records[a], &tss.records[b]);
            (a.position, &a.sample).cmp(&(b.position, &b.sample))
        });
    }
    Ok(members)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::cluster_tss;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use tsrkit_core::config::ClusteringConfig;
    use tsrkit_core::models::TsrRecord;

    fn make_tss(records: Vec<(&str, u32, u32)>) -> TssTable {
        let records = records
            .into_iter()
            .map(|(sample, pos, count)| TssRecord::new(sample, "chr1", pos, Strand::Plus, count))
            .collect();
        TssTable::from_records(records).unwrap()
    }

    fn make_tsr(samples: &[&str], start: u32, end: u32) -> TsrRecord {
        TsrRecord {
            sample: samples[0].to_string(),
            samples: samples.iter().map(|s| s.to_string()).collect(),
            chr: "chr1".to_string(),
            start,
            end,
            strand: Strand::Plus,
            score: 0.0,
            n_tss: 0,
            n_samples: 0,
            dominant: None,
            metrics: None,
            attributes: Default::default(),
        }
    }

    #[rstest]
    fn test_membership_by_containment() {
        let mut tss = make_tss(vec![("s1", 99, 1), ("s1", 100, 1), ("s1", 110, 1), ("s1", 111, 1)]);
        let mut tsrs = TsrTable::from_records(vec![make_tsr(&["s1"], 100, 110)]).unwrap();

        let summary = associate(&mut tss, &mut tsrs).unwrap();
        let membership: Vec<Option<usize>> = tss.records.iter().map(|r| r.tsr).collect();
        assert_eq!(membership, vec![None, Some(0), Some(0), None]);
        assert_eq!(summary.associated, 2);
        assert_eq!(summary.unassociated, 2);
    }

    #[rstest]
    fn test_unfiltered_tss_are_associated() {
        // 105 falls below the clustering threshold but still lies in the TSR
        let mut tss = make_tss(vec![("s1", 100, 5), ("s1", 105, 1), ("s1", 110, 5)]);
        let config = ClusteringConfig {
            max_distance: 10,
            threshold: 2.0,
            ..Default::default()
        };
        let mut tsrs = cluster_tss(&tss, &config).unwrap();
        assert_eq!(tsrs.records[0].n_tss, 2);

        associate(&mut tss, &mut tsrs).unwrap();
        assert!(tss.records.iter().all(|r| r.tsr == Some(0)));
    }

    #[rstest]
    fn test_dominance_tie_breaks_leftmost() {
        let mut tss = make_tss(vec![("s1", 55, 8), ("s1", 50, 8), ("s1", 52, 3)]);
        let mut tsrs = TsrTable::from_records(vec![make_tsr(&["s1"], 50, 55)]).unwrap();

        associate(&mut tss, &mut tsrs).unwrap();
        let dominant = tsrs.records[0].dominant.unwrap();
        assert_eq!(dominant.position, 50);
        assert_eq!(dominant.index, 1);
        assert!(tss.records[1].is_dominant);
        assert!(!tss.records[0].is_dominant);
    }

    #[rstest]
    fn test_dominance_tie_breaks_by_sample() {
        let mut tss = make_tss(vec![("s2", 50, 8), ("s1", 50, 8)]);
        let mut tsrs = TsrTable::from_records(vec![make_tsr(&["s1", "s2"], 50, 50)]).unwrap();

        associate(&mut tss, &mut tsrs).unwrap();
        assert_eq!(tsrs.records[0].dominant.unwrap().index, 1);
    }

    #[rstest]
    fn test_dominance_highest_score() {
        let mut tss = make_tss(vec![("s1", 50, 2), ("s1", 53, 9), ("s1", 58, 4)]);
        let mut tsrs = TsrTable::from_records(vec![make_tsr(&["s1"], 50, 58)]).unwrap();

        associate(&mut tss, &mut tsrs).unwrap();
        assert_eq!(tsrs.records[0].dominant.unwrap().position, 53);
    }

    #[rstest]
    fn test_sample_group_restricts_membership() {
        let mut tss = make_tss(vec![("s1", 100, 3), ("s2", 100, 3)]);
        let mut tsrs = TsrTable::from_records(vec![make_tsr(&["s1"], 90, 110)]).unwrap();

        associate(&mut tss, &mut tsrs).unwrap();
        assert_eq!(tss.records[0].tsr, Some(0));
        assert_eq!(tss.records[1].tsr, None);
    }

    #[rstest]
    fn test_overlapping_tsrs_rejected() {
        let mut tss = make_tss(vec![("s1", 100, 3)]);
        let mut tsrs =
            TsrTable::from_records(vec![make_tsr(&["s1"], 90, 110), make_tsr(&["s1"], 105, 120)])
                .unwrap();

        let err = associate(&mut tss, &mut tsrs).unwrap_err();
        assert!(matches!(err, TsrError::DataIntegrity(_)));
    }

    #[rstest]
    fn test_empty_tsr_has_no_dominant() {
        let mut tss = make_tss(vec![("s1", 10, 3)]);
        let mut tsrs = TsrTable::from_records(vec![make_tsr(&["s1"], 100, 110)]).unwrap();

        let summary = associate(&mut tss, &mut tsrs).unwrap();
        assert_eq!(summary.empty_tsrs, 1);
        assert_eq!(tsrs.records[0].dominant, None);
    }

    #[rstest]
    fn test_association_idempotent() {
        let mut tss = make_tss(vec![
            ("s1", 100, 3),
            ("s1", 104, 7),
            ("s2", 104, 7),
            ("s2", 160, 1),
            ("s1", 300, 2),
        ]);
        let config = ClusteringConfig {
            max_distance: 20,
            ..Default::default()
        };
        let mut tsrs = cluster_tss(&tss, &config).unwrap();

        let first = associate(&mut tss, &mut tsrs).unwrap();
        let tss_after_first = tss.records.clone();
        let tsr_after_first = tsrs.records.clone();

        let second = associate(&mut tss, &mut tsrs).unwrap();
        assert_eq!(first, second);
        assert_eq!(tss.records, tss_after_first);
        assert_eq!(tsrs.records, tsr_after_first);
    }

    #[rstest]
    fn test_members_by_tsr_sorted() {
        let mut tss = make_tss(vec![("s1", 58, 1), ("s2", 50, 1), ("s1", 50, 1)]);
        let mut tsrs = TsrTable::from_records(vec![make_tsr(&["s1", "s2"], 50, 58)]).unwrap();
        associate(&mut tss, &mut tsrs).unwrap();

        let members = members_by_tsr(&tss, &tsrs).unwrap();
        assert_eq!(members, vec![vec![2, 1, 0]]);
    }

    #[rstest]
    fn test_stale_membership_rejected() {
        let mut tss = make_tss(vec![("s1", 50, 1), ("s2", 52, 1)]);
        let mut tsrs = TsrTable::from_records(vec![make_tsr(&["s1", "s2"], 50, 58)]).unwrap();
        associate(&mut tss, &mut tsrs).unwrap();

        // the TSR no longer covers s2 after association
        tsrs.records[0].samples = vec!["s1".to_string()];
        let err = members_by_tsr(&tss, &tsrs).unwrap_err();
        assert!(matches!(err, TsrError::DataIntegrity(_)));

        tsrs.records[0].samples = vec!["s1".to_string(), "s2".to_string()];
        tsrs.records[0].end = 51;
        assert!(members_by_tsr(&tss, &tsrs).is_err());
    }
}

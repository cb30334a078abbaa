//! TSR-diff tables: differential results joined back onto TSR coordinates.

use std::collections::HashMap;

use log::info;
use serde::{Deserialize, Serialize};

use tsrkit_core::models::{columns, Cell, Strand, Table, TsrTable};
use tsrkit_core::{Result, TsrError};

use crate::matrix::CountMatrix;

/// One row returned by the differential collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffResult {
    /// Interval identifier as sent in the count matrix.
    pub id: String,
    pub log2_fold_change: f64,
    pub p_value: f64,
    pub padj: f64,
}

/// The differential collaborator.
pub trait DifferentialTester {
    fn test(&self, counts: &CountMatrix) -> Result<Vec<DiffResult>>;
}

/// Cutoffs deciding whether a TSR counts as changed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiffCutoffs {
    pub max_padj: f64,
    pub min_abs_log2_fold_change: f64,
}

impl Default for DiffCutoffs {
    fn default() -> Self {
        DiffCutoffs {
            max_padj: 0.05,
            min_abs_log2_fold_change: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffDirection {
    Up,
    Down,
    Unchanged,
}

impl DiffDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffDirection::Up => "up",
            DiffDirection::Down => "down",
            DiffDirection::Unchanged => "unchanged",
        }
    }

    fn classify(result: &DiffResult, cutoffs: &DiffCutoffs) -> DiffDirection {
        let significant = result.padj <= cutoffs.max_padj
            && result.log2_fold_change.abs() >= cutoffs.min_abs_log2_fold_change;
        match significant {
            true if result.log2_fold_change > 0.0 => DiffDirection::Up,
            true => DiffDirection::Down,
            false => DiffDirection::Unchanged,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffRecord {
    /// Row of the TSR in the table the matrix was built from.
    pub tsr: usize,
    pub chr: String,
    pub start: u32,
    pub end: u32,
    pub strand: Strand,
    pub log2_fold_change: f64,
    pub p_value: f64,
    pub padj: f64,
    pub direction: DiffDirection,
}

///
/// DiffTable struct, one row per TSR of the count matrix.
///
#[derive(Debug, Clone, Default)]
pub struct DiffTable {
    pub records: Vec<DiffRecord>,
}

impl DiffTable {
    ///
    /// Join differential results onto the TSRs the count matrix was built
    /// from. Every matrix row must come back exactly once; rows are kept in
    /// TSR table order.
    ///
    pub fn join(
        tsrs: &TsrTable,
        counts: &CountMatrix,
        results: Vec<DiffResult>,
        cutoffs: &DiffCutoffs,
    ) -> Result<Self> {
        if results.len() != counts.n_rows() {
            return Err(TsrError::CollaboratorContractViolation(format!(
                "sent {} intervals for differential testing, got {} results back",
                counts.n_rows(),
                results.len()
            )));
        }

        let tsr_of: HashMap<String, usize> = tsrs
            .records
            .iter()
            .enumerate()
            .map(|(row, r)| (r.id(), row))
            .collect();
        let sent: HashMap<&str, ()> = counts.row_ids.iter().map(|id| (id.as_str(), ())).collect();

        let mut by_tsr: Vec<Option<DiffResult>> = vec![None; tsrs.len()];
        for result in results {
            if !sent.contains_key(result.id.as_str()) {
                return Err(TsrError::CollaboratorContractViolation(format!(
                    "differential result for unknown interval {}",
                    result.id
                )));
            }
            let row = *tsr_of.get(&result.id).ok_or_else(|| {
                TsrError::CollaboratorContractViolation(format!(
                    "interval {} is not a TSR of this table",
                    result.id
                ))
            })?;
            if by_tsr[row].is_some() {
                return Err(TsrError::CollaboratorContractViolation(format!(
                    "duplicate differential result for {}",
                    result.id
                )));
            }
            by_tsr[row] = Some(result);
        }

        let records: Vec<DiffRecord> = by_tsr
            .into_iter()
            .enumerate()
            .filter_map(|(row, result)| result.map(|r| (row, r)))
            .map(|(row, result)| {
                let tsr = &tsrs.records[row];
                DiffRecord {
                    tsr: row,
                    chr: tsr.chr.clone(),
                    start: tsr.start,
                    end: tsr.end,
                    strand: tsr.strand,
                    direction: DiffDirection::classify(&result, cutoffs),
                    log2_fold_change: result.log2_fold_change,
                    p_value: result.p_value,
                    padj: result.padj,
                }
            })
            .collect();

        info!(
            "{} TSRs up, {} down",
            records.iter().filter(|r| r.direction == DiffDirection::Up).count(),
            records.iter().filter(|r| r.direction == DiffDirection::Down).count()
        );
        Ok(DiffTable { records })
    }
}

///
/// Run the differential collaborator on a TSR count matrix and join its
/// results.
///
pub fn differential_tsrs<D: DifferentialTester>(
    tsrs: &TsrTable,
    counts: &CountMatrix,
    tester: &D,
    cutoffs: &DiffCutoffs,
) -> Result<DiffTable> {
    let results = tester.test(counts)?;
    DiffTable::join(tsrs, counts, results, cutoffs)
}

fn float_cell<'a>(v: f64) -> Cell<'a> {
    if v.is_nan() { Cell::Null } else { Cell::Float(v) }
}

impl Table for DiffTable {
    fn num_rows(&self) -> usize {
        self.records.len()
    }

    fn column_names(&self) -> Vec<String> {
        [
            columns::TSR_ID,
            columns::CHROM,
            columns::START,
            columns::END,
            columns::STRAND,
            columns::LOG2_FOLD_CHANGE,
            columns::P_VALUE,
            columns::PADJ,
            columns::DIRECTION,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn cell(&self, row: usize, column: &str) -> Option<Cell<'_>> {
        let record = self.records.get(row)?;
        let cell = match column {
            columns::TSR_ID => Cell::Int(record.tsr as i64),
            columns::CHROM => Cell::Text(&record.chr),
            columns::START => Cell::Int(record.start as i64),
            columns::END => Cell::Int(record.end as i64),
            columns::STRAND => Cell::Text(record.strand.as_str()),
            columns::LOG2_FOLD_CHANGE => float_cell(record.log2_fold_change),
            columns::P_VALUE => float_cell(record.p_value),
            columns::PADJ => float_cell(record.padj),
            columns::DIRECTION => Cell::Text(record.direction.as_str()),
            _ => return None,
        };
        Some(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use tsrkit_core::models::TsrRecord;

    fn make_tsrs() -> TsrTable {
        let make = |start: u32, end: u32| TsrRecord {
            sample: "consensus".to_string(),
            samples: vec!["a".to_string(), "b".to_string()],
            chr: "chr1".to_string(),
            start,
            end,
            strand: Strand::Plus,
            score: 1.0,
            n_tss: 1,
            n_samples: 1,
            dominant: None,
            metrics: None,
            attributes: Default::default(),
        };
        TsrTable::from_records(vec![make(10, 20), make(50, 50), make(90, 99)]).unwrap()
    }

    fn make_counts(tsrs: &TsrTable) -> CountMatrix {
        let ids: Vec<String> = tsrs.records.iter().map(|r| r.id()).collect();
        let values = vec![1.0; ids.len() * 2];
        CountMatrix::new(ids, vec!["a".to_string(), "b".to_string()], values).unwrap()
    }

    fn result(id: &str, lfc: f64, padj: f64) -> DiffResult {
        DiffResult {
            id: id.to_string(),
            log2_fold_change: lfc,
            p_value: padj / 2.0,
            padj,
        }
    }

    struct FixedTester(Vec<DiffResult>);

    impl DifferentialTester for FixedTester {
        fn test(&self, _counts: &CountMatrix) -> Result<Vec<DiffResult>> {
            Ok(self.0.clone())
        }
    }

    #[rstest]
    fn test_join_classifies_direction() {
        let tsrs = make_tsrs();
        let counts = make_counts(&tsrs);
        let tester = FixedTester(vec![
            result("chr1:90-99:+", -2.0, 0.01),
            result("chr1:10-20:+", 3.0, 0.001),
            result("chr1:50-50:+", 3.0, 0.2),
        ]);

        let diff = differential_tsrs(&tsrs, &counts, &tester, &DiffCutoffs::default()).unwrap();
        let directions: Vec<DiffDirection> = diff.records.iter().map(|r| r.direction).collect();
        assert_eq!(
            directions,
            vec![DiffDirection::Up, DiffDirection::Unchanged, DiffDirection::Down]
        );
        assert_eq!(diff.cell(2, columns::START), Some(Cell::Int(90)));
        assert_eq!(diff.cell(0, columns::DIRECTION), Some(Cell::Text("up")));
    }

    #[rstest]
    fn test_missing_result_violates_contract() {
        let tsrs = make_tsrs();
        let counts = make_counts(&tsrs);
        let results = vec![result("chr1:10-20:+", 1.0, 0.5)];
        let err = DiffTable::join(&tsrs, &counts, results, &DiffCutoffs::default()).unwrap_err();
        assert!(matches!(err, TsrError::CollaboratorContractViolation(_)));
    }

    #[rstest]
    fn test_unknown_and_duplicate_ids_violate_contract() {
        let tsrs = make_tsrs();
        let counts = make_counts(&tsrs);

        let unknown = vec![
            result("chr1:10-20:+", 1.0, 0.5),
            result("chr1:50-50:+", 1.0, 0.5),
            result("chr9:1-2:+", 1.0, 0.5),
        ];
        assert!(DiffTable::join(&tsrs, &counts, unknown, &DiffCutoffs::default()).is_err());

        let duplicate = vec![
            result("chr1:10-20:+", 1.0, 0.5),
            result("chr1:10-20:+", 1.0, 0.5),
            result("chr1:50-50:+", 1.0, 0.5),
        ];
        assert!(DiffTable::join(&tsrs, &counts, duplicate, &DiffCutoffs::default()).is_err());
    }

    #[rstest]
    fn test_nan_statistics_are_missing() {
        let tsrs = make_tsrs();
        let counts = make_counts(&tsrs);
        let results = vec![
            result("chr1:10-20:+", 1.0, f64::NAN),
            result("chr1:50-50:+", 1.0, 0.5),
            result("chr1:90-99:+", 1.0, 0.5),
        ];
        let diff = DiffTable::join(&tsrs, &counts, results, &DiffCutoffs::default()).unwrap();
        assert_eq!(diff.cell(0, columns::PADJ), Some(Cell::Null));
        assert_eq!(diff.records[0].direction, DiffDirection::Unchanged);
    }
}

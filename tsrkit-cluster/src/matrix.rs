//! Count matrices handed to normalization and differential collaborators.

use std::collections::HashMap;
use std::io::Write;

use log::info;
use serde::Serialize;

use tsrkit_core::models::{Strand, TsrTable, TssTable};
use tsrkit_core::{Result, TsrError};

use crate::association::members_by_tsr;

///
/// A matrix of counts across intervals and samples.
///
/// Rows are intervals (TSS sites or TSRs), columns are samples. Values are
/// stored as a flat row-major `Vec<f64>`: row i sample j = values[i * n_samples + j].
///
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountMatrix {
    pub row_ids: Vec<String>,
    pub samples: Vec<String>,
    pub values: Vec<f64>,
}

impl CountMatrix {
    ///
    /// Build a matrix, checking that the values fill exactly rows x samples.
    ///
    pub fn new(row_ids: Vec<String>, samples: Vec<String>, values: Vec<f64>) -> Result<Self> {
        if values.len() != row_ids.len() * samples.len() {
            return Err(TsrError::DataIntegrity(format!(
                "matrix of {} rows and {} samples cannot hold {} values",
                row_ids.len(),
                samples.len(),
                values.len()
            )));
        }
        Ok(CountMatrix {
            row_ids,
            samples,
            values,
        })
    }

    ///
    /// Raw TSS counts: one row per site (`chr:position:strand`), sorted by
    /// chromosome, strand and position.
    ///
    pub fn from_tss(tss: &TssTable) -> Result<Self> {
        let samples: Vec<String> = tss.samples().into_iter().map(String::from).collect();
        let sample_col: HashMap<&str, usize> = samples
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), i))
            .collect();

        let mut sites: Vec<(&str, Strand, u32)> = tss
            .records
            .iter()
            .map(|r| (r.chr.as_str(), r.strand, r.position))
            .collect();
        sites.sort_unstable();
        sites.dedup();
        let site_row: HashMap<(&str, Strand, u32), usize> =
            sites.iter().enumerate().map(|(i, s)| (*s, i)).collect();

        let mut values = vec![0.0; sites.len() * samples.len()];
        for record in &tss.records {
            let row = site_row[&(record.chr.as_str(), record.strand, record.position)];
            let col = sample_col[record.sample.as_str()];
            values[row * samples.len() + col] = record.count as f64;
        }

        let row_ids = sites
            .iter()
            .map(|(chr, strand, pos)| format!("{}:{}:{}", chr, pos, strand))
            .collect();
        CountMatrix::new(row_ids, samples, values)
    }

    ///
    /// Raw counts per TSR and sample: the sum of member TSS counts.
    /// Requires a prior association run; TSR identifiers must be unique.
    ///
    pub fn from_tsrs(tss: &TssTable, tsrs: &TsrTable) -> Result<Self> {
        let samples: Vec<String> = tss.samples().into_iter().map(String::from).collect();
        let sample_col: HashMap<&str, usize> = samples
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), i))
            .collect();

        let row_ids: Vec<String> = tsrs.records.iter().map(|r| r.id()).collect();
        let mut seen: HashMap<&str, usize> = HashMap::with_capacity(row_ids.len());
        for (row, id) in row_ids.iter().enumerate() {
            if let Some(first) = seen.insert(id.as_str(), row) {
                return Err(TsrError::DataIntegrity(format!(
                    "TSR identifier {} appears in rows {} and {}; build count matrices from a pooled run",
                    id, first, row
                )));
            }
        }

        let members = members_by_tsr(tss, tsrs)?;
        let mut values = vec![0.0; row_ids.len() * samples.len()];
        for (row, rows) in members.iter().enumerate() {
            for &tss_row in rows {
                let record = &tss.records[tss_row];
                let col = sample_col[record.sample.as_str()];
                values[row * samples.len() + col] += record.count as f64;
            }
        }

        info!(
            "Built count matrix of {} TSRs x {} samples",
            row_ids.len(),
            samples.len()
        );
        CountMatrix::new(row_ids, samples, values)
    }

    pub fn n_rows(&self) -> usize {
        self.row_ids.len()
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn get(&self, row: usize, sample: usize) -> f64 {
        self.values[row * self.samples.len() + sample]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        let n = self.samples.len();
        &self.values[row * n..(row + 1) * n]
    }

    ///
    /// Check that a collaborator's matrix has the same row identifiers and
    /// samples, in the same order, as this one.
    ///
    pub fn ensure_same_shape(&self, other: &CountMatrix) -> Result<()> {
        if other.samples != self.samples {
            return Err(TsrError::CollaboratorContractViolation(format!(
                "expected samples {:?}, got {:?}",
                self.samples, other.samples
            )));
        }
        if other.n_rows() != self.n_rows() {
            return Err(TsrError::CollaboratorContractViolation(format!(
                "expected {} rows, got {}",
                self.n_rows(),
                other.n_rows()
            )));
        }
        if let Some((i, (a, b))) = self
            .row_ids
            .iter()
            .zip(&other.row_ids)
            .enumerate()
            .find(|(_, (a, b))| a != b)
        {
            return Err(TsrError::CollaboratorContractViolation(format!(
                "row {} is {} but {} was sent",
                i, b, a
            )));
        }
        if other.values.len() != other.n_rows() * other.n_samples() {
            return Err(TsrError::CollaboratorContractViolation(
                "matrix values do not fill rows x samples".to_string(),
            ));
        }
        Ok(())
    }

    /// Tab-separated dump: header `id` + samples, one line per row.
    pub fn write_tsv<W: Write>(&self, writer: &mut W) -> Result<()> {
        writeln!(writer, "id\t{}", self.samples.join("\t"))?;
        for (i, id) in self.row_ids.iter().enumerate() {
            let row: Vec<String> = self.row(i).iter().map(|v| v.to_string()).collect();
            writeln!(writer, "{}\t{}", id, row.join("\t"))?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// The normalization collaborator: same shape in, same shape out.
pub trait Normalizer {
    fn normalize(&self, counts: &CountMatrix) -> Result<CountMatrix>;
}

/// Counts per million, per sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpmNormalizer;

impl Normalizer for CpmNormalizer {
    fn normalize(&self, counts: &CountMatrix) -> Result<CountMatrix> {
        let n = counts.n_samples();
        let mut totals = vec![0.0; n];
        for (i, v) in counts.values.iter().enumerate() {
            totals[i % n] += v;
        }
        let values = counts
            .values
            .iter()
            .enumerate()
            .map(|(i, v)| match totals[i % n] {
                t if t > 0.0 => v * 1e6 / t,
                _ => 0.0,
            })
            .collect();
        CountMatrix::new(counts.row_ids.clone(), counts.samples.clone(), values)
    }
}

///
/// Normalize TSS counts through a collaborator and store the result as
/// each record's normalized score.
///
/// The returned matrix must match the sent one in samples and row
/// identifiers; anything else is a contract violation and leaves the table
/// untouched.
///
pub fn normalize_tss<N: Normalizer>(tss: &mut TssTable, normalizer: &N) -> Result<()> {
    let counts = CountMatrix::from_tss(tss)?;
    let normalized = normalizer.normalize(&counts)?;
    counts.ensure_same_shape(&normalized)?;
    if let Some(bad) = normalized.values.iter().find(|v| !v.is_finite()) {
        return Err(TsrError::CollaboratorContractViolation(format!(
            "normalizer returned a non-finite score ({})",
            bad
        )));
    }

    let row_of: HashMap<&str, usize> = normalized
        .row_ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();
    let col_of: HashMap<&str, usize> = normalized
        .samples
        .iter()
        .enumerate()
        .map(|(i, s)| (s.as_str(), i))
        .collect();

    let scores: Vec<f64> = tss
        .records
        .iter()
        .map(|r| normalized.get(row_of[r.site_id().as_str()], col_of[r.sample.as_str()]))
        .collect();
    for (record, score) in tss.records.iter_mut().zip(scores) {
        record.normalized_score = Some(score);
    }

    info!("Normalized {} TSS records", tss.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::association::associate;
    use crate::clustering::cluster_tss;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use tsrkit_core::config::ClusteringConfig;
    use tsrkit_core::models::TssRecord;

    fn make_tss() -> TssTable {
        TssTable::from_records(vec![
            TssRecord::new("s1", "chr1", 100, Strand::Plus, 3),
            TssRecord::new("s2", "chr1", 100, Strand::Plus, 1),
            TssRecord::new("s1", "chr1", 104, Strand::Plus, 1),
            TssRecord::new("s2", "chr1", 300, Strand::Plus, 4),
        ])
        .unwrap()
    }

    struct ReorderingNormalizer;

    impl Normalizer for ReorderingNormalizer {
        fn normalize(&self, counts: &CountMatrix) -> Result<CountMatrix> {
            let mut ids = counts.row_ids.clone();
            ids.reverse();
            CountMatrix::new(ids, counts.samples.clone(), counts.values.clone())
        }
    }

    struct DroppingNormalizer;

    impl Normalizer for DroppingNormalizer {
        fn normalize(&self, counts: &CountMatrix) -> Result<CountMatrix> {
            let n = counts.n_samples();
            CountMatrix::new(
                counts.row_ids[1..].to_vec(),
                counts.samples.clone(),
                counts.values[n..].to_vec(),
            )
        }
    }

    struct NanNormalizer;

    impl Normalizer for NanNormalizer {
        fn normalize(&self, counts: &CountMatrix) -> Result<CountMatrix> {
            let mut values = counts.values.clone();
            values[1] = f64::NAN;
            CountMatrix::new(counts.row_ids.clone(), counts.samples.clone(), values)
        }
    }

    #[rstest]
    fn test_tss_matrix() {
        let m = CountMatrix::from_tss(&make_tss()).unwrap();
        assert_eq!(m.samples, vec!["s1", "s2"]);
        assert_eq!(m.row_ids, vec!["chr1:100:+", "chr1:104:+", "chr1:300:+"]);
        assert_eq!(m.row(0), &[3.0, 1.0]);
        assert_eq!(m.row(2), &[0.0, 4.0]);
    }

    #[rstest]
    fn test_tsr_matrix_sums_members() {
        let mut tss = make_tss();
        let config = ClusteringConfig {
            max_distance: 10,
            ..Default::default()
        };
        let mut tsrs = cluster_tss(&tss, &config).unwrap();
        associate(&mut tss, &mut tsrs).unwrap();

        let m = CountMatrix::from_tsrs(&tss, &tsrs).unwrap();
        assert_eq!(m.row_ids, vec!["chr1:100-104:+", "chr1:300-300:+"]);
        assert_eq!(m.row(0), &[4.0, 1.0]);
        assert_eq!(m.row(1), &[0.0, 4.0]);
    }

    #[rstest]
    fn test_cpm_normalization_written_back() {
        let mut tss = make_tss();
        normalize_tss(&mut tss, &CpmNormalizer).unwrap();
        // s1 total = 4, s2 total = 5
        assert_eq!(tss.records[0].normalized_score, Some(750_000.0));
        assert_eq!(tss.records[3].normalized_score, Some(800_000.0));
    }

    #[rstest]
    fn test_reordered_rows_violate_contract() {
        let mut tss = make_tss();
        let err = normalize_tss(&mut tss, &ReorderingNormalizer).unwrap_err();
        assert!(matches!(err, TsrError::CollaboratorContractViolation(_)));
        assert!(tss.records.iter().all(|r| r.normalized_score.is_none()));
    }

    #[rstest]
    fn test_non_finite_scores_violate_contract() {
        let mut tss = make_tss();
        let err = normalize_tss(&mut tss, &NanNormalizer).unwrap_err();
        assert!(matches!(err, TsrError::CollaboratorContractViolation(_)));
        assert!(tss.records.iter().all(|r| r.normalized_score.is_none()));
    }

    #[rstest]
    fn test_dropped_rows_violate_contract() {
        let mut tss = make_tss();
        let err = normalize_tss(&mut tss, &DroppingNormalizer).unwrap_err();
        assert!(matches!(err, TsrError::CollaboratorContractViolation(_)));
    }

    #[rstest]
    fn test_write_tsv() {
        let m = CountMatrix::new(
            vec!["a".to_string()],
            vec!["s1".to_string(), "s2".to_string()],
            vec![1.0, 2.5],
        )
        .unwrap();
        let mut out = Vec::new();
        m.write_tsv(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "id\ts1\ts2\na\t1\t2.5\n");
    }
}

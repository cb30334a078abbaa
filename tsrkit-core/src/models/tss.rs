use std::collections::{BTreeMap, HashSet};
use std::fmt::{self, Display};
use std::io::BufRead;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::errors::{Result, TsrError};
use crate::models::strand::Strand;
use crate::models::table::{columns, AttributeNames, Cell, Table, Value};
use crate::utils::{file_stem, get_dynamic_reader};

///
/// A single transcription start site measurement.
///
/// Positions are 1-based. The `tsr` and `is_dominant` fields are owned by
/// association and are reset every time it runs.
///
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TssRecord {
    pub sample: String,
    pub chr: String,
    pub position: u32,
    pub strand: Strand,
    pub count: u32,
    pub normalized_score: Option<f64>,

    /// Row of the containing TSR in the table it was associated with.
    pub tsr: Option<usize>,
    pub is_dominant: bool,

    pub attributes: BTreeMap<String, Value>,
}

/// Identity of a TSS: unique per (sample, chromosome, position, strand).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TssKey<'a> {
    pub sample: &'a str,
    pub chr: &'a str,
    pub position: u32,
    pub strand: Strand,
}

impl Display for TssKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.sample, self.chr, self.position, self.strand
        )
    }
}

impl TssRecord {
    pub fn new(sample: &str, chr: &str, position: u32, strand: Strand, count: u32) -> Self {
        TssRecord {
            sample: sample.to_string(),
            chr: chr.to_string(),
            position,
            strand,
            count,
            normalized_score: None,
            tsr: None,
            is_dominant: false,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_normalized_score(mut self, score: f64) -> Self {
        self.normalized_score = Some(score);
        self
    }

    ///
    /// Score used for thresholds, aggregation and dominance: the normalized
    /// score when one is attached, the raw count otherwise.
    ///
    pub fn score(&self) -> f64 {
        self.normalized_score.unwrap_or(self.count as f64)
    }

    pub fn key(&self) -> TssKey<'_> {
        TssKey {
            sample: &self.sample,
            chr: &self.chr,
            position: self.position,
            strand: self.strand,
        }
    }

    /// Sample-independent site identifier, `chr:position:strand`.
    pub fn site_id(&self) -> String {
        format!("{}:{}:{}", self.chr, self.position, self.strand)
    }
}

///
/// TssTable struct, the table of TSS measurements for one or more samples.
///
#[derive(Debug, Clone, Default)]
pub struct TssTable {
    pub records: Vec<TssRecord>,
    pub attribute_names: AttributeNames,
    pub path: Option<PathBuf>,
}

impl TssTable {
    ///
    /// Build a table, rejecting duplicate (sample, chr, position, strand) keys
    /// and non-finite normalized scores.
    ///
    pub fn from_records(records: Vec<TssRecord>) -> Result<Self> {
        let mut seen: HashSet<TssKey> = HashSet::with_capacity(records.len());
        for record in &records {
            if record.normalized_score.is_some_and(|s| !s.is_finite()) {
                return Err(TsrError::DataIntegrity(format!(
                    "TSS record {} has a non-finite normalized score",
                    record.key()
                )));
            }
            if !seen.insert(record.key()) {
                return Err(TsrError::DataIntegrity(format!(
                    "duplicate TSS record {}",
                    record.key()
                )));
            }
        }

        let mut attribute_names = AttributeNames::default();
        for record in &records {
            for name in record.attributes.keys() {
                attribute_names.register(name);
            }
        }

        Ok(TssTable {
            records,
            attribute_names,
            path: None,
        })
    }

    ///
    /// Concatenate several tables (typically one per sample file).
    ///
    pub fn concat(tables: Vec<TssTable>) -> Result<Self> {
        let records = tables.into_iter().flat_map(|t| t.records).collect();
        TssTable::from_records(records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct sample identifiers in lexical order.
    pub fn samples(&self) -> Vec<&str> {
        let mut samples: Vec<&str> = self.records.iter().map(|r| r.sample.as_str()).collect();
        samples.sort_unstable();
        samples.dedup();
        samples
    }

    pub fn set_attribute(&mut self, row: usize, name: &str, value: Value) {
        self.attribute_names.register(name);
        if let Some(record) = self.records.get_mut(row) {
            record.attributes.insert(name.to_string(), value);
        }
    }

    /// Drop membership and dominance marks left by a previous association.
    pub fn clear_association(&mut self) {
        for record in &mut self.records {
            record.tsr = None;
            record.is_dominant = false;
        }
    }

    /// Sort by (chr, strand, position, sample).
    pub fn sort(&mut self) {
        self.records.sort_by(|a, b| {
            (&a.chr, a.strand, a.position, &a.sample).cmp(&(&b.chr, b.strand, b.position, &b.sample))
        });
    }

    fn parse_line(line: &str, line_number: usize, default_sample: &str) -> Result<TssRecord> {
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 5 {
            return Err(TsrError::Parse {
                line: line_number,
                message: format!("expected at least 5 columns, found {}", parts.len()),
            });
        }

        let sample = match parts[0] {
            "." | "" => default_sample,
            s => s,
        };
        let position: u32 = parts[2].parse().map_err(|_| TsrError::Parse {
            line: line_number,
            message: format!("invalid position `{}`", parts[2]),
        })?;
        if position == 0 {
            return Err(TsrError::Parse {
                line: line_number,
                message: "positions are 1-based, found 0".to_string(),
            });
        }
        let strand: Strand = parts[3].parse().map_err(|e: TsrError| TsrError::Parse {
            line: line_number,
            message: e.to_string(),
        })?;
        let count: u32 = parts[4].parse().map_err(|_| TsrError::Parse {
            line: line_number,
            message: format!("invalid count `{}`", parts[4]),
        })?;

        let mut record = TssRecord::new(sample, parts[1], position, strand, count);
        if let Some(raw) = parts.get(5).filter(|s| !s.is_empty() && **s != "NA") {
            let score: f64 = raw.parse().map_err(|_| TsrError::Parse {
                line: line_number,
                message: format!("invalid normalized score `{}`", raw),
            })?;
            if !score.is_finite() {
                return Err(TsrError::Parse {
                    line: line_number,
                    message: format!("normalized score must be finite, found `{}`", raw),
                });
            }
            record.normalized_score = Some(score);
        }
        Ok(record)
    }
}

impl TryFrom<&Path> for TssTable {
    type Error = TsrError;

    ///
    /// Read a TSS table from a tab-separated file (optionally gzipped).
    ///
    /// Columns: `sample chrom position strand count [normalized_score]`.
    /// Lines starting with `#` are skipped. A sample of `.` takes the file stem.
    ///
    fn try_from(value: &Path) -> Result<Self> {
        let reader = get_dynamic_reader(value)?;
        let default_sample = file_stem(value);

        let mut records: Vec<TssRecord> = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            records.push(TssTable::parse_line(&line, idx + 1, &default_sample)?);
        }

        if records.is_empty() {
            log::warn!("No TSS records found in {}", value.display());
        }

        let mut table = TssTable::from_records(records)?;
        table.path = Some(value.to_owned());
        Ok(table)
    }
}

impl TryFrom<&str> for TssTable {
    type Error = TsrError;

    fn try_from(value: &str) -> Result<Self> {
        TssTable::try_from(Path::new(value))
    }
}

impl Table for TssTable {
    fn num_rows(&self) -> usize {
        self.records.len()
    }

    fn column_names(&self) -> Vec<String> {
        [
            columns::SAMPLE,
            columns::CHROM,
            columns::POSITION,
            columns::STRAND,
            columns::COUNT,
            columns::NORMALIZED_SCORE,
            columns::SCORE,
            columns::TSR_ID,
            columns::IS_DOMINANT,
        ]
        .iter()
        .map(|s| s.to_string())
        .chain(self.attribute_names.iter().cloned())
        .collect()
    }

    fn cell(&self, row: usize, column: &str) -> Option<Cell<'_>> {
        let record = self.records.get(row)?;
        let cell = match column {
            columns::SAMPLE => Cell::Text(&record.sample),
            columns::CHROM => Cell::Text(&record.chr),
            columns::POSITION => Cell::Int(record.position as i64),
            columns::STRAND => Cell::Text(record.strand.as_str()),
            columns::COUNT => Cell::Int(record.count as i64),
            columns::NORMALIZED_SCORE => record.normalized_score.map_or(Cell::Null, Cell::Float),
            columns::SCORE => Cell::Float(record.score()),
            columns::TSR_ID => record.tsr.map_or(Cell::Null, |t| Cell::Int(t as i64)),
            columns::IS_DOMINANT => Cell::Bool(record.is_dominant),
            other if self.attribute_names.contains(other) => record
                .attributes
                .get(other)
                .map_or(Cell::Null, |v| v.as_cell()),
            _ => return None,
        };
        Some(cell)
    }
}

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::Serialize;

use crate::errors::{Result, TsrError};
use crate::models::strand::Strand;
use crate::models::table::{columns, AttributeNames, Cell, Table, Value};

/// Categorical shape of a TSR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeClass {
    Peaked,
    Broad,
}

impl ShapeClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeClass::Peaked => "peaked",
            ShapeClass::Broad => "broad",
        }
    }
}

impl Display for ShapeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shape and spread statistics of a TSR's member score distribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShapeMetrics {
    /// `end - start + 1`
    pub width: u32,
    /// Inclusive span between the 25th and 75th percentile positions of
    /// cumulative score mass.
    pub iqr_width: f64,
    pub shape_class: ShapeClass,
    /// `2 + sum(p * log2(p))` over per-position mass fractions.
    pub shape_index: f64,
    /// Share of the TSR's score mass at its dominant position.
    pub dominant_fraction: f64,
}

/// Metrics are undefined for TSRs whose members carry no score.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TsrMetrics {
    Defined(ShapeMetrics),
    Undefined,
}

impl TsrMetrics {
    pub fn defined(&self) -> Option<&ShapeMetrics> {
        match self {
            TsrMetrics::Defined(m) => Some(m),
            TsrMetrics::Undefined => None,
        }
    }
}

/// Back-reference from a TSR to its dominant TSS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DominantTss {
    /// Row in the TSS table the TSR was associated with.
    pub index: usize,
    pub position: u32,
}

///
/// A transcription start region: a closed interval `[start, end]` (1-based)
/// on one chromosome and strand.
///
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TsrRecord {
    /// Sample identifier, or the consensus label of a pooled run.
    pub sample: String,
    /// Samples whose TSS records this TSR may own.
    pub samples: Vec<String>,
    pub chr: String,
    pub start: u32,
    pub end: u32,
    pub strand: Strand,
    /// Sum of constituent post-filter TSS scores.
    pub score: f64,
    /// Number of constituent post-filter TSS records.
    pub n_tss: u32,
    /// Number of samples contributing at least one constituent TSS.
    pub n_samples: u32,

    pub dominant: Option<DominantTss>,
    pub metrics: Option<TsrMetrics>,

    pub attributes: BTreeMap<String, Value>,
}

impl TsrRecord {
    pub fn width(&self) -> u32 {
        self.end - self.start + 1
    }

    pub fn contains(&self, position: u32) -> bool {
        self.start <= position && position <= self.end
    }

    /// Interval identifier, `chr:start-end:strand`.
    pub fn id(&self) -> String {
        format!("{}:{}-{}:{}", self.chr, self.start, self.end, self.strand)
    }

    pub fn owns_sample(&self, sample: &str) -> bool {
        self.samples.iter().any(|s| s == sample)
    }

    fn shape_metrics(&self) -> Option<&ShapeMetrics> {
        self.metrics.as_ref().and_then(|m| m.defined())
    }
}

///
/// TsrTable struct, the output of clustering.
///
#[derive(Debug, Clone, Default)]
pub struct TsrTable {
    pub records: Vec<TsrRecord>,
    pub attribute_names: AttributeNames,
}

impl TsrTable {
    ///
    /// Build a table, rejecting inverted intervals.
    ///
    pub fn from_records(records: Vec<TsrRecord>) -> Result<Self> {
        if let Some(bad) = records.iter().find(|r| r.start > r.end) {
            return Err(TsrError::DataIntegrity(format!(
                "TSR {}:{}-{} has start after end",
                bad.chr, bad.start, bad.end
            )));
        }
        let mut attribute_names = AttributeNames::default();
        for record in &records {
            for name in record.attributes.keys() {
                attribute_names.register(name);
            }
        }
        Ok(TsrTable {
            records,
            attribute_names,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sort by (chr, strand, start, sample): the global output order of clustering.
    pub fn sort(&mut self) {
        self.records.sort_by(|a, b| {
            (&a.chr, a.strand, a.start, &a.sample).cmp(&(&b.chr, b.strand, b.start, &b.sample))
        });
    }

    pub fn set_attribute(&mut self, row: usize, name: &str, value: Value) {
        self.attribute_names.register(name);
        if let Some(record) = self.records.get_mut(row) {
            record.attributes.insert(name.to_string(), value);
        }
    }

    /// Drop dominance and metrics; both depend on membership.
    pub fn clear_association(&mut self) {
        for record in &mut self.records {
            record.dominant = None;
            record.metrics = None;
        }
    }
}

impl Table for TsrTable {
    fn num_rows(&self) -> usize {
        self.records.len()
    }

    fn column_names(&self) -> Vec<String> {
        [
            columns::TSR_ID,
            columns::SAMPLE,
            columns::CHROM,
            columns::START,
            columns::END,
            columns::STRAND,
            columns::SCORE,
            columns::N_TSS,
            columns::N_SAMPLES,
            columns::WIDTH,
            columns::DOMINANT_POSITION,
            columns::IQR_WIDTH,
            columns::SHAPE_CLASS,
            columns::SHAPE_INDEX,
            columns::DOMINANT_FRACTION,
        ]
        .iter()
        .map(|s| s.to_string())
        .chain(self.attribute_names.iter().cloned())
        .collect()
    }

    fn cell(&self, row: usize, column: &str) -> Option<Cell<'_>> {
        let record = self.records.get(row)?;
        let metrics = record.shape_metrics();
        let cell = match column {
            columns::TSR_ID => Cell::Int(row as i64),
            columns::SAMPLE => Cell::Text(&record.sample),
            columns::CHROM => Cell::Text(&record.chr),
            columns::START => Cell::Int(record.start as i64),
            columns::END => Cell::Int(record.end as i64),
            columns::STRAND => Cell::Text(record.strand.as_str()),
            columns::SCORE => Cell::Float(record.score),
            columns::N_TSS => Cell::Int(record.n_tss as i64),
            columns::N_SAMPLES => Cell::Int(record.n_samples as i64),
            columns::WIDTH => Cell::Int(record.width() as i64),
            columns::DOMINANT_POSITION => record
                .dominant
                .map_or(Cell::Null, |d| Cell::Int(d.position as i64)),
            columns::IQR_WIDTH => metrics.map_or(Cell::Null, |m| Cell::Float(m.iqr_width)),
            columns::SHAPE_CLASS => {
                metrics.map_or(Cell::Null, |m| Cell::Text(m.shape_class.as_str()))
            }
            columns::SHAPE_INDEX => metrics.map_or(Cell::Null, |m| Cell::Float(m.shape_index)),
            columns::DOMINANT_FRACTION => {
                metrics.map_or(Cell::Null, |m| Cell::Float(m.dominant_fraction))
            }
            other if self.attribute_names.contains(other) => record
                .attributes
                .get(other)
                .map_or(Cell::Null, |v| v.as_cell()),
            _ => return None,
        };
        Some(cell)
    }
}

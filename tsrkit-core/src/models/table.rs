//! Column-name access shared by every table in the workspace.
//!
//! TSS, TSR and TSR-diff tables all implement [`Table`], so downstream code
//! (conditioning, export, collaborators) can address any of them purely by
//! column name. Unknown names are reported when a column is requested, never
//! when a query is described.

use std::cmp::Ordering;
use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::errors::{Result, TsrError};

/// Stable column names exposed by the built-in tables.
pub mod columns {
    pub const SAMPLE: &str = "sample";
    pub const CHROM: &str = "chrom";
    pub const POSITION: &str = "position";
    pub const STRAND: &str = "strand";
    pub const COUNT: &str = "count";
    pub const NORMALIZED_SCORE: &str = "normalized_score";
    pub const SCORE: &str = "score";
    pub const TSR_ID: &str = "tsr_id";
    pub const IS_DOMINANT: &str = "is_dominant";

    pub const START: &str = "start";
    pub const END: &str = "end";
    pub const N_TSS: &str = "n_tss";
    pub const N_SAMPLES: &str = "n_samples";
    pub const WIDTH: &str = "width";
    pub const DOMINANT_POSITION: &str = "dominant_position";
    pub const IQR_WIDTH: &str = "iqr_width";
    pub const SHAPE_CLASS: &str = "shape_class";
    pub const SHAPE_INDEX: &str = "shape_index";
    pub const DOMINANT_FRACTION: &str = "dominant_fraction";

    pub const LOG2_FOLD_CHANGE: &str = "log2_fold_change";
    pub const P_VALUE: &str = "p_value";
    pub const PADJ: &str = "padj";
    pub const DIRECTION: &str = "direction";
}

/// A borrowed view of one table cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell<'a> {
    Text(&'a str),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl<'a> Cell<'a> {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Cell::Int(_) | Cell::Float(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(*v as f64),
            Cell::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Cell::Text(s) => Value::Text(s.to_string()),
            Cell::Int(v) => Value::Int(*v),
            Cell::Float(v) => Value::Float(*v),
            Cell::Bool(v) => Value::Bool(*v),
            Cell::Null => Value::Null,
        }
    }

    /// Total order over non-null cells.
    ///
    /// Numbers compare numerically (ints and floats together, NaN last via
    /// `total_cmp`), text lexically, booleans `false < true`. Mixed kinds
    /// fall back to a fixed kind order. Nulls compare equal to each other
    /// and greater than everything else; callers that sort descending must
    /// handle them separately to keep them last.
    pub fn total_cmp(&self, other: &Cell<'_>) -> Ordering {
        match (self, other) {
            (Cell::Int(a), Cell::Int(b)) => a.cmp(b),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                let (a, b) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
                a.total_cmp(&b)
            }
            (Cell::Text(a), Cell::Text(b)) => a.cmp(b),
            (Cell::Bool(a), Cell::Bool(b)) => a.cmp(b),
            (a, b) => a.kind_rank().cmp(&b.kind_rank()),
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Cell::Bool(_) => 0,
            Cell::Int(_) | Cell::Float(_) => 1,
            Cell::Text(_) => 2,
            Cell::Null => 3,
        }
    }
}

/// An owned cell value, used for attribute columns and partition keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

impl Value {
    pub fn as_cell(&self) -> Cell<'_> {
        match self {
            Value::Text(s) => Cell::Text(s),
            Value::Int(v) => Cell::Int(*v),
            Value::Float(v) => Cell::Float(*v),
            Value::Bool(v) => Cell::Bool(*v),
            Value::Null => Cell::Null,
        }
    }

    /// One representation per number: integral floats become `Int`, NaN
    /// becomes `Null`. Used where values key a map, e.g. grouping.
    pub fn normalized(self) -> Value {
        match self {
            Value::Float(v) if v.is_nan() => Value::Null,
            Value::Float(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Value::Int(v as i64),
            other => other,
        }
    }
}

// floats compare by bit pattern so values can key a map
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Null, Value::Null) => true,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Text(s) => s.hash(state),
            Value::Int(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Bool(v) => v.hash(state),
            Value::Null => {}
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{}", s),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Null => write!(f, "NA"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

/// A materialized column: one cell per row, in row order.
#[derive(Debug, Clone)]
pub struct Column<'a> {
    pub name: String,
    pub cells: Vec<Cell<'a>>,
}

impl<'a> Column<'a> {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// True when every non-null cell holds a number.
    pub fn is_numeric(&self) -> bool {
        self.cells.iter().all(|c| c.is_null() || c.is_numeric())
    }
}

/// Lookup-by-column-name capability.
pub trait Table {
    fn num_rows(&self) -> usize;

    /// Built-in columns first, then attribute columns in insertion order.
    fn column_names(&self) -> Vec<String>;

    /// Cell at `row` in `column`; `None` when the table has no such column.
    fn cell(&self, row: usize, column: &str) -> Option<Cell<'_>>;

    fn has_column(&self, name: &str) -> bool {
        self.column_names().iter().any(|c| c == name)
    }

    fn column(&self, name: &str) -> Result<Column<'_>> {
        if !self.has_column(name) {
            return Err(TsrError::UnknownColumn(name.to_string()));
        }
        let cells = (0..self.num_rows())
            .map(|row| self.cell(row, name).unwrap_or(Cell::Null))
            .collect();
        Ok(Column {
            name: name.to_string(),
            cells,
        })
    }
}

/// Attribute columns in insertion order, shared by the table implementations.
#[derive(Debug, Clone, Default)]
pub struct AttributeNames(Vec<String>);

impl AttributeNames {
    pub fn register(&mut self, name: &str) {
        if !self.0.iter().any(|n| n == name) {
            self.0.push(name.to_string());
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|n| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }
}

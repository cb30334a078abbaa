use std::cmp::Ordering;
use std::collections::HashMap;

use log::debug;
use serde::Serialize;

use tsrkit_core::models::{Cell, Table, Value};
use tsrkit_core::Result;

use crate::descriptor::{Conditioning, Direction, QuantileSpec};

/// Identifies a partition: the group value and the 1-based quantile bucket,
/// each present only when that stage was requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionKey {
    pub group: Option<Value>,
    pub quantile: Option<usize>,
}

/// A slice of the source table, as row indices in iteration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Partition {
    pub key: PartitionKey,
    pub rows: Vec<usize>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// NaN counts as missing
fn sort_cell<'a, T: Table + ?Sized>(table: &'a T, row: usize, column: &str) -> Cell<'a> {
    match table.cell(row, column) {
        Some(Cell::Float(v)) if v.is_nan() => Cell::Null,
        Some(cell) => cell,
        None => Cell::Null,
    }
}

/// Missing values go last in either direction.
fn compare_cells(a: &Cell<'_>, b: &Cell<'_>, direction: Direction) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => match direction {
            Direction::Ascending => a.total_cmp(b),
            Direction::Descending => b.total_cmp(a),
        },
    }
}

fn sort_rows<T: Table + ?Sized>(table: &T, rows: &mut [usize], column: &str, direction: Direction) {
    rows.sort_by(|&a, &b| {
        compare_cells(&sort_cell(table, a, column), &sort_cell(table, b, column), direction)
    });
}

///
/// Partition rows by the value of `column`, in order of first appearance.
/// Numeric keys compare by value, so `3` and `3.0` share a group.
///
fn group_rows<T: Table + ?Sized>(table: &T, column: &str) -> Vec<(Value, Vec<usize>)> {
    let mut index: HashMap<Value, usize> = HashMap::new();
    let mut groups: Vec<(Value, Vec<usize>)> = Vec::new();
    for row in 0..table.num_rows() {
        let key = table.cell(row, column).unwrap_or(Cell::Null).to_value().normalized();
        match index.get(&key) {
            Some(&i) => groups[i].1.push(row),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![row]));
            }
        }
    }
    groups
}

///
/// Split rows into `spec.n_bins` buckets after ranking them by the
/// quantiling column. Bucket sizes differ by at most one, earlier buckets
/// taking the remainder. Each bucket keeps its rows in the order given.
///
fn quantile_rows<T: Table + ?Sized>(table: &T, rows: &[usize], spec: &QuantileSpec) -> Vec<Vec<usize>> {
    let mut ranked = rows.to_vec();
    sort_rows(table, &mut ranked, &spec.column, spec.direction);

    let position: HashMap<usize, usize> = rows.iter().enumerate().map(|(i, &r)| (r, i)).collect();
    let base = ranked.len() / spec.n_bins;
    let remainder = ranked.len() % spec.n_bins;

    let mut buckets = Vec::with_capacity(spec.n_bins);
    let mut offset = 0;
    for i in 0..spec.n_bins {
        let size = base + usize::from(i < remainder);
        let mut bucket = ranked[offset..offset + size].to_vec();
        bucket.sort_by_key(|r| position[r]);
        buckets.push(bucket);
        offset += size;
    }
    buckets
}

///
/// Apply a conditioning descriptor to a table.
///
/// Returns partitions in iteration order, each holding row indices into
/// `table`. The table itself is never modified. Grouping, quantiling and
/// ordering compose in that order; with nothing requested the result is a
/// single partition of every row in source order.
///
/// # Arguments
/// - table: any table addressable by column name
/// - conditioning: the descriptor; checked against the table before any work
///
pub fn condition<T: Table + ?Sized>(table: &T, conditioning: &Conditioning) -> Result<Vec<Partition>> {
    conditioning.validate(table)?;

    let all_rows: Vec<usize> = (0..table.num_rows()).collect();

    let groups: Vec<(Option<Value>, Vec<usize>)> = match conditioning.grouping() {
        Some(column) => {
            let mut groups = group_rows(table, column);
            if let Some(order) = conditioning.ordering().filter(|o| o.column == column) {
                groups.sort_by(|a, b| compare_cells(&a.0.as_cell(), &b.0.as_cell(), order.direction));
            }
            groups.into_iter().map(|(k, rows)| (Some(k), rows)).collect()
        }
        None => vec![(None, all_rows)],
    };

    let mut partitions: Vec<Partition> = Vec::new();
    for (group, rows) in groups {
        match conditioning.quantiling() {
            Some(spec) => {
                for (i, bucket) in quantile_rows(table, &rows, spec).into_iter().enumerate() {
                    partitions.push(Partition {
                        key: PartitionKey {
                            group: group.clone(),
                            quantile: Some(i + 1),
                        },
                        rows: bucket,
                    });
                }
            }
            None => partitions.push(Partition {
                key: PartitionKey {
                    group,
                    quantile: None,
                },
                rows,
            }),
        }
    }

    if let Some(order) = conditioning.ordering() {
        for partition in partitions.iter_mut() {
            sort_rows(table, &mut partition.rows, &order.column, order.direction);
        }
    }

    debug!(
        "Conditioned {} rows into {} partitions",
        table.num_rows(),
        partitions.len()
    );
    Ok(partitions)
}

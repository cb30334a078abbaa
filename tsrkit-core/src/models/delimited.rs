use std::io::BufRead;
use std::path::Path;

use crate::errors::{Result, TsrError};
use crate::models::table::{Cell, Table, Value};
use crate::utils::get_dynamic_reader;

///
/// A table read back from tab-separated text with a header row, e.g. a TSR
/// table exported by [`crate::utils::write_table`].
///
/// Cells are typed on read: integers, then floats, then `true`/`false`;
/// `NA` and empty fields are missing values; everything else is text.
///
#[derive(Debug, Clone)]
pub struct DelimitedTable {
    pub names: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

fn parse_value(raw: &str) -> Value {
    if raw.is_empty() || raw == "NA" {
        return Value::Null;
    }
    if let Ok(v) = raw.parse::<i64>() {
        return Value::Int(v);
    }
    if let Ok(v) = raw.parse::<f64>() {
        return Value::Float(v);
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::Text(raw.to_string()),
    }
}

impl<R: BufRead> TryFrom<std::io::Lines<R>> for DelimitedTable {
    type Error = TsrError;

    fn try_from(mut lines: std::io::Lines<R>) -> Result<Self> {
        let header = lines.next().ok_or_else(|| TsrError::Parse {
            line: 1,
            message: "missing header row".to_string(),
        })??;
        let names: Vec<String> = header
            .trim_start_matches('#')
            .split('\t')
            .map(|s| s.to_string())
            .collect();

        let mut rows = Vec::new();
        for (idx, line) in lines.enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != names.len() {
                return Err(TsrError::Parse {
                    line: idx + 2,
                    message: format!("expected {} fields, found {}", names.len(), fields.len()),
                });
            }
            rows.push(fields.into_iter().map(parse_value).collect());
        }

        Ok(DelimitedTable { names, rows })
    }
}

impl TryFrom<&Path> for DelimitedTable {
    type Error = TsrError;

    fn try_from(value: &Path) -> Result<Self> {
        DelimitedTable::try_from(get_dynamic_reader(value)?.lines())
    }
}

impl Table for DelimitedTable {
    fn num_rows(&self) -> usize {
        self.rows.len()
    }

    fn column_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn cell(&self, row: usize, column: &str) -> Option<Cell<'_>> {
        let idx = self.names.iter().position(|n| n == column)?;
        self.rows.get(row).map(|r| r[idx].as_cell())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::io::Cursor;

    #[rstest]
    fn test_typed_cells() {
        let text = "chrom\tstart\tscore\tshape_class\n\
                    chr1\t100\t2.5\tpeaked\n\
                    chr1\t200\t3\tNA\n";
        let table = DelimitedTable::try_from(Cursor::new(text).lines()).unwrap();

        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.cell(0, "start"), Some(Cell::Int(100)));
        assert_eq!(table.cell(0, "score"), Some(Cell::Float(2.5)));
        assert_eq!(table.cell(1, "score"), Some(Cell::Int(3)));
        assert_eq!(table.cell(1, "shape_class"), Some(Cell::Null));
        assert!(table.column("width").is_err());
    }

    #[rstest]
    fn test_ragged_row_rejected() {
        let text = "a\tb\n1\n";
        let err = DelimitedTable::try_from(Cursor::new(text).lines()).unwrap_err();
        assert!(matches!(err, TsrError::Parse { line: 2, .. }));
    }
}

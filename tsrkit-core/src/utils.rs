use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::errors::Result;
use crate::models::table::{Cell, Table};

///
/// Get a reader for either a gzip'd or non-gzip'd file.
///
/// # Arguments
///
/// - path: path to the file to read
///
pub fn get_dynamic_reader(path: &Path) -> Result<BufReader<Box<dyn Read>>> {
    let is_gzipped = path.extension() == Some(OsStr::new("gz"));
    let file = File::open(path)?;
    let file: Box<dyn Read> = match is_gzipped {
        true => Box::new(MultiGzDecoder::new(file)),
        false => Box::new(file),
    };

    Ok(BufReader::new(file))
}

///
/// Get a writer for a file, gzip-compressing when the path ends in `.gz`.
///
pub fn get_dynamic_writer(path: &Path) -> Result<Box<dyn Write>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = File::create(path)?;
    let writer: Box<dyn Write> = match path.extension() == Some(OsStr::new("gz")) {
        true => Box::new(GzEncoder::new(BufWriter::new(file), Compression::default())),
        false => Box::new(BufWriter::new(file)),
    };
    Ok(writer)
}

///
/// File name with every extension removed, e.g. `ctrl_1.tss.gz` -> `ctrl_1`.
///
pub fn file_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    // leading dot belongs to the name (hidden and temp files)
    match name[1.min(name.len())..].find('.') {
        Some(idx) => name[..idx + 1].to_string(),
        None => name.to_string(),
    }
}

fn format_cell(cell: &Cell<'_>) -> String {
    match cell {
        Cell::Text(s) => s.to_string(),
        Cell::Int(v) => v.to_string(),
        Cell::Float(v) => v.to_string(),
        Cell::Bool(v) => v.to_string(),
        Cell::Null => "NA".to_string(),
    }
}

///
/// Write any table as tab-separated text with a header row of its column
/// names. Missing values are written as `NA`.
///
pub fn write_table<T: Table, W: Write>(table: &T, writer: &mut W) -> Result<()> {
    let names = table.column_names();
    writeln!(writer, "{}", names.join("\t"))?;

    for row in 0..table.num_rows() {
        let line: Vec<String> = names
            .iter()
            .map(|name| format_cell(&table.cell(row, name).unwrap_or(Cell::Null)))
            .collect();
        writeln!(writer, "{}", line.join("\t"))?;
    }
    writer.flush()?;
    Ok(())
}

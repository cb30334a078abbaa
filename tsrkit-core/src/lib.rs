//! Core data model for tsrkit.
//!
//! Holds the interval tables shared by every other crate in the workspace:
//! TSS measurements ([`models::TssTable`]), clustered transcription start
//! regions ([`models::TsrTable`]) and tables read back from exported text
//! ([`models::DelimitedTable`]). All of them implement [`models::Table`], the
//! lookup-by-column-name capability that the conditioning pipeline and the
//! exporters rely on.
//!
//! # Example
//!
//! ```
//! use tsrkit_core::models::{columns, Cell, Strand, Table, TssRecord, TssTable};
//!
//! let table = TssTable::from_records(vec![
//!     TssRecord::new("ctrl_1", "chr1", 100, Strand::Plus, 12),
//!     TssRecord::new("ctrl_1", "chr1", 104, Strand::Plus, 3),
//! ])
//! .unwrap();
//!
//! assert_eq!(table.cell(1, columns::POSITION), Some(Cell::Int(104)));
//! ```

pub mod config;
pub mod errors;
pub mod models;
pub mod utils;

pub use errors::{Result, TsrError};

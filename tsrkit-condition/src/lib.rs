//! Declarative conditioning of TSS and TSR tables.
//!
//! A [`Conditioning`] descriptor names a grouping column, a quantiling spec
//! and an ordering spec, all optional. [`condition`] applies it to any
//! [`tsrkit_core::models::Table`] and returns index-based partitions, leaving
//! the table untouched.
//!
//! # Example
//!
//! ```no_run
//! use tsrkit_condition::{condition, Conditioning, QuantileSpec};
//! use tsrkit_core::models::DelimitedTable;
//!
//! let tsrs = DelimitedTable::try_from(std::path::Path::new("tsrs.tsv")).unwrap();
//! let by_score = Conditioning::new()
//!     .group_by("sample")
//!     .quantile_by(QuantileSpec::new("score", 5));
//!
//! for partition in condition(&tsrs, &by_score).unwrap() {
//!     println!("{:?}: {} TSRs", partition.key, partition.len());
//! }
//! ```

pub mod descriptor;
pub mod pipeline;

// re-exports
pub use descriptor::{Conditioning, Direction, OrderSpec, QuantileSpec};
pub use pipeline::{condition, Partition, PartitionKey};

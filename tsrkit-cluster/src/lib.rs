//! Clustering of transcription start sites into transcription start regions.
//!
//! This crate turns point-resolution TSS tables into TSR tables and enriches
//! them:
//!
//! - Clustering nearby TSSs into TSRs, pooled across samples or per sample
//! - Assigning every TSS to its containing TSR and nominating a dominant TSS
//! - Computing shape and spread metrics per TSR
//! - Exchanging count matrices and labels with external collaborators
//!
//! # Example
//!
//! ```no_run
//! use tsrkit_cluster::{process, ClusterMode};
//! use tsrkit_core::config::TsrConfig;
//! use tsrkit_core::models::TssTable;
//!
//! let mut tss = TssTable::try_from("sample1.tss.tsv.gz").unwrap();
//! let tsrs = process(&mut tss, &TsrConfig::default(), ClusterMode::Pooled).unwrap();
//! println!("{} TSRs", tsrs.len());
//! ```

pub mod annotation;
pub mod association;
pub mod clustering;
pub mod differential;
pub mod matrix;
pub mod metrics;

use tsrkit_core::config::TsrConfig;
use tsrkit_core::models::{TsrTable, TssTable};
use tsrkit_core::Result;

// re-exports
pub use annotation::{annotate, Annotatable, AnnotationRequest, AnnotationRow, Annotator};
pub use association::{associate, AssociationSummary};
pub use clustering::{cluster, ClusterMode};
pub use differential::{differential_tsrs, DiffCutoffs, DiffDirection, DiffResult, DiffTable, DifferentialTester};
pub use matrix::{normalize_tss, CountMatrix, CpmNormalizer, Normalizer};
pub use metrics::compute_metrics;

///
/// Cluster a TSS table, associate it with the resulting TSRs and compute
/// TSR metrics.
///
/// The TSS table is only modified by association: it gains TSR membership
/// and dominance markers.
///
pub fn process(tss: &mut TssTable, config: &TsrConfig, mode: ClusterMode) -> Result<TsrTable> {
    config.validate()?;
    let mut tsrs = cluster(tss, &config.clustering, mode)?;
    associate(tss, &mut tsrs)?;
    compute_metrics(tss, &mut tsrs, &config.metrics)?;
    Ok(tsrs)
}

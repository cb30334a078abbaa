//! Exchange with the annotation collaborator.
//!
//! Rows go out with their identity and coordinates; labels come back keyed
//! by the same identity and are stored as attribute columns.

use std::collections::{BTreeMap, HashMap};

use log::info;
use serde::{Deserialize, Serialize};

use tsrkit_core::models::{Strand, TsrTable, TssTable, Value};
use tsrkit_core::{Result, TsrError};

/// A row sent for annotation, coordinates 1-based inclusive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationRequest {
    pub row_id: String,
    pub chr: String,
    pub start: u32,
    pub end: u32,
    pub strand: Strand,
}

/// A row returned by the annotation collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRow {
    pub row_id: String,
    pub labels: BTreeMap<String, Value>,
}

/// The annotation collaborator.
pub trait Annotator {
    fn annotate(&self, requests: &[AnnotationRequest]) -> Result<Vec<AnnotationRow>>;
}

/// Tables whose rows can be sent out for annotation.
pub trait Annotatable {
    fn annotation_requests(&self) -> Vec<AnnotationRequest>;
    fn set_label(&mut self, row: usize, name: &str, value: Value);
}

impl Annotatable for TssTable {
    fn annotation_requests(&self) -> Vec<AnnotationRequest> {
        self.records
            .iter()
            .map(|r| AnnotationRequest {
                row_id: r.key().to_string(),
                chr: r.chr.clone(),
                start: r.position,
                end: r.position,
                strand: r.strand,
            })
            .collect()
    }

    fn set_label(&mut self, row: usize, name: &str, value: Value) {
        self.set_attribute(row, name, value);
    }
}

impl Annotatable for TsrTable {
    fn annotation_requests(&self) -> Vec<AnnotationRequest> {
        self.records
            .iter()
            .map(|r| AnnotationRequest {
                row_id: format!("{}:{}", r.sample, r.id()),
                chr: r.chr.clone(),
                start: r.start,
                end: r.end,
                strand: r.strand,
            })
            .collect()
    }

    fn set_label(&mut self, row: usize, name: &str, value: Value) {
        self.set_attribute(row, name, value);
    }
}

///
/// Reconcile an annotation response with the rows it was computed for.
///
/// Returns, for each table row, the labels to attach. Any missing,
/// duplicated or unknown row identity makes the response malformed.
///
fn reconcile(
    requests: &[AnnotationRequest],
    response: Vec<AnnotationRow>,
) -> Result<Vec<BTreeMap<String, Value>>> {
    let malformed = |msg: String| {
        TsrError::CollaboratorContractViolation(format!("malformed annotation response: {}", msg))
    };

    if response.len() != requests.len() {
        return Err(malformed(format!(
            "{} rows sent, {} returned",
            requests.len(),
            response.len()
        )));
    }

    let row_of: HashMap<&str, usize> = requests
        .iter()
        .enumerate()
        .map(|(i, r)| (r.row_id.as_str(), i))
        .collect();
    if row_of.len() != requests.len() {
        return Err(TsrError::DataIntegrity(
            "annotation requests contain duplicate row identities".to_string(),
        ));
    }

    let mut labels: Vec<Option<BTreeMap<String, Value>>> = vec![None; requests.len()];
    for row in response {
        let idx = *row_of
            .get(row.row_id.as_str())
            .ok_or_else(|| malformed(format!("unknown row {}", row.row_id)))?;
        if labels[idx].is_some() {
            return Err(malformed(format!("row {} returned twice", row.row_id)));
        }
        labels[idx] = Some(row.labels);
    }

    // equal lengths with no unknown or repeated rows means every slot is filled
    Ok(labels.into_iter().map(|l| l.unwrap_or_default()).collect())
}

///
/// Send a table to the annotation collaborator and attach the returned
/// labels as attribute columns. On a malformed response the table is left
/// untouched.
///
pub fn annotate<T: Annotatable, A: Annotator>(table: &mut T, annotator: &A) -> Result<()> {
    let requests = table.annotation_requests();
    let response = annotator.annotate(&requests)?;
    let labels = reconcile(&requests, response)?;

    let mut n_labels = 0;
    for (row, row_labels) in labels.into_iter().enumerate() {
        for (name, value) in row_labels {
            table.set_label(row, &name, value);
            n_labels += 1;
        }
    }
    info!("Attached {} annotation labels to {} rows", n_labels, requests.len());
    Ok(())
}

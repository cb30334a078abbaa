use serde::{Deserialize, Serialize};

use tsrkit_core::models::Table;
use tsrkit_core::{Result, TsrError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// Split rows into `n_bins` equally sized buckets of a numeric column.
///
/// Bucket 1 holds the highest values unless the direction is ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantileSpec {
    pub column: String,
    pub n_bins: usize,
    pub direction: Direction,
}

impl QuantileSpec {
    pub fn new(column: &str, n_bins: usize) -> Self {
        QuantileSpec {
            column: column.to_string(),
            n_bins,
            direction: Direction::Descending,
        }
    }

    pub fn ascending(mut self) -> Self {
        self.direction = Direction::Ascending;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSpec {
    pub column: String,
    pub direction: Direction,
}

impl OrderSpec {
    pub fn new(column: &str) -> Self {
        OrderSpec {
            column: column.to_string(),
            direction: Direction::Ascending,
        }
    }

    pub fn descending(mut self) -> Self {
        self.direction = Direction::Descending;
        self
    }
}

///
/// How a table should be sliced: grouping, then quantiling, then ordering.
/// Every part is optional.
///
/// ```
/// use tsrkit_condition::{Conditioning, OrderSpec, QuantileSpec};
///
/// let conditioning = Conditioning::new()
///     .group_by("sample")
///     .quantile_by(QuantileSpec::new("score", 4))
///     .order_by(OrderSpec::new("start"));
/// assert_eq!(conditioning.grouping(), Some("sample"));
/// ```
///
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conditioning {
    grouping: Option<String>,
    quantiling: Option<QuantileSpec>,
    ordering: Option<OrderSpec>,
}

impl Conditioning {
    pub fn new() -> Self {
        Conditioning::default()
    }

    pub fn group_by(mut self, column: &str) -> Self {
        self.grouping = Some(column.to_string());
        self
    }

    pub fn quantile_by(mut self, spec: QuantileSpec) -> Self {
        self.quantiling = Some(spec);
        self
    }

    pub fn order_by(mut self, spec: OrderSpec) -> Self {
        self.ordering = Some(spec);
        self
    }

    pub fn grouping(&self) -> Option<&str> {
        self.grouping.as_deref()
    }

    pub fn quantiling(&self) -> Option<&QuantileSpec> {
        self.quantiling.as_ref()
    }

    pub fn ordering(&self) -> Option<&OrderSpec> {
        self.ordering.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.grouping.is_none() && self.quantiling.is_none() && self.ordering.is_none()
    }

    ///
    /// Check the descriptor against a table: every named column must exist,
    /// the quantiling column must be numeric and the bin count positive.
    ///
    pub fn validate<T: Table + ?Sized>(&self, table: &T) -> Result<()> {
        if let Some(column) = &self.grouping {
            table.column(column)?;
        }
        if let Some(spec) = &self.quantiling {
            if spec.n_bins == 0 {
                return Err(TsrError::Configuration(
                    "number of quantile bins must be at least 1".to_string(),
                ));
            }
            if !table.column(&spec.column)?.is_numeric() {
                return Err(TsrError::Configuration(format!(
                    "cannot compute quantiles of non-numeric column {}",
                    spec.column
                )));
            }
        }
        if let Some(spec) = &self.ordering {
            table.column(&spec.column)?;
        }
        Ok(())
    }
}

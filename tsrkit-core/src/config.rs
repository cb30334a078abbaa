use std::fs::read_to_string;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, TsrError};

pub const DEFAULT_CONSENSUS_LABEL: &str = "consensus";

/// Parameters of the clustering engine.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Maximum gap between consecutive positions merged into one TSR.
    pub max_distance: u32,
    /// Minimum score a TSS needs to take part in clustering.
    pub threshold: f64,
    /// Minimum number of samples supporting a position.
    pub n_samples: usize,
    /// Sample label given to TSRs of a pooled multi-sample run.
    pub consensus_label: String,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        ClusteringConfig {
            max_distance: 25,
            threshold: 1.0,
            n_samples: 1,
            consensus_label: DEFAULT_CONSENSUS_LABEL.to_string(),
        }
    }
}

impl ClusteringConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_distance == 0 {
            return Err(TsrError::Configuration(
                "distance threshold must be positive, got 0".to_string(),
            ));
        }
        if !(self.threshold > 0.0) || !self.threshold.is_finite() {
            return Err(TsrError::Configuration(format!(
                "score threshold must be a positive number, got {}",
                self.threshold
            )));
        }
        if self.n_samples == 0 {
            return Err(TsrError::Configuration(
                "minimum sample support must be at least 1".to_string(),
            ));
        }
        if self.consensus_label.is_empty() {
            return Err(TsrError::Configuration(
                "consensus label must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parameters of the metrics calculator.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// TSRs with an interquartile width at or below this are `peaked`.
    pub peaked_max_iqr: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            peaked_max_iqr: 10.0,
        }
    }
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.peaked_max_iqr > 0.0) || !self.peaked_max_iqr.is_finite() {
            return Err(TsrError::Configuration(format!(
                "peaked interquartile threshold must be a positive number, got {}",
                self.peaked_max_iqr
            )));
        }
        Ok(())
    }
}

///
/// Top-level configuration, loaded from a TOML file:
///
/// ```toml
/// [clustering]
/// max_distance = 25
/// threshold = 3
/// n_samples = 2
///
/// [metrics]
/// peaked_max_iqr = 10
/// ```
///
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct TsrConfig {
    pub clustering: ClusteringConfig,
    pub metrics: MetricsConfig,
}

impl TsrConfig {
    pub fn validate(&self) -> Result<()> {
        self.clustering.validate()?;
        self.metrics.validate()
    }
}

impl TryFrom<&Path> for TsrConfig {
    type Error = TsrError;

    fn try_from(path: &Path) -> Result<Self> {
        let toml_str = read_to_string(path)?;
        let config: TsrConfig = toml::from_str(&toml_str)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::io::Write;

    #[rstest]
    fn test_partial_toml_uses_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[clustering]\nmax_distance = 15\nn_samples = 2").unwrap();
        file.flush().unwrap();

        let config = TsrConfig::try_from(file.path()).unwrap();
        assert_eq!(config.clustering.max_distance, 15);
        assert_eq!(config.clustering.n_samples, 2);
        assert_eq!(config.clustering.threshold, 1.0);
        assert_eq!(config.metrics, MetricsConfig::default());
    }

    #[rstest]
    #[case(0.0)]
    #[case(-1.0)]
    #[case(f64::NAN)]
    fn test_non_positive_threshold_rejected(#[case] threshold: f64) {
        let config = ClusteringConfig {
            threshold,
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().is_configuration());
    }

    #[rstest]
    fn test_zero_distance_rejected() {
        let config = ClusteringConfig {
            max_distance: 0,
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().is_configuration());
    }

    #[rstest]
    fn test_zero_sample_support_rejected() {
        let config = ClusteringConfig {
            n_samples: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(TsrError::Configuration(_))));
    }

    #[rstest]
    fn test_invalid_toml_reported() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[clustering]\nmax_distance = \"far\"").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            TsrConfig::try_from(file.path()),
            Err(TsrError::Toml(_))
        ));
    }
}

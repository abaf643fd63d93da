use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ChromError, Result};
use crate::processing::peaks::DetectionParams;

/// Settings of one analysis run, usually read from a JSON file:
///
/// ```json
/// {
///   "detection": { "prominence": 2.0, "sg_window_length": 31 },
///   "flow_rate": 0.3
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub detection: DetectionParams,
    /// Flow rate in volume per time unit of the trace, e.g. mL/min.
    pub flow_rate: Option<f64>,
}

impl AnalysisConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ChromError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: AnalysisConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.detection.validate()?;
        if let Some(rate) = self.flow_rate {
            if !(rate.is_finite() && rate > 0.0) {
                return Err(ChromError::parameter(format!(
                    "flow_rate must be positive, got {rate}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = AnalysisConfig::from_json(
            r#"{ "detection": { "prominence": 2.5 }, "flow_rate": 0.3 }"#,
        )
        .unwrap();
        assert_eq!(config.detection.prominence, 2.5);
        assert_eq!(config.detection.sg_window_length, 25);
        assert_eq!(config.detection.min_height, None);
        assert_eq!(config.flow_rate, Some(0.3));

        assert_eq!(AnalysisConfig::from_json("{}").unwrap(), AnalysisConfig::default());
    }

    #[test]
    fn test_invalid_values_are_parameter_errors() {
        assert!(matches!(
            AnalysisConfig::from_json(r#"{ "flow_rate": -1.0 }"#),
            Err(ChromError::Parameter(_))
        ));
        assert!(matches!(
            AnalysisConfig::from_json(r#"{ "detection": { "peak_window_length": 0 } }"#),
            Err(ChromError::Parameter(_))
        ));
        assert!(matches!(
            AnalysisConfig::from_json("not json"),
            Err(ChromError::Json(_))
        ));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = AnalysisConfig::from_path(Path::new("/nonexistent/params.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/params.json"));
    }
}

use std::{fmt, fs, io, path::Path};

use derive_more::From;
use eval::EvalOptions;
use serde::{Deserialize, Serialize};

/// Grading settings. Every field is optional in the JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GradeConfig {
    /// Relative tolerance for comparing two results.
    pub tolerance: f64,
    pub quadrature_panels: usize,
    pub limit_steps: usize,
    pub max_series_terms: u64,
    /// Seed for parameter draws; drawn from OS entropy when absent.
    pub seed: Option<u64>,
}

impl Default for GradeConfig {
    fn default() -> Self {
        let options = EvalOptions::default();
        Self {
            tolerance: 1e-6,
            quadrature_panels: options.quadrature_panels,
            limit_steps: options.limit_steps,
            max_series_terms: options.max_series_terms,
            seed: None,
        }
    }
}

impl GradeConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn eval_options(&self) -> EvalOptions {
        EvalOptions {
            quadrature_panels: self.quadrature_panels,
            limit_steps: self.limit_steps,
            max_series_terms: self.max_series_terms,
        }
    }
}

#[derive(Debug, From)]
pub enum ConfigError {
    Io(io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "cannot read config: {e}"),
            ConfigError::Json(e) => write!(f, "invalid config: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

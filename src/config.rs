//! Optional TOML configuration, shared by the training job and the prediction server. Every
//! field has a default, so a missing file, or a file with only some sections, is fine.

use std::{fs, io::ErrorKind, path::Path};

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "cgas_aid.toml";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub training: TrainingConfig,
    pub server: ServerConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// ChEMBL target identifier. The default is cGAS (cyclic GMP-AMP synthase).
    pub target_id: String,
    pub api_base_url: String,
    /// Records per page.
    pub limit: usize,
    pub max_pages: usize,
    pub timeout_secs: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            target_id: "CHEMBL4105728".to_owned(),
            api_base_url: "https://www.ebi.ac.uk/chembl/api/data".to_owned(),
            limit: 1_000,
            max_pages: 1,
            timeout_secs: 30,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub model_dir: String,
    pub seed: u64,
    pub test_fraction: f64,
    pub n_estimators: usize,
    pub svr_c: f64,
    pub svr_epsilon: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            model_dir: "ml_models".to_owned(),
            seed: 42,
            test_fraction: 0.2,
            n_estimators: 100,
            svr_c: 1.,
            svr_epsilon: 0.1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub title: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8501".to_owned(),
            title: "cGAS-AID".to_owned(),
        }
    }
}

impl Config {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No config file at {}; using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let result = toml::from_str(&text).map_err(|source| PipelineError::Config {
            path: path.to_owned(),
            source,
        })?;

        info!("Loaded config from {}", path.display());
        Ok(result)
    }
}

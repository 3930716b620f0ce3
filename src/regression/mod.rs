//! The two regressors we train on descriptor vectors, and their persistence.

pub mod forest;
pub mod svr;

use std::{
    fmt::{self, Display, Formatter},
    fs, io,
    path::{Path, PathBuf},
    str::FromStr,
};

use bincode::{Decode, Encode};
use log::info;

use crate::{
    dataset::Features,
    error::{PipelineError, Result},
    regression::{forest::RandomForest, svr::Svr},
};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ModelKind {
    RandomForest,
    Svm,
}

impl ModelKind {
    pub const ALL: [Self; 2] = [Self::RandomForest, Self::Svm];

    /// As shown in the model selector, and in metric output.
    pub fn label(self) -> &'static str {
        match self {
            Self::RandomForest => "Random Forest",
            Self::Svm => "SVM",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            Self::RandomForest => "rf_model.bin",
            Self::Svm => "svm_model.bin",
        }
    }

    pub fn path(self, model_dir: &Path) -> PathBuf {
        model_dir.join(self.file_name())
    }
}

impl Display for ModelKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for ModelKind {
    type Err = io::Error;

    fn from_str(s: &str) -> io::Result<Self> {
        match s.trim().to_lowercase().replace(['_', '-'], " ").as_ref() {
            "random forest" | "rf" => Ok(Self::RandomForest),
            "svm" | "svr" => Ok(Self::Svm),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Unknown model: {s}"),
            )),
        }
    }
}

/// A trained model, mapping a descriptor vector to a pChEMBL value.
#[derive(Clone, Debug, Encode, Decode)]
pub enum Regressor {
    RandomForest(RandomForest),
    Svr(Svr),
}

impl Regressor {
    pub fn kind(&self) -> ModelKind {
        match self {
            Self::RandomForest(_) => ModelKind::RandomForest,
            Self::Svr(_) => ModelKind::Svm,
        }
    }

    pub fn predict(&self, x: &Features) -> f64 {
        match self {
            Self::RandomForest(m) => m.predict(x),
            Self::Svr(m) => m.predict(x),
        }
    }

    pub fn predict_batch(&self, x: &[Features]) -> Vec<f64> {
        x.iter().map(|f| self.predict(f)).collect()
    }

    /// Save to the model directory under this kind's file name, overwriting any existing file.
    pub fn save(&self, model_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(model_dir)?;
        let path = self.kind().path(model_dir);

        let bytes = bincode::encode_to_vec(self, bincode::config::standard())?;
        fs::write(&path, bytes)?;

        info!("Saved {} model to {}", self.kind(), path.display());
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;

        let (result, _) = bincode::decode_from_slice(&bytes, bincode::config::standard())
            .map_err(|source| PipelineError::Decode {
                path: path.to_owned(),
                source,
            })?;

        Ok(result)
    }
}

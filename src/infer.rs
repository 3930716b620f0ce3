//! Prediction from persisted models. Models are loaded once, then shared read-only across
//! requests.

use std::{
    collections::HashMap,
    fmt::{self, Display, Formatter},
    io::ErrorKind,
    path::{Path, PathBuf},
};

use log::{info, warn};

use crate::{
    error::{PipelineError, Result},
    mol_characterization::{descriptor_vec, features},
    regression::{ModelKind, Regressor},
};

/// The result of one form submission.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// No input; nothing is shown.
    Idle,
    InvalidSmiles,
    /// The selected model's file wasn't present when the service started.
    ModelMissing(PathBuf),
    /// pChEMBL
    Prediction(f64),
}

impl Outcome {
    /// The user-facing message, or `None` if there's nothing to show.
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Idle => None,
            Self::InvalidSmiles => Some("Invalid SMILES".to_owned()),
            Self::ModelMissing(path) => Some(format!(
                "Model file {} not found. Please ensure it's available in the environment.",
                path.display()
            )),
            Self::Prediction(v) => Some(format!("Predicted Bioactivity (pChEMBL): {v}")),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::InvalidSmiles | Self::ModelMissing(_))
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message().unwrap_or_default())
    }
}

pub struct Predictor {
    model_dir: PathBuf,
    models: HashMap<ModelKind, Regressor>,
}

impl Predictor {
    /// Load every model present in `model_dir`. A missing file is logged and remembered as
    /// absent; a file that exists but fails to decode is an error.
    pub fn load(model_dir: &Path) -> Result<Self> {
        let mut models = HashMap::new();

        for kind in ModelKind::ALL {
            let path = kind.path(model_dir);
            match Regressor::load(&path) {
                Ok(model) => {
                    info!("Loaded {kind} model from {}", path.display());
                    models.insert(kind, model);
                }
                Err(PipelineError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                    warn!("{kind} model not found at {}", path.display());
                }
                Err(e) => return Err(e),
            }
        }

        Ok(Self {
            model_dir: model_dir.to_owned(),
            models,
        })
    }

    pub fn from_models(model_dir: &Path, models: impl IntoIterator<Item = Regressor>) -> Self {
        Self {
            model_dir: model_dir.to_owned(),
            models: models.into_iter().map(|m| (m.kind(), m)).collect(),
        }
    }

    pub fn has_model(&self, kind: ModelKind) -> bool {
        self.models.contains_key(&kind)
    }

    pub fn submit(&self, choice: ModelKind, smiles: &str) -> Outcome {
        let smiles = smiles.trim();
        if smiles.is_empty() {
            return Outcome::Idle;
        }

        let Some(x) = features(&descriptor_vec(smiles)) else {
            return Outcome::InvalidSmiles;
        };

        match self.models.get(&choice) {
            Some(model) => Outcome::Prediction(model.predict(&x)),
            None => Outcome::ModelMissing(choice.path(&self.model_dir)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::regression::forest::{ForestParams, RandomForest};

    fn forest() -> Regressor {
        let x: Vec<_> = (0..10).map(|i| [100. + i as f64 * 10., 20., 1., 1.]).collect();
        let y: Vec<_> = (0..10).map(|i| 5. + i as f64 * 0.2).collect();
        Regressor::RandomForest(RandomForest::fit(
            &x,
            &y,
            ForestParams {
                n_estimators: 10,
                seed: 42,
            },
        ))
    }

    #[test]
    fn empty_input_is_idle() {
        let p = Predictor::from_models(Path::new("ml_models"), [forest()]);
        assert_eq!(p.submit(ModelKind::RandomForest, ""), Outcome::Idle);
        assert_eq!(p.submit(ModelKind::Svm, "   "), Outcome::Idle);
        assert_eq!(Outcome::Idle.message(), None);
    }

    #[test]
    fn invalid_smiles() {
        let p = Predictor::from_models(Path::new("ml_models"), [forest()]);
        let out = p.submit(ModelKind::RandomForest, "C1CC(");
        assert_eq!(out, Outcome::InvalidSmiles);
        assert_eq!(out.message().unwrap(), "Invalid SMILES");
    }

    #[test]
    fn missing_model_message() {
        let dir = tempfile::tempdir().unwrap();
        let p = Predictor::load(dir.path()).unwrap();
        assert!(!p.has_model(ModelKind::RandomForest));

        let out = p.submit(ModelKind::RandomForest, "CCO");
        let path = dir.path().join("rf_model.bin");
        assert_eq!(out, Outcome::ModelMissing(path.clone()));
        assert_eq!(
            out.message().unwrap(),
            format!(
                "Model file {} not found. Please ensure it's available in the environment.",
                path.display()
            )
        );
        assert!(!out.message().unwrap().contains("Predicted"));
    }

    #[test]
    fn prediction_from_loaded_model() {
        let dir = tempfile::tempdir().unwrap();
        forest().save(dir.path()).unwrap();

        let p = Predictor::load(dir.path()).unwrap();
        assert!(p.has_model(ModelKind::RandomForest));
        assert!(!p.has_model(ModelKind::Svm));

        match p.submit(ModelKind::RandomForest, "CCO") {
            Outcome::Prediction(v) => {
                assert!(v.is_finite());
                assert!((5. ..=6.8).contains(&v));
            }
            other => panic!("Expected a prediction, got {other:?}"),
        }
        assert!(matches!(
            p.submit(ModelKind::Svm, "CCO"),
            Outcome::ModelMissing(_)
        ));
    }

    #[test]
    fn corrupt_model_aborts_load() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("svm_model.bin"), [0xff; 16]).unwrap();
        assert!(Predictor::load(dir.path()).is_err());
    }
}

//! The offline training job: fetch activities, featurize, fit both regressors on a seeded
//! split, report held-out metrics, and persist the models for the prediction server.
//!
//! Run `cargo r --release --bin train -- -v`, or pass `--csv` to train on a saved table
//! instead of querying ChEMBL.

use std::{
    fs,
    path::{Path, PathBuf},
};

use clap::Parser;
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    chembl::{ActivityRecord, fetch_activities},
    config::{Config, DEFAULT_CONFIG_PATH, TrainingConfig},
    dataset::{Dataset, Histogram, load_csv, save_csv},
    error::Result,
    init_logging,
    model_eval::EvalMetrics,
    regression::{
        ModelKind, Regressor,
        forest::{ForestParams, RandomForest},
        svr::{Svr, SvrParams},
    },
};

pub const REPORT_FILE: &str = "training_report.json";
pub const HISTOGRAM_BINS: usize = 30;

#[derive(Parser, Debug)]
#[command(name = "train", about = "Train bioactivity regressors on ChEMBL data")]
pub struct Cli {
    /// ChEMBL target ID
    #[arg(long)]
    pub target: Option<String>,

    /// Activities per request
    #[arg(long)]
    pub limit: Option<usize>,

    /// Where to write models and the training report
    #[arg(long)]
    pub model_dir: Option<PathBuf>,

    /// Train from a saved activity table instead of fetching
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Save fetched activities to this CSV file
    #[arg(long)]
    pub save_csv: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    fn apply(&self, cfg: &mut Config) {
        if let Some(t) = &self.target {
            cfg.data.target_id = t.clone();
        }
        if let Some(l) = self.limit {
            cfg.data.limit = l;
        }
        if let Some(d) = &self.model_dir {
            cfg.training.model_dir = d.to_string_lossy().into_owned();
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ModelReport {
    pub model: String,
    pub file: String,
    pub metrics: EvalMetrics,
}

/// Written next to the models. Metrics can be NaN, which serializes as `null`.
#[derive(Clone, Debug, Serialize)]
pub struct TrainingReport {
    pub target_id: String,
    pub num_records: usize,
    pub num_usable: usize,
    pub num_train: usize,
    pub num_test: usize,
    pub seed: u64,
    pub models: Vec<ModelReport>,
    pub pchembl_histogram: Histogram,
}

/// The parts of a training report the prediction page displays.
#[derive(Clone, Debug, Deserialize)]
pub struct ReportSummary {
    pub target_id: String,
    pub num_records: usize,
    pub pchembl_histogram: Histogram,
}

impl ReportSummary {
    pub fn load(model_dir: &Path) -> Result<Self> {
        let text = fs::read_to_string(model_dir.join(REPORT_FILE))?;
        Ok(serde_json::from_str(&text)?)
    }
}

pub fn fit(kind: ModelKind, ds: &Dataset, cfg: &TrainingConfig) -> Regressor {
    match kind {
        ModelKind::RandomForest => Regressor::RandomForest(RandomForest::fit(
            &ds.features,
            &ds.targets,
            ForestParams {
                n_estimators: cfg.n_estimators,
                seed: cfg.seed,
            },
        )),
        ModelKind::Svm => Regressor::Svr(Svr::fit(
            &ds.features,
            &ds.targets,
            SvrParams {
                c: cfg.svr_c,
                epsilon: cfg.svr_epsilon,
            },
        )),
    }
}

/// The per-model line written to stdout.
pub fn metric_line(kind: ModelKind, metrics: &EvalMetrics) -> String {
    format!("{} - MSE: {}, R2: {}", kind.label(), metrics.mse, metrics.r2)
}

/// Featurize, split, fit and evaluate both models, then persist them with a report. Prints one
/// metric line per model to stdout.
pub fn run(cfg: &Config, records: &[ActivityRecord]) -> Result<TrainingReport> {
    let tc = &cfg.training;
    let model_dir = Path::new(&tc.model_dir);

    let ds = Dataset::from_records(records);
    let split = ds.train_test_split(tc.test_fraction, tc.seed)?;

    info!(
        "Training on {} samples; holding out {}",
        split.train.len(),
        split.test.len()
    );

    let mut models = Vec::with_capacity(ModelKind::ALL.len());
    for kind in ModelKind::ALL {
        let model = fit(kind, &split.train, tc);

        let predicted = model.predict_batch(&split.test.features);
        let metrics = EvalMetrics::new(&split.test.targets, &predicted);

        println!("{}", metric_line(kind, &metrics));
        info!("{kind}: {metrics}");

        let path = model.save(model_dir)?;

        models.push(ModelReport {
            model: kind.label().to_owned(),
            file: path.to_string_lossy().into_owned(),
            metrics,
        });
    }

    let pchembl: Vec<f64> = records.iter().map(|r| r.pchembl_value).collect();

    let report = TrainingReport {
        target_id: cfg.data.target_id.clone(),
        num_records: records.len(),
        num_usable: ds.len(),
        num_train: split.train.len(),
        num_test: split.test.len(),
        seed: tc.seed,
        models,
        pchembl_histogram: Histogram::new(&pchembl, HISTOGRAM_BINS),
    };

    let report_path = model_dir.join(REPORT_FILE);
    fs::write(&report_path, serde_json::to_string_pretty(&report)?)?;
    info!("Saved training report to {}", report_path.display());

    Ok(report)
}

pub fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut cfg = Config::load(&cli.config)?;
    cli.apply(&mut cfg);

    let records = match &cli.csv {
        Some(path) => load_csv(path)?,
        None => fetch_activities(&cfg.data)?,
    };

    if let Some(path) = &cli.save_csv {
        save_csv(path, &records)?;
    }

    run(&cfg, &records)?;
    Ok(())
}

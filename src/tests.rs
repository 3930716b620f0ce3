//! End-to-end: train from a table of activities, then predict from the persisted models.

use crate::{
    chembl::ActivityRecord,
    config::Config,
    error::PipelineError,
    infer::{Outcome, Predictor},
    regression::ModelKind,
    train::{HISTOGRAM_BINS, REPORT_FILE, ReportSummary, run},
};

const MOLS: [(&str, f64); 20] = [
    ("C", 4.1),
    ("CC", 4.3),
    ("CCC", 4.6),
    ("CCCC", 4.8),
    ("CCO", 5.0),
    ("CCCO", 5.2),
    ("CC(=O)O", 5.5),
    ("CC(N)=O", 5.6),
    ("c1ccccc1", 5.9),
    ("c1ccncc1", 6.1),
    ("Oc1ccccc1", 6.2),
    ("Nc1ccccc1", 6.4),
    ("CC(=O)Oc1ccccc1C(=O)O", 6.8),
    ("c1ccc2ccccc2c1", 6.9),
    ("CN1C=NC2=C1C(=O)N(C(=O)N2C)C", 7.1),
    ("CC(C)Cc1ccc(cc1)C(C)C(=O)O", 7.3),
    ("OCC(O)CO", 5.4),
    ("c1ccc(cc1)C(=O)O", 6.0),
    ("CCN(CC)CC", 5.1),
    ("O=C1CCCCC1", 5.3),
];

fn records() -> Vec<ActivityRecord> {
    MOLS.iter()
        .enumerate()
        .map(|(i, (smiles, y))| ActivityRecord {
            molecule_chembl_id: Some(format!("CHEMBL{}", 1000 + i)),
            canonical_smiles: smiles.to_string(),
            pchembl_value: *y,
        })
        .collect()
}

fn config(model_dir: &std::path::Path) -> Config {
    let mut cfg = Config::default();
    cfg.training.model_dir = model_dir.to_string_lossy().into_owned();
    cfg.training.n_estimators = 20;
    cfg
}

#[test]
fn train_then_predict() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());

    let report = run(&cfg, &records()).unwrap();

    assert_eq!(report.num_records, 20);
    assert_eq!(report.num_usable, 20);
    assert_eq!(report.num_test, 4);
    assert_eq!(report.num_train, 16);
    assert_eq!(report.models.len(), 2);
    assert_eq!(report.pchembl_histogram.counts.len(), HISTOGRAM_BINS);
    assert_eq!(report.pchembl_histogram.counts.iter().sum::<usize>(), 20);

    for kind in ModelKind::ALL {
        assert!(kind.path(dir.path()).exists());
    }
    assert!(dir.path().join(REPORT_FILE).exists());

    let summary = ReportSummary::load(dir.path()).unwrap();
    assert_eq!(summary.target_id, "CHEMBL4105728");
    assert_eq!(summary.pchembl_histogram, report.pchembl_histogram);

    let predictor = Predictor::load(dir.path()).unwrap();
    for kind in ModelKind::ALL {
        match predictor.submit(kind, "CCCCO") {
            Outcome::Prediction(v) => assert!(v.is_finite()),
            other => panic!("{kind}: expected a prediction, got {other:?}"),
        }
        assert_eq!(predictor.submit(kind, ""), Outcome::Idle);
        assert_eq!(predictor.submit(kind, "C(("), Outcome::InvalidSmiles);
    }
}

#[test]
fn training_is_reproducible() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();

    run(&config(dir_a.path()), &records()).unwrap();
    run(&config(dir_b.path()), &records()).unwrap();

    let a = Predictor::load(dir_a.path()).unwrap();
    let b = Predictor::load(dir_b.path()).unwrap();

    for smiles in ["CCCCO", "c1ccoc1", "CC(=O)N"] {
        for kind in ModelKind::ALL {
            assert_eq!(a.submit(kind, smiles), b.submit(kind, smiles));
        }
    }
}

#[test]
fn unusable_records_fail_before_training() {
    let dir = tempfile::tempdir().unwrap();
    let records = vec![ActivityRecord {
        molecule_chembl_id: None,
        canonical_smiles: "definitely not smiles".to_owned(),
        pchembl_value: 5.,
    }];

    assert!(matches!(
        run(&config(dir.path()), &records),
        Err(PipelineError::EmptyDataset)
    ));
    assert!(!ModelKind::RandomForest.path(dir.path()).exists());

    assert!(matches!(
        run(&config(dir.path()), &[]),
        Err(PipelineError::EmptyDataset)
    ));
}

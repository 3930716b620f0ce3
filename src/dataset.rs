//! Featurized training data: descriptor rows paired with pChEMBL targets, and the seeded
//! train/test split.

use std::path::Path;

use log::{info, warn};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    chembl::ActivityRecord,
    error::{PipelineError, Result},
    mol_characterization::{N_DESCRIPTORS, descriptor_vec, features},
};

/// Below this, a split leaves too little to fit and evaluate on.
pub const MIN_SAMPLES: usize = 5;

pub type Features = [f64; N_DESCRIPTORS];

#[derive(Clone, Debug, Default)]
pub struct Dataset {
    pub features: Vec<Features>,
    pub targets: Vec<f64>,
}

#[derive(Debug)]
pub struct Split {
    pub train: Dataset,
    pub test: Dataset,
}

impl Dataset {
    /// Featurize each record, dropping rows whose structure doesn't yield a complete descriptor
    /// vector. Features and targets stay aligned, since filtering happens per row.
    pub fn from_records(records: &[ActivityRecord]) -> Self {
        let rows: Vec<Option<(Features, f64)>> = records
            .par_iter()
            .map(|r| features(&descriptor_vec(&r.canonical_smiles)).map(|f| (f, r.pchembl_value)))
            .collect();

        let mut result = Self::default();
        let mut dropped = 0;

        for (row, rec) in rows.into_iter().zip(records) {
            match row {
                Some((f, y)) => {
                    result.features.push(f);
                    result.targets.push(y);
                }
                None => {
                    dropped += 1;
                    warn!(
                        "Dropping {}: unable to compute descriptors for {}",
                        rec.molecule_chembl_id.as_deref().unwrap_or("(no ID)"),
                        rec.canonical_smiles
                    );
                }
            }
        }

        info!(
            "Featurized {} of {} records ({dropped} dropped)",
            result.len(),
            records.len()
        );

        result
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    fn subset(&self, indices: &[usize]) -> Self {
        Self {
            features: indices.iter().map(|&i| self.features[i]).collect(),
            targets: indices.iter().map(|&i| self.targets[i]).collect(),
        }
    }

    /// Shuffle with a seeded RNG, and hold out `ceil(n * test_fraction)` rows for evaluation.
    /// The same data and seed always produce the same partition.
    pub fn train_test_split(&self, test_fraction: f64, seed: u64) -> Result<Split> {
        let n = self.len();
        if n == 0 {
            return Err(PipelineError::EmptyDataset);
        }
        if n < MIN_SAMPLES {
            return Err(PipelineError::TooFewSamples {
                found: n,
                required: MIN_SAMPLES,
            });
        }

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let n_test = ((n as f64 * test_fraction.clamp(0., 1.)).ceil() as usize).clamp(1, n - 1);
        let (test_i, train_i) = indices.split_at(n_test);

        Ok(Split {
            train: self.subset(train_i),
            test: self.subset(test_i),
        })
    }
}

/// Equal-width bins over a set of values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub min: f64,
    pub max: f64,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn new(values: &[f64], num_bins: usize) -> Self {
        let num_bins = num_bins.max(1);
        let mut counts = vec![0; num_bins];

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        if values.is_empty() {
            return Self {
                min: 0.,
                max: 0.,
                counts,
            };
        }

        let width = (max - min) / num_bins as f64;
        for v in values {
            let bin = if width > 0. {
                (((v - min) / width) as usize).min(num_bins - 1)
            } else {
                0
            };
            counts[bin] += 1;
        }

        Self { min, max, counts }
    }

    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.counts.len() as f64
    }
}

pub fn load_csv(path: &Path) -> Result<Vec<ActivityRecord>> {
    let mut rdr = csv::Reader::from_path(path)?;

    let mut result = Vec::new();
    for rec in rdr.deserialize() {
        result.push(rec?);
    }

    info!("Loaded {} activities from {}", result.len(), path.display());
    Ok(result)
}

pub fn save_csv(path: &Path, records: &[ActivityRecord]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for rec in records {
        wtr.serialize(rec)?;
    }
    wtr.flush()?;

    info!("Saved {} activities to {}", records.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(smiles: &str, y: f64) -> ActivityRecord {
        ActivityRecord {
            molecule_chembl_id: None,
            canonical_smiles: smiles.to_owned(),
            pchembl_value: y,
        }
    }

    fn sample() -> Dataset {
        let records: Vec<_> = ["C", "CC", "CCC", "CCCC", "CCO", "CCN", "c1ccccc1", "CC(=O)O", "CN", "CCCl"]
            .iter()
            .enumerate()
            .map(|(i, s)| record(s, 4. + i as f64 * 0.3))
            .collect();
        Dataset::from_records(&records)
    }

    #[test]
    fn drops_unparseable_rows() {
        let records = vec![
            record("CCO", 5.),
            record("C1CC", 6.),
            record("", 7.),
            record("c1ccncc1", 8.),
        ];
        let ds = Dataset::from_records(&records);

        assert_eq!(ds.len(), 2);
        assert_eq!(ds.features.len(), ds.targets.len());
        assert_eq!(ds.targets, vec![5., 8.]);
    }

    #[test]
    fn empty_dataset_rejected_before_split() {
        let ds = Dataset::from_records(&[record("not smiles", 5.)]);
        assert!(ds.is_empty());
        assert!(matches!(
            ds.train_test_split(0.2, 42),
            Err(PipelineError::EmptyDataset)
        ));

        let small = Dataset::from_records(&[record("C", 1.), record("CC", 2.)]);
        assert!(matches!(
            small.train_test_split(0.2, 42),
            Err(PipelineError::TooFewSamples { found: 2, .. })
        ));
    }

    #[test]
    fn split_is_deterministic() {
        let ds = sample();
        let a = ds.train_test_split(0.2, 42).unwrap();
        let b = ds.train_test_split(0.2, 42).unwrap();

        assert_eq!(a.test.len(), 2);
        assert_eq!(a.train.len(), 8);
        assert_eq!(a.test.targets, b.test.targets);
        assert_eq!(a.train.targets, b.train.targets);

        let mut all: Vec<f64> = a.train.targets.iter().chain(&a.test.targets).copied().collect();
        all.sort_by(f64::total_cmp);
        let mut orig = ds.targets.clone();
        orig.sort_by(f64::total_cmp);
        assert_eq!(all, orig);
    }

    #[test]
    fn histogram_bins() {
        let h = Histogram::new(&[0., 1., 2., 3., 4.], 4);
        assert_eq!(h.counts, vec![1, 1, 1, 2]);
        assert_eq!(h.counts.iter().sum::<usize>(), 5);

        let flat = Histogram::new(&[2., 2., 2.], 30);
        assert_eq!(flat.counts[0], 3);
    }

    #[test]
    fn csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acts.csv");
        let records = vec![
            ActivityRecord {
                molecule_chembl_id: Some("CHEMBL25".to_owned()),
                canonical_smiles: "CC(=O)Oc1ccccc1C(=O)O".to_owned(),
                pchembl_value: 5.5,
            },
            record("CCO", 4.),
        ];

        save_csv(&path, &records).unwrap();
        assert_eq!(load_csv(&path).unwrap(), records);
    }
}

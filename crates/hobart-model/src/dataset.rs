//! Date-ordered train/validation/test split and the encoded datasets.

use crate::error::{ModelError, Result};
use crate::vectorizer::FeatureVectorizer;
use crate::VECTORIZER_FILE;
use chrono::NaiveDate;
use hobart_features::{FeatureRow, FeatureTable};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

/// Fractions of distinct dates given to the training and validation sets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Share of dates used for training.
    pub train_fraction: f64,
    /// Share of dates used for validation.
    pub validation_fraction: f64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_fraction: 0.70,
            validation_fraction: 0.15,
        }
    }
}

impl SplitConfig {
    /// Reject fractions outside `[0, 1]` or summing past 1.
    pub fn validate(&self) -> Result<()> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !in_unit(self.train_fraction) {
            return Err(ModelError::InvalidParams {
                name: "train_fraction",
                reason: format!("{} is outside [0, 1]", self.train_fraction),
            });
        }
        if !in_unit(self.validation_fraction)
            || self.train_fraction + self.validation_fraction > 1.0
        {
            return Err(ModelError::InvalidParams {
                name: "validation_fraction",
                reason: format!(
                    "{} leaves no room after training share {}",
                    self.validation_fraction, self.train_fraction
                ),
            });
        }
        Ok(())
    }
}

/// Rows of each split.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DateSplit {
    /// Earliest dates.
    pub train: FeatureTable,
    /// Following dates.
    pub validation: FeatureTable,
    /// Latest dates.
    pub test: FeatureTable,
}

/// Split by distinct date so no date straddles two sets.
///
/// With `n` distinct dates the first `⌊train·n⌋` train, dates up to
/// `⌊(train + validation)·n⌋` validate and the rest test.
pub fn split_by_date(table: &FeatureTable, config: &SplitConfig) -> Result<DateSplit> {
    config.validate()?;
    let dates = table.dates();
    let n = dates.len() as f64;
    let train_end = (n * config.train_fraction) as usize;
    let val_end = (n * (config.train_fraction + config.validation_fraction)) as usize;

    let collect = |range: &[NaiveDate]| -> FeatureTable {
        FeatureTable::new(
            range
                .iter()
                .flat_map(|date| table.rows_on(*date).iter().cloned())
                .collect(),
        )
    };
    let split = DateSplit {
        train: collect(&dates[..train_end]),
        validation: collect(&dates[train_end..val_end.max(train_end)]),
        test: collect(&dates[val_end.max(train_end)..]),
    };
    info!(
        dates = dates.len(),
        train = split.train.len(),
        validation = split.validation.len(),
        test = split.test.len(),
        "split by date"
    );
    Ok(split)
}

/// Encoded features and labels of one split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// `rows × features` matrix.
    pub features: Array2<f64>,
    /// Labels aligned with `features` rows.
    pub targets: Array1<f64>,
}

impl Dataset {
    /// Encode labelled rows.
    pub fn encode(vectorizer: &FeatureVectorizer, rows: &[FeatureRow]) -> Result<Self> {
        let targets = rows
            .iter()
            .map(|r| {
                r.future_1m_return.ok_or_else(|| ModelError::MissingLabel {
                    ticker: r.ticker.clone(),
                    date: r.date,
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        Ok(Self {
            features: vectorizer.transform(rows),
            targets: Array1::from(targets),
        })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether there are no rows.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    fn save(&self, path: &Path) -> Result<()> {
        serde_json::to_writer(BufWriter::new(File::create(path)?), self)?;
        Ok(())
    }

    fn load(path: &Path) -> Result<Self> {
        Ok(serde_json::from_reader(BufReader::new(File::open(path)?))?)
    }
}

/// The fitted vectorizer with the three encoded splits.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedData {
    /// Vectorizer fitted on the training rows.
    pub vectorizer: FeatureVectorizer,
    /// Training set.
    pub train: Dataset,
    /// Validation set.
    pub validation: Dataset,
    /// Test set.
    pub test: Dataset,
}

const TRAIN_FILE: &str = "train.json";
const VALIDATION_FILE: &str = "val.json";
const TEST_FILE: &str = "test.json";

impl PreparedData {
    /// Write every part into `dir`.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        self.vectorizer.save(dir.join(VECTORIZER_FILE))?;
        self.train.save(&dir.join(TRAIN_FILE))?;
        self.validation.save(&dir.join(VALIDATION_FILE))?;
        self.test.save(&dir.join(TEST_FILE))?;
        info!(dir = %dir.display(), "saved prepared datasets");
        Ok(())
    }

    /// Read every part from `dir`.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        Ok(Self {
            vectorizer: FeatureVectorizer::load(dir.join(VECTORIZER_FILE))?,
            train: Dataset::load(&dir.join(TRAIN_FILE))?,
            validation: Dataset::load(&dir.join(VALIDATION_FILE))?,
            test: Dataset::load(&dir.join(TEST_FILE))?,
        })
    }
}

/// Split a labelled table by date, fit the vectorizer on the training rows
/// and encode all three splits.
pub fn prepare(table: &FeatureTable, config: &SplitConfig) -> Result<PreparedData> {
    let split = split_by_date(table, config)?;
    if split.train.is_empty() {
        return Err(ModelError::EmptyDataset("training split".to_string()));
    }
    let vectorizer = FeatureVectorizer::fit(split.train.rows());
    Ok(PreparedData {
        train: Dataset::encode(&vectorizer, split.train.rows())?,
        validation: Dataset::encode(&vectorizer, split.validation.rows())?,
        test: Dataset::encode(&vectorizer, split.test.rows())?,
        vectorizer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn table(n_dates: u32, per_date: usize) -> FeatureTable {
        let mut rows = Vec::new();
        for m in 0..n_dates {
            let date = NaiveDate::from_ymd_opt(2020 + (m / 12) as i32, m % 12 + 1, 1).unwrap();
            for t in 0..per_date {
                rows.push(FeatureRow {
                    date,
                    ticker: format!("T{t}"),
                    alpha: 0.0,
                    beta: 1.0,
                    month_index: m,
                    index_avg: 0.0,
                    historical_vol: 0.01,
                    eom_10yr: 4.0,
                    avg_10yr: 4.0,
                    spread: 0.1,
                    vix_avg: 15.0,
                    sector: if t % 2 == 0 { "Energy" } else { "Technology" }.to_string(),
                    future_1m_return: Some(0.25 * t as f64),
                });
            }
        }
        FeatureTable::new(rows)
    }

    #[rstest]
    #[case(10, 7, 1, 2)]
    #[case(20, 14, 3, 3)]
    #[case(3, 2, 0, 1)]
    fn test_split_sizes(
        #[case] n: u32,
        #[case] train: usize,
        #[case] val: usize,
        #[case] test: usize,
    ) {
        let split = split_by_date(&table(n, 2), &SplitConfig::default()).unwrap();
        assert_eq!(split.train.dates().len(), train);
        assert_eq!(split.validation.dates().len(), val);
        assert_eq!(split.test.dates().len(), test);
    }

    #[test]
    fn test_split_is_chronological() {
        let split = split_by_date(&table(20, 3), &SplitConfig::default()).unwrap();
        let last_train = *split.train.dates().last().unwrap();
        let first_val = *split.validation.dates().first().unwrap();
        let first_test = *split.test.dates().first().unwrap();
        assert!(last_train < first_val);
        assert!(*split.validation.dates().last().unwrap() < first_test);
    }

    #[test]
    fn test_invalid_fractions_rejected() {
        let config = SplitConfig {
            train_fraction: 0.9,
            validation_fraction: 0.2,
        };
        assert!(matches!(
            split_by_date(&table(5, 1), &config),
            Err(ModelError::InvalidParams { name: "validation_fraction", .. })
        ));
    }

    #[test]
    fn test_prepare_and_round_trip() {
        let data = prepare(&table(20, 4), &SplitConfig::default()).unwrap();
        assert_eq!(data.train.len(), 14 * 4);
        assert_eq!(data.train.features.ncols(), data.vectorizer.n_features());

        let dir = std::env::temp_dir().join("hobart_prepared_round_trip");
        data.save(&dir).unwrap();
        let loaded = PreparedData::load(&dir).unwrap();
        std::fs::remove_dir_all(&dir).ok();
        assert_eq!(loaded, data);
    }

    #[test]
    fn test_unlabelled_rows_rejected() {
        let mut rows = table(10, 1).into_rows();
        rows[0].future_1m_return = None;
        let result = prepare(&FeatureTable::new(rows), &SplitConfig::default());
        assert!(matches!(result, Err(ModelError::MissingLabel { .. })));
    }
}

//! Dictionary-style vectorizer from feature rows to a dense matrix.
//!
//! Numerical fields map to one column each under their own name. The
//! categorical `sector` field is one-hot encoded as `sector=<value>`. Column
//! names are sorted lexicographically, so `10yr_avg` comes first. A sector
//! unseen at fit time encodes as all zeros.

use crate::error::Result;
use hobart_features::FeatureRow;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Numerical fields fed to the model.
pub const NUMERICAL: [&str; 9] = [
    "month_index",
    "index_avg",
    "alpha",
    "beta",
    "historical_vol",
    "eom_10yr",
    "10yr_avg",
    "spread",
    "vix_avg",
];

/// Categorical field fed to the model.
pub const CATEGORICAL: &str = "sector";

/// Model-facing name/value pairs of one row.
fn encode(row: &FeatureRow) -> [(String, f64); 10] {
    [
        ("month_index".to_string(), f64::from(row.month_index)),
        ("index_avg".to_string(), row.index_avg),
        ("alpha".to_string(), row.alpha),
        ("beta".to_string(), row.beta),
        ("historical_vol".to_string(), row.historical_vol),
        ("eom_10yr".to_string(), row.eom_10yr),
        ("10yr_avg".to_string(), row.avg_10yr),
        ("spread".to_string(), row.spread),
        ("vix_avg".to_string(), row.vix_avg),
        (format!("{CATEGORICAL}={}", row.sector), 1.0),
    ]
}

/// Fitted mapping from feature names to matrix columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureVectorizer {
    feature_names: Vec<String>,
    vocabulary: BTreeMap<String, usize>,
}

impl FeatureVectorizer {
    /// Learn the column set from `rows`.
    pub fn fit(rows: &[FeatureRow]) -> Self {
        let names: BTreeSet<String> = NUMERICAL
            .iter()
            .map(|n| n.to_string())
            .chain(rows.iter().map(|r| format!("{CATEGORICAL}={}", r.sector)))
            .collect();
        let feature_names: Vec<String> = names.into_iter().collect();
        let vocabulary = feature_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            feature_names,
            vocabulary,
        }
    }

    /// Encode `rows` as a `rows × features` matrix.
    pub fn transform(&self, rows: &[FeatureRow]) -> Array2<f64> {
        let mut matrix = Array2::zeros((rows.len(), self.feature_names.len()));
        for (i, row) in rows.iter().enumerate() {
            for (name, value) in encode(row) {
                if let Some(&j) = self.vocabulary.get(&name) {
                    matrix[[i, j]] = value;
                }
            }
        }
        matrix
    }

    /// Fit on `rows` and encode them.
    pub fn fit_transform(rows: &[FeatureRow]) -> (Self, Array2<f64>) {
        let vectorizer = Self::fit(rows);
        let matrix = vectorizer.transform(rows);
        (vectorizer, matrix)
    }

    /// Column names in matrix order.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Number of columns.
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Write as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        serde_json::to_writer(BufWriter::new(File::create(path)?), self)?;
        Ok(())
    }

    /// Read from JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(serde_json::from_reader(BufReader::new(File::open(path)?))?)
    }
}

//! Loading models through the fallback chain, scoring and backfill.

use approx::assert_abs_diff_eq;
use chrono::NaiveDate;
use hobart_features::{FeatureRow, FeatureTable};
use hobart_model::{
    BoosterParams, ExperimentTracker, FeatureVectorizer, FileRegistry, FileTracker,
    GradientBoostedTrees, MODEL_FILE, ModelRegistry, RunStatus, Stage, VECTORIZER_FILE,
};
use hobart_predict::{
    BackfillTable, LoaderConfig, LocalSource, ModelLoader, PredictError, RegistrySource,
    RunArtifactSource, backfill, predict,
};
use ndarray::Array1;
use rstest::rstest;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

fn table() -> FeatureTable {
    let mut rows = Vec::new();
    for m in 0..6u32 {
        let date = NaiveDate::from_ymd_opt(2024, m + 1, 1).unwrap();
        for (t, sector) in ["Energy", "Technology", "Utilities", "Energy"].iter().enumerate() {
            let alpha = 0.001 * t as f64 - 0.001;
            rows.push(FeatureRow {
                date,
                ticker: format!("T{t}"),
                alpha,
                beta: 1.0 + 0.1 * t as f64,
                month_index: m,
                index_avg: 0.0004,
                historical_vol: 0.015,
                eom_10yr: 4.2,
                avg_10yr: 4.1,
                spread: -0.4,
                vix_avg: 16.0 + m as f64,
                sector: sector.to_string(),
                future_1m_return: Some(3.0 * alpha),
            });
        }
    }
    FeatureTable::new(rows)
}

fn root(name: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!("hobart_predict_{name}"));
    std::fs::remove_dir_all(&root).ok();
    root
}

/// Fit a small model and write it into `dir`.
fn write_model(dir: &Path) {
    let rows = table();
    let (vectorizer, x) = FeatureVectorizer::fit_transform(rows.rows());
    let y: Array1<f64> = rows.rows().iter().filter_map(|r| r.future_1m_return).collect();
    let params = BoosterParams {
        n_estimators: 20,
        ..Default::default()
    };
    let model = GradientBoostedTrees::fit(params, x.view(), y.view()).unwrap();
    std::fs::create_dir_all(dir).unwrap();
    model.save(dir.join(MODEL_FILE)).unwrap();
    vectorizer.save(dir.join(VECTORIZER_FILE)).unwrap();
}

#[test]
fn test_local_source_version_is_test() {
    let root = root("local");
    write_model(&root);
    let model = ModelLoader::new().with_source(LocalSource::new(&root)).load().unwrap();
    assert_eq!(model.version, "test");

    let rows = table();
    let predictions = predict(&model, rows.rows()).unwrap();
    assert_eq!(predictions.len(), rows.len());
    assert!(predictions.iter().all(|p| p.model_version == "test"));
    assert_eq!(predictions[0].ticker, rows.rows()[0].ticker);
    std::fs::remove_dir_all(root).ok();
}

#[test]
fn test_registry_preferred_over_local() {
    let root = root("registry");
    let tracker = FileTracker::new(&root);
    let run = tracker.start_run("exp", BTreeMap::new()).unwrap();
    let source = tracker.artifact_dir(&run).unwrap().join("model");
    write_model(&source);
    tracker.end_run(&run, RunStatus::Finished).unwrap();

    let registry = FileRegistry::new(&root);
    let version = registry.register("booster-best-models", &run, &source).unwrap();
    registry
        .transition(&version.name, version.version, Stage::Production, true)
        .unwrap();

    let config = LoaderConfig {
        local_dir: root.join("missing"),
        ..Default::default()
    };
    let model = ModelLoader::from_config(&config, &root).load().unwrap();
    assert_eq!(model.version, run.to_string());
    std::fs::remove_dir_all(root).ok();
}

#[test]
fn test_falls_back_to_run_then_local() {
    let root = root("fallback");
    let tracker = FileTracker::new(&root);
    let run = tracker.start_run("exp", BTreeMap::new()).unwrap();
    write_model(&tracker.artifact_dir(&run).unwrap().join("model"));

    let loader = ModelLoader::new()
        .with_source(RegistrySource::new(FileRegistry::new(&root), "absent", Stage::Production))
        .with_source(RunArtifactSource::new(FileTracker::new(&root), run.clone()))
        .with_source(LocalSource::new(root.join("missing")));
    assert_eq!(loader.load().unwrap().version, run.to_string());

    let local = root.join("local");
    write_model(&local);
    let loader = ModelLoader::new()
        .with_source(RunArtifactSource::new(FileTracker::new(&root), "no-such-run"))
        .with_source(LocalSource::new(&local));
    assert_eq!(loader.load().unwrap().version, "test");
    std::fs::remove_dir_all(root).ok();
}

#[rstest]
#[case(0)]
#[case(2)]
fn test_no_model_available_lists_attempts(#[case] sources: usize) {
    let root = root(&format!("none_{sources}"));
    let mut loader = ModelLoader::new();
    for i in 0..sources {
        loader = loader.with_source(LocalSource::new(root.join(format!("m{i}"))));
    }
    match loader.load() {
        Err(PredictError::NoModelAvailable { attempts }) => assert_eq!(attempts.len(), sources),
        other => panic!("expected NoModelAvailable, got {other:?}"),
    }
}

#[test]
fn test_backfill_parquet_round_trip() {
    let root = root("backfill");
    write_model(&root.join("model"));
    let model = ModelLoader::new()
        .with_source(LocalSource::new(root.join("model")))
        .load()
        .unwrap();

    let features = table();
    let scored = backfill(&model, &features).unwrap();
    assert_eq!(scored.len(), features.len());

    let path = root.join("output").join("backfill.parquet");
    scored.write_parquet(&path).unwrap();
    let loaded = BackfillTable::read_parquet(&path).unwrap();

    assert_eq!(loaded.rows(), scored.rows());
    assert_eq!(loaded.model_versions(), scored.model_versions());
    for (a, b) in loaded.predictions().iter().zip(scored.predictions()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-15);
    }
    assert!(loaded.rows().iter().all(|r| r.future_1m_return.is_some()));
    std::fs::remove_dir_all(root).ok();
}

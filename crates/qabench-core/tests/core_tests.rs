use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use qabench_core::config::{resolve_with_base, BenchConfig, EncoderKind, MAX_QUERIES};
use qabench_core::dataset::Dataset;
use qabench_core::Error;

#[test]
fn dataset_from_json_file_groups_rows() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("rows.json");
    let mut f = fs::File::create(&path).unwrap();
    write!(
        f,
        r#"[
            {{"question_id": "q1", "question": "Capital of France?", "answer": "Paris is the capital of France.", "label": 1}},
            {{"question_id": "q1", "question": "Capital of France?", "answer": "France is in Europe.", "label": 1}},
            {{"question_id": "q2", "question": "Boiling point?", "answer": "Water boils at 100C."}}
        ]"#
    )
    .unwrap();

    let ds = Dataset::from_json_file(&path, false).expect("dataset");
    assert_eq!(ds.corpus().len(), 3);
    assert_eq!(ds.queries().len(), 2, "rows sharing a question id collapse");
    assert_eq!(ds.queries()[0].answers().len(), 2);
    assert_eq!(ds.ground_truth().len(), 2);

    let (id, entry) = ds.ground_truth().find_by_question("Boiling point?").expect("lookup");
    assert_eq!(id, 1);
    assert!(entry.answers.contains(&2));
}

#[test]
fn dataset_from_json_file_rejects_malformed_rows() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("rows.json");
    fs::write(&path, r#"[{"question": "missing fields"}]"#).unwrap();
    let err = Dataset::from_json_file(&path, false).unwrap_err();
    assert!(matches!(err, Error::Json(_)));
}

#[test]
fn truncating_the_corpus_drops_unreachable_queries() {
    let ds = Dataset::aligned(
        vec!["a?".into(), "b?".into(), "c?".into()],
        vec!["A".into(), "B".into(), "C".into()],
    )
    .unwrap();
    let small = ds.truncate_corpus(2).unwrap();
    assert_eq!(small.corpus().len(), 2);
    assert_eq!(small.queries().len(), 2);
}

#[test]
fn config_defaults_without_files() {
    let tmp = TempDir::new().unwrap();
    let figment = BenchConfig::figment_from_files(tmp.path(), "test");
    let config = BenchConfig::extract(&figment).expect("config");
    assert_eq!(config, BenchConfig::default());
    assert_eq!(config.evaluation.k, 5);
    assert_eq!(config.bm25.k1, 1.5);
    assert_eq!(config.rerank.alpha, 0.7);
    assert_eq!(config.encoder.kind, EncoderKind::Hashing);
}

#[test]
fn config_env_file_overrides_base_file() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("qabench.toml"), "[evaluation]\nk = 3\nquery_limit = 100\n").unwrap();
    fs::write(tmp.path().join("qabench.test.toml"), "[evaluation]\nk = 7\n[rerank]\nalpha = 0.5\n").unwrap();

    let figment = BenchConfig::figment_from_files(tmp.path(), "test");
    let config = BenchConfig::extract(&figment).expect("config");
    assert_eq!(config.evaluation.k, 7);
    assert_eq!(config.rerank.alpha, 0.5);
    assert_eq!(config.rerank.similarity_floor, 0.7, "untouched keys keep defaults");
    assert_eq!(config.evaluation.effective_query_limit(), MAX_QUERIES);
}

#[test]
fn config_rejects_alpha_out_of_range() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("qabench.toml"), "[rerank]\nalpha = 1.5\n").unwrap();
    let figment = BenchConfig::figment_from_files(tmp.path(), "dev");
    assert!(BenchConfig::extract(&figment).is_err());
}

#[test]
fn report_path_expands_environment_variables() {
    std::env::set_var("QB_REPORT_ROOT", "/tmp/qabench-out");
    let mut config = BenchConfig::default();
    config.output.dir = "${QB_REPORT_ROOT}/runs".to_string();
    config.output.report_name = "nq".to_string();
    assert_eq!(config.report_path(Path::new("/elsewhere")), PathBuf::from("/tmp/qabench-out/runs/nq.json"));
}

#[test]
fn relative_report_dir_resolves_against_the_config_dir() {
    let config = BenchConfig::default();
    assert_eq!(config.report_path(Path::new("/etc/qabench")), PathBuf::from("/etc/qabench/results/evaluation.json"));
    assert_eq!(resolve_with_base(Path::new("/base"), "/abs/out"), PathBuf::from("/abs/out"));
    assert_eq!(resolve_with_base(Path::new("/base"), "out"), PathBuf::from("/base/out"));
}

#[test]
fn environment_variables_override_config_files() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("qabench.toml"), "[evaluation]\nk = 3\n[rerank]\nalpha = 0.4\n").unwrap();
    std::env::set_var("QABENCH_EVALUATION__K", "9");
    std::env::set_var("QABENCH_RERANK__SIMILARITY_FLOOR", "0.5");
    let loaded = BenchConfig::load_from(tmp.path(), "test");
    std::env::remove_var("QABENCH_EVALUATION__K");
    std::env::remove_var("QABENCH_RERANK__SIMILARITY_FLOOR");

    let config = loaded.expect("config");
    assert_eq!(config.evaluation.k, 9, "env beats qabench.toml");
    assert_eq!(config.rerank.similarity_floor, 0.5);
    assert_eq!(config.rerank.alpha, 0.4, "file values without an env override survive");
}

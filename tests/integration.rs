use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const DATASET: &str = "\
dataset_id,dataset_name,document_id,document_name,chunk_id,chunk_keyword,question,direct_answer,context,retrieved_chunks_1,retrieved_chunks_2,retrieved_chunks_3,retrieved_chunks_4,retrieved_chunks_5,augmented_answer
1,squad,10,Fruit Guide,A,Apple,What is an apple?,A fruit,\"Apples are pomes, grown on trees.\",A,B,,,,An apple is a pome fruit.
1,squad,10,Fruit Guide,B,grape,Where do grapes grow?,On vines,Grapes grow on vines.,B,A,,,,Grapes grow on vines.
2,trivia,20,Citrus Notes,C,lemon,Why are lemons sour?,Citric acid,\"Lemons contain citric acid.
It is sour.\",C,,,,,Because of citric acid.
2,trivia,20,Citrus Notes,D,,What is a lime?,A citrus fruit,Limes are citrus.,D,C,,,,A lime is a citrus fruit.
";

fn curate_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("curate");
    path
}

fn setup_test_env() -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();
    let dataset_path = data_dir.join("dataset.csv");
    fs::write(&dataset_path, DATASET).unwrap();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_content = format!(
        r#"[dataset]
path = "{}"
categorical_columns = ["dataset_name", "document_name"]

[server]
bind = "127.0.0.1:0"
"#,
        dataset_path.display()
    );
    let config_path = config_dir.join("curator.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path, dataset_path)
}

fn run_curate(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = curate_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run curate binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_view_all_rows() {
    let (_tmp, config_path, _) = setup_test_env();

    let (stdout, stderr, success) = run_curate(&config_path, &["view"]);
    assert!(success, "view failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("4 of 4 rows"));
    assert!(stdout.contains("What is an apple?"));
}

#[test]
fn test_view_keyword_filter() {
    let (_tmp, config_path, _) = setup_test_env();

    let (stdout, stderr, success) = run_curate(&config_path, &["view", "--keyword", "AP"]);
    assert!(success, "view failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("2 of 4 rows"));
    assert!(stdout.contains("Apple"));
    assert!(stdout.contains("grape"));
    assert!(!stdout.contains("lemon"));
}

#[test]
fn test_view_categorical_filter() {
    let (_tmp, config_path, _) = setup_test_env();

    let (stdout, _, success) = run_curate(
        &config_path,
        &["view", "--filter", "dataset_name=trivia", "--columns", "chunk_id,question"],
    );
    assert!(success);
    assert!(stdout.contains("2 of 4 rows"));
    assert!(stdout.contains("Why are lemons sour?"));
    assert!(!stdout.contains("apple"));
}

#[test]
fn test_view_unknown_filter_column_fails() {
    let (_tmp, config_path, _) = setup_test_env();

    let (_, stderr, success) = run_curate(&config_path, &["view", "--filter", "colour=red"]);
    assert!(!success);
    assert!(stderr.contains("invalid field: colour"));
}

#[test]
fn test_view_no_matches() {
    let (_tmp, config_path, _) = setup_test_env();

    let (stdout, _, success) = run_curate(&config_path, &["view", "--keyword", "durian"]);
    assert!(success);
    assert!(stdout.contains("No rows."));
}

#[test]
fn test_facets() {
    let (_tmp, config_path, _) = setup_test_env();

    let (stdout, stderr, success) = run_curate(&config_path, &["facets"]);
    assert!(success, "facets failed: {}", stderr);
    assert!(stdout.contains("dataset_name (2)"));
    assert!(stdout.contains("  Citrus Notes"));
}

#[test]
fn test_edit_persists_only_the_edited_field() {
    let (_tmp, config_path, dataset_path) = setup_test_env();

    let (stdout, stderr, success) =
        run_curate(&config_path, &["edit", "B", "Where are grapes grown?"]);
    assert!(success, "edit failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("question before: Where do grapes grow?"));
    assert!(stdout.contains("Dataset saved"));

    let saved = fs::read_to_string(&dataset_path).unwrap();
    let expected = DATASET.replace("Where do grapes grow?", "Where are grapes grown?");
    assert_eq!(saved, expected);
}

#[test]
fn test_edit_other_field() {
    let (_tmp, config_path, dataset_path) = setup_test_env();

    let (_, stderr, success) = run_curate(
        &config_path,
        &["edit", "D", "--field", "chunk_keyword", "lime"],
    );
    assert!(success, "edit failed: {}", stderr);

    let (stdout, _, _) = run_curate(&config_path, &["view", "--keyword", "lime"]);
    assert!(stdout.contains("1 of 4 rows"));
    assert!(fs::read_to_string(&dataset_path)
        .unwrap()
        .contains("D,lime,What is a lime?"));
}

#[test]
fn test_edit_unknown_key_fails_without_writing() {
    let (_tmp, config_path, dataset_path) = setup_test_env();

    let (_, stderr, success) = run_curate(&config_path, &["edit", "Z", "text"]);
    assert!(!success);
    assert!(stderr.contains("not found"));
    assert_eq!(fs::read_to_string(&dataset_path).unwrap(), DATASET);
}

#[test]
fn test_edit_unknown_field_fails() {
    let (_tmp, config_path, dataset_path) = setup_test_env();

    let (_, stderr, success) = run_curate(&config_path, &["edit", "A", "--field", "rating", "5"]);
    assert!(!success);
    assert!(stderr.contains("invalid field: rating"));
    assert_eq!(fs::read_to_string(&dataset_path).unwrap(), DATASET);
}

#[test]
fn test_improve_without_service_fails() {
    let (_tmp, config_path, dataset_path) = setup_test_env();

    let (_, stderr, success) = run_curate(&config_path, &["improve", "A", "--apply"]);
    assert!(!success);
    assert!(stderr.contains("no improvement service configured"));
    assert_eq!(fs::read_to_string(&dataset_path).unwrap(), DATASET);
}

#[test]
fn test_dataset_flag_skips_config() {
    let (tmp, _, dataset_path) = setup_test_env();
    let missing_config = tmp.path().join("nope.toml");

    let binary = curate_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(&missing_config)
        .arg("--dataset")
        .arg(&dataset_path)
        .arg("view")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("4 of 4 rows"));
}

#[test]
fn test_missing_dataset_reports_io_error() {
    let (tmp, _, _) = setup_test_env();

    let binary = curate_binary();
    let output = Command::new(&binary)
        .arg("--dataset")
        .arg(tmp.path().join("absent.csv"))
        .arg("view")
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("I/O error"));
}

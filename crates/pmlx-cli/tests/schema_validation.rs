use assert_cmd::cargo::cargo_bin_cmd;
use jsonschema::JSONSchema;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

fn load_schema() -> JSONSchema {
    let schema_path = repo_root().join("schemas").join("pmlx-result.schema.json");
    let schema_text = fs::read_to_string(schema_path).expect("read schema");
    let schema_json: Value = serde_json::from_str(&schema_text).expect("parse schema");
    JSONSchema::compile(&schema_json).expect("compile schema")
}

fn run_json(args: &[&str]) -> Value {
    let root = repo_root();
    let output = cargo_bin_cmd!("pmlx")
        .current_dir(&root)
        .args(args)
        .output()
        .expect("run pmlx");
    let stdout = String::from_utf8(output.stdout).expect("utf8 stdout");
    serde_json::from_str(&stdout).expect("parse json")
}

fn assert_valid(args: &[&str]) {
    let schema = load_schema();
    let actual = run_json(args);
    let result = schema.validate(&actual);
    assert!(result.is_ok(), "{args:?} does not match the schema");
}

#[test]
fn schema_typecheck() {
    assert_valid(&["typecheck", "tests/cases/ok.pml", "--format", "json"]);
}

#[test]
fn schema_analyze() {
    assert_valid(&["analyze", "tests/cases/ok.pml", "--format", "json"]);
}

#[test]
fn schema_analyze_parallel() {
    assert_valid(&[
        "analyze",
        "tests/cases/ok.pml",
        "--parallel",
        "2",
        "--format",
        "json",
    ]);
}

#[test]
fn schema_unsupported() {
    assert_valid(&["typecheck", "tests/cases/unsupported.pml", "--format", "json"]);
}

#[test]
fn schema_error() {
    assert_valid(&["analyze", "tests/cases/bad_type.pml", "--format", "json"]);
}

#[test]
fn schema_missing_input() {
    assert_valid(&["typecheck", "tests/cases/missing.pml", "--format", "json"]);
}

#[test]
fn schema_diagnostics() {
    assert_valid(&["typecheck", "tests/cases/unused_mtype.pml", "--format", "json"]);
}

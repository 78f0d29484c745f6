//! CLI smoke tests against the real binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn mirador() -> Command {
    Command::cargo_bin("mirador").unwrap()
}

#[test]
fn help_lists_the_fix_flags() {
    mirador()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--fix"))
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn clean_file_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("clean.py");
    fs::write(&file, "speed = distance_m / time_s\n").unwrap();

    mirador()
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("no findings"));
}

#[test]
fn critical_finding_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("leaky.py");
    fs::write(
        &file,
        "\
def train(X, y):
    scaler = StandardScaler()
    X_scaled = scaler.fit_transform(X)
    X_train, X_test = train_test_split(X_scaled)
",
    )
    .unwrap();

    mirador()
        .arg(&file)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("leakage"));
}

#[test]
fn json_format_emits_parseable_output() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("units.py");
    fs::write(&file, "total = distance_m + time_s\n").unwrap();

    let output = mirador()
        .arg("--format")
        .arg("json")
        .arg(&file)
        .output()
        .unwrap();
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value[0]["diagnostics"][0]["guard"], "unit");
}

#[test]
fn dry_run_fix_leaves_the_file_alone() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("mirage.py");
    let source = "\
data = np.ones(5)
m = np.mean(data)
";
    fs::write(&file, source).unwrap();

    mirador()
        .arg("--dry-run")
        .arg(&file)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("VariationTensor"));

    assert_eq!(fs::read_to_string(&file).unwrap(), source);
}

#[test]
fn fix_rewrites_the_file_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("mirage.py");
    fs::write(&file, "data = np.ones(5)\nm = np.mean(data)\n").unwrap();

    mirador().arg("--fix").arg(&file).assert().code(1);

    let fixed = fs::read_to_string(&file).unwrap();
    assert!(fixed.contains("VariationTensor(data).collapse('mean')"));
}

#[test]
fn guard_filter_restricts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("mixed.py");
    fs::write(
        &file,
        "\
total = distance_m + time_s
avg = np.mean(np.ones(5))
",
    )
    .unwrap();

    mirador()
        .arg("--guards")
        .arg("unit")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("unit"))
        .stdout(predicate::str::contains("mirage").not());
}

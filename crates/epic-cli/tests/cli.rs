use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use std::{error::Error, fs, path::PathBuf};
use tempfile::tempdir;

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .to_path_buf()
}

fn synth_file(dir: &std::path::Path) -> PathBuf {
    let out = dir.join("synthetic.json");
    cargo_bin_cmd!("epic")
        .args(["synth", "--out", out.to_str().expect("utf8 path")])
        .assert()
        .success();
    out
}

#[test]
fn synth_then_leaves_lists_nine_leaves() -> Result<(), Box<dyn Error>> {
    let temp = tempdir()?;
    let input = synth_file(temp.path());
    let records: Value = serde_json::from_str(&fs::read_to_string(&input)?)?;
    assert_eq!(records.as_array().map(Vec::len), Some(108));

    let output = cargo_bin_cmd!("epic")
        .args([
            "leaves",
            "--input",
            input.to_str().expect("utf8 path"),
            "--split-by",
            "cellInfo.type,blockInfo.protocol_name",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let leaves: Vec<Value> = String::from_utf8(output)?
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    assert_eq!(leaves.len(), 9);
    assert!(leaves.iter().all(|leaf| leaf["epoch_count"] == 12));
    assert_eq!(leaves[0]["path"], serde_json::json!(["OnP", "Contrast"]));
    Ok(())
}

#[test]
fn info_reports_node_on_path() -> Result<(), Box<dyn Error>> {
    let temp = tempdir()?;
    let input = synth_file(temp.path());
    let output = cargo_bin_cmd!("epic")
        .args([
            "info",
            "--input",
            input.to_str().expect("utf8 path"),
            "--split-by",
            "cellInfo.type,blockInfo.protocol_name",
            "--path",
            "OffP",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let info: Value = serde_json::from_slice(&output)?;
    assert_eq!(info["split_key"], "cellInfo.type");
    assert_eq!(info["split_value"], "OffP");
    assert_eq!(info["epoch_count"], 36);
    assert_eq!(info["child_count"], 3);
    assert_eq!(info["is_leaf"], false);
    Ok(())
}

#[test]
fn extract_writes_selected_rows() -> Result<(), Box<dyn Error>> {
    let temp = tempdir()?;
    let input = synth_file(temp.path());
    let out = temp.path().join("selected.csv");
    // epochs 0 and 9 both fall under OnP / Contrast
    let output = cargo_bin_cmd!("epic")
        .args([
            "extract",
            "--input",
            input.to_str().expect("utf8 path"),
            "--split-by",
            "cellInfo.type,blockInfo.protocol_name",
            "--path",
            "OnP",
            "--path",
            "Contrast",
            "--deselect",
            "0,9",
            "--out",
            out.to_str().expect("utf8 path"),
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let summary: Value = serde_json::from_slice(&output)?;
    assert_eq!(summary["rows"], 10);
    assert_eq!(summary["fs"], 10000.0);
    let csv = fs::read_to_string(&out)?;
    assert_eq!(csv.lines().count(), 10);
    assert!(csv.lines().all(|line| line.split(',').count() == 101));
    Ok(())
}

#[test]
fn outline_of_bundled_export_uses_config() -> Result<(), Box<dyn Error>> {
    let root = workspace_root();
    let output = cargo_bin_cmd!("epic")
        .args([
            "outline",
            "--input",
            root.join("test_data/sample_export.json").to_str().expect("utf8 path"),
            "--config",
            root.join("test_data/view.toml").to_str().expect("utf8 path"),
            "--expand-cell-types",
            "--depth",
            "1",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "[x] All epochs (6/6)");
    assert!(lines.iter().any(|l| l.contains("RGC\\ON-parasol")));
    assert!(lines.iter().any(|l| l.contains("rod-bipolar")));
    Ok(())
}

#[test]
fn unknown_path_fails() -> Result<(), Box<dyn Error>> {
    let temp = tempdir()?;
    let input = synth_file(temp.path());
    cargo_bin_cmd!("epic")
        .args([
            "info",
            "--input",
            input.to_str().expect("utf8 path"),
            "--split-by",
            "cellInfo.type",
            "--path",
            "OffM",
        ])
        .assert()
        .failure();
    Ok(())
}

#[test]
fn strict_missing_policy_rejects_unresolved_keys() -> Result<(), Box<dyn Error>> {
    let temp = tempdir()?;
    let input = synth_file(temp.path());
    cargo_bin_cmd!("epic")
        .args([
            "info",
            "--input",
            input.to_str().expect("utf8 path"),
            "--split-by",
            "cellInfo.missing",
            "--missing",
            "fail",
        ])
        .assert()
        .failure();
    Ok(())
}

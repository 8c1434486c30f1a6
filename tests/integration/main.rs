//! Integration tests for Monosplit
//!
//! These tests drive the binary and the library crates together over fact
//! bundles written to a temporary directory.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use monosplit_core::{Pipeline, PipelineConfig, RefineOp, Stage};
use tempfile::TempDir;

const SHOP_BUNDLE: &str = r#"{
  "modules": [
    {
      "moduleId": "shop.models",
      "definedEntities": [
        { "kind": "Model", "name": "Order", "relations": ["Cart"] },
        { "kind": "Model", "name": "Cart" },
        { "kind": "Model", "name": "Coupon" }
      ]
    },
    {
      "moduleId": "shop.views",
      "definedEntities": [
        { "kind": "View", "name": "OrderView" },
        { "kind": "View", "name": "CartView" }
      ],
      "importedNames": [
        { "name": "Order", "usageCount": 3 },
        { "name": "Cart", "usageCount": 2 },
        { "name": "Coupon", "usageCount": 1 }
      ]
    },
    {
      "moduleId": "billing.models",
      "definedEntities": [
        { "kind": "Model", "name": "Invoice", "relations": ["Payment", "Order"] },
        { "kind": "Model", "name": "Payment" }
      ]
    },
    {
      "moduleId": "billing.views",
      "definedEntities": [{ "kind": "View", "name": "InvoiceView" }],
      "importedNames": [
        { "name": "Invoice", "usageCount": 2 },
        { "name": "Payment", "usageCount": 1 }
      ]
    }
  ],
  "observations": [
    { "viewId": "OrderView", "moduleId": "shop.views", "tableId": "Order", "accessType": "Read", "occurrenceCount": 40 },
    { "viewId": "CartView", "moduleId": "shop.views", "tableId": "Cart", "accessType": "Write", "occurrenceCount": 20 },
    { "viewId": "InvoiceView", "moduleId": "billing.views", "tableId": "Invoice", "accessType": "Write", "occurrenceCount": 20 },
    { "viewId": "InvoiceView", "moduleId": "billing.views", "tableId": "Payment", "accessType": "Write", "occurrenceCount": 10 },
    { "viewId": "InvoiceView", "moduleId": "billing.views", "tableId": "Order", "accessType": "Read", "occurrenceCount": 1 }
  ],
  "routes": [
    { "routeName": "invoice-detail", "moduleId": "billing.api", "handlerId": "InvoiceView" }
  ]
}"#;

fn write_bundle(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("facts.json");
    std::fs::write(&path, SHOP_BUNDLE).unwrap();
    path
}

fn monosplit(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_monosplit"))
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to execute monosplit")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

/// Test that the CLI can be invoked
#[test]
fn test_cli_invocation() {
    let dir = TempDir::new().unwrap();
    let output = monosplit(dir.path(), &["--help"]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("monosplit"));
    assert!(stdout.contains("Propose microservice boundaries"));
}

#[test]
fn test_analyze_writes_report() {
    let dir = TempDir::new().unwrap();
    let bundle = write_bundle(&dir);
    let report_path = dir.path().join("report.json");

    let output = monosplit(
        dir.path(),
        &["analyze", bundle.to_str().unwrap(), "--output", report_path.to_str().unwrap()],
    );
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report["depth"], 2);
    assert_eq!(report["entries"].as_array().unwrap().len(), 2);

    let shop = &report["entries"][0];
    let read_crossing = shop["instructions"]
        .as_array()
        .unwrap()
        .iter()
        .find(|i| i["externalNode"] == "InvoiceView")
        .unwrap();
    assert_eq!(read_crossing["remediations"][0], "API Composition");
    assert!(shop["implicatedModules"].as_array().unwrap().iter().any(|m| m == "billing.api"));
}

#[test]
fn test_analyze_level_from_config_file() {
    let dir = TempDir::new().unwrap();
    let bundle = write_bundle(&dir);
    std::fs::write(dir.path().join("monosplit.toml"), "level = 3\n").unwrap();

    let report = stdout_json(&monosplit(dir.path(), &["analyze", bundle.to_str().unwrap()]));
    assert_eq!(report["depth"], 3);

    let overridden = stdout_json(&monosplit(dir.path(), &["analyze", bundle.to_str().unwrap(), "--level", "1"]));
    assert_eq!(overridden["depth"], 1);
    assert!(overridden["entries"][0]["instructions"].as_array().unwrap().is_empty());
}

#[test]
fn test_analyze_with_removed_node() {
    let dir = TempDir::new().unwrap();
    let bundle = write_bundle(&dir);

    let report = stdout_json(&monosplit(
        dir.path(),
        &["analyze", bundle.to_str().unwrap(), "--remove", "Coupon", "--remove", "Ghost"],
    ));
    let nodes: Vec<&str> = report["entries"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|e| e["nodes"].as_array().unwrap().iter().filter_map(|n| n.as_str()))
        .collect();
    assert_eq!(nodes.len(), 7);
    assert!(!nodes.contains(&"Coupon"));
}

#[test]
fn test_export_and_levels() {
    let dir = TempDir::new().unwrap();
    let bundle = write_bundle(&dir);

    let export = stdout_json(&monosplit(dir.path(), &["export", bundle.to_str().unwrap()]));
    assert_eq!(export["nodes"].as_array().unwrap().len(), 8);
    assert_eq!(export["edges"].as_array().unwrap().len(), 12);

    let levels = stdout_json(&monosplit(dir.path(), &["levels", bundle.to_str().unwrap(), "--max", "3"]));
    assert_eq!(levels["levels"].as_array().unwrap().len(), 3);
    assert_eq!(levels["exhausted"], false);
}

#[test]
fn test_missing_bundle_fails() {
    let dir = TempDir::new().unwrap();
    let output = monosplit(dir.path(), &["analyze", "absent.json"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("absent.json"));
}

/// The library crates compose without the binary.
#[test]
fn test_library_refinement_cycle() {
    let dir = TempDir::new().unwrap();
    let facts = monosplit_facts::load_bundle(&write_bundle(&dir)).unwrap();
    let (mut pipeline, first) = Pipeline::run(PipelineConfig::default(), &facts).unwrap();

    pipeline.refine(RefineOp::PruneIsolated).unwrap();
    assert_eq!(pipeline.stage(), Stage::Partition);
    pipeline.partition().unwrap();
    pipeline.analyze_cuts().unwrap();
    let second = pipeline.synthesize_report().unwrap();

    assert_eq!(first.entries, second.entries);
}

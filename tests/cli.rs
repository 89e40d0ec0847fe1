mod common;

use std::fs;

use assert_cmd::Command;
use common::{TestWorkspace, fixture_path};
use csv_refine::{history::History, io_utils};
use predicates::prelude::*;
use predicates::str::contains;

const RECIPE: &str = r#"
steps:
  - cluster: { column: country, method: fingerprint }
    accept: all
  - type: pseudonymize
    params:
      columns: [{ column: name, kind: fullName }]
      dropColumns: [email]
  - type: hashId
    params: { columns: [id], algorithm: simple }
  - type: sort
    params: { column: revenue, direction: desc }
"#;

fn csv_refine() -> Command {
    Command::cargo_bin("csv-refine").expect("binary exists")
}

#[test]
fn preview_renders_limited_rows() {
    csv_refine()
        .args(["preview", "-i"])
        .arg(fixture_path("customers.csv"))
        .args(["--rows", "2"])
        .assert()
        .success()
        .stdout(contains("Ada Lovelace"))
        .stdout(contains("Charles Babbage"))
        .stdout(contains("Grace Hopper").not());
}

#[test]
fn cluster_lists_proposals_without_writing() {
    csv_refine()
        .args(["cluster", "-i"])
        .arg(fixture_path("customers.csv"))
        .args(["-c", "country", "--method", "fingerprint"])
        .assert()
        .success()
        .stdout(contains("USA | U.S.A | usa"));
}

#[test]
fn cluster_apply_merges_into_first_value() {
    let workspace = TestWorkspace::new();
    let output = workspace.target("merged.csv");
    csv_refine()
        .args(["cluster", "-i"])
        .arg(fixture_path("colours.csv"))
        .args(["-c", "label", "--method", "levenshtein", "--threshold", "0.8", "--apply", "-o"])
        .arg(&output)
        .assert()
        .success();
    let table = io_utils::parse_table(&fs::read_to_string(&output).unwrap(), b',').unwrap();
    let labels = common::column_strings(&table, "label");
    assert_eq!(labels, vec!["color", "color", "flavor", "Colour", "flavor"]);
}

#[test]
fn transform_writes_table_mapping_and_history_then_replays() {
    let workspace = TestWorkspace::new();
    let recipe = workspace.write("recipe.yaml", RECIPE);
    let output = workspace.target("out.csv");
    let mapping = workspace.target("mapping.json");
    let history = workspace.target("history.json");

    csv_refine()
        .args(["transform", "-i"])
        .arg(fixture_path("customers.csv"))
        .arg("-r")
        .arg(&recipe)
        .arg("-o")
        .arg(&output)
        .arg("--mapping")
        .arg(&mapping)
        .arg("--history")
        .arg(&history)
        .assert()
        .success();

    let written = fs::read_to_string(&output).unwrap();
    let table = io_utils::parse_table(&written, b',').unwrap();
    assert_eq!(
        table.columns(),
        ["id", "name", "country", "city", "revenue", "active", "id_hash"]
    );
    assert_eq!(common::column_strings(&table, "id"), vec!["4", "3", "1", "6", "2", "5"]);
    assert_eq!(common::column_strings(&table, "id_hash")[2], "31");
    assert!(!written.contains("Ada Lovelace"));
    assert!(!written.contains("U.S.A"));

    let map: serde_json::Value = serde_json::from_str(&fs::read_to_string(&mapping).unwrap()).unwrap();
    assert_eq!(map["name"].as_object().unwrap().len(), 5);
    let saved = History::load(&history).unwrap();
    assert_eq!(saved.len(), 4);
    assert_eq!(saved.cursor(), Some(3));

    let replayed = workspace.target("replayed.csv");
    csv_refine()
        .args(["replay", "-i"])
        .arg(fixture_path("customers.csv"))
        .arg("--history")
        .arg(&history)
        .arg("-o")
        .arg(&replayed)
        .assert()
        .success();
    assert_eq!(fs::read_to_string(&replayed).unwrap(), written);

    csv_refine()
        .args(["replay", "-i"])
        .arg(fixture_path("customers.csv"))
        .arg("--history")
        .arg(&history)
        .args(["--cursor", "-1"])
        .assert()
        .success()
        .stdout(contains("Ada Lovelace"))
        .stdout(contains("U.S.A"));
}

#[test]
fn transform_reads_stdin_and_writes_stdout() {
    let workspace = TestWorkspace::new();
    let recipe = workspace.write(
        "recipe.json",
        r#"{"steps": [{"type": "sort", "params": {"column": "b", "direction": "desc"}}]}"#,
    );
    csv_refine()
        .args(["transform", "-i", "-", "-r"])
        .arg(&recipe)
        .write_stdin("a,b\n1,x\n2,y\n")
        .assert()
        .success()
        .stdout("a,b\n2,y\n1,x\n");
}

#[test]
fn output_extension_selects_tab_delimiter() {
    let workspace = TestWorkspace::new();
    let recipe = workspace.write("recipe.json", r#"{"steps": [{"type": "clean"}]}"#);
    let output = workspace.target("clean.tsv");
    csv_refine()
        .args(["transform", "-i"])
        .arg(fixture_path("customers.csv"))
        .arg("-r")
        .arg(&recipe)
        .arg("-o")
        .arg(&output)
        .assert()
        .success();
    let written = fs::read_to_string(&output).unwrap();
    assert!(written.starts_with("id\tname\temail\tcountry\tcity\trevenue\tactive\n"));
    assert_eq!(written.lines().count(), 6);
}

#[test]
fn unknown_column_in_recipe_fails_with_message() {
    let workspace = TestWorkspace::new();
    let recipe = workspace.write(
        "recipe.yaml",
        "steps:\n  - type: filter\n    params: { column: nation, value: x }\n",
    );
    csv_refine()
        .args(["transform", "-i"])
        .arg(fixture_path("customers.csv"))
        .arg("-r")
        .arg(&recipe)
        .assert()
        .failure()
        .stderr(contains("Column 'nation' not found"));
}

#[test]
fn replay_against_narrower_input_reports_stale_column() {
    let workspace = TestWorkspace::new();
    let recipe = workspace.write(
        "recipe.yaml",
        "steps:\n  - type: filter\n    params: { column: country, value: usa }\n",
    );
    let history = workspace.target("history.json");
    csv_refine()
        .args(["transform", "-i"])
        .arg(fixture_path("customers.csv"))
        .arg("-r")
        .arg(&recipe)
        .arg("--history")
        .arg(&history)
        .assert()
        .success();

    let narrower = workspace.write("narrow.csv", "id,name\n1,Ada\n");
    csv_refine()
        .args(["replay", "-i"])
        .arg(&narrower)
        .arg("--history")
        .arg(&history)
        .assert()
        .failure()
        .stderr(contains("references column 'country' which is no longer present"));
}

#[test]
fn replay_rejects_cursor_below_original() {
    let workspace = TestWorkspace::new();
    let history = workspace.write("history.json", r#"{"operations": [], "cursor": -1}"#);
    let output = workspace.target("out.csv");
    csv_refine()
        .args(["replay", "-i"])
        .arg(fixture_path("customers.csv"))
        .arg("--history")
        .arg(&history)
        .args(["--cursor", "-7", "-o"])
        .arg(&output)
        .assert()
        .failure()
        .stderr(contains("--cursor must be -1 or an operation index, got -7"));
    assert!(!output.exists());
}

#![allow(dead_code)]

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use rlsctl::harness::Scenario;
use rlsctl::policy::{policies_from_rows, PgPolicyRow, PolicySet};
use rlsctl::simulator::Row;

pub(crate) fn fixture_path(relative: &str) -> PathBuf {
    PathBuf::from("tests/fixtures").join(relative)
}

pub(crate) fn read_fixture(relative: &str) -> String {
    std::fs::read_to_string(fixture_path(relative))
        .unwrap_or_else(|e| panic!("fixture {relative} should be readable: {e}"))
}

pub(crate) fn load_pg_policies(fixture: &str) -> PolicySet {
    let rows: Vec<PgPolicyRow> =
        serde_json::from_str(&read_fixture(&format!("pg_policies/{fixture}.json")))
            .expect("fixture rows should parse");
    policies_from_rows(&rows).expect("fixture rows should convert to policies")
}

pub(crate) fn load_scenario(fixture: &str) -> Scenario {
    Scenario::from_path(&fixture_path(&format!("scenarios/{fixture}.json")))
        .expect("fixture scenario should load")
}

/// Build rows from a JSON array of objects.
pub(crate) fn rows(value: serde_json::Value) -> Vec<Row> {
    value
        .as_array()
        .expect("rows should be a JSON array")
        .iter()
        .map(|v| v.as_object().cloned().expect("each row should be an object"))
        .collect()
}

pub(crate) fn row(value: serde_json::Value) -> Row {
    value.as_object().cloned().expect("row should be an object")
}

pub(crate) fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after epoch")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("{prefix}_{nanos}"));
    std::fs::create_dir_all(&dir).expect("should create temp dir");
    dir
}

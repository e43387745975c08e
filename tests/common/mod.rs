#![allow(dead_code)]

use std::path::PathBuf;

use territoires::{ReferenceSnapshot, Resolver, TerritoiresConfig};

pub fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/reference.json")
}

pub fn snapshot() -> ReferenceSnapshot {
    ReferenceSnapshot::from_json_file(fixture_path()).expect("fixture snapshot parses")
}

pub fn resolver() -> Resolver {
    Resolver::from_snapshot(snapshot(), TerritoiresConfig::default()).expect("resolver builds")
}

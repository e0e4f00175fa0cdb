use std::path::Path;

use camp_core::errors::{CampError, ErrorInfo};
use camp_core::serde::{from_json_slice, to_canonical_json_bytes};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("token", "Log0")
        .with_hint("use a positive bound")
}

#[test]
fn criteria_error_surface() {
    let err = CampError::Criteria(sample_info("criteria.bound", "bound must be positive"));
    assert_eq!(err.code(), "criteria.bound");
    assert!(err.info().context.contains_key("token"));
    let rendered = err.to_string();
    assert!(rendered.starts_with("criteria error: bound must be positive"));
    assert!(rendered.contains("token=Log0"));
    assert!(rendered.contains("hint: use a positive bound"));
}

#[test]
fn io_helper_records_path() {
    let err = CampError::io("io.read", Path::new("/tmp/missing.json"), "not found");
    assert_eq!(err.code(), "io.read");
    assert_eq!(
        err.info().context.get("path").map(String::as_str),
        Some("/tmp/missing.json")
    );
}

#[test]
fn errors_roundtrip_through_json() {
    let err = CampError::Stage(sample_info("stage.missing_artifact", "missing batch.json"));
    let bytes = to_canonical_json_bytes(&err).expect("encode");
    let decoded: CampError = from_json_slice(&bytes).expect("decode");
    assert_eq!(err, decoded);
}

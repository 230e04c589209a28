//! Tests for backup source path validation

use std::path::Path;

use rstest::rstest;
use vault_fs::{Error, validate_source_path};

#[rstest]
#[case("/etc/mysql")]
#[case("/etc/nginx/")]
#[case("/opt/app/config")]
fn accepts_absolute_paths(#[case] path: &str) {
    assert!(validate_source_path(Path::new(path)).is_ok());
}

#[rstest]
#[case("etc/mysql", "absolute")]
#[case("/etc/../root", "..")]
#[case("/etc/nginx/..", "..")]
#[case("/", "root")]
fn rejects_unsafe_paths(#[case] path: &str, #[case] reason: &str) {
    let err = validate_source_path(Path::new(path)).unwrap_err();
    assert!(matches!(err, Error::InvalidPath { .. }));
    assert!(
        err.to_string().contains(reason),
        "expected '{}' in error, got: {}",
        reason,
        err
    );
}

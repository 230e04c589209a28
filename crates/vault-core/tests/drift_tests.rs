//! Drift detection against committed snapshots

mod common;

use std::time::{Duration, Instant};

use common::{FixtureBuilder, lines};
use pretty_assertions::assert_eq;
use rstest::rstest;
use vault_core::drift::{ChangeKind, FileChangeKind};
use vault_core::{BackupOptions, CycleKind, Error, Monitor, Severity};
use vault_test_utils::TestHost;

fn backed_up(host: TestHost, components: &[&str]) -> common::Fixture {
    let fx = FixtureBuilder::new(host).components(components).build();
    fx.vault.backup(BackupOptions::default()).unwrap();
    fx
}

/// First `n` of `total` numbered lines rewritten.
fn rewritten(total: usize, n: usize) -> String {
    (1..=total)
        .map(|i| {
            if i <= n {
                format!("tuned {i}\n")
            } else {
                format!("option {i}\n")
            }
        })
        .collect()
}

#[test]
fn identical_content_reports_no_drift() {
    let fx = backed_up(
        TestHost::new()
            .with_file("mysql/my.cnf", &lines("option", 30))
            .with_file("nginx/nginx.conf", "worker_processes 1;\n"),
        &["mysql", "nginx"],
    );

    let report = fx.vault.drift_check("latest").unwrap();

    assert!(!report.has_drift());
    assert!(report.entries.is_empty());
    assert_eq!(report.overall_severity, Severity::None);
}

#[test]
fn excluded_files_never_count_as_drift() {
    let fx = backed_up(
        TestHost::new().with_file("mysql/my.cnf", "[mysqld]\n"),
        &["mysql"],
    );
    fx.host.write_file("mysql/mysqld.pid", "999\n");

    let report = fx.vault.drift_check("latest").unwrap();
    assert!(!report.has_drift());
}

#[rstest]
#[case::large_database_edit("mysql", "my.cnf", 25, Severity::Critical)]
#[case::medium_database_edit("mysql", "my.cnf", 8, Severity::Major)]
#[case::small_database_edit("mysql", "my.cnf", 3, Severity::Minor)]
#[case::small_web_edit("nginx", "nginx.conf", 3, Severity::Minor)]
#[case::medium_web_edit("nginx", "nginx.conf", 8, Severity::Minor)]
fn edits_are_graded_by_size_and_area(
    #[case] component: &str,
    #[case] file: &str,
    #[case] edited: usize,
    #[case] expected: Severity,
) {
    let relative = format!("{component}/{file}");
    let fx = backed_up(
        TestHost::new().with_file(&relative, &lines("option", 30)),
        &[component],
    );
    fx.host.write_file(&relative, &rewritten(30, edited));

    let report = fx.vault.drift_check("latest").unwrap();

    assert_eq!(report.entries.len(), 1);
    let entry = &report.entries[0];
    assert_eq!(entry.kind, ChangeKind::Modified);
    assert_eq!(entry.lines_changed, edited);
    assert_eq!(entry.severity, expected);
    assert_eq!(report.overall_severity, expected);
    assert_eq!(entry.files.len(), 1);
    assert_eq!(entry.files[0].kind, FileChangeKind::Modified);
}

#[test]
fn added_and_removed_files_count_their_lines() {
    let fx = backed_up(
        TestHost::new()
            .with_file("nginx/nginx.conf", "worker_processes 1;\n")
            .with_file("nginx/old.conf", &lines("old", 4)),
        &["nginx"],
    );
    fx.host.remove_file("nginx/old.conf");
    fx.host.write_file("nginx/new.conf", &lines("new", 2));

    let report = fx.vault.drift_check("latest").unwrap();

    let entry = &report.entries[0];
    assert_eq!(entry.lines_changed, 6);
    let kinds: Vec<_> = entry.files.iter().map(|f| f.kind).collect();
    assert_eq!(kinds, vec![FileChangeKind::Added, FileChangeKind::Removed]);
}

#[test]
fn directory_absent_from_reference_is_new_and_major() {
    let fx = backed_up(
        TestHost::new().with_file("nginx/nginx.conf", "worker_processes 1;\n"),
        &["nginx", "redis"],
    );
    fx.host.write_file("redis/redis.conf", "port 6379\n");

    let report = fx.vault.drift_check("latest").unwrap();

    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.entries[0].kind, ChangeKind::New);
    assert_eq!(report.entries[0].severity, Severity::Major);
    assert!(report.entries[0].path.ends_with("redis"));
}

#[test]
fn overall_severity_is_the_worst_entry() {
    let fx = backed_up(
        TestHost::new()
            .with_file("mysql/my.cnf", &lines("option", 30))
            .with_file("nginx/nginx.conf", &lines("option", 30)),
        &["mysql", "nginx"],
    );
    fx.host.write_file("mysql/my.cnf", &rewritten(30, 8));
    fx.host.write_file("nginx/nginx.conf", &rewritten(30, 2));

    let report = fx.vault.drift_check("latest").unwrap();

    assert_eq!(report.entries.len(), 2);
    assert_eq!(report.overall_severity, Severity::Major);
}

#[test]
fn older_reference_is_compared_by_id() {
    let fx = backed_up(
        TestHost::new().with_file("nginx/nginx.conf", "worker_processes 1;\n"),
        &["nginx"],
    );
    let first = fx.vault.store().head().unwrap().unwrap();
    fx.host.write_file("nginx/nginx.conf", "worker_processes 2;\n");
    fx.vault.backup(BackupOptions::default()).unwrap();

    assert!(!fx.vault.drift_check("latest").unwrap().has_drift());
    let against_first = fx.vault.drift_check(&first).unwrap();
    assert!(against_first.has_drift());
    assert_eq!(against_first.reference_commit, first);
}

#[test]
fn unknown_reference_is_reported() {
    let fx = backed_up(
        TestHost::new().with_file("nginx/nginx.conf", "worker_processes 1;\n"),
        &["nginx"],
    );

    let err = fx.vault.drift_check("0123456789abcdef").unwrap_err();
    assert!(
        matches!(err, Error::ReferenceNotFound { ref reference } if reference == "0123456789abcdef"),
        "got {err:?}"
    );
}

#[test]
fn drift_is_notified_with_mapped_severity() {
    let fx = FixtureBuilder::new(TestHost::new().with_file("mysql/my.cnf", &lines("option", 30)))
        .components(&["mysql"])
        .webhook(1)
        .build();
    fx.vault.backup(BackupOptions::default()).unwrap();
    fx.host.write_file("mysql/my.cnf", &rewritten(30, 25));

    fx.vault.drift_check("latest").unwrap();

    let payloads = fx.transport.payloads();
    let drift = payloads
        .iter()
        .find(|p| p["event"] == "drift_detected")
        .expect("drift event");
    assert_eq!(drift["severity"], "critical");
    assert_eq!(drift["data"]["overall_severity"], "critical");
    assert_eq!(drift["data"]["changes"][0]["lines_changed"], 25);
}

#[test]
fn continuous_drift_checks_run_one_after_another() {
    let fx = FixtureBuilder::new(
        TestHost::new().with_file("nginx/nginx.conf", "worker_processes 1;\n"),
    )
    .components(&["nginx"])
    .webhook(1)
    .build();
    fx.vault.backup(BackupOptions::default()).unwrap();
    fx.host.write_file("nginx/nginx.conf", "worker_processes 16;\n");

    let interval = Duration::from_millis(30);
    let started = Instant::now();
    let summary = Monitor::new(&fx.vault, CycleKind::DriftCheck, interval)
        .with_max_cycles(3)
        .run();

    assert_eq!(summary.cycles, 3);
    assert_eq!(summary.failures, 0);
    assert_eq!(summary.changed_cycles, 3);
    // Each wait starts only once the previous cycle has finished
    assert!(started.elapsed() >= interval * 2);
    assert_eq!(
        fx.transport.events(),
        vec!["backup_success", "drift_detected", "drift_detected", "drift_detected"]
    );
}

//! Pre-flight validation against fake host probes

mod common;

use std::sync::Arc;

use common::FakeProbe;
use pretty_assertions::assert_eq;
use vault_core::validation::IssueKind;
use vault_core::{Settings, ValidationGate, ValidationReport};
use vault_test_utils::TestHost;

fn run(host: &TestHost, components: &[&str], extra: &str, probe: FakeProbe) -> ValidationReport {
    let mut text = host.config_text(components);
    text.push_str(extra);
    let settings = Settings::from_toml(&text).unwrap();
    ValidationGate::new(&settings, Arc::new(probe)).run()
}

fn kinds(report: &ValidationReport) -> Vec<IssueKind> {
    report.issues.iter().map(|i| i.kind).collect()
}

#[test]
fn healthy_host_is_clean() {
    let host = TestHost::new().with_file("nginx/nginx.conf", "worker_processes 1;\n");
    let report = run(&host, &["nginx"], "", FakeProbe::default());

    assert!(report.is_clean(), "{:?}", report.issues);
    assert!(!report.backup_blocked);
}

#[test]
fn full_disk_blocks() {
    let host = TestHost::new().with_file("nginx/nginx.conf", "worker_processes 1;\n");
    let report = run(&host, &["nginx"], "", FakeProbe::default().with_disk_usage(95));

    assert!(report.backup_blocked);
    assert_eq!(kinds(&report), vec![IssueKind::DiskSpace]);
    assert!(report.summary().contains("95%"));
}

#[test]
fn disk_at_the_limit_is_allowed() {
    let host = TestHost::new().with_file("nginx/nginx.conf", "worker_processes 1;\n");
    let report = run(&host, &["nginx"], "", FakeProbe::default().with_disk_usage(90));
    assert!(!report.backup_blocked);
}

#[test]
fn missing_execution_identity_blocks() {
    let host = TestHost::new().with_file("nginx/nginx.conf", "worker_processes 1;\n");
    let mut text = host.config_text(&["nginx"]);
    text = text.replace("auto_push = false", "auto_push = false\ngit_user = \"confvault\"");
    let settings = Settings::from_toml(&text).unwrap();

    let missing = ValidationGate::new(&settings, Arc::new(FakeProbe::default())).run();
    assert!(missing.backup_blocked);
    assert_eq!(kinds(&missing), vec![IssueKind::MissingIdentity]);

    let present =
        ValidationGate::new(&settings, Arc::new(FakeProbe::default().with_user("confvault"))).run();
    assert!(!present.backup_blocked);
}

#[test]
fn missing_path_is_advisory() {
    let host = TestHost::new();
    let report = run(&host, &["redis"], "", FakeProbe::default());

    assert!(!report.backup_blocked);
    assert_eq!(kinds(&report), vec![IssueKind::MissingPath]);
}

#[test]
fn database_typo_and_deprecated_options_are_advisory() {
    let host = TestHost::new().with_file(
        "mysql/my.cnf",
        "[mysqld]\n# max_connection = 1 in a comment is fine\nmax_connection = 500\nquery_cache_type = 1\n",
    );
    let report = run(&host, &["mysql"], "", FakeProbe::default());

    assert!(!report.backup_blocked);
    assert_eq!(
        kinds(&report),
        vec![IssueKind::MalformedDirective, IssueKind::DeprecatedOption]
    );
    let typo = &report.issues[0];
    assert!(typo.message.starts_with("Line 3:"), "{}", typo.message);
    assert_eq!(typo.suggestion.as_deref(), Some("Did you mean 'max_connections'?"));
}

#[test]
fn excluded_files_are_not_scanned() {
    let host = TestHost::new()
        .with_file("mysql/my.cnf", "[mysqld]\n")
        .with_file("mysql/mysqld.pid", "query_cache_size = 0\n");
    let report = run(&host, &["mysql"], "", FakeProbe::default());
    assert!(report.is_clean(), "{:?}", report.issues);
}

#[test]
fn failing_syntax_checker_is_reported_not_blocking() {
    let host = TestHost::new().with_file("nginx/nginx.conf", "worker_processes 1\n");
    let probe = FakeProbe::default().with_tool(
        "nginx",
        false,
        "nginx: [emerg] invalid parameter in /etc/nginx/nginx.conf:1",
    );
    let report = run(&host, &["nginx"], "", probe);

    assert!(!report.backup_blocked);
    assert_eq!(kinds(&report), vec![IssueKind::SyntaxError]);
    assert!(report.issues[0].message.contains("[emerg]"));
}

#[test]
fn passing_syntax_checker_adds_nothing() {
    let host = TestHost::new().with_file("ssh/sshd_config", "Port 22\n");
    let probe = FakeProbe::default().with_tool("sshd", true, "");
    let report = run(&host, &["ssh"], "", probe);
    assert!(report.is_clean(), "{:?}", report.issues);
}

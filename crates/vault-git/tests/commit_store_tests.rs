//! CommitStore integration tests against real repositories

use std::fs;
use std::path::Path;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use vault_git::{
    CommitIdentity, CommitOutcome, CommitStore, CurrentIdentity, Error, LogFilter, RemoteUrl,
};
use vault_test_utils::TEST_REMOTE_URL;
use vault_test_utils::git::{bare_remote, branch_tip, commit_count, is_dirty, redirect_remote};

struct Fixture {
    _temp: TempDir,
    store: CommitStore,
    bare: std::path::PathBuf,
}

fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    let bare = bare_remote(&temp.path().join("remote.git"));
    let store = CommitStore::new(
        temp.path().join("store"),
        "main",
        CommitIdentity {
            name: "confvault-test".into(),
            email: "confvault@test.invalid".into(),
        },
        Arc::new(CurrentIdentity),
    );
    store
        .init(&RemoteUrl::parse(TEST_REMOTE_URL).unwrap())
        .unwrap();
    redirect_remote(store.root(), TEST_REMOTE_URL, &bare);
    Fixture {
        _temp: temp,
        store,
        bare,
    }
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn commit_all(store: &CommitStore, message: &str) -> CommitOutcome {
    store.stage_all().unwrap();
    store.commit(message).unwrap()
}

// ============================================================================
// init / commit
// ============================================================================

#[test]
fn init_is_idempotent_and_sets_branch() {
    let fx = fixture();
    fx.store
        .init(&RemoteUrl::parse(TEST_REMOTE_URL).unwrap())
        .unwrap();

    assert!(fx.store.is_initialized());
    assert_eq!(fx.store.head().unwrap(), None);

    let repo = git2::Repository::open(fx.store.root()).unwrap();
    let head = repo.find_reference("HEAD").unwrap();
    assert_eq!(head.symbolic_target(), Some("refs/heads/main"));
    assert_eq!(
        repo.find_remote("origin").unwrap().url(),
        Some(TEST_REMOTE_URL)
    );
}

#[test]
fn commit_without_changes_is_noop() {
    let fx = fixture();
    write(fx.store.root(), "host/mysql/my.cnf", "[mysqld]\n");

    let first = commit_all(&fx.store, "first");
    assert!(matches!(first, CommitOutcome::Created(_)));

    let second = commit_all(&fx.store, "second");
    assert_eq!(second, CommitOutcome::NoOp);
    assert_eq!(commit_count(fx.store.root()), 1);
}

#[test]
fn empty_store_commit_is_noop() {
    let fx = fixture();
    assert_eq!(commit_all(&fx.store, "nothing"), CommitOutcome::NoOp);
    assert_eq!(fx.store.head().unwrap(), None);
}

#[test]
fn lock_file_is_never_committed() {
    let fx = fixture();
    write(fx.store.root(), ".confvault.lock", "1234\n");
    assert_eq!(commit_all(&fx.store, "lock only"), CommitOutcome::NoOp);
}

#[test]
fn deletions_are_committed() {
    let fx = fixture();
    write(fx.store.root(), "host/nginx/a.conf", "a\n");
    write(fx.store.root(), "host/nginx/b.conf", "b\n");
    commit_all(&fx.store, "two files");

    fs::remove_file(fx.store.root().join("host/nginx/b.conf")).unwrap();
    let outcome = commit_all(&fx.store, "drop b");

    let id = outcome.id().unwrap().to_string();
    let stat = fx.store.show(&id).unwrap();
    assert_eq!(stat.files_changed, 1);
    assert_eq!(stat.deletions, 1);
    assert_eq!(stat.files, vec!["host/nginx/b.conf".to_string()]);
    assert!(!is_dirty(fx.store.root()));
}

// ============================================================================
// push
// ============================================================================

#[test]
fn push_reaches_redirected_remote() {
    let fx = fixture();
    write(fx.store.root(), "host/redis/redis.conf", "port 6379\n");
    let id = commit_all(&fx.store, "redis").id().unwrap().to_string();

    fx.store.push(None).unwrap();
    assert_eq!(branch_tip(&fx.bare, "main"), Some(id));
}

#[test]
fn push_to_unreachable_remote_fails() {
    let fx = fixture();
    fs::remove_dir_all(&fx.bare).unwrap();
    write(fx.store.root(), "host/redis/redis.conf", "port 6379\n");
    commit_all(&fx.store, "redis");

    let err = fx.store.push(None).unwrap_err();
    assert!(matches!(err, Error::PushFailed { .. }), "got {err:?}");
}

#[test]
fn unpushed_commits_are_tracked_until_a_push_succeeds() {
    let fx = fixture();
    assert!(!fx.store.has_unpushed().unwrap(), "empty store has nothing to push");

    write(fx.store.root(), "host/redis/redis.conf", "port 6379\n");
    commit_all(&fx.store, "redis");
    assert!(fx.store.has_unpushed().unwrap());

    fx.store.push(None).unwrap();
    assert!(!fx.store.has_unpushed().unwrap());

    write(fx.store.root(), "host/redis/redis.conf", "port 6380\n");
    commit_all(&fx.store, "redis port");
    assert!(fx.store.has_unpushed().unwrap());
}

// ============================================================================
// log / show / rev-parse
// ============================================================================

#[test]
fn log_is_most_recent_first_and_filters() {
    let fx = fixture();
    write(fx.store.root(), "h/a/1", "1\n");
    commit_all(&fx.store, "Config backup for alpha");
    write(fx.store.root(), "h/a/2", "2\n");
    commit_all(&fx.store, "manual tweak");
    write(fx.store.root(), "h/a/3", "3\n");
    commit_all(&fx.store, "Config backup for gamma");

    let all = fx.store.log(&LogFilter::default()).unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].message, "Config backup for gamma");
    assert_eq!(all[0].short_id.len(), 7);
    assert_eq!(all[0].author, "confvault-test");

    let limited = fx.store.log(&LogFilter::limit(2)).unwrap();
    assert_eq!(limited.len(), 2);

    let grep = LogFilter {
        grep: Some("CONFIG BACKUP".into()),
        ..LogFilter::default()
    };
    let matched = fx.store.log(&grep).unwrap();
    assert_eq!(matched.len(), 2);
    assert!(matched.iter().all(|c| c.message.starts_with("Config backup")));

    let future = LogFilter {
        since: Some(chrono::Utc::now() + chrono::Duration::days(1)),
        ..LogFilter::default()
    };
    assert!(fx.store.log(&future).unwrap().is_empty());
}

#[test]
fn log_of_empty_store_is_empty() {
    let fx = fixture();
    assert!(fx.store.log(&LogFilter::default()).unwrap().is_empty());
    assert!(fx.store.latest_commit().unwrap().is_none());
}

#[test]
fn rev_parse_sentinels_resolve_to_head() {
    let fx = fixture();
    write(fx.store.root(), "h/a/1", "1\n");
    let id = commit_all(&fx.store, "one").id().unwrap().to_string();

    for reference in ["latest", "HEAD", ""] {
        assert_eq!(fx.store.rev_parse(reference).unwrap(), id);
    }
    assert_eq!(fx.store.rev_parse(&id[..8]).unwrap(), id);
    assert_eq!(fx.store.latest_commit().unwrap().unwrap().id, id);
}

#[test]
fn rev_parse_unknown_ref_fails() {
    let fx = fixture();
    write(fx.store.root(), "h/a/1", "1\n");
    commit_all(&fx.store, "one");

    let err = fx.store.rev_parse("deadbeefdeadbeef").unwrap_err();
    assert!(matches!(err, Error::RefNotFound { .. }));
}

#[test]
fn operations_on_uninitialized_store_fail() {
    let temp = TempDir::new().unwrap();
    let store = CommitStore::new(
        temp.path().join("nowhere"),
        "main",
        CommitIdentity {
            name: "n".into(),
            email: "e@x".into(),
        },
        Arc::new(CurrentIdentity),
    );
    assert!(matches!(
        store.log(&LogFilter::default()),
        Err(Error::NotInitialized { .. })
    ));
    assert!(matches!(store.stage_all(), Err(Error::NotInitialized { .. })));
}

// ============================================================================
// checkout_subtree
// ============================================================================

#[test]
fn checkout_subtree_writes_only_destination() {
    let fx = fixture();
    write(fx.store.root(), "host/nginx/nginx.conf", "worker_processes 1;\n");
    write(fx.store.root(), "host/nginx/sites/default", "server {}\n");
    write(fx.store.root(), "host/mysql/my.cnf", "[mysqld]\n");
    let id = commit_all(&fx.store, "snap").id().unwrap().to_string();

    // Local edit must survive the checkout
    write(fx.store.root(), "host/nginx/nginx.conf", "edited\n");

    let dest = TempDir::new().unwrap();
    let written = fx
        .store
        .checkout_subtree(&id, "host", dest.path())
        .unwrap();

    assert_eq!(written, 3);
    assert_eq!(
        fs::read_to_string(dest.path().join("nginx/nginx.conf")).unwrap(),
        "worker_processes 1;\n"
    );
    assert!(dest.path().join("nginx/sites/default").is_file());
    assert_eq!(
        fs::read_to_string(fx.store.root().join("host/nginx/nginx.conf")).unwrap(),
        "edited\n"
    );
}

#[cfg(unix)]
#[test]
fn checkout_subtree_keeps_exec_bits_and_links() {
    use std::os::unix::fs::PermissionsExt;

    let fx = fixture();
    write(fx.store.root(), "host/app/run.sh", "#!/bin/sh\n");
    fs::set_permissions(
        fx.store.root().join("host/app/run.sh"),
        fs::Permissions::from_mode(0o755),
    )
    .unwrap();
    std::os::unix::fs::symlink("run.sh", fx.store.root().join("host/app/current")).unwrap();
    let id = commit_all(&fx.store, "app").id().unwrap().to_string();

    let dest = TempDir::new().unwrap();
    fx.store.checkout_subtree(&id, "host/app", dest.path()).unwrap();

    let mode = fs::metadata(dest.path().join("run.sh")).unwrap().permissions().mode();
    assert_eq!(mode & 0o111, 0o111);
    assert_eq!(
        fs::read_link(dest.path().join("current")).unwrap(),
        Path::new("run.sh")
    );
}

#[test]
fn missing_subtree_is_reported() {
    let fx = fixture();
    write(fx.store.root(), "host/nginx/nginx.conf", "x\n");
    let id = commit_all(&fx.store, "snap").id().unwrap().to_string();

    assert!(fx.store.tree_contains(&id, "host/nginx").unwrap());
    assert!(!fx.store.tree_contains(&id, "host/mysql").unwrap());
    assert!(!fx.store.tree_contains(&id, "host/nginx/nginx.conf").unwrap());

    let dest = TempDir::new().unwrap();
    let err = fx
        .store
        .checkout_subtree(&id, "other-host", dest.path())
        .unwrap_err();
    assert!(matches!(err, Error::SubtreeNotFound { .. }));
}

//! [`TestHost`] builder for confvault test scenarios.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::TEST_REMOTE_URL;
use crate::git::bare_remote;

/// A temporary "machine": live configuration directories under `live/`,
/// the snapshot store under `store/`, and a bare push target `remote.git`.
///
/// # Example
///
/// ```rust,no_run
/// use vault_test_utils::TestHost;
///
/// let host = TestHost::new()
///     .with_file("mysql/my.cnf", "[mysqld]\nport = 3306\n")
///     .with_file("nginx/nginx.conf", "worker_processes 1;\n");
/// let config = host.write_config(&["mysql", "nginx"]);
/// ```
pub struct TestHost {
    temp_dir: TempDir,
}

impl Default for TestHost {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHost {
    /// Create the directory skeleton and an empty bare remote.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap_or_else(|e| panic!("TestHost::new: {e}"));
        fs::create_dir_all(temp_dir.path().join("live"))
            .unwrap_or_else(|e| panic!("TestHost::new: failed to create live/: {e}"));
        bare_remote(&temp_dir.path().join("remote.git"));
        Self { temp_dir }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Directory holding live configuration trees.
    pub fn live(&self) -> PathBuf {
        self.root().join("live")
    }

    /// Absolute live path of component `name`.
    pub fn live_path(&self, name: &str) -> PathBuf {
        self.live().join(name)
    }

    pub fn store(&self) -> PathBuf {
        self.root().join("store")
    }

    pub fn remote(&self) -> PathBuf {
        self.root().join("remote.git")
    }

    /// Write `content` to `live/<relative>`, creating parents.
    pub fn with_file(self, relative: &str, content: &str) -> Self {
        self.write_file(relative, content);
        self
    }

    /// Create an empty directory `live/<relative>`.
    pub fn with_dir(self, relative: &str) -> Self {
        let dir = self.live().join(relative);
        fs::create_dir_all(&dir)
            .unwrap_or_else(|e| panic!("TestHost::with_dir: {}: {e}", dir.display()));
        self
    }

    pub fn write_file(&self, relative: &str, content: &str) {
        let path = self.live().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .unwrap_or_else(|e| panic!("TestHost::write_file: {}: {e}", parent.display()));
        }
        fs::write(&path, content)
            .unwrap_or_else(|e| panic!("TestHost::write_file: {}: {e}", path.display()));
    }

    pub fn read_file(&self, relative: &str) -> String {
        let path = self.live().join(relative);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("TestHost::read_file: {}: {e}", path.display()))
    }

    pub fn remove_file(&self, relative: &str) {
        let path = self.live().join(relative);
        fs::remove_file(&path)
            .unwrap_or_else(|e| panic!("TestHost::remove_file: {}: {e}", path.display()));
    }

    /// TOML configuration text backing up `components` from `live/`.
    ///
    /// Pushing is disabled; enable it with [`TestHost::config_text_with_push`].
    pub fn config_text(&self, components: &[&str]) -> String {
        self.render_config(components, false)
    }

    pub fn config_text_with_push(&self, components: &[&str]) -> String {
        self.render_config(components, true)
    }

    /// Write `config.toml` under the host root and return its path.
    pub fn write_config(&self, components: &[&str]) -> PathBuf {
        let path = self.root().join("config.toml");
        fs::write(&path, self.config_text(components))
            .unwrap_or_else(|e| panic!("TestHost::write_config: {e}"));
        path
    }

    fn render_config(&self, components: &[&str], auto_push: bool) -> String {
        let mut out = format!(
            "[repository]\n\
             url = \"{url}\"\n\
             branch = \"main\"\n\
             path = \"{store}\"\n\
             author_name = \"confvault-test\"\n\
             author_email = \"confvault@test.invalid\"\n\
             auto_push = {auto_push}\n\n\
             [services]\n\
             grace_period_secs = 0\n",
            url = TEST_REMOTE_URL,
            store = self.store().display(),
        );
        for component in components {
            out.push_str(&format!(
                "\n[[backup_paths]]\npath = \"{}\"\nexclude = [\"*.pid\", \"*.sock\"]\n",
                self.live_path(component).display()
            ));
        }
        out
    }
}

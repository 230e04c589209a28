//! Fakes and fixtures shared by vault-core integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use vault_core::restore::Prompter;
use vault_core::services::HealthProbe;
use vault_core::validation::CheckerOutput;
use vault_core::{
    Error, HostIdentity, HostProbe, Result, ServiceManager, Settings, Vault, VaultDeps,
    WebhookTransport,
};
use vault_git::CurrentIdentity;
use vault_test_utils::git::redirect_remote;
use vault_test_utils::{TEST_REMOTE_URL, TestHost};

pub const HOSTNAME: &str = "web01";

// ============================================================================
// Prompter
// ============================================================================

/// Replays canned answers; panics when asked more than it was given.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    choices: Mutex<VecDeque<usize>>,
    confirms: Mutex<VecDeque<bool>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_choose(self, index: usize) -> Self {
        self.choices.lock().unwrap().push_back(index);
        self
    }

    pub fn then_confirm(self, answer: bool) -> Self {
        self.confirms.lock().unwrap().push_back(answer);
        self
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

impl Prompter for ScriptedPrompter {
    fn choose(&self, prompt: &str, items: &[String]) -> Result<usize> {
        self.asked
            .lock()
            .unwrap()
            .push(format!("{prompt}: {}", items.join("|")));
        Ok(self
            .choices
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected choice prompt: {prompt}")))
    }

    fn confirm(&self, prompt: &str) -> Result<bool> {
        self.asked.lock().unwrap().push(prompt.to_string());
        Ok(self
            .confirms
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected confirm prompt: {prompt}")))
    }
}

// ============================================================================
// HostProbe
// ============================================================================

#[derive(Debug)]
pub struct FakeProbe {
    pub disk_usage: u8,
    pub users: HashSet<String>,
    /// tool name -> checker verdict
    pub tools: HashMap<String, CheckerOutput>,
}

impl Default for FakeProbe {
    fn default() -> Self {
        Self {
            disk_usage: 40,
            users: HashSet::new(),
            tools: HashMap::new(),
        }
    }
}

impl FakeProbe {
    pub fn with_disk_usage(mut self, percent: u8) -> Self {
        self.disk_usage = percent;
        self
    }

    pub fn with_user(mut self, user: &str) -> Self {
        self.users.insert(user.to_string());
        self
    }

    pub fn with_tool(mut self, name: &str, success: bool, output: &str) -> Self {
        self.tools.insert(
            name.to_string(),
            CheckerOutput {
                success,
                output: output.to_string(),
            },
        );
        self
    }
}

impl HostProbe for FakeProbe {
    fn disk_usage_percent(&self, _path: &Path) -> Result<u8> {
        Ok(self.disk_usage)
    }

    fn user_exists(&self, user: &str) -> bool {
        self.users.contains(user)
    }

    fn find_tool(&self, name: &str) -> Option<PathBuf> {
        self.tools
            .contains_key(name)
            .then(|| PathBuf::from("/usr/sbin").join(name))
    }

    fn run_checker(&self, program: &Path, _args: &[&str]) -> Result<CheckerOutput> {
        let name = program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.tools.get(&name).cloned().ok_or_else(|| Error::Probe {
            command: name,
            message: "not installed".into(),
        })
    }
}

// ============================================================================
// ServiceManager
// ============================================================================

#[derive(Debug, Default)]
pub struct FakeServiceManager {
    installed: HashSet<String>,
    unhealthy: HashSet<String>,
    reload_fails: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeServiceManager {
    pub fn with_units(units: &[&str]) -> Self {
        Self {
            installed: units.iter().map(|u| u.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn unhealthy(mut self, unit: &str) -> Self {
        self.unhealthy.insert(unit.to_string());
        self
    }

    pub fn failing_reload(mut self, unit: &str) -> Self {
        self.reload_fails.insert(unit.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl ServiceManager for FakeServiceManager {
    fn is_installed(&self, unit: &str) -> bool {
        self.installed.contains(unit)
    }

    fn restart(&self, unit: &str) -> Result<()> {
        self.calls.lock().unwrap().push(format!("restart {unit}"));
        Ok(())
    }

    fn reload(&self, unit: &str) -> Result<()> {
        self.calls.lock().unwrap().push(format!("reload {unit}"));
        if self.reload_fails.contains(unit) {
            return Err(Error::Probe {
                command: format!("systemctl reload {unit}"),
                message: "reload not supported".into(),
            });
        }
        Ok(())
    }

    fn probe(&self, unit: &str, _probe: HealthProbe) -> bool {
        !self.unhealthy.contains(unit)
    }
}

// ============================================================================
// WebhookTransport
// ============================================================================

/// Records every POST and answers with a fixed status, or a transport error
/// when `status` is `None`.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    status: Option<u16>,
    posts: AtomicUsize,
    bodies: Mutex<Vec<String>>,
}

impl RecordingTransport {
    pub fn answering(status: u16) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn unreachable() -> Self {
        Self::default()
    }

    pub fn posts(&self) -> usize {
        self.posts.load(Ordering::SeqCst)
    }

    /// Parsed payloads, oldest first.
    pub fn payloads(&self) -> Vec<serde_json::Value> {
        self.bodies
            .lock()
            .unwrap()
            .iter()
            .map(|b| serde_json::from_str(b).unwrap())
            .collect()
    }

    pub fn events(&self) -> Vec<String> {
        self.payloads()
            .iter()
            .map(|p| p["event"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

impl WebhookTransport for RecordingTransport {
    fn post(&self, _url: &str, body: &str) -> Result<u16> {
        self.posts.fetch_add(1, Ordering::SeqCst);
        self.bodies.lock().unwrap().push(body.to_string());
        self.status.ok_or_else(|| Error::Notification {
            message: "connection refused".into(),
        })
    }
}

// ============================================================================
// Fixture
// ============================================================================

pub struct Fixture {
    pub host: TestHost,
    pub vault: Vault,
    pub services: Arc<FakeServiceManager>,
    pub transport: Arc<RecordingTransport>,
}

pub struct FixtureBuilder {
    host: TestHost,
    components: Vec<String>,
    extra_toml: String,
    auto_push: bool,
    probe: FakeProbe,
    services: FakeServiceManager,
    transport: RecordingTransport,
}

impl FixtureBuilder {
    pub fn new(host: TestHost) -> Self {
        Self {
            host,
            components: Vec::new(),
            extra_toml: String::new(),
            auto_push: false,
            probe: FakeProbe::default(),
            services: FakeServiceManager::default(),
            transport: RecordingTransport::answering(200),
        }
    }

    pub fn components(mut self, components: &[&str]) -> Self {
        self.components = components.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn auto_push(mut self) -> Self {
        self.auto_push = true;
        self
    }

    /// Append raw TOML sections such as `[webhook]`.
    pub fn toml(mut self, extra: &str) -> Self {
        self.extra_toml.push_str(extra);
        self
    }

    /// Enable the webhook with no retry delay.
    pub fn webhook(self, retry_count: u32) -> Self {
        self.toml(&format!(
            "\n[webhook]\nenabled = true\nurl = \"https://hooks.test.invalid/confvault\"\n\
             retry_count = {retry_count}\nretry_delay_secs = 0\n"
        ))
    }

    pub fn probe(mut self, probe: FakeProbe) -> Self {
        self.probe = probe;
        self
    }

    pub fn services(mut self, services: FakeServiceManager) -> Self {
        self.services = services;
        self
    }

    pub fn transport(mut self, transport: RecordingTransport) -> Self {
        self.transport = transport;
        self
    }

    pub fn build(self) -> Fixture {
        let components: Vec<&str> = self.components.iter().map(String::as_str).collect();
        let mut text = if self.auto_push {
            self.host.config_text_with_push(&components)
        } else {
            self.host.config_text(&components)
        };
        text.push_str(&self.extra_toml);
        let settings = Settings::from_toml(&text).unwrap();

        let services = Arc::new(self.services);
        let transport = Arc::new(self.transport);
        let deps = VaultDeps {
            executor: Arc::new(CurrentIdentity),
            probe: Arc::new(self.probe),
            services: services.clone(),
            transport: transport.clone(),
        };
        let identity = HostIdentity::bind(HOSTNAME).unwrap();
        let vault = Vault::new(settings, identity, deps);

        vault.init_store().unwrap();
        redirect_remote(&self.host.store(), TEST_REMOTE_URL, &self.host.remote());

        Fixture {
            host: self.host,
            vault,
            services,
            transport,
        }
    }
}

impl Fixture {
    /// Path of a component's snapshot inside the store.
    pub fn stored(&self, component: &str) -> PathBuf {
        self.host.store().join(HOSTNAME).join(component)
    }
}

/// Numbered lines `prefix 1` .. `prefix n`, newline-terminated.
pub fn lines(prefix: &str, n: usize) -> String {
    (1..=n).map(|i| format!("{prefix} {i}\n")).collect()
}

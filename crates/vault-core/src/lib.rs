//! Core orchestration layer for confvault
//!
//! This crate composes the Layer 0 crates into the operations the CLI
//! exposes:
//!
//! - **SnapshotEngine**: mirror live directories into the store, one commit per run
//! - **DriftDetector**: compare live state with a historical snapshot and grade it
//! - **RestoreOrchestrator**: replay a snapshot onto the live filesystem with safety copies
//! - **ValidationGate**: pre-flight checks that can block a backup
//! - **ServiceReconciler**: restart or reload services behind changed configuration
//! - **NotificationDispatcher**: webhook events with bounded retry
//!
//! # Architecture
//!
//! ```text
//!                  confvault (CLI)
//!                        |
//!                   vault-core
//!                        |
//!              +---------+---------+
//!              |                   |
//!          vault-fs            vault-git
//! ```
//!
//! Host capabilities (git execution identity, disk and tool probes, the
//! service manager, the webhook transport) are injected through
//! [`VaultDeps`] so every component can run against fakes.

pub mod config;
pub mod drift;
pub mod error;
pub mod monitor;
pub mod notify;
pub mod restore;
pub mod services;
pub mod snapshot;
pub mod validation;
pub mod vault;

pub use config::{BackupPath, HostIdentity, Settings};
pub use drift::{DriftDetector, DriftReport, Severity};
pub use error::{Error, Result};
pub use monitor::{CycleKind, Monitor, MonitorSummary};
pub use notify::{DispatchOutcome, EventType, NotificationDispatcher, WebhookTransport};
pub use restore::{Prompter, RestoreOrchestrator, RestoreOutcome, RestoreRequest, RestoreState};
pub use services::{ReconcileReport, ServiceManager, ServiceReconciler};
pub use snapshot::{BackupOutcome, SnapshotEngine};
pub use validation::{HostProbe, ValidationGate, ValidationReport};
pub use vault::{BackupOptions, BackupRun, Vault, VaultDeps};

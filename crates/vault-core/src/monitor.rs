//! Polling monitor
//!
//! Runs a backup or drift-check cycle, waits, and repeats. Cycles never
//! overlap and a failing cycle does not stop the loop.

use std::time::{Duration, Instant};

use crate::Vault;
use crate::vault::BackupOptions;

/// Work done on each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    /// Snapshot all configured paths
    Backup(BackupOptions),
    /// Compare live state with a reference commit
    DriftCheck,
}

/// Counters accumulated over a monitor run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorSummary {
    pub cycles: u64,
    pub failures: u64,
    /// Cycles that found drift, or produced a commit for backups
    pub changed_cycles: u64,
}

#[derive(Debug)]
pub struct Monitor<'a> {
    vault: &'a Vault,
    kind: CycleKind,
    reference: String,
    interval: Duration,
    max_cycles: Option<u64>,
}

impl<'a> Monitor<'a> {
    pub fn new(vault: &'a Vault, kind: CycleKind, interval: Duration) -> Self {
        Self {
            vault,
            kind,
            reference: vault_git::LATEST_REF.to_string(),
            interval,
            max_cycles: None,
        }
    }

    /// Reference commit for drift cycles; `latest` by default.
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    /// Stop after `cycles` cycles instead of running forever.
    pub fn with_max_cycles(mut self, cycles: u64) -> Self {
        self.max_cycles = Some(cycles);
        self
    }

    pub fn run(&self) -> MonitorSummary {
        let mut summary = MonitorSummary::default();
        tracing::info!(
            kind = ?self.kind,
            interval_secs = self.interval.as_secs(),
            max_cycles = ?self.max_cycles,
            "Monitor started"
        );

        loop {
            let started = Instant::now();
            summary.cycles += 1;

            match self.cycle() {
                Ok(changed) => {
                    if changed {
                        summary.changed_cycles += 1;
                    }
                    tracing::info!(
                        cycle = summary.cycles,
                        changed,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Monitor cycle complete"
                    );
                }
                Err(e) => {
                    summary.failures += 1;
                    tracing::error!(cycle = summary.cycles, error = %e, "Monitor cycle failed");
                }
            }

            if self.max_cycles.is_some_and(|max| summary.cycles >= max) {
                break;
            }
            if !self.interval.is_zero() {
                std::thread::sleep(self.interval);
            }
        }

        tracing::info!(
            cycles = summary.cycles,
            failures = summary.failures,
            changed = summary.changed_cycles,
            "Monitor stopped"
        );
        summary
    }

    fn cycle(&self) -> crate::Result<bool> {
        match self.kind {
            CycleKind::Backup(options) => {
                let run = self.vault.backup(options)?;
                Ok(run.outcome.commit.is_some())
            }
            CycleKind::DriftCheck => {
                let report = self.vault.drift_check(&self.reference)?;
                Ok(report.has_drift())
            }
        }
    }
}

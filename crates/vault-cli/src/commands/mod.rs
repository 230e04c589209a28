//! Command implementations
//!
//! Each `run_*` function returns the process exit code; errors bubble up to
//! `main`, which prints them and exits with status 1.

mod backup;
mod drift;
mod history;
mod host;
mod report;
mod restore;
mod validate;
mod webhook;

pub use backup::{run_backup, run_monitor};
pub use drift::run_drift_check;
pub use history::{run_list, run_show};
pub use host::{run_init, run_rebind_host};
pub use restore::run_restore;
pub use validate::{run_restart_services, run_validate};
pub use webhook::run_setup_webhook;

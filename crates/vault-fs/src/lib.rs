//! Filesystem primitives for confvault
//!
//! Provides the pieces the snapshot and restore engines are built from:
//! delete-sync mirroring with exclusion, exclude-pattern sanitization,
//! advisory store locking, atomic writes and content checksums.

pub mod checksum;
pub mod config;
pub mod error;
pub mod exclude;
pub mod io;
pub mod lock;
pub mod mirror;
pub mod path;

pub use config::ConfigStore;
pub use error::{Error, Result};
pub use exclude::{ExcludeSet, sanitize_pattern};
pub use lock::StoreLock;
pub use mirror::{Mirror, MirrorStats};
pub use path::{timestamped_sibling, validate_path_identifier, validate_source_path};

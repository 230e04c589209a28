//! Path validation for backup sources and store components

use std::path::{Component, Path, PathBuf};

use crate::{Error, Result};

/// Validate a configured backup source path.
///
/// The path must be absolute, must not be the filesystem root and must not
/// contain `..` segments.
pub fn validate_source_path(path: &Path) -> Result<()> {
    if !path.is_absolute() {
        return Err(Error::invalid_path(path, "path must be absolute"));
    }

    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(Error::invalid_path(path, "path must not contain '..'"));
    }

    if path.file_name().is_none() {
        return Err(Error::invalid_path(path, "path must name a directory, not the root"));
    }

    Ok(())
}

/// Validate a string used as a single directory name inside the store
/// (host names, component names).
///
/// Rejects empty values, path separators, `.`/`..` and NUL bytes.
pub fn validate_path_identifier(value: &str, what: &str) -> std::result::Result<(), String> {
    if value.is_empty() {
        return Err(format!("{what} must not be empty"));
    }
    if value == "." || value == ".." {
        return Err(format!("{what} '{value}' is not a valid directory name"));
    }
    if value.contains(['/', '\\', '\0']) {
        return Err(format!("{what} '{value}' must not contain path separators"));
    }
    Ok(())
}

/// Sibling of `path` named `<name>.<label>_<stamp>`, e.g.
/// `/etc/nginx.backup_20240101_120000`.
pub fn timestamped_sibling(path: &Path, label: &str, stamp: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{label}_{stamp}"));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sibling_keeps_parent_directory() {
        let sibling = timestamped_sibling(Path::new("/etc/nginx"), "backup", "20240101_120000");
        assert_eq!(sibling, PathBuf::from("/etc/nginx.backup_20240101_120000"));
    }

    #[test]
    fn identifier_rejects_separators() {
        assert!(validate_path_identifier("web/01", "Hostname").is_err());
        assert!(validate_path_identifier("web01", "Hostname").is_ok());
    }
}

//! Path expansion and small text-file helpers used by providers.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Expands a leading `~` or `~/` to the user's home directory.
pub fn expand_path(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

pub fn file_exists(path: &str) -> bool {
    expand_path(path).exists()
}

pub fn read_text(path: &str) -> Result<String> {
    let expanded = expand_path(path);
    std::fs::read_to_string(&expanded).with_context(|| format!("read {}", expanded.display()))
}

/// Writes `content` to `path`, creating parent directories. Credential
/// material lands here, so the file is restricted to the owner.
pub fn write_text(path: &str, content: &str) -> Result<()> {
    let expanded = expand_path(path);
    if let Some(parent) = expanded.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    std::fs::write(&expanded, content).with_context(|| format!("write {}", expanded.display()))?;
    restrict_permissions(&expanded)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .with_context(|| format!("chmod {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

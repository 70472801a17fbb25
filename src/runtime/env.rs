//! Per-query execution environment for providers.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("plugin id is required")]
    MissingPluginId,
    #[error("create plugin data dir {}: {source}", path.display())]
    CreateDataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What a provider gets for one query: its id, the shared data root, a
/// private persistent subdirectory, and a labeled diagnostic span.
#[derive(Debug, Clone)]
pub struct PluginEnv {
    pub plugin_id: String,
    pub data_dir: PathBuf,
    pub plugin_data_dir: PathBuf,
    pub span: tracing::Span,
}

/// Data root fallback: user config dir, then home, then relative default.
pub fn default_data_dir() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("usage-agent");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".usage-agent");
    }
    PathBuf::from(".usage-agent")
}

impl PluginEnv {
    /// Creates the environment for one provider query. The private data
    /// directory is ensured on every call; that is idempotent and cheap.
    pub fn new(plugin_id: &str, data_dir: Option<&Path>) -> Result<Self, EnvError> {
        if plugin_id.is_empty() {
            return Err(EnvError::MissingPluginId);
        }

        let data_dir = data_dir.map(Path::to_path_buf).unwrap_or_else(default_data_dir);
        let plugin_data_dir = data_dir.join("plugins_data").join(plugin_id);
        std::fs::create_dir_all(&plugin_data_dir).map_err(|source| EnvError::CreateDataDir {
            path: plugin_data_dir.clone(),
            source,
        })?;

        let span = tracing::info_span!("plugin", id = %plugin_id);

        Ok(Self {
            plugin_id: plugin_id.to_string(),
            data_dir,
            plugin_data_dir,
            span,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_plugin_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = PluginEnv::new("", Some(dir.path())).unwrap_err();
        assert!(matches!(err, EnvError::MissingPluginId));
    }

    #[test]
    fn creates_private_data_dir_idempotently() {
        let dir = tempfile::tempdir().unwrap();

        let env = PluginEnv::new("mock", Some(dir.path())).unwrap();
        assert_eq!(env.plugin_id, "mock");
        assert_eq!(env.data_dir, dir.path());
        assert_eq!(env.plugin_data_dir, dir.path().join("plugins_data").join("mock"));
        assert!(env.plugin_data_dir.is_dir());

        // Second creation over the existing directory succeeds.
        let again = PluginEnv::new("mock", Some(dir.path())).unwrap();
        assert_eq!(again.plugin_data_dir, env.plugin_data_dir);
    }

    #[test]
    fn default_data_dir_is_never_empty() {
        let dir = default_data_dir();
        assert!(!dir.as_os_str().is_empty());
    }
}

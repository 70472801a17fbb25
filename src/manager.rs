//! Catalog orchestration: merges manifests with registered live providers
//! and normalizes every query into exactly one well-formed output record.

use crate::manifest::{self, LoadedManifest};
use crate::runtime::env::{EnvError, PluginEnv};
use crate::types::{error_lines, PluginOutput, QueryResult};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;

const UNAVAILABLE_MESSAGE: &str = "Plugin implementation unavailable";

/// A live provider implementation. Providers are registered once at
/// construction and never added or removed at runtime.
pub trait UsagePlugin: Send + Sync {
    fn id(&self) -> &str;
    fn query(&self, env: &PluginEnv) -> Result<QueryResult, QueryError>;
}

/// A provider failure: a human-readable message, plus whatever partial
/// result the provider managed to assemble before failing. The manager keeps
/// partial plans and lines instead of discarding them.
#[derive(Debug, Default)]
pub struct QueryError {
    message: String,
    partial: QueryResult,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            partial: QueryResult::default(),
        }
    }

    pub fn with_partial(mut self, partial: QueryResult) -> Self {
        self.partial = partial;
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn into_partial(self) -> QueryResult {
        self.partial
    }
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for QueryError {}

impl From<anyhow::Error> for QueryError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Hard failures. Everything else is folded into the output's error field.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("load manifests from {}: {source}", path.display())]
    LoadManifests {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("init env for {id}: {source}")]
    Environment {
        id: String,
        #[source]
        source: EnvError,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ManagerOptions {
    /// Manifest directory. When unset, a missing default directory is
    /// tolerated; when set explicitly, it must be readable.
    pub plugins_dir: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
}

pub struct Manager {
    plugins: HashMap<String, Box<dyn UsagePlugin>>,
    manifests: BTreeMap<String, LoadedManifest>,
    order: Vec<String>,
    data_dir: PathBuf,
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .field("manifests", &self.manifests)
            .field("order", &self.order)
            .field("data_dir", &self.data_dir)
            .finish()
    }
}

impl Manager {
    pub fn new(
        options: ManagerOptions,
        plugins: Vec<Box<dyn UsagePlugin>>,
    ) -> Result<Self, ManagerError> {
        let explicit = options.plugins_dir.is_some();
        let plugins_dir = options
            .plugins_dir
            .unwrap_or_else(|| Path::new("usage-agent").join("plugins"));
        let data_dir = options
            .data_dir
            .unwrap_or_else(crate::runtime::env::default_data_dir);

        let manifests = match manifest::load_manifests(&plugins_dir) {
            Ok(manifests) => manifests,
            // Manifests are optional when using defaults; providers are
            // compiled in.
            Err(err) if !explicit && err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => {
                return Err(ManagerError::LoadManifests {
                    path: plugins_dir,
                    source,
                })
            }
        };

        let plugins: HashMap<String, Box<dyn UsagePlugin>> = plugins
            .into_iter()
            .map(|plugin| (plugin.id().to_string(), plugin))
            .collect();

        let mut order: Vec<String> = manifests.keys().cloned().collect();
        let mut live_only: Vec<&String> = plugins
            .keys()
            .filter(|id| !manifests.contains_key(*id))
            .collect();
        live_only.sort();
        order.extend(live_only.into_iter().cloned());

        Ok(Self {
            plugins,
            manifests,
            order,
            data_dir,
        })
    }

    /// Catalog order: manifest ids (lexicographic), then live-only ids
    /// (lexicographic).
    pub fn plugin_ids(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn has_plugin(&self, id: &str) -> bool {
        self.plugins.contains_key(id) || self.manifests.contains_key(id)
    }

    /// Queries every catalog entry, or only `ids` when non-empty, in catalog
    /// order. A hard environment failure aborts the whole batch; provider
    /// failures do not.
    pub fn query_all(&self, ids: &[String]) -> Result<Vec<PluginOutput>, ManagerError> {
        let targets: Vec<String> = if ids.is_empty() {
            self.plugin_ids()
        } else {
            ids.to_vec()
        };

        let mut out = Vec::with_capacity(targets.len());
        for id in &targets {
            out.push(self.query_one(id)?);
        }
        Ok(out)
    }

    /// Produces exactly one output record for `id`, whatever happens inside
    /// the provider. The only error path is environment creation — a broken
    /// host filesystem, distinct from provider or data problems.
    pub fn query_one(&self, id: &str) -> Result<PluginOutput, ManagerError> {
        let mut output = PluginOutput {
            provider_id: id.to_string(),
            display_name: id.to_string(),
            plan: None,
            lines: error_lines("No data"),
            icon_url: None,
            error: None,
        };

        if let Some(loaded) = self.manifests.get(id) {
            if !loaded.manifest.name.is_empty() {
                output.display_name = loaded.manifest.name.clone();
            }
            if !loaded.icon_data_url.is_empty() {
                output.icon_url = Some(loaded.icon_data_url.clone());
            }
        }

        let Some(plugin) = self.plugins.get(id) else {
            output.error = Some(UNAVAILABLE_MESSAGE.to_string());
            output.lines = error_lines(UNAVAILABLE_MESSAGE);
            return Ok(output);
        };

        let env = PluginEnv::new(id, Some(&self.data_dir)).map_err(|source| {
            ManagerError::Environment {
                id: id.to_string(),
                source,
            }
        })?;

        match env.span.in_scope(|| plugin.query(&env)) {
            Ok(result) => {
                output.plan = result.plan;
                output.lines = if result.lines.is_empty() {
                    error_lines("No usage data")
                } else {
                    result.lines
                };
            }
            Err(failure) => {
                output.error = Some(failure.message().to_string());
                output.lines = error_lines(failure.message());

                let partial = failure.into_partial();
                if partial.plan.is_some() {
                    output.plan = partial.plan;
                }
                if !partial.lines.is_empty() {
                    output.lines = partial.lines;
                }
            }
        }

        Ok(output)
    }
}

#[cfg(test)]
#[path = "tests/manager_tests.rs"]
mod tests;

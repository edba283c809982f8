//! Engine configuration

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::debug;

use crate::context::{NotDeleted, SqlContext, DEFAULT_DATASOURCE};
use crate::error::SqlResult;

/// File looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "leaf-sql.toml";

/// Environment variable overriding `not_deleted_value_type`.
pub const NOT_DELETED_ENV: &str = "LEAF_SQL_NOT_DELETED_VALUE_TYPE";

/// Main engine configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// `"string"` selects the `'0'` sentinel, anything else `0`
    pub not_deleted_value_type: String,

    /// Datasource used when a context does not name one
    pub default_datasource: String,

    /// Pool size per datasource
    pub max_connections: u32,

    /// Datasource name → MySQL connection URL
    pub datasources: IndexMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            not_deleted_value_type: String::new(),
            default_datasource: DEFAULT_DATASOURCE.to_string(),
            max_connections: 5,
            datasources: IndexMap::new(),
        }
    }
}

impl EngineConfig {
    /// Create a new configuration builder
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    pub fn from_toml_str(text: &str) -> SqlResult<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> SqlResult<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Load the first configuration found: `explicit`, then `./leaf-sql.toml`,
    /// then the user config directory. Falls back to defaults. The environment
    /// override is applied last.
    pub fn load(explicit: Option<&Path>) -> SqlResult<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match search_paths().into_iter().find(|p| p.is_file()) {
                Some(path) => {
                    debug!("loading configuration from {}", path.display());
                    Self::from_file(&path)?
                }
                None => Self::default(),
            },
        };
        config.apply_env_override(std::env::var(NOT_DELETED_ENV).ok());
        Ok(config)
    }

    /// Replace the sentinel setting when an override is present.
    pub fn apply_env_override(&mut self, value: Option<String>) {
        if let Some(value) = value {
            debug!("{} overrides not_deleted_value_type with '{}'", NOT_DELETED_ENV, value);
            self.not_deleted_value_type = value;
        }
    }

    pub fn not_deleted(&self) -> NotDeleted {
        NotDeleted::from_setting(&self.not_deleted_value_type)
    }

    /// Build context targeting the default datasource.
    pub fn context(&self) -> SqlContext {
        SqlContext::new(self.not_deleted()).on(self.default_datasource.clone())
    }
}

fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("leaf-sql").join("config.toml"));
    }
    paths
}

/// Builder for EngineConfig
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Set the sentinel representation
    pub fn not_deleted_value_type(mut self, value: impl Into<String>) -> Self {
        self.config.not_deleted_value_type = value.into();
        self
    }

    pub fn default_datasource(mut self, name: impl Into<String>) -> Self {
        self.config.default_datasource = name.into();
        self
    }

    pub fn max_connections(mut self, n: u32) -> Self {
        self.config.max_connections = n;
        self
    }

    /// Register a datasource URL
    pub fn datasource(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.config.datasources.insert(name.into(), url.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> EngineConfig {
        self.config
    }
}

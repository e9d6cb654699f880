//! Configuration file support for gcu
//!
//! Loads and validates the updater configuration from TOML.
//! Default location: /etc/sonic/gcu.toml

use crate::checkpoint::DEFAULT_CHECKPOINT_DIR;
use crate::scope::Scope;
use crate::sorter::DEFAULT_NODE_BUDGET;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sonic/gcu.toml";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid value for {field}: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Where CONFIG_DB and STATE_DB live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// `config_db.json` and STATE_DB snapshot files
    #[default]
    Json,
    /// Live Redis databases (needs the `redis` feature)
    Redis,
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Host CONFIG_DB file; ASIC N uses the same name with N before the extension
    #[serde(default = "default_config_db_path")]
    pub config_db_path: PathBuf,

    /// Host STATE_DB snapshot file, derived per ASIC the same way
    #[serde(default)]
    pub state_db_path: Option<PathBuf>,

    /// Redis host
    #[serde(default = "default_redis_host")]
    pub redis_host: String,

    /// Redis port of the host databases
    #[serde(default = "default_redis_port")]
    pub redis_port: u16,
}

/// Per-ASIC overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceConfig {
    /// Scope name (`asic0`, `asic1`, ...)
    pub name: String,

    #[serde(default)]
    pub config_db_path: Option<PathBuf>,

    #[serde(default)]
    pub state_db_path: Option<PathBuf>,

    #[serde(default)]
    pub redis_host: Option<String>,

    #[serde(default)]
    pub redis_port: Option<u16>,
}

/// Multi-ASIC configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MultiAsicConfig {
    /// Patches and configurations are keyed by scope when enabled
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub namespaces: Vec<NamespaceConfig>,
}

/// Validator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Rule metadata file; the built-in rules are used when unset
    #[serde(default)]
    pub rules_path: Option<PathBuf>,

    /// SONiC version file providing `asic_type` and `build_version`
    #[serde(default = "default_version_file")]
    pub version_file: PathBuf,

    /// Forces chassis detection on or off instead of reading `switch_type`
    #[serde(default)]
    pub chassis: Option<bool>,
}

/// Move sorter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SorterConfig {
    /// Maximum number of search states
    #[serde(default = "default_node_budget")]
    pub node_budget: usize,
}

/// Checkpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    #[serde(default = "default_checkpoint_dir")]
    pub dir: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter level, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of text
    #[serde(default)]
    pub json: bool,
}

/// Complete gcu configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GcuConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub multi_asic: MultiAsicConfig,

    #[serde(default)]
    pub validator: ValidatorConfig,

    #[serde(default)]
    pub sorter: SorterConfig,

    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

// Default functions
fn default_config_db_path() -> PathBuf {
    PathBuf::from("/etc/sonic/config_db.json")
}

fn default_redis_host() -> String {
    "127.0.0.1".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

fn default_version_file() -> PathBuf {
    PathBuf::from("/etc/sonic/sonic_version.yml")
}

fn default_node_budget() -> usize {
    DEFAULT_NODE_BUDGET
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CHECKPOINT_DIR)
}

fn default_log_level() -> String {
    "info".to_string()
}

// Default implementations
impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            config_db_path: default_config_db_path(),
            state_db_path: None,
            redis_host: default_redis_host(),
            redis_port: default_redis_port(),
        }
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            rules_path: None,
            version_file: default_version_file(),
            chassis: None,
        }
    }
}

impl Default for SorterConfig {
    fn default() -> Self {
        Self {
            node_budget: default_node_budget(),
        }
    }
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            dir: default_checkpoint_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Inserts the ASIC id before the file extension: `config_db.json` → `config_db0.json`.
fn per_asic_path(path: &Path, id: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}{}.{}", stem, id, ext.to_string_lossy()),
        None => format!("{}{}", stem, id),
    };
    path.with_file_name(name)
}

impl GcuConfig {
    /// Parses a configuration document.
    pub fn from_toml(content: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })
    }

    /// Loads configuration from file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content, &path.display().to_string())
    }

    /// Loads configuration from file, falling back to defaults if it does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content, &path.display().to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.backend == StoreBackend::Redis && self.store.redis_port == 0 {
            return Err(ConfigError::invalid("store.redis_port", "must be > 0"));
        }
        if self.store.config_db_path.as_os_str().is_empty() {
            return Err(ConfigError::invalid("store.config_db_path", "must not be empty"));
        }
        if self.sorter.node_budget == 0 {
            return Err(ConfigError::invalid("sorter.node_budget", "must be > 0"));
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::invalid(
                "logging.level",
                format!("'{}' is not one of {}", self.logging.level, LOG_LEVELS.join(", ")),
            ));
        }
        for ns in &self.multi_asic.namespaces {
            match ns.name.parse::<Scope>() {
                Ok(Scope::Asic(_)) => {}
                _ => {
                    return Err(ConfigError::invalid(
                        "multi_asic.namespaces",
                        format!("'{}' is not an ASIC namespace", ns.name),
                    ))
                }
            }
            if ns.redis_port == Some(0) {
                return Err(ConfigError::invalid(
                    format!("multi_asic.namespaces.{}.redis_port", ns.name),
                    "must be > 0",
                ));
            }
        }
        Ok(())
    }

    /// Scopes managed by this configuration, host first.
    pub fn scopes(&self) -> Vec<Scope> {
        let mut scopes = vec![Scope::Host];
        if self.multi_asic.enabled {
            let mut asics: Vec<Scope> = self
                .multi_asic
                .namespaces
                .iter()
                .filter_map(|ns| ns.name.parse().ok())
                .filter(|s: &Scope| !s.is_host())
                .collect();
            asics.sort();
            asics.dedup();
            scopes.extend(asics);
        }
        scopes
    }

    fn namespace(&self, scope: Scope) -> Option<&NamespaceConfig> {
        let name = scope.namespace()?;
        self.multi_asic.namespaces.iter().find(|ns| ns.name == name)
    }

    /// CONFIG_DB file of `scope`.
    pub fn config_db_path(&self, scope: Scope) -> PathBuf {
        match scope {
            Scope::Host => self.store.config_db_path.clone(),
            Scope::Asic(id) => self
                .namespace(scope)
                .and_then(|ns| ns.config_db_path.clone())
                .unwrap_or_else(|| per_asic_path(&self.store.config_db_path, id)),
        }
    }

    /// STATE_DB snapshot file of `scope`, if any.
    pub fn state_db_path(&self, scope: Scope) -> Option<PathBuf> {
        match scope {
            Scope::Host => self.store.state_db_path.clone(),
            Scope::Asic(id) => self
                .namespace(scope)
                .and_then(|ns| ns.state_db_path.clone())
                .or_else(|| self.store.state_db_path.as_deref().map(|p| per_asic_path(p, id))),
        }
    }

    /// Redis endpoint of `scope`.
    pub fn redis_endpoint(&self, scope: Scope) -> (String, u16) {
        let ns = self.namespace(scope);
        (
            ns.and_then(|ns| ns.redis_host.clone())
                .unwrap_or_else(|| self.store.redis_host.clone()),
            ns.and_then(|ns| ns.redis_port).unwrap_or(self.store.redis_port),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GcuConfig::default();
        assert_eq!(config.store.backend, StoreBackend::Json);
        assert_eq!(config.store.config_db_path, PathBuf::from("/etc/sonic/config_db.json"));
        assert_eq!(config.store.redis_port, 6379);
        assert_eq!(config.sorter.node_budget, DEFAULT_NODE_BUDGET);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
        assert_eq!(config.scopes(), vec![Scope::Host]);
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_str = r#"
[store]
backend = "redis"
redis_port = 6380

[validator]
chassis = true

[sorter]
node_budget = 500

[multi_asic]
enabled = true

[[multi_asic.namespaces]]
name = "asic1"
redis_port = 6381

[[multi_asic.namespaces]]
name = "asic0"
config_db_path = "/tmp/asic0.json"
"#;
        let config = GcuConfig::from_toml(toml_str, "inline").unwrap();
        assert_eq!(config.store.backend, StoreBackend::Redis);
        assert_eq!(config.validator.chassis, Some(true));
        assert_eq!(config.sorter.node_budget, 500);
        // Unspecified values should use defaults
        assert_eq!(config.store.redis_host, "127.0.0.1");
        assert!(config.validate().is_ok());

        assert_eq!(config.scopes(), vec![Scope::Host, Scope::Asic(0), Scope::Asic(1)]);
        assert_eq!(config.config_db_path(Scope::Asic(0)), PathBuf::from("/tmp/asic0.json"));
        assert_eq!(
            config.config_db_path(Scope::Asic(1)),
            PathBuf::from("/etc/sonic/config_db1.json")
        );
        assert_eq!(config.redis_endpoint(Scope::Asic(1)), ("127.0.0.1".to_string(), 6381));
        assert_eq!(config.redis_endpoint(Scope::Host), ("127.0.0.1".to_string(), 6380));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = GcuConfig::default();
        config.sorter.node_budget = 0;
        assert!(config.validate().is_err());

        let mut config = GcuConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = GcuConfig::default();
        config.multi_asic.namespaces.push(NamespaceConfig {
            name: "localhost".to_string(),
            config_db_path: None,
            state_db_path: None,
            redis_host: None,
            redis_port: None,
        });
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let err = GcuConfig::from_toml("[store]\nbackend = \"etcd\"\n", "inline").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_state_db_path_per_asic() {
        let mut config = GcuConfig::default();
        assert_eq!(config.state_db_path(Scope::Asic(2)), None);
        config.store.state_db_path = Some(PathBuf::from("/var/run/state_db.json"));
        assert_eq!(
            config.state_db_path(Scope::Asic(2)),
            Some(PathBuf::from("/var/run/state_db2.json"))
        );
    }

    #[test]
    fn test_load_nonexistent_file_defaults() {
        let config = GcuConfig::load_or_default("/nonexistent/gcu.toml").unwrap();
        assert_eq!(config.checkpoint.dir, PathBuf::from(DEFAULT_CHECKPOINT_DIR));
        assert!(matches!(
            GcuConfig::load("/nonexistent/gcu.toml"),
            Err(ConfigError::Io { .. })
        ));
    }
}

//! Configuration management.
//!
//! Configuration is read from a YAML (`.yaml`/`.yml`) or TOML (`.toml`)
//! file, then overridden by environment variables, then by CLI flags.
//!
//! ```yaml
//! registry:
//!   address: myregistry.azurecr.io
//! repository:
//!   - app/api
//! tagsGroups:
//!   release:
//!     regex: '^v\d+'
//!     howManyToKeep: 5
//! dry_run: false
//! delete_others: false
//! ```

use crate::models::{GroupSpec, TagGroup};
use crate::purge::{DEFAULT_MAX_CONCURRENT, PoolConfig};
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Environment variable overriding the registry address.
pub const REGISTRY_ADDRESS_ENV: &str = "TAGSWEEP_REGISTRY_ADDRESS";
/// Environment variable overriding `dry_run`.
pub const DRY_RUN_ENV: &str = "TAGSWEEP_DRY_RUN";
/// Environment variable overriding `delete_others`.
pub const DELETE_OTHERS_ENV: &str = "TAGSWEEP_DELETE_OTHERS";
/// Environment variable overriding the worker pool size.
pub const MAX_CONCURRENCY_ENV: &str = "TAGSWEEP_MAX_CONCURRENCY";
/// Environment variable overriding the per-unit timeout.
pub const OPERATION_TIMEOUT_ENV: &str = "TAGSWEEP_OPERATION_TIMEOUT_MS";
/// Environment variable overriding the log filter.
pub const LOG_LEVEL_ENV: &str = "TAGSWEEP_LOG_LEVEL";

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Main configuration for tagsweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagsweepConfig {
    /// Registry endpoint, e.g. `myregistry.azurecr.io`.
    pub registry_address: Option<String>,
    /// Repositories to process, in order.
    pub repositories: Vec<String>,
    /// Tag groups keyed by name.
    pub tag_groups: BTreeMap<String, GroupSettings>,
    /// Replace destructive calls with reads.
    pub dry_run: bool,
    /// Delete tags that match no group.
    pub delete_others: bool,
    /// Worker pool size.
    pub max_concurrency: usize,
    /// Per-unit timeout.
    pub operation_timeout: Option<Duration>,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// One tag group as written in the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GroupSettings {
    /// Pattern searched in tag names.
    pub regex: String,
    /// Number of newest tags to keep.
    #[serde(rename = "howManyToKeep", alias = "keep")]
    pub how_many_to_keep: usize,
}

/// Logging section of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LoggingSettings {
    /// `EnvFilter` directive, e.g. `info` or `tagsweep=debug`.
    pub level: Option<String>,
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Detailed log file; stderr when absent.
    pub file: Option<PathBuf>,
}

/// Configuration file structure.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Registry section.
    pub registry: Option<ConfigFileRegistry>,
    /// Repositories to process.
    #[serde(alias = "repositories")]
    pub repository: Option<Vec<String>>,
    /// Tag groups.
    #[serde(rename = "tagsGroups", alias = "tag_groups")]
    pub tags_groups: Option<BTreeMap<String, GroupSettings>>,
    /// Dry-run flag.
    pub dry_run: Option<bool>,
    /// Delete-others flag.
    pub delete_others: Option<bool>,
    /// Worker pool size.
    pub max_concurrency: Option<usize>,
    /// Per-unit timeout in milliseconds.
    pub operation_timeout_ms: Option<u64>,
    /// Logging section.
    pub logging: Option<LoggingSettings>,
}

/// Registry section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileRegistry {
    /// Registry address.
    pub address: Option<String>,
}

impl Default for TagsweepConfig {
    fn default() -> Self {
        Self {
            registry_address: None,
            repositories: Vec::new(),
            tag_groups: BTreeMap::new(),
            dry_run: false,
            delete_others: false,
            max_concurrency: DEFAULT_MAX_CONCURRENT,
            operation_timeout: None,
            logging: LoggingSettings::default(),
        }
    }
}

impl TagsweepConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::parse(&contents, path)
    }

    /// Parses configuration text, choosing the format from `path`'s extension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the text does not parse.
    pub fn parse(contents: &str, path: &Path) -> Result<Self> {
        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        let file: ConfigFile = if is_toml {
            toml::from_str(contents).map_err(|e| {
                Error::Configuration(format!("cannot parse {}: {e}", path.display()))
            })?
        } else {
            serde_yaml_ng::from_str(contents).map_err(|e| {
                Error::Configuration(format!("cannot parse {}: {e}", path.display()))
            })?
        };

        Ok(Self::from_config_file(file))
    }

    /// Converts a `ConfigFile` to `TagsweepConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(registry) = file.registry {
            config.registry_address = registry.address;
        }
        if let Some(repositories) = file.repository {
            config.repositories = repositories;
        }
        if let Some(groups) = file.tags_groups {
            config.tag_groups = groups;
        }
        if let Some(v) = file.dry_run {
            config.dry_run = v;
        }
        if let Some(v) = file.delete_others {
            config.delete_others = v;
        }
        if let Some(v) = file.max_concurrency {
            config.max_concurrency = v.max(1);
        }
        config.operation_timeout = file.operation_timeout_ms.map(Duration::from_millis);
        if let Some(logging) = file.logging {
            config.logging = logging;
        }

        config
    }

    /// Applies environment variable overrides.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `TAGSWEEP_REGISTRY_ADDRESS` | `registry_address` |
    /// | `TAGSWEEP_DRY_RUN` | `dry_run` |
    /// | `TAGSWEEP_DELETE_OTHERS` | `delete_others` |
    /// | `TAGSWEEP_MAX_CONCURRENCY` | `max_concurrency` |
    /// | `TAGSWEEP_OPERATION_TIMEOUT_MS` | `operation_timeout` |
    /// | `TAGSWEEP_LOG_LEVEL` | `logging.level` |
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary key lookup.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup(REGISTRY_ADDRESS_ENV)
            && !v.trim().is_empty()
        {
            self.registry_address = Some(v);
        }
        if let Some(v) = lookup(DRY_RUN_ENV) {
            self.dry_run = parse_bool(&v);
        }
        if let Some(v) = lookup(DELETE_OTHERS_ENV) {
            self.delete_others = parse_bool(&v);
        }
        if let Some(v) = lookup(MAX_CONCURRENCY_ENV)
            && let Ok(parsed) = v.parse::<usize>()
        {
            self.max_concurrency = parsed.max(1);
        }
        if let Some(v) = lookup(OPERATION_TIMEOUT_ENV)
            && let Ok(parsed) = v.parse::<u64>()
        {
            self.operation_timeout = (parsed > 0).then(|| Duration::from_millis(parsed));
        }
        if let Some(v) = lookup(LOG_LEVEL_ENV) {
            self.logging.level = Some(v);
        }
        self
    }

    /// Sets the dry-run flag.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sets the delete-others flag.
    #[must_use]
    pub const fn with_delete_others(mut self, delete_others: bool) -> Self {
        self.delete_others = delete_others;
        self
    }

    /// Sets the registry address.
    #[must_use]
    pub fn with_registry_address(mut self, address: impl Into<String>) -> Self {
        self.registry_address = Some(address.into());
        self
    }

    /// Adds a repository to process.
    #[must_use]
    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repositories.push(repository.into());
        self
    }

    /// Adds a tag group.
    #[must_use]
    pub fn with_group(mut self, name: impl Into<String>, regex: impl Into<String>, keep: usize) -> Self {
        self.tag_groups.insert(
            name.into(),
            GroupSettings {
                regex: regex.into(),
                how_many_to_keep: keep,
            },
        );
        self
    }

    /// Checks that the configuration can drive a run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the registry address or the
    /// repository list is missing, or a group uses the reserved `others` name.
    pub fn validate(&self) -> Result<()> {
        self.registry_address()?;
        if self.repositories.is_empty() {
            return Err(Error::Configuration(
                "at least one repository must be set in the repository key".to_string(),
            ));
        }
        if self.tag_groups.contains_key(crate::models::OTHERS_BUCKET) {
            return Err(Error::Configuration(format!(
                "tag group name '{}' is reserved",
                crate::models::OTHERS_BUCKET
            )));
        }
        if self.tag_groups.is_empty() && !self.delete_others {
            warn!("No tag groups configured, tags will not be purged");
        }
        Ok(())
    }

    /// Returns the registry address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if no non-empty address is set.
    pub fn registry_address(&self) -> Result<&str> {
        self.registry_address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| Error::Configuration("registry address must be set".to_string()))
    }

    /// Group specs in name order.
    #[must_use]
    pub fn group_specs(&self) -> Vec<GroupSpec> {
        self.tag_groups
            .iter()
            .map(|(name, g)| GroupSpec::new(name.clone(), g.regex.clone(), g.how_many_to_keep))
            .collect()
    }

    /// Compiles every group pattern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a group uses the reserved `others`
    /// name, or [`Error::InvalidPattern`] for the first pattern that does not
    /// compile.
    pub fn compile_groups(&self) -> Result<Vec<TagGroup>> {
        TagGroup::compile_all(self.group_specs())
    }

    /// Worker pool settings.
    #[must_use]
    pub const fn pool_config(&self) -> PoolConfig {
        PoolConfig::new()
            .with_max_concurrent(self.max_concurrency)
            .with_operation_timeout(self.operation_timeout)
    }
}

fn parse_bool(value: &str) -> bool {
    let value = value.trim();
    value.eq_ignore_ascii_case("true") || value == "1"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const YAML: &str = r"
registry:
  address: myregistry.azurecr.io
repository:
  - app/api
  - app/web
tagsGroups:
  release:
    regex: '^v\d+'
    howManyToKeep: 5
  snapshots:
    regex: 'snapshot'
    howManyToKeep: 0
dry_run: true
";

    #[test]
    fn test_parse_yaml() {
        let config = TagsweepConfig::parse(YAML, Path::new("config.yaml")).expect("valid yaml");
        assert_eq!(
            config.registry_address.as_deref(),
            Some("myregistry.azurecr.io")
        );
        assert_eq!(config.repositories, vec!["app/api", "app/web"]);
        assert!(config.dry_run);
        assert!(!config.delete_others);
        assert_eq!(config.max_concurrency, DEFAULT_MAX_CONCURRENT);

        let specs = config.group_specs();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0], GroupSpec::new("release", r"^v\d+", 5));
        assert_eq!(specs[1].keep_count, 0);
        config.validate().expect("config is complete");
    }

    #[test]
    fn test_parse_toml() {
        let text = r#"
repository = ["app/api"]
delete_others = true
operation_timeout_ms = 1500

[registry]
address = "reg.example.com"

[tagsGroups.release]
regex = "^v"
howManyToKeep = 3
"#;
        let config = TagsweepConfig::parse(text, Path::new("tagsweep.toml")).expect("valid toml");
        assert!(config.delete_others);
        assert_eq!(config.operation_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(config.group_specs(), vec![GroupSpec::new("release", "^v", 3)]);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .expect("temp file");
        file.write_all(YAML.as_bytes()).expect("write config");

        let config = TagsweepConfig::load_from_file(file.path()).expect("loads");
        assert_eq!(config.repositories.len(), 2);
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let err = TagsweepConfig::load_from_file(Path::new("/nonexistent/tagsweep.yaml"))
            .expect_err("file is missing");
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_validate_requires_address_and_repositories() {
        let err = TagsweepConfig::new()
            .with_repository("app")
            .validate()
            .expect_err("address missing");
        assert!(err.to_string().contains("registry address"));

        let err = TagsweepConfig::new()
            .with_registry_address("reg.example.com")
            .validate()
            .expect_err("repositories missing");
        assert!(err.to_string().contains("repository"));

        TagsweepConfig::new()
            .with_registry_address("reg.example.com")
            .with_repository("app")
            .validate()
            .expect("valid without groups");
    }

    #[test]
    fn test_validate_rejects_reserved_group_name() {
        let err = TagsweepConfig::new()
            .with_registry_address("reg.example.com")
            .with_repository("app")
            .with_group("others", ".*", 1)
            .validate()
            .expect_err("reserved name");
        assert!(err.is_fatal());
    }

    #[test]
    fn test_compile_groups_rejects_reserved_name_without_validate() {
        let config = TagsweepConfig::new().with_group("others", ".*", 1);
        let err = config.compile_groups().expect_err("reserved name");
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_blank_address_is_missing() {
        let config = TagsweepConfig::new().with_registry_address("   ");
        assert!(config.registry_address().is_err());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (DRY_RUN_ENV, "1"),
            (DELETE_OTHERS_ENV, "TRUE"),
            (MAX_CONCURRENCY_ENV, "0"),
            (OPERATION_TIMEOUT_ENV, "250"),
            (REGISTRY_ADDRESS_ENV, "override.azurecr.io"),
            (LOG_LEVEL_ENV, "debug"),
        ]);
        let config = TagsweepConfig::new()
            .with_overrides(|key| env.get(key).map(|v| (*v).to_string()));

        assert!(config.dry_run);
        assert!(config.delete_others);
        assert_eq!(config.max_concurrency, 1);
        assert_eq!(config.operation_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.registry_address().ok(), Some("override.azurecr.io"));
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_invalid_pattern_surfaces_at_compile() {
        let config = TagsweepConfig::new().with_group("broken", "(", 1);
        let err = config.compile_groups().expect_err("bad regex");
        assert!(matches!(err, Error::InvalidPattern { .. }));
    }

    #[test]
    fn test_pool_config_follows_settings() {
        let mut config = TagsweepConfig::new();
        config.max_concurrency = 7;
        config.operation_timeout = Some(Duration::from_secs(3));
        let pool = config.pool_config();
        assert_eq!(pool.max_concurrent, 7);
        assert_eq!(pool.operation_timeout, Some(Duration::from_secs(3)));
    }
}

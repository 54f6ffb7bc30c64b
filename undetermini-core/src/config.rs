//! Configuration system for Undetermini.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> overrides.
//! Configuration is loaded from `~/.config/undetermini/config.toml` and/or
//! `.undetermini/config.toml` in the workspace directory.

use crate::accuracy::ErrorAccuracyPolicy;
use crate::engine::EngineSettings;
use crate::presenter::{Column, PresenterOptions, SortOrder};
use crate::store::{DEFAULT_STORE_FILE, StoreOptions};
use crate::throttle::ThrottleConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UndeterminiConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub throttle: ThrottleConfig,
    #[serde(default)]
    pub presenter: PresenterConfig,
}

/// Where run records live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Mirror records to a JSON file.
    pub persist_on_disk: bool,
    /// Store file; relative paths are resolved against the workspace.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            persist_on_disk: false,
            path: PathBuf::from(DEFAULT_STORE_FILE),
        }
    }
}

/// Defaults for benchmark runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub times: usize,
    pub use_cache: bool,
    /// Per-run deadline in seconds. Unset means runs may take as long as they need.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_timeout_secs: Option<u64>,
    pub parallel_implementations: bool,
    pub error_accuracy: ErrorAccuracyPolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            times: 1,
            use_cache: false,
            run_timeout_secs: None,
            parallel_implementations: true,
            error_accuracy: ErrorAccuracyPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenterConfig {
    pub enabled: bool,
    pub sort: SortOrder,
    #[serde(default)]
    pub hidden_columns: Vec<Column>,
}

impl Default for PresenterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sort: SortOrder::default(),
            hidden_columns: Vec::new(),
        }
    }
}

impl PresenterConfig {
    pub fn options(&self) -> PresenterOptions {
        PresenterOptions {
            sort: self.sort,
            hidden_columns: self.hidden_columns.clone(),
        }
    }
}

impl UndeterminiConfig {
    /// Store options with the store path resolved against `workspace`.
    pub fn store_options(&self, workspace: Option<&Path>) -> StoreOptions {
        StoreOptions {
            persist_on_disk: self.store.persist_on_disk,
            path: Some(self.resolved_store_path(workspace)),
        }
    }

    pub fn resolved_store_path(&self, workspace: Option<&Path>) -> PathBuf {
        match workspace {
            Some(ws) if self.store.path.is_relative() => ws.join(&self.store.path),
            _ => self.store.path.clone(),
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            run_timeout: self.run.run_timeout_secs.map(Duration::from_secs),
            parallel_implementations: self.run.parallel_implementations,
            error_accuracy: self.run.error_accuracy,
            presenter: self.presenter.options(),
        }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "undetermini", "undetermini")
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `UNDETERMINI_`)
/// 3. Workspace-local config (`.undetermini/config.toml`)
/// 4. User config (`~/.config/undetermini/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&UndeterminiConfig>,
) -> Result<UndeterminiConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(UndeterminiConfig::default()));

    if let Some(dirs) = project_dirs() {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".undetermini").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // UNDETERMINI_RUN__TIMES, UNDETERMINI_STORE__PERSIST_ON_DISK, ...
    figment = figment.merge(Env::prefixed("UNDETERMINI_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Check whether a user-level or workspace-level config file exists.
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if let Some(dirs) = project_dirs() {
        if dirs.config_dir().join("config.toml").exists() {
            return true;
        }
    }
    workspace.is_some_and(|ws| ws.join(".undetermini").join("config.toml").exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = UndeterminiConfig::default();
        assert!(!config.store.persist_on_disk);
        assert_eq!(config.store.path, PathBuf::from("undetermini-db.json"));
        assert_eq!(config.run.times, 1);
        assert!(config.run.parallel_implementations);
        assert!(config.presenter.enabled);
        assert_eq!(config.throttle.max_in_flight, None);
    }

    #[test]
    fn test_load_config_defaults() {
        let config = load_config(None, None).unwrap();
        assert_eq!(config.run.error_accuracy, ErrorAccuracyPolicy::CountAsPerfect);
    }

    #[test]
    fn test_load_config_with_overrides() {
        let mut overrides = UndeterminiConfig::default();
        overrides.run.times = 25;
        overrides.store.persist_on_disk = true;

        let config = load_config(None, Some(&overrides)).unwrap();
        assert_eq!(config.run.times, 25);
        assert!(config.store.persist_on_disk);
    }

    #[test]
    fn test_load_config_from_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(".undetermini");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("config.toml"),
            r#"
[store]
persist_on_disk = true
path = "bench/runs.json"

[run]
times = 10
run_timeout_secs = 30
error_accuracy = "count_as_zero"

[throttle]
max_in_flight = 4

[throttle.per_resource]
"gpt-4-0613" = 2

[presenter]
sort = "cost"
hidden_columns = ["full_price"]
"#,
        )
        .unwrap();

        assert!(config_exists(Some(dir.path())));
        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.run.times, 10);
        assert_eq!(config.run.error_accuracy, ErrorAccuracyPolicy::CountAsZero);
        assert_eq!(config.throttle.per_resource.get("gpt-4-0613"), Some(&2));
        assert_eq!(config.presenter.sort, SortOrder::Cost);
        assert_eq!(config.presenter.hidden_columns, vec![Column::FullPrice]);

        let options = config.store_options(Some(dir.path()));
        assert!(options.persist_on_disk);
        assert_eq!(options.path, Some(dir.path().join("bench/runs.json")));

        let settings = config.engine_settings();
        assert_eq!(settings.run_timeout, Some(Duration::from_secs(30)));
        assert_eq!(settings.error_accuracy, ErrorAccuracyPolicy::CountAsZero);
    }

    #[test]
    fn test_absolute_store_path_is_kept() {
        let mut config = UndeterminiConfig::default();
        config.store.path = PathBuf::from("/var/lib/undetermini/db.json");
        assert_eq!(
            config.resolved_store_path(Some(Path::new("/work"))),
            PathBuf::from("/var/lib/undetermini/db.json")
        );
    }

    #[test]
    fn test_config_exists_without_workspace_file() {
        let dir = tempfile::tempdir().unwrap();
        // A user-level file may exist on the machine running the tests.
        let user_level = project_dirs()
            .map(|d| d.config_dir().join("config.toml").exists())
            .unwrap_or(false);
        assert_eq!(config_exists(Some(dir.path())), user_level);
    }
}

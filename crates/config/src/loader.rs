//! Loading [`ProxyConfig`] from a project config file deep-merged with an
//! optional user-level config file.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde_json::Value;

use crate::{error::ConfigError, merge::deep_merge, servers::ProxyConfig};

/// Environment variable overriding the user-level config directory.
pub const MCP_FUNNEL_HOME: &str = "MCP_FUNNEL_HOME";

/// Default project-level config file name, relative to the current
/// directory.
pub const DEFAULT_PROJECT_CONFIG: &str = ".mcp-funnel.json";

/// Directory holding the user-level config file.
///
/// `MCP_FUNNEL_HOME` takes precedence when set; otherwise this falls back to
/// the platform config directory's `mcp-funnel` subdirectory.
pub fn user_config_dir() -> PathBuf {
    if let Ok(home) = env::var(MCP_FUNNEL_HOME) {
        return PathBuf::from(home);
    }

    directories::ProjectDirs::from("", "", "mcp-funnel")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".mcp-funnel"))
}

/// Path to the user-level config file.
pub fn user_config_path() -> PathBuf {
    user_config_dir().join("config.json")
}

/// Load and validate [`ProxyConfig`] for `project_path`, deep-merged over the
/// user-level config resolved from [`user_config_path`].
pub fn load(project_path: &Path) -> Result<ProxyConfig, ConfigError> {
    load_from_paths(&user_config_path(), project_path)
}

/// Load and validate [`ProxyConfig`] from two explicit paths.
///
/// Either file may be absent; a missing file is treated as an empty object,
/// not an error. `project` is merged on top of `user`, so project-level keys
/// win, per the crate's deep-merge rule.
pub fn load_from_paths(user_path: &Path, project_path: &Path) -> Result<ProxyConfig, ConfigError> {
    let mut merged = read_json(user_path)?;
    let project = read_json(project_path)?;
    deep_merge(&mut merged, project);

    serde_json::from_value(merged).map_err(|source| ConfigError::Parse {
        path: project_path.to_path_buf(),
        source,
    })
}

fn read_json(path: &Path) -> Result<Value, ConfigError> {
    match fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("config file '{}' not found, treating as empty", path.display());
            Ok(Value::Object(serde_json::Map::new()))
        }
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

//! Configuration structures and loading for the aggregating proxy.

#![deny(missing_docs)]

mod error;
mod loader;
mod merge;
mod servers;

pub use error::ConfigError;
pub use loader::{
    load, load_from_paths, user_config_dir, user_config_path, DEFAULT_PROJECT_CONFIG, MCP_FUNNEL_HOME,
};
pub use merge::deep_merge;
pub use servers::{ProxyConfig, ServerSpec};

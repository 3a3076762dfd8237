//! Node settings file.
//!
//! ```toml
//! [cluster]
//! cluster_id = "moonlink-prod"
//! service_id = "moonlink"
//!
//! [endpoint]
//! ip = "0.0.0.0"
//! peer_port = 11111
//! client_port = 30000
//!
//! [bootstrap]
//! exposed_ports = [11111, 30000]
//!
//! [runtime]
//! idle_timeout_secs = 7200
//! min_members = 1
//! ```
//!
//! Every section is optional; a missing file path yields the defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::bootstrap::EndpointSection;

/// Contents of the settings file.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Settings {
    /// Cluster and service ids.
    #[serde(default)]
    pub cluster: ClusterSection,
    /// Explicit bind endpoint.
    pub endpoint: Option<EndpointSection>,
    /// Bootstrap inputs that may also come from the environment.
    #[serde(default)]
    pub bootstrap: BootstrapSection,
    /// Runtime tuning.
    #[serde(default)]
    pub runtime: RuntimeSection,
}

/// Configured cluster identity. Used only when both ids are non-empty.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct ClusterSection {
    /// Cluster id shared by all nodes of one deployment.
    pub cluster_id: Option<String>,
    /// Service id, stable across deployments.
    pub service_id: Option<String>,
}

/// The `[bootstrap]` section.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct BootstrapSection {
    /// Ports the container exposes, peer port first.
    pub exposed_ports: Option<Vec<u16>>,
}

/// The `[runtime]` section.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RuntimeSection {
    /// Seconds an activation may stay idle.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Seconds a routed call may take, retries included.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    /// Active members below which cluster health is degraded.
    #[serde(default = "default_min_members")]
    pub min_members: usize,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
            call_timeout_secs: default_call_timeout_secs(),
            min_members: default_min_members(),
        }
    }
}

impl RuntimeSection {
    /// Idle timeout as a `Duration`.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Call timeout as a `Duration`.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

fn default_idle_timeout_secs() -> u64 {
    2 * 60 * 60
}

fn default_call_timeout_secs() -> u64 {
    30
}

fn default_min_members() -> usize {
    1
}

/// Errors loading the settings file.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The file could not be read.
    #[error("cannot read settings file {}: {source}", path.display())]
    Io {
        /// The file that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`Settings`].
    #[error("invalid settings: {0}")]
    Parse(#[from] toml::de::Error),
}

impl Settings {
    /// Load settings from `path`, or the defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        match path {
            Some(p) => {
                let data = fs::read_to_string(p).map_err(|source| SettingsError::Io {
                    path: p.to_path_buf(),
                    source,
                })?;
                Self::parse(&data)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse settings from TOML text.
    pub fn parse(data: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(data)?)
    }
}

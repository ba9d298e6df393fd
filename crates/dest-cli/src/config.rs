//! Runtime configuration for the `dest` front end.

use std::path::{Path, PathBuf};

use dest_core::sim::{SimError, SimulatedService, SimulatedTopology};

/// Where configuration files live and how the simulator is seeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestConfig {
    /// Platform root directory.
    pub root: PathBuf,
    /// Subdirectory of `root` holding saved rule files.
    pub config_dir: String,
    /// File used by `load`/`save` when none is given.
    pub file_name: String,
    /// Seed for randomized reactivation budgets.
    pub seed: u64,
}

impl Default for DestConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            config_dir: "dest_config".to_string(),
            file_name: "config.xml".to_string(),
            seed: 42,
        }
    }
}

impl DestConfig {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn default_config_path(&self) -> PathBuf {
        self.root.join(&self.config_dir).join(&self.file_name)
    }

    /// The file named on the command line, or the default one.
    pub fn config_path(&self, arg: Option<&str>) -> PathBuf {
        arg.map_or_else(|| self.default_config_path(), PathBuf::from)
    }
}

/// Drives from a JSON description, or the default enclosure.
pub fn load_topology(path: Option<&Path>) -> Result<SimulatedTopology, SimError> {
    match path {
        Some(path) => {
            let topology = SimulatedTopology::from_json_file(path)?;
            log::info!("loaded {} drive(s) from {}", topology.drives.len(), path.display());
            Ok(topology)
        }
        None => Ok(SimulatedTopology::default()),
    }
}

/// Service state saved by an earlier invocation, or a fresh service.
pub fn load_service(state: Option<&Path>, seed: u64) -> Result<SimulatedService, SimError> {
    match state {
        Some(path) if path.exists() => {
            let service = SimulatedService::load_state(path)?;
            log::debug!("restored {} record(s) from {}", service.len(), path.display());
            Ok(service)
        }
        _ => Ok(SimulatedService::new(seed)),
    }
}

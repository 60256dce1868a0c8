use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::session::SessionState;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Where session logs are written; platform data dir when unset
    pub data_dir: Option<PathBuf>,
    pub sites: Vec<String>,
    pub outlets: Vec<String>,
    pub auto_reset_after_save: bool,
    pub utf8_bom: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            sites: vec!["Site 1".to_string(), "Site 2".to_string()],
            outlets: vec!["Outlet A".to_string(), "Outlet B".to_string()],
            auto_reset_after_save: false,
            utf8_bom: true,
        }
    }
}

impl Config {
    /// Copies the label registries back so labels added during a run persist
    pub fn absorb_registries(&mut self, state: &SessionState) {
        self.sites = state.sites.as_slice().to_vec();
        self.outlets = state.outlets.as_slice().to_vec();
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "pickrate") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("pickrate_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where an unparsable config is moved aside before defaults take over
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".bak");
        PathBuf::from(name)
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(_) => return Config::default(),
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg,
            Err(e) => {
                // keep the user's labels recoverable; the next save overwrites the original
                let backup = self.backup_path();
                match fs::write(&backup, &bytes) {
                    Ok(()) => tracing::warn!(
                        path = %self.path.display(),
                        backup = %backup.display(),
                        error = %e,
                        "unreadable config moved aside, using defaults"
                    ),
                    Err(io) => tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        backup_error = %io,
                        "unreadable config could not be backed up, using defaults"
                    ),
                }
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).map_err(std::io::Error::other)?;
        fs::write(&self.path, data)
    }
}

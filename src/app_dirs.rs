use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// Root of the per-site session logs
    pub fn records_dir() -> PathBuf {
        if let Some(proj_dirs) = ProjectDirs::from("", "", "pickrate") {
            proj_dirs.data_dir().join("records")
        } else {
            PathBuf::from("pickrate_records")
        }
    }

    pub fn log_path() -> PathBuf {
        if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".local")
                .join("state")
                .join("pickrate")
                .join("pickrate.log")
        } else if let Some(proj_dirs) = ProjectDirs::from("", "", "pickrate") {
            proj_dirs.data_local_dir().join("pickrate.log")
        } else {
            PathBuf::from("pickrate.log")
        }
    }
}

//! Configuration discovery.

use anyhow::{Context, Result};
use fleet_runner::Config;
use std::path::{Path, PathBuf};

/// File name looked up in the working and user config directories.
pub const CONFIG_FILE: &str = "loadfleet.toml";

/// Load the explicit file, or the first discovered one, or defaults.
///
/// Environment overrides apply in every case.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => candidates().into_iter().find(|p| p.is_file()),
    };

    match path {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => {
            let mut config = Config::default();
            config.apply_env(|key| std::env::var(key).ok());
            Ok(config)
        }
    }
}

fn candidates() -> Vec<PathBuf> {
    let mut out = vec![PathBuf::from(CONFIG_FILE)];
    if let Some(dirs) = directories::ProjectDirs::from("io", "loadfleet", "loadfleet") {
        out.push(dirs.config_dir().join(CONFIG_FILE));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet.toml");
        std::fs::write(&path, "[fleet]\ncount = 7\n").unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.fleet.count, 7);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = load(Some(Path::new("/nonexistent/fleet.toml"))).unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/fleet.toml"));
    }

    #[test]
    fn candidates_start_with_working_directory() {
        assert_eq!(candidates()[0], PathBuf::from(CONFIG_FILE));
    }
}

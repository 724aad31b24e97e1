use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAX_DRAG_THRESHOLD_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hold time before a toolbar press turns into a drag.
    pub drag_threshold_ms: u64,
    /// Event loop poll interval; also the resolution of the drag timer.
    pub tick_ms: u64,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            drag_threshold_ms: 200,
            tick_ms: 50,
            log_level: "info".into(),
            log_dir: None,
        }
    }
}

impl Config {
    pub fn drag_threshold(&self) -> Duration {
        Duration::from_millis(self.drag_threshold_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn resolved_log_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.log_dir {
            return Ok(dir.clone());
        }
        let dirs = project_dirs()?;
        Ok(dirs.data_dir().join("logs"))
    }

    fn validate(&self) -> Result<()> {
        if self.tick_ms == 0 {
            bail!("tick_ms must be greater than zero");
        }
        if self.drag_threshold_ms > MAX_DRAG_THRESHOLD_MS {
            bail!(
                "drag_threshold_ms must be at most {} (got {})",
                MAX_DRAG_THRESHOLD_MS,
                self.drag_threshold_ms
            );
        }
        Ok(())
    }
}

pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };
    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let data = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    let config: Config = serde_yaml::from_str(&data).context("parsing config file")?;
    config
        .validate()
        .with_context(|| format!("invalid config {:?}", path))?;
    Ok(config)
}

fn default_config_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("config.yml"))
}

pub(crate) fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", "daybook").context("locating data directory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("config.yml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.drag_threshold(), Duration::from_millis(200));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "drag_threshold_ms: 350\n").unwrap();
        let config = load_config_from(&path).unwrap();
        assert_eq!(config.drag_threshold_ms, 350);
        assert_eq!(config.tick_ms, 50);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn zero_tick_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "tick_ms: 0\n").unwrap();
        assert!(load_config_from(&path).is_err());
    }

    #[test]
    fn explicit_log_dir_wins() {
        let config = Config {
            log_dir: Some(PathBuf::from("/tmp/daybook-logs")),
            ..Config::default()
        };
        assert_eq!(
            config.resolved_log_dir().unwrap(),
            PathBuf::from("/tmp/daybook-logs")
        );
    }
}

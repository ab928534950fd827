use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::monitor::DisplayId;
use crate::protocols::direct::DirectSettings;
use crate::protocols::retry::RetryPolicy;
use crate::quantize::DEFAULT_CHICLET_COUNT;
use crate::store::DEFAULT_MAX_CEILING;

pub const APPID: &str = "ddc-osd-control";
pub const CONFIG_VERSION: u64 = 1;

const CONFIG_FILE: &str = "config.json";

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct Config {
    pub version: u64,
    /// Number of steps drawn by the OSD
    pub chiclet_count: u16,
    /// Register values reported above this are clamped to it
    pub max_ceiling: u16,
    /// Lower contrast once brightness reaches its floor
    pub contrast_follows_brightness: bool,
    /// Timing of the checksum-framed transport
    pub framed: RetryPolicy,
    /// Settings of the `ddc-hi` backed transport
    pub direct: DirectSettings,
    pub monitors: HashMap<DisplayId, MonitorConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            chiclet_count: DEFAULT_CHICLET_COUNT,
            max_ceiling: DEFAULT_MAX_CEILING,
            contrast_follows_brightness: false,
            framed: RetryPolicy::default(),
            direct: DirectSettings::default(),
            monitors: HashMap::new(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Suppress the monitor's own OSD before ours is drawn
    pub hide_osd: bool,
}

impl Config {
    pub fn hide_osd(&self, id: &str) -> bool {
        self.monitors.get(id).map(|m| m.hide_osd).unwrap_or(false)
    }

    /// Default location of the configuration file
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APPID).join(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        if config.version > CONFIG_VERSION {
            return Err(AppError::Config(format!(
                "config version {} is newer than supported version {}",
                config.version, CONFIG_VERSION
            )));
        }
        Ok(config)
    }

    /// Load the configuration, falling back to defaults on any error
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            warn!("no config directory, using default config");
            return Self::default();
        };

        if !path.exists() {
            debug!("no config at {}, using defaults", path.display());
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                error!("errors loading config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

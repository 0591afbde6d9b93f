//! YAML configuration.
//!
//! A missing file is created from the built-in default. A file that does not parse or
//! validate is reported and replaced by the default for this run.

use crate::error::CityError;
use crate::geometry::Vec2;
use chrono::Local;
use log::{error, info, LevelFilter};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_CONFIG: &str = include_str!("../config/default.yml");

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    pub debug: DebugConfig,
    pub display: DisplayConfig,
    pub game: GameConfig,
    pub simulation: SimulationConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DebugConfig {
    pub log_level: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DisplayConfig {
    pub resolution: Vec<u32>,
    /// Not used without a window. Kept so existing config files still load.
    #[serde(default)]
    pub borderless_fullscreen: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct GameConfig {
    pub humans: HumanConfig,
    pub vehicles: VehicleConfig,
    pub buildings: BuildingConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct HumanConfig {
    pub spawn_count: usize,
    #[serde(default = "default_true")]
    pub wandering: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct VehicleConfig {
    pub spawn_count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BuildingConfig {
    #[serde(default = "default_true")]
    pub strobe_lights: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SimulationConfig {
    pub seed: u64,
    pub tick_rate: f64,
    pub duration: f64,
    pub map: PathBuf,
}

fn default_true() -> bool {
    true
}

impl Config {
    /// The configuration compiled into the binary.
    pub fn builtin() -> Result<Config, CityError> {
        Config::from_str(DEFAULT_CONFIG)
    }

    /// Loads `path`, creating it from the default if it does not exist. Falls back to the
    /// default if the file is malformed or invalid.
    pub fn load(path: &Path) -> Result<Config, CityError> {
        if !path.exists() {
            info!("creating default config at {}", path.display());
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let header = format!("# Config generated {}\n", Local::now().format("%d/%m/%Y %H:%M:%S"));
            fs::write(path, header + DEFAULT_CONFIG)?;
        }

        let loaded = fs::read_to_string(path)
            .map_err(CityError::from)
            .and_then(|text| Config::from_str(&text));
        match loaded {
            Ok(config) => {
                info!("loaded config from {}", path.display());
                Ok(config)
            }
            Err(e) => {
                error!("could not load config {}: {e}; using the default", path.display());
                Config::builtin()
            }
        }
    }

    pub fn validate(&self) -> Result<(), CityError> {
        self.log_level()?;
        match self.display.resolution.as_slice() {
            [w, h] if *w > 0 && *h > 0 => {}
            other => {
                return Err(CityError::InvalidConfig(format!(
                    "resolution must be two positive numbers, not {other:?}"
                )));
            }
        }
        let sim = &self.simulation;
        if !(sim.tick_rate > 0.0) {
            return Err(CityError::InvalidConfig(format!(
                "tick rate must be positive, not {}",
                sim.tick_rate
            )));
        }
        if !(sim.duration > 0.0) {
            return Err(CityError::InvalidConfig(format!(
                "duration must be positive, not {}",
                sim.duration
            )));
        }
        Ok(())
    }

    pub fn log_level(&self) -> Result<LevelFilter, CityError> {
        LevelFilter::from_str(&self.debug.log_level).map_err(|_| {
            CityError::InvalidConfig(format!("unknown log level '{}'", self.debug.log_level))
        })
    }

    /// The view size in pixels.
    #[must_use]
    pub fn resolution(&self) -> Vec2 {
        match self.display.resolution.as_slice() {
            [w, h] => Vec2::new(f64::from(*w), f64::from(*h)),
            _ => crate::camera::DEFAULT_VIEW_SIZE,
        }
    }

    /// Seconds per frame.
    #[must_use]
    pub fn delta(&self) -> f64 {
        1.0 / self.simulation.tick_rate
    }
}

impl FromStr for Config {
    type Err = CityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Config = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

//! Run configuration.
//!
//! Values are layered, later sources overriding earlier ones:
//! 1. Built-in defaults (angle -45°, `./Images/cat.bmp` -> `cat-rot.bmp`)
//! 2. A TOML file (`--config` or `SCATTER_ROTATE_CONFIG`)
//! 3. Environment variables (`SCATTER_ROTATE_ANGLE`, `SCATTER_ROTATE_THREADS`,
//!    `SCATTER_ROTATE_SENTINEL`)
//! 4. Command-line flags, applied by the binary

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::buffer::{BufferAllocation, Sample};
use crate::dispatch::{Dispatcher, RayonDispatcher, SequentialDispatcher};
use crate::error::{Error, Result};
use crate::op_scatter_rotate::{DEFAULT_ANGLE_DEGREES, DEFAULT_SENTINEL, OpScatterRotate};

pub const CONFIG_ENV: &str = "SCATTER_ROTATE_CONFIG";
pub const ANGLE_ENV: &str = "SCATTER_ROTATE_ANGLE";
pub const THREADS_ENV: &str = "SCATTER_ROTATE_THREADS";
pub const SENTINEL_ENV: &str = "SCATTER_ROTATE_SENTINEL";

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AllocationSetting {
    #[default]
    Platform,
    Standard,
    HugePages,
}

impl From<AllocationSetting> for BufferAllocation {
    fn from(setting: AllocationSetting) -> Self {
        match setting {
            AllocationSetting::Platform => BufferAllocation::default(),
            AllocationSetting::Standard => BufferAllocation::Standard,
            AllocationSetting::HugePages => BufferAllocation::HugePages,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RotateConfig {
    pub angle_degrees: f64,
    pub input: PathBuf,
    pub output: PathBuf,
    pub sentinel: Sample,
    /// Worker count; `None` uses rayon's global pool.
    pub threads: Option<usize>,
    pub sequential: bool,
    pub allocation: AllocationSetting,
}

impl Default for RotateConfig {
    fn default() -> Self {
        Self {
            angle_degrees: DEFAULT_ANGLE_DEGREES,
            input: PathBuf::from("./Images/cat.bmp"),
            output: PathBuf::from("cat-rot.bmp"),
            sentinel: DEFAULT_SENTINEL,
            threads: None,
            sequential: false,
            allocation: AllocationSetting::Platform,
        }
    }
}

impl RotateConfig {
    /// Defaults, then the file named by `path` or `SCATTER_ROTATE_CONFIG`,
    /// then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let from_env = env::var_os(CONFIG_ENV).map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(angle) = env_value::<f64>(ANGLE_ENV)? {
            self.angle_degrees = angle;
        }
        if let Some(threads) = env_value::<usize>(THREADS_ENV)? {
            self.threads = Some(threads);
        }
        if let Some(sentinel) = env_value::<Sample>(SENTINEL_ENV)? {
            self.sentinel = sentinel;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.angle_degrees.is_finite() {
            return Err(Error::Config(format!(
                "angle_degrees must be finite, got {}",
                self.angle_degrees
            )));
        }
        if self.threads == Some(0) {
            return Err(Error::Config("threads must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Builds the dispatch substrate this configuration asks for.
    pub fn dispatcher(&self) -> Result<Dispatcher> {
        if self.sequential {
            return Ok(Dispatcher::Sequential(SequentialDispatcher));
        }
        let rayon = match self.threads {
            Some(threads) => RayonDispatcher::with_threads(threads)?,
            None => RayonDispatcher::new(),
        };
        Ok(Dispatcher::Rayon(rayon))
    }

    /// Builds the rotation operator this configuration describes.
    pub fn operator(&self) -> OpScatterRotate {
        let mut op = OpScatterRotate::new();
        op.set_rotation(self.angle_degrees)
            .set_sentinel(self.sentinel)
            .set_allocation(self.allocation.into());
        op
    }
}

fn env_value<T: FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("{name}={raw:?}: {e}"))),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(Error::Config(format!("{name}: {e}"))),
    }
}

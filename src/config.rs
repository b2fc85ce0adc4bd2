use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{MapFixError, MapFixResult};
use crate::recognition::preprocess::{ResizeFilter, DEFAULT_MAX_DIMENSION};
use crate::recognition::template::TemplateMatcherOptions;
use crate::recognition::transform::Calibration;
use crate::recognition::validator::{WorldBounds, DEFAULT_WORLD_LIMIT};

pub const CONFIG_FILE_NAME: &str = "mapfix.toml";
/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "MAPFIX_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub preprocess: PreprocessConfig,
    #[serde(default)]
    pub bounds: BoundsConfig,
    #[serde(default)]
    pub calibration: Calibration,
    #[serde(default)]
    pub matcher: MatcherConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Screenshots wider or taller than this are shrunk uniformly.
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
    #[serde(default)]
    pub filter: ResizeFilter,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            filter: ResizeFilter::default(),
        }
    }
}

fn default_max_dimension() -> u32 {
    DEFAULT_MAX_DIMENSION
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundsConfig {
    #[serde(default = "default_min")]
    pub min: f64,
    #[serde(default = "default_max")]
    pub max: f64,
}

impl Default for BoundsConfig {
    fn default() -> Self {
        Self {
            min: default_min(),
            max: default_max(),
        }
    }
}

fn default_min() -> f64 {
    -DEFAULT_WORLD_LIMIT
}

fn default_max() -> f64 {
    DEFAULT_WORLD_LIMIT
}

impl From<BoundsConfig> for WorldBounds {
    fn from(cfg: BoundsConfig) -> Self {
        WorldBounds::new(cfg.min, cfg.max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Reference world map image. Required by the CLI unless `--map` is given.
    #[serde(default)]
    pub reference_map: Option<PathBuf>,
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    #[serde(default = "default_coarse_max_dimension")]
    pub coarse_max_dimension: u32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            reference_map: None,
            min_score: default_min_score(),
            coarse_max_dimension: default_coarse_max_dimension(),
        }
    }
}

fn default_min_score() -> f64 {
    TemplateMatcherOptions::default().min_score
}

fn default_coarse_max_dimension() -> u32 {
    TemplateMatcherOptions::default().coarse_max_dimension
}

impl MatcherConfig {
    pub fn options(&self) -> TemplateMatcherOptions {
        TemplateMatcherOptions {
            min_score: self.min_score,
            coarse_max_dimension: self.coarse_max_dimension,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}

impl AppConfig {
    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> MapFixResult<()> {
        if self.preprocess.max_dimension == 0 {
            return Err(MapFixError::Config("preprocess.max_dimension must be positive".into()));
        }
        let BoundsConfig { min, max } = self.bounds;
        if !(min.is_finite() && max.is_finite()) || min > max {
            return Err(MapFixError::Config(format!(
                "bounds must be finite with min <= max (got {min} .. {max})"
            )));
        }
        if !self.calibration.is_usable() {
            return Err(MapFixError::Config(
                "calibration scales must be finite and non-zero, offsets finite".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.matcher.min_score) {
            return Err(MapFixError::Config("matcher.min_score must lie in [0, 1]".into()));
        }
        Ok(())
    }

    /// Worker count for batch recognition, never zero.
    pub fn concurrency(&self) -> usize {
        self.batch.concurrency.max(1)
    }
}

/// Locate a config file: `$MAPFIX_CONFIG`, next to the executable, the working
/// directory, then the user config directory. `None` when none exists.
pub fn resolve_config_path() -> MapFixResult<Option<PathBuf>> {
    if let Ok(explicit) = std::env::var(CONFIG_ENV_VAR) {
        let candidate = PathBuf::from(explicit);
        if candidate.exists() {
            return Ok(Some(candidate));
        }
        return Err(MapFixError::Config(format!(
            "{CONFIG_ENV_VAR} points to missing file {}",
            candidate.display()
        )));
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join(CONFIG_FILE_NAME);
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(Some(candidate));
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join(CONFIG_FILE_NAME);
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(Some(candidate));
    }

    if let Some(dir) = dirs::config_dir() {
        let candidate = dir.join("mapfix").join(CONFIG_FILE_NAME);
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config found in user config directory");
            return Ok(Some(candidate));
        }
    }

    Ok(None)
}

/// Load the discovered config, or defaults when there is none.
pub fn load_config() -> MapFixResult<AppConfig> {
    match resolve_config_path()? {
        Some(path) => load_config_from(path),
        None => {
            tracing::info!("no {CONFIG_FILE_NAME} found; using defaults");
            Ok(AppConfig::default())
        }
    }
}

pub fn load_config_from(path: impl AsRef<Path>) -> MapFixResult<AppConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    config.validate()?;
    tracing::info!(
        path = %path.display(),
        max_dimension = config.preprocess.max_dimension,
        "config loaded"
    );
    Ok(config)
}

pub fn save_config(config: &AppConfig, path: impl AsRef<Path>) -> MapFixResult<()> {
    let path = path.as_ref();
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}

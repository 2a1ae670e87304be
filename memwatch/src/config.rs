use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, path::PathBuf, str::FromStr};

use crate::budget::validate_margin;
use crate::error::MemwatchError;
use crate::pressure::BufferPressure;
use crate::sampler::StopPolicy;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemwatchConfig {
    pub sampling: Sampling,
    pub pressure: Pressure,
    pub output: Output,
    pub logging: Logging,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sampling {
    pub stop: StopMode,
    pub max_iterations: usize,
    pub iteration_cap: Option<usize>,
    pub safety_margin_percent: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pressure {
    pub buffer_elements: usize,
    pub retain: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
    pub mode: OutputMode,
    pub file_path: Option<PathBuf>,
    pub pretty: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub format: LogFormat,
    pub file_path: Option<PathBuf>,
    pub filter: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopMode {
    #[default]
    Iterations,
    Threshold,
}

impl FromStr for StopMode {
    type Err = MemwatchError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "iterations" => Ok(Self::Iterations),
            "threshold" => Ok(Self::Threshold),
            other => Err(MemwatchError::InvalidConfiguration(format!(
                "unknown stop mode: {other} (expected iterations or threshold)"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    #[default]
    Stdout,
    File,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            stop: StopMode::Iterations,
            max_iterations: StopPolicy::DEFAULT_ITERATIONS,
            iteration_cap: None,
            safety_margin_percent: 10,
        }
    }
}

impl Default for Pressure {
    fn default() -> Self {
        Self {
            buffer_elements: BufferPressure::DEFAULT_ELEMENTS,
            retain: false,
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        let pd = ProjectDirs::from("io", "memwatch", "memwatch")
            .map(|p| p.data_dir().to_path_buf())
            .unwrap_or_else(|| "./data".into());
        Self {
            mode: OutputMode::Stdout,
            file_path: Some(pd.join("reports").join("memwatch-report.json")),
            pretty: false,
        }
    }
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            file_path: None,
            filter: "info,memwatch=info".into(),
        }
    }
}

impl MemwatchConfig {
    pub fn stop_policy(&self) -> StopPolicy {
        match self.sampling.stop {
            StopMode::Iterations => StopPolicy::Iterations {
                count: self.sampling.max_iterations,
            },
            StopMode::Threshold => StopPolicy::Threshold {
                cap: self.sampling.iteration_cap,
            },
        }
    }

    pub fn validate(&self) -> Result<(), MemwatchError> {
        validate_margin(self.sampling.safety_margin_percent)?;
        if self.sampling.max_iterations == 0 {
            return Err(MemwatchError::InvalidConfiguration(
                "sampling.max_iterations must be at least 1".into(),
            ));
        }
        if self.sampling.iteration_cap == Some(0) {
            return Err(MemwatchError::InvalidConfiguration(
                "sampling.iteration_cap must be at least 1".into(),
            ));
        }
        if self.pressure.buffer_elements == 0 {
            return Err(MemwatchError::InvalidConfiguration(
                "pressure.buffer_elements must be at least 1".into(),
            ));
        }
        if self.output.mode == OutputMode::File && self.output.file_path.is_none() {
            return Err(MemwatchError::InvalidConfiguration(
                "output.mode = \"file\" needs output.file_path".into(),
            ));
        }
        Ok(())
    }
}

pub fn load_config_file(path: &Path) -> Result<MemwatchConfig> {
    let s = fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&s).context("parsing config TOML")
}

/// Defaults, then the TOML file (`--config` or `MEMWATCH_CONFIG`), then env vars.
/// A named config file that does not exist is an error.
pub fn load_config_with_precedence(cli: Option<&PathBuf>) -> Result<MemwatchConfig> {
    let mut cfg = MemwatchConfig::default();
    let path = cli
        .cloned()
        .or_else(|| env::var("MEMWATCH_CONFIG").ok().map(PathBuf::from));
    if let Some(p) = path {
        if !p.exists() {
            bail!("config file {} does not exist", p.display());
        }
        cfg = load_config_file(&p)?;
    }
    apply_env_overrides(&mut cfg, |k| env::var(k).ok())?;
    Ok(cfg)
}

fn parse_flag(v: &str) -> Result<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        other => bail!("expected 1, 0, true or false, got {other:?}"),
    }
}

pub fn apply_env_overrides(
    cfg: &mut MemwatchConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(v) = lookup("MEMWATCH_STOP") {
        cfg.sampling.stop = v.parse().context("MEMWATCH_STOP")?;
    }
    if let Some(v) = lookup("MEMWATCH_MAX_ITERATIONS") {
        cfg.sampling.max_iterations = v.parse().context("MEMWATCH_MAX_ITERATIONS")?;
    }
    if let Some(v) = lookup("MEMWATCH_SAFETY_MARGIN") {
        cfg.sampling.safety_margin_percent = v.parse().context("MEMWATCH_SAFETY_MARGIN")?;
    }
    if let Some(v) = lookup("MEMWATCH_RETAIN") {
        cfg.pressure.retain = parse_flag(&v).context("MEMWATCH_RETAIN")?;
    }
    Ok(())
}

use crate::application::control_mapper::{ControlMapper, MappingRule};
use crate::domain::control::{ControlSignal, Decision, IndicatorCommand};
use crate::domain::wire::DEFAULT_SPEED_MULTIPLIER;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct PilotConfig {
    #[serde(default)]
    pub link: LinkSettings,
    pub classifier: ClassifierSettings,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub mapper: Option<MapperSettings>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LinkSettings {
    /// Serial device path; the first USB serial port is used when unset.
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_speed_multiplier")]
    pub speed_multiplier: i32,
    #[serde(default = "default_open_timeout_ms")]
    pub open_timeout_ms: u64,
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: default_baud_rate(),
            speed_multiplier: default_speed_multiplier(),
            open_timeout_ms: default_open_timeout_ms(),
            write_timeout_ms: default_write_timeout_ms(),
        }
    }
}

impl LinkSettings {
    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassifierSettings {
    pub endpoint: String,
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    #[serde(default = "default_labels_path")]
    pub labels_path: PathBuf,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ClassifierSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_frame_queue")]
    pub frame_queue: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            frame_queue: default_frame_queue(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MapperSettings {
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
    #[serde(default = "default_fallback")]
    pub fallback: ActionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RuleConfig {
    pub keywords: Vec<String>,
    pub action: ActionConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionConfig {
    Drive { left: f32, right: f32 },
    Indicator { direction: i32 },
    Hold,
}

impl From<&ActionConfig> for Decision {
    fn from(action: &ActionConfig) -> Self {
        match action {
            ActionConfig::Drive { left, right } => Decision::Drive(ControlSignal::new(*left, *right)),
            ActionConfig::Indicator { direction } => {
                Decision::Indicate(IndicatorCommand::new(*direction))
            }
            ActionConfig::Hold => Decision::Hold,
        }
    }
}

impl MapperSettings {
    /// Blank keywords are rejected: they would match every label.
    pub fn to_mapper(&self) -> anyhow::Result<ControlMapper> {
        let mut rules = Vec::with_capacity(self.rules.len());
        for (index, rule) in self.rules.iter().enumerate() {
            if rule.keywords.iter().any(|k| k.trim().is_empty()) {
                anyhow::bail!("mapper rule {} has a blank keyword", index);
            }
            rules.push(MappingRule {
                keywords: rule.keywords.clone(),
                decision: Decision::from(&rule.action),
            });
        }
        Ok(ControlMapper::new(rules, Decision::from(&self.fallback)))
    }
}

impl PilotConfig {
    /// Configured keyword policy, or the built-in one.
    pub fn mapper(&self) -> anyhow::Result<ControlMapper> {
        match &self.mapper {
            Some(settings) => settings.to_mapper(),
            None => Ok(ControlMapper::default()),
        }
    }
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_speed_multiplier() -> i32 {
    DEFAULT_SPEED_MULTIPLIER
}

fn default_open_timeout_ms() -> u64 {
    500
}

fn default_write_timeout_ms() -> u64 {
    100
}

fn default_model_path() -> PathBuf {
    PathBuf::from("pytorch_mobilenet.onnx")
}

fn default_labels_path() -> PathBuf {
    PathBuf::from("imagenet_classes.txt")
}

fn default_request_timeout_ms() -> u64 {
    2000
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_frame_queue() -> usize {
    4
}

fn default_fallback() -> ActionConfig {
    ActionConfig::Drive {
        left: 0.0,
        right: 0.0,
    }
}

/// Load `config/vehicle.toml`, overridden by `PILOT__SECTION__KEY` variables.
pub fn load_pilot_config() -> anyhow::Result<PilotConfig> {
    build_config(config::File::with_name("config/vehicle"))
}

fn build_config<S>(file: S) -> anyhow::Result<PilotConfig>
where
    S: config::Source + Send + Sync + 'static,
{
    let settings = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix("PILOT")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: PilotConfig = settings.try_deserialize()?;
    config.mapper()?;
    Ok(config)
}

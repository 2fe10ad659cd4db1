use crate::domain::equipment::EntityId;
use crate::domain::error::MeterResult;
use crate::domain::time_grid::{interval_from_minutes, AnalysisWindow};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    pub topology: TopologySettings,
    pub influx: InfluxSettings,
    pub analysis: AnalysisSettings,
    #[serde(default)]
    pub plant: PlantSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TopologySettings {
    Sparql {
        endpoint: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    File {
        path: String,
    },
}

#[derive(Debug, Deserialize, Clone)]
pub struct InfluxSettings {
    pub host: String,
    pub token: String,
    pub database: String,
    pub retention_policy: String,
    #[serde(default = "default_measurement")]
    pub measurement: String,
    #[serde(default = "default_tag_key")]
    pub tag_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Default analysis window; HTTP requests may override any part of it.
#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisSettings {
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: i64,
    #[serde(default = "default_fetch_margin_minutes")]
    pub fetch_margin_minutes: i64,
}

impl AnalysisSettings {
    pub fn window(&self) -> MeterResult<AnalysisWindow> {
        AnalysisWindow::new(self.begin, self.end, interval_from_minutes(self.interval_minutes)?)
    }

    pub fn fetch_margin(&self) -> Duration {
        Duration::try_minutes(self.fetch_margin_minutes.max(0)).unwrap_or(Duration::zero())
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PlantSettings {
    /// Plant entity to meter; discovered from the topology when unset.
    pub entity: Option<EntityId>,
    /// Substring a building-wide chilled-water flow sensor's source id must contain.
    pub srcid_contains: Option<String>,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_measurement() -> String {
    "timeseries".to_string()
}

fn default_tag_key() -> String {
    "srcid".to_string()
}

fn default_interval_minutes() -> i64 {
    5
}

fn default_fetch_margin_minutes() -> i64 {
    60
}

/// Load `config/hvacmeter.*`, overridden by `HVACMETER__SECTION__KEY` variables.
pub fn load_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/hvacmeter"))
        .add_source(
            config::Environment::with_prefix("HVACMETER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

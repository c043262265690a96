use crate::models::ScoringWeights;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    #[serde(default)]
    pub catalog: CatalogSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub related: RelatedSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogSettings {
    /// Base URL of the catalog API
    #[serde(default)]
    pub endpoint: String,
    pub api_key: Option<String>,
    /// JSON seed file used instead of the API when set
    pub seed_file: Option<String>,
    pub timeout_secs: Option<u64>,
    pub per_page: Option<u32>,
}

impl CatalogSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(30))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheSettings {
    /// Shared L2 store; without it the snapshot lives in process only
    pub redis_url: Option<String>,
    pub ttl_secs: Option<u64>,
    pub l1_capacity: Option<u64>,
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs.unwrap_or(default_ttl_secs()))
    }
}

fn default_ttl_secs() -> u64 { 6 * 60 * 60 }

#[derive(Debug, Clone, Deserialize)]
pub struct RelatedSettings {
    #[serde(default = "default_count")]
    pub default_count: usize,
    #[serde(default = "default_max_count")]
    pub max_count: usize,
}

impl Default for RelatedSettings {
    fn default() -> Self {
        Self {
            default_count: default_count(),
            max_count: default_max_count(),
        }
    }
}

fn default_count() -> usize { 5 }
fn default_max_count() -> usize { 50 }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoringSettings {
    #[serde(default)]
    pub weights: WeightsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_fragrance_type_weight")]
    pub fragrance_type: f64,
    #[serde(default = "default_main_note_weight")]
    pub main_note: f64,
    #[serde(default = "default_concentration_weight")]
    pub concentration: f64,
    #[serde(default = "default_top_notes_weight")]
    pub top_notes: f64,
    #[serde(default = "default_middle_notes_weight")]
    pub middle_notes: f64,
    #[serde(default = "default_base_notes_weight")]
    pub base_notes: f64,
    #[serde(default = "default_note_bonus_weight")]
    pub note_bonus: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            fragrance_type: default_fragrance_type_weight(),
            main_note: default_main_note_weight(),
            concentration: default_concentration_weight(),
            top_notes: default_top_notes_weight(),
            middle_notes: default_middle_notes_weight(),
            base_notes: default_base_notes_weight(),
            note_bonus: default_note_bonus_weight(),
        }
    }
}

impl From<&WeightsConfig> for ScoringWeights {
    fn from(config: &WeightsConfig) -> Self {
        Self {
            fragrance_type: config.fragrance_type,
            main_note: config.main_note,
            concentration: config.concentration,
            top_notes: config.top_notes,
            middle_notes: config.middle_notes,
            base_notes: config.base_notes,
            note_bonus: config.note_bonus,
        }
    }
}

fn default_fragrance_type_weight() -> f64 { 20.0 }
fn default_main_note_weight() -> f64 { 10.0 }
fn default_concentration_weight() -> f64 { 5.0 }
fn default_top_notes_weight() -> f64 { 5.0 }
fn default_middle_notes_weight() -> f64 { 5.0 }
fn default_base_notes_weight() -> f64 { 15.0 }
fn default_note_bonus_weight() -> f64 { 40.0 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with SIMILAR_)
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., SIMILAR__CACHE__REDIS_URL -> cache.redis_url
            .add_source(
                Environment::with_prefix("SIMILAR")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("SIMILAR")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

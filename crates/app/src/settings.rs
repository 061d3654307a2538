use std::path::PathBuf;

use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use intake_llm::{DEFAULT_OPENAI_MODEL, ProviderConfig};
use intake_tracker::{DEFAULT_LINEAR_ENDPOINT, LinearConfig};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

pub const DEFAULT_PROVIDER_ID: &str = "openai";
pub const DEFAULT_PROVIDER_ENDPOINT: &str = "https://api.openai.com/v1";
pub const SETTINGS_DIRECTORY_NAME: &str = "intake";
pub const SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_provider_id")]
    pub provider_id: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_provider_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            provider_id: default_provider_id(),
            api_key: String::new(),
            endpoint: default_provider_endpoint(),
            model: default_model(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerSettings {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(default = "default_tracker_endpoint")]
    pub endpoint: String,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            team_id: String::new(),
            endpoint: default_tracker_endpoint(),
        }
    }
}

/// Process settings: defaults, then the JSON file, then `INTAKE_*`
/// environment overrides (e.g. `INTAKE_PROVIDER__API_KEY`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub tracker: TrackerSettings,
}

#[derive(Debug, Snafu)]
pub enum SettingsError {
    #[snafu(display("failed to load settings: {source}"))]
    ExtractSettings {
        stage: &'static str,
        source: figment::Error,
    },
}

pub type SettingsResult<T> = Result<T, SettingsError>;

impl Settings {
    /// Settings file location under the platform config directory.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(SETTINGS_DIRECTORY_NAME).join(SETTINGS_FILE_NAME))
    }

    pub fn load() -> SettingsResult<Self> {
        Self::load_from(Self::config_path())
    }

    pub fn load_from(path: Option<PathBuf>) -> SettingsResult<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(path) = path {
            figment = figment.merge(Json::file(path));
        }

        figment
            .merge(Env::prefixed("INTAKE_").split("__"))
            .extract()
            .context(ExtractSettingsSnafu {
                stage: "extract-settings",
            })
    }

    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig::new(
            &self.provider.provider_id,
            &self.provider.api_key,
            &self.provider.endpoint,
            Some(self.provider.model.clone()),
        )
    }

    pub fn linear_config(&self) -> LinearConfig {
        LinearConfig::new(&self.tracker.api_key, &self.tracker.team_id)
            .with_endpoint(&self.tracker.endpoint)
    }
}

fn default_provider_id() -> String {
    DEFAULT_PROVIDER_ID.to_string()
}

fn default_provider_endpoint() -> String {
    DEFAULT_PROVIDER_ENDPOINT.to_string()
}

fn default_model() -> String {
    DEFAULT_OPENAI_MODEL.to_string()
}

fn default_tracker_endpoint() -> String {
    DEFAULT_LINEAR_ENDPOINT.to_string()
}

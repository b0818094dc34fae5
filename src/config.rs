use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use secrecy::Secret;
use serde::{Deserialize, Serialize};

use crate::forecast::ServiceTarget;
use crate::pipeline::PipelineConfig;
use crate::provider::{ProviderKind, ProviderSettings};
use crate::reasoning::orchestrator::ReasoningSettings;
use crate::scenario::{PricingTable, DEFAULT_COST_PER_AGENT_ANNUAL};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub reasoning: ReasoningConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    #[serde(default = "default_base_target_sla")]
    pub base_target_sla: f64,
    #[serde(default = "default_target_answer_secs")]
    pub target_answer_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingConfig {
    #[serde(default = "default_cost_per_agent_annual")]
    pub cost_per_agent_annual: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderKind,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReasoningConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub provider: Option<ProviderKind>,
    pub model: Option<String>,
    pub cost_per_agent_annual: Option<f64>,
    pub max_retries: Option<u32>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/staffing-oracle/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        Ok(parsed)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(kind) = overrides.provider {
            self.provider.kind = kind;
        }
        if let Some(model) = overrides.model {
            self.provider.model = model;
        }
        if let Some(cost) = overrides.cost_per_agent_annual {
            self.pricing.cost_per_agent_annual = cost;
        }
        if let Some(max_retries) = overrides.max_retries {
            self.reasoning.max_retries = max_retries;
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    /// Core settings for the pipeline. Fails on out-of-range engine or
    /// pricing values.
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let base_target =
            ServiceTarget::new(self.engine.base_target_sla, self.engine.target_answer_secs)
                .context("invalid [engine] section")?;
        let pricing = PricingTable::new(self.pricing.cost_per_agent_annual)
            .context("invalid [pricing] section")?;
        Ok(PipelineConfig {
            base_target,
            pricing,
            reasoning: ReasoningSettings {
                timeout: Duration::from_secs(self.provider.timeout_secs),
                max_retries: self.reasoning.max_retries,
            },
        })
    }

    /// Provider settings with the key already resolved by the caller; the
    /// library never reads the environment itself.
    pub fn provider_settings(&self, api_key: Option<String>) -> ProviderSettings {
        ProviderSettings {
            kind: self.provider.kind,
            model: self.provider.model.clone(),
            base_url: self.provider.base_url.clone(),
            api_key: api_key.filter(|k| !k.trim().is_empty()).map(Secret::new),
            timeout: Duration::from_secs(self.provider.timeout_secs),
            temperature: self.provider.temperature,
        }
    }

    pub fn default_template() -> String {
        let template = r#"[engine]
base_target_sla = 0.8
target_answer_secs = 60.0

[pricing]
cost_per_agent_annual = 55000.0

[provider]
# "dummy" answers offline; "live" calls an OpenAI-compatible endpoint
kind = "dummy"
model = "gpt-4.1-mini"
base_url = "https://api.openai.com/v1"
api_key_env = "OPENAI_API_KEY"
timeout_secs = 30
temperature = 0.2

[reasoning]
max_retries = 1
"#;
        template.to_string()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_target_sla: default_base_target_sla(),
            target_answer_secs: default_target_answer_secs(),
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            cost_per_agent_annual: default_cost_per_agent_annual(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
        }
    }
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
        }
    }
}

fn default_base_target_sla() -> f64 {
    0.8
}

fn default_target_answer_secs() -> f64 {
    60.0
}

fn default_cost_per_agent_annual() -> f64 {
    DEFAULT_COST_PER_AGENT_ANNUAL
}

fn default_model() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_temperature() -> f64 {
    0.2
}

fn default_max_retries() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::{Config, ConfigOverrides};
    use crate::provider::ProviderKind;

    #[test]
    fn template_round_trips_to_defaults() {
        let parsed: Config = toml::from_str(&Config::default_template()).expect("template toml");
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[provider]\nkind = \"live\"\n").expect("toml");
        assert_eq!(parsed.provider.kind, ProviderKind::Live);
        assert_eq!(parsed.provider.model, "gpt-4.1-mini");
        assert_eq!(parsed.reasoning.max_retries, 1);
        assert_eq!(parsed.pricing.cost_per_agent_annual, 55_000.0);
    }

    #[test]
    fn overrides_win_and_feed_the_pipeline() {
        let mut config = Config::default();
        config.apply_overrides(ConfigOverrides {
            provider: Some(ProviderKind::Live),
            model: Some("gpt-4o".to_string()),
            cost_per_agent_annual: Some(50_000.0),
            max_retries: Some(3),
        });
        let pipeline = config.pipeline_config().expect("pipeline config");
        assert_eq!(pipeline.pricing.cost_per_agent_annual(), 50_000.0);
        assert_eq!(pipeline.reasoning.max_retries, 3);

        let settings = config.provider_settings(Some("sk-abc".to_string()));
        assert_eq!(settings.model, "gpt-4o");
        assert_eq!(
            settings.api_key.as_ref().map(|k| k.expose_secret().as_str()),
            Some("sk-abc")
        );
        assert!(config.provider_settings(Some("  ".to_string())).api_key.is_none());
    }

    #[test]
    fn out_of_range_engine_section_is_rejected() {
        let parsed: Config = toml::from_str("[engine]\nbase_target_sla = 1.2\n").expect("toml");
        assert!(parsed.pipeline_config().is_err());
    }

    #[test]
    fn negative_pricing_is_rejected() {
        let parsed: Config =
            toml::from_str("[pricing]\ncost_per_agent_annual = -10.0\n").expect("toml");
        let err = parsed.pipeline_config().unwrap_err();
        assert!(format!("{err:#}").contains("cost_per_agent_annual"));
    }

    #[test]
    fn missing_file_means_defaults() {
        let path = std::env::temp_dir().join("staffing-oracle-missing-config.toml");
        let loaded = Config::load(Some(path.as_path())).expect("defaults");
        assert_eq!(loaded, Config::default());
    }
}

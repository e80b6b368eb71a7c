mod defaults;
mod types;

pub use types::*;

use crate::error::ConfigError;
use defaults::*;
use std::path::Path;
use tracing::debug;

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            mode: RunMode::default(),
            skills: SkillsConfig::default(),
            provider: Provider::default(),
            providers: ProvidersConfig::default(),
            timeout_sec: default_timeout_sec(),
            report_dir: default_report_dir(),
            checkpoint_dir: default_checkpoint_dir(),
            valuation: ValuationConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields the defaults
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!("No config at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Validate the config
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_sec == 0 {
            return Err(ConfigError::Invalid(
                "timeout_sec must be greater than zero".to_string(),
            ));
        }

        if self.skills.manifest.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "skills.manifest must not be empty".to_string(),
            ));
        }

        if self.provider == Provider::Fixture && self.providers.fixture.path.is_none() {
            return Err(ConfigError::Invalid(
                "provider 'fixture' requires providers.fixture.path".to_string(),
            ));
        }

        if !self.valuation.repair_estimate.is_finite() || self.valuation.repair_estimate < 0.0 {
            return Err(ConfigError::Invalid(
                "valuation.repair_estimate must be a non-negative number".to_string(),
            ));
        }

        Ok(())
    }
}

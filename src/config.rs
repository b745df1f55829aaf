use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{DATA_API_BASE, PROFILE_API_URL};

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Data API endpoints and pagination limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_data_api_base")]
    pub data_api_base: String,
    #[serde(default = "default_profile_api_base")]
    pub profile_api_base: String,
    /// Activities requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Stop paginating once this many activities were fetched.
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    #[serde(default = "default_page_timeout")]
    pub page_timeout_secs: u64,
}

/// Heatmap and history presentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Rows shown in the activity history list.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_width")]
    pub default_width_px: u32,
    #[serde(default = "default_height")]
    pub default_height_px: u32,
}

fn default_data_api_base() -> String {
    DATA_API_BASE.to_string()
}

fn default_profile_api_base() -> String {
    PROFILE_API_URL.to_string()
}

fn default_page_size() -> u32 {
    500
}

fn default_max_items() -> usize {
    50_000
}

fn default_page_timeout() -> u64 {
    30
}

fn default_history_limit() -> usize {
    50
}

fn default_width() -> u32 {
    720
}

fn default_height() -> u32 {
    112
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            data_api_base: default_data_api_base(),
            profile_api_base: default_profile_api_base(),
            page_size: default_page_size(),
            max_items: default_max_items(),
            page_timeout_secs: default_page_timeout(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            default_width_px: default_width(),
            default_height_px: default_height(),
        }
    }
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from `path`, or defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write config to the given TOML file path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        Url::parse(&self.api.data_api_base)
            .with_context(|| format!("invalid api.data_api_base {:?}", self.api.data_api_base))?;
        Url::parse(&self.api.profile_api_base).with_context(|| {
            format!("invalid api.profile_api_base {:?}", self.api.profile_api_base)
        })?;
        if self.api.page_size == 0 {
            anyhow::bail!("api.page_size must be positive");
        }
        if self.api.max_items == 0 {
            anyhow::bail!("api.max_items must be positive");
        }
        // Page offsets are sent as u32.
        if u32::try_from(self.api.max_items).is_err() {
            anyhow::bail!("api.max_items must not exceed {}", u32::MAX);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.api.page_size, 500);
        assert_eq!(config.api.max_items, 50_000);
        assert_eq!(config.api.page_timeout_secs, 30);
        assert_eq!(config.api.data_api_base, DATA_API_BASE);
        assert_eq!(config.display.history_limit, 50);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [api]
            page_size = 100

            [display]
            default_width_px = 300
            "#,
        )
        .unwrap();
        assert_eq!(config.api.page_size, 100);
        assert_eq!(config.api.max_items, 50_000);
        assert_eq!(config.display.default_width_px, 300);
        assert_eq!(config.display.default_height_px, 112);
    }

    #[test]
    fn save_then_load() {
        let path = std::env::temp_dir().join(format!("tracker-config-{}.toml", std::process::id()));
        let mut config = AppConfig::default();
        config.api.page_timeout_secs = 5;
        config.save(&path).unwrap();
        let loaded = AppConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.api.page_timeout_secs, 5);
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = AppConfig::default();
        config.api.page_size = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.api.data_api_base = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.api.max_items = u32::MAX as usize;
        assert!(config.validate().is_ok());
        config.api.max_items = u32::MAX as usize + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_is_default() {
        let path = Path::new("/nonexistent/tracker/config.toml");
        let config = AppConfig::load_or_default(path).unwrap();
        assert_eq!(config.api.page_size, 500);
    }
}

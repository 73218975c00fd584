use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Optional `#RRGGBB` overrides for the TUI palette.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ThemeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub danger: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_dim: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bg_selected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inactive: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Card file location (defaults to the user data directory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_file: Option<PathBuf>,

    /// Create the example card when no card file exists yet
    #[serde(default = "default_true")]
    pub seed_example: bool,

    /// Desktop notifications for CLI actions
    #[serde(default)]
    pub notifications: bool,

    /// Prefill for the add-card form
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_outward_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_return_price: Option<String>,

    #[serde(default)]
    pub theme: ThemeConfig,
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_file: None,
            seed_example: true,
            notifications: false,
            default_outward_price: None,
            default_return_price: None,
            theme: ThemeConfig::default(),
        }
    }
}

impl AppConfig {
    /// Get the config file path
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("rechargecard");

        if let Err(e) = std::fs::create_dir_all(&config_dir) {
            tracing::warn!("Could not create config directory: {}", e);
        }

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from file, or create default
    pub fn load() -> Result<Self> {
        let path = match Self::config_path() {
            Ok(p) => p,
            Err(_) => return Ok(AppConfig::default()),
        };

        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(content) => match Self::parse(&content) {
                    Ok(config) => return Ok(config),
                    Err(e) => tracing::warn!("Failed to parse config: {}", e),
                },
                Err(e) => tracing::warn!("Failed to read config: {}", e),
            }
            // Keep the broken file for the user to fix
            return Ok(AppConfig::default());
        }

        let config = AppConfig::default();
        let _ = config.save();
        Ok(config)
    }

    fn parse(content: &str) -> Result<Self> {
        let mut config: AppConfig = toml::from_str(content)?;

        // Blank prefill strings behave like unset ones
        for price in [&mut config.default_outward_price, &mut config.default_return_price] {
            if price.as_ref().map(|s| s.trim().is_empty()).unwrap_or(false) {
                *price = None;
            }
        }

        Ok(config)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serialization() {
        let config = AppConfig {
            data_file: Some(PathBuf::from("/tmp/cards.json")),
            seed_example: false,
            notifications: true,
            default_outward_price: Some("1.45".to_string()),
            default_return_price: None,
            theme: ThemeConfig {
                accent: Some("#FFC107".to_string()),
                ..ThemeConfig::default()
            },
        };

        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized = AppConfig::parse(&serialized).unwrap();

        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(config.seed_example);
    }

    #[test]
    fn test_blank_prefill_is_unset() {
        let config = AppConfig::parse("default_outward_price = \"  \"\ndefault_return_price = \"2.10\"\n").unwrap();
        assert_eq!(config.default_outward_price, None);
        assert_eq!(config.default_return_price.as_deref(), Some("2.10"));
    }
}

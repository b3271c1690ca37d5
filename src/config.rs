use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{BotError, Result};

/// Default numeric-prefix patterns, applied in order when stripping
/// nicknames. Covers "01. Name", "01 || Name", "01 Name", "01 - Name"
/// and "[01] Name".
pub const DEFAULT_NUMBER_FORMATS: [&str; 5] = [
    r"^\d+\.\s*",
    r"^\d+\s*\|\|\s*",
    r"^\d+\s*",
    r"^\d+\s*-\s*",
    r"^\[\d+\]\s*",
];

/// Feature toggles
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Features {
    /// When disabled, host-level commands only require standard access.
    pub auto_save_hosts: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            auto_save_hosts: true,
        }
    }
}

/// Process-wide bot configuration, built once at startup and shared
/// immutably. Loaded from config.json with environment overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BotConfig {
    /// Path to the SQLite database file
    pub database_path: String,

    /// User IDs that are granted every permission level everywhere
    pub global_admins: Vec<u64>,

    /// Ordered regex patterns removed from nicknames when stripping numbers
    pub number_formats: Vec<String>,

    /// Zero-padding width for assigned numbers ("03. Name")
    pub number_width: usize,

    pub features: Features,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            database_path: "data/bot.db".to_string(),
            global_admins: Vec::new(),
            number_formats: DEFAULT_NUMBER_FORMATS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            number_width: 2,
            features: Features::default(),
        }
    }
}

impl BotConfig {
    /// Load from a JSON file, falling back to defaults if the file does
    /// not exist. Environment overrides are applied afterwards.
    pub fn load(path: &str) -> Result<Self> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => {
                let config: BotConfig =
                    serde_json::from_str(&content).map_err(|e| BotError::ConfigParse {
                        path: path.to_string(),
                        source: e,
                    })?;
                info!("Configuration loaded from {}", path);
                config
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No config file at {}, using defaults", path);
                Self::default()
            }
            Err(e) => {
                return Err(BotError::ConfigLoad {
                    path: path.to_string(),
                    source: e,
                })
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Override file values from environment variables
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("DATABASE_PATH") {
            self.database_path = path;
        }

        if let Ok(admins) = std::env::var("GLOBAL_ADMINS") {
            let parsed: Vec<u64> = admins
                .split(',')
                .filter_map(|s| {
                    let s = s.trim();
                    if s.is_empty() {
                        return None;
                    }
                    match s.parse() {
                        Ok(id) => Some(id),
                        Err(_) => {
                            warn!("Ignoring invalid GLOBAL_ADMINS entry: '{}'", s);
                            None
                        }
                    }
                })
                .collect();
            self.global_admins = parsed;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.number_formats.is_empty() {
            return Err(BotError::ConfigValidation {
                message: "number_formats must contain at least one pattern".to_string(),
            });
        }
        if self.number_width == 0 || self.number_width > 4 {
            return Err(BotError::ConfigValidation {
                message: format!("number_width {} out of range 1..=4", self.number_width),
            });
        }
        Ok(())
    }

    /// Whether a user is on the process-wide admin allowlist
    pub fn is_global_admin(&self, user_id: u64) -> bool {
        self.global_admins.contains(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BotConfig::default();
        assert_eq!(config.number_formats.len(), 5);
        assert_eq!(config.number_width, 2);
        assert!(config.features.auto_save_hosts);
        assert!(!config.is_global_admin(42));
    }

    #[test]
    fn test_parse_partial_config() {
        let json = r#"{
            "global_admins": [123456789],
            "features": { "auto_save_hosts": false }
        }"#;

        let config: BotConfig = serde_json::from_str(json).unwrap();
        assert!(config.is_global_admin(123456789));
        assert!(!config.features.auto_save_hosts);
        // Unset fields keep their defaults
        assert_eq!(config.database_path, "data/bot.db");
        assert_eq!(config.number_formats.len(), 5);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let json = r#"{ "databse_path": "typo.db" }"#;
        assert!(serde_json::from_str::<BotConfig>(json).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_patterns() {
        let config = BotConfig {
            number_formats: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}

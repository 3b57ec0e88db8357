use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    pub trello: Option<TrelloConfig>,
    pub youtrack: Option<YouTrackConfig>,
    #[serde(default)]
    pub migration: MigrationConfig,
}

#[derive(Debug, Deserialize, Default)]
pub struct TrelloConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct YouTrackConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct MigrationConfig {
    /// Path to the user mapping JSON file.
    pub user_mapping: Option<PathBuf>,
    /// Destination login assigned when a source member has no mapping.
    pub default_assignee: Option<String>,
}

fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cardlift")
        .join("config.toml")
}

pub fn load_config() -> Result<AppConfig> {
    let path = config_path();
    let mut config = if path.exists() {
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        toml::from_str(&contents).with_context(|| "Failed to parse config.toml")?
    } else {
        AppConfig::default()
    };
    apply_env(&mut config, |name| std::env::var(name).ok());
    Ok(config)
}

/// Environment variables override file values, using the names the tool has
/// always honored in `.env` setups.
fn apply_env(config: &mut AppConfig, get: impl Fn(&str) -> Option<String>) {
    if let Some(key) = get("TRELLO_API_KEY") {
        config.trello.get_or_insert_with(Default::default).api_key = key;
    }
    if let Some(token) = get("TRELLO_API_TOKEN") {
        config.trello.get_or_insert_with(Default::default).token = token;
    }
    if let Some(url) = get("YOUTRACK_URL") {
        config.youtrack.get_or_insert_with(Default::default).base_url = url;
    }
    if let Some(token) = get("YOUTRACK_API_TOKEN") {
        config.youtrack.get_or_insert_with(Default::default).token = token;
    }
}

impl AppConfig {
    pub fn trello(&self) -> Result<&TrelloConfig> {
        match &self.trello {
            Some(cfg) if !cfg.api_key.is_empty() && !cfg.token.is_empty() => Ok(cfg),
            _ => bail!(
                "Missing Trello credentials. Add [trello] api_key/token to ~/.cardlift/config.toml \
                 or set TRELLO_API_KEY and TRELLO_API_TOKEN"
            ),
        }
    }

    pub fn youtrack(&self) -> Result<&YouTrackConfig> {
        match &self.youtrack {
            Some(cfg) if !cfg.base_url.is_empty() && !cfg.token.is_empty() => Ok(cfg),
            _ => bail!(
                "Missing YouTrack credentials. Add [youtrack] base_url/token to \
                 ~/.cardlift/config.toml or set YOUTRACK_URL and YOUTRACK_API_TOKEN"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn parses_full_config() {
        let toml = r#"
            [trello]
            api_key = "key"
            token = "tok"

            [youtrack]
            base_url = "https://x.youtrack.cloud"
            token = "perm:abc"

            [migration]
            user_mapping = "user_mapping.json"
            default_assignee = "triage.bot"
        "#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.trello().unwrap().api_key, "key");
        assert_eq!(config.youtrack().unwrap().base_url, "https://x.youtrack.cloud");
        assert_eq!(
            config.migration.default_assignee.as_deref(),
            Some("triage.bot")
        );
    }

    #[test]
    fn missing_sections_are_a_config_error() {
        let config = AppConfig::default();
        assert!(config.trello().is_err());
        assert!(config.youtrack().is_err());
    }

    #[test]
    fn env_overrides_file_values() {
        let toml = r#"
            [trello]
            api_key = "file-key"
            token = "file-tok"
        "#;
        let mut config: AppConfig = toml::from_str(toml).unwrap();
        let env: HashMap<&str, &str> = [
            ("TRELLO_API_KEY", "env-key"),
            ("YOUTRACK_URL", "https://env.youtrack.cloud"),
            ("YOUTRACK_API_TOKEN", "perm:env"),
        ]
        .into_iter()
        .collect();
        apply_env(&mut config, |name| env.get(name).map(|v| v.to_string()));

        let trello = config.trello().unwrap();
        assert_eq!(trello.api_key, "env-key");
        assert_eq!(trello.token, "file-tok");
        assert_eq!(config.youtrack().unwrap().token, "perm:env");
    }

    #[test]
    fn partial_trello_credentials_still_error() {
        let mut config = AppConfig::default();
        apply_env(&mut config, |name| {
            (name == "TRELLO_API_KEY").then(|| "only-key".to_string())
        });
        assert!(config.trello().is_err());
    }
}

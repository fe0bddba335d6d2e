//! Configuration loader: TOML file plus environment overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscordConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Channel where every plain message is relayed, no binding required.
    #[serde(default)]
    pub home_channel_id: Option<String>,
    /// Parent channel that hosts threads started by the converse command.
    #[serde(default)]
    pub thread_parent_id: Option<String>,
    /// Guild to scope command registration to; global when unset.
    #[serde(default)]
    pub guild_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeConfig {
    /// Path to the sqlite file backing session bindings across restarts.
    /// Bindings live only for the process lifetime when unset.
    #[serde(default)]
    pub sessions_db: Option<String>,
}

impl AppConfig {
    /// Load from `path` (default `~/.coral/config.toml`). A missing file is
    /// not an error: the relay is commonly deployed with environment
    /// variables only, so overrides are applied on top of an empty config.
    pub async fn load(path: Option<PathBuf>) -> anyhow::Result<Self> {
        let path = path.unwrap_or_else(default_config_path);
        let mut cfg = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => toml::from_str(&contents)
                .map_err(|e| anyhow::anyhow!("parse config {}: {e}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
            Err(e) => return Err(anyhow::anyhow!("read config {}: {e}", path.display())),
        };

        cfg.apply_env_overrides();
        cfg.normalize();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("DISCORD_BOT_TOKEN") {
            if !v.trim().is_empty() {
                self.discord.bot_token = v;
            }
        }
        if let Ok(v) = std::env::var("DISCORD_CHANNEL_ID") {
            self.discord.home_channel_id = Some(v);
        }
        if let Ok(v) = std::env::var("DISCORD_THREAD_PARENT_ID") {
            self.discord.thread_parent_id = Some(v);
        }
        if let Ok(v) = std::env::var("DISCORD_GUILD_ID") {
            self.discord.guild_id = Some(v);
        }
        if let Ok(v) = std::env::var("BACKEND_BASE_URL") {
            if !v.trim().is_empty() {
                self.backend.base_url = v;
            }
        }
        if let Ok(v) = std::env::var("BACKEND_API_KEY") {
            self.backend.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("CORAL_SESSIONS_DB") {
            self.runtime.sessions_db = Some(v);
        }
    }

    /// Collapse blank optionals to `None` so "set but empty" behaves like
    /// "unset" for the flow gates.
    fn normalize(&mut self) {
        for field in [
            &mut self.discord.home_channel_id,
            &mut self.discord.thread_parent_id,
            &mut self.discord.guild_id,
            &mut self.backend.api_key,
            &mut self.runtime.sessions_db,
        ] {
            if field.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *field = None;
            }
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.discord.bot_token.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "discord.bot_token is required (or DISCORD_BOT_TOKEN)"
            ));
        }
        if self.backend.base_url.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "backend.base_url is required (or BACKEND_BASE_URL)"
            ));
        }
        Ok(())
    }
}

pub fn default_config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".coral").join("config.toml")
}

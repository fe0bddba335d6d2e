use crate::error::{DiscordError, Result};
use crate::traits::ChatApi;
use crate::types::{ChannelId, CommandSpec, InteractionHandle, ThreadId};
use async_trait::async_trait;
use serde::Deserialize;

const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Hard cap the platform enforces on a thread name.
pub const THREAD_NAME_LIMIT: usize = 100;

// Interaction callback types.
const CHANNEL_MESSAGE_WITH_SOURCE: u8 = 4;
const DEFERRED_CHANNEL_MESSAGE_WITH_SOURCE: u8 = 5;

// Message flag marking a reply visible only to the invoking user.
const EPHEMERAL_FLAG: u64 = 1 << 6;

// Channel type for a public thread.
const PUBLIC_THREAD: u8 = 11;

#[derive(Clone)]
pub struct DiscordRestClient {
    http: reqwest::Client,
    bot_token: String,
}

impl DiscordRestClient {
    pub fn new(bot_token: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            bot_token: bot_token.to_string(),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{DISCORD_API_BASE}{path}")
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.bot_token)
    }

    /// Check the response status and hand back the body text; non-2xx turns
    /// into an error carrying both status and body.
    async fn checked_body(resp: reqwest::Response, what: &str) -> Result<String> {
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(DiscordError::Http(format!(
                "{what} failed: status={status} body={body}"
            )));
        }
        Ok(body)
    }

    fn interaction_data(content: Option<&str>, ephemeral: bool) -> serde_json::Value {
        let mut data = serde_json::Map::new();
        if let Some(content) = content {
            data.insert("content".to_string(), content.into());
        }
        if ephemeral {
            data.insert("flags".to_string(), EPHEMERAL_FLAG.into());
        }
        serde_json::Value::Object(data)
    }

    async fn interaction_callback(
        &self,
        interaction: &InteractionHandle,
        kind: u8,
        data: serde_json::Value,
    ) -> Result<()> {
        let url = self.api_url(&format!(
            "/interactions/{}/{}/callback",
            interaction.id, interaction.token
        ));
        let body = serde_json::json!({ "type": kind, "data": data });
        let resp = self.http.post(url).json(&body).send().await?;
        Self::checked_body(resp, "interaction callback").await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct CreatedThread {
    id: String,
}

#[async_trait]
impl ChatApi for DiscordRestClient {
    async fn send_message(&self, channel_id: &ChannelId, content: &str) -> Result<()> {
        let url = self.api_url(&format!("/channels/{channel_id}/messages"));
        let body = serde_json::json!({ "content": content });
        let resp = self
            .http
            .post(url)
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await?;
        Self::checked_body(resp, "message send").await?;
        Ok(())
    }

    async fn create_thread(
        &self,
        parent_id: &ChannelId,
        name: &str,
        auto_archive_minutes: u32,
    ) -> Result<ThreadId> {
        let url = self.api_url(&format!("/channels/{parent_id}/threads"));
        let body = serde_json::json!({
            "name": name,
            "auto_archive_duration": auto_archive_minutes,
            "type": PUBLIC_THREAD,
        });
        let resp = self
            .http
            .post(url)
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await?;
        let body = Self::checked_body(resp, "thread create").await?;
        let created: CreatedThread = serde_json::from_str(&body)?;
        Ok(ThreadId::new(created.id))
    }

    async fn respond_interaction(
        &self,
        interaction: &InteractionHandle,
        content: &str,
        ephemeral: bool,
    ) -> Result<()> {
        self.interaction_callback(
            interaction,
            CHANNEL_MESSAGE_WITH_SOURCE,
            Self::interaction_data(Some(content), ephemeral),
        )
        .await
    }

    async fn defer_interaction(
        &self,
        interaction: &InteractionHandle,
        ephemeral: bool,
    ) -> Result<()> {
        self.interaction_callback(
            interaction,
            DEFERRED_CHANNEL_MESSAGE_WITH_SOURCE,
            Self::interaction_data(None, ephemeral),
        )
        .await
    }

    async fn edit_original_response(
        &self,
        interaction: &InteractionHandle,
        content: &str,
    ) -> Result<()> {
        let url = self.api_url(&format!(
            "/webhooks/{}/{}/messages/@original",
            interaction.application_id, interaction.token
        ));
        let body = serde_json::json!({ "content": content });
        let resp = self.http.patch(url).json(&body).send().await?;
        Self::checked_body(resp, "deferred reply edit").await?;
        Ok(())
    }

    async fn create_followup(&self, interaction: &InteractionHandle, content: &str) -> Result<()> {
        let url = self.api_url(&format!(
            "/webhooks/{}/{}",
            interaction.application_id, interaction.token
        ));
        let body = serde_json::json!({ "content": content });
        let resp = self.http.post(url).json(&body).send().await?;
        Self::checked_body(resp, "followup send").await?;
        Ok(())
    }

    async fn register_commands(
        &self,
        application_id: &str,
        guild_id: Option<&str>,
        commands: &[CommandSpec],
    ) -> Result<()> {
        let url = match guild_id {
            Some(guild) => {
                self.api_url(&format!("/applications/{application_id}/guilds/{guild}/commands"))
            }
            None => self.api_url(&format!("/applications/{application_id}/commands")),
        };
        let resp = self
            .http
            .put(url)
            .header("Authorization", self.auth_header())
            .json(commands)
            .send()
            .await?;
        Self::checked_body(resp, "command registration").await?;
        Ok(())
    }
}

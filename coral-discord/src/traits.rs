use crate::error::Result;
use crate::types::{ChannelId, CommandSpec, InteractionHandle, ThreadId};
use async_trait::async_trait;

/// Platform operations the application layer depends on.
///
/// [`crate::DiscordRestClient`] is the production implementation; tests
/// substitute recording fakes.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Post a message into a channel or thread.
    async fn send_message(&self, channel_id: &ChannelId, content: &str) -> Result<()>;

    /// Create a public thread under a parent channel.
    async fn create_thread(
        &self,
        parent_id: &ChannelId,
        name: &str,
        auto_archive_minutes: u32,
    ) -> Result<ThreadId>;

    /// Immediate interaction reply. Counts as the one allowed acknowledgment.
    async fn respond_interaction(
        &self,
        interaction: &InteractionHandle,
        content: &str,
        ephemeral: bool,
    ) -> Result<()>;

    /// Deferred acknowledgment: shows a "thinking" placeholder and extends
    /// the response deadline.
    async fn defer_interaction(
        &self,
        interaction: &InteractionHandle,
        ephemeral: bool,
    ) -> Result<()>;

    /// Replace the deferred placeholder with real content.
    async fn edit_original_response(
        &self,
        interaction: &InteractionHandle,
        content: &str,
    ) -> Result<()>;

    /// Send an additional message tied to an already-answered interaction.
    async fn create_followup(&self, interaction: &InteractionHandle, content: &str) -> Result<()>;

    /// Overwrite the application's command set, guild-scoped when a guild id
    /// is given, global otherwise.
    async fn register_commands(
        &self,
        application_id: &str,
        guild_id: Option<&str>,
        commands: &[CommandSpec],
    ) -> Result<()>;
}

use crate::error::Result;
use crate::types::{ResponseEnvelope, Role, SessionId};
use async_trait::async_trait;

/// The conversational backend as the relay sees it: sessions are created
/// once per chat context, then fed messages one turn at a time.
#[async_trait]
pub trait ConversationBackend: Send + Sync {
    async fn create_session(&self) -> Result<SessionId>;

    async fn send_message(
        &self,
        session: &SessionId,
        role: Role,
        content: &str,
    ) -> Result<ResponseEnvelope>;
}

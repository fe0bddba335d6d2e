//! Interaction response protocol: one acknowledgment per interaction, in the
//! right order, with long content split across an edit plus followups.

use crate::chunk::{REPLY_CHUNK_LIMIT, split_message};
use crate::error::{DiscordError, Result};
use crate::traits::ChatApi;
use crate::types::InteractionHandle;
use std::sync::Arc;

/// Body used when a delivery would otherwise be empty; the platform rejects
/// empty message bodies.
pub const EMPTY_RESPONSE_PLACEHOLDER: &str = "(no response)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionState {
    Unacknowledged,
    Deferred,
    Responded,
}

impl InteractionState {
    fn name(self) -> &'static str {
        match self {
            Self::Unacknowledged => "unacknowledged",
            Self::Deferred => "deferred",
            Self::Responded => "responded",
        }
    }
}

/// Drives one interaction through its allowed transitions:
/// `Unacknowledged -> Responded` (immediate reply) or
/// `Unacknowledged -> Deferred -> Responded` (defer, then deliver).
///
/// A wrong-state call returns [`DiscordError::InvalidState`] and leaves both
/// the state and the platform untouched; callers are expected to sequence
/// correctly, so hitting that error is a defect rather than a condition to
/// recover from.
pub struct InteractionResponder {
    api: Arc<dyn ChatApi>,
    handle: InteractionHandle,
    state: InteractionState,
}

impl InteractionResponder {
    pub fn new(api: Arc<dyn ChatApi>, handle: InteractionHandle) -> Self {
        Self {
            api,
            handle,
            state: InteractionState::Unacknowledged,
        }
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    /// Immediate reply; must land before the platform's ack deadline. Used
    /// for validation failures that never reach the backend.
    pub async fn respond(&mut self, content: &str, ephemeral: bool) -> Result<()> {
        self.expect(InteractionState::Unacknowledged)?;
        self.api
            .respond_interaction(&self.handle, content, ephemeral)
            .await?;
        self.state = InteractionState::Responded;
        Ok(())
    }

    /// Acknowledge now, answer later. Extends the response deadline so a slow
    /// backend call can run after the ack.
    pub async fn defer(&mut self, ephemeral: bool) -> Result<()> {
        self.expect(InteractionState::Unacknowledged)?;
        self.api.defer_interaction(&self.handle, ephemeral).await?;
        self.state = InteractionState::Deferred;
        Ok(())
    }

    /// Replace the deferred placeholder with `content`: the first chunk edits
    /// the placeholder, the rest go out as ordered followups. Empty content
    /// is substituted with [`EMPTY_RESPONSE_PLACEHOLDER`].
    pub async fn deliver(&mut self, content: &str) -> Result<()> {
        self.expect(InteractionState::Deferred)?;
        let mut chunks = split_message(content, REPLY_CHUNK_LIMIT);
        if chunks.is_empty() {
            chunks.push(EMPTY_RESPONSE_PLACEHOLDER.to_string());
        }
        let Some((first, rest)) = chunks.split_first() else {
            return Ok(());
        };
        self.api.edit_original_response(&self.handle, first).await?;
        // The edit answered the interaction; followup failures no longer
        // change that.
        self.state = InteractionState::Responded;
        for chunk in rest {
            self.api.create_followup(&self.handle, chunk).await?;
        }
        Ok(())
    }

    fn expect(&self, required: InteractionState) -> Result<()> {
        if self.state == required {
            return Ok(());
        }
        Err(DiscordError::InvalidState {
            required: required.name(),
            actual: self.state.name(),
        })
    }
}

//! Discord platform layer for Coral.
//!
//! Pure I/O plus platform protocol: the gateway event source, the REST
//! client, the interaction response state machine, and message chunking.
//! Conversation semantics live in the application crate.

mod chunk;
mod error;
mod gateway;
mod interaction;
mod rest;
mod traits;
mod types;

pub use chunk::{MESSAGE_CONTENT_LIMIT, REPLY_CHUNK_LIMIT, split_message};
pub use error::{DiscordError, Result};
pub use gateway::DiscordGateway;
pub use interaction::{EMPTY_RESPONSE_PLACEHOLDER, InteractionResponder, InteractionState};
pub use rest::{DiscordRestClient, THREAD_NAME_LIMIT};
pub use traits::ChatApi;
pub use types::{
    ChannelId, CommandInvocation, CommandOption, CommandOptionSpec, CommandSpec, InboundEvent,
    InteractionHandle, InteractionId, MessageEvent, MessageId, ThreadId,
};

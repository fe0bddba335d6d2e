//! Gateway connection: feeds inbound platform events into the application's
//! event queue.

use crate::error::{DiscordError, Result};
use crate::types::{
    ChannelId, CommandInvocation, CommandOption, InboundEvent, InteractionHandle, InteractionId,
    MessageEvent, MessageId,
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

const GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

// GUILDS | GUILD_MESSAGES | MESSAGE_CONTENT.
const GATEWAY_INTENTS: u64 = (1 << 0) | (1 << 9) | (1 << 15);

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

// Interaction type for a slash-command invocation.
const APPLICATION_COMMAND: u8 = 2;

#[derive(Clone)]
pub struct DiscordGateway {
    bot_token: String,
}

impl DiscordGateway {
    pub fn new(bot_token: &str) -> Self {
        Self {
            bot_token: bot_token.to_string(),
        }
    }

    /// Run until cancelled. Connection loss is answered with a fresh connect
    /// after a fixed delay; a closed inbound queue ends the loop.
    pub async fn run(&self, tx: mpsc::Sender<InboundEvent>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                result = self.run_once(&tx) => match result {
                    Ok(()) => return,
                    Err(e) => tracing::warn!(%e, "gateway connection lost; reconnecting"),
                }
            }
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            }
        }
    }

    /// One gateway session: HELLO, IDENTIFY, heartbeat task, event dispatch.
    /// Returns `Ok(())` only when the inbound queue has been closed.
    async fn run_once(&self, tx: &mpsc::Sender<InboundEvent>) -> Result<()> {
        let (ws, _) = tokio_tungstenite::connect_async(GATEWAY_URL).await?;
        let (write, mut read) = ws.split();
        let write = Arc::new(Mutex::new(write));

        // HELLO.
        let heartbeat_interval_ms: u64 = if let Some(msg) = read.next().await {
            let msg = msg?;
            let v: serde_json::Value = serde_json::from_str(msg.to_text()?)?;
            v.get("d")
                .and_then(|d| d.get("heartbeat_interval"))
                .and_then(|x| x.as_u64())
                .ok_or_else(|| DiscordError::Gateway("HELLO missing heartbeat_interval".into()))?
        } else {
            return Err(DiscordError::Gateway("connection closed before HELLO".into()));
        };

        // IDENTIFY.
        let identify = serde_json::json!({
            "op": 2,
            "d": {
                "token": self.bot_token,
                "intents": GATEWAY_INTENTS,
                "properties": { "os": "linux", "browser": "coral", "device": "coral" }
            }
        });
        write
            .lock()
            .await
            .send(Message::Text(identify.to_string().into()))
            .await?;

        let seq: Arc<RwLock<Option<i64>>> = Arc::new(RwLock::new(None));

        // Heartbeat loop; ends when the connection's write half goes away.
        {
            let write = write.clone();
            let seq = seq.clone();
            tokio::spawn(async move {
                let mut interval =
                    tokio::time::interval(Duration::from_millis(heartbeat_interval_ms));
                loop {
                    interval.tick().await;
                    let s = *seq.read().await;
                    let payload = serde_json::json!({ "op": 1, "d": s });
                    if write
                        .lock()
                        .await
                        .send(Message::Text(payload.to_string().into()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            });
        }

        while let Some(msg) = read.next().await {
            let msg = msg?;
            let txt = msg.to_text()?;
            let v: serde_json::Value = serde_json::from_str(txt)?;

            if let Some(s) = v.get("s").and_then(|s| s.as_i64()) {
                *seq.write().await = Some(s);
            }

            let op = v
                .get("op")
                .and_then(|o| o.as_i64())
                .ok_or_else(|| DiscordError::Gateway("payload missing op".into()))?;
            match op {
                11 => continue,
                7 | 9 => {
                    return Err(DiscordError::Gateway(format!(
                        "server requested reconnect (op {op})"
                    )));
                }
                0 => {}
                _ => continue,
            }

            let Some(t) = v.get("t").and_then(|t| t.as_str()) else {
                continue;
            };
            let d = v
                .get("d")
                .ok_or_else(|| DiscordError::Gateway(format!("{t} missing payload")))?;

            if let Some(event) = parse_event(t, d)? {
                if tx.send(event).await.is_err() {
                    // Receiver gone: the application is shutting down.
                    return Ok(());
                }
            }
        }

        Err(DiscordError::Gateway("event stream ended unexpectedly".into()))
    }
}

/// Reduce a dispatch payload to an [`InboundEvent`]. Events the application
/// does not handle, and messages authored by bots, map to `None`.
fn parse_event(t: &str, d: &serde_json::Value) -> Result<Option<InboundEvent>> {
    match t {
        "READY" => {
            let ready: ReadyPayload = serde_json::from_value(d.clone())?;
            Ok(Some(InboundEvent::Ready {
                application_id: ready.application.id,
            }))
        }
        "MESSAGE_CREATE" => {
            let event: MessageCreatePayload = serde_json::from_value(d.clone())?;
            if event.author.bot {
                return Ok(None);
            }
            Ok(Some(InboundEvent::Message(MessageEvent {
                message_id: MessageId::new(event.id),
                channel_id: ChannelId::new(event.channel_id),
                author_id: event.author.id,
                author_name: event.author.username,
                content: event.content,
                received_at: Utc::now(),
            })))
        }
        "INTERACTION_CREATE" => {
            let event: InteractionCreatePayload = serde_json::from_value(d.clone())?;
            if event.kind != APPLICATION_COMMAND {
                return Ok(None);
            }
            let Some(data) = event.data else {
                return Ok(None);
            };
            let invoker_name = event
                .member
                .map(|m| m.user.username)
                .or(event.user.map(|u| u.username))
                .unwrap_or_else(|| "unknown".to_string());
            let options = data
                .options
                .into_iter()
                .map(|o| CommandOption {
                    name: o.name,
                    value: match o.value {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    },
                })
                .collect();
            Ok(Some(InboundEvent::Command(CommandInvocation {
                handle: InteractionHandle {
                    id: InteractionId::new(event.id),
                    token: event.token,
                    application_id: event.application_id,
                },
                name: data.name,
                channel_id: ChannelId::new(event.channel_id.unwrap_or_default()),
                invoker_name,
                options,
                received_at: Utc::now(),
            })))
        }
        _ => Ok(None),
    }
}

#[derive(Debug, Deserialize)]
struct ReadyPayload {
    application: ReadyApplication,
}

#[derive(Debug, Deserialize)]
struct ReadyApplication {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MessageCreatePayload {
    id: String,
    channel_id: String,
    #[serde(default)]
    content: String,
    author: AuthorPayload,
}

#[derive(Debug, Deserialize)]
struct AuthorPayload {
    id: String,
    username: String,
    #[serde(default)]
    bot: bool,
}

#[derive(Debug, Deserialize)]
struct InteractionCreatePayload {
    id: String,
    token: String,
    application_id: String,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    channel_id: Option<String>,
    #[serde(default)]
    data: Option<InteractionDataPayload>,
    #[serde(default)]
    member: Option<MemberPayload>,
    #[serde(default)]
    user: Option<AuthorPayload>,
}

#[derive(Debug, Deserialize)]
struct InteractionDataPayload {
    name: String,
    #[serde(default)]
    options: Vec<InteractionOptionPayload>,
}

#[derive(Debug, Deserialize)]
struct InteractionOptionPayload {
    name: String,
    value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct MemberPayload {
    user: AuthorPayload,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

id_newtype!(MessageId);
id_newtype!(ChannelId);
id_newtype!(ThreadId);
id_newtype!(InteractionId);

// Threads are addressable as channels; a freshly created thread's id doubles
// as the channel id its messages are posted to.
impl From<ThreadId> for ChannelId {
    fn from(value: ThreadId) -> Self {
        ChannelId::new(value.into_inner())
    }
}

/// Everything needed to respond to one interaction: callback routes use the
/// id + token pair, webhook routes use the application id + token pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionHandle {
    pub id: InteractionId,
    pub token: String,
    pub application_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    pub message_id: MessageId,
    pub channel_id: ChannelId,
    pub author_id: String,
    pub author_name: String,
    pub content: String,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOption {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandInvocation {
    pub handle: InteractionHandle,
    pub name: String,
    pub channel_id: ChannelId,
    pub invoker_name: String,
    #[serde(default)]
    pub options: Vec<CommandOption>,
    pub received_at: DateTime<Utc>,
}

impl CommandInvocation {
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.name == name)
            .map(|o| o.value.as_str())
    }
}

/// One inbound gateway event, already reduced to what the application handles.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    Ready { application_id: String },
    Message(MessageEvent),
    Command(CommandInvocation),
}

const CHAT_INPUT_COMMAND: u8 = 1;
const STRING_OPTION: u8 = 3;

/// Application-command definition in the shape the registration endpoint
/// accepts.
#[derive(Debug, Clone, Serialize)]
pub struct CommandSpec {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<CommandOptionSpec>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandOptionSpec {
    #[serde(rename = "type")]
    pub kind: u8,
    pub name: String,
    pub description: String,
    pub required: bool,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind: CHAT_INPUT_COMMAND,
            options: Vec::new(),
        }
    }

    pub fn with_required_string(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.options.push(CommandOptionSpec {
            kind: STRING_OPTION,
            name: name.into(),
            description: description.into(),
            required: true,
        });
        self
    }
}

//! Drives one conversational turn per inbound event: routing, backend call,
//! and response delivery.

use crate::commands;
use crate::config::DiscordConfig;
use crate::router::SessionRouter;
use anyhow::Result;
use coral_backend::{ConversationBackend, ResponseEnvelope, Role};
use coral_discord::{
    ChannelId, ChatApi, CommandInvocation, EMPTY_RESPONSE_PLACEHOLDER, InboundEvent,
    InteractionResponder, MessageEvent, REPLY_CHUNK_LIMIT, THREAD_NAME_LIMIT, split_message,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const THREAD_AUTO_ARCHIVE_MINUTES: u32 = 1440;

// Titles are cut to a budget well under the platform cap, with the cap kept
// as a final clamp.
const THREAD_TITLE_BUDGET: usize = 80;
const TITLE_TRUNCATION_MARKER: char = '…';
const FALLBACK_THREAD_TITLE: &str = "New conversation";

const BLANK_PROMPT_REPLY: &str = "Please provide a prompt.";
const NO_THREAD_PARENT_REPLY: &str =
    "Thread conversations are not configured (no parent channel).";

pub struct Orchestrator {
    chat: Arc<dyn ChatApi>,
    backend: Arc<dyn ConversationBackend>,
    router: Arc<SessionRouter>,
    home_channel_id: Option<ChannelId>,
    thread_parent_id: Option<ChannelId>,
    guild_id: Option<String>,
}

impl Orchestrator {
    pub fn new(
        chat: Arc<dyn ChatApi>,
        backend: Arc<dyn ConversationBackend>,
        router: Arc<SessionRouter>,
        discord: &DiscordConfig,
    ) -> Self {
        Self {
            chat,
            backend,
            router,
            home_channel_id: discord.home_channel_id.as_deref().map(ChannelId::from),
            thread_parent_id: discord.thread_parent_id.as_deref().map(ChannelId::from),
            guild_id: discord.guild_id.clone(),
        }
    }

    /// Consume the inbound queue until it closes or the token is cancelled.
    /// Every event gets its own task: overlapping events, including ones for
    /// the same context, are an accepted property of the design.
    pub fn start(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<InboundEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => return,
                    event = rx.recv() => match event {
                        Some(event) => event,
                        None => return,
                    },
                };
                let this = self.clone();
                tokio::spawn(async move {
                    if let Err(e) = this.handle_event(event).await {
                        tracing::warn!(%e, "event handling failed");
                    }
                });
            }
        })
    }

    async fn handle_event(&self, event: InboundEvent) -> Result<()> {
        match event {
            InboundEvent::Ready { application_id } => self.on_ready(&application_id).await,
            InboundEvent::Message(msg) => self.on_message(msg).await,
            InboundEvent::Command(cmd) => self.on_command(cmd).await,
        }
    }

    async fn on_ready(&self, application_id: &str) -> Result<()> {
        let definitions = commands::definitions();
        self.chat
            .register_commands(application_id, self.guild_id.as_deref(), &definitions)
            .await?;
        tracing::info!(
            command_count = definitions.len(),
            guild_id = ?self.guild_id,
            "slash commands registered"
        );
        Ok(())
    }

    /// Free-text flow: relay messages from the home channel, or from any
    /// context that already has a session (replies inside started threads).
    async fn on_message(&self, msg: MessageEvent) -> Result<()> {
        if !self.listens_on(&msg.channel_id) {
            return Ok(());
        }

        let attributed = format!("[discord user: {}] {}", msg.author_name, msg.content);
        let reply = match self.bound_turn(&msg.channel_id, &attributed).await {
            Ok(envelope) => envelope.content,
            Err(e) => {
                tracing::warn!(channel_id = %msg.channel_id, %e, "free-text turn failed");
                format!("Error: {e}")
            }
        };

        // Empty assistant content is the one case where staying silent is
        // correct.
        if reply.trim().is_empty() {
            return Ok(());
        }
        for chunk in split_message(&reply, REPLY_CHUNK_LIMIT) {
            self.chat.send_message(&msg.channel_id, &chunk).await?;
        }
        Ok(())
    }

    fn listens_on(&self, channel_id: &ChannelId) -> bool {
        self.home_channel_id.as_ref() == Some(channel_id)
            || self.router.resolve(channel_id).is_some()
    }

    /// Resolve or create the context's session, then forward one user
    /// message.
    async fn bound_turn(&self, context: &ChannelId, content: &str) -> Result<ResponseEnvelope> {
        let backend = self.backend.clone();
        let (session, _existed) = self
            .router
            .resolve_or_create(context, move || async move {
                Ok(backend.create_session().await?)
            })
            .await?;
        Ok(self
            .backend
            .send_message(&session, Role::User, content)
            .await?)
    }

    async fn on_command(&self, cmd: CommandInvocation) -> Result<()> {
        let mut responder = InteractionResponder::new(self.chat.clone(), cmd.handle.clone());
        match cmd.name.as_str() {
            commands::ASK => self.on_ask(&cmd, &mut responder).await,
            commands::CONVERSE => self.on_converse(&cmd, &mut responder).await,
            other => {
                tracing::debug!(command = other, "unknown command");
                responder.respond("Unknown command.", true).await?;
                Ok(())
            }
        }
    }

    /// One-shot question: fresh session, no binding.
    async fn on_ask(
        &self,
        cmd: &CommandInvocation,
        responder: &mut InteractionResponder,
    ) -> Result<()> {
        let prompt = cmd.option(commands::PROMPT_OPTION).unwrap_or_default().trim();
        if prompt.is_empty() {
            responder.respond(BLANK_PROMPT_REPLY, true).await?;
            return Ok(());
        }

        // Ack first; the backend call runs on the extended deadline.
        responder.defer(true).await?;
        let reply = match self.one_shot_turn(prompt).await {
            Ok(envelope) => envelope.content,
            Err(e) => {
                tracing::warn!(invoker = %cmd.invoker_name, %e, "ask turn failed");
                format!("Error: {e}")
            }
        };
        responder.deliver(&reply).await?;
        Ok(())
    }

    async fn one_shot_turn(&self, prompt: &str) -> Result<ResponseEnvelope> {
        let session = self.backend.create_session().await?;
        Ok(self
            .backend
            .send_message(&session, Role::User, prompt)
            .await?)
    }

    /// Start a conversation thread: seed a fresh session, open a thread
    /// under the configured parent, bind it, and point the invoker at it.
    async fn on_converse(
        &self,
        cmd: &CommandInvocation,
        responder: &mut InteractionResponder,
    ) -> Result<()> {
        let prompt = cmd.option(commands::PROMPT_OPTION).unwrap_or_default().trim();
        if prompt.is_empty() {
            responder.respond(BLANK_PROMPT_REPLY, true).await?;
            return Ok(());
        }
        let Some(parent) = self.thread_parent_id.clone() else {
            responder.respond(NO_THREAD_PARENT_REPLY, true).await?;
            return Ok(());
        };

        responder.defer(false).await?;

        let session = match self.backend.create_session().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(invoker = %cmd.invoker_name, %e, "session create failed");
                responder.deliver(&format!("Error: {e}")).await?;
                return Ok(());
            }
        };
        let envelope = match self
            .backend
            .send_message(&session, Role::User, prompt)
            .await
        {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(invoker = %cmd.invoker_name, %e, "seed turn failed");
                responder.deliver(&format!("Error: {e}")).await?;
                return Ok(());
            }
        };

        let title = thread_title(envelope.summary.as_deref(), prompt);
        let thread = match self
            .chat
            .create_thread(&parent, &title, THREAD_AUTO_ARCHIVE_MINUTES)
            .await
        {
            Ok(thread) => thread,
            Err(e) => {
                tracing::warn!(parent_id = %parent, %e, "thread create failed");
                responder.deliver(&format!("Error: {e}")).await?;
                return Ok(());
            }
        };
        let thread_channel = ChannelId::from(thread);

        if let Err(e) = self.router.bind(thread_channel.clone(), session).await {
            tracing::warn!(thread_id = %thread_channel, %e, "binding write failed");
        }

        // The thread exists and is announced either way; posting the seed
        // response into it is best-effort.
        let body = if envelope.content.trim().is_empty() {
            EMPTY_RESPONSE_PLACEHOLDER.to_string()
        } else {
            envelope.content
        };
        for chunk in split_message(&body, REPLY_CHUNK_LIMIT) {
            if let Err(e) = self.chat.send_message(&thread_channel, &chunk).await {
                tracing::warn!(thread_id = %thread_channel, %e, "thread seed post failed");
                break;
            }
        }

        responder
            .deliver(&format!("Started a new conversation: <#{thread_channel}>"))
            .await?;
        Ok(())
    }
}

/// Thread title: a non-empty backend summary wins, otherwise the prompt.
/// Cut to the budget with a marker, then clamped to the platform cap.
fn thread_title(summary: Option<&str>, fallback: &str) -> String {
    let base = summary
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| fallback.trim());
    let mut title = truncate_with_marker(base, THREAD_TITLE_BUDGET);
    if title.is_empty() {
        title = FALLBACK_THREAD_TITLE.to_string();
    }
    if title.chars().count() > THREAD_NAME_LIMIT {
        title = title.chars().take(THREAD_NAME_LIMIT).collect();
    }
    title
}

fn truncate_with_marker(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        return text.to_string();
    }
    let kept: String = text.chars().take(budget.saturating_sub(1)).collect();
    format!("{}{}", kept.trim_end(), TITLE_TRUNCATION_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use coral_backend::{BackendError, SessionId};
    use coral_discord::{
        CommandOption, CommandSpec, InteractionHandle, InteractionId, MessageId, ThreadId,
    };
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq)]
    enum ChatCall {
        Send { channel_id: String, content: String },
        CreateThread { parent_id: String, name: String },
        Respond { content: String, ephemeral: bool },
        Defer { ephemeral: bool },
        Edit(String),
        Followup(String),
        Register { guild_id: Option<String> },
    }

    #[derive(Default)]
    struct FakeChat {
        calls: Mutex<Vec<ChatCall>>,
    }

    impl FakeChat {
        fn calls(&self) -> Vec<ChatCall> {
            self.calls.lock().expect("calls lock").clone()
        }

        fn push(&self, call: ChatCall) {
            self.calls.lock().expect("calls lock").push(call);
        }
    }

    #[async_trait]
    impl ChatApi for FakeChat {
        async fn send_message(
            &self,
            channel_id: &ChannelId,
            content: &str,
        ) -> coral_discord::Result<()> {
            self.push(ChatCall::Send {
                channel_id: channel_id.as_str().to_string(),
                content: content.to_string(),
            });
            Ok(())
        }

        async fn create_thread(
            &self,
            parent_id: &ChannelId,
            name: &str,
            _auto_archive_minutes: u32,
        ) -> coral_discord::Result<ThreadId> {
            self.push(ChatCall::CreateThread {
                parent_id: parent_id.as_str().to_string(),
                name: name.to_string(),
            });
            Ok(ThreadId::new("t1"))
        }

        async fn respond_interaction(
            &self,
            _interaction: &InteractionHandle,
            content: &str,
            ephemeral: bool,
        ) -> coral_discord::Result<()> {
            self.push(ChatCall::Respond {
                content: content.to_string(),
                ephemeral,
            });
            Ok(())
        }

        async fn defer_interaction(
            &self,
            _interaction: &InteractionHandle,
            ephemeral: bool,
        ) -> coral_discord::Result<()> {
            self.push(ChatCall::Defer { ephemeral });
            Ok(())
        }

        async fn edit_original_response(
            &self,
            _interaction: &InteractionHandle,
            content: &str,
        ) -> coral_discord::Result<()> {
            self.push(ChatCall::Edit(content.to_string()));
            Ok(())
        }

        async fn create_followup(
            &self,
            _interaction: &InteractionHandle,
            content: &str,
        ) -> coral_discord::Result<()> {
            self.push(ChatCall::Followup(content.to_string()));
            Ok(())
        }

        async fn register_commands(
            &self,
            _application_id: &str,
            guild_id: Option<&str>,
            _commands: &[CommandSpec],
        ) -> coral_discord::Result<()> {
            self.push(ChatCall::Register {
                guild_id: guild_id.map(String::from),
            });
            Ok(())
        }
    }

    struct FakeBackend {
        sessions_created: AtomicUsize,
        messages: Mutex<Vec<(SessionId, Role, String)>>,
        reply: ResponseEnvelope,
        fail_create: bool,
    }

    impl FakeBackend {
        fn replying(content: &str, summary: Option<&str>) -> Self {
            Self {
                sessions_created: AtomicUsize::new(0),
                messages: Mutex::new(Vec::new()),
                reply: ResponseEnvelope {
                    content: content.to_string(),
                    summary: summary.map(String::from),
                },
                fail_create: false,
            }
        }

        fn failing() -> Self {
            let mut backend = Self::replying("", None);
            backend.fail_create = true;
            backend
        }

        fn sessions_created(&self) -> usize {
            self.sessions_created.load(Ordering::SeqCst)
        }

        fn messages(&self) -> Vec<(SessionId, Role, String)> {
            self.messages.lock().expect("messages lock").clone()
        }
    }

    #[async_trait]
    impl ConversationBackend for FakeBackend {
        async fn create_session(&self) -> coral_backend::Result<SessionId> {
            if self.fail_create {
                return Err(BackendError::Http("backend unreachable".to_string()));
            }
            let n = self.sessions_created.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(SessionId::new(format!("s-{n}")))
        }

        async fn send_message(
            &self,
            session: &SessionId,
            role: Role,
            content: &str,
        ) -> coral_backend::Result<ResponseEnvelope> {
            self.messages.lock().expect("messages lock").push((
                session.clone(),
                role,
                content.to_string(),
            ));
            Ok(self.reply.clone())
        }
    }

    fn orchestrator(
        chat: Arc<FakeChat>,
        backend: Arc<FakeBackend>,
        home_channel: Option<&str>,
        thread_parent: Option<&str>,
    ) -> (Orchestrator, Arc<SessionRouter>) {
        let router = Arc::new(SessionRouter::new(None));
        let discord = DiscordConfig {
            bot_token: "tok".to_string(),
            home_channel_id: home_channel.map(String::from),
            thread_parent_id: thread_parent.map(String::from),
            guild_id: None,
        };
        let orch = Orchestrator::new(chat, backend, router.clone(), &discord);
        (orch, router)
    }

    fn message(channel_id: &str, author: &str, content: &str) -> MessageEvent {
        MessageEvent {
            message_id: MessageId::new("m1"),
            channel_id: ChannelId::new(channel_id),
            author_id: "u1".to_string(),
            author_name: author.to_string(),
            content: content.to_string(),
            received_at: Utc::now(),
        }
    }

    fn command(name: &str, prompt: Option<&str>) -> CommandInvocation {
        CommandInvocation {
            handle: InteractionHandle {
                id: InteractionId::new("i1"),
                token: "tok".to_string(),
                application_id: "app".to_string(),
            },
            name: name.to_string(),
            channel_id: ChannelId::new("c1"),
            invoker_name: "alice".to_string(),
            options: prompt
                .map(|p| {
                    vec![CommandOption {
                        name: commands::PROMPT_OPTION.to_string(),
                        value: p.to_string(),
                    }]
                })
                .unwrap_or_default(),
            received_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn free_text_in_home_channel_runs_one_attributed_turn() {
        let chat = Arc::new(FakeChat::default());
        let backend = Arc::new(FakeBackend::replying("Hi there!", None));
        let (orch, _router) = orchestrator(chat.clone(), backend.clone(), Some("C1"), None);

        orch.handle_event(InboundEvent::Message(message("C1", "alice", "hello")))
            .await
            .expect("handle message");

        assert_eq!(backend.sessions_created(), 1);
        let messages = backend.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].1, Role::User);
        assert_eq!(messages[0].2, "[discord user: alice] hello");
        assert_eq!(
            chat.calls(),
            vec![ChatCall::Send {
                channel_id: "C1".to_string(),
                content: "Hi there!".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn free_text_outside_home_channel_is_ignored_when_unbound() {
        let chat = Arc::new(FakeChat::default());
        let backend = Arc::new(FakeBackend::replying("Hi there!", None));
        let (orch, _router) = orchestrator(chat.clone(), backend.clone(), Some("C1"), None);

        orch.handle_event(InboundEvent::Message(message("other", "alice", "hello")))
            .await
            .expect("handle message");

        assert_eq!(backend.sessions_created(), 0);
        assert!(chat.calls().is_empty());
    }

    #[tokio::test]
    async fn free_text_in_a_bound_thread_reuses_the_session() {
        let chat = Arc::new(FakeChat::default());
        let backend = Arc::new(FakeBackend::replying("Sure.", None));
        let (orch, router) = orchestrator(chat.clone(), backend.clone(), Some("C1"), None);
        router
            .bind(ChannelId::new("t9"), SessionId::new("s-existing"))
            .await
            .expect("bind");

        orch.handle_event(InboundEvent::Message(message("t9", "bob", "more?")))
            .await
            .expect("handle message");

        assert_eq!(backend.sessions_created(), 0);
        let messages = backend.messages();
        assert_eq!(messages[0].0, SessionId::new("s-existing"));
    }

    #[tokio::test]
    async fn free_text_failure_replies_with_error_text() {
        let chat = Arc::new(FakeChat::default());
        let backend = Arc::new(FakeBackend::failing());
        let (orch, _router) = orchestrator(chat.clone(), backend.clone(), Some("C1"), None);

        orch.handle_event(InboundEvent::Message(message("C1", "alice", "hello")))
            .await
            .expect("handle message");

        let calls = chat.calls();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            ChatCall::Send { content, .. } => {
                assert!(content.starts_with("Error:"), "unexpected reply: {content}")
            }
            other => panic!("unexpected call: {other:?}"),
        }
    }

    #[tokio::test]
    async fn free_text_empty_backend_content_stays_silent() {
        let chat = Arc::new(FakeChat::default());
        let backend = Arc::new(FakeBackend::replying("", None));
        let (orch, _router) = orchestrator(chat.clone(), backend.clone(), Some("C1"), None);

        orch.handle_event(InboundEvent::Message(message("C1", "alice", "hello")))
            .await
            .expect("handle message");

        assert!(chat.calls().is_empty());
    }

    #[tokio::test]
    async fn blank_ask_prompt_gets_one_ephemeral_response_and_no_backend_call() {
        let chat = Arc::new(FakeChat::default());
        let backend = Arc::new(FakeBackend::replying("unused", None));
        let (orch, _router) = orchestrator(chat.clone(), backend.clone(), None, None);

        orch.handle_event(InboundEvent::Command(command(commands::ASK, Some("   "))))
            .await
            .expect("handle command");

        assert_eq!(
            chat.calls(),
            vec![ChatCall::Respond {
                content: BLANK_PROMPT_REPLY.to_string(),
                ephemeral: true,
            }]
        );
        assert_eq!(backend.sessions_created(), 0);
        assert!(backend.messages().is_empty());
    }

    #[tokio::test]
    async fn ask_defers_then_delivers_the_answer() {
        let chat = Arc::new(FakeChat::default());
        let backend = Arc::new(FakeBackend::replying("42.", None));
        let (orch, router) = orchestrator(chat.clone(), backend.clone(), None, None);

        orch.handle_event(InboundEvent::Command(command(
            commands::ASK,
            Some("meaning of life?"),
        )))
        .await
        .expect("handle command");

        assert_eq!(
            chat.calls(),
            vec![
                ChatCall::Defer { ephemeral: true },
                ChatCall::Edit("42.".to_string()),
            ]
        );
        assert_eq!(backend.sessions_created(), 1);
        // One-shot questions do not bind the invoking channel.
        assert_eq!(router.resolve(&ChannelId::new("c1")), None);
    }

    #[tokio::test]
    async fn ask_failure_is_delivered_through_the_deferred_reply() {
        let chat = Arc::new(FakeChat::default());
        let backend = Arc::new(FakeBackend::failing());
        let (orch, _router) = orchestrator(chat.clone(), backend.clone(), None, None);

        orch.handle_event(InboundEvent::Command(command(commands::ASK, Some("hi"))))
            .await
            .expect("handle command");

        let calls = chat.calls();
        assert_eq!(calls[0], ChatCall::Defer { ephemeral: true });
        match &calls[1] {
            ChatCall::Edit(content) => assert!(content.starts_with("Error:")),
            other => panic!("unexpected call: {other:?}"),
        }
    }

    #[tokio::test]
    async fn converse_without_a_parent_channel_is_rejected_up_front() {
        let chat = Arc::new(FakeChat::default());
        let backend = Arc::new(FakeBackend::replying("unused", None));
        let (orch, _router) = orchestrator(chat.clone(), backend.clone(), None, None);

        orch.handle_event(InboundEvent::Command(command(commands::CONVERSE, Some("hi"))))
            .await
            .expect("handle command");

        assert_eq!(
            chat.calls(),
            vec![ChatCall::Respond {
                content: NO_THREAD_PARENT_REPLY.to_string(),
                ephemeral: true,
            }]
        );
        assert_eq!(backend.sessions_created(), 0);
    }

    #[tokio::test]
    async fn converse_starts_a_thread_and_binds_it() {
        let chat = Arc::new(FakeChat::default());
        let backend = Arc::new(FakeBackend::replying("Hi!", Some("")));
        let (orch, router) = orchestrator(chat.clone(), backend.clone(), None, Some("P1"));

        orch.handle_event(InboundEvent::Command(command(
            commands::CONVERSE,
            Some("Tell me about crabs"),
        )))
        .await
        .expect("handle command");

        let calls = chat.calls();
        assert_eq!(calls[0], ChatCall::Defer { ephemeral: false });
        assert_eq!(
            calls[1],
            ChatCall::CreateThread {
                parent_id: "P1".to_string(),
                // Blank summary, so the title derives from the prompt.
                name: "Tell me about crabs".to_string(),
            }
        );
        assert_eq!(
            calls[2],
            ChatCall::Send {
                channel_id: "t1".to_string(),
                content: "Hi!".to_string(),
            }
        );
        match &calls[3] {
            ChatCall::Edit(content) => assert!(content.contains("<#t1>")),
            other => panic!("unexpected call: {other:?}"),
        }
        assert_eq!(
            router.resolve(&ChannelId::new("t1")),
            Some(SessionId::new("s-1"))
        );
    }

    #[tokio::test]
    async fn converse_prefers_the_backend_summary_for_the_title() {
        let chat = Arc::new(FakeChat::default());
        let backend = Arc::new(FakeBackend::replying("Hello!", Some("Crustacean talk")));
        let (orch, _router) = orchestrator(chat.clone(), backend.clone(), None, Some("P1"));

        orch.handle_event(InboundEvent::Command(command(
            commands::CONVERSE,
            Some("Tell me about crabs"),
        )))
        .await
        .expect("handle command");

        assert!(chat.calls().iter().any(|c| matches!(
            c,
            ChatCall::CreateThread { name, .. } if name == "Crustacean talk"
        )));
    }

    #[tokio::test]
    async fn converse_substitutes_a_placeholder_for_empty_seed_content() {
        let chat = Arc::new(FakeChat::default());
        let backend = Arc::new(FakeBackend::replying("", Some("Quiet start")));
        let (orch, _router) = orchestrator(chat.clone(), backend.clone(), None, Some("P1"));

        orch.handle_event(InboundEvent::Command(command(commands::CONVERSE, Some("hi"))))
            .await
            .expect("handle command");

        assert!(chat.calls().iter().any(|c| matches!(
            c,
            ChatCall::Send { content, .. } if content == EMPTY_RESPONSE_PLACEHOLDER
        )));
    }

    #[tokio::test]
    async fn converse_failure_is_delivered_through_the_deferred_reply() {
        let chat = Arc::new(FakeChat::default());
        let backend = Arc::new(FakeBackend::failing());
        let (orch, router) = orchestrator(chat.clone(), backend.clone(), None, Some("P1"));

        orch.handle_event(InboundEvent::Command(command(commands::CONVERSE, Some("hi"))))
            .await
            .expect("handle command");

        let calls = chat.calls();
        assert_eq!(calls[0], ChatCall::Defer { ephemeral: false });
        match &calls[1] {
            ChatCall::Edit(content) => assert!(content.starts_with("Error:")),
            other => panic!("unexpected call: {other:?}"),
        }
        // No thread, no binding: the turn ends at the error.
        assert_eq!(calls.len(), 2);
        assert_eq!(router.resolve(&ChannelId::new("t1")), None);
    }

    #[tokio::test]
    async fn ready_registers_the_command_set() {
        let chat = Arc::new(FakeChat::default());
        let backend = Arc::new(FakeBackend::replying("unused", None));
        let (orch, _router) = orchestrator(chat.clone(), backend.clone(), None, None);

        orch.handle_event(InboundEvent::Ready {
            application_id: "app-1".to_string(),
        })
        .await
        .expect("handle ready");

        assert_eq!(chat.calls(), vec![ChatCall::Register { guild_id: None }]);
    }

    #[tokio::test]
    async fn unknown_commands_get_an_ephemeral_notice() {
        let chat = Arc::new(FakeChat::default());
        let backend = Arc::new(FakeBackend::replying("unused", None));
        let (orch, _router) = orchestrator(chat.clone(), backend.clone(), None, None);

        orch.handle_event(InboundEvent::Command(command("mystery", Some("hi"))))
            .await
            .expect("handle command");

        assert_eq!(
            chat.calls(),
            vec![ChatCall::Respond {
                content: "Unknown command.".to_string(),
                ephemeral: true,
            }]
        );
    }

    #[test]
    fn title_prefers_a_non_blank_summary() {
        assert_eq!(thread_title(Some("Summary"), "prompt"), "Summary");
        assert_eq!(thread_title(Some("   "), "prompt"), "prompt");
        assert_eq!(thread_title(None, "prompt"), "prompt");
    }

    #[test]
    fn title_truncates_to_the_budget_with_a_marker() {
        let long = "x".repeat(200);
        let title = thread_title(None, &long);
        assert_eq!(title.chars().count(), THREAD_TITLE_BUDGET);
        assert!(title.ends_with(TITLE_TRUNCATION_MARKER));
        assert!(title.chars().count() <= THREAD_NAME_LIMIT);
    }

    #[test]
    fn title_trims_a_dangling_space_before_the_marker() {
        // The cut lands right after a space; the marker must not float.
        let long = format!("{} {}", "x".repeat(78), "y".repeat(50));
        let title = thread_title(None, &long);
        assert_eq!(title, format!("{}…", "x".repeat(78)));
    }

    #[test]
    fn title_keeps_short_text_unchanged() {
        assert_eq!(thread_title(None, "Short and sweet"), "Short and sweet");
    }

    #[test]
    fn title_falls_back_when_everything_is_blank() {
        assert_eq!(thread_title(Some(""), "   "), FALLBACK_THREAD_TITLE);
    }
}

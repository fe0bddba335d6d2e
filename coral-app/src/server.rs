//! Process wiring: build the collaborators, run the gateway and the
//! orchestrator, shut both down on signal.

use crate::config::AppConfig;
use crate::orchestrator::Orchestrator;
use crate::router::SessionRouter;
use crate::store::{BindingStore, SqliteBindingStore};
use anyhow::Result;
use coral_backend::{BackendClient, ConversationBackend};
use coral_discord::{ChatApi, DiscordGateway, DiscordRestClient};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const INBOUND_QUEUE_CAPACITY: usize = 256;

pub async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    let cfg = AppConfig::load(config_path).await?;
    tracing::info!(
        backend_base_url = %cfg.backend.base_url,
        home_channel_id = ?cfg.discord.home_channel_id,
        thread_parent_id = ?cfg.discord.thread_parent_id,
        guild_id = ?cfg.discord.guild_id,
        sessions_db = ?cfg.runtime.sessions_db,
        "configuration loaded"
    );

    let store: Option<Arc<dyn BindingStore>> = match &cfg.runtime.sessions_db {
        Some(path) => Some(Arc::new(SqliteBindingStore::open(Path::new(path))?)),
        None => None,
    };
    let router = Arc::new(SessionRouter::new(store));
    let restored = router.load().await?;
    if restored > 0 {
        tracing::info!(bindings = restored, "session bindings restored");
    }

    let chat: Arc<dyn ChatApi> = Arc::new(DiscordRestClient::new(&cfg.discord.bot_token)?);
    let backend: Arc<dyn ConversationBackend> = Arc::new(BackendClient::new(
        &cfg.backend.base_url,
        cfg.backend.api_key.clone(),
    )?);

    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE_CAPACITY);
    let shutdown = CancellationToken::new();

    let gateway = DiscordGateway::new(&cfg.discord.bot_token);
    let gateway_cancel = shutdown.child_token();
    let gateway_handle =
        tokio::spawn(async move { gateway.run(inbound_tx, gateway_cancel).await });

    let orchestrator = Arc::new(Orchestrator::new(chat, backend, router, &cfg.discord));
    let orchestrator_handle = orchestrator.start(inbound_rx, shutdown.child_token());
    tracing::info!("coral relay running");

    shutdown_signal().await;
    tracing::info!("beginning graceful shutdown");
    shutdown.cancel();
    match gateway_handle.await {
        Ok(()) => tracing::info!("gateway shutdown completed"),
        Err(e) => tracing::error!(error = %e, "gateway task join failed during shutdown"),
    }
    match orchestrator_handle.await {
        Ok(()) => tracing::info!("orchestrator shutdown completed"),
        Err(e) => tracing::error!(error = %e, "orchestrator task join failed during shutdown"),
    }
    Ok(())
}

pub async fn doctor(config_path: Option<PathBuf>) -> Result<()> {
    let cfg = AppConfig::load(config_path).await?;
    tracing::info!(
        backend_base_url = %cfg.backend.base_url,
        home_channel_id = ?cfg.discord.home_channel_id,
        thread_parent_id = ?cfg.discord.thread_parent_id,
        guild_id = ?cfg.discord.guild_id,
        sessions_db = ?cfg.runtime.sessions_db,
        free_text_flow_enabled = cfg.discord.home_channel_id.is_some(),
        thread_flow_enabled = cfg.discord.thread_parent_id.is_some(),
        "config ok"
    );
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler; falling back to ctrl-c only");
                if let Err(ctrlc_err) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %ctrlc_err, "failed to await ctrl-c signal");
                }
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("received ctrl-c");
            }
            _ = terminate.recv() => {
                tracing::warn!("received SIGTERM");
            }
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to await ctrl-c signal");
        }
    }
}

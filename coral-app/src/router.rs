//! Session routing: one backend session per chat context.

use crate::store::BindingStore;
use anyhow::Result;
use coral_backend::SessionId;
use coral_discord::ChannelId;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Maps a chat context (channel or thread id) to its backend session.
///
/// The binding table is the process's only shared mutable state. Writes go
/// through `bind`/`unbind`; same-key session creation is serialized by
/// [`SessionRouter::resolve_or_create`] so two overlapping events in a fresh
/// context cannot create two backend sessions.
pub struct SessionRouter {
    bindings: DashMap<ChannelId, SessionId>,
    creating: DashMap<ChannelId, Arc<Mutex<()>>>,
    store: Option<Arc<dyn BindingStore>>,
}

impl SessionRouter {
    pub fn new(store: Option<Arc<dyn BindingStore>>) -> Self {
        Self {
            bindings: DashMap::new(),
            creating: DashMap::new(),
            store,
        }
    }

    /// Restore bindings from the durable store, when one is configured.
    /// Returns the number of bindings restored.
    pub async fn load(&self) -> Result<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let rows = store.load_all().await?;
        let count = rows.len();
        for (context, session) in rows {
            self.bindings.insert(context, session);
        }
        Ok(count)
    }

    pub fn resolve(&self, context: &ChannelId) -> Option<SessionId> {
        self.bindings.get(context).map(|entry| entry.value().clone())
    }

    /// Record a binding, overwriting any previous one for the context. The
    /// in-memory table is updated unconditionally; a store write failure is
    /// reported but does not undo it.
    pub async fn bind(&self, context: ChannelId, session: SessionId) -> Result<()> {
        self.bindings.insert(context.clone(), session.clone());
        if let Some(store) = &self.store {
            store.put(&context, &session).await?;
        }
        Ok(())
    }

    pub async fn unbind(&self, context: &ChannelId) -> Result<()> {
        self.bindings.remove(context);
        if let Some(store) = &self.store {
            store.remove(context).await?;
        }
        Ok(())
    }

    /// Resolve the session for `context`, creating and binding one through
    /// `create` when none exists. The bool reports whether the binding
    /// already existed. Creation for the same key is serialized behind a
    /// per-key lock; other keys proceed independently.
    pub async fn resolve_or_create<F, Fut>(
        &self,
        context: &ChannelId,
        create: F,
    ) -> Result<(SessionId, bool)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<SessionId>>,
    {
        if let Some(session) = self.resolve(context) {
            return Ok((session, true));
        }

        let lock = self
            .creating
            .entry(context.clone())
            .or_default()
            .value()
            .clone();
        let _guard = lock.lock().await;

        // A concurrent holder may have bound while this task waited.
        if let Some(session) = self.resolve(context) {
            return Ok((session, true));
        }

        let session = create().await?;
        self.bind(context.clone(), session.clone()).await?;
        Ok((session, false))
    }
}

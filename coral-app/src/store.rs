//! Optional durable storage for session bindings.

use anyhow::Result;
use async_trait::async_trait;
use coral_backend::SessionId;
use coral_discord::ChannelId;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Storage collaborator behind the router. Absent a store, bindings live for
/// the process lifetime only.
#[async_trait]
pub trait BindingStore: Send + Sync {
    async fn load_all(&self) -> Result<Vec<(ChannelId, SessionId)>>;
    async fn put(&self, context: &ChannelId, session: &SessionId) -> Result<()>;
    async fn remove(&self, context: &ChannelId) -> Result<()>;
}

/// Sqlite-backed store. All statements are synchronous and short, so each
/// call runs the connection work on the blocking pool.
pub struct SqliteBindingStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBindingStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute(
            r#"
CREATE TABLE IF NOT EXISTS session_bindings (
    context_id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
)
"#,
            [],
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(conn: &Arc<Mutex<Connection>>) -> std::sync::MutexGuard<'_, Connection> {
        conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl BindingStore for SqliteBindingStore {
    async fn load_all(&self) -> Result<Vec<(ChannelId, SessionId)>> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = Self::lock(&conn);
            let mut stmt =
                conn.prepare("SELECT context_id, session_id FROM session_bindings")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    ChannelId::new(row.get::<_, String>(0)?),
                    SessionId::new(row.get::<_, String>(1)?),
                ))
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await?
    }

    async fn put(&self, context: &ChannelId, session: &SessionId) -> Result<()> {
        let conn = self.conn.clone();
        let context = context.as_str().to_string();
        let session = session.as_str().to_string();
        tokio::task::spawn_blocking(move || {
            Self::lock(&conn).execute(
                r#"
INSERT INTO session_bindings (context_id, session_id, updated_at)
VALUES (?1, ?2, CURRENT_TIMESTAMP)
ON CONFLICT(context_id) DO UPDATE
SET session_id = excluded.session_id,
    updated_at = CURRENT_TIMESTAMP
"#,
                rusqlite::params![context, session],
            )?;
            Ok(())
        })
        .await?
    }

    async fn remove(&self, context: &ChannelId) -> Result<()> {
        let conn = self.conn.clone();
        let context = context.as_str().to_string();
        tokio::task::spawn_blocking(move || {
            Self::lock(&conn).execute(
                "DELETE FROM session_bindings WHERE context_id = ?1",
                rusqlite::params![context],
            )?;
            Ok(())
        })
        .await?
    }
}

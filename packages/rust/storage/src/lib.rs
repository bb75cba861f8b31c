//! libSQL session store for SchemaConsole.
//!
//! The [`Storage`] struct wraps a local libSQL database holding the
//! console's cross-page handoff values (a small key/value table) and the
//! KG chatbot transcripts.
//!
//! **Access rules:**
//! - Commands that change session state open read-write via [`Storage::open`]
//! - Inspection commands (`session show`) use [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use schemaconsole_shared::{ConsoleError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored KG chatbot conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRecord {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// One message in a stored conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub role: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConsoleError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode.
    ///
    /// Migrations still run so that a fresh file answers queries; all
    /// mutating operations are rejected afterwards.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let mut storage = Self::open(path).await?;
        storage.readonly = true;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        ConsoleError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Whether this handle was opened with [`Storage::open_readonly`].
    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(ConsoleError::Storage(
                "session database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Key/value session entries
    // -----------------------------------------------------------------------

    /// Read a session value.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM session_kv WHERE key = ?1", params![key])
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row.get::<String>(0).map_err(storage_err)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// Write a session value, replacing any previous one.
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO session_kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                   value = excluded.value,
                   updated_at = excluded.updated_at",
                params![key, value, now.as_str()],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Delete a session value. Missing keys are not an error.
    pub async fn remove(&self, key: &str) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute("DELETE FROM session_kv WHERE key = ?1", params![key])
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// All session keys, sorted.
    pub async fn keys(&self) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query("SELECT key FROM session_kv ORDER BY key", params![])
            .await
            .map_err(storage_err)?;

        let mut keys = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            keys.push(row.get::<String>(0).map_err(storage_err)?);
        }
        Ok(keys)
    }

    /// Wipe every session value and every stored conversation.
    pub async fn clear(&self) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute_batch(
                "DELETE FROM chat_messages;
                 DELETE FROM chats;
                 DELETE FROM session_kv;",
            )
            .await
            .map_err(storage_err)?;
        tracing::debug!("session storage cleared");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Chat transcripts
    // -----------------------------------------------------------------------

    /// Create an empty conversation and return it.
    pub async fn create_chat(&self, title: &str) -> Result<ChatRecord> {
        self.check_writable()?;
        let record = ChatRecord {
            id: Uuid::now_v7().to_string(),
            title: title.to_string(),
            created_at: Utc::now(),
        };
        self.conn
            .execute(
                "INSERT INTO chats (id, title, created_at) VALUES (?1, ?2, ?3)",
                params![
                    record.id.as_str(),
                    record.title.as_str(),
                    record.created_at.to_rfc3339()
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(record)
    }

    /// Look up a conversation by ID.
    pub async fn get_chat(&self, id: &str) -> Result<Option<ChatRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, title, created_at FROM chats WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_chat(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// All conversations, newest first.
    pub async fn list_chats(&self) -> Result<Vec<ChatRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, title, created_at FROM chats ORDER BY id DESC",
                params![],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_chat(&row)?);
        }
        Ok(results)
    }

    /// Change a conversation's title.
    pub async fn rename_chat(&self, id: &str, title: &str) -> Result<()> {
        self.check_writable()?;
        let changed = self
            .conn
            .execute(
                "UPDATE chats SET title = ?1 WHERE id = ?2",
                params![title, id],
            )
            .await
            .map_err(storage_err)?;
        if changed == 0 {
            return Err(ConsoleError::Storage(format!("chat not found: {id}")));
        }
        Ok(())
    }

    /// Append a message to a conversation.
    pub async fn append_message(&self, chat_id: &str, role: &str, text: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO chat_messages (chat_id, role, text, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![chat_id, role, text, now.as_str()],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Messages of a conversation in the order they were appended.
    pub async fn list_messages(&self, chat_id: &str) -> Result<Vec<StoredMessage>> {
        let mut rows = self
            .conn
            .query(
                "SELECT role, text, created_at FROM chat_messages
                 WHERE chat_id = ?1 ORDER BY id",
                params![chat_id],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let created_at: String = row.get(2).map_err(storage_err)?;
            results.push(StoredMessage {
                role: row.get(0).map_err(storage_err)?,
                text: row.get(1).map_err(storage_err)?,
                created_at: parse_timestamp(&created_at)?,
            });
        }
        Ok(results)
    }

    /// Delete a conversation and its messages.
    pub async fn delete_chat(&self, id: &str) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute("DELETE FROM chat_messages WHERE chat_id = ?1", params![id])
            .await
            .map_err(storage_err)?;
        self.conn
            .execute("DELETE FROM chats WHERE id = ?1", params![id])
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}

fn storage_err(e: libsql::Error) -> ConsoleError {
    ConsoleError::Storage(e.to_string())
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ConsoleError::Storage(format!("invalid timestamp '{s}': {e}")))
}

fn row_to_chat(row: &libsql::Row) -> Result<ChatRecord> {
    let created_at: String = row.get(2).map_err(storage_err)?;
    Ok(ChatRecord {
        id: row.get(0).map_err(storage_err)?,
        title: row.get(1).map_err(storage_err)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

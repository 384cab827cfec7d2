//! SQLite implementation of ConversationStore
//!
//! The relational backend. It owns one acquired connection; every call locks
//! it, and `update_conversation` / `delete` run inside a transaction.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::storage::ids::{ConversationId, MessageId};
use crate::storage::search::SearchOption;
use crate::storage::traits::ConversationStore;
use crate::storage::types::{
    CompletedAnswers, Conversation, Message, Reference, keep_completed_answers,
};

/// Initialize chat schema (conversations + messages tables)
pub(crate) fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS conversations (
            id TEXT PRIMARY KEY,
            app_name TEXT NOT NULL,
            app_namespace TEXT NOT NULL,
            user_name TEXT,
            debug INTEGER NOT NULL DEFAULT 0,
            started_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_app
            ON conversations(app_namespace, app_name);
        CREATE INDEX IF NOT EXISTS idx_conversations_updated
            ON conversations(updated_at);

        -- seq keeps insertion order; refs is a JSON array
        CREATE TABLE IF NOT EXISTS messages (
            conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
            id TEXT NOT NULL,
            seq INTEGER NOT NULL,
            query TEXT NOT NULL,
            answer TEXT NOT NULL DEFAULT '',
            refs TEXT NOT NULL DEFAULT '[]',
            PRIMARY KEY (conversation_id, id)
        );
        "#,
    )?;
    Ok(())
}

// Fixed-width UTC with nanoseconds: sorts lexically and round-trips exactly
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| Error::storage(format!("invalid timestamp {:?}: {}", raw, e)))
}

/// Build ` WHERE ...` and its positional values from scoping options
fn where_clause(options: &[SearchOption]) -> (String, Vec<Value>) {
    let mut clauses = Vec::with_capacity(options.len());
    let mut values = Vec::with_capacity(options.len());
    for option in options {
        match option {
            SearchOption::ConversationId(id) => {
                clauses.push("id = ?");
                values.push(Value::Text(id.to_string()));
            }
            SearchOption::AppName(name) => {
                clauses.push("app_name = ?");
                values.push(Value::Text(name.clone()));
            }
            SearchOption::AppNamespace(namespace) => {
                clauses.push("app_namespace = ?");
                values.push(Value::Text(namespace.clone()));
            }
            SearchOption::User(Some(user)) => {
                clauses.push("user_name = ?");
                values.push(Value::Text(user.clone()));
            }
            SearchOption::User(None) => clauses.push("user_name IS NULL"),
            SearchOption::Debug(debug) => {
                clauses.push("debug = ?");
                values.push(Value::Integer(*debug as i64));
            }
        }
    }
    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), values)
    }
}

struct ConversationRow {
    id: ConversationId,
    app_name: String,
    app_namespace: String,
    user: Option<String>,
    debug: bool,
    started_at: String,
    updated_at: String,
}

impl ConversationRow {
    fn into_conversation(self, messages: Vec<Message>) -> Result<Conversation> {
        Ok(Conversation {
            id: self.id,
            app_name: self.app_name,
            app_namespace: self.app_namespace,
            user: self.user,
            started_at: parse_timestamp(&self.started_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            debug: self.debug,
            messages,
        })
    }
}

fn query_conversation_rows(conn: &Connection, options: &[SearchOption]) -> Result<Vec<ConversationRow>> {
    let (filter, values) = where_clause(options);
    let sql = format!(
        "SELECT id, app_name, app_namespace, user_name, debug, started_at, updated_at
         FROM conversations{} ORDER BY updated_at DESC, id ASC",
        filter
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values.iter()), |row| {
            Ok(ConversationRow {
                id: row.get(0)?,
                app_name: row.get(1)?,
                app_namespace: row.get(2)?,
                user: row.get(3)?,
                debug: row.get(4)?,
                started_at: row.get(5)?,
                updated_at: row.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn load_messages(conn: &Connection, conversation_id: &ConversationId) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(
        "SELECT id, query, answer, refs FROM messages
         WHERE conversation_id = ?1 ORDER BY seq ASC",
    )?;
    let rows = stmt
        .query_map(params![conversation_id], |row| {
            let id: MessageId = row.get(0)?;
            let query: String = row.get(1)?;
            let answer: String = row.get(2)?;
            let refs: String = row.get(3)?;
            Ok((id, query, answer, refs))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(|(id, query, answer, refs)| {
            let references: Vec<Reference> = serde_json::from_str(&refs)?;
            Ok(Message {
                id,
                query,
                answer,
                references,
            })
        })
        .collect()
}

/// Completed answers of the stored conversation, only when it is the same
/// conversation (same start time) as the one being written.
fn load_completed(conn: &Connection, conversation: &Conversation) -> Result<CompletedAnswers> {
    let mut stmt = conn.prepare(
        "SELECT m.id, m.query, m.answer, m.refs
         FROM messages m JOIN conversations c ON c.id = m.conversation_id
         WHERE m.conversation_id = ?1 AND c.started_at = ?2 AND m.answer != ''",
    )?;
    let rows = stmt
        .query_map(
            params![conversation.id, format_timestamp(&conversation.started_at)],
            |row| {
                let id: MessageId = row.get(0)?;
                let query: String = row.get(1)?;
                let answer: String = row.get(2)?;
                let refs: String = row.get(3)?;
                Ok((id, query, answer, refs))
            },
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut completed = CompletedAnswers::new();
    for (id, query, answer, refs) in rows {
        let references: Vec<Reference> = serde_json::from_str(&refs)?;
        completed.insert(id, (query, answer, references));
    }
    Ok(completed)
}

/// Relational chat storage over a single SQLite connection
pub struct SqliteConversationStore {
    conn: Mutex<Connection>,
}

impl SqliteConversationStore {
    /// Take ownership of an acquired connection and make sure the schema exists
    pub fn new(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open or create a SQLite database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(Connection::open(path)?)
    }

    /// In-memory SQLite database (useful for testing)
    pub fn in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::storage("sqlite connection lock poisoned"))
    }

    fn find_conversation_sync(
        &self,
        conversation_id: &ConversationId,
        options: &[SearchOption],
    ) -> Result<Conversation> {
        let conn = self.lock()?;
        let mut scoped = Vec::with_capacity(options.len() + 1);
        scoped.push(SearchOption::ConversationId(conversation_id.clone()));
        scoped.extend_from_slice(options);

        let mut rows = query_conversation_rows(&conn, &scoped)?;
        if rows.len() != 1 {
            return Err(Error::ConversationNotFound(conversation_id.clone()));
        }
        let row = rows.remove(0);
        let messages = load_messages(&conn, &row.id)?;
        row.into_conversation(messages)
    }

    fn find_message_sync(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
        options: &[SearchOption],
    ) -> Result<Message> {
        let conn = self.lock()?;
        let mut scoped = Vec::with_capacity(options.len() + 1);
        scoped.push(SearchOption::ConversationId(conversation_id.clone()));
        scoped.extend_from_slice(options);
        if query_conversation_rows(&conn, &scoped)?.len() != 1 {
            return Err(Error::ConversationNotFound(conversation_id.clone()));
        }

        let row = conn
            .query_row(
                "SELECT query, answer, refs FROM messages WHERE conversation_id = ?1 AND id = ?2",
                params![conversation_id, message_id],
                |row| {
                    let query: String = row.get(0)?;
                    let answer: String = row.get(1)?;
                    let refs: String = row.get(2)?;
                    Ok((query, answer, refs))
                },
            )
            .optional()?;

        let Some((query, answer, refs)) = row else {
            return Err(Error::MessageNotFound {
                conversation_id: conversation_id.clone(),
                message_id: message_id.clone(),
            });
        };
        Ok(Message {
            id: message_id.clone(),
            query,
            answer,
            references: serde_json::from_str(&refs)?,
        })
    }

    fn list_sync(&self, options: &[SearchOption]) -> Result<Vec<Conversation>> {
        let conn = self.lock()?;
        let rows = query_conversation_rows(&conn, options)?;
        rows.into_iter()
            .map(|row| {
                let messages = load_messages(&conn, &row.id)?;
                row.into_conversation(messages)
            })
            .collect()
    }

    fn update_sync(&self, conversation: &Conversation) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let mut messages = conversation.messages.clone();
        keep_completed_answers(&mut messages, &load_completed(&tx, conversation)?);

        tx.execute(
            "INSERT INTO conversations
                (id, app_name, app_namespace, user_name, debug, started_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                app_name = excluded.app_name,
                app_namespace = excluded.app_namespace,
                user_name = excluded.user_name,
                debug = excluded.debug,
                started_at = excluded.started_at,
                updated_at = excluded.updated_at",
            params![
                conversation.id,
                conversation.app_name,
                conversation.app_namespace,
                conversation.user,
                conversation.debug,
                format_timestamp(&conversation.started_at),
                format_timestamp(&conversation.updated_at),
            ],
        )?;

        tx.execute(
            "DELETE FROM messages WHERE conversation_id = ?1",
            params![conversation.id],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO messages (conversation_id, id, seq, query, answer, refs)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for (seq, message) in messages.iter().enumerate() {
                stmt.execute(params![
                    conversation.id,
                    message.id,
                    seq as i64,
                    message.query,
                    message.answer,
                    serde_json::to_string(&message.references)?,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn delete_sync(&self, options: &[SearchOption]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let (filter, values) = where_clause(options);
        tx.execute(
            &format!(
                "DELETE FROM messages WHERE conversation_id IN (SELECT id FROM conversations{})",
                filter
            ),
            params_from_iter(values.iter()),
        )?;
        tx.execute(
            &format!("DELETE FROM conversations{}", filter),
            params_from_iter(values.iter()),
        )?;
        tx.commit()?;
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    fn kind(&self) -> &'static str {
        "sqlite"
    }

    async fn find_existing_conversation(
        &self,
        conversation_id: &ConversationId,
        options: &[SearchOption],
    ) -> Result<Conversation> {
        self.find_conversation_sync(conversation_id, options)
    }

    async fn find_existing_message(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
        options: &[SearchOption],
    ) -> Result<Message> {
        self.find_message_sync(conversation_id, message_id, options)
    }

    async fn list_conversations(&self, options: &[SearchOption]) -> Result<Vec<Conversation>> {
        self.list_sync(options)
    }

    async fn update_conversation(&self, conversation: &Conversation) -> Result<()> {
        self.update_sync(conversation)
    }

    async fn delete(&self, options: &[SearchOption]) -> Result<()> {
        self.delete_sync(options)
    }
}

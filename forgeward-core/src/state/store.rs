//! Durable keyed storage for conversation threads
//!
//! The store is the only durable shared resource in the system. It is
//! read once at the start of a turn and written once at the end, keyed
//! strictly by thread id so concurrent sessions on different threads
//! cannot interfere.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::agents::AgentRole;
use crate::state::migrations::run_migrations;
use crate::state::thread::{ConversationThread, Finding, FindingKind, Turn, TurnRole};
use crate::{Error, Result};

/// Checkpoint storage addressed by thread id
pub trait ThreadStore: Send + Sync {
    /// Load a thread, or `None` if the id has never been saved
    fn load(&self, thread_id: &str) -> Result<Option<ConversationThread>>;

    /// Persist the full thread state
    fn save(&self, thread: &ConversationThread) -> Result<()>;
}

/// In-memory store for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryThreadStore {
    threads: Mutex<HashMap<String, ConversationThread>>,
}

impl MemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ThreadStore for MemoryThreadStore {
    fn load(&self, thread_id: &str) -> Result<Option<ConversationThread>> {
        let threads = self
            .threads
            .lock()
            .map_err(|_| Error::Agent("thread store lock poisoned".to_string()))?;
        Ok(threads.get(thread_id).cloned())
    }

    fn save(&self, thread: &ConversationThread) -> Result<()> {
        let mut threads = self
            .threads
            .lock()
            .map_err(|_| Error::Agent("thread store lock poisoned".to_string()))?;
        threads.insert(thread.thread_id.clone(), thread.clone());
        Ok(())
    }
}

/// Sqlite-backed store for resumable sessions
pub struct SqliteThreadStore {
    conn: Mutex<Connection>,
}

impl SqliteThreadStore {
    /// Open (or create) the store at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (useful in tests)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Agent("sqlite store lock poisoned".to_string()))
    }
}

impl ThreadStore for SqliteThreadStore {
    fn load(&self, thread_id: &str) -> Result<Option<ConversationThread>> {
        let conn = self.lock()?;

        let exists = conn
            .query_row("SELECT 1 FROM threads WHERE id = ?1", [thread_id], |_| {
                Ok(())
            })
            .optional()?
            .is_some();
        if !exists {
            return Ok(None);
        }

        let mut thread = ConversationThread::new(thread_id);

        let mut stmt = conn.prepare(
            "SELECT role, content, created_at FROM turns
             WHERE thread_id = ?1 ORDER BY seq",
        )?;
        let turns = stmt.query_map([thread_id], |row| {
            let role: String = row.get(0)?;
            let content: String = row.get(1)?;
            let created_at: String = row.get(2)?;
            Ok((role, content, created_at))
        })?;
        for turn in turns {
            let (role, content, created_at) = turn?;
            thread.turns.push(Turn {
                role: TurnRole::from_str(&role)
                    .ok_or_else(|| Error::Config(format!("unknown turn role: {role}")))?,
                content,
                timestamp: parse_timestamp(&created_at)?,
            });
        }

        let mut stmt = conn.prepare(
            "SELECT source_agent, kind, summary, created_at FROM findings
             WHERE thread_id = ?1 ORDER BY seq",
        )?;
        let findings = stmt.query_map([thread_id], |row| {
            let agent: String = row.get(0)?;
            let kind: String = row.get(1)?;
            let summary: String = row.get(2)?;
            let created_at: String = row.get(3)?;
            Ok((agent, kind, summary, created_at))
        })?;
        for finding in findings {
            let (agent, kind, summary, created_at) = finding?;
            thread.findings.push(Finding {
                source_agent: AgentRole::from_str(&agent)
                    .ok_or_else(|| Error::Config(format!("unknown agent role: {agent}")))?,
                kind: FindingKind::from_str(&kind)
                    .ok_or_else(|| Error::Config(format!("unknown finding kind: {kind}")))?,
                summary,
                timestamp: parse_timestamp(&created_at)?,
            });
        }

        debug!(thread_id, turns = thread.turns.len(), "loaded thread");
        Ok(Some(thread))
    }

    fn save(&self, thread: &ConversationThread) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO threads (id, created_at) VALUES (?1, datetime('now'))
             ON CONFLICT(id) DO NOTHING",
            [&thread.thread_id],
        )?;
        tx.execute(
            "DELETE FROM turns WHERE thread_id = ?1",
            [&thread.thread_id],
        )?;
        tx.execute(
            "DELETE FROM findings WHERE thread_id = ?1",
            [&thread.thread_id],
        )?;

        for (seq, turn) in thread.turns.iter().enumerate() {
            tx.execute(
                "INSERT INTO turns (thread_id, seq, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    thread.thread_id,
                    seq as i64,
                    turn.role.as_str(),
                    turn.content,
                    turn.timestamp.to_rfc3339(),
                ],
            )?;
        }

        for (seq, finding) in thread.findings.iter().enumerate() {
            tx.execute(
                "INSERT INTO findings (thread_id, seq, source_agent, kind, summary, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    thread.thread_id,
                    seq as i64,
                    finding.source_agent.as_str(),
                    finding.kind.as_str(),
                    finding.summary,
                    finding.timestamp.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        debug!(thread_id = %thread.thread_id, "saved thread");
        Ok(())
    }
}

fn parse_timestamp(s: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| Error::Config(format!("bad timestamp {s:?}: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn sample_thread(id: &str) -> ConversationThread {
        let mut thread = ConversationThread::new(id);
        thread.push_user("enumerate services on the target");
        thread.add_finding(Finding::success(AgentRole::ScanEnum, "22/tcp open ssh"));
        thread.add_finding(Finding::failed(AgentRole::Exploit, "hydra unavailable"));
        thread.push_assistant("found one open service");
        thread
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryThreadStore::new();
        assert!(store.load("missing").unwrap().is_none());

        let thread = sample_thread("mem-1");
        store.save(&thread).unwrap();

        let loaded = store.load("mem-1").unwrap().unwrap();
        assert_eq!(loaded.turns.len(), 2);
        assert_eq!(loaded.findings.len(), 2);
    }

    #[test]
    fn test_memory_store_keys_by_thread_id() {
        let store = MemoryThreadStore::new();
        store.save(&sample_thread("a")).unwrap();
        store.save(&sample_thread("b")).unwrap();

        let a = store.load("a").unwrap().unwrap();
        assert_eq!(a.thread_id, "a");
        assert!(store.load("c").unwrap().is_none());
    }

    #[test]
    fn test_sqlite_store_round_trip() {
        let store = SqliteThreadStore::open_in_memory().unwrap();
        let thread = sample_thread("sq-1");
        store.save(&thread).unwrap();

        let loaded = store.load("sq-1").unwrap().unwrap();
        assert_eq!(loaded.turns.len(), 2);
        assert_eq!(loaded.turns[0].content, "enumerate services on the target");
        assert_eq!(loaded.findings[0].source_agent, AgentRole::ScanEnum);
        assert_eq!(loaded.findings[1].kind, FindingKind::Failed);
    }

    #[test]
    fn test_sqlite_save_is_replace_not_append() {
        let store = SqliteThreadStore::open_in_memory().unwrap();
        let mut thread = sample_thread("sq-2");
        store.save(&thread).unwrap();

        thread.push_user("next objective");
        store.save(&thread).unwrap();

        let loaded = store.load("sq-2").unwrap().unwrap();
        assert_eq!(loaded.turns.len(), 3);
        assert_eq!(loaded.findings.len(), 2);
    }
}

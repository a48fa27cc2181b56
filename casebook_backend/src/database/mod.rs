pub mod models;
pub mod repositories;

use crate::config::CasebookPaths;
use anyhow::{anyhow, Result};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

pub(crate) const MIGRATIONS: &str = r#"
    PRAGMA journal_mode = WAL;
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS profiles (
        user_id TEXT PRIMARY KEY,
        display_name TEXT,
        photo_url TEXT,
        specialty TEXT,
        hospital TEXT,
        bio TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT
    );

    CREATE TABLE IF NOT EXISTS cases (
        id TEXT PRIMARY KEY,
        owner_user_id TEXT NOT NULL,
        title TEXT NOT NULL,
        chief_complaint TEXT,
        history TEXT,
        examination TEXT,
        investigations TEXT,
        management TEXT,
        diagnosis TEXT,
        discussion TEXT,
        summary TEXT,
        case_references TEXT,
        hospital TEXT,
        referral_center TEXT,
        award_count INTEGER NOT NULL DEFAULT 0 CHECK (award_count >= 0),
        created_at TEXT NOT NULL,
        updated_at TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_cases_owner ON cases(owner_user_id);
    CREATE INDEX IF NOT EXISTS idx_cases_created ON cases(created_at);

    CREATE TABLE IF NOT EXISTS case_specialties (
        case_id TEXT NOT NULL,
        specialty TEXT NOT NULL,
        PRIMARY KEY (case_id, specialty),
        FOREIGN KEY (case_id) REFERENCES cases(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_case_specialties_specialty ON case_specialties(specialty);

    CREATE TABLE IF NOT EXISTS case_media (
        case_id TEXT NOT NULL,
        position INTEGER NOT NULL,
        url TEXT NOT NULL,
        PRIMARY KEY (case_id, position),
        FOREIGN KEY (case_id) REFERENCES cases(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS comments (
        id TEXT PRIMARY KEY,
        case_id TEXT NOT NULL,
        author_user_id TEXT NOT NULL,
        body TEXT NOT NULL,
        parent_comment_id TEXT,
        upvotes INTEGER NOT NULL DEFAULT 0,
        downvotes INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        FOREIGN KEY (case_id) REFERENCES cases(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_comments_case ON comments(case_id, created_at);
    CREATE INDEX IF NOT EXISTS idx_comments_author ON comments(author_user_id);

    CREATE TABLE IF NOT EXISTS reactions (
        subject_kind TEXT NOT NULL,
        subject_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        reaction_type TEXT NOT NULL,
        created_at TEXT NOT NULL,
        PRIMARY KEY (subject_kind, subject_id, user_id)
    );

    CREATE TABLE IF NOT EXISTS case_activity (
        case_id TEXT PRIMARY KEY,
        trending_score REAL NOT NULL DEFAULT 0,
        last_interaction_at TEXT NOT NULL,
        FOREIGN KEY (case_id) REFERENCES cases(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_case_activity_recent ON case_activity(last_interaction_at);

    CREATE TABLE IF NOT EXISTS message_threads (
        id TEXT PRIMARY KEY,
        participant_a TEXT NOT NULL,
        participant_b TEXT NOT NULL,
        participant_a_name TEXT,
        participant_b_name TEXT,
        last_message_text TEXT,
        last_message_at TEXT,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_threads_a ON message_threads(participant_a);
    CREATE INDEX IF NOT EXISTS idx_threads_b ON message_threads(participant_b);

    CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        thread_id TEXT NOT NULL,
        sender_user_id TEXT NOT NULL,
        recipient_user_id TEXT NOT NULL,
        body TEXT NOT NULL,
        created_at TEXT NOT NULL,
        read_at TEXT,
        FOREIGN KEY (thread_id) REFERENCES message_threads(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_messages_thread ON messages(thread_id, created_at);
    CREATE INDEX IF NOT EXISTS idx_messages_unread
        ON messages(recipient_user_id, read_at)
        WHERE read_at IS NULL;
"#;

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    newly_created: bool,
}

impl Database {
    pub fn connect(paths: &CasebookPaths) -> Result<Self> {
        let newly_created = !paths.db_path.exists();
        let conn = Connection::open(&paths.db_path)?;
        Ok(Self::from_connection(conn, newly_created))
    }

    pub fn from_connection(conn: Connection, newly_created: bool) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            newly_created,
        }
    }

    pub fn ensure_migrations(&self) -> Result<bool> {
        self.with_conn(|conn| {
            conn.execute_batch(MIGRATIONS)?;
            Ok(())
        })?;
        Ok(self.newly_created)
    }

    pub fn with_repositories<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(repositories::SqliteRepositories<'_>) -> Result<T>,
    {
        self.with_conn(|conn| {
            let repos = repositories::SqliteRepositories::new(conn);
            f(repos)
        })
    }

    /// Runs `f` inside a single transaction. The transaction commits when `f`
    /// returns `Ok` and rolls back otherwise, so a failed read-modify-write
    /// leaves no partial state behind.
    pub fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(repositories::SqliteRepositories<'_>) -> Result<T, E>,
        E: From<anyhow::Error>,
    {
        let guard = self
            .conn
            .lock()
            .map_err(|_| E::from(anyhow!("database mutex poisoned")))?;
        let tx = guard
            .unchecked_transaction()
            .map_err(|err| E::from(anyhow::Error::from(err)))?;
        let value = f(repositories::SqliteRepositories::new(&tx))?;
        tx.commit().map_err(|err| E::from(anyhow::Error::from(err)))?;
        Ok(value)
    }

    fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let guard = self
            .conn
            .lock()
            .map_err(|_| anyhow!("database mutex poisoned"))?;
        f(&guard)
    }
}

#[cfg(test)]
pub(crate) fn test_database() -> Database {
    let conn = Connection::open_in_memory().expect("in-memory db");
    let db = Database::from_connection(conn, true);
    db.ensure_migrations().expect("migrations");
    db
}

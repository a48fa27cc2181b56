use super::collect_rows;
use crate::database::models::MessageRecord;
use anyhow::Result;
use rusqlite::{params, Connection};

pub(super) struct SqliteMessageRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::MessageRepository for SqliteMessageRepository<'conn> {
    fn append(&self, record: &MessageRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO messages (
                id, thread_id, sender_user_id, recipient_user_id, body, created_at, read_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                record.id,
                record.thread_id,
                record.sender_user_id,
                record.recipient_user_id,
                record.body,
                record.created_at,
                record.read_at,
            ],
        )?;
        Ok(())
    }

    fn list_for_thread(&self, thread_id: &str, limit: usize) -> Result<Vec<MessageRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, thread_id, sender_user_id, recipient_user_id, body, created_at, read_at
            FROM (
                SELECT rowid AS seq, *
                FROM messages
                WHERE thread_id = ?1
                ORDER BY created_at DESC, rowid DESC
                LIMIT ?2
            )
            ORDER BY created_at ASC, seq ASC
            "#,
        )?;
        let rows = stmt.query_map(params![thread_id, limit], MessageRecord::from_row)?;
        collect_rows(rows)
    }

    fn mark_thread_read(
        &self,
        thread_id: &str,
        recipient_user_id: &str,
        read_at: &str,
    ) -> Result<usize> {
        let updated = self.conn.execute(
            r#"
            UPDATE messages
            SET read_at = ?3
            WHERE thread_id = ?1 AND recipient_user_id = ?2 AND read_at IS NULL
            "#,
            params![thread_id, recipient_user_id, read_at],
        )?;
        Ok(updated)
    }

    fn count_unread(&self, recipient_user_id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            r#"
            SELECT COUNT(*)
            FROM messages
            WHERE recipient_user_id = ?1 AND read_at IS NULL
            "#,
            params![recipient_user_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn count_unread_in_thread(&self, thread_id: &str, recipient_user_id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            r#"
            SELECT COUNT(*)
            FROM messages
            WHERE thread_id = ?1 AND recipient_user_id = ?2 AND read_at IS NULL
            "#,
            params![thread_id, recipient_user_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

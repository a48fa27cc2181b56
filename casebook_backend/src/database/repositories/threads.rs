use super::collect_rows;
use crate::database::models::ThreadRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

pub(super) struct SqliteThreadRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::ThreadRepository for SqliteThreadRepository<'conn> {
    fn upsert(&self, record: &ThreadRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO message_threads (
                id, participant_a, participant_b, participant_a_name, participant_b_name,
                last_message_text, last_message_at, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                participant_a_name = excluded.participant_a_name,
                participant_b_name = excluded.participant_b_name,
                last_message_text = excluded.last_message_text,
                last_message_at = excluded.last_message_at
            "#,
            params![
                record.id,
                record.participant_a,
                record.participant_b,
                record.participant_a_name,
                record.participant_b_name,
                record.last_message_text,
                record.last_message_at,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<ThreadRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, participant_a, participant_b, participant_a_name, participant_b_name,
                       last_message_text, last_message_at, created_at
                FROM message_threads
                WHERE id = ?1
                "#,
                params![id],
                ThreadRecord::from_row,
            )
            .optional()?)
    }

    fn list_for_user(&self, user_id: &str) -> Result<Vec<ThreadRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, participant_a, participant_b, participant_a_name, participant_b_name,
                   last_message_text, last_message_at, created_at
            FROM message_threads
            WHERE participant_a = ?1 OR participant_b = ?1
            ORDER BY COALESCE(last_message_at, created_at) DESC
            "#,
        )?;
        let rows = stmt.query_map(params![user_id], ThreadRecord::from_row)?;
        collect_rows(rows)
    }
}

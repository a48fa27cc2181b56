use super::collect_rows;
use crate::database::models::{ReactionRecord, ReactionType, SubjectKind};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;

pub(super) struct SqliteReactionRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::ReactionRepository for SqliteReactionRepository<'conn> {
    fn get(
        &self,
        kind: SubjectKind,
        subject_id: &str,
        user_id: &str,
    ) -> Result<Option<ReactionRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT subject_kind, subject_id, user_id, reaction_type, created_at
                FROM reactions
                WHERE subject_kind = ?1 AND subject_id = ?2 AND user_id = ?3
                "#,
                params![kind, subject_id, user_id],
                ReactionRecord::from_row,
            )
            .optional()?)
    }

    fn upsert(&self, record: &ReactionRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO reactions (subject_kind, subject_id, user_id, reaction_type, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(subject_kind, subject_id, user_id) DO UPDATE SET
                reaction_type = excluded.reaction_type,
                created_at = excluded.created_at
            "#,
            params![
                record.subject_kind,
                record.subject_id,
                record.user_id,
                record.reaction_type,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    fn remove(&self, kind: SubjectKind, subject_id: &str, user_id: &str) -> Result<()> {
        self.conn.execute(
            r#"
            DELETE FROM reactions
            WHERE subject_kind = ?1 AND subject_id = ?2 AND user_id = ?3
            "#,
            params![kind, subject_id, user_id],
        )?;
        Ok(())
    }

    fn list_for_subject(&self, kind: SubjectKind, subject_id: &str) -> Result<Vec<ReactionRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT subject_kind, subject_id, user_id, reaction_type, created_at
            FROM reactions
            WHERE subject_kind = ?1 AND subject_id = ?2
            ORDER BY created_at ASC
            "#,
        )?;
        let rows = stmt.query_map(params![kind, subject_id], ReactionRecord::from_row)?;
        collect_rows(rows)
    }

    fn count_for_subject(
        &self,
        kind: SubjectKind,
        subject_id: &str,
    ) -> Result<HashMap<ReactionType, usize>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT reaction_type, COUNT(*) as count
            FROM reactions
            WHERE subject_kind = ?1 AND subject_id = ?2
            GROUP BY reaction_type
            "#,
        )?;
        let rows = stmt.query_map(params![kind, subject_id], |row| {
            Ok((row.get::<_, ReactionType>(0)?, row.get::<_, i64>(1)? as usize))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (reaction_type, count) = row?;
            counts.insert(reaction_type, count);
        }
        Ok(counts)
    }
}

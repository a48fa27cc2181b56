use super::collect_rows;
use crate::database::models::{CommentRecord, COMMENT_COLUMNS};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

pub(super) struct SqliteCommentRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::CommentRepository for SqliteCommentRepository<'conn> {
    fn create(&self, record: &CommentRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO comments (
                id, case_id, author_user_id, body, parent_comment_id, upvotes, downvotes, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                record.id,
                record.case_id,
                record.author_user_id,
                record.body,
                record.parent_comment_id,
                record.upvotes,
                record.downvotes,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<CommentRecord>> {
        let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![id], CommentRecord::from_row)
            .optional()?)
    }

    fn list_for_case(&self, case_id: &str) -> Result<Vec<CommentRecord>> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments
             WHERE case_id = ?1
             ORDER BY created_at ASC, rowid ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![case_id], CommentRecord::from_row)?;
        collect_rows(rows)
    }

    fn adjust_votes(&self, comment_id: &str, upvote_delta: i64, downvote_delta: i64) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE comments
            SET upvotes = upvotes + ?2,
                downvotes = downvotes + ?3
            WHERE id = ?1
            "#,
            params![comment_id, upvote_delta, downvote_delta],
        )?;
        Ok(())
    }
}

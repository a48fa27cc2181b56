use super::collect_rows;
use crate::database::models::TrendingCaseRecord;
use anyhow::Result;
use rusqlite::{params, Connection};

pub(super) struct SqliteActivityRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::ActivityRepository for SqliteActivityRepository<'conn> {
    fn record_interaction(&self, case_id: &str, weight: f64, at: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO case_activity (case_id, trending_score, last_interaction_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(case_id) DO UPDATE SET
                trending_score = case_activity.trending_score + excluded.trending_score,
                last_interaction_at = MAX(case_activity.last_interaction_at, excluded.last_interaction_at)
            "#,
            params![case_id, weight, at],
        )?;
        Ok(())
    }

    fn list_trending(&self, since: &str, limit: usize) -> Result<Vec<TrendingCaseRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT a.case_id, c.title, c.owner_user_id, c.award_count,
                   a.trending_score, a.last_interaction_at
            FROM case_activity a
            INNER JOIN cases c ON c.id = a.case_id
            WHERE a.last_interaction_at >= ?1
            ORDER BY a.trending_score DESC, a.last_interaction_at DESC, a.case_id ASC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt.query_map(params![since, limit], TrendingCaseRecord::from_row)?;
        collect_rows(rows)
    }
}

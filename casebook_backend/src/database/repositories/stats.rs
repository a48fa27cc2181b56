use super::collect_rows;
use crate::database::models::{SpecialtyCountRecord, TotalsRecord, UserTotalsRecord};
use anyhow::Result;
use rusqlite::{params, Connection};

pub(super) struct SqliteStatsRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::StatsRepository for SqliteStatsRepository<'conn> {
    fn totals(&self) -> Result<TotalsRecord> {
        let totals = self.conn.query_row(
            r#"
            SELECT
                (SELECT COUNT(*) FROM cases),
                (SELECT COUNT(*) FROM comments),
                (SELECT COALESCE(SUM(award_count), 0) FROM cases),
                (SELECT COUNT(*) FROM profiles)
            "#,
            [],
            |row| {
                Ok(TotalsRecord {
                    cases: row.get(0)?,
                    comments: row.get(1)?,
                    awards: row.get(2)?,
                    profiles: row.get(3)?,
                })
            },
        )?;
        Ok(totals)
    }

    fn top_specialties(&self, limit: usize) -> Result<Vec<SpecialtyCountRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT specialty, COUNT(*) AS case_count
            FROM case_specialties
            GROUP BY specialty
            ORDER BY case_count DESC, specialty ASC
            LIMIT ?1
            "#,
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(SpecialtyCountRecord {
                specialty: row.get(0)?,
                case_count: row.get(1)?,
            })
        })?;
        collect_rows(rows)
    }

    fn user_totals(&self, user_id: &str) -> Result<UserTotalsRecord> {
        let totals = self.conn.query_row(
            r#"
            SELECT
                (SELECT COUNT(*) FROM cases WHERE owner_user_id = ?1),
                (SELECT COALESCE(SUM(award_count), 0) FROM cases WHERE owner_user_id = ?1),
                (SELECT COUNT(*) FROM comments WHERE author_user_id = ?1),
                (SELECT COALESCE(SUM(upvotes), 0) FROM comments WHERE author_user_id = ?1),
                (SELECT COALESCE(SUM(downvotes), 0) FROM comments WHERE author_user_id = ?1)
            "#,
            params![user_id],
            |row| {
                Ok(UserTotalsRecord {
                    cases_authored: row.get(0)?,
                    awards_received: row.get(1)?,
                    comments_written: row.get(2)?,
                    upvotes_received: row.get(3)?,
                    downvotes_received: row.get(4)?,
                })
            },
        )?;
        Ok(totals)
    }
}

use super::collect_rows;
use crate::database::models::{CaseRecord, CASE_COLUMNS};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

pub(super) struct SqliteCaseRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::CaseRepository for SqliteCaseRepository<'conn> {
    fn create(&self, record: &CaseRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO cases (
                id, owner_user_id, title, chief_complaint, history, examination,
                investigations, management, diagnosis, discussion, summary, case_references,
                hospital, referral_center, award_count, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
            params![
                record.id,
                record.owner_user_id,
                record.title,
                record.chief_complaint,
                record.history,
                record.examination,
                record.investigations,
                record.management,
                record.diagnosis,
                record.discussion,
                record.summary,
                record.references,
                record.hospital,
                record.referral_center,
                record.award_count,
                record.created_at,
                record.updated_at,
            ],
        )?;
        Ok(())
    }

    fn update(&self, record: &CaseRecord) -> Result<()> {
        // award_count and owner are deliberately not writable here.
        self.conn.execute(
            r#"
            UPDATE cases SET
                title = ?2,
                chief_complaint = ?3,
                history = ?4,
                examination = ?5,
                investigations = ?6,
                management = ?7,
                diagnosis = ?8,
                discussion = ?9,
                summary = ?10,
                case_references = ?11,
                hospital = ?12,
                referral_center = ?13,
                updated_at = ?14
            WHERE id = ?1
            "#,
            params![
                record.id,
                record.title,
                record.chief_complaint,
                record.history,
                record.examination,
                record.investigations,
                record.management,
                record.diagnosis,
                record.discussion,
                record.summary,
                record.references,
                record.hospital,
                record.referral_center,
                record.updated_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<CaseRecord>> {
        let sql = format!("SELECT {CASE_COLUMNS} FROM cases WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![id], CaseRecord::from_row)
            .optional()?)
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<CaseRecord>> {
        let sql = format!(
            "SELECT {CASE_COLUMNS} FROM cases ORDER BY created_at DESC, rowid DESC LIMIT ?1"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit], CaseRecord::from_row)?;
        collect_rows(rows)
    }

    fn list_by_owner(&self, owner_user_id: &str, limit: usize) -> Result<Vec<CaseRecord>> {
        let sql = format!(
            "SELECT {CASE_COLUMNS} FROM cases
             WHERE owner_user_id = ?1
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![owner_user_id, limit], CaseRecord::from_row)?;
        collect_rows(rows)
    }

    fn list_by_specialty(&self, specialty: &str, limit: usize) -> Result<Vec<CaseRecord>> {
        let sql = format!(
            "SELECT {CASE_COLUMNS} FROM cases
             WHERE id IN (SELECT case_id FROM case_specialties WHERE specialty = ?1)
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![specialty, limit], CaseRecord::from_row)?;
        collect_rows(rows)
    }

    fn replace_specialties(&self, case_id: &str, specialties: &[String]) -> Result<()> {
        self.conn.execute(
            "DELETE FROM case_specialties WHERE case_id = ?1",
            params![case_id],
        )?;
        let mut stmt = self.conn.prepare(
            r#"
            INSERT OR IGNORE INTO case_specialties (case_id, specialty)
            VALUES (?1, ?2)
            "#,
        )?;
        for specialty in specialties {
            stmt.execute(params![case_id, specialty])?;
        }
        Ok(())
    }

    fn specialties_for(&self, case_id: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT specialty
            FROM case_specialties
            WHERE case_id = ?1
            ORDER BY specialty ASC
            "#,
        )?;
        let rows = stmt.query_map(params![case_id], |row| row.get::<_, String>(0))?;
        collect_rows(rows)
    }

    fn replace_media(&self, case_id: &str, urls: &[String]) -> Result<()> {
        self.conn
            .execute("DELETE FROM case_media WHERE case_id = ?1", params![case_id])?;
        let mut stmt = self.conn.prepare(
            r#"
            INSERT INTO case_media (case_id, position, url)
            VALUES (?1, ?2, ?3)
            "#,
        )?;
        for (position, url) in urls.iter().enumerate() {
            stmt.execute(params![case_id, position as i64, url])?;
        }
        Ok(())
    }

    fn media_for(&self, case_id: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT url
            FROM case_media
            WHERE case_id = ?1
            ORDER BY position ASC
            "#,
        )?;
        let rows = stmt.query_map(params![case_id], |row| row.get::<_, String>(0))?;
        collect_rows(rows)
    }

    fn adjust_award_count(&self, case_id: &str, delta: i64) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE cases
            SET award_count = award_count + ?2
            WHERE id = ?1
            "#,
            params![case_id, delta],
        )?;
        Ok(())
    }
}

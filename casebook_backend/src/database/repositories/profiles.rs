use crate::database::models::ProfileRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

pub(super) struct SqliteProfileRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::ProfileRepository for SqliteProfileRepository<'conn> {
    fn merge_upsert(&self, record: &ProfileRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO profiles (
                user_id, display_name, photo_url, specialty, hospital, bio, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(user_id) DO UPDATE SET
                display_name = COALESCE(excluded.display_name, profiles.display_name),
                photo_url = COALESCE(excluded.photo_url, profiles.photo_url),
                specialty = COALESCE(excluded.specialty, profiles.specialty),
                hospital = COALESCE(excluded.hospital, profiles.hospital),
                bio = COALESCE(excluded.bio, profiles.bio),
                updated_at = excluded.updated_at
            "#,
            params![
                record.user_id,
                record.display_name,
                record.photo_url,
                record.specialty,
                record.hospital,
                record.bio,
                record.created_at,
                record.updated_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, user_id: &str) -> Result<Option<ProfileRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT user_id, display_name, photo_url, specialty, hospital, bio,
                       created_at, updated_at
                FROM profiles
                WHERE user_id = ?1
                "#,
                params![user_id],
                ProfileRecord::from_row,
            )
            .optional()?)
    }
}

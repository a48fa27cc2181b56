use crate::database::models::ProfileRecord;
use crate::database::repositories::ProfileRepository;
use crate::database::Database;
use crate::error::{require_non_empty, ServiceError, ServiceResult};
use crate::utils::{non_blank, now_utc_iso};
use serde::{Deserialize, Serialize};

#[derive(Clone)]
pub struct ProfileService {
    database: Database,
}

impl ProfileService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Merges `update` into the stored profile, creating it on first write.
    /// Absent or blank fields keep their stored value.
    pub fn upsert_profile(&self, user_id: &str, update: ProfileUpdate) -> ServiceResult<ProfileView> {
        require_non_empty("user id", user_id)?;
        let user_id = user_id.trim();
        let photo_url = non_blank(update.photo_url);
        if let Some(url) = &photo_url {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(ServiceError::Validation(format!(
                    "photo reference '{url}' is not an http(s) URL"
                )));
            }
        }

        let now = now_utc_iso();
        let record = ProfileRecord {
            user_id: user_id.to_string(),
            display_name: non_blank(update.display_name),
            photo_url,
            specialty: non_blank(update.specialty),
            hospital: non_blank(update.hospital),
            bio: non_blank(update.bio),
            created_at: now.clone(),
            updated_at: now,
        };

        let stored = self.database.transaction(|repos| -> ServiceResult<ProfileRecord> {
            let profiles = repos.profiles();
            profiles.merge_upsert(&record)?;
            profiles
                .get(user_id)?
                .ok_or_else(|| ServiceError::Store(anyhow::anyhow!("profile {user_id} vanished after upsert")))
        })?;

        tracing::debug!(user_id = %user_id, "profile saved");
        Ok(ProfileView::from_record(stored))
    }

    pub fn get_profile(&self, user_id: &str) -> ServiceResult<ProfileView> {
        let record = self
            .database
            .with_repositories(|repos| repos.profiles().get(user_id))?;
        record
            .map(ProfileView::from_record)
            .ok_or_else(|| ServiceError::not_found(format!("profile {user_id} not found")))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub hospital: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileView {
    pub user_id: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub specialty: Option<String>,
    pub hospital: Option<String>,
    pub bio: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ProfileView {
    fn from_record(record: ProfileRecord) -> Self {
        Self {
            user_id: record.user_id,
            display_name: record.display_name,
            photo_url: record.photo_url,
            specialty: record.specialty,
            hospital: record.hospital,
            bio: record.bio,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_database;

    #[test]
    fn partial_updates_merge_into_existing_profile() {
        let service = ProfileService::new(test_database());
        let created = service
            .upsert_profile(
                "dr-a",
                ProfileUpdate {
                    display_name: Some("Dr. A".into()),
                    specialty: Some("Cardiology".into()),
                    ..ProfileUpdate::default()
                },
            )
            .unwrap();

        let merged = service
            .upsert_profile(
                "dr-a",
                ProfileUpdate {
                    hospital: Some("St. Mary".into()),
                    specialty: Some("   ".into()),
                    ..ProfileUpdate::default()
                },
            )
            .unwrap();

        assert_eq!(merged.display_name.as_deref(), Some("Dr. A"));
        assert_eq!(merged.specialty.as_deref(), Some("Cardiology"));
        assert_eq!(merged.hospital.as_deref(), Some("St. Mary"));
        assert_eq!(merged.created_at, created.created_at);
        assert!(merged.updated_at >= created.updated_at);
    }

    #[test]
    fn missing_profile_is_not_found() {
        let service = ProfileService::new(test_database());
        assert!(matches!(service.get_profile("ghost"), Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn photo_must_be_a_web_url() {
        let service = ProfileService::new(test_database());
        let result = service.upsert_profile(
            "dr-a",
            ProfileUpdate {
                photo_url: Some("file:///etc/passwd".into()),
                ..ProfileUpdate::default()
            },
        );
        assert!(matches!(result, Err(ServiceError::Validation(_))));
        assert!(service.get_profile("dr-a").is_err());
    }
}

use crate::database::models::CaseRecord;
use crate::database::repositories::{CaseRepository, SqliteRepositories};
use crate::database::Database;
use crate::error::{require_non_empty, ServiceError, ServiceResult};
use crate::utils::{non_blank, now_utc_iso};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

pub const MAX_LIST_LIMIT: usize = 200;

#[derive(Clone)]
pub struct CaseService {
    database: Database,
}

impl CaseService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn create_case(&self, owner_user_id: &str, input: CreateCaseInput) -> ServiceResult<CaseView> {
        require_non_empty("owner user id", owner_user_id)?;
        require_non_empty("case title", &input.title)?;
        let specialties = normalize_specialties(input.specialties);
        let media_urls = validate_media_urls(input.media_urls)?;

        let now = now_utc_iso();
        let fields = input.fields.normalized();
        let record = CaseRecord {
            id: Uuid::new_v4().to_string(),
            owner_user_id: owner_user_id.trim().to_string(),
            title: input.title.trim().to_string(),
            chief_complaint: fields.chief_complaint,
            history: fields.history,
            examination: fields.examination,
            investigations: fields.investigations,
            management: fields.management,
            diagnosis: fields.diagnosis,
            discussion: fields.discussion,
            summary: fields.summary,
            references: fields.references,
            hospital: fields.hospital,
            referral_center: fields.referral_center,
            award_count: 0,
            created_at: now.clone(),
            updated_at: now,
        };

        let view = self.database.transaction(|repos| -> ServiceResult<CaseView> {
            let cases = repos.cases();
            cases.create(&record)?;
            cases.replace_specialties(&record.id, &specialties)?;
            cases.replace_media(&record.id, &media_urls)?;
            Ok(CaseView::from_record(record.clone(), specialties.clone(), media_urls.clone()))
        })?;

        tracing::info!(case_id = %view.id, owner = %view.owner_user_id, "case created");
        Ok(view)
    }

    /// Applies the provided fields to a case owned by `acting_user_id`.
    pub fn update_case(
        &self,
        case_id: &str,
        acting_user_id: &str,
        input: UpdateCaseInput,
    ) -> ServiceResult<CaseView> {
        require_non_empty("acting user id", acting_user_id)?;
        let acting_user_id = acting_user_id.trim();
        if let Some(title) = &input.title {
            require_non_empty("case title", title)?;
        }
        let specialties = input.specialties.map(normalize_specialties);
        let media_urls = input.media_urls.map(validate_media_urls).transpose()?;

        let view = self.database.transaction(|repos| -> ServiceResult<CaseView> {
            let cases = repos.cases();
            let mut record = cases
                .get(case_id)?
                .ok_or_else(|| ServiceError::not_found(format!("case {case_id} not found")))?;
            if record.owner_user_id != acting_user_id {
                return Err(ServiceError::permission_denied(
                    "only the case owner may edit this case",
                ));
            }

            if let Some(title) = input.title {
                record.title = title.trim().to_string();
            }
            input.fields.apply_to(&mut record);
            record.updated_at = now_utc_iso();
            cases.update(&record)?;

            if let Some(specialties) = &specialties {
                cases.replace_specialties(case_id, specialties)?;
            }
            if let Some(media_urls) = &media_urls {
                cases.replace_media(case_id, media_urls)?;
            }
            Ok(load_view(&repos, record)?)
        })?;

        tracing::info!(case_id = %view.id, "case updated");
        Ok(view)
    }

    pub fn get_case(&self, case_id: &str) -> ServiceResult<CaseView> {
        let view = self.database.with_repositories(|repos| {
            match repos.cases().get(case_id)? {
                Some(record) => Ok(Some(load_view(&repos, record)?)),
                None => Ok(None),
            }
        })?;
        view.ok_or_else(|| ServiceError::not_found(format!("case {case_id} not found")))
    }

    pub fn list_cases(&self, filter: CaseFilter, limit: usize) -> ServiceResult<Vec<CaseView>> {
        let limit = limit.clamp(1, MAX_LIST_LIMIT);
        let views = self.database.with_repositories(|repos| {
            let cases = repos.cases();
            let records = match &filter {
                CaseFilter::Recent => cases.list_recent(limit)?,
                CaseFilter::Owner(owner) => cases.list_by_owner(owner, limit)?,
                CaseFilter::Specialty(tag) => cases.list_by_specialty(tag.trim(), limit)?,
            };
            let mut views = Vec::with_capacity(records.len());
            for record in records {
                views.push(load_view(&repos, record)?);
            }
            Ok(views)
        })?;
        Ok(views)
    }
}

fn load_view(repos: &SqliteRepositories<'_>, record: CaseRecord) -> anyhow::Result<CaseView> {
    let cases = repos.cases();
    let specialties = cases.specialties_for(&record.id)?;
    let media_urls = cases.media_for(&record.id)?;
    Ok(CaseView::from_record(record, specialties, media_urls))
}

fn normalize_specialties(raw: Vec<String>) -> Vec<String> {
    raw.into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn validate_media_urls(raw: Vec<String>) -> ServiceResult<Vec<String>> {
    let mut urls = Vec::with_capacity(raw.len());
    for url in raw {
        let url = url.trim().to_string();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ServiceError::Validation(format!(
                "media reference '{url}' is not an http(s) URL"
            )));
        }
        urls.push(url);
    }
    Ok(urls)
}

#[derive(Debug, Clone)]
pub enum CaseFilter {
    Recent,
    Owner(String),
    Specialty(String),
}

/// Free-text clinical sections plus the institution fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClinicalFields {
    #[serde(default)]
    pub chief_complaint: Option<String>,
    #[serde(default)]
    pub history: Option<String>,
    #[serde(default)]
    pub examination: Option<String>,
    #[serde(default)]
    pub investigations: Option<String>,
    #[serde(default)]
    pub management: Option<String>,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub discussion: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub references: Option<String>,
    #[serde(default)]
    pub hospital: Option<String>,
    #[serde(default)]
    pub referral_center: Option<String>,
}

impl ClinicalFields {
    fn normalized(self) -> Self {
        Self {
            chief_complaint: non_blank(self.chief_complaint),
            history: non_blank(self.history),
            examination: non_blank(self.examination),
            investigations: non_blank(self.investigations),
            management: non_blank(self.management),
            diagnosis: non_blank(self.diagnosis),
            discussion: non_blank(self.discussion),
            summary: non_blank(self.summary),
            references: non_blank(self.references),
            hospital: non_blank(self.hospital),
            referral_center: non_blank(self.referral_center),
        }
    }

    /// Overwrites the sections present in `self`; a blank string clears one.
    fn apply_to(self, record: &mut CaseRecord) {
        fn set(target: &mut Option<String>, value: Option<String>) {
            if let Some(value) = value {
                *target = non_blank(Some(value));
            }
        }
        set(&mut record.chief_complaint, self.chief_complaint);
        set(&mut record.history, self.history);
        set(&mut record.examination, self.examination);
        set(&mut record.investigations, self.investigations);
        set(&mut record.management, self.management);
        set(&mut record.diagnosis, self.diagnosis);
        set(&mut record.discussion, self.discussion);
        set(&mut record.summary, self.summary);
        set(&mut record.references, self.references);
        set(&mut record.hospital, self.hospital);
        set(&mut record.referral_center, self.referral_center);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCaseInput {
    pub title: String,
    #[serde(flatten)]
    pub fields: ClinicalFields,
    #[serde(default)]
    pub specialties: Vec<String>,
    #[serde(default)]
    pub media_urls: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCaseInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(flatten)]
    pub fields: ClinicalFields,
    #[serde(default)]
    pub specialties: Option<Vec<String>>,
    #[serde(default)]
    pub media_urls: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseView {
    pub id: String,
    pub owner_user_id: String,
    pub title: String,
    #[serde(flatten)]
    pub fields: ClinicalFields,
    pub specialties: Vec<String>,
    pub media_urls: Vec<String>,
    pub award_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl CaseView {
    fn from_record(record: CaseRecord, specialties: Vec<String>, media_urls: Vec<String>) -> Self {
        Self {
            id: record.id,
            owner_user_id: record.owner_user_id,
            title: record.title,
            fields: ClinicalFields {
                chief_complaint: record.chief_complaint,
                history: record.history,
                examination: record.examination,
                investigations: record.investigations,
                management: record.management,
                diagnosis: record.diagnosis,
                discussion: record.discussion,
                summary: record.summary,
                references: record.references,
                hospital: record.hospital,
                referral_center: record.referral_center,
            },
            specialties,
            media_urls,
            award_count: record.award_count,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_database;

    fn setup_service() -> CaseService {
        CaseService::new(test_database())
    }

    fn input(title: &str) -> CreateCaseInput {
        CreateCaseInput {
            title: title.into(),
            fields: ClinicalFields {
                chief_complaint: Some("Sudden dyspnoea".into()),
                diagnosis: Some("Pulmonary embolism".into()),
                hospital: Some("  ".into()),
                ..ClinicalFields::default()
            },
            specialties: vec![
                "respiratory".into(),
                " emergency ".into(),
                "respiratory".into(),
                "".into(),
            ],
            media_urls: vec!["https://cdn.example/ctpa.png".into()],
        }
    }

    #[test]
    fn create_case_normalizes_tags_and_blank_fields() {
        let service = setup_service();
        let view = service.create_case("dr-a", input("Young PE")).expect("create case");
        assert_eq!(view.title, "Young PE");
        assert_eq!(view.specialties, vec!["emergency", "respiratory"]);
        assert_eq!(view.media_urls, vec!["https://cdn.example/ctpa.png"]);
        assert_eq!(view.fields.hospital, None);
        assert_eq!(view.award_count, 0);

        let fetched = service.get_case(&view.id).expect("fetch case");
        assert_eq!(fetched.fields.diagnosis.as_deref(), Some("Pulmonary embolism"));
    }

    #[test]
    fn create_case_requires_owner_and_title() {
        let service = setup_service();
        assert!(matches!(
            service.create_case("", input("Title")),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            service.create_case("dr-a", input("   ")),
            Err(ServiceError::Validation(_))
        ));
        let recent = service.list_cases(CaseFilter::Recent, 10).unwrap();
        assert!(recent.is_empty(), "rejected input must not be written");
    }

    #[test]
    fn create_case_rejects_non_http_media() {
        let service = setup_service();
        let mut bad = input("Media");
        bad.media_urls.push("file:///etc/passwd".into());
        assert!(matches!(
            service.create_case("dr-a", bad),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn only_owner_may_update() {
        let service = setup_service();
        let view = service.create_case("dr-a", input("Original")).unwrap();

        let denied = service.update_case(
            &view.id,
            "dr-b",
            UpdateCaseInput {
                title: Some("Hijacked".into()),
                ..UpdateCaseInput::default()
            },
        );
        assert!(matches!(denied, Err(ServiceError::PermissionDenied(_))));

        let updated = service
            .update_case(
                &view.id,
                "dr-a",
                UpdateCaseInput {
                    title: Some("Revised".into()),
                    fields: ClinicalFields {
                        management: Some("Anticoagulation".into()),
                        chief_complaint: Some("".into()),
                        ..ClinicalFields::default()
                    },
                    specialties: Some(vec!["haematology".into()]),
                    media_urls: None,
                },
            )
            .unwrap();
        assert_eq!(updated.title, "Revised");
        assert_eq!(updated.fields.management.as_deref(), Some("Anticoagulation"));
        assert_eq!(updated.fields.chief_complaint, None);
        assert_eq!(updated.fields.diagnosis.as_deref(), Some("Pulmonary embolism"));
        assert_eq!(updated.specialties, vec!["haematology"]);
        assert_eq!(updated.media_urls, vec!["https://cdn.example/ctpa.png"]);
    }

    #[test]
    fn owner_check_ignores_surrounding_whitespace() {
        let service = setup_service();
        let view = service.create_case(" dr-a ", input("Padded")).unwrap();
        assert_eq!(view.owner_user_id, "dr-a");

        let updated = service
            .update_case(
                &view.id,
                "  dr-a",
                UpdateCaseInput {
                    title: Some("Still mine".into()),
                    ..UpdateCaseInput::default()
                },
            )
            .unwrap();
        assert_eq!(updated.title, "Still mine");
    }

    #[test]
    fn update_missing_case_is_not_found() {
        let service = setup_service();
        let result = service.update_case("nope", "dr-a", UpdateCaseInput::default());
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn list_filters_by_owner_and_specialty() {
        let service = setup_service();
        service.create_case("dr-a", input("One")).unwrap();
        let mut other = input("Two");
        other.specialties = vec!["neurology".into()];
        service.create_case("dr-b", other).unwrap();

        let by_owner = service.list_cases(CaseFilter::Owner("dr-b".into()), 10).unwrap();
        assert_eq!(by_owner.len(), 1);
        assert_eq!(by_owner[0].title, "Two");

        let by_tag = service
            .list_cases(CaseFilter::Specialty("respiratory".into()), 10)
            .unwrap();
        assert_eq!(by_tag.len(), 1);
        assert_eq!(by_tag[0].title, "One");

        assert_eq!(service.list_cases(CaseFilter::Recent, 10).unwrap().len(), 2);
    }
}

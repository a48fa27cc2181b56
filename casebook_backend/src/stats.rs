use crate::database::models::{SpecialtyCountRecord, TotalsRecord, UserTotalsRecord};
use crate::database::repositories::StatsRepository;
use crate::database::Database;
use crate::error::{require_non_empty, ServiceResult};
use serde::{Deserialize, Serialize};

pub const TOP_SPECIALTIES: usize = 10;

#[derive(Clone)]
pub struct StatsService {
    database: Database,
}

impl StatsService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn overview(&self) -> ServiceResult<StatsOverview> {
        let overview = self.database.with_repositories(|repos| {
            let stats = repos.stats();
            Ok(StatsOverview {
                totals: stats.totals()?,
                top_specialties: stats.top_specialties(TOP_SPECIALTIES)?,
            })
        })?;
        Ok(overview)
    }

    pub fn user_stats(&self, user_id: &str) -> ServiceResult<UserStats> {
        require_non_empty("user id", user_id)?;
        let totals = self
            .database
            .with_repositories(|repos| repos.stats().user_totals(user_id))?;
        Ok(UserStats {
            user_id: user_id.to_string(),
            totals,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsOverview {
    pub totals: TotalsRecord,
    pub top_specialties: Vec<SpecialtyCountRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStats {
    pub user_id: String,
    #[serde(flatten)]
    pub totals: UserTotalsRecord,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cases::{CaseService, ClinicalFields, CreateCaseInput};
    use crate::comments::{CommentService, CreateCommentInput};
    use crate::database::models::ReactionType;
    use crate::database::test_database;
    use crate::reactions::{ReactionService, ReactionSubject};

    fn create_case(service: &CaseService, owner: &str, tags: &[&str]) -> String {
        service
            .create_case(
                owner,
                CreateCaseInput {
                    title: "Case".into(),
                    fields: ClinicalFields::default(),
                    specialties: tags.iter().map(|t| t.to_string()).collect(),
                    media_urls: vec![],
                },
            )
            .unwrap()
            .id
    }

    #[test]
    fn overview_counts_everything() {
        let db = test_database();
        let cases = CaseService::new(db.clone());
        let first = create_case(&cases, "dr-a", &["cardiology", "icu"]);
        create_case(&cases, "dr-b", &["cardiology"]);
        ReactionService::new(db.clone())
            .react(&ReactionSubject::Case(first), "dr-b", ReactionType::Award)
            .unwrap();

        let overview = StatsService::new(db).overview().unwrap();
        assert_eq!(overview.totals.cases, 2);
        assert_eq!(overview.totals.awards, 1);
        assert_eq!(overview.totals.comments, 0);
        assert_eq!(overview.top_specialties[0].specialty, "cardiology");
        assert_eq!(overview.top_specialties[0].case_count, 2);
        assert_eq!(overview.top_specialties[1].specialty, "icu");
    }

    #[test]
    fn user_stats_cover_authored_content() {
        let db = test_database();
        let cases = CaseService::new(db.clone());
        let case_id = create_case(&cases, "dr-a", &[]);
        let comment = CommentService::new(db.clone())
            .add_comment(
                &case_id,
                CreateCommentInput {
                    author_user_id: "dr-b".into(),
                    body: "Nice workup".into(),
                    parent_comment_id: None,
                },
            )
            .unwrap();
        let reactions = ReactionService::new(db.clone());
        reactions
            .react(&ReactionSubject::Case(case_id), "dr-c", ReactionType::Award)
            .unwrap();
        reactions
            .react(&ReactionSubject::Comment(comment.id), "dr-a", ReactionType::Upvote)
            .unwrap();

        let stats = StatsService::new(db);
        let author = stats.user_stats("dr-a").unwrap();
        assert_eq!(author.totals.cases_authored, 1);
        assert_eq!(author.totals.awards_received, 1);
        let commenter = stats.user_stats("dr-b").unwrap();
        assert_eq!(commenter.totals.comments_written, 1);
        assert_eq!(commenter.totals.upvotes_received, 1);
        assert_eq!(commenter.totals.downvotes_received, 0);
    }
}

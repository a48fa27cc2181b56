//! Reaction aggregation with "last reaction wins" semantics.
//!
//! A user holds at most one reaction per subject. Changing it moves the
//! user's vote between counters inside one transaction, so every counter
//! equals the number of distinct users whose current reaction is that type.

use crate::database::models::{ReactionRecord, ReactionType, SubjectKind};
use crate::database::repositories::{
    ActivityRepository, CaseRepository, CommentRepository, ReactionRepository, SqliteRepositories,
};
use crate::database::Database;
use crate::error::{require_non_empty, ServiceError, ServiceResult};
use crate::trending::{AWARD_WEIGHT, VOTE_WEIGHT};
use crate::utils::now_utc_iso;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ReactionSubject {
    Case(String),
    Comment(String),
}

impl ReactionSubject {
    pub fn kind(&self) -> SubjectKind {
        match self {
            ReactionSubject::Case(_) => SubjectKind::Case,
            ReactionSubject::Comment(_) => SubjectKind::Comment,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ReactionSubject::Case(id) | ReactionSubject::Comment(id) => id,
        }
    }

    fn accepts(&self, reaction_type: ReactionType) -> bool {
        matches!(
            (self, reaction_type),
            (ReactionSubject::Case(_), ReactionType::Award)
                | (ReactionSubject::Comment(_), ReactionType::Upvote | ReactionType::Downvote)
        )
    }
}

/// Aggregate counters of a subject after a reaction was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "subject", rename_all = "snake_case")]
pub enum SubjectCounters {
    Case { award_count: i64 },
    Comment { upvotes: i64, downvotes: i64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionOutcome {
    pub counters: SubjectCounters,
    pub previous: Option<ReactionType>,
    pub current: Option<ReactionType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionView {
    pub user_id: String,
    pub reaction_type: ReactionType,
    pub created_at: String,
}

impl ReactionView {
    fn from_record(record: ReactionRecord) -> Self {
        Self {
            user_id: record.user_id,
            reaction_type: record.reaction_type,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionSummary {
    pub reactions: Vec<ReactionView>,
    pub counts: HashMap<ReactionType, usize>,
}

#[derive(Clone)]
pub struct ReactionService {
    database: Database,
}

impl ReactionService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Records `reaction_type` as `user_id`'s current reaction on `subject`
    /// and updates the subject's counters in the same transaction.
    pub fn react(
        &self,
        subject: &ReactionSubject,
        user_id: &str,
        reaction_type: ReactionType,
    ) -> ServiceResult<ReactionOutcome> {
        require_non_empty("user id", user_id)?;
        require_non_empty("subject id", subject.id())?;
        if !subject.accepts(reaction_type) {
            return Err(ServiceError::Validation(format!(
                "{reaction_type} is not a valid reaction on a {}",
                subject.kind()
            )));
        }

        let outcome = self.database.transaction(|repos| -> ServiceResult<ReactionOutcome> {
            let case_id = owning_case_id(&repos, subject)?;
            let previous = repos
                .reactions()
                .get(subject.kind(), subject.id(), user_id)?
                .map(|record| record.reaction_type);

            if previous != Some(reaction_type) {
                if let Some(old) = previous {
                    apply_delta(&repos, subject, old, -1)?;
                }
                apply_delta(&repos, subject, reaction_type, 1)?;

                let now = now_utc_iso();
                repos.reactions().upsert(&ReactionRecord {
                    subject_kind: subject.kind(),
                    subject_id: subject.id().to_string(),
                    user_id: user_id.to_string(),
                    reaction_type,
                    created_at: now.clone(),
                })?;
                let weight = match reaction_type {
                    ReactionType::Award => AWARD_WEIGHT,
                    ReactionType::Upvote | ReactionType::Downvote => VOTE_WEIGHT,
                };
                repos.activity().record_interaction(&case_id, weight, &now)?;
            }

            Ok(ReactionOutcome {
                counters: load_counters(&repos, subject)?,
                previous,
                current: Some(reaction_type),
            })
        })?;

        tracing::info!(
            subject = %subject.kind(),
            subject_id = %subject.id(),
            user_id = %user_id,
            reaction = %reaction_type,
            previous = ?outcome.previous,
            "reaction recorded"
        );
        Ok(outcome)
    }

    /// Removes a user's vote on a comment. Awards are permanent.
    pub fn withdraw(&self, subject: &ReactionSubject, user_id: &str) -> ServiceResult<ReactionOutcome> {
        require_non_empty("user id", user_id)?;
        if let ReactionSubject::Case(_) = subject {
            return Err(ServiceError::validation("awards cannot be withdrawn"));
        }

        let outcome = self.database.transaction(|repos| -> ServiceResult<ReactionOutcome> {
            owning_case_id(&repos, subject)?;
            let previous = repos
                .reactions()
                .get(subject.kind(), subject.id(), user_id)?
                .map(|record| record.reaction_type);
            if let Some(old) = previous {
                apply_delta(&repos, subject, old, -1)?;
                repos.reactions().remove(subject.kind(), subject.id(), user_id)?;
            }
            Ok(ReactionOutcome {
                counters: load_counters(&repos, subject)?,
                previous,
                current: None,
            })
        })?;

        tracing::info!(
            subject_id = %subject.id(),
            user_id = %user_id,
            previous = ?outcome.previous,
            "reaction withdrawn"
        );
        Ok(outcome)
    }

    /// Stored reactions on a subject together with a tally per type.
    pub fn reaction_summary(&self, subject: &ReactionSubject) -> ServiceResult<ReactionSummary> {
        let (records, counts) = self.database.with_repositories(|repos| {
            let reactions = repos.reactions();
            let records = reactions.list_for_subject(subject.kind(), subject.id())?;
            let counts = reactions.count_for_subject(subject.kind(), subject.id())?;
            Ok((records, counts))
        })?;
        Ok(ReactionSummary {
            reactions: records.into_iter().map(ReactionView::from_record).collect(),
            counts,
        })
    }
}

/// Resolves the case a subject belongs to, failing with NotFound when the
/// subject does not exist.
fn owning_case_id(repos: &SqliteRepositories<'_>, subject: &ReactionSubject) -> ServiceResult<String> {
    match subject {
        ReactionSubject::Case(id) => repos
            .cases()
            .get(id)?
            .map(|record| record.id)
            .ok_or_else(|| ServiceError::not_found(format!("case {id} not found"))),
        ReactionSubject::Comment(id) => repos
            .comments()
            .get(id)?
            .map(|record| record.case_id)
            .ok_or_else(|| ServiceError::not_found(format!("comment {id} not found"))),
    }
}

fn apply_delta(
    repos: &SqliteRepositories<'_>,
    subject: &ReactionSubject,
    reaction_type: ReactionType,
    delta: i64,
) -> anyhow::Result<()> {
    match reaction_type {
        ReactionType::Award => repos.cases().adjust_award_count(subject.id(), delta),
        ReactionType::Upvote => repos.comments().adjust_votes(subject.id(), delta, 0),
        ReactionType::Downvote => repos.comments().adjust_votes(subject.id(), 0, delta),
    }
}

fn load_counters(
    repos: &SqliteRepositories<'_>,
    subject: &ReactionSubject,
) -> ServiceResult<SubjectCounters> {
    match subject {
        ReactionSubject::Case(id) => {
            let record = repos
                .cases()
                .get(id)?
                .ok_or_else(|| ServiceError::not_found(format!("case {id} not found")))?;
            Ok(SubjectCounters::Case {
                award_count: record.award_count,
            })
        }
        ReactionSubject::Comment(id) => {
            let record = repos
                .comments()
                .get(id)?
                .ok_or_else(|| ServiceError::not_found(format!("comment {id} not found")))?;
            Ok(SubjectCounters::Comment {
                upvotes: record.upvotes,
                downvotes: record.downvotes,
            })
        }
    }
}

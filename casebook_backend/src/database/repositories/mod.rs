mod activity;
mod cases;
mod comments;
mod messages;
mod profiles;
mod reactions;
mod stats;
mod threads;

use super::models::{
    CaseRecord, CommentRecord, MessageRecord, ProfileRecord, ReactionRecord,
    ReactionType, SpecialtyCountRecord, SubjectKind, ThreadRecord, TotalsRecord,
    TrendingCaseRecord, UserTotalsRecord,
};
use anyhow::Result;
use rusqlite::Connection;
use std::collections::HashMap;

pub trait CaseRepository {
    fn create(&self, record: &CaseRecord) -> Result<()>;
    fn update(&self, record: &CaseRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<CaseRecord>>;
    fn list_recent(&self, limit: usize) -> Result<Vec<CaseRecord>>;
    fn list_by_owner(&self, owner_user_id: &str, limit: usize) -> Result<Vec<CaseRecord>>;
    fn list_by_specialty(&self, specialty: &str, limit: usize) -> Result<Vec<CaseRecord>>;
    fn replace_specialties(&self, case_id: &str, specialties: &[String]) -> Result<()>;
    fn specialties_for(&self, case_id: &str) -> Result<Vec<String>>;
    fn replace_media(&self, case_id: &str, urls: &[String]) -> Result<()>;
    fn media_for(&self, case_id: &str) -> Result<Vec<String>>;
    /// Applies a relative change to the award counter.
    fn adjust_award_count(&self, case_id: &str, delta: i64) -> Result<()>;
}

pub trait CommentRepository {
    fn create(&self, record: &CommentRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<CommentRecord>>;
    /// Comments for one case in creation order.
    fn list_for_case(&self, case_id: &str) -> Result<Vec<CommentRecord>>;
    /// Applies relative changes to both vote counters in one statement.
    fn adjust_votes(&self, comment_id: &str, upvote_delta: i64, downvote_delta: i64) -> Result<()>;
}

pub trait ReactionRepository {
    fn get(&self, kind: SubjectKind, subject_id: &str, user_id: &str)
        -> Result<Option<ReactionRecord>>;
    /// Inserts or overwrites the single reaction a user holds on a subject.
    fn upsert(&self, record: &ReactionRecord) -> Result<()>;
    fn remove(&self, kind: SubjectKind, subject_id: &str, user_id: &str) -> Result<()>;
    fn list_for_subject(&self, kind: SubjectKind, subject_id: &str) -> Result<Vec<ReactionRecord>>;
    fn count_for_subject(
        &self,
        kind: SubjectKind,
        subject_id: &str,
    ) -> Result<HashMap<ReactionType, usize>>;
}

pub trait ActivityRepository {
    /// Adds `weight` to the case's trending score and stamps the interaction.
    fn record_interaction(&self, case_id: &str, weight: f64, at: &str) -> Result<()>;
    /// Cases interacted with at or after `since`, best score first, most
    /// recent interaction breaking ties.
    fn list_trending(&self, since: &str, limit: usize) -> Result<Vec<TrendingCaseRecord>>;
}

pub trait ThreadRepository {
    fn upsert(&self, record: &ThreadRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<ThreadRecord>>;
    fn list_for_user(&self, user_id: &str) -> Result<Vec<ThreadRecord>>;
}

pub trait MessageRepository {
    fn append(&self, record: &MessageRecord) -> Result<()>;
    /// The newest `limit` messages of a thread, returned oldest first.
    fn list_for_thread(&self, thread_id: &str, limit: usize) -> Result<Vec<MessageRecord>>;
    fn mark_thread_read(&self, thread_id: &str, recipient_user_id: &str, read_at: &str)
        -> Result<usize>;
    fn count_unread(&self, recipient_user_id: &str) -> Result<usize>;
    fn count_unread_in_thread(&self, thread_id: &str, recipient_user_id: &str) -> Result<usize>;
}

pub trait ProfileRepository {
    /// Creates the profile or merges the provided (non-`None`) fields into it.
    fn merge_upsert(&self, record: &ProfileRecord) -> Result<()>;
    fn get(&self, user_id: &str) -> Result<Option<ProfileRecord>>;
}

pub trait StatsRepository {
    fn totals(&self) -> Result<TotalsRecord>;
    fn top_specialties(&self, limit: usize) -> Result<Vec<SpecialtyCountRecord>>;
    fn user_totals(&self, user_id: &str) -> Result<UserTotalsRecord>;
}

/// Borrowed view over a connection (or open transaction) handing out the
/// rusqlite-backed repositories.
pub struct SqliteRepositories<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRepositories<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn cases(&self) -> impl CaseRepository + '_ {
        cases::SqliteCaseRepository { conn: self.conn }
    }

    pub fn comments(&self) -> impl CommentRepository + '_ {
        comments::SqliteCommentRepository { conn: self.conn }
    }

    pub fn reactions(&self) -> impl ReactionRepository + '_ {
        reactions::SqliteReactionRepository { conn: self.conn }
    }

    pub fn activity(&self) -> impl ActivityRepository + '_ {
        activity::SqliteActivityRepository { conn: self.conn }
    }

    pub fn threads(&self) -> impl ThreadRepository + '_ {
        threads::SqliteThreadRepository { conn: self.conn }
    }

    pub fn messages(&self) -> impl MessageRepository + '_ {
        messages::SqliteMessageRepository { conn: self.conn }
    }

    pub fn profiles(&self) -> impl ProfileRepository + '_ {
        profiles::SqliteProfileRepository { conn: self.conn }
    }

    pub fn stats(&self) -> impl StatsRepository + '_ {
        stats::SqliteStatsRepository { conn: self.conn }
    }
}

/// Collects mapped rows, surfacing the first conversion failure.
pub(super) fn collect_rows<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

//! Typed records for every persisted table.
//!
//! Each record owns its `from_row` mapping; optional columns and counters are
//! defaulted there and nowhere else, and enumerated columns are parsed into
//! their Rust enums so an unknown stored value fails loudly.

use anyhow::anyhow;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionType {
    Award,
    Upvote,
    Downvote,
}

impl ReactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionType::Award => "award",
            ReactionType::Upvote => "upvote",
            ReactionType::Downvote => "downvote",
        }
    }
}

impl fmt::Display for ReactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReactionType {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "award" => Ok(ReactionType::Award),
            "upvote" => Ok(ReactionType::Upvote),
            "downvote" => Ok(ReactionType::Downvote),
            other => Err(anyhow!("unknown reaction type '{other}'")),
        }
    }
}

/// What a reaction is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    Case,
    Comment,
}

impl SubjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::Case => "case",
            SubjectKind::Comment => "comment",
        }
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubjectKind {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "case" => Ok(SubjectKind::Case),
            "comment" => Ok(SubjectKind::Comment),
            other => Err(anyhow!("unknown subject kind '{other}'")),
        }
    }
}

macro_rules! text_enum_sql {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|err: anyhow::Error| FromSqlError::Other(err.into()))
            }
        }
    };
}

text_enum_sql!(ReactionType);
text_enum_sql!(SubjectKind);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: String,
    pub owner_user_id: String,
    pub title: String,
    pub chief_complaint: Option<String>,
    pub history: Option<String>,
    pub examination: Option<String>,
    pub investigations: Option<String>,
    pub management: Option<String>,
    pub diagnosis: Option<String>,
    pub discussion: Option<String>,
    pub summary: Option<String>,
    pub references: Option<String>,
    pub hospital: Option<String>,
    pub referral_center: Option<String>,
    pub award_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Column list matching [`CaseRecord::from_row`].
pub(crate) const CASE_COLUMNS: &str = "id, owner_user_id, title, chief_complaint, history, \
    examination, investigations, management, diagnosis, discussion, summary, case_references, \
    hospital, referral_center, award_count, created_at, updated_at";

impl CaseRecord {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let created_at: String = row.get("created_at")?;
        let updated_at: Option<String> = row.get("updated_at")?;
        Ok(Self {
            id: row.get("id")?,
            owner_user_id: row.get("owner_user_id")?,
            title: row.get("title")?,
            chief_complaint: row.get("chief_complaint")?,
            history: row.get("history")?,
            examination: row.get("examination")?,
            investigations: row.get("investigations")?,
            management: row.get("management")?,
            diagnosis: row.get("diagnosis")?,
            discussion: row.get("discussion")?,
            summary: row.get("summary")?,
            references: row.get("case_references")?,
            hospital: row.get("hospital")?,
            referral_center: row.get("referral_center")?,
            award_count: row.get::<_, Option<i64>>("award_count")?.unwrap_or(0).max(0),
            updated_at: updated_at.unwrap_or_else(|| created_at.clone()),
            created_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: String,
    pub case_id: String,
    pub author_user_id: String,
    pub body: String,
    pub parent_comment_id: Option<String>,
    pub upvotes: i64,
    pub downvotes: i64,
    pub created_at: String,
}

pub(crate) const COMMENT_COLUMNS: &str =
    "id, case_id, author_user_id, body, parent_comment_id, upvotes, downvotes, created_at";

impl CommentRecord {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let parent_comment_id: Option<String> = row.get("parent_comment_id")?;
        Ok(Self {
            id: row.get("id")?,
            case_id: row.get("case_id")?,
            author_user_id: row.get("author_user_id")?,
            body: row.get::<_, Option<String>>("body")?.unwrap_or_default(),
            parent_comment_id: parent_comment_id.filter(|id| !id.is_empty()),
            upvotes: row.get::<_, Option<i64>>("upvotes")?.unwrap_or(0),
            downvotes: row.get::<_, Option<i64>>("downvotes")?.unwrap_or(0),
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionRecord {
    pub subject_kind: SubjectKind,
    pub subject_id: String,
    pub user_id: String,
    pub reaction_type: ReactionType,
    pub created_at: String,
}

impl ReactionRecord {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            subject_kind: row.get("subject_kind")?,
            subject_id: row.get("subject_id")?,
            user_id: row.get("user_id")?,
            reaction_type: row.get("reaction_type")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// A case joined with its activity row, as ranked by the trending query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendingCaseRecord {
    pub case_id: String,
    pub title: String,
    pub owner_user_id: String,
    pub award_count: i64,
    pub trending_score: f64,
    pub last_interaction_at: String,
}

impl TrendingCaseRecord {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            case_id: row.get("case_id")?,
            title: row.get("title")?,
            owner_user_id: row.get("owner_user_id")?,
            award_count: row.get::<_, Option<i64>>("award_count")?.unwrap_or(0),
            trending_score: row.get::<_, Option<f64>>("trending_score")?.unwrap_or(0.0),
            last_interaction_at: row.get("last_interaction_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadRecord {
    pub id: String,
    /// Lexically smaller participant id.
    pub participant_a: String,
    pub participant_b: String,
    pub participant_a_name: String,
    pub participant_b_name: String,
    pub last_message_text: Option<String>,
    pub last_message_at: Option<String>,
    pub created_at: String,
}

impl ThreadRecord {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let participant_a: String = row.get("participant_a")?;
        let participant_b: String = row.get("participant_b")?;
        let participant_a_name: Option<String> = row.get("participant_a_name")?;
        let participant_b_name: Option<String> = row.get("participant_b_name")?;
        Ok(Self {
            id: row.get("id")?,
            participant_a_name: participant_a_name.unwrap_or_else(|| participant_a.clone()),
            participant_b_name: participant_b_name.unwrap_or_else(|| participant_b.clone()),
            participant_a,
            participant_b,
            last_message_text: row.get("last_message_text")?,
            last_message_at: row.get("last_message_at")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participant_a == user_id || self.participant_b == user_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub thread_id: String,
    pub sender_user_id: String,
    pub recipient_user_id: String,
    pub body: String,
    pub created_at: String,
    pub read_at: Option<String>,
}

impl MessageRecord {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            thread_id: row.get("thread_id")?,
            sender_user_id: row.get("sender_user_id")?,
            recipient_user_id: row.get("recipient_user_id")?,
            body: row.get::<_, Option<String>>("body")?.unwrap_or_default(),
            created_at: row.get("created_at")?,
            read_at: row.get("read_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub user_id: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub specialty: Option<String>,
    pub hospital: Option<String>,
    pub bio: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ProfileRecord {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let created_at: String = row.get("created_at")?;
        let updated_at: Option<String> = row.get("updated_at")?;
        Ok(Self {
            user_id: row.get("user_id")?,
            display_name: row.get("display_name")?,
            photo_url: row.get("photo_url")?,
            specialty: row.get("specialty")?,
            hospital: row.get("hospital")?,
            bio: row.get("bio")?,
            updated_at: updated_at.unwrap_or_else(|| created_at.clone()),
            created_at,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TotalsRecord {
    pub cases: i64,
    pub comments: i64,
    pub awards: i64,
    pub profiles: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialtyCountRecord {
    pub specialty: String,
    pub case_count: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserTotalsRecord {
    pub cases_authored: i64,
    pub awards_received: i64,
    pub comments_written: i64,
    pub upvotes_received: i64,
    pub downvotes_received: i64,
}

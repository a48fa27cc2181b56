use crate::database::models::{MessageRecord, ThreadRecord};
use crate::database::repositories::{MessageRepository, ProfileRepository, SqliteRepositories, ThreadRepository};
use crate::database::Database;
use crate::error::{require_non_empty, ServiceError, ServiceResult};
use crate::utils::now_utc_iso;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_MESSAGE_LIMIT: usize = 50;
pub const MAX_MESSAGE_LIMIT: usize = 500;

#[derive(Clone)]
pub struct MessagingService {
    database: Database,
}

impl MessagingService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Deterministic thread id for a pair of users, independent of order.
    pub fn derive_thread_id(user_a: &str, user_b: &str) -> String {
        let (first, second) = sorted_pair(user_a, user_b);
        let hash = blake3::hash(format!("casebook-thread-v1:{first}:{second}").as_bytes());
        hash.as_bytes()[..16]
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    pub fn send_message(
        &self,
        sender_user_id: &str,
        recipient_user_id: &str,
        body: &str,
    ) -> ServiceResult<MessageView> {
        require_non_empty("sender user id", sender_user_id)?;
        require_non_empty("recipient user id", recipient_user_id)?;
        require_non_empty("message body", body)?;
        let sender = sender_user_id.trim();
        let recipient = recipient_user_id.trim();
        if sender == recipient {
            return Err(ServiceError::validation("cannot send a message to yourself"));
        }

        let thread_id = Self::derive_thread_id(sender, recipient);
        let now = now_utc_iso();
        let message = MessageRecord {
            id: Uuid::new_v4().to_string(),
            thread_id: thread_id.clone(),
            sender_user_id: sender.to_string(),
            recipient_user_id: recipient.to_string(),
            body: body.to_string(),
            created_at: now.clone(),
            read_at: None,
        };

        self.database.transaction(|repos| -> ServiceResult<()> {
            let (participant_a, participant_b) = sorted_pair(sender, recipient);
            let created_at = repos
                .threads()
                .get(&thread_id)?
                .map(|existing| existing.created_at)
                .unwrap_or_else(|| now.clone());
            repos.threads().upsert(&ThreadRecord {
                id: thread_id.clone(),
                participant_a: participant_a.to_string(),
                participant_b: participant_b.to_string(),
                participant_a_name: display_name(&repos, participant_a)?,
                participant_b_name: display_name(&repos, participant_b)?,
                last_message_text: Some(message.body.clone()),
                last_message_at: Some(now.clone()),
                created_at,
            })?;
            repos.messages().append(&message)?;
            Ok(())
        })?;

        tracing::info!(thread_id = %thread_id, sender = %sender, "message sent");
        Ok(MessageView::from_record(message))
    }

    /// Threads the user participates in, most recent activity first.
    pub fn list_threads(&self, user_id: &str) -> ServiceResult<Vec<ThreadView>> {
        require_non_empty("user id", user_id)?;
        let views = self.database.with_repositories(|repos| {
            let threads = repos.threads().list_for_user(user_id)?;
            let messages = repos.messages();
            threads
                .into_iter()
                .map(|thread| {
                    let unread_count = messages.count_unread_in_thread(&thread.id, user_id)?;
                    Ok(ThreadView::for_user(thread, user_id, unread_count))
                })
                .collect::<anyhow::Result<Vec<_>>>()
        })?;
        Ok(views)
    }

    /// The last `limit` messages of a thread, oldest first.
    pub fn list_messages(
        &self,
        thread_id: &str,
        user_id: &str,
        limit: usize,
    ) -> ServiceResult<Vec<MessageView>> {
        let limit = limit.clamp(1, MAX_MESSAGE_LIMIT);
        let records = self.database.transaction(|repos| -> ServiceResult<Vec<MessageRecord>> {
            ensure_participant(&repos, thread_id, user_id)?;
            Ok(repos.messages().list_for_thread(thread_id, limit)?)
        })?;
        Ok(records.into_iter().map(MessageView::from_record).collect())
    }

    /// Marks every message addressed to `user_id` in the thread as read and
    /// returns how many changed.
    pub fn mark_thread_read(&self, thread_id: &str, user_id: &str) -> ServiceResult<usize> {
        let now = now_utc_iso();
        let updated = self.database.transaction(|repos| -> ServiceResult<usize> {
            ensure_participant(&repos, thread_id, user_id)?;
            Ok(repos.messages().mark_thread_read(thread_id, user_id, &now)?)
        })?;
        tracing::debug!(thread_id = %thread_id, user_id = %user_id, updated, "thread marked read");
        Ok(updated)
    }

    pub fn count_unread(&self, user_id: &str) -> ServiceResult<usize> {
        require_non_empty("user id", user_id)?;
        Ok(self
            .database
            .with_repositories(|repos| repos.messages().count_unread(user_id))?)
    }
}

fn sorted_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn display_name(repos: &SqliteRepositories<'_>, user_id: &str) -> anyhow::Result<String> {
    Ok(repos
        .profiles()
        .get(user_id)?
        .and_then(|profile| profile.display_name)
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| user_id.to_string()))
}

fn ensure_participant(
    repos: &SqliteRepositories<'_>,
    thread_id: &str,
    user_id: &str,
) -> ServiceResult<ThreadRecord> {
    let thread = repos
        .threads()
        .get(thread_id)?
        .ok_or_else(|| ServiceError::not_found(format!("thread {thread_id} not found")))?;
    if !thread.has_participant(user_id) {
        return Err(ServiceError::permission_denied(format!(
            "{user_id} is not a participant of thread {thread_id}"
        )));
    }
    Ok(thread)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadView {
    pub id: String,
    pub other_user_id: String,
    pub other_display_name: String,
    pub last_message_text: Option<String>,
    pub last_message_at: Option<String>,
    pub unread_count: usize,
    pub created_at: String,
}

impl ThreadView {
    fn for_user(thread: ThreadRecord, user_id: &str, unread_count: usize) -> Self {
        let (other_user_id, other_display_name) = if thread.participant_a == user_id {
            (thread.participant_b, thread.participant_b_name)
        } else {
            (thread.participant_a, thread.participant_a_name)
        };
        Self {
            id: thread.id,
            other_user_id,
            other_display_name,
            last_message_text: thread.last_message_text,
            last_message_at: thread.last_message_at,
            unread_count,
            created_at: thread.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
    pub id: String,
    pub thread_id: String,
    pub sender_user_id: String,
    pub recipient_user_id: String,
    pub body: String,
    pub created_at: String,
    pub read_at: Option<String>,
}

impl MessageView {
    fn from_record(record: MessageRecord) -> Self {
        Self {
            id: record.id,
            thread_id: record.thread_id,
            sender_user_id: record.sender_user_id,
            recipient_user_id: record.recipient_user_id,
            body: record.body,
            created_at: record.created_at,
            read_at: record.read_at,
        }
    }
}

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Upload-request token handed out by a user so others can upload to them.
///
/// Tokens are never soft-deleted: once the grace window after the
/// deadline elapses the row is removed outright.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct FileRequest {
    pub id: String,
    pub owner_id: Uuid,
    pub name: String,
    /// `None` means the request stays open indefinitely
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl FileRequest {
    /// Deadline strictly before `cutoff`
    pub fn expired_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|deadline| deadline < cutoff)
    }
}

use tracing::error;

use crate::db::{Database, DbUserMessage, MessageCategory};

/// Best-effort user notifications.
///
/// Posting a message must never abort an import run: failures are logged
/// and swallowed here so callers don't have to handle them.
#[derive(Debug, Clone)]
pub struct NotificationSink {
    database: Database,
}

impl NotificationSink {
    pub fn new(database: Database) -> Self {
        NotificationSink { database }
    }

    /// Post a message to a user's notification feed
    pub async fn post(
        &self,
        user_id: &str,
        message: &str,
        link: Option<&str>,
        category: MessageCategory,
    ) {
        let message = DbUserMessage::new(user_id, message, link, category);
        if let Err(e) = self.database.insert_user_message(&message).await {
            error!("failed to save user message '{}': {}", message.message, e);
        }
    }
}

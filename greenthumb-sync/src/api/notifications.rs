//! Client for the `/notifications` endpoints.
//!
//! The server raises reminders and overdue alerts from the task list; this
//! client only reads and acknowledges them, and edits delivery settings.

use reqwest::Client;
use url::Url;

use greenthumb_proto::notification::{NotificationList, NotificationSettings};

use super::http::{HttpTaskApi, endpoint, execute, read_json};
use super::{ApiError, Operation};

/// REST client for stored notifications and notification settings.
#[derive(Debug, Clone)]
pub struct NotificationsApi {
    client: Client,
    base_url: Url,
}

impl NotificationsApi {
    /// Share the HTTP client (and its timeout) of an existing task client.
    #[must_use]
    pub fn from_task_api(api: &HttpTaskApi) -> Self {
        Self {
            client: api.client().clone(),
            base_url: api.base_url().clone(),
        }
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut all = Vec::with_capacity(segments.len() + 1);
        all.push("notifications");
        all.extend_from_slice(segments);
        endpoint(&self.base_url, &all)
    }

    /// All stored notifications, newest first, with the unread count.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Request`] on transport failure or non-2xx status.
    pub async fn list(&self) -> Result<NotificationList, ApiError> {
        let response = execute(Operation::List, self.client.get(self.url(&[]))).await?;
        read_json(Operation::List, response).await
    }

    /// Mark one notification as read.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] or [`ApiError::Request`].
    pub async fn mark_read(&self, id: &str) -> Result<(), ApiError> {
        let request = self.client.put(self.url(&[id, "read"]));
        execute(Operation::Update, request).await?;
        Ok(())
    }

    /// Mark every notification as read.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Request`] on transport failure or non-2xx status.
    pub async fn mark_all_read(&self) -> Result<(), ApiError> {
        let request = self.client.put(self.url(&["mark-all-read"]));
        execute(Operation::Update, request).await?;
        Ok(())
    }

    /// Delete one notification.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] or [`ApiError::Request`].
    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        execute(Operation::Delete, self.client.delete(self.url(&[id]))).await?;
        Ok(())
    }

    /// Ask the server to scan tasks and raise any due notifications now.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Request`] on transport failure or non-2xx status.
    pub async fn check(&self) -> Result<(), ApiError> {
        execute(Operation::Create, self.client.post(self.url(&["check"]))).await?;
        Ok(())
    }

    /// Current delivery settings.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Request`] on transport failure or non-2xx status.
    pub async fn settings(&self) -> Result<NotificationSettings, ApiError> {
        let response = execute(Operation::Get, self.client.get(self.url(&["settings"]))).await?;
        read_json(Operation::Get, response).await
    }

    /// Replace the delivery settings.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] if the server rejects the settings,
    /// or [`ApiError::Request`].
    pub async fn update_settings(&self, settings: &NotificationSettings) -> Result<(), ApiError> {
        let request = self.client.put(self.url(&["settings"])).json(settings);
        execute(Operation::Update, request).await?;
        Ok(())
    }
}

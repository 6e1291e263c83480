//! Notification records and settings served under `/notifications`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::task::TaskId;

/// A stored notification (task reminder, overdue alert, weather alert, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: String,
    /// Category such as `task_reminder` or `overdue_alert`. Open set.
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub task_id: Option<TaskId>,
    #[serde(default = "default_priority")]
    pub priority: String,
    pub created_at: NaiveDateTime,
    #[serde(default)]
    pub read: bool,
}

fn default_priority() -> String {
    "normal".to_string()
}

/// Response of `GET /notifications`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationList {
    pub notifications: Vec<NotificationRecord>,
    pub unread_count: usize,
}

/// Per-user delivery preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub browser_notifications: bool,
    pub email_notifications: bool,
    pub sms_notifications: bool,
    /// Hours before a task's date at which a reminder is raised.
    pub upcoming_task_reminder: u32,
    pub overdue_task_alert: bool,
    pub weather_alerts: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            browser_notifications: true,
            email_notifications: false,
            sms_notifications: false,
            upcoming_task_reminder: 24,
            overdue_task_alert: true,
            weather_alerts: true,
        }
    }
}

//! REST access to the calendar task collection.
//!
//! Defines the [`TaskApi`] trait that every backend implementation must
//! satisfy. Concrete implementations include:
//! - [`http::HttpTaskApi`] — `reqwest` client for the `/calendar/tasks` endpoints
//! - [`memory::InMemoryTaskApi`] — in-process backend for tests and offline use
//!
//! [`notifications::NotificationsApi`] and [`templates::TemplatesApi`] cover
//! the companion `/notifications` and `/templates` endpoints and share this
//! module's error mapping.

pub mod http;
pub mod memory;
pub mod notifications;
pub mod templates;

use std::fmt;
use std::future::Future;

use greenthumb_proto::task::{NewTask, Task, TaskId, TaskPatch, TaskValidationError};

/// Which REST operation produced a response. Drives status classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Get,
    Create,
    Update,
    Delete,
    ListUpcoming,
    ApplyTemplate,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::List => "list",
            Self::Get => "get",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::ListUpcoming => "list_upcoming",
            Self::ApplyTemplate => "apply_template",
        };
        f.write_str(name)
    }
}

/// Errors returned by REST operations.
///
/// These always propagate to the caller. On any of them the local cache is
/// left exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Network failure, timeout, undecodable body, or a non-2xx status with
    /// no finer category.
    #[error("{message}")]
    Request {
        /// HTTP status, if a response was received.
        status: Option<u16>,
        /// Server-provided `detail`, or a generic description.
        message: String,
    },

    /// The task (or template) does not exist: 404 on get, update, delete or
    /// template apply.
    #[error("not found: {message}")]
    NotFound {
        /// Server-provided `detail`, or a generic description.
        message: String,
    },

    /// The server (or local pre-validation) rejected create/update input.
    #[error("validation failed: {message}")]
    Validation {
        /// HTTP status, `None` when rejected before sending.
        status: Option<u16>,
        /// Server-provided `detail`, or a generic description.
        message: String,
    },
}

impl ApiError {
    /// Maps a non-success status to an error for the given operation.
    ///
    /// `detail` is the server's `detail` string, when the body carried one.
    #[must_use]
    pub fn from_status(op: Operation, status: u16, detail: Option<String>) -> Self {
        let message = detail.unwrap_or_else(|| format!("HTTP error, status {status}"));
        match (op, status) {
            (
                Operation::Get | Operation::Update | Operation::Delete | Operation::ApplyTemplate,
                404,
            ) => {
                Self::NotFound { message }
            }
            (Operation::Create | Operation::Update, 400..=499) => Self::Validation {
                status: Some(status),
                message,
            },
            _ => Self::Request {
                status: Some(status),
                message,
            },
        }
    }

    /// A 404 on update/delete after a concurrent delete already reached the
    /// caller's desired end state; callers may treat it as non-fatal.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// HTTP status carried by the error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Request { status, .. } | Self::Validation { status, .. } => *status,
            Self::NotFound { .. } => Some(404),
        }
    }
}

impl From<TaskValidationError> for ApiError {
    fn from(err: TaskValidationError) -> Self {
        Self::Validation {
            status: None,
            message: err.to_string(),
        }
    }
}

/// Async CRUD surface over the server's task collection.
///
/// Implementations never touch any local cache; keeping the cache in step
/// with responses is the job of [`crate::client::TaskSyncClient`].
pub trait TaskApi: Send + Sync {
    /// Fetch every task, in server order.
    fn list(&self) -> impl Future<Output = Result<Vec<Task>, ApiError>> + Send;

    /// Fetch a single task.
    fn get(&self, id: &TaskId) -> impl Future<Output = Result<Task, ApiError>> + Send;

    /// Create a task; the server assigns its id.
    fn create(&self, new: &NewTask) -> impl Future<Output = Result<Task, ApiError>> + Send;

    /// Apply a partial update and return the merged server state.
    fn update(
        &self,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> impl Future<Output = Result<Task, ApiError>> + Send;

    /// Remove a task.
    fn delete(&self, id: &TaskId) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Tasks dated within `[today, today + within_days]`, filtered server-side.
    fn list_upcoming(
        &self,
        within_days: u32,
    ) -> impl Future<Output = Result<Vec<Task>, ApiError>> + Send;
}

//! User-facing notifications for task activity.
//!
//! [`Notifier`] is an ordinary value: whoever needs to ask for permission or
//! show a notification is handed one. The permission decision lives in a
//! field on it, not in process-wide state.

use std::io::Write;

use greenthumb_proto::event::TaskEvent;

/// Whether the user allows notifications to be shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Permission {
    /// Not asked yet.
    #[default]
    Default,
    Granted,
    Denied,
}

/// A rendered notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// Collapses repeated notifications about the same subject.
    pub tag: Option<String>,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            tag: None,
        }
    }

    /// Render a push event for the user.
    #[must_use]
    pub fn for_event(event: &TaskEvent) -> Self {
        let tag = Some(format!("task-{}", event.task_id()));
        let (title, body) = match event {
            TaskEvent::TaskCreated { task } => (
                format!("New task: {}", task.title),
                format!("{} scheduled for {}", task.kind, task.date),
            ),
            TaskEvent::TaskUpdated { task } if task.completed => (
                format!("Task completed: {}", task.title),
                format!("{} on {} is done", task.kind, task.date),
            ),
            TaskEvent::TaskUpdated { task } => (
                format!("Task updated: {}", task.title),
                format!("{} scheduled for {} ({} priority)", task.kind, task.date, task.priority),
            ),
            TaskEvent::TaskDeleted { task_id } => (
                "Task removed".to_string(),
                format!("Task {task_id} was deleted"),
            ),
        };
        Self { title, body, tag }
    }
}

/// Where notifications end up: a desktop bridge, a terminal, a test recorder.
pub trait NotificationSink: Send {
    /// Ask the user for permission. Called at most once per [`Notifier`]
    /// while the permission is still [`Permission::Default`].
    fn request_permission(&mut self) -> Permission;

    /// Display one notification.
    fn show(&mut self, notification: &Notification);
}

/// Sink that writes `title: body` lines to any writer. Always permitted.
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: W,
}

impl<W: Write + Send> WriterSink<W> {
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> NotificationSink for WriterSink<W> {
    fn request_permission(&mut self) -> Permission {
        Permission::Granted
    }

    fn show(&mut self, notification: &Notification) {
        if let Err(e) = writeln!(self.writer, "{}: {}", notification.title, notification.body) {
            tracing::warn!(err = %e, "failed to write notification");
        }
    }
}

/// Shows notifications through a sink, honoring the user's permission.
#[derive(Debug)]
pub struct Notifier<S> {
    sink: S,
    permission: Permission,
}

impl<S: NotificationSink> Notifier<S> {
    /// A notifier that has not asked for permission yet.
    pub const fn new(sink: S) -> Self {
        Self::with_permission(sink, Permission::Default)
    }

    /// A notifier with a permission decision restored from elsewhere.
    pub const fn with_permission(sink: S, permission: Permission) -> Self {
        Self { sink, permission }
    }

    pub const fn permission(&self) -> Permission {
        self.permission
    }

    /// Ask once; later calls return the recorded decision.
    pub fn request_permission(&mut self) -> Permission {
        if self.permission == Permission::Default {
            self.permission = self.sink.request_permission();
            tracing::info!(permission = ?self.permission, "notification permission decided");
        }
        self.permission
    }

    /// Show `notification` if permitted. Returns whether it was shown.
    pub fn notify(&mut self, notification: &Notification) -> bool {
        if self.permission != Permission::Granted {
            tracing::debug!(
                permission = ?self.permission,
                title = %notification.title,
                "notification suppressed"
            );
            return false;
        }
        self.sink.show(notification);
        true
    }

    pub const fn sink(&self) -> &S {
        &self.sink
    }
}

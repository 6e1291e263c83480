//! Local mirror of the server's task list.
//!
//! Order follows the server (list responses replace it wholesale; newly
//! seen tasks are appended). Ids are unique at all times: every insert path
//! goes through [`TaskCache::upsert`].

use std::sync::Arc;

use parking_lot::Mutex;

use greenthumb_proto::event::TaskEvent;
use greenthumb_proto::task::{Task, TaskId};

/// Cache handle shared between the REST client and the push channel.
pub type SharedCache = Arc<Mutex<TaskCache>>;

/// Ordered, id-unique collection of tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskCache {
    tasks: Vec<Task>,
}

impl TaskCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a fresh cache for sharing.
    #[must_use]
    pub fn shared() -> SharedCache {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Replace the whole contents with a server listing.
    ///
    /// Duplicate ids in the listing collapse to the last occurrence, kept at
    /// the position of the first.
    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        self.tasks.clear();
        for task in tasks {
            self.upsert(task);
        }
    }

    /// Insert `task`, or overwrite the entry with the same id in place.
    ///
    /// Returns the previous entry, if any.
    pub fn upsert(&mut self, task: Task) -> Option<Task> {
        match self.position(&task.id) {
            Some(index) => Some(std::mem::replace(&mut self.tasks[index], task)),
            None => {
                self.tasks.push(task);
                None
            }
        }
    }

    /// Remove the entry with `id`. No-op if absent.
    pub fn remove(&mut self, id: &TaskId) -> Option<Task> {
        let index = self.position(id)?;
        Some(self.tasks.remove(index))
    }

    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    /// Set the `completed` flag locally, returning the previous value.
    ///
    /// Returns `None` if the task is not cached.
    pub fn set_completed(&mut self, id: &TaskId, completed: bool) -> Option<bool> {
        let index = self.position(id)?;
        let task = &mut self.tasks[index];
        Some(std::mem::replace(&mut task.completed, completed))
    }

    /// Apply a push event. Events apply in arrival order, last write wins.
    ///
    /// Created and updated events are both upserts, so an update that
    /// overtakes its create still lands, and replaying an event is harmless.
    pub fn apply(&mut self, event: &TaskEvent) {
        match event {
            TaskEvent::TaskCreated { task } | TaskEvent::TaskUpdated { task } => {
                self.upsert(task.clone());
            }
            TaskEvent::TaskDeleted { task_id } => {
                self.remove(task_id);
            }
        }
    }

    /// All cached tasks in order.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn position(&self, id: &TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| &t.id == id)
    }
}

//! Push-channel protocol for calendar tasks.
//!
//! Every frame on the channel is a JSON object with a `type` discriminator
//! and a type-specific payload, in both directions. The server pushes
//! [`TaskEvent`]s whenever a task is created, updated, or deleted through
//! the REST surface. Frames with a `type` this crate does not know about
//! decode to [`Inbound::Unrecognized`] so newer servers keep working.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::task::{Task, TaskId};

/// A task change pushed by the server.
///
/// The carried task is authoritative: it overwrites any local copy with the
/// same id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// A task was created.
    TaskCreated {
        /// The full task as stored by the server.
        task: Task,
    },
    /// A task was modified.
    TaskUpdated {
        /// The full task after the modification.
        task: Task,
    },
    /// A task was removed.
    TaskDeleted {
        /// Id of the removed task.
        task_id: TaskId,
    },
}

impl TaskEvent {
    /// Discriminator values understood by this crate.
    pub const KINDS: [&'static str; 3] = ["task_created", "task_updated", "task_deleted"];

    /// Returns the id of the task this event concerns.
    #[must_use]
    pub const fn task_id(&self) -> &TaskId {
        match self {
            Self::TaskCreated { task } | Self::TaskUpdated { task } => &task.id,
            Self::TaskDeleted { task_id } => task_id,
        }
    }

    /// Returns the wire discriminator of this event.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::TaskCreated { .. } => "task_created",
            Self::TaskUpdated { .. } => "task_updated",
            Self::TaskDeleted { .. } => "task_deleted",
        }
    }
}

/// A successfully decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A task event the client applies to its cache.
    Task(TaskEvent),
    /// A well-formed frame with a `type` this client ignores.
    Unrecognized {
        /// The `type` value as received.
        kind: String,
    },
}

/// A client-to-server frame: `{ "type": kind, ...payload }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// The `type` discriminator.
    #[serde(rename = "type")]
    pub kind: String,
    /// Remaining top-level fields.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl OutboundMessage {
    /// Creates a message with no payload fields.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Map::new(),
        }
    }

    /// Adds a top-level payload field. A key named `type` is ignored.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if key != "type" {
            self.payload.insert(key, value.into());
        }
        self
    }
}

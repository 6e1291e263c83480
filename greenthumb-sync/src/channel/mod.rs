//! Real-time push channel for calendar task events.
//!
//! [`ws::EventChannel`] keeps a single WebSocket open to the server's
//! `/calendar/ws` endpoint, applies pushed [`TaskEvent`]s to the shared task
//! cache, and reconnects after failures within a bounded retry budget.
//!
//! # State machine
//!
//! ```text
//! DISCONNECTED --connect()--> CONNECTING --open--> CONNECTED
//!                               |   ^                  |
//!                     fail/close|   |delay, budget left| close
//!                               v   |                  v
//!                             RECONNECTING <-----------+
//!                               |
//!                               +--budget spent--> DISCONNECTED
//! ```
//!
//! `disconnect()` moves any state to `DISCONNECTED` and cancels a pending
//! retry. Observers never poll: every transition and inbound frame is
//! published on the [`ChannelEvent`] broadcast stream.

pub mod ws;

use std::fmt;
use std::time::Duration;

use greenthumb_proto::codec::CodecError;
use greenthumb_proto::event::TaskEvent;

pub use ws::EventChannel;

/// Connection lifecycle state of the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Idle: initially, after `disconnect()`, or after the retry budget ran out.
    Disconnected,
    /// An open attempt is in flight.
    Connecting,
    /// The channel is open and delivering events.
    Connected,
    /// Waiting out the retry delay before the next open attempt.
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting => write!(f, "reconnecting"),
        }
    }
}

/// Transport-level channel failures. Reported as events, never raised into
/// unrelated code paths; only [`EventChannel::send`] returns one directly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// An outbound message was dropped because the channel is not open.
    #[error("channel is not connected")]
    NotConnected,

    /// The open attempt did not complete in time.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// The open attempt failed (refused, DNS, handshake, HTTP status, ...).
    #[error("connect failed: {0}")]
    Connect(String),

    /// An open connection failed while reading or writing.
    #[error("transport error: {0}")]
    Transport(String),

    /// An outbound message could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),
}

/// Everything observers of the channel are told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The channel moved to a new state.
    StateChanged(ConnectionState),
    /// The connection opened; the retry budget has been reset.
    Opened,
    /// The connection closed, for any reason.
    Closed {
        /// Close reason, when the peer or the transport supplied one.
        reason: Option<String>,
    },
    /// A transport failure.
    Error(ChannelError),
    /// A task event, already applied to the cache.
    Task(TaskEvent),
    /// A well-formed frame with an unknown `type`, ignored.
    Unrecognized {
        /// The `type` value as received.
        kind: String,
    },
    /// A frame that failed to parse. The channel stays open.
    Malformed(CodecError),
    /// A retry is scheduled after `delay`.
    ReconnectScheduled {
        /// 1-based retry number.
        attempt: u32,
        /// Wait before the attempt.
        delay: Duration,
    },
    /// The retry budget is spent; the channel is `Disconnected` until the
    /// next explicit `connect()`.
    GaveUp {
        /// Retries made before giving up.
        attempts: u32,
    },
}

/// Counts consecutive reconnect attempts against a fixed maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    max_attempts: u32,
    attempts: u32,
}

impl RetryBudget {
    #[must_use]
    pub const fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            attempts: 0,
        }
    }

    /// Claim the next attempt. Returns its 1-based number, or `None` once
    /// `max_attempts` have been claimed since the last reset.
    pub const fn next_attempt(&mut self) -> Option<u32> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        self.attempts += 1;
        Some(self.attempts)
    }

    /// A successful open restores the full budget.
    pub const fn reset(&mut self) {
        self.attempts = 0;
    }

    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }
}

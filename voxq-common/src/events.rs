//! Event types for the voxq event system
//!
//! Every controller transition is published as a [`PlaybackEvent`] on a
//! broadcast channel. Nothing in the playback path depends on anyone
//! listening; events exist for observers (CLI output, tests, chat replies).

use crate::ids::{ChannelId, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Playback controller lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    /// Joining the voice transport
    Connecting,
    /// Sending frames of the current item
    Streaming,
    /// Holding the current frame until resumed
    Paused,
    /// Queue exhausted or stop requested, teardown in progress
    Draining,
    /// Terminal; the controller is dead and must be discarded
    Stopped,
}

impl ControllerState {
    /// True once teardown has begun
    pub fn is_terminal(self) -> bool {
        matches!(self, ControllerState::Draining | ControllerState::Stopped)
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerState::Connecting => write!(f, "connecting"),
            ControllerState::Streaming => write!(f, "streaming"),
            ControllerState::Paused => write!(f, "paused"),
            ControllerState::Draining => write!(f, "draining"),
            ControllerState::Stopped => write!(f, "stopped"),
        }
    }
}

/// How a single item left the frame loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemOutcome {
    /// End-of-stream reached
    Finished,
    /// Abandoned by a skip signal
    Skipped,
    /// Frame pull failed; the item ended early
    Failed,
    /// Abandoned by a stop signal
    Stopped,
    /// Transport frame sink went away mid-item
    TransportLost,
}

/// Why a controller tore down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Queue ran empty
    Drained,
    /// Explicit stop signal
    Stopped,
    /// Transport join or initialisation failed
    JoinFailed,
    /// Transport frame sink closed while streaming
    TransportLost,
    /// Removed from the registry by an administrative caller
    Removed,
}

/// Where a finished item was put back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequeuePosition {
    Front,
    Back,
}

/// voxq event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlaybackEvent {
    /// Controller created for a tenant and its loop spawned
    ControllerStarted {
        tenant: TenantId,
        voice_channel: ChannelId,
        text_channel: Option<ChannelId>,
        timestamp: DateTime<Utc>,
    },

    /// Controller state transition
    StateChanged {
        tenant: TenantId,
        old_state: ControllerState,
        new_state: ControllerState,
        timestamp: DateTime<Utc>,
    },

    /// Item popped from the queue and streaming begins
    ItemStarted {
        tenant: TenantId,
        title: String,
        timestamp: DateTime<Utc>,
    },

    /// Item left the frame loop
    ItemEnded {
        tenant: TenantId,
        title: String,
        outcome: ItemOutcome,
        frames_sent: u64,
        timestamp: DateTime<Utc>,
    },

    /// Item re-inserted by repeat (front) or loop (back)
    ItemRequeued {
        tenant: TenantId,
        title: String,
        position: RequeuePosition,
        timestamp: DateTime<Utc>,
    },

    /// Loop flag flipped
    LoopToggled {
        tenant: TenantId,
        enabled: bool,
        timestamp: DateTime<Utc>,
    },

    /// Repeat flag flipped
    RepeatToggled {
        tenant: TenantId,
        enabled: bool,
        timestamp: DateTime<Utc>,
    },

    /// Controller reached its terminal state and left the registry
    ControllerStopped {
        tenant: TenantId,
        reason: StopReason,
        discarded: usize,
        timestamp: DateTime<Utc>,
    },
}

impl PlaybackEvent {
    /// Tenant the event belongs to
    pub fn tenant(&self) -> &TenantId {
        match self {
            PlaybackEvent::ControllerStarted { tenant, .. }
            | PlaybackEvent::StateChanged { tenant, .. }
            | PlaybackEvent::ItemStarted { tenant, .. }
            | PlaybackEvent::ItemEnded { tenant, .. }
            | PlaybackEvent::ItemRequeued { tenant, .. }
            | PlaybackEvent::LoopToggled { tenant, .. }
            | PlaybackEvent::RepeatToggled { tenant, .. }
            | PlaybackEvent::ControllerStopped { tenant, .. } => tenant,
        }
    }

    /// Serialize as a single JSON line
    pub fn to_json(&self) -> String {
        // Every field is a plain string, number, enum or timestamp
        serde_json::to_string(self).unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
    }
}

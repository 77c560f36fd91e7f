//! Voice transport abstraction
//!
//! The controller only needs three things from the chat platform: join a
//! voice channel, push frames into it with backpressure, and leave again.
//! Frames go through a bounded `mpsc` sender owned by the handle, so a slow
//! transport makes the control loop wait instead of dropping audio.

mod loopback;

pub use loopback::{spawn_paced_sink, LoopbackSession, LoopbackTransport};

use crate::error::Result;
use crate::item::Frame;
use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;
use voxq_common::{ChannelId, TenantId};

/// Live voice session returned by [`Transport::join`]
#[derive(Debug)]
pub struct TransportHandle {
    session_id: Uuid,
    channel: ChannelId,
    frames: mpsc::Sender<Frame>,
}

impl TransportHandle {
    pub fn new(session_id: Uuid, channel: ChannelId, frames: mpsc::Sender<Frame>) -> Self {
        Self {
            session_id,
            channel,
            frames,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    /// Bounded frame sink
    pub fn frames(&self) -> &mpsc::Sender<Frame> {
        &self.frames
    }
}

/// Chat platform voice transport
#[async_trait]
pub trait Transport: Send + Sync {
    /// Join `channel` for `tenant` and get ready to receive frames
    ///
    /// Any initialisation the platform needs before audio (e.g. a speaking
    /// notification) belongs here; a failure is reported as `TransportJoin`.
    async fn join(&self, tenant: &TenantId, channel: &ChannelId) -> Result<TransportHandle>;

    /// Leave the voice channel. Consumes the handle, closing its frame sink.
    ///
    /// A controller leaves the registry before it disconnects, so a new
    /// controller for the same tenant may `join` while the old handle is
    /// still open. Implementations must tolerate two live sessions per
    /// tenant for that window, and disconnecting the old handle must not
    /// tear down the newer session.
    async fn disconnect(&self, handle: TransportHandle) -> Result<()>;
}

//! In-process loopback transport
//!
//! Every successful join publishes a [`LoopbackSession`] carrying the
//! receiving end of the frame sink. Whoever consumes the session stream
//! decides how frames are drained: the CLI paces them at the opus frame
//! interval, tests pull them one at a time.

use super::{Transport, TransportHandle};
use crate::error::{Error, Result};
use crate::item::Frame;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;
use voxq_common::{ChannelId, TenantId};

/// Receiving side of one joined voice session
#[derive(Debug)]
pub struct LoopbackSession {
    pub tenant: TenantId,
    pub channel: ChannelId,
    pub session_id: Uuid,
    pub frames: mpsc::Receiver<Frame>,
}

/// Transport that hands frame receivers back to the application
#[derive(Debug)]
pub struct LoopbackTransport {
    frame_capacity: usize,
    sessions: mpsc::UnboundedSender<LoopbackSession>,
    fail_joins: AtomicBool,
    fail_disconnects: AtomicBool,
}

impl LoopbackTransport {
    /// Create a transport whose frame sinks hold `frame_capacity` frames
    pub fn new(frame_capacity: usize) -> (Self, mpsc::UnboundedReceiver<LoopbackSession>) {
        let (sessions, session_rx) = mpsc::unbounded_channel();
        let transport = Self {
            // mpsc::channel panics on zero capacity
            frame_capacity: frame_capacity.max(1),
            sessions,
            fail_joins: AtomicBool::new(false),
            fail_disconnects: AtomicBool::new(false),
        };
        (transport, session_rx)
    }

    /// Make subsequent joins fail
    pub fn set_fail_joins(&self, fail: bool) {
        self.fail_joins.store(fail, Ordering::Release);
    }

    /// Make subsequent disconnects fail (the sink is still closed)
    pub fn set_fail_disconnects(&self, fail: bool) {
        self.fail_disconnects.store(fail, Ordering::Release);
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn join(&self, tenant: &TenantId, channel: &ChannelId) -> Result<TransportHandle> {
        if self.fail_joins.load(Ordering::Acquire) {
            return Err(Error::TransportJoin(format!(
                "loopback refused to join {} for tenant {}",
                channel, tenant
            )));
        }

        let (tx, rx) = mpsc::channel(self.frame_capacity);
        let session_id = Uuid::new_v4();
        let session = LoopbackSession {
            tenant: tenant.clone(),
            channel: channel.clone(),
            session_id,
            frames: rx,
        };

        if self.sessions.send(session).is_err() {
            return Err(Error::TransportJoin("loopback session listener is gone".to_string()));
        }

        debug!("Loopback session {} joined {} for tenant {}", session_id, channel, tenant);
        Ok(TransportHandle::new(session_id, channel.clone(), tx))
    }

    async fn disconnect(&self, handle: TransportHandle) -> Result<()> {
        let session_id = handle.session_id();
        drop(handle);

        if self.fail_disconnects.load(Ordering::Acquire) {
            return Err(Error::TransportDisconnect(format!(
                "loopback refused to disconnect session {}",
                session_id
            )));
        }

        debug!("Loopback session {} disconnected", session_id);
        Ok(())
    }
}

/// Drain a session at a fixed frame interval, returning the frame count
///
/// A zero interval drains as fast as frames arrive.
pub fn spawn_paced_sink(mut session: LoopbackSession, interval: Duration) -> JoinHandle<u64> {
    tokio::spawn(async move {
        let mut ticker = (!interval.is_zero()).then(|| tokio::time::interval(interval));
        let mut frames = 0u64;
        let mut bytes = 0usize;

        while let Some(frame) = session.frames.recv().await {
            if let Some(ticker) = ticker.as_mut() {
                ticker.tick().await;
            }
            frames += 1;
            bytes += frame.len();
        }

        if frames == 0 {
            warn!("Loopback session {} closed without audio", session.session_id);
        } else {
            info!(
                "Loopback session {} for tenant {} played {} frames ({} bytes)",
                session.session_id, session.tenant, frames, bytes
            );
        }
        frames
    })
}

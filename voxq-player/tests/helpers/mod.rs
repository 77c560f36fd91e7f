//! Test harness for voxq-player integration tests
//!
//! Wires a [`ControllerRegistry`] to a [`LoopbackTransport`] and keeps the
//! session stream and an event subscription on hand. Tests pull frames one
//! at a time, so with a frame capacity of 1 the control loop is always
//! parked at a known point while the test decides what to do next.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::sync::mpsc;
use tokio::time::timeout;

use voxq_common::events::{ItemOutcome, PlaybackEvent, StopReason};
use voxq_common::{ChannelId, TenantId};
use voxq_player::config::PlayerSettings;
use voxq_player::transport::LoopbackSession;
use voxq_player::{
    BufferedItem, ControllerRegistry, Error, Frame, Item, LoopbackTransport, PlayableItem,
    Result, Transport,
};

pub const WAIT: Duration = Duration::from_secs(5);

pub struct Harness {
    pub registry: ControllerRegistry,
    pub transport: Arc<LoopbackTransport>,
    pub sessions: mpsc::UnboundedReceiver<LoopbackSession>,
    pub events: broadcast::Receiver<PlaybackEvent>,
    /// Every event observed so far, in arrival order
    pub seen: Vec<PlaybackEvent>,
}

impl Harness {
    pub fn new(frame_capacity: usize) -> Self {
        let (transport, sessions) = LoopbackTransport::new(frame_capacity);
        let transport = Arc::new(transport);
        let settings = PlayerSettings { event_capacity: 1024 };
        let registry =
            ControllerRegistry::new(Arc::clone(&transport) as Arc<dyn Transport>, &settings);
        let events = registry.subscribe();

        Self {
            registry,
            transport,
            sessions,
            events,
            seen: Vec::new(),
        }
    }

    pub async fn play(&self, tenant: &TenantId, item: Item) -> voxq_player::PlayOutcome {
        self.registry
            .play(tenant.clone(), ChannelId::from("voice"), None, item)
            .await
    }

    pub async fn next_session(&mut self) -> LoopbackSession {
        timeout(WAIT, self.sessions.recv())
            .await
            .expect("timed out waiting for a voice session")
            .expect("session stream closed")
    }

    /// Consume events until one matches, recording everything seen
    pub async fn wait_for<F>(&mut self, mut matches: F) -> PlaybackEvent
    where
        F: FnMut(&PlaybackEvent) -> bool,
    {
        loop {
            let event = timeout(WAIT, self.events.recv())
                .await
                .expect("timed out waiting for event")
                .expect("event stream failed");
            self.seen.push(event.clone());
            if matches(&event) {
                return event;
            }
        }
    }

    /// Wait for a tenant's controller to stop and return the reason and
    /// discarded count
    pub async fn wait_stopped(&mut self, tenant: &TenantId) -> (StopReason, usize) {
        let event = self
            .wait_for(|e| {
                matches!(e, PlaybackEvent::ControllerStopped { tenant: t, .. } if t == tenant)
            })
            .await;
        match event {
            PlaybackEvent::ControllerStopped {
                reason, discarded, ..
            } => (reason, discarded),
            _ => unreachable!(),
        }
    }

    /// Record whatever is already buffered on the event stream
    pub fn drain_events(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(event) => self.seen.push(event),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    }

    /// Outcomes of every ended item for a tenant, in order
    pub fn outcomes(&self, tenant: &TenantId) -> Vec<(String, ItemOutcome)> {
        self.seen
            .iter()
            .filter_map(|e| match e {
                PlaybackEvent::ItemEnded {
                    tenant: t,
                    title,
                    outcome,
                    ..
                } if t == tenant => Some((title.clone(), *outcome)),
                _ => None,
            })
            .collect()
    }

    /// Titles re-queued for a tenant, in order
    pub fn requeued(&self, tenant: &TenantId) -> Vec<String> {
        self.seen
            .iter()
            .filter_map(|e| match e {
                PlaybackEvent::ItemRequeued { tenant: t, title, .. } if t == tenant => {
                    Some(title.clone())
                }
                _ => None,
            })
            .collect()
    }
}

/// Item whose frames read back as `"<title>:<index>"`
pub fn item(title: &str, frames: usize) -> Item {
    let frames = (0..frames)
        .map(|i| format!("{}:{}", title, i).into_bytes())
        .collect();
    Arc::new(BufferedItem::new(title, frames))
}

pub async fn recv_frame(session: &mut LoopbackSession) -> Option<String> {
    timeout(WAIT, session.frames.recv())
        .await
        .expect("timed out waiting for a frame")
        .map(|frame| String::from_utf8(frame).expect("test frames are utf-8"))
}

pub async fn recv_frames(session: &mut LoopbackSession, count: usize) -> Vec<String> {
    let mut frames = Vec::with_capacity(count);
    for _ in 0..count {
        frames.push(recv_frame(session).await.expect("sink closed early"));
    }
    frames
}

/// Read frames until the controller closes the sink
pub async fn recv_until_closed(session: &mut LoopbackSession) -> Vec<String> {
    let mut frames = Vec::new();
    while let Some(frame) = recv_frame(session).await {
        frames.push(frame);
    }
    frames
}

/// Item that yields a fixed number of frames and then fails to decode
pub struct BrokenItem {
    title: String,
    good_frames: usize,
    pulled: std::sync::atomic::AtomicUsize,
}

impl BrokenItem {
    pub fn new(title: &str, good_frames: usize) -> Item {
        Arc::new(Self {
            title: title.to_string(),
            good_frames,
            pulled: std::sync::atomic::AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PlayableItem for BrokenItem {
    fn title(&self) -> &str {
        &self.title
    }

    async fn next_frame(&self) -> Result<Option<Frame>> {
        let index = self
            .pulled
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if index < self.good_frames {
            Ok(Some(format!("{}:{}", self.title, index).into_bytes()))
        } else {
            Err(Error::FramePull(format!("{} is corrupt", self.title)))
        }
    }

    async fn reset_playback(&self) {
        self.pulled.store(0, std::sync::atomic::Ordering::SeqCst);
    }
}

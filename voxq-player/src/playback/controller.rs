//! Per-tenant playback controller
//!
//! **Responsibilities:**
//! - Own the tenant's queue and the paused / loop / repeat flags
//! - Run the control loop: join, stream items frame by frame, tear down
//! - Accept control signals through single-slot mailboxes while streaming
//!
//! State machine:
//! `Connecting -> Streaming <-> Paused -> Draining -> Stopped`, with
//! `Connecting -> Stopped` when the transport cannot be joined.
//!
//! A controller never comes back from teardown. Once its stopped latch is
//! set it refuses queue access, and a new play request for the tenant builds
//! a fresh controller through the registry.

use super::mailbox::{self, Mailboxes, Signal, SignalReceivers, TryPost, Wake};
use super::queue::PlaybackQueue;
use super::registry::ControllerRegistry;
use crate::error::{Error, Result};
use crate::item::{Frame, Item};
use crate::transport::Transport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use voxq_common::events::{
    ControllerState, ItemOutcome, PlaybackEvent, RequeuePosition, StopReason,
};
use voxq_common::{ChannelId, TenantId};

/// Result of streaming one item
#[derive(Debug, Clone, Copy)]
struct Playthrough {
    outcome: ItemOutcome,
    frames_pulled: u64,
    frames_sent: u64,
}

/// Playback state machine for one tenant
pub struct PlaybackController {
    tenant: TenantId,
    voice_channel: ChannelId,
    text_channel: Option<ChannelId>,

    queue: PlaybackQueue<Item>,

    paused: AtomicBool,
    looping: AtomicBool,
    repeating: AtomicBool,

    /// Stopped latch. Checked and set together with queue emptiness so an
    /// item can never land in the queue of a controller that already decided
    /// to drain.
    closed: Mutex<bool>,

    state: Mutex<ControllerState>,
    mailboxes: Mailboxes,
    events: broadcast::Sender<PlaybackEvent>,
}

impl PlaybackController {
    /// Create a controller seeded with its first item
    ///
    /// The control loop is not running yet; the registry spawns
    /// [`PlaybackController::run`] with the returned receivers.
    pub(crate) fn new(
        tenant: TenantId,
        voice_channel: ChannelId,
        text_channel: Option<ChannelId>,
        first: Item,
        events: broadcast::Sender<PlaybackEvent>,
    ) -> (Arc<Self>, SignalReceivers) {
        let (mailboxes, receivers) = mailbox::mailboxes();
        let queue = PlaybackQueue::new();
        queue.push_back([first]);

        let controller = Arc::new(Self {
            tenant,
            voice_channel,
            text_channel,
            queue,
            paused: AtomicBool::new(false),
            looping: AtomicBool::new(false),
            repeating: AtomicBool::new(false),
            closed: Mutex::new(false),
            state: Mutex::new(ControllerState::Connecting),
            mailboxes,
            events,
        });
        (controller, receivers)
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    pub fn voice_channel(&self) -> &ChannelId {
        &self.voice_channel
    }

    /// Channel the first play request came from
    pub fn text_channel(&self) -> Option<&ChannelId> {
        self.text_channel.as_ref()
    }

    pub fn state(&self) -> ControllerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn is_looping(&self) -> bool {
        self.looping.load(Ordering::Acquire)
    }

    pub fn is_repeating(&self) -> bool {
        self.repeating.load(Ordering::Acquire)
    }

    /// True once teardown has been decided; the controller is dead
    pub fn is_stopped(&self) -> bool {
        *self.closed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_stopped() {
            return Err(Error::ControllerStopped(self.tenant.clone()));
        }
        Ok(())
    }

    // ---- queue access ----

    /// Append an item, returning its queue position
    ///
    /// Playback state is untouched; the loop picks the item up in turn.
    pub fn enqueue(&self, item: Item) -> Result<usize> {
        let closed = self.closed.lock().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return Err(Error::ControllerStopped(self.tenant.clone()));
        }
        let len = self.queue.push_back([item]);
        Ok(len - 1)
    }

    /// Items waiting behind the one currently playing
    pub fn queue_snapshot(&self) -> Result<Vec<Item>> {
        self.ensure_live()?;
        Ok(self.queue.snapshot())
    }

    pub fn queue_len(&self) -> Result<usize> {
        self.ensure_live()?;
        Ok(self.queue.len())
    }

    pub fn reorder(&self, from: usize, to: usize) -> Result<()> {
        self.ensure_live()?;
        self.queue.reorder(from, to)
    }

    pub fn remove_item(&self, index: usize) -> Result<Item> {
        self.ensure_live()?;
        self.queue.remove(index)
    }

    /// Set the stopped latch only if nothing is queued
    pub(crate) fn close_if_idle(&self) -> bool {
        let mut closed = self.closed.lock().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return true;
        }
        if !self.queue.is_empty() {
            return false;
        }
        *closed = true;
        true
    }

    /// Set the stopped latch unconditionally
    pub(crate) fn close(&self) {
        *self.closed.lock().unwrap_or_else(PoisonError::into_inner) = true;
    }

    // ---- control signals ----

    /// Deliver a control signal, waiting while one of the same kind is pending
    pub async fn signal(&self, signal: Signal) -> Result<()> {
        if self.mailboxes.post(signal).await {
            debug!("Tenant {}: {:?} delivered", self.tenant, signal);
            Ok(())
        } else {
            Err(Error::ControllerStopped(self.tenant.clone()))
        }
    }

    pub async fn skip(&self) -> Result<()> {
        self.signal(Signal::Skip).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.signal(Signal::Stop).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.signal(Signal::Pause).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.signal(Signal::Resume).await
    }

    pub async fn toggle_loop(&self) -> Result<()> {
        self.signal(Signal::ToggleLoop).await
    }

    pub async fn toggle_repeat(&self) -> Result<()> {
        self.signal(Signal::ToggleRepeat).await
    }

    /// Post a stop without waiting
    ///
    /// Returns `false` only if the control loop has already exited. A stop
    /// that is already pending counts as delivered.
    pub fn request_stop(&self) -> bool {
        match self.mailboxes.try_post(Signal::Stop) {
            TryPost::Posted | TryPost::Pending => true,
            TryPost::Closed => false,
        }
    }

    // ---- control loop ----

    fn emit(&self, event: PlaybackEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn set_state(&self, new_state: ControllerState) {
        let old_state = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let old_state = *state;
            if old_state == new_state
                || old_state == ControllerState::Stopped
                || (old_state.is_terminal() && !new_state.is_terminal())
            {
                return;
            }
            *state = new_state;
            old_state
        };

        debug!("Tenant {}: {} -> {}", self.tenant, old_state, new_state);
        self.emit(PlaybackEvent::StateChanged {
            tenant: self.tenant.clone(),
            old_state,
            new_state,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Control loop body; runs on its own task until teardown completes
    pub(crate) async fn run(
        self: Arc<Self>,
        mut signals: SignalReceivers,
        transport: Arc<dyn Transport>,
        registry: ControllerRegistry,
    ) {
        self.emit(PlaybackEvent::ControllerStarted {
            tenant: self.tenant.clone(),
            voice_channel: self.voice_channel.clone(),
            text_channel: self.text_channel.clone(),
            timestamp: chrono::Utc::now(),
        });
        info!("Tenant {}: joining voice channel {}", self.tenant, self.voice_channel);

        let handle = match transport.join(&self.tenant, &self.voice_channel).await {
            Ok(handle) => handle,
            Err(e) => {
                error!("Tenant {}: could not open voice connection: {}", self.tenant, e);
                drop(signals);
                registry.retire(&self).await;
                let discarded = self.queue.clear().len();
                self.finish(StopReason::JoinFailed, discarded);
                return;
            }
        };

        info!(
            "Tenant {}: voice session {} established",
            self.tenant,
            handle.session_id()
        );
        self.set_state(ControllerState::Streaming);

        let reason = self.stream(&mut signals, handle.frames(), &registry).await;
        // Senders blocked on a full mailbox fail from here on
        drop(signals);

        let discarded = if reason == StopReason::Drained {
            0
        } else {
            registry.retire(&self).await;
            self.queue.clear().len()
        };
        self.set_state(ControllerState::Draining);

        if let Err(e) = transport.disconnect(handle).await {
            error!("Tenant {}: could not disconnect from voice channel: {}", self.tenant, e);
        }

        self.finish(reason, discarded);
    }

    fn finish(&self, reason: StopReason, discarded: usize) {
        self.paused.store(false, Ordering::Release);
        self.looping.store(false, Ordering::Release);
        self.repeating.store(false, Ordering::Release);
        self.set_state(ControllerState::Stopped);

        if discarded > 0 {
            info!(
                "Tenant {}: controller stopped ({:?}), discarded {} queued items",
                self.tenant, reason, discarded
            );
        } else {
            info!("Tenant {}: controller stopped ({:?})", self.tenant, reason);
        }

        self.emit(PlaybackEvent::ControllerStopped {
            tenant: self.tenant.clone(),
            reason,
            discarded,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Pop and stream items until the queue drains or streaming must end
    async fn stream(
        self: &Arc<Self>,
        signals: &mut SignalReceivers,
        sink: &mpsc::Sender<Frame>,
        registry: &ControllerRegistry,
    ) -> StopReason {
        loop {
            if self.is_stopped() {
                return StopReason::Removed;
            }

            let item = match self.queue.pop_front() {
                Some(item) => item,
                None => {
                    if registry.retire_if_idle(self).await {
                        return StopReason::Drained;
                    }
                    // Something was enqueued while we were deciding
                    continue;
                }
            };

            let title = item.title().to_string();
            debug!("Tenant {}: playing {}", self.tenant, title);
            self.emit(PlaybackEvent::ItemStarted {
                tenant: self.tenant.clone(),
                title: title.clone(),
                timestamp: chrono::Utc::now(),
            });

            let playthrough = self.play_item(&item, sink, signals).await;

            self.emit(PlaybackEvent::ItemEnded {
                tenant: self.tenant.clone(),
                title: title.clone(),
                outcome: playthrough.outcome,
                frames_sent: playthrough.frames_sent,
                timestamp: chrono::Utc::now(),
            });

            match playthrough.outcome {
                ItemOutcome::Stopped if self.is_stopped() => return StopReason::Removed,
                ItemOutcome::Stopped => return StopReason::Stopped,
                ItemOutcome::TransportLost => return StopReason::TransportLost,
                ItemOutcome::Finished | ItemOutcome::Skipped | ItemOutcome::Failed => {}
            }

            if playthrough.frames_pulled == 0 {
                if self.is_repeating() || self.is_looping() {
                    warn!(
                        "Tenant {}: {} produced no frames, not re-queueing it",
                        self.tenant, title
                    );
                }
                continue;
            }

            self.requeue(item).await;
        }
    }

    /// Put a finished item back according to repeat (front) or loop (back)
    ///
    /// Repeat is checked first, so it wins when both flags are set.
    async fn requeue(&self, item: Item) {
        let position = if self.is_repeating() {
            RequeuePosition::Front
        } else if self.is_looping() {
            RequeuePosition::Back
        } else {
            return;
        };

        item.reset_playback().await;
        let title = item.title().to_string();
        match position {
            RequeuePosition::Front => self.queue.push_front([item]),
            RequeuePosition::Back => {
                self.queue.push_back([item]);
            }
        }

        debug!("Tenant {}: re-queued {} at the {:?}", self.tenant, title, position);
        self.emit(PlaybackEvent::ItemRequeued {
            tenant: self.tenant.clone(),
            title,
            position,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Stream one item, servicing control signals between frames
    ///
    /// A pulled frame is held until the transport accepts it; losing the
    /// selective wait to a signal does not drop it. Only skip, stop or a
    /// closed transport abandon the frame, and all of them rewind the item.
    async fn play_item(
        &self,
        item: &Item,
        sink: &mpsc::Sender<Frame>,
        signals: &mut SignalReceivers,
    ) -> Playthrough {
        let mut playthrough = Playthrough {
            outcome: ItemOutcome::Finished,
            frames_pulled: 0,
            frames_sent: 0,
        };

        loop {
            let frame = match item.next_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => return playthrough,
                Err(e) => {
                    warn!("Tenant {}: could not play {}: {}", self.tenant, item.title(), e);
                    playthrough.outcome = ItemOutcome::Failed;
                    return playthrough;
                }
            };
            playthrough.frames_pulled += 1;

            loop {
                match signals.wait(sink, !self.is_paused()).await {
                    Wake::Ready(permit) => {
                        permit.send(frame);
                        playthrough.frames_sent += 1;
                        break;
                    }
                    Wake::Signal(signal) => {
                        if let Some(outcome) = self.apply(signal) {
                            item.reset_playback().await;
                            playthrough.outcome = outcome;
                            return playthrough;
                        }
                    }
                    Wake::SinkClosed => {
                        error!("Tenant {}: transport frame sink closed", self.tenant);
                        item.reset_playback().await;
                        playthrough.outcome = ItemOutcome::TransportLost;
                        return playthrough;
                    }
                    Wake::Orphaned => {
                        item.reset_playback().await;
                        playthrough.outcome = ItemOutcome::Stopped;
                        return playthrough;
                    }
                }
            }
        }
    }

    /// Apply a control signal; returns an outcome when the item must end
    fn apply(&self, signal: Signal) -> Option<ItemOutcome> {
        match signal {
            Signal::Pause => {
                self.paused.store(true, Ordering::Release);
                self.set_state(ControllerState::Paused);
                None
            }
            Signal::Resume => {
                self.paused.store(false, Ordering::Release);
                self.set_state(ControllerState::Streaming);
                None
            }
            Signal::ToggleLoop => {
                let enabled = !self.looping.fetch_xor(true, Ordering::AcqRel);
                info!("Tenant {}: loop {}", self.tenant, if enabled { "on" } else { "off" });
                self.emit(PlaybackEvent::LoopToggled {
                    tenant: self.tenant.clone(),
                    enabled,
                    timestamp: chrono::Utc::now(),
                });
                None
            }
            Signal::ToggleRepeat => {
                let enabled = !self.repeating.fetch_xor(true, Ordering::AcqRel);
                info!("Tenant {}: repeat {}", self.tenant, if enabled { "on" } else { "off" });
                self.emit(PlaybackEvent::RepeatToggled {
                    tenant: self.tenant.clone(),
                    enabled,
                    timestamp: chrono::Utc::now(),
                });
                None
            }
            Signal::Skip => {
                self.paused.store(false, Ordering::Release);
                self.set_state(ControllerState::Streaming);
                Some(ItemOutcome::Skipped)
            }
            Signal::Stop => {
                self.paused.store(false, Ordering::Release);
                self.looping.store(false, Ordering::Release);
                self.repeating.store(false, Ordering::Release);
                Some(ItemOutcome::Stopped)
            }
        }
    }
}

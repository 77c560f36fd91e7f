//! Single-slot control signal mailboxes
//!
//! One capacity-1 channel per signal kind. At most one signal of each kind
//! is pending; a sender that finds the slot occupied waits until the control
//! loop consumes it. Signals are never queued beyond one.

use crate::item::Frame;
use tokio::sync::mpsc::{self, error::TrySendError, Permit};

/// Control signal kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Skip,
    Stop,
    Pause,
    Resume,
    ToggleLoop,
    ToggleRepeat,
}

/// Result of a non-blocking post
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TryPost {
    Posted,
    /// A signal of the same kind is already waiting
    Pending,
    /// The control loop has exited
    Closed,
}

/// What woke the control loop
pub(crate) enum Wake<'a> {
    Signal(Signal),
    /// The transport has room for the held frame
    Ready(Permit<'a, Frame>),
    /// The transport frame sink is gone
    SinkClosed,
    /// Every mailbox sender is gone; only happens if the controller was dropped
    Orphaned,
}

/// Sending half, owned by the controller
#[derive(Debug)]
pub(crate) struct Mailboxes {
    skip: mpsc::Sender<()>,
    stop: mpsc::Sender<()>,
    pause: mpsc::Sender<()>,
    resume: mpsc::Sender<()>,
    toggle_loop: mpsc::Sender<()>,
    toggle_repeat: mpsc::Sender<()>,
}

/// Receiving half, owned by the control loop
#[derive(Debug)]
pub(crate) struct SignalReceivers {
    skip: mpsc::Receiver<()>,
    stop: mpsc::Receiver<()>,
    pause: mpsc::Receiver<()>,
    resume: mpsc::Receiver<()>,
    toggle_loop: mpsc::Receiver<()>,
    toggle_repeat: mpsc::Receiver<()>,
}

pub(crate) fn mailboxes() -> (Mailboxes, SignalReceivers) {
    let (skip_tx, skip_rx) = mpsc::channel(1);
    let (stop_tx, stop_rx) = mpsc::channel(1);
    let (pause_tx, pause_rx) = mpsc::channel(1);
    let (resume_tx, resume_rx) = mpsc::channel(1);
    let (loop_tx, loop_rx) = mpsc::channel(1);
    let (repeat_tx, repeat_rx) = mpsc::channel(1);

    (
        Mailboxes {
            skip: skip_tx,
            stop: stop_tx,
            pause: pause_tx,
            resume: resume_tx,
            toggle_loop: loop_tx,
            toggle_repeat: repeat_tx,
        },
        SignalReceivers {
            skip: skip_rx,
            stop: stop_rx,
            pause: pause_rx,
            resume: resume_rx,
            toggle_loop: loop_rx,
            toggle_repeat: repeat_rx,
        },
    )
}

impl Mailboxes {
    fn sender(&self, signal: Signal) -> &mpsc::Sender<()> {
        match signal {
            Signal::Skip => &self.skip,
            Signal::Stop => &self.stop,
            Signal::Pause => &self.pause,
            Signal::Resume => &self.resume,
            Signal::ToggleLoop => &self.toggle_loop,
            Signal::ToggleRepeat => &self.toggle_repeat,
        }
    }

    /// Deliver a signal, waiting while the slot is occupied
    ///
    /// Returns `false` when the control loop has exited.
    pub(crate) async fn post(&self, signal: Signal) -> bool {
        self.sender(signal).send(()).await.is_ok()
    }

    /// Deliver a signal without waiting
    pub(crate) fn try_post(&self, signal: Signal) -> TryPost {
        match self.sender(signal).try_send(()) {
            Ok(()) => TryPost::Posted,
            Err(TrySendError::Full(())) => TryPost::Pending,
            Err(TrySendError::Closed(())) => TryPost::Closed,
        }
    }
}

impl SignalReceivers {
    /// Selective wait over every mailbox and, when `offer_frame` is set, the
    /// transport having room for one more frame
    ///
    /// Exactly one alternative wins per call. Branch order is randomised by
    /// `select!`, so a continuous frame stream cannot starve control signals.
    pub(crate) async fn wait<'a>(
        &mut self,
        sink: &'a mpsc::Sender<Frame>,
        offer_frame: bool,
    ) -> Wake<'a> {
        tokio::select! {
            Some(()) = self.stop.recv() => Wake::Signal(Signal::Stop),
            Some(()) = self.skip.recv() => Wake::Signal(Signal::Skip),
            Some(()) = self.pause.recv() => Wake::Signal(Signal::Pause),
            Some(()) = self.resume.recv() => Wake::Signal(Signal::Resume),
            Some(()) = self.toggle_loop.recv() => Wake::Signal(Signal::ToggleLoop),
            Some(()) = self.toggle_repeat.recv() => Wake::Signal(Signal::ToggleRepeat),
            permit = sink.reserve(), if offer_frame => match permit {
                Ok(permit) => Wake::Ready(permit),
                Err(_) => Wake::SinkClosed,
            },
            else => Wake::Orphaned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_try_post_coalesces() {
        let (mailboxes, _receivers) = mailboxes();
        assert_eq!(mailboxes.try_post(Signal::Skip), TryPost::Posted);
        assert_eq!(mailboxes.try_post(Signal::Skip), TryPost::Pending);
        assert_eq!(mailboxes.try_post(Signal::Stop), TryPost::Posted);
    }

    #[tokio::test]
    async fn test_post_after_loop_exit_fails() {
        let (mailboxes, receivers) = mailboxes();
        drop(receivers);
        assert!(!mailboxes.post(Signal::Pause).await);
        assert_eq!(mailboxes.try_post(Signal::Pause), TryPost::Closed);
    }

    #[tokio::test]
    async fn test_wait_withholds_frame_slot_when_paused() {
        let (mailboxes, mut receivers) = mailboxes();
        let (sink, _rx) = mpsc::channel::<Frame>(1);

        assert!(mailboxes.post(Signal::Resume).await);
        match receivers.wait(&sink, false).await {
            Wake::Signal(signal) => assert_eq!(signal, Signal::Resume),
            _ => panic!("expected a signal while the frame is withheld"),
        };
    }

    #[tokio::test]
    async fn test_wait_offers_frame_slot() {
        let (_mailboxes, mut receivers) = mailboxes();
        let (sink, mut rx) = mpsc::channel::<Frame>(1);

        match receivers.wait(&sink, true).await {
            Wake::Ready(permit) => permit.send(vec![7]),
            _ => panic!("expected the frame slot"),
        }
        assert_eq!(rx.recv().await, Some(vec![7]));
    }

    #[tokio::test]
    async fn test_wait_reports_closed_sink() {
        let (_mailboxes, mut receivers) = mailboxes();
        let (sink, rx) = mpsc::channel::<Frame>(1);
        drop(rx);

        assert!(matches!(receivers.wait(&sink, true).await, Wake::SinkClosed));
    }
}

//! # voxq Player Library (voxq-player)
//!
//! Control plane for per-tenant, interruptible playback of opus audio.
//!
//! **Purpose:** Hold a reorderable queue per tenant, stream one item's frames
//! at a time into a voice transport, and apply skip / stop / pause / resume /
//! loop / repeat signals while streaming is in flight.
//!
//! **Architecture:** One tokio task per active tenant, a registry guarded by
//! an async `RwLock`, single-slot mailboxes for control signals, and a
//! bounded frame sink per voice session for backpressure.

pub mod config;
pub mod error;
pub mod item;
pub mod playback;
pub mod transport;

pub use error::{Error, Result};
pub use item::{BufferedItem, DcaFileItem, Frame, Item, PlayableItem};
pub use playback::{ControllerRegistry, PlayOutcome, PlaybackController, PlaybackQueue, Signal};
pub use transport::{LoopbackTransport, Transport, TransportHandle};

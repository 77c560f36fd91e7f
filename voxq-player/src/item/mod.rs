//! Playable items
//!
//! The controller treats an item as an opaque, restartable source of opus
//! frames. Items are shared as `Arc<dyn PlayableItem>` so a queue snapshot
//! can be handed out while the control loop keeps streaming.

mod buffered;
mod dca;

pub use buffered::BufferedItem;
pub use dca::DcaFileItem;

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// One opus packet as handed to the transport
pub type Frame = Vec<u8>;

/// Shared handle to a playable item
pub type Item = Arc<dyn PlayableItem>;

/// Restartable, finite source of frames
#[async_trait]
pub trait PlayableItem: Send + Sync {
    /// Human-readable name used in logs and events
    fn title(&self) -> &str;

    /// Pull the next frame
    ///
    /// `Ok(None)` signals end-of-stream. An error ends this item only.
    async fn next_frame(&self) -> Result<Option<Frame>>;

    /// Rewind to the first frame. Must be idempotent.
    async fn reset_playback(&self);
}

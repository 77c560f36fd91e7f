//! In-memory playable item

use super::{Frame, PlayableItem};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Item backed by a pre-loaded list of frames
#[derive(Debug)]
pub struct BufferedItem {
    title: String,
    frames: Vec<Frame>,
    cursor: AtomicUsize,
}

impl BufferedItem {
    pub fn new(title: impl Into<String>, frames: Vec<Frame>) -> Self {
        Self {
            title: title.into(),
            frames,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Number of frames the item yields per play-through
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Index of the next frame to be pulled
    pub fn position(&self) -> usize {
        self.cursor.load(Ordering::Acquire).min(self.frames.len())
    }
}

#[async_trait]
impl PlayableItem for BufferedItem {
    fn title(&self) -> &str {
        &self.title
    }

    async fn next_frame(&self) -> Result<Option<Frame>> {
        let index = self.cursor.fetch_add(1, Ordering::AcqRel);
        Ok(self.frames.get(index).cloned())
    }

    async fn reset_playback(&self) {
        self.cursor.store(0, Ordering::Release);
    }
}

//! Error types for voxq-player
//!
//! Queue errors are local and recoverable, transport errors are fatal to one
//! controller, frame pull errors are fatal to one item only.

use thiserror::Error;
use voxq_common::TenantId;

/// Main error type for the voxq-player crate
#[derive(Error, Debug)]
pub enum Error {
    /// Queue position outside `0..len`
    #[error("Index {index} out of queue bounds (length {len})")]
    OutOfBounds { index: usize, len: usize },

    /// Transport could not join or initialise the voice channel
    #[error("Transport join failed: {0}")]
    TransportJoin(String),

    /// Transport could not leave the voice channel cleanly
    #[error("Transport disconnect failed: {0}")]
    TransportDisconnect(String),

    /// Playable item failed to produce its next frame
    #[error("Frame pull failed: {0}")]
    FramePull(String),

    /// No live controller for the tenant
    #[error("No playback controller for tenant {0}")]
    ControllerNotFound(TenantId),

    /// Controller has begun teardown and refuses further access
    #[error("Playback controller for tenant {0} is stopped")]
    ControllerStopped(TenantId),

    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors bubbled up from voxq-common
    #[error(transparent)]
    Common(#[from] voxq_common::Error),
}

/// Convenience Result type using voxq-player Error
pub type Result<T> = std::result::Result<T, Error>;

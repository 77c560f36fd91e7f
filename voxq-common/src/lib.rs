//! # voxq Common Library
//!
//! Shared code for the voxq playback service:
//! - Tenant and channel identifiers
//! - Event types (PlaybackEvent enum) and controller state enums
//! - Configuration file resolution
//! - Logging initialisation

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod logging;

pub use error::{Error, Result};
pub use ids::{ChannelId, TenantId};

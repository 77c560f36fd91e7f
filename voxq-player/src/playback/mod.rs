//! Playback queue, per-tenant controllers and the controller registry

mod controller;
mod mailbox;
pub mod queue;
mod registry;

pub use controller::PlaybackController;
pub use mailbox::Signal;
pub use queue::PlaybackQueue;
pub use registry::{ControllerRegistry, PlayOutcome};

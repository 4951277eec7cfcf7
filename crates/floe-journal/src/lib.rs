//! floe-journal -- outbound notifications from the floe simulation.
//!
//! The simulation core is headless. Everything a renderer, mixer or HUD
//! needs to react to is published here as a [`GameEvent`](event::GameEvent):
//! sound cues, score and HP changes, level completion and failure.
//!
//! # Modules
//!
//! - [`event`]: the event vocabulary ([`EventKind`](event::EventKind),
//!   [`Sound`](event::Sound)) with causality metadata.
//! - [`journal`]: per-frame buffering and a bounded history of
//!   [`FrameRecord`](journal::FrameRecord)s.

#![deny(unsafe_code)]

pub mod event;
pub mod journal;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::event::{EventKind, GameEvent, Sound};
    pub use crate::journal::{EventJournal, FrameRecord};
}

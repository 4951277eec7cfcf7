//! Names attached to entities and to the code paths that mutate them.
//!
//! - [`SystemId`] tags every deferred command and journal event with the frame
//!   phase that produced it.
//! - [`TimelineId`] is the author-assigned label a room definition gives an
//!   entity so timeline scripts can address it (`setattr player visible 0`).

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// SystemId
// ---------------------------------------------------------------------------

/// Numeric tag for the frame phase that issued a command or event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SystemId(pub u32);

impl SystemId {
    /// Bookkeeping not tied to a frame phase (room load, respawn).
    pub const ENGINE_INTERNAL: SystemId = SystemId(0);
    /// Player input sampling and control.
    pub const INPUT: SystemId = SystemId(1);
    /// Velocity and acceleration update.
    pub const KINEMATICS: SystemId = SystemId(10);
    /// Tile/slope collision resolution and hazard contacts.
    pub const COLLISION: SystemId = SystemId(20);
    /// Entity interaction dispatch (stomp, touch, knock, ...).
    pub const INTERACTION: SystemId = SystemId(30);
    /// Warp transit.
    pub const WARP: SystemId = SystemId(40);
    /// Room bookkeeping: timers, win and death sequencing.
    pub const ROOM: SystemId = SystemId(50);
    /// Timeline script execution.
    pub const TIMELINE: SystemId = SystemId(60);
    /// Session-level transitions between rooms.
    pub const SESSION: SystemId = SystemId(70);
}

// ---------------------------------------------------------------------------
// TimelineId
// ---------------------------------------------------------------------------

/// Label addressing an entity from a timeline script.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimelineId(pub String);

impl TimelineId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TimelineId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl fmt::Display for TimelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//! floe-engine -- the platformer runtime: movement, collision, interaction
//! and the room/session controller on top of [`floe_world`].
//!
//! The pieces, bottom up:
//!
//! - [`kinematics`] and [`collision`]: velocity integration and the swept
//!   tile/slope resolver.
//! - [`entity`], [`player`], [`pose`]: the tagged entity model, player
//!   steering and animation pose selection.
//! - [`interaction`]: stomps, kicks, hazards, carrying, freezing and thin
//!   ice.
//! - [`warp`], [`camera`], [`timeline`]: pipes and doors, views, and
//!   scripted timelines.
//! - [`room`] and [`session`]: one room's frame pipeline and the progress
//!   that outlives rooms.
//! - [`game`], [`snapshot`], [`replay`]: the frame driver, state hashing
//!   and deterministic replay.
//!
//! # Quick Start
//!
//! ```
//! use floe_engine::prelude::*;
//!
//! let def: RoomDefinition = serde_json::from_str(r#"{
//!     "name": "start",
//!     "width": 960,
//!     "height": 480,
//!     "tiles": [{ "shape": "solid", "x": 0, "y": 448, "width": 960, "height": 32 }],
//!     "spawns": [
//!         { "tag": "player", "x": 64, "y": 416 },
//!         { "tag": "coin", "x": 160, "y": 416 }
//!     ]
//! }"#).unwrap();
//!
//! let mut game = Game::new_game(EngineConfig::default(), [def], Levelset::new(["start"])).unwrap();
//! let run = PlayerInput { right: true, ..PlayerInput::default() };
//! let mut collected = false;
//! for _ in 0..120 {
//!     let record = game.frame(&[run]);
//!     collected |= record.events.iter().any(|e| e.kind == EventKind::PlaySound(Sound::Coin));
//! }
//! assert!(collected);
//! ```

#![deny(unsafe_code)]

pub mod camera;
pub mod collision;
pub mod config;
pub mod definition;
pub mod entity;
pub mod game;
pub mod interaction;
pub mod kinematics;
pub mod player;
pub mod pose;
pub mod replay;
pub mod room;
pub mod session;
pub mod snapshot;
pub mod timeline;
pub mod warp;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the world crate for convenience.
pub use floe_world;

/// Re-export the journal crate for convenience.
pub use floe_journal;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use floe_journal::prelude::*;
    pub use floe_world::prelude::*;

    pub use crate::config::{ConfigError, EngineConfig};
    pub use crate::definition::{DefinitionError, RoomDefinition, SpawnRecord, TileRecord, TimelineScript};
    pub use crate::entity::{Element, Entity, Variant};
    pub use crate::game::{EntityView, FrameDiagnostics, Game, Screen, TransitionError};
    pub use crate::interaction::carry::CarryError;
    pub use crate::kinematics::Motion;
    pub use crate::player::{PlayerInput, PlayerState};
    pub use crate::pose::Pose;
    pub use crate::replay::{replay, ReplayDivergence, ReplayEntry, ReplayLog, ReplayRecorder, ReplayResult};
    pub use crate::room::{Room, RoomPhase, RoomRequest, StepCtx, WinStage};
    pub use crate::session::{Levelset, Session};
    pub use crate::snapshot::GameSnapshot;
    pub use crate::warp::{Destination, DestinationError, LevelRef, WarpKind};
}

//! floe-world -- the entity arena and tile geometry underneath a floe room.
//!
//! A room is two things: a [`TileMap`](tile::TileMap) of static, typed
//! collision tiles and a [`Registry`](registry::Registry) of dynamic entities
//! addressed by generational [`EntityId`](entity::EntityId)s. Mutations that
//! must not disturb an in-progress frame pass (spawns and despawns) are
//! queued on a [`CommandBuffer`](command::CommandBuffer) and applied at the
//! end of the frame.
//!
//! # Quick Start
//!
//! ```
//! use floe_world::prelude::*;
//!
//! let mut tiles = TileMap::new(32.0);
//! tiles.insert(Rect::new(0.0, 64.0, 320.0, 32.0), TileShape::Solid).unwrap();
//!
//! let mut entities: Registry<&str> = Registry::new();
//! let player = entities.insert("player");
//!
//! let mut near = Vec::new();
//! tiles.query(&Rect::new(0.0, 32.0, 32.0, 32.0), &mut near);
//! assert_eq!(near.len(), 1);
//! assert!(entities.contains(player));
//! ```

#![deny(unsafe_code)]

pub mod alarm;
pub mod command;
pub mod entity;
pub mod geometry;
pub mod identity;
pub mod registry;
pub mod tile;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by world operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The entity does not exist (stale generation or never allocated).
    #[error("entity {entity:?} does not exist (stale or never allocated)")]
    StaleEntity { entity: entity::EntityId },

    /// A rectangle with zero or negative extent was offered where collision
    /// needs a real area.
    #[error("degenerate bounds {width}x{height}")]
    DegenerateBounds { width: f64, height: f64 },

    /// No tile with this id is placed.
    #[error("tile {tile} does not exist")]
    UnknownTile { tile: u32 },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::alarm::Alarms;
    pub use crate::command::{
        AppliedCommand, ApplyReport, CausalReason, Command, CommandBuffer, CommandKind,
    };
    pub use crate::entity::{EntityAllocator, EntityId};
    pub use crate::geometry::{Direction, Rect, Side};
    pub use crate::identity::{SystemId, TimelineId};
    pub use crate::registry::Registry;
    pub use crate::tile::{Tile, TileId, TileMap, TileShape};
    pub use crate::WorldError;
}

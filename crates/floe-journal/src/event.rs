//! Discrete notifications emitted by the simulation.
//!
//! The core never plays a sound or redraws a HUD itself. It emits
//! [`GameEvent`]s, and the presentation layer reacts to them. Each event
//! records the frame it happened in, the entities involved, and the phase and
//! reason that produced it, so a surprising HP drop can be traced back to the
//! contact that caused it.

use floe_world::command::CausalReason;
use floe_world::entity::EntityId;
use floe_world::identity::SystemId;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Sound
// ---------------------------------------------------------------------------

/// Sound cues the core can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sound {
    Jump,
    Skid,
    Hurt,
    /// Something was knocked or burned off the stage.
    Fall,
    Stomp,
    Squish,
    /// The player died.
    Kill,
    Kick,
    Pipe,
    Door,
    Coin,
    Heal,
    Token,
    Checkpoint,
    Spring,
    Brick,
    Pop,
    Fireball,
    IceBullet,
    Freeze,
    Thaw,
    /// One of several interchangeable crack sounds.
    IceCrack(u8),
    IceShatter,
    /// Tick played while the win sequence drains a counter.
    Count,
    LevelWin,
}

// ---------------------------------------------------------------------------
// EventKind
// ---------------------------------------------------------------------------

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    PlaySound(Sound),
    /// Session score moved by `delta`.
    ScoreChanged { delta: i64, total: i64 },
    /// The level's pending points moved by `delta`.
    PointsChanged { delta: i64, total: i64 },
    HpChanged { entity: EntityId, hp: i32 },
    CoinsChanged { entity: EntityId, coins: i32 },
    LevelCompleted { level: String },
    LevelFailed { level: String },
    RoomEntered { room: String },
    TokenFound { level: String },
    MusicChanged { track: String },
    /// The last level of the levelset was cleared.
    GameCompleted,
}

impl EventKind {
    /// Short, stable name for filtering and logging.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::PlaySound(_) => "play_sound",
            EventKind::ScoreChanged { .. } => "score_changed",
            EventKind::PointsChanged { .. } => "points_changed",
            EventKind::HpChanged { .. } => "hp_changed",
            EventKind::CoinsChanged { .. } => "coins_changed",
            EventKind::LevelCompleted { .. } => "level_completed",
            EventKind::LevelFailed { .. } => "level_failed",
            EventKind::RoomEntered { .. } => "room_entered",
            EventKind::TokenFound { .. } => "token_found",
            EventKind::MusicChanged { .. } => "music_changed",
            EventKind::GameCompleted => "game_completed",
        }
    }
}

// ---------------------------------------------------------------------------
// GameEvent
// ---------------------------------------------------------------------------

/// An event plus its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    pub kind: EventKind,
    /// Entities involved, most relevant first.
    pub involved_entities: Vec<EntityId>,
    /// Phase that emitted the event.
    pub caused_by: SystemId,
    pub reason: CausalReason,
    /// Frame in which the event happened. Filled in by the journal.
    pub frame: u64,
}

impl GameEvent {
    pub fn new(kind: EventKind, caused_by: SystemId, reason: CausalReason) -> Self {
        Self {
            kind,
            involved_entities: Vec::new(),
            caused_by,
            reason,
            frame: 0,
        }
    }

    /// Attach involved entities.
    pub fn involving(mut self, entities: impl IntoIterator<Item = EntityId>) -> Self {
        self.involved_entities.extend(entities);
        self
    }

    /// Shorthand for a sound cue.
    pub fn sound(sound: Sound, caused_by: SystemId, reason: CausalReason) -> Self {
        Self::new(EventKind::PlaySound(sound), caused_by, reason)
    }
}

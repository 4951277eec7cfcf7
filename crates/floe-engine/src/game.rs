//! The game driver: one session, its rooms, and the frame loop.
//!
//! A [`Game`] owns the static room definitions, the [`Session`], a cache of
//! the rooms visited in the level being played, and the [`EventJournal`].
//! Each call to [`Game::frame`] steps the current room once and then acts
//! on whatever the room asked for: warping to another room, respawning
//! after a death, or moving on after a clear.
//!
//! # Example
//!
//! ```
//! use floe_engine::prelude::*;
//!
//! let def: RoomDefinition = serde_json::from_str(r#"{
//!     "name": "intro",
//!     "width": 640,
//!     "height": 480,
//!     "tiles": [{ "shape": "solid", "x": 0, "y": 448, "width": 640, "height": 32 }],
//!     "spawns": [{ "tag": "player", "x": 64, "y": 416 }]
//! }"#).unwrap();
//!
//! let mut game = Game::new_game(EngineConfig::default(), [def], Levelset::new(["intro"])).unwrap();
//! for _ in 0..10 {
//!     game.frame(&[PlayerInput::default()]);
//! }
//! assert_eq!(game.frame_count(), 10);
//! assert_eq!(game.current_room(), Some("intro"));
//! ```
//!
//! Rooms are cached by name while a level is in progress, so leaving a
//! room and coming back finds it as it was left. The cache is dropped when
//! the level ends, the player dies or the game returns to the worldmap.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use floe_journal::prelude::*;
use floe_world::prelude::*;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span, error, info, warn};

use crate::config::EngineConfig;
use crate::definition::RoomDefinition;
use crate::entity::{Entity, Variant};
use crate::player::PlayerInput;
use crate::pose::Pose;
use crate::room::{Room, RoomRequest, StepCtx};
use crate::session::{Levelset, Session};
use crate::warp::{Destination, DestinationError, LevelRef};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A room transition could not happen.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransitionError {
    #[error("no room named {room:?}")]
    MissingRoom { room: String },

    #[error("no main area to return to")]
    MissingMainArea,

    #[error("no worldmap to return to")]
    MissingWorldmap,

    #[error("bad warp destination {dest:?}")]
    BadDestination {
        dest: String,
        #[source]
        source: DestinationError,
    },
}

// ---------------------------------------------------------------------------
// Screen / diagnostics / views
// ---------------------------------------------------------------------------

/// What the player is looking at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Screen {
    /// Picking a level. Navigation is up to the embedder, which calls
    /// [`Game::enter_level`].
    Worldmap(String),
    Room(String),
    /// The last level is behind us.
    Finished,
}

/// Timing for the last frame.
#[derive(Debug, Clone, Default)]
pub struct FrameDiagnostics {
    /// Wall time per room phase, in execution order.
    pub phase_times: Vec<(String, Duration)>,
    pub total_time: Duration,
    pub commands_applied: usize,
}

/// Presentation state of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityView {
    pub id: EntityId,
    pub variant: &'static str,
    pub x: f64,
    pub y: f64,
    pub pose: Pose,
    /// Animation frame for variants with a frame of their own (thin ice).
    pub frame: u32,
    pub facing: f64,
    pub opacity: f64,
    pub visible: bool,
    pub flipped: bool,
    /// Visible part while inside a warp.
    pub clip: Option<Rect>,
}

/// What a player takes through a warp.
#[derive(Debug)]
struct Carried {
    number: usize,
    hp: i32,
    coins: i32,
    held: Option<Entity>,
}

// ---------------------------------------------------------------------------
// Game
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Game {
    cfg: EngineConfig,
    definitions: BTreeMap<String, RoomDefinition>,
    pub(crate) session: Session,
    pub(crate) areas: BTreeMap<String, Room>,
    pub(crate) screen: Screen,
    pub(crate) rng: Pcg32,
    pub(crate) journal: EventJournal,
    pub(crate) frame: u64,
    diagnostics: FrameDiagnostics,
    /// Events raised outside a room step, recorded at the next chance.
    pending: Vec<GameEvent>,
}

impl Game {
    /// Start a new game: at the first worldmap if there is one, otherwise in
    /// the first level.
    pub fn new_game(
        cfg: EngineConfig,
        definitions: impl IntoIterator<Item = RoomDefinition>,
        levelset: Levelset,
    ) -> Result<Game, TransitionError> {
        let definitions: BTreeMap<String, RoomDefinition> =
            definitions.into_iter().map(|d| (d.name.clone(), d)).collect();
        let mut game = Game {
            rng: Pcg32::seed_from_u64(cfg.seed),
            cfg,
            definitions,
            session: Session::new(levelset),
            areas: BTreeMap::new(),
            screen: Screen::Finished,
            journal: EventJournal::new(),
            frame: 0,
            diagnostics: FrameDiagnostics::default(),
            pending: Vec::new(),
        };
        if let Some(map) = game.session.current_worldmap.clone() {
            info!(worldmap = %map, "new game");
            game.screen = Screen::Worldmap(map);
        } else if let Some(first) = game.session.levelset.levels.first().cloned() {
            info!(level = %first, "new game");
            game.enter_level(&first)?;
        } else {
            warn!("new game with an empty levelset");
        }
        Ok(game)
    }

    /// Start (or restart) `level` at its checkpoint, if one was reached.
    pub fn enter_level(&mut self, level: &str) -> Result<(), TransitionError> {
        if !self.definitions.contains_key(level) {
            return Err(TransitionError::MissingRoom { room: level.into() });
        }
        self.session.main_area = Some(level.to_string());
        if let Some(n) = self.session.levelset.levels.iter().position(|l| l == level) {
            self.session.current_level = n;
        }
        self.areas.clear();

        let checkpoint = self.session.current_checkpoints.get(level).cloned();
        if let Some(cp) = checkpoint {
            match Destination::parse(&cp) {
                Ok(Destination::Level {
                    level: LevelRef::Named(room),
                    spawn,
                }) if self.definitions.contains_key(&room) => {
                    return self.goto_room(&room, spawn.as_deref(), Vec::new());
                }
                _ => warn!(level, checkpoint = %cp, "unusable checkpoint, starting from the top"),
            }
        }
        self.goto_room(level, None, Vec::new())
    }

    /// Switch to room `name`, loading it on first visit, and place the
    /// players at `spawn`.
    fn goto_room(&mut self, name: &str, spawn: Option<&str>, carried: Vec<Carried>) -> Result<(), TransitionError> {
        let def = self
            .definitions
            .get(name)
            .ok_or_else(|| TransitionError::MissingRoom { room: name.into() })?;
        let cfg = &self.cfg;
        let room = self
            .areas
            .entry(name.to_string())
            .or_insert_with(|| Room::load(def, cfg));
        carry_in(room, carried);

        let mut ctx = StepCtx::new(&self.cfg, &mut self.session, &mut self.rng, 1.0);
        room.resume(&mut ctx, spawn);
        room.anchor_held();
        self.pending.append(&mut ctx.events);
        self.screen = Screen::Room(name.to_string());
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Frame loop
    // -----------------------------------------------------------------------

    /// Run one frame at the nominal rate.
    pub fn frame(&mut self, inputs: &[PlayerInput]) -> FrameRecord {
        self.frame_with_delta(inputs, 1.0)
    }

    /// Run one frame. `delta` scales everything time-based; 1.0 is one
    /// frame at the configured rate.
    pub fn frame_with_delta(&mut self, inputs: &[PlayerInput], delta: f64) -> FrameRecord {
        let n = self.frame;
        let span = debug_span!("frame", frame = n);
        let _guard = span.enter();
        let started = Instant::now();

        self.journal.begin_frame(n);
        self.flush_pending();

        let mut phase_times = Vec::new();
        let mut commands_applied = 0;
        if let Screen::Room(name) = self.screen.clone() {
            if let Some(room) = self.areas.get_mut(&name) {
                let mut ctx = StepCtx::new(&self.cfg, &mut self.session, &mut self.rng, delta);
                let applied = room.step(&mut ctx, inputs);
                let StepCtx {
                    events,
                    requests,
                    timings,
                    ..
                } = ctx;
                for event in events {
                    self.journal.record(event);
                }
                self.journal.process_commands(&applied);
                commands_applied = applied.len();
                phase_times = timings;
                for request in requests {
                    self.handle_request(&name, request);
                }
            }
        }
        self.flush_pending();

        self.diagnostics = FrameDiagnostics {
            phase_times,
            total_time: started.elapsed(),
            commands_applied,
        };
        self.frame += 1;
        self.journal.end_frame()
    }

    /// Forget everything that is not part of a snapshot.
    pub(crate) fn reset_transients(&mut self) {
        self.journal.clear();
        self.pending.clear();
        self.diagnostics = FrameDiagnostics::default();
    }

    fn flush_pending(&mut self) {
        for event in self.pending.drain(..) {
            self.journal.record(event);
        }
    }

    fn handle_request(&mut self, from: &str, request: RoomRequest) {
        if self.screen != Screen::Room(from.to_string()) {
            debug!(room = from, ?request, "room already left, request dropped");
            return;
        }
        match request {
            RoomRequest::Warp { dest, traveller } => {
                if let Err(err) = self.warp(from, &dest, traveller) {
                    error!(room = from, %dest, %err, "warp failed, turning back");
                    if let Some(room) = self.areas.get_mut(from) {
                        room.abort_transit(traveller);
                    }
                }
            }
            RoomRequest::Respawn => {
                if let Err(err) = self.respawn() {
                    error!(room = from, %err, "respawn failed");
                    self.screen = Screen::Finished;
                }
            }
            RoomRequest::Complete => {
                if let Err(err) = self.level_complete() {
                    error!(room = from, %err, "could not move on");
                    self.screen = Screen::Finished;
                }
            }
        }
    }

    fn warp(&mut self, from: &str, dest: &str, traveller: EntityId) -> Result<(), TransitionError> {
        let parsed = Destination::parse(dest).map_err(|source| TransitionError::BadDestination {
            dest: dest.into(),
            source,
        })?;
        match parsed {
            Destination::Map => self.return_to_map(),
            Destination::Level { level, spawn } => {
                let room = match level {
                    LevelRef::Main => self.session.main_area.clone().ok_or(TransitionError::MissingMainArea)?,
                    LevelRef::Named(room) => room,
                };
                if !self.definitions.contains_key(&room) {
                    return Err(TransitionError::MissingRoom { room });
                }
                info!(from, to = %room, spawn = spawn.as_deref().unwrap_or("-"), traveller = %traveller, "warp");
                let carried = self.areas.get_mut(from).map(carry_out).unwrap_or_default();
                self.goto_room(&room, spawn.as_deref(), carried)
            }
        }
    }

    fn return_to_map(&mut self) -> Result<(), TransitionError> {
        let map = self
            .session
            .current_worldmap
            .clone()
            .ok_or(TransitionError::MissingWorldmap)?;
        self.areas.clear();
        self.session.main_area = None;
        info!(worldmap = %map, "back to the worldmap");
        self.screen = Screen::Worldmap(map);
        Ok(())
    }

    /// Start the level over from its checkpoint with fresh players.
    fn respawn(&mut self) -> Result<(), TransitionError> {
        let main = self.session.main_area.clone().ok_or(TransitionError::MissingMainArea)?;
        self.enter_level(&main)
    }

    /// Next level, back to the map, or the end of the game.
    fn level_complete(&mut self) -> Result<(), TransitionError> {
        self.areas.clear();
        if self.session.current_worldmap.is_some() {
            return self.return_to_map();
        }
        let next = self.session.current_level + 1;
        match self.session.levelset.levels.get(next).cloned() {
            Some(level) => self.enter_level(&level),
            None => {
                info!(score = self.session.score, "game completed");
                self.session.main_area = None;
                self.screen = Screen::Finished;
                self.pending.push(GameEvent::new(
                    EventKind::GameCompleted,
                    SystemId::SESSION,
                    CausalReason::GameRule("last_level".into()),
                ));
                Ok(())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn cfg(&self) -> &EngineConfig {
        &self.cfg
    }

    pub fn score(&self) -> i64 {
        self.session.score
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn current_room(&self) -> Option<&str> {
        match &self.screen {
            Screen::Room(name) => Some(name),
            _ => None,
        }
    }

    pub fn cleared_levels(&self) -> impl Iterator<Item = &str> + '_ {
        self.session.cleared_levels.iter().map(String::as_str)
    }

    pub fn tokens_found(&self) -> impl Iterator<Item = &str> + '_ {
        self.session.tokens_found.iter().map(String::as_str)
    }

    /// The room being played.
    pub fn room(&self) -> Option<&Room> {
        self.current_room().and_then(|n| self.areas.get(n))
    }

    /// The room being played, for scripted setup.
    pub fn room_mut(&mut self) -> Option<&mut Room> {
        match &self.screen {
            Screen::Room(name) => self.areas.get_mut(name),
            _ => None,
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    pub fn diagnostics(&self) -> &FrameDiagnostics {
        &self.diagnostics
    }

    pub fn journal(&self) -> &EventJournal {
        &self.journal
    }

    /// Presentation state of every visible entity in the current room.
    pub fn entity_views(&self) -> Vec<EntityView> {
        let Some(room) = self.room() else { return Vec::new() };
        room.entities
            .iter()
            .filter(|(_, e)| e.is_live())
            .filter_map(|(id, e)| {
                let clip = room.transit_clip(e);
                (e.visible || clip.is_some()).then(|| EntityView {
                    id,
                    variant: e.variant.name(),
                    x: e.x,
                    y: e.y,
                    pose: e.pose,
                    frame: match &e.variant {
                        Variant::ThinIce(ice) => ice.frame,
                        _ => 0,
                    },
                    facing: e.facing,
                    opacity: e.opacity,
                    visible: e.visible,
                    flipped: e.facing < 0.0,
                    clip,
                })
            })
            .collect()
    }
}

/// Take each player's health, coins and held item out of `room`.
fn carry_out(room: &mut Room) -> Vec<Carried> {
    let mut carried = Vec::new();
    for id in room.players.clone() {
        let Some(e) = room.entities.get_mut(id) else { continue };
        let held_id = e.held.take();
        let Some(p) = e.player() else { continue };
        let (number, hp, coins) = (p.number, p.hp, p.coins);
        let held = held_id.and_then(|h| room.entities.remove(h)).map(|mut item| {
            item.parent = None;
            item
        });
        carried.push(Carried { number, hp, coins, held });
    }
    carried
}

/// Hand carried state to the matching players of `room`.
fn carry_in(room: &mut Room, carried: Vec<Carried>) {
    for c in carried {
        let Some(&id) = room
            .players
            .iter()
            .find(|&&id| room.entities.get(id).and_then(Entity::player).is_some_and(|p| p.number == c.number))
        else {
            continue;
        };
        let old_item = room.entities.get_mut(id).and_then(|e| {
            if let Some(p) = e.player_mut() {
                p.hp = c.hp;
                p.coins = c.coins;
            }
            e.held.take()
        });
        if let Some(old) = old_item {
            room.entities.remove(old);
        }
        if let Some(item) = c.held {
            let item_id = room.entities.insert(item);
            if let Err(err) = room.pickup(id, item_id) {
                warn!(room = %room.name, %err, "carried item lost");
                room.entities.remove(item_id);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{SpawnRecord, TileRecord};

    fn room(name: &str, spawns: Vec<SpawnRecord>) -> RoomDefinition {
        RoomDefinition {
            name: name.into(),
            width: 640.0,
            height: 480.0,
            tiles: vec![TileRecord {
                shape: "solid".into(),
                x: 0.0,
                y: 448.0,
                width: Some(640.0),
                height: Some(32.0),
            }],
            spawns,
            time_bonus: None,
            music: None,
            timeline: None,
        }
    }

    fn spawn(tag: &str, x: f64, y: f64) -> SpawnRecord {
        SpawnRecord {
            tag: tag.into(),
            x,
            y,
            label: None,
            params: BTreeMap::new(),
        }
    }

    #[test]
    fn new_game_prefers_the_worldmap() {
        let game = Game::new_game(
            EngineConfig::default(),
            [room("a", vec![spawn("player", 64.0, 416.0)])],
            Levelset::new(["a"]).with_worldmaps(["overworld"]),
        )
        .unwrap();
        assert_eq!(game.screen(), &Screen::Worldmap("overworld".into()));
        assert!(game.room().is_none());
    }

    #[test]
    fn new_game_without_map_enters_first_level() {
        let mut game = Game::new_game(
            EngineConfig::default(),
            [room("a", vec![spawn("player", 64.0, 416.0)])],
            Levelset::new(["a"]),
        )
        .unwrap();
        assert_eq!(game.current_room(), Some("a"));
        let record = game.frame(&[]);
        assert!(record
            .events
            .iter()
            .any(|e| e.kind == EventKind::RoomEntered { room: "a".into() }));
    }

    #[test]
    fn missing_first_level_is_an_error() {
        let err = Game::new_game(EngineConfig::default(), [], Levelset::new(["nowhere"])).unwrap_err();
        assert_eq!(err, TransitionError::MissingRoom { room: "nowhere".into() });
    }

    #[test]
    fn entity_views_skip_hidden_entities() {
        let mut game = Game::new_game(
            EngineConfig::default(),
            [room("a", vec![spawn("player", 64.0, 416.0), spawn("coin", 200.0, 400.0)])],
            Levelset::new(["a"]),
        )
        .unwrap();
        game.frame(&[]);
        let views = game.entity_views();
        assert_eq!(views.len(), 2);
        assert!(views.iter().any(|v| v.variant == "coin"));
        assert!(views.iter().all(|v| v.clip.is_none()));
    }

    #[test]
    fn completing_the_last_level_finishes_the_game() {
        let mut game = Game::new_game(
            EngineConfig::default(),
            [room("a", vec![spawn("player", 64.0, 416.0)])],
            Levelset::new(["a"]),
        )
        .unwrap();
        game.handle_request("a", RoomRequest::Complete);
        assert_eq!(game.screen(), &Screen::Finished);
        let record = game.frame(&[]);
        assert!(record.events.iter().any(|e| e.kind == EventKind::GameCompleted));
    }
}

//! The room controller.
//!
//! A [`Room`] owns one area's tiles, entities, warps and views, and steps
//! them a frame at a time. Each [`Room::step`] runs the same phases in the
//! same order:
//!
//! 1. **input**: tile tangibility is refreshed around the views, human
//!    players take this frame's input, and jump/action/door edges fire;
//! 2. **kinematics**: non-player velocities are set up for the frame;
//! 3. **movement**: every awake entity is swept through the tile map and
//!    the solid entities, travellers advance through their warps;
//! 4. **interaction**: entity pairs are resolved, thin ice cracks, players
//!    try pipes, held items follow their carriers;
//! 5. **bookkeeping**: alarms, the win/death sequence, the timeline,
//!    activation, poses, views and the death zone;
//! 6. **apply**: queued spawns and despawns land.
//!
//! Everything a frame wants to say to the outside goes through
//! [`StepCtx`]: events for the journal and [`RoomRequest`]s for the game
//! driver, which owns room transitions.

mod physics;
mod sequence;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use floe_journal::prelude::*;
use floe_world::prelude::*;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::camera::{CameraTarget, View};
use crate::config::EngineConfig;
use crate::definition::{new_player, Placement, RoomDefinition};
use crate::entity::{Entity, EntityAlarm, Movement, Variant};
use crate::player::PlayerInput;
use crate::pose::{select_player_pose, select_pose, Pose, PoseInputs};
use crate::session::Session;
use crate::timeline::Timeline;
use crate::warp::{set_anchor, Warp, WarpKind};

// ---------------------------------------------------------------------------
// Frame context
// ---------------------------------------------------------------------------

/// Borrowed state and outputs for one frame of one room.
#[derive(Debug)]
pub struct StepCtx<'a> {
    pub cfg: &'a EngineConfig,
    pub session: &'a mut Session,
    /// Cosmetic randomness only.
    pub rng: &'a mut Pcg32,
    /// Frame-time multiplier; 1.0 at the nominal rate.
    pub delta: f64,
    pub events: Vec<GameEvent>,
    pub requests: Vec<RoomRequest>,
    /// Wall time per phase, for diagnostics.
    pub timings: Vec<(String, Duration)>,
}

impl<'a> StepCtx<'a> {
    pub fn new(cfg: &'a EngineConfig, session: &'a mut Session, rng: &'a mut Pcg32, delta: f64) -> Self {
        Self {
            cfg,
            session,
            rng,
            delta,
            events: Vec::new(),
            requests: Vec::new(),
            timings: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Add to the session score and report it.
    pub fn add_score(&mut self, delta: i64, system: SystemId, reason: CausalReason) {
        if delta == 0 {
            return;
        }
        self.session.score += delta;
        let total = self.session.score;
        self.emit(GameEvent::new(EventKind::ScoreChanged { delta, total }, system, reason));
    }

    fn end_phase(&mut self, name: &'static str, started: Instant) {
        let took = started.elapsed();
        trace!(phase = name, micros = took.as_micros() as u64, "phase done");
        self.timings.push((name.to_string(), took));
    }
}

/// Something only the game driver can do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RoomRequest {
    /// `traveller` left through a warp toward `dest`.
    Warp { dest: String, traveller: EntityId },
    /// The death sequence ran out; restart from the checkpoint.
    Respawn,
    /// The level is complete; move on.
    Complete,
}

// ---------------------------------------------------------------------------
// Sequencing state
// ---------------------------------------------------------------------------

/// Steps of the end-of-level tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WinStage {
    /// Players walk off on their own before counting starts.
    Walk,
    CountPoints,
    CountTime,
    /// Waiting for the next count alarm.
    Pause,
    /// Tally done; waiting to complete.
    Finishing,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RoomPhase {
    Active,
    Won(WinStage),
    /// The last player died; the screen fades out.
    DeathFade { remaining_ms: f64 },
    /// Fade done; waiting to respawn.
    DeathWait,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RoomAlarm {
    /// Time-bonus countdown.
    Timer,
    WinCountPoints,
    WinCountTime,
    WinCountHp,
    Win,
    Death,
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub name: String,
    pub width: f64,
    pub height: f64,
    pub tiles: TileMap,
    pub entities: Registry<Entity>,
    #[serde(skip)]
    pub(crate) commands: CommandBuffer<Entity>,
    pub warps: Vec<Warp>,
    pub spawn_points: BTreeMap<String, (f64, f64)>,
    /// One per player, in player order.
    pub views: Vec<View>,
    pub players: Vec<EntityId>,
    /// Points earned in this room, banked into the score on a win.
    pub points: i64,
    pub time_bonus: i64,
    pub music: Option<String>,
    pub timeline: Timeline,
    pub labels: BTreeMap<TimelineId, EntityId>,
    pub phase: RoomPhase,
    pub alarms: Alarms<RoomAlarm>,
    pub won: bool,
    pub has_token: bool,
    /// Time bonus at the moment of death; paces the penalty drain.
    pub death_time_bonus: i64,
}

impl Room {
    /// Build a room from its definition. Tiles and spawns that cannot be
    /// used are logged and skipped.
    pub fn load(def: &RoomDefinition, cfg: &EngineConfig) -> Room {
        let tile_size = cfg.physics.tile_size;
        let mut tiles = TileMap::new(tile_size);
        for t in &def.tiles {
            let Some(shape) = TileShape::from_tag(&t.shape) else {
                warn!(room = %def.name, shape = %t.shape, x = t.x, y = t.y, "unknown tile shape, skipped");
                continue;
            };
            let rect = Rect::new(t.x, t.y, t.width.unwrap_or(tile_size), t.height.unwrap_or(tile_size));
            if let Err(err) = tiles.insert(rect, shape) {
                warn!(room = %def.name, %err, x = t.x, y = t.y, "bad tile, skipped");
            }
        }

        let mut room = Room {
            name: def.name.clone(),
            width: def.width,
            height: def.height,
            tiles,
            entities: Registry::new(),
            commands: CommandBuffer::default(),
            warps: Vec::new(),
            spawn_points: BTreeMap::new(),
            views: Vec::new(),
            players: Vec::new(),
            points: 0,
            time_bonus: def.time_bonus.unwrap_or(cfg.session.default_time_bonus),
            music: def.music.clone(),
            timeline: Timeline::default(),
            labels: BTreeMap::new(),
            phase: RoomPhase::Active,
            alarms: Alarms::new(),
            won: false,
            has_token: false,
            death_time_bonus: 0,
        };

        let mut players = Vec::new();
        let mut others = Vec::new();
        for rec in &def.spawns {
            let label = rec.label.as_deref().map(TimelineId::from);
            match rec.resolve(cfg) {
                Ok(Placement::Point { id, x, y }) => {
                    room.spawn_points.insert(id, (x, y));
                }
                Ok(Placement::Player { x, y, held }) => players.push((x, y, held, label)),
                Ok(Placement::Warp(w)) => room.warps.push(w),
                Ok(Placement::Entity(e)) => others.push((*e).with_label(label)),
                Err(err) => warn!(room = %def.name, %err, x = rec.x, y = rec.y, "spawn skipped"),
            }
        }
        if players.is_empty() {
            let (x, y) = room.spawn_points.values().next().copied().unwrap_or((0.0, 0.0));
            players.push((x, y, None, None));
        }

        for (number, (x, y, held, label)) in players.into_iter().enumerate() {
            let label = label.unwrap_or_else(|| match number {
                0 => TimelineId::from("player"),
                n => TimelineId(format!("player{}", n + 1)),
            });
            let id = room.entities.insert(new_player(number, x, y, cfg).with_label(Some(label)));
            room.players.push(id);
            if let Some(item) = held {
                let mut item = *item;
                item.active = true;
                let item_id = room.entities.insert(item);
                if let Err(err) = room.pickup(id, item_id) {
                    warn!(room = %def.name, %err, "starting item not held");
                }
            }
        }
        for e in others {
            room.entities.insert(e);
        }
        room.anchor_held();

        room.labels = room
            .entities
            .iter()
            .filter_map(|(id, e)| e.label.clone().map(|l| (l, id)))
            .collect();
        room.has_token = room.entities.iter().any(|(_, e)| matches!(e.variant, Variant::Token));
        if let Some(script) = &def.timeline {
            room.timeline = Timeline::compile(&script.name, &script.steps).0;
        }
        let (vw, vh) = cfg.view_size();
        room.views = room.players.iter().map(|_| View::new(vw, vh)).collect();

        debug!(
            room = %room.name,
            tiles = room.tiles.len(),
            entities = room.entities.len(),
            warps = room.warps.len(),
            "room loaded"
        );
        room
    }

    /// Enter (or re-enter) the room, placing players at `spawn` if given.
    pub fn resume(&mut self, ctx: &mut StepCtx<'_>, spawn: Option<&str>) {
        self.won = false;
        self.phase = RoomPhase::Active;
        self.alarms.clear();
        self.commands.clear();
        self.alarms.set(RoomAlarm::Timer, ctx.cfg.session.timer_frames);

        let session = &mut *ctx.session;
        let main = session.main_area.get_or_insert_with(|| self.name.clone()).clone();
        if main == self.name {
            session.level_time_bonus = self.time_bonus;
        }
        if session.is_cleared(&main) {
            session.level_timers.insert(main.clone(), 0);
        } else {
            let start = if session.levelset.contains_level(&main) {
                session.level_time_bonus
            } else {
                0
            };
            session.level_timers.entry(main.clone()).or_insert(start);
        }
        if self.has_token {
            session.tokens_available.insert(main);
        }

        let stuck = self.entities.ids_where(|e| e.is_warping());
        for id in stuck {
            self.finish_transit(id);
        }

        if let Some(spawn) = spawn {
            self.place_players(spawn);
        }

        if let Some(track) = self.music.clone() {
            self.set_music(ctx, track, CausalReason::GameRule("room_start".into()));
        }
        for n in 0..self.players.len() {
            self.center_view(ctx, n);
        }
        ctx.emit(GameEvent::new(
            EventKind::RoomEntered { room: self.name.clone() },
            SystemId::ROOM,
            CausalReason::GameRule("room_start".into()),
        ));
        info!(room = %self.name, spawn = spawn.unwrap_or("-"), "room entered");
    }

    fn place_players(&mut self, spawn: &str) {
        if let Some(&(x, y)) = self.spawn_points.get(spawn) {
            for &id in &self.players {
                if let Some(e) = self.entities.get_mut(id) {
                    e.x = x;
                    e.y = y;
                }
            }
            self.anchor_held();
            return;
        }
        let Some(n) = self.warps.iter().position(|w| w.spawn_id.as_deref() == Some(spawn)) else {
            warn!(room = %self.name, spawn, "no such spawn point");
            return;
        };
        let kind = self.warps[n].kind;
        let mouth = self.warps[n].mouth();
        for id in self.players.clone() {
            match kind {
                WarpKind::Door => {
                    if let Some(e) = self.entities.get_mut(id) {
                        set_anchor(e, mouth);
                    }
                }
                WarpKind::Pipe | WarpKind::Exit => self.arrive_through(id, n),
            }
        }
        self.anchor_held();
    }

    fn center_view(&mut self, ctx: &StepCtx<'_>, n: usize) {
        let Some(e) = self.players.get(n).and_then(|&id| self.entities.get(id)) else { return };
        let target = camera_target(e);
        if let Some(view) = self.views.get_mut(n) {
            view.center_on(&target, &ctx.cfg.camera);
            view.clamp_to(self.width, self.height);
        }
    }

    /// Bank points earned in this room. Nothing is earned replaying a
    /// cleared level.
    pub fn add_points(&mut self, ctx: &mut StepCtx<'_>, points: i64) {
        if points == 0 || ctx.session.main_cleared() {
            return;
        }
        self.points += points;
        ctx.emit(GameEvent::new(
            EventKind::PointsChanged {
                delta: points,
                total: self.points,
            },
            SystemId::ROOM,
            CausalReason::GameRule("points".into()),
        ));
    }

    pub fn player(&self, number: usize) -> Option<&Entity> {
        self.players.get(number).and_then(|&id| self.entities.get(id))
    }

    /// Rects of every view, for range checks.
    pub fn view_rects(&self) -> Vec<Rect> {
        self.views.iter().map(View::rect).collect()
    }

    // -----------------------------------------------------------------------
    // Frame
    // -----------------------------------------------------------------------

    /// Run one frame. `inputs` is indexed by player number; missing entries
    /// read as no input. Returns the spawns and despawns applied at the end.
    pub fn step(&mut self, ctx: &mut StepCtx<'_>, inputs: &[PlayerInput]) -> Vec<AppliedCommand> {
        if self.phase == RoomPhase::Completed {
            return Vec::new();
        }

        let t = Instant::now();
        let views = self.view_rects();
        let r = &ctx.cfg.ranges;
        self.tiles
            .refresh_tangibility(&views, r.tile_active_range, r.tile_grace_frames);
        for id in self.players.clone() {
            let Some(e) = self.entities.get_mut(id) else { continue };
            if !e.is_live() {
                continue;
            }
            if let Some(p) = e.player_mut() {
                if p.human {
                    p.input = inputs.get(p.number).copied().unwrap_or_default();
                }
            }
            self.player_begin(ctx, id);
        }
        ctx.end_phase("input", t);

        let t = Instant::now();
        self.update_velocities(ctx);
        ctx.end_phase("kinematics", t);

        let t = Instant::now();
        self.move_all(ctx);
        ctx.end_phase("movement", t);

        let t = Instant::now();
        self.resolve_contacts(ctx);
        self.step_thin_ice(ctx);
        for id in self.players.clone() {
            if self.entities.get(id).is_some_and(|e| e.is_live() && !e.is_warping()) {
                self.try_pipes(ctx, id);
            }
        }
        self.anchor_held();
        ctx.end_phase("interaction", t);

        let t = Instant::now();
        self.tick_entity_alarms(ctx);
        self.tick_room_alarms(ctx);
        self.advance_sequence(ctx);
        self.run_timeline(ctx);
        self.update_activation(ctx);
        self.update_poses(ctx);
        self.update_views(ctx);
        self.check_death_zone(ctx);
        for id in self.players.clone() {
            if self.entities.get(id).is_some_and(Entity::is_live) {
                self.player_after(ctx, id);
            }
        }
        ctx.end_phase("bookkeeping", t);

        let t = Instant::now();
        let applied = self.commands.apply(&mut self.entities);
        self.track_labels(&applied);
        ctx.end_phase("apply", t);
        applied
    }

    fn track_labels(&mut self, applied: &[AppliedCommand]) {
        for a in applied.iter().filter(|a| a.applied_successfully) {
            if let Some(id) = a.spawned {
                if let Some(label) = self.entities.get(id).and_then(|e| e.label.clone()) {
                    self.labels.insert(label, id);
                }
            }
            if let (true, Some(gone)) = (a.despawn, a.target) {
                self.labels.retain(|_, id| *id != gone);
            }
        }
    }

    fn tick_entity_alarms(&mut self, ctx: &mut StepCtx<'_>) {
        for id in self.entities.ids() {
            let Some(e) = self.entities.get_mut(id) else { continue };
            if e.dead {
                continue;
            }
            for alarm in e.alarms.tick(ctx.delta) {
                self.entity_alarm(ctx, id, alarm);
            }
        }
    }

    fn entity_alarm(&mut self, ctx: &mut StepCtx<'_>, id: EntityId, alarm: EntityAlarm) {
        match alarm {
            EntityAlarm::HitStun => {
                let Some(e) = self.entities.get_mut(id) else { return };
                if let Some(p) = e.player_mut() {
                    p.hitstun = false;
                }
                e.opacity = 255.0;
            }
            // The kick pose reads the alarm while it runs.
            EntityAlarm::Kick => {}
            EntityAlarm::Expire => self.destroy(id, CausalReason::Timer("expire".into())),
            EntityAlarm::Shatter => self.destroy(id, CausalReason::Timer("shatter".into())),
            EntityAlarm::ThawWarn => {
                if let Some(e) = self.entities.get_mut(id) {
                    e.alarms.set(EntityAlarm::Thaw, ctx.cfg.objects.thaw_warn_frames);
                }
            }
            EntityAlarm::Thaw => self.thaw(ctx, id),
        }
    }

    fn update_poses(&mut self, ctx: &mut StepCtx<'_>) {
        let cfg = ctx.cfg;
        let pc = &cfg.player;
        for id in self.entities.ids() {
            let Some(e) = self.entities.get_mut(id) else { continue };
            if !e.is_live() {
                continue;
            }
            let grounded = e.contact.on_floor;
            let (xv, yv) = (e.motion.xvelocity, e.motion.yvelocity);
            let pose = match e.player() {
                Some(p) => select_player_pose(&PoseInputs {
                    grounded,
                    xvelocity: xv,
                    yvelocity: yv,
                    facing: e.facing,
                    h_control: p.input.horizontal(),
                    kicking: e.alarms.is_set(EntityAlarm::Kick),
                    warping: e.is_warping(),
                    skidding: p.skidding,
                    skid_threshold: pc.skid_threshold,
                    run_speed: pc.run_speed,
                }),
                None if e.profile(cfg).movement == Movement::Static => Pose::Idle,
                None => select_pose(grounded, xv, yv),
            };
            let skid_started = pose == Pose::Skid && e.pose != Pose::Skid;
            e.pose = pose;
            if let Some(p) = e.player_mut() {
                p.skidding = pose == Pose::Skid;
            }
            if skid_started {
                ctx.emit(
                    GameEvent::sound(Sound::Skid, SystemId::KINEMATICS, CausalReason::GameRule("skid".into()))
                        .involving([id]),
                );
            }
        }
    }

    fn update_views(&mut self, ctx: &StepCtx<'_>) {
        for (n, &id) in self.players.iter().enumerate() {
            let Some(e) = self.entities.get(id) else { continue };
            if e.dead {
                continue;
            }
            let target = camera_target(e);
            if let Some(view) = self.views.get_mut(n) {
                view.follow(&target, &ctx.cfg.camera);
                view.clamp_to(self.width, self.height);
            }
        }
    }

    /// Players that fall out of their view for good die.
    fn check_death_zone(&mut self, ctx: &mut StepCtx<'_>) {
        let zone = ctx.cfg.ranges.death_zone;
        let doomed: Vec<EntityId> = self
            .players
            .iter()
            .enumerate()
            .filter_map(|(n, &id)| {
                let e = self.entities.get(id)?;
                let view = self.views.get(n)?;
                (e.is_live() && !e.is_warping() && e.bbox().top() > view.y + view.height + zone).then_some(id)
            })
            .collect();
        for id in doomed {
            self.kill_player(ctx, id, false);
        }
    }
}

fn camera_target(e: &Entity) -> CameraTarget {
    let b = e.bbox();
    CameraTarget {
        x: b.center_x(),
        y: b.bottom(),
        xvelocity: e.motion.xvelocity,
        settled: (e.contact.on_floor && e.contact.was_on_floor) || e.is_warping(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::definition::{SpawnRecord, TileRecord};
    use crate::session::Levelset;
    use rand::SeedableRng;

    /// A 640x480 room with a floor at y 448 and the given spawns.
    pub(crate) fn flat_room(spawns: Vec<SpawnRecord>) -> RoomDefinition {
        RoomDefinition {
            name: "test".into(),
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

    pub(crate) fn spawn(tag: &str, x: f64, y: f64) -> SpawnRecord {
        SpawnRecord {
            tag: tag.into(),
            x,
            y,
            label: None,
            params: BTreeMap::new(),
        }
    }

    pub(crate) struct Rig {
        pub cfg: EngineConfig,
        pub session: Session,
        pub rng: Pcg32,
        pub room: Room,
    }

    impl Rig {
        pub(crate) fn new(def: RoomDefinition) -> Self {
            let cfg = EngineConfig::default();
            let room = Room::load(&def, &cfg);
            let mut rig = Self {
                session: Session::new(Levelset::new([def.name.clone()])),
                rng: Pcg32::seed_from_u64(cfg.seed),
                cfg,
                room,
            };
            let mut ctx = StepCtx::new(&rig.cfg, &mut rig.session, &mut rig.rng, 1.0);
            rig.room.resume(&mut ctx, None);
            rig
        }

        /// Step once; returns the frame's events and requests.
        pub(crate) fn step(&mut self, input: PlayerInput) -> (Vec<GameEvent>, Vec<RoomRequest>) {
            let mut ctx = StepCtx::new(&self.cfg, &mut self.session, &mut self.rng, 1.0);
            self.room.step(&mut ctx, &[input]);
            (ctx.events, ctx.requests)
        }

        pub(crate) fn player(&self) -> &Entity {
            self.room.player(0).expect("player present")
        }
    }

    #[test]
    fn load_places_player_first_and_labels_it() {
        let rig = Rig::new(flat_room(vec![spawn("coin", 200.0, 400.0), spawn("player", 64.0, 416.0)]));
        assert_eq!(rig.room.players.len(), 1);
        assert_eq!(rig.player().x, 64.0);
        assert_eq!(rig.room.labels.get(&TimelineId::from("player")), Some(&rig.room.players[0]));
        assert_eq!(rig.room.views.len(), 1);
        assert_eq!(rig.session.main_area.as_deref(), Some("test"));
        assert_eq!(rig.session.time_bonus(), rig.cfg.session.default_time_bonus);
    }

    #[test]
    fn labelled_spawns_are_tracked() {
        let mut coin = spawn("coin", 200.0, 400.0);
        coin.label = Some("prize".into());
        let rig = Rig::new(flat_room(vec![spawn("player", 64.0, 416.0), coin]));
        let id = *rig.room.labels.get(&TimelineId::from("prize")).expect("label tracked");
        let e = rig.room.entities.get(id).unwrap();
        assert_eq!(e.variant, Variant::Coin);
        assert_eq!(e.label, Some(TimelineId::from("prize")));
        assert_eq!((e.x, e.y), (200.0, 400.0));
    }

    #[test]
    fn flowers_need_free_hands() {
        let mut rig = Rig::new(flat_room(vec![spawn("player", 64.0, 416.0), spawn("fire_flower", 64.0, 416.0)]));
        for _ in 0..5 {
            rig.step(PlayerInput::default());
        }
        let held = rig.player().held.expect("flower picked up");
        assert!(matches!(rig.room.entities.get(held).unwrap().variant, Variant::Flower { .. }));

        let mut busy = spawn("player", 64.0, 416.0);
        busy.params.insert("held".into(), serde_json::json!("spring"));
        let mut rig = Rig::new(flat_room(vec![busy, spawn("fire_flower", 64.0, 416.0)]));
        for _ in 0..5 {
            rig.step(PlayerInput::default());
        }
        let held = rig.player().held.expect("still holding");
        assert_eq!(rig.room.entities.get(held).unwrap().variant, Variant::Spring);
        let flower = rig
            .room
            .entities
            .iter()
            .find(|(_, e)| matches!(e.variant, Variant::Flower { .. }))
            .map(|(_, e)| e)
            .unwrap();
        assert!(flower.parent.is_none());
    }

    #[test]
    fn unknown_records_are_skipped() {
        let mut def = flat_room(vec![spawn("player", 64.0, 416.0), spawn("dragon", 0.0, 0.0)]);
        def.tiles.push(TileRecord {
            shape: "lava_waterfall".into(),
            x: 0.0,
            y: 0.0,
            width: None,
            height: None,
        });
        let rig = Rig::new(def);
        assert_eq!(rig.room.entities.len(), 1);
        assert_eq!(rig.room.tiles.len(), 1);
    }

    #[test]
    fn player_falls_and_lands_on_floor() {
        let mut rig = Rig::new(flat_room(vec![spawn("player", 64.0, 300.0)]));
        for _ in 0..120 {
            rig.step(PlayerInput::default());
        }
        let p = rig.player();
        assert!(p.contact.on_floor);
        assert!((p.bbox().bottom() - 448.0).abs() < 1e-6);
        assert_eq!(p.motion.yvelocity, 0.0);
    }

    #[test]
    fn phase_timings_are_recorded_in_order() {
        let mut rig = Rig::new(flat_room(vec![spawn("player", 64.0, 416.0)]));
        let mut ctx = StepCtx::new(&rig.cfg, &mut rig.session, &mut rig.rng, 1.0);
        rig.room.step(&mut ctx, &[]);
        let names: Vec<&str> = ctx.timings.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["input", "kinematics", "movement", "interaction", "bookkeeping", "apply"]);
    }

    #[test]
    fn falling_out_of_the_room_kills() {
        let mut def = flat_room(vec![spawn("player", 64.0, 100.0)]);
        def.tiles.clear();
        let mut rig = Rig::new(def);
        let mut failed = false;
        for _ in 0..300 {
            let (events, _) = rig.step(PlayerInput::default());
            failed |= events.iter().any(|e| matches!(e.kind, EventKind::LevelFailed { .. }));
        }
        assert!(failed);
        assert!(rig.room.player(0).is_none());
        assert!(!matches!(rig.room.phase, RoomPhase::Active));
    }
}

//! Pipes, doors and path-following transit.
//!
//! A [`Warp`] is a polyline anchored at its mouth. A traveller enters the
//! mouth, is hidden while following the path at the configured warp speed,
//! and either leaves through the far end of the same room or, if the warp
//! has a destination, hands off to the game driver for a room transition.
//!
//! Positions along a path are *anchors*: the bottom-center point of the
//! traveller's bounding box.
//!
//! # Destinations
//!
//! ```
//! use floe_engine::warp::{Destination, LevelRef};
//!
//! let d: Destination = "level2:start".parse().unwrap();
//! assert_eq!(
//!     d,
//!     Destination::Level { level: LevelRef::Named("level2".into()), spawn: Some("start".into()) }
//! );
//! assert_eq!("__map__".parse::<Destination>().unwrap(), Destination::Map);
//! assert!("level2".parse::<Destination>().is_err());
//! ```

use std::fmt;
use std::str::FromStr;

use floe_journal::prelude::*;
use floe_world::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::collision::CONTACT_EPSILON;
use crate::entity::Entity;
use crate::room::{Room, RoomRequest, StepCtx};

const MAP_SENTINEL: &str = "__map__";
const MAIN_SENTINEL: &str = "__main__";

// ---------------------------------------------------------------------------
// Destination
// ---------------------------------------------------------------------------

/// A destination string failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DestinationError {
    #[error("empty warp destination")]
    Empty,

    #[error("destination {dest:?} has no ':' and is not a sentinel")]
    MissingSeparator { dest: String },

    #[error("destination {dest:?} names no level")]
    EmptyLevel { dest: String },

    #[error("destination {dest:?} names no spawn")]
    EmptySpawn { dest: String },
}

/// The level half of a destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelRef {
    /// The main area of the level in progress.
    Main,
    Named(String),
}

/// Where a warp leads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Destination {
    /// Back to the current worldmap.
    Map,
    Level { level: LevelRef, spawn: Option<String> },
}

impl Destination {
    pub fn parse(dest: &str) -> Result<Destination, DestinationError> {
        let dest = dest.trim();
        if dest.is_empty() {
            return Err(DestinationError::Empty);
        }
        if dest == MAP_SENTINEL {
            return Ok(Destination::Map);
        }
        if dest == MAIN_SENTINEL {
            return Ok(Destination::Level {
                level: LevelRef::Main,
                spawn: None,
            });
        }
        let Some((level, spawn)) = dest.split_once(':') else {
            return Err(DestinationError::MissingSeparator { dest: dest.to_owned() });
        };
        if level.is_empty() {
            return Err(DestinationError::EmptyLevel { dest: dest.to_owned() });
        }
        if spawn.is_empty() {
            return Err(DestinationError::EmptySpawn { dest: dest.to_owned() });
        }
        let level = if level == MAIN_SENTINEL {
            LevelRef::Main
        } else {
            LevelRef::Named(level.to_owned())
        };
        Ok(Destination::Level {
            level,
            spawn: Some(spawn.to_owned()),
        })
    }
}

impl FromStr for Destination {
    type Err = DestinationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Destination::parse(s)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Map => f.write_str(MAP_SENTINEL),
            Destination::Level { level, spawn } => {
                match level {
                    LevelRef::Main => f.write_str(MAIN_SENTINEL)?,
                    LevelRef::Named(name) => f.write_str(name)?,
                }
                match spawn {
                    Some(spawn) => write!(f, ":{spawn}"),
                    None => Ok(()),
                }
            }
        }
    }
}

/// Prefix a bare spawn id with `room`, as checkpoints do.
pub fn qualify(dest: &str, room: &str) -> String {
    if dest.contains(':') {
        dest.to_owned()
    } else {
        format!("{room}:{dest}")
    }
}

// ---------------------------------------------------------------------------
// Warp
// ---------------------------------------------------------------------------

/// How a warp is entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarpKind {
    /// Entered by pushing into its mouth.
    Pipe,
    /// Entered by pressing up in front of it.
    Door,
    /// Only ever used as an arrival point.
    Exit,
}

fn opposite(d: Direction) -> Direction {
    match d {
        Direction::Left => Direction::Right,
        Direction::Right => Direction::Left,
        Direction::Up => Direction::Down,
        Direction::Down => Direction::Up,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warp {
    pub kind: WarpKind,
    /// Absolute path; the first point is the mouth.
    pub path: Vec<(f64, f64)>,
    pub dest: Option<String>,
    pub spawn_id: Option<String>,
    /// Direction of travel into the mouth.
    pub direction: Direction,
    /// Direction of travel out of the far end.
    pub end_direction: Direction,
}

impl Warp {
    /// Build a warp at `(x, y)` from path points relative to it. The mouth
    /// is always the first point.
    pub fn new(
        kind: WarpKind,
        x: f64,
        y: f64,
        points: &[(f64, f64)],
        dest: Option<String>,
        spawn_id: Option<String>,
    ) -> Warp {
        let mut path = vec![(x, y)];
        path.extend(
            points
                .iter()
                .filter(|p| **p != (0.0, 0.0))
                .map(|(px, py)| (x + px, y + py)),
        );
        let segment = |a: (f64, f64), b: (f64, f64)| Direction::dominant(b.0 - a.0, b.1 - a.1);
        let direction = path
            .windows(2)
            .find_map(|w| segment(w[0], w[1]))
            .unwrap_or(Direction::Right);
        let end_direction = path
            .windows(2)
            .rev()
            .find_map(|w| segment(w[0], w[1]))
            .unwrap_or(direction);
        Warp {
            kind,
            path,
            dest: dest.filter(|d| !d.trim().is_empty()),
            spawn_id,
            direction,
            end_direction,
        }
    }

    pub fn mouth(&self) -> (f64, f64) {
        self.path[0]
    }

    pub fn end(&self) -> (f64, f64) {
        self.path[self.path.len() - 1]
    }

    /// Whether arriving at the far end leaves the room.
    pub fn leaves_room(&self) -> bool {
        self.dest.is_some()
    }

    /// Whether `bbox`, pushing in `dir`, sits in the mouth closely enough to
    /// enter. Horizontal mouths align on the floor line, vertical mouths on
    /// the center line.
    pub fn accepts(&self, bbox: &Rect, dir: Direction, lax: f64) -> bool {
        if self.kind != WarpKind::Pipe || self.direction != dir {
            return false;
        }
        let (mx, my) = self.mouth();
        let flush = |a: f64, b: f64| (a - b).abs() <= CONTACT_EPSILON;
        match dir {
            Direction::Right => flush(bbox.right(), mx) && (bbox.bottom() - my).abs() < lax,
            Direction::Left => flush(bbox.left(), mx) && (bbox.bottom() - my).abs() < lax,
            Direction::Down => flush(bbox.bottom(), my) && (bbox.center_x() - mx).abs() < lax,
            Direction::Up => flush(bbox.top(), my) && (bbox.center_x() - mx).abs() < lax,
        }
    }
}

/// The part of `bbox` outside a pipe whose mouth is at `mouth` and whose
/// body lies in direction `inward`.
pub fn clip(bbox: &Rect, mouth: (f64, f64), inward: Direction) -> Rect {
    let (mx, my) = mouth;
    let (mut l, mut t, mut r, mut b) = (bbox.left(), bbox.top(), bbox.right(), bbox.bottom());
    match inward {
        Direction::Right => r = r.min(mx),
        Direction::Left => l = l.max(mx),
        Direction::Down => b = b.min(my),
        Direction::Up => t = t.max(my),
    }
    Rect::new(l, t, (r - l).max(0.0), (b - t).max(0.0))
}

// ---------------------------------------------------------------------------
// Transit
// ---------------------------------------------------------------------------

/// Where a traveller is in its trip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TransitPhase {
    /// Sliding into the mouth.
    Entering,
    /// Hidden, heading for path point `target`.
    Following { target: usize },
    /// Waiting at the end for the game driver to switch rooms.
    Departing,
    /// Sliding out of the far end.
    Exiting,
    /// Inside a door.
    Door { remaining: f64 },
}

/// An entity's trip through the warp at index `warp` of its room.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transit {
    pub warp: usize,
    pub phase: TransitPhase,
}

fn anchor(e: &Entity) -> (f64, f64) {
    let b = e.bbox();
    (b.center_x(), b.bottom())
}

pub(crate) fn set_anchor(e: &mut Entity, (ax, ay): (f64, f64)) {
    e.set_bbox_left(ax - e.hitbox.width / 2.0);
    e.set_bbox_bottom(ay);
}

/// Move `from` toward `to` by at most `step`; returns the new point and
/// whether it arrived.
fn approach(from: (f64, f64), to: (f64, f64), step: f64) -> ((f64, f64), bool) {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let dist = dx.hypot(dy);
    if dist <= step || dist == 0.0 {
        (to, true)
    } else {
        let k = step / dist;
        ((from.0 + dx * k, from.1 + dy * k), false)
    }
}

// ---------------------------------------------------------------------------
// Room integration
// ---------------------------------------------------------------------------

impl Room {
    /// Start `id` through the pipe at `warp`.
    pub fn enter_warp(&mut self, ctx: &mut StepCtx<'_>, id: EntityId, warp: usize) {
        let Some(e) = self.entities.get_mut(id) else { return };
        e.stop();
        e.visible = false;
        e.tangible = false;
        e.contact.leave_floor();
        e.transit = Some(Transit {
            warp,
            phase: TransitPhase::Entering,
        });
        debug!(entity = %id, warp, "entering warp");
        ctx.emit(
            GameEvent::sound(Sound::Pipe, SystemId::WARP, CausalReason::GameRule("warp_enter".into()))
                .involving([id]),
        );
        self.stash_held(id);
    }

    /// Start `id` through a door.
    pub fn enter_door(&mut self, ctx: &mut StepCtx<'_>, id: EntityId, warp: usize) {
        let Some(e) = self.entities.get_mut(id) else { return };
        e.stop();
        e.visible = false;
        e.tangible = false;
        e.transit = Some(Transit {
            warp,
            phase: TransitPhase::Door {
                remaining: ctx.cfg.objects.door_frames,
            },
        });
        ctx.emit(
            GameEvent::sound(Sound::Door, SystemId::WARP, CausalReason::GameRule("door".into()))
                .involving([id]),
        );
        self.stash_held(id);
    }

    /// Place `id` at the mouth of `warp` and send it along the path, as when
    /// arriving in a room through a warp spawn.
    pub fn arrive_through(&mut self, id: EntityId, warp: usize) {
        let Some(start) = self.warps.get(warp).map(Warp::mouth) else { return };
        let Some(e) = self.entities.get_mut(id) else { return };
        e.stop();
        e.visible = false;
        e.tangible = false;
        set_anchor(e, start);
        e.transit = Some(Transit {
            warp,
            phase: TransitPhase::Following { target: 1 },
        });
        self.stash_held(id);
    }

    /// Give up on leaving the room: come out of the far end instead.
    pub fn abort_transit(&mut self, id: EntityId) {
        let Some(transit) = self.entities.get(id).and_then(|e| e.transit) else { return };
        self.begin_exit(id, transit.warp);
    }

    fn begin_exit(&mut self, id: EntityId, warp: usize) {
        let Some(w) = self.warps.get(warp) else { return };
        let (ex, ey) = w.end();
        let dir = w.end_direction;
        let Some(e) = self.entities.get_mut(id) else { return };
        match dir {
            Direction::Left => {
                e.set_bbox_left(ex);
                e.set_bbox_bottom(ey);
            }
            Direction::Right => {
                e.set_bbox_right(ex);
                e.set_bbox_bottom(ey);
            }
            Direction::Up => {
                e.set_bbox_top(ey);
                e.set_bbox_left(ex - e.hitbox.width / 2.0);
            }
            Direction::Down => {
                e.set_bbox_bottom(ey);
                e.set_bbox_left(ex - e.hitbox.width / 2.0);
            }
        }
        e.transit = Some(Transit {
            warp,
            phase: TransitPhase::Exiting,
        });
    }

    pub(crate) fn finish_transit(&mut self, id: EntityId) {
        let Some(e) = self.entities.get_mut(id) else { return };
        e.transit = None;
        e.visible = true;
        e.tangible = true;
        e.stop();
        self.unstash_held(id);
    }

    /// Advance one traveller by a frame.
    pub(crate) fn advance_transit(&mut self, ctx: &mut StepCtx<'_>, id: EntityId) {
        let Some(transit) = self.entities.get(id).and_then(|e| e.transit) else { return };
        let Some(warp) = self.warps.get(transit.warp).cloned() else {
            self.finish_transit(id);
            return;
        };
        let step = ctx.cfg.lax.warp_speed * ctx.delta;

        match transit.phase {
            TransitPhase::Entering => {
                let (ux, uy) = warp.direction.unit();
                let (mx, my) = warp.mouth();
                let Some(e) = self.entities.get_mut(id) else { return };
                e.x += ux * step;
                e.y += uy * step;
                let b = e.bbox();
                let inside = match warp.direction {
                    Direction::Right => b.left() >= mx,
                    Direction::Left => b.right() <= mx,
                    Direction::Down => b.top() >= my,
                    Direction::Up => b.bottom() <= my,
                };
                if inside {
                    set_anchor(e, warp.mouth());
                    e.transit = Some(Transit {
                        phase: TransitPhase::Following { target: 1 },
                        ..transit
                    });
                }
            }
            TransitPhase::Following { target } => {
                let Some(e) = self.entities.get_mut(id) else { return };
                let mut target = target;
                let mut budget = step;
                let mut pos = anchor(e);
                while target < warp.path.len() && budget > 0.0 {
                    let goal = warp.path[target];
                    let before = pos;
                    let (next, arrived) = approach(pos, goal, budget);
                    budget -= (next.0 - before.0).hypot(next.1 - before.1);
                    pos = next;
                    if !arrived {
                        break;
                    }
                    target += 1;
                }
                set_anchor(e, pos);
                if target < warp.path.len() {
                    e.transit = Some(Transit {
                        phase: TransitPhase::Following { target },
                        ..transit
                    });
                    return;
                }
                self.arrive(ctx, id, &warp, transit.warp);
            }
            TransitPhase::Departing => {}
            TransitPhase::Exiting => {
                let (ux, uy) = warp.end_direction.unit();
                let (ex, ey) = warp.end();
                let Some(e) = self.entities.get_mut(id) else { return };
                e.x += ux * step;
                e.y += uy * step;
                let b = e.bbox();
                let out = match warp.end_direction {
                    Direction::Left => b.right() <= ex,
                    Direction::Right => b.left() >= ex,
                    Direction::Up => b.bottom() <= ey,
                    Direction::Down => b.top() >= ey,
                };
                if out {
                    match warp.end_direction {
                        Direction::Left => e.set_bbox_right(ex),
                        Direction::Right => e.set_bbox_left(ex),
                        Direction::Up => e.set_bbox_bottom(ey),
                        Direction::Down => e.set_bbox_top(ey),
                    }
                    self.finish_transit(id);
                }
            }
            TransitPhase::Door { remaining } => {
                let remaining = remaining - ctx.delta;
                if remaining > 0.0 {
                    if let Some(e) = self.entities.get_mut(id) {
                        e.transit = Some(Transit {
                            phase: TransitPhase::Door { remaining },
                            ..transit
                        });
                    }
                } else if let Some(dest) = warp.dest.clone() {
                    self.depart(ctx, id, dest, transit.warp);
                } else {
                    self.finish_transit(id);
                }
            }
        }
    }

    fn arrive(&mut self, ctx: &mut StepCtx<'_>, id: EntityId, warp: &Warp, index: usize) {
        match &warp.dest {
            Some(dest) => self.depart(ctx, id, dest.clone(), index),
            None => {
                ctx.emit(
                    GameEvent::sound(Sound::Pipe, SystemId::WARP, CausalReason::GameRule("warp_exit".into()))
                        .involving([id]),
                );
                self.begin_exit(id, index);
            }
        }
    }

    fn depart(&mut self, ctx: &mut StepCtx<'_>, id: EntityId, dest: String, index: usize) {
        if let Some(e) = self.entities.get_mut(id) {
            e.transit = Some(Transit {
                warp: index,
                phase: TransitPhase::Departing,
            });
        }
        ctx.requests.push(RoomRequest::Warp { dest, traveller: id });
    }

    /// Clip rectangle for a traveller in the mouth or the far end.
    pub fn transit_clip(&self, e: &Entity) -> Option<Rect> {
        let transit = e.transit?;
        let warp = self.warps.get(transit.warp)?;
        match transit.phase {
            TransitPhase::Entering => Some(clip(&e.bbox(), warp.mouth(), warp.direction)),
            TransitPhase::Exiting => Some(clip(&e.bbox(), warp.end(), opposite(warp.end_direction))),
            _ => None,
        }
    }

    /// Try every pipe `id` could be pushing into this frame.
    pub(crate) fn try_pipes(&mut self, ctx: &mut StepCtx<'_>, id: EntityId) {
        let Some(e) = self.entities.get(id) else { return };
        let Some(p) = e.player() else { return };
        if e.is_warping() {
            return;
        }
        let bbox = e.bbox();
        let h = p.input.horizontal();
        let v = p.input.vertical();
        let xv = e.motion.xvelocity;
        let yv = e.motion.yvelocity;
        let lax = ctx.cfg.lax.warp_lax;
        let mut wanted = Vec::new();
        if h > 0.0 && xv >= 0.0 {
            wanted.push(Direction::Right);
        } else if h < 0.0 && xv <= 0.0 {
            wanted.push(Direction::Left);
        }
        if v > 0.0 && yv >= 0.0 {
            wanted.push(Direction::Down);
        } else if v < 0.0 && yv <= 0.0 {
            wanted.push(Direction::Up);
        }
        for dir in wanted {
            let found = self.warps.iter().position(|w| w.accepts(&bbox, dir, lax));
            if let Some(index) = found {
                let (mx, my) = self.warps[index].mouth();
                if let Some(e) = self.entities.get_mut(id) {
                    if dir.is_horizontal() {
                        e.set_bbox_bottom(my);
                    } else {
                        e.set_bbox_left(mx - e.hitbox.width / 2.0);
                    }
                }
                self.enter_warp(ctx, id, index);
                return;
            }
        }
    }

    /// Press up in front of a door.
    pub(crate) fn try_door(&mut self, ctx: &mut StepCtx<'_>, id: EntityId) {
        let Some(e) = self.entities.get(id) else { return };
        if e.is_warping() || !(e.contact.on_floor && e.contact.was_on_floor) {
            return;
        }
        let bbox = e.bbox();
        let lax = ctx.cfg.lax.warp_lax;
        let door = self
            .warps
            .iter()
            .enumerate()
            .filter(|(_, w)| w.kind == WarpKind::Door)
            .filter(|(_, w)| {
                let (dx, dy) = w.mouth();
                (bbox.bottom() - dy).abs() <= CONTACT_EPSILON && (bbox.center_x() - dx).abs() <= lax
            })
            .min_by(|(_, a), (_, b)| {
                let da = (a.mouth().0 - bbox.center_x()).abs();
                let db = (b.mouth().0 - bbox.center_x()).abs();
                da.total_cmp(&db)
            })
            .map(|(i, w)| (i, w.mouth().0));
        if let Some((index, door_x)) = door {
            if let Some(e) = self.entities.get_mut(id) {
                e.set_bbox_left(door_x - e.hitbox.width / 2.0);
            }
            self.enter_door(ctx, id, index);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_level_and_spawn() {
        let d = Destination::parse("level2:start").unwrap();
        assert_eq!(
            d,
            Destination::Level {
                level: LevelRef::Named("level2".into()),
                spawn: Some("start".into()),
            }
        );
        assert_eq!(d.to_string(), "level2:start");
    }

    #[test]
    fn sentinels() {
        assert_eq!(Destination::parse("__map__").unwrap(), Destination::Map);
        assert_eq!(
            Destination::parse("__main__").unwrap(),
            Destination::Level { level: LevelRef::Main, spawn: None }
        );
        assert_eq!(
            Destination::parse("__main__:door").unwrap(),
            Destination::Level { level: LevelRef::Main, spawn: Some("door".into()) }
        );
    }

    #[test]
    fn rejects_malformed() {
        assert_eq!(Destination::parse("  "), Err(DestinationError::Empty));
        assert!(matches!(
            Destination::parse("level2"),
            Err(DestinationError::MissingSeparator { .. })
        ));
        assert!(matches!(Destination::parse(":x"), Err(DestinationError::EmptyLevel { .. })));
        assert!(matches!(Destination::parse("l:"), Err(DestinationError::EmptySpawn { .. })));
    }

    #[test]
    fn qualify_prefixes_bare_spawns() {
        assert_eq!(qualify("cp1", "forest"), "forest:cp1");
        assert_eq!(qualify("cave:cp1", "forest"), "cave:cp1");
    }

    #[test]
    fn directions_come_from_first_and_last_segments() {
        let w = Warp::new(
            WarpKind::Pipe,
            100.0,
            64.0,
            &[(0.0, 0.0), (64.0, 0.0), (64.0, -128.0)],
            None,
            None,
        );
        assert_eq!(w.direction, Direction::Right);
        assert_eq!(w.end_direction, Direction::Up);
        assert_eq!(w.end(), (164.0, -64.0));
    }

    #[test]
    fn single_point_warp_defaults_right() {
        let w = Warp::new(WarpKind::Exit, 0.0, 0.0, &[], None, Some("s".into()));
        assert_eq!(w.direction, Direction::Right);
        assert_eq!(w.end_direction, Direction::Right);
        assert_eq!(w.path.len(), 1);
    }

    #[test]
    fn clip_keeps_outside_part() {
        let bbox = Rect::new(90.0, 0.0, 20.0, 30.0);
        assert_eq!(clip(&bbox, (100.0, 30.0), Direction::Right), Rect::new(90.0, 0.0, 10.0, 30.0));
        assert_eq!(clip(&bbox, (100.0, 30.0), Direction::Left), Rect::new(100.0, 0.0, 10.0, 30.0));
        assert_eq!(clip(&bbox, (100.0, 10.0), Direction::Down).height, 10.0);
        assert_eq!(clip(&bbox, (200.0, 30.0), Direction::Right).width, 20.0);
    }

    #[test]
    fn pipes_accept_flush_aligned_movers() {
        let w = Warp::new(WarpKind::Pipe, 200.0, 96.0, &[(64.0, 0.0)], None, None);
        let flush = Rect::new(180.0, 66.0, 20.0, 30.0);
        assert!(w.accepts(&flush, Direction::Right, 12.0));
        assert!(!w.accepts(&flush, Direction::Left, 12.0));
        let high = Rect::new(180.0, 40.0, 20.0, 30.0);
        assert!(!w.accepts(&high, Direction::Right, 12.0));
        let door = Warp::new(WarpKind::Door, 200.0, 96.0, &[], None, None);
        assert!(!door.accepts(&flush, Direction::Right, 12.0));
    }
}

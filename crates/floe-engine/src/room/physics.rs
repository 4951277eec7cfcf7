//! Per-frame movement: velocity setup, swept moves and activation.

use floe_world::prelude::*;

use crate::camera::View;
use crate::collision::{ceiling_lax, sweep_x, sweep_y, touching, Blocker, BlockerRef, Geometry, Sweep};
use crate::entity::{Entity, Movement, Profile, Variant};
use crate::interaction::thin_ice::IceState;
use crate::kinematics::slide_speed;

use super::{Room, StepCtx};

/// A thrown block slower than this has come to rest.
const SETTLE_SPEED: f64 = 0.05;

/// Gravity, floor snapping and slope sliding for anything that walks or
/// falls.
fn ground_motion(e: &mut Entity, prof: &Profile, gravity: f64) {
    let m = &mut e.motion;
    m.xacceleration = 0.0;
    if e.contact.on_floor {
        m.yacceleration = 0.0;
        m.xdeceleration = prof.floor_friction;
        match e.contact.slope {
            Some(ratio) => m.yvelocity = slide_speed(prof.slide_speed, ratio, 1.0),
            None => m.yvelocity = m.yvelocity.min(0.0),
        }
    } else {
        m.xdeceleration = 0.0;
        m.fall(gravity, prof.fall_speed);
    }
    if prof.movement == Movement::Walking {
        m.xvelocity = prof.walk_speed * e.facing;
    }
}

fn hover(e: &mut Entity, prof: &Profile, range: f64) {
    let y = e.y;
    if let Variant::FlyingSnowball { home_y, heading } = &mut e.variant {
        if y <= *home_y - range {
            *heading = 1.0;
        } else if y >= *home_y + range {
            *heading = -1.0;
        }
        let heading = *heading;
        e.motion = Default::default();
        e.motion.yvelocity = prof.walk_speed * heading;
    }
}

/// Solid entities as collision blockers.
fn solid_blocker(id: EntityId, e: &Entity) -> Option<Blocker> {
    let shattering = matches!(e.variant, Variant::ThinIce(IceState { shattering: true, .. }));
    (e.is_live() && e.tangible && e.capabilities().solid && !shattering).then(|| Blocker {
        rect: e.bbox(),
        shape: TileShape::Solid,
        source: BlockerRef::Entity(id),
    })
}

/// Sources of the blockers that stopped a move on one side.
fn sources(list: &[Blocker], hit: Option<Blocker>) -> Vec<BlockerRef> {
    let mut refs: Vec<BlockerRef> = list.iter().map(|b| b.source).collect();
    if let Some(h) = hit {
        if !refs.contains(&h.source) {
            refs.push(h.source);
        }
    }
    refs
}

impl Room {
    pub(crate) fn solid_blockers(&self) -> Vec<Blocker> {
        self.entities.iter().filter_map(|(id, e)| solid_blocker(id, e)).collect()
    }

    /// Set up this frame's velocity for everything that moves on its own.
    pub(crate) fn update_velocities(&mut self, ctx: &mut StepCtx<'_>) {
        let cfg = ctx.cfg;
        for id in self.entities.ids() {
            let Some(e) = self.entities.get_mut(id) else { continue };
            if !e.is_live() || !e.active || e.parent.is_some() || e.is_warping() {
                continue;
            }
            let prof = e.profile(cfg);
            let gravity = e.gravity(cfg);
            match prof.movement {
                Movement::Player | Movement::Static => {}
                Movement::Straight => {
                    e.motion.xacceleration = 0.0;
                    e.motion.yacceleration = 0.0;
                }
                Movement::Ragdoll => {
                    e.motion.xdeceleration = 0.0;
                    e.motion.fall(gravity, prof.fall_speed);
                }
                Movement::Hovering => hover(e, &prof, cfg.enemy.flying_range),
                Movement::Falling | Movement::Walking => ground_motion(e, &prof, gravity),
            }
            if matches!(e.variant, Variant::ThrownIceblock)
                && e.contact.on_floor
                && e.motion.xvelocity.abs() <= SETTLE_SPEED
            {
                e.become_variant(Variant::FlatIceblock);
                e.stop();
                e.thrower = None;
            }
        }
        self.turn_at_ledges(ctx);
    }

    /// Walkers that keep to their platform turn when the next step has no
    /// floor under it.
    fn turn_at_ledges(&mut self, ctx: &StepCtx<'_>) {
        let cfg = ctx.cfg;
        let solids = self.solid_blockers();
        let turning: Vec<EntityId> = {
            let geo = Geometry::new(&self.tiles, &solids);
            self.entities
                .iter()
                .filter(|(_, e)| {
                    let prof = e.profile(cfg);
                    e.is_live()
                        && e.active
                        && e.parent.is_none()
                        && e.contact.on_floor
                        && prof.stay_on_platform
                        && prof.movement == Movement::Walking
                })
                .filter(|(id, e)| {
                    let b = e.bbox();
                    let foot = if e.facing > 0.0 { b.right() } else { b.left() - 1.0 };
                    let probe = Rect::new(foot, b.bottom(), 1.0, 1.0);
                    !geo.excluding(*id)
                        .gather(&probe)
                        .iter()
                        .any(|k| k.shape.blocks(Side::Top) || k.shape.is_floor_slope())
                })
                .map(|(id, _)| id)
                .collect()
        };
        for id in turning {
            if let Some(e) = self.entities.get_mut(id) {
                e.facing = -e.facing;
                e.motion.xvelocity = e.profile(cfg).walk_speed * e.facing;
            }
        }
    }

    /// Move every awake entity, and every traveller along its warp.
    pub(crate) fn move_all(&mut self, ctx: &mut StepCtx<'_>) {
        let solids = self.solid_blockers();
        for id in self.entities.ids() {
            let Some(e) = self.entities.get(id) else { continue };
            if !e.is_live() || e.parent.is_some() {
                continue;
            }
            if e.is_warping() {
                self.advance_transit(ctx, id);
                continue;
            }
            if !e.active || e.profile(ctx.cfg).movement == Movement::Static {
                continue;
            }
            self.move_one(ctx, id, &solids);
        }
    }

    /// Integrate `id`'s motion and sweep it: horizontally first (climbing or
    /// hugging slopes), then vertically. A player whose rise is cut by a
    /// ceiling corner gets nudged around it.
    fn move_one(&mut self, ctx: &mut StepCtx<'_>, id: EntityId, solids: &[Blocker]) {
        let cfg = ctx.cfg;
        let Some(e) = self.entities.get_mut(id) else { return };
        let movement = e.profile(cfg).movement;
        let (dx, dy) = e.motion.integrate(ctx.delta);

        if movement == Movement::Ragdoll {
            e.x += dx;
            e.y += dy;
            e.last_move = (dx, dy);
            if e.bbox().top() > self.height {
                self.destroy(id, CausalReason::GameRule("fell_off_stage".into()));
            }
            return;
        }

        let geo = Geometry::new(&self.tiles, solids).excluding(id);
        let start = e.bbox();
        let sticky = e.contact.on_floor && dy >= 0.0;
        let sx = sweep_x(&geo, &start, dx, sticky);
        let mut bbox = start.translated(sx.moved, sx.lift);
        let mut sy = sweep_y(&geo, &bbox, dy);
        bbox = bbox.translated(0.0, sy.moved);

        if dy < 0.0 && sy.hit.is_some() && e.variant.is_player() {
            if let Some(shift) = ceiling_lax(&geo, &bbox, cfg.lax.ceiling_lax) {
                let shifted = bbox.translated(shift, 0.0);
                let rest = sweep_y(&geo, &shifted, dy - sy.moved);
                bbox = shifted.translated(0.0, rest.moved);
                sy = Sweep {
                    moved: sy.moved + rest.moved,
                    lift: 0.0,
                    hit: rest.hit,
                };
            }
        }

        let moved = (bbox.left() - start.left(), bbox.top() - start.top());
        e.x += moved.0;
        e.y += moved.1;
        e.last_move = moved;
        if sx.hit.is_some() {
            e.motion.stop_horizontal();
        }
        if sy.hit.is_some() {
            e.motion.stop_vertical();
        }

        let bbox = e.bbox();
        let t = touching(&geo, &bbox);
        e.contact.advance(t.on_floor(), t.slope().map(Blocker::slope_ratio), t.floor_refs());

        let mut stops = Vec::new();
        if sx.hit.is_some() {
            let (side, list) = if dx > 0.0 { (Side::Right, &t.right) } else { (Side::Left, &t.left) };
            stops.push((side, sources(list, sx.hit)));
        }
        if sy.hit.is_some() {
            let (side, list) = if dy > 0.0 { (Side::Bottom, &t.bottom) } else { (Side::Top, &t.top) };
            stops.push((side, sources(list, sy.hit)));
        }

        let mut hazards: Vec<TileId> = Vec::new();
        let mut triggers = Vec::new();
        if e.tangible {
            for (side, list) in [(Side::Left, &t.left), (Side::Right, &t.right), (Side::Top, &t.top), (Side::Bottom, &t.bottom)] {
                for b in list {
                    if let BlockerRef::Tile(tile) = b.source {
                        if b.shape.hazard_face() == Some(side.opposite()) && !hazards.contains(&tile) {
                            hazards.push(tile);
                        }
                    }
                }
            }
            triggers = geo.triggers(&bbox);
        }
        let is_player = e.variant.is_player();

        for (side, walls) in stops {
            self.stop_side(ctx, id, side, &walls);
        }
        for _ in hazards {
            self.touch_hurt(ctx, id);
        }
        for (_, shape) in triggers {
            match shape {
                TileShape::Death => self.touch_death(ctx, id),
                TileShape::LevelEnd if is_player => self.win_level(ctx, id),
                _ => {}
            }
        }
    }

    /// Wake what the views come near, put the rest to sleep, and drop
    /// anything that fell out of the room.
    pub(crate) fn update_activation(&mut self, ctx: &mut StepCtx<'_>) {
        let cfg = ctx.cfg;
        let views: Vec<Rect> = self.views.iter().map(View::rect).collect();
        let mut doomed = Vec::new();
        for id in self.entities.ids() {
            let Some(e) = self.entities.get_mut(id) else { continue };
            if !e.is_live() || e.variant.is_player() || e.parent.is_some() || e.is_warping() {
                continue;
            }
            let prof = e.profile(cfg);
            if prof.movement == Movement::Ragdoll {
                continue;
            }
            let caps = e.capabilities();
            let b = e.bbox();
            if caps.killed_by_void && b.top() > self.height + prof.active_range {
                doomed.push((id, "void"));
                continue;
            }
            if caps.always_active {
                continue;
            }
            if views.iter().any(|v| v.expanded(prof.active_range).overlaps(&b)) {
                e.active = true;
            } else if e.active {
                match e.variant {
                    Variant::DashingIceblock
                    | Variant::ThrownIceblock
                    | Variant::Fireball
                    | Variant::IceBullet
                    | Variant::ThrownFlower { .. } => doomed.push((id, "out_of_range")),
                    _ => e.active = false,
                }
            }
        }
        for (id, why) in doomed {
            self.destroy(id, CausalReason::GameRule(why.into()));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

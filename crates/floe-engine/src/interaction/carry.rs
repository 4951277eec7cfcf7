//! Picking things up, putting them down, kicking and throwing them.
//!
//! The carry link is stored on both ends: `item.parent` and
//! `carrier.held`. Every operation here updates both or neither, so an
//! item's parent is set exactly when one carrier holds it.

use floe_journal::prelude::*;
use floe_world::prelude::*;
use tracing::debug;

use crate::entity::{Element, Entity, EntityAlarm, Variant};
use crate::kinematics::jump_speed;
use crate::room::{Room, StepCtx};

/// Horizontal distance from the carrier's origin to a held item's.
const HOLD_OFFSET: f64 = 16.0;
/// Where held items wait while their carrier is inside a warp.
const OFF_STAGE: f64 = -666.0;

/// A pickup was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CarryError {
    #[error("{carrier} is already holding {held}")]
    CarrierBusy { carrier: EntityId, held: EntityId },

    #[error("{item} is already held by {parent}")]
    AlreadyHeld { item: EntityId, parent: EntityId },

    #[error("{item} cannot be carried")]
    NotCarryable { item: EntityId },

    #[error("{entity} is gone")]
    Dead { entity: EntityId },
}

impl Room {
    /// Have `carrier` take hold of `item`.
    pub fn pickup(&mut self, carrier: EntityId, item: EntityId) -> Result<(), CarryError> {
        let Some((c, i)) = self.entities.get_pair_mut(carrier, item) else {
            let entity = if self.entities.contains(carrier) { item } else { carrier };
            return Err(CarryError::Dead { entity });
        };
        if !c.is_live() {
            return Err(CarryError::Dead { entity: carrier });
        }
        if !i.is_live() {
            return Err(CarryError::Dead { entity: item });
        }
        if let Some(held) = c.held {
            return Err(CarryError::CarrierBusy { carrier, held });
        }
        if let Some(parent) = i.parent {
            return Err(CarryError::AlreadyHeld { item, parent });
        }
        if !i.capabilities().carryable {
            return Err(CarryError::NotCarryable { item });
        }
        c.held = Some(item);
        i.parent = Some(carrier);
        i.visible = false;
        i.tangible = false;
        i.gravity = Some(0.0);
        i.stop();
        i.contact.leave_floor();
        debug!(carrier = %carrier, item = %item, "picked up");
        Ok(())
    }

    /// Let go of whatever `carrier` holds, leaving it where it is.
    pub fn drop_held(&mut self, carrier: EntityId) -> Option<EntityId> {
        let item = self.entities.get_mut(carrier)?.held.take()?;
        if let Some(i) = self.entities.get_mut(item) {
            i.parent = None;
            i.visible = true;
            i.tangible = true;
            i.gravity = None;
        }
        Some(item)
    }

    /// The kick animation and sound, without releasing anything.
    pub fn do_kick(&mut self, ctx: &mut StepCtx<'_>, carrier: EntityId) {
        if let Some(c) = self.entities.get_mut(carrier) {
            c.alarms.set(EntityAlarm::Kick, ctx.cfg.player.kick_frames);
        }
        ctx.emit(
            GameEvent::sound(Sound::Kick, SystemId::INTERACTION, CausalReason::PlayerInput("kick".into()))
                .involving([carrier]),
        );
    }

    fn release(&mut self, ctx: &mut StepCtx<'_>, carrier: EntityId) -> Option<(EntityId, f64, f64)> {
        let facing = self.entities.get(carrier)?.facing;
        let xv = self.entities.get(carrier)?.motion.xvelocity;
        let item = self.drop_held(carrier)?;
        self.do_kick(ctx, carrier);
        if let Some(i) = self.entities.get_mut(item) {
            i.thrower = Some(carrier);
            i.facing = facing;
        }
        Some((item, facing, xv))
    }

    /// Kick the held item forward, or fire it if it is a loaded flower.
    pub fn kick(&mut self, ctx: &mut StepCtx<'_>, carrier: EntityId) {
        self.kick_dir(ctx, carrier, false);
    }

    /// Kick the held item upward.
    pub fn kick_up(&mut self, ctx: &mut StepCtx<'_>, carrier: EntityId) {
        self.kick_dir(ctx, carrier, true);
    }

    fn kick_dir(&mut self, ctx: &mut StepCtx<'_>, carrier: EntityId, up: bool) {
        let Some(item) = self.entities.get(carrier).and_then(|c| c.held) else { return };
        let Some(variant) = self.entities.get(item).map(|i| i.variant.clone()) else { return };
        let cfg = ctx.cfg;
        let o = &cfg.objects;
        match variant {
            Variant::FlatIceblock => {
                let Some((item, facing, xv)) = self.release(ctx, carrier) else { return };
                let Some(i) = self.entities.get_mut(item) else { return };
                if up {
                    i.become_variant(Variant::ThrownIceblock);
                    i.motion.xvelocity = xv;
                    i.motion.yvelocity = jump_speed(o.kick_up_height, o.iceblock_gravity);
                } else {
                    i.become_variant(Variant::DashingIceblock);
                    i.motion.xvelocity = o.iceblock_dash_speed * facing;
                }
            }
            Variant::Flower { element, ammo } if ammo > 0 => {
                self.fire(ctx, carrier, item, element, up && element == Element::Fire);
            }
            Variant::Flower { element, .. } => {
                let Some((item, facing, _)) = self.release(ctx, carrier) else { return };
                let up = up && element == Element::Fire;
                let Some(i) = self.entities.get_mut(item) else { return };
                i.become_variant(Variant::ThrownFlower { element });
                let g = i.gravity(cfg);
                let h = if up { o.flower_throw_up_height } else { o.flower_throw_height };
                i.motion.xvelocity = o.fireball_speed * facing;
                i.motion.yvelocity = jump_speed(h, g);
            }
            Variant::Spring => {
                let Some((item, facing, xv)) = self.release(ctx, carrier) else { return };
                let Some(i) = self.entities.get_mut(item) else { return };
                if up {
                    i.motion.xvelocity = xv;
                    i.motion.yvelocity = jump_speed(o.kick_up_height, o.spring_gravity);
                } else {
                    i.motion.xvelocity = o.kick_forward_speed * facing;
                    i.motion.yvelocity = jump_speed(o.kick_forward_height, o.spring_gravity);
                }
            }
            _ => {
                self.drop_held(carrier);
            }
        }
    }

    fn fire(&mut self, ctx: &mut StepCtx<'_>, carrier: EntityId, item: EntityId, element: Element, up: bool) {
        let o = &ctx.cfg.objects;
        let facing = self.entities.get(carrier).map(|c| c.facing).unwrap_or(1.0);
        let Some(i) = self.entities.get_mut(item) else { return };
        if let Variant::Flower { ammo, .. } = &mut i.variant {
            *ammo = ammo.saturating_sub(1);
        }
        let (x, y) = (i.x, i.y);
        let (shot, sound) = match element {
            Element::Fire => {
                let mut shot = Entity::new(Variant::Fireball, x, y);
                shot.motion.xvelocity = o.fireball_speed * facing;
                shot.motion.yvelocity = if up {
                    jump_speed(o.fireball_up_height, o.fireball_gravity)
                } else {
                    o.fireball_fall_speed
                };
                (shot, Sound::Fireball)
            }
            Element::Ice => {
                let mut shot = Entity::new(Variant::IceBullet, x, y);
                shot.motion.xvelocity = o.ice_bullet_speed * facing;
                (shot, Sound::IceBullet)
            }
        };
        let mut shot = shot;
        shot.facing = facing;
        shot.thrower = Some(carrier);
        shot.active = true;
        self.commands
            .spawn(shot, SystemId::INTERACTION, CausalReason::PlayerInput("fire".into()));
        ctx.emit(
            GameEvent::sound(sound, SystemId::INTERACTION, CausalReason::PlayerInput("fire".into()))
                .involving([carrier, item]),
        );
    }

    /// Move every held item to its carrier's hands, or off stage while the
    /// carrier is in a warp.
    pub(crate) fn anchor_held(&mut self) {
        let carriers = self.entities.ids_where(|e| e.held.is_some() && !e.dead);
        for carrier in carriers {
            self.anchor_one(carrier);
        }
    }

    /// Park the held item off stage as its carrier enters a warp.
    pub(crate) fn stash_held(&mut self, carrier: EntityId) {
        self.anchor_one(carrier);
    }

    /// Bring the held item back as its carrier leaves a warp.
    pub(crate) fn unstash_held(&mut self, carrier: EntityId) {
        self.anchor_one(carrier);
    }

    fn anchor_one(&mut self, carrier: EntityId) {
        let Some(c) = self.entities.get(carrier) else { return };
        let Some(item) = c.held else { return };
        let target = if c.is_warping() {
            let n = c.player().map(|p| p.number).unwrap_or(0) as f64;
            (OFF_STAGE, OFF_STAGE * (n + 1.0))
        } else {
            (c.x + HOLD_OFFSET * c.facing, c.y)
        };
        let facing = c.facing;
        if let Some(i) = self.entities.get_mut(item) {
            i.x = target.0;
            i.y = target.1;
            i.facing = facing;
        }
    }
}

//! Entity-entity interaction.
//!
//! After every entity has moved, [`Room::resolve_contacts`] walks each pair
//! of overlapping, touchable entities once, in id order:
//!
//! - a player and anything else: the contact is classified from the
//!   player's side as a stomp or a touch and handed to the other entity's
//!   reaction ([`Room::stomp`] / [`Room::touch`]);
//! - projectiles and sliding iceblocks apply their effect to what they hit;
//! - crowd walkers turn away from crowd-blocking entities.
//!
//! Solid entities (thin ice, frozen blocks, bricks) never take part here.
//! They are collision geometry and react through wall contacts instead.

pub mod behavior;
pub mod carry;
pub mod contact;
pub mod thin_ice;

use floe_world::prelude::*;

use crate::collision::BlockerRef;
use crate::entity::{Entity, Variant};
use crate::room::{Room, StepCtx};

use self::contact::{classify, crowd_turn, Approach, ContactKind};

/// Things that act on whatever they run into.
fn is_aggressive(e: &Entity) -> bool {
    matches!(
        e.variant,
        Variant::Fireball
            | Variant::IceBullet
            | Variant::ThrownFlower { .. }
            | Variant::DashingIceblock
            | Variant::ThrownIceblock
    )
}

fn approach(e: &Entity) -> Approach {
    Approach::new(e.bbox(), e.last_move)
}

impl Room {
    /// Dispatch every entity-entity contact of this frame.
    pub(crate) fn resolve_contacts(&mut self, ctx: &mut StepCtx<'_>) {
        let lax = ctx.cfg.lax.stomp_lax;
        let ids = self
            .entities
            .ids_where(|e| e.is_touchable() && e.active && !e.capabilities().solid);
        for (n, &a) in ids.iter().enumerate() {
            for &b in &ids[n + 1..] {
                self.contact_pair(ctx, a, b, lax);
            }
        }
    }

    fn contact_pair(&mut self, ctx: &mut StepCtx<'_>, a: EntityId, b: EntityId, lax: f64) {
        let (Some(ea), Some(eb)) = (self.entities.get(a), self.entities.get(b)) else { return };
        if !ea.is_touchable() || !eb.is_touchable() || !ea.bbox().overlaps(&eb.bbox()) {
            return;
        }
        let (pa, pb) = (approach(ea), approach(eb));
        match (ea.variant.is_player(), eb.variant.is_player()) {
            (true, true) => {}
            (true, false) => self.player_contact(ctx, a, b, classify(&pa, &pb, lax)),
            (false, true) => self.player_contact(ctx, b, a, classify(&pb, &pa, lax)),
            (false, false) => {
                if classify(&pa, &pb, lax).is_some() {
                    let (ca, cb) = (ea.capabilities(), eb.capabilities());
                    let sa = (a, ea.x, ea.last_move.0);
                    let sb = (b, eb.x, eb.last_move.0);
                    let turn_a = (ca.crowd && cb.crowd_blocking).then(|| crowd_turn(sa, sb));
                    let turn_b = (cb.crowd && ca.crowd_blocking).then(|| crowd_turn(sb, sa));
                    for (id, turn) in [(a, turn_a), (b, turn_b)] {
                        if let (Some(facing), Some(e)) = (turn, self.entities.get_mut(id)) {
                            e.facing = facing;
                        }
                    }
                }
                let Some(ea) = self.entities.get(a) else { return };
                let Some(eb) = self.entities.get(b) else { return };
                let (agg_a, agg_b) = (is_aggressive(ea), is_aggressive(eb));
                if agg_a {
                    self.collide(ctx, a, b);
                }
                if agg_b {
                    self.collide(ctx, b, a);
                }
            }
        }
    }

    fn player_contact(&mut self, ctx: &mut StepCtx<'_>, player: EntityId, other: EntityId, kind: Option<ContactKind>) {
        match kind {
            Some(ContactKind::Stomp) => self.stomp(ctx, other, player),
            Some(ContactKind::Touch) => self.touch(ctx, other, player),
            None => {}
        }
    }

    /// Crack or refreeze every thin-ice block depending on who stands on it.
    pub(crate) fn step_thin_ice(&mut self, ctx: &mut StepCtx<'_>) {
        let ice = self
            .entities
            .ids_where(|e| e.is_live() && matches!(e.variant, Variant::ThinIce(_)));
        for id in ice {
            let on = BlockerRef::Entity(id);
            let players = self
                .entities
                .iter()
                .filter(|(_, p)| p.variant.is_player() && p.is_live() && p.contact.floor.contains(&on))
                .count();
            self.step_ice(ctx, id, players);
        }
    }
}

//! The reaction table: what each variant does when touched, stomped,
//! knocked, burned, frozen or run into a wall.
//!
//! Every reaction is a [`Room`] method taking the ids involved. Reactions
//! look entities up again after each nested call, since any of them may have
//! been destroyed in between; destroyed entities stay in the registry
//! (flagged `dead`) until the frame's command buffer is applied.

use floe_journal::prelude::*;
use floe_world::prelude::*;
use tracing::{debug, warn};

use crate::collision::BlockerRef;
use crate::entity::{Element, Entity, EntityAlarm, Hitbox, Variant};
use crate::kinematics::jump_speed;
use crate::room::{Room, StepCtx};
use crate::warp::qualify;

fn rule(name: &str) -> CausalReason {
    CausalReason::GameRule(name.into())
}

/// Enemies pay kill points when defeated.
fn is_enemy(v: &Variant) -> bool {
    matches!(
        v,
        Variant::WalkingSnowball
            | Variant::BouncingSnowball
            | Variant::FlyingSnowball { .. }
            | Variant::WalkingIceblock
            | Variant::Spiky
            | Variant::Jumpy
    )
}

impl Room {
    /// Remove `id` at the end of the frame. Carry links are cut now, so the
    /// item a destroyed carrier held falls free this frame. A frozen block
    /// takes its prisoner with it.
    pub fn destroy(&mut self, id: EntityId, reason: CausalReason) {
        let Some(e) = self.entities.get_mut(id) else { return };
        if e.dead {
            return;
        }
        e.dead = true;
        e.tangible = false;
        e.visible = false;
        let held = e.held;
        let parent = e.parent.take();
        let prisoner = match e.variant {
            Variant::Frozen { inner } => Some(inner),
            _ => None,
        };
        if held.is_some() {
            self.drop_held(id);
        }
        if let Some(p) = parent.and_then(|p| self.entities.get_mut(p)) {
            if p.held == Some(id) {
                p.held = None;
            }
        }
        if let Some(inner) = prisoner {
            if self.entities.get(inner).is_some_and(|i| i.suspended) {
                self.destroy(inner, reason.clone());
            }
        }
        debug!(entity = %id, "destroyed");
        self.commands.despawn(id, SystemId::INTERACTION, reason);
    }

    fn spawn_effect(&mut self, entity: Entity, reason: &str) {
        if let Err(err) = entity.check_bounds() {
            warn!(variant = entity.variant.name(), %err, reason, "effect not spawned");
            return;
        }
        self.commands.spawn(entity, SystemId::INTERACTION, rule(reason));
    }

    /// Leave a falling ragdoll where `id` is. Knocked things pop up first.
    fn ragdoll(&mut self, ctx: &StepCtx<'_>, id: EntityId, pop: bool) {
        let Some(e) = self.entities.get(id) else { return };
        let mut r = Entity::new(Variant::DeadMan { of: e.variant.name().into() }, e.x, e.y);
        r.hitbox = e.hitbox;
        r.facing = e.facing;
        r.motion.xvelocity = e.motion.xvelocity;
        if pop {
            r.motion.yvelocity = jump_speed(ctx.cfg.enemy.hit_below_height, ctx.cfg.physics.gravity);
        }
        r.tangible = false;
        r.active = true;
        self.spawn_effect(r, "ragdoll");
    }

    fn corpse(&mut self, ctx: &StepCtx<'_>, id: EntityId) {
        let Some(e) = self.entities.get(id) else { return };
        let mut c = Entity::new(Variant::Corpse { of: e.variant.name().into() }, e.x, e.y);
        c.facing = e.facing;
        c.tangible = false;
        c.active = true;
        c.alarms.set(EntityAlarm::Expire, ctx.cfg.enemy.corpse_frames);
        self.spawn_effect(c, "squish");
    }

    fn action_held(&self, id: EntityId) -> bool {
        self.entities
            .get(id)
            .and_then(Entity::player)
            .map(|p| p.input.action)
            .unwrap_or(false)
    }

    // -----------------------------------------------------------------------
    // Player contacts
    // -----------------------------------------------------------------------

    /// The player `by` touched `id` without stomping it.
    pub fn touch(&mut self, ctx: &mut StepCtx<'_>, id: EntityId, by: EntityId) {
        let Some(e) = self.entities.get(id) else { return };
        if !e.is_live() {
            return;
        }
        match e.variant.clone() {
            Variant::WalkingSnowball
            | Variant::BouncingSnowball
            | Variant::FlyingSnowball { .. }
            | Variant::WalkingIceblock
            | Variant::Spiky
            | Variant::Jumpy
            | Variant::DashingIceblock => self.hurt_player(ctx, by),
            Variant::FlatIceblock => {
                if e.parent.is_some() {
                    return;
                }
                match self.pickup(by, id) {
                    Ok(()) => {
                        if self.action_held(by) {
                            self.player_action(ctx, by);
                        }
                    }
                    Err(err) => {
                        debug!(entity = %id, %err, "kicking instead of picking up");
                        self.do_kick(ctx, by);
                        let facing = self.entities.get(by).map(|p| p.facing).unwrap_or(1.0);
                        let dash = ctx.cfg.objects.iceblock_dash_speed;
                        if let Some(e) = self.entities.get_mut(id) {
                            e.become_variant(Variant::DashingIceblock);
                            e.facing = facing;
                            e.motion.xvelocity = dash * facing;
                            e.thrower = Some(by);
                        }
                    }
                }
            }
            Variant::ThrownIceblock => {
                if let Some(e) = self.entities.get_mut(id) {
                    e.become_variant(Variant::FlatIceblock);
                    e.stop();
                }
                self.touch(ctx, id, by);
            }
            Variant::Flower { .. } => {
                let free_hands = self.entities.get(by).is_some_and(|c| c.held.is_none());
                if e.parent.is_none() && free_hands {
                    if let Err(err) = self.pickup(by, id) {
                        warn!(carrier = %by, item = %id, %err, "flower not picked up");
                    }
                }
            }
            Variant::Spring => {
                if e.parent.is_none() && self.pickup(by, id).is_ok() && self.action_held(by) {
                    self.player_action(ctx, by);
                }
            }
            Variant::Coin => self.collect_coin(ctx, id, by),
            Variant::Token => self.collect_token(ctx, id, by),
            Variant::Checkpoint { dest } => self.touch_checkpoint(ctx, id, &dest),
            _ => {}
        }
    }

    /// The player `by` came down on top of `id`.
    pub fn stomp(&mut self, ctx: &mut StepCtx<'_>, id: EntityId, by: EntityId) {
        let Some(e) = self.entities.get(id) else { return };
        if !e.is_live() {
            return;
        }
        let top = e.bbox().top();
        let points = ctx.cfg.scoring.enemy_kill_points;
        match e.variant.clone() {
            Variant::WalkingSnowball | Variant::BouncingSnowball | Variant::FlyingSnowball { .. } => {
                self.stomp_jump(ctx, by, top, None);
                ctx.emit(GameEvent::sound(Sound::Squish, SystemId::INTERACTION, rule("stomp")).involving([id, by]));
                self.add_points(ctx, points);
                self.corpse(ctx, id);
                self.destroy(id, CausalReason::Contact(by, id));
            }
            Variant::WalkingIceblock => {
                self.stomp_jump(ctx, by, top, None);
                ctx.emit(GameEvent::sound(Sound::Stomp, SystemId::INTERACTION, rule("stomp")).involving([id, by]));
                self.add_points(ctx, points);
                self.flatten(id);
            }
            Variant::DashingIceblock => {
                self.stomp_jump(ctx, by, top, None);
                ctx.emit(GameEvent::sound(Sound::Stomp, SystemId::INTERACTION, rule("stomp")).involving([id, by]));
                self.flatten(id);
            }
            Variant::Spiky | Variant::Jumpy => self.hurt_player(ctx, by),
            Variant::Spring | Variant::FixedSpring => {
                if e.parent == Some(by) {
                    return;
                }
                let height = ctx.cfg.objects.spring_jump_height;
                self.stomp_jump(ctx, by, top, Some(height));
                ctx.emit(GameEvent::sound(Sound::Spring, SystemId::INTERACTION, rule("spring")).involving([id, by]));
            }
            _ => self.touch(ctx, id, by),
        }
    }

    fn flatten(&mut self, id: EntityId) {
        if let Some(e) = self.entities.get_mut(id) {
            e.become_variant(Variant::FlatIceblock);
            e.stop();
            e.thrower = None;
        }
    }

    fn collect_coin(&mut self, ctx: &mut StepCtx<'_>, coin: EntityId, by: EntityId) {
        if !self.entities.get(by).is_some_and(|e| e.variant.is_player()) {
            return;
        }
        let points = ctx.cfg.scoring.coin_points;
        ctx.emit(GameEvent::sound(Sound::Coin, SystemId::INTERACTION, rule("coin")).involving([coin, by]));
        self.add_points(ctx, points);
        self.give_coin(ctx, by);
        self.destroy(coin, CausalReason::Contact(by, coin));
    }

    fn collect_token(&mut self, ctx: &mut StepCtx<'_>, token: EntityId, by: EntityId) {
        let points = ctx.cfg.scoring.token_points;
        ctx.emit(GameEvent::sound(Sound::Token, SystemId::INTERACTION, rule("token")).involving([token, by]));
        self.add_points(ctx, points);
        if let Some(level) = ctx.session.main_area.clone() {
            if ctx.session.tokens_found.insert(level.clone()) {
                ctx.emit(
                    GameEvent::new(EventKind::TokenFound { level }, SystemId::INTERACTION, rule("token"))
                        .involving([token, by]),
                );
            }
        }
        self.destroy(token, CausalReason::Contact(by, token));
    }

    fn touch_checkpoint(&mut self, ctx: &mut StepCtx<'_>, id: EntityId, dest: &str) {
        let Some(main) = ctx.session.main_area.clone() else { return };
        let dest = qualify(dest, &self.name);
        let previous = ctx.session.current_checkpoints.insert(main, dest.clone());
        if previous.as_deref() != Some(dest.as_str()) {
            debug!(entity = %id, %dest, "checkpoint");
            ctx.emit(GameEvent::sound(Sound::Checkpoint, SystemId::INTERACTION, rule("checkpoint")).involving([id]));
        }
    }

    // -----------------------------------------------------------------------
    // Knock, burn, freeze
    // -----------------------------------------------------------------------

    /// Hit from below or by something dashing. Items pop up; everything else
    /// tumbles off the stage.
    pub fn knock(&mut self, ctx: &mut StepCtx<'_>, id: EntityId, by: Option<EntityId>) {
        let Some(e) = self.entities.get_mut(id) else { return };
        if !e.is_live() || e.parent.is_some() || !e.capabilities().knockable {
            return;
        }
        if matches!(e.variant, Variant::Token | Variant::Flower { .. }) {
            let g = e.gravity(ctx.cfg);
            e.motion.yvelocity = jump_speed(ctx.cfg.objects.item_hit_height, g);
            e.contact.leave_floor();
            return;
        }
        let enemy = is_enemy(&e.variant);
        ctx.emit(GameEvent::sound(Sound::Fall, SystemId::INTERACTION, rule("knock")).involving([id]));
        self.ragdoll(ctx, id, true);
        if enemy {
            let points = ctx.cfg.scoring.enemy_kill_points;
            self.add_points(ctx, points);
        }
        let reason = match by {
            Some(by) => CausalReason::Contact(by, id),
            None => rule("knock"),
        };
        self.destroy(id, reason);
    }

    pub fn burn(&mut self, ctx: &mut StepCtx<'_>, id: EntityId) {
        let Some(e) = self.entities.get(id) else { return };
        if !e.is_live() {
            return;
        }
        match e.variant {
            Variant::ThinIce(_) => self.crack_ice(ctx, id),
            Variant::Frozen { .. } => self.thaw(ctx, id),
            _ if e.capabilities().burnable && e.parent.is_none() => {
                let enemy = is_enemy(&e.variant);
                self.ragdoll(ctx, id, false);
                if enemy {
                    let points = ctx.cfg.scoring.enemy_kill_points;
                    self.add_points(ctx, points);
                }
                self.destroy(id, rule("burn"));
            }
            _ => {}
        }
    }

    /// Encase `id` in a solid block of ice that thaws after a while.
    /// Freezing a frozen block restarts its thaw.
    pub fn freeze(&mut self, ctx: &mut StepCtx<'_>, id: EntityId) {
        let thaw_frames = ctx.cfg.objects.thaw_frames;
        let Some(e) = self.entities.get_mut(id) else { return };
        if !e.is_live() {
            return;
        }
        if let Variant::Frozen { .. } = e.variant {
            e.alarms.cancel(EntityAlarm::Thaw);
            e.alarms.set(EntityAlarm::ThawWarn, thaw_frames);
            return;
        }
        if !e.capabilities().freezable || e.parent.is_some() {
            return;
        }
        let bbox = e.bbox();
        e.suspended = true;
        e.tangible = false;
        e.visible = false;
        e.active = false;
        e.stop();
        let mut block = Entity::new(Variant::Frozen { inner: id }, bbox.left(), bbox.top());
        block.hitbox = Hitbox::new(0.0, 0.0, bbox.width, bbox.height);
        block.alarms.set(EntityAlarm::ThawWarn, thaw_frames);
        self.spawn_effect(block, "freeze");
        ctx.emit(GameEvent::sound(Sound::Freeze, SystemId::INTERACTION, rule("freeze")).involving([id]));
    }

    /// Break a frozen block open and let its prisoner go.
    pub fn thaw(&mut self, ctx: &mut StepCtx<'_>, frozen: EntityId) {
        let Some(Variant::Frozen { inner }) = self.entities.get(frozen).map(|e| e.variant.clone()) else {
            return;
        };
        if let Some(i) = self.entities.get_mut(inner) {
            i.suspended = false;
            i.tangible = true;
            i.visible = true;
            i.active = true;
        }
        ctx.emit(GameEvent::sound(Sound::Thaw, SystemId::INTERACTION, rule("thaw")).involving([inner]));
        self.destroy(frozen, rule("thaw"));
    }

    /// Level won: cash `id` in.
    pub fn win_puff(&mut self, ctx: &mut StepCtx<'_>, id: EntityId) {
        let Some(e) = self.entities.get(id) else { return };
        if !e.is_live() || !e.capabilities().win_puff {
            return;
        }
        let s = &ctx.cfg.scoring;
        let points = match e.variant {
            Variant::Flower { ammo, .. } => s.ammo_points * (i64::from(ammo) + 1),
            Variant::Spring => 0,
            _ => s.enemy_kill_points,
        };
        ctx.emit(GameEvent::sound(Sound::Pop, SystemId::ROOM, rule("win_puff")).involving([id]));
        self.add_points(ctx, points);
        self.destroy(id, rule("win_puff"));
    }

    /// Break brick `id`, knocking whatever stands on it.
    pub fn hit_brick(&mut self, ctx: &mut StepCtx<'_>, id: EntityId, by: Option<EntityId>) {
        let Some(e) = self.entities.get(id) else { return };
        if !e.is_live() || !matches!(e.variant, Variant::Brick) {
            return;
        }
        let top = e.bbox();
        let riders = self.entities.ids_where(|o| {
            let b = o.bbox();
            o.is_touchable()
                && o.capabilities().knockable
                && (b.bottom() - top.top()).abs() <= 1.0
                && b.overlaps_x(&top, 0.0)
        });
        ctx.emit(GameEvent::sound(Sound::Brick, SystemId::INTERACTION, rule("brick")).involving([id]));
        for rider in riders {
            self.knock(ctx, rider, by);
        }
        let points = ctx.cfg.scoring.brick_points;
        self.add_points(ctx, points);
        self.destroy(id, rule("brick"));
    }

    // -----------------------------------------------------------------------
    // Hazards
    // -----------------------------------------------------------------------

    /// Fell into a death tile.
    pub fn touch_death(&mut self, ctx: &mut StepCtx<'_>, id: EntityId) {
        let Some(e) = self.entities.get(id) else { return };
        if !e.is_live() || e.parent.is_some() {
            return;
        }
        match e.variant {
            Variant::Player(_) => self.kill_player(ctx, id, true),
            Variant::Fireball | Variant::IceBullet => self.destroy(id, rule("death_tile")),
            Variant::ThrownFlower { .. } => self.dissipate(ctx, id),
            Variant::Corpse { .. }
            | Variant::DeadMan { .. }
            | Variant::Frozen { .. }
            | Variant::ThinIce(_)
            | Variant::Brick
            | Variant::Coin
            | Variant::Checkpoint { .. } => {}
            _ => {
                ctx.emit(GameEvent::sound(Sound::Fall, SystemId::COLLISION, rule("death_tile")).involving([id]));
                self.ragdoll(ctx, id, false);
                self.destroy(id, rule("death_tile"));
            }
        }
    }

    /// Touched the dangerous face of a hurt tile.
    pub fn touch_hurt(&mut self, ctx: &mut StepCtx<'_>, id: EntityId) {
        let Some(e) = self.entities.get(id) else { return };
        if e.variant.is_player() {
            self.hurt_player(ctx, id);
        } else if !e.capabilities().hazard_immune {
            self.touch_death(ctx, id);
        }
    }

    fn dissipate(&mut self, ctx: &mut StepCtx<'_>, id: EntityId) {
        ctx.emit(GameEvent::sound(Sound::Stomp, SystemId::INTERACTION, rule("dissipate")).involving([id]));
        self.destroy(id, rule("dissipate"));
    }

    // -----------------------------------------------------------------------
    // Movers running into things
    // -----------------------------------------------------------------------

    /// A projectile or sliding block `mover` overlapped `other`.
    pub(crate) fn collide(&mut self, ctx: &mut StepCtx<'_>, mover: EntityId, other: EntityId) {
        let (Some(m), Some(o)) = (self.entities.get(mover), self.entities.get(other)) else { return };
        if !m.is_live() || !o.is_live() || m.thrower == Some(other) || o.variant.is_player() {
            return;
        }
        let caps = o.capabilities();
        let is_ice = matches!(o.variant, Variant::ThinIce(_));
        let is_coin = matches!(o.variant, Variant::Coin);
        let thrower = m.thrower;
        match m.variant {
            Variant::Fireball => {
                if caps.burnable || is_ice {
                    self.burn(ctx, other);
                    self.destroy(mover, CausalReason::Contact(mover, other));
                }
            }
            Variant::IceBullet => {
                if caps.freezable {
                    self.freeze(ctx, other);
                    self.destroy(mover, CausalReason::Contact(mover, other));
                }
            }
            Variant::ThrownFlower { element } => {
                if caps.burnable {
                    self.dissipate(ctx, mover);
                    match element {
                        Element::Fire => self.burn(ctx, other),
                        Element::Ice => self.freeze(ctx, other),
                    }
                }
            }
            Variant::DashingIceblock | Variant::ThrownIceblock => {
                if caps.knockable && o.parent.is_none() {
                    self.knock(ctx, other, Some(mover));
                } else if is_coin {
                    if let Some(t) = thrower {
                        self.collect_coin(ctx, other, t);
                    }
                }
            }
            _ => {}
        }
    }

    /// `id` was stopped on `side` by `walls`. Velocity along that axis is
    /// already zero; this decides what happens next.
    pub(crate) fn stop_side(&mut self, ctx: &mut StepCtx<'_>, id: EntityId, side: Side, walls: &[BlockerRef]) {
        let Some(e) = self.entities.get(id) else { return };
        if !e.is_live() {
            return;
        }
        let solids: Vec<EntityId> = walls
            .iter()
            .filter_map(|w| match w {
                BlockerRef::Entity(other) => Some(*other),
                BlockerRef::Tile(_) => None,
            })
            .collect();
        let bricks = |room: &Room| -> Vec<EntityId> {
            solids
                .iter()
                .copied()
                .filter(|s| room.entities.get(*s).is_some_and(|b| matches!(b.variant, Variant::Brick)))
                .collect()
        };
        let o = &ctx.cfg.objects;
        let horizontal = matches!(side, Side::Left | Side::Right);
        let away = if side == Side::Left { 1.0 } else { -1.0 };
        match e.variant.clone() {
            Variant::Player(_) => {
                if side == Side::Top {
                    for b in bricks(self) {
                        self.hit_brick(ctx, b, Some(id));
                    }
                }
            }
            Variant::WalkingSnowball
            | Variant::BouncingSnowball
            | Variant::WalkingIceblock
            | Variant::Spiky
            | Variant::Jumpy
                if horizontal =>
            {
                if let Some(e) = self.entities.get_mut(id) {
                    e.facing = away;
                }
            }
            Variant::BouncingSnowball if side == Side::Bottom => {
                let h = ctx.cfg.enemy.snowball_bounce_height;
                self.bounce(ctx, id, h);
            }
            Variant::Jumpy if side == Side::Bottom => {
                let h = ctx.cfg.enemy.jumpy_bounce_height;
                self.bounce(ctx, id, h);
            }
            Variant::DashingIceblock if horizontal => {
                let thrower = e.thrower;
                if let Some(e) = self.entities.get_mut(id) {
                    e.facing = away;
                }
                for b in bricks(self) {
                    self.hit_brick(ctx, b, thrower);
                }
            }
            Variant::ThrownIceblock if horizontal || side == Side::Top => {
                let thrower = e.thrower;
                if let Some(e) = self.entities.get_mut(id) {
                    if horizontal {
                        e.facing = away;
                        e.motion.xvelocity = e.motion.xvelocity.abs() * away;
                    }
                }
                for b in bricks(self) {
                    self.hit_brick(ctx, b, thrower);
                }
            }
            Variant::Fireball => {
                for s in &solids {
                    self.collide(ctx, id, *s);
                }
                if side == Side::Bottom {
                    self.bounce(ctx, id, o.fireball_bounce_height);
                } else if horizontal {
                    self.destroy(id, rule("fireball_wall"));
                }
            }
            Variant::IceBullet => {
                for s in &solids {
                    self.collide(ctx, id, *s);
                }
                self.destroy(id, rule("ice_bullet_wall"));
            }
            Variant::ThrownFlower { .. } => {
                for s in &solids {
                    self.collide(ctx, id, *s);
                }
                self.dissipate(ctx, id);
            }
            _ => {}
        }
    }

    fn bounce(&mut self, ctx: &StepCtx<'_>, id: EntityId, height: f64) {
        let Some(e) = self.entities.get_mut(id) else { return };
        if !e.is_live() {
            return;
        }
        let g = e.gravity(ctx.cfg);
        e.motion.yvelocity = jump_speed(height, g);
        e.contact.leave_floor();
    }
}

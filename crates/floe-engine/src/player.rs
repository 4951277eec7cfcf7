//! The player: input, steering and the things that happen to a player.
//!
//! Input is a plain [`PlayerInput`] per frame. Edges (a press or release
//! since last frame) drive one-shot actions: jump, action, entering doors,
//! and cutting a jump short. Held buttons drive [`steer`], which sets the
//! frame's acceleration and friction before integration.

use floe_journal::prelude::*;
use floe_world::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::collision::BlockerRef;
use crate::config::EngineConfig;
use crate::entity::{Entity, EntityAlarm, Variant};
use crate::kinematics::{jump_speed, slide_speed};
use crate::room::{Room, StepCtx};

/// Buttons held by one player this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlayerInput {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    pub jump: bool,
    pub action: bool,
    pub sneak: bool,
}

impl PlayerInput {
    /// -1, 0 or 1.
    pub fn horizontal(&self) -> f64 {
        f64::from(u8::from(self.right)) - f64::from(u8::from(self.left))
    }

    /// -1 for up, 1 for down.
    pub fn vertical(&self) -> f64 {
        f64::from(u8::from(self.down)) - f64::from(u8::from(self.up))
    }
}

/// Per-player state carried on the player entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Index into the room's players and views.
    pub number: usize,
    pub hp: i32,
    pub coins: i32,
    pub input: PlayerInput,
    pub prev_input: PlayerInput,
    /// Input comes from outside. Cleared for the victory walk and by
    /// timelines for cutscenes.
    pub human: bool,
    pub hitstun: bool,
    pub skidding: bool,
}

impl PlayerState {
    pub fn new(number: usize, hp: i32) -> Self {
        Self {
            number,
            hp,
            coins: 0,
            input: PlayerInput::default(),
            prev_input: PlayerInput::default(),
            human: true,
            hitstun: false,
            skidding: false,
        }
    }

    fn pressed(&self, f: impl Fn(&PlayerInput) -> bool) -> bool {
        f(&self.input) && !f(&self.prev_input)
    }

    fn released(&self, f: impl Fn(&PlayerInput) -> bool) -> bool {
        !f(&self.input) && f(&self.prev_input)
    }
}

/// Set the player's acceleration and friction for this frame from held
/// input and floor contact.
pub fn steer(e: &mut Entity, cfg: &EngineConfig, delta: f64) {
    let Some(input) = e.player().map(|p| p.input) else { return };
    let pc = &cfg.player;
    let grounded = e.contact.on_floor || e.contact.was_on_floor;
    let gravity = e.gravity(cfg);
    let slope = e.contact.slope;
    let h = input.horizontal();
    if h != 0.0 {
        e.facing = h;
    }
    let m = &mut e.motion;
    let heading = if m.xvelocity > 0.0 {
        1.0
    } else if m.xvelocity < 0.0 {
        -1.0
    } else {
        0.0
    };

    m.xacceleration = 0.0;
    m.yacceleration = 0.0;
    m.xdeceleration = 0.0;

    let friction = if grounded { pc.friction } else { pc.air_friction };

    if h != 0.0 {
        let mut max = pc.max_speed;
        if input.sneak {
            max = max.min(pc.walk_speed);
        }
        if m.xvelocity.abs() < max {
            let accel = if grounded { pc.acceleration } else { pc.air_acceleration };
            m.xacceleration = accel * h;
        } else {
            if m.xvelocity.abs() >= pc.max_speed {
                m.xvelocity = max * heading;
            }
            if m.xvelocity.abs() - friction * delta > max {
                m.xdeceleration = friction;
            } else {
                m.xvelocity = max * heading;
            }
        }
    }

    if heading != 0.0 && h != heading {
        m.xdeceleration = friction;
    }

    if !grounded {
        m.fall(gravity, pc.fall_speed);
    } else if let Some(ratio) = slope {
        m.yvelocity = slide_speed(pc.slide_speed, ratio, 1.0);
    }
}

// ---------------------------------------------------------------------------
// Room integration
// ---------------------------------------------------------------------------

impl Room {
    /// Input edges, then steering. Runs before physics.
    pub(crate) fn player_begin(&mut self, ctx: &mut StepCtx<'_>, id: EntityId) {
        let Some(p) = self.entities.get(id).and_then(Entity::player) else { return };
        let jump = p.pressed(|i| i.jump);
        let action = p.pressed(|i| i.action);
        let up = p.pressed(|i| i.up);
        let jump_released = p.released(|i| i.jump);

        if jump {
            self.player_jump(ctx, id);
        }
        if action {
            self.player_action(ctx, id);
        }
        if up {
            self.try_door(ctx, id);
        }
        if jump_released {
            if let Some(e) = self.entities.get_mut(id) {
                jump_release(e);
            }
        }

        if let Some(e) = self.entities.get_mut(id) {
            if !e.is_warping() {
                steer(e, ctx.cfg, ctx.delta);
            }
        }
    }

    pub fn player_jump(&mut self, ctx: &mut StepCtx<'_>, id: EntityId) {
        let Some(e) = self.entities.get(id) else { return };
        if e.is_warping() || !(e.contact.on_floor || e.contact.was_on_floor) {
            return;
        }
        let ice: Vec<EntityId> = e
            .contact
            .floor
            .iter()
            .filter_map(|r| match r {
                BlockerRef::Entity(other) => Some(*other),
                BlockerRef::Tile(_) => None,
            })
            .collect();
        for other in ice {
            self.crack_ice(ctx, other);
        }

        let pc = &ctx.cfg.player;
        let Some(e) = self.entities.get_mut(id) else { return };
        let height = if e.motion.xvelocity.abs() >= pc.run_speed {
            pc.run_jump_height
        } else {
            pc.jump_height
        };
        let g = e.gravity(ctx.cfg);
        e.motion.yvelocity = jump_speed(height, g);
        e.contact.leave_floor();
        ctx.emit(
            GameEvent::sound(Sound::Jump, SystemId::INPUT, CausalReason::PlayerInput("jump".into()))
                .involving([id]),
        );
    }

    /// Use whatever is held: up kicks it upward, down sets it down, anything
    /// else kicks or fires it forward.
    pub fn player_action(&mut self, ctx: &mut StepCtx<'_>, id: EntityId) {
        let Some(e) = self.entities.get(id) else { return };
        let Some(p) = e.player() else { return };
        if e.is_warping() || e.held.is_none() {
            return;
        }
        let (up, down) = (p.input.up, p.input.down);
        if up {
            self.kick_up(ctx, id);
        } else if down {
            self.drop_held(id);
        } else {
            self.kick(ctx, id);
        }
    }

    /// Bounce off something just stomped. Holding jump gives a full jump
    /// (or `height`, for springs); otherwise a short hop. The player's
    /// bottom is snapped to the tile row the stomped thing stood in.
    pub fn stomp_jump(&mut self, ctx: &mut StepCtx<'_>, id: EntityId, other_top: f64, height: Option<f64>) {
        let tile = ctx.cfg.physics.tile_size;
        let Some(e) = self.entities.get_mut(id) else { return };
        let jump_held = e.player().map(|p| p.input.jump).unwrap_or(false);
        let h = if jump_held {
            height.unwrap_or(ctx.cfg.player.jump_height)
        } else {
            ctx.cfg.player.stomp_height
        };
        let g = e.gravity(ctx.cfg);
        e.motion.yvelocity = jump_speed(h, g);
        e.set_bbox_bottom((other_top / tile).floor() * tile);
        e.contact.leave_floor();
    }

    /// Take one hit. Ignored while stunned or after the level is won.
    pub fn hurt_player(&mut self, ctx: &mut StepCtx<'_>, id: EntityId) {
        if self.won {
            return;
        }
        let stun = ctx.cfg.player.hitstun_frames;
        let Some(e) = self.entities.get_mut(id) else { return };
        let Some(p) = e.player_mut() else { return };
        if p.hitstun {
            return;
        }
        p.hp -= 1;
        let hp = p.hp;
        ctx.emit(
            GameEvent::new(
                EventKind::HpChanged { entity: id, hp },
                SystemId::INTERACTION,
                CausalReason::GameRule("hurt".into()),
            )
            .involving([id]),
        );
        if hp <= 0 {
            self.kill_player(ctx, id, true);
            return;
        }
        p.hitstun = true;
        e.opacity = 128.0;
        e.alarms.set(EntityAlarm::HitStun, stun);
        debug!(entity = %id, hp, "player hurt");
        ctx.emit(
            GameEvent::sound(Sound::Hurt, SystemId::INTERACTION, CausalReason::GameRule("hurt".into()))
                .involving([id]),
        );
    }

    /// Remove the player. With `show_fall` a ragdoll tumbles off the stage.
    pub fn kill_player(&mut self, ctx: &mut StepCtx<'_>, id: EntityId, show_fall: bool) {
        let Some(e) = self.entities.get(id) else { return };
        if e.dead {
            return;
        }
        let (x, y, facing) = (e.x, e.y, e.facing);
        self.drop_held(id);
        ctx.emit(
            GameEvent::sound(Sound::Kill, SystemId::INTERACTION, CausalReason::GameRule("player_died".into()))
                .involving([id]),
        );
        if show_fall {
            let mut ragdoll = Entity::new(Variant::DeadMan { of: "player".into() }, x, y);
            ragdoll.motion.yvelocity = jump_speed(ctx.cfg.player.die_height, ctx.cfg.physics.gravity);
            ragdoll.facing = facing;
            ragdoll.tangible = false;
            ragdoll.active = true;
            self.commands
                .spawn(ragdoll, SystemId::INTERACTION, CausalReason::GameRule("player_died".into()));
        }
        info!(room = %self.name, entity = %id, "player died");
        if !self.won {
            self.die(ctx);
        }
        self.destroy(id, CausalReason::GameRule("player_died".into()));
    }

    /// Once-a-frame upkeep after contacts: coins turn into health.
    pub(crate) fn player_after(&mut self, ctx: &mut StepCtx<'_>, id: EntityId) {
        let heal_coins = ctx.cfg.player.heal_coins.max(1);
        let max_hp = ctx.cfg.player.max_hp;
        let hp_points = ctx.cfg.scoring.hp_points;
        let mut bonus = 0;
        {
            let Some(p) = self.entities.get_mut(id).and_then(Entity::player_mut) else { return };
            while p.coins >= heal_coins {
                p.coins -= heal_coins;
                ctx.emit(
                    GameEvent::new(
                        EventKind::CoinsChanged { entity: id, coins: p.coins },
                        SystemId::ROOM,
                        CausalReason::GameRule("heal".into()),
                    )
                    .involving([id]),
                );
                ctx.emit(
                    GameEvent::sound(Sound::Heal, SystemId::ROOM, CausalReason::GameRule("heal".into()))
                        .involving([id]),
                );
                if p.hp < max_hp {
                    p.hp += 1;
                    ctx.emit(
                        GameEvent::new(
                            EventKind::HpChanged { entity: id, hp: p.hp },
                            SystemId::ROOM,
                            CausalReason::GameRule("heal".into()),
                        )
                        .involving([id]),
                    );
                } else {
                    bonus += hp_points;
                }
            }
            p.prev_input = p.input;
        }
        if bonus != 0 {
            self.add_points(ctx, bonus);
        }
    }

    /// Give `id` a coin.
    pub fn give_coin(&mut self, ctx: &mut StepCtx<'_>, id: EntityId) {
        let Some(p) = self.entities.get_mut(id).and_then(Entity::player_mut) else { return };
        p.coins += 1;
        let coins = p.coins;
        ctx.emit(
            GameEvent::new(
                EventKind::CoinsChanged { entity: id, coins },
                SystemId::INTERACTION,
                CausalReason::GameRule("coin".into()),
            )
            .involving([id]),
        );
    }
}

/// Letting go of jump cuts the rise in half.
pub fn jump_release(e: &mut Entity) {
    if e.motion.yvelocity < 0.0 {
        e.motion.yvelocity /= 2.0;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn player(input: PlayerInput) -> Entity {
        let mut st = PlayerState::new(0, 5);
        st.input = input;
        let mut e = Entity::new(Variant::Player(st), 0.0, 0.0);
        e.contact.on_floor = true;
        e.contact.was_on_floor = true;
        e
    }

    #[test]
    fn input_axes() {
        let i = PlayerInput { left: true, down: true, ..Default::default() };
        assert_eq!(i.horizontal(), -1.0);
        assert_eq!(i.vertical(), 1.0);
        let both = PlayerInput { left: true, right: true, ..Default::default() };
        assert_eq!(both.horizontal(), 0.0);
    }

    #[test]
    fn ground_acceleration_below_max() {
        let cfg = EngineConfig::default();
        let mut e = player(PlayerInput { right: true, ..Default::default() });
        steer(&mut e, &cfg, 1.0);
        assert_eq!(e.motion.xacceleration, cfg.player.acceleration);
        assert_eq!(e.facing, 1.0);
        e.contact.on_floor = false;
        e.contact.was_on_floor = false;
        steer(&mut e, &cfg, 1.0);
        assert_eq!(e.motion.xacceleration, cfg.player.air_acceleration);
        assert_eq!(e.motion.yacceleration, cfg.physics.gravity);
    }

    #[test]
    fn sneaking_caps_at_walk_speed() {
        let cfg = EngineConfig::default();
        let mut e = player(PlayerInput { right: true, sneak: true, ..Default::default() });
        e.motion.xvelocity = 2.05;
        steer(&mut e, &cfg, 1.0);
        assert_eq!(e.motion.xacceleration, 0.0);
        assert_eq!(e.motion.xvelocity, cfg.player.walk_speed);

        e.motion.xvelocity = 3.0;
        steer(&mut e, &cfg, 1.0);
        assert_eq!(e.motion.xdeceleration, cfg.player.friction);
    }

    #[test]
    fn turning_applies_friction() {
        let cfg = EngineConfig::default();
        let mut e = player(PlayerInput { left: true, ..Default::default() });
        e.motion.xvelocity = 3.0;
        steer(&mut e, &cfg, 1.0);
        assert_eq!(e.motion.xdeceleration, cfg.player.friction);
        assert_eq!(e.motion.xacceleration, -cfg.player.acceleration);
    }

    #[test]
    fn slope_contact_sets_slide_speed() {
        let cfg = EngineConfig::default();
        let mut e = player(PlayerInput::default());
        e.contact.slope = Some(0.5);
        steer(&mut e, &cfg, 1.0);
        assert_eq!(e.motion.yvelocity, 0.5);
    }

    #[test]
    fn release_halves_rise_only() {
        let mut e = player(PlayerInput::default());
        e.motion.yvelocity = -6.0;
        jump_release(&mut e);
        assert_eq!(e.motion.yvelocity, -3.0);
        e.motion.yvelocity = 2.0;
        jump_release(&mut e);
        assert_eq!(e.motion.yvelocity, 2.0);
    }

    #[test]
    fn edges() {
        let mut p = PlayerState::new(0, 5);
        p.input.jump = true;
        assert!(p.pressed(|i| i.jump));
        p.prev_input = p.input;
        assert!(!p.pressed(|i| i.jump));
        p.input.jump = false;
        assert!(p.released(|i| i.jump));
    }
}

//! Room entities: the player, creatures, carryables, projectiles and solids.
//!
//! An [`Entity`] is one flat record. What it *is* lives in its [`Variant`];
//! what it *can have done to it* is the fixed [`Capabilities`] set derived
//! from the variant; how it *moves* is the [`Profile`] derived from the
//! variant and the [`EngineConfig`]. Behavior is dispatched on the variant
//! by the interaction module, so there is no per-kind type hierarchy.
//!
//! Variant changes happen in place (a kicked flat iceblock becomes a dashing
//! one under the same [`EntityId`]), which keeps carry links and timeline
//! labels valid across transformations.

use floe_world::prelude::*;
use serde::{Deserialize, Serialize};

use crate::collision::BlockerRef;
use crate::config::EngineConfig;
use crate::interaction::thin_ice::IceState;
use crate::kinematics::Motion;
use crate::player::PlayerState;
use crate::pose::Pose;
use crate::warp::Transit;

// ---------------------------------------------------------------------------
// Variant
// ---------------------------------------------------------------------------

/// Fire or ice, for flowers and what they shoot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Element {
    Fire,
    Ice,
}

/// What an entity is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variant {
    Player(PlayerState),

    WalkingSnowball,
    BouncingSnowball,
    /// Hovers around `home_y`, heading up or down.
    FlyingSnowball { home_y: f64, heading: f64 },
    WalkingIceblock,
    Spiky,
    Jumpy,

    /// Squashed iceblock; can be carried and kicked.
    FlatIceblock,
    ThrownIceblock,
    DashingIceblock,

    Flower { element: Element, ammo: u32 },
    ThrownFlower { element: Element },
    Fireball,
    IceBullet,

    Spring,
    FixedSpring,

    Coin,
    /// Collectible token; one per level.
    Token,
    Checkpoint { dest: String },
    Brick,

    /// Squished remains; expire after a timeout.
    Corpse { of: String },
    /// Ragdoll falling off the stage.
    DeadMan { of: String },
    /// Solid block of ice encasing `inner` until it thaws.
    Frozen { inner: EntityId },
    ThinIce(IceState),
}

impl Variant {
    /// Stable name, used in views, logs and spawn tags.
    pub fn name(&self) -> &'static str {
        match self {
            Variant::Player(_) => "player",
            Variant::WalkingSnowball => "walking_snowball",
            Variant::BouncingSnowball => "bouncing_snowball",
            Variant::FlyingSnowball { .. } => "flying_snowball",
            Variant::WalkingIceblock => "walking_iceblock",
            Variant::Spiky => "spiky",
            Variant::Jumpy => "jumpy",
            Variant::FlatIceblock => "flat_iceblock",
            Variant::ThrownIceblock => "thrown_iceblock",
            Variant::DashingIceblock => "dashing_iceblock",
            Variant::Flower { element: Element::Fire, .. } => "fire_flower",
            Variant::Flower { element: Element::Ice, .. } => "ice_flower",
            Variant::ThrownFlower { element: Element::Fire } => "thrown_fire_flower",
            Variant::ThrownFlower { element: Element::Ice } => "thrown_ice_flower",
            Variant::Fireball => "fireball",
            Variant::IceBullet => "ice_bullet",
            Variant::Spring => "spring",
            Variant::FixedSpring => "fixed_spring",
            Variant::Coin => "coin",
            Variant::Token => "token",
            Variant::Checkpoint { .. } => "checkpoint",
            Variant::Brick => "brick",
            Variant::Corpse { .. } => "corpse",
            Variant::DeadMan { .. } => "dead_man",
            Variant::Frozen { .. } => "frozen",
            Variant::ThinIce(_) => "thin_ice",
        }
    }

    pub fn is_player(&self) -> bool {
        matches!(self, Variant::Player(_))
    }

    pub fn capabilities(&self) -> Capabilities {
        let mut c = Capabilities::default();
        match self {
            Variant::Player(_) => {}
            Variant::WalkingSnowball | Variant::BouncingSnowball | Variant::WalkingIceblock => {
                c.stompable = true;
                c.knockable = true;
                c.burnable = true;
                c.freezable = true;
                c.crowd = true;
                c.crowd_blocking = true;
                c.win_puff = true;
            }
            Variant::FlyingSnowball { .. } => {
                c.stompable = true;
                c.knockable = true;
                c.burnable = true;
                c.freezable = true;
                c.crowd_blocking = true;
                c.win_puff = true;
                c.always_active = true;
                c.killed_by_void = false;
            }
            Variant::Spiky | Variant::Jumpy => {
                c.knockable = true;
                c.burnable = matches!(self, Variant::Spiky);
                c.freezable = true;
                c.crowd = true;
                c.crowd_blocking = true;
                c.win_puff = true;
                c.hazard_immune = true;
            }
            Variant::FlatIceblock => {
                c.stompable = true;
                c.knockable = true;
                c.burnable = true;
                c.freezable = true;
                c.carryable = true;
                c.crowd_blocking = true;
                c.win_puff = true;
            }
            Variant::ThrownIceblock | Variant::DashingIceblock => {
                c.stompable = true;
                c.knockable = true;
                c.burnable = true;
                c.win_puff = true;
            }
            Variant::Flower { .. } => {
                c.knockable = true;
                c.carryable = true;
                c.win_puff = true;
            }
            Variant::ThrownFlower { .. } => {
                c.win_puff = true;
                c.hazard_immune = true;
            }
            Variant::Fireball | Variant::IceBullet => {
                c.hazard_immune = true;
            }
            Variant::Spring => {
                c.stompable = true;
                c.carryable = true;
                c.win_puff = true;
                c.hazard_immune = true;
            }
            Variant::FixedSpring => {
                c.stompable = true;
                c.hazard_immune = true;
            }
            Variant::Token => {
                c.knockable = true;
            }
            Variant::Coin | Variant::Checkpoint { .. } => {
                c.killed_by_void = false;
            }
            Variant::Brick => {
                c.solid = true;
                c.killed_by_void = false;
            }
            Variant::Corpse { .. } | Variant::DeadMan { .. } => {
                c.killed_by_void = false;
                c.hazard_immune = true;
            }
            Variant::Frozen { .. } => {
                c.burnable = true;
                c.freezable = true;
                c.solid = true;
                c.always_active = true;
            }
            Variant::ThinIce(_) => {
                c.solid = true;
                c.killed_by_void = false;
                c.always_active = true;
            }
        }
        c
    }

    /// Movement constants for this variant.
    pub fn profile(&self, cfg: &EngineConfig) -> Profile {
        let g = cfg.physics.gravity;
        let e = &cfg.enemy;
        let o = &cfg.objects;
        let r = &cfg.ranges;
        let enemy = Profile {
            movement: Movement::Walking,
            gravity: g,
            fall_speed: e.fall_speed,
            slide_speed: e.slide_speed,
            walk_speed: e.walk_speed,
            active_range: r.enemy_active_range,
            floor_friction: 0.0,
            stay_on_platform: false,
        };
        match self {
            Variant::Player(_) => Profile {
                movement: Movement::Player,
                gravity: g,
                fall_speed: cfg.player.fall_speed,
                slide_speed: cfg.player.slide_speed,
                walk_speed: cfg.player.walk_speed,
                active_range: r.activate_range,
                ..enemy
            },
            Variant::WalkingSnowball | Variant::BouncingSnowball => enemy,
            Variant::WalkingIceblock | Variant::Spiky => Profile {
                stay_on_platform: true,
                ..enemy
            },
            Variant::Jumpy => Profile {
                walk_speed: 0.0,
                ..enemy
            },
            Variant::FlyingSnowball { .. } => Profile {
                movement: Movement::Hovering,
                gravity: 0.0,
                walk_speed: e.flying_speed,
                ..enemy
            },
            Variant::FlatIceblock => Profile {
                movement: Movement::Falling,
                walk_speed: 0.0,
                ..enemy
            },
            Variant::ThrownIceblock => Profile {
                movement: Movement::Falling,
                gravity: o.iceblock_gravity,
                fall_speed: o.iceblock_fall_speed,
                active_range: r.iceblock_active_range,
                floor_friction: o.iceblock_friction,
                walk_speed: 0.0,
                ..enemy
            },
            Variant::DashingIceblock => Profile {
                gravity: o.iceblock_gravity,
                fall_speed: o.iceblock_fall_speed,
                walk_speed: o.iceblock_dash_speed,
                active_range: r.iceblock_active_range,
                ..enemy
            },
            Variant::Flower { .. } | Variant::Token => Profile {
                movement: Movement::Falling,
                fall_speed: o.flower_fall_speed,
                slide_speed: 0.0,
                walk_speed: 0.0,
                ..enemy
            },
            Variant::ThrownFlower { element } => Profile {
                movement: Movement::Falling,
                gravity: if *element == Element::Fire { o.fireball_gravity / 2.0 } else { g },
                fall_speed: o.flower_fall_speed,
                active_range: r.bullet_active_range,
                walk_speed: 0.0,
                ..enemy
            },
            Variant::Fireball => Profile {
                movement: Movement::Falling,
                gravity: o.fireball_gravity,
                fall_speed: o.fireball_fall_speed,
                active_range: r.bullet_active_range,
                walk_speed: 0.0,
                ..enemy
            },
            Variant::IceBullet => Profile {
                movement: Movement::Straight,
                gravity: 0.0,
                active_range: r.bullet_active_range,
                walk_speed: 0.0,
                ..enemy
            },
            Variant::Spring | Variant::FixedSpring => Profile {
                movement: Movement::Falling,
                gravity: o.spring_gravity,
                fall_speed: o.spring_fall_speed,
                active_range: r.spring_active_range,
                floor_friction: o.spring_friction,
                walk_speed: 0.0,
                ..enemy
            },
            Variant::Corpse { .. } => Profile {
                movement: Movement::Falling,
                walk_speed: 0.0,
                ..enemy
            },
            Variant::DeadMan { .. } => Profile {
                movement: Movement::Ragdoll,
                fall_speed: cfg.player.die_fall_speed,
                walk_speed: 0.0,
                ..enemy
            },
            Variant::Coin
            | Variant::Checkpoint { .. }
            | Variant::Brick
            | Variant::Frozen { .. }
            | Variant::ThinIce(_) => Profile {
                movement: Movement::Static,
                gravity: 0.0,
                walk_speed: 0.0,
                ..enemy
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Capabilities / Profile
// ---------------------------------------------------------------------------

/// What can be done to an entity, fixed per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub stompable: bool,
    pub knockable: bool,
    pub burnable: bool,
    pub freezable: bool,
    pub carryable: bool,
    /// Other crowd walkers turn around on contact.
    pub crowd_blocking: bool,
    /// Walks and turns around on crowd-blocking contact.
    pub crowd: bool,
    /// Destroyed for points when the level is won.
    pub win_puff: bool,
    /// Collides as geometry for everything else.
    pub solid: bool,
    pub killed_by_void: bool,
    pub always_active: bool,
    /// Hazard tiles do nothing to it.
    pub hazard_immune: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            stompable: false,
            knockable: false,
            burnable: false,
            freezable: false,
            carryable: false,
            crowd_blocking: false,
            crowd: false,
            win_puff: false,
            solid: false,
            killed_by_void: true,
            always_active: false,
            hazard_immune: false,
        }
    }
}

/// How an entity moves on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Movement {
    Player,
    /// Gravity, floor snapping, slope sliding.
    Falling,
    /// Falling plus a constant walk speed in the facing direction.
    Walking,
    /// Gravity-free vertical patrol.
    Hovering,
    /// Gravity-free, straight line.
    Straight,
    /// Falls through everything.
    Ragdoll,
    Static,
}

/// Movement constants resolved from the variant and configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Profile {
    pub movement: Movement,
    pub gravity: f64,
    pub fall_speed: f64,
    pub slide_speed: f64,
    pub walk_speed: f64,
    pub active_range: f64,
    /// Horizontal deceleration applied while grounded.
    pub floor_friction: f64,
    /// Turn around at ledges instead of walking off.
    pub stay_on_platform: bool,
}

// ---------------------------------------------------------------------------
// Contact state
// ---------------------------------------------------------------------------

/// What the entity rested on after its last move.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub on_floor: bool,
    pub was_on_floor: bool,
    /// Rise over run of the slope stood on, when only slopes are underneath.
    pub slope: Option<f64>,
    pub floor: Vec<BlockerRef>,
    pub prev_floor: Vec<BlockerRef>,
}

impl Contact {
    /// Roll this frame's floor into the previous-frame slot.
    pub fn advance(&mut self, on_floor: bool, slope: Option<f64>, floor: Vec<BlockerRef>) {
        self.was_on_floor = self.on_floor;
        self.on_floor = on_floor;
        self.slope = slope;
        self.prev_floor = std::mem::replace(&mut self.floor, floor);
    }

    /// Standing on `r` this frame and the one before.
    pub fn stood_on(&self, r: BlockerRef) -> bool {
        self.floor.contains(&r) && self.prev_floor.contains(&r)
    }

    pub fn leave_floor(&mut self) {
        self.on_floor = false;
        self.was_on_floor = false;
        self.slope = None;
    }
}

/// Per-entity alarms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityAlarm {
    HitStun,
    /// Kick pose hold.
    Kick,
    /// Corpse timeout.
    Expire,
    ThawWarn,
    Thaw,
    Shatter,
}

/// Bounding box relative to the entity origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hitbox {
    pub dx: f64,
    pub dy: f64,
    pub width: f64,
    pub height: f64,
}

impl Hitbox {
    pub const fn new(dx: f64, dy: f64, width: f64, height: f64) -> Self {
        Self { dx, dy, width, height }
    }

    /// Default box for a variant.
    pub fn for_variant(variant: &Variant) -> Hitbox {
        match variant {
            Variant::Player(_) => Hitbox::new(3.0, 2.0, 26.0, 30.0),
            Variant::Fireball | Variant::IceBullet => Hitbox::new(8.0, 8.0, 16.0, 16.0),
            Variant::Coin | Variant::Token | Variant::Flower { .. } | Variant::ThrownFlower { .. } => {
                Hitbox::new(4.0, 4.0, 24.0, 28.0)
            }
            Variant::Corpse { .. } => Hitbox::new(0.0, 16.0, 32.0, 16.0),
            _ => Hitbox::new(0.0, 0.0, 32.0, 32.0),
        }
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// One dynamic thing in a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub variant: Variant,
    pub x: f64,
    pub y: f64,
    pub hitbox: Hitbox,
    pub motion: Motion,
    /// +1 facing right, -1 facing left.
    pub facing: f64,
    /// The carrier holding this entity.
    pub parent: Option<EntityId>,
    /// The item this entity holds.
    pub held: Option<EntityId>,
    /// Who threw or kicked this entity; credited for what it collects.
    pub thrower: Option<EntityId>,
    pub tangible: bool,
    pub visible: bool,
    pub active: bool,
    /// Destroyed this frame; its despawn is queued.
    pub dead: bool,
    /// Encased in a frozen block; skipped by every phase.
    pub suspended: bool,
    pub transit: Option<Transit>,
    pub contact: Contact,
    pub alarms: Alarms<EntityAlarm>,
    pub label: Option<TimelineId>,
    pub opacity: f64,
    pub pose: Pose,
    /// Distance actually moved in the last physics pass.
    pub last_move: (f64, f64),
    /// Gravity override while held (`Some(0.0)`) or scripted.
    pub gravity: Option<f64>,
}

impl Entity {
    pub fn new(variant: Variant, x: f64, y: f64) -> Self {
        let capabilities = variant.capabilities();
        Self {
            hitbox: Hitbox::for_variant(&variant),
            variant,
            x,
            y,
            motion: Motion::default(),
            facing: -1.0,
            parent: None,
            held: None,
            thrower: None,
            tangible: true,
            visible: true,
            active: capabilities.always_active,
            dead: false,
            suspended: false,
            transit: None,
            contact: Contact::default(),
            alarms: Alarms::new(),
            label: None,
            opacity: 255.0,
            pose: Pose::Idle,
            last_move: (0.0, 0.0),
            gravity: None,
        }
    }

    pub fn with_label(mut self, label: Option<TimelineId>) -> Self {
        self.label = label;
        self
    }

    /// A tangible entity needs a bounding box with area.
    pub fn check_bounds(&self) -> Result<(), WorldError> {
        let b = self.bbox();
        if b.is_degenerate() {
            return Err(WorldError::DegenerateBounds {
                width: b.width,
                height: b.height,
            });
        }
        Ok(())
    }

    pub fn bbox(&self) -> Rect {
        Rect::new(
            self.x + self.hitbox.dx,
            self.y + self.hitbox.dy,
            self.hitbox.width,
            self.hitbox.height,
        )
    }

    /// Move so the bounding box's left edge is at `left`.
    pub fn set_bbox_left(&mut self, left: f64) {
        self.x = left - self.hitbox.dx;
    }

    pub fn set_bbox_right(&mut self, right: f64) {
        self.x = right - self.hitbox.dx - self.hitbox.width;
    }

    pub fn set_bbox_top(&mut self, top: f64) {
        self.y = top - self.hitbox.dy;
    }

    pub fn set_bbox_bottom(&mut self, bottom: f64) {
        self.y = bottom - self.hitbox.dy - self.hitbox.height;
    }

    pub fn capabilities(&self) -> Capabilities {
        self.variant.capabilities()
    }

    pub fn profile(&self, cfg: &EngineConfig) -> Profile {
        self.variant.profile(cfg)
    }

    /// Gravity in effect, honoring a held or scripted override.
    pub fn gravity(&self, cfg: &EngineConfig) -> f64 {
        self.gravity.unwrap_or_else(|| self.profile(cfg).gravity)
    }

    pub fn player(&self) -> Option<&PlayerState> {
        match &self.variant {
            Variant::Player(p) => Some(p),
            _ => None,
        }
    }

    pub fn player_mut(&mut self) -> Option<&mut PlayerState> {
        match &mut self.variant {
            Variant::Player(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_warping(&self) -> bool {
        self.transit.is_some()
    }

    /// Takes part in the frame at all.
    pub fn is_live(&self) -> bool {
        !self.dead && !self.suspended
    }

    /// Can be touched by other entities this frame.
    pub fn is_touchable(&self) -> bool {
        self.is_live() && self.tangible && self.parent.is_none() && self.transit.is_none()
    }

    /// Swap the variant in place, keeping id, position and carry links. The
    /// hitbox follows the new variant.
    pub fn become_variant(&mut self, variant: Variant) {
        self.hitbox = Hitbox::for_variant(&variant);
        self.variant = variant;
        self.gravity = None;
        if self.capabilities().always_active {
            self.active = true;
        }
    }

    pub fn stop(&mut self) {
        self.motion.stop_horizontal();
        self.motion.stop_vertical();
        self.motion.xdeceleration = 0.0;
        self.motion.ydeceleration = 0.0;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_edges_move_the_origin() {
        let mut e = Entity::new(Variant::WalkingSnowball, 64.0, 32.0);
        assert_eq!(e.bbox(), Rect::new(64.0, 32.0, 32.0, 32.0));
        e.set_bbox_right(100.0);
        assert_eq!(e.bbox().right(), 100.0);
        e.set_bbox_bottom(96.0);
        assert_eq!(e.y, 64.0);
    }

    #[test]
    fn flat_boxes_fail_the_bounds_check() {
        let mut e = Entity::new(Variant::Brick, 0.0, 0.0);
        assert!(e.check_bounds().is_ok());
        e.hitbox.height = 0.0;
        assert!(matches!(e.check_bounds(), Err(WorldError::DegenerateBounds { height, .. }) if height == 0.0));
    }

    #[test]
    fn capability_table_matches_roster() {
        let spiky = Variant::Spiky.capabilities();
        assert!(!spiky.stompable);
        assert!(spiky.crowd && spiky.crowd_blocking);
        let flat = Variant::FlatIceblock.capabilities();
        assert!(flat.carryable && flat.crowd_blocking && !flat.crowd);
        let frozen = Variant::Frozen { inner: EntityId::new(0, 0) }.capabilities();
        assert!(frozen.solid && frozen.burnable && frozen.always_active);
        assert!(!Variant::FlyingSnowball { home_y: 0.0, heading: 1.0 }.capabilities().killed_by_void);
    }

    #[test]
    fn becoming_keeps_links() {
        let parent = EntityId::new(1, 0);
        let mut e = Entity::new(Variant::FlatIceblock, 0.0, 0.0);
        e.parent = Some(parent);
        e.gravity = Some(0.0);
        e.become_variant(Variant::DashingIceblock);
        assert_eq!(e.parent, Some(parent));
        assert_eq!(e.gravity, None);
        assert_eq!(e.variant.name(), "dashing_iceblock");
    }

    #[test]
    fn profiles_follow_config() {
        let cfg = EngineConfig::default();
        let dash = Variant::DashingIceblock.profile(&cfg);
        assert_eq!(dash.walk_speed, 7.0);
        assert_eq!(dash.gravity, 0.6);
        assert_eq!(Variant::Jumpy.profile(&cfg).walk_speed, 0.0);
        assert_eq!(Variant::IceBullet.profile(&cfg).movement, Movement::Straight);
    }
}

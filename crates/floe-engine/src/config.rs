//! Tunable constants, grouped by concern.
//!
//! Every number that shapes the feel of the game lives in [`EngineConfig`].
//! The defaults reproduce the reference game (32-unit tiles, 60 frames per
//! second, gravity 0.25 units/frame²). A JSON document may override any
//! subset of fields; missing fields keep their defaults.
//!
//! ```
//! use floe_engine::config::EngineConfig;
//!
//! let cfg = EngineConfig::from_json_str(r#"{ "player": { "max_hp": 3 } }"#).unwrap();
//! assert_eq!(cfg.player.max_hp, 3);
//! assert_eq!(cfg.player.walk_speed, 2.0);
//! ```

use serde::{Deserialize, Serialize};

/// Loading a configuration failed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid engine config: {0}")]
    Parse(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub fps: f64,
    pub gravity: f64,
    pub tile_size: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            fps: 60.0,
            gravity: 0.25,
            tile_size: 32.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub max_hp: i32,
    pub walk_speed: f64,
    pub run_speed: f64,
    pub max_speed: f64,
    pub acceleration: f64,
    pub air_acceleration: f64,
    pub friction: f64,
    pub air_friction: f64,
    pub jump_height: f64,
    /// Apex when jumping at or above `run_speed`.
    pub run_jump_height: f64,
    pub stomp_height: f64,
    pub fall_speed: f64,
    pub slide_speed: f64,
    pub hitstun_frames: f64,
    pub die_height: f64,
    pub die_fall_speed: f64,
    pub skid_threshold: f64,
    pub kick_frames: f64,
    /// Coins that convert into one HP.
    pub heal_coins: i32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            max_hp: 5,
            walk_speed: 2.0,
            run_speed: 4.0,
            max_speed: 5.0,
            acceleration: 0.2,
            air_acceleration: 0.1,
            friction: 0.17,
            air_friction: 0.03,
            jump_height: 4.0 * 32.0 + 2.0,
            run_jump_height: 5.0 * 32.0 + 2.0,
            stomp_height: 16.0,
            fall_speed: 5.0,
            slide_speed: 1.0,
            hitstun_frames: 120.0,
            die_height: 6.0 * 32.0,
            die_fall_speed: 8.0,
            skid_threshold: 3.0,
            kick_frames: 10.0,
            heal_coins: 20,
        }
    }
}

/// Contact and timing tolerances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaxConfig {
    /// Units searched sideways when bumping a ceiling.
    pub ceiling_lax: u32,
    /// Vertical slack for classifying a sideways contact as a stomp.
    pub stomp_lax: f64,
    /// Alignment slack for entering warps and doors.
    pub warp_lax: f64,
    pub warp_speed: f64,
}

impl Default for LaxConfig {
    fn default() -> Self {
        Self {
            ceiling_lax: 10,
            stomp_lax: 8.0,
            warp_lax: 12.0,
            warp_speed: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyConfig {
    pub walk_speed: f64,
    pub fall_speed: f64,
    pub slide_speed: f64,
    /// Pop-up apex of a knocked enemy.
    pub hit_below_height: f64,
    pub snowball_bounce_height: f64,
    pub jumpy_bounce_height: f64,
    pub flying_speed: f64,
    /// Vertical half-range of a flying snowball's patrol.
    pub flying_range: f64,
    pub corpse_frames: f64,
}

impl Default for EnemyConfig {
    fn default() -> Self {
        Self {
            walk_speed: 1.0,
            fall_speed: 5.0,
            slide_speed: 0.3,
            hit_below_height: 24.0,
            snowball_bounce_height: 3.0 * 32.0 + 2.0,
            jumpy_bounce_height: 128.0,
            flying_speed: 1.0,
            flying_range: 32.0,
            corpse_frames: 90.0,
        }
    }
}

/// Carryables, projectiles and ice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectConfig {
    pub kick_forward_speed: f64,
    pub kick_forward_height: f64,
    pub kick_up_height: f64,
    pub iceblock_gravity: f64,
    pub iceblock_fall_speed: f64,
    pub iceblock_friction: f64,
    pub iceblock_dash_speed: f64,
    pub spring_jump_height: f64,
    pub flower_fall_speed: f64,
    pub flower_ammo: u32,
    pub fireball_speed: f64,
    pub fireball_gravity: f64,
    pub fireball_fall_speed: f64,
    pub fireball_bounce_height: f64,
    pub ice_bullet_speed: f64,
    pub thaw_frames: f64,
    pub thaw_warn_frames: f64,
    /// Dwell time per crack frame on thin ice.
    pub ice_crack_time: f64,
    /// Refreeze speed relative to cracking.
    pub ice_refreeze_rate: f64,
    pub ice_crack_frames: u32,
    pub ice_shatter_frames: f64,
    /// Pop-up apex of a knocked item (flower, token).
    pub item_hit_height: f64,
    pub flower_throw_height: f64,
    pub flower_throw_up_height: f64,
    pub fireball_up_height: f64,
    pub spring_gravity: f64,
    pub spring_fall_speed: f64,
    pub spring_friction: f64,
    /// Frames a door takes to swallow its occupant.
    pub door_frames: f64,
}

impl Default for ObjectConfig {
    fn default() -> Self {
        Self {
            kick_forward_speed: 6.0,
            kick_forward_height: 24.0,
            kick_up_height: 5.0 * 32.0 + 16.0,
            iceblock_gravity: 0.6,
            iceblock_fall_speed: 9.0,
            iceblock_friction: 0.1,
            iceblock_dash_speed: 7.0,
            spring_jump_height: 8.0 * 32.0 + 11.0,
            flower_fall_speed: 5.0,
            flower_ammo: 20,
            fireball_speed: 8.0,
            fireball_gravity: 0.5,
            fireball_fall_speed: 5.0,
            fireball_bounce_height: 16.0,
            ice_bullet_speed: 16.0,
            thaw_frames: 60.0 * 5.0,
            thaw_warn_frames: 60.0,
            ice_crack_time: 20.0,
            ice_refreeze_rate: 1.0 / 4.0,
            ice_crack_frames: 5,
            ice_shatter_frames: 10.0,
            item_hit_height: 16.0,
            flower_throw_height: 16.0,
            flower_throw_up_height: 48.0,
            fireball_up_height: 48.0,
            spring_gravity: 0.6,
            spring_fall_speed: 10.0,
            spring_friction: 0.4,
            door_frames: 20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub hp_points: i64,
    pub second_points: i64,
    pub coin_points: i64,
    pub enemy_kill_points: i64,
    pub token_points: i64,
    pub brick_points: i64,
    /// Win-puff payout per remaining flower shot.
    pub ammo_points: i64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            hp_points: 1000,
            second_points: 100,
            coin_points: 100,
            enemy_kill_points: 50,
            token_points: 5000,
            brick_points: 10,
            ammo_points: 10,
        }
    }
}

/// Room-level sequencing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Frames between time-bonus decrements.
    pub timer_frames: f64,
    pub default_time_bonus: i64,
    pub death_fade_ms: f64,
    pub death_restart_wait: f64,
    pub win_count_start: f64,
    pub win_count_continue: f64,
    pub win_count_mult: f64,
    pub win_count_amount: f64,
    pub win_finish_delay: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timer_frames: 40.0,
            default_time_bonus: 30_000,
            death_fade_ms: 3000.0,
            death_restart_wait: 60.0,
            win_count_start: 120.0,
            win_count_continue: 45.0,
            win_count_mult: 111.0,
            win_count_amount: 1.0,
            win_finish_delay: 120.0,
        }
    }
}

/// Distances around each view that keep things awake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeConfig {
    pub activate_range: f64,
    pub enemy_active_range: f64,
    pub iceblock_active_range: f64,
    pub tile_active_range: f64,
    /// Consecutive out-of-range frames before a tile goes intangible.
    pub tile_grace_frames: u32,
    pub bullet_active_range: f64,
    pub spring_active_range: f64,
    /// How far below the view a player may fall before dying.
    pub death_zone: f64,
}

impl Default for RangeConfig {
    fn default() -> Self {
        Self {
            activate_range: 528.0,
            enemy_active_range: 32.0,
            iceblock_active_range: 400.0,
            tile_active_range: 528.0,
            tile_grace_frames: 3,
            bullet_active_range: 96.0,
            spring_active_range: 464.0,
            death_zone: 64.0,
        }
    }
}

/// How views chase their player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Fraction of the horizontal gap closed per frame.
    pub hspeed: f64,
    /// Fraction of the vertical gap closed per frame while grounded.
    pub vspeed: f64,
    /// Horizontal lead per unit of player speed.
    pub offset_factor: f64,
    pub margin_top: f64,
    pub margin_bottom: f64,
    pub target_margin_bottom: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            hspeed: 0.5,
            vspeed: 1.0 / 20.0,
            offset_factor: 10.0,
            margin_top: 128.0,
            margin_bottom: 160.0,
            target_margin_bottom: 192.0,
        }
    }
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Everything tunable about the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub physics: PhysicsConfig,
    pub player: PlayerConfig,
    pub lax: LaxConfig,
    pub enemy: EnemyConfig,
    pub objects: ObjectConfig,
    pub scoring: ScoringConfig,
    pub session: SessionConfig,
    pub ranges: RangeConfig,
    pub camera: CameraConfig,
    /// Seed for cosmetic randomness (crack sound variety).
    pub seed: u64,
    /// Default view size for rooms that declare none.
    pub view_width: f64,
    pub view_height: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            physics: PhysicsConfig::default(),
            player: PlayerConfig::default(),
            lax: LaxConfig::default(),
            enemy: EnemyConfig::default(),
            objects: ObjectConfig::default(),
            scoring: ScoringConfig::default(),
            session: SessionConfig::default(),
            ranges: RangeConfig::default(),
            camera: CameraConfig::default(),
            seed: 0x5eed,
            view_width: 640.0,
            view_height: 480.0,
        }
    }
}

impl EngineConfig {
    /// Parse a (possibly partial) JSON override.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Milliseconds represented by one frame at `delta_mult`.
    pub fn frame_ms(&self, delta_mult: f64) -> f64 {
        delta_mult * 1000.0 / self.physics.fps
    }

    pub fn view_size(&self) -> (f64, f64) {
        (self.view_width.max(1.0), self.view_height.max(1.0))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_constants() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.physics.gravity, 0.25);
        assert_eq!(cfg.player.jump_height, 130.0);
        assert_eq!(cfg.lax.ceiling_lax, 10);
        assert_eq!(cfg.session.win_count_mult, 111.0);
        assert_eq!(cfg.ranges.tile_grace_frames, 3);
        assert_eq!(cfg.objects.kick_up_height, 176.0);
        assert_eq!(cfg.camera.target_margin_bottom, 192.0);
        assert_eq!(cfg.view_size(), (640.0, 480.0));
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let cfg = EngineConfig::from_json_str(
            r#"{ "physics": { "gravity": 0.4 }, "lax": { "stomp_lax": 4 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.physics.gravity, 0.4);
        assert_eq!(cfg.physics.fps, 60.0);
        assert_eq!(cfg.lax.stomp_lax, 4.0);
        assert_eq!(cfg.lax.warp_lax, 12.0);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let err = EngineConfig::from_json_str("{ nope").unwrap_err();
        assert!(err.to_string().starts_with("invalid engine config"));
    }

    #[test]
    fn frame_ms_scales_with_delta() {
        let cfg = EngineConfig::default();
        assert!((cfg.frame_ms(1.0) - 16.666_666).abs() < 1e-3);
        assert!((cfg.frame_ms(2.0) - 33.333_333).abs() < 1e-3);
    }
}

//! Animation pose selection.
//!
//! Poses are chosen from physics state after the frame's movement is final,
//! so the choice never feeds back into resolution order. The player uses the
//! full table in [`select_player_pose`]; everything else gets the coarse
//! [`select_pose`].
//!
//! | Pose       | Predicate (first match wins)                                  |
//! |------------|---------------------------------------------------------------|
//! | `WarpWalk` | travelling through a warp or door                             |
//! | `Kick`     | kick alarm running                                            |
//! | `Skid`     | grounded, moving against held input at or above skid speed    |
//! | `Run`      | grounded, moving with facing at or above run speed            |
//! | `Walk`     | grounded, moving                                              |
//! | `Stand`    | grounded, still                                               |
//! | `Jump`     | airborne, rising                                              |
//! | `Fall`     | airborne, not rising                                          |

use serde::{Deserialize, Serialize};

/// Animation state exposed to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pose {
    Idle,
    Stand,
    Walk,
    Run,
    Skid,
    Jump,
    Fall,
    Kick,
    WarpWalk,
}

impl Pose {
    pub fn name(self) -> &'static str {
        match self {
            Pose::Idle => "idle",
            Pose::Stand => "stand",
            Pose::Walk => "walk",
            Pose::Run => "run",
            Pose::Skid => "skid",
            Pose::Jump => "jump",
            Pose::Fall => "fall",
            Pose::Kick => "kick",
            Pose::WarpWalk => "warp_walk",
        }
    }
}

/// Physics facts the player's pose depends on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseInputs {
    pub grounded: bool,
    pub xvelocity: f64,
    pub yvelocity: f64,
    pub facing: f64,
    /// Horizontal input, -1, 0 or 1.
    pub h_control: f64,
    pub kicking: bool,
    pub warping: bool,
    /// Already skidding last frame; a skid persists until the mover turns.
    pub skidding: bool,
    pub skid_threshold: f64,
    pub run_speed: f64,
}

pub fn select_player_pose(i: &PoseInputs) -> Pose {
    if i.warping {
        return Pose::WarpWalk;
    }
    if i.kicking {
        return Pose::Kick;
    }
    if !i.grounded {
        return if i.yvelocity < 0.0 { Pose::Jump } else { Pose::Fall };
    }
    let speed = i.xvelocity.abs();
    if speed == 0.0 {
        return Pose::Stand;
    }
    let heading = i.xvelocity.signum();
    if heading != i.facing
        && (i.skidding || (i.h_control != 0.0 && speed >= i.skid_threshold))
    {
        return Pose::Skid;
    }
    if heading == i.facing && speed >= i.run_speed {
        Pose::Run
    } else {
        Pose::Walk
    }
}

/// Pose for anything that is not a player.
pub fn select_pose(grounded: bool, xvelocity: f64, yvelocity: f64) -> Pose {
    match (grounded, xvelocity != 0.0) {
        (true, true) => Pose::Walk,
        (true, false) => Pose::Idle,
        (false, _) if yvelocity < 0.0 => Pose::Jump,
        (false, _) => Pose::Fall,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn grounded(xv: f64, facing: f64, h: f64) -> PoseInputs {
        PoseInputs {
            grounded: true,
            xvelocity: xv,
            yvelocity: 0.0,
            facing,
            h_control: h,
            kicking: false,
            warping: false,
            skidding: false,
            skid_threshold: 3.0,
            run_speed: 4.0,
        }
    }

    #[test]
    fn ground_poses_by_speed() {
        assert_eq!(select_player_pose(&grounded(0.0, 1.0, 0.0)), Pose::Stand);
        assert_eq!(select_player_pose(&grounded(2.0, 1.0, 1.0)), Pose::Walk);
        assert_eq!(select_player_pose(&grounded(4.5, 1.0, 1.0)), Pose::Run);
    }

    #[test]
    fn turning_at_speed_skids() {
        // Facing already flipped to the input, still sliding the other way.
        assert_eq!(select_player_pose(&grounded(3.5, -1.0, -1.0)), Pose::Skid);
        assert_eq!(select_player_pose(&grounded(2.0, -1.0, -1.0)), Pose::Walk);
        let mut coasting = grounded(1.0, -1.0, 0.0);
        coasting.skidding = true;
        assert_eq!(select_player_pose(&coasting), Pose::Skid);
    }

    #[test]
    fn warp_and_kick_override_physics() {
        let mut i = grounded(4.5, 1.0, 1.0);
        i.kicking = true;
        assert_eq!(select_player_pose(&i), Pose::Kick);
        i.warping = true;
        assert_eq!(select_player_pose(&i), Pose::WarpWalk);
    }

    #[test]
    fn airborne_poses() {
        let mut i = grounded(1.0, 1.0, 0.0);
        i.grounded = false;
        i.yvelocity = -3.0;
        assert_eq!(select_player_pose(&i), Pose::Jump);
        i.yvelocity = 0.0;
        assert_eq!(select_player_pose(&i), Pose::Fall);
        assert_eq!(select_pose(false, 0.0, 1.0), Pose::Fall);
        assert_eq!(select_pose(true, -1.0, 0.0), Pose::Walk);
    }
}

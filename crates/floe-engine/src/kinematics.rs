//! Velocity integration with delta timing.
//!
//! Each frame carries a `delta_mult`: elapsed time divided by the nominal
//! frame duration (1.0 at a steady 60 fps, 2.0 if a frame took twice as long).
//! [`Motion::integrate`] scales acceleration and deceleration by it and
//! returns the positional delta using the average of the old and new velocity,
//! which is exact for constant acceleration. A jump launched with
//! [`jump_speed`] therefore peaks at exactly the requested height whenever
//! the apex falls on a frame boundary, at any `delta_mult`.

use serde::{Deserialize, Serialize};

/// Per-axis velocity, acceleration and deceleration of an entity.
///
/// Deceleration is a magnitude that always pulls velocity toward zero; it is
/// how friction is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Motion {
    pub xvelocity: f64,
    pub yvelocity: f64,
    pub xacceleration: f64,
    pub yacceleration: f64,
    pub xdeceleration: f64,
    pub ydeceleration: f64,
    /// Terminal downward speed set by [`Motion::fall`]. Gravity never pushes
    /// `yvelocity` past it.
    #[serde(default)]
    pub fall_cap: Option<f64>,
}

/// Apply `accel` then `decel` to one velocity component; returns the new
/// velocity. Deceleration stops at zero instead of crossing it.
fn step_axis(velocity: f64, accel: f64, decel: f64, delta_mult: f64) -> f64 {
    let mut v = velocity + accel * delta_mult;
    let d = decel.abs() * delta_mult;
    if d > 0.0 {
        if v.abs() > d {
            v -= d.copysign(v);
        } else {
            v = 0.0;
        }
    }
    v
}

impl Motion {
    /// Advance velocities by one frame and return the `(dx, dy)` the entity
    /// should attempt to move.
    pub fn integrate(&mut self, delta_mult: f64) -> (f64, f64) {
        let delta_mult = delta_mult.max(0.0);
        let (xi, yi) = (self.xvelocity, self.yvelocity);
        self.xvelocity = step_axis(xi, self.xacceleration, self.xdeceleration, delta_mult);
        self.yvelocity = step_axis(yi, self.yacceleration, self.ydeceleration, delta_mult);
        if let Some(cap) = self.fall_cap {
            if self.yacceleration > 0.0 && yi <= cap && self.yvelocity > cap {
                self.yvelocity = cap;
            }
        }
        (
            (xi + self.xvelocity) / 2.0 * delta_mult,
            (yi + self.yvelocity) / 2.0 * delta_mult,
        )
    }

    /// Set up vertical motion for free fall toward `fall_speed`.
    ///
    /// Below the cap, gravity accelerates and the next integration stops at
    /// the cap. At or past it, velocity is pinned to the cap and gravity is
    /// switched off.
    pub fn fall(&mut self, gravity: f64, fall_speed: f64) {
        self.fall_cap = Some(fall_speed);
        if self.yvelocity < fall_speed {
            self.yacceleration = gravity;
        } else {
            self.yvelocity = fall_speed;
            self.yacceleration = 0.0;
        }
    }

    /// Vertical contact: stop vertical motion entirely.
    pub fn stop_vertical(&mut self) {
        self.yvelocity = 0.0;
        self.yacceleration = 0.0;
    }

    pub fn stop_horizontal(&mut self) {
        self.xvelocity = 0.0;
        self.xacceleration = 0.0;
    }
}

/// Initial upward speed that peaks exactly `height` units above the launch
/// point under constant `gravity`: `-sqrt(2 g h)`.
///
/// Every jump, bounce and pop-up height goes through here.
pub fn jump_speed(height: f64, gravity: f64) -> f64 {
    -(2.0 * gravity.max(0.0) * height.max(0.0)).sqrt()
}

/// Vertical speed that keeps an entity pressed onto a slope whose bounding
/// box rises `rise` over `run`.
pub fn slide_speed(slide_speed: f64, rise: f64, run: f64) -> f64 {
    if run <= 0.0 {
        return slide_speed;
    }
    slide_speed * rise / run
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deceleration_clamps_at_zero() {
        let mut m = Motion {
            xvelocity: 0.1,
            xdeceleration: 0.17,
            ..Default::default()
        };
        m.integrate(1.0);
        assert_eq!(m.xvelocity, 0.0);

        let mut m = Motion {
            xvelocity: -1.0,
            xdeceleration: 0.25,
            ..Default::default()
        };
        m.integrate(2.0);
        assert_eq!(m.xvelocity, -0.5);
    }

    #[test]
    fn displacement_uses_average_velocity() {
        let mut m = Motion {
            xvelocity: 2.0,
            xacceleration: 1.0,
            ..Default::default()
        };
        let (dx, dy) = m.integrate(1.0);
        assert_eq!(m.xvelocity, 3.0);
        assert_eq!(dx, 2.5);
        assert_eq!(dy, 0.0);
    }

    #[test]
    fn jump_reaches_requested_apex() {
        // v = 4, g = 0.25: apex after exactly 16 frames.
        let mut m = Motion {
            yvelocity: jump_speed(32.0, 0.25),
            yacceleration: 0.25,
            ..Default::default()
        };
        assert_eq!(m.yvelocity, -4.0);
        let mut y = 0.0;
        for _ in 0..16 {
            y += m.integrate(1.0).1;
        }
        assert!((y + 32.0).abs() < 1e-9, "apex {y}");
        assert!(m.yvelocity.abs() < 1e-12);
    }

    #[test]
    fn fall_switches_gravity_off_at_cap() {
        let mut m = Motion {
            yvelocity: 4.9,
            ..Default::default()
        };
        m.fall(0.25, 5.0);
        assert_eq!(m.yacceleration, 0.25);
        m.integrate(1.0);
        m.fall(0.25, 5.0);
        assert_eq!(m.yvelocity, 5.0);
        assert_eq!(m.yacceleration, 0.0);
        let (_, dy) = m.integrate(3.0);
        assert_eq!(m.yvelocity, 5.0);
        assert_eq!(dy, 15.0);
    }

    #[test]
    fn long_frame_does_not_overshoot_fall_cap() {
        let mut m = Motion {
            yvelocity: 4.9,
            ..Default::default()
        };
        m.fall(0.5, 5.0);
        let (_, dy) = m.integrate(2.0);
        assert_eq!(m.yvelocity, 5.0);
        assert!((dy - 9.9).abs() < 1e-9, "moved {dy}");

        let mut rising = Motion {
            yvelocity: -3.0,
            ..Default::default()
        };
        rising.fall(1.0, 5.0);
        for _ in 0..20 {
            rising.integrate(1.5);
            assert!(rising.yvelocity <= 5.0);
            rising.fall(1.0, 5.0);
        }
        assert_eq!(rising.yvelocity, 5.0);
    }

    #[test]
    fn negative_delta_is_treated_as_zero() {
        let mut m = Motion {
            xvelocity: 3.0,
            xacceleration: 1.0,
            ..Default::default()
        };
        assert_eq!(m.integrate(-1.0), (0.0, 0.0));
        assert_eq!(m.xvelocity, 3.0);
    }

    #[test]
    fn slide_speed_uses_rise_over_run() {
        assert_eq!(slide_speed(1.0, 16.0, 32.0), 0.5);
        assert_eq!(slide_speed(0.3, 32.0, 32.0), 0.3);
        assert_eq!(jump_speed(-5.0, 0.25), -0.0);
    }
}

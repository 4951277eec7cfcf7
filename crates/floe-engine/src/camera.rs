//! Views that chase their player.

use floe_world::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::CameraConfig;

/// One viewport into the room.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// What a view follows this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraTarget {
    pub x: f64,
    pub y: f64,
    pub xvelocity: f64,
    /// Grounded two frames running, or in a warp.
    pub settled: bool,
}

impl View {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    /// Jump straight to the resting position for `target`.
    pub fn center_on(&mut self, target: &CameraTarget, cfg: &CameraConfig) {
        self.x = target.x - self.width / 2.0;
        self.y = target.y - self.height + cfg.target_margin_bottom;
    }

    /// Ease toward `target`, then keep it inside the vertical margins.
    ///
    /// Horizontally the view leads in the direction of travel. Vertically it
    /// only re-centers while the target is settled, so jumps do not bob the
    /// screen.
    pub fn follow(&mut self, target: &CameraTarget, cfg: &CameraConfig) {
        let target_x = target.x - self.width / 2.0 + target.xvelocity * cfg.offset_factor;
        if (target_x - self.x).abs() > 0.5 {
            self.x += (target_x - self.x) * cfg.hspeed;
        } else {
            self.x = target_x;
        }

        if target.settled {
            let target_y = target.y - self.height + cfg.target_margin_bottom;
            if (target_y - self.y).abs() > 0.5 {
                self.y += (target_y - self.y) * cfg.vspeed;
            } else {
                self.y = target_y;
            }
        }

        let min_y = target.y - self.height + cfg.margin_bottom;
        let max_y = target.y - cfg.margin_top;
        if self.y < min_y {
            self.y = min_y;
        } else if self.y > max_y {
            self.y = max_y;
        }
    }

    /// Keep the view inside a `width` by `height` room. Rooms smaller than
    /// the view pin it to the origin.
    pub fn clamp_to(&mut self, width: f64, height: f64) {
        self.x = self.x.min(width - self.width).max(0.0);
        self.y = self.y.min(height - self.height).max(0.0);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn target(x: f64, y: f64, settled: bool) -> CameraTarget {
        CameraTarget {
            x,
            y,
            xvelocity: 0.0,
            settled,
        }
    }

    #[test]
    fn closes_half_the_horizontal_gap() {
        let cfg = CameraConfig::default();
        let mut view = View::new(640.0, 480.0);
        view.follow(&target(420.0, 288.0, true), &cfg);
        // Target x is 100; half of it is covered.
        assert_eq!(view.x, 50.0);
    }

    #[test]
    fn snaps_when_close() {
        let cfg = CameraConfig::default();
        let mut view = View::new(640.0, 480.0);
        view.x = 99.7;
        view.follow(&target(420.0, 288.0, true), &cfg);
        assert_eq!(view.x, 100.0);
    }

    #[test]
    fn vertical_margins_bound_the_view() {
        let cfg = CameraConfig::default();
        let mut view = View::new(640.0, 480.0);
        view.y = 0.0;
        // Airborne far below: no easing, but the margin drags the view down.
        view.follow(&target(320.0, 1000.0, false), &cfg);
        assert_eq!(view.y, 1000.0 - 480.0 + 160.0);
    }

    #[test]
    fn clamp_keeps_view_in_room() {
        let mut view = View::new(640.0, 480.0);
        view.x = -30.0;
        view.y = 900.0;
        view.clamp_to(2000.0, 960.0);
        assert_eq!((view.x, view.y), (0.0, 480.0));
        view.clamp_to(320.0, 240.0);
        assert_eq!((view.x, view.y), (0.0, 0.0));
    }
}

//! Tile and slope collision resolution.
//!
//! Movement is resolved one axis at a time, horizontal first:
//!
//! 1. [`sweep_x`] advances in sub-steps of at most one unit. Each sub-step
//!    stops at the first wall face in the way, then lifts the mover onto any
//!    floor slope it walked into, and, when the mover was standing, keeps it
//!    glued to slopes it walks down.
//! 2. [`sweep_y`] finds the nearest floor (falling) or ceiling (rising). Flat
//!    faces are considered before slope surfaces, so a flat tile directly
//!    below always wins a tie.
//! 3. [`touching`] reports what the mover rests against on every side after
//!    the move. Slope floor contacts are reported separately and only when no
//!    flat floor is under the mover.
//!
//! Solid entities (thin ice, frozen enemies, bricks) take part through
//! [`Blocker`]s alongside tiles, tagged with a [`BlockerRef`] so the caller
//! can tell which one it hit.

use floe_world::prelude::*;
use serde::{Deserialize, Serialize};

/// Distance under which two faces count as touching.
pub const CONTACT_EPSILON: f64 = 1e-6;
/// Slope surfaces are computed, not snapped, so allow a looser contact band.
const SLOPE_EPSILON: f64 = 1e-4;
/// How far below a slope surface a falling mover may be caught and lifted.
const SLOPE_GRAB: f64 = 1.0;
const MAX_SUBSTEP: f64 = 1.0;
/// Steepest rise per unit of run the mover will climb or descend while
/// walking.
const MAX_CLIMB_RATIO: f64 = 2.0;

// ---------------------------------------------------------------------------
// Blockers
// ---------------------------------------------------------------------------

/// What a blocker came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BlockerRef {
    Tile(TileId),
    Entity(EntityId),
}

/// A solid shape the resolver can stop against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blocker {
    pub rect: Rect,
    pub shape: TileShape,
    pub source: BlockerRef,
}

impl Blocker {
    fn as_tile(&self) -> Tile {
        Tile::new(self.rect, self.shape)
    }

    fn surface_under(&self, mover: &Rect) -> Option<f64> {
        self.as_tile().surface_under(mover)
    }

    fn ceiling_over(&self, mover: &Rect) -> Option<f64> {
        self.as_tile().ceiling_over(mover)
    }

    /// Rise over run of the blocker's box; meaningful for slopes.
    pub fn slope_ratio(&self) -> f64 {
        self.as_tile().slope_ratio()
    }
}

/// The geometry one mover collides against: the tile map plus this frame's
/// solid entities, minus the mover itself.
#[derive(Debug, Clone, Copy)]
pub struct Geometry<'a> {
    tiles: &'a TileMap,
    solids: &'a [Blocker],
    exclude: Option<EntityId>,
}

impl<'a> Geometry<'a> {
    pub fn new(tiles: &'a TileMap, solids: &'a [Blocker]) -> Self {
        Self {
            tiles,
            solids,
            exclude: None,
        }
    }

    /// Ignore the solid entity `id` (a solid entity never collides with
    /// itself).
    pub fn excluding(mut self, id: EntityId) -> Self {
        self.exclude = Some(id);
        self
    }

    /// Solid blockers touching or inside `region`.
    pub fn gather(&self, region: &Rect) -> Vec<Blocker> {
        let mut ids = Vec::new();
        self.tiles.query(region, &mut ids);
        let mut out: Vec<Blocker> = ids
            .into_iter()
            .filter_map(|id| {
                let tile = self.tiles.get(id)?;
                (!tile.shape.is_trigger()).then_some(Blocker {
                    rect: tile.rect,
                    shape: tile.shape,
                    source: BlockerRef::Tile(id),
                })
            })
            .collect();
        let excluded = self.exclude.map(BlockerRef::Entity);
        out.extend(self.solids.iter().copied().filter(|b| {
            Some(b.source) != excluded
                && b.rect.left() <= region.right()
                && region.left() <= b.rect.right()
                && b.rect.top() <= region.bottom()
                && region.top() <= b.rect.bottom()
        }));
        out
    }

    /// Trigger tiles (death, level end) whose interior overlaps `bbox`.
    pub fn triggers(&self, bbox: &Rect) -> Vec<(TileId, TileShape)> {
        let mut ids = Vec::new();
        self.tiles.query(bbox, &mut ids);
        ids.into_iter()
            .filter_map(|id| {
                let tile = self.tiles.get(id)?;
                (tile.shape.is_trigger() && tile.rect.overlaps(bbox)).then_some((id, tile.shape))
            })
            .collect()
    }

    /// Whether `rect` is inside something solid from both sides.
    pub fn overlaps_solid(&self, rect: &Rect) -> bool {
        self.gather(rect).iter().any(|b| {
            b.shape.blocks(Side::Left) && b.shape.blocks(Side::Right) && b.rect.overlaps(rect)
        })
    }
}

// ---------------------------------------------------------------------------
// Touching
// ---------------------------------------------------------------------------

/// Blockers resting against each side of a mover.
#[derive(Debug, Clone, Default)]
pub struct Touching {
    pub left: Vec<Blocker>,
    pub right: Vec<Blocker>,
    pub top: Vec<Blocker>,
    /// Flat floors.
    pub bottom: Vec<Blocker>,
    /// Slope floors; empty whenever `bottom` is not.
    pub slopes: Vec<Blocker>,
}

impl Touching {
    pub fn on_floor(&self) -> bool {
        !self.bottom.is_empty() || !self.slopes.is_empty()
    }

    /// The slope being stood on, if the mover stands only on slopes.
    pub fn slope(&self) -> Option<&Blocker> {
        self.slopes.first()
    }

    /// Everything under the mover.
    pub fn floor_refs(&self) -> Vec<BlockerRef> {
        self.bottom.iter().chain(&self.slopes).map(|b| b.source).collect()
    }
}

/// What `bbox` is resting against.
pub fn touching(geo: &Geometry<'_>, bbox: &Rect) -> Touching {
    let mut t = Touching::default();
    for b in geo.gather(&bbox.expanded(1.0)) {
        let r = &b.rect;
        if b.shape.blocks(Side::Right)
            && (r.right() - bbox.left()).abs() <= CONTACT_EPSILON
            && bbox.overlaps_y(r, CONTACT_EPSILON)
        {
            t.left.push(b);
        }
        if b.shape.blocks(Side::Left)
            && (r.left() - bbox.right()).abs() <= CONTACT_EPSILON
            && bbox.overlaps_y(r, CONTACT_EPSILON)
        {
            t.right.push(b);
        }
        if b.shape.blocks(Side::Bottom)
            && (r.bottom() - bbox.top()).abs() <= CONTACT_EPSILON
            && bbox.overlaps_x(r, CONTACT_EPSILON)
        {
            t.top.push(b);
        }
        if let Some(c) = b.ceiling_over(bbox) {
            if (c - bbox.top()).abs() <= SLOPE_EPSILON {
                t.top.push(b);
            }
        }
        if b.shape.blocks(Side::Top)
            && (r.top() - bbox.bottom()).abs() <= CONTACT_EPSILON
            && bbox.overlaps_x(r, CONTACT_EPSILON)
        {
            t.bottom.push(b);
        }
        if let Some(s) = b.surface_under(bbox) {
            if (s - bbox.bottom()).abs() <= SLOPE_EPSILON {
                t.slopes.push(b);
            }
        }
    }
    if !t.bottom.is_empty() {
        t.slopes.clear();
    }
    t
}

// ---------------------------------------------------------------------------
// Sweeps
// ---------------------------------------------------------------------------

/// Result of resolving motion along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sweep {
    /// Distance actually travelled along the swept axis.
    pub moved: f64,
    /// Vertical adjustment made while sweeping horizontally (slope climbing
    /// and descending). Always zero for vertical sweeps.
    pub lift: f64,
    /// The blocker that cut the motion short.
    pub hit: Option<Blocker>,
}

impl Sweep {
    /// Distance requested but not travelled.
    pub fn loss(&self, requested: f64) -> f64 {
        requested - self.moved
    }
}

/// Resolve vertical motion `dy` for `bbox`.
pub fn sweep_y(geo: &Geometry<'_>, bbox: &Rect, dy: f64) -> Sweep {
    if dy == 0.0 {
        return Sweep::default();
    }
    let region = bbox
        .union(&bbox.translated(0.0, dy))
        .expanded(1.0 + SLOPE_GRAB);
    let blockers = geo.gather(&region);
    let mut best = dy.abs();
    let mut hit: Option<Blocker> = None;
    let consider = |gap: f64, b: Blocker, best: &mut f64, hit: &mut Option<Blocker>| {
        let better = if hit.is_none() { gap <= *best } else { gap < *best };
        if better {
            *best = gap;
            *hit = Some(b);
        }
    };

    if dy > 0.0 {
        for b in blockers.iter().filter(|b| b.shape.blocks(Side::Top)) {
            let gap = b.rect.top() - bbox.bottom();
            if gap >= -CONTACT_EPSILON && bbox.overlaps_x(&b.rect, CONTACT_EPSILON) {
                consider(gap.max(0.0), *b, &mut best, &mut hit);
            }
        }
        for b in &blockers {
            if let Some(s) = b.surface_under(bbox) {
                let gap = s - bbox.bottom();
                if gap >= -SLOPE_GRAB {
                    consider(gap, *b, &mut best, &mut hit);
                }
            }
        }
        Sweep {
            moved: best,
            lift: 0.0,
            hit,
        }
    } else {
        for b in blockers.iter().filter(|b| b.shape.blocks(Side::Bottom)) {
            let gap = bbox.top() - b.rect.bottom();
            if gap >= -CONTACT_EPSILON && bbox.overlaps_x(&b.rect, CONTACT_EPSILON) {
                consider(gap.max(0.0), *b, &mut best, &mut hit);
            }
        }
        for b in &blockers {
            if let Some(c) = b.ceiling_over(bbox) {
                let gap = bbox.top() - c;
                if gap >= -SLOPE_GRAB {
                    consider(gap, *b, &mut best, &mut hit);
                }
            }
        }
        Sweep {
            moved: -best,
            lift: 0.0,
            hit,
        }
    }
}

/// Resolve horizontal motion `dx` for `bbox`.
///
/// `sticky` enables ground following: a mover standing on the floor at the
/// start of the sweep steps up small rises and stays on slopes it walks down.
/// Pass `false` for anything moving upward or not meant to hug the ground.
pub fn sweep_x(geo: &Geometry<'_>, bbox: &Rect, dx: f64, sticky: bool) -> Sweep {
    if dx == 0.0 {
        return Sweep::default();
    }
    let steps = (dx.abs() / MAX_SUBSTEP).ceil().max(1.0) as usize;
    let step = dx / steps as f64;
    let climb = step.abs() * MAX_CLIMB_RATIO + CONTACT_EPSILON;
    let face = if step > 0.0 { Side::Left } else { Side::Right };

    let start = touching(geo, bbox);
    let mut supported = sticky && start.on_floor();
    let mut on_slope = !start.slopes.is_empty();
    let mut cur = *bbox;
    let mut out = Sweep::default();

    for _ in 0..steps {
        let region = cur
            .union(&cur.translated(step, 0.0))
            .expanded(climb + 1.0);
        let blockers = geo.gather(&region);

        let mut allowed = step.abs();
        let mut wall = None;
        for b in &blockers {
            if !b.shape.blocks(face) || !cur.overlaps_y(&b.rect, CONTACT_EPSILON) {
                continue;
            }
            if supported && b.shape.blocks(Side::Top) {
                let rise = cur.bottom() - b.rect.top();
                if rise > 0.0 && rise <= climb {
                    continue;
                }
            }
            let gap = if step > 0.0 {
                b.rect.left() - cur.right()
            } else {
                cur.left() - b.rect.right()
            };
            if gap < -CONTACT_EPSILON {
                continue;
            }
            let gap = gap.max(0.0);
            if gap < allowed {
                allowed = gap;
                wall = Some(*b);
            }
        }
        let advance = allowed.copysign(step);
        cur = cur.translated(advance, 0.0);
        out.moved += advance;

        let mut raise_to: Option<f64> = None;
        for b in &blockers {
            let surface = if b.shape.is_floor_slope() {
                b.surface_under(&cur)
            } else if supported
                && b.shape.blocks(Side::Top)
                && cur.overlaps_x(&b.rect, CONTACT_EPSILON)
            {
                Some(b.rect.top())
            } else {
                None
            };
            if let Some(s) = surface {
                let rise = cur.bottom() - s;
                if rise > CONTACT_EPSILON && rise <= climb {
                    raise_to = Some(raise_to.map_or(s, |r: f64| r.min(s)));
                }
            }
        }
        if let Some(s) = raise_to {
            let d = s - cur.bottom();
            cur = cur.translated(0.0, d);
            out.lift += d;
        } else if supported {
            let probe = sweep_y(geo, &cur, climb);
            if let Some(b) = probe.hit {
                if b.shape.is_floor_slope() || on_slope {
                    cur = cur.translated(0.0, probe.moved);
                    out.lift += probe.moved;
                }
            }
        }

        if wall.is_some() {
            out.hit = wall;
            break;
        }
        let now = touching(geo, &cur);
        supported = supported && now.on_floor();
        on_slope = !now.slopes.is_empty();
    }
    out
}

/// Search sideways for a lane past a ceiling.
///
/// Tries up to `lax` one-unit shifts to the left, then to the right,
/// stopping early in a direction when a wall is in the way. Returns the
/// horizontal offset of the first position with nothing overhead.
pub fn ceiling_lax(geo: &Geometry<'_>, bbox: &Rect, lax: u32) -> Option<f64> {
    for dir in [-1.0, 1.0] {
        let mut cur = *bbox;
        for i in 1..=lax {
            let t = touching(geo, &cur);
            let walled = if dir < 0.0 { !t.left.is_empty() } else { !t.right.is_empty() };
            if walled {
                break;
            }
            cur = cur.translated(dir, 0.0);
            if geo.overlaps_solid(&cur) {
                break;
            }
            if touching(geo, &cur).top.is_empty() {
                return Some(dir * i as f64);
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn map(tiles: &[(f64, f64, f64, f64, TileShape)]) -> TileMap {
        let mut m = TileMap::new(32.0);
        for &(x, y, w, h, shape) in tiles {
            m.insert(Rect::new(x, y, w, h), shape).unwrap();
        }
        m
    }

    // -- vertical -----------------------------------------------------------

    #[test]
    fn falls_onto_flat_floor() {
        let tiles = map(&[(0.0, 64.0, 128.0, 32.0, TileShape::Solid)]);
        let geo = Geometry::new(&tiles, &[]);
        let bbox = Rect::new(10.0, 30.0, 20.0, 30.0);
        let sweep = sweep_y(&geo, &bbox, 8.0);
        assert_eq!(sweep.moved, 4.0);
        assert!(sweep.hit.is_some());
        let landed = bbox.translated(0.0, sweep.moved);
        assert!(touching(&geo, &landed).on_floor());
    }

    #[test]
    fn one_way_platform_passes_from_below() {
        let tiles = map(&[(0.0, 64.0, 128.0, 8.0, TileShape::SolidTop)]);
        let geo = Geometry::new(&tiles, &[]);
        let below = Rect::new(10.0, 80.0, 20.0, 30.0);
        let up = sweep_y(&geo, &below, -40.0);
        assert_eq!(up.moved, -40.0);
        assert!(up.hit.is_none());
        let above = Rect::new(10.0, 20.0, 20.0, 30.0);
        assert_eq!(sweep_y(&geo, &above, 40.0).moved, 14.0);
    }

    #[test]
    fn ceiling_stops_rise() {
        let tiles = map(&[(0.0, 0.0, 128.0, 32.0, TileShape::Solid)]);
        let geo = Geometry::new(&tiles, &[]);
        let bbox = Rect::new(10.0, 40.0, 20.0, 30.0);
        let sweep = sweep_y(&geo, &bbox, -20.0);
        assert_eq!(sweep.moved, -8.0);
        assert_eq!(sweep.loss(-20.0), -12.0);
    }

    #[test]
    fn flat_floor_wins_over_slope() {
        let tiles = map(&[
            (0.0, 64.0, 32.0, 32.0, TileShape::Solid),
            (32.0, 64.0, 32.0, 32.0, TileShape::SlopeTopRight),
        ]);
        let geo = Geometry::new(&tiles, &[]);
        // Straddling the seam, resting on the flat tile's top.
        let bbox = Rect::new(20.0, 34.0, 20.0, 30.0);
        let t = touching(&geo, &bbox);
        assert_eq!(t.bottom.len(), 1);
        assert!(t.slopes.is_empty());
    }

    // -- horizontal ---------------------------------------------------------

    #[test]
    fn wall_stops_horizontal_motion() {
        let tiles = map(&[(64.0, 0.0, 32.0, 96.0, TileShape::Solid)]);
        let geo = Geometry::new(&tiles, &[]);
        let bbox = Rect::new(30.0, 30.0, 20.0, 30.0);
        let sweep = sweep_x(&geo, &bbox, 20.0, false);
        assert!((sweep.moved - 14.0).abs() < 1e-9);
        assert!(sweep.hit.is_some());
        let moved = bbox.translated(sweep.moved, 0.0);
        assert_eq!(touching(&geo, &moved).right.len(), 1);
    }

    #[test]
    fn one_sided_walls_only_block_their_face() {
        let tiles = map(&[(64.0, 0.0, 32.0, 96.0, TileShape::SolidRight)]);
        let geo = Geometry::new(&tiles, &[]);
        let bbox = Rect::new(30.0, 30.0, 20.0, 30.0);
        assert_eq!(sweep_x(&geo, &bbox, 20.0, false).moved, 20.0);
        let past = Rect::new(100.0, 30.0, 20.0, 30.0);
        assert!((sweep_x(&geo, &past, -10.0, false).moved + 4.0).abs() < 1e-9);
    }

    #[test]
    fn walks_up_and_down_a_slope() {
        // Flat floor, then a 45-degree slope rising to the right, then flat.
        let tiles = map(&[
            (0.0, 96.0, 64.0, 32.0, TileShape::Solid),
            (64.0, 64.0, 32.0, 32.0, TileShape::SlopeTopLeft),
            (64.0, 96.0, 32.0, 32.0, TileShape::Solid),
            (96.0, 64.0, 64.0, 64.0, TileShape::Solid),
        ]);
        let geo = Geometry::new(&tiles, &[]);
        let start = Rect::new(30.0, 66.0, 20.0, 30.0);
        assert!(touching(&geo, &start).on_floor());

        let up = sweep_x(&geo, &start, 30.0, true);
        assert!(up.hit.is_none(), "slope must not act as a wall");
        let after = start.translated(up.moved, up.lift);
        // Right edge at x=80: sixteen units up the slope.
        assert!((after.bottom() - 80.0).abs() < 1e-6, "bottom {}", after.bottom());
        assert!(touching(&geo, &after).on_floor());

        let over = sweep_x(&geo, &after, 30.0, true);
        let top = after.translated(over.moved, over.lift);
        assert!((top.bottom() - 64.0).abs() < 1e-6);
        assert!(over.hit.is_none());

        let back = sweep_x(&geo, &top, -60.0, true);
        let down = top.translated(back.moved, back.lift);
        assert!((down.bottom() - 96.0).abs() < 1e-6, "bottom {}", down.bottom());
        assert!(touching(&geo, &down).on_floor());
    }

    #[test]
    fn solid_entities_block_and_report_source() {
        let tiles = TileMap::new(32.0);
        let ice = EntityId::new(4, 0);
        let solids = [Blocker {
            rect: Rect::new(0.0, 64.0, 32.0, 32.0),
            shape: TileShape::Solid,
            source: BlockerRef::Entity(ice),
        }];
        let geo = Geometry::new(&tiles, &solids);
        let bbox = Rect::new(4.0, 30.0, 20.0, 30.0);
        let sweep = sweep_y(&geo, &bbox, 10.0);
        assert_eq!(sweep.hit.map(|b| b.source), Some(BlockerRef::Entity(ice)));
        let own = geo.excluding(ice);
        assert!(sweep_y(&own, &bbox, 10.0).hit.is_none());
    }

    // -- ceiling lax ----------------------------------------------------------

    #[test]
    fn ceiling_lax_finds_gap_to_the_left_first() {
        // Ceiling with a gap from x=0..26; mover pokes 4 units under the
        // ceiling edge at x=26.
        let tiles = map(&[(26.0, 0.0, 64.0, 32.0, TileShape::Solid)]);
        let geo = Geometry::new(&tiles, &[]);
        let bbox = Rect::new(10.0, 32.0, 20.0, 30.0);
        assert_eq!(ceiling_lax(&geo, &bbox, 10), Some(-4.0));
        assert_eq!(ceiling_lax(&geo, &bbox, 3), None);
    }

    #[test]
    fn ceiling_lax_stops_at_walls() {
        let tiles = map(&[
            (0.0, 0.0, 40.0, 32.0, TileShape::Solid),
            (-32.0, 32.0, 32.0, 64.0, TileShape::Solid),
            (96.0, 0.0, 32.0, 96.0, TileShape::Solid),
        ]);
        let geo = Geometry::new(&tiles, &[]);
        let bbox = Rect::new(0.0, 32.0, 20.0, 30.0);
        // Left is walled; to the right the ceiling ends at x=40.
        assert_eq!(ceiling_lax(&geo, &bbox, 10), None);
        assert_eq!(ceiling_lax(&geo, &bbox, 50), Some(40.0));
    }

    #[test]
    fn triggers_need_interior_overlap() {
        let tiles = map(&[(0.0, 0.0, 32.0, 32.0, TileShape::Death)]);
        let geo = Geometry::new(&tiles, &[]);
        assert!(geo.triggers(&Rect::new(32.0, 0.0, 10.0, 10.0)).is_empty());
        assert_eq!(geo.triggers(&Rect::new(30.0, 0.0, 10.0, 10.0)).len(), 1);
        assert!(geo.gather(&Rect::new(0.0, 0.0, 32.0, 32.0)).is_empty());
    }
}

//! Typed collision tiles and the spatial map that holds them.
//!
//! Tiles are static rectangles tagged with a [`TileShape`]. The map buckets
//! them on a uniform grid so collision queries only look at tiles near the
//! mover. A tile's only mutable state is its *tangibility*: a tile farther
//! than the active range from every view stops answering queries after a
//! short grace period and wakes up again as soon as a view comes near.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::{Rect, Side};
use crate::WorldError;

// ---------------------------------------------------------------------------
// TileShape
// ---------------------------------------------------------------------------

/// Collision behavior of a tile.
///
/// Slopes are named after the corner their surface normal points toward:
/// a `SlopeTopLeft` rises from its bottom-left corner to its top-right corner
/// and is solid underneath; a `SlopeBottomRight` is a ceiling that descends
/// from its top-right corner to its bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileShape {
    Solid,
    SolidLeft,
    SolidRight,
    SolidTop,
    SolidBottom,
    SlopeTopLeft,
    SlopeTopRight,
    SlopeBottomLeft,
    SlopeBottomRight,
    /// Hurts whoever touches `side`. A spike is solid on every face; a plain
    /// hazard is solid on its dangerous face only.
    Hurt { side: Side, spike: bool },
    /// Kills on overlap. Not solid.
    Death,
    /// Wins the level on overlap. Not solid.
    LevelEnd,
}

impl TileShape {
    /// Parse a room-definition tag such as `"solid_top"` or `"spike_left"`.
    pub fn from_tag(tag: &str) -> Option<TileShape> {
        let side = |s: &str| match s {
            "left" => Some(Side::Left),
            "right" => Some(Side::Right),
            "top" => Some(Side::Top),
            "bottom" => Some(Side::Bottom),
            _ => None,
        };
        let shape = match tag {
            "solid" => TileShape::Solid,
            "solid_left" => TileShape::SolidLeft,
            "solid_right" => TileShape::SolidRight,
            "solid_top" => TileShape::SolidTop,
            "solid_bottom" => TileShape::SolidBottom,
            "slope_top_left" => TileShape::SlopeTopLeft,
            "slope_top_right" => TileShape::SlopeTopRight,
            "slope_bottom_left" => TileShape::SlopeBottomLeft,
            "slope_bottom_right" => TileShape::SlopeBottomRight,
            "death" => TileShape::Death,
            "level_end" => TileShape::LevelEnd,
            other => {
                if let Some(rest) = other.strip_prefix("hurt_") {
                    TileShape::Hurt { side: side(rest)?, spike: false }
                } else if let Some(rest) = other.strip_prefix("spike_") {
                    TileShape::Hurt { side: side(rest)?, spike: true }
                } else {
                    return None;
                }
            }
        };
        Some(shape)
    }

    /// Whether a mover running into `face` of this tile is stopped by it.
    ///
    /// `face` is the tile's own face: a mover falling onto the tile hits its
    /// [`Side::Top`]. Slope surfaces are not faces; see
    /// [`Tile::surface_under`] and [`Tile::ceiling_over`].
    pub fn blocks(self, face: Side) -> bool {
        match self {
            TileShape::Solid => true,
            TileShape::SolidLeft => face == Side::Left,
            TileShape::SolidRight => face == Side::Right,
            TileShape::SolidTop => face == Side::Top,
            TileShape::SolidBottom => face == Side::Bottom,
            TileShape::SlopeTopLeft => matches!(face, Side::Right | Side::Bottom),
            TileShape::SlopeTopRight => matches!(face, Side::Left | Side::Bottom),
            TileShape::SlopeBottomLeft => matches!(face, Side::Right | Side::Top),
            TileShape::SlopeBottomRight => matches!(face, Side::Left | Side::Top),
            TileShape::Hurt { side, spike } => spike || face == side,
            TileShape::Death | TileShape::LevelEnd => false,
        }
    }

    /// Floor slopes: something can stand on their surface.
    pub fn is_floor_slope(self) -> bool {
        matches!(self, TileShape::SlopeTopLeft | TileShape::SlopeTopRight)
    }

    /// Ceiling slopes.
    pub fn is_ceiling_slope(self) -> bool {
        matches!(self, TileShape::SlopeBottomLeft | TileShape::SlopeBottomRight)
    }

    /// The face that hurts on contact, if any.
    pub fn hazard_face(self) -> Option<Side> {
        match self {
            TileShape::Hurt { side, .. } => Some(side),
            _ => None,
        }
    }

    /// Overlap triggers rather than solid geometry.
    pub fn is_trigger(self) -> bool {
        matches!(self, TileShape::Death | TileShape::LevelEnd)
    }
}

// ---------------------------------------------------------------------------
// Tile
// ---------------------------------------------------------------------------

/// Index of a tile within its [`TileMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileId(pub u32);

/// A placed tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub rect: Rect,
    pub shape: TileShape,
    tangible: bool,
    frames_out_of_range: u32,
}

impl Tile {
    pub fn new(rect: Rect, shape: TileShape) -> Self {
        Self {
            rect,
            shape,
            tangible: true,
            frames_out_of_range: 0,
        }
    }

    pub fn is_tangible(&self) -> bool {
        self.tangible
    }

    /// Rise over run of a slope's bounding box.
    pub fn slope_ratio(&self) -> f64 {
        self.rect.height / self.rect.width
    }

    /// Height of a floor slope's surface at the highest point under `mover`,
    /// or `None` if this is not a floor slope or `mover` is not above it.
    pub fn surface_under(&self, mover: &Rect) -> Option<f64> {
        if !mover.overlaps_x(&self.rect, 0.0) {
            return None;
        }
        let r = &self.rect;
        match self.shape {
            TileShape::SlopeTopLeft => {
                let x = mover.right().min(r.right());
                Some(r.bottom() - (x - r.left()) * self.slope_ratio())
            }
            TileShape::SlopeTopRight => {
                let x = mover.left().max(r.left());
                Some(r.top() + (x - r.left()) * self.slope_ratio())
            }
            _ => None,
        }
    }

    /// Height of a ceiling slope's surface at the lowest point over `mover`.
    pub fn ceiling_over(&self, mover: &Rect) -> Option<f64> {
        if !mover.overlaps_x(&self.rect, 0.0) {
            return None;
        }
        let r = &self.rect;
        match self.shape {
            TileShape::SlopeBottomLeft => {
                let x = mover.right().min(r.right());
                Some(r.top() + (x - r.left()) * self.slope_ratio())
            }
            TileShape::SlopeBottomRight => {
                let x = mover.left().max(r.left());
                Some(r.bottom() - (x - r.left()) * self.slope_ratio())
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// TileMap
// ---------------------------------------------------------------------------

/// Grid-bucketed tile storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileMap {
    cell_size: f64,
    tiles: Vec<Option<Tile>>,
    /// Packed `(cx, cy)` cell key to the tiles touching that cell.
    buckets: BTreeMap<i64, Vec<TileId>>,
}

fn cell_key(cx: i32, cy: i32) -> i64 {
    ((cx as i64) << 32) | (cy as u32 as i64)
}

impl TileMap {
    /// An empty map bucketing on `cell_size` units (normally the tile size).
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size: if cell_size > 0.0 { cell_size } else { 32.0 },
            tiles: Vec::new(),
            buckets: BTreeMap::new(),
        }
    }

    fn cells(&self, rect: &Rect) -> impl Iterator<Item = i64> {
        let cs = self.cell_size;
        let x0 = (rect.left() / cs).floor() as i32;
        let x1 = (rect.right() / cs).floor() as i32;
        let y0 = (rect.top() / cs).floor() as i32;
        let y1 = (rect.bottom() / cs).floor() as i32;
        (x0..=x1).flat_map(move |cx| (y0..=y1).map(move |cy| cell_key(cx, cy)))
    }

    /// Place a tile.
    pub fn insert(&mut self, rect: Rect, shape: TileShape) -> Result<TileId, WorldError> {
        if rect.is_degenerate() {
            return Err(WorldError::DegenerateBounds {
                width: rect.width,
                height: rect.height,
            });
        }
        let id = TileId(self.tiles.len() as u32);
        let keys: Vec<i64> = self.cells(&rect).collect();
        for key in keys {
            self.buckets.entry(key).or_default().push(id);
        }
        self.tiles.push(Some(Tile::new(rect, shape)));
        Ok(id)
    }

    /// Remove a tile permanently (a consumed level-end marker).
    pub fn remove(&mut self, id: TileId) -> Result<Tile, WorldError> {
        let tile = self
            .tiles
            .get_mut(id.0 as usize)
            .and_then(Option::take)
            .ok_or(WorldError::UnknownTile { tile: id.0 })?;
        let keys: Vec<i64> = self.cells(&tile.rect).collect();
        for key in keys {
            if let Some(bucket) = self.buckets.get_mut(&key) {
                bucket.retain(|t| *t != id);
            }
        }
        Ok(tile)
    }

    pub fn get(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(id.0 as usize).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.tiles.iter().filter(|t| t.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every placed tile, tangible or not, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (TileId, &Tile)> {
        self.tiles
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.as_ref().map(|t| (TileId(i as u32), t)))
    }

    /// Tangible tiles whose rectangles touch or intersect `region`, sorted by
    /// id and deduplicated.
    pub fn query(&self, region: &Rect, out: &mut Vec<TileId>) {
        let start = out.len();
        for key in self.cells(region) {
            let Some(bucket) = self.buckets.get(&key) else {
                continue;
            };
            for &id in bucket {
                let Some(tile) = self.get(id) else { continue };
                let r = &tile.rect;
                if tile.tangible
                    && r.left() <= region.right()
                    && region.left() <= r.right()
                    && r.top() <= region.bottom()
                    && region.top() <= r.bottom()
                {
                    out.push(id);
                }
            }
        }
        out[start..].sort_unstable();
        let mut tail = out.split_off(start);
        tail.dedup();
        out.extend(tail);
    }

    /// Update tangibility from the current views.
    ///
    /// A tile within `range` of any view is tangible; a tile outside all of
    /// them turns intangible once it has been out of range for
    /// `grace_frames` consecutive frames. Returns how many tiles changed
    /// state.
    pub fn refresh_tangibility(&mut self, views: &[Rect], range: f64, grace_frames: u32) -> usize {
        let zones: Vec<Rect> = views.iter().map(|v| v.expanded(range)).collect();
        let mut changed = 0;
        for tile in self.tiles.iter_mut().flatten() {
            let near = zones.iter().any(|z| {
                tile.rect.left() <= z.right()
                    && z.left() <= tile.rect.right()
                    && tile.rect.top() <= z.bottom()
                    && z.top() <= tile.rect.bottom()
            });
            if near {
                tile.frames_out_of_range = 0;
                if !tile.tangible {
                    tile.tangible = true;
                    changed += 1;
                }
            } else {
                tile.frames_out_of_range = tile.frames_out_of_range.saturating_add(1);
                if tile.tangible && tile.frames_out_of_range >= grace_frames {
                    tile.tangible = false;
                    changed += 1;
                }
            }
        }
        changed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn block(x: f64, y: f64) -> Rect {
        Rect::new(x, y, 32.0, 32.0)
    }

    #[test]
    fn tags_parse() {
        assert_eq!(TileShape::from_tag("solid_top"), Some(TileShape::SolidTop));
        assert_eq!(
            TileShape::from_tag("spike_left"),
            Some(TileShape::Hurt { side: Side::Left, spike: true })
        );
        assert_eq!(
            TileShape::from_tag("hurt_top"),
            Some(TileShape::Hurt { side: Side::Top, spike: false })
        );
        assert_eq!(TileShape::from_tag("hurt_sideways"), None);
        assert_eq!(TileShape::from_tag("lava"), None);
    }

    #[test]
    fn hazard_blocking_faces() {
        let hazard = TileShape::Hurt { side: Side::Top, spike: false };
        assert!(hazard.blocks(Side::Top));
        assert!(!hazard.blocks(Side::Left));
        let spike = TileShape::Hurt { side: Side::Top, spike: true };
        assert!(spike.blocks(Side::Left));
        assert_eq!(spike.hazard_face(), Some(Side::Top));
        assert!(!TileShape::Death.blocks(Side::Top));
    }

    #[test]
    fn floor_slope_surface() {
        let rises_right = Tile::new(Rect::new(0.0, 0.0, 32.0, 16.0), TileShape::SlopeTopLeft);
        let mover = Rect::new(-8.0, -20.0, 16.0, 16.0);
        // Mover's right edge at x=8: a quarter of the way up the 16-high slope.
        assert_eq!(rises_right.surface_under(&mover), Some(12.0));

        let falls_right = Tile::new(Rect::new(0.0, 0.0, 32.0, 32.0), TileShape::SlopeTopRight);
        let mover = Rect::new(24.0, -40.0, 16.0, 16.0);
        assert_eq!(falls_right.surface_under(&mover), Some(24.0));
        assert_eq!(falls_right.ceiling_over(&mover), None);
    }

    #[test]
    fn ceiling_slope_surface() {
        let tile = Tile::new(Rect::new(0.0, 0.0, 32.0, 32.0), TileShape::SlopeBottomRight);
        let mover = Rect::new(8.0, 40.0, 8.0, 8.0);
        assert_eq!(tile.ceiling_over(&mover), Some(24.0));
    }

    #[test]
    fn query_finds_touching_tiles_once() {
        let mut map = TileMap::new(32.0);
        let a = map.insert(Rect::new(0.0, 0.0, 64.0, 32.0), TileShape::Solid).unwrap();
        let b = map.insert(block(64.0, 0.0), TileShape::SolidTop).unwrap();
        let _far = map.insert(block(640.0, 0.0), TileShape::Solid).unwrap();
        let mut out = Vec::new();
        map.query(&Rect::new(10.0, -10.0, 54.0, 10.0), &mut out);
        assert_eq!(out, vec![a, b]);
    }

    #[test]
    fn degenerate_tile_rejected() {
        let mut map = TileMap::new(32.0);
        assert!(matches!(
            map.insert(Rect::new(0.0, 0.0, 0.0, 32.0), TileShape::Solid),
            Err(WorldError::DegenerateBounds { .. })
        ));
    }

    #[test]
    fn removed_tile_leaves_queries() {
        let mut map = TileMap::new(32.0);
        let id = map.insert(block(0.0, 0.0), TileShape::LevelEnd).unwrap();
        map.remove(id).unwrap();
        let mut out = Vec::new();
        map.query(&block(0.0, 0.0), &mut out);
        assert!(out.is_empty());
        assert!(matches!(map.remove(id), Err(WorldError::UnknownTile { tile: 0 })));
    }

    #[test]
    fn tangibility_follows_views_with_grace() {
        let mut map = TileMap::new(32.0);
        let id = map.insert(block(2000.0, 0.0), TileShape::Solid).unwrap();
        let view = Rect::new(0.0, 0.0, 640.0, 480.0);
        let mut out = Vec::new();

        map.refresh_tangibility(&[view], 528.0, 3);
        map.refresh_tangibility(&[view], 528.0, 3);
        assert!(map.get(id).unwrap().is_tangible());
        map.refresh_tangibility(&[view], 528.0, 3);
        assert!(!map.get(id).unwrap().is_tangible());
        map.query(&block(2000.0, 0.0), &mut out);
        assert!(out.is_empty());

        let near = Rect::new(1500.0, 0.0, 640.0, 480.0);
        assert_eq!(map.refresh_tangibility(&[near], 528.0, 3), 1);
        map.query(&block(2000.0, 0.0), &mut out);
        assert_eq!(out, vec![id]);
    }
}

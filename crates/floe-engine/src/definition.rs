//! Static room definitions, as supplied by whatever parses level files.
//!
//! A [`RoomDefinition`] is plain serde data: typed tile records, spawn
//! records with free-form parameters, and an optional timeline script.
//! [`SpawnRecord::resolve`] turns one spawn record into what the room
//! controller places. Records that cannot be resolved are reported as
//! [`DefinitionError`]s; the room loader logs and skips them.
//!
//! ```
//! use floe_engine::definition::RoomDefinition;
//!
//! let def: RoomDefinition = serde_json::from_str(r#"{
//!     "name": "cave",
//!     "width": 640,
//!     "height": 480,
//!     "tiles": [{ "shape": "solid", "x": 0, "y": 448, "width": 640, "height": 32 }],
//!     "spawns": [{ "tag": "coin", "x": 96, "y": 384 }]
//! }"#).unwrap();
//! assert_eq!(def.spawns[0].tag, "coin");
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::entity::{Element, Entity, Variant};
use crate::interaction::thin_ice::IceState;
use crate::player::PlayerState;
use crate::warp::{Warp, WarpKind};

/// A spawn or tile record could not be used.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DefinitionError {
    #[error("unknown tile shape {tag:?}")]
    UnknownShape { tag: String },

    #[error("unknown spawn variant {tag:?}")]
    UnknownVariant { tag: String },

    #[error("spawn {tag:?} has a degenerate {width}x{height} bounding box")]
    DegenerateBounds { tag: String, width: f64, height: f64 },

    #[error("spawn {tag:?} needs parameter {param:?} ({expected})")]
    BadParam {
        tag: String,
        param: &'static str,
        expected: &'static str,
    },
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One placed collision tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileRecord {
    /// Shape tag such as `"solid"`, `"slope_top_left"` or `"spike_top"`.
    pub shape: String,
    pub x: f64,
    pub y: f64,
    /// Defaults to the configured tile size.
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
}

/// One entity, warp or spawn point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnRecord {
    pub tag: String,
    pub x: f64,
    pub y: f64,
    /// Timeline label.
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, serde_json::Value>,
}

/// A timeline script: step keys to command lines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineScript {
    pub name: String,
    #[serde(default)]
    pub steps: BTreeMap<String, Vec<String>>,
}

/// Everything needed to build a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomDefinition {
    pub name: String,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub tiles: Vec<TileRecord>,
    #[serde(default)]
    pub spawns: Vec<SpawnRecord>,
    /// Starting time bonus when this room is a main area.
    #[serde(default)]
    pub time_bonus: Option<i64>,
    #[serde(default)]
    pub music: Option<String>,
    #[serde(default)]
    pub timeline: Option<TimelineScript>,
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// What a spawn record places.
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    /// A named arrival point.
    Point { id: String, x: f64, y: f64 },
    /// A player, optionally holding something.
    Player { x: f64, y: f64, held: Option<Box<Entity>> },
    Warp(Warp),
    Entity(Box<Entity>),
}

impl SpawnRecord {
    fn text(&self, key: &str) -> Option<String> {
        match self.params.get(key)? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn number(&self, key: &str) -> Option<f64> {
        match self.params.get(key)? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn flag(&self, key: &str) -> bool {
        match self.params.get(key) {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
            Some(serde_json::Value::String(s)) => matches!(s.as_str(), "true" | "1"),
            _ => false,
        }
    }

    /// Path points relative to the spawn, as `[[dx, dy], ...]`.
    fn points(&self) -> Result<Vec<(f64, f64)>, DefinitionError> {
        let Some(raw) = self.params.get("points") else { return Ok(Vec::new()) };
        let bad = || DefinitionError::BadParam {
            tag: self.tag.clone(),
            param: "points",
            expected: "a list of [dx, dy] pairs",
        };
        let list = raw.as_array().ok_or_else(bad)?;
        list.iter()
            .map(|p| match p.as_array().map(Vec::as_slice) {
                Some([dx, dy]) => Ok((dx.as_f64().ok_or_else(bad)?, dy.as_f64().ok_or_else(bad)?)),
                _ => Err(bad()),
            })
            .collect()
    }

    fn required(&self, key: &'static str, expected: &'static str) -> Result<String, DefinitionError> {
        self.text(key).ok_or_else(|| DefinitionError::BadParam {
            tag: self.tag.clone(),
            param: key,
            expected,
        })
    }

    /// Resolve this record against `cfg`.
    pub fn resolve(&self, cfg: &EngineConfig) -> Result<Placement, DefinitionError> {
        let (x, y) = (self.x, self.y);
        let warp = |kind: WarpKind| -> Result<Placement, DefinitionError> {
            Ok(Placement::Warp(Warp::new(
                kind,
                x,
                y,
                &self.points()?,
                self.text("dest"),
                self.text("spawn_id"),
            )))
        };
        match self.tag.as_str() {
            "spawn" => Ok(Placement::Point {
                id: self.required("id", "a spawn id")?,
                x,
                y,
            }),
            "player" => {
                let held = match self.text("held") {
                    Some(tag) => {
                        let variant = self.variant(&tag, cfg).map_err(|_| DefinitionError::BadParam {
                            tag: self.tag.clone(),
                            param: "held",
                            expected: "an entity variant",
                        })?;
                        Some(Box::new(Entity::new(variant, x, y)))
                    }
                    None => None,
                };
                Ok(Placement::Player { x, y, held })
            }
            "pipe" => warp(WarpKind::Pipe),
            "door" => warp(WarpKind::Door),
            "warp_exit" => {
                self.required("spawn_id", "an arrival spawn id")?;
                warp(WarpKind::Exit)
            }
            tag => {
                let variant = self.variant(tag, cfg)?;
                let mut e = Entity::new(variant, x, y);
                if let Some(f) = self.number("facing") {
                    e.facing = if f < 0.0 { -1.0 } else { 1.0 };
                }
                if let Some(w) = self.number("width") {
                    e.hitbox.width = w;
                }
                if let Some(h) = self.number("height") {
                    e.hitbox.height = h;
                }
                e.check_bounds().map_err(|_| DefinitionError::DegenerateBounds {
                    tag: self.tag.clone(),
                    width: e.hitbox.width,
                    height: e.hitbox.height,
                })?;
                Ok(Placement::Entity(Box::new(e)))
            }
        }
    }

    fn variant(&self, tag: &str, cfg: &EngineConfig) -> Result<Variant, DefinitionError> {
        let ammo = || {
            self.number("ammo")
                .map(|a| a.max(0.0) as u32)
                .unwrap_or(cfg.objects.flower_ammo)
        };
        Ok(match tag {
            "walking_snowball" => Variant::WalkingSnowball,
            "bouncing_snowball" => Variant::BouncingSnowball,
            "flying_snowball" => Variant::FlyingSnowball {
                home_y: self.y,
                heading: 1.0,
            },
            "walking_iceblock" => Variant::WalkingIceblock,
            "spiky" => Variant::Spiky,
            "jumpy" => Variant::Jumpy,
            "flat_iceblock" => Variant::FlatIceblock,
            "fire_flower" => Variant::Flower {
                element: Element::Fire,
                ammo: ammo(),
            },
            "ice_flower" => Variant::Flower {
                element: Element::Ice,
                ammo: ammo(),
            },
            "spring" => Variant::Spring,
            "fixed_spring" => Variant::FixedSpring,
            "coin" => Variant::Coin,
            "token" => Variant::Token,
            "checkpoint" => Variant::Checkpoint {
                dest: self.required("dest", "a spawn id")?,
            },
            "brick" => Variant::Brick,
            "thin_ice" => Variant::ThinIce(IceState::new(self.flag("permanent"))),
            _ => {
                return Err(DefinitionError::UnknownVariant {
                    tag: tag.to_string(),
                })
            }
        })
    }
}

/// A fresh player for slot `number`.
pub fn new_player(number: usize, x: f64, y: f64, cfg: &EngineConfig) -> Entity {
    let mut e = Entity::new(Variant::Player(PlayerState::new(number, cfg.player.max_hp)), x, y);
    e.facing = 1.0;
    e.active = true;
    e
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

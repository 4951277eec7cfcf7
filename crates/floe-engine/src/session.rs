//! Progress that outlives any one room.
//!
//! A [`Session`] is created by a new game and mutated only by room frames
//! and transitions. Persisting it is the embedder's job; it is plain serde
//! data for that reason.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Ordered levels and worldmaps making up one game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Levelset {
    pub levels: Vec<String>,
    #[serde(default)]
    pub worldmaps: Vec<String>,
}

impl Levelset {
    pub fn new(levels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            levels: levels.into_iter().map(Into::into).collect(),
            worldmaps: Vec::new(),
        }
    }

    pub fn with_worldmaps(mut self, maps: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.worldmaps = maps.into_iter().map(Into::into).collect();
        self
    }

    pub fn contains_level(&self, name: &str) -> bool {
        self.levels.iter().any(|l| l == name)
    }
}

/// Session-wide progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub levelset: Levelset,
    pub score: i64,
    pub cleared_levels: BTreeSet<String>,
    /// Levels whose token has been collected.
    pub tokens_found: BTreeSet<String>,
    /// Levels known to hold a token.
    pub tokens_available: BTreeSet<String>,
    pub watched_timelines: BTreeSet<String>,
    /// Remaining time bonus per main area. Negative values are penalties.
    pub level_timers: BTreeMap<String, i64>,
    /// Respawn destination per main area, as `room:spawn`.
    pub current_checkpoints: BTreeMap<String, String>,
    /// The level being played, as opposed to the sub-area the player is in.
    pub main_area: Option<String>,
    /// The main area's starting time bonus.
    pub level_time_bonus: i64,
    pub current_worldmap: Option<String>,
    /// Index into `levelset.levels` when playing without a worldmap.
    pub current_level: usize,
}

impl Session {
    pub fn new(levelset: Levelset) -> Self {
        let mut s = Self {
            levelset,
            ..Self::default()
        };
        s.reset();
        s
    }

    /// Start over: no score, nothing cleared, back to the first worldmap.
    pub fn reset(&mut self) {
        let levelset = std::mem::take(&mut self.levelset);
        *self = Self {
            current_worldmap: levelset.worldmaps.first().cloned(),
            levelset,
            ..Self::default()
        };
    }

    pub fn is_cleared(&self, level: &str) -> bool {
        self.cleared_levels.contains(level)
    }

    /// Whether the main area in progress has been cleared before.
    pub fn main_cleared(&self) -> bool {
        self.main_area.as_deref().is_some_and(|m| self.is_cleared(m))
    }

    /// Time bonus left in the main area.
    pub fn time_bonus(&self) -> i64 {
        self.main_area
            .as_ref()
            .and_then(|m| self.level_timers.get(m))
            .copied()
            .unwrap_or(0)
    }

    /// Add to the main area's time bonus, creating the entry if needed.
    pub fn adjust_time_bonus(&mut self, delta: i64) {
        if let Some(main) = &self.main_area {
            *self.level_timers.entry(main.clone()).or_insert(0) += delta;
        }
    }

    /// Record `level` as cleared. Returns false if it already was.
    pub fn complete_level(&mut self, level: &str) -> bool {
        self.cleared_levels.insert(level.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_game_starts_at_first_worldmap() {
        let s = Session::new(Levelset::new(["a", "b"]).with_worldmaps(["map"]));
        assert_eq!(s.current_worldmap.as_deref(), Some("map"));
        assert_eq!(s.current_level, 0);
        assert!(s.levelset.contains_level("b"));
    }

    #[test]
    fn completing_twice_records_once() {
        let mut s = Session::new(Levelset::new(["a"]));
        assert!(s.complete_level("a"));
        assert!(!s.complete_level("a"));
        assert_eq!(s.cleared_levels.len(), 1);
    }

    #[test]
    fn reset_keeps_levelset_only() {
        let mut s = Session::new(Levelset::new(["a"]));
        s.score = 900;
        s.main_area = Some("a".into());
        s.adjust_time_bonus(-100);
        assert_eq!(s.time_bonus(), -100);
        s.reset();
        assert_eq!(s.score, 0);
        assert_eq!(s.time_bonus(), 0);
        assert_eq!(s.levelset.levels, vec!["a".to_string()]);
    }
}

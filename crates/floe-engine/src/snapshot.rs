//! Game snapshot and restore with BLAKE3 hashing.
//!
//! A [`GameSnapshot`] holds everything that decides how the game plays out
//! from here: the session, every cached room, the screen, the frame counter
//! and the random generator. Its BLAKE3 hash doubles as the determinism
//! fingerprint used by [`replay`](crate::replay).
//!
//! ```
//! use floe_engine::prelude::*;
//!
//! let def: RoomDefinition = serde_json::from_str(r#"{
//!     "name": "hill", "width": 640, "height": 480,
//!     "tiles": [{ "shape": "solid", "x": 0, "y": 448, "width": 640, "height": 32 }],
//!     "spawns": [{ "tag": "player", "x": 64, "y": 416 }]
//! }"#).unwrap();
//! let mut game = Game::new_game(EngineConfig::default(), [def], Levelset::new(["hill"])).unwrap();
//!
//! let snapshot = game.capture_snapshot().unwrap();
//! assert_eq!(snapshot.hash.len(), 64);
//!
//! let run = PlayerInput { right: true, ..PlayerInput::default() };
//! for _ in 0..30 {
//!     game.frame(&[run]);
//! }
//! game.restore_from_snapshot(&snapshot).unwrap();
//! assert_eq!(game.frame_count(), 0);
//! assert_eq!(game.state_hash().unwrap(), snapshot.hash);
//! ```
//!
//! Not captured: the configuration and room definitions (the game being
//! restored already has them), the journal history, and diagnostics.

use std::collections::BTreeMap;

use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::game::{Game, Screen};
use crate::room::Room;
use crate::session::Session;

/// A serializable copy of the game state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub session: Session,
    /// Rooms cached for the level in progress, by name.
    pub areas: BTreeMap<String, Room>,
    pub screen: Screen,
    pub frame: u64,
    pub rng: Pcg32,
    /// BLAKE3 hex digest of the fields above.
    pub hash: String,
}

#[derive(Serialize)]
struct HashableState<'a> {
    session: &'a Session,
    areas: &'a BTreeMap<String, Room>,
    screen: &'a Screen,
    frame: u64,
    rng: &'a Pcg32,
}

fn compute_hash(state: &HashableState<'_>) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(state)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

impl Game {
    fn hashable(&self) -> HashableState<'_> {
        HashableState {
            session: &self.session,
            areas: &self.areas,
            screen: &self.screen,
            frame: self.frame,
            rng: &self.rng,
        }
    }

    pub fn capture_snapshot(&self) -> anyhow::Result<GameSnapshot> {
        let hash = compute_hash(&self.hashable())?;
        Ok(GameSnapshot {
            session: self.session.clone(),
            areas: self.areas.clone(),
            screen: self.screen.clone(),
            frame: self.frame,
            rng: self.rng.clone(),
            hash,
        })
    }

    /// Put the game back where `snapshot` was taken. The hash is checked
    /// first; on mismatch nothing changes.
    pub fn restore_from_snapshot(&mut self, snapshot: &GameSnapshot) -> anyhow::Result<()> {
        let recomputed = compute_hash(&HashableState {
            session: &snapshot.session,
            areas: &snapshot.areas,
            screen: &snapshot.screen,
            frame: snapshot.frame,
            rng: &snapshot.rng,
        })?;
        if recomputed != snapshot.hash {
            return Err(anyhow::anyhow!(
                "snapshot hash mismatch: recorded {} but recomputed {}",
                snapshot.hash,
                recomputed
            ));
        }
        if let Screen::Room(name) = &snapshot.screen {
            if !snapshot.areas.contains_key(name) {
                return Err(anyhow::anyhow!("snapshot shows room {name:?} but does not contain it"));
            }
        }

        self.session = snapshot.session.clone();
        self.areas = snapshot.areas.clone();
        self.screen = snapshot.screen.clone();
        self.frame = snapshot.frame;
        self.rng = snapshot.rng.clone();
        self.reset_transients();
        Ok(())
    }

    /// BLAKE3 digest of the current state, as a snapshot would record it.
    pub fn state_hash(&self) -> anyhow::Result<String> {
        Ok(compute_hash(&self.hashable())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::definition::RoomDefinition;
    use crate::player::PlayerInput;
    use crate::session::Levelset;

    fn game() -> Game {
        let def: RoomDefinition = serde_json::from_value(serde_json::json!({
            "name": "hill", "width": 640, "height": 480,
            "tiles": [{ "shape": "solid", "x": 0, "y": 448, "width": 640, "height": 32 }],
            "spawns": [
                { "tag": "player", "x": 64, "y": 416 },
                { "tag": "walking_snowball", "x": 320, "y": 416 }
            ]
        }))
        .unwrap();
        Game::new_game(EngineConfig::default(), [def], Levelset::new(["hill"])).unwrap()
    }

    #[test]
    fn same_history_same_hash() {
        let mut a = game();
        let mut b = game();
        let jump = PlayerInput {
            jump: true,
            right: true,
            ..PlayerInput::default()
        };
        for _ in 0..60 {
            a.frame(&[jump]);
            b.frame(&[jump]);
        }
        assert_eq!(a.state_hash().unwrap(), b.state_hash().unwrap());
        b.frame(&[]);
        assert_ne!(a.state_hash().unwrap(), b.state_hash().unwrap());
    }

    #[test]
    fn restore_then_rerun_matches() {
        let mut game = game();
        let run = PlayerInput {
            right: true,
            ..PlayerInput::default()
        };
        for _ in 0..20 {
            game.frame(&[run]);
        }
        let snapshot = game.capture_snapshot().unwrap();
        for _ in 0..40 {
            game.frame(&[run]);
        }
        let first = game.state_hash().unwrap();

        game.restore_from_snapshot(&snapshot).unwrap();
        assert_eq!(game.frame_count(), 20);
        for _ in 0..40 {
            game.frame(&[run]);
        }
        assert_eq!(game.state_hash().unwrap(), first);
    }

    #[test]
    fn snapshot_survives_json() {
        let mut game = game();
        game.frame(&[]);
        let snapshot = game.capture_snapshot().unwrap();
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: GameSnapshot = serde_json::from_str(&json).unwrap();
        game.frame(&[]);
        game.restore_from_snapshot(&back).unwrap();
        assert_eq!(game.state_hash().unwrap(), snapshot.hash);
    }

    #[test]
    fn tampered_snapshot_is_rejected() {
        let mut game = game();
        let mut snapshot = game.capture_snapshot().unwrap();
        snapshot.session.score += 1000;
        game.frame(&[]);
        let before = game.state_hash().unwrap();
        assert!(game.restore_from_snapshot(&snapshot).is_err());
        assert_eq!(game.state_hash().unwrap(), before);
    }
}

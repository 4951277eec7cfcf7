//! Input recording and deterministic replay.
//!
//! A [`ReplayRecorder`] captures the inputs of a run, plus state hash
//! checkpoints every so often, into a [`ReplayLog`]. [`replay`] restores the
//! log's starting snapshot, feeds the same inputs back frame by frame, and
//! compares hashes at every checkpoint. Same start and same inputs must give
//! the same hashes; the first mismatch is reported as a
//! [`ReplayDivergence`].
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
//! let mut recorder = ReplayRecorder::new(game.capture_snapshot().unwrap(), 10);
//! for n in 0..60 {
//!     let inputs = [PlayerInput { right: n < 30, jump: n % 20 == 0, ..PlayerInput::default() }];
//!     recorder.record_frame(game.frame_count(), &inputs, Some(game.state_hash().unwrap()));
//!     game.frame(&inputs);
//! }
//! let log = recorder.finish();
//!
//! let result = replay(&mut game, &log).unwrap();
//! assert!(result.completed);
//! assert!(result.first_divergence.is_none());
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::game::Game;
use crate::player::PlayerInput;
use crate::snapshot::GameSnapshot;

/// Starting snapshot plus the inputs and checkpoints that followed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayLog {
    pub initial_snapshot: GameSnapshot,
    /// Frames to run from the snapshot, whatever the entries say.
    pub total_frames: u64,
    pub entries: Vec<ReplayEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplayEntry {
    /// Inputs for `frame`. Frames without an entry had nothing pressed.
    Input { frame: u64, inputs: Vec<PlayerInput> },
    /// State hash taken before `frame` ran.
    Checkpoint { frame: u64, state_hash: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayResult {
    pub completed: bool,
    pub frames_replayed: u64,
    /// First checkpoint that did not match; `None` means deterministic.
    pub first_divergence: Option<ReplayDivergence>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayDivergence {
    pub frame: u64,
    pub expected_hash: String,
    pub actual_hash: String,
}

/// Builds a [`ReplayLog`] while a game runs.
///
/// Call [`record_frame`](Self::record_frame) before each frame with the
/// inputs about to be used. Frame numbers must strictly increase.
#[derive(Debug)]
pub struct ReplayRecorder {
    log: ReplayLog,
    /// Checkpoint every this many frames; 0 checkpoints whenever a hash is
    /// given.
    checkpoint_interval: u64,
    frames_recorded: u64,
    last_frame: Option<u64>,
}

impl ReplayRecorder {
    pub fn new(snapshot: GameSnapshot, checkpoint_interval: u64) -> Self {
        Self {
            log: ReplayLog {
                initial_snapshot: snapshot,
                total_frames: 0,
                entries: Vec::new(),
            },
            checkpoint_interval,
            frames_recorded: 0,
            last_frame: None,
        }
    }

    /// Record one frame.
    ///
    /// # Panics
    ///
    /// Panics if `frame` is not greater than the previous recorded frame.
    pub fn record_frame(&mut self, frame: u64, inputs: &[PlayerInput], state_hash: Option<String>) {
        if let Some(prev) = self.last_frame {
            assert!(
                frame > prev,
                "ReplayRecorder::record_frame: frame {frame} does not follow frame {prev}"
            );
        }
        self.last_frame = Some(frame);
        self.frames_recorded += 1;

        if inputs.iter().any(|i| *i != PlayerInput::default()) {
            self.log.entries.push(ReplayEntry::Input {
                frame,
                inputs: inputs.to_vec(),
            });
        }
        if let Some(hash) = state_hash {
            if self.checkpoint_interval == 0 || frame % self.checkpoint_interval == 0 {
                self.log.entries.push(ReplayEntry::Checkpoint {
                    frame,
                    state_hash: hash,
                });
            }
        }
    }

    pub fn finish(mut self) -> ReplayLog {
        self.log.total_frames = self.frames_recorded;
        self.log
    }
}

/// Replay `log` on `game`, checking every checkpoint.
///
/// The log is validated before the game is touched, so a malformed log
/// leaves `game` as it was. Replay stops at the first divergence.
pub fn replay(game: &mut Game, log: &ReplayLog) -> anyhow::Result<ReplayResult> {
    let mut inputs: BTreeMap<u64, &[PlayerInput]> = BTreeMap::new();
    let mut checkpoints: BTreeMap<u64, &str> = BTreeMap::new();
    for entry in &log.entries {
        match entry {
            ReplayEntry::Input { frame, inputs: i } => {
                if inputs.insert(*frame, i.as_slice()).is_some() {
                    return Err(anyhow::anyhow!("replay log has two Input entries for frame {frame}"));
                }
            }
            ReplayEntry::Checkpoint { frame, state_hash } => {
                if checkpoints.insert(*frame, state_hash).is_some() {
                    return Err(anyhow::anyhow!("replay log has two Checkpoint entries for frame {frame}"));
                }
            }
        }
    }

    let start = log.initial_snapshot.frame;
    let end = start.checked_add(log.total_frames).ok_or_else(|| {
        anyhow::anyhow!("frame range overflow: {start} + {} frames", log.total_frames)
    })?;

    game.restore_from_snapshot(&log.initial_snapshot)
        .map_err(|e| anyhow::anyhow!("failed to restore initial snapshot for replay: {e}"))?;

    let mut frames_replayed = 0;
    for frame in start..end {
        if let Some(&expected) = checkpoints.get(&frame) {
            let actual = game.state_hash()?;
            if actual != expected {
                return Ok(ReplayResult {
                    completed: false,
                    frames_replayed,
                    first_divergence: Some(ReplayDivergence {
                        frame,
                        expected_hash: expected.to_string(),
                        actual_hash: actual,
                    }),
                });
            }
        }
        game.frame(inputs.get(&frame).copied().unwrap_or_default());
        frames_replayed += 1;
    }

    Ok(ReplayResult {
        completed: true,
        frames_replayed,
        first_divergence: None,
    })
}

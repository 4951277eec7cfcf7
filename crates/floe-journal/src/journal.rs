//! Per-frame event buffering with a bounded history.
//!
//! The [`EventJournal`] collects the [`GameEvent`]s of the frame in progress
//! together with the spawn/despawn outcomes of the frame's deferred commands.
//! Closing the frame produces a [`FrameRecord`], which is returned to the
//! caller and also pushed into a rolling history (60 frames by default, one
//! second of play).
//!
//! # Example
//!
//! ```
//! use floe_journal::prelude::*;
//! use floe_world::prelude::*;
//!
//! let mut journal = EventJournal::new();
//! journal.begin_frame(1);
//! journal.record(GameEvent::sound(
//!     Sound::Jump,
//!     SystemId::INPUT,
//!     CausalReason::PlayerInput("jump".into()),
//! ));
//! let record = journal.end_frame();
//! assert_eq!(record.frame, 1);
//! assert_eq!(record.events.len(), 1);
//! assert_eq!(journal.history().len(), 1);
//! ```

use std::collections::VecDeque;

use floe_world::command::AppliedCommand;
use floe_world::entity::EntityId;
use floe_world::identity::SystemId;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::event::{EventKind, GameEvent, Sound};

// ---------------------------------------------------------------------------
// FrameRecord
// ---------------------------------------------------------------------------

/// Everything the journal saw during one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame: u64,
    pub events: Vec<GameEvent>,
    pub spawns: Vec<EntityId>,
    pub despawns: Vec<EntityId>,
    pub commands_processed: usize,
    pub commands_succeeded: usize,
}

impl FrameRecord {
    /// Sound cues of this frame, in emission order.
    pub fn sounds(&self) -> impl Iterator<Item = Sound> + '_ {
        self.events.iter().filter_map(|e| match e.kind {
            EventKind::PlaySound(s) => Some(s),
            _ => None,
        })
    }

    /// Net score change reported this frame.
    pub fn score_delta(&self) -> i64 {
        self.events
            .iter()
            .map(|e| match e.kind {
                EventKind::ScoreChanged { delta, .. } => delta,
                _ => 0,
            })
            .sum()
    }
}

// ---------------------------------------------------------------------------
// EventJournal
// ---------------------------------------------------------------------------

/// Collects events for the frame in progress and keeps recent frames.
#[derive(Debug, Clone)]
pub struct EventJournal {
    current: FrameRecord,
    history: VecDeque<FrameRecord>,
    max_history: usize,
}

impl Default for EventJournal {
    fn default() -> Self {
        Self::new()
    }
}

impl EventJournal {
    /// A journal keeping the last 60 frames.
    pub fn new() -> Self {
        Self::with_max_history(60)
    }

    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            current: FrameRecord::default(),
            history: VecDeque::new(),
            max_history,
        }
    }

    /// Start collecting for `frame`, discarding anything not yet closed.
    pub fn begin_frame(&mut self, frame: u64) {
        self.current = FrameRecord {
            frame,
            ..FrameRecord::default()
        };
    }

    /// Record an event in the current frame.
    pub fn record(&mut self, mut event: GameEvent) {
        event.frame = self.current.frame;
        trace!(frame = event.frame, kind = event.kind.name(), "event");
        self.current.events.push(event);
    }

    /// Record the outcome of the frame's deferred commands. Failed commands
    /// are counted but contribute no spawn or despawn.
    pub fn process_commands(&mut self, applied: &[AppliedCommand]) {
        self.current.commands_processed += applied.len();
        for command in applied.iter().filter(|c| c.applied_successfully) {
            self.current.commands_succeeded += 1;
            if let Some(id) = command.spawned {
                self.current.spawns.push(id);
            }
            if command.despawn {
                if let Some(id) = command.target {
                    self.current.despawns.push(id);
                }
            }
        }
    }

    /// Events recorded so far in the frame in progress.
    pub fn current_events(&self) -> &[GameEvent] {
        &self.current.events
    }

    /// Close the current frame, archive it and return it.
    pub fn end_frame(&mut self) -> FrameRecord {
        let record = std::mem::take(&mut self.current);
        self.current.frame = record.frame;
        self.history.push_back(record.clone());
        while self.history.len() > self.max_history {
            self.history.pop_front();
        }
        record
    }

    pub fn history(&self) -> &VecDeque<FrameRecord> {
        &self.history
    }

    pub fn frame(&self, frame: u64) -> Option<&FrameRecord> {
        self.history.iter().find(|r| r.frame == frame)
    }

    /// Events in the retained history matching `pred`, oldest first.
    pub fn events_where<'a>(
        &'a self,
        mut pred: impl FnMut(&GameEvent) -> bool + 'a,
    ) -> impl Iterator<Item = &'a GameEvent> + 'a {
        self.history
            .iter()
            .flat_map(|r| r.events.iter())
            .filter(move |e| pred(*e))
    }

    /// Retained events involving `entity`.
    pub fn events_for_entity(&self, entity: EntityId) -> impl Iterator<Item = &GameEvent> + '_ {
        self.events_where(move |e| e.involved_entities.contains(&entity))
    }

    /// Retained events emitted by `system`.
    pub fn events_by_system(&self, system: SystemId) -> impl Iterator<Item = &GameEvent> + '_ {
        self.events_where(move |e| e.caused_by == system)
    }

    /// Forget all history and the frame in progress.
    pub fn clear(&mut self) {
        self.history.clear();
        self.current = FrameRecord::default();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use floe_world::command::CausalReason;

    fn rule(name: &str) -> CausalReason {
        CausalReason::GameRule(name.to_owned())
    }

    #[test]
    fn events_carry_their_frame() {
        let mut journal = EventJournal::new();
        journal.begin_frame(7);
        journal.record(GameEvent::sound(Sound::Coin, SystemId::INTERACTION, rule("coin")));
        let record = journal.end_frame();
        assert_eq!(record.events[0].frame, 7);
        assert_eq!(record.sounds().collect::<Vec<_>>(), vec![Sound::Coin]);
    }

    #[test]
    fn history_is_bounded() {
        let mut journal = EventJournal::with_max_history(3);
        for frame in 0..10 {
            journal.begin_frame(frame);
            journal.end_frame();
        }
        let frames: Vec<u64> = journal.history().iter().map(|r| r.frame).collect();
        assert_eq!(frames, vec![7, 8, 9]);
        assert!(journal.frame(2).is_none());
        assert!(journal.frame(8).is_some());
    }

    #[test]
    fn score_delta_sums_score_events() {
        let mut journal = EventJournal::new();
        journal.begin_frame(1);
        journal.record(GameEvent::new(
            EventKind::ScoreChanged { delta: 111, total: 111 },
            SystemId::ROOM,
            rule("win_count"),
        ));
        journal.record(GameEvent::new(
            EventKind::ScoreChanged { delta: 89, total: 200 },
            SystemId::ROOM,
            rule("win_count"),
        ));
        assert_eq!(journal.end_frame().score_delta(), 200);
    }

    #[test]
    fn queries_filter_by_entity_and_system() {
        let mut journal = EventJournal::new();
        let player = EntityId::new(0, 0);
        journal.begin_frame(1);
        journal.record(
            GameEvent::new(EventKind::HpChanged { entity: player, hp: 2 }, SystemId::COLLISION, rule("hazard"))
                .involving([player]),
        );
        journal.record(GameEvent::sound(Sound::Pop, SystemId::ROOM, rule("win_puff")));
        journal.end_frame();
        assert_eq!(journal.events_for_entity(player).count(), 1);
        assert_eq!(journal.events_by_system(SystemId::ROOM).count(), 1);
    }

    #[test]
    fn command_outcomes_feed_spawns_and_despawns() {
        let mut journal = EventJournal::new();
        journal.begin_frame(1);
        let gone = EntityId::new(3, 0);
        let born = EntityId::new(4, 0);
        journal.process_commands(&[
            AppliedCommand {
                command_index: 0,
                target: Some(gone),
                spawned: None,
                despawn: true,
                issued_by: SystemId::INTERACTION,
                reason: rule("stomped"),
                applied_successfully: true,
            },
            AppliedCommand {
                command_index: 1,
                target: None,
                spawned: Some(born),
                despawn: false,
                issued_by: SystemId::INTERACTION,
                reason: rule("corpse"),
                applied_successfully: true,
            },
            AppliedCommand {
                command_index: 2,
                target: Some(gone),
                spawned: None,
                despawn: true,
                issued_by: SystemId::INTERACTION,
                reason: rule("again"),
                applied_successfully: false,
            },
        ]);
        let record = journal.end_frame();
        assert_eq!(record.despawns, vec![gone]);
        assert_eq!(record.spawns, vec![born]);
        assert_eq!(record.commands_processed, 3);
        assert_eq!(record.commands_succeeded, 2);
    }
}

//! Deferred spawn/despawn commands with causality metadata.
//!
//! Entity interactions run while the room is iterating over its entities. An
//! interaction that destroys something (a stomped snowball, a collected coin,
//! a kicked flat iceblock replaced by a dashing one) marks the entity dead and
//! queues a [`CommandKind::Despawn`] here; fire-and-forget effects such as
//! corpses and ragdolls are queued as [`CommandKind::Spawn`]. The buffer is
//! applied once at the end of the frame, in FIFO order, so every handle
//! observed during the frame stays resolvable until the frame ends.
//!
//! # Example
//!
//! ```
//! use floe_world::prelude::*;
//!
//! let mut reg: Registry<&str> = Registry::new();
//! let snowball = reg.insert("snowball");
//!
//! let mut cmds = CommandBuffer::new();
//! cmds.despawn(snowball, SystemId::INTERACTION, CausalReason::GameRule("stomped".into()));
//! cmds.spawn("corpse", SystemId::INTERACTION, CausalReason::GameRule("stomped".into()));
//!
//! let applied = cmds.apply(&mut reg);
//! assert_eq!(applied.len(), 2);
//! assert!(!reg.contains(snowball));
//! assert_eq!(reg.len(), 1);
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::entity::EntityId;
use crate::identity::SystemId;
use crate::registry::Registry;

// ---------------------------------------------------------------------------
// CausalReason
// ---------------------------------------------------------------------------

/// Why a command was issued. Carried into the event journal for debugging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CausalReason {
    /// Caused by player input (jump, kick, ...).
    PlayerInput(String),
    /// Contact between two entities, toucher first.
    Contact(EntityId, EntityId),
    /// Contact with a typed tile.
    TileContact(String),
    /// A game rule, e.g. `"stomped"` or `"left_room"`.
    GameRule(String),
    /// A variant or phase change.
    StateTransition { from: String, to: String },
    /// An alarm firing.
    Timer(String),
    /// A timeline command at the given step.
    Timeline(String),
    /// Internal bookkeeping; prefer a more specific reason.
    SystemInternal(String),
}

// ---------------------------------------------------------------------------
// CommandKind / Command
// ---------------------------------------------------------------------------

/// What a queued command does.
#[derive(Debug, Clone)]
pub enum CommandKind<T> {
    Spawn(T),
    Despawn,
}

/// A queued mutation plus its provenance.
#[derive(Debug, Clone)]
pub struct Command<T> {
    /// Target entity; `None` for spawns.
    pub target: Option<EntityId>,
    pub kind: CommandKind<T>,
    pub issued_by: SystemId,
    pub reason: CausalReason,
    /// Position in the buffer, assigned on insertion.
    pub command_index: u32,
}

/// Outcome of one command after [`CommandBuffer::apply`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedCommand {
    pub command_index: u32,
    pub target: Option<EntityId>,
    /// The id given to a spawned entity.
    pub spawned: Option<EntityId>,
    pub despawn: bool,
    pub issued_by: SystemId,
    pub reason: CausalReason,
    pub applied_successfully: bool,
}

// ---------------------------------------------------------------------------
// ApplyReport
// ---------------------------------------------------------------------------

/// Health summary of the last apply.
///
/// `duplicate_count` counts despawns aimed at an entity already despawned
/// earlier in the same apply; those are skipped quietly. `failed_count`
/// counts despawns of ids that were already stale when the apply began.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub duplicate_count: usize,
    pub failed_count: usize,
    pub success_count: usize,
}

// ---------------------------------------------------------------------------
// CommandBuffer
// ---------------------------------------------------------------------------

/// FIFO buffer of deferred spawns and despawns.
#[derive(Debug, Clone)]
pub struct CommandBuffer<T> {
    commands: Vec<Command<T>>,
    next_index: u32,
    last_apply_report: ApplyReport,
}

impl<T> Default for CommandBuffer<T> {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
            next_index: 0,
            last_apply_report: ApplyReport::default(),
        }
    }
}

impl<T> CommandBuffer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, target: Option<EntityId>, kind: CommandKind<T>, issued_by: SystemId, reason: CausalReason) {
        let command_index = self.next_index;
        self.next_index += 1;
        self.commands.push(Command {
            target,
            kind,
            issued_by,
            reason,
            command_index,
        });
    }

    /// Queue a new entity to be inserted at the end of the frame.
    pub fn spawn(&mut self, value: T, issued_by: SystemId, reason: CausalReason) {
        self.push(None, CommandKind::Spawn(value), issued_by, reason);
    }

    /// Queue removal of `target` at the end of the frame.
    pub fn despawn(&mut self, target: EntityId, issued_by: SystemId, reason: CausalReason) {
        self.push(Some(target), CommandKind::Despawn, issued_by, reason);
    }

    /// `true` if a despawn for `id` is already queued.
    pub fn is_despawn_queued(&self, id: EntityId) -> bool {
        self.commands
            .iter()
            .any(|c| matches!(c.kind, CommandKind::Despawn) && c.target == Some(id))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Drop all queued commands without applying them.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.next_index = 0;
    }

    pub fn last_apply_report(&self) -> &ApplyReport {
        &self.last_apply_report
    }

    /// Apply every queued command to `registry` in insertion order and
    /// return what happened to each. The buffer is empty afterwards.
    pub fn apply(&mut self, registry: &mut Registry<T>) -> Vec<AppliedCommand> {
        let mut report = ApplyReport::default();
        let mut despawned: BTreeSet<EntityId> = BTreeSet::new();
        let mut applied = Vec::with_capacity(self.commands.len());

        for command in self.commands.drain(..) {
            let mut record = AppliedCommand {
                command_index: command.command_index,
                target: command.target,
                spawned: None,
                despawn: false,
                issued_by: command.issued_by,
                reason: command.reason,
                applied_successfully: false,
            };
            match command.kind {
                CommandKind::Spawn(value) => {
                    record.spawned = Some(registry.insert(value));
                    record.applied_successfully = true;
                    report.success_count += 1;
                }
                CommandKind::Despawn => {
                    record.despawn = true;
                    let Some(target) = command.target else {
                        report.failed_count += 1;
                        applied.push(record);
                        continue;
                    };
                    if despawned.contains(&target) {
                        debug!(
                            command_index = record.command_index,
                            entity = %target,
                            "duplicate despawn in one frame; skipping"
                        );
                        report.duplicate_count += 1;
                    } else if registry.remove(target).is_some() {
                        despawned.insert(target);
                        record.applied_successfully = true;
                        report.success_count += 1;
                    } else {
                        warn!(
                            command_index = record.command_index,
                            entity = %target,
                            system = record.issued_by.0,
                            "despawn of stale entity"
                        );
                        report.failed_count += 1;
                    }
                }
            }
            applied.push(record);
        }

        self.next_index = 0;
        self.last_apply_report = report;
        applied
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str) -> CausalReason {
        CausalReason::GameRule(name.to_owned())
    }

    #[test]
    fn fifo_application_order() {
        let mut reg: Registry<u32> = Registry::new();
        let mut cmds = CommandBuffer::new();
        cmds.spawn(1, SystemId::INTERACTION, rule("a"));
        cmds.spawn(2, SystemId::INTERACTION, rule("b"));
        let applied = cmds.apply(&mut reg);
        assert_eq!(applied[0].command_index, 0);
        assert_eq!(applied[1].command_index, 1);
        let first = applied[0].spawned.unwrap();
        let second = applied[1].spawned.unwrap();
        assert_eq!(reg.get(first), Some(&1));
        assert_eq!(reg.get(second), Some(&2));
        assert!(cmds.is_empty());
    }

    #[test]
    fn duplicate_despawn_is_counted_not_failed() {
        let mut reg: Registry<u32> = Registry::new();
        let id = reg.insert(5);
        let mut cmds = CommandBuffer::new();
        cmds.despawn(id, SystemId::INTERACTION, rule("stomped"));
        cmds.despawn(id, SystemId::COLLISION, rule("fell"));
        assert!(cmds.is_despawn_queued(id));
        let applied = cmds.apply(&mut reg);
        assert!(applied[0].applied_successfully);
        assert!(!applied[1].applied_successfully);
        let report = cmds.last_apply_report();
        assert_eq!(report.success_count, 1);
        assert_eq!(report.duplicate_count, 1);
        assert_eq!(report.failed_count, 0);
    }

    #[test]
    fn stale_despawn_fails() {
        let mut reg: Registry<u32> = Registry::new();
        let id = reg.insert(5);
        reg.remove(id);
        let mut cmds = CommandBuffer::new();
        cmds.despawn(id, SystemId::ROOM, rule("left_room"));
        let applied = cmds.apply(&mut reg);
        assert!(!applied[0].applied_successfully);
        assert_eq!(cmds.last_apply_report().failed_count, 1);
    }

    #[test]
    fn clear_discards_without_applying() {
        let mut reg: Registry<u32> = Registry::new();
        let mut cmds = CommandBuffer::new();
        cmds.spawn(9, SystemId::ROOM, rule("x"));
        cmds.clear();
        assert!(cmds.apply(&mut reg).is_empty());
        assert!(reg.is_empty());
    }
}

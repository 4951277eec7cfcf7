//! Generational handles for room entities.
//!
//! Every entity living in a room is addressed by an [`EntityId`]: a slot index
//! into the room's registry plus a generation counter that is bumped each time
//! the slot is recycled. A handle kept across frames (a held item, a timeline
//! target, a warp traveller) can therefore always be checked for liveness
//! instead of silently aliasing a newer entity.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// A generational entity handle.
///
/// Layout: `[generation: u32 | index: u32]`. Ordering compares the index
/// first, so sorting a set of live ids yields spawn-slot order, which is what
/// the crowd tie-break and the frame iteration order rely on.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Pack an index and generation into a handle.
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | index as u64)
    }

    /// Slot index (low 32 bits).
    #[inline]
    pub fn index(self) -> u32 {
        self.0 as u32
    }

    /// Generation (high 32 bits).
    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Raw packed form, handy for logging and for stable hashing.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl Ord for EntityId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index()
            .cmp(&other.index())
            .then(self.generation().cmp(&other.generation()))
    }
}

impl PartialOrd for EntityId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}v{})", self.index(), self.generation())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index(), self.generation())
    }
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Slot {
    generation: u32,
    alive: bool,
}

/// Hands out [`EntityId`]s and recycles their slots.
///
/// Released slots wait in a FIFO queue so a freshly destroyed enemy's slot is
/// not handed straight back to the corpse spawned in its place; stale handles
/// to short-lived effects stay detectably stale for longer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityAllocator {
    slots: Vec<Slot>,
    free: VecDeque<u32>,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a handle, reusing the oldest released slot when one exists.
    pub fn allocate(&mut self) -> EntityId {
        match self.free.pop_front() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.alive = true;
                EntityId::new(index, slot.generation)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    alive: true,
                });
                EntityId::new(index, 0)
            }
        }
    }

    /// Release a handle. The slot's generation is bumped so every copy of
    /// `id` still held elsewhere becomes stale.
    ///
    /// Returns `false` if `id` was already stale.
    pub fn release(&mut self, id: EntityId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        let slot = &mut self.slots[id.index() as usize];
        slot.alive = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push_back(id.index());
        true
    }

    /// `true` if `id` names a live slot with a matching generation.
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.slots
            .get(id.index() as usize)
            .is_some_and(|slot| slot.alive && slot.generation == id.generation())
    }

    /// The live handle currently occupying `index`, if any.
    pub fn live_at(&self, index: u32) -> Option<EntityId> {
        self.slots
            .get(index as usize)
            .filter(|slot| slot.alive)
            .map(|slot| EntityId::new(index, slot.generation))
    }

    /// Number of slots ever created (live or free).
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn alive_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.alive).count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_have_distinct_indices() {
        let mut alloc = EntityAllocator::new();
        let mut indices: Vec<u32> = (0..64).map(|_| alloc.allocate().index()).collect();
        indices.dedup();
        assert_eq!(indices.len(), 64);
    }

    #[test]
    fn released_slot_comes_back_with_next_generation() {
        let mut alloc = EntityAllocator::new();
        let first = alloc.allocate();
        assert!(alloc.release(first));
        let second = alloc.allocate();
        assert_eq!(second.index(), first.index());
        assert_eq!(second.generation(), first.generation() + 1);
        assert!(!alloc.is_alive(first));
        assert!(alloc.is_alive(second));
    }

    #[test]
    fn free_slots_are_recycled_oldest_first() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        alloc.release(b);
        alloc.release(a);
        assert_eq!(alloc.allocate().index(), b.index());
        assert_eq!(alloc.allocate().index(), a.index());
    }

    #[test]
    fn double_release_is_rejected() {
        let mut alloc = EntityAllocator::new();
        let id = alloc.allocate();
        assert!(alloc.release(id));
        assert!(!alloc.release(id));
        assert_eq!(alloc.alive_count(), 0);
    }

    #[test]
    fn live_at_reports_current_generation() {
        let mut alloc = EntityAllocator::new();
        let id = alloc.allocate();
        assert_eq!(alloc.live_at(id.index()), Some(id));
        alloc.release(id);
        assert_eq!(alloc.live_at(id.index()), None);
        assert_eq!(alloc.live_at(99), None);
    }

    #[test]
    fn ordering_is_by_index_then_generation() {
        let low = EntityId::new(1, 9);
        let high = EntityId::new(2, 0);
        assert!(low < high);
        assert!(EntityId::new(3, 0) < EntityId::new(3, 1));
        assert_eq!(EntityId::from_raw(low.to_raw()), low);
    }
}

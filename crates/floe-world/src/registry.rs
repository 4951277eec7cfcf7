//! Arena mapping [`EntityId`] to entity state.
//!
//! A [`Registry`] owns every entity of a room. Liveness is decided by
//! registry membership: once an entity is removed its id stops resolving,
//! regardless of who still holds a copy. Frame passes iterate over a snapshot
//! of ids taken with [`Registry::ids`], so entities inserted or removed during
//! a pass never invalidate the iteration.
//!
//! # Example
//!
//! ```
//! use floe_world::registry::Registry;
//!
//! let mut reg: Registry<&str> = Registry::new();
//! let a = reg.insert("snowball");
//! let b = reg.insert("spiky");
//!
//! for id in reg.ids() {
//!     if reg.get(id) == Some(&"snowball") {
//!         reg.remove(id);
//!     }
//! }
//! assert!(!reg.contains(a));
//! assert!(reg.contains(b));
//! ```

use serde::{Deserialize, Serialize};

use crate::entity::{EntityAllocator, EntityId};
use crate::WorldError;

/// Generational arena of entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registry<T> {
    allocator: EntityAllocator,
    slots: Vec<Option<T>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            allocator: EntityAllocator::new(),
            slots: Vec::new(),
        }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value and return its fresh id.
    pub fn insert(&mut self, value: T) -> EntityId {
        let id = self.allocator.allocate();
        let index = id.index() as usize;
        if index == self.slots.len() {
            self.slots.push(Some(value));
        } else {
            self.slots[index] = Some(value);
        }
        id
    }

    /// Remove and return the value for `id`. Stale ids return `None`.
    pub fn remove(&mut self, id: EntityId) -> Option<T> {
        if !self.allocator.release(id) {
            return None;
        }
        self.slots[id.index() as usize].take()
    }

    /// Like [`remove`](Self::remove), but reports a stale id as an error.
    pub fn try_remove(&mut self, id: EntityId) -> Result<T, WorldError> {
        self.remove(id).ok_or(WorldError::StaleEntity { entity: id })
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.allocator.is_alive(id)
    }

    pub fn get(&self, id: EntityId) -> Option<&T> {
        if !self.allocator.is_alive(id) {
            return None;
        }
        self.slots[id.index() as usize].as_ref()
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        if !self.allocator.is_alive(id) {
            return None;
        }
        self.slots[id.index() as usize].as_mut()
    }

    /// Mutable access to two distinct entities at once.
    ///
    /// Returns `None` if either id is stale or both name the same entity.
    pub fn get_pair_mut(&mut self, a: EntityId, b: EntityId) -> Option<(&mut T, &mut T)> {
        if a.index() == b.index() || !self.contains(a) || !self.contains(b) {
            return None;
        }
        let (ia, ib) = (a.index() as usize, b.index() as usize);
        if ia < ib {
            let (lo, hi) = self.slots.split_at_mut(ib);
            Some((lo[ia].as_mut()?, hi[0].as_mut()?))
        } else {
            let (lo, hi) = self.slots.split_at_mut(ia);
            Some((hi[0].as_mut()?, lo[ib].as_mut()?))
        }
    }

    /// Snapshot of every live id in slot order.
    pub fn ids(&self) -> Vec<EntityId> {
        (0..self.slots.len() as u32)
            .filter_map(|index| self.allocator.live_at(index))
            .collect()
    }

    /// Iterate live entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(move |(index, slot)| {
            let value = slot.as_ref()?;
            let id = self.allocator.live_at(index as u32)?;
            Some((id, value))
        })
    }

    /// Ids of the live entries matching `pred`, in slot order.
    pub fn ids_where(&self, mut pred: impl FnMut(&T) -> bool) -> Vec<EntityId> {
        self.iter()
            .filter(|(_, value)| pred(value))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.allocator.alive_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_remove() {
        let mut reg = Registry::new();
        let id = reg.insert(7u32);
        assert_eq!(reg.get(id), Some(&7));
        *reg.get_mut(id).unwrap() = 8;
        assert_eq!(reg.remove(id), Some(8));
        assert_eq!(reg.get(id), None);
        assert!(reg.is_empty());
    }

    #[test]
    fn stale_id_does_not_resolve_to_new_occupant() {
        let mut reg = Registry::new();
        let old = reg.insert("corpse");
        reg.remove(old);
        let new = reg.insert("coin");
        assert_eq!(new.index(), old.index());
        assert_eq!(reg.get(old), None);
        assert_eq!(reg.get(new), Some(&"coin"));
    }

    #[test]
    fn try_remove_reports_stale_entity() {
        let mut reg: Registry<u8> = Registry::new();
        let id = reg.insert(1);
        reg.remove(id);
        let err = reg.try_remove(id).unwrap_err();
        assert!(matches!(err, WorldError::StaleEntity { entity } if entity == id));
    }

    #[test]
    fn ids_snapshot_survives_removal_during_iteration() {
        let mut reg = Registry::new();
        let ids: Vec<_> = (0..5).map(|i| reg.insert(i)).collect();
        for id in reg.ids() {
            // Removing the next entity mid-pass must not disturb the pass.
            let next = EntityId::new(id.index() + 1, 0);
            reg.remove(next);
        }
        assert!(reg.contains(ids[0]));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn pair_access_in_both_orders() {
        let mut reg = Registry::new();
        let a = reg.insert(1);
        let b = reg.insert(2);
        {
            let (x, y) = reg.get_pair_mut(b, a).unwrap();
            std::mem::swap(x, y);
        }
        assert_eq!(reg.get(a), Some(&2));
        assert_eq!(reg.get(b), Some(&1));
        assert!(reg.get_pair_mut(a, a).is_none());
    }

    #[test]
    fn iteration_is_in_slot_order() {
        let mut reg = Registry::new();
        let a = reg.insert('a');
        let _b = reg.insert('b');
        reg.remove(a);
        let c = reg.insert('c');
        let order: Vec<char> = reg.iter().map(|(_, v)| *v).collect();
        assert_eq!(order, vec!['c', 'b']);
        assert_eq!(reg.ids_where(|v| *v == 'c'), vec![c]);
    }

    #[test]
    fn registry_roundtrips_through_json() {
        let mut reg = Registry::new();
        let a = reg.insert(String::from("rock"));
        let b = reg.insert(String::from("spring"));
        reg.remove(a);
        let json = serde_json::to_string(&reg).unwrap();
        let back: Registry<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.ids(), vec![b]);
        assert!(!back.contains(a));
    }
}

//! Per-entity countdown alarms.
//!
//! An alarm counts down by the frame's `delta_mult` and fires exactly once
//! when it crosses zero, after which it is gone. Repeating behavior (the
//! level timer, win-count drains) re-arms the alarm from its handler.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Named countdown timers keyed by `K`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alarms<K: Ord> {
    timers: BTreeMap<K, f64>,
}

impl<K: Ord> Default for Alarms<K> {
    fn default() -> Self {
        Self {
            timers: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Copy> Alarms<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) `key` to fire after `frames` frames.
    pub fn set(&mut self, key: K, frames: f64) {
        self.timers.insert(key, frames);
    }

    pub fn cancel(&mut self, key: K) {
        self.timers.remove(&key);
    }

    /// Frames left on `key`, if armed.
    pub fn remaining(&self, key: K) -> Option<f64> {
        self.timers.get(&key).copied()
    }

    pub fn is_set(&self, key: K) -> bool {
        self.timers.contains_key(&key)
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }

    /// Count every alarm down by `delta_mult` and return the ones that
    /// crossed zero, in key order. Fired alarms are disarmed.
    pub fn tick(&mut self, delta_mult: f64) -> Vec<K> {
        let mut fired = Vec::new();
        for (key, remaining) in self.timers.iter_mut() {
            *remaining -= delta_mult;
            if *remaining <= 0.0 {
                fired.push(*key);
            }
        }
        for key in &fired {
            self.timers.remove(key);
        }
        fired
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    enum Key {
        Stun,
        Timer,
    }

    #[test]
    fn fires_once_at_zero_crossing() {
        let mut alarms = Alarms::new();
        alarms.set(Key::Stun, 3.0);
        assert!(alarms.tick(1.0).is_empty());
        assert!(alarms.tick(1.0).is_empty());
        assert_eq!(alarms.tick(1.0), vec![Key::Stun]);
        assert!(alarms.tick(1.0).is_empty());
        assert!(!alarms.is_set(Key::Stun));
    }

    #[test]
    fn large_delta_fires_only_once() {
        let mut alarms = Alarms::new();
        alarms.set(Key::Timer, 40.0);
        assert_eq!(alarms.tick(100.0), vec![Key::Timer]);
        assert_eq!(alarms.remaining(Key::Timer), None);
    }

    #[test]
    fn rearm_from_handler() {
        let mut alarms = Alarms::new();
        alarms.set(Key::Timer, 2.0);
        let mut fired = 0;
        for _ in 0..6 {
            for key in alarms.tick(1.0) {
                fired += 1;
                alarms.set(key, 2.0);
            }
        }
        assert_eq!(fired, 3);
    }

    #[test]
    fn fired_in_key_order() {
        let mut alarms = Alarms::new();
        alarms.set(Key::Timer, 1.0);
        alarms.set(Key::Stun, 1.0);
        alarms.cancel(Key::Timer);
        alarms.set(Key::Timer, 0.5);
        assert_eq!(alarms.tick(1.0), vec![Key::Stun, Key::Timer]);
    }
}

//! Thin ice: cracks while stood on, refreezes when left alone.
//!
//! Two independent accumulators drive the frame counter. `crack_time` fills
//! while a player stands on the ice and advances one crack frame each time
//! it reaches the crack threshold. When nobody is on it, `crack_time` drains
//! at the refreeze rate and the same amount fills `freeze_time`, which takes
//! a crack frame back off each time *it* reaches the threshold. Both can be
//! part-way at once, so a brief hop off the ice does not reset progress.
//!
//! After the last crack frame the ice shatters (plays once) and is gone.

use floe_journal::prelude::*;
use floe_world::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::entity::{EntityAlarm, Variant};
use crate::room::{Room, StepCtx};

/// Number of interchangeable crack sounds.
pub const CRACK_SOUNDS: u8 = 4;

/// Crack state of one thin-ice block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IceState {
    /// 0 is solid; `frames - 1` is the last crack before shattering.
    pub frame: u32,
    pub crack_time: f64,
    pub freeze_time: f64,
    /// Never refreezes.
    pub permanent: bool,
    pub shattering: bool,
}

/// What a call to [`IceState::dwell`] or [`IceState::crack`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceChange {
    Cracked,
    Shattered,
}

impl IceState {
    pub fn new(permanent: bool) -> Self {
        Self {
            permanent,
            ..Self::default()
        }
    }

    /// Add one crack frame, or shatter if there are none left.
    pub fn crack(&mut self, frames: u32) -> Option<IceChange> {
        if self.shattering {
            return None;
        }
        if self.frame + 1 < frames {
            self.frame += 1;
            self.freeze_time = 0.0;
            Some(IceChange::Cracked)
        } else {
            self.shattering = true;
            Some(IceChange::Shattered)
        }
    }

    /// `players` players stood on the ice for `delta` time units.
    pub fn dwell(&mut self, players: usize, delta: f64, threshold: f64, frames: u32) -> Vec<IceChange> {
        let mut changes = Vec::new();
        if self.shattering || threshold <= 0.0 {
            return changes;
        }
        for _ in 0..players {
            self.crack_time += delta;
            while self.crack_time >= threshold {
                self.crack_time -= threshold;
                match self.crack(frames) {
                    Some(IceChange::Shattered) => {
                        changes.push(IceChange::Shattered);
                        return changes;
                    }
                    Some(c) => changes.push(c),
                    None => return changes,
                }
            }
        }
        changes
    }

    /// Nobody stood on the ice for `delta` time units.
    pub fn idle(&mut self, delta: f64, threshold: f64, rate: f64) {
        if self.shattering || self.permanent {
            return;
        }
        let rfa = delta * rate;
        self.crack_time = (self.crack_time - rfa).max(0.0);
        if self.frame > 0 {
            self.freeze_time += rfa;
            while threshold > 0.0 && self.freeze_time >= threshold && self.frame > 0 {
                self.freeze_time -= threshold;
                self.frame -= 1;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Room integration
// ---------------------------------------------------------------------------

impl Room {
    /// Crack the thin ice `id` once (jumping off it, or burning it).
    pub fn crack_ice(&mut self, ctx: &mut StepCtx<'_>, id: EntityId) {
        let frames = ctx.cfg.objects.ice_crack_frames;
        let Some(e) = self.entities.get_mut(id) else { return };
        let Variant::ThinIce(ice) = &mut e.variant else { return };
        let change = ice.crack(frames);
        self.ice_feedback(ctx, id, change.into_iter().collect());
    }

    /// Advance the ice `id` given how many players stand on it.
    pub(crate) fn step_ice(&mut self, ctx: &mut StepCtx<'_>, id: EntityId, players: usize) {
        let o = &ctx.cfg.objects;
        let (threshold, frames, rate) = (o.ice_crack_time, o.ice_crack_frames, o.ice_refreeze_rate);
        let Some(e) = self.entities.get_mut(id) else { return };
        let Variant::ThinIce(ice) = &mut e.variant else { return };
        let changes = if players > 0 {
            ice.dwell(players, ctx.delta, threshold, frames)
        } else {
            ice.idle(ctx.delta, threshold, rate);
            Vec::new()
        };
        self.ice_feedback(ctx, id, changes);
    }

    fn ice_feedback(&mut self, ctx: &mut StepCtx<'_>, id: EntityId, changes: Vec<IceChange>) {
        for change in changes {
            let sound = match change {
                IceChange::Cracked => Sound::IceCrack(ctx.rng.gen_range(0..CRACK_SOUNDS)),
                IceChange::Shattered => {
                    if let Some(e) = self.entities.get_mut(id) {
                        e.alarms.set(EntityAlarm::Shatter, ctx.cfg.objects.ice_shatter_frames);
                    }
                    Sound::IceShatter
                }
            };
            ctx.emit(
                GameEvent::sound(sound, SystemId::INTERACTION, CausalReason::GameRule("thin_ice".into()))
                    .involving([id]),
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dwell_then_idle_decays_proportionally() {
        let mut ice = IceState::new(false);
        for _ in 0..25 {
            ice.dwell(1, 1.0, 20.0, 5);
        }
        assert_eq!(ice.frame, 1);
        assert!((ice.crack_time - 5.0).abs() < 1e-9);

        for _ in 0..25 {
            ice.idle(1.0, 20.0, 0.25);
            assert!(ice.crack_time >= 0.0);
        }
        assert_eq!(ice.frame, 1);
        assert_eq!(ice.crack_time, 0.0);
        assert!((ice.freeze_time - 6.25).abs() < 1e-9);
    }

    #[test]
    fn refreeze_takes_frames_back() {
        let mut ice = IceState::new(false);
        ice.frame = 2;
        ice.idle(80.0, 20.0, 0.25);
        assert_eq!(ice.frame, 1);
        assert_eq!(ice.freeze_time, 0.0);
    }

    #[test]
    fn permanent_ice_never_refreezes() {
        let mut ice = IceState::new(true);
        ice.frame = 3;
        ice.crack_time = 4.0;
        ice.idle(1000.0, 20.0, 0.25);
        assert_eq!(ice.frame, 3);
        assert_eq!(ice.crack_time, 4.0);
    }

    #[test]
    fn last_crack_shatters_once() {
        let mut ice = IceState::new(false);
        let changes = ice.dwell(1, 100.0, 20.0, 5);
        assert_eq!(changes.last(), Some(&IceChange::Shattered));
        assert_eq!(changes.len(), 5);
        assert!(ice.shattering);
        assert!(ice.dwell(1, 100.0, 20.0, 5).is_empty());
        assert_eq!(ice.crack(5), None);
    }

    #[test]
    fn two_players_crack_twice_as_fast() {
        let mut ice = IceState::new(false);
        ice.dwell(2, 10.0, 20.0, 5);
        assert_eq!(ice.frame, 1);
    }
}

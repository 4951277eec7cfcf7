//! The level timer, the win tally and the death sequence.

use floe_journal::prelude::*;
use floe_world::prelude::*;
use tracing::info;

use crate::entity::Entity;
use crate::player::{jump_release, PlayerInput};

use super::{Room, RoomAlarm, RoomPhase, RoomRequest, StepCtx, WinStage};

fn rule(why: &str) -> CausalReason {
    CausalReason::GameRule(why.into())
}

/// How much of `remaining` one frame of counting moves, with its sign.
fn count_step(ctx: &StepCtx<'_>, remaining: i64) -> i64 {
    let s = &ctx.cfg.session;
    let rate = (s.win_count_amount * s.win_count_mult * ctx.delta).round() as i64;
    rate.max(1).min(remaining.abs()) * remaining.signum()
}

impl Room {
    /// A player reached the goal. Enemies puff into points, players walk
    /// off on their own, and the tally starts after a pause. Winning twice
    /// does nothing.
    pub fn win_level(&mut self, ctx: &mut StepCtx<'_>, player: EntityId) {
        if self.won || self.phase != RoomPhase::Active {
            return;
        }
        self.won = true;

        let puffed = self
            .entities
            .ids_where(|e| e.is_live() && e.active && e.parent.is_none() && e.capabilities().win_puff);
        for id in puffed {
            self.win_puff(ctx, id);
        }
        for id in self.players.clone() {
            let Some(e) = self.entities.get_mut(id) else { continue };
            let rightward = e.motion.xvelocity >= 0.0;
            if let Some(p) = e.player_mut() {
                p.human = false;
                p.input = PlayerInput {
                    right: rightward,
                    left: !rightward,
                    sneak: true,
                    ..PlayerInput::default()
                };
            }
            jump_release(e);
        }

        self.alarms.cancel(RoomAlarm::Timer);
        self.phase = RoomPhase::Won(WinStage::Walk);
        self.alarms.set(RoomAlarm::WinCountPoints, ctx.cfg.session.win_count_start);
        if let Some(main) = ctx.session.main_area.clone() {
            ctx.session.current_checkpoints.remove(&main);
        }
        info!(room = %self.name, player = %player, "level won");
        ctx.emit(
            GameEvent::sound(Sound::LevelWin, SystemId::ROOM, CausalReason::TileContact("level_end".into()))
                .involving([player]),
        );
    }

    pub(crate) fn tick_room_alarms(&mut self, ctx: &mut StepCtx<'_>) {
        for alarm in self.alarms.tick(ctx.delta) {
            match alarm {
                RoomAlarm::Timer => self.timer_tick(ctx),
                RoomAlarm::WinCountPoints => {
                    self.phase = RoomPhase::Won(if self.points > 0 {
                        WinStage::CountPoints
                    } else {
                        WinStage::CountTime
                    });
                }
                RoomAlarm::WinCountTime => self.phase = RoomPhase::Won(WinStage::CountTime),
                RoomAlarm::WinCountHp => self.count_hp(ctx),
                RoomAlarm::Win => self.complete_level(ctx),
                RoomAlarm::Death => self.respawn(ctx),
            }
        }
    }

    /// One tick of the level timer. Time only costs in uncleared levels.
    fn timer_tick(&mut self, ctx: &mut StepCtx<'_>) {
        let s = &mut *ctx.session;
        if let Some(main) = s.main_area.clone() {
            if s.levelset.contains_level(&main) && !s.is_cleared(&main) {
                s.adjust_time_bonus(-ctx.cfg.scoring.second_points);
            }
        }
        self.alarms.set(RoomAlarm::Timer, ctx.cfg.session.timer_frames);
    }

    /// Per-frame work of the win tally and the death fade.
    pub(crate) fn advance_sequence(&mut self, ctx: &mut StepCtx<'_>) {
        match self.phase {
            RoomPhase::Won(WinStage::CountPoints) => {
                if self.points != 0 {
                    let amt = count_step(ctx, self.points);
                    self.points -= amt;
                    ctx.emit(GameEvent::new(
                        EventKind::PointsChanged {
                            delta: -amt,
                            total: self.points,
                        },
                        SystemId::ROOM,
                        rule("win_count"),
                    ));
                    ctx.add_score(amt, SystemId::ROOM, rule("win_count"));
                    ctx.emit(GameEvent::sound(Sound::Count, SystemId::ROOM, rule("win_count")));
                } else {
                    self.phase = RoomPhase::Won(WinStage::Pause);
                    self.alarms.set(RoomAlarm::WinCountTime, ctx.cfg.session.win_count_continue);
                }
            }
            RoomPhase::Won(WinStage::CountTime) => {
                let bonus = ctx.session.time_bonus();
                if bonus != 0 {
                    let amt = count_step(ctx, bonus);
                    ctx.session.adjust_time_bonus(-amt);
                    ctx.add_score(amt, SystemId::ROOM, rule("win_count"));
                    ctx.emit(GameEvent::sound(Sound::Count, SystemId::ROOM, rule("win_count")));
                } else if ctx.session.main_cleared() {
                    self.phase = RoomPhase::Won(WinStage::Finishing);
                    self.alarms.set(RoomAlarm::Win, ctx.cfg.session.win_finish_delay);
                } else {
                    self.phase = RoomPhase::Won(WinStage::Pause);
                    self.alarms.set(RoomAlarm::WinCountHp, ctx.cfg.session.win_count_continue);
                }
            }
            RoomPhase::DeathFade { remaining_ms } => {
                let bonus = ctx.session.time_bonus();
                if bonus < 0 && !ctx.session.cleared_levels.is_empty() {
                    let frame_ms = ctx.cfg.frame_ms(ctx.delta);
                    let pace = (self.death_time_bonus.abs() as f64 * 3.0 * frame_ms / ctx.cfg.session.death_fade_ms)
                        .ceil() as i64;
                    let amt = pace.min(bonus.abs()) * bonus.signum();
                    if amt != 0 {
                        ctx.session.adjust_time_bonus(-amt);
                        ctx.add_score(amt, SystemId::ROOM, rule("time_penalty"));
                        ctx.emit(GameEvent::sound(Sound::Count, SystemId::ROOM, rule("time_penalty")));
                    }
                }
                let remaining_ms = remaining_ms - ctx.cfg.frame_ms(ctx.delta);
                if remaining_ms > 0.0 {
                    self.phase = RoomPhase::DeathFade { remaining_ms };
                } else {
                    self.phase = RoomPhase::DeathWait;
                    self.alarms.set(RoomAlarm::Death, ctx.cfg.session.death_restart_wait);
                }
            }
            _ => {}
        }
    }

    /// Trade one hit point of the first player that has any for points.
    fn count_hp(&mut self, ctx: &mut StepCtx<'_>) {
        let donor = self.players.iter().copied().find(|&id| {
            self.entities
                .get(id)
                .and_then(Entity::player)
                .is_some_and(|p| p.hp > 0)
        });
        let Some(id) = donor else {
            self.phase = RoomPhase::Won(WinStage::Finishing);
            self.alarms.set(RoomAlarm::Win, ctx.cfg.session.win_finish_delay);
            return;
        };
        let Some(p) = self.entities.get_mut(id).and_then(Entity::player_mut) else { return };
        p.hp -= 1;
        let hp = p.hp;
        ctx.emit(GameEvent::new(EventKind::HpChanged { entity: id, hp }, SystemId::ROOM, rule("win_count")));
        ctx.add_score(ctx.cfg.scoring.hp_points, SystemId::ROOM, rule("win_count"));
        ctx.emit(GameEvent::sound(Sound::Heal, SystemId::ROOM, rule("win_count")).involving([id]));
        self.alarms.set(RoomAlarm::WinCountHp, ctx.cfg.session.win_count_continue);
    }

    /// Mark the level cleared and hand control back to the game driver.
    /// Runs once per win.
    pub fn complete_level(&mut self, ctx: &mut StepCtx<'_>) {
        if self.phase == RoomPhase::Completed {
            return;
        }
        self.phase = RoomPhase::Completed;
        self.alarms.clear();
        let Some(main) = ctx.session.main_area.clone() else {
            ctx.requests.push(RoomRequest::Complete);
            return;
        };
        if ctx.session.complete_level(&main) {
            info!(level = %main, "level cleared");
        }
        ctx.emit(GameEvent::new(EventKind::LevelCompleted { level: main }, SystemId::ROOM, rule("win")));
        ctx.requests.push(RoomRequest::Complete);
    }

    /// The last player standing died: stop the clock and fade out.
    pub(crate) fn die(&mut self, ctx: &mut StepCtx<'_>) {
        if self.phase != RoomPhase::Active {
            return;
        }
        let others = self
            .players
            .iter()
            .filter(|&&id| self.entities.get(id).is_some_and(|e| e.is_live()))
            .count();
        if others > 1 {
            return;
        }
        self.phase = RoomPhase::DeathFade {
            remaining_ms: ctx.cfg.session.death_fade_ms,
        };
        self.death_time_bonus = ctx.session.time_bonus();
        self.alarms.cancel(RoomAlarm::Timer);
        let level = ctx.session.main_area.clone().unwrap_or_else(|| self.name.clone());
        info!(room = %self.name, %level, "level failed");
        ctx.emit(GameEvent::new(EventKind::LevelFailed { level }, SystemId::ROOM, rule("player_died")));
    }

    /// Death wait over. The time bonus carries over into the next try.
    fn respawn(&mut self, ctx: &mut StepCtx<'_>) {
        info!(room = %self.name, "respawning");
        ctx.requests.push(RoomRequest::Respawn);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::super::tests::{flat_room, spawn, Rig};
    use crate::definition::TileRecord;
    use crate::player::PlayerInput;

    use super::*;

    fn goal_room() -> Rig {
        let mut def = flat_room(vec![spawn("player", 64.0, 416.0)]);
        def.tiles.push(TileRecord {
            shape: "level_end".into(),
            x: 128.0,
            y: 384.0,
            width: Some(32.0),
            height: Some(64.0),
        });
        def.tiles.push(TileRecord {
            shape: "solid".into(),
            x: 608.0,
            y: 0.0,
            width: Some(32.0),
            height: Some(448.0),
        });
        Rig::new(def)
    }

    fn run_until_complete(rig: &mut Rig) -> (Vec<GameEvent>, usize) {
        let mut events = Vec::new();
        let mut completes = 0;
        for _ in 0..5000 {
            let (ev, req) = rig.step(PlayerInput {
                right: true,
                ..PlayerInput::default()
            });
            events.extend(ev);
            completes += req.iter().filter(|r| **r == RoomRequest::Complete).count();
            if rig.room.phase == RoomPhase::Completed {
                break;
            }
        }
        (events, completes)
    }

    #[test]
    fn reaching_the_goal_tallies_and_completes_once() {
        let mut rig = goal_room();
        rig.room.points = 250;
        let score_before = rig.session.score;
        let (events, completes) = run_until_complete(&mut rig);

        assert_eq!(completes, 1);
        assert!(rig.session.is_cleared("test"));
        assert_eq!(rig.room.points, 0);
        assert_eq!(rig.session.time_bonus(), 0);
        assert!(rig.session.score >= score_before + 250);
        let won = events
            .iter()
            .filter(|e| e.kind == EventKind::PlaySound(Sound::LevelWin))
            .count();
        assert_eq!(won, 1);
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e.kind, EventKind::LevelCompleted { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn winning_twice_is_a_no_op() {
        let mut rig = goal_room();
        let player = rig.room.players[0];
        let mut ctx = StepCtx::new(&rig.cfg, &mut rig.session, &mut rig.rng, 1.0);
        rig.room.win_level(&mut ctx, player);
        let after_first = (rig.room.phase, ctx.events.len());
        rig.room.win_level(&mut ctx, player);
        assert_eq!((rig.room.phase, ctx.events.len()), after_first);

        rig.room.complete_level(&mut ctx);
        rig.room.complete_level(&mut ctx);
        assert_eq!(ctx.requests, vec![RoomRequest::Complete]);
    }

    #[test]
    fn hp_is_cashed_in_on_first_clear() {
        let mut rig = goal_room();
        let max_hp = rig.cfg.player.max_hp;
        run_until_complete(&mut rig);
        assert_eq!(rig.player().player().map(|p| p.hp), Some(0));
        assert!(rig.session.score >= i64::from(max_hp) * rig.cfg.scoring.hp_points);
    }

    #[test]
    fn timer_drains_bonus_while_playing() {
        let mut rig = Rig::new(flat_room(vec![spawn("player", 64.0, 416.0)]));
        let start = rig.session.time_bonus();
        let frames = rig.cfg.session.timer_frames as usize * 3;
        for _ in 0..frames {
            rig.step(PlayerInput::default());
        }
        assert_eq!(rig.session.time_bonus(), start - 3 * rig.cfg.scoring.second_points);
    }

    #[test]
    fn death_fades_then_requests_respawn() {
        let mut rig = Rig::new(flat_room(vec![spawn("player", 64.0, 416.0)]));
        let player = rig.room.players[0];
        {
            let mut ctx = StepCtx::new(&rig.cfg, &mut rig.session, &mut rig.rng, 1.0);
            rig.room.kill_player(&mut ctx, player, true);
        }
        assert!(matches!(rig.room.phase, RoomPhase::DeathFade { .. }));
        let mut respawns = 0;
        for _ in 0..1000 {
            let (_, req) = rig.step(PlayerInput::default());
            respawns += req.iter().filter(|r| **r == RoomRequest::Respawn).count();
        }
        assert_eq!(respawns, 1);
        assert_eq!(rig.room.phase, RoomPhase::DeathWait);
    }

    #[test]
    fn count_step_never_overshoots() {
        let rig = goal_room();
        let mut session = rig.session.clone();
        let mut rng = rig.rng.clone();
        let ctx = StepCtx::new(&rig.cfg, &mut session, &mut rng, 1.0);
        assert_eq!(count_step(&ctx, 5), 5);
        assert_eq!(count_step(&ctx, -5), -5);
        assert_eq!(count_step(&ctx, 1000), 111);
        assert_eq!(count_step(&ctx, -1000), -111);
    }
}

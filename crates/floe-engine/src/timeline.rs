//! Timeline scripting: room events keyed by frame step.
//!
//! A script maps integer steps to lists of textual commands. Scripts are
//! compiled once, when the room loads, into typed [`TimelineCommand`]s;
//! commands that do not parse are reported and dropped, never retried.
//!
//! Each frame the room first fires every step at or below the counter, in
//! ascending order, then advances the counter by `delta_mult`. A fired step
//! is gone for good, so a large `delta_mult` can fire several steps in one
//! frame but nothing ever fires twice.
//!
//! | Command                          | Effect                                        |
//! |----------------------------------|-----------------------------------------------|
//! | `setattr <field> <value>`        | set a room field                              |
//! | `setattr __level__ <field> <v>`  | same, with the room named explicitly          |
//! | `setattr <label> <field> <v>`    | set a field on the entity spawned with `label`|
//! | `play_music <track>`             | switch the room music                         |
//! | `skip_to <step>`                 | drop every step below `<step>` and jump there |
//! | `if_watched` / `if_not_watched`  | drop the rest of the step unless the script has (not) been seen before |
//!
//! ```
//! use std::collections::BTreeMap;
//! use std::collections::BTreeSet;
//! use floe_engine::timeline::{Timeline, TimelineCommand};
//!
//! let mut steps = BTreeMap::new();
//! steps.insert("0".to_string(), vec!["play_music intro.ogg".to_string()]);
//! steps.insert("3".to_string(), vec!["setattr points 10".to_string()]);
//! let (mut t, errors) = Timeline::compile("intro", &steps);
//! assert!(errors.is_empty());
//!
//! t.advance(2.0);
//! let fired = t.fire_due(&BTreeSet::new());
//! assert_eq!(fired, vec![TimelineCommand::PlayMusic("intro.ogg".into())]);
//! ```

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use floe_journal::prelude::*;
use floe_world::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::entity::Entity;
use crate::room::{Room, StepCtx};

/// A command that could not be compiled.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimelineError {
    #[error("timeline step key {key:?} is not an integer")]
    BadKey { key: String },

    #[error("unknown timeline command {command:?}")]
    UnknownCommand { command: String },

    #[error("{field:?} cannot be set on {target}")]
    UnknownField { target: String, field: String },

    #[error("{field} expects {expected}, got {value:?}")]
    WrongValueType {
        field: String,
        expected: &'static str,
        value: String,
    },

    #[error("{command} expects {expected}, got {line:?}")]
    BadArity {
        command: &'static str,
        expected: &'static str,
        line: String,
    },
}

// ---------------------------------------------------------------------------
// Values and fields
// ---------------------------------------------------------------------------

/// A literal coerced the way scripts expect: integer, else float, else text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn parse(s: &str) -> Value {
        if let Ok(i) = s.parse::<i64>() {
            Value::Int(i)
        } else if let Ok(f) = s.parse::<f64>() {
            Value::Float(f)
        } else {
            Value::Text(s.to_string())
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Text(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Int(i) => Some(*i != 0),
            Value::Float(f) => Some(*f != 0.0),
            Value::Text(t) => match t.as_str() {
                "true" | "True" => Some(true),
                "false" | "False" => Some(false),
                _ => None,
            },
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(t) => t.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Number,
    Int,
    Bool,
    Text,
}

impl Kind {
    fn name(self) -> &'static str {
        match self {
            Kind::Number => "a number",
            Kind::Int => "an integer",
            Kind::Bool => "a boolean",
            Kind::Text => "text",
        }
    }

    fn accepts(self, v: &Value) -> bool {
        match self {
            Kind::Number => v.as_f64().is_some(),
            Kind::Int => v.as_i64().is_some(),
            Kind::Bool => v.as_bool().is_some(),
            Kind::Text => true,
        }
    }
}

/// Room fields a script may set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomField {
    TimeBonus,
    Points,
    Music,
}

impl RoomField {
    fn from_name(name: &str) -> Option<RoomField> {
        Some(match name {
            "time_bonus" => RoomField::TimeBonus,
            "points" => RoomField::Points,
            "music" => RoomField::Music,
            _ => return None,
        })
    }

    fn kind(self) -> Kind {
        match self {
            RoomField::TimeBonus | RoomField::Points => Kind::Int,
            RoomField::Music => Kind::Text,
        }
    }
}

/// Entity fields a script may set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityField {
    X,
    Y,
    XVelocity,
    YVelocity,
    Facing,
    Visible,
    Tangible,
    Active,
    Gravity,
    Opacity,
    Human,
    Hp,
    Coins,
    LeftPressed,
    RightPressed,
    UpPressed,
    DownPressed,
    JumpPressed,
    ActionPressed,
    SneakPressed,
}

impl EntityField {
    fn from_name(name: &str) -> Option<EntityField> {
        use EntityField::*;
        Some(match name {
            "x" => X,
            "y" => Y,
            "xvelocity" => XVelocity,
            "yvelocity" => YVelocity,
            "facing" => Facing,
            "visible" => Visible,
            "tangible" => Tangible,
            "active" => Active,
            "gravity" => Gravity,
            "opacity" => Opacity,
            "human" => Human,
            "hp" => Hp,
            "coins" => Coins,
            "left_pressed" => LeftPressed,
            "right_pressed" => RightPressed,
            "up_pressed" => UpPressed,
            "down_pressed" => DownPressed,
            "jump_pressed" => JumpPressed,
            "action_pressed" => ActionPressed,
            "sneak_pressed" => SneakPressed,
            _ => return None,
        })
    }

    fn kind(self) -> Kind {
        use EntityField::*;
        match self {
            X | Y | XVelocity | YVelocity | Facing | Gravity | Opacity => Kind::Number,
            Hp | Coins => Kind::Int,
            _ => Kind::Bool,
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// One compiled timeline command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TimelineCommand {
    SetRoom { field: RoomField, value: Value },
    SetEntity {
        target: TimelineId,
        field: EntityField,
        value: Value,
    },
    PlayMusic(String),
    SkipTo(f64),
    IfWatched,
    IfNotWatched,
}

const ROOM_TARGET: &str = "__level__";

/// Compile one command line. Blank lines compile to nothing.
pub fn parse_command(line: &str) -> Result<Option<TimelineCommand>, TimelineError> {
    let line = line.trim();
    let Some((command, rest)) = line
        .split_once(char::is_whitespace)
        .map(|(c, r)| (c, r.trim()))
        .or_else(|| (!line.is_empty()).then_some((line, "")))
    else {
        return Ok(None);
    };
    match command {
        "setattr" => parse_setattr(rest, line).map(Some),
        "play_music" => {
            if rest.is_empty() {
                return Err(TimelineError::BadArity {
                    command: "play_music",
                    expected: "a track name",
                    line: line.to_string(),
                });
            }
            Ok(Some(TimelineCommand::PlayMusic(rest.to_string())))
        }
        "skip_to" => match rest.parse::<f64>() {
            Ok(step) => Ok(Some(TimelineCommand::SkipTo(step))),
            Err(_) => Err(TimelineError::BadArity {
                command: "skip_to",
                expected: "a step number",
                line: line.to_string(),
            }),
        },
        "if_watched" => Ok(Some(TimelineCommand::IfWatched)),
        "if_not_watched" => Ok(Some(TimelineCommand::IfNotWatched)),
        other => Err(TimelineError::UnknownCommand {
            command: other.to_string(),
        }),
    }
}

fn parse_setattr(rest: &str, line: &str) -> Result<TimelineCommand, TimelineError> {
    let args: Vec<&str> = rest.splitn(3, char::is_whitespace).filter(|s| !s.is_empty()).collect();
    let (target, field, value) = match args.as_slice() {
        [field, value] => (None, *field, *value),
        [target, field, value] if *target == ROOM_TARGET => (None, *field, *value),
        [target, field, value] => (Some(*target), *field, *value),
        _ => {
            return Err(TimelineError::BadArity {
                command: "setattr",
                expected: "[target] field value",
                line: line.to_string(),
            })
        }
    };
    let value = Value::parse(value.trim());
    let check = |kind: Kind| {
        if kind.accepts(&value) {
            Ok(())
        } else {
            Err(TimelineError::WrongValueType {
                field: field.to_string(),
                expected: kind.name(),
                value: value.as_text(),
            })
        }
    };
    match target {
        None => {
            let f = RoomField::from_name(field).ok_or_else(|| TimelineError::UnknownField {
                target: ROOM_TARGET.to_string(),
                field: field.to_string(),
            })?;
            check(f.kind())?;
            Ok(TimelineCommand::SetRoom { field: f, value })
        }
        Some(target) => {
            let f = EntityField::from_name(field).ok_or_else(|| TimelineError::UnknownField {
                target: target.to_string(),
                field: field.to_string(),
            })?;
            check(f.kind())?;
            Ok(TimelineCommand::SetEntity {
                target: TimelineId::from(target),
                field: f,
                value,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

/// A compiled script and its step counter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    /// Script name, cleared once the script has run to the end and been
    /// reported as watched.
    pub name: Option<String>,
    steps: BTreeMap<i64, VecDeque<TimelineCommand>>,
    pub counter: f64,
}

impl Timeline {
    /// Compile `steps`, keeping everything that parses. The errors are
    /// returned (and logged) for the rest.
    pub fn compile(name: &str, steps: &BTreeMap<String, Vec<String>>) -> (Timeline, Vec<TimelineError>) {
        let mut errors = Vec::new();
        let mut compiled: BTreeMap<i64, VecDeque<TimelineCommand>> = BTreeMap::new();
        for (key, lines) in steps {
            let Ok(step) = key.trim().parse::<i64>() else {
                errors.push(TimelineError::BadKey { key: key.clone() });
                continue;
            };
            let slot = compiled.entry(step).or_default();
            for line in lines {
                match parse_command(line) {
                    Ok(Some(cmd)) => slot.push_back(cmd),
                    Ok(None) => {}
                    Err(err) => errors.push(err),
                }
            }
        }
        compiled.retain(|_, cmds| !cmds.is_empty());
        for err in &errors {
            warn!(timeline = name, %err, "skipping timeline directive");
        }
        let timeline = Timeline {
            name: Some(name.to_string()),
            steps: compiled,
            counter: 0.0,
        };
        (timeline, errors)
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps still waiting to fire.
    pub fn pending_steps(&self) -> Vec<i64> {
        self.steps.keys().copied().collect()
    }

    pub fn advance(&mut self, delta_mult: f64) {
        self.counter += delta_mult.max(0.0);
    }

    /// Drop every step below `step` and move the counter there. The counter
    /// never moves backwards.
    pub fn skip_to(&mut self, step: f64) {
        self.counter = self.counter.max(step);
        self.steps.retain(|&k, _| k as f64 >= step);
    }

    /// Take every command whose step is at or below the counter, in step
    /// order. Control commands are handled here; the rest are returned for
    /// the room to apply.
    pub fn fire_due(&mut self, watched: &BTreeSet<String>) -> Vec<TimelineCommand> {
        let mut out = Vec::new();
        let seen = self.name.as_ref().is_some_and(|n| watched.contains(n));
        let keys: Vec<i64> = self.steps.keys().copied().collect();
        for key in keys {
            if key as f64 > self.counter {
                break;
            }
            while let Some(cmd) = self.steps.get_mut(&key).and_then(VecDeque::pop_front) {
                match cmd {
                    TimelineCommand::SkipTo(step) => {
                        debug!(from = self.counter, to = step, "timeline skip");
                        self.skip_to(step);
                        break;
                    }
                    TimelineCommand::IfWatched if !seen => {
                        self.steps.remove(&key);
                    }
                    TimelineCommand::IfNotWatched if seen => {
                        self.steps.remove(&key);
                    }
                    TimelineCommand::IfWatched | TimelineCommand::IfNotWatched => {}
                    other => out.push(other),
                }
            }
            if self.steps.get(&key).is_some_and(VecDeque::is_empty) {
                self.steps.remove(&key);
            }
        }
        out
    }

    /// The script's name, once, after its last step has fired.
    pub fn take_finished(&mut self) -> Option<String> {
        if self.steps.is_empty() {
            self.name.take()
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Room integration
// ---------------------------------------------------------------------------

impl Room {
    /// Fire due timeline commands, then advance the counter.
    pub(crate) fn run_timeline(&mut self, ctx: &mut StepCtx<'_>) {
        let commands = self.timeline.fire_due(&ctx.session.watched_timelines);
        for cmd in commands {
            self.apply_timeline_command(ctx, cmd);
        }
        if let Some(name) = self.timeline.take_finished() {
            debug!(room = %self.name, timeline = %name, "timeline watched");
            ctx.session.watched_timelines.insert(name);
        }
        self.timeline.advance(ctx.delta);
    }

    fn apply_timeline_command(&mut self, ctx: &mut StepCtx<'_>, cmd: TimelineCommand) {
        let why = CausalReason::Timeline(self.timeline.name.clone().unwrap_or_default());
        match cmd {
            TimelineCommand::SetRoom { field, value } => match field {
                RoomField::TimeBonus => {
                    let v = value.as_i64().unwrap_or_default();
                    self.time_bonus = v;
                    if let Some(main) = ctx.session.main_area.clone() {
                        ctx.session.level_timers.insert(main, v);
                    }
                }
                RoomField::Points => {
                    let v = value.as_i64().unwrap_or_default();
                    let delta = v - self.points;
                    self.points = v;
                    ctx.emit(GameEvent::new(
                        EventKind::PointsChanged { delta, total: v },
                        SystemId::TIMELINE,
                        why,
                    ));
                }
                RoomField::Music => self.set_music(ctx, value.as_text(), why),
            },
            TimelineCommand::PlayMusic(track) => self.set_music(ctx, track, why),
            TimelineCommand::SetEntity { target, field, value } => {
                let Some(&id) = self.labels.get(&target) else {
                    debug!(%target, "timeline target not in room");
                    return;
                };
                let Some(e) = self.entities.get_mut(id) else {
                    debug!(%target, "timeline target is gone");
                    return;
                };
                if let Some(event) = set_entity_field(e, id, field, &value) {
                    ctx.emit(GameEvent::new(event, SystemId::TIMELINE, why).involving([id]));
                }
            }
            TimelineCommand::SkipTo(_) | TimelineCommand::IfWatched | TimelineCommand::IfNotWatched => {}
        }
    }

    pub(crate) fn set_music(&mut self, ctx: &mut StepCtx<'_>, track: String, reason: CausalReason) {
        self.music = Some(track.clone());
        ctx.emit(GameEvent::new(EventKind::MusicChanged { track }, SystemId::TIMELINE, reason));
    }
}

/// Apply one assignment. Returns the event to report, for fields the
/// presentation layer tracks.
fn set_entity_field(e: &mut Entity, id: EntityId, field: EntityField, value: &Value) -> Option<EventKind> {
    use EntityField::*;
    let num = value.as_f64().unwrap_or_default();
    let flag = value.as_bool().unwrap_or_default();
    match field {
        X => e.x = num,
        Y => e.y = num,
        XVelocity => e.motion.xvelocity = num,
        YVelocity => e.motion.yvelocity = num,
        Facing => e.facing = if num < 0.0 { -1.0 } else { 1.0 },
        Visible => e.visible = flag,
        Tangible => e.tangible = flag,
        Active => e.active = flag,
        Gravity => e.gravity = Some(num),
        Opacity => e.opacity = num.clamp(0.0, 255.0),
        _ => {
            let p = e.player_mut()?;
            let n = value.as_i64().unwrap_or_default() as i32;
            match field {
                Human => p.human = flag,
                Hp => {
                    p.hp = n;
                    return Some(EventKind::HpChanged { entity: id, hp: n });
                }
                Coins => {
                    p.coins = n;
                    return Some(EventKind::CoinsChanged { entity: id, coins: n });
                }
                LeftPressed => p.input.left = flag,
                RightPressed => p.input.right = flag,
                UpPressed => p.input.up = flag,
                DownPressed => p.input.down = flag,
                JumpPressed => p.input.jump = flag,
                ActionPressed => p.input.action = flag,
                SneakPressed => p.input.sneak = flag,
                _ => {}
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

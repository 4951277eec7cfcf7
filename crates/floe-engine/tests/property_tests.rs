//! Property tests: jump heights, swept collision, carrying and timelines.

use std::collections::{BTreeMap, BTreeSet};

use floe_engine::collision::{sweep_x, sweep_y, Geometry};
use floe_engine::kinematics::{jump_speed, Motion};
use floe_engine::prelude::*;
use floe_engine::timeline::{Timeline, TimelineCommand};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Kinematics
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// A jump never rises above the requested height, and misses it by at
    /// most the part of a frame the apex falls between.
    #[test]
    fn jump_peaks_at_requested_height(
        height in 1.0f64..400.0,
        gravity in 0.1f64..2.0,
        delta in prop::sample::select(vec![0.5f64, 1.0, 1.5, 2.0]),
    ) {
        let mut motion = Motion {
            yvelocity: jump_speed(height, gravity),
            yacceleration: gravity,
            ..Motion::default()
        };
        let mut y = 0.0f64;
        let mut peak = 0.0f64;
        while motion.yvelocity < 0.0 {
            let (_, dy) = motion.integrate(delta);
            y += dy;
            peak = peak.min(y);
        }
        prop_assert!(-peak <= height + 1e-6, "rose {} for {}", -peak, height);
        prop_assert!(-peak >= height - gravity * delta * delta / 8.0 - 1e-6, "rose {} for {}", -peak, height);
    }
}

// ---------------------------------------------------------------------------
// Collision
// ---------------------------------------------------------------------------

fn floor_and_wall() -> TileMap {
    let mut tiles = TileMap::new(32.0);
    tiles.insert(Rect::new(0.0, 448.0, 640.0, 32.0), TileShape::Solid).unwrap();
    tiles.insert(Rect::new(320.0, 0.0, 32.0, 448.0), TileShape::Solid).unwrap();
    tiles
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1_000))]

    /// However fast a box falls, it stops on the floor and never ends up
    /// inside or below it.
    #[test]
    fn falling_never_tunnels(x in 0.0f64..280.0, y in 0.0f64..400.0, dy in 0.0f64..600.0) {
        let tiles = floor_and_wall();
        let geo = Geometry::new(&tiles, &[]);
        let bbox = Rect::new(x, y, 26.0, 30.0);
        let sweep = sweep_y(&geo, &bbox, dy);
        let after = bbox.translated(0.0, sweep.moved);
        prop_assert!(after.bottom() <= 448.0 + 1e-9);
        prop_assert!(sweep.moved <= dy + 1e-9);
        if bbox.bottom() + dy > 448.0 {
            prop_assert!(sweep.hit.is_some());
            prop_assert!((after.bottom() - 448.0).abs() < 1e-6);
        }
    }

    /// Running into the wall from the left stops flush against it.
    #[test]
    fn running_never_tunnels(x in 0.0f64..290.0, dx in 0.0f64..500.0) {
        let tiles = floor_and_wall();
        let geo = Geometry::new(&tiles, &[]);
        let bbox = Rect::new(x, 400.0, 26.0, 30.0);
        let sweep = sweep_x(&geo, &bbox, dx, false);
        let after = bbox.translated(sweep.moved, sweep.lift);
        prop_assert!(after.right() <= 320.0 + 1e-9);
        if bbox.right() + dx > 320.0 {
            prop_assert!(sweep.hit.is_some());
        }
    }
}

// ---------------------------------------------------------------------------
// Carrying
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum CarryOp {
    Pickup { carrier: usize, item: usize },
    Drop { carrier: usize },
}

fn carry_op() -> impl Strategy<Value = CarryOp> {
    prop_oneof![
        (0..2usize, 0..3usize).prop_map(|(carrier, item)| CarryOp::Pickup { carrier, item }),
        (0..2usize).prop_map(|carrier| CarryOp::Drop { carrier }),
    ]
}

fn carry_room() -> Room {
    let def: RoomDefinition = serde_json::from_value(serde_json::json!({
        "name": "yard", "width": 640, "height": 480,
        "spawns": [
            { "tag": "player", "x": 64, "y": 416 },
            { "tag": "player", "x": 128, "y": 416 },
            { "tag": "spring", "x": 200, "y": 416 },
            { "tag": "flat_iceblock", "x": 264, "y": 416 },
            { "tag": "fire_flower", "x": 328, "y": 416 }
        ]
    }))
    .unwrap();
    Room::load(&def, &EngineConfig::default())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Carrier and item always agree: a carrier holds at most one item, an
    /// item has at most one carrier, and the links point both ways.
    #[test]
    fn carry_links_stay_consistent(ops in prop::collection::vec(carry_op(), 1..40)) {
        let mut room = carry_room();
        let players = room.players.clone();
        let items: Vec<EntityId> = room
            .entities
            .ids_where(|e| e.capabilities().carryable);
        prop_assert_eq!(items.len(), 3);

        for op in ops {
            match op {
                CarryOp::Pickup { carrier, item } => {
                    let (c, i) = (players[carrier], items[item]);
                    let free = room.entities.get(c).is_some_and(|e| e.held.is_none())
                        && room.entities.get(i).is_some_and(|e| e.parent.is_none());
                    let result = room.pickup(c, i);
                    prop_assert_eq!(result.is_ok(), free);
                }
                CarryOp::Drop { carrier } => {
                    let c = players[carrier];
                    let held = room.entities.get(c).and_then(|e| e.held);
                    prop_assert_eq!(room.drop_held(c), held);
                }
            }

            let mut parents = BTreeMap::new();
            for &i in &items {
                let item = room.entities.get(i).unwrap();
                if let Some(p) = item.parent {
                    prop_assert_eq!(room.entities.get(p).and_then(|e| e.held), Some(i));
                    prop_assert!(!item.visible && !item.tangible);
                    parents.insert(i, p);
                } else {
                    prop_assert!(item.visible && item.tangible);
                }
            }
            let carriers: BTreeSet<EntityId> = parents.values().copied().collect();
            prop_assert_eq!(carriers.len(), parents.len());
            for &c in &players {
                if let Some(i) = room.entities.get(c).and_then(|e| e.held) {
                    prop_assert_eq!(parents.get(&i), Some(&c));
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Timelines
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Steps fire once each, in step order, and never before the counter
    /// reaches them, whatever the frame deltas.
    #[test]
    fn timeline_fires_in_order(
        steps in prop::collection::btree_set(0i64..300, 1..20),
        deltas in prop::collection::vec(0.0f64..4.0, 1..400),
    ) {
        let script: BTreeMap<String, Vec<String>> = steps
            .iter()
            .map(|s| (s.to_string(), vec![format!("play_music track{s}")]))
            .collect();
        let (mut timeline, errors) = Timeline::compile("intro", &script);
        prop_assert!(errors.is_empty());

        let watched = BTreeSet::new();
        let mut fired = Vec::new();
        for delta in deltas {
            for cmd in timeline.fire_due(&watched) {
                let TimelineCommand::PlayMusic(track) = cmd else {
                    return Err(TestCaseError::fail("unexpected command"));
                };
                let step: i64 = track.trim_start_matches("track").parse().unwrap();
                prop_assert!(step as f64 <= timeline.counter);
                fired.push(step);
            }
            timeline.advance(delta);
        }

        prop_assert!(fired.windows(2).all(|w| w[0] < w[1]));
        let due: Vec<i64> = steps.iter().copied().filter(|&s| s as f64 <= timeline.counter).collect();
        // Whatever was due before the last advance has fired; nothing else.
        prop_assert!(fired.iter().all(|s| steps.contains(s)));
        prop_assert!(fired.len() <= due.len());
        prop_assert_eq!(&fired[..], &due[..fired.len()]);
    }
}

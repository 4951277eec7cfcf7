//! Classifying entity-entity contacts.
//!
//! Both functions here are pure. They look at where two entities were and
//! how each moved this frame, never at what the entities are.

use floe_world::prelude::*;

/// How the toucher met the other entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactKind {
    /// Came down on top of it.
    Stomp,
    /// Anything else.
    Touch,
}

/// One side of a contact: the box before this frame's move and the move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Approach {
    pub prev: Rect,
    pub moved: (f64, f64),
}

impl Approach {
    pub fn new(now: Rect, moved: (f64, f64)) -> Self {
        Self {
            prev: now.translated(-moved.0, -moved.1),
            moved,
        }
    }
}

fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Classify a contact from the toucher's point of view.
///
/// Relative motion decides: a toucher that closed in on the other while its
/// bottom started no more than `stomp_lax` below the other's top, and was
/// descending or moving sideways, stomps. Any other closing motion touches.
/// Pairs that are not closing in on each other along either axis produce no
/// contact event, so something just kicked out of the player's hands does
/// not bounce straight back.
pub fn classify(toucher: &Approach, other: &Approach, stomp_lax: f64) -> Option<ContactKind> {
    let xdir = sign(toucher.moved.0 - other.moved.0);
    let ydir = sign(toucher.moved.1 - other.moved.1);
    let gap_x = other.prev.center_x() - toucher.prev.center_x();
    let gap_y = other.prev.center_y() - toucher.prev.center_y();
    if xdir * gap_x <= 0.0 && ydir * gap_y <= 0.0 {
        return None;
    }
    let above = toucher.prev.bottom() - other.prev.top() <= stomp_lax;
    if above && ydir >= 0.0 {
        Some(ContactKind::Stomp)
    } else {
        Some(ContactKind::Touch)
    }
}

/// New walking direction for crowd member `a` after bumping `b`.
///
/// A head-on bump sends each walker back the way it came. Otherwise the one
/// further right goes right; an exact tie is broken by id so the two never
/// pick the same direction.
pub fn crowd_turn(a: (EntityId, f64, f64), b: (EntityId, f64, f64)) -> f64 {
    let (a_id, a_x, a_dx) = a;
    let (b_id, b_x, b_dx) = b;
    let rel = sign(a_dx - b_dx);
    if rel != 0.0 {
        return -rel;
    }
    if a_x > b_x {
        1.0
    } else if a_x < b_x {
        -1.0
    } else if a_id > b_id {
        1.0
    } else {
        -1.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: f64, y: f64, moved: (f64, f64)) -> Approach {
        Approach::new(Rect::new(x, y, 32.0, 32.0), moved)
    }

    #[test]
    fn falling_onto_is_a_stomp() {
        let player = at(0.0, 2.0, (0.0, 4.0));
        let enemy = at(4.0, 32.0, (0.0, 0.0));
        assert_eq!(classify(&player, &enemy, 8.0), Some(ContactKind::Stomp));
    }

    #[test]
    fn walking_into_is_a_touch() {
        let player = at(2.0, 32.0, (2.0, 0.0));
        let enemy = at(32.0, 32.0, (-1.0, 0.0));
        assert_eq!(classify(&player, &enemy, 8.0), Some(ContactKind::Touch));
    }

    #[test]
    fn sideways_within_lax_is_a_stomp() {
        let player = at(2.0, 6.0, (2.0, 0.0));
        let enemy = at(32.0, 32.0, (0.0, 0.0));
        assert_eq!(classify(&player, &enemy, 8.0), Some(ContactKind::Stomp));
    }

    #[test]
    fn rising_into_is_a_touch() {
        let player = at(0.0, 40.0, (0.0, -4.0));
        let enemy = at(0.0, 10.0, (0.0, 0.0));
        assert_eq!(classify(&player, &enemy, 8.0), Some(ContactKind::Touch));
    }

    #[test]
    fn enemy_walking_into_still_player_is_a_touch() {
        let player = at(0.0, 32.0, (0.0, 0.0));
        let enemy = at(30.0, 32.0, (-1.0, 0.0));
        assert_eq!(classify(&player, &enemy, 8.0), Some(ContactKind::Touch));
        assert_eq!(classify(&player, &at(30.0, 32.0, (0.0, 0.0)), 8.0), None);
    }

    #[test]
    fn separating_pair_is_no_contact() {
        let player = at(0.0, 32.0, (0.0, 0.0));
        let kicked = at(16.0, 32.0, (7.0, 0.0));
        assert_eq!(classify(&player, &kicked, 8.0), None);
        let popped = at(16.0, 20.0, (0.0, -9.0));
        assert_eq!(classify(&player, &popped, 8.0), None);
    }

    #[test]
    fn crowd_head_on_reverses_both() {
        let a = (EntityId::new(1, 0), 0.0, 1.0);
        let b = (EntityId::new(2, 0), 30.0, -1.0);
        assert_eq!(crowd_turn(a, b), -1.0);
        assert_eq!(crowd_turn(b, a), 1.0);
    }

    #[test]
    fn crowd_ties_never_agree() {
        let a = (EntityId::new(1, 0), 10.0, 0.0);
        let b = (EntityId::new(2, 0), 10.0, 0.0);
        assert_ne!(crowd_turn(a, b), crowd_turn(b, a));
        let c = (EntityId::new(3, 0), 4.0, 0.0);
        assert_eq!(crowd_turn(a, c), 1.0);
        assert_eq!(crowd_turn(c, a), -1.0);
    }
}

//! History retention and query behavior across many frames.

use floe_journal::prelude::*;
use floe_world::prelude::*;
use proptest::prelude::*;

proptest! {
    #[test]
    fn history_keeps_the_newest_frames(max in 1usize..20, frames in 1u64..100) {
        let mut journal = EventJournal::with_max_history(max);
        for frame in 0..frames {
            journal.begin_frame(frame);
            journal.record(GameEvent::sound(Sound::Count, SystemId::ROOM, CausalReason::Timer("tick".into())));
            journal.end_frame();
        }
        let kept: Vec<u64> = journal.history().iter().map(|r| r.frame).collect();
        let expected_len = (frames as usize).min(max);
        prop_assert_eq!(kept.len(), expected_len);
        prop_assert_eq!(*kept.last().unwrap(), frames - 1);
        prop_assert!(kept.windows(2).all(|w| w[0] + 1 == w[1]));
        prop_assert_eq!(journal.events_by_system(SystemId::ROOM).count(), expected_len);
    }
}

#[test]
fn begin_frame_discards_unclosed_events() {
    let mut journal = EventJournal::new();
    journal.begin_frame(1);
    journal.record(GameEvent::sound(Sound::Jump, SystemId::INPUT, CausalReason::PlayerInput("jump".into())));
    journal.begin_frame(2);
    assert!(journal.current_events().is_empty());
    let record = journal.end_frame();
    assert_eq!(record.frame, 2);
    assert!(record.events.is_empty());
}

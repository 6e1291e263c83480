//! Property-based tests for applying push events to the task cache.
//!
//! Uses proptest to verify, for arbitrary event sequences:
//! 1. Ids in the cache stay unique.
//! 2. The cache ends up equal to a last-write-wins model keyed by id.
//! 3. Replaying any event immediately is a no-op.
//! 4. A server listing followed by events never duplicates an id.

use std::collections::HashMap;

use chrono::NaiveDate;
use proptest::prelude::*;

use greenthumb_proto::event::TaskEvent;
use greenthumb_proto::task::{NewTask, Task, TaskId};
use greenthumb_sync::cache::TaskCache;

fn task(id: i64, title: &str, completed: bool) -> Task {
    let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let mut task = NewTask::new(title, "watering", date).into_task(TaskId::from_int(id));
    task.completed = completed;
    task
}

/// Events over a small id space so creates, updates and deletes collide.
fn arb_event() -> impl Strategy<Value = TaskEvent> {
    let arb_task = (0i64..8, "[a-z]{1,8}", any::<bool>())
        .prop_map(|(id, title, completed)| task(id, &title, completed));
    prop_oneof![
        arb_task.clone().prop_map(|task| TaskEvent::TaskCreated { task }),
        arb_task.prop_map(|task| TaskEvent::TaskUpdated { task }),
        (0i64..8).prop_map(|id| TaskEvent::TaskDeleted {
            task_id: TaskId::from_int(id)
        }),
    ]
}

fn assert_unique_ids(cache: &TaskCache) {
    let mut ids: Vec<_> = cache.tasks().iter().map(|t| t.id.clone()).collect();
    let total = ids.len();
    ids.sort_by_key(ToString::to_string);
    ids.dedup();
    assert_eq!(ids.len(), total, "duplicate ids in cache");
}

proptest! {
    #[test]
    fn ids_stay_unique(events in proptest::collection::vec(arb_event(), 0..64)) {
        let mut cache = TaskCache::new();
        for event in &events {
            cache.apply(event);
            assert_unique_ids(&cache);
        }
    }

    #[test]
    fn cache_matches_last_write_wins_model(events in proptest::collection::vec(arb_event(), 0..64)) {
        let mut cache = TaskCache::new();
        let mut model: HashMap<TaskId, Task> = HashMap::new();
        for event in &events {
            cache.apply(event);
            match event {
                TaskEvent::TaskCreated { task } | TaskEvent::TaskUpdated { task } => {
                    model.insert(task.id.clone(), task.clone());
                }
                TaskEvent::TaskDeleted { task_id } => {
                    model.remove(task_id);
                }
            }
        }
        prop_assert_eq!(cache.len(), model.len());
        for task in cache.tasks() {
            prop_assert_eq!(Some(task), model.get(&task.id));
        }
    }

    #[test]
    fn replaying_an_event_is_a_no_op(
        events in proptest::collection::vec(arb_event(), 1..32),
        index in any::<prop::sample::Index>(),
    ) {
        let replay_at = index.index(events.len());
        let mut once = TaskCache::new();
        let mut twice = TaskCache::new();
        for (i, event) in events.iter().enumerate() {
            once.apply(event);
            twice.apply(event);
            if i == replay_at {
                twice.apply(event);
            }
        }
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn listing_then_events_keeps_ids_unique(
        listing in proptest::collection::vec((0i64..8, "[a-z]{1,8}"), 0..16),
        events in proptest::collection::vec(arb_event(), 0..32),
    ) {
        let mut cache = TaskCache::new();
        cache.replace_all(listing.iter().map(|(id, title)| task(*id, title, false)).collect());
        assert_unique_ids(&cache);
        for event in &events {
            cache.apply(event);
        }
        assert_unique_ids(&cache);
    }
}

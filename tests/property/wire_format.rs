//! Property-based tests for the task wire format and push-event codec.
//!
//! Uses proptest to verify:
//! 1. Any task survives JSON encode → decode unchanged, including category
//!    and priority values the client has never heard of.
//! 2. Random bytes never cause a panic in `decode` (returns `Err` or an
//!    ignorable frame).
//! 3. Frames with an unknown `type` decode to `Unrecognized`, never `Err`.
//! 4. Patches only serialize the fields that are set.

use chrono::NaiveDate;
use proptest::prelude::*;

use greenthumb_proto::codec;
use greenthumb_proto::event::{Inbound, TaskEvent};
use greenthumb_proto::task::{Priority, Task, TaskId, TaskKind, TaskPatch};

fn arb_task_id() -> impl Strategy<Value = TaskId> {
    prop_oneof![
        any::<i64>().prop_map(TaskId::from_int),
        "[a-z][a-z0-9-]{0,15}".prop_map(TaskId::from_text),
    ]
}

fn arb_kind() -> impl Strategy<Value = TaskKind> {
    prop_oneof![
        Just("watering".to_string()),
        Just("fertilizing".to_string()),
        Just("pruning".to_string()),
        Just("harvesting".to_string()),
        "[a-z_]{1,16}",
    ]
    .prop_map(TaskKind::from)
}

fn arb_priority() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just("low".to_string()),
        Just("medium".to_string()),
        Just("high".to_string()),
        "[a-z]{1,10}",
    ]
    .prop_map(Priority::from)
}

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (1970i32..2100, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

fn arb_task() -> impl Strategy<Value = Task> {
    (
        arb_task_id(),
        "[^\x00]{1,64}",
        arb_kind(),
        arb_date(),
        any::<bool>(),
        proptest::option::of("[^\x00]{0,128}"),
        arb_priority(),
    )
        .prop_map(|(id, title, kind, date, completed, description, priority)| Task {
            id,
            title,
            kind,
            date,
            completed,
            description,
            priority,
        })
}

proptest! {
    #[test]
    fn task_json_round_trip(task in arb_task()) {
        let json = serde_json::to_string(&task).unwrap();
        let back: Task = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, task);
    }

    #[test]
    fn pushed_task_events_decode_to_the_same_event(task in arb_task()) {
        let event = TaskEvent::TaskUpdated { task };
        let text = codec::encode_event(&event).unwrap();
        prop_assert_eq!(codec::decode_str(&text).unwrap(), Inbound::Task(event));
    }

    #[test]
    fn decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let _ = codec::decode(&bytes);
    }

    #[test]
    fn unknown_types_are_unrecognized(kind in "[a-z_]{1,24}", value in any::<i32>()) {
        prop_assume!(!TaskEvent::KINDS.contains(&kind.as_str()));
        let frame = serde_json::json!({ "type": kind, "value": value }).to_string();
        prop_assert_eq!(
            codec::decode_str(&frame).unwrap(),
            Inbound::Unrecognized { kind }
        );
    }

    #[test]
    fn patch_serializes_only_set_fields(
        title in proptest::option::of("[a-z ]{1,20}"),
        completed in proptest::option::of(any::<bool>()),
    ) {
        let mut patch = TaskPatch::new();
        if let Some(title) = &title {
            patch = patch.title(title.clone());
        }
        if let Some(completed) = completed {
            patch = patch.completed(completed);
        }
        let value = serde_json::to_value(&patch).unwrap();
        let object = value.as_object().unwrap();
        prop_assert_eq!(object.len(), usize::from(title.is_some()) + usize::from(completed.is_some()));
        prop_assert_eq!(object.contains_key("title"), title.is_some());
        prop_assert_eq!(object.contains_key("completed"), completed.is_some());
    }
}

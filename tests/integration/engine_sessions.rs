//! End-to-end drop sessions against the fake strip and sink.
//!
//! The fake strip echoes every call back into the engine synchronously,
//! so these tests exercise the full loop: optimistic tree delta, intent
//! announcements, flat moves, suppressed echoes, convergence.

use crate::support::{engine_with, record, FakeSink, FakeStrip};
use canopy::config::CanopyConfig;
use canopy::error::EngineError;
use canopy::placement::DropTarget;
use canopy::protocol::NativeEvent;
use std::sync::Arc;

#[tokio::test]
async fn test_same_window_drop_reparents_and_converges() {
    let strip = FakeStrip::new();
    let sink = Arc::new(FakeSink::default());
    let engine = engine_with(
        vec![
            record(1, None, "a0", 10, 0),
            record(2, None, "a1", 10, 1),
            record(3, None, "a2", 10, 2),
        ],
        &CanopyConfig::default(),
        &strip,
        &sink,
    );

    let report = engine
        .apply_drop(10, &[3], DropTarget::ChildOf(1))
        .await
        .unwrap();
    assert_eq!(report.moved, vec![3]);
    assert_eq!(report.issued, 1);
    assert_eq!(strip.order(10), vec![1, 3, 2]);

    // Echoes arrived mid-session and were suppressed; the store converged
    // on both views without the tree being re-inferred.
    let store = engine.store_handle();
    assert_eq!(store.read().window_order(10), vec![1, 3, 2]);
    assert_eq!(store.read().get(3).unwrap().parent_id, Some(1));
    assert!(engine.validation_report().is_empty());

    assert_eq!(sink.intents.lock().len(), 1);
    assert_eq!(sink.intents.lock()[0].moves.len(), 1);
    assert_eq!(sink.intents.lock()[0].moves[0].id, 3);
    assert_eq!(sink.intents.lock()[0].moves[0].parent_id, Some(1));
    assert_eq!(*sink.started.lock(), vec![vec![3]]);
    assert_eq!(*sink.ended.lock(), 1);
}

#[tokio::test]
async fn test_echo_after_session_end_reconciles_normally() {
    let strip = FakeStrip::new();
    let sink = Arc::new(FakeSink::default());
    let engine = engine_with(
        vec![
            record(1, None, "a0", 10, 0),
            record(2, None, "a1", 10, 1),
            record(3, None, "a2", 10, 2),
        ],
        &CanopyConfig::default(),
        &strip,
        &sink,
    );
    engine
        .apply_drop(10, &[3], DropTarget::ChildOf(1))
        .await
        .unwrap();

    // A duplicate of the session's own move, delivered after the managed
    // window closed, is treated as a real external move: the slot is
    // re-inferred from the physical neighbors.
    engine.handle_event(&NativeEvent::Moved {
        id: 3,
        from_index: 2,
        to_index: 1,
        container_id: 10,
    });
    let store = engine.store_handle();
    assert_eq!(store.read().get(3).unwrap().parent_id, None);
    assert_eq!(store.read().window_order(10), vec![1, 3, 2]);
    assert!(engine.validation_report().is_empty());
}

#[tokio::test]
async fn test_cross_window_drop_moves_subtree() {
    let strip = FakeStrip::new();
    let sink = Arc::new(FakeSink::default());
    let engine = engine_with(
        vec![
            record(1, None, "a0", 10, 0),
            record(2, Some(1), "a0", 10, 1),
            record(7, None, "a0", 20, 0),
        ],
        &CanopyConfig::default(),
        &strip,
        &sink,
    );

    let report = engine.apply_drop(20, &[1], DropTarget::Gap(1)).await.unwrap();
    assert_eq!(report.moved, vec![1, 2]);
    assert_eq!(report.issued, 2);
    assert_eq!(strip.order(20), vec![7, 1, 2]);

    let store = engine.store_handle();
    assert_eq!(store.read().window_order(20), vec![7, 1, 2]);
    assert!(store.read().window_order(10).is_empty());
    assert_eq!(store.read().get(1).unwrap().container_id, Some(20));
    assert_eq!(store.read().get(2).unwrap().container_id, Some(20));
    assert_eq!(store.read().get(2).unwrap().parent_id, Some(1));
    assert!(engine.validation_report().is_empty());

    // Descendants are named in the managed set alongside the mover.
    assert_eq!(*sink.started.lock(), vec![vec![1, 2]]);
}

#[tokio::test]
async fn test_move_to_new_window_replaces_placeholder() {
    let strip = FakeStrip::new();
    let sink = Arc::new(FakeSink::default());
    let engine = engine_with(
        vec![
            record(1, None, "a0", 10, 0),
            record(2, None, "a1", 10, 1),
            record(3, None, "a2", 10, 2),
        ],
        &CanopyConfig::default(),
        &strip,
        &sink,
    );

    let report = engine.move_to_new_window(&[2, 3]).await.unwrap();
    let window = report.window;
    assert_ne!(window, 10);
    assert_eq!(report.moved, vec![2, 3]);
    assert_eq!(strip.order(window), vec![2, 3]);
    assert_eq!(strip.order(10), vec![1]);

    let store = engine.store_handle();
    assert_eq!(store.read().window_order(window), vec![2, 3]);
    assert_eq!(store.read().window_order(10), vec![1]);
    // The placeholder the strip opened the window with is gone again.
    assert_eq!(store.read().len(), 3);
    assert!(engine.validation_report().is_empty());
    assert_eq!(*sink.ended.lock(), 1);
}

#[tokio::test]
async fn test_open_child_adopts_pending_intent() {
    let strip = FakeStrip::new();
    let sink = Arc::new(FakeSink::default());
    let engine = engine_with(
        vec![record(1, None, "a0", 10, 0), record(2, Some(1), "a0", 10, 1)],
        &CanopyConfig::default(),
        &strip,
        &sink,
    );

    let child = engine.open_child(1).await.unwrap();
    let store = engine.store_handle();
    assert_eq!(store.read().get(child).unwrap().parent_id, Some(1));
    assert_eq!(store.read().get(child).unwrap().order_key, "a1");
    assert_eq!(store.read().window_order(10), vec![1, 2, child]);
    assert!(engine.validation_report().is_empty());

    assert_eq!(sink.pending.lock().len(), 1);
    assert_eq!(sink.pending.lock()[0].parent_id, 1);
    assert_eq!(sink.pending.lock()[0].expected_flat_index, 2);
}

#[tokio::test]
async fn test_open_child_claim_miss_roots_at_reported_position() {
    let strip = FakeStrip::new();
    let sink = Arc::new(FakeSink::default());
    let engine = engine_with(
        vec![record(1, None, "a0", 10, 0), record(9, None, "a1", 10, 1)],
        &CanopyConfig::default(),
        &strip,
        &sink,
    );

    // Expected slot is index 1, right after the parent, but the strip
    // appends at the end; the claim misses and the tab roots instead.
    let child = engine.open_child(1).await.unwrap();
    let store = engine.store_handle();
    assert_eq!(store.read().get(child).unwrap().parent_id, None);
    assert_eq!(store.read().get(child).unwrap().order_key, "a2");
    assert_eq!(store.read().window_order(10), vec![1, 9, child]);
    assert!(engine.validation_report().is_empty());
}

#[tokio::test]
async fn test_intent_ack_timeout_falls_back_to_proceeding() {
    let strip = FakeStrip::new();
    let sink = Arc::new(FakeSink {
        hang_intent_ack: true,
        ..Default::default()
    });
    let mut config = CanopyConfig::default();
    config.protocol.ack_timeout_ms = 20;
    let engine = engine_with(
        vec![
            record(1, None, "a0", 10, 0),
            record(2, None, "a1", 10, 1),
            record(3, None, "a2", 10, 2),
        ],
        &config,
        &strip,
        &sink,
    );

    let report = engine
        .apply_drop(10, &[3], DropTarget::ChildOf(1))
        .await
        .unwrap();
    assert_eq!(report.issued, 1);
    assert_eq!(strip.order(10), vec![1, 3, 2]);
    // The intent never resolved, yet the session went on and closed.
    assert!(sink.intents.lock().is_empty());
    assert_eq!(*sink.started.lock(), vec![vec![3]]);
    assert_eq!(*sink.ended.lock(), 1);
}

#[tokio::test]
async fn test_transport_failure_still_closes_managed_window() {
    let strip = FakeStrip::new();
    let sink = Arc::new(FakeSink::default());
    let engine = engine_with(
        vec![
            record(1, None, "a0", 10, 0),
            record(2, None, "a1", 10, 1),
            record(3, None, "a2", 10, 2),
        ],
        &CanopyConfig::default(),
        &strip,
        &sink,
    );
    *strip.fail_moves_after.lock() = Some(0);

    let err = engine
        .apply_drop(10, &[3], DropTarget::ChildOf(1))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Transport(_)));
    assert_eq!(*sink.ended.lock(), 1);

    // Marks were cleared with the session: a later move event for the
    // same id reconciles as an external change.
    engine.handle_event(&NativeEvent::Moved {
        id: 3,
        from_index: 2,
        to_index: 1,
        container_id: 10,
    });
    let store = engine.store_handle();
    assert_eq!(store.read().window_order(10), vec![1, 3, 2]);
    assert!(engine.validation_report().is_empty());
}

#[tokio::test]
async fn test_close_collapsed_takes_subtree() {
    let strip = FakeStrip::new();
    let sink = Arc::new(FakeSink::default());
    let mut collapsed_root = record(1, None, "a0", 10, 0);
    collapsed_root.collapsed = true;
    let engine = engine_with(
        vec![
            collapsed_root,
            record(2, Some(1), "a0", 10, 1),
            record(3, Some(1), "a1", 10, 2),
            record(4, None, "a1", 10, 3),
        ],
        &CanopyConfig::default(),
        &strip,
        &sink,
    );

    let closed = engine.close(1).await.unwrap();
    assert_eq!(closed, 3);
    assert_eq!(strip.order(10), vec![4]);
    let store = engine.store_handle();
    assert_eq!(store.read().window_order(10), vec![4]);
    assert_eq!(store.read().len(), 1);
    assert!(engine.validation_report().is_empty());
}

#[tokio::test]
async fn test_close_expanded_promotes_children() {
    let strip = FakeStrip::new();
    let sink = Arc::new(FakeSink::default());
    let engine = engine_with(
        vec![
            record(1, None, "a0", 10, 0),
            record(2, Some(1), "a0", 10, 1),
            record(3, Some(1), "a1", 10, 2),
        ],
        &CanopyConfig::default(),
        &strip,
        &sink,
    );

    let closed = engine.close(1).await.unwrap();
    assert_eq!(closed, 1);
    assert_eq!(strip.order(10), vec![2, 3]);
    let store = engine.store_handle();
    assert_eq!(store.read().window_order(10), vec![2, 3]);
    assert_eq!(store.read().get(2).unwrap().parent_id, None);
    assert_eq!(store.read().get(3).unwrap().parent_id, None);
    assert!(engine.validation_report().is_empty());
}

#[test]
fn test_toggle_collapse_changes_visible_rows() {
    let strip = FakeStrip::new();
    let sink = Arc::new(FakeSink::default());
    let engine = engine_with(
        vec![record(1, None, "a0", 10, 0), record(2, Some(1), "a0", 10, 1)],
        &CanopyConfig::default(),
        &strip,
        &sink,
    );

    assert_eq!(engine.visible_rows(10).len(), 2);
    assert!(engine.toggle_collapse(1).unwrap());
    assert_eq!(engine.visible_rows(10).len(), 1);
    assert_eq!(engine.all_rows(10).len(), 2);
    assert!(!engine.toggle_collapse(1).unwrap());
    assert_eq!(engine.visible_rows(10).len(), 2);
}

#[test]
fn test_rename_sets_and_clears_title() {
    let strip = FakeStrip::new();
    let sink = Arc::new(FakeSink::default());
    let engine = engine_with(
        vec![record(1, None, "a0", 10, 0)],
        &CanopyConfig::default(),
        &strip,
        &sink,
    );

    engine.rename(1, Some("notes".to_string())).unwrap();
    assert_eq!(
        engine.store_handle().read().get(1).unwrap().title.as_deref(),
        Some("notes")
    );
    engine.rename(1, None).unwrap();
    assert_eq!(engine.store_handle().read().get(1).unwrap().title, None);
    assert!(matches!(
        engine.rename(99, None),
        Err(EngineError::UnknownTab(99))
    ));
}

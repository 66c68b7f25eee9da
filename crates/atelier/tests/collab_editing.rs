//! Collaborative album editing over the wire surface.

use atelier::config::GameConfig;
use atelier::event::ServerEvent;
use atelier::testing::TestHarness;
use atelier::types::DrawingId;
use pretty_assertions::assert_eq;

fn stroke(tag: u8) -> Vec<u8> {
    vec![tag, tag, tag]
}

#[tokio::test]
async fn edits_fan_out_to_every_editor_in_order() {
    let harness = TestHarness::new();
    let drawing_id = DrawingId::new("album-1");

    let (a, mut rx_a) = harness.connect("a");
    let (b, mut rx_b) = harness.connect("b");
    for conn in [&a, &b] {
        harness
            .send(conn, "join-drawing", &(drawing_id.clone(),))
            .await
            .unwrap();
    }
    let _ = TestHarness::next_tagged(&mut rx_a, "drawing-joined").await;
    let _ = TestHarness::next_tagged(&mut rx_b, "drawing-joined").await;

    harness
        .send(&a, "update-drawing", &(drawing_id.clone(), stroke(1)))
        .await
        .unwrap();
    harness
        .send(&b, "update-drawing", &(drawing_id.clone(), stroke(2)))
        .await
        .unwrap();

    // both editors see both appends, in the same order
    for rx in [&mut rx_a, &mut rx_b] {
        for expected_index in [0usize, 1] {
            match TestHarness::next_tagged(rx, "update-drawing").await {
                ServerEvent::ActionAppended { action, .. } => {
                    assert_eq!(action.index, expected_index);
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }
}

#[tokio::test]
async fn late_joiner_receives_the_full_history() {
    let harness = TestHarness::new();
    let drawing_id = DrawingId::new("album-1");

    let (a, mut rx_a) = harness.connect("a");
    harness
        .send(&a, "join-drawing", &(drawing_id.clone(),))
        .await
        .unwrap();
    let _ = TestHarness::next_tagged(&mut rx_a, "drawing-joined").await;
    for tag in [1u8, 2, 3] {
        harness
            .send(&a, "update-drawing", &(drawing_id.clone(), stroke(tag)))
            .await
            .unwrap();
    }

    let (b, mut rx_b) = harness.connect("b");
    harness
        .send(&b, "join-drawing", &(drawing_id.clone(),))
        .await
        .unwrap();

    match TestHarness::next_tagged(&mut rx_b, "drawing-joined").await {
        ServerEvent::DrawingJoined { actions, .. } => {
            assert_eq!(actions.len(), 3);
            let indices: Vec<_> = actions.iter().map(|a| a.index).collect();
            assert_eq!(indices, vec![0, 1, 2]);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn delete_and_move_keep_every_editor_dense_and_converged() {
    let harness = TestHarness::new();
    let drawing_id = DrawingId::new("album-1");

    let (a, mut rx_a) = harness.connect("a");
    let (b, mut rx_b) = harness.connect("b");
    for conn in [&a, &b] {
        harness
            .send(conn, "join-drawing", &(drawing_id.clone(),))
            .await
            .unwrap();
    }
    let _ = TestHarness::next_tagged(&mut rx_a, "drawing-joined").await;
    let _ = TestHarness::next_tagged(&mut rx_b, "drawing-joined").await;

    let mut ids = Vec::new();
    for tag in [1u8, 2, 3, 4] {
        harness
            .send(&a, "update-drawing", &(drawing_id.clone(), stroke(tag)))
            .await
            .unwrap();
        match TestHarness::next_tagged(&mut rx_a, "update-drawing").await {
            ServerEvent::ActionAppended { action, .. } => ids.push(action.id),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    // delete the second action; everything above shifts down
    harness
        .send(
            &b,
            "delete-drawing-action",
            &(drawing_id.clone(), ids[1].clone()),
        )
        .await
        .unwrap();
    match TestHarness::next_tagged(&mut rx_a, "delete-drawing-action").await {
        ServerEvent::ActionDeleted { action_id, .. } => assert_eq!(action_id, ids[1]),
        other => panic!("unexpected event: {other:?}"),
    }

    // move the last action to the front; both editors get the same history
    harness
        .send(
            &a,
            "update-drawing-action-index",
            &(drawing_id.clone(), ids[3].clone(), 0usize),
        )
        .await
        .unwrap();

    let mut histories = Vec::new();
    for rx in [&mut rx_a, &mut rx_b] {
        match TestHarness::next_tagged(rx, "update-drawing-action-index").await {
            ServerEvent::ActionsReordered { actions, .. } => {
                let indices: Vec<_> = actions.iter().map(|x| x.index).collect();
                assert_eq!(indices, vec![0, 1, 2]);
                assert_eq!(actions[0].id, ids[3]);
                assert!(!actions[0].selected);
                histories.push(actions);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert_eq!(histories[0], histories[1]);
}

#[tokio::test]
async fn selection_survives_update_but_not_move() {
    let harness = TestHarness::new();
    let drawing_id = DrawingId::new("album-1");
    let (a, mut rx_a) = harness.connect("a");
    harness
        .send(&a, "join-drawing", &(drawing_id.clone(),))
        .await
        .unwrap();
    let _ = TestHarness::next_tagged(&mut rx_a, "drawing-joined").await;

    for tag in [1u8, 2] {
        harness
            .send(&a, "update-drawing", &(drawing_id.clone(), stroke(tag)))
            .await
            .unwrap();
    }
    let first = match TestHarness::next_tagged(&mut rx_a, "update-drawing").await {
        ServerEvent::ActionAppended { action, .. } => action,
        other => panic!("unexpected event: {other:?}"),
    };
    let _ = TestHarness::next_tagged(&mut rx_a, "update-drawing").await;

    harness
        .send(
            &a,
            "update-drawing-action",
            &(drawing_id.clone(), first.id.clone(), stroke(9), true),
        )
        .await
        .unwrap();
    match TestHarness::next_tagged(&mut rx_a, "update-drawing-action").await {
        ServerEvent::ActionUpdated { action, .. } => assert!(action.selected),
        other => panic!("unexpected event: {other:?}"),
    }

    harness
        .send(
            &a,
            "update-drawing-action-index",
            &(drawing_id.clone(), first.id.clone(), 1usize),
        )
        .await
        .unwrap();
    match TestHarness::next_tagged(&mut rx_a, "update-drawing-action-index").await {
        ServerEvent::ActionsReordered { actions, .. } => {
            assert!(actions.iter().all(|x| !x.selected));
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn editor_cap_holds_until_someone_leaves() {
    let config = GameConfig {
        max_editors_per_drawing: 2,
        ..Default::default()
    };
    let harness = TestHarness::with_config(config);
    let drawing_id = DrawingId::new("album-1");

    let (a, mut rx_a) = harness.connect("a");
    let (b, mut rx_b) = harness.connect("b");
    for (conn, rx) in [(&a, &mut rx_a), (&b, &mut rx_b)] {
        harness
            .send(conn, "join-drawing", &(drawing_id.clone(),))
            .await
            .unwrap();
        let _ = TestHarness::next_tagged(rx, "drawing-joined").await;
    }

    let (c, mut rx_c) = harness.connect("c");
    let err = harness
        .send(&c, "join-drawing", &(drawing_id.clone(),))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        atelier::GameError::EditorLimitReached { .. }
    ));
    let _ = TestHarness::next_tagged(&mut rx_c, "error").await;

    harness
        .send(&a, "leave-drawing", &(drawing_id.clone(), "png:a"))
        .await
        .unwrap();
    let _ = TestHarness::next_tagged(&mut rx_b, "editor-left").await;

    harness
        .send(&c, "join-drawing", &(drawing_id.clone(),))
        .await
        .unwrap();
    let _ = TestHarness::next_tagged(&mut rx_c, "drawing-joined").await;
}

#[tokio::test]
async fn disconnected_editor_frees_their_slot() {
    let config = GameConfig {
        max_editors_per_drawing: 1,
        ..Default::default()
    };
    let harness = TestHarness::with_config(config);
    let drawing_id = DrawingId::new("album-1");

    let (a, mut rx_a) = harness.connect("a");
    harness
        .send(&a, "join-drawing", &(drawing_id.clone(),))
        .await
        .unwrap();
    let _ = TestHarness::next_tagged(&mut rx_a, "drawing-joined").await;

    harness.reconciler.connection_lost(&a).await;

    let (b, mut rx_b) = harness.connect("b");
    harness
        .send(&b, "join-drawing", &(drawing_id.clone(),))
        .await
        .unwrap();
    let _ = TestHarness::next_tagged(&mut rx_b, "drawing-joined").await;
}

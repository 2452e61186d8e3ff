mod support;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use taskdeck_core::board::{
    plan, BoardCommand, BoardContext, BoardEvent, BoardSnapshot, BoardState, ContextOptions, EntityKey,
    FieldEdit, SprintStatus, TaskDraft,
};
use taskdeck_core::gateway::{Ack, Rejection, RejectionKind};
use taskdeck_core::BoardError;

use support::{layout, move_task, sample_board, Script, ScriptedGateway};

fn options() -> ContextOptions {
    ContextOptions {
        mutation_timeout: Duration::from_secs(5),
        event_capacity: 64,
    }
}

async fn mounted(script: Script) -> (Arc<ScriptedGateway>, BoardContext) {
    let gateway = ScriptedGateway::new(script, sample_board());
    let context = BoardContext::mount("p1", Some(sample_board()), gateway.clone(), &options())
        .await
        .unwrap();
    (gateway, context)
}

/// Layout after applying the accepted commands, in order, to the sample board.
fn expected_layout(commands: &[&BoardCommand]) -> Vec<(String, String, Option<String>, u32)> {
    let mut state = BoardState::from_snapshot(sample_board());
    for command in commands {
        let planned = plan(&state, command, Utc::now()).unwrap();
        state.apply(&planned.effect);
    }
    layout(&state.to_snapshot())
}

#[tokio::test]
async fn test_disjoint_moves_commute_under_any_response_order() {
    let a = move_task("t1", "done", None, 0);
    let b = move_task("t5", "done", Some("s1"), 0);

    // (accept a?, accept b?, answer b first?)
    for (accept_a, accept_b, b_first) in [
        (true, true, false),
        (true, true, true),
        (false, true, false),
        (false, true, true),
        (true, false, false),
        (true, false, true),
        (false, false, true),
    ] {
        let (gateway, context) = mounted(Script::Manual).await;
        let handle_a = context.submit(a.clone());
        let handle_b = context.submit(b.clone());
        gateway.wait_for_calls(2).await;
        assert_eq!(context.pending_count(), 2, "disjoint moves run concurrently");

        let answer = |index: usize, accept: bool| {
            if accept {
                gateway.accept(index);
            } else {
                gateway.reject(index, Rejection::conflict("moved elsewhere"));
            }
        };
        if b_first {
            answer(1, accept_b);
            answer(0, accept_a);
        } else {
            answer(0, accept_a);
            answer(1, accept_b);
        }
        assert_eq!(handle_a.outcome().await.is_ok(), accept_a);
        assert_eq!(handle_b.outcome().await.is_ok(), accept_b);

        let mut accepted = Vec::new();
        if accept_a {
            accepted.push(&a);
        }
        if accept_b {
            accepted.push(&b);
        }
        assert_eq!(
            layout(&context.store().snapshot()),
            expected_layout(&accepted),
            "accept_a={} accept_b={} b_first={}",
            accept_a,
            accept_b,
            b_first
        );
    }
}

#[tokio::test]
async fn test_rejected_move_restores_every_position() {
    let (gateway, context) = mounted(Script::Manual).await;
    let before = context.store().snapshot();

    let handle = context.submit(move_task("t1", "done", None, 0));

    let todo: Vec<(String, u32)> = context
        .store()
        .tasks_by_status("todo")
        .into_iter()
        .filter(|t| t.sprint_id.is_none())
        .map(|t| (t.id, t.position))
        .collect();
    assert_eq!(
        todo,
        vec![("t0".to_string(), 0), ("t3".to_string(), 1), ("t4".to_string(), 2)]
    );
    let done: Vec<(String, u32)> = context
        .store()
        .tasks_by_status("done")
        .into_iter()
        .map(|t| (t.id, t.position))
        .collect();
    assert_eq!(done, vec![("t1".to_string(), 0), ("t2".to_string(), 1)]);

    gateway.wait_for_calls(1).await;
    gateway.reject(0, Rejection::conflict("task was archived"));

    match handle.outcome().await {
        Err(BoardError::MutationFailed { command, reason }) => {
            assert_eq!(command, "move-task(t1, done, backlog, 0)");
            assert_eq!(reason.kind, RejectionKind::Conflict);
        }
        other => panic!("expected MutationFailed, got {:?}", other.map(|r| r.id)),
    }
    assert_eq!(context.store().snapshot(), before);
    assert_eq!(context.pending_count(), 0);
}

#[tokio::test]
async fn test_same_task_commands_are_serialized() {
    let (gateway, context) = mounted(Script::Manual).await;

    let first = context.submit(move_task("t1", "done", None, 0));
    let second = context.submit(BoardCommand::EditTaskField {
        task_id: "t1".to_string(),
        edit: FieldEdit::Title("Ship it".to_string()),
    });
    gateway.wait_for_calls(1).await;
    assert_eq!(context.pending_count(), 1);
    assert_eq!(context.engine().queued_count(), 1);
    assert_eq!(gateway.call_count(), 1);
    let pending = context.engine().pending();
    assert_eq!(pending[0].command, move_task("t1", "done", None, 0));
    assert!(pending[0].keys.contains(&EntityKey::Task("t1".to_string())));
    assert_eq!(context.store().task("t1").unwrap().title, "Task t1");

    gateway.reject(0, Rejection::validation("column is locked"));
    assert!(first.outcome().await.is_err());

    // The edit is planned against the rolled-back board.
    gateway.wait_for_calls(2).await;
    let t1 = context.store().task("t1").unwrap();
    assert_eq!((t1.status.as_str(), t1.position), ("todo", 2));
    assert_eq!(t1.title, "Ship it");

    gateway.accept(1);
    second.outcome().await.unwrap();
    assert_eq!(context.engine().queued_count(), 0);
}

#[tokio::test]
async fn test_moves_sharing_a_bucket_wait_for_each_other() {
    let (gateway, context) = mounted(Script::Manual).await;

    let first = context.submit(move_task("t1", "done", None, 0));
    let second = context.submit(move_task("t0", "todo", None, 3));
    gateway.wait_for_calls(1).await;
    assert_eq!(context.engine().queued_count(), 1);

    gateway.accept(0);
    first.outcome().await.unwrap();
    gateway.wait_for_calls(2).await;
    gateway.accept(1);
    second.outcome().await.unwrap();

    let todo: Vec<(String, u32)> = context
        .store()
        .tasks_by_sprint(None)
        .into_iter()
        .filter(|t| t.status == "todo")
        .map(|t| (t.id, t.position))
        .collect();
    assert_eq!(
        todo,
        vec![("t3".to_string(), 0), ("t4".to_string(), 1), ("t0".to_string(), 2)]
    );
}

#[tokio::test]
async fn test_repeated_reorder_is_idempotent() {
    let (_gateway, context) = mounted(Script::Accept).await;
    for _ in 0..3 {
        context
            .submit(move_task("t4", "todo", None, 1))
            .outcome()
            .await
            .unwrap();
    }
    let positions: Vec<(String, u32)> = context
        .store()
        .tasks_by_sprint(None)
        .into_iter()
        .filter(|t| t.status == "todo")
        .map(|t| (t.id, t.position))
        .collect();
    assert_eq!(
        positions,
        vec![
            ("t0".to_string(), 0),
            ("t4".to_string(), 1),
            ("t3".to_string(), 2),
            ("t1".to_string(), 3)
        ]
    );
}

#[tokio::test]
async fn test_stale_reference_sends_nothing() {
    let (gateway, context) = mounted(Script::Accept).await;
    let mut events = context.subscribe();
    let before = context.store().snapshot();

    let err = context
        .submit(move_task("ghost", "done", None, 0))
        .outcome()
        .await
        .unwrap_err();
    assert!(matches!(err, BoardError::StaleReference { ref entity } if entity == "task ghost"));
    assert_eq!(gateway.call_count(), 0);
    assert_eq!(context.store().snapshot(), before);

    match events.recv().await.unwrap() {
        BoardEvent::StaleReference { entity, .. } => assert_eq!(entity, "task ghost"),
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_second_active_sprint_is_rejected_locally() {
    let (gateway, context) = mounted(Script::Accept).await;
    let err = context
        .submit(BoardCommand::SetSprintStatus {
            sprint_id: "s2".to_string(),
            status: SprintStatus::Active,
        })
        .outcome()
        .await
        .unwrap_err();
    assert!(matches!(err, BoardError::ValidationError(_)));
    assert_eq!(gateway.call_count(), 0);

    context
        .submit(BoardCommand::SetSprintStatus {
            sprint_id: "s1".to_string(),
            status: SprintStatus::Completed,
        })
        .outcome()
        .await
        .unwrap();
    context
        .submit(BoardCommand::SetSprintStatus {
            sprint_id: "s2".to_string(),
            status: SprintStatus::Active,
        })
        .outcome()
        .await
        .unwrap();
    let statuses: Vec<SprintStatus> = context.store().sprints().iter().map(|s| s.status).collect();
    assert_eq!(statuses, vec![SprintStatus::Completed, SprintStatus::Active]);
}

#[tokio::test]
async fn test_timeout_rolls_back() {
    let gateway = ScriptedGateway::new(Script::Hang, sample_board());
    let options = ContextOptions {
        mutation_timeout: Duration::from_millis(50),
        event_capacity: 16,
    };
    let context = BoardContext::mount("p1", Some(sample_board()), gateway.clone(), &options)
        .await
        .unwrap();
    let before = context.store().snapshot();

    let err = context
        .submit(BoardCommand::ReorderSprint {
            sprint_id: "s2".to_string(),
            position: 0,
        })
        .outcome()
        .await
        .unwrap_err();
    match err {
        BoardError::MutationFailed { reason, .. } => assert_eq!(reason.kind, RejectionKind::Timeout),
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(context.store().snapshot(), before);
}

#[tokio::test]
async fn test_commands_behind_a_create_follow_the_assigned_id() {
    let (gateway, context) = mounted(Script::Manual).await;

    // Holds backlog/todo, so the create below has to wait.
    let blocker = context.submit(move_task("t0", "todo", None, 3));
    let create = context.submit(BoardCommand::CreateTask {
        draft: TaskDraft::new("Fresh", "todo").with_id("tmp-9"),
    });
    let edit = context.submit(BoardCommand::EditTaskField {
        task_id: "tmp-9".to_string(),
        edit: FieldEdit::Assignee(Some("dana".to_string())),
    });
    gateway.wait_for_calls(1).await;
    assert_eq!(context.engine().queued_count(), 2);
    assert!(context.store().task("tmp-9").is_none());

    gateway.accept(0);
    blocker.outcome().await.unwrap();
    gateway.wait_for_calls(2).await;
    assert!(context.store().task("tmp-9").is_some());

    gateway.respond(
        1,
        Ok(Ack {
            assigned_id: Some("t9".to_string()),
            updated_at: None,
        }),
    );
    let receipt = create.outcome().await.unwrap();
    assert_eq!(receipt.task_id.as_deref(), Some("t9"));

    gateway.wait_for_calls(3).await;
    assert_eq!(
        gateway.commands()[2],
        BoardCommand::EditTaskField {
            task_id: "t9".to_string(),
            edit: FieldEdit::Assignee(Some("dana".to_string())),
        }
    );
    gateway.accept(2);
    edit.outcome().await.unwrap();

    assert!(context.store().task("tmp-9").is_none());
    let t9 = context.store().task("t9").unwrap();
    assert_eq!(t9.assignee.as_deref(), Some("dana"));
    assert_eq!(t9.position, 4);
}

#[tokio::test]
async fn test_events_follow_the_mutation_lifecycle() {
    let (gateway, context) = mounted(Script::Manual).await;
    let mut events = context.subscribe();

    let handle = context.submit(BoardCommand::DeleteTask {
        task_id: "t2".to_string(),
    });
    gateway.wait_for_calls(1).await;
    gateway.accept(0);
    handle.outcome().await.unwrap();

    assert!(matches!(events.recv().await.unwrap(), BoardEvent::Applied { .. }));
    match events.recv().await.unwrap() {
        BoardEvent::Committed { command, .. } => assert_eq!(command, "delete-task(t2)"),
        other => panic!("unexpected event {:?}", other),
    }
    assert!(context.store().task("t2").is_none());
    let snapshot: BoardSnapshot = context.store().snapshot();
    assert_eq!(snapshot.tasks.len(), 6);
}

#[tokio::test]
async fn test_assigned_id_on_a_move_is_ignored() {
    let (gateway, context) = mounted(Script::Manual).await;

    let handle = context.submit(move_task("t1", "done", None, 0));
    gateway.wait_for_calls(1).await;
    gateway.respond(
        0,
        Ok(Ack {
            assigned_id: Some("srv-9".to_string()),
            updated_at: None,
        }),
    );
    let receipt = handle.outcome().await.unwrap();
    assert_eq!(receipt.task_id.as_deref(), Some("t1"));
    assert_eq!(receipt.assigned_id.as_deref(), Some("srv-9"));
    assert!(context.store().task("srv-9").is_none());
    assert_eq!(context.store().task("t1").unwrap().status, "done");

    let edit = context.submit(BoardCommand::EditTaskField {
        task_id: "t1".to_string(),
        edit: FieldEdit::Title("Still here".to_string()),
    });
    gateway.wait_for_calls(2).await;
    gateway.accept(1);
    edit.outcome().await.unwrap();
    assert_eq!(context.store().task("t1").unwrap().title, "Still here");
}

#[tokio::test]
async fn test_assigned_id_taken_by_another_task_keeps_provisional_id() {
    let (gateway, context) = mounted(Script::Manual).await;

    let create = context.submit(BoardCommand::CreateTask {
        draft: TaskDraft::new("Fresh", "todo").with_id("tmp"),
    });
    gateway.wait_for_calls(1).await;
    gateway.respond(
        0,
        Ok(Ack {
            assigned_id: Some("t2".to_string()),
            updated_at: None,
        }),
    );
    let receipt = create.outcome().await.unwrap();
    assert_eq!(receipt.task_id.as_deref(), Some("tmp"));
    assert_eq!(receipt.assigned_id.as_deref(), Some("t2"));

    let snapshot = context.store().snapshot();
    assert_eq!(snapshot.tasks.len(), sample_board().tasks.len() + 1);
    let t2 = context.store().task("t2").unwrap();
    assert_eq!((t2.status.as_str(), t2.title.as_str()), ("done", "Task t2"));
    let done: Vec<String> = context.store().tasks_by_status("done").into_iter().map(|t| t.id).collect();
    assert_eq!(done, vec!["t2".to_string()]);

    // No alias was recorded: the provisional id still addresses the new task.
    let delete = context.submit(BoardCommand::DeleteTask {
        task_id: "tmp".to_string(),
    });
    gateway.wait_for_calls(2).await;
    assert_eq!(
        gateway.commands()[1],
        BoardCommand::DeleteTask {
            task_id: "tmp".to_string()
        }
    );
    gateway.accept(1);
    delete.outcome().await.unwrap();
    assert!(context.store().task("t2").is_some());
}

#[tokio::test]
async fn test_reload_then_reject_keeps_reloaded_board() {
    let (gateway, context) = mounted(Script::Manual).await;

    let handle = context.submit(move_task("t1", "done", None, 0));
    gateway.wait_for_calls(1).await;
    context.reload().await.unwrap();
    let fresh = context.store().snapshot();
    assert_eq!(layout(&fresh), layout(&sample_board()));

    gateway.reject(0, Rejection::conflict("moved elsewhere"));
    assert!(handle.outcome().await.is_err());
    assert_eq!(context.store().snapshot(), fresh);
}

#[tokio::test]
async fn test_reload_then_accept_replays_the_command() {
    let (gateway, context) = mounted(Script::Manual).await;
    let command = move_task("t1", "done", None, 0);

    let handle = context.submit(command.clone());
    gateway.wait_for_calls(1).await;
    context.reload().await.unwrap();
    assert_eq!(context.store().task("t1").unwrap().status, "todo");

    gateway.accept(0);
    handle.outcome().await.unwrap();
    assert_eq!(layout(&context.store().snapshot()), expected_layout(&[&command]));
}

#[tokio::test]
async fn test_reload_that_already_carries_the_change_is_left_alone() {
    let (gateway, context) = mounted(Script::Manual).await;
    let command = move_task("t1", "done", None, 0);

    let handle = context.submit(command.clone());
    gateway.wait_for_calls(1).await;
    let mut server = BoardState::from_snapshot(sample_board());
    let planned = plan(&server, &command, Utc::now()).unwrap();
    server.apply(&planned.effect);
    gateway.set_board(server.to_snapshot());
    context.reload().await.unwrap();

    gateway.accept(0);
    handle.outcome().await.unwrap();
    assert_eq!(layout(&context.store().snapshot()), expected_layout(&[&command]));
}

#[tokio::test]
async fn test_reload_then_accept_create_with_server_id() {
    let (gateway, context) = mounted(Script::Manual).await;

    let create = context.submit(BoardCommand::CreateTask {
        draft: TaskDraft::new("Fresh", "todo").with_id("tmp"),
    });
    gateway.wait_for_calls(1).await;
    let mut server = sample_board();
    server.tasks.push(support::task("t9", "todo", None, 4));
    gateway.set_board(server);
    context.reload().await.unwrap();

    gateway.respond(
        0,
        Ok(Ack {
            assigned_id: Some("t9".to_string()),
            updated_at: None,
        }),
    );
    let receipt = create.outcome().await.unwrap();
    assert_eq!(receipt.task_id.as_deref(), Some("t9"));
    assert!(context.store().task("tmp").is_none());
    assert_eq!(context.store().snapshot().tasks.len(), sample_board().tasks.len() + 1);
}

mod support;

use std::time::Duration;

use taskdeck_core::board::{BoardContext, BoardEvent, BoardProvider, BoardSnapshot, ContextOptions};
use taskdeck_core::BoardError;

use support::{move_task, sample_board, Script, ScriptedGateway};

fn options() -> ContextOptions {
    ContextOptions {
        mutation_timeout: Duration::from_secs(5),
        event_capacity: 32,
    }
}

#[tokio::test]
async fn test_seed_skips_fetch() {
    let gateway = ScriptedGateway::new(Script::Accept, sample_board());
    let context = BoardContext::mount("p1", Some(sample_board()), gateway.clone(), &options())
        .await
        .unwrap();
    assert_eq!(gateway.fetch_count(), 0);
    assert!(context.store().is_loaded());
    assert_eq!(context.store().snapshot().tasks.len(), 7);
}

#[tokio::test]
async fn test_no_seed_fetches() {
    let gateway = ScriptedGateway::new(Script::Accept, sample_board());
    let context = BoardContext::mount("p1", None, gateway.clone(), &options())
        .await
        .unwrap();
    assert_eq!(gateway.fetch_count(), 1);
    assert_eq!(context.store().sprints().len(), 2);

    context.reload().await.unwrap();
    assert_eq!(gateway.fetch_count(), 2);
}

#[tokio::test]
async fn test_empty_project() {
    let gateway = ScriptedGateway::new(Script::Accept, BoardSnapshot::empty("p1"));
    let context = BoardContext::mount("p1", None, gateway, &options()).await.unwrap();
    let store = context.store();
    assert!(store.is_loaded());
    assert!(store.last_error().is_none());
    assert!(store.sprints().is_empty());
    assert!(store.tasks_by_sprint(None).is_empty());
    assert!(store.tasks_by_status("todo").is_empty());
}

#[tokio::test]
async fn test_failed_load_leaves_empty_board_with_error() {
    let gateway = ScriptedGateway::new(Script::Accept, sample_board());
    gateway.set_fetch_failure(true);
    let context = BoardContext::mount("p1", None, gateway.clone(), &options())
        .await
        .unwrap();
    assert!(!context.store().is_loaded());
    assert!(context.store().last_error().unwrap().contains("connection refused"));
    assert!(context.store().snapshot().is_empty());

    let mut events = context.subscribe();
    let err = context.reload().await.unwrap_err();
    assert!(matches!(err, BoardError::Load { .. }));
    assert!(matches!(events.recv().await.unwrap(), BoardEvent::LoadFailed { .. }));

    gateway.set_fetch_failure(false);
    context.reload().await.unwrap();
    assert!(context.store().is_loaded());
    assert!(context.store().last_error().is_none());
    assert_eq!(context.store().snapshot().tasks.len(), 7);
}

#[tokio::test]
async fn test_seed_for_another_project_is_rejected() {
    let gateway = ScriptedGateway::new(Script::Accept, sample_board());
    let err = BoardContext::mount("p2", Some(sample_board()), gateway, &options())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, BoardError::ValidationError(_)));
}

#[tokio::test]
async fn test_provider_shares_one_context_per_project() {
    let gateway = ScriptedGateway::new(Script::Accept, sample_board());
    let provider = BoardProvider::new(gateway.clone(), options());

    let first = provider.mount("p1", Some(sample_board())).await.unwrap();
    let again = provider.mount("p1", None).await.unwrap();
    assert!(first.ptr_eq(&again));
    assert_eq!(gateway.fetch_count(), 0);

    // A consumer's mutation is visible through every clone.
    first
        .submit(move_task("t1", "done", None, 0))
        .outcome()
        .await
        .unwrap();
    assert_eq!(again.store().task("t1").unwrap().status, "done");
}

#[tokio::test]
async fn test_switching_project_disposes_old_context() {
    let gateway = ScriptedGateway::new(Script::Accept, BoardSnapshot::empty("p2"));
    let provider = BoardProvider::new(gateway.clone(), options());

    let old = provider.mount("p1", Some(sample_board())).await.unwrap();
    let new = provider.mount("p2", None).await.unwrap();
    assert!(old.is_disposed());
    assert!(old.store().snapshot().is_empty());
    assert!(!new.is_disposed());
    assert_eq!(new.project_id(), "p2");
    assert_eq!(gateway.fetch_count(), 1);

    let err = old
        .submit(move_task("t1", "done", None, 0))
        .outcome()
        .await
        .unwrap_err();
    assert!(matches!(err, BoardError::Disposed(_)));
}

#[tokio::test]
async fn test_unmount_with_mutation_in_flight() {
    let gateway = ScriptedGateway::new(Script::Manual, sample_board());
    let provider = BoardProvider::new(gateway.clone(), options());
    let context = provider.mount("p1", Some(sample_board())).await.unwrap();
    let mut events = context.subscribe();

    let in_flight = context.submit(move_task("t1", "done", None, 0));
    let queued = context.submit(move_task("t1", "todo", None, 0));
    gateway.wait_for_calls(1).await;

    provider.unmount().await;
    assert!(provider.current().await.is_none());
    assert!(context.is_disposed());
    assert_eq!(context.pending_count(), 0);

    assert!(matches!(in_flight.outcome().await, Err(BoardError::Disposed(_))));
    assert!(matches!(queued.outcome().await, Err(BoardError::Disposed(_))));

    // The late answer lands on a disposed engine and changes nothing.
    gateway.reject(0, taskdeck_core::gateway::Rejection::network("offline"));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(context.store().snapshot().is_empty());
    assert_eq!(gateway.call_count(), 1);

    let mut saw_disposed = false;
    while let Ok(event) = events.try_recv() {
        saw_disposed |= matches!(event, BoardEvent::Disposed { .. });
    }
    assert!(saw_disposed);
}

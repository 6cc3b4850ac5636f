//! Tests for the session registry

use std::time::{Duration, Instant};

use library_mcp::mcp::SessionRegistry;

fn registry() -> SessionRegistry {
    SessionRegistry::new(Duration::from_millis(300_000))
}

#[tokio::test]
async fn test_create_and_touch() {
    let sessions = registry();
    let id = sessions.create().await;
    assert!(id.starts_with("mcp-"));
    assert!(sessions.contains(&id).await);

    let before = sessions.get(&id).await.unwrap().last_activity;
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(sessions.touch(&id).await);
    let after = sessions.get(&id).await.unwrap().last_activity;
    assert!(after > before);
}

#[tokio::test]
async fn test_touch_unknown_is_false() {
    let sessions = registry();
    assert!(!sessions.touch("mcp-0-unknown").await);
    assert!(sessions.is_empty().await);
}

#[tokio::test]
async fn test_ids_are_distinct() {
    let sessions = registry();
    let a = sessions.create().await;
    let b = sessions.create().await;
    assert_ne!(a, b);
    assert_eq!(sessions.len().await, 2);
}

#[tokio::test]
async fn test_resolve_reuses_known_session() {
    let sessions = registry();
    let id = sessions.create().await;
    assert_eq!(sessions.resolve(Some(&id)).await, id);
    assert_eq!(sessions.len().await, 1);
}

#[tokio::test]
async fn test_resolve_mints_for_unknown_or_absent() {
    let sessions = registry();
    let minted = sessions.resolve(Some("mcp-1-stale")).await;
    assert_ne!(minted, "mcp-1-stale");
    let other = sessions.resolve(None).await;
    assert_ne!(minted, other);
    assert_eq!(sessions.len().await, 2);
}

#[tokio::test]
async fn test_sweep_removes_idle_sessions() {
    let sessions = registry();
    let id = sessions.create().await;

    let later = Instant::now() + Duration::from_millis(300_001);
    assert_eq!(sessions.sweep_at(later).await, 1);
    assert!(!sessions.contains(&id).await);
}

#[tokio::test]
async fn test_sweep_keeps_recent_sessions() {
    let sessions = registry();
    let id = sessions.create().await;

    assert_eq!(sessions.sweep().await, 0);
    let soon = Instant::now() + Duration::from_millis(1_000);
    assert_eq!(sessions.sweep_at(soon).await, 0);
    assert!(sessions.contains(&id).await);
}

#[tokio::test]
async fn test_remove() {
    let sessions = registry();
    let id = sessions.create().await;
    assert!(sessions.remove(&id).await);
    assert!(!sessions.remove(&id).await);
}

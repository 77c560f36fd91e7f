//! Registry tests
//!
//! Lookup, administrative removal, queue administration through the
//! registry, and shutdown.

mod helpers;

use helpers::{item, recv_until_closed, Harness};
use voxq_common::events::{PlaybackEvent, StopReason};
use voxq_common::TenantId;
use voxq_player::{Error, PlayOutcome};

fn titles(items: &[voxq_player::Item]) -> Vec<String> {
    items.iter().map(|i| i.title().to_string()).collect()
}

#[tokio::test]
async fn test_signals_to_absent_tenant_fail() {
    let h = Harness::new(1);
    let g = TenantId::from("nobody");

    assert!(matches!(
        h.registry.skip(&g).await,
        Err(Error::ControllerNotFound(t)) if t == g
    ));
    assert!(h.registry.pause(&g).await.is_err());
    assert!(h.registry.toggle_loop(&g).await.is_err());
    assert!(h.registry.queue_snapshot(&g).await.is_err());
    assert!(h.registry.reorder(&g, 0, 0).await.is_err());
    assert!(!h.registry.exists(&g).await);
    assert!(h.registry.is_empty().await);

    // No-op
    h.registry.remove(&g).await;
}

#[tokio::test]
async fn test_queue_administration() {
    let mut h = Harness::new(1);
    let g = TenantId::from("g1");

    h.play(&g, item("A", 50)).await;
    for title in ["B", "C", "D"] {
        h.play(&g, item(title, 1)).await;
    }
    let _session = h.next_session().await;
    h.wait_for(|e| matches!(e, PlaybackEvent::ItemStarted { title, .. } if title == "A"))
        .await;

    // A is streaming and blocked on the sink, so only B, C, D are queued
    let queued = h.registry.queue_snapshot(&g).await.unwrap();
    assert_eq!(titles(&queued), vec!["B", "C", "D"]);

    h.registry.reorder(&g, 0, 2).await.unwrap();
    assert_eq!(
        titles(&h.registry.queue_snapshot(&g).await.unwrap()),
        vec!["C", "D", "B"]
    );

    let result = h.registry.reorder(&g, 5, 0).await;
    assert!(matches!(result, Err(Error::OutOfBounds { index: 5, len: 3 })));
    assert_eq!(
        titles(&h.registry.queue_snapshot(&g).await.unwrap()),
        vec!["C", "D", "B"]
    );

    let removed = h.registry.remove_item(&g, 1).await.unwrap();
    assert_eq!(removed.title(), "D");
    assert!(h.registry.remove_item(&g, 2).await.is_err());

    assert_eq!(
        h.play(&g, item("E", 1)).await,
        PlayOutcome::Enqueued { position: 2 }
    );
    assert_eq!(
        titles(&h.registry.queue_snapshot(&g).await.unwrap()),
        vec!["C", "B", "E"]
    );

    h.registry.stop(&g).await.unwrap();
    let (reason, discarded) = h.wait_stopped(&g).await;
    assert_eq!(reason, StopReason::Stopped);
    assert_eq!(discarded, 3);
}

#[tokio::test]
async fn test_remove_is_idempotent() {
    let mut h = Harness::new(1);
    let g = TenantId::from("g1");

    h.play(&g, item("A", 50)).await;
    h.play(&g, item("B", 1)).await;
    let mut session = h.next_session().await;
    h.wait_for(|e| matches!(e, PlaybackEvent::ItemStarted { .. }))
        .await;

    h.registry.remove(&g).await;
    h.registry.remove(&g).await;
    assert!(!h.registry.exists(&g).await);

    let (reason, discarded) = h.wait_stopped(&g).await;
    assert_eq!(reason, StopReason::Removed);
    assert_eq!(discarded, 1);
    assert!(recv_until_closed(&mut session).await.len() <= 1);
}

#[tokio::test]
async fn test_late_teardown_keeps_replacement_controller() {
    let mut h = Harness::new(1);
    let g = TenantId::from("g1");

    h.play(&g, item("A", 50)).await;
    let _old_session = h.next_session().await;
    let old = h.registry.get(&g).await.unwrap();

    h.registry.remove(&g).await;
    assert_eq!(h.play(&g, item("B", 50)).await, PlayOutcome::Started);
    let _new_session = h.next_session().await;

    assert_eq!(h.wait_stopped(&g).await.0, StopReason::Removed);
    assert!(old.is_stopped());

    // The old controller's teardown must not evict its replacement
    let current = h.registry.get(&g).await.unwrap();
    assert!(!std::sync::Arc::ptr_eq(&old, &current));
    assert!(!current.is_stopped());

    h.registry.stop(&g).await.unwrap();
    assert_eq!(h.wait_stopped(&g).await.0, StopReason::Stopped);
    assert!(!h.registry.exists(&g).await);
}

#[tokio::test]
async fn test_shutdown_stops_every_controller() {
    let mut h = Harness::new(1);
    let tenants = [TenantId::from("g1"), TenantId::from("g2"), TenantId::from("g3")];

    for tenant in &tenants {
        h.play(tenant, item("A", 50)).await;
    }
    let mut sessions = Vec::new();
    for _ in &tenants {
        sessions.push(h.next_session().await);
    }
    assert_eq!(h.registry.len().await, 3);

    assert_eq!(h.registry.shutdown().await, 3);

    let mut stopped = Vec::new();
    while stopped.len() < tenants.len() {
        if let PlaybackEvent::ControllerStopped { tenant, reason, .. } = h
            .wait_for(|e| matches!(e, PlaybackEvent::ControllerStopped { .. }))
            .await
        {
            assert_eq!(reason, StopReason::Stopped);
            stopped.push(tenant);
        }
    }
    stopped.sort();
    assert_eq!(stopped, tenants.to_vec());
    assert!(h.registry.is_empty().await);
}

#[tokio::test]
async fn test_play_records_channels() {
    let mut h = Harness::new(1);
    let g = TenantId::from("g1");

    h.registry
        .play(
            g.clone(),
            voxq_common::ChannelId::from("lounge"),
            Some(voxq_common::ChannelId::from("general")),
            item("A", 50),
        )
        .await;
    let session = h.next_session().await;
    assert_eq!(session.channel.as_str(), "lounge");

    let controller = h.registry.get(&g).await.unwrap();
    assert_eq!(controller.voice_channel().as_str(), "lounge");
    assert_eq!(controller.text_channel().map(|c| c.as_str()), Some("general"));

    let started = h
        .wait_for(|e| matches!(e, PlaybackEvent::ControllerStarted { .. }))
        .await;
    assert_eq!(started.tenant(), &g);

    h.registry.stop(&g).await.unwrap();
    h.wait_stopped(&g).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_enqueue_positions_stay_in_range_while_draining() {
    let mut h = Harness::new(8);
    let g = TenantId::from("g1");

    // Empty items end at once, so the loop pops as fast as items arrive
    assert_eq!(h.play(&g, item("seed", 0)).await, PlayOutcome::Started);
    let _session = h.next_session().await;

    let mut plays = 1usize;
    for i in 0..500 {
        match h.play(&g, item(&format!("e{}", i), 0)).await {
            PlayOutcome::Enqueued { position } => {
                assert!(position <= plays, "position {} after {} plays", position, plays)
            }
            PlayOutcome::Started => plays = 0,
        }
        plays += 1;
    }

    h.registry.shutdown().await;
}

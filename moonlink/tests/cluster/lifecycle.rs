//! Activation lifecycle: idle eviction, cold reads, explicit deactivation,
//! ownership moving on join, transition timeouts.

use std::time::Duration;

use moonlink::actors::{
    ActivationState, ActorContext, ActorError, ActorHandler, ActorId, ActorType,
    DeactivationReason, RetryPolicy,
};
use moonlink::worker::{UrlRecordRef, URL_STORE};

use crate::common::{
    addr, record_id, run_local_test, token_owned_by, TestCluster, NODE_A, NODE_B,
};

#[test]
fn test_idle_activation_is_evicted_and_reloaded() {
    run_local_test(async {
        let cluster = TestCluster::new();
        let node = cluster
            .start_with(cluster.config(NODE_A).idle_timeout(Duration::from_secs(60)))
            .await;
        let record: UrlRecordRef = node.actor_ref("1DLE");
        let id = record_id("1DLE");

        record.write(Some("idle.example")).await.expect("write");
        assert_eq!(node.host().activation_state(&id), ActivationState::Active);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(node.host().activation_state(&id), ActivationState::Active);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(node.host().activation_state(&id), ActivationState::Unloaded);
        assert_eq!(node.host().activation_count(), 0);

        let reads_before = cluster.store.read_count();
        assert_eq!(record.read().await.expect("read"), "http://idle.example");
        assert!(cluster.store.read_count() > reads_before, "cold start reads the store");
    });
}

#[test]
fn test_activity_postpones_idle_eviction() {
    run_local_test(async {
        let cluster = TestCluster::new();
        let node = cluster
            .start_with(cluster.config(NODE_A).idle_timeout(Duration::from_secs(60)))
            .await;
        let record: UrlRecordRef = node.actor_ref("B0B");
        record.write(Some("busy.example")).await.expect("write");

        for _ in 0..4 {
            tokio::time::sleep(Duration::from_secs(45)).await;
            record.read().await.expect("read");
        }
        assert_eq!(
            node.host().activation_state(&record_id("B0B")),
            ActivationState::Active
        );
    });
}

#[test]
fn test_cold_read_after_explicit_deactivation() {
    run_local_test(async {
        let cluster = TestCluster::new();
        let node = cluster.start_node(NODE_A).await;
        let record: UrlRecordRef = node.actor_ref("C01D");
        let id = record_id("C01D");

        record.write(Some("http/cold.example")).await.expect("write");
        assert!(
            node.host()
                .deactivate(&id, DeactivationReason::ExplicitRequest)
                .await
        );
        assert!(cluster.directory.is_empty());
        assert!(
            !node
                .host()
                .deactivate(&id, DeactivationReason::ExplicitRequest)
                .await
        );

        assert_eq!(record.read().await.expect("read"), "http://cold.example");
        assert_eq!(node.host().activation_state(&id), ActivationState::Active);
    });
}

#[test]
fn test_keys_move_to_joining_node() {
    run_local_test(async {
        let cluster = TestCluster::new();
        let a = cluster.start_node(NODE_A).await;
        let token = token_owned_by(NODE_B, &[NODE_A, NODE_B]);
        let id = record_id(&token);

        let record: UrlRecordRef = a.actor_ref(token.as_str());
        record.write(Some("moving.example")).await.expect("write");
        assert_eq!(a.host().activation_state(&id), ActivationState::Active);

        let b = cluster.start_node(NODE_B).await;
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(a.host().activation_state(&id), ActivationState::Unloaded);
        assert_eq!(record.read().await.expect("read"), "http://moving.example");
        assert_eq!(b.host().activation_state(&id), ActivationState::Active);
        assert_eq!(a.router().resolve(&id).await.expect("resolve"), addr(NODE_B));
    });
}

const SLOW_START: ActorType = ActorType(0x5105_7A27);

/// Actor whose activation never finishes in time.
#[derive(Default)]
struct SlowStart;

#[async_trait::async_trait(?Send)]
impl ActorHandler for SlowStart {
    fn actor_type() -> ActorType {
        SLOW_START
    }

    async fn on_activate(&mut self, _ctx: &ActorContext) -> Result<(), ActorError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(())
    }

    async fn dispatch(
        &mut self,
        _ctx: &ActorContext,
        _method: u32,
        _body: &[u8],
    ) -> Result<Vec<u8>, ActorError> {
        Ok(serde_json::to_vec(&())?)
    }
}

#[test]
fn test_transition_timeout_surfaces_as_retry() {
    run_local_test(async {
        let cluster = TestCluster::new();
        let config = cluster
            .config(NODE_A)
            .transition_timeout(Duration::from_secs(5))
            .retry(RetryPolicy::no_retry())
            .build();
        let node = moonlink::actors::MoonlinkNode::new(cluster.cluster.clone(), config)
            .register::<SlowStart>()
            .start()
            .await
            .expect("start node");
        let id = ActorId::new(SLOW_START, "slow");

        let err = node
            .router()
            .invoke::<(), ()>(&id, 1, &())
            .await
            .expect_err("activation too slow");
        assert!(matches!(err, ActorError::Unavailable(ref m) if m.contains("did not complete")));
        assert_eq!(node.host().activation_state(&id), ActivationState::Unloaded);
        assert!(cluster.directory.is_empty());
    });
}

#[test]
fn test_shutdown_flushes_to_store() {
    run_local_test(async {
        let cluster = TestCluster::new();
        let node = cluster.start_node(NODE_A).await;
        let record: UrlRecordRef = node.actor_ref("F1A5");
        record.write(Some("flush.example")).await.expect("write");

        node.shutdown().await.expect("shutdown");
        assert!(cluster.store.peek(URL_STORE, "F1A5").is_some());
        assert!(cluster.directory.is_empty());
    });
}

const STUCK_FLUSH: ActorType = ActorType(0x5105_F1A5);

/// Actor whose deactivation hook never returns.
#[derive(Default)]
struct StuckFlush;

#[async_trait::async_trait(?Send)]
impl ActorHandler for StuckFlush {
    fn actor_type() -> ActorType {
        STUCK_FLUSH
    }

    async fn on_deactivate(
        &mut self,
        _ctx: &ActorContext,
        _reason: DeactivationReason,
    ) -> Result<(), ActorError> {
        std::future::pending::<()>().await;
        Ok(())
    }

    async fn dispatch(
        &mut self,
        _ctx: &ActorContext,
        _method: u32,
        _body: &[u8],
    ) -> Result<Vec<u8>, ActorError> {
        Ok(serde_json::to_vec(&())?)
    }
}

#[test]
fn test_hung_deactivation_hook_is_bounded() {
    run_local_test(async {
        let cluster = TestCluster::new();
        let config = cluster
            .config(NODE_A)
            .transition_timeout(Duration::from_secs(5))
            .build();
        let node = moonlink::actors::MoonlinkNode::new(cluster.cluster.clone(), config)
            .register::<StuckFlush>()
            .start()
            .await
            .expect("start node");
        let id = ActorId::new(STUCK_FLUSH, "k");

        node.router()
            .invoke::<(), ()>(&id, 1, &())
            .await
            .expect("first call");
        assert!(
            node.host()
                .deactivate(&id, DeactivationReason::ExplicitRequest)
                .await
        );
        assert_eq!(node.host().activation_state(&id), ActivationState::Unloaded);
        assert!(cluster.directory.is_empty());

        node.router()
            .invoke::<(), ()>(&id, 1, &())
            .await
            .expect("served again after reactivation");
        assert_eq!(node.host().activation_state(&id), ActivationState::Active);
    });
}

//! Node loss: records written through a dead owner stay readable once the
//! survivors declare it dead.

use std::time::Duration;

use moonlink::actors::{
    ActivationState, ActorDirectory, ActorError, MembershipProvider, NodeStatus,
};
use moonlink::health::{ClusterHealth, HealthStatus};
use moonlink::worker::UrlRecordRef;

use crate::common::{addr, record_id, run_local_test, token_owned_by, TestCluster, NODE_A, NODE_B};

#[test]
fn test_record_survives_owner_crash() {
    run_local_test(async {
        let cluster = TestCluster::new();
        let a = cluster.start_node(NODE_A).await;
        let b = cluster.start_node(NODE_B).await;
        let token = token_owned_by(NODE_A, &[NODE_A, NODE_B]);
        let id = record_id(&token);

        let record: UrlRecordRef = b.actor_ref(token.as_str());
        record.write(Some("https://survivor.example")).await.expect("write");
        assert_eq!(a.host().activation_state(&id), ActivationState::Active);

        a.kill();

        // Until A is declared dead, its directory entry still routes there.
        let err = record.read().await.expect_err("owner unreachable");
        assert!(matches!(err, ActorError::Unavailable(_)));

        tokio::time::sleep(Duration::from_secs(70)).await;

        let view = cluster.membership.snapshot().await;
        assert_eq!(view.get_status(&addr(NODE_A)), Some(NodeStatus::Dead));
        assert!(cluster
            .directory
            .lookup(&id)
            .await
            .expect("lookup")
            .is_none());
        assert_eq!(
            ClusterHealth::check(&view, 2),
            HealthStatus::Degraded("currently only 1 node(s)".into())
        );

        assert_eq!(record.read().await.expect("read"), "https://survivor.example");
        assert_eq!(b.host().activation_state(&id), ActivationState::Active);
    });
}

#[test]
fn test_partitioned_owner_recovers_after_heal() {
    run_local_test(async {
        let cluster = TestCluster::new();
        let _a = cluster.start_node(NODE_A).await;
        let b = cluster.start_node(NODE_B).await;
        let token = token_owned_by(NODE_A, &[NODE_A, NODE_B]);

        let record: UrlRecordRef = b.actor_ref(token.as_str());
        record.write(Some("partition.example")).await.expect("write");

        cluster.network.partition(&addr(NODE_A));
        let err = record.read().await.expect_err("partitioned");
        assert!(matches!(err, ActorError::Unavailable(ref m) if m.contains("3 attempts")));

        cluster.network.heal(&addr(NODE_A));
        assert_eq!(
            record.read().await.expect("read"),
            "http://partition.example"
        );
    });
}

#[test]
fn test_graceful_leave_hands_keys_over_immediately() {
    run_local_test(async {
        let cluster = TestCluster::new();
        let a = cluster.start_node(NODE_A).await;
        let b = cluster.start_node(NODE_B).await;
        let token = token_owned_by(NODE_A, &[NODE_A, NODE_B]);

        let record: UrlRecordRef = b.actor_ref(token.as_str());
        record.write(Some("leaving.example")).await.expect("write");

        a.shutdown().await.expect("shutdown");
        assert_eq!(a.host().activation_count(), 0);

        assert_eq!(record.read().await.expect("read"), "http://leaving.example");
        assert_eq!(
            b.host().activation_state(&record_id(&token)),
            ActivationState::Active
        );
    });
}

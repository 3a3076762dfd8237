//! Every call for a token lands on one activation, whichever node it
//! enters through.

use moonlink::actors::{ActivationState, ActorDirectory, ActorError, ActorRef};
use moonlink::worker::{UrlRecord, UrlRecordRef, URL_STORE};

use crate::common::{
    addr, record_id, run_local_test, token_owned_by, TestCluster, NODE_A, NODE_B, NODE_C,
};

#[test]
fn test_concurrent_writes_share_one_activation() {
    run_local_test(async {
        let cluster = TestCluster::new();
        let nodes = [
            cluster.start_node(NODE_A).await,
            cluster.start_node(NODE_B).await,
            cluster.start_node(NODE_C).await,
        ];
        let token = "5EED";

        let mut writes = Vec::new();
        for i in 0..24 {
            let router = nodes[i % nodes.len()].router().clone();
            writes.push(tokio::task::spawn_local(async move {
                UrlRecordRef::from_router(token, &router)
                    .write(Some(&format!("example.com/{i}")))
                    .await
            }));
        }
        for write in writes {
            write.await.expect("join").expect("write");
        }

        let hosting: Vec<_> = nodes
            .iter()
            .filter(|n| n.host().activation_state(&record_id(token)) == ActivationState::Active)
            .collect();
        assert_eq!(hosting.len(), 1, "exactly one node hosts the token");

        let entry = cluster
            .directory
            .lookup(&record_id(token))
            .await
            .expect("lookup")
            .expect("registered");
        assert_eq!(&entry.node, hosting[0].address());

        // Every entry point reads the same value.
        let mut seen = Vec::new();
        for node in &nodes {
            let record: UrlRecordRef = node.actor_ref(token);
            seen.push(record.read().await.expect("read"));
        }
        assert!(seen.windows(2).all(|w| w[0] == w[1]));

        // The persisted record is the value readers see, and one of the writes.
        let stored = cluster.store.peek(URL_STORE, token).expect("persisted");
        let persisted: Option<UrlRecord> = serde_json::from_slice(&stored.data).expect("decode");
        let persisted = persisted.expect("record");
        assert_eq!(persisted.token, token);
        assert_eq!(persisted.full_url, seen[0]);
        let submitted: Vec<String> = (0..24).map(|i| format!("http://example.com/{i}")).collect();
        assert!(submitted.contains(&persisted.full_url));
    });
}

#[test]
fn test_remote_caller_reaches_owner() {
    run_local_test(async {
        let cluster = TestCluster::new();
        let a = cluster.start_node(NODE_A).await;
        let b = cluster.start_node(NODE_B).await;
        let token = token_owned_by(NODE_A, &[NODE_A, NODE_B]);

        let from_b: UrlRecordRef = b.actor_ref(token.as_str());
        from_b.write(Some("https/owner.example")).await.expect("write");

        assert_eq!(
            a.host().activation_state(&record_id(&token)),
            ActivationState::Active
        );
        assert_eq!(b.host().activation_count(), 0);
        assert_eq!(
            b.router().resolve(&record_id(&token)).await.expect("resolve"),
            addr(NODE_A)
        );

        let from_a: UrlRecordRef = a.actor_ref(token.as_str());
        assert_eq!(from_a.read().await.expect("read"), "https://owner.example");
    });
}

#[test]
fn test_unknown_token_not_found_across_nodes() {
    run_local_test(async {
        let cluster = TestCluster::new();
        let _a = cluster.start_node(NODE_A).await;
        let b = cluster.start_node(NODE_B).await;
        let token = token_owned_by(NODE_A, &[NODE_A, NODE_B]);

        let record: UrlRecordRef = b.actor_ref(token.as_str());
        let err = record.read().await.expect_err("never written");
        assert!(matches!(err, ActorError::NotFound { ref key } if *key == token));
        assert!(err.to_string().contains(&token));
    });
}

#[test]
fn test_invalid_write_rejected_remotely() {
    run_local_test(async {
        let cluster = TestCluster::new();
        let _a = cluster.start_node(NODE_A).await;
        let b = cluster.start_node(NODE_B).await;
        let token = token_owned_by(NODE_A, &[NODE_A, NODE_B]);

        let record: UrlRecordRef = b.actor_ref(token.as_str());
        let err = record.write(Some("  ")).await.expect_err("blank");
        assert!(matches!(err, ActorError::InvalidArgument(_)));
        assert!(cluster
            .store
            .peek(moonlink::worker::URL_STORE, &token)
            .is_none());
    });
}

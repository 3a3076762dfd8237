//! Router error paths: activation races, redirects, deadlines, retries.

use std::rc::Rc;
use std::time::Duration;

use moonlink::actors::{
    ActivationState, ActorContext, ActorDirectory, ActorError, ActorFault, ActorHandler, ActorId,
    ActorMessage, ActorResponse, ActorType, ClusterConfig, ClusterTransport, InboundRequests,
    LocalNetwork, MoonlinkNode, NodeConfig, PlacementDirector, PlacementError, PlacementStrategy,
    SharedMembership, TransportError, MAX_FORWARDS,
};
use moonlink::worker::{url_record_methods, UrlRecordRef};
use moonlink::NetworkAddress;

use crate::common::{addr, record_id, run_local_test, TestCluster, NODE_A, NODE_B};

/// Places every key on the calling node, so two callers race to activate.
#[derive(Debug)]
struct PreferLocal;

#[async_trait::async_trait(?Send)]
impl PlacementDirector for PreferLocal {
    async fn place(
        &self,
        _strategy: PlacementStrategy,
        _id: &ActorId,
        _active_members: &[NetworkAddress],
        local_address: &NetworkAddress,
    ) -> Result<NetworkAddress, PlacementError> {
        Ok(local_address.clone())
    }
}

#[test]
fn test_activation_race_has_one_winner() {
    run_local_test(async {
        let cluster = TestCluster::with_placement(Rc::new(PreferLocal));
        let a = cluster.start_node(NODE_A).await;
        let b = cluster.start_node(NODE_B).await;

        let from_a: UrlRecordRef = a.actor_ref("RACE");
        let from_b: UrlRecordRef = b.actor_ref("RACE");
        let first = tokio::task::spawn_local(async move {
            from_a.write(Some("a.example")).await
        });
        let second = tokio::task::spawn_local(async move {
            from_b.write(Some("b.example")).await
        });
        first.await.expect("join").expect("write from a");
        second.await.expect("join").expect("write from b");

        let id = record_id("RACE");
        let states = [
            a.host().activation_state(&id),
            b.host().activation_state(&id),
        ];
        assert_eq!(
            states
                .iter()
                .filter(|s| **s == ActivationState::Active)
                .count(),
            1
        );

        let winner = if states[0] == ActivationState::Active {
            addr(NODE_A)
        } else {
            addr(NODE_B)
        };
        let entry = cluster
            .directory
            .lookup(&id)
            .await
            .expect("lookup")
            .expect("registered");
        assert_eq!(entry.node, winner);
        assert_eq!(cluster.directory.len(), 1);
    });
}

#[test]
fn test_losing_activation_answers_not_owner() {
    run_local_test(async {
        let cluster = TestCluster::with_placement(Rc::new(PreferLocal));
        let a = cluster.start_node(NODE_A).await;
        let b = cluster.start_node(NODE_B).await;

        let record: UrlRecordRef = a.actor_ref("0C0C");
        record.write(Some("owned.example")).await.expect("write");

        let reply = b
            .host()
            .handle(ActorMessage {
                target: record_id("0C0C"),
                method: url_record_methods::READ,
                body: serde_json::to_vec(&()).expect("encode"),
                forward_count: 0,
            })
            .await;
        assert!(matches!(reply, Err(ActorError::NotOwner { ref owner }) if *owner == addr(NODE_A)));
        tokio::task::yield_now().await;
        assert_eq!(b.host().activation_count(), 0);

        // The router follows the redirect.
        let from_b: UrlRecordRef = b.actor_ref("0C0C");
        assert_eq!(from_b.read().await.expect("read"), "http://owned.example");
    });
}

/// Network where every remote node claims someone else owns the key.
#[derive(Debug, Default)]
struct BouncingNetwork {
    inner: LocalNetwork,
}

#[async_trait::async_trait(?Send)]
impl ClusterTransport for BouncingNetwork {
    fn bind(&self, address: &NetworkAddress) -> Result<InboundRequests, TransportError> {
        self.inner.bind(address)
    }

    fn unbind(&self, address: &NetworkAddress) {
        self.inner.unbind(address)
    }

    async fn send(
        &self,
        to: &NetworkAddress,
        _message: ActorMessage,
    ) -> Result<ActorResponse, TransportError> {
        Ok(ActorResponse {
            body: Err(ActorFault::NotOwner {
                owner: NetworkAddress::new(to.ip, to.port + 1),
            }),
        })
    }
}

/// Always places keys on a remote node that does not exist.
#[derive(Debug)]
struct Elsewhere;

#[async_trait::async_trait(?Send)]
impl PlacementDirector for Elsewhere {
    async fn place(
        &self,
        _strategy: PlacementStrategy,
        _id: &ActorId,
        _active_members: &[NetworkAddress],
        _local_address: &NetworkAddress,
    ) -> Result<NetworkAddress, PlacementError> {
        Ok(addr(20000))
    }
}

#[test]
fn test_redirect_loop_is_bounded() {
    run_local_test(async {
        let cluster = ClusterConfig::builder()
            .membership(Rc::new(SharedMembership::new()))
            .transport(Rc::new(BouncingNetwork::default()))
            .placement_director(Rc::new(Elsewhere))
            .build()
            .expect("build cluster");
        let node = MoonlinkNode::new(cluster, NodeConfig::for_address(addr(NODE_A)))
            .register::<moonlink::worker::UrlRecordWorker>()
            .start()
            .await
            .expect("start node");

        let record: UrlRecordRef = node.actor_ref("L00P");
        let err = record.read().await.expect_err("bounces forever");
        assert!(matches!(err, ActorError::TooManyForwards { forwards } if forwards == MAX_FORWARDS));
    });
}

const SLOW: ActorType = ActorType(0x5105_0001);

/// Actor that takes a minute per call.
#[derive(Default)]
struct Slow;

#[async_trait::async_trait(?Send)]
impl ActorHandler for Slow {
    fn actor_type() -> ActorType {
        SLOW
    }

    async fn dispatch(
        &mut self,
        _ctx: &ActorContext,
        _method: u32,
        _body: &[u8],
    ) -> Result<Vec<u8>, ActorError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(serde_json::to_vec(&())?)
    }
}

#[test]
fn test_call_deadline() {
    run_local_test(async {
        let cluster = TestCluster::new();
        let config = cluster
            .config(NODE_A)
            .call_timeout(Duration::from_secs(2))
            .build();
        let node = MoonlinkNode::new(cluster.cluster.clone(), config)
            .register::<Slow>()
            .start()
            .await
            .expect("start node");

        let err = node
            .router()
            .invoke::<(), ()>(&ActorId::new(SLOW, "s"), 1, &())
            .await
            .expect_err("too slow");
        assert!(matches!(err, ActorError::Timeout(d) if d == Duration::from_secs(2)));
    });
}

#[test]
fn test_store_outage_exhausts_retries() {
    run_local_test(async {
        let cluster = TestCluster::new();
        let node = cluster.start_node(NODE_A).await;
        let record: UrlRecordRef = node.actor_ref("0FF");

        cluster.store.set_available(false);
        let err = record.write(Some("down.example")).await.expect_err("store offline");
        assert!(matches!(err, ActorError::Unavailable(ref m) if m.contains("after 3 attempts")));
        assert_eq!(node.host().activation_count(), 0);
        assert!(cluster.directory.is_empty());

        cluster.store.set_available(true);
        record.write(Some("up.example")).await.expect("write");
        assert_eq!(record.read().await.expect("read"), "http://up.example");
    });
}

#[test]
fn test_unregistered_actor_type() {
    run_local_test(async {
        let cluster = TestCluster::new();
        let node = cluster.start_node(NODE_A).await;

        let err = node
            .router()
            .invoke::<(), ()>(&ActorId::new(ActorType(0xDEAD), "x"), 1, &())
            .await
            .expect_err("no handler");
        assert!(matches!(err, ActorError::UnregisteredType(ActorType(0xDEAD))));
    });
}

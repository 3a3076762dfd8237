//! Shared cluster fixture.

#![allow(dead_code)]

use std::future::Future;
use std::rc::Rc;

use moonlink::actors::{
    ActorId, ClusterConfig, DefaultPlacementDirector, InMemoryDirectory, InMemoryRecordStore,
    LocalNetwork, MoonlinkNode, NodeConfig, NodeConfigBuilder, PlacementDirector,
    SharedMembership,
};
use moonlink::health::LocalHealthCheck;
use moonlink::worker::{UrlRecordWorker, URL_RECORD_ACTOR};
use moonlink::NetworkAddress;

pub const NODE_A: u16 = 11111;
pub const NODE_B: u16 = 11112;
pub const NODE_C: u16 = 11113;

/// Run `f` on a paused current-thread runtime inside a `LocalSet`.
pub fn run_local_test<F: Future<Output = ()> + 'static>(f: F) {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .expect("build runtime");
    tokio::task::LocalSet::new().block_on(&rt, f);
}

pub fn addr(port: u16) -> NetworkAddress {
    NetworkAddress::localhost(port)
}

/// Components shared by every node of a test cluster.
pub struct TestCluster {
    pub cluster: ClusterConfig,
    pub network: Rc<LocalNetwork>,
    pub membership: Rc<SharedMembership>,
    pub directory: Rc<InMemoryDirectory>,
    pub store: Rc<InMemoryRecordStore>,
}

impl TestCluster {
    pub fn new() -> Self {
        Self::with_placement(Rc::new(DefaultPlacementDirector))
    }

    pub fn with_placement(placement: Rc<dyn PlacementDirector>) -> Self {
        let network = Rc::new(LocalNetwork::new());
        let membership = Rc::new(SharedMembership::new());
        let directory = Rc::new(InMemoryDirectory::new());
        let cluster = ClusterConfig::builder()
            .name("moonlink-test")
            .membership(membership.clone())
            .directory(directory.clone())
            .transport(network.clone())
            .placement_director(placement)
            .build()
            .expect("build cluster");
        Self {
            cluster,
            network,
            membership,
            directory,
            store: Rc::new(InMemoryRecordStore::new()),
        }
    }

    /// Node config sharing the cluster's record store.
    pub fn config(&self, port: u16) -> NodeConfigBuilder {
        NodeConfig::builder()
            .address(addr(port))
            .state_store(self.store.clone())
    }

    pub async fn start_node(&self, port: u16) -> MoonlinkNode {
        self.start_with(self.config(port)).await
    }

    pub async fn start_with(&self, config: NodeConfigBuilder) -> MoonlinkNode {
        MoonlinkNode::new(self.cluster.clone(), config.build())
            .register::<UrlRecordWorker>()
            .register::<LocalHealthCheck>()
            .start()
            .await
            .expect("start node")
    }
}

pub fn record_id(token: &str) -> ActorId {
    ActorId::new(URL_RECORD_ACTOR, token)
}

/// First token that rendezvous hashing places on `owner` among `members`.
pub fn token_owned_by(owner: u16, members: &[u16]) -> String {
    let members: Vec<NetworkAddress> = members.iter().map(|p| addr(*p)).collect();
    let owner = addr(owner);
    (0u32..)
        .map(|i| format!("{i:X}"))
        .find(|token| {
            DefaultPlacementDirector::owner_of(&record_id(token), &members) == Some(&owner)
        })
        .expect("some token hashes to every member")
}

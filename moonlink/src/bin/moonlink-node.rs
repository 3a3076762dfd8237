//! Moonlink node: resolve the network identity, join the cluster, serve
//! URL records until interrupted.
//!
//! # Usage
//!
//! Local development (single node on 127.0.0.1:11111):
//! ```bash
//! MOONLINK_ENVIRONMENT=Development cargo run --bin moonlink-node
//! ```
//!
//! With a settings file:
//! ```bash
//! cargo run --bin moonlink-node -- --config moonlink.toml
//! ```
//!
//! The membership directory and record store are in-process: a node started
//! this way only clusters with nodes in the same process.

use std::path::PathBuf;
use std::rc::Rc;

use clap::Parser;
use moonlink::actors::{
    ClusterConfig, MembershipProvider, MoonlinkNode, NodeConfig, SharedMembership,
    SingleNodeMembership,
};
use moonlink::bootstrap::{ClusterBootstrapResolver, EnvironmentSignals, MembershipMode};
use moonlink::health::{self, ClusterHealth, LocalHealthCheck};
use moonlink::settings::Settings;
use moonlink::worker::UrlRecordWorker;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "moonlink-node")]
#[command(about = "URL shortener node on virtual actors", long_about = None)]
struct Args {
    /// Path to a TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,moonlink=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let settings = Settings::load(args.config.as_deref())?;
    let signals = EnvironmentSignals::from_env(&settings)?;
    let plan = ClusterBootstrapResolver::default().plan(&signals)?;

    tokio::task::LocalSet::new()
        .run_until(async move {
            let membership: Rc<dyn MembershipProvider> = match plan.membership {
                MembershipMode::SingleNode => Rc::new(SingleNodeMembership::new()),
                MembershipMode::Directory => Rc::new(SharedMembership::new()),
            };
            let cluster = ClusterConfig::builder()
                .name(plan.identity.cluster_id.clone())
                .membership(membership)
                .build()?;

            let mut config = NodeConfig::builder()
                .address(plan.identity.peer_address())
                .idle_timeout(settings.runtime.idle_timeout())
                .call_timeout(settings.runtime.call_timeout());
            if let Some(expiration) = plan.defunct_expiration {
                config = config.defunct_expiration(expiration);
            }

            let node = MoonlinkNode::new(cluster.clone(), config.build())
                .register::<UrlRecordWorker>()
                .register::<LocalHealthCheck>()
                .start()
                .await?;

            tracing::info!(
                address = %node.address(),
                source = %plan.source,
                cluster_id = %plan.identity.cluster_id,
                service_id = %plan.identity.service_id,
                "moonlink node started"
            );

            let local = health::probe_local_dispatch(node.router()).await;
            let view = cluster.membership().snapshot().await;
            let members = ClusterHealth::check(&view, settings.runtime.min_members);
            tracing::info!(local = ?local, cluster = ?members, "startup health");

            tokio::signal::ctrl_c().await?;
            tracing::info!("interrupt received, shutting down");
            node.shutdown().await?;
            Ok::<_, Box<dyn std::error::Error>>(())
        })
        .await
}

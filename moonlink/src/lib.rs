//! # Moonlink
//!
//! A URL shortener built on Orleans-style virtual actors.
//!
//! Every short token is the key of one virtual actor, a
//! [`UrlRecordWorker`](worker::UrlRecordWorker). Callers never create or
//! locate workers: the node's router activates the worker for a token on
//! first use, on whichever cluster node owns the token, and keeps all calls
//! for that token on a single activation. Records survive node loss through
//! a durable record store.
//!
//! ## Crate Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  service      UrlShortener: create_short / resolve / ping   │
//! │  worker       UrlRecordWorker + UrlRecordRef                │
//! │  health       local probe, cluster and node health          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  actors       host, router, node lifecycle, directory,      │
//! │               membership, placement, transport, state       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  bootstrap    environment signals → NetworkIdentity         │
//! │  settings     TOML settings file                            │
//! │  normalize    URL canonicalization                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::rc::Rc;
//! use moonlink::actors::{ClusterConfig, MoonlinkNode, NodeConfig, SharedMembership};
//! use moonlink::service::UrlShortener;
//! use moonlink::worker::UrlRecordWorker;
//! use moonlink::NetworkAddress;
//!
//! let cluster = ClusterConfig::builder()
//!     .membership(Rc::new(SharedMembership::new()))
//!     .build()?;
//! let node = MoonlinkNode::new(cluster, NodeConfig::for_address(NetworkAddress::localhost(11111)))
//!     .register::<UrlRecordWorker>()
//!     .start()
//!     .await?;
//!
//! let shortener = UrlShortener::new(node.router().clone());
//! let token = shortener.create_short(Some("httpbin.org/get")).await?;
//! assert_eq!(shortener.resolve(&token).await?, "http://httpbin.org/get");
//! ```

#![deny(missing_docs)]

pub mod actors;
pub mod address;
pub mod bootstrap;
pub mod error;
pub mod health;
pub mod normalize;
pub mod service;
pub mod settings;
pub mod worker;

pub use address::NetworkAddress;
pub use error::{ConfigurationError, ValidationError};

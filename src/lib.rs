//! # sharr - Peer-to-Peer File Sharing
//!
//! Each node shares a local folder with a cluster of peers. Membership
//! travels over a line-oriented UDP control plane via periodic gossip;
//! file searches are broadcast to the cluster, and the first peer to
//! answer serves the bytes over a one-shot TCP connection.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sharr::{Config, Node};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(None)?;
//!     let node = Node::start(config, "./shared".into(), vec![]).await?;
//!     node.request_file("r.pdf").await;
//!     node.shutdown().await;
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]

pub mod cluster;
pub mod config;
pub mod control;
pub mod error;
pub mod index;
pub mod logging;
pub mod message;
pub mod node;
pub mod transfer;

// Re-export commonly used types and functions
pub use cluster::Cluster;
pub use config::Config;
pub use error::{MessageError, NodeError, TransferError};
pub use index::FileIndex;
pub use message::{Message, Method};
pub use node::Node;
pub use transfer::{TransferClient, TransferServer};

// vim: ts=4

//! Node supervisor
//!
//! Owns the lifetimes of the cluster set, file index, control plane and
//! both sides of the bulk transfer. Wires the three capacity-1 channels
//! between them (bulk port, responder address, file name), spawns the
//! four long-lived tasks, and tears everything down through a single
//! shutdown signal.

use crate::cluster::Cluster;
use crate::config::Config;
use crate::control::Control;
use crate::error::NodeError;
use crate::index::FileIndex;
use crate::logging::*;
use crate::transfer::{TransferClient, TransferServer};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

pub struct Node {
	control: Arc<Control>,
	shutdown_tx: watch::Sender<bool>,
	handles: Vec<JoinHandle<()>>,
}

impl Node {
	/// Bind both listeners and start the four cooperating tasks: bulk
	/// listener, bulk initiator, control receive loop, gossip ticker.
	/// Either bind failing aborts startup.
	pub async fn start(
		config: Config,
		folder: PathBuf,
		seeds: Vec<String>,
	) -> Result<Node, NodeError> {
		let (shutdown_tx, shutdown_rx) = watch::channel(false);

		let cluster = Arc::new(Cluster::new(seeds));
		let index = Arc::new(FileIndex::new(folder.clone()));

		// The bulk listener must bind before the control plane can
		// advertise; the port channel decouples the startup order.
		let server = TransferServer::bind(&config.host, Arc::clone(&index)).await?;
		let client = TransferClient::new(folder);
		let control =
			Control::bind(&config, Arc::clone(&cluster), index, shutdown_rx.clone()).await?;
		let control = Arc::new(control);

		let (port_tx, port_rx) = mpsc::channel(1);
		let (addr_tx, addr_rx) = mpsc::channel(1);
		let (name_tx, name_rx) = mpsc::channel(1);

		let mut handles = Vec::new();

		handles.push(tokio::spawn({
			let shutdown = shutdown_rx.clone();
			async move { server.run(port_tx, shutdown).await }
		}));

		handles.push(tokio::spawn({
			let shutdown = shutdown_rx.clone();
			async move { client.run(addr_rx, name_rx, shutdown).await }
		}));

		handles.push(tokio::spawn({
			let control = Arc::clone(&control);
			async move {
				if let Err(e) = control.run(port_rx, addr_tx, name_tx).await {
					error!("Control plane failed: {}", e);
				}
			}
		}));

		handles.push(tokio::spawn({
			let control = Arc::clone(&control);
			async move { control.gossip().await }
		}));

		Ok(Node { control, shutdown_tx, handles })
	}

	/// Current cluster membership
	pub fn members(&self) -> Vec<String> {
		self.control.cluster().snapshot()
	}

	/// Search the cluster for `name` and pull it from the first peer
	/// that answers. Returns when the wait window closes, found or not.
	pub async fn request_file(&self, name: &str) {
		self.control.request_file(name).await;
	}

	/// Signal shutdown and wait for all four tasks to terminate
	pub async fn shutdown(self) {
		info!("Shutting down");
		let _ = self.shutdown_tx.send(true);

		for handle in self.handles {
			let _ = handle.await;
		}
	}
}

// vim: ts=4

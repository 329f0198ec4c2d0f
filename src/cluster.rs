//! Thread-safe set of peer endpoints
//!
//! A peer endpoint is a `host:port` string naming another node's
//! control-plane UDP socket. The string form is the canonical identity;
//! equality is plain string comparison. Insertion order is preserved so
//! snapshots iterate stably.

use crate::logging::*;
use std::io;
use std::sync::RwLock;
use tokio::net::UdpSocket;

/// Cluster membership as known to the local node.
///
/// Never contains the empty string and never contains the local node's
/// own endpoint (enforced at merge). Readers may interleave freely;
/// writers are serialized. No lock is held across I/O: broadcast takes
/// a snapshot first.
#[derive(Debug)]
pub struct Cluster {
	list: RwLock<Vec<String>>,
}

impl Cluster {
	/// Create a cluster set from seed endpoints. The input is copied;
	/// callers cannot influence the internal storage afterward.
	pub fn new(list: Vec<String>) -> Self {
		Cluster { list: RwLock::new(list) }
	}

	/// Point-in-time copy of the membership. Repeated calls never alias
	/// each other nor the internal storage.
	pub fn snapshot(&self) -> Vec<String> {
		self.list.read().unwrap_or_else(|e| e.into_inner()).clone()
	}

	/// Add each incoming endpoint absent from the set, skipping empty
	/// strings and `self_endpoint`.
	pub fn merge(&self, self_endpoint: &str, incoming: &[String]) {
		let mut list = self.list.write().unwrap_or_else(|e| e.into_inner());

		for endpoint in incoming {
			if endpoint.is_empty() || endpoint == self_endpoint {
				continue;
			}

			if !list.iter().any(|ep| ep == endpoint) {
				info!("Discovered new peer: {}", endpoint);
				list.push(endpoint.clone());
			}
		}
	}

	/// Add a single endpoint if not already present. Empty strings are
	/// rejected; duplicates are a no-op.
	pub fn add(&self, endpoint: &str) {
		if endpoint.is_empty() {
			return;
		}

		let mut list = self.list.write().unwrap_or_else(|e| e.into_inner());
		if !list.iter().any(|ep| ep == endpoint) {
			info!("Discovered new peer: {}", endpoint);
			list.push(endpoint.to_string());
		}
	}

	/// Remove an endpoint; a no-op when absent.
	pub fn remove(&self, endpoint: &str) {
		let mut list = self.list.write().unwrap_or_else(|e| e.into_inner());
		if let Some(pos) = list.iter().position(|ep| ep == endpoint) {
			list.remove(pos);
		}
	}

	/// Number of known peers
	pub fn len(&self) -> usize {
		self.list.read().unwrap_or_else(|e| e.into_inner()).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Send `payload` once to every member.
	///
	/// Endpoints are resolved individually (hostnames allowed); a peer
	/// that fails to resolve or to send is logged and skipped, and stays
	/// in the set. The last error is returned after the full pass.
	pub async fn broadcast(&self, socket: &UdpSocket, payload: &str) -> io::Result<()> {
		let mut last_err = None;

		for endpoint in self.snapshot() {
			let addr = match tokio::net::lookup_host(endpoint.as_str()).await {
				Ok(mut addrs) => match addrs.next() {
					Some(addr) => addr,
					None => {
						warn!("No addresses for {}", endpoint);
						last_err = Some(io::Error::new(
							io::ErrorKind::NotFound,
							format!("no addresses for {}", endpoint),
						));
						continue;
					}
				},
				Err(e) => {
					warn!("Failed to resolve {}: {}", endpoint, e);
					last_err = Some(e);
					continue;
				}
			};

			if let Err(e) = socket.send_to(payload.as_bytes(), addr).await {
				warn!("Failed to send to {}: {}", endpoint, e);
				last_err = Some(e);
			}
		}

		match last_err {
			Some(e) => Err(e),
			None => Ok(()),
		}
	}
}


// vim: ts=4

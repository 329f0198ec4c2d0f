//! UDP control plane
//!
//! One socket, three message kinds, and the single place where the
//! request/answer workflow lives. The receive loop demultiplexes inbound
//! frames; gossip runs on its own ticker; file requests enter a bounded
//! wait that the first accepted answer cuts short.
//!
//! Responder selection: peers that have answered us before are in the
//! priority set and reply to our Get immediately; everyone else defers
//! by a fixed delay. Among the replies that do arrive, the first one
//! wins. Arrival order is the tie-breaker, which keeps selection
//! deterministic per round.

use crate::cluster::Cluster;
use crate::config::{Config, NON_PRIORITY_DELAY, UDP_BUFFER_SIZE};
use crate::error::NodeError;
use crate::index::FileIndex;
use crate::logging::*;
use crate::message::{Message, Method};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex, Notify};
use tokio::time;

/// The single in-flight file request
struct Waiting {
	/// Name the outstanding Get was broadcast for
	name: String,

	/// Wakes the blocked `request_file` once an answer is dispatched
	answered: Arc<Notify>,

	/// Set when the first File answer is accepted; later answers within
	/// the same window are ignored
	dispatched: bool,
}

/// Control-plane coordinator
pub struct Control {
	socket: Arc<UdpSocket>,
	cluster: Arc<Cluster>,
	index: Arc<FileIndex>,
	self_endpoint: String,
	method: Method,
	waiting_duration: Duration,
	discovery_period: Duration,

	/// Bulk-listener port advertised in File answers; published once by
	/// the listener and consumed once at the start of the receive loop
	advertised_port: AtomicU16,

	/// Peers whose answers we have accepted before; they skip the
	/// non-priority delay when answering our future requests
	priority: Mutex<HashSet<String>>,

	waiting: Mutex<Option<Waiting>>,

	/// Serializes `request_file`; only one wait window at a time
	request_lock: AsyncMutex<()>,

	shutdown: watch::Receiver<bool>,
}

impl Control {
	/// Bind the control socket. A bind failure here is fatal and aborts
	/// node startup.
	pub async fn bind(
		config: &Config,
		cluster: Arc<Cluster>,
		index: Arc<FileIndex>,
		shutdown: watch::Receiver<bool>,
	) -> Result<Control, NodeError> {
		let addr = config.self_endpoint();
		let socket = UdpSocket::bind(addr.as_str())
			.await
			.map_err(|e| NodeError::Bind { addr: addr.clone(), source: e })?;

		let method = Method::from_number(config.method).ok_or_else(|| {
			NodeError::InvalidConfig { message: format!("type: {}", config.method) }
		})?;

		Ok(Control {
			socket: Arc::new(socket),
			cluster,
			index,
			self_endpoint: addr,
			method,
			waiting_duration: config.waiting_duration(),
			discovery_period: config.discovery_period(),
			advertised_port: AtomicU16::new(0),
			priority: Mutex::new(HashSet::new()),
			waiting: Mutex::new(None),
			request_lock: AsyncMutex::new(()),
			shutdown,
		})
	}

	pub fn cluster(&self) -> &Cluster {
		&self.cluster
	}

	/// Receive loop. Consumes the bulk listener's port once, then
	/// decodes and dispatches frames until shutdown. Malformed frames
	/// and transient socket errors are logged and skipped.
	pub async fn run(
		self: Arc<Self>,
		mut port_rx: mpsc::Receiver<u16>,
		addr_tx: mpsc::Sender<String>,
		name_tx: mpsc::Sender<String>,
	) -> Result<(), NodeError> {
		let mut shutdown = self.shutdown.clone();

		let port = tokio::select! {
			_ = shutdown.changed() => return Ok(()),
			port = port_rx.recv() => port.ok_or(NodeError::PortUnavailable)?,
		};
		self.advertised_port.store(port, Ordering::Relaxed);
		info!("Control plane on {} advertising bulk port {}", self.self_endpoint, port);

		let mut buffer = [0u8; UDP_BUFFER_SIZE];
		loop {
			let (len, src) = tokio::select! {
				_ = shutdown.changed() => {
					debug!("Control plane shutting down");
					return Ok(());
				}
				received = self.socket.recv_from(&mut buffer) => match received {
					Ok(pair) => pair,
					Err(e) => {
						warn!("Receive error: {}", e);
						continue;
					}
				},
			};

			let frame = String::from_utf8_lossy(&buffer[..len]).to_string();
			match Message::decode(&frame) {
				Ok(msg) => Arc::clone(&self).dispatch(msg, src, &addr_tx, &name_tx).await,
				Err(e) => warn!("Dropping frame from {}: {}", src, e),
			}
		}
	}

	async fn dispatch(
		self: Arc<Self>,
		msg: Message,
		src: SocketAddr,
		addr_tx: &mpsc::Sender<String>,
		name_tx: &mpsc::Sender<String>,
	) {
		match msg {
			Message::Discover { list } => {
				trace!("Gossip from {}: {} endpoint(s)", src, list.len());
				self.cluster.merge(&self.self_endpoint, &list);
			}

			Message::Get { name } => {
				if !self.index.search(&name) {
					debug!("{} asked for {}, which we do not have", src, name);
					return;
				}

				tokio::spawn(async move {
					self.answer(src, name).await;
				});
			}

			Message::File { method, port } => {
				self.accept_answer(method, port, src, addr_tx, name_tx).await;
			}
		}
	}

	/// Deferred File reply to a Get we can serve. Priority requesters
	/// get the answer immediately; newcomers after the fixed delay, so
	/// a requester racing several holders prefers peers it has used
	/// before.
	async fn answer(self: Arc<Self>, src: SocketAddr, name: String) {
		let prior =
			self.priority.lock().unwrap_or_else(|e| e.into_inner()).contains(&src.to_string());

		if !prior {
			debug!("Deferring answer to {} for {}", src, name);
			let mut shutdown = self.shutdown.clone();
			tokio::select! {
				_ = shutdown.changed() => return,
				_ = time::sleep(NON_PRIORITY_DELAY) => {}
			}
		}

		let reply = Message::File {
			method: self.method,
			port: self.advertised_port.load(Ordering::Relaxed),
		};

		match self.socket.send_to(reply.encode().as_bytes(), src).await {
			Ok(_) => info!("Offered {} to {}", name, src),
			Err(e) => warn!("Failed to answer {}: {}", src, e),
		}
	}

	/// A peer claims to have the file we are waiting for. Only the first
	/// answer within the window is accepted; it joins the priority set
	/// and its address/name pair is handed to the bulk initiator,
	/// address first.
	async fn accept_answer(
		&self,
		method: Method,
		port: u16,
		src: SocketAddr,
		addr_tx: &mpsc::Sender<String>,
		name_tx: &mpsc::Sender<String>,
	) {
		if method == Method::ReliableUdp {
			warn!("Ignoring offer from {}: reliable-UDP transfers are not implemented", src);
			return;
		}

		let accepted = {
			let mut waiting = self.waiting.lock().unwrap_or_else(|e| e.into_inner());
			match waiting.as_mut() {
				Some(w) if !w.dispatched => {
					w.dispatched = true;
					Some((w.name.clone(), w.answered.clone()))
				}
				_ => None,
			}
		};

		let (name, answered) = match accepted {
			Some(pair) => pair,
			None => {
				debug!("Ignoring offer from {}: not waiting", src);
				return;
			}
		};

		self.priority.lock().unwrap_or_else(|e| e.into_inner()).insert(src.to_string());

		let addr = format!("{}:{}", src.ip(), port);
		info!("Accepted offer for {} from {}", name, addr);

		// Address strictly before name; request_file is serialized, so
		// no second request can interleave its own pair.
		if addr_tx.send(addr).await.is_ok() {
			let _ = name_tx.send(name).await;
		}

		answered.notify_one();
	}

	/// Broadcast a Get for `name` and wait until the first accepted
	/// answer, the wait deadline, or shutdown; all three are normal
	/// outcomes. Overlapping calls are serialized.
	pub async fn request_file(&self, name: &str) {
		let _guard = self.request_lock.lock().await;

		let answered = Arc::new(Notify::new());
		{
			let mut waiting = self.waiting.lock().unwrap_or_else(|e| e.into_inner());
			*waiting = Some(Waiting {
				name: name.to_string(),
				answered: answered.clone(),
				dispatched: false,
			});
		}

		info!("Searching the cluster for {}", name);
		let request = Message::Get { name: name.to_string() }.encode();
		if let Err(e) = self.cluster.broadcast(&self.socket, &request).await {
			warn!("Search broadcast incomplete: {}", e);
		}

		let mut shutdown = self.shutdown.clone();
		tokio::select! {
			_ = answered.notified() => debug!("Wait window closed by an answer"),
			_ = time::sleep(self.waiting_duration) => {
				info!("Nobody offered {} within {:?}", name, self.waiting_duration);
			}
			_ = shutdown.changed() => debug!("Wait window cancelled by shutdown"),
		}

		*self.waiting.lock().unwrap_or_else(|e| e.into_inner()) = None;
	}

	/// Gossip ticker: broadcast the current membership every period.
	/// Per-peer failures never stop the ticker.
	pub async fn gossip(self: Arc<Self>) {
		let mut shutdown = self.shutdown.clone();
		let mut ticker = time::interval(self.discovery_period);

		loop {
			tokio::select! {
				_ = shutdown.changed() => {
					debug!("Gossip ticker stopped");
					return;
				}
				_ = ticker.tick() => {
					let frame = Message::Discover { list: self.cluster.snapshot() }.encode();
					trace!("Gossiping {} endpoint(s)", self.cluster.len());
					if let Err(e) = self.cluster.broadcast(&self.socket, &frame).await {
						debug!("Gossip incomplete: {}", e);
					}
				}
			}
		}
	}
}

// vim: ts=4

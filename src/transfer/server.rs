//! Bulk-transfer listener
//!
//! Serves one file per accepted connection using the framed transfer
//! format. The listener binds to an OS-assigned port and publishes it
//! once, so the control plane can advertise where to fetch from.

use crate::config::{BUFFER_SIZE, FILE_NAME_LENGTH, FILE_SIZE_LENGTH};
use crate::error::{NodeError, TransferError};
use crate::index::FileIndex;
use crate::logging::*;
use crate::message::Message;
use crate::transfer::fill;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};

pub struct TransferServer {
	listener: TcpListener,
	port: u16,
	index: Arc<FileIndex>,
}

impl TransferServer {
	/// Bind on `host:0`. A bind failure here is fatal and aborts node
	/// startup; the OS-assigned port is published later by [`run`](Self::run).
	pub async fn bind(host: &str, index: Arc<FileIndex>) -> Result<TransferServer, NodeError> {
		let listener = TcpListener::bind((host, 0))
			.await
			.map_err(|e| NodeError::Bind { addr: format!("{}:0", host), source: e })?;
		let port = listener.local_addr()?.port();

		info!("Bulk-transfer listener on {}:{}", host, port);
		Ok(TransferServer { listener, port, index })
	}

	/// Publish the bound port once on `port_tx`, then accept connections
	/// until shutdown. Each connection is served on its own task; a
	/// failed accept is logged and the loop continues.
	pub async fn run(self, port_tx: mpsc::Sender<u16>, mut shutdown: watch::Receiver<bool>) {
		let _ = port_tx.send(self.port).await;

		loop {
			tokio::select! {
				_ = shutdown.changed() => {
					debug!("Bulk-transfer listener shutting down");
					return;
				}
				accepted = self.listener.accept() => {
					match accepted {
						Ok((stream, peer)) => {
							debug!("Accepted bulk connection from {}", peer);
							let index = Arc::clone(&self.index);
							tokio::spawn(async move {
								if let Err(e) = serve_connection(stream, &index).await {
									warn!("Transfer to {} failed: {}", peer, e);
								}
							});
						}
						Err(e) => warn!("Failed to accept connection: {}", e),
					}
				}
			}
		}
	}
}

/// Read one Get request, then stream the framed file. Unknown files and
/// unexpected messages just close the connection; the requester observes
/// a timeout on its side.
async fn serve_connection(stream: TcpStream, index: &FileIndex) -> Result<(), TransferError> {
	let (read_half, mut write_half) = stream.into_split();

	let mut line = String::new();
	let mut reader = BufReader::new(read_half);
	reader.read_line(&mut line).await?;

	let name = match Message::decode(&line) {
		Ok(Message::Get { name }) => name,
		Ok(_) => return Err(TransferError::UnexpectedMessage),
		Err(_) => return Err(TransferError::UnexpectedMessage),
	};

	let path = match index.lookup(&name) {
		Some(path) => path,
		None => {
			debug!("No such file: {}", name);
			return Ok(());
		}
	};

	send_file(&mut write_half, &path).await
}

/// Write the two fixed-width headers, then the raw bytes
async fn send_file(
	conn: &mut (impl AsyncWrite + Unpin),
	path: &Path,
) -> Result<(), TransferError> {
	let mut file = fs::File::open(path).await?;
	let meta = file.metadata().await?;
	let size = meta.len();
	let base = path
		.file_name()
		.map(|n| n.to_string_lossy().to_string())
		.ok_or_else(|| TransferError::BadHeader { message: "path has no file name".to_string() })?;

	conn.write_all(fill(&size.to_string(), FILE_SIZE_LENGTH).as_bytes()).await?;
	conn.write_all(fill(&base, FILE_NAME_LENGTH).as_bytes()).await?;

	copy_file(&mut file, conn).await?;
	conn.flush().await?;

	info!("Sent {} ({} bytes)", base, size);
	Ok(())
}

async fn copy_file(
	file: &mut (impl AsyncRead + Unpin),
	conn: &mut (impl AsyncWrite + Unpin),
) -> Result<(), TransferError> {
	let mut buffer = [0u8; BUFFER_SIZE];
	loop {
		let n = file.read(&mut buffer).await?;
		if n == 0 {
			return Ok(());
		}
		conn.write_all(&buffer[..n]).await?;
	}
}

// vim: ts=4

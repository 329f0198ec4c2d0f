//! Bulk-transfer initiator
//!
//! Waits for (address, name) pairs from the control plane and pulls the
//! file over a fresh TCP connection. The file lands under a
//! `downloading_` name first and is renamed only once every byte has
//! arrived, so the canonical path never holds a partial file.

use crate::config::{BUFFER_SIZE, DIAL_TIMEOUT, FILE_NAME_LENGTH, FILE_SIZE_LENGTH};
use crate::error::TransferError;
use crate::index::DOWNLOADING_PREFIX;
use crate::logging::*;
use crate::message::Message;
use crate::transfer::trim_padding;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time;

pub struct TransferClient {
	folder: PathBuf,
}

impl TransferClient {
	pub fn new(folder: PathBuf) -> Self {
		TransferClient { folder }
	}

	/// Receive loop: one address, then one name, per transfer. Shutdown
	/// is checked at both receives so a cancel between the paired sends
	/// is prompt. Download failures are logged; the loop keeps serving
	/// later requests.
	pub async fn run(
		&self,
		mut addr_rx: mpsc::Receiver<String>,
		mut name_rx: mpsc::Receiver<String>,
		mut shutdown: watch::Receiver<bool>,
	) {
		loop {
			let addr = tokio::select! {
				_ = shutdown.changed() => return,
				addr = addr_rx.recv() => match addr {
					Some(addr) => addr,
					None => return,
				},
			};

			let name = tokio::select! {
				_ = shutdown.changed() => return,
				name = name_rx.recv() => match name {
					Some(name) => name,
					None => return,
				},
			};

			match self.download(&addr, &name).await {
				Ok(path) => info!("File saved: {}", path.display()),
				Err(e) => error!("Failed to download {} from {}: {}", name, addr, e),
			}
		}
	}

	/// Pull one file from `addr`. Returns the canonical path on success.
	async fn download(&self, addr: &str, name: &str) -> Result<PathBuf, TransferError> {
		let stream = time::timeout(DIAL_TIMEOUT, TcpStream::connect(addr))
			.await
			.map_err(|e| TransferError::ConnectFailed {
				addr: addr.to_string(),
				source: Box::new(e),
			})?
			.map_err(|e| TransferError::ConnectFailed {
				addr: addr.to_string(),
				source: Box::new(e),
			})?;

		let (mut read_half, mut write_half) = stream.into_split();

		let request = Message::Get { name: name.to_string() };
		write_half.write_all(request.encode().as_bytes()).await?;

		let (size, sent_name) = read_headers(&mut read_half).await?;

		// The server names the file; strip any directory components it
		// may have smuggled into the header.
		let base = Path::new(&sent_name)
			.file_name()
			.map(|n| n.to_string_lossy().to_string())
			.ok_or_else(|| TransferError::BadHeader {
				message: format!("unusable file name: {:?}", sent_name),
			})?;

		let partial = self.folder.join(format!("{}{}", DOWNLOADING_PREFIX, base));
		let canonical = self.folder.join(&base);

		debug!("Downloading {} ({} bytes) from {}", base, size, addr);

		if let Err(e) = receive_into(&mut read_half, &partial, size).await {
			let _ = fs::remove_file(&partial).await;
			return Err(e);
		}

		if let Err(e) = fs::rename(&partial, &canonical).await {
			let _ = fs::remove_file(&partial).await;
			return Err(e.into());
		}

		Ok(canonical)
	}
}

/// Read the fixed-width size and name headers
async fn read_headers(
	conn: &mut (impl AsyncRead + Unpin),
) -> Result<(u64, String), TransferError> {
	let mut size_buf = [0u8; FILE_SIZE_LENGTH];
	conn.read_exact(&mut size_buf).await?;
	let size_field = std::str::from_utf8(&size_buf)
		.map_err(|_| TransferError::BadHeader { message: "size header is not ASCII".to_string() })?;
	let size: u64 = trim_padding(size_field).parse().map_err(|_| TransferError::BadHeader {
		message: format!("bad size header: {:?}", size_field),
	})?;

	let mut name_buf = [0u8; FILE_NAME_LENGTH];
	conn.read_exact(&mut name_buf).await?;
	let name_field = std::str::from_utf8(&name_buf)
		.map_err(|_| TransferError::BadHeader { message: "name header is not ASCII".to_string() })?;

	Ok((size, trim_padding(name_field).to_string()))
}

/// Copy exactly `size` bytes into `path`. Anything short is an error and
/// the caller removes the partial file.
async fn receive_into(
	conn: &mut (impl AsyncRead + Unpin),
	path: &Path,
	size: u64,
) -> Result<(), TransferError> {
	let mut file = fs::File::create(path).await?;

	let mut buffer = [0u8; BUFFER_SIZE];
	let mut remaining = size;
	while remaining > 0 {
		let want = (remaining as usize).min(BUFFER_SIZE);
		let n = conn.read(&mut buffer[..want]).await?;
		if n == 0 {
			return Err(TransferError::Incomplete { expected: size, received: size - remaining });
		}
		file.write_all(&buffer[..n]).await?;
		remaining -= n as u64;
	}

	file.flush().await?;
	Ok(())
}

// vim: ts=4

//! Bulk-transfer framing and end-to-end tests
//!
//! Exercises the TCP listener and initiator over loopback: exact header
//! bytes, whole-file pulls through the channel pair, the zero-byte edge
//! case, and the partial-transfer cleanup invariant.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};

use sharr::{FileIndex, TransferClient, TransferServer};

// ============================================================================
// Helper Functions
// ============================================================================

fn create_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
	let path = dir.join(name);
	fs::write(&path, content).unwrap();
	path
}

/// Serve `folder` on an OS-assigned port; returns the port and the
/// shutdown handle keeping the listener alive
async fn start_server(folder: &Path) -> (u16, watch::Sender<bool>) {
	let index = Arc::new(FileIndex::new(folder.to_path_buf()));
	let server = TransferServer::bind("127.0.0.1", index).await.unwrap();

	let (port_tx, mut port_rx) = mpsc::channel(1);
	let (shutdown_tx, shutdown_rx) = watch::channel(false);
	tokio::spawn(async move { server.run(port_tx, shutdown_rx).await });

	let port = port_rx.recv().await.unwrap();
	(port, shutdown_tx)
}

/// Run an initiator downloading into `folder`; returns its input channels
fn start_client(
	folder: &Path,
	shutdown_rx: watch::Receiver<bool>,
) -> (mpsc::Sender<String>, mpsc::Sender<String>) {
	let client = TransferClient::new(folder.to_path_buf());
	let (addr_tx, addr_rx) = mpsc::channel(1);
	let (name_tx, name_rx) = mpsc::channel(1);
	tokio::spawn(async move { client.run(addr_rx, name_rx, shutdown_rx).await });
	(addr_tx, name_tx)
}

async fn wait_for_file(path: &Path) -> bool {
	for _ in 0..100 {
		if path.exists() {
			return true;
		}
		tokio::time::sleep(Duration::from_millis(50)).await;
	}
	false
}

// ============================================================================
// Framing
// ============================================================================

#[tokio::test]
async fn test_framing_exact_header_bytes() {
	let share = TempDir::new().unwrap();
	create_file(share.path(), "doc.pdf", &vec![0xAB; 1234]);

	let (port, _shutdown) = start_server(share.path()).await;

	let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
	stream.write_all(b"Get,doc.pdf\n").await.unwrap();

	let mut size_header = [0u8; 10];
	stream.read_exact(&mut size_header).await.unwrap();
	assert_eq!(&size_header, b"1234::::::");

	let mut name_header = [0u8; 64];
	stream.read_exact(&mut name_header).await.unwrap();
	let mut expected = b"doc.pdf".to_vec();
	expected.resize(64, b':');
	assert_eq!(name_header.to_vec(), expected);

	let mut payload = vec![0u8; 1234];
	stream.read_exact(&mut payload).await.unwrap();
	assert!(payload.iter().all(|b| *b == 0xAB));

	// Nothing after the payload
	let mut rest = [0u8; 1];
	assert_eq!(stream.read(&mut rest).await.unwrap(), 0);
}

#[tokio::test]
async fn test_unknown_file_closes_without_bytes() {
	let share = TempDir::new().unwrap();
	let (port, _shutdown) = start_server(share.path()).await;

	let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
	stream.write_all(b"Get,nope.bin\n").await.unwrap();

	let mut rest = [0u8; 1];
	assert_eq!(stream.read(&mut rest).await.unwrap(), 0);
}

#[tokio::test]
async fn test_traversal_request_degrades_to_not_found() {
	let share = TempDir::new().unwrap();
	let (port, _shutdown) = start_server(share.path()).await;

	let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
	stream.write_all(b"Get,../../etc/passwd\n").await.unwrap();

	let mut rest = [0u8; 1];
	assert_eq!(stream.read(&mut rest).await.unwrap(), 0);
}

// ============================================================================
// End-to-end pulls
// ============================================================================

#[tokio::test]
async fn test_end_to_end_download() {
	let share = TempDir::new().unwrap();
	let downloads = TempDir::new().unwrap();
	let content: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
	create_file(share.path(), "data.bin", &content);

	let (port, _shutdown) = start_server(share.path()).await;
	let (_tx, shutdown_rx) = watch::channel(false);
	let (addr_tx, name_tx) = start_client(downloads.path(), shutdown_rx);

	addr_tx.send(format!("127.0.0.1:{}", port)).await.unwrap();
	name_tx.send("data.bin".to_string()).await.unwrap();

	let target = downloads.path().join("data.bin");
	assert!(wait_for_file(&target).await, "download did not complete");
	assert_eq!(fs::read(&target).unwrap(), content);
	assert!(!downloads.path().join("downloading_data.bin").exists());
}

#[tokio::test]
async fn test_zero_byte_file() {
	let share = TempDir::new().unwrap();
	let downloads = TempDir::new().unwrap();
	create_file(share.path(), "empty.txt", b"");

	let (port, _shutdown) = start_server(share.path()).await;
	let (_tx, shutdown_rx) = watch::channel(false);
	let (addr_tx, name_tx) = start_client(downloads.path(), shutdown_rx);

	addr_tx.send(format!("127.0.0.1:{}", port)).await.unwrap();
	name_tx.send("empty.txt".to_string()).await.unwrap();

	let target = downloads.path().join("empty.txt");
	assert!(wait_for_file(&target).await, "download did not complete");
	assert_eq!(fs::metadata(&target).unwrap().len(), 0);
}

#[tokio::test]
async fn test_sequential_downloads_reuse_the_initiator() {
	let share = TempDir::new().unwrap();
	let downloads = TempDir::new().unwrap();
	create_file(share.path(), "one.txt", b"first");
	create_file(share.path(), "two.txt", b"second");

	let (port, _shutdown) = start_server(share.path()).await;
	let (_tx, shutdown_rx) = watch::channel(false);
	let (addr_tx, name_tx) = start_client(downloads.path(), shutdown_rx);

	let addr = format!("127.0.0.1:{}", port);

	addr_tx.send(addr.clone()).await.unwrap();
	name_tx.send("one.txt".to_string()).await.unwrap();
	assert!(wait_for_file(&downloads.path().join("one.txt")).await);

	addr_tx.send(addr).await.unwrap();
	name_tx.send("two.txt".to_string()).await.unwrap();
	assert!(wait_for_file(&downloads.path().join("two.txt")).await);

	assert_eq!(fs::read(downloads.path().join("one.txt")).unwrap(), b"first");
	assert_eq!(fs::read(downloads.path().join("two.txt")).unwrap(), b"second");
}

// ============================================================================
// Partial-transfer cleanup
// ============================================================================

#[tokio::test]
async fn test_short_stream_removes_partial_file() {
	let downloads = TempDir::new().unwrap();

	// A server that promises 1000 bytes but delivers only 100
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let port = listener.local_addr().unwrap().port();
	let served = tokio::spawn(async move {
		let (mut stream, _) = listener.accept().await.unwrap();
		let mut request = [0u8; 256];
		let _ = stream.read(&mut request).await.unwrap();

		stream.write_all(b"1000::::::").await.unwrap();
		let mut name = b"cut.bin".to_vec();
		name.resize(64, b':');
		stream.write_all(&name).await.unwrap();
		stream.write_all(&[0u8; 100]).await.unwrap();
	});

	let (_tx, shutdown_rx) = watch::channel(false);
	let (addr_tx, name_tx) = start_client(downloads.path(), shutdown_rx);

	addr_tx.send(format!("127.0.0.1:{}", port)).await.unwrap();
	name_tx.send("cut.bin".to_string()).await.unwrap();

	served.await.unwrap();
	tokio::time::sleep(Duration::from_secs(1)).await;

	assert!(!downloads.path().join("cut.bin").exists(), "canonical path must never appear");
	assert!(!downloads.path().join("downloading_cut.bin").exists(), "partial must be removed");
}

//! Concurrent cluster access
//!
//! The cluster set is the only shared mutable state crossing component
//! boundaries; these tests hammer it from many threads and verify the
//! membership invariants hold afterward: no duplicates, no empty
//! strings, never the local endpoint.

use sharr::Cluster;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

const SELF_ENDPOINT: &str = "127.0.0.1:1000";

#[test]
fn test_concurrent_adds_snapshots_and_merges() {
	let cluster = Arc::new(Cluster::new(vec!["127.0.0.1:1378".to_string()]));
	let iterations = 100;

	let mut handles = Vec::new();

	// Concurrent adds with distinct endpoints
	for i in 0..iterations {
		let cluster = Arc::clone(&cluster);
		handles.push(thread::spawn(move || {
			cluster.add(&format!("10.0.0.1:{}", 1000 + i));
		}));
	}

	// Concurrent reads
	for _ in 0..iterations {
		let cluster = Arc::clone(&cluster);
		handles.push(thread::spawn(move || {
			let _ = cluster.snapshot();
			let _ = cluster.len();
		}));
	}

	// Concurrent merges, including entries that must be skipped
	for _ in 0..iterations {
		let cluster = Arc::clone(&cluster);
		handles.push(thread::spawn(move || {
			cluster.merge(
				SELF_ENDPOINT,
				&[
					"192.168.1.1:1379".to_string(),
					String::new(),
					SELF_ENDPOINT.to_string(),
				],
			);
		}));
	}

	for handle in handles {
		handle.join().unwrap();
	}

	let members = cluster.snapshot();

	// Every distinct endpoint ever added, minus self, minus empties
	assert_eq!(members.len(), 1 + iterations + 1);

	let unique: HashSet<&String> = members.iter().collect();
	assert_eq!(unique.len(), members.len(), "set contains duplicates");
	assert!(!members.iter().any(|ep| ep.is_empty()));
	assert!(!members.iter().any(|ep| ep == SELF_ENDPOINT));
}

#[test]
fn test_concurrent_removes_do_not_corrupt() {
	let seeds: Vec<String> = (0..50).map(|i| format!("10.0.0.2:{}", 2000 + i)).collect();
	let cluster = Arc::new(Cluster::new(seeds.clone()));

	let mut handles = Vec::new();
	for seed in seeds {
		let cluster = Arc::clone(&cluster);
		handles.push(thread::spawn(move || {
			cluster.remove(&seed);
			// Removing twice is a no-op
			cluster.remove(&seed);
		}));
	}

	for handle in handles {
		handle.join().unwrap();
	}

	assert!(cluster.is_empty());
}

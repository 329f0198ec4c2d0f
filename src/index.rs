//! In-memory index of the shared folder
//!
//! Maps base filenames to their paths inside the shared folder. The index
//! is rebuilt on demand: a lookup miss triggers one directory walk and a
//! single retry, so files dropped into the folder at runtime are found
//! without a watcher.

use crate::logging::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::{fs, io};

/// Prefix given to in-progress downloads; these are never indexed, so a
/// node cannot offer a file it has not fully received yet
pub const DOWNLOADING_PREFIX: &str = "downloading_";

/// Index over a shared folder's regular files
#[derive(Debug)]
pub struct FileIndex {
	folder: PathBuf,
	map: RwLock<HashMap<String, PathBuf>>,
}

impl FileIndex {
	pub fn new(folder: PathBuf) -> Self {
		FileIndex { folder, map: RwLock::new(HashMap::new()) }
	}

	pub fn folder(&self) -> &Path {
		&self.folder
	}

	/// Path for `name` inside the shared folder.
	///
	/// Directory components are stripped from `name` first, so a
	/// traversal attempt degrades to a plain lookup miss. On a miss the
	/// index is rebuilt and the lookup retried exactly once. The hit
	/// check and the returned path come from the same map generation;
	/// a concurrent rebuild cannot split them.
	pub fn lookup(&self, name: &str) -> Option<PathBuf> {
		let base = base_name(name)?;

		if let Some(path) = self.map.read().unwrap_or_else(|e| e.into_inner()).get(&base).cloned()
		{
			return Some(path);
		}

		if let Err(e) = self.rebuild() {
			warn!("Failed to walk {}: {}", self.folder.display(), e);
			return None;
		}

		self.map.read().unwrap_or_else(|e| e.into_inner()).get(&base).cloned()
	}

	/// Does the shared folder hold `name`?
	pub fn search(&self, name: &str) -> bool {
		self.lookup(name).is_some()
	}

	/// Path for `name` as currently indexed, with the same base-name
	/// sanitization as [`lookup`](Self::lookup) but without the
	/// rebuild-on-miss
	pub fn resolve(&self, name: &str) -> Option<PathBuf> {
		let base = base_name(name)?;
		self.map.read().unwrap_or_else(|e| e.into_inner()).get(&base).cloned()
	}

	/// Walk the folder and swap in a fresh map. Regular files only;
	/// in-progress `downloading_*` artifacts are skipped.
	fn rebuild(&self) -> io::Result<()> {
		let mut map = HashMap::new();
		walk(&self.folder, &mut map)?;

		debug!("Indexed {} file(s) under {}", map.len(), self.folder.display());
		*self.map.write().unwrap_or_else(|e| e.into_inner()) = map;
		Ok(())
	}
}

fn walk(dir: &Path, map: &mut HashMap<String, PathBuf>) -> io::Result<()> {
	for entry in fs::read_dir(dir)? {
		let entry = entry?;
		let path = entry.path();
		let meta = fs::symlink_metadata(&path)?;

		if meta.is_dir() {
			walk(&path, map)?;
		} else if meta.is_file() {
			if let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) {
				if name.starts_with(DOWNLOADING_PREFIX) {
					continue;
				}
				map.insert(name, path);
			}
		}
	}
	Ok(())
}

/// Strip directory components; `None` when nothing usable remains
/// (e.g. `..` or a trailing slash)
fn base_name(name: &str) -> Option<String> {
	Path::new(name).file_name().map(|n| n.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	fn create_file(dir: &Path, name: &str, content: &[u8]) {
		let path = dir.join(name);
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).ok();
		}
		fs::write(&path, content).unwrap();
	}

	#[test]
	fn test_lookup_rebuilds_and_returns_the_path() {
		let dir = TempDir::new().unwrap();
		create_file(dir.path(), "r.pdf", b"data");

		// Cold index: the first lookup rebuilds and returns the path
		let index = FileIndex::new(dir.path().to_path_buf());
		assert_eq!(index.lookup("r.pdf"), Some(dir.path().join("r.pdf")));

		// resolve alone never rebuilds
		let cold = FileIndex::new(dir.path().to_path_buf());
		assert_eq!(cold.resolve("r.pdf"), None);
	}

	#[test]
	fn test_search_rebuilds_on_miss() {
		let dir = TempDir::new().unwrap();
		let index = FileIndex::new(dir.path().to_path_buf());

		assert!(!index.search("r.pdf"));

		create_file(dir.path(), "r.pdf", b"data");
		assert!(index.search("r.pdf"));
	}

	#[test]
	fn test_search_finds_nested_files_by_base_name() {
		let dir = TempDir::new().unwrap();
		create_file(dir.path(), "sub/inner.txt", b"data");

		let index = FileIndex::new(dir.path().to_path_buf());
		assert!(index.search("inner.txt"));
		assert_eq!(index.resolve("inner.txt"), Some(dir.path().join("sub/inner.txt")));
	}

	#[test]
	fn test_traversal_is_stripped_to_base() {
		let dir = TempDir::new().unwrap();
		create_file(dir.path(), "safe.txt", b"data");

		let index = FileIndex::new(dir.path().to_path_buf());
		assert!(index.search("../../etc/safe.txt"));
		assert_eq!(index.resolve("../../etc/safe.txt"), Some(dir.path().join("safe.txt")));

		// A name with no usable base is a plain miss
		assert!(!index.search(".."));
	}

	#[test]
	fn test_partial_downloads_are_not_offered() {
		let dir = TempDir::new().unwrap();
		create_file(dir.path(), "downloading_big.bin", b"partial");

		let index = FileIndex::new(dir.path().to_path_buf());
		assert!(!index.search("downloading_big.bin"));
	}

	#[test]
	fn test_directories_are_not_indexed() {
		let dir = TempDir::new().unwrap();
		fs::create_dir(dir.path().join("subdir")).unwrap();

		let index = FileIndex::new(dir.path().to_path_buf());
		assert!(!index.search("subdir"));
	}
}

// vim: ts=4

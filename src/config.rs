//! Node configuration
//!
//! The configuration follows a priority chain:
//! 1. Built-in defaults (Config::default())
//! 2. Config file (./sharr.toml, or an explicit path)
//! 3. Environment variables (SHARR_* prefix)

use crate::error::NodeError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use std::{env, fs};

/////////////////////////
// Protocol constants  //
/////////////////////////

/// Copy buffer size for bulk-transfer streaming
pub const BUFFER_SIZE: usize = 1024;

/// Receive buffer for control-plane datagrams; larger frames are
/// truncated by the OS and end up rejected by the codec
pub const UDP_BUFFER_SIZE: usize = 2048;

/// Fixed width of the decimal size header in the transfer framing
pub const FILE_SIZE_LENGTH: usize = 10;

/// Fixed width of the file name header in the transfer framing
pub const FILE_NAME_LENGTH: usize = 64;

/// Padding byte used to right-fill the fixed-width headers
pub const HEADER_PADDING: u8 = b':';

/// How long a responder that has never answered us before defers its
/// File offer, letting previously seen responders win the race
pub const NON_PRIORITY_DELAY: Duration = Duration::from_secs(10);

/// Connection timeout for dialing a responder's bulk-transfer port
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(10);

///////////////////
// Configuration //
///////////////////

/// Runtime configuration for a node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	/// Listen address for both the control plane and the bulk listener
	pub host: String,

	/// Control-plane UDP port
	pub port: u16,

	/// Gossip ticker period in seconds
	pub period: u64,

	/// File-request wait window in seconds
	pub waiting: u64,

	/// Transfer method: 1 = TCP, 2 = reliable UDP
	#[serde(rename = "type")]
	pub method: u8,
}

impl Default for Config {
	fn default() -> Self {
		Config { host: "127.0.0.1".to_string(), port: 1378, period: 2, waiting: 5, method: 1 }
	}
}

impl Config {
	/// Load configuration through the full priority chain.
	///
	/// A missing config file falls back to defaults silently; a file that
	/// exists but does not parse is an error.
	pub fn load(path: Option<&Path>) -> Result<Config, NodeError> {
		let path = path.unwrap_or_else(|| Path::new("sharr.toml"));

		let mut config = if path.exists() {
			let contents = fs::read_to_string(path)?;
			toml::from_str(&contents).map_err(|e| NodeError::InvalidConfig {
				message: format!("{}: {}", path.display(), e),
			})?
		} else {
			Config::default()
		};

		config.apply_env()?;
		config.validate()?;
		Ok(config)
	}

	/// Override fields from SHARR_* environment variables
	fn apply_env(&mut self) -> Result<(), NodeError> {
		if let Ok(host) = env::var("SHARR_HOST") {
			self.host = host;
		}
		if let Ok(port) = env::var("SHARR_PORT") {
			self.port = port
				.parse()
				.map_err(|_| NodeError::InvalidConfig { message: format!("port: {}", port) })?;
		}
		if let Ok(period) = env::var("SHARR_PERIOD") {
			self.period = period
				.parse()
				.map_err(|_| NodeError::InvalidConfig { message: format!("period: {}", period) })?;
		}
		if let Ok(waiting) = env::var("SHARR_WAITING") {
			self.waiting = waiting.parse().map_err(|_| NodeError::InvalidConfig {
				message: format!("waiting: {}", waiting),
			})?;
		}
		if let Ok(method) = env::var("SHARR_TYPE") {
			self.method = method
				.parse()
				.map_err(|_| NodeError::InvalidConfig { message: format!("type: {}", method) })?;
		}
		Ok(())
	}

	fn validate(&self) -> Result<(), NodeError> {
		if self.host.is_empty() {
			return Err(NodeError::InvalidConfig { message: "host must not be empty".to_string() });
		}
		if self.period == 0 {
			return Err(NodeError::InvalidConfig { message: "period must be >= 1".to_string() });
		}
		if self.waiting == 0 {
			return Err(NodeError::InvalidConfig { message: "waiting must be >= 1".to_string() });
		}
		if self.method != 1 && self.method != 2 {
			return Err(NodeError::InvalidConfig {
				message: format!("type must be 1 (TCP) or 2 (reliable UDP), got {}", self.method),
			});
		}
		Ok(())
	}

	/// The node's own control-plane endpoint, excluded from the cluster set
	pub fn self_endpoint(&self) -> String {
		format!("{}:{}", self.host, self.port)
	}

	/// Gossip ticker period
	pub fn discovery_period(&self) -> Duration {
		Duration::from_secs(self.period)
	}

	/// File-request wait window
	pub fn waiting_duration(&self) -> Duration {
		Duration::from_secs(self.waiting)
	}
}


// vim: ts=4

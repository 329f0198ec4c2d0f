//! Error types for node operations

use std::error::Error;
use std::fmt;
use std::io;

/// Main error type for node operations
///
/// This is the unified error type that encompasses everything a running
/// node can fail with. It contains direct variants for common errors and
/// nested variants for the codec and transfer domains.
#[derive(Debug)]
pub enum NodeError {
	/// Failed to bind a listening socket at startup
	Bind { addr: String, source: io::Error },

	/// The bulk-transfer listener never published its port
	PortUnavailable,

	/// I/O error
	Io(io::Error),

	/// Invalid configuration
	InvalidConfig { message: String },

	/// Message codec error (nested)
	Message(MessageError),

	/// Bulk-transfer error (nested)
	Transfer(TransferError),
}

impl fmt::Display for NodeError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			NodeError::Bind { addr, source } => {
				write!(f, "Failed to bind {}: {}", addr, source)
			}
			NodeError::PortUnavailable => {
				write!(f, "Bulk-transfer listener closed before publishing its port")
			}
			NodeError::Io(e) => write!(f, "I/O error: {}", e),
			NodeError::InvalidConfig { message } => {
				write!(f, "Invalid configuration: {}", message)
			}
			NodeError::Message(e) => write!(f, "Message error: {}", e),
			NodeError::Transfer(e) => write!(f, "Transfer error: {}", e),
		}
	}
}

impl Error for NodeError {}

impl From<io::Error> for NodeError {
	fn from(e: io::Error) -> Self {
		NodeError::Io(e)
	}
}

impl From<MessageError> for NodeError {
	fn from(e: MessageError) -> Self {
		NodeError::Message(e)
	}
}

impl From<TransferError> for NodeError {
	fn from(e: TransferError) -> Self {
		NodeError::Transfer(e)
	}
}

/// Control-plane codec errors
#[derive(Debug, PartialEq, Eq)]
pub enum MessageError {
	/// Frame decodes to too few fields for its tag
	Malformed { message: String },

	/// Unrecognized message tag
	Unknown { tag: String },

	/// Transfer method field is not a known method number
	InvalidMethod { value: String },

	/// Port field is not a decimal in 1..=65535
	InvalidPort { value: String },
}

impl fmt::Display for MessageError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			MessageError::Malformed { message } => write!(f, "Malformed message: {}", message),
			MessageError::Unknown { tag } => write!(f, "Unknown message type: {}", tag),
			MessageError::InvalidMethod { value } => {
				write!(f, "Invalid transfer method: {}", value)
			}
			MessageError::InvalidPort { value } => write!(f, "Invalid port number: {}", value),
		}
	}
}

impl Error for MessageError {}

/// Bulk-transfer errors
#[derive(Debug)]
pub enum TransferError {
	/// Dial to the responder failed or timed out
	ConnectFailed { addr: String, source: Box<dyn Error + Send + Sync> },

	/// A fixed-width header failed to parse
	BadHeader { message: String },

	/// The stream ended before `size` bytes arrived
	Incomplete { expected: u64, received: u64 },

	/// The peer sent something other than a Get request
	UnexpectedMessage,

	/// I/O error during framing or copy
	Io(io::Error),
}

impl fmt::Display for TransferError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TransferError::ConnectFailed { addr, source } => {
				write!(f, "Failed to connect to {}: {}", addr, source)
			}
			TransferError::BadHeader { message } => write!(f, "Bad transfer header: {}", message),
			TransferError::Incomplete { expected, received } => {
				write!(f, "Transfer incomplete: expected {} bytes, got {}", expected, received)
			}
			TransferError::UnexpectedMessage => {
				write!(f, "Expected a Get request, got something else")
			}
			TransferError::Io(e) => write!(f, "I/O error: {}", e),
		}
	}
}

impl Error for TransferError {}

impl From<io::Error> for TransferError {
	fn from(e: io::Error) -> Self {
		TransferError::Io(e)
	}
}

// vim: ts=4

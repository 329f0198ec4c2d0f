//! Control-plane message codec
//!
//! One message per line: comma-separated ASCII fields with a newline
//! terminator. The protocol is a closed sum over Discover, Get and File;
//! anything else on the wire is rejected at decode.

use crate::error::MessageError;
use std::fmt;

/// Membership gossip tag
pub const MSG_DISCOVER: &str = "DISCOVER";

/// File-location request tag
pub const MSG_GET: &str = "Get";

/// File-location answer tag
pub const MSG_FILE: &str = "File";

/// Bulk-transfer method advertised in a File answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
	Tcp,
	ReliableUdp,
}

impl Method {
	/// Wire representation (`1` or `2`)
	pub fn as_number(self) -> u8 {
		match self {
			Method::Tcp => 1,
			Method::ReliableUdp => 2,
		}
	}

	pub fn from_number(n: u8) -> Option<Method> {
		match n {
			1 => Some(Method::Tcp),
			2 => Some(Method::ReliableUdp),
			_ => None,
		}
	}
}

impl fmt::Display for Method {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.as_number())
	}
}

/// A decoded control-plane frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
	/// Membership gossip carrying a snapshot of the sender's cluster
	Discover { list: Vec<String> },

	/// "Who has file <name>?"; also doubles as the bulk-transfer request
	Get { name: String },

	/// "I have it; connect to me at <port> using <method>."
	File { method: Method, port: u16 },
}

impl Message {
	/// Encode to the wire form, newline terminator included
	pub fn encode(&self) -> String {
		match self {
			Message::Discover { list } => format!("{},{}\n", MSG_DISCOVER, list.join(",")),
			Message::Get { name } => format!("{},{}\n", MSG_GET, name),
			Message::File { method, port } => format!("{},{},{}\n", MSG_FILE, method, port),
		}
	}

	/// Decode one frame.
	///
	/// Trailing whitespace is trimmed and only the first line is
	/// considered. Extra fields are part of the endpoint list for
	/// Discover and ignored for Get/File. Empty endpoints inside a
	/// Discover list are dropped, so `decode(encode(m)) == m` holds
	/// for every well-formed message.
	pub fn decode(s: &str) -> Result<Message, MessageError> {
		let s = s.trim_end();
		if s.is_empty() {
			return Err(MessageError::Malformed { message: "empty frame".to_string() });
		}

		let line = s.split('\n').next().unwrap_or("");
		let parts: Vec<&str> = line.split(',').collect();

		match parts[0] {
			MSG_DISCOVER => {
				let list = parts[1..]
					.iter()
					.filter(|ep| !ep.is_empty())
					.map(|ep| ep.to_string())
					.collect();
				Ok(Message::Discover { list })
			}

			MSG_GET => {
				if parts.len() < 2 || parts[1].is_empty() {
					return Err(MessageError::Malformed {
						message: "Get message requires a file name".to_string(),
					});
				}
				Ok(Message::Get { name: parts[1].to_string() })
			}

			MSG_FILE => {
				if parts.len() < 3 {
					return Err(MessageError::Malformed {
						message: "File message requires method and port".to_string(),
					});
				}

				let method = parts[1]
					.parse::<u8>()
					.ok()
					.and_then(Method::from_number)
					.ok_or_else(|| MessageError::InvalidMethod { value: parts[1].to_string() })?;

				let port = match parts[2].parse::<u16>() {
					Ok(p) if p > 0 => p,
					_ => return Err(MessageError::InvalidPort { value: parts[2].to_string() }),
				};

				Ok(Message::File { method, port })
			}

			tag => Err(MessageError::Unknown { tag: tag.to_string() }),
		}
	}
}


// vim: ts=4

// Networking for two-device MoBoggle games
// Connection plumbing, the handshake, and the player event wire protocol

pub mod connection;
pub mod error;
pub mod handshake;
pub mod identity;
pub mod protocol;
pub mod wire;

pub use connection::{memory_pair, GameConnection, MemoryConnection, ServerCancel, TcpConnection, TcpServer};
pub use error::ProtocolError;
pub use handshake::{handshake, HandshakeError, HandshakeResult, LocalIdentity, Role};
pub use identity::DeviceIdentity;
pub use protocol::{read_event, write_event, ExitReason, PlayerEvent};

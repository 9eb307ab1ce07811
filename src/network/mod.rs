//! Peer-to-peer networking
//!
//! The request/response wire format, the TCP server, outbound broadcasting and the node
//! facade that answers requests.

pub mod broadcast;
pub mod node;
pub mod package;
pub mod server;

pub use broadcast::{BroadcastReport, Broadcaster, NoopBroadcaster, TcpBroadcaster};
pub use node::Node;
pub use package::{Package, Response};
pub use server::{send_request, Server};

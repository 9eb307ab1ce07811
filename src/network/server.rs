use crate::error::{BlockchainError, Result};
use crate::network::{Node, Package, Response};
use log::{debug, error, info};
use serde_json::Deserializer;
use std::io::{BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const TCP_WRITE_TIMEOUT: u64 = 5000;
const TCP_READ_TIMEOUT: u64 = 60_000;

/// TCP front end of a node: one JSON `Package` in, one JSON `Response` out per connection
pub struct Server {
    node: Arc<Node>,
}

impl Server {
    pub fn new(node: Arc<Node>) -> Self {
        Self { node }
    }

    /// Bind `addr` and serve until the listener fails
    pub fn run(&self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .map_err(|e| BlockchainError::Network(format!("Failed to bind to {addr}: {e}")))?;
        info!("Server listening on {addr}");
        self.serve(listener);
        Ok(())
    }

    /// Accept connections on an already bound listener, one thread each
    pub fn serve(&self, listener: TcpListener) {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let peer_addr = match stream.peer_addr() {
                        Ok(addr) => addr,
                        Err(e) => {
                            error!("Failed to get peer address: {e}");
                            continue;
                        }
                    };
                    let node = Arc::clone(&self.node);
                    thread::spawn(move || {
                        if let Err(e) = Self::handle_connection(&node, stream, peer_addr) {
                            error!("Error handling connection from {peer_addr}: {e}");
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {e}");
                }
            }
        }
    }

    fn handle_connection(node: &Node, stream: TcpStream, peer_addr: SocketAddr) -> Result<()> {
        stream
            .set_read_timeout(Some(Duration::from_millis(TCP_READ_TIMEOUT)))
            .map_err(|e| BlockchainError::Network(format!("Failed to set read timeout: {e}")))?;
        stream
            .set_write_timeout(Some(Duration::from_millis(TCP_WRITE_TIMEOUT)))
            .map_err(|e| BlockchainError::Network(format!("Failed to set write timeout: {e}")))?;

        let reader = BufReader::new(&stream);
        let package = match Deserializer::from_reader(reader).into_iter::<Package>().next() {
            Some(package) => package.map_err(|e| {
                BlockchainError::Network(format!("Failed to deserialize package: {e}"))
            })?,
            None => {
                debug!("Connection from {peer_addr} closed without a request");
                return Ok(());
            }
        };
        debug!("Received request from {peer_addr}: {package:?}");

        let response = node.handle(package);
        let mut writer = &stream;
        serde_json::to_writer(&mut writer, &response)
            .map_err(|e| BlockchainError::Network(format!("Failed to send response: {e}")))?;
        writer.flush()?;
        let _ = stream.shutdown(Shutdown::Write);
        Ok(())
    }
}

/// Send one package to `addr` and wait for its response
pub fn send_request(addr: &str, package: &Package) -> Result<Response> {
    let socket_addr = addr
        .to_socket_addrs()
        .map_err(|e| BlockchainError::Network(format!("Invalid address {addr}: {e}")))?
        .next()
        .ok_or_else(|| BlockchainError::Network(format!("Address {addr} did not resolve")))?;

    let stream = TcpStream::connect_timeout(&socket_addr, Duration::from_millis(TCP_WRITE_TIMEOUT))
        .map_err(|e| BlockchainError::Network(format!("Failed to connect to {addr}: {e}")))?;
    stream
        .set_write_timeout(Some(Duration::from_millis(TCP_WRITE_TIMEOUT)))
        .map_err(|e| BlockchainError::Network(format!("Failed to set write timeout: {e}")))?;
    stream
        .set_read_timeout(Some(Duration::from_millis(TCP_READ_TIMEOUT)))
        .map_err(|e| BlockchainError::Network(format!("Failed to set read timeout: {e}")))?;

    let mut writer = &stream;
    serde_json::to_writer(&mut writer, package)
        .map_err(|e| BlockchainError::Network(format!("Failed to send data: {e}")))?;
    writer.flush()?;
    stream
        .shutdown(Shutdown::Write)
        .map_err(|e| BlockchainError::Network(format!("Failed to finish request: {e}")))?;

    serde_json::from_reader(BufReader::new(&stream))
        .map_err(|e| BlockchainError::Network(format!("Failed to read response from {addr}: {e}")))
}

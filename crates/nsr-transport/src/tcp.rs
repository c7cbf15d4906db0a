//! TCP transport implementation.
//!
//! Clients connect over TCP and exchange length-prefixed MessagePack frames
//! (see [`nsr_protocol::codec`]). Each `request` frame is routed to the
//! matching endpoint; its reply is written back on the same connection with
//! the request ID echoed.

use async_trait::async_trait;
use bytes::BytesMut;
use nsr_protocol::codec::{self, MAX_FRAME_SIZE};
use nsr_protocol::{Frame, Message, Reply};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::registry::{EndpointRegistry, DEFAULT_ENDPOINT_CAPACITY};
use crate::traits::{Endpoint, Inbound, Responder, Transport, TransportError};

/// Error code sent when a request cannot be routed to any endpoint.
pub const UNROUTABLE_CODE: &str = "503";

/// Error code sent when a reply cannot be encoded.
pub const ENCODE_FAILED_CODE: &str = "500";

/// TCP transport configuration.
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum accepted frame size in bytes.
    pub max_frame_size: usize,
    /// Requests buffered per endpoint before readers are back-pressured.
    pub endpoint_capacity: usize,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 4222)),
            max_frame_size: 1024 * 1024, // 1 MiB
            endpoint_capacity: DEFAULT_ENDPOINT_CAPACITY,
        }
    }
}

/// TCP transport.
pub struct TcpTransport {
    registry: Arc<EndpointRegistry>,
    local_addr: SocketAddr,
    connected: AtomicBool,
    shutdown: watch::Sender<bool>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl TcpTransport {
    /// Bind the listener and start accepting client connections.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address fails.
    pub async fn bind(config: TcpConfig) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        let registry = EndpointRegistry::new(config.endpoint_capacity);
        let (shutdown, shutdown_rx) = watch::channel(false);

        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&registry),
            shutdown_rx,
            config.max_frame_size,
        ));

        info!("TCP transport listening on {}", local_addr);

        Ok(Self {
            registry,
            local_addr,
            connected: AtomicBool::new(true),
            shutdown,
            accept_task: Mutex::new(Some(accept_task)),
        })
    }

    /// Get the local address this transport is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn add_endpoint(&self, subject: &str) -> Result<Box<dyn Endpoint>, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let endpoint = self.registry.register(subject)?;
        Ok(Box::new(endpoint))
    }

    async fn drain(&self) -> Result<(), TransportError> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        self.registry.close();
        let _ = self.shutdown.send(true);

        if let Some(task) = self.accept_task.lock().await.take() {
            task.await
                .map_err(|e| TransportError::Other(format!("Accept loop failed: {}", e)))?;
        }

        info!("TCP transport drained");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "tcp"
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

async fn accept_loop(
    listener: TcpListener,
    registry: Arc<EndpointRegistry>,
    mut shutdown: watch::Receiver<bool>,
    max_frame_size: usize,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,

            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    debug!("Accepted TCP connection from {}", addr);
                    connections.spawn(handle_connection(
                        stream,
                        addr,
                        Arc::clone(&registry),
                        shutdown.clone(),
                        max_frame_size,
                    ));
                }
                Err(e) => warn!(error = %e, "Accept failed"),
            },

            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    drop(listener);
    while connections.join_next().await.is_some() {}
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    registry: Arc<EndpointRegistry>,
    mut shutdown: watch::Receiver<bool>,
    max_frame_size: usize,
) {
    let (mut reader, writer) = stream.into_split();
    let (tx, rx) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(write_frames(writer, rx));
    let mut read_buffer = BytesMut::with_capacity(4096);

    'conn: loop {
        tokio::select! {
            _ = shutdown.changed() => break,

            read = reader.read_buf(&mut read_buffer) => match read {
                Ok(0) => {
                    debug!("Connection from {} closed", addr);
                    break;
                }
                Ok(_) => loop {
                    match codec::decode_from(&mut read_buffer, max_frame_size) {
                        Ok(Some(frame)) => handle_frame(frame, &registry, &tx).await,
                        Ok(None) => break,
                        Err(e) => {
                            warn!(peer = %addr, error = %e, "Protocol error, closing connection");
                            break 'conn;
                        }
                    }
                },
                Err(e) => {
                    warn!(peer = %addr, error = %e, "Read failed");
                    break;
                }
            }
        }
    }

    // Pending responders keep their own sender; the writer exits once the
    // last of them has replied or been dropped.
    drop(tx);
    let _ = writer_task.await;
}

async fn handle_frame(
    frame: Frame,
    registry: &EndpointRegistry,
    tx: &mpsc::UnboundedSender<Frame>,
) {
    match frame {
        Frame::Ping => {
            let _ = tx.send(Frame::Pong);
        }
        request @ Frame::Request { .. } => {
            let Some((id, message)) = request.into_request() else {
                return;
            };
            let responder = TcpResponder {
                id,
                sender: tx.clone(),
            };
            if let Err(e) = registry.route(Inbound::new(message, responder)).await {
                debug!(request = id, error = %e, "Request not routed");
                let _ = tx.send(Frame::reply(id, Reply::error(UNROUTABLE_CODE, e.to_string())));
            }
        }
        other => warn!(frame = ?other, "Unexpected frame from client"),
    }
}

async fn write_frames(mut writer: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<Frame>) {
    let mut buf = BytesMut::with_capacity(4096);

    while let Some(frame) = rx.recv().await {
        buf.clear();
        if let Err(e) = codec::encode_into(&frame, &mut buf) {
            warn!(error = %e, "Failed to encode frame");
            let Frame::Reply { id, .. } = frame else {
                continue;
            };
            let fallback = Frame::reply(id, Reply::error(ENCODE_FAILED_CODE, e.to_string()));
            if codec::encode_into(&fallback, &mut buf).is_err() {
                continue;
            }
        }
        if let Err(e) = writer.write_all(&buf).await {
            debug!(error = %e, "Write failed");
            break;
        }
    }

    let _ = writer.shutdown().await;
}

/// Writes the reply frame for one request back to its connection.
struct TcpResponder {
    id: u64,
    sender: mpsc::UnboundedSender<Frame>,
}

#[async_trait]
impl Responder for TcpResponder {
    async fn respond(&self, reply: Reply) -> Result<(), TransportError> {
        self.sender
            .send(Frame::reply(self.id, reply))
            .map_err(|_| TransportError::ConnectionClosed)
    }
}

/// Minimal client speaking the TCP frame protocol.
///
/// Requests are issued one at a time on a single connection.
pub struct TcpClient {
    stream: TcpStream,
    read_buffer: BytesMut,
    next_id: u64,
}

impl TcpClient {
    /// Connect to a TCP transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            read_buffer: BytesMut::with_capacity(4096),
            next_id: 0,
        })
    }

    /// Send a request and wait for its reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or the reply cannot be decoded.
    pub async fn request(&mut self, message: Message) -> Result<Reply, TransportError> {
        self.next_id += 1;
        let id = self.next_id;
        self.send(&Frame::from_message(id, message)).await?;

        loop {
            match self.next_frame().await?.into_reply() {
                Some((reply_id, reply)) if reply_id == id => return Ok(reply),
                _ => continue,
            }
        }
    }

    /// Measure a ping/pong round trip.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn ping(&mut self) -> Result<Duration, TransportError> {
        let start = Instant::now();
        self.send(&Frame::Ping).await?;
        loop {
            if let Frame::Pong = self.next_frame().await? {
                return Ok(start.elapsed());
            }
        }
    }

    async fn send(&mut self, frame: &Frame) -> Result<(), TransportError> {
        let data = codec::encode(frame)?;
        self.stream.write_all(&data).await?;
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Frame, TransportError> {
        loop {
            if let Some(frame) = codec::decode_from(&mut self.read_buffer, MAX_FRAME_SIZE)? {
                return Ok(frame);
            }
            if self.stream.read_buf(&mut self.read_buffer).await? == 0 {
                return Err(TransportError::ConnectionClosed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsr_protocol::Headers;

    fn local_config() -> TcpConfig {
        TcpConfig {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            ..Default::default()
        }
    }

    #[test]
    fn test_tcp_config_default() {
        let config = TcpConfig::default();
        assert_eq!(config.bind_addr.port(), 4222);
        assert_eq!(config.max_frame_size, 1024 * 1024);
    }

    #[tokio::test]
    async fn test_request_reply_over_tcp() {
        let transport = TcpTransport::bind(local_config()).await.unwrap();
        let mut endpoint = transport.add_endpoint("svc.>").await.unwrap();

        let server = tokio::spawn(async move {
            let inbound = endpoint.recv().await.unwrap();
            let mut headers = Headers::new();
            headers.append("subject", inbound.message.subject.clone());
            let body = inbound.message.payload.clone();
            inbound.respond(Reply::success(headers, body)).await.unwrap();
        });

        let mut client = TcpClient::connect(transport.local_addr()).await.unwrap();
        let reply = client
            .request(Message::new("svc.echo", b"hello".to_vec()))
            .await
            .unwrap();

        match reply {
            Reply::Success { headers, body } => {
                assert_eq!(&body[..], b"hello");
                assert_eq!(headers.get("subject"), Some("svc.echo"));
            }
            other => panic!("expected success, got {:?}", other),
        }
        server.await.unwrap();
        transport.drain().await.unwrap();
    }

    #[tokio::test]
    async fn test_unroutable_request_gets_error_reply() {
        let transport = TcpTransport::bind(local_config()).await.unwrap();
        let mut client = TcpClient::connect(transport.local_addr()).await.unwrap();

        let reply = client
            .request(Message::new("nobody.home", Vec::new()))
            .await
            .unwrap();
        assert_eq!(reply.error_code(), Some(UNROUTABLE_CODE));
        transport.drain().await.unwrap();
    }

    #[tokio::test]
    async fn test_ping() {
        let transport = TcpTransport::bind(local_config()).await.unwrap();
        let mut client = TcpClient::connect(transport.local_addr()).await.unwrap();
        assert!(client.ping().await.is_ok());
        transport.drain().await.unwrap();
    }

    #[tokio::test]
    async fn test_drain_closes_client_connections() {
        let transport = TcpTransport::bind(local_config()).await.unwrap();
        let mut client = TcpClient::connect(transport.local_addr()).await.unwrap();
        assert!(client.ping().await.is_ok());

        transport.drain().await.unwrap();
        assert!(!transport.is_connected());
        assert!(transport.add_endpoint("svc.>").await.is_err());
        assert!(client.ping().await.is_err());
    }
}

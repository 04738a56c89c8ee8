//! HTTP transport for boardfeed

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};
use boardfeed_protocol::{HttpResponse, ProtocolError, RequestParser};

use crate::error::TransportError;
use crate::handler::RequestHandler;

/// Time a client gets to send its request head
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP polling server
pub struct HttpServer {
    handler: Arc<RequestHandler>,
    addr: SocketAddr,
    read_timeout: Duration,
    client_counter: AtomicU64,
}

impl HttpServer {
    pub fn new(handler: Arc<RequestHandler>, addr: SocketAddr) -> Self {
        Self {
            handler,
            addr,
            read_timeout: DEFAULT_READ_TIMEOUT,
            client_counter: AtomicU64::new(0),
        }
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Bind and serve until the task is dropped
    pub async fn run(&self) -> Result<(), TransportError> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<(), TransportError> {
        info!(addr = %listener.local_addr()?, "boardfeed HTTP server listening");

        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    let client_id = format!(
                        "http:{}:{}",
                        peer_addr,
                        self.client_counter.fetch_add(1, Ordering::Relaxed)
                    );
                    let handler = self.handler.clone();
                    let read_timeout = self.read_timeout;

                    #[cfg(feature = "metrics")]
                    if let Some(metrics) = handler.metrics() {
                        metrics.connections_total.inc();
                    }

                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_connection(stream, &client_id, handler, read_timeout).await {
                            debug!(client = %client_id, error = %e, "Connection error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    async fn handle_connection(
        mut stream: TcpStream,
        client_id: &str,
        handler: Arc<RequestHandler>,
        read_timeout: Duration,
    ) -> Result<(), TransportError> {
        let response = match tokio::time::timeout(read_timeout, Self::read_request(&mut stream)).await {
            Ok(Ok(Some(request))) => handler.handle(&request).await,
            Ok(Ok(None)) => {
                debug!(client = %client_id, "Client closed before sending a request");
                return Ok(());
            }
            Ok(Err(RequestFailure::Protocol(e))) => {
                warn!(client = %client_id, error = %e, "Rejected request");
                HttpResponse::from_error(&e)
            }
            Ok(Err(RequestFailure::Io(e))) => return Err(e.into()),
            Err(_) => {
                debug!(client = %client_id, "Timed out waiting for request");
                HttpResponse::error(408, "request timed out")
            }
        };

        stream.write_all(&response.encode()).await?;
        stream.shutdown().await?;
        Ok(())
    }

    async fn read_request(stream: &mut TcpStream) -> Result<Option<boardfeed_protocol::Request>, RequestFailure> {
        let mut parser = RequestParser::new();
        let mut buf = [0u8; 2048];

        loop {
            let n = stream.read(&mut buf).await.map_err(RequestFailure::Io)?;
            if n == 0 {
                return Ok(None);
            }

            parser.feed(&buf[..n]).map_err(RequestFailure::Protocol)?;
            if let Some(request) = parser.parse().map_err(RequestFailure::Protocol)? {
                return Ok(Some(request));
            }
        }
    }
}

enum RequestFailure {
    Protocol(ProtocolError),
    Io(std::io::Error),
}

// Copyright 2015-2021 Swim Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::connection::{self, ConnectionHandler};
use crate::errors::Error;
use crate::WebSocketStream;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: IpAddr,
    pub port: u16,
    /// Accept upgrade requests whose `Connection` header deviates from the
    /// RFC as long as the WebSocket key headers are present. Several
    /// browsers have shipped such requests.
    pub allow_clients_missing_connection_headers: bool,
    /// Frames advertising a longer payload are refused before the payload
    /// is read.
    pub max_payload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 80,
            allow_clients_missing_connection_headers: true,
            max_payload_bytes: i32::MAX as usize,
        }
    }
}

/// Runs the WebSocket session for one already-accepted stream. This is the
/// entry point for applications that bring their own listener.
pub async fn serve_connection<S, H>(
    stream: S,
    config: ServerConfig,
    handler: Arc<H>,
) -> Result<(), Error>
where
    S: WebSocketStream + Send + 'static,
    H: ConnectionHandler,
{
    connection::run(stream, config, handler.as_ref()).await
}

struct Listening {
    local_addr: SocketAddr,
    handle: JoinHandle<()>,
}

/// Binds a listener and spawns one task per accepted connection. `start`
/// is idempotent while stopped and a no-op while running; `stop` is
/// null-safe either way.
pub struct WebSocketServer<H> {
    config: ServerConfig,
    handler: Arc<H>,
    listening: Option<Listening>,
}

impl<H> WebSocketServer<H>
where
    H: ConnectionHandler,
{
    pub fn new(config: ServerConfig, handler: H) -> WebSocketServer<H> {
        WebSocketServer {
            config,
            handler: Arc::new(handler),
            listening: None,
        }
    }

    pub async fn start(&mut self) -> Result<(), Error> {
        if self.listening.is_some() {
            return Ok(());
        }

        let addr = SocketAddr::new(self.config.bind_address, self.config.port);
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        debug!(%local_addr, "listening for websocket connections");

        let config = self.config.clone();
        let handler = self.handler.clone();
        let handle = tokio::spawn(accept_loop(listener, config, handler));

        self.listening = Some(Listening { local_addr, handle });
        Ok(())
    }

    pub async fn stop(&mut self) {
        if let Some(listening) = self.listening.take() {
            debug!(local_addr = %listening.local_addr, "stopping websocket listener");
            listening.handle.abort();
            let _ = listening.handle.await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.listening.is_some()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listening.as_ref().map(|l| l.local_addr)
    }
}

async fn accept_loop<H>(listener: TcpListener, config: ServerConfig, handler: Arc<H>)
where
    H: ConnectionHandler,
{
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!(%peer, "accepted connection");
                let config = config.clone();
                let handler = handler.clone();
                tokio::spawn(async move {
                    // Session errors are logged where they arise; a failed
                    // connection never disturbs its siblings.
                    let _ = connection::run(stream, config, handler.as_ref()).await;
                    debug!(%peer, "connection closed");
                });
            }
            Err(e) => {
                error!(error = %e, "failed to accept connection");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    struct NoopHandler;

    impl ConnectionHandler for NoopHandler {}

    fn local_config() -> ServerConfig {
        ServerConfig {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            ..ServerConfig::default()
        }
    }

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.port, 80);
        assert!(config.allow_clients_missing_connection_headers);
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_is_null_safe() {
        let mut server = WebSocketServer::new(local_config(), NoopHandler);
        assert!(!server.is_running());
        server.stop().await;

        server.start().await.unwrap();
        assert!(server.is_running());
        let addr = server.local_addr().unwrap();

        server.start().await.unwrap();
        assert_eq!(server.local_addr(), Some(addr));

        server.stop().await;
        assert!(!server.is_running());
        assert_eq!(server.local_addr(), None);
        server.stop().await;
    }

    #[tokio::test]
    async fn upgrades_a_tcp_client() {
        let mut server = WebSocketServer::new(local_config(), NoopHandler);
        server.start().await.unwrap();
        let addr = server.local_addr().unwrap();

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(
                b"GET / HTTP/1.1\r\n\
Host: localhost\r\n\
Upgrade: websocket\r\n\
Connection: Upgrade\r\n\
Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
Sec-WebSocket-Version: 13\r\n\
\r\n",
            )
            .await
            .unwrap();

        let mut response = [0u8; 32];
        client.read_exact(&mut response).await.unwrap();
        assert!(response.starts_with(b"HTTP/1.1 101 Switching Protocols"));

        server.stop().await;
    }
}

use super::wire;
use crate::access::{AccessBackend, AccessUsage, NullTracker, ResponseCode, Tracker};
use crate::config::Config;
use crate::session::{SessionManager, SessionManagerConfig, SuppressedBy};
use crate::stream::framing::{FramedStream, FramingKind};
use crate::stream::{ClientStream, ReuseSink};
use crate::utils::error::SessionError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

/// Ties the session core to a TCP accept loop: parses a Hello off each new
/// socket, admits (or rejects) the session, and writes the corresponding
/// response. A successfully admitted connection whose stream supports reuse
/// is handed back to this server, which parses a follow-on Hello on it.
pub struct Server {
    config: Arc<Config>,
    session_manager: Arc<SessionManager>,
}

impl Server {
    pub fn new(config: Config, backend: Arc<dyn AccessBackend>) -> Self {
        Self::with_tracker(config, backend, Arc::new(NullTracker))
    }

    pub fn with_tracker(
        config: Config,
        backend: Arc<dyn AccessBackend>,
        tracker: Arc<dyn Tracker>,
    ) -> Self {
        let manager_config = SessionManagerConfig {
            session_timeout: Duration::from_secs(config.session.session_timeout_seconds),
            reap_interval: Duration::from_secs(config.session.reap_interval_seconds()),
            max_concurrent_sessions: config.session.max_concurrent_sessions,
        };

        Self {
            config: Arc::new(config),
            session_manager: Arc::new(SessionManager::new(backend, tracker, manager_config)),
        }
    }

    pub fn session_manager(&self) -> Arc<SessionManager> {
        self.session_manager.clone()
    }

    pub async fn run(self: Arc<Self>) -> crate::Result<()> {
        let bind_addr = format!(
            "{}:{}",
            self.config.server.bind_address, self.config.server.bind_port
        );
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(%bind_addr, "session core listening");

        loop {
            match listener.accept().await {
                Ok((socket, addr)) => {
                    if let Err(e) = socket.set_nodelay(true) {
                        warn!(error = %e, "failed to set TCP_NODELAY");
                    }
                    let server = self.clone();
                    tokio::spawn(async move {
                        server.serve_connection(socket, addr).await;
                    });
                }
                Err(e) => error!(error = %e, "failed to accept connection"),
            }
        }
    }

    pub async fn shutdown(&self) {
        self.session_manager.dispose().await;
    }

    async fn serve_connection(self: Arc<Self>, socket: TcpStream, addr: SocketAddr) {
        let framed = FramedStream::new(socket, FramingKind::HttpFramed);
        let mut stream = ClientStream::new(framed);

        let allow_reuse = self.handle_hello(&mut stream, addr).await;
        stream.dispose(allow_reuse, Some(self.as_ref())).await;
    }

    /// Read and admit one Hello off `stream`'s socket, writing the response.
    /// Returns whether the caller should offer this socket up for reuse.
    async fn handle_hello(&self, stream: &mut ClientStream, addr: SocketAddr) -> bool {
        let Some(socket) = stream.socket_mut() else {
            return false;
        };

        let hello = match wire::read_hello(socket).await {
            Ok(hello) => hello,
            Err(e) => {
                warn!(%addr, error = %e, "failed to read hello");
                return false;
            }
        };

        match self.session_manager.create_session(hello, addr.ip()).await {
            Ok(session) => {
                if let Err(e) = wire::write_success(socket, session.session_id).await {
                    warn!(%addr, error = %e, "failed to write success response");
                    return false;
                }
                true
            }
            Err(e) => {
                let (response_code, usage, suppressed_by, message) = classify(&e);
                if let Err(write_err) =
                    wire::write_failure(socket, response_code, usage, suppressed_by, &message)
                        .await
                {
                    warn!(%addr, error = %write_err, "failed to write failure response");
                }
                false
            }
        }
    }
}

#[async_trait::async_trait]
impl ReuseSink for Server {
    async fn accept(&self, framed: FramedStream) {
        let mut stream = ClientStream::new(framed);
        let addr = stream
            .socket_mut()
            .and_then(|s| s.peer_addr().ok())
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 0)));

        let allow_reuse = self.handle_hello(&mut stream, addr).await;
        stream.dispose(allow_reuse, Some(self)).await;
    }
}

fn classify(
    err: &SessionError,
) -> (ResponseCode, Option<AccessUsage>, SuppressedBy, String) {
    match err {
        SessionError::TokenNotFound => (
            ResponseCode::AccessError,
            None,
            SuppressedBy::None,
            "no access record for token".to_string(),
        ),
        SessionError::InvalidSignature => (
            ResponseCode::AccessError,
            None,
            SuppressedBy::None,
            "admission proof mismatch".to_string(),
        ),
        SessionError::AccessError { usage, message, .. } => (
            ResponseCode::AccessError,
            Some(*usage),
            SuppressedBy::None,
            message.clone(),
        ),
        SessionError::SessionClosed {
            reason,
            suppressed_by,
            usage,
            ..
        } => (
            ResponseCode::SessionClosed,
            *usage,
            *suppressed_by,
            reason.clone(),
        ),
        SessionError::SessionNotFound => (
            ResponseCode::SessionClosed,
            None,
            SuppressedBy::None,
            "session not found".to_string(),
        ),
        SessionError::CapacityExceeded {
            max_concurrent_sessions,
        } => (
            ResponseCode::AccessError,
            None,
            SuppressedBy::None,
            format!("server at capacity ({max_concurrent_sessions} concurrent sessions)"),
        ),
        SessionError::Config(message) => (
            ResponseCode::AccessError,
            None,
            SuppressedBy::None,
            message.clone(),
        ),
        SessionError::Io(e) => (
            ResponseCode::AccessError,
            None,
            SuppressedBy::None,
            format!("io error: {e}"),
        ),
    }
}

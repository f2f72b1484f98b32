//! The Client Stream: the TCP socket a client is admitted on, and the
//! terminal-vs-reuse disposal state machine described in the design notes.

pub mod framing;
pub mod liveness;

use framing::FramedStream;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// Where a reused socket's fresh framed layer is handed off to. Implemented
/// by whatever accepts follow-on requests on the same connection (the
/// server's accept loop, in production).
#[async_trait::async_trait]
pub trait ReuseSink: Send + Sync {
    async fn accept(&self, stream: FramedStream);
}

/// Outcome of a disposal attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisposeOutcome {
    /// The socket was closed; nothing more will be read or written on it.
    Closed,
    /// Ownership was handed to a `ReuseSink` for a follow-on request.
    Reused,
}

/// Exactly one of these owns a given TCP socket at any time. Reuse moves
/// ownership to a new `ClientStream` constructed by the `ReuseSink`.
#[derive(Debug)]
pub struct ClientStream {
    id: Uuid,
    framed: Option<FramedStream>,
    disposed: bool,
}

impl ClientStream {
    pub fn new(framed: FramedStream) -> Self {
        Self {
            id: Uuid::new_v4(),
            framed: Some(framed),
            disposed: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn framing(&self) -> Option<framing::FramingKind> {
        self.framed.as_ref().map(|f| f.kind)
    }

    /// The underlying socket, for reading/writing before disposal decides
    /// whether it gets closed or handed off for reuse.
    pub fn socket_mut(&mut self) -> Option<&mut tokio::net::TcpStream> {
        self.framed.as_mut().map(|f| &mut f.socket)
    }

    /// Dispose of this stream. Idempotent: a second call is a no-op and
    /// returns `Closed` without touching the (already gone) socket.
    ///
    /// Reuse is only attempted when `reuse_requested` is set, a sink is
    /// supplied, and the liveness check and framing both allow it. Any
    /// failure along that path degrades to a terminal close.
    pub async fn dispose(
        &mut self,
        reuse_requested: bool,
        reuse_sink: Option<&dyn ReuseSink>,
    ) -> DisposeOutcome {
        if self.disposed {
            return DisposeOutcome::Closed;
        }
        self.disposed = true;

        let Some(framed) = self.framed.take() else {
            return DisposeOutcome::Closed;
        };

        if reuse_requested {
            if let Some(sink) = reuse_sink {
                if liveness::is_alive(&framed.socket) {
                    match framed.create_reuse().await {
                        Ok(fresh) => {
                            trace!(stream_id = %self.id, "handing off client stream for reuse");
                            sink.accept(fresh).await;
                            return DisposeOutcome::Reused;
                        }
                        Err(socket) => {
                            debug!(stream_id = %self.id, "framing does not support reuse, closing");
                            drop(socket);
                            return DisposeOutcome::Closed;
                        }
                    }
                }
                warn!(stream_id = %self.id, "liveness check failed, closing instead of reusing");
            }
        }

        DisposeOutcome::Closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framing::FramingKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::net::{TcpListener, TcpStream};

    struct CountingSink(Arc<AtomicUsize>);

    #[async_trait::async_trait]
    impl ReuseSink for CountingSink {
        async fn accept(&self, _stream: FramedStream) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });
        let client = TcpStream::connect(addr).await.unwrap();
        let server = accept.await.unwrap();
        (client, server)
    }

    #[tokio::test]
    async fn terminal_dispose_closes_without_sink() {
        let (client, _server) = connected_pair().await;
        let mut stream = ClientStream::new(FramedStream::new(client, FramingKind::HttpFramed));

        let outcome = stream.dispose(false, None).await;
        assert_eq!(outcome, DisposeOutcome::Closed);
    }

    #[tokio::test]
    async fn reuse_requested_on_http_framed_hands_off_to_sink() {
        let (client, _server) = connected_pair().await;
        let mut stream = ClientStream::new(FramedStream::new(client, FramingKind::HttpFramed));
        let count = Arc::new(AtomicUsize::new(0));
        let sink = CountingSink(count.clone());

        let outcome = stream.dispose(true, Some(&sink)).await;
        assert_eq!(outcome, DisposeOutcome::Reused);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reuse_requested_on_raw_framing_falls_through_to_closed() {
        let (client, _server) = connected_pair().await;
        let mut stream = ClientStream::new(FramedStream::new(client, FramingKind::Raw));
        let count = Arc::new(AtomicUsize::new(0));
        let sink = CountingSink(count.clone());

        let outcome = stream.dispose(true, Some(&sink)).await;
        assert_eq!(outcome, DisposeOutcome::Closed);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn second_dispose_is_a_noop() {
        let (client, _server) = connected_pair().await;
        let mut stream = ClientStream::new(FramedStream::new(client, FramingKind::HttpFramed));

        assert_eq!(stream.dispose(false, None).await, DisposeOutcome::Closed);
        assert_eq!(stream.dispose(false, None).await, DisposeOutcome::Closed);
    }
}

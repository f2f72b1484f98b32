use tokio::net::TcpStream;

/// Which wire framing an accepted socket is speaking. Only `HttpFramed`
/// supports producing a fresh framed layer over the same socket for reuse;
/// `Raw` sockets are always terminal on disposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingKind {
    Raw,
    HttpFramed,
}

/// A socket paired with the framing currently in effect on it.
#[derive(Debug)]
pub struct FramedStream {
    pub kind: FramingKind,
    pub socket: TcpStream,
}

impl FramedStream {
    pub fn new(socket: TcpStream, kind: FramingKind) -> Self {
        Self { kind, socket }
    }

    /// Produce a fresh framed layer over the same underlying socket. Only
    /// the HTTP-framed variant can do this; `Raw` hands the bare socket back
    /// so the caller can close it.
    pub async fn create_reuse(self) -> Result<FramedStream, TcpStream> {
        match self.kind {
            FramingKind::HttpFramed => Ok(FramedStream::new(self.socket, FramingKind::HttpFramed)),
            FramingKind::Raw => Err(self.socket),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn raw_framing_cannot_be_reused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });
        let client = TcpStream::connect(addr).await.unwrap();
        accept.await.unwrap();

        let framed = FramedStream::new(client, FramingKind::Raw);
        assert!(framed.create_reuse().await.is_err());
    }

    #[tokio::test]
    async fn http_framed_supports_reuse() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });
        let client = TcpStream::connect(addr).await.unwrap();
        accept.await.unwrap();

        let framed = FramedStream::new(client, FramingKind::HttpFramed);
        let fresh = framed.create_reuse().await.unwrap();
        assert_eq!(fresh.kind, FramingKind::HttpFramed);
    }
}

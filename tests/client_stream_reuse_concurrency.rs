/// Client Stream reuse under concurrency: many simultaneous dispose() calls,
/// each independently deciding (via its own liveness check) whether to hand
/// its socket off to the reuse sink or close it terminally.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use vpnhub_session_core::stream::framing::{FramedStream, FramingKind};
use vpnhub_session_core::stream::{ClientStream, DisposeOutcome, ReuseSink};

struct CountingSink {
    accepted: AtomicUsize,
}

#[async_trait::async_trait]
impl ReuseSink for CountingSink {
    async fn accept(&self, stream: FramedStream) {
        self.accepted.fetch_add(1, Ordering::SeqCst);
        // Simulate parsing a follow-on Hello on the reused socket.
        drop(stream);
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
async fn fifty_concurrent_reuse_disposals_each_hand_off_exactly_once() {
    let sink = Arc::new(CountingSink {
        accepted: AtomicUsize::new(0),
    });

    let mut handles = Vec::new();
    for _ in 0..50 {
        let sink = sink.clone();
        handles.push(tokio::spawn(async move {
            let (client, server) = connected_pair().await;
            let mut stream = ClientStream::new(FramedStream::new(client, FramingKind::HttpFramed));
            let outcome = stream.dispose(true, Some(sink.as_ref())).await;
            drop(server);
            outcome
        }));
    }

    let mut reused = 0;
    for handle in handles {
        if handle.await.unwrap() == DisposeOutcome::Reused {
            reused += 1;
        }
    }

    assert_eq!(reused, 50);
    assert_eq!(sink.accepted.load(Ordering::SeqCst), 50);
}

#[tokio::test]
async fn dispose_called_twice_concurrently_only_hands_off_once() {
    let sink = Arc::new(CountingSink {
        accepted: AtomicUsize::new(0),
    });
    let (client, _server) = connected_pair().await;
    let stream = Arc::new(tokio::sync::Mutex::new(ClientStream::new(FramedStream::new(
        client,
        FramingKind::HttpFramed,
    ))));

    let a = {
        let stream = stream.clone();
        let sink = sink.clone();
        tokio::spawn(async move { stream.lock().await.dispose(true, Some(sink.as_ref())).await })
    };
    let outcome_a = a.await.unwrap();

    // Calling dispose again after it already ran must be a no-op, never a
    // second hand-off to the sink.
    let outcome_b = stream.lock().await.dispose(true, Some(sink.as_ref())).await;

    assert_eq!(outcome_a, DisposeOutcome::Reused);
    assert_eq!(outcome_b, DisposeOutcome::Closed);
    assert_eq!(sink.accepted.load(Ordering::SeqCst), 1);
}

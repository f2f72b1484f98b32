use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tokio::net::{TcpListener, TcpStream};
use vpnhub_session_core::stream::framing::{FramedStream, FramingKind};
use vpnhub_session_core::stream::{ClientStream, DisposeOutcome, ReuseSink};

struct DiscardSink;

#[async_trait::async_trait]
impl ReuseSink for DiscardSink {
    async fn accept(&self, _stream: FramedStream) {}
}

async fn connected_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });
    let client = TcpStream::connect(addr).await.unwrap();
    let server = accept.await.unwrap();
    (client, server)
}

fn bench_terminal_dispose(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("client_stream_terminal_dispose", |b| {
        b.to_async(&rt).iter_batched(
            || {
                rt.block_on(async {
                    let (client, server) = connected_pair().await;
                    (ClientStream::new(FramedStream::new(client, FramingKind::HttpFramed)), server)
                })
            },
            |(mut stream, _server)| async move {
                let outcome = stream.dispose(false, None).await;
                black_box(outcome);
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_reuse_dispose(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let sink = DiscardSink;

    c.bench_function("client_stream_reuse_dispose", |b| {
        b.to_async(&rt).iter_batched(
            || {
                rt.block_on(async {
                    let (client, server) = connected_pair().await;
                    (ClientStream::new(FramedStream::new(client, FramingKind::HttpFramed)), server)
                })
            },
            |(mut stream, _server)| {
                let sink = &sink;
                async move {
                    let outcome = stream.dispose(true, Some(sink)).await;
                    debug_assert_eq!(outcome, DisposeOutcome::Reused);
                    black_box(outcome);
                }
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_terminal_dispose, bench_reuse_dispose);
criterion_main!(benches);

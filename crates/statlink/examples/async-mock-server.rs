//! Tokio variant of `mock-server`, built on `StatLinkCodec`.
//!
//! Run with:
//!   cargo run --example async-mock-server --features async -- 127.0.0.1:9123

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use futures_util::{SinkExt, StreamExt};
use statlink::frame::{
    Reply, ServerStats, StatLinkCodec, Timestamp, CLEAR_DATA, GET_SIZE, GET_STAT, GET_TIME,
    SET_DATA,
};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:9123".to_string());
    let listener = TcpListener::bind(&addr).await?;
    eprintln!("Listening on {}", listener.local_addr()?);

    let started = Instant::now();
    let clients = Arc::new(AtomicU32::new(0));

    loop {
        let (stream, peer) = listener.accept().await?;
        let clients = clients.clone();
        tokio::spawn(async move {
            clients.fetch_add(1, Ordering::SeqCst);
            if let Err(e) = serve(stream, &clients, started).await {
                eprintln!("Client {peer} error: {e}");
            }
            clients.fetch_sub(1, Ordering::SeqCst);
        });
    }
}

async fn serve(
    stream: TcpStream,
    clients: &AtomicU32,
    started: Instant,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut framed = Framed::new(stream, StatLinkCodec::new());
    let mut stats = ServerStats::default();

    while let Some(frame) = framed.next().await {
        let frame = frame?;
        stats.received_packets += 1;
        stats.received_bytes += frame.wire_size() as u32;
        stats.uptime_secs = started.elapsed().as_secs() as u32;
        stats.clients = clients.load(Ordering::SeqCst);

        let reply = match frame.type_tag() {
            GET_TIME => Reply::Time(Timestamp::from(SystemTime::now())),
            GET_SIZE => Reply::FreeSize(1024 * 1024),
            GET_STAT => Reply::Stats(stats),
            SET_DATA => Reply::SetData(format!("received {} bytes", frame.payload.len())),
            CLEAR_DATA => Reply::Cleared,
            other => {
                eprintln!("Ignoring type {other}");
                continue;
            }
        };

        let out = reply.to_frame(0);
        stats.sent_packets += 1;
        stats.sent_bytes += out.wire_size() as u32;
        framed.send(out).await?;
    }
    Ok(())
}

//! Minimal statlink server: answers every request kind from in-memory state.
//!
//! Run with:
//!   cargo run --example mock-server -- 127.0.0.1:9123
//!
//! In another terminal:
//!   cargo run --features cli -- stat
//!   cargo run --features cli -- set-data "hello"

use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Instant, SystemTime};

use statlink::frame::{
    encode_header, payload::read_text, Frame, FrameError, FrameReader, Reply, ServerStats,
    Timestamp, CLEAR_DATA, GET_SIZE, GET_STAT, GET_TIME, HEADER_SIZE, SET_DATA,
};

const CAPACITY: u32 = 1024 * 1024;

#[derive(Default)]
struct State {
    stored: String,
    stats: ServerStats,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:9123".to_string());
    let listener = TcpListener::bind(&addr)?;
    eprintln!("Listening on {}", listener.local_addr()?);

    let started = Instant::now();
    let state = Arc::new(Mutex::new(State::default()));

    for stream in listener.incoming() {
        let stream = stream?;
        let state = state.clone();
        thread::spawn(move || {
            if let Err(e) = serve(stream, &state, started) {
                eprintln!("Client error: {e}");
            }
        });
    }
    Ok(())
}

fn serve(
    stream: TcpStream,
    state: &Mutex<State>,
    started: Instant,
) -> Result<(), Box<dyn std::error::Error>> {
    let peer = stream.peer_addr()?;
    eprintln!("Client connected: {peer}");
    lock(state).stats.clients += 1;

    let mut writer = stream.try_clone()?;
    let mut reader = FrameReader::new(stream);
    let outcome = loop {
        let frame = match reader.read_frame() {
            Ok(frame) => frame,
            Err(FrameError::ConnectionClosed) => break Ok(()),
            Err(e) => break Err(e.into()),
        };

        let reply = {
            let mut state = lock(state);
            state.stats.received_packets += 1;
            state.stats.received_bytes += frame.wire_size() as u32;
            state.stats.uptime_secs = started.elapsed().as_secs() as u32;
            answer(&frame, &mut state)
        };
        let Some(reply) = reply else {
            eprintln!("Ignoring type {} from {peer}", frame.type_tag());
            continue;
        };

        let out = reply.to_frame(0);
        writer.write_all(&encode_header(&out.header))?;
        writer.write_all(&out.payload)?;

        let mut state = lock(state);
        state.stats.sent_packets += 1;
        state.stats.sent_bytes += (HEADER_SIZE + out.payload.len()) as u32;
    };

    lock(state).stats.clients -= 1;
    eprintln!("Client disconnected: {peer}");
    outcome
}

fn answer(frame: &Frame, state: &mut State) -> Option<Reply> {
    match frame.type_tag() {
        GET_TIME => Some(Reply::Time(Timestamp::from(SystemTime::now()))),
        GET_SIZE => Some(Reply::FreeSize(
            CAPACITY.saturating_sub(state.stored.len() as u32),
        )),
        GET_STAT => Some(Reply::Stats(state.stats)),
        SET_DATA => {
            let mut payload = frame.payload.as_ref();
            let text = read_text(&mut payload).unwrap_or_default();
            state.stored = text;
            Some(Reply::SetData(format!("stored {} bytes", state.stored.len())))
        }
        CLEAR_DATA => {
            state.stored.clear();
            Some(Reply::Cleared)
        }
        _ => None,
    }
}

fn lock(state: &Mutex<State>) -> std::sync::MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#![cfg(feature = "cli")]

use std::io::Write;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::process::{Command, Output};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use statlink_frame::{
    encode_header, payload::read_text, FrameReader, Reply, ServerStats, Timestamp, GET_SIZE,
    GET_STAT, GET_TIME, SET_DATA,
};

/// Accept one connection and hand it to `script`.
fn scripted_server<F>(script: F) -> (SocketAddr, JoinHandle<()>)
where
    F: FnOnce(TcpStream) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let addr = listener.local_addr().expect("listener should have an address");
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("server should accept");
        script(stream);
    });
    (addr, handle)
}

fn write_reply(stream: &mut TcpStream, reply: &Reply) {
    let frame = reply.to_frame(0);
    stream
        .write_all(&encode_header(&frame.header))
        .expect("header should write");
    stream
        .write_all(&frame.payload)
        .expect("payload should write");
}

fn statlink(addr: SocketAddr, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_statlink"))
        .env_remove("STATLINK_HOST")
        .env_remove("STATLINK_PORT")
        .arg("--log-level")
        .arg("error")
        .arg("--host")
        .arg(addr.ip().to_string())
        .arg("--port")
        .arg(addr.port().to_string())
        .args(args)
        .output()
        .expect("statlink should run")
}

#[test]
fn size_prints_free_space_after_garbage() {
    let (addr, server) = scripted_server(|stream| {
        let mut writer = stream.try_clone().expect("stream should clone");
        let mut reader = FrameReader::new(stream);
        let request = reader.read_frame().expect("request should arrive");
        assert_eq!(request.type_tag(), GET_SIZE);

        writer
            .write_all(&[0x00, 0xAB, 0x99, 0x42])
            .expect("garbage should write");
        write_reply(&mut writer, &Reply::FreeSize(1_048_576));
    });

    let output = statlink(addr, &["--format", "json", "size"]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    let value: serde_json::Value =
        serde_json::from_str(stdout.trim()).expect("stdout should be one JSON line");
    assert_eq!(value["event"], "free_size");
    assert_eq!(value["bytes"], 1_048_576);

    server.join().expect("server should finish");
}

#[test]
fn set_data_sends_text_and_prints_reply() {
    let (addr, server) = scripted_server(|stream| {
        let mut writer = stream.try_clone().expect("stream should clone");
        let mut reader = FrameReader::new(stream);
        let request = reader.read_frame().expect("request should arrive");
        assert_eq!(request.type_tag(), SET_DATA);

        let mut payload = request.payload.as_ref();
        let text = read_text(&mut payload).expect("payload should be text");
        write_reply(&mut writer, &Reply::SetData(format!("stored {text}")));
    });

    let output = statlink(addr, &["--format", "pretty", "set-data", "hello"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("set_data server="));
    assert!(stdout.contains("text=stored hello"));

    server.join().expect("server should finish");
}

#[test]
fn stat_prints_every_counter() {
    let (addr, server) = scripted_server(|stream| {
        let mut writer = stream.try_clone().expect("stream should clone");
        let mut reader = FrameReader::new(stream);
        assert_eq!(reader.read_frame().expect("request").type_tag(), GET_STAT);
        write_reply(
            &mut writer,
            &Reply::Stats(ServerStats {
                received_bytes: 100,
                sent_bytes: 200,
                received_packets: 3,
                sent_packets: 4,
                uptime_secs: 5,
                clients: 6,
            }),
        );
    });

    let output = statlink(addr, &["--format", "json", "stat"]);
    assert!(output.status.success());
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(value["event"], "stats");
    assert_eq!(value["sent_bytes"], 200);
    assert_eq!(value["clients"], 6);

    server.join().expect("server should finish");
}

#[test]
fn silent_server_times_out_with_124() {
    let (addr, server) = scripted_server(|stream| {
        let mut reader = FrameReader::new(stream);
        let _ = reader.read_frame();
        thread::sleep(Duration::from_millis(800));
    });

    let output = statlink(addr, &["--timeout", "300ms", "time"]);
    assert_eq!(output.status.code(), Some(124));
    assert!(String::from_utf8_lossy(&output.stderr).contains("timed out"));

    server.join().expect("server should finish");
}

#[test]
fn refused_connection_exits_1() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let addr = listener.local_addr().expect("address");
    drop(listener);

    let output = statlink(addr, &["time"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("connect failed"));
}

#[test]
fn invalid_timeout_is_usage_error() {
    let output = statlink("127.0.0.1:1".parse().expect("addr"), &["--timeout", "0s", "time"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn watch_stops_after_count_replies() {
    let (addr, server) = scripted_server(|stream| {
        let mut writer = stream.try_clone().expect("stream should clone");
        let mut reader = FrameReader::new(stream);
        assert_eq!(reader.read_frame().expect("request").type_tag(), GET_TIME);

        // Unknown kinds are skipped without producing output.
        let unknown = statlink_frame::Frame::new(0x0063, 0, vec![1u8, 2, 3, 4]);
        writer
            .write_all(&encode_header(&unknown.header))
            .expect("header should write");
        writer.write_all(&unknown.payload).expect("payload");

        write_reply(&mut writer, &Reply::Time(Timestamp::from_unix_millis(1)));
        write_reply(&mut writer, &Reply::Time(Timestamp::from_unix_millis(2)));
        thread::sleep(Duration::from_millis(500));
    });

    let output = statlink(
        addr,
        &["--format", "json", "watch", "--request", "time", "--count", "2"],
    );
    assert!(output.status.success());
    let lines: Vec<serde_json::Value> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be JSON"))
        .collect();
    let kinds: Vec<&str> = lines
        .iter()
        .map(|line| line["event"].as_str().unwrap_or_default())
        .collect();
    assert_eq!(kinds, vec!["connected", "time", "time", "disconnected"]);
    assert_eq!(lines[2]["unix_millis"], 2);

    server.join().expect("server should finish");
}

#[test]
fn watch_reports_early_disconnect() {
    let (addr, server) = scripted_server(|stream| {
        let mut writer = stream.try_clone().expect("stream should clone");
        let mut reader = FrameReader::new(stream);
        let _ = reader.read_frame();
        write_reply(&mut writer, &Reply::FreeSize(1));
    });

    let output = statlink(
        addr,
        &["--format", "json", "watch", "--request", "size", "--count", "5"],
    );
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"free_size\""));
    assert!(stdout.contains("\"disconnected\""));

    server.join().expect("server should finish");
}

#[test]
fn version_prints_name() {
    let output = Command::new(env!("CARGO_BIN_EXE_statlink"))
        .arg("version")
        .output()
        .expect("version should run");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("statlink "));
}

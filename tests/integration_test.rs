// tests/integration_test.rs

//! End-to-end tests driving a real TCP server over the wire, exercising the
//! codec, dispatcher, and storage engines together rather than any one in
//! isolation.

use bytes::Bytes;
use ferrite::config::Config;
use ferrite::connection::handle_connection;
use ferrite::core::protocol::{RespFrame, RespFrameCodec};
use ferrite::core::state::{PrimaryState, Role, ServerState};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;

fn test_config() -> Config {
    Config {
        port: 0,
        dir: ".".to_string(),
        dbfilename: "dump.rdb".to_string(),
        replicaof: None,
    }
}

/// Starts a real accept loop on an ephemeral port against a given state,
/// returning the address clients should connect to.
async fn spawn_server(state: Arc<ServerState>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(v) => v,
                Err(_) => return,
            };
            let state = state.clone();
            tokio::spawn(handle_connection(state, stream));
        }
    });
    addr
}

async fn connect(addr: SocketAddr) -> Framed<TcpStream, RespFrameCodec> {
    let stream = TcpStream::connect(addr).await.unwrap();
    Framed::new(stream, RespFrameCodec)
}

async fn roundtrip(client: &mut Framed<TcpStream, RespFrameCodec>, parts: &[&[u8]]) -> RespFrame {
    client.send(RespFrame::command(parts)).await.unwrap();
    client.next().await.unwrap().unwrap()
}

fn bulk(s: &str) -> RespFrame {
    RespFrame::BulkString(Bytes::copy_from_slice(s.as_bytes()))
}

#[tokio::test]
async fn ping_over_the_wire_replies_pong() {
    let state = Arc::new(ServerState::new(test_config(), Role::Primary(PrimaryState::new())));
    let addr = spawn_server(state).await;
    let mut client = connect(addr).await;

    let reply = roundtrip(&mut client, &[b"PING"]).await;
    assert_eq!(reply, RespFrame::SimpleString("PONG".to_string()));
}

#[tokio::test]
async fn echo_over_the_wire_returns_the_argument() {
    let state = Arc::new(ServerState::new(test_config(), Role::Primary(PrimaryState::new())));
    let addr = spawn_server(state).await;
    let mut client = connect(addr).await;

    let reply = roundtrip(&mut client, &[b"ECHO", b"hello"]).await;
    assert_eq!(reply, bulk("hello"));
}

#[tokio::test]
async fn set_then_get_round_trips_over_the_wire() {
    let state = Arc::new(ServerState::new(test_config(), Role::Primary(PrimaryState::new())));
    let addr = spawn_server(state).await;
    let mut client = connect(addr).await;

    let set_reply = roundtrip(&mut client, &[b"SET", b"foo", b"bar"]).await;
    assert_eq!(set_reply, RespFrame::SimpleString("OK".to_string()));

    let get_reply = roundtrip(&mut client, &[b"GET", b"foo"]).await;
    assert_eq!(get_reply, bulk("bar"));
}

#[tokio::test]
async fn set_with_px_expires_and_then_reads_as_nil() {
    let state = Arc::new(ServerState::new(test_config(), Role::Primary(PrimaryState::new())));
    let addr = spawn_server(state).await;
    let mut client = connect(addr).await;

    roundtrip(&mut client, &[b"SET", b"k", b"v", b"PX", b"20"]).await;
    tokio::time::sleep(Duration::from_millis(60)).await;

    let reply = roundtrip(&mut client, &[b"GET", b"k"]).await;
    assert_eq!(reply, RespFrame::Null);
}

#[tokio::test]
async fn xadd_rejects_the_zero_zero_id() {
    let state = Arc::new(ServerState::new(test_config(), Role::Primary(PrimaryState::new())));
    let addr = spawn_server(state).await;
    let mut client = connect(addr).await;

    let reply = roundtrip(&mut client, &[b"XADD", b"stream", b"0-0", b"field", b"value"]).await;
    assert!(matches!(reply, RespFrame::Error(_)));
}

#[tokio::test]
async fn xadd_rejects_a_non_increasing_id() {
    let state = Arc::new(ServerState::new(test_config(), Role::Primary(PrimaryState::new())));
    let addr = spawn_server(state).await;
    let mut client = connect(addr).await;

    roundtrip(&mut client, &[b"XADD", b"stream", b"5-5", b"field", b"value"]).await;
    let reply = roundtrip(&mut client, &[b"XADD", b"stream", b"5-5", b"field", b"value"]).await;
    assert!(matches!(reply, RespFrame::Error(_)));
}

#[tokio::test]
async fn xadd_then_xrange_returns_the_entry() {
    let state = Arc::new(ServerState::new(test_config(), Role::Primary(PrimaryState::new())));
    let addr = spawn_server(state).await;
    let mut client = connect(addr).await;

    let id_reply = roundtrip(&mut client, &[b"XADD", b"stream", b"1-1", b"temp", b"90"]).await;
    assert_eq!(id_reply, bulk("1-1"));

    let range_reply = roundtrip(&mut client, &[b"XRANGE", b"stream", b"-", b"+"]).await;
    match range_reply {
        RespFrame::Array(entries) => assert_eq!(entries.len(), 1),
        other => panic!("expected an array of entries, got {other:?}"),
    }
}

#[tokio::test]
async fn type_distinguishes_string_stream_and_missing_keys() {
    let state = Arc::new(ServerState::new(test_config(), Role::Primary(PrimaryState::new())));
    let addr = spawn_server(state).await;
    let mut client = connect(addr).await;

    roundtrip(&mut client, &[b"SET", b"a_string", b"v"]).await;
    roundtrip(&mut client, &[b"XADD", b"a_stream", b"1-1", b"f", b"v"]).await;

    assert_eq!(roundtrip(&mut client, &[b"TYPE", b"a_string"]).await, RespFrame::SimpleString("string".to_string()));
    assert_eq!(roundtrip(&mut client, &[b"TYPE", b"a_stream"]).await, RespFrame::SimpleString("stream".to_string()));
    assert_eq!(roundtrip(&mut client, &[b"TYPE", b"missing"]).await, RespFrame::SimpleString("none".to_string()));
}

#[tokio::test]
async fn info_reports_master_role_on_a_primary() {
    let state = Arc::new(ServerState::new(test_config(), Role::Primary(PrimaryState::new())));
    let addr = spawn_server(state).await;
    let mut client = connect(addr).await;

    let reply = roundtrip(&mut client, &[b"INFO", b"replication"]).await;
    match reply {
        RespFrame::BulkString(b) => {
            let s = String::from_utf8(b.to_vec()).unwrap();
            assert!(s.contains("role:master"));
        }
        other => panic!("expected a bulk string, got {other:?}"),
    }
}

#[tokio::test]
async fn wait_with_no_replicas_returns_immediately() {
    let state = Arc::new(ServerState::new(test_config(), Role::Primary(PrimaryState::new())));
    let addr = spawn_server(state).await;
    let mut client = connect(addr).await;

    let reply = roundtrip(&mut client, &[b"WAIT", b"0", b"0"]).await;
    assert_eq!(reply, RespFrame::Integer(0));
}

#[tokio::test]
async fn xread_blocks_until_a_later_xadd_then_returns_it() {
    let state = Arc::new(ServerState::new(test_config(), Role::Primary(PrimaryState::new())));
    let addr = spawn_server(state).await;
    let mut writer = connect(addr).await;
    let mut reader = connect(addr).await;

    roundtrip(&mut writer, &[b"XADD", b"s", b"1-1", b"a", b"1"]).await;

    let reader_task = tokio::spawn(async move {
        roundtrip(&mut reader, &[b"XREAD", b"BLOCK", b"1000", b"STREAMS", b"s", b"$"]).await
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    roundtrip(&mut writer, &[b"XADD", b"s", b"2-2", b"a", b"2"]).await;

    let reply = tokio::time::timeout(Duration::from_secs(2), reader_task)
        .await
        .unwrap()
        .unwrap();
    assert!(!matches!(reply, RespFrame::Null));
}

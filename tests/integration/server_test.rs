// tests/integration/server_test.rs

//! End-to-end tests over real TCP connections.

use super::test_helpers::init_tracing;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use subdocd::config::Config;
use subdocd::core::protocol::subdoc::SinglePathFrame;
use subdocd::core::protocol::{ClientCodec, Opcode, Request, Response, Status};
use subdocd::core::storage::DATATYPE_JSON;
use subdocd::core::storage::vbucket::vbucket_for_key;
use subdocd::server::{serve, setup};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

type Client = Framed<TcpStream, ClientCodec>;

struct TestServer {
    addr: SocketAddr,
    num_vbuckets: u16,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl TestServer {
    async fn start(max_clients: usize) -> Self {
        init_tracing();
        let config = Config {
            port: 0,
            max_clients,
            ..Config::default()
        };
        let num_vbuckets = config.storage.num_vbuckets;
        let ctx = setup(config).await.unwrap();
        let addr = ctx.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(serve(ctx, async move {
            let _ = stopped.await;
        }));
        Self {
            addr,
            num_vbuckets,
            stop: Some(stop),
            task,
        }
    }

    async fn connect(&self) -> Client {
        let stream = TcpStream::connect(self.addr).await.unwrap();
        Framed::new(stream, ClientCodec::default())
    }

    fn route(&self, request: Request) -> Request {
        let vbucket = vbucket_for_key(&request.key, self.num_vbuckets);
        request.with_vbucket(vbucket)
    }

    async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("server stops")
            .unwrap();
    }
}

async fn roundtrip(client: &mut Client, request: Request) -> Response {
    client.send(request).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .expect("response in time")
        .expect("connection open")
        .unwrap()
}

fn set_request(key: &'static [u8], json: &'static [u8]) -> Request {
    Request::new(Opcode::Set)
        .with_key(Bytes::from_static(key))
        .with_extras(Bytes::from_static(&[0; 8]))
        .with_value(Bytes::from_static(json))
        .with_datatype(DATATYPE_JSON)
}

fn subdoc_request(
    opcode: Opcode,
    key: &'static [u8],
    path: &'static [u8],
    value: &'static [u8],
) -> Request {
    SinglePathFrame {
        key: Bytes::from_static(key),
        path: Bytes::from_static(path),
        value: Bytes::from_static(value),
        flags: 0,
        expiry: None,
    }
    .into_request(opcode)
}

#[tokio::test]
async fn test_subdoc_over_tcp() {
    let server = TestServer::start(16).await;
    let mut client = server.connect().await;

    let set = server.route(set_request(b"doc", br#"{"a":{"b":[1]}}"#));
    let stored = roundtrip(&mut client, set).await;
    assert_eq!(stored.status, Status::Success);

    let request = server
        .route(subdoc_request(Opcode::SubdocArrayPushLast, b"doc", b"a.b", b"2"))
        .with_opaque(42);
    let response = roundtrip(&mut client, request).await;
    assert_eq!(response.status, Status::Success);
    assert_eq!(response.opaque, 42);
    assert!(response.cas > stored.cas);

    let response = roundtrip(
        &mut client,
        server.route(subdoc_request(Opcode::SubdocGet, b"doc", b"a.b", b"")),
    )
    .await;
    assert_eq!(&response.value[..], b"[1,2]");

    drop(client);
    server.stop().await;
}

#[tokio::test]
async fn test_pipelined_requests_are_answered_in_order() {
    let server = TestServer::start(16).await;
    let mut client = server.connect().await;
    roundtrip(&mut client, server.route(set_request(b"doc", br#"{"n":0}"#))).await;

    for opaque in 1..=10 {
        let request = server
            .route(subdoc_request(Opcode::SubdocCounter, b"doc", b"n", b"1"))
            .with_opaque(opaque);
        client.feed(request).await.unwrap();
    }
    client.flush().await.unwrap();

    for opaque in 1..=10u32 {
        let response = client.next().await.unwrap().unwrap();
        assert_eq!(response.opaque, opaque);
        assert_eq!(response.value, opaque.to_string());
    }

    drop(client);
    server.stop().await;
}

#[tokio::test]
async fn test_clients_share_one_store() {
    let server = TestServer::start(16).await;
    let mut writer = server.connect().await;
    let mut reader = server.connect().await;

    roundtrip(&mut writer, server.route(set_request(b"shared", br#"{"v":"x"}"#))).await;
    let response = roundtrip(
        &mut reader,
        server.route(subdoc_request(Opcode::SubdocGet, b"shared", b"v", b"")),
    )
    .await;
    assert_eq!(&response.value[..], br#""x""#);

    drop(writer);
    drop(reader);
    server.stop().await;
}

#[tokio::test]
async fn test_bad_magic_closes_the_connection() {
    let server = TestServer::start(16).await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();

    let mut garbage = [0u8; 24];
    garbage[0] = 0x42;
    stream.write_all(&garbage).await.unwrap();

    let mut buf = [0u8; 1];
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
        .await
        .expect("server hangs up");
    assert!(matches!(read, Ok(0) | Err(_)));

    server.stop().await;
}

#[tokio::test]
async fn test_connections_beyond_max_clients_are_dropped() {
    let server = TestServer::start(1).await;
    let mut first = server.connect().await;
    let response = roundtrip(&mut first, Request::new(Opcode::Noop)).await;
    assert_eq!(response.status, Status::Success);

    let mut second = server.connect().await;
    second.send(Request::new(Opcode::Noop)).await.ok();
    let next = tokio::time::timeout(Duration::from_secs(5), second.next())
        .await
        .expect("second connection is closed");
    assert!(matches!(next, None | Some(Err(_))));

    // The slot frees up once the first client leaves.
    drop(first);
    let mut third = None;
    for _ in 0..50 {
        let mut candidate = server.connect().await;
        if candidate.send(Request::new(Opcode::Noop)).await.is_ok()
            && let Ok(Some(Ok(response))) =
                tokio::time::timeout(Duration::from_millis(200), candidate.next()).await
        {
            third = Some(response);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(third.map(|r| r.status), Some(Status::Success));

    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_closes_open_connections() {
    let server = TestServer::start(16).await;
    let mut client = server.connect().await;
    roundtrip(&mut client, Request::new(Opcode::Noop)).await;

    server.stop().await;

    let next = tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .expect("connection closed after shutdown");
    assert!(matches!(next, None | Some(Err(_))));
}

//! Integration tests for the line relay using in-process servers and raw TCP clients.

use std::{collections::HashSet, net::SocketAddr, sync::Arc, time::Duration};

use linecast_server::{
    Server, ServerConfig,
    domain::{ConnectionId, ConnectionRegistry, ServerError},
    infrastructure::InMemoryConnectionRegistry,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        TcpListener, TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::timeout,
};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);
const SILENCE_WINDOW: Duration = Duration::from_millis(200);

/// Helper struct to manage an in-process server lifecycle
struct TestServer {
    addr: SocketAddr,
    registry: Arc<dyn ConnectionRegistry>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    /// Start a server on an ephemeral port
    async fn start() -> Self {
        Self::start_with_registry(Arc::new(InMemoryConnectionRegistry::new())).await
    }

    /// Start a server sharing the given registry
    async fn start_with_registry(registry: Arc<dyn ConnectionRegistry>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let server = Server::new(listener, registry);
        let addr = server.local_addr().expect("Failed to read local address");
        let registry = server.registry();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(server.run_until(async move {
            let _ = shutdown_rx.await;
        }));

        TestServer {
            addr,
            registry,
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    /// Connect a new client and wait until the server has registered it
    async fn connect(&self) -> TestClient {
        let before = self.registry.count().await;
        let client = TestClient::connect(self.addr).await;
        self.wait_for_count(before + 1).await;
        client
    }

    /// Wait until the registry holds exactly `expected` connections
    async fn wait_for_count(&self, expected: usize) {
        let registry = self.registry.clone();
        timeout(RECV_TIMEOUT, async move {
            while registry.count().await != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("registry never reached {} connections", expected));
    }

    /// Stop accepting and wait for the accept loop to return
    async fn stop(mut self) -> Result<(), ServerError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        timeout(RECV_TIMEOUT, &mut self.task)
            .await
            .expect("server did not stop")
            .expect("server task panicked")
    }
}

/// Raw TCP client speaking the line protocol
struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr)
            .await
            .expect("Failed to connect to server");
        let (reader, writer) = stream.into_split();
        TestClient {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Send one line (the terminator is appended)
    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .expect("Failed to send line");
        self.writer.flush().await.expect("Failed to flush");
    }

    /// Receive the next line without its terminator
    async fn recv(&mut self) -> String {
        let mut line = String::new();
        let n = timeout(RECV_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("Timed out waiting for a line")
            .expect("Failed to read line");
        assert!(n > 0, "connection closed while waiting for a line");
        line.trim_end_matches('\n').to_string()
    }

    /// Assert that nothing arrives for a short while
    async fn expect_silence(&mut self) {
        let mut line = String::new();
        let result = timeout(SILENCE_WINDOW, self.reader.read_line(&mut line)).await;
        assert!(result.is_err(), "expected no message, got {:?}", line);
    }
}

#[tokio::test]
async fn test_scenario_three_clients_hello_then_bye() {
    // テスト項目: A, B, C の順に接続し、A の送信は B と C にだけ届く。B 切断後は C にだけ届く
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = server.connect().await;
    let mut bob = server.connect().await;
    let mut charlie = server.connect().await;

    // when (操作):
    alice.send("A: hello").await;

    // then (期待する結果):
    assert_eq!(bob.recv().await, "A: hello");
    assert_eq!(charlie.recv().await, "A: hello");
    alice.expect_silence().await;

    // when (操作): B が切断し、A がもう一度送信する
    drop(bob);
    server.wait_for_count(2).await;
    alice.send("A: bye").await;

    // then (期待する結果):
    assert_eq!(charlie.recv().await, "A: bye");
    charlie.expect_silence().await;
    alice.expect_silence().await;
}

#[tokio::test]
async fn test_registry_size_after_connect_and_disconnect() {
    // テスト項目: 3 クライアント接続後に 1 つ切断するとレジストリには 2 つ残る
    // given (前提条件):
    let server = TestServer::start().await;
    let _alice = server.connect().await;
    let bob = server.connect().await;
    let _charlie = server.connect().await;
    assert_eq!(server.registry.count().await, 3);

    // when (操作):
    drop(bob);

    // then (期待する結果):
    server.wait_for_count(2).await;
    assert_eq!(server.registry.count().await, 2);
}

#[tokio::test]
async fn test_silent_client_disconnect_produces_no_broadcast() {
    // テスト項目: 何も送っていないクライアントの切断は何も配信せず、残りの配信に影響しない
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = server.connect().await;
    let mut bob = server.connect().await;
    let charlie = server.connect().await;

    // when (操作):
    drop(charlie);
    server.wait_for_count(2).await;

    // then (期待する結果):
    alice.expect_silence().await;
    bob.expect_silence().await;

    alice.send("A: still talking").await;
    assert_eq!(bob.recv().await, "A: still talking");
    bob.send("B: me too").await;
    assert_eq!(alice.recv().await, "B: me too");
}

#[tokio::test]
async fn test_broken_recipient_does_not_abort_broadcast() {
    // テスト項目: 送信時点で壊れている宛先があっても残りの宛先への配信は完了する
    // given (前提条件): writer が既に停止したコネクションをレジストリに残しておく
    let registry: Arc<dyn ConnectionRegistry> = Arc::new(InMemoryConnectionRegistry::new());
    let (broken_tx, broken_rx) = mpsc::channel(1);
    drop(broken_rx);
    let broken = ConnectionId::generate();
    registry.register(broken, broken_tx).await;
    let server = TestServer::start_with_registry(registry.clone()).await;
    let mut alice = server.connect().await;
    let mut bob = server.connect().await;
    let mut charlie = server.connect().await;
    assert!(registry.contains(&broken).await);

    // when (操作):
    alice.send("A: anyone there?").await;

    // then (期待する結果):
    assert_eq!(bob.recv().await, "A: anyone there?");
    assert_eq!(charlie.recv().await, "A: anyone there?");

    alice.send("A: second").await;
    assert_eq!(bob.recv().await, "A: second");
    assert_eq!(charlie.recv().await, "A: second");
    alice.expect_silence().await;
}

#[tokio::test]
async fn test_peer_dropping_mid_conversation_does_not_disturb_others() {
    // テスト項目: 送信直前にクライアントが切断しても残りの宛先には届く
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = server.connect().await;
    let bob = server.connect().await;
    let mut charlie = server.connect().await;

    // when (操作):
    drop(bob);
    alice.send("A: anyone there?").await;

    // then (期待する結果):
    assert_eq!(charlie.recv().await, "A: anyone there?");
    server.wait_for_count(2).await;
}

#[tokio::test]
async fn test_simultaneous_sends_reach_each_other() {
    // テスト項目: 2 クライアントが同時に送信しても、互いに相手のメッセージだけを 1 回受け取る
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = server.connect().await;
    let mut bob = server.connect().await;

    // when (操作):
    tokio::join!(alice.send("A: ping"), bob.send("B: pong"));

    // then (期待する結果):
    let (to_alice, to_bob) = tokio::join!(alice.recv(), bob.recv());
    assert_eq!(to_alice, "B: pong");
    assert_eq!(to_bob, "A: ping");
    alice.expect_silence().await;
    bob.expect_silence().await;
}

#[tokio::test]
async fn test_every_message_reaches_every_other_client_once() {
    // テスト項目: N クライアントがそれぞれ送信すると、各クライアントは自分以外の N-1 件を 1 回ずつ受け取る
    // given (前提条件):
    const CLIENTS: usize = 5;
    let server = TestServer::start().await;
    let mut clients = Vec::with_capacity(CLIENTS);
    for _ in 0..CLIENTS {
        clients.push(server.connect().await);
    }

    // when (操作):
    for (i, client) in clients.iter_mut().enumerate() {
        client.send(&format!("client-{}: hi", i)).await;
    }

    // then (期待する結果):
    for (i, client) in clients.iter_mut().enumerate() {
        let mut received = HashSet::new();
        for _ in 0..CLIENTS - 1 {
            assert!(received.insert(client.recv().await), "duplicate delivery");
        }
        let expected: HashSet<String> = (0..CLIENTS)
            .filter(|j| *j != i)
            .map(|j| format!("client-{}: hi", j))
            .collect();
        assert_eq!(received, expected);
    }
    for client in clients.iter_mut() {
        client.expect_silence().await;
    }
}

#[tokio::test]
async fn test_empty_lines_are_not_relayed() {
    // テスト項目: 空行は中継されない
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = server.connect().await;
    let mut bob = server.connect().await;

    // when (操作):
    alice.send("").await;
    alice.send("A: after blank").await;

    // then (期待する結果):
    assert_eq!(bob.recv().await, "A: after blank");
    bob.expect_silence().await;
}

#[tokio::test]
async fn test_payload_is_relayed_unmodified() {
    // テスト項目: ペイロードは解釈・加工されずにそのまま中継される
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = server.connect().await;
    let mut bob = server.connect().await;
    let payload = "  no name prefix: 🦀 こんにちは \t ";

    // when (操作):
    alice.send(payload).await;

    // then (期待する結果):
    assert_eq!(bob.recv().await, payload);
}

#[tokio::test]
async fn test_crlf_terminated_lines_are_normalized() {
    // テスト項目: CRLF で終わる行は LF 終端で中継される
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = server.connect().await;
    let mut bob = server.connect().await;

    // when (操作):
    alice.send("A: windows\r").await;

    // then (期待する結果):
    assert_eq!(bob.recv().await, "A: windows");
}

#[tokio::test]
async fn test_lone_carriage_return_stays_in_one_line() {
    // テスト項目: 単独の CR では行が分割されず、1 行として中継される
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = server.connect().await;
    let mut bob = server.connect().await;

    // when (操作):
    alice.send("A: one\rA: two").await;

    // then (期待する結果):
    assert_eq!(bob.recv().await, "A: one\rA: two");
    bob.expect_silence().await;
}

#[tokio::test]
async fn test_shutdown_stops_accept_loop() {
    // テスト項目: シャットダウン信号で accept ループが正常終了する
    // given (前提条件):
    let server = TestServer::start().await;
    let _alice = server.connect().await;

    // when (操作):
    let result = server.stop().await;

    // then (期待する結果):
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_bind_to_used_port_fails() {
    // テスト項目: 使用中のポートへの bind は ServerError::Bind になる
    // given (前提条件):
    let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = occupied.local_addr().unwrap().port();

    // when (操作):
    let result = Server::bind(&ServerConfig::new("127.0.0.1", port)).await;

    // then (期待する結果):
    assert!(matches!(result, Err(ServerError::Bind { .. })));
}

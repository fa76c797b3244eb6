//! Per-connection handler: read loop, relay and cleanup.

use std::{io, net::SocketAddr, sync::Arc, time::Duration};

use linecast_shared::protocol::{decode_line, frame_line};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    sync::mpsc,
    task::JoinHandle,
};

use crate::domain::{
    ConnectionId, ConnectionRegistry, HandlerState, Message, OUTBOUND_QUEUE_CAPACITY,
};

/// How long cleanup waits for queued lines to be flushed before the writer
/// task is aborted.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Longest accepted line, terminator excluded. A peer exceeding it is
/// disconnected.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Why a handler left its read loop.
#[derive(Debug)]
pub enum ExitReason {
    /// The peer closed its side of the stream
    EndOfStream,
    /// Reading from the transport failed
    ReadFailed(io::Error),
    /// The writer task stopped because writing to the peer failed
    WriteFailed,
    /// The peer sent more than `MAX_LINE_BYTES` without a line terminator
    LineTooLong,
    /// `run` was called on a handler that had already left `Active`
    AlreadyClosed,
}

/// Owns the lifecycle of one accepted connection.
///
/// # Example
///
/// ```ignore
/// let (reader, writer) = stream.into_split();
/// let mut handler = ConnectionHandler::new(ConnectionId::generate(), Some(peer), registry);
/// handler.run(reader, writer).await;
/// ```
pub struct ConnectionHandler {
    id: ConnectionId,
    peer: Option<SocketAddr>,
    registry: Arc<dyn ConnectionRegistry>,
    state: HandlerState,
}

impl ConnectionHandler {
    pub fn new(
        id: ConnectionId,
        peer: Option<SocketAddr>,
        registry: Arc<dyn ConnectionRegistry>,
    ) -> Self {
        Self {
            id,
            peer,
            registry,
            state: HandlerState::Active,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> HandlerState {
        self.state
    }

    /// Drive the connection from registration to teardown.
    ///
    /// Registers before the first read, relays every non-empty line to all
    /// other connections and cleans up exactly once when either the read
    /// side ends or the writer task stops.
    pub async fn run<R, W>(&mut self, reader: R, writer: W) -> ExitReason
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        if self.state != HandlerState::Active {
            return ExitReason::AlreadyClosed;
        }

        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        self.registry.register(self.id, tx).await;
        tracing::info!(
            connection_id = %self.id.short(),
            peer = ?self.peer,
            "Client connected"
        );

        let mut writer_task = pusher_loop(rx, writer, self.id);

        // Prefer the read side's reason when both finish together.
        let (reason, writer_finished) = tokio::select! {
            biased;
            reason = self.read_loop(reader) => (reason, false),
            _ = &mut writer_task => (ExitReason::WriteFailed, true),
        };

        // A finished JoinHandle must not be polled again
        let pending_writer = if writer_finished { None } else { Some(writer_task) };
        self.close(&reason, pending_writer).await;
        reason
    }

    async fn read_loop<R>(&self, reader: R) -> ExitReason
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            // One extra byte leaves room for the terminator of a maximal line
            let mut limited = (&mut reader).take(MAX_LINE_BYTES as u64 + 1);
            match limited.read_until(b'\n', &mut buf).await {
                Ok(0) => return ExitReason::EndOfStream,
                Ok(n) if n > MAX_LINE_BYTES && buf.last() != Some(&b'\n') => {
                    return ExitReason::LineTooLong;
                }
                Ok(_) => {
                    let message = Message::from(decode_line(&buf));
                    if message.is_empty() {
                        tracing::trace!(connection_id = %self.id.short(), "Skipping empty line");
                        continue;
                    }
                    self.relay(&message).await;
                }
                Err(e) => return ExitReason::ReadFailed(e),
            }
        }
    }

    /// Send `message` to every other registered connection.
    async fn relay(&self, message: &Message) {
        tracing::debug!(connection_id = %self.id.short(), "Received: {}", message);

        let report = self.registry.broadcast(message, &self.id).await;
        if report.is_complete() {
            tracing::debug!(
                connection_id = %self.id.short(),
                delivered = report.delivered,
                "Broadcasted message"
            );
        } else {
            tracing::warn!(
                connection_id = %self.id.short(),
                attempted = report.attempted(),
                failed = report.failures.len(),
                "Broadcasted message with failed deliveries"
            );
        }
    }

    /// Unregister and release the transport.
    ///
    /// Each step runs even if the one before it reported a problem.
    async fn close(&mut self, reason: &ExitReason, writer_task: Option<JoinHandle<()>>) {
        if self.state == HandlerState::Closed {
            return;
        }
        self.state = self.state.advance(HandlerState::Closing);

        match reason {
            ExitReason::ReadFailed(e) => tracing::info!(
                connection_id = %self.id.short(),
                peer = ?self.peer,
                "Client disconnected: {}",
                e
            ),
            ExitReason::LineTooLong => tracing::warn!(
                connection_id = %self.id.short(),
                peer = ?self.peer,
                "Client sent a line longer than {} bytes, disconnecting",
                MAX_LINE_BYTES
            ),
            _ => tracing::info!(
                connection_id = %self.id.short(),
                peer = ?self.peer,
                "Client disconnected"
            ),
        }

        // Dropping the registry entry drops the last long-lived sender, so
        // the writer task drains what is queued and shuts the write half.
        if !self.registry.unregister(&self.id).await {
            tracing::debug!(
                connection_id = %self.id.short(),
                "Connection was not registered at cleanup"
            );
        }

        if let Some(mut writer_task) = writer_task {
            match tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer_task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(
                    connection_id = %self.id.short(),
                    "Writer task ended abnormally: {}",
                    e
                ),
                Err(_) => {
                    writer_task.abort();
                    tracing::debug!(
                        connection_id = %self.id.short(),
                        "Writer did not drain in time, aborted"
                    );
                }
            }
        }

        self.state = self.state.advance(HandlerState::Closed);
    }
}

/// Spawns a task that receives messages from the rx channel and writes them
/// to the connection.
///
/// The task ends when every sender is gone or a write fails; either way it
/// tries to shut the write half down before returning.
fn pusher_loop<W>(
    mut rx: mpsc::Receiver<Message>,
    mut writer: W,
    id: ConnectionId,
) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = write_line(&mut writer, &message).await {
                tracing::debug!(connection_id = %id.short(), "Failed to write to client: {}", e);
                break;
            }
        }

        if let Err(e) = writer.shutdown().await {
            tracing::debug!(connection_id = %id.short(), "Failed to shut down writer: {}", e);
        }
    })
}

async fn write_line<W>(writer: &mut W, message: &Message) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame_line(message.as_str()).as_bytes()).await?;
    writer.flush().await
}

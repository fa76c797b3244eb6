//! TCP client session management.

use std::sync::Arc;

use linecast_shared::{
    protocol::{compose_chat_line, decode_line, frame_line},
    time::{Clock, SystemClock},
};
use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    net::TcpStream,
    sync::mpsc,
};

use crate::{error::ClientError, formatter::MessageFormatter, ui::redisplay_prompt};

/// How the receiving side of a session ended
#[derive(Debug, PartialEq, Eq)]
enum ReceiveEnd {
    /// The server closed the stream
    Closed,
    /// Reading from the stream failed
    Failed,
}

/// How the sending side of a session ended
#[derive(Debug, PartialEq, Eq)]
enum SendEnd {
    /// The user ended input (Ctrl+C / Ctrl+D)
    InputClosed,
    /// Writing to the stream failed
    WriteFailed,
}

/// Run one chat session against `addr` as `display_name`
///
/// Returns `Ok(())` when the user ends input, or `ClientError::ConnectionLost`
/// when the server goes away.
pub async fn run_client_session(addr: &str, display_name: &str) -> Result<(), ClientError> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|source| ClientError::Connect {
            addr: addr.to_string(),
            source,
        })?;
    tracing::info!("Connected to relay at {}", addr);
    print!("{}", MessageFormatter::format_connected(display_name, addr));

    let (reader, writer) = stream.into_split();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Spawn a task to handle incoming lines
    let mut read_task = tokio::spawn(receive_loop(
        reader,
        display_name.to_string(),
        clock.clone(),
    ));

    // Spawn a blocking thread for rustyline (synchronous readline)
    let (input_tx, input_rx) = mpsc::unbounded_channel::<String>();
    let prompt = format!("{}> ", display_name);
    let _readline_handle = std::thread::spawn(move || readline_loop(&prompt, input_tx));

    // Spawn a task to send typed lines to the server
    let mut write_task = tokio::spawn(send_loop(
        writer,
        input_rx,
        display_name.to_string(),
        clock,
    ));

    // If any one of the tasks completes, abort the other
    tokio::select! {
        read_result = &mut read_task => {
            write_task.abort();
            tracing::debug!("Receive loop ended: {:?}", read_result);
            print!("{}", MessageFormatter::format_connection_closed());
            Err(ClientError::ConnectionLost)
        }
        write_result = &mut write_task => {
            read_task.abort();
            match write_result {
                Ok(SendEnd::InputClosed) => Ok(()),
                Ok(SendEnd::WriteFailed) | Err(_) => {
                    print!("{}", MessageFormatter::format_connection_closed());
                    Err(ClientError::ConnectionLost)
                }
            }
        }
    }
}

/// Read lines from the server and render them until the stream ends.
async fn receive_loop<R>(reader: R, display_name: String, clock: Arc<dyn Clock>) -> ReceiveEnd
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                tracing::info!("Server closed the connection");
                return ReceiveEnd::Closed;
            }
            Ok(_) => {
                let line = decode_line(&buf);
                print!(
                    "{}",
                    MessageFormatter::format_incoming(&line, clock.now_jst_millis())
                );
                redisplay_prompt(&display_name);
            }
            Err(e) => {
                tracing::warn!("Read error: {}", e);
                return ReceiveEnd::Failed;
            }
        }
    }
}

/// Send every typed line as `"<name>: <text>"` and render it locally.
async fn send_loop<W>(
    mut writer: W,
    mut input_rx: mpsc::UnboundedReceiver<String>,
    display_name: String,
    clock: Arc<dyn Clock>,
) -> SendEnd
where
    W: AsyncWrite + Unpin,
{
    while let Some(text) = input_rx.recv().await {
        let line = frame_line(&compose_chat_line(&display_name, &text));
        if let Err(e) = write_all_and_flush(&mut writer, line.as_bytes()).await {
            tracing::warn!("Failed to send message: {}", e);
            return SendEnd::WriteFailed;
        }

        print!(
            "{}",
            MessageFormatter::format_own_message(&display_name, &text, clock.now_jst_millis())
        );
        redisplay_prompt(&display_name);
    }

    if let Err(e) = writer.shutdown().await {
        tracing::debug!("Failed to shut down writer: {}", e);
    }
    SendEnd::InputClosed
}

async fn write_all_and_flush<W>(writer: &mut W, bytes: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(bytes).await?;
    writer.flush().await
}

/// Read lines from the terminal and forward the non-blank ones.
fn readline_loop(prompt: &str, input_tx: mpsc::UnboundedSender<String>) {
    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Failed to initialize readline: {}", e);
            return;
        }
    };

    loop {
        match rl.readline(prompt) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                rl.add_history_entry(line.as_str()).ok();
                if input_tx.send(line).is_err() {
                    // Channel closed, exit thread
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C
                tracing::info!("Interrupted");
                break;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D
                tracing::info!("EOF");
                break;
            }
            Err(err) => {
                tracing::error!("Readline error: {}", err);
                break;
            }
        }
    }
}

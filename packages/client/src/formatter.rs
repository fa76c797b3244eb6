//! Message formatting utilities for client display.

use linecast_shared::{protocol::compose_chat_line, time::timestamp_to_jst_clock};

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format the banner shown right after connecting
    pub fn format_connected(display_name: &str, addr: &str) -> String {
        format!(
            "\nConnected to {} as '{}'. Type messages and press Enter to send. Press Ctrl+C to exit.\n\n",
            addr, display_name
        )
    }

    /// Format a line relayed from another client
    ///
    /// # Arguments
    ///
    /// * `line` - The line as received, without terminator
    /// * `received_at` - Unix timestamp when the line arrived (milliseconds)
    pub fn format_incoming(line: &str, received_at: i64) -> String {
        format!("\n[{}] {}\n", timestamp_to_jst_clock(received_at), line)
    }

    /// Format this client's own message
    ///
    /// The server never echoes a line back, so the client renders its own.
    pub fn format_own_message(display_name: &str, text: &str, sent_at: i64) -> String {
        format!(
            "[{}] {} (me)\n",
            timestamp_to_jst_clock(sent_at),
            compose_chat_line(display_name, text)
        )
    }

    /// Format the notice shown when the server closes the stream
    pub fn format_connection_closed() -> String {
        "\nConnection closed.\n".to_string()
    }
}

//! Wire protocol helpers.
//!
//! The relay speaks newline-delimited UTF-8 text. There is no length prefix,
//! no envelope and no handshake: a line is an opaque payload. Clients prefix
//! their own lines with `"<name>: "` by convention; the server never looks
//! inside.

/// Default host the server binds to and the client connects to.
pub const DEFAULT_HOST: &str = "localhost";

/// Default TCP port of the relay.
pub const DEFAULT_PORT: u16 = 1234;

/// Line terminator appended to every outbound line.
pub const LINE_TERMINATOR: char = '\n';

/// Strip a single trailing `"\n"` or `"\r\n"` from `line`.
///
/// Nothing else is trimmed; leading and trailing spaces are payload. Only
/// `\n` ends a line: a lone `\r` inside a line is kept as payload.
pub fn trim_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Append the line terminator to `payload`.
pub fn frame_line(payload: &str) -> String {
    let mut framed = String::with_capacity(payload.len() + 1);
    framed.push_str(payload);
    framed.push(LINE_TERMINATOR);
    framed
}

/// Decode raw bytes read up to (and including) a line terminator.
///
/// Invalid UTF-8 is replaced with U+FFFD rather than rejected, so a single
/// malformed byte never tears down a connection.
pub fn decode_line(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    trim_line_ending(&text).to_string()
}

/// Build a chat line following the `"<name>: <text>"` convention.
pub fn compose_chat_line(display_name: &str, text: &str) -> String {
    format!("{}: {}", display_name, text)
}

//! UI utilities for the client.

use std::io::Write;

use rustyline::DefaultEditor;

use crate::error::ClientError;

const NAME_PROMPT: &str = "Enter your name: ";

/// Redisplay the prompt after receiving a message
pub fn redisplay_prompt(display_name: &str) {
    print!("{}> ", display_name);
    std::io::stdout().flush().ok();
}

/// Ask for a display name until a non-blank one is entered
pub fn prompt_display_name() -> Result<String, ClientError> {
    let mut rl = DefaultEditor::new()?;
    loop {
        let name = rl.readline(NAME_PROMPT)?;
        let name = name.trim();
        if !name.is_empty() {
            return Ok(name.to_string());
        }
    }
}

//! Prompt helpers for the console client.

use std::io::Write;

use crate::domain::UserId;

pub fn prompt_for(identity: &UserId) -> String {
    format!("{}> ", identity)
}

/// Print output from an event and redisplay the prompt after it
pub fn print_event(text: &str, identity: &UserId) {
    print!("{}{}", text, prompt_for(identity));
    std::io::stdout().flush().ok();
}

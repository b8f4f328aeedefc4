//! Chat prompt template.
//!
//! The model sees a fixed two-line instruction, the user's turn, and an open
//! `AI:` turn to continue from. Generation is cut at the next `User:` marker.

pub const SYSTEM_PREAMBLE: &str =
    "You are a helpful AI assistant.\nAnswer questions concisely and accurately.";

pub const USER_PREFIX: &str = "User: ";
pub const ASSISTANT_PREFIX: &str = "AI:";

/// Builds the completion prompt for an already trimmed, non-empty message.
pub fn build_prompt(message: &str) -> String {
    format!("{SYSTEM_PREAMBLE}\n\n{USER_PREFIX}{message}\n\n{ASSISTANT_PREFIX}")
}

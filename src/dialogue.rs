//! Conversation state and command parsing for chats with the bot.

use serde::{Deserialize, Serialize};
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};

/// Telegram rejects messages longer than this
pub const MAX_PROMPT_LENGTH: usize = 4096;

/// Per-chat conversation state
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum ChatState {
    #[default]
    Idle,
    /// `/track` was sent; the next photo is analysed for calories
    AwaitingMealPhoto { language_code: Option<String> },
}

/// Type alias for our chat dialogue
pub type ChatDialogue = Dialogue<ChatState, InMemStorage<ChatState>>;

/// Commands the bot understands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Track,
    Cancel,
}

/// Parse a bot command, accepting the `/cmd@BotName` form used in groups
///
/// Returns `None` for plain text and unknown commands.
pub fn parse_command(text: &str) -> Option<Command> {
    let first_word = text.split_whitespace().next()?;
    let command = first_word.strip_prefix('/')?;
    let name = command.split('@').next().unwrap_or(command);

    match name.to_ascii_lowercase().as_str() {
        "start" => Some(Command::Start),
        "help" => Some(Command::Help),
        "track" => Some(Command::Track),
        "cancel" => Some(Command::Cancel),
        _ => None,
    }
}

/// Validates a text prompt before it is sent to the model
pub fn validate_prompt(text: &str) -> Result<String, &'static str> {
    let trimmed = text.trim();

    if trimmed.is_empty() {
        return Err("empty");
    }

    if trimmed.chars().count() > MAX_PROMPT_LENGTH {
        return Err("too_long");
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_validation() {
        assert!(validate_prompt("How many calories in an apple?").is_ok());
        assert_eq!(validate_prompt("  hi  ").unwrap(), "hi");

        assert_eq!(validate_prompt(""), Err("empty"));
        assert_eq!(validate_prompt(" \n\t "), Err("empty"));
        assert_eq!(validate_prompt(&"a".repeat(4097)), Err("too_long"));
    }

    #[test]
    fn test_default_state_is_idle() {
        assert_eq!(ChatState::default(), ChatState::Idle);
    }
}

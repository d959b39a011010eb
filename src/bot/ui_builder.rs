//! UI Builder module for formatting bot messages

use teloxide::utils::html;

use crate::localization::t_lang;
use crate::vision_errors::VisionError;

/// Telegram's maximum message length in characters
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// HTML welcome message sent on `/start`
pub fn start_message(language_code: Option<&str>) -> String {
    format!(
        "<b>{}</b>\n\n{}\n\n{}\n{}\n{}\n{}\n{}",
        html::escape(&t_lang("welcome-title", language_code)),
        html::escape(&t_lang("welcome-description", language_code)),
        html::escape(&t_lang("welcome-commands", language_code)),
        html::escape(&t_lang("command-start", language_code)),
        html::escape(&t_lang("command-help", language_code)),
        html::escape(&t_lang("command-track", language_code)),
        html::escape(&t_lang("command-cancel", language_code)),
    )
}

/// Plain text help message sent on `/help`
pub fn help_message(language_code: Option<&str>) -> String {
    [
        t_lang("help-title", language_code),
        t_lang("help-text", language_code),
        [
            t_lang("command-start", language_code),
            t_lang("command-help", language_code),
            t_lang("command-track", language_code),
            t_lang("command-cancel", language_code),
        ]
        .join("\n"),
    ]
    .join("\n\n")
}

/// Localization key for the message shown when a Gemini request fails
pub fn error_message_key(error: &VisionError) -> &'static str {
    match error {
        VisionError::UnsupportedFormat(_) => "error-unsupported-format",
        VisionError::EmptyResponse(_) => "error-empty-reply",
        VisionError::CircuitOpen(_) => "error-service-unavailable",
        e if e.is_retryable() => "error-service-unavailable",
        _ => "error-generation",
    }
}

fn is_marker(chars: &[char], index: usize) -> bool {
    chars[index] == '*' && (index == 0 || chars[index - 1] != '\\')
}

/// Split `text` into chunks of at most `max_chars` characters
///
/// Breaks after the last newline inside the window when there is one, and
/// never ends a chunk on a backslash, which would detach it from the
/// character it escapes. A chunk that would leave an emphasis span open is
/// cut before its opening `*` instead, unless the span starts the chunk.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut end = (start + max_chars).min(chars.len());

        if end < chars.len() {
            if let Some(pos) = chars[start..end].iter().rposition(|&c| c == '\n') {
                if pos > 0 {
                    end = start + pos + 1;
                }
            }
            while end > start + 1 && chars[end - 1] == '\\' {
                end -= 1;
            }

            let markers: Vec<usize> = (start..end).filter(|&i| is_marker(&chars, i)).collect();
            if markers.len() % 2 == 1 {
                if let Some(&open) = markers.last() {
                    if open > start {
                        end = open;
                    }
                }
            }
        }

        chunks.push(chars[start..end].iter().collect());
        start = end;
    }

    chunks
}

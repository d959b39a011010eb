//! Message Handler module for processing incoming Telegram messages

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, FileId, ForceReply, ParseMode};
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use crate::config::BotConfig;
use crate::dialogue::{parse_command, validate_prompt, ChatDialogue, ChatState, Command, MAX_PROMPT_LENGTH};
use crate::gemini::VisionClient;
use crate::localization::{t_args_lang, t_lang};
use crate::markdown::escape_markdown;

use super::ui_builder::{
    error_message_key, help_message, split_message, start_message, TELEGRAM_MESSAGE_LIMIT,
};

fn user_language(msg: &Message) -> Option<&str> {
    msg.from
        .as_ref()
        .and_then(|user| user.language_code.as_deref())
}

/// Download a Telegram file into a temp file that keeps the original extension
pub async fn download_file(bot: &Bot, file_id: FileId) -> Result<NamedTempFile> {
    let file = bot.get_file(file_id).await?;
    let extension = Path::new(&file.path)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("jpg")
        .to_string();
    let url = format!(
        "https://api.telegram.org/file/bot{}/{}",
        bot.token(),
        file.path
    );

    let response = reqwest::get(&url)
        .await
        .map_err(reqwest::Error::without_url)?
        .error_for_status()
        .map_err(reqwest::Error::without_url)?;
    let bytes = response.bytes().await?;

    let mut temp_file = tempfile::Builder::new()
        .prefix("meal-")
        .suffix(&format!(".{extension}"))
        .tempfile()
        .context("Failed to create temporary image file")?;
    temp_file.as_file_mut().write_all(&bytes)?;

    Ok(temp_file)
}

/// Escape a model reply and deliver it as MarkdownV2
///
/// If Telegram rejects the first chunk, the unescaped reply is sent as plain
/// text instead. A later rejected chunk is resent without a parse mode.
pub async fn send_reply(bot: &Bot, chat_id: ChatId, reply: &str) -> Result<()> {
    let escaped = escape_markdown(reply);
    let chunks = split_message(&escaped, TELEGRAM_MESSAGE_LIMIT);

    for (index, chunk) in chunks.iter().enumerate() {
        let sent = bot
            .send_message(chat_id, chunk)
            .parse_mode(ParseMode::MarkdownV2)
            .await;

        if let Err(e) = sent {
            warn!(user_id = %chat_id, chunk = index, error = %e, "Telegram rejected MarkdownV2 reply, falling back to plain text");
            if index == 0 {
                for plain in split_message(reply, TELEGRAM_MESSAGE_LIMIT) {
                    bot.send_message(chat_id, plain).await?;
                }
                return Ok(());
            }
            bot.send_message(chat_id, chunk).await?;
        }
    }

    debug!(user_id = %chat_id, chunks = chunks.len(), "Reply delivered");
    Ok(())
}

async fn ask_model(
    bot: &Bot,
    chat_id: ChatId,
    vision: &VisionClient,
    image_path: Option<&Path>,
    prompt: &str,
    language_code: Option<&str>,
) -> Result<()> {
    match vision.response(image_path, prompt).await {
        Ok(reply) => send_reply(bot, chat_id, &reply).await,
        Err(e) => {
            error!(user_id = %chat_id, error = %e, "Gemini request failed for user");
            bot.send_message(chat_id, t_lang(error_message_key(&e), language_code))
                .await?;
            Ok(())
        }
    }
}

pub async fn download_and_process_image(
    bot: &Bot,
    file_id: FileId,
    chat_id: ChatId,
    prompt: &str,
    language_code: Option<&str>,
    vision: &VisionClient,
) -> Result<()> {
    let temp_file = match download_file(bot, file_id).await {
        Ok(file) => {
            debug!(user_id = %chat_id, temp_path = %file.path().display(), "Image downloaded successfully");
            file
        }
        Err(e) => {
            error!(user_id = %chat_id, error = %e, "Failed to download image for user");
            bot.send_message(chat_id, t_lang("error-download-failed", language_code))
                .await?;
            return Ok(());
        }
    };

    bot.send_message(chat_id, t_lang("processing-photo", language_code))
        .await?;
    bot.send_chat_action(chat_id, ChatAction::Typing).await?;

    let result = ask_model(
        bot,
        chat_id,
        vision,
        Some(temp_file.path()),
        prompt,
        language_code,
    )
    .await;

    // Always clean up the temporary file
    let temp_path = temp_file.path().display().to_string();
    if let Err(cleanup_err) = temp_file.close() {
        error!(temp_path = %temp_path, error = %cleanup_err, "Failed to clean up temporary file");
    } else {
        debug!(temp_path = %temp_path, "Temporary file cleaned up successfully");
    }

    result
}

async fn handle_command(
    bot: &Bot,
    msg: &Message,
    dialogue: ChatDialogue,
    command: Command,
    language_code: Option<&str>,
) -> Result<()> {
    info!(user_id = %msg.chat.id, command = ?command, "Received command");

    match command {
        Command::Start => {
            dialogue.exit().await?;
            bot.send_message(msg.chat.id, start_message(language_code))
                .parse_mode(ParseMode::Html)
                .reply_markup(ForceReply::new().selective())
                .await?;
        }
        Command::Help => {
            bot.send_message(msg.chat.id, help_message(language_code))
                .await?;
        }
        Command::Track => {
            dialogue
                .update(ChatState::AwaitingMealPhoto {
                    language_code: language_code.map(|s| s.to_string()),
                })
                .await?;
            bot.send_message(msg.chat.id, t_lang("track-started", language_code))
                .await?;
        }
        Command::Cancel => {
            let key = match dialogue.get().await? {
                Some(ChatState::AwaitingMealPhoto { .. }) => {
                    dialogue.exit().await?;
                    "track-cancelled"
                }
                _ => "nothing-to-cancel",
            };
            bot.send_message(msg.chat.id, t_lang(key, language_code))
                .await?;
        }
    }

    Ok(())
}

async fn handle_text_message(
    bot: &Bot,
    msg: &Message,
    dialogue: ChatDialogue,
    vision: &VisionClient,
) -> Result<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let language_code = user_language(msg);
    debug!(user_id = %msg.chat.id, message_length = text.len(), "Received text message from user");

    if let Some(command) = parse_command(text) {
        return handle_command(bot, msg, dialogue, command, language_code).await;
    }

    match dialogue.get().await?.unwrap_or_default() {
        ChatState::AwaitingMealPhoto {
            language_code: dialogue_lang_code,
        } => {
            let effective_language_code = dialogue_lang_code.as_deref().or(language_code);
            bot.send_message(
                msg.chat.id,
                t_lang("track-waiting-photo", effective_language_code),
            )
            .await?;
        }
        ChatState::Idle => {
            let prompt = match validate_prompt(text) {
                Ok(prompt) => prompt,
                Err("too_long") => {
                    let max = MAX_PROMPT_LENGTH.to_string();
                    bot.send_message(
                        msg.chat.id,
                        t_args_lang("error-prompt-too-long", &[("max", &max)], language_code),
                    )
                    .await?;
                    return Ok(());
                }
                Err(_) => {
                    bot.send_message(msg.chat.id, t_lang("error-empty-prompt", language_code))
                        .await?;
                    return Ok(());
                }
            };

            bot.send_chat_action(msg.chat.id, ChatAction::Typing).await?;
            ask_model(bot, msg.chat.id, vision, None, &prompt, language_code).await?;
        }
    }

    Ok(())
}

/// Prompt for an image: the caption unless the chat is tracking a meal
fn image_prompt<'a>(
    state: &ChatState,
    caption: Option<&'a str>,
    config: &'a BotConfig,
) -> &'a str {
    match (state, caption.map(str::trim)) {
        (ChatState::Idle, Some(caption)) if !caption.is_empty() => caption,
        _ => config.track_food_prompt.as_str(),
    }
}

async fn handle_image(
    bot: &Bot,
    msg: &Message,
    dialogue: ChatDialogue,
    file_id: FileId,
    vision: &VisionClient,
    config: &BotConfig,
) -> Result<()> {
    let state = dialogue.get().await?.unwrap_or_default();
    let language_code = match &state {
        ChatState::AwaitingMealPhoto {
            language_code: Some(code),
        } => Some(code.as_str()),
        _ => user_language(msg),
    };
    let prompt = image_prompt(&state, msg.caption(), config);

    download_and_process_image(bot, file_id, msg.chat.id, prompt, language_code, vision).await?;

    if state != ChatState::Idle {
        dialogue.exit().await?;
    }
    Ok(())
}

async fn handle_photo_message(
    bot: &Bot,
    msg: &Message,
    dialogue: ChatDialogue,
    vision: &VisionClient,
    config: &BotConfig,
) -> Result<()> {
    debug!(user_id = %msg.chat.id, "Received photo message from user");

    if let Some(largest_photo) = msg.photo().and_then(|photos| photos.last()) {
        handle_image(bot, msg, dialogue, largest_photo.file.id.clone(), vision, config).await?;
    }
    Ok(())
}

async fn handle_document_message(
    bot: &Bot,
    msg: &Message,
    dialogue: ChatDialogue,
    vision: &VisionClient,
    config: &BotConfig,
) -> Result<()> {
    let language_code = user_language(msg);

    if let Some(doc) = msg.document() {
        match &doc.mime_type {
            Some(mime_type) if mime_type.to_string().starts_with("image/") => {
                debug!(user_id = %msg.chat.id, mime_type = %mime_type, "Received image document from user");
                handle_image(bot, msg, dialogue, doc.file.id.clone(), vision, config).await?;
            }
            Some(mime_type) => {
                debug!(user_id = %msg.chat.id, mime_type = %mime_type, "Received non-image document from user");
                bot.send_message(
                    msg.chat.id,
                    t_lang("error-unsupported-format", language_code),
                )
                .await?;
            }
            None => {
                debug!(user_id = %msg.chat.id, "Received document without mime type from user");
                bot.send_message(msg.chat.id, t_lang("error-no-mime-type", language_code))
                    .await?;
            }
        }
    }
    Ok(())
}

async fn handle_unsupported_message(bot: &Bot, msg: &Message) -> Result<()> {
    debug!(user_id = %msg.chat.id, "Received unsupported message type from user");
    bot.send_message(
        msg.chat.id,
        t_lang("unsupported-message", user_language(msg)),
    )
    .await?;
    Ok(())
}

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    dialogue: ChatDialogue,
    vision: Arc<VisionClient>,
    config: Arc<BotConfig>,
) -> Result<()> {
    if msg.text().is_some() {
        handle_text_message(&bot, &msg, dialogue, &vision).await?;
    } else if msg.photo().is_some() {
        handle_photo_message(&bot, &msg, dialogue, &vision, &config).await?;
    } else if msg.document().is_some() {
        handle_document_message(&bot, &msg, dialogue, &vision, &config).await?;
    } else {
        handle_unsupported_message(&bot, &msg).await?;
    }

    Ok(())
}

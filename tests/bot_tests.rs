//! # Bot Formatting Tests
//!
//! Welcome/help texts, reply splitting, and reply delivery against a mock
//! Bot API server.

use nutribot::bot::{help_message, send_reply, split_message, start_message};
use nutribot::bot::ui_builder::TELEGRAM_MESSAGE_LIMIT;
use nutribot::markdown::escape_markdown;

#[cfg(test)]
mod tests {
    use super::*;

    /// Test the HTML welcome message
    #[test]
    fn test_start_message_is_html() {
        let message = start_message(Some("en"));

        assert!(message.starts_with("<b>Ready to get fit?!</b>"));
        assert!(message.contains("/track"));
        assert!(message.contains("/cancel"));
    }

    #[test]
    fn test_start_message_localized() {
        let message = start_message(Some("fr"));
        assert!(message.contains("Prêt à te remettre en forme"));
    }

    #[test]
    fn test_help_lists_commands() {
        let message = help_message(None);
        for command in ["/start", "/help", "/track", "/cancel"] {
            assert!(message.contains(command), "help is missing {command}");
        }
    }

    /// Test that a long escaped reply splits into Telegram-sized chunks
    #[test]
    fn test_long_reply_chunks() {
        let reply = "1. Rice - 200 calories\n".repeat(400);
        let escaped = escape_markdown(&reply);
        let chunks = split_message(&escaped, TELEGRAM_MESSAGE_LIMIT);

        assert!(chunks.len() > 1);
        assert_eq!(chunks.concat(), escaped);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= TELEGRAM_MESSAGE_LIMIT);
            assert!(chunk.ends_with('\n') || chunk == chunks.last().unwrap());
            assert!(!chunk.ends_with('\\'));
        }
    }

    /// Test hard splitting when a line is longer than the limit
    #[test]
    fn test_split_without_newlines() {
        let text = "ab".repeat(10);
        let chunks = split_message(&text, 6);

        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0], "ababab");
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_split_counts_characters() {
        let text = "é".repeat(10);
        let chunks = split_message(&text, 4);

        assert_eq!(chunks, vec!["éééé", "éééé", "éé"]);
    }

    mod delivery {
        use super::*;
        use mockito::{Matcher, Mock, Server, ServerGuard};
        use teloxide::prelude::*;

        const TEST_BOT_TOKEN: &str = "123456:test_bot_token";
        const CHAT: ChatId = ChatId(123);

        fn bot_for(server: &Server) -> Bot {
            let url = reqwest::Url::parse(&server.url()).unwrap();
            Bot::new(TEST_BOT_TOKEN).set_api_url(url)
        }

        fn send_message_path() -> Matcher {
            Matcher::Regex("(?i)/sendmessage$".to_string())
        }

        fn sent_body(text: &str) -> String {
            serde_json::json!({
                "ok": true,
                "result": {
                    "message_id": 1,
                    "date": 1706529600,
                    "chat": { "id": 123, "type": "private", "first_name": "Test" },
                    "from": { "id": 123456, "is_bot": true, "first_name": "NutriBot", "username": "nutribot" },
                    "text": text
                }
            })
            .to_string()
        }

        fn rejected_body() -> &'static str {
            r#"{"ok":false,"error_code":400,"description":"Bad Request: can't parse entities: Character '.' is reserved and must be escaped with the preceding '\\'"}"#
        }

        async fn markdown_mock(server: &mut ServerGuard, text: &str, status: usize) -> Mock {
            let body = if status == 200 {
                sent_body(text)
            } else {
                rejected_body().to_string()
            };
            server
                .mock("POST", send_message_path())
                .match_body(Matcher::PartialJson(serde_json::json!({
                    "text": text,
                    "parse_mode": "MarkdownV2"
                })))
                .with_status(status)
                .with_header("content-type", "application/json")
                .with_body(body)
                .expect(1)
                .create_async()
                .await
        }

        async fn plain_mock(server: &mut ServerGuard, text: &str) -> Mock {
            server
                .mock("POST", send_message_path())
                .match_body(Matcher::Json(serde_json::json!({
                    "chat_id": 123,
                    "text": text
                })))
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(sent_body(text))
                .expect(1)
                .create_async()
                .await
        }

        /// Test that a reply is escaped and sent as MarkdownV2
        #[tokio::test]
        async fn test_reply_sent_as_markdown() {
            let mut server = Server::new_async().await;
            let reply = "**Total: 650**\n1. Rice - 250 calories";
            let markdown = markdown_mock(&mut server, &escape_markdown(reply), 200).await;

            send_reply(&bot_for(&server), CHAT, reply).await.unwrap();

            markdown.assert_async().await;
        }

        /// Test that a rejected first chunk resends the raw reply as plain text
        #[tokio::test]
        async fn test_rejected_first_chunk_falls_back_to_raw_reply() {
            let mut server = Server::new_async().await;
            let reply = "1. Rice - 250 calories.";
            let markdown = markdown_mock(&mut server, &escape_markdown(reply), 400).await;
            let plain = plain_mock(&mut server, reply).await;

            send_reply(&bot_for(&server), CHAT, reply).await.unwrap();

            markdown.assert_async().await;
            plain.assert_async().await;
        }

        /// Test that a rejected later chunk is resent on its own without a parse mode
        #[tokio::test]
        async fn test_rejected_later_chunk_resent_plain() {
            let mut server = Server::new_async().await;
            let reply = format!("{}\nTotal - 5 kcal.", "a".repeat(4090));
            let chunks = split_message(&escape_markdown(&reply), TELEGRAM_MESSAGE_LIMIT);
            assert_eq!(chunks.len(), 2);
            assert_eq!(chunks[1], "Total \\- 5 kcal\\.");

            let first = markdown_mock(&mut server, &chunks[0], 200).await;
            let second = markdown_mock(&mut server, &chunks[1], 400).await;
            let plain = plain_mock(&mut server, &chunks[1]).await;

            send_reply(&bot_for(&server), CHAT, &reply).await.unwrap();

            first.assert_async().await;
            second.assert_async().await;
            plain.assert_async().await;
        }
    }
}

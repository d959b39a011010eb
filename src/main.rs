use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::prelude::*;
use teloxide::update_listeners::{webhooks, Polling};
use tracing::info;
use tracing_subscriber::EnvFilter;

use nutribot::bot;
use nutribot::config::BotConfig;
use nutribot::dialogue::ChatState;
use nutribot::gemini::{mask_key, VisionClient};

const DEFAULT_LOG_FILTER: &str = "info,reqwest=warn,hyper=warn";
const LONG_POLL_TIMEOUT_SECS: u64 = 42;

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    if std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    init_logging();

    info!("Starting Nutribot Telegram Bot");

    let config = BotConfig::from_env()?;
    let vision = VisionClient::from_config(&config).context("Failed to create Gemini client")?;

    info!(
        api_key = %mask_key(&config.google_api_key),
        text_model = %config.gemini.text_model,
        vision_model = %config.gemini.vision_model,
        "Gemini client initialized"
    );

    let bot = Bot::new(config.telegram_token.clone());

    let handler = Update::filter_message()
        .enter_dialogue::<Message, InMemStorage<ChatState>, ChatState>()
        .endpoint(bot::message_handler);

    let use_webhook = config.use_webhook;
    let listen_port = config.listen_port;
    let webhook_url = config.webhook_url();
    let secret_token = config.secret_token.clone();

    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .dependencies(dptree::deps![
            InMemStorage::<ChatState>::new(),
            Arc::new(vision),
            Arc::new(config)
        ])
        .enable_ctrlc_handler()
        .build();

    let error_handler = LoggingErrorHandler::with_custom_text("An error from the update listener");

    if use_webhook {
        let address = SocketAddr::from(([0, 0, 0, 0], listen_port));
        let url = webhook_url
            .parse()
            .with_context(|| format!("Invalid webhook URL: {webhook_url}"))?;

        let mut options = webhooks::Options::new(address, url);
        if let Some(secret) = secret_token {
            options = options.secret_token(secret);
        }

        info!(webhook_url = %webhook_url, port = listen_port, "Starting dispatcher with webhook");
        let listener = webhooks::axum(bot, options)
            .await
            .context("Failed to set up webhook listener")?;
        dispatcher.dispatch_with_listener(listener, error_handler).await;
    } else {
        info!(timeout_secs = LONG_POLL_TIMEOUT_SECS, "Starting dispatcher with long polling");
        let listener = Polling::builder(bot)
            .timeout(Duration::from_secs(LONG_POLL_TIMEOUT_SECS))
            .delete_webhook()
            .await
            .build();
        dispatcher.dispatch_with_listener(listener, error_handler).await;
    }

    Ok(())
}

//! # Configuration Module
//!
//! Bot, Gemini and recovery settings. Values come from the process
//! environment (after loading `.env`) and fall back to the defaults below.

use anyhow::{anyhow, Context, Result};

pub const DEFAULT_WEBHOOK_BASE_URL: &str = "http://localhost:8181";
pub const DEFAULT_LISTEN_PORT: u16 = 8181;
pub const WEBHOOK_PATH: &str = "/webhook/";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-pro";
pub const DEFAULT_VISION_MODEL: &str = "gemini-pro-vision";
pub const MAX_SECRET_TOKEN_LEN: usize = 256;

/// Prompt used for meal photos when the user gives no caption
pub const TRACK_FOOD_PROMPT: &str = "\
You are an expert nutritionist. Look at the food items in the image and calculate the total calories.
Also list every food item with its calorie intake, in descending order of calories, in this format:

1. Item 1 - no of calories
2. Item 2 - no of calories

Finally, say whether the food is healthy or not and give the percentage split of carbs, fats and protein,
in descending order of percentage, in this format:
1. Carbs - %
2. Fats - %
3. Protein - %
";

/// Retry and circuit breaker settings for Gemini requests
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Maximum number of retry attempts after the first request
    pub max_retries: u32,
    /// Base delay between retries in milliseconds
    pub base_retry_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_retry_delay_ms: u64,
    /// Consecutive failures before the circuit opens
    pub circuit_breaker_threshold: u32,
    /// Time before an open circuit lets requests through again, in seconds
    pub circuit_breaker_reset_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_retry_delay_ms: 1000, // 1 second
            max_retry_delay_ms: 10000, // 10 seconds
            circuit_breaker_threshold: 5,
            circuit_breaker_reset_secs: 60, // 1 minute
        }
    }
}

/// Generation settings sent with every `generateContent` call
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API root, without a trailing slash
    pub api_base: String,
    /// Model used for text-only prompts
    pub text_model: String,
    /// Model used when an image is attached
    pub vision_model: String,
    pub temperature: f64,
    /// 600 tokens is roughly 200 words
    pub max_output_tokens: u32,
    pub top_p: f64,
    pub top_k: u32,
    pub stop_sequences: Vec<String>,
    pub safety_category: String,
    pub safety_threshold: String,
    /// Per-request HTTP timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            temperature: 1.0,
            max_output_tokens: 600,
            top_p: 0.8,
            top_k: 10,
            stop_sequences: vec!["Title".to_string()],
            safety_category: "HARM_CATEGORY_DANGEROUS_CONTENT".to_string(),
            safety_threshold: "BLOCK_ONLY_HIGH".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Top-level bot configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Telegram bot token (`TG_BOT_TOKEN`)
    pub telegram_token: String,
    /// Secret Telegram echoes in the webhook header (`TG_SECRET_TOKEN`)
    pub secret_token: Option<String>,
    /// Public base URL the webhook is registered under (`CYCLIC_URL`)
    pub webhook_base_url: String,
    /// Webhook mode when `ENV` is set, long polling otherwise
    pub use_webhook: bool,
    /// Port the webhook server binds to (`PORT`)
    pub listen_port: u16,
    /// Google Gemini API key (`GOOGLE_API_KEY`)
    pub google_api_key: String,
    pub gemini: GeminiConfig,
    pub recovery: RecoveryConfig,
    pub track_food_prompt: String,
}

impl BotConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    ///
    /// Empty values are treated as unset.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use nutribot::config::BotConfig;
    ///
    /// let config = BotConfig::from_lookup(|key| match key {
    ///     "TG_BOT_TOKEN" => Some("123:abc".to_string()),
    ///     "GOOGLE_API_KEY" => Some("AIza-test-key".to_string()),
    ///     _ => None,
    /// })?;
    /// assert!(!config.use_webhook);
    /// assert_eq!(config.webhook_url(), "http://localhost:8181/webhook/");
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let telegram_token = get("TG_BOT_TOKEN").context("TG_BOT_TOKEN must be set")?;
        let google_api_key = get("GOOGLE_API_KEY").context("GOOGLE_API_KEY must be set")?;

        let secret_token = get("TG_SECRET_TOKEN");
        if let Some(token) = &secret_token {
            validate_secret_token(token)?;
        }

        let listen_port = match get("PORT") {
            Some(port) => port
                .trim()
                .parse::<u16>()
                .with_context(|| format!("PORT is not a valid port number: {port}"))?,
            None => DEFAULT_LISTEN_PORT,
        };

        let mut gemini = GeminiConfig::default();
        if let Some(api_base) = get("GEMINI_API_BASE") {
            gemini.api_base = api_base.trim_end_matches('/').to_string();
        }

        Ok(Self {
            telegram_token,
            secret_token,
            webhook_base_url: get("CYCLIC_URL")
                .unwrap_or_else(|| DEFAULT_WEBHOOK_BASE_URL.to_string()),
            use_webhook: get("ENV").is_some(),
            listen_port,
            google_api_key,
            gemini,
            recovery: RecoveryConfig::default(),
            track_food_prompt: TRACK_FOOD_PROMPT.to_string(),
        })
    }

    /// Full URL Telegram should deliver updates to
    pub fn webhook_url(&self) -> String {
        format!(
            "{}{}",
            self.webhook_base_url.trim_end_matches('/'),
            WEBHOOK_PATH
        )
    }
}

/// Telegram only accepts `A-Z`, `a-z`, `0-9`, `_` and `-`, 1 to 256 characters
pub fn validate_secret_token(token: &str) -> Result<()> {
    if token.is_empty() || token.len() > MAX_SECRET_TOKEN_LEN {
        return Err(anyhow!(
            "TG_SECRET_TOKEN must be between 1 and {MAX_SECRET_TOKEN_LEN} characters"
        ));
    }
    if let Some(bad) = token
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(anyhow!("TG_SECRET_TOKEN contains an invalid character: {bad:?}"));
    }
    Ok(())
}

//! # Nutribot
//!
//! A Telegram bot that relays text and meal photos to the Google Gemini API
//! and sends back the model's answer formatted as Telegram MarkdownV2.

pub mod bot;
pub mod circuit_breaker;
pub mod config;
pub mod dialogue;
pub mod gemini;
pub mod localization;
pub mod markdown;
pub mod vision_errors;

//! Bot module for handling Telegram interactions
//!
//! - `message_handler`: Handles incoming text, photo, and document messages
//! - `ui_builder`: Formats welcome/help texts and splits long replies

pub mod message_handler;
pub mod ui_builder;

// Re-export main handler function for use in main.rs
pub use message_handler::message_handler;

pub use message_handler::{download_and_process_image, download_file, send_reply};
pub use ui_builder::{help_message, split_message, start_message};

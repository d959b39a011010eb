//! # Markdown Escaping Module
//!
//! Rewrites free text produced by the language model into Telegram's
//! MarkdownV2 dialect before it is sent back to the user.
//!
//! ## Pipeline
//!
//! 1. [`escape_asterisks`] escapes lone `*` markers while leaving `**` pairs alone
//! 2. [`collapse_double_asterisks`] turns every `**` into the single `*` used for bold
//! 3. [`escape_reserved`] backslash-escapes the reserved punctuation, keeping
//!    sequences that are already escaped
//!
//! [`escape_markdown`] runs all three in order.

use lazy_static::lazy_static;
use log::trace;
use regex::Regex;

/// Characters that must always reach Telegram prefixed with a backslash.
pub const RESERVED_CHARS: [char; 11] = ['-', '.', '|', '(', ')', '[', ']', '{', '}', '!', '='];

lazy_static! {
    static ref DOUBLE_ASTERISK: Regex =
        Regex::new(r"\*{2}").expect("Double asterisk pattern should be valid");
}

/// Returns `true` if `c` belongs to [`RESERVED_CHARS`]
pub fn is_reserved(c: char) -> bool {
    RESERVED_CHARS.contains(&c)
}

/// Escapes single asterisks that are not part of a `**` pair.
///
/// A single quote or a backslash flips the "quoted" flag, and asterisks seen
/// while the flag is set are left untouched. The flag is not balanced: every
/// occurrence flips it, so an odd number of apostrophes before an asterisk
/// changes how the rest of the string is treated.
///
/// # Examples
///
/// ```rust
/// use nutribot::markdown::escape_asterisks;
///
/// assert_eq!(escape_asterisks("a*b"), "a\\*b");
/// assert_eq!(escape_asterisks("**bold**"), "**bold**");
/// ```
pub fn escape_asterisks(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut result = String::with_capacity(text.len());
    let mut in_quotes = false;
    let mut prev_char: Option<char> = None;

    for (i, &c) in chars.iter().enumerate() {
        match c {
            '\'' | '\\' => {
                in_quotes = !in_quotes;
                result.push(c);
            }
            '*' => {
                let prev_is_star = prev_char == Some('*');
                let next_is_star = chars.get(i + 1) == Some(&'*');
                if !in_quotes && !prev_is_star && !next_is_star {
                    result.push('\\');
                }
                result.push(c);
            }
            _ => result.push(c),
        }
        prev_char = Some(c);
    }

    result
}

/// Replaces every `**` with a single `*`, scanning left to right.
pub fn collapse_double_asterisks(text: &str) -> String {
    DOUBLE_ASTERISK.replace_all(text, "*").into_owned()
}

/// Backslash-escapes reserved characters that are not already escaped.
///
/// A backslash followed by a reserved character is copied through as a pair.
/// A backslash followed by anything else is copied on its own and the next
/// character is handled normally.
///
/// # Examples
///
/// ```rust
/// use nutribot::markdown::escape_reserved;
///
/// assert_eq!(escape_reserved("1. Item - 50%"), "1\\. Item \\- 50%");
/// assert_eq!(escape_reserved("done\\."), "done\\.");
/// ```
pub fn escape_reserved(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut result = String::with_capacity(text.len() + text.len() / 4);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            result.push(c);
            if let Some(&next) = chars.get(i + 1) {
                if is_reserved(next) {
                    result.push(next);
                    i += 1;
                }
            }
        } else if is_reserved(c) {
            result.push('\\');
            result.push(c);
        } else {
            result.push(c);
        }
        i += 1;
    }

    result
}

/// Converts model output into MarkdownV2-safe text.
///
/// Pure and total: every input, including the empty string, has an output.
///
/// # Examples
///
/// ```rust
/// use nutribot::markdown::escape_markdown;
///
/// assert_eq!(escape_markdown("**Total** - 540 kcal."), "*Total* \\- 540 kcal\\.");
/// ```
pub fn escape_markdown(text: &str) -> String {
    let normalized = collapse_double_asterisks(&escape_asterisks(text));
    let escaped = escape_reserved(&normalized);
    trace!(
        "Escaped markdown: {} input chars -> {} output chars",
        text.chars().count(),
        escaped.chars().count()
    );
    escaped
}

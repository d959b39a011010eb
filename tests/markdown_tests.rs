//! # Markdown Escaping Tests
//!
//! Behaviour of the MarkdownV2 escaping pipeline on realistic model output
//! and on the boundary cases of both passes.

#[cfg(test)]
mod tests {
    use nutribot::markdown::{
        collapse_double_asterisks, escape_asterisks, escape_markdown, escape_reserved,
        RESERVED_CHARS,
    };
    use pretty_assertions::assert_eq;

    /// Text without markers, quotes, backslashes or reserved characters is unchanged
    #[test]
    fn test_plain_text_is_identity() {
        for text in [
            "",
            "hello world",
            "Calories 540 kcal, 20% protein",
            "café au lait ☕ 🍎",
            "line one\nline two\ttabbed",
        ] {
            assert_eq!(escape_markdown(text), text);
        }
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(escape_markdown(""), "");
    }

    #[test]
    fn test_lone_asterisk() {
        assert_eq!(escape_markdown("*"), "\\*");
    }

    #[test]
    fn test_single_asterisk_between_letters() {
        assert_eq!(escape_markdown("a*b"), "a\\*b");
    }

    /// `**bold**` becomes `*bold*` with no backslash before either marker
    #[test]
    fn test_double_asterisks_collapse_to_bold() {
        let escaped = escape_markdown("**bold**");
        assert_eq!(escaped, "*bold*");
        assert_eq!(escaped.matches('*').count(), 2);
        assert!(!escaped.contains("\\*"));
    }

    /// An apostrophe flips the quote flag, so later asterisks stay unescaped
    #[test]
    fn test_apostrophe_suppresses_asterisk_escaping() {
        assert_eq!(escape_markdown("it's *fine*"), "it's *fine*");
    }

    /// The flag is toggled, not balanced: an even count of apostrophes re-enables escaping
    #[test]
    fn test_quote_flag_toggles_per_apostrophe() {
        assert_eq!(escape_markdown("'a' *b*"), "'a' \\*b\\*");
        assert_eq!(escape_markdown("'a' 'b *c*"), "'a' 'b *c*");
    }

    #[test]
    fn test_reserved_characters_escaped() {
        assert_eq!(escape_markdown("1. Item - 50%"), "1\\. Item \\- 50%");
        assert_eq!(
            escape_markdown("(a) [b] {c} d|e f=g!"),
            "\\(a\\) \\[b\\] \\{c\\} d\\|e f\\=g\\!"
        );
    }

    #[test]
    fn test_reserved_set_is_fixed() {
        assert_eq!(
            RESERVED_CHARS.iter().collect::<String>(),
            "-.|()[]{}!="
        );
    }

    /// Already escaped reserved characters keep exactly one backslash
    #[test]
    fn test_existing_escape_pairs_preserved() {
        assert_eq!(escape_markdown("done\\."), "done\\.");
        assert_eq!(escape_markdown("\\(ok\\)"), "\\(ok\\)");
    }

    /// A backslash before a non-reserved character is kept on its own
    #[test]
    fn test_backslash_before_plain_character() {
        assert_eq!(escape_markdown("C:\\temp."), "C:\\temp\\.");
        assert_eq!(escape_markdown("trailing\\"), "trailing\\");
    }

    #[test]
    fn test_escaping_twice_keeps_single_backslashes() {
        let text = "Total: 3.5 (approx) - ok!";
        let once = escape_markdown(text);
        assert_eq!(once, "Total: 3\\.5 \\(approx\\) \\- ok\\!");
        assert_eq!(escape_markdown(&once), once);
    }

    #[test]
    fn test_triple_asterisks() {
        assert_eq!(escape_asterisks("***"), "***");
        assert_eq!(escape_markdown("***"), "**");
    }

    #[test]
    fn test_bold_followed_by_lone_asterisk() {
        assert_eq!(escape_markdown("**a*"), "*a\\*");
    }

    #[test]
    fn test_stages_compose() {
        let text = "**Rice** - 200 kcal. Note: 1 cup* only";
        let composed = escape_reserved(&collapse_double_asterisks(&escape_asterisks(text)));
        assert_eq!(escape_markdown(text), composed);
        assert_eq!(
            composed,
            "*Rice* \\- 200 kcal\\. Note: 1 cup\\* only"
        );
    }

    /// A typical calorie breakdown from the vision model
    #[test]
    fn test_calorie_report() {
        let reply = "**Total calories: 650**\n\n1. Grilled chicken - 300 calories\n2. Rice - 250 calories\n3. Salad - 100 calories\n\nThe meal is healthy!";
        let expected = "*Total calories: 650*\n\n1\\. Grilled chicken \\- 300 calories\n2\\. Rice \\- 250 calories\n3\\. Salad \\- 100 calories\n\nThe meal is healthy\\!";
        assert_eq!(escape_markdown(reply), expected);
    }

    /// Long inputs finish and grow by at most one backslash per character
    #[test]
    fn test_long_input_terminates() {
        let text = "a*b.c-(d)".repeat(10_000);
        let escaped = escape_markdown(&text);
        assert!(escaped.chars().count() <= text.chars().count() * 2);
        assert!(escaped.starts_with("a\\*b\\.c\\-\\(d\\)"));
    }
}

//! Command parsing.
//!
//! Turns prefixed message text into a [`CommandInvocation`]. Text without the
//! prefix is ordinary chatter and yields nothing.

/// Parsed form of a prefixed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    /// Lowercase command token. Empty when only the prefix was sent.
    pub command: String,
    /// Remaining tokens, original order and case.
    pub args: Vec<String>,
}

impl CommandInvocation {
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }
}

/// Parse `text` as a command gated by `prefix`.
pub fn parse_command(text: &str, prefix: &str) -> Option<CommandInvocation> {
    let body = text.strip_prefix(prefix)?;
    let mut tokens = body.split_whitespace();

    let command = tokens.next().map(str::to_lowercase).unwrap_or_default();
    let args = tokens.map(str::to_string).collect();

    Some(CommandInvocation { command, args })
}

/// Escape text for Telegram's HTML parse mode.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_without_prefix_is_ignored() {
        assert_eq!(parse_command("hello there", "😈"), None);
        assert_eq!(parse_command(" 😈kick 1", "😈"), None);
        assert_eq!(parse_command("", "!"), None);
    }

    #[test]
    fn test_whitespace_runs_and_case() {
        let inv = parse_command("😈  Kick   42  ", "😈").unwrap();
        assert_eq!(inv.command, "kick");
        assert_eq!(inv.args, vec!["42"]);
    }

    #[test]
    fn test_args_keep_case_and_order() {
        let inv = parse_command("!ANTIBOT Warn extra", "!").unwrap();
        assert_eq!(inv.command, "antibot");
        assert_eq!(inv.args, vec!["Warn", "extra"]);
        assert_eq!(inv.arg(0), Some("Warn"));
        assert_eq!(inv.arg(2), None);
    }

    #[test]
    fn test_bare_prefix_yields_empty_command() {
        let inv = parse_command("😈   ", "😈").unwrap();
        assert_eq!(inv.command, "");
        assert!(inv.args.is_empty());
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<b>&</b>"), "&lt;b&gt;&amp;&lt;/b&gt;");
    }
}

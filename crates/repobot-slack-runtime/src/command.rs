//! `!gh <user>` command recognition.

use std::sync::OnceLock;

use regex::Regex;

// ASCII whitespace only; non-breaking and ideographic spaces do not separate.
const REPOSITORY_COMMAND_PATTERN: &str = r"^!gh[\t\n\x0C\r ]+([A-Za-z0-9_]+)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryCommand {
    pub user: String,
}

fn repository_command_regex() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(REPOSITORY_COMMAND_PATTERN).ok())
        .as_ref()
}

/// Extracts the user argument when `text` starts with `!gh` and a token.
///
/// Matching is anchored at the start and case-sensitive. Text after the token
/// is ignored.
pub fn parse_repository_command(text: &str) -> Option<RepositoryCommand> {
    let captures = repository_command_regex()?.captures(text)?;
    let user = captures.get(1)?.as_str();
    Some(RepositoryCommand {
        user: user.to_string(),
    })
}

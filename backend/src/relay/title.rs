//! Conversation title derivation

/// Title used when there is no text to derive one from
pub const DEFAULT_TITLE: &str = "New Chat";

/// Generate a title from message content
///
/// Uses the first sentence of the first line when it fits in `max_chars`,
/// otherwise truncates on a character boundary and appends `...`.
pub fn derive_title(content: &str, max_chars: usize) -> String {
    let trimmed = content.trim();
    let first_line = trimmed.lines().next().unwrap_or_default().trim();
    if first_line.is_empty() {
        return DEFAULT_TITLE.to_string();
    }

    if let Some(sentence_end) = first_line.find(['.', '!', '?']) {
        let sentence = first_line[..=sentence_end].trim();
        if sentence.chars().count() <= max_chars {
            return sentence.to_string();
        }
    }

    truncate_title(first_line, max_chars)
}

/// Bound a title to `max_chars` characters, marking the cut with `...`
pub fn truncate_title(title: &str, max_chars: usize) -> String {
    let title = title.trim();
    if title.chars().count() <= max_chars {
        return title.to_string();
    }

    let head: String = title.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", head.trim_end())
}

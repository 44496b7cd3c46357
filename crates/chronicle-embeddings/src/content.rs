use sha2::{Digest, Sha256};

/// Embedding providers have token limits; truncate well before hitting them
/// (§4.7: "Truncate to ~8,000 characters before embedding").
const MAX_CHARS: usize = 8_000;

/// Minimum content length for a message to be worth embedding (§4.7).
const MIN_MESSAGE_CHARS: usize = 5;

pub fn prepare_message_content(content: &str) -> Option<String> {
    let cleaned = content.trim();
    if cleaned.len() < MIN_MESSAGE_CHARS {
        return None;
    }
    Some(truncate(cleaned))
}

pub fn prepare_discussion_content(title: &str, summary: Option<&str>) -> String {
    truncate(&join(title, summary))
}

pub fn prepare_person_content(display_name: Option<&str>, ai_summary: Option<&str>) -> Option<String> {
    let text = join(display_name.unwrap_or(""), ai_summary);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(truncate(trimmed))
    }
}

pub fn prepare_topic_content(name: &str, description: Option<&str>) -> String {
    truncate(&join(name, description))
}

fn join(head: &str, tail: Option<&str>) -> String {
    match tail {
        Some(t) if !t.is_empty() => format!("{head} {t}"),
        _ => head.to_string(),
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_CHARS {
        text.to_string()
    } else {
        text.chars().take(MAX_CHARS).collect()
    }
}

pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_messages_are_skipped() {
        assert_eq!(prepare_message_content("hi"), None);
    }

    #[test]
    fn content_hash_is_stable() {
        assert_eq!(content_hash("hello"), content_hash("hello"));
        assert_ne!(content_hash("hello"), content_hash("world"));
    }

    #[test]
    fn truncates_to_max_chars() {
        let long = "a".repeat(9_000);
        let prepared = prepare_discussion_content(&long, None);
        assert_eq!(prepared.chars().count(), MAX_CHARS);
    }
}

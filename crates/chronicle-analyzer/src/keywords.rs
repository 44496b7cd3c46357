use std::collections::HashSet;

/// Cap on topic keywords derived for a single discussion (§4.4).
const MAX_KEYWORDS: usize = 7;
const MIN_WORD_LEN: usize = 3;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "up", "about", "into", "through", "during", "is", "are", "was", "were", "be",
    "been", "being", "have", "has", "had", "do", "does", "did", "will", "would", "could",
    "should", "may", "might", "must", "can", "this", "that", "these", "those", "i", "you",
    "he", "she", "it", "we", "they", "what", "which", "who", "whom", "whose", "where", "when",
    "why", "how", "all", "each", "every", "both", "few", "more", "most", "other", "some",
    "such", "no", "nor", "not", "only", "own", "same", "so", "than", "too", "very", "just",
    "now", "then", "there", "here", "also", "like", "get", "got", "going", "really", "think",
    "know", "want", "yeah", "okay", "lol", "haha", "im", "its", "dont", "thats", "youre",
    "theyre", "there's", "one", "any", "your", "our", "their",
];

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() >= MIN_WORD_LEN)
}

/// Derive up to [`MAX_KEYWORDS`] topic keywords for a freshly created
/// discussion from its title and opening message. Stop words and duplicates
/// are dropped; order favors the title.
pub fn extract_keywords(title: &str, first_message: &str) -> Vec<String> {
    let stop: HashSet<&str> = STOP_WORDS.iter().copied().collect();
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for word in words(title).chain(words(first_message)) {
        if stop.contains(word.as_str()) || !seen.insert(word.clone()) {
            continue;
        }
        out.push(word);
        if out.len() >= MAX_KEYWORDS {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_stop_words_and_short_tokens() {
        let kws = extract_keywords("The Weekend Plans", "so are we still on for the hike at dawn");
        assert!(kws.contains(&"weekend".to_string()));
        assert!(kws.contains(&"plans".to_string()));
        assert!(kws.contains(&"hike".to_string()));
        assert!(!kws.iter().any(|w| w == "the" || w == "so" || w == "on" || w == "at"));
    }

    #[test]
    fn caps_at_seven_and_dedups() {
        let kws = extract_keywords("alpha beta gamma delta epsilon zeta eta theta", "alpha iota kappa");
        assert_eq!(kws.len(), MAX_KEYWORDS);
        assert_eq!(kws.iter().filter(|w| *w == "alpha").count(), 1);
    }

    #[test]
    fn empty_inputs_yield_no_keywords() {
        assert!(extract_keywords("", "").is_empty());
    }
}

use std::cmp::Reverse;

/// Keywords boosted when no `RERANKING_KEYWORDS` is configured
pub const DEFAULT_KEYWORDS: &[&str] = &["aws", "pii", "ddd"];

/// Keyword-boost reranking.
///
/// Only kicks in when the question itself mentions one of the keywords; candidates are then
/// stably re-sorted by how often the keywords occur in their content, most first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordReranker {
    keywords: Vec<String>,
}

impl Default for KeywordReranker {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS.iter().copied())
    }
}

impl KeywordReranker {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// Parse a comma-separated keyword list such as `"aws, pii,ddd"`
    pub fn from_csv(raw: &str) -> Self {
        Self::new(raw.split(','))
    }

    #[must_use]
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Whether the question mentions any keyword
    pub fn applies_to(&self, question: &str) -> bool {
        let question = question.to_lowercase();
        self.keywords.iter().any(|kw| question.contains(kw.as_str()))
    }

    /// Total keyword occurrences in `text` (case-insensitive, non-overlapping)
    pub fn score(&self, text: &str) -> usize {
        let text = text.to_lowercase();
        self.keywords
            .iter()
            .map(|kw| text.matches(kw.as_str()).count())
            .sum()
    }

    /// Reorder `items` for `question`; order is untouched when no keyword is mentioned
    pub fn rerank<T, F>(&self, question: &str, mut items: Vec<T>, content: F) -> Vec<T>
    where
        F: Fn(&T) -> &str,
    {
        if !self.applies_to(question) {
            return items;
        }
        items.sort_by_cached_key(|item| Reverse(self.score(content(item))));
        items
    }
}

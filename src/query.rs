//! Keyword relevance set and the channel/query strings derived from configuration.

/// Case-insensitive keyword set (stored normalized lowercase, sorted, deduped).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeywordSet {
    keywords: Vec<String>,
}

impl KeywordSet {
    pub fn new<I, S>(iter: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut keywords: Vec<String> = iter
            .into_iter()
            .map(|s| s.as_ref().trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        keywords.sort();
        keywords.dedup();
        Self { keywords }
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.keywords
    }

    /// True if any keyword occurs as a substring of `text` (case-insensitive).
    pub fn matches(&self, text: &str) -> bool {
        let hay = text.to_lowercase();
        self.keywords.iter().any(|kw| hay.contains(kw.as_str()))
    }

    /// Server-side search expression: keywords joined with ` OR `.
    /// Multi-word keywords are quoted so they match as phrases.
    pub fn search_query(&self) -> String {
        self.keywords
            .iter()
            .map(|kw| if kw.contains(char::is_whitespace) { format!("\"{}\"", kw) } else { kw.clone() })
            .collect::<Vec<_>>()
            .join(" OR ")
    }
}

/// Lowercase, trim and strip a leading `r/` from a channel name.
#[inline]
pub fn normalize_channel(s: &str) -> String {
    let s = s.trim().to_lowercase();
    if let Some(rest) = s.strip_prefix("r/") { rest.to_string() } else { s }
}

/// Path segment addressing several channels at once (`a+b+c`).
pub fn channel_path(channels: &[String]) -> String {
    channels.join("+")
}

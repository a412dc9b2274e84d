use crate::text::normalize_whitespace;

/// What to search for: the source title plus extracted keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub title: String,
    pub keywords: Vec<String>,
}

impl SearchQuery {
    pub fn new(title: impl Into<String>, keywords: Vec<String>) -> Self {
        Self {
            title: title.into(),
            keywords,
        }
    }

    /// Renders the query in arXiv search syntax:
    /// `(ti:"<title>") OR (abs:("k1" OR "k2"))`.
    ///
    /// Either clause is dropped when it would be empty.
    pub fn to_arxiv_query(&self) -> String {
        let title = escape_quotes(&normalize_whitespace(&self.title));
        let keywords: Vec<String> = self
            .keywords
            .iter()
            .map(|k| escape_quotes(&normalize_whitespace(k)))
            .filter(|k| !k.is_empty())
            .map(|k| format!("\"{k}\""))
            .collect();

        let title_clause = (!title.is_empty()).then(|| format!("(ti:\"{title}\")"));
        let keyword_clause = (!keywords.is_empty()).then(|| format!("(abs:({}))", keywords.join(" OR ")));

        match (title_clause, keyword_clause) {
            (Some(t), Some(k)) => format!("{t} OR {k}"),
            (Some(t), None) => t,
            (None, Some(k)) => k,
            (None, None) => String::new(),
        }
    }
}

fn escape_quotes(s: &str) -> String {
    s.replace('"', "\\\"")
}

//! Text normalization helpers shared by the loader and the corpus sources:
//! sentence segmentation, title/abstract detection and keyword extraction.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("no non-empty line to use as a title")]
    MissingTitle,
    #[error("no abstract section found")]
    MissingAbstract,
}

// Words that end in a period without ending the sentence.
const ABBREVIATIONS: &[&str] = &[
    "e.g", "i.e", "al", "fig", "figs", "eq", "eqs", "vs", "cf", "dr", "mr", "mrs", "ms", "prof",
    "sec", "ref", "refs", "approx", "resp", "viz",
];

// Capitalized words that usually open a sentence rather than follow an initial.
const SENTENCE_STARTERS: &[&str] = &[
    "The", "This", "These", "That", "Those", "We", "Our", "It", "Its", "In", "On", "For", "To",
    "As", "An", "Next", "Then", "Finally", "However", "Moreover", "Furthermore", "Here", "Thus",
    "Therefore", "Also", "Both", "Each", "Such", "They", "Their", "There", "When", "While",
];

static ABSTRACT_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\babstract\b").expect("valid regex"));

static INLINE_SECTION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bindex\s+terms\b|\bkey\s*words\s*[:.\-\u{2013}\u{2014}]|\b(?:i|1)\.?\s+introduction\b")
        .expect("valid regex")
});

static LINE_SECTION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*(?:keywords|introduction)\b").expect("valid regex")
});

/// Collapses every run of whitespace into a single space and trims the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits `text` into sentences.
///
/// A sentence ends at `.`, `!` or `?` (plus any closing quotes or brackets)
/// when followed by whitespace and a capital letter, digit, quote or opening
/// bracket. Periods after known abbreviations do not end a sentence, nor do
/// periods after a capital initial (`J. Smith`) unless the next word is a
/// usual sentence opener (`model B. Next we ...`). Non-empty input always
/// yields at least one sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return Vec::new();
    }

    let chars: Vec<(usize, char)> = normalized.char_indices().collect();
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;

    while i < chars.len() {
        let (pos, c) = chars[i];
        if !matches!(c, '.' | '!' | '?') {
            i += 1;
            continue;
        }

        let mut end = i;
        while end + 1 < chars.len() && matches!(chars[end + 1].1, '"' | '\'' | ')' | ']' | '\u{201d}') {
            end += 1;
        }

        let next_is_space = chars.get(end + 1).is_some_and(|(_, ch)| ch.is_whitespace());
        let starts_new = chars.get(end + 2).is_some_and(|(_, ch)| {
            ch.is_uppercase() || ch.is_ascii_digit() || matches!(ch, '"' | '(' | '[' | '\u{201c}')
        });

        if next_is_space
            && starts_new
            && !(c == '.' && continues_sentence(&normalized[start..pos], &normalized[chars[end + 2].0..]))
        {
            let end_byte = chars[end].0 + chars[end].1.len_utf8();
            sentences.push(normalized[start..end_byte].trim().to_string());
            start = chars[end + 2].0;
            i = end + 2;
            continue;
        }
        i = end + 1;
    }

    let rest = normalized[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    if sentences.is_empty() {
        sentences.push(normalized);
    }
    sentences
}

/// Whether the period between `before_period` and `after` belongs to an
/// abbreviation or an initial.
fn continues_sentence(before_period: &str, after: &str) -> bool {
    let word = before_period
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or_default()
        .trim_start_matches(['(', '[', '"']);
    let mut letters = word.chars();
    if let (Some(letter), None) = (letters.next(), letters.next()) {
        let next_word = after
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .trim_end_matches(|c: char| !c.is_alphanumeric());
        return letter.is_uppercase() && !SENTENCE_STARTERS.contains(&next_word);
    }
    let lower = word.to_lowercase();
    ABBREVIATIONS.contains(&lower.as_str())
}

/// Locates the title and abstract in the raw text of a paper.
///
/// The title is the first non-empty line. The abstract is the text after the
/// first `Abstract` marker following the title line, up to the next section
/// marker (`Index Terms`, `Keywords`, `I. Introduction`, ...) or the end.
pub fn extract_title_and_abstract(text: &str) -> Result<(String, String), ExtractionError> {
    let mut offset = 0usize;
    let mut title = None;
    for line in text.split_inclusive('\n') {
        offset += line.len();
        if !line.trim().is_empty() {
            title = Some(normalize_whitespace(line));
            break;
        }
    }
    let title = title.ok_or(ExtractionError::MissingTitle)?;

    let body = &text[offset..];
    let marker = ABSTRACT_MARKER
        .find(body)
        .ok_or(ExtractionError::MissingAbstract)?;
    let after = body[marker.end()..]
        .trim_start_matches(|c: char| c.is_whitespace() || matches!(c, ':' | '.' | '-' | '\u{2013}' | '\u{2014}'));

    let end = [&*INLINE_SECTION_MARKER, &*LINE_SECTION_MARKER]
        .iter()
        .filter_map(|re| re.find(after).map(|m| m.start()))
        .min()
        .unwrap_or(after.len());

    let abstract_text = normalize_whitespace(&after[..end]);
    if abstract_text.is_empty() {
        return Err(ExtractionError::MissingAbstract);
    }
    Ok((title, abstract_text))
}

const STOP_WORDS: &[&str] = &[
    "about", "above", "after", "again", "against", "all", "also", "although", "among", "and",
    "any", "are", "around", "because", "been", "before", "being", "below", "between", "both",
    "but", "can", "could", "did", "does", "doing", "down", "due", "during", "each", "either",
    "few", "for", "from", "further", "had", "has", "have", "having", "here", "hers", "herself",
    "him", "himself", "his", "how", "however", "into", "its", "itself", "just", "more", "most",
    "much", "must", "not", "now", "off", "once", "only", "other", "our", "ours", "ourselves",
    "out", "over", "own", "paper", "same", "several", "she", "should", "show", "shows", "since",
    "some", "such", "than", "that", "the", "their", "theirs", "them", "themselves", "then",
    "there", "these", "they", "this", "those", "through", "thus", "too", "under", "until", "upon",
    "use", "used", "uses", "using", "very", "via", "was", "way", "well", "were", "what", "when",
    "where", "whether", "which", "while", "who", "whom", "why", "will", "with", "within",
    "without", "would", "yet", "you", "your", "yours", "based", "propose", "proposed", "present",
    "results", "approach", "method", "methods", "new", "work", "we", "our", "can", "may", "one",
    "two", "first", "second", "many", "often", "like", "make", "made", "given", "provide",
];

/// Picks the `n` most frequent content words and recurring two-word phrases.
///
/// Phrases that occur at least twice outrank single words with the same count;
/// ties keep first-occurrence order, so the output is deterministic.
pub fn extract_keywords(text: &str, n: usize) -> Vec<String> {
    if n == 0 {
        return Vec::new();
    }
    let tokens: Vec<String> = text
        .split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .map(|t| t.trim_matches('-').to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();

    let is_content = |t: &str| {
        t.chars().count() >= 3
            && !t.chars().all(|c| c.is_ascii_digit())
            && !STOP_WORDS.contains(&t)
    };

    // term -> (count, first occurrence, is phrase)
    let mut scores: HashMap<String, (usize, usize, bool)> = HashMap::new();
    for (idx, token) in tokens.iter().enumerate() {
        if !is_content(token) {
            continue;
        }
        scores.entry(token.clone()).or_insert((0, idx, false)).0 += 1;
        if let Some(next) = tokens.get(idx + 1).filter(|t| is_content(t)) {
            scores
                .entry(format!("{token} {next}"))
                .or_insert((0, idx, true))
                .0 += 1;
        }
    }

    let mut ranked: Vec<(String, f64, usize)> = scores
        .into_iter()
        .filter(|(_, (count, _, phrase))| !*phrase || *count >= 2)
        .map(|(term, (count, first, phrase))| {
            let weight = if phrase { 1.5 } else { 1.0 };
            (term, count as f64 * weight, first)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.2.cmp(&b.2)).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(n).map(|(term, _, _)| term).collect()
}

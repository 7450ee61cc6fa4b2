use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::config::MIN_DOCUMENTS;

// Simple stopword list
static STOPWORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();
static TOKEN_REGEX: OnceLock<Regex> = OnceLock::new();

pub fn get_stopwords() -> &'static HashSet<&'static str> {
    STOPWORDS.get_or_init(|| {
        [
  "a", "about", "above", "am", "also", "an", "and", "any", "are", "as", "at",
  "based", "be", "because", "been", "before", "being", "below", "between", "both", "but", "by",
  "can", "cannot", "could",
  "did", "do", "does", "doing", "down", "during",
  "each", "et", "few", "for", "from", "further",
  "had", "has", "have", "having", "he", "her", "here", "hers", "him", "his", "how",
  "i", "if", "in", "into", "is", "it", "its", "itself",
  "may", "me", "more", "most", "my",
  "of", "off", "on", "once", "only", "or", "other", "our", "ours", "out", "over", "own",
  "paper", "results", "same", "she", "should", "so", "some", "such",
  "than", "that", "the", "their", "them", "then", "there", "these", "they", "this", "those", "through", "to", "too",
  "under", "until", "up", "us", "use", "used", "using",
  "very",
  "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom", "why", "will", "with", "would",
  "you", "your", "yours",
].into_iter().collect()
    })
}

fn get_token_regex() -> &'static Regex {
    TOKEN_REGEX.get_or_init(|| {
        Regex::new(r"[a-z][a-z0-9]+").unwrap()
    })
}

/// Lowercase, strip punctuation, collapse whitespace.
/// Used both for title matching and as the first step of tokenizing.
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Content terms of a text: stopwords and short tokens dropped.
pub fn tokenize_terms(text: &str) -> Vec<String> {
    let normalized = normalize_text(text);
    get_token_regex()
        .find_iter(&normalized)
        .map(|m| m.as_str())
        .filter(|t| t.len() > 2 && !get_stopwords().contains(t))
        .map(|t| t.to_string())
        .collect()
}

/// Text fields of a study used to build model inputs.
pub struct StudyText<'a> {
    pub title: &'a str,
    pub abstract_text: &'a str,
    pub keywords: &'a str,
}

/// One document per study (`title abstract keywords`). Small corpora are
/// doubled so topic models have enough rows to fit.
pub fn build_documents(studies: &[StudyText<'_>]) -> Vec<String> {
    let docs: Vec<String> = studies
        .iter()
        .map(|s| {
            format!("{} {} {}", s.title, s.abstract_text, s.keywords)
                .trim()
                .to_string()
        })
        .collect();

    if docs.len() < MIN_DOCUMENTS {
        let mut doubled = docs.clone();
        doubled.extend(docs);
        return doubled;
    }
    docs
}

/// Context passage handed to enrichment models: one `title abstract` line per study.
pub fn enrichment_text(studies: &[StudyText<'_>]) -> String {
    let mut text = String::new();
    for s in studies {
        let line = format!("{} {}", s.title, s.abstract_text);
        text.push_str(&line.trim().replace("\r\n", "#."));
        text.push('\n');
    }
    text
}

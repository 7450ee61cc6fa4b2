//! Near-duplicate filter applied to raw enrichment output before caching.

use crate::config::{DUPLICATE_DISTANCE, SOURCE_MAX_DISTANCE};
use crate::stem::{levenshtein, stem};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Empty,
    Punctuation,
    SameLexeme,
    TooCloseToSource { distance: usize },
    NearDuplicate { of: String, distance: usize },
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

fn is_punctuation(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => c.is_ascii_punctuation(),
        (None, _) => false,
        _ => false,
    }
}

/// Per-candidate verdicts, in input order.
pub fn filter_with_trace(source: &str, candidates: &[String]) -> Vec<(String, Verdict)> {
    let source_stem = stem(source);
    let mut accepted: Vec<(String, String)> = Vec::new(); // (candidate, stem)
    let mut trace = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let verdict = judge(candidate, &source_stem, &accepted);
        if verdict.is_accepted() {
            accepted.push((candidate.clone(), stem(candidate)));
        }
        trace.push((candidate.clone(), verdict));
    }
    trace
}

fn judge(candidate: &str, source_stem: &str, accepted: &[(String, String)]) -> Verdict {
    if candidate.trim().is_empty() {
        return Verdict::Empty;
    }
    if is_punctuation(candidate) {
        return Verdict::Punctuation;
    }

    let candidate_stem = stem(candidate);
    if candidate_stem == source_stem {
        return Verdict::SameLexeme;
    }

    let distance = levenshtein(&candidate_stem, source_stem);
    if distance <= SOURCE_MAX_DISTANCE {
        return Verdict::TooCloseToSource { distance };
    }

    for (word, word_stem) in accepted {
        let distance = levenshtein(&candidate_stem, word_stem);
        if distance < DUPLICATE_DISTANCE {
            return Verdict::NearDuplicate { of: word.clone(), distance };
        }
    }

    Verdict::Accepted
}

/// Candidates that survive the filter, as a prefix-stable subsequence of the input.
pub fn filter_candidates(source: &str, candidates: &[String]) -> Vec<String> {
    filter_with_trace(source, candidates)
        .into_iter()
        .filter(|(_, v)| v.is_accepted())
        .map(|(c, _)| c)
        .collect()
}

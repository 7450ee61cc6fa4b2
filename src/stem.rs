//! Crude suffix-stripping stemmer and edit distance.
//!
//! The rule table is applied repeatedly, longest matching suffix first, in the
//! style of the Lancaster stemmer: a rule either stops stemming or lets the
//! next pass continue. A rule only fires when at least three characters of
//! stem remain.

const MIN_STEM_LEN: usize = 3;

struct Rule {
    suffix: &'static str,
    replace: &'static str,
    proceed: bool,
}

const fn rule(suffix: &'static str, replace: &'static str, proceed: bool) -> Rule {
    Rule { suffix, replace, proceed }
}

static RULES: &[Rule] = &[
    rule("ational", "ate", true),
    rule("tional", "tion", true),
    rule("ization", "ize", true),
    rule("ations", "ate", true),
    rule("ation", "ate", true),
    rule("fulness", "ful", true),
    rule("ousness", "ous", true),
    rule("iveness", "ive", true),
    rule("ements", "", false),
    rule("ement", "", false),
    rule("ments", "", false),
    rule("ment", "", false),
    rule("ities", "", false),
    rule("ity", "", false),
    rule("ness", "", true),
    rule("ings", "", true),
    rule("ing", "", true),
    rule("ies", "y", false),
    rule("ied", "y", false),
    rule("ers", "", true),
    rule("er", "", false),
    rule("ed", "", true),
    rule("ly", "", true),
    rule("es", "", true),
    rule("ss", "ss", false),
    rule("s", "", true),
    rule("e", "", false),
    rule("al", "", false),
];

pub fn stem(word: &str) -> String {
    let mut current = word.trim().to_lowercase();

    loop {
        let len = current.chars().count();
        let best = RULES
            .iter()
            .filter(|r| current.ends_with(r.suffix))
            .filter(|r| len - r.suffix.chars().count() + r.replace.chars().count() >= MIN_STEM_LEN)
            .max_by_key(|r| r.suffix.len());

        let Some(r) = best else {
            return current;
        };

        let mut next = current[..current.len() - r.suffix.len()].to_string();
        next.push_str(r.replace);
        if next == current {
            return current;
        }
        current = next;
        if !r.proceed {
            return current;
        }
    }
}

/// Levenshtein distance over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    if b.is_empty() {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == *cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

//! Scopus search string formulation.
//!
//! A word and its enrichments form an OR group, the groups of one topic are
//! AND-ed, and topics are OR-ed together:
//!
//! `TITLE-ABS-KEY((("code" OR "source") AND "smell") OR ("testing")) AND PUBYEAR > 2010`

use crate::config::YearRange;
use crate::error::{Error, Result};
use crate::models::{EnrichedTopic, EnrichedWord, StringFormulator};

pub struct ScopusFormulator {
    years: YearRange,
}

impl ScopusFormulator {
    pub fn new(years: YearRange) -> Result<Self> {
        years.validate()?;
        Ok(Self { years })
    }
}

fn quote(term: &str) -> String {
    format!("\"{}\"", term.replace('"', "").trim())
}

fn word_group(word: &EnrichedWord) -> String {
    if word.enrichments.is_empty() {
        return quote(&word.word);
    }
    let terms: Vec<String> = std::iter::once(&word.word)
        .chain(word.enrichments.iter())
        .map(|t| quote(t))
        .collect();
    format!("({})", terms.join(" OR "))
}

/// Append `PUBYEAR >` / `PUBYEAR <` clauses for the bounds that are set.
pub fn set_pub_year_boundaries(string: &str, years: &YearRange) -> Result<String> {
    years.validate()?;
    let mut s = string.to_string();
    if let Some(min) = years.min {
        s.push_str(&format!(" AND PUBYEAR > {}", min));
    }
    if let Some(max) = years.max {
        s.push_str(&format!(" AND PUBYEAR < {}", max));
    }
    Ok(s)
}

impl StringFormulator for ScopusFormulator {
    fn formulate(&self, topics: &[EnrichedTopic]) -> Result<String> {
        let clauses: Vec<String> = topics
            .iter()
            .filter(|topic| !topic.is_empty())
            .map(|topic| {
                let groups: Vec<String> = topic.iter().map(word_group).collect();
                format!("({})", groups.join(" AND "))
            })
            .collect();

        if clauses.is_empty() {
            return Err(Error::model("formulation", "no topic words to formulate"));
        }

        let string = format!("TITLE-ABS-KEY({})", clauses.join(" OR "));
        set_pub_year_boundaries(&string, &self.years)
    }
}

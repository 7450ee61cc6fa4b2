//! Scoring of retrieved results against the gold set (GS) and the
//! quasi-gold set (QGS).
//!
//! Titles are compared after `nl::normalize_text`. The start set is the
//! GS studies found directly by the query. Snowballing then walks the
//! citation graph from the start set:
//! - backward snowballing (BSB) follows references only,
//! - full snowballing (SB) follows references and citations.
//! The number of hops is bounded by `max_hops`; `None` walks to closure.

use crate::nl::normalize_text;
use crate::store::Study;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MembershipKind {
    QgsInResults,
    GsInResults,
    GsInBsb,
    GsInSb,
}

impl MembershipKind {
    pub const ALL: [MembershipKind; 4] = [
        MembershipKind::QgsInResults,
        MembershipKind::GsInResults,
        MembershipKind::GsInBsb,
        MembershipKind::GsInSb,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipKind::QgsInResults => "qgs_in_results",
            MembershipKind::GsInResults => "gs_in_results",
            MembershipKind::GsInBsb => "gs_in_bsb",
            MembershipKind::GsInSb => "gs_in_sb",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == value)
    }
}

/// Membership lists (study ids, ascending) and the metrics derived from them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Evaluation {
    pub qgs_in_results: Vec<i64>,
    pub gs_in_results: Vec<i64>,
    pub gs_in_bsb: Vec<i64>,
    pub gs_in_sb: Vec<i64>,
    pub start_set_precision: f64,
    pub start_set_recall: f64,
    pub start_set_f1: f64,
    pub bsb_recall: f64,
    pub sb_recall: f64,
}

impl Evaluation {
    pub fn members(&self, kind: MembershipKind) -> &[i64] {
        match kind {
            MembershipKind::QgsInResults => &self.qgs_in_results,
            MembershipKind::GsInResults => &self.gs_in_results,
            MembershipKind::GsInBsb => &self.gs_in_bsb,
            MembershipKind::GsInSb => &self.gs_in_sb,
        }
    }

    pub fn members_mut(&mut self, kind: MembershipKind) -> &mut Vec<i64> {
        match kind {
            MembershipKind::QgsInResults => &mut self.qgs_in_results,
            MembershipKind::GsInResults => &mut self.gs_in_results,
            MembershipKind::GsInBsb => &mut self.gs_in_bsb,
            MembershipKind::GsInSb => &mut self.gs_in_sb,
        }
    }
}

/// Performance record of one search string. `n_results == -1` marks a
/// string the endpoint rejected as malformed.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchPerformance {
    pub search_string_id: i64,
    pub n_results: i64,
    pub evaluation: Evaluation,
}

impl SearchPerformance {
    pub fn invalid(search_string_id: i64) -> Self {
        Self {
            search_string_id,
            n_results: crate::config::INVALID_QUERY_RESULTS,
            evaluation: Evaluation::default(),
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.n_results < 0
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

pub struct Evaluator {
    gs: Vec<(i64, String)>,
    qgs: HashSet<i64>,
    references: HashMap<i64, Vec<i64>>,
    cited_by: HashMap<i64, Vec<i64>>,
    max_hops: Option<usize>,
}

impl Evaluator {
    /// `citations` are `(citing, cited)` pairs between GS studies.
    pub fn new(gs: &[Study], qgs: &[Study], citations: &[(i64, i64)], max_hops: Option<usize>) -> Self {
        let mut references: HashMap<i64, Vec<i64>> = HashMap::new();
        let mut cited_by: HashMap<i64, Vec<i64>> = HashMap::new();
        for &(citing, cited) in citations {
            references.entry(citing).or_default().push(cited);
            cited_by.entry(cited).or_default().push(citing);
        }

        Self {
            gs: gs.iter().map(|s| (s.id, normalize_text(&s.title))).collect(),
            qgs: qgs.iter().map(|s| s.id).collect(),
            references,
            cited_by,
            max_hops,
        }
    }

    pub fn gs_size(&self) -> usize {
        self.gs.len()
    }

    pub fn evaluate<S: AsRef<str>>(&self, n_results: usize, titles: &[S]) -> Evaluation {
        let found: HashSet<String> = titles.iter().map(|t| normalize_text(t.as_ref())).collect();

        let gs_in_results: BTreeSet<i64> = self
            .gs
            .iter()
            .filter(|(_, title)| found.contains(title))
            .map(|(id, _)| *id)
            .collect();
        let qgs_in_results: BTreeSet<i64> = gs_in_results
            .iter()
            .copied()
            .filter(|id| self.qgs.contains(id))
            .collect();

        let gs_ids: HashSet<i64> = self.gs.iter().map(|(id, _)| *id).collect();
        let gs_in_bsb = self.reach(&gs_in_results, &gs_ids, false);
        let gs_in_sb = self.reach(&gs_in_results, &gs_ids, true);

        let start_set_precision = ratio(qgs_in_results.len(), n_results);
        let start_set_recall = ratio(qgs_in_results.len(), self.qgs.len());

        Evaluation {
            start_set_precision,
            start_set_recall,
            start_set_f1: f1(start_set_precision, start_set_recall),
            bsb_recall: ratio(gs_in_bsb.len(), self.gs.len()),
            sb_recall: ratio(gs_in_sb.len(), self.gs.len()),
            qgs_in_results: qgs_in_results.into_iter().collect(),
            gs_in_results: gs_in_results.into_iter().collect(),
            gs_in_bsb: gs_in_bsb.into_iter().collect(),
            gs_in_sb: gs_in_sb.into_iter().collect(),
        }
    }

    /// Breadth-first walk from `start`, restricted to GS studies.
    fn reach(&self, start: &BTreeSet<i64>, gs_ids: &HashSet<i64>, forward: bool) -> BTreeSet<i64> {
        let mut seen: BTreeSet<i64> = start.clone();
        let mut queue: VecDeque<(i64, usize)> = start.iter().map(|id| (*id, 0)).collect();
        let empty = Vec::new();

        while let Some((id, depth)) = queue.pop_front() {
            if self.max_hops.is_some_and(|max| depth >= max) {
                continue;
            }

            let backward = self.references.get(&id).unwrap_or(&empty);
            let onward = if forward { self.cited_by.get(&id).unwrap_or(&empty) } else { &empty };

            for next in backward.iter().chain(onward.iter()) {
                if gs_ids.contains(next) && seen.insert(*next) {
                    queue.push_back((*next, depth + 1));
                }
            }
        }
        seen
    }
}

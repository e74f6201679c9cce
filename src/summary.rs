//! Per-EPA roll-up of comment quality for the admin report view.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::cache::{Clock, SystemClock, TtlCache};
use crate::{CommentAnalyzer, FaultReason, FlaggedComment, QualityReport, ReasonCounts};

/// EPAs covered by a generated report.
pub const REPORT_EPAS: RangeInclusive<u32> = 1..=13;

/// Flagged comments kept per EPA for preview.
pub const EXAMPLE_LIMIT: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpaCheckSummary {
    pub total_comments: usize,
    pub flagged_comments: usize,
    pub reason_counts: ReasonCounts,
    pub examples: Vec<FlaggedComment>,
}

impl EpaCheckSummary {
    pub fn from_report(report: &QualityReport) -> Self {
        Self {
            total_comments: report.total,
            flagged_comments: report.flagged.len(),
            reason_counts: report.reason_counts.clone(),
            examples: report.flagged.iter().take(EXAMPLE_LIMIT).cloned().collect(),
        }
    }

    pub fn is_flagged(&self) -> bool {
        self.flagged_comments > 0
    }

    /// Most frequent reason, if any comment was flagged. Equal counts go to
    /// the reason that comes first in canonical order.
    pub fn top_reason(&self) -> Option<FaultReason> {
        let mut entries: Vec<(FaultReason, usize)> = self.reason_counts.iter().collect();
        // stable: ties keep canonical order
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries
            .into_iter()
            .find(|(_, count)| *count > 0)
            .map(|(reason, _)| reason)
    }
}

/// Analyze every EPA's comments and summarize each one.
pub fn check_report(
    analyzer: &CommentAnalyzer,
    per_epa_comments: &BTreeMap<u32, Vec<String>>,
) -> BTreeMap<u32, EpaCheckSummary> {
    per_epa_comments
        .iter()
        .map(|(epa, comments)| {
            let summary = EpaCheckSummary::from_report(&analyzer.analyze(comments));
            if summary.is_flagged() {
                info!(
                    epa,
                    flagged = summary.flagged_comments,
                    total = summary.total_comments,
                    top_reason = ?summary.top_reason(),
                    "EPA has flagged comments"
                );
            }
            (*epa, summary)
        })
        .collect()
}

pub fn has_any_flags(summaries: &BTreeMap<u32, EpaCheckSummary>) -> bool {
    summaries.values().any(EpaCheckSummary::is_flagged)
}

/// Report checks per student, reused until the TTL runs out.
pub struct ReportCache<C = SystemClock> {
    analyzer: CommentAnalyzer,
    checks: TtlCache<String, BTreeMap<u32, EpaCheckSummary>, C>,
}

impl ReportCache<SystemClock> {
    pub fn new(analyzer: CommentAnalyzer, ttl: Duration) -> Self {
        Self::with_clock(analyzer, ttl, SystemClock)
    }
}

impl<C: Clock> ReportCache<C> {
    pub fn with_clock(analyzer: CommentAnalyzer, ttl: Duration, clock: C) -> Self {
        Self {
            analyzer,
            checks: TtlCache::with_clock(ttl, clock),
        }
    }

    pub fn analyzer(&self) -> &CommentAnalyzer {
        &self.analyzer
    }

    /// Summaries for `student_id`. `collect` runs only when there is no fresh
    /// entry for that student.
    pub fn check<F>(&mut self, student_id: &str, collect: F) -> &BTreeMap<u32, EpaCheckSummary>
    where
        F: FnOnce() -> BTreeMap<u32, Vec<String>>,
    {
        let analyzer = &self.analyzer;
        self.checks
            .get_or_insert_with(student_id.to_string(), || check_report(analyzer, &collect()))
    }

    /// Drop the cached check, e.g. after new responses arrive for the student.
    pub fn invalidate(&mut self, student_id: &str) -> bool {
        self.checks.invalidate(&student_id.to_string()).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze_comments_quality;

    fn comments(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn examples_are_capped() {
        let report = analyze_comments_quality(&["ok", "fine", "nice", "none", "na"]);
        let summary = EpaCheckSummary::from_report(&report);
        assert_eq!(summary.total_comments, 5);
        assert_eq!(summary.flagged_comments, 5);
        assert_eq!(summary.examples.len(), EXAMPLE_LIMIT);
        assert_eq!(summary.examples[0].text, "ok");
        assert_eq!(summary.examples[2].text, "nice");
    }

    #[test]
    fn top_reason_picks_highest_count() {
        // TOO_SHORT: 2, GENERIC: 1, LOW_SIGNAL: 0
        let report = analyze_comments_quality(&["Seen today", "fine"]);
        let summary = EpaCheckSummary::from_report(&report);
        assert_eq!(summary.top_reason(), Some(FaultReason::TooShort));
    }

    #[test]
    fn top_reason_ties_follow_canonical_order() {
        // TOO_SHORT, GENERIC and LOW_SIGNAL all count 1
        let report = analyze_comments_quality(&["good"]);
        let summary = EpaCheckSummary::from_report(&report);
        assert_eq!(summary.top_reason(), Some(FaultReason::TooShort));

        // ALL_CAPS and PROFANITY both count 1; ALL_CAPS comes first
        let report = analyze_comments_quality(&["THIS ROTATION WAS A SHITSHOW, SHIT"]);
        let summary = EpaCheckSummary::from_report(&report);
        assert_eq!(summary.top_reason(), Some(FaultReason::AllCaps));
    }

    #[test]
    fn top_reason_none_when_clean() {
        let report = analyze_comments_quality(&[
            "Took a focused history and suggested a reasonable differential for chest pain",
        ]);
        let summary = EpaCheckSummary::from_report(&report);
        assert!(!summary.is_flagged());
        assert_eq!(summary.top_reason(), None);
    }

    #[test]
    fn check_report_covers_every_epa() {
        let mut per_epa = BTreeMap::new();
        for epa in REPORT_EPAS {
            per_epa.insert(epa, Vec::new());
        }
        per_epa.insert(4, comments(&["ok", "Presented the case clearly because notes were organized"]));

        let summaries = check_report(&CommentAnalyzer::default(), &per_epa);
        assert_eq!(summaries.len(), 13);
        assert!(has_any_flags(&summaries));
        assert_eq!(summaries[&4].flagged_comments, 1);
        assert_eq!(summaries[&4].total_comments, 2);
        assert_eq!(summaries[&1].total_comments, 0);
        assert!(!summaries[&1].is_flagged());
    }

    #[test]
    fn no_flags_for_empty_report() {
        let summaries = check_report(&CommentAnalyzer::default(), &BTreeMap::new());
        assert!(!has_any_flags(&summaries));
    }

    fn single_epa(items: &[&str]) -> BTreeMap<u32, Vec<String>> {
        [(2, comments(items))].into_iter().collect()
    }

    #[test]
    fn report_cache_reuses_fresh_checks() {
        let clock = crate::cache::ManualClock::new();
        let mut cache =
            ReportCache::with_clock(CommentAnalyzer::default(), Duration::from_secs(60), &clock);
        let collects = std::cell::Cell::new(0);
        let collect = |items: &'static [&'static str]| {
            let collects = &collects;
            move || {
                collects.set(collects.get() + 1);
                single_epa(items)
            }
        };

        assert_eq!(cache.check("s1", collect(&["ok"]))[&2].flagged_comments, 1);
        // fresh: the new comments are never collected
        assert_eq!(cache.check("s1", collect(&["fine", "good"]))[&2].flagged_comments, 1);
        assert_eq!(collects.get(), 1);

        assert_eq!(cache.check("s2", collect(&["fine", "good"]))[&2].flagged_comments, 2);
        assert_eq!(collects.get(), 2);

        clock.advance(Duration::from_secs(60));
        assert_eq!(cache.check("s1", collect(&["fine", "good"]))[&2].flagged_comments, 2);
        assert_eq!(collects.get(), 3);
    }

    #[test]
    fn report_cache_invalidate_forces_recheck() {
        let mut cache = ReportCache::new(CommentAnalyzer::default(), crate::cache::DEFAULT_TTL);
        assert!(cache.check("s1", || single_epa(&["ok"]))[&2].is_flagged());
        assert!(cache.invalidate("s1"));
        assert!(!cache.invalidate("s1"));
        let clean = "Reviewed the chart and flagged the interaction because doses overlapped";
        assert!(!cache.check("s1", || single_epa(&[clean]))[&2].is_flagged());
    }
}

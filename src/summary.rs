//! Per-run phase statistics.
//!
//! A [`PhaseSummary`] is a pure function of one classified run.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;

use crate::classify::{Category, ClassifiedEvent, ClassifiedRun, Phase};
use crate::events::{tools, EventKind, Seq, TokenUsage, ToolCall};

/// Summed token counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenTotals {
    pub input: u64,
    pub output: u64,
    pub cache_create: u64,
    pub cache_read: u64,
}

impl TokenTotals {
    /// Counters saturate at `u64::MAX` rather than wrap.
    pub fn add(&mut self, usage: &TokenUsage) {
        self.input = self.input.saturating_add(usage.input_tokens);
        self.output = self.output.saturating_add(usage.output_tokens);
        self.cache_create = self.cache_create.saturating_add(usage.cache_creation_tokens);
        self.cache_read = self.cache_read.saturating_add(usage.cache_read_tokens);
    }

    /// Fresh input plus output. Cache tokens are billed differently and
    /// are reported separately.
    pub fn total(&self) -> u64 {
        self.input.saturating_add(self.output)
    }
}

/// Statistics for one side of the first-edit boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PhaseStats {
    pub tool_counts: BTreeMap<String, usize>,
    pub tool_call_count: usize,
    pub tokens: TokenTotals,
    pub token_total: u64,
    pub unique_files: BTreeSet<String>,
    pub unique_file_count: usize,
}

impl PhaseStats {
    fn record_tool_call(&mut self, call: &ToolCall) {
        *self.tool_counts.entry(call.tool_name.clone()).or_insert(0) += 1;
        self.tool_call_count += 1;
        if let Some(path) = call.file_path.as_deref().filter(|p| !p.is_empty()) {
            self.unique_files.insert(path.to_string());
            self.unique_file_count = self.unique_files.len();
        }
    }

    fn record_tokens(&mut self, usage: &TokenUsage) {
        self.tokens.add(usage);
        self.token_total = self.tokens.total();
    }
}

/// Navigation-phase statistics with lookup breakdowns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NavPhaseStats {
    #[serde(flatten)]
    pub stats: PhaseStats,
    /// Plain `Read` calls.
    pub reads: usize,
    /// `Grep` and `Glob` calls.
    pub greps: usize,
    /// Sidecar-assisted lookups.
    pub fmm_lookups: usize,
    /// Lookups with plain navigation tools.
    pub raw_nav_lookups: usize,
}

impl NavPhaseStats {
    fn record_tool_call(&mut self, call: &ToolCall, category: Category) {
        self.stats.record_tool_call(call);
        match call.tool_name.as_str() {
            tools::READ => self.reads += 1,
            tools::GREP | tools::GLOB => self.greps += 1,
            _ => {}
        }
        match category {
            Category::FmmNavigation => self.fmm_lookups += 1,
            Category::Navigation => self.raw_nav_lookups += 1,
            _ => {}
        }
    }
}

/// Whole-run totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunTotals {
    pub tokens: TokenTotals,
    pub token_total: u64,
    pub tool_calls: usize,
}

/// Phase-split statistics for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PhaseSummary {
    pub nav_phase: NavPhaseStats,
    pub work_phase: PhaseStats,
    pub totals: RunTotals,
    pub first_edit_seq: Option<Seq>,
    pub has_edits: bool,
}

/// Suppresses repeated usage reports for the same message.
///
/// A streamed message reports its usage at message start and again on the
/// final assistant record. Only the first sighting counts.
#[derive(Debug, Default)]
struct MessageDedup {
    seen: HashSet<String>,
}

impl MessageDedup {
    /// Whether `usage` should be counted. Usage without an id always counts.
    fn first_sighting(&mut self, usage: &TokenUsage) -> bool {
        match &usage.message_id {
            Some(id) if !id.is_empty() => self.seen.insert(id.clone()),
            _ => true,
        }
    }
}

impl PhaseSummary {
    pub fn from_run(run: &ClassifiedRun) -> Self {
        Self::from_events(&run.events, run.first_edit_seq)
    }

    /// Reduce classified events in seq order.
    pub fn from_events(events: &[ClassifiedEvent], first_edit_seq: Option<Seq>) -> Self {
        let mut summary = PhaseSummary {
            first_edit_seq,
            has_edits: first_edit_seq.is_some(),
            ..Default::default()
        };
        let mut dedup = MessageDedup::default();

        for classified in events {
            match &classified.event.kind {
                EventKind::TokenUsage(usage) => {
                    if !dedup.first_sighting(usage) {
                        continue;
                    }
                    summary.totals.tokens.add(usage);
                    match classified.phase {
                        Phase::Nav => summary.nav_phase.stats.record_tokens(usage),
                        Phase::Work => summary.work_phase.record_tokens(usage),
                    }
                }
                EventKind::ToolCall(call) => {
                    summary.totals.tool_calls += 1;
                    match classified.phase {
                        Phase::Nav => summary.nav_phase.record_tool_call(call, classified.category),
                        Phase::Work => summary.work_phase.record_tool_call(call),
                    }
                }
                EventKind::Init(_) | EventKind::UserMessage | EventKind::AssistantText { .. } => {}
            }
        }

        summary.totals.token_total = summary.totals.tokens.total();
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Event, UsageSource};

    fn tool_event(
        seq: Seq,
        name: &str,
        path: &str,
        category: Category,
        phase: Phase,
    ) -> ClassifiedEvent {
        ClassifiedEvent {
            event: Event {
                seq,
                session_id: None,
                kind: EventKind::ToolCall(ToolCall::new(name).with_file_path(path)),
            },
            category,
            phase,
        }
    }

    fn token_event(
        seq: Seq,
        input: u64,
        output: u64,
        msg_id: Option<&str>,
        phase: Phase,
    ) -> ClassifiedEvent {
        ClassifiedEvent {
            event: Event {
                seq,
                session_id: None,
                kind: EventKind::TokenUsage(TokenUsage {
                    source: UsageSource::Assistant,
                    message_id: msg_id.map(String::from),
                    input_tokens: input,
                    output_tokens: output,
                    cache_creation_tokens: 10,
                    cache_read_tokens: 20,
                }),
            },
            category: Category::TokenUsage,
            phase,
        }
    }

    #[test]
    fn test_basic_summary() {
        let events = vec![
            tool_event(0, "Read", "/a.py", Category::Navigation, Phase::Nav),
            tool_event(1, "Grep", "/src", Category::Navigation, Phase::Nav),
            token_event(2, 500, 100, Some("m1"), Phase::Nav),
            tool_event(3, "Edit", "/a.py", Category::TaskWork, Phase::Work),
            token_event(4, 200, 80, Some("m2"), Phase::Work),
        ];
        let summary = PhaseSummary::from_events(&events, Some(3));

        assert_eq!(summary.nav_phase.reads, 1);
        assert_eq!(summary.nav_phase.greps, 1);
        assert_eq!(summary.nav_phase.stats.tool_call_count, 2);
        assert_eq!(summary.nav_phase.stats.token_total, 600);
        assert_eq!(summary.work_phase.tool_call_count, 1);
        assert_eq!(summary.work_phase.token_total, 280);
        assert_eq!(summary.totals.token_total, 880);
        assert_eq!(summary.totals.tool_calls, 3);
        assert!(summary.has_edits);
        assert_eq!(summary.first_edit_seq, Some(3));
    }

    #[test]
    fn test_cache_tokens_tracked_but_not_in_total() {
        let events = vec![token_event(0, 5, 5, None, Phase::Nav)];
        let summary = PhaseSummary::from_events(&events, None);
        assert_eq!(summary.totals.tokens.cache_create, 10);
        assert_eq!(summary.totals.tokens.cache_read, 20);
        assert_eq!(summary.totals.token_total, 10);
    }

    #[test]
    fn test_token_dedup_by_message_id() {
        let events = vec![
            token_event(0, 100, 50, Some("msg-dup"), Phase::Nav),
            token_event(1, 100, 50, Some("msg-dup"), Phase::Nav),
            token_event(2, 100, 50, Some("msg-dup"), Phase::Work),
        ];
        let summary = PhaseSummary::from_events(&events, None);
        assert_eq!(summary.totals.token_total, 150);
        assert_eq!(summary.nav_phase.stats.token_total, 150);
        assert_eq!(summary.work_phase.token_total, 0);
    }

    #[test]
    fn test_usage_without_message_id_always_counts() {
        let events = vec![
            token_event(0, 10, 0, None, Phase::Nav),
            token_event(1, 10, 0, None, Phase::Nav),
        ];
        let summary = PhaseSummary::from_events(&events, None);
        assert_eq!(summary.totals.token_total, 20);
    }

    #[test]
    fn test_huge_counters_saturate() {
        let events = vec![
            token_event(0, u64::MAX, 0, Some("m1"), Phase::Nav),
            token_event(1, u64::MAX, 7, Some("m2"), Phase::Nav),
        ];
        let summary = PhaseSummary::from_events(&events, None);
        assert_eq!(summary.totals.tokens.input, u64::MAX);
        assert_eq!(summary.totals.tokens.output, 7);
        assert_eq!(summary.totals.token_total, u64::MAX);
        assert_eq!(summary.nav_phase.stats.token_total, u64::MAX);
    }

    #[test]
    fn test_fmm_lookups_counted() {
        let events = vec![
            tool_event(0, tools::READ_SYMBOL, "/a.ts", Category::FmmNavigation, Phase::Nav),
            tool_event(1, "Read", "/a.ts.fmm", Category::FmmNavigation, Phase::Nav),
            tool_event(2, "Read", "/b.py", Category::Navigation, Phase::Nav),
        ];
        let summary = PhaseSummary::from_events(&events, None);
        assert_eq!(summary.nav_phase.fmm_lookups, 2);
        assert_eq!(summary.nav_phase.raw_nav_lookups, 1);
        assert_eq!(summary.nav_phase.reads, 2);
    }

    #[test]
    fn test_work_phase_lookups_not_counted() {
        let events = vec![
            tool_event(0, "Edit", "/a.py", Category::TaskWork, Phase::Work),
            tool_event(1, "Read", "/b.py", Category::Navigation, Phase::Work),
        ];
        let summary = PhaseSummary::from_events(&events, Some(0));
        assert_eq!(summary.nav_phase.raw_nav_lookups, 0);
        assert_eq!(summary.work_phase.tool_counts.get("Read"), Some(&1));
        assert_eq!(summary.work_phase.unique_file_count, 2);
    }

    #[test]
    fn test_no_events() {
        let summary = PhaseSummary::from_events(&[], None);
        assert_eq!(summary.nav_phase.stats.tool_call_count, 0);
        assert_eq!(summary.totals.token_total, 0);
        assert!(!summary.has_edits);
    }

    #[test]
    fn test_unique_files_tracked() {
        let events = vec![
            tool_event(0, "Read", "/b.py", Category::Navigation, Phase::Nav),
            tool_event(1, "Read", "/a.py", Category::Navigation, Phase::Nav),
            tool_event(2, "Read", "/a.py", Category::Navigation, Phase::Nav),
        ];
        let summary = PhaseSummary::from_events(&events, None);
        assert_eq!(summary.nav_phase.stats.unique_file_count, 2);
        let files: Vec<&str> = summary
            .nav_phase
            .stats
            .unique_files
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(files, vec!["/a.py", "/b.py"]);
        assert_eq!(summary.nav_phase.stats.tool_counts.get("Read"), Some(&3));
    }

    #[test]
    fn test_serialized_shape() {
        let events = vec![tool_event(0, "Read", "/z.py", Category::Navigation, Phase::Nav)];
        let value = serde_json::to_value(PhaseSummary::from_events(&events, None)).unwrap();
        assert_eq!(value["nav_phase"]["reads"], 1);
        assert_eq!(value["nav_phase"]["unique_files"], serde_json::json!(["/z.py"]));
        assert_eq!(value["first_edit_seq"], serde_json::Value::Null);
        assert_eq!(value["has_edits"], false);
    }
}

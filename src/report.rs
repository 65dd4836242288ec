//! Report rendering for comparisons and parsed runs.
//!
//! Formatters only read the records produced by [`crate::compare`]; nothing
//! here recomputes an aggregate.

use std::collections::BTreeMap;

use crate::compare::{Comparison, ConditionAggregate, ConditionReport, NO_RATIO};
use crate::error::Result;
use crate::events::{Event, Run};
use crate::summary::TokenTotals;

/// Trait for formatting comparison reports.
/// Implement this trait to add new output formats.
pub trait ReportFormatter {
    fn format(&self, comparison: &Comparison) -> Result<String>;
}

/// Fixed-column comparison table, optionally followed by per-run detail.
#[derive(Debug, Clone)]
pub struct TextFormatter {
    pub control_label: String,
    pub treatment_label: String,
    /// Append the per-run listing after the table.
    pub detail: bool,
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self {
            control_label: "Control (no fmm)".to_string(),
            treatment_label: "Treatment (fmm)".to_string(),
            detail: true,
        }
    }
}

impl ReportFormatter for TextFormatter {
    fn format(&self, comparison: &Comparison) -> Result<String> {
        let mut output = self.table(&comparison.control.aggregate, &comparison.treatment.aggregate);
        if self.detail {
            output.push_str("\n\n\n--- Per-iteration detail ---\n\n");
            push_detail(&mut output, "CONTROL", &comparison.control);
            push_detail(&mut output, "TREATMENT", &comparison.treatment);
        }
        Ok(output)
    }
}

impl TextFormatter {
    /// Render the comparison table. No trailing newline.
    pub fn table(&self, control: &ConditionAggregate, treatment: &ConditionAggregate) -> String {
        let rows: Vec<(&str, String, String)> = vec![
            (
                "Reads before first edit",
                control.nav_reads.to_string(),
                treatment.nav_reads.to_string(),
            ),
            (
                "Greps before first edit",
                control.nav_greps.to_string(),
                treatment.nav_greps.to_string(),
            ),
            (
                "Unique files discovered",
                control.nav_unique_file_count.to_string(),
                treatment.nav_unique_file_count.to_string(),
            ),
            (
                "Navigation tokens",
                approx_tokens(control.nav_tokens),
                approx_tokens(treatment.nav_tokens),
            ),
            (
                "Navigation % of total",
                format!("{}%", control.nav_pct),
                format!("{}%", treatment.nav_pct),
            ),
            ("Time to first edit", first_edit(control), first_edit(treatment)),
            // The control condition has no sidecar files to look up.
            ("Sidecar lookups", NO_RATIO.to_string(), treatment.sidecar_ratio.clone()),
            ("Task complete", task_complete(control), task_complete(treatment)),
            (
                "Total iterations",
                control.iteration_count.to_string(),
                treatment.iteration_count.to_string(),
            ),
            (
                "Total tokens",
                approx_tokens(control.total_tokens),
                approx_tokens(treatment.total_tokens),
            ),
        ];

        let width = |s: &str| s.chars().count();
        let label_w = rows.iter().map(|r| width(r.0)).max().unwrap_or(0) + 2;
        let c_w = rows
            .iter()
            .map(|r| width(&r.1))
            .max()
            .unwrap_or(0)
            .max(width(&self.control_label))
            + 2;
        let t_w = rows
            .iter()
            .map(|r| width(&r.2))
            .max()
            .unwrap_or(0)
            .max(width(&self.treatment_label))
            + 2;

        let mut lines = Vec::with_capacity(rows.len() + 2);
        lines.push(format!(
            "{:>label_w$}  {:<c_w$}  {:<t_w$}",
            "", self.control_label, self.treatment_label
        ));
        lines.push(format!(
            "{:>label_w$}  {}  {}",
            "",
            "─".repeat(c_w),
            "─".repeat(t_w)
        ));
        for (label, c_val, t_val) in &rows {
            lines.push(format!(
                "{:<label_w$}  {:<c_w$}  {:<t_w$}",
                format!("{label}:"),
                c_val,
                t_val
            ));
        }
        lines.join("\n")
    }
}

fn push_detail(output: &mut String, heading: &str, report: &ConditionReport) {
    output.push_str(&format!("  {heading}:\n"));
    for (name, summary) in &report.iterations {
        let edit = match summary.first_edit_seq {
            Some(seq) => format!("first edit @ seq {seq}"),
            None => "no edits".to_string(),
        };
        output.push_str(&format!(
            "    {}: {} nav calls, {} nav tokens, {} total tokens, {}\n",
            name,
            summary.nav_phase.stats.tool_call_count,
            thousands(summary.nav_phase.stats.token_total),
            thousands(summary.totals.token_total),
            edit,
        ));
    }
    output.push('\n');
}

/// `~12,345` for counts of a thousand or more.
fn approx_tokens(n: u64) -> String {
    if n >= 1000 {
        format!("~{}", thousands(n))
    } else {
        n.to_string()
    }
}

fn first_edit(agg: &ConditionAggregate) -> String {
    match agg.first_edit_iteration.as_deref().filter(|n| !n.is_empty()) {
        Some(name) => {
            // "exp-a-iter3" -> "iter3"
            let short = name.rsplit('-').next().unwrap_or(name);
            match agg.first_edit_pct {
                Some(pct) => format!("{short} @ {pct}%"),
                None => format!("{short} @ {NO_RATIO}"),
            }
        }
        None => "no edits".to_string(),
    }
}

fn task_complete(agg: &ConditionAggregate) -> String {
    let text = if agg.has_edits { "yes" } else { "no edits" };
    text.to_string()
}

/// Group digits with commas.
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Structured dump of the whole comparison.
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter;

impl ReportFormatter for JsonFormatter {
    fn format(&self, comparison: &Comparison) -> Result<String> {
        let mut output = serde_json::to_string_pretty(comparison)?;
        output.push('\n');
        Ok(output)
    }
}

/// Raw per-run event totals, before classification or deduplication.
pub fn format_event_summary(runs: &[Run]) -> String {
    let rule = "=".repeat(60);
    let mut output = String::new();

    for run in runs {
        let tool_calls = run.tool_calls().count();
        let token_events = run.token_usages().count();
        let mut tokens = TokenTotals::default();
        for usage in run.token_usages() {
            tokens.add(usage);
        }

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for call in run.tool_calls() {
            *counts.entry(call.tool_name.as_str()).or_insert(0) += 1;
        }
        let mut breakdown: Vec<(&str, usize)> = counts.into_iter().collect();
        breakdown.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

        output.push_str(&format!("\n{rule}\n  {}\n{rule}\n", run.name));
        output.push_str(&format!("  Total events:    {}\n", run.events.len()));
        output.push_str(&format!("  Tool calls:      {tool_calls}\n"));
        output.push_str(&format!("  Token events:    {token_events}\n"));
        output.push_str(&format!("  Input tokens:    {}\n", thousands(tokens.input)));
        output.push_str(&format!("  Output tokens:   {}\n", thousands(tokens.output)));
        output.push_str(&format!("  Cache create:    {}\n", thousands(tokens.cache_create)));
        output.push_str(&format!("  Cache read:      {}\n", thousands(tokens.cache_read)));
        output.push_str("\n  Tool breakdown:\n");
        for (tool, count) in breakdown {
            output.push_str(&format!("    {tool:40} {count}\n"));
        }
    }

    output
}

/// Parsed events keyed by run name.
pub fn events_json(runs: &[Run]) -> Result<String> {
    let by_name: BTreeMap<&str, &[Event]> = runs
        .iter()
        .map(|run| (run.name.as_str(), run.events.as_slice()))
        .collect();
    let mut output = serde_json::to_string_pretty(&by_name)?;
    output.push('\n');
    Ok(output)
}

/// Count of events of each kind, for diagnostics.
pub fn kind_counts(events: &[Event]) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for event in events {
        *counts.entry(event.kind.name()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::tests::phase_summary;
    use crate::events::{EventKind, TokenUsage, ToolCall, UsageSource};

    fn report(entries: Vec<(&str, crate::summary::PhaseSummary)>) -> ConditionReport {
        let iterations: BTreeMap<String, _> = entries
            .into_iter()
            .map(|(n, s)| (n.to_string(), s))
            .collect();
        let aggregate = ConditionAggregate::from_summaries(&iterations);
        ConditionReport {
            iterations,
            aggregate,
        }
    }

    fn comparison() -> Comparison {
        Comparison {
            control: report(vec![(
                "ctl-iter1",
                phase_summary(1, 0, &["/a.py"], 100, 50, (0, 1), Some(5)),
            )]),
            treatment: report(vec![(
                "trt-iter1",
                phase_summary(2, 0, &["/b.py"], 200, 80, (3, 1), None),
            )]),
        }
    }

    #[test]
    fn test_table_has_headers_and_rows() {
        let output = TextFormatter::default().format(&comparison()).unwrap();
        assert!(output.contains("Control (no fmm)"));
        assert!(output.contains("Treatment (fmm)"));
        for label in [
            "Reads before first edit:",
            "Greps before first edit:",
            "Unique files discovered:",
            "Navigation tokens:",
            "Navigation % of total:",
            "Time to first edit:",
            "Sidecar lookups:",
            "Task complete:",
            "Total iterations:",
            "Total tokens:",
        ] {
            assert!(output.contains(label), "missing {label}");
        }
    }

    #[test]
    fn test_table_values() {
        let c = comparison();
        let table = TextFormatter::default().table(&c.control.aggregate, &c.treatment.aggregate);
        let row = |label: &str| {
            table
                .lines()
                .find(|l| l.starts_with(label))
                .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
                .unwrap()
        };
        assert_eq!(row("Time to first edit"), "Time to first edit: iter1 @ 67% no edits");
        assert_eq!(row("Sidecar lookups"), "Sidecar lookups: n/a 3/4");
        assert_eq!(row("Task complete"), "Task complete: yes no edits");
        assert_eq!(row("Navigation % of total"), "Navigation % of total: 67% 71%");
    }

    #[test]
    fn test_table_alignment() {
        let c = comparison();
        let table = TextFormatter::default().table(&c.control.aggregate, &c.treatment.aggregate);
        let lines: Vec<&str> = table.lines().collect();
        let label_w = "Reads before first edit".len() + 2;
        assert!(lines[0].starts_with(&" ".repeat(label_w + 2)));
        assert!(lines[1].trim_start().starts_with('─'));
        assert_eq!(&lines[2][..label_w], format!("{:<label_w$}", "Reads before first edit:"));
        let value_col = lines[2].find('1').unwrap();
        assert_eq!(value_col, label_w + 2);
        assert_eq!(lines[0].find('C').unwrap(), value_col);
    }

    #[test]
    fn test_custom_labels() {
        let formatter = TextFormatter {
            control_label: "Baseline".into(),
            treatment_label: "Experiment".into(),
            detail: false,
        };
        let output = formatter.format(&comparison()).unwrap();
        assert!(output.contains("Baseline"));
        assert!(output.contains("Experiment"));
        assert!(!output.contains("Per-iteration detail"));
    }

    #[test]
    fn test_large_token_formatting() {
        let c = Comparison {
            control: report(vec![("i1", phase_summary(0, 0, &[], 50_000, 10_000, (0, 0), None))]),
            treatment: report(vec![("i1", phase_summary(0, 0, &[], 30_000, 5_000, (0, 0), None))]),
        };
        let table = TextFormatter::default().table(&c.control.aggregate, &c.treatment.aggregate);
        assert!(table.contains("~50,000"));
        assert!(table.contains("~60,000"));
        assert!(table.contains("~35,000"));
    }

    #[test]
    fn test_per_run_detail() {
        let output = TextFormatter::default().format(&comparison()).unwrap();
        assert!(output.contains("--- Per-iteration detail ---"));
        assert!(output.contains(
            "  CONTROL:\n    ctl-iter1: 1 nav calls, 100 nav tokens, 150 total tokens, \
             first edit @ seq 5\n"
        ));
        assert!(output.contains(
            "  TREATMENT:\n    trt-iter1: 2 nav calls, 200 nav tokens, 280 total tokens, \
             no edits\n"
        ));
    }

    #[test]
    fn test_thousands() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1000), "1,000");
        assert_eq!(thousands(1234567), "1,234,567");
        assert_eq!(approx_tokens(999), "999");
        assert_eq!(approx_tokens(12345), "~12,345");
    }

    #[test]
    fn test_first_edit_without_pct() {
        let agg = ConditionAggregate {
            first_edit_iteration: Some("exp-iter2".into()),
            has_edits: true,
            ..Default::default()
        };
        assert_eq!(first_edit(&agg), "iter2 @ n/a");
    }

    #[test]
    fn test_json_dump_shape() {
        let output = JsonFormatter.format(&comparison()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert!(parsed["control"]["iterations"]["ctl-iter1"].is_object());
        let control = &parsed["control"]["aggregate"];
        assert_eq!(control["nav_unique_files"], serde_json::json!(["/a.py"]));
        assert_eq!(parsed["treatment"]["aggregate"]["sidecar_ratio"], "3/4");
        let treatment = &parsed["treatment"]["aggregate"];
        assert_eq!(treatment["first_edit_iteration"], serde_json::Value::Null);
        assert!(output.ends_with("}\n"));
    }

    #[test]
    fn test_event_summary() {
        let usage = |id: &str| Event {
            seq: 0,
            session_id: None,
            kind: EventKind::TokenUsage(TokenUsage {
                source: UsageSource::Assistant,
                message_id: Some(id.to_string()),
                input_tokens: 1500,
                output_tokens: 10,
                cache_creation_tokens: 0,
                cache_read_tokens: 2,
            }),
        };
        let call = |name: &str| Event {
            seq: 0,
            session_id: None,
            kind: EventKind::ToolCall(ToolCall::new(name)),
        };
        let run = Run::new(
            "single",
            vec![usage("m1"), usage("m1"), call("Read"), call("Grep"), call("Read")],
        );
        let output = format_event_summary(&[run.clone()]);
        assert!(output.contains("  single\n"));
        assert!(output.contains("  Total events:    5\n"));
        assert!(output.contains("  Tool calls:      3\n"));
        assert!(output.contains("  Input tokens:    3,000\n"));
        let read_pos = output.find("    Read ").unwrap();
        let grep_pos = output.find("    Grep ").unwrap();
        assert!(read_pos < grep_pos);

        assert_eq!(kind_counts(&run.events).get("tool_call"), Some(&3));
        let json: serde_json::Value = serde_json::from_str(&events_json(&[run]).unwrap()).unwrap();
        assert_eq!(json["single"][2]["type"], "tool_call");
        assert_eq!(json["single"][2]["tool_name"], "Read");
    }
}

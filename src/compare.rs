//! Cross-run aggregation for one experimental condition, and the pairing of
//! two conditions into a comparison.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Serialize, Serializer};
use tracing::info;

use crate::classify::ClassifiedRun;
use crate::error::{Error, Result};
use crate::events::Run;
use crate::ingest::{DiscoveryConfig, LogDirectory, RunSource};
use crate::summary::PhaseSummary;

/// Sidecar ratio shown when a condition made no navigation lookups.
pub const NO_RATIO: &str = "n/a";

/// Summary of every run in one condition.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConditionAggregate {
    pub iteration_count: usize,
    pub nav_reads: usize,
    pub nav_greps: usize,
    /// Union across runs; a file seen in several runs counts once.
    pub nav_unique_files: BTreeSet<String>,
    pub nav_unique_file_count: usize,
    pub nav_tokens: u64,
    pub total_tokens: u64,
    pub fmm_lookups: usize,
    pub raw_nav_lookups: usize,
    pub has_edits: bool,
    /// First run, in name order, that reached a qualifying edit.
    pub first_edit_iteration: Option<String>,
    /// Share of that run's tokens spent before its first edit.
    pub first_edit_pct: Option<u64>,
    pub nav_pct: u64,
    pub sidecar_ratio: String,
}

/// `part / whole` as a whole percentage, rounding half to even.
pub fn percent(part: u64, whole: u64) -> Option<u64> {
    if whole == 0 {
        return None;
    }
    Some((part as f64 / whole as f64 * 100.0).round_ties_even() as u64)
}

/// `"fmm/total"` or [`NO_RATIO`] when there were no lookups at all.
pub fn sidecar_ratio(fmm_lookups: usize, raw_nav_lookups: usize) -> String {
    let total = fmm_lookups + raw_nav_lookups;
    if total == 0 {
        NO_RATIO.to_string()
    } else {
        format!("{fmm_lookups}/{total}")
    }
}

impl ConditionAggregate {
    /// Fold per-run summaries. Runs are visited in name order.
    pub fn from_summaries(per_run: &BTreeMap<String, PhaseSummary>) -> Self {
        let mut agg = ConditionAggregate {
            iteration_count: per_run.len(),
            ..Default::default()
        };

        for (name, summary) in per_run {
            let nav = &summary.nav_phase;
            agg.nav_reads += nav.reads;
            agg.nav_greps += nav.greps;
            agg.nav_unique_files.extend(nav.stats.unique_files.iter().cloned());
            agg.nav_tokens = agg.nav_tokens.saturating_add(nav.stats.token_total);
            agg.total_tokens = agg.total_tokens.saturating_add(summary.totals.token_total);
            agg.fmm_lookups += nav.fmm_lookups;
            agg.raw_nav_lookups += nav.raw_nav_lookups;

            if summary.has_edits {
                agg.has_edits = true;
                if agg.first_edit_iteration.is_none() {
                    agg.first_edit_iteration = Some(name.clone());
                    agg.first_edit_pct = percent(nav.stats.token_total, summary.totals.token_total);
                }
            }
        }

        agg.nav_unique_file_count = agg.nav_unique_files.len();
        agg.nav_pct = percent(agg.nav_tokens, agg.total_tokens).unwrap_or(0);
        agg.sidecar_ratio = sidecar_ratio(agg.fmm_lookups, agg.raw_nav_lookups);
        agg
    }
}

/// Per-run summaries plus the condition aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConditionReport {
    /// Each summary is dumped with its own `iteration_name`.
    #[serde(serialize_with = "serialize_iterations")]
    pub iterations: BTreeMap<String, PhaseSummary>,
    pub aggregate: ConditionAggregate,
}

impl ConditionReport {
    /// Classify and summarize every run, then aggregate.
    pub fn from_runs(runs: Vec<Run>) -> Self {
        let iterations: BTreeMap<String, PhaseSummary> = runs
            .into_iter()
            .map(|run| {
                let classified = ClassifiedRun::from_run(run);
                let summary = PhaseSummary::from_run(&classified);
                info!(
                    run = %classified.name,
                    first_edit_seq = ?summary.first_edit_seq,
                    nav_tokens = summary.nav_phase.stats.token_total,
                    total_tokens = summary.totals.token_total,
                    "summarized run"
                );
                (classified.name, summary)
            })
            .collect();
        let aggregate = ConditionAggregate::from_summaries(&iterations);
        Self {
            iterations,
            aggregate,
        }
    }
}

#[derive(Serialize)]
struct NamedSummary<'a> {
    iteration_name: &'a str,
    #[serde(flatten)]
    summary: &'a PhaseSummary,
}

fn serialize_iterations<S: Serializer>(
    iterations: &BTreeMap<String, PhaseSummary>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_map(iterations.iter().map(|(name, summary)| {
        let named = NamedSummary {
            iteration_name: name,
            summary,
        };
        (name, named)
    }))
}

/// Load and analyze every run from `source`.
pub fn analyze_condition(source: &impl RunSource) -> Result<ConditionReport> {
    Ok(ConditionReport::from_runs(source.load_runs()?))
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(Error::MissingDirectory(dir.to_path_buf()))
    }
}

/// Analyze a condition's log directory.
pub fn analyze_dir(dir: &Path, config: &DiscoveryConfig) -> Result<ConditionReport> {
    ensure_dir(dir)?;
    analyze_existing_dir(dir, config)
}

fn analyze_existing_dir(dir: &Path, config: &DiscoveryConfig) -> Result<ConditionReport> {
    let report = analyze_condition(&LogDirectory::new(dir, config.clone()))?;
    info!(
        dir = %dir.display(),
        runs = report.aggregate.iteration_count,
        nav_pct = report.aggregate.nav_pct,
        sidecar_ratio = %report.aggregate.sidecar_ratio,
        "analyzed condition"
    );
    Ok(report)
}

/// Control and treatment side by side. Formatters read this as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub control: ConditionReport,
    pub treatment: ConditionReport,
}

impl Comparison {
    pub fn from_dirs(control: &Path, treatment: &Path, config: &DiscoveryConfig) -> Result<Self> {
        // Both directories are checked before any parsing starts.
        ensure_dir(control)?;
        ensure_dir(treatment)?;
        Ok(Self {
            control: analyze_existing_dir(control, config)?,
            treatment: analyze_existing_dir(treatment, config)?,
        })
    }
}

//! Behavioral categories and the navigation/work phase boundary.
//!
//! The boundary is the first `Edit`/`Write` to a file that is not harness
//! bookkeeping. Everything strictly before it is the `nav` phase.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::trace;

use crate::events::{tools, Event, EventKind, Run, Seq, ToolCall};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Finding out what is where with plain tools.
    Navigation,
    /// Navigation through fmm sidecar files or the symbol-lookup tool.
    FmmNavigation,
    TaskWork,
    Boilerplate,
    TokenUsage,
    Other,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Navigation => write!(f, "navigation"),
            Category::FmmNavigation => write!(f, "fmm_navigation"),
            Category::TaskWork => write!(f, "task_work"),
            Category::Boilerplate => write!(f, "boilerplate"),
            Category::TokenUsage => write!(f, "token_usage"),
            Category::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Nav,
    Work,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Nav => write!(f, "nav"),
            Phase::Work => write!(f, "work"),
        }
    }
}

/// An event together with its derived category and phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedEvent {
    #[serde(flatten)]
    pub event: Event,
    pub category: Category,
    pub phase: Phase,
}

/// A run after classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedRun {
    pub name: String,
    pub events: Vec<ClassifiedEvent>,
    pub first_edit_seq: Option<Seq>,
}

impl ClassifiedRun {
    pub fn from_run(run: Run) -> Self {
        let (events, first_edit_seq) = classify_events(run.events);
        Self {
            name: run.name,
            events,
            first_edit_seq,
        }
    }
}

// ---------------------------------------------------------------------------
// Pattern tables
// ---------------------------------------------------------------------------

/// A path rule that disqualifies an edit from being the phase boundary.
enum ExclusionRule {
    Pattern(Regex),
    /// `marker` anywhere in the path, unless directly followed by `allowed`.
    DirExcept { marker: Regex, allowed: &'static str },
}

impl ExclusionRule {
    fn matches(&self, path: &str) -> bool {
        match self {
            ExclusionRule::Pattern(re) => re.is_match(path),
            ExclusionRule::DirExcept { marker, allowed } => marker
                .find_iter(path)
                .any(|m| !path[m.end()..].starts_with(*allowed)),
        }
    }
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static pattern is valid")
}

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| compile(p)).collect()
}

/// Harness bookkeeping files. Experiment worktrees live under `.nancy/tasks/`
/// and are real work.
static EXCLUDED_EDIT_RULES: LazyLock<Vec<ExclusionRule>> = LazyLock::new(|| {
    vec![
        ExclusionRule::Pattern(compile(r"ISSUES\.md$")),
        ExclusionRule::Pattern(compile(r"COMPLETE$")),
        ExclusionRule::DirExcept {
            marker: compile(r"\.nancy/"),
            allowed: "tasks/",
        },
        ExclusionRule::Pattern(compile(r"config\.json$")),
        ExclusionRule::Pattern(compile(r"token-usage\.json$")),
    ]
});

static NAV_BASH_RE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_all(&[
        r"(?i)^(ls|find|tree|wc|cat|head|tail|stat|file)\b",
        r"(?i)^git\s+(log|show|diff|blame|status)",
        r"(?i)^(rg|grep|ag|ack)\b",
    ])
});

static TASK_BASH_RE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_all(&[
        r"(?i)^git\s+(add|commit|push|checkout|branch|merge|rebase|stash)",
        r"(?i)^(npm|pnpm|yarn|bun)\s+(test|build|run|install)",
        r"(?i)^(just|make|cargo|go)\s+(test|build|check|run)",
        r"(?i)^(pytest|jest|vitest|mocha)\b",
        r"(?i)^mkdir\b",
        r"(?i)^(cp|mv|rm)\b",
        r"(?i)^(tsc|eslint|prettier)\b",
        r"(?i)^(python|node|deno|bun)\b",
    ])
});

static BOILERPLATE_BASH_RE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_all(&[
        r"(?i)^nancy\s+(inbox|msg|archive|status)",
        r"(?i)^echo\s+.*done.*COMPLETE",
    ])
});

const SIDECAR_EXTENSION: &str = ".fmm";
const SIDECAR_TOKEN: &str = "fmm";
const SKILL_MARKERS: &[&str] = &["check-directives", "nancy"];
const LINEAR_NAMESPACE: &str = "mcp__linear";
const CONTEXT7_NAMESPACE: &str = "mcp__context7";

/// Whether an edit to `path` is harness bookkeeping rather than real work.
pub fn is_excluded_file(path: &str) -> bool {
    EXCLUDED_EDIT_RULES.iter().any(|rule| rule.matches(path))
}

fn matches_any(text: &str, patterns: &[Regex]) -> bool {
    patterns.iter().any(|re| re.is_match(text))
}

// ---------------------------------------------------------------------------
// Tool-call rules
// ---------------------------------------------------------------------------

/// One entry of the ordered rule table.
pub struct Rule {
    pub name: &'static str,
    pub category: Category,
    matches: fn(&ToolCall) -> bool,
}

impl Rule {
    const fn new(name: &'static str, category: Category, matches: fn(&ToolCall) -> bool) -> Self {
        Self {
            name,
            category,
            matches,
        }
    }
}

fn is_bash(call: &ToolCall) -> bool {
    call.tool_name == tools::BASH
}

fn is_sidecar_lookup(call: &ToolCall) -> bool {
    if call.tool_name == tools::READ_SYMBOL {
        return true;
    }
    if call.tool_name == tools::READ && call.path_str().contains(SIDECAR_EXTENSION) {
        return true;
    }
    if is_bash(call) {
        let cmd = call.command_str().to_lowercase();
        return cmd.contains(SIDECAR_TOKEN) && (cmd.contains("search") || cmd.contains("grep"));
    }
    false
}

fn is_boilerplate_tool(call: &ToolCall) -> bool {
    call.tool_name == tools::TODO_WRITE || call.tool_name == tools::KILL_SHELL
}

fn is_harness_skill(call: &ToolCall) -> bool {
    call.tool_name == tools::SKILL && SKILL_MARKERS.iter().any(|m| call.command_str().contains(m))
}

fn is_skill(call: &ToolCall) -> bool {
    call.tool_name == tools::SKILL
}

fn is_boilerplate_bash(call: &ToolCall) -> bool {
    is_bash(call) && matches_any(call.command_str(), &BOILERPLATE_BASH_RE)
}

fn is_edit_tool(call: &ToolCall) -> bool {
    tools::EDIT_TOOLS.contains(&call.tool_name.as_str())
}

fn is_task_bash(call: &ToolCall) -> bool {
    is_bash(call) && matches_any(call.command_str(), &TASK_BASH_RE)
}

fn is_navigation_tool(call: &ToolCall) -> bool {
    matches!(
        call.tool_name.as_str(),
        tools::READ
            | tools::GREP
            | tools::GLOB
            | tools::WEB_FETCH
            | tools::TASK
            | tools::TASK_OUTPUT
    )
}

fn is_navigation_bash(call: &ToolCall) -> bool {
    is_bash(call) && matches_any(call.command_str(), &NAV_BASH_RE)
}

fn is_linear(call: &ToolCall) -> bool {
    call.tool_name.starts_with(LINEAR_NAMESPACE)
}

fn is_context7(call: &ToolCall) -> bool {
    call.tool_name.starts_with(CONTEXT7_NAMESPACE)
}

/// Tool-call rules in priority order; the first match wins.
pub static TOOL_RULES: &[Rule] = &[
    Rule::new("sidecar-lookup", Category::FmmNavigation, is_sidecar_lookup),
    Rule::new("boilerplate-tool", Category::Boilerplate, is_boilerplate_tool),
    Rule::new("harness-skill", Category::Boilerplate, is_harness_skill),
    Rule::new("other-skill", Category::Other, is_skill),
    Rule::new("boilerplate-bash", Category::Boilerplate, is_boilerplate_bash),
    Rule::new("edit-tool", Category::TaskWork, is_edit_tool),
    Rule::new("task-bash", Category::TaskWork, is_task_bash),
    Rule::new("navigation-tool", Category::Navigation, is_navigation_tool),
    Rule::new("navigation-bash", Category::Navigation, is_navigation_bash),
    Rule::new("linear", Category::Boilerplate, is_linear),
    Rule::new("context7", Category::Navigation, is_context7),
    // Unmatched shell activity counts as navigation. Heuristic; see DESIGN.md.
    Rule::new("other-bash", Category::Navigation, is_bash),
];

/// First rule in [`TOOL_RULES`] that matches `call`.
pub fn matching_rule(call: &ToolCall) -> Option<&'static Rule> {
    TOOL_RULES.iter().find(|rule| (rule.matches)(call))
}

pub fn classify_tool_call(call: &ToolCall) -> Category {
    matching_rule(call).map_or(Category::Other, |rule| rule.category)
}

/// Category of any event kind.
pub fn category_of(kind: &EventKind) -> Category {
    match kind {
        EventKind::ToolCall(call) => classify_tool_call(call),
        EventKind::TokenUsage(_) => Category::TokenUsage,
        EventKind::Init(_) => Category::Boilerplate,
        EventKind::UserMessage | EventKind::AssistantText { .. } => Category::Other,
    }
}

// ---------------------------------------------------------------------------
// Phase boundary
// ---------------------------------------------------------------------------

/// Seq of the first edit to a non-excluded file, if any.
pub fn find_first_edit(events: &[Event]) -> Option<Seq> {
    events.iter().find_map(|event| match &event.kind {
        EventKind::ToolCall(call) if is_edit_tool(call) && !is_excluded_file(call.path_str()) => {
            Some(event.seq)
        }
        _ => None,
    })
}

pub fn phase_of(seq: Seq, first_edit_seq: Option<Seq>) -> Phase {
    match first_edit_seq {
        Some(boundary) if seq >= boundary => Phase::Work,
        _ => Phase::Nav,
    }
}

/// Classify a run's events. Returns the enriched events and the boundary seq.
pub fn classify_events(events: Vec<Event>) -> (Vec<ClassifiedEvent>, Option<Seq>) {
    let first_edit_seq = find_first_edit(&events);

    let classified = events
        .into_iter()
        .map(|event| {
            let category = category_of(&event.kind);
            let phase = phase_of(event.seq, first_edit_seq);
            trace!(
                seq = event.seq,
                kind = event.kind.name(),
                %category,
                %phase,
                "classified event"
            );
            ClassifiedEvent {
                event,
                category,
                phase,
            }
        })
        .collect();

    (classified, first_edit_seq)
}

//! Guarded self-evolution: proposals, apply lifecycle, history, rollback.
//!
//! Performance analysis never mutates configuration directly. It is converted
//! into discrete proposals, and each proposal moves through a one-way
//! lifecycle: pending -> applied (auto-appliable types), pending -> recorded
//! (logged for manual follow-through), or pending -> rejected (human
//! decision). File-backed stores are snapshotted before any mutation, and the
//! most recent history entry is the sole rollback target.

use crate::core::audit::AuditLog;
use crate::core::error::MoltError;
use crate::core::jsonl::{self, ParseReport};
use crate::core::output;
use crate::core::store::Store;
use crate::core::time;
use crate::plugins::skills::{self, Skill};
use clap::{Parser, Subcommand};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// An unmatched task pattern must recur this often before a skill is proposed.
const MIN_PATTERN_COUNT: u64 = 3;
/// Below this aggregate success rate the alarm threshold itself is questioned.
const SUCCESS_RATE_ALARM: f64 = 60.0;
const SUCCESS_THRESHOLD_CURRENT: f64 = 70.0;
const SUCCESS_THRESHOLD_SUGGESTED: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Pending,
    Applied,
    Recorded,
    Rejected,
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProposalStatus::Pending => "pending",
            ProposalStatus::Applied => "applied",
            ProposalStatus::Recorded => "recorded",
            ProposalStatus::Rejected => "rejected",
        };
        write!(f, "{}", name)
    }
}

/// An analysis recommendation, carried verbatim through manual-review
/// proposals. Fields beyond severity are preserved untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(default)]
    pub severity: String,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

/// Typed payload per proposal type. The serialized shape is
/// `{"type": "...", "data": {...}}`, one line per proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ProposalKind {
    SkillAdd(Skill),
    SkillUpdate {
        skill_id: String,
        note: String,
    },
    RoutingUpdate {
        from_tool: String,
        to_tool: String,
        pattern: String,
    },
    ThresholdAdjust {
        metric: String,
        current_value: f64,
        suggested_value: f64,
    },
    KnowledgeAdd {
        topic: String,
        content: String,
    },
    PreferenceLearn {
        preference: String,
        value: String,
    },
    ManualReview(Recommendation),
    Info {
        message: String,
    },
}

impl ProposalKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProposalKind::SkillAdd(_) => "skill_add",
            ProposalKind::SkillUpdate { .. } => "skill_update",
            ProposalKind::RoutingUpdate { .. } => "routing_update",
            ProposalKind::ThresholdAdjust { .. } => "threshold_adjust",
            ProposalKind::KnowledgeAdd { .. } => "knowledge_add",
            ProposalKind::PreferenceLearn { .. } => "preference_learn",
            ProposalKind::ManualReview(_) => "manual_review",
            ProposalKind::Info { .. } => "info",
        }
    }

    /// Informational and manual-review proposals never leave `pending`
    /// through automation.
    pub fn auto_appliable(&self) -> bool {
        !matches!(self, ProposalKind::ManualReview(_) | ProposalKind::Info { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: String,
    #[serde(flatten)]
    pub kind: ProposalKind,
    pub reason: String,
    pub status: ProposalStatus,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// One applied or recorded change. History is append-only; entries are never
/// rewritten, and the newest entry is the only rollback candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryAction {
    SkillAdd {
        skill_id: String,
        backup: Option<PathBuf>,
    },
    RoutingUpdate {
        from_tool: String,
        to_tool: String,
        note: String,
    },
    ThresholdAdjust {
        metric: String,
        note: String,
    },
    Rollback {
        rolled_back: String,
        restored_from: PathBuf,
    },
}

impl HistoryAction {
    pub fn name(&self) -> &'static str {
        match self {
            HistoryAction::SkillAdd { .. } => "skill_add",
            HistoryAction::RoutingUpdate { .. } => "routing_update",
            HistoryAction::ThresholdAdjust { .. } => "threshold_adjust",
            HistoryAction::Rollback { .. } => "rollback",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal_id: Option<String>,
    #[serde(flatten)]
    pub action: HistoryAction,
}

/// Structured performance report handed over by the analysis collaborator.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisReport {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub memory: MemoryAnalysis,
    #[serde(default)]
    pub routing: RoutingAnalysis,
    #[serde(default)]
    pub sessions: SessionAnalysis,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
}

impl AnalysisReport {
    pub fn has_data(&self) -> bool {
        self.status.as_deref() != Some("no_data")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryAnalysis {
    /// (pattern, occurrence count) pairs for tasks no skill matched.
    #[serde(default)]
    pub common_missed_patterns: Vec<(String, u64)>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoutingAnalysis {
    #[serde(default)]
    pub efficiency_issues: Vec<EfficiencyIssue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EfficiencyIssue {
    #[serde(default)]
    pub issue: String,
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionAnalysis {
    #[serde(default = "default_success_rate")]
    pub success_rate: f64,
}

fn default_success_rate() -> f64 {
    100.0
}

impl Default for SessionAnalysis {
    fn default() -> Self {
        Self {
            success_rate: default_success_rate(),
        }
    }
}

/// Boolean-plus-message outcome for policy-guarded operations. Policy
/// violations land here; only I/O failures surface as `Err(MoltError)`.
#[derive(Debug, Clone)]
pub struct OpResult {
    pub success: bool,
    pub message: String,
}

impl OpResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

pub fn load_proposals(store: &Store) -> Result<(Vec<Proposal>, ParseReport), MoltError> {
    jsonl::load_records(&store.proposals_path())
}

pub fn load_history(store: &Store) -> Result<(Vec<HistoryEntry>, ParseReport), MoltError> {
    jsonl::load_records(&store.history_path())
}

fn new_proposal(kind: ProposalKind, reason: impl Into<String>) -> Proposal {
    Proposal {
        id: time::new_proposal_id(),
        kind,
        reason: reason.into(),
        status: ProposalStatus::Pending,
        timestamp: time::now_iso(),
        updated_at: None,
    }
}

fn trigger_covers(skills: &[Skill], pattern: &str) -> bool {
    let pattern_lower = pattern.to_lowercase();
    skills.iter().any(|skill| {
        skill
            .triggers
            .iter()
            .any(|trigger| trigger.to_lowercase().contains(&pattern_lower))
    })
}

fn auto_skill(pattern: &str) -> Skill {
    let pattern_lower = pattern.to_lowercase();
    let mut triggers = vec![pattern_lower.clone()];
    let spaced = pattern_lower.replace('-', " ");
    if spaced != pattern_lower {
        triggers.push(spaced);
    }
    Skill {
        skill_id: skills::skill_id_for_task(pattern),
        name: format!("auto-{}", pattern.replace(' ', "-")),
        description: format!("Auto-generated skill for: {}", pattern),
        triggers,
        tools_typically_used: vec!["Read".to_string(), "Edit".to_string(), "Bash".to_string()],
        estimated_tokens: 2000,
        success_rate: 0.0,
        times_used: 0,
        last_used: None,
        created_from_session: "auto_evolution".to_string(),
        key_steps: vec!["Fill in from observed successful runs".to_string()],
    }
}

/// Convert an analysis report into discrete change proposals.
///
/// Pure over its inputs: nothing is persisted here. Patterns already covered
/// by an existing skill trigger are suppressed, so re-running generation
/// against an unchanged store does not duplicate covered skills.
pub fn generate_proposals(analysis: Option<&AnalysisReport>, skills: &[Skill]) -> Vec<Proposal> {
    let analysis = match analysis {
        Some(a) if a.has_data() => a,
        _ => {
            return vec![new_proposal(
                ProposalKind::Info {
                    message: "Insufficient analysis data for proposals; continue normal operation."
                        .to_string(),
                },
                "No analysis data available",
            )];
        }
    };

    let mut proposals = Vec::new();

    for (pattern, count) in &analysis.memory.common_missed_patterns {
        if *count < MIN_PATTERN_COUNT {
            continue;
        }
        if trigger_covers(skills, pattern) {
            continue;
        }
        proposals.push(new_proposal(
            ProposalKind::SkillAdd(auto_skill(pattern)),
            format!(
                "Pattern \"{}\" appeared {} times without a matching skill",
                pattern, count
            ),
        ));
    }

    let pair_re = Regex::new(r"(\w+)->(\w+)").unwrap();
    for issue in &analysis.routing.efficiency_issues {
        if let Some(caps) = pair_re.captures(&issue.issue) {
            let from_tool = caps[1].to_string();
            let to_tool = caps[2].to_string();
            proposals.push(new_proposal(
                ProposalKind::RoutingUpdate {
                    pattern: format!("auto-detected from {} occurrences", issue.count),
                    from_tool: from_tool.clone(),
                    to_tool: to_tool.clone(),
                },
                format!(
                    "{} was suggested {} times when {} was used",
                    to_tool, issue.count, from_tool
                ),
            ));
        }
    }

    if analysis.sessions.success_rate < SUCCESS_RATE_ALARM {
        proposals.push(new_proposal(
            ProposalKind::ThresholdAdjust {
                metric: "success_rate_low".to_string(),
                current_value: SUCCESS_THRESHOLD_CURRENT,
                suggested_value: SUCCESS_THRESHOLD_SUGGESTED,
            },
            format!(
                "Current success rate ({}%) is below threshold",
                analysis.sessions.success_rate
            ),
        ));
    }

    for rec in &analysis.recommendations {
        if rec.severity == "high" {
            proposals.push(new_proposal(
                ProposalKind::ManualReview(rec.clone()),
                "High severity issue requiring manual review",
            ));
        }
    }

    proposals
}

/// Generate proposals against the current skill store and persist the
/// durable ones. Informational proposals are returned for rendering but not
/// persisted: they carry no state and would pile up on every no-data run.
pub fn propose(
    store: &Store,
    analysis: Option<&AnalysisReport>,
) -> Result<Vec<Proposal>, MoltError> {
    let (skills, _) = skills::load_skills(store)?;
    let proposals = generate_proposals(analysis, &skills);

    for proposal in &proposals {
        if matches!(proposal.kind, ProposalKind::Info { .. }) {
            continue;
        }
        jsonl::append_record(&store.proposals_path(), proposal)?;
    }
    AuditLog::new(&store.root).record("evolve.propose", "success")?;

    Ok(proposals)
}

fn backup_skills(store: &Store) -> Result<Option<PathBuf>, MoltError> {
    let live = store.skills_path();
    if !live.exists() {
        return Ok(None);
    }
    fs::create_dir_all(store.backups_dir()).map_err(MoltError::IoError)?;
    let backup_path = store
        .backups_dir()
        .join(format!("skills.jsonl.{}.bak", time::backup_stamp()));
    fs::copy(&live, &backup_path).map_err(MoltError::IoError)?;
    Ok(Some(backup_path))
}

fn set_status(store: &Store, proposal_id: &str, status: ProposalStatus) -> Result<(), MoltError> {
    let (mut proposals, _) = load_proposals(store)?;
    for proposal in proposals.iter_mut() {
        if proposal.id == proposal_id {
            proposal.status = status;
            proposal.updated_at = Some(time::now_iso());
        }
    }
    jsonl::rewrite_records(&store.proposals_path(), &proposals)
}

fn append_history(store: &Store, entry: &HistoryEntry) -> Result<(), MoltError> {
    jsonl::append_record(&store.history_path(), entry)
}

/// Carry one pending proposal through its lifecycle step.
///
/// A proposal is applied at most once: any non-pending status fails the
/// guard. `dry_run` reports what would happen without touching any store.
pub fn apply(store: &Store, proposal_id: &str, dry_run: bool) -> Result<OpResult, MoltError> {
    let (proposals, _) = load_proposals(store)?;
    let Some(proposal) = proposals.iter().find(|p| p.id == proposal_id).cloned() else {
        return Ok(OpResult::fail(format!("Proposal {} not found", proposal_id)));
    };

    if proposal.status != ProposalStatus::Pending {
        return Ok(OpResult::fail(format!(
            "Proposal {} already {}",
            proposal_id, proposal.status
        )));
    }

    if dry_run {
        return Ok(OpResult::ok(format!(
            "[dry run] Would apply {}: {}",
            proposal.kind.name(),
            proposal.reason
        )));
    }

    match &proposal.kind {
        ProposalKind::SkillAdd(skill) => {
            // Snapshot before any mutation so the change stays revertible.
            let backup = backup_skills(store)?;
            skills::record_skill(store, skill)?;
            append_history(
                store,
                &HistoryEntry {
                    timestamp: time::now_iso(),
                    proposal_id: Some(proposal.id.clone()),
                    action: HistoryAction::SkillAdd {
                        skill_id: skill.skill_id.clone(),
                        backup,
                    },
                },
            )?;
            set_status(store, &proposal.id, ProposalStatus::Applied)?;
            AuditLog::new(&store.root).record("evolve.apply", "success")?;
            Ok(OpResult::ok(format!("Added skill: {}", skill.name)))
        }
        ProposalKind::RoutingUpdate {
            from_tool, to_tool, ..
        } => {
            append_history(
                store,
                &HistoryEntry {
                    timestamp: time::now_iso(),
                    proposal_id: Some(proposal.id.clone()),
                    action: HistoryAction::RoutingUpdate {
                        from_tool: from_tool.clone(),
                        to_tool: to_tool.clone(),
                        note: "recorded for manual follow-through".to_string(),
                    },
                },
            )?;
            set_status(store, &proposal.id, ProposalStatus::Recorded)?;
            AuditLog::new(&store.root).record("evolve.apply", "success")?;
            Ok(OpResult::ok(format!(
                "Routing update recorded: {} -> {}",
                from_tool, to_tool
            )))
        }
        ProposalKind::ThresholdAdjust { metric, .. } => {
            append_history(
                store,
                &HistoryEntry {
                    timestamp: time::now_iso(),
                    proposal_id: Some(proposal.id.clone()),
                    action: HistoryAction::ThresholdAdjust {
                        metric: metric.clone(),
                        note: "recorded for manual follow-through".to_string(),
                    },
                },
            )?;
            set_status(store, &proposal.id, ProposalStatus::Recorded)?;
            AuditLog::new(&store.root).record("evolve.apply", "success")?;
            Ok(OpResult::ok(format!(
                "Threshold adjustment recorded: {}",
                metric
            )))
        }
        ProposalKind::ManualReview(_) => Ok(OpResult::fail(
            "Manual review proposals require a human decision and cannot be auto-applied",
        )),
        ProposalKind::Info { .. } => {
            Ok(OpResult::fail("Informational proposals require no action"))
        }
        ProposalKind::SkillUpdate { .. }
        | ProposalKind::KnowledgeAdd { .. }
        | ProposalKind::PreferenceLearn { .. } => Ok(OpResult::fail(format!(
            "No apply procedure for proposal type: {}",
            proposal.kind.name()
        ))),
    }
}

/// Apply every pending auto-appliable proposal, in collection order.
pub fn apply_all(store: &Store, dry_run: bool) -> Result<Vec<(String, OpResult)>, MoltError> {
    let (proposals, _) = load_proposals(store)?;
    let mut results = Vec::new();
    for proposal in proposals {
        if proposal.status != ProposalStatus::Pending || !proposal.kind.auto_appliable() {
            continue;
        }
        let result = apply(store, &proposal.id, dry_run)?;
        results.push((proposal.id, result));
    }
    Ok(results)
}

/// Mark a pending proposal as rejected. This is the manual decision path;
/// nothing ever rejects automatically.
pub fn reject(store: &Store, proposal_id: &str) -> Result<OpResult, MoltError> {
    let (proposals, _) = load_proposals(store)?;
    let Some(proposal) = proposals.iter().find(|p| p.id == proposal_id) else {
        return Ok(OpResult::fail(format!("Proposal {} not found", proposal_id)));
    };
    if proposal.status != ProposalStatus::Pending {
        return Ok(OpResult::fail(format!(
            "Proposal {} already {}",
            proposal_id, proposal.status
        )));
    }
    set_status(store, proposal_id, ProposalStatus::Rejected)?;
    AuditLog::new(&store.root).record("evolve.reject", "success")?;
    Ok(OpResult::ok(format!("Rejected proposal {}", proposal_id)))
}

/// Restore the most recent reversible change from its backup snapshot.
///
/// Only `skill_add` has a defined rollback: the pre-mutation snapshot is
/// copied back over the live collection. The rollback itself is recorded in
/// history, so an immediate second rollback finds the rollback entry on top
/// and fails instead of silently re-restoring the same backup.
pub fn rollback(store: &Store) -> Result<OpResult, MoltError> {
    let (history, _) = load_history(store)?;
    let Some(last) = history.last() else {
        return Ok(OpResult::fail("No history to roll back"));
    };

    match &last.action {
        HistoryAction::SkillAdd {
            backup: Some(backup),
            ..
        } => {
            if !backup.exists() {
                return Ok(OpResult::fail("No backup available for rollback"));
            }
            fs::copy(backup, store.skills_path()).map_err(MoltError::IoError)?;
            append_history(
                store,
                &HistoryEntry {
                    timestamp: time::now_iso(),
                    proposal_id: None,
                    action: HistoryAction::Rollback {
                        rolled_back: last.proposal_id.clone().unwrap_or_default(),
                        restored_from: backup.clone(),
                    },
                },
            )?;
            AuditLog::new(&store.root).record("evolve.rollback", "success")?;
            Ok(OpResult::ok(format!(
                "Rolled back skill_add from {}",
                last.timestamp
            )))
        }
        HistoryAction::SkillAdd { backup: None, .. } => {
            Ok(OpResult::fail("No backup available for rollback"))
        }
        other => Ok(OpResult::fail(format!(
            "Rollback not supported for type: {}",
            other.name()
        ))),
    }
}

fn status_icon(status: ProposalStatus) -> char {
    match status {
        ProposalStatus::Pending => '*',
        ProposalStatus::Applied => '+',
        ProposalStatus::Recorded => '>',
        ProposalStatus::Rejected => 'x',
    }
}

/// Markdown rendering of a proposal list for operators.
pub fn format_proposals(proposals: &[Proposal]) -> String {
    if proposals.is_empty() {
        return "No proposals generated. The harness is performing well!".to_string();
    }

    let mut lines = vec![
        "## Evolution Proposals".to_string(),
        String::new(),
        format!("Generated {} proposal(s):", proposals.len()),
        String::new(),
    ];

    for proposal in proposals {
        lines.push(format!(
            "{} **{}** [{}]",
            status_icon(proposal.status),
            proposal.id,
            proposal.kind.name()
        ));
        lines.push(format!("  Reason: {}", proposal.reason));
        if let Ok(payload) = serde_json::to_string(&proposal.kind) {
            lines.push(format!("  Data: {}", output::compact_line(&payload, 100)));
        }
        lines.push(String::new());
    }

    lines.push("---".to_string());
    lines.push("To apply: molt evolve apply --id <proposal_id>".to_string());
    lines.push("To apply all pending: molt evolve apply-all".to_string());

    lines.join("\n")
}

/// Markdown rendering of the most recent history entries.
pub fn format_history(history: &[HistoryEntry]) -> String {
    if history.is_empty() {
        return "No evolution history yet.".to_string();
    }

    let mut lines = vec!["## Evolution History".to_string(), String::new()];
    let start = history.len().saturating_sub(10);
    for entry in &history[start..] {
        lines.push(format!("- [{}] {}", entry.timestamp, entry.action.name()));
        if let Some(id) = &entry.proposal_id {
            lines.push(format!("  Proposal: {}", id));
        }
        match &entry.action {
            HistoryAction::RoutingUpdate { note, .. }
            | HistoryAction::ThresholdAdjust { note, .. } => {
                lines.push(format!("  Note: {}", note));
            }
            HistoryAction::Rollback { rolled_back, .. } => {
                lines.push(format!("  Rolled back: {}", rolled_back));
            }
            HistoryAction::SkillAdd { skill_id, .. } => {
                lines.push(format!("  Skill: {}", skill_id));
            }
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

pub fn initialize_evolution(root: &Path) -> Result<(), MoltError> {
    fs::create_dir_all(root.join("evolution").join("backups")).map_err(MoltError::IoError)?;
    Ok(())
}

#[derive(Parser, Debug)]
#[clap(name = "evolve", about = "Propose, apply and roll back harness changes")]
pub struct EvolveCli {
    #[clap(subcommand)]
    pub command: EvolveCommand,
}

#[derive(Subcommand, Debug)]
pub enum EvolveCommand {
    /// Generate proposals from the latest performance analysis.
    Propose {
        /// Analysis report JSON (defaults to `<root>/metrics/latest_analysis.json`).
        #[clap(long)]
        analysis: Option<PathBuf>,
        #[clap(long)]
        json: bool,
    },
    /// List pending proposals (or all with --all).
    List {
        #[clap(long)]
        all: bool,
        #[clap(long)]
        json: bool,
    },
    /// Apply one proposal by id.
    Apply {
        #[clap(long)]
        id: String,
        /// Show what would change without mutating anything.
        #[clap(long)]
        dry_run: bool,
    },
    /// Apply all pending auto-appliable proposals.
    ApplyAll {
        #[clap(long)]
        dry_run: bool,
    },
    /// Reject a pending proposal.
    Reject {
        #[clap(long)]
        id: String,
    },
    /// Show evolution history.
    History {
        #[clap(long)]
        json: bool,
    },
    /// Roll back the most recent reversible change.
    Rollback,
}

fn load_analysis_file(path: &Path) -> Result<Option<AnalysisReport>, MoltError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(MoltError::IoError)?;
    let report = serde_json::from_str(&raw).map_err(MoltError::JsonError)?;
    Ok(Some(report))
}

fn print_op_result(result: &OpResult) {
    use colored::Colorize;
    let verdict = if result.success {
        "Success".green().bold()
    } else {
        "Failed".red().bold()
    };
    println!("{}: {}", verdict, result.message);
}

pub fn run_evolve_cli(store: &Store, cli: EvolveCli) -> Result<(), MoltError> {
    match cli.command {
        EvolveCommand::Propose { analysis, json } => {
            let path = analysis
                .unwrap_or_else(|| store.root.join("metrics").join("latest_analysis.json"));
            let report = load_analysis_file(&path)?;
            let proposals = propose(store, report.as_ref())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&proposals)?);
            } else {
                println!("{}", format_proposals(&proposals));
            }
        }
        EvolveCommand::List { all, json } => {
            let (proposals, report) = load_proposals(store)?;
            if report.skipped > 0 {
                eprintln!(
                    "Warning: skipped {} corrupt proposal record(s)",
                    report.skipped
                );
            }
            let shown: Vec<Proposal> = proposals
                .into_iter()
                .filter(|p| all || p.status == ProposalStatus::Pending)
                .collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&shown)?);
            } else if shown.is_empty() {
                println!("No pending proposals. Run `molt evolve propose` to generate new ones.");
            } else {
                println!("{}", format_proposals(&shown));
            }
        }
        EvolveCommand::Apply { id, dry_run } => {
            let result = apply(store, &id, dry_run)?;
            print_op_result(&result);
        }
        EvolveCommand::ApplyAll { dry_run } => {
            let results = apply_all(store, dry_run)?;
            if results.is_empty() {
                println!("Nothing pending to apply.");
            }
            for (id, result) in &results {
                print!("[{}] ", id);
                print_op_result(result);
            }
        }
        EvolveCommand::Reject { id } => {
            let result = reject(store, &id)?;
            print_op_result(&result);
        }
        EvolveCommand::History { json } => {
            let (history, report) = load_history(store)?;
            if report.skipped > 0 {
                eprintln!(
                    "Warning: skipped {} corrupt history record(s)",
                    report.skipped
                );
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&history)?);
            } else {
                println!("{}", format_history(&history));
            }
        }
        EvolveCommand::Rollback => {
            let result = rollback(store)?;
            print_op_result(&result);
        }
    }
    Ok(())
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "evolve",
        "version": "0.1.0",
        "description": "Guarded proposal/apply/rollback pipeline for harness configuration",
        "commands": [
            { "name": "propose", "parameters": ["analysis"] },
            { "name": "list", "parameters": ["all"] },
            { "name": "apply", "parameters": ["id", "dry_run"] },
            { "name": "apply-all", "parameters": ["dry_run"] },
            { "name": "reject", "parameters": ["id"] },
            { "name": "history", "parameters": [] },
            { "name": "rollback", "parameters": [] }
        ],
        "storage": [
            "evolution/proposals.jsonl",
            "evolution/history.jsonl",
            "evolution/backups/"
        ]
    })
}

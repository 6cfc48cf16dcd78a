//! Procedural memory: the durable skill collection.
//!
//! A skill is a reusable task pattern extracted from a successfully completed
//! session. Matching is lexical trigger/description overlap, not semantic
//! similarity, so scores are only meaningful relative to each other.
//!
//! The collection lives in `memory/skills.jsonl`, one record per line. The
//! whole file is the unit of durability: saves rewrite it completely, and the
//! evolution pipeline snapshots it before any guarded mutation.

use crate::core::audit::AuditLog;
use crate::core::error::MoltError;
use crate::core::jsonl::{self, ParseReport};
use crate::core::store::Store;
use crate::core::time;
use clap::{Parser, Subcommand};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Fixed keyword vocabulary scanned against task text to derive triggers.
const TRIGGER_VOCABULARY: &[&str] = &[
    "auth", "test", "api", "database", "fix", "add", "create", "implement", "refactor",
    "update", "delete", "remove", "component", "hook", "middleware", "config", "deploy",
];

/// How many matched skills a retrieval returns at most.
const MATCH_LIMIT: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub skill_id: String,
    pub name: String,
    pub description: String,
    pub triggers: Vec<String>,
    pub tools_typically_used: Vec<String>,
    pub estimated_tokens: u64,
    pub success_rate: f64,
    pub times_used: u64,
    pub last_used: Option<String>,
    pub created_from_session: String,
    pub key_steps: Vec<String>,
}

/// Per-session record handed over by the session-outcome collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOutcome {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub outcome: String,
    #[serde(default)]
    pub tools_used: Vec<String>,
    #[serde(default)]
    pub key_decisions: Vec<String>,
    #[serde(default)]
    pub tokens_used: u64,
}

impl SessionOutcome {
    pub fn succeeded(&self) -> bool {
        self.outcome == "success"
    }
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Stable identifier for the skill derived from the task text, so identical
/// task text always maps to the same skill.
pub fn skill_id_for_task(task: &str) -> String {
    let digest = sha256_hex(task.as_bytes());
    format!("skill_{}", &digest[..8])
}

fn derive_triggers(task_lower: &str) -> Vec<String> {
    let mut triggers: Vec<String> = TRIGGER_VOCABULARY
        .iter()
        .filter(|kw| task_lower.contains(**kw))
        .map(|kw| kw.to_string())
        .collect();
    if triggers.is_empty() {
        triggers = task_lower
            .split_whitespace()
            .take(3)
            .map(|w| w.to_string())
            .collect();
    }
    triggers
}

fn derive_name(task: &str) -> String {
    task.chars()
        .take(50)
        .collect::<String>()
        .replace(' ', "-")
        .to_lowercase()
}

/// Extract a reusable skill from a completed session.
///
/// Returns `None` (not an error) when the session did not succeed or the task
/// description is too short to be a pattern worth keeping.
pub fn extract_skill(outcome: &SessionOutcome) -> Option<Skill> {
    if !outcome.succeeded() {
        return None;
    }
    let task = outcome.task.trim();
    if task.chars().count() < 10 {
        return None;
    }

    let task_lower = task.to_lowercase();
    Some(Skill {
        skill_id: skill_id_for_task(task),
        name: derive_name(task),
        description: task.to_string(),
        triggers: derive_triggers(&task_lower),
        tools_typically_used: outcome.tools_used.clone(),
        estimated_tokens: outcome.tokens_used,
        success_rate: 1.0,
        times_used: 1,
        last_used: Some(time::now_iso()),
        created_from_session: outcome.session_id.clone(),
        key_steps: outcome.key_decisions.clone(),
    })
}

/// Fold a reinforcing observation into a stored skill.
///
/// Success rate is an unweighted running mean: old evidence never decays
/// relative to new evidence. Descriptive fields are first-write-wins.
pub fn merge(existing: &Skill, incoming: &Skill) -> Skill {
    let old_count = existing.times_used;
    let mut merged = existing.clone();
    merged.times_used = old_count + 1;
    merged.last_used = incoming.last_used.clone();
    merged.success_rate =
        (existing.success_rate * old_count as f64 + 1.0) / (old_count as f64 + 1.0);
    merged
}

pub fn load_skills(store: &Store) -> Result<(Vec<Skill>, ParseReport), MoltError> {
    jsonl::load_records(&store.skills_path())
}

pub fn save_skills(store: &Store, skills: &[Skill]) -> Result<(), MoltError> {
    jsonl::rewrite_records(&store.skills_path(), skills)
}

/// Append-or-merge a skill into the durable collection.
///
/// This is the store's single update primitive; the evolution pipeline routes
/// its skill mutations through it. Returns whether an existing record was
/// merged rather than a new one appended.
pub fn record_skill(store: &Store, skill: &Skill) -> Result<bool, MoltError> {
    let (mut skills, _) = load_skills(store)?;

    let mut merged = false;
    for existing in skills.iter_mut() {
        if existing.skill_id == skill.skill_id {
            *existing = merge(existing, skill);
            merged = true;
            break;
        }
    }
    if !merged {
        skills.push(skill.clone());
    }

    save_skills(store, &skills)?;
    AuditLog::new(&store.root).record("skills.record", "success")?;
    Ok(merged)
}

/// Rank stored skills against a task description by lexical overlap.
///
/// Score = 2 x (triggers contained in the task text) + (distinct task words
/// contained in the description). Zero-score skills are excluded; ties keep
/// collection order; at most [`MATCH_LIMIT`] results.
pub fn match_skills<'a>(task: &str, skills: &'a [Skill]) -> Vec<&'a Skill> {
    if task.trim().is_empty() {
        return Vec::new();
    }

    let task_lower = task.to_lowercase();
    let word_re = Regex::new(r"\w+").unwrap();
    let task_words: BTreeSet<&str> = word_re
        .find_iter(&task_lower)
        .map(|m| m.as_str())
        .collect();

    let mut scored: Vec<(usize, &Skill)> = Vec::new();
    for skill in skills {
        let description = skill.description.to_lowercase();
        let trigger_matches = skill
            .triggers
            .iter()
            .filter(|t| task_lower.contains(t.to_lowercase().as_str()))
            .count();
        let word_matches = task_words
            .iter()
            .filter(|w| description.contains(**w))
            .count();

        let score = trigger_matches * 2 + word_matches;
        if score > 0 {
            scored.push((score, skill));
        }
    }

    // sort_by is stable: equal scores keep collection order.
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().take(MATCH_LIMIT).map(|(_, s)| s).collect()
}

/// Markdown rendering of one skill for context injection.
pub fn format_skill(skill: &Skill) -> String {
    let mut lines = vec![
        format!("### Skill: {}", skill.name),
        format!("**Description**: {}", skill.description),
        format!(
            "**Success Rate**: {:.0}% ({} uses)",
            skill.success_rate * 100.0,
            skill.times_used
        ),
        String::new(),
    ];

    if !skill.key_steps.is_empty() {
        lines.push("**Steps**:".to_string());
        for step in skill.key_steps.iter().take(5) {
            lines.push(format!("- {}", step));
        }
        lines.push(String::new());
    }

    if !skill.tools_typically_used.is_empty() {
        lines.push(format!("**Tools**: {}", skill.tools_typically_used.join(", ")));
    }

    lines.join("\n")
}

pub fn initialize_memory(root: &Path) -> Result<(), MoltError> {
    fs::create_dir_all(root.join("memory")).map_err(MoltError::IoError)?;
    Ok(())
}

#[derive(Parser, Debug)]
#[clap(name = "memory", about = "Capture and retrieve reusable task patterns")]
pub struct MemoryCli {
    #[clap(subcommand)]
    pub command: MemoryCommand,
}

#[derive(Subcommand, Debug)]
pub enum MemoryCommand {
    /// Record a completed session outcome, extracting a skill if reusable.
    Capture {
        /// Session outcome JSON file (stdin if omitted).
        #[clap(long)]
        file: Option<PathBuf>,
    },
    /// Retrieve skills matching a task description.
    Recall {
        #[clap(long)]
        task: String,
        #[clap(long)]
        json: bool,
    },
    /// List all stored skills.
    List {
        #[clap(long)]
        json: bool,
    },
}

pub fn run_memory_cli(store: &Store, cli: MemoryCli) -> Result<(), MoltError> {
    match cli.command {
        MemoryCommand::Capture { file } => {
            let raw = match file {
                Some(path) => fs::read_to_string(path).map_err(MoltError::IoError)?,
                None => {
                    use std::io::Read;
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .map_err(MoltError::IoError)?;
                    buf
                }
            };
            let outcome: SessionOutcome =
                serde_json::from_str(&raw).map_err(MoltError::JsonError)?;

            match extract_skill(&outcome) {
                Some(skill) => {
                    let merged = record_skill(store, &skill)?;
                    println!(
                        "{}",
                        time::command_envelope(
                            "memory.capture",
                            "ok",
                            serde_json::json!({
                                "skill_id": skill.skill_id,
                                "name": skill.name,
                                "merged": merged,
                            })
                        )
                    );
                }
                None => {
                    println!(
                        "{}",
                        time::command_envelope(
                            "memory.capture",
                            "skipped",
                            serde_json::json!({ "note": "no reusable skill in this session" })
                        )
                    );
                }
            }
        }
        MemoryCommand::Recall { task, json } => {
            let (skills, report) = load_skills(store)?;
            if report.skipped > 0 {
                eprintln!("Warning: skipped {} corrupt skill record(s)", report.skipped);
            }
            let matched = match_skills(&task, &skills);
            if json {
                println!("{}", serde_json::to_string_pretty(&matched)?);
            } else if matched.is_empty() {
                println!("No matching skills for this task.");
            } else {
                for skill in matched {
                    println!("{}", format_skill(skill));
                    println!();
                }
            }
        }
        MemoryCommand::List { json } => {
            let (skills, report) = load_skills(store)?;
            if report.skipped > 0 {
                eprintln!("Warning: skipped {} corrupt skill record(s)", report.skipped);
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&skills)?);
            } else if skills.is_empty() {
                println!("No skills stored yet.");
            } else {
                for skill in &skills {
                    println!(
                        "{}  {}  ({} uses, {:.0}%)",
                        skill.skill_id,
                        skill.name,
                        skill.times_used,
                        skill.success_rate * 100.0
                    );
                }
            }
        }
    }
    Ok(())
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "memory",
        "version": "0.1.0",
        "description": "Durable skill collection with trigger-based retrieval",
        "commands": [
            { "name": "capture", "parameters": ["file"] },
            { "name": "recall", "parameters": ["task"] },
            { "name": "list", "parameters": [] }
        ],
        "storage": ["memory/skills.jsonl"]
    })
}

//! Context compression: bounded head/summary/tail reduction of transcripts.
//!
//! A transcript that already fits the token budget passes through untouched:
//! compressing a small set is a no-op with full fidelity. Larger transcripts
//! keep their first and last records verbatim and reduce the middle to a
//! textual summary plus tagged key points. Non-empty summaries are folded
//! into a persistent cross-session digest.
//!
//! Token costs use the crate-wide 4-characters-per-token heuristic. The
//! estimate is coarse; it only gates compression.

use crate::core::audit::AuditLog;
use crate::core::error::MoltError;
use crate::core::store::Store;
use crate::core::time;
use clap::{Parser, Subcommand};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

const MAX_KEY_POINTS: usize = 10;
const MAX_DIGEST_SUMMARIES: usize = 5;
const MAX_DIGEST_KEY_POINTS: usize = 20;

/// Categories scanned for key points, each with its keyword list. Order is
/// significant: a record contributes at most one point per category, tagged
/// with the first keyword category that matches.
const KEY_POINT_CATEGORIES: &[(&str, &[&str])] = &[
    ("decision", &["decided", "chose", "using", "will use", "going with"]),
    ("action", &["created", "modified", "deleted", "added", "removed", "fixed"]),
    ("error", &["error", "failed", "issue", "problem", "bug"]),
    ("finding", &["found", "discovered", "noticed", "identified"]),
];

/// Collaborator tool names tallied in summaries.
const KNOWN_TOOLS: &[&str] = &["Read", "Write", "Edit", "Grep", "Glob", "Bash", "Task"];

#[derive(Debug, Clone, Copy)]
pub struct CompressOptions {
    pub head_count: usize,
    pub tail_count: usize,
    pub max_tokens: usize,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            head_count: 5,
            tail_count: 10,
            max_tokens: 4000,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CompressionResult {
    pub head: Vec<Value>,
    pub summary: String,
    pub tail: Vec<Value>,
    pub key_points: Vec<String>,
    pub original_count: usize,
    pub compressed_count: usize,
    pub token_reduction: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestEntry {
    pub timestamp: String,
    pub summary: String,
}

/// Cross-session rolling memory, independent of the skill store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistentDigest {
    #[serde(default)]
    pub summaries: Vec<DigestEntry>,
    #[serde(default)]
    pub accumulated_key_points: Vec<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

/// Crate-wide cost heuristic: four characters per token.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

fn record_tokens(record: &Value) -> usize {
    estimate_tokens(&record.to_string())
}

/// The textual content of a record: a plain string, or the string elements of
/// a structured content list joined with spaces.
fn content_text(record: &Value) -> String {
    match record.get("content") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Extract tagged key points from the middle records: per category, the first
/// sentence containing a category keyword, if it carries enough substance.
fn extract_key_points(records: &[Value]) -> Vec<String> {
    let mut points = Vec::new();

    for record in records {
        let content = content_text(record);
        let content_lower = content.to_lowercase();

        for (category, keywords) in KEY_POINT_CATEGORIES {
            for keyword in *keywords {
                if !content_lower.contains(keyword) {
                    continue;
                }
                for sentence in content.split(['.', '!', '?']) {
                    let trimmed = sentence.trim();
                    if trimmed.to_lowercase().contains(keyword)
                        && trimmed.chars().count() > 20
                    {
                        points.push(format!("[{}] {}", category, truncate_chars(trimmed, 100)));
                        break;
                    }
                }
                break;
            }
        }
    }

    let mut deduped = Vec::new();
    for point in points {
        if !deduped.contains(&point) {
            deduped.push(point);
        }
    }
    deduped.truncate(MAX_KEY_POINTS);
    deduped
}

fn summarize_middle(middle: &[Value], key_points: &[String]) -> String {
    let mut parts: Vec<String> = Vec::new();

    let mut tool_counts: Vec<(&str, usize)> = Vec::new();
    for tool in KNOWN_TOOLS {
        let count = middle
            .iter()
            .filter(|record| content_text(record).contains(tool))
            .count();
        if count > 0 {
            tool_counts.push((*tool, count));
        }
    }
    if !tool_counts.is_empty() {
        let tools_str = tool_counts
            .iter()
            .map(|(t, c)| format!("{}: {}", t, c))
            .collect::<Vec<_>>()
            .join(", ");
        parts.push(format!("Tools used: {}", tools_str));
    }

    let middle_blob = middle
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    let file_re = Regex::new(r#"["']([^"']+\.[a-z]+)["']"#).unwrap();
    let mut files: Vec<String> = Vec::new();
    for cap in file_re.captures_iter(&middle_blob) {
        let name = cap[1].to_string();
        if !files.contains(&name) {
            files.push(name);
        }
        if files.len() == 5 {
            break;
        }
    }
    if !files.is_empty() {
        parts.push(format!("Files touched: {}", files.join(", ")));
    }

    if !key_points.is_empty() {
        parts.push("Key points:".to_string());
        parts.extend(key_points.iter().take(5).map(|kp| format!("  - {}", kp)));
    }

    if parts.is_empty() {
        format!("({} messages summarized)", middle.len())
    } else {
        parts.join("\n")
    }
}

/// Compress a record sequence while preserving setup and recent context.
pub fn compress(records: &[Value], opts: &CompressOptions) -> CompressionResult {
    let original_count = records.len();
    if records.is_empty() {
        return CompressionResult {
            head: Vec::new(),
            summary: String::new(),
            tail: Vec::new(),
            key_points: Vec::new(),
            original_count: 0,
            compressed_count: 0,
            token_reduction: 0.0,
        };
    }

    let total_tokens: usize = records.iter().map(record_tokens).sum();
    if total_tokens <= opts.max_tokens {
        return CompressionResult {
            head: records.to_vec(),
            summary: String::new(),
            tail: Vec::new(),
            key_points: Vec::new(),
            original_count,
            compressed_count: original_count,
            token_reduction: 0.0,
        };
    }

    let head_end = opts.head_count.min(original_count);
    let head: Vec<Value> = records[..head_end].to_vec();
    let (middle, tail): (&[Value], &[Value]) =
        if original_count > opts.head_count + opts.tail_count {
            let tail_start = original_count - opts.tail_count;
            (&records[head_end..tail_start], &records[tail_start..])
        } else {
            (&records[head_end..], &[])
        };

    let key_points = extract_key_points(middle);
    let summary = summarize_middle(middle, &key_points);

    let compressed_tokens: usize = head.iter().map(record_tokens).sum::<usize>()
        + estimate_tokens(&summary)
        + tail.iter().map(record_tokens).sum::<usize>();
    let token_reduction = if total_tokens > 0 {
        let raw = (total_tokens as f64 - compressed_tokens as f64) / total_tokens as f64 * 100.0;
        (raw * 10.0).round() / 10.0
    } else {
        0.0
    };

    CompressionResult {
        compressed_count: head.len() + 1 + tail.len(),
        head,
        summary,
        tail: tail.to_vec(),
        key_points,
        original_count,
        token_reduction,
    }
}

pub fn load_digest(store: &Store) -> PersistentDigest {
    let path = store.digest_path();
    if !path.exists() {
        return PersistentDigest::default();
    }
    // The digest is advisory rolling memory; a corrupt document resets it.
    fs::read_to_string(&path)
        .ok()
        .and_then(|content| serde_json::from_str(&content).ok())
        .unwrap_or_default()
}

pub fn save_digest(store: &Store, digest: &PersistentDigest) -> Result<(), MoltError> {
    let content = serde_json::to_string_pretty(digest).map_err(MoltError::JsonError)?;
    fs::write(store.digest_path(), content).map_err(MoltError::IoError)?;
    Ok(())
}

/// Fold a new summary and its key points into the rolling digest.
pub fn update_digest(
    store: &Store,
    summary: &str,
    key_points: &[String],
) -> Result<(), MoltError> {
    let mut digest = load_digest(store);

    digest.summaries.push(DigestEntry {
        timestamp: time::now_iso(),
        summary: summary.to_string(),
    });
    if digest.summaries.len() > MAX_DIGEST_SUMMARIES {
        let excess = digest.summaries.len() - MAX_DIGEST_SUMMARIES;
        digest.summaries.drain(..excess);
    }

    for point in key_points {
        if !digest.accumulated_key_points.contains(point) {
            digest.accumulated_key_points.push(point.clone());
        }
    }
    if digest.accumulated_key_points.len() > MAX_DIGEST_KEY_POINTS {
        let excess = digest.accumulated_key_points.len() - MAX_DIGEST_KEY_POINTS;
        digest.accumulated_key_points.drain(..excess);
    }

    digest.last_updated = Some(time::now_iso());
    save_digest(store, &digest)?;
    AuditLog::new(&store.root).record("context.digest", "success")?;
    Ok(())
}

/// Compress and, when a summary was produced, record it in the digest.
pub fn compress_and_record(
    store: &Store,
    records: &[Value],
    opts: &CompressOptions,
) -> Result<CompressionResult, MoltError> {
    let result = compress(records, opts);
    if !result.summary.is_empty() {
        update_digest(store, &result.summary, &result.key_points)?;
    }
    Ok(result)
}

pub fn initialize_digest(root: &Path) -> Result<(), MoltError> {
    fs::create_dir_all(root.join("memory")).map_err(MoltError::IoError)?;
    Ok(())
}

#[derive(Parser, Debug)]
#[clap(name = "context", about = "Compress transcripts and maintain the rolling digest")]
pub struct ContextCli {
    #[clap(subcommand)]
    pub command: ContextCommand,
}

#[derive(Subcommand, Debug)]
pub enum ContextCommand {
    /// Compress a transcript file (a JSON array, or `{"messages": [...]}`).
    Compress {
        #[clap(long)]
        input: PathBuf,
        /// Write the result here instead of stdout.
        #[clap(long)]
        output: Option<PathBuf>,
        #[clap(long, default_value = "5")]
        head: usize,
        #[clap(long, default_value = "10")]
        tail: usize,
        #[clap(long, default_value = "4000")]
        max_tokens: usize,
    },
    /// Show the persistent cross-session digest.
    Digest {
        #[clap(long)]
        json: bool,
    },
}

fn parse_transcript(raw: &str) -> Result<Vec<Value>, MoltError> {
    let value: Value = serde_json::from_str(raw).map_err(MoltError::JsonError)?;
    match value {
        Value::Array(records) => Ok(records),
        Value::Object(mut obj) => match obj.remove("messages") {
            Some(Value::Array(records)) => Ok(records),
            _ => Err(MoltError::ValidationError(
                "Transcript must be a JSON array or an object with a 'messages' array"
                    .to_string(),
            )),
        },
        _ => Err(MoltError::ValidationError(
            "Transcript must be a JSON array or an object with a 'messages' array".to_string(),
        )),
    }
}

pub fn run_context_cli(store: &Store, cli: ContextCli) -> Result<(), MoltError> {
    match cli.command {
        ContextCommand::Compress {
            input,
            output,
            head,
            tail,
            max_tokens,
        } => {
            let raw = fs::read_to_string(&input).map_err(MoltError::IoError)?;
            let records = parse_transcript(&raw)?;
            let opts = CompressOptions {
                head_count: head,
                tail_count: tail,
                max_tokens,
            };
            let result = compress_and_record(store, &records, &opts)?;

            let rendered = serde_json::to_string_pretty(&result)?;
            match output {
                Some(path) => {
                    fs::write(&path, rendered).map_err(MoltError::IoError)?;
                    println!("Compressed output written to {}", path.display());
                }
                None => println!("{}", rendered),
            }
            println!(
                "Compression: {} -> {} messages ({}% token reduction)",
                result.original_count, result.compressed_count, result.token_reduction
            );
        }
        ContextCommand::Digest { json } => {
            let digest = load_digest(store);
            if json {
                println!("{}", serde_json::to_string_pretty(&digest)?);
            } else if digest.summaries.is_empty() {
                println!("No digest recorded yet.");
            } else {
                println!("Last updated: {}", digest.last_updated.as_deref().unwrap_or("-"));
                for entry in &digest.summaries {
                    println!("--- [{}]", entry.timestamp);
                    println!("{}", entry.summary);
                }
                if !digest.accumulated_key_points.is_empty() {
                    println!("Accumulated key points:");
                    for point in &digest.accumulated_key_points {
                        println!("  - {}", point);
                    }
                }
            }
        }
    }
    Ok(())
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "context",
        "version": "0.1.0",
        "description": "Head/summary/tail transcript compression with rolling digest",
        "commands": [
            { "name": "compress", "parameters": ["input", "output", "head", "tail", "max_tokens"] },
            { "name": "digest", "parameters": [] }
        ],
        "storage": ["memory/digest.json"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(content: &str) -> Value {
        json!({ "role": "assistant", "content": content })
    }

    fn bulky(n: usize) -> Vec<Value> {
        (0..n)
            .map(|i| record(&format!("message {} {}", i, "filler ".repeat(100))))
            .collect()
    }

    #[test]
    fn test_small_input_is_not_compressed() {
        let records = vec![record("short one"), record("short two")];
        let result = compress(&records, &CompressOptions::default());
        assert_eq!(result.head.len(), 2);
        assert_eq!(result.summary, "");
        assert!(result.tail.is_empty());
        assert!(result.key_points.is_empty());
        assert_eq!(result.compressed_count, 2);
        assert_eq!(result.token_reduction, 0.0);
    }

    #[test]
    fn test_empty_input() {
        let result = compress(&[], &CompressOptions::default());
        assert_eq!(result.original_count, 0);
        assert_eq!(result.token_reduction, 0.0);
    }

    #[test]
    fn test_large_input_splits_head_middle_tail() {
        let records = bulky(30);
        let result = compress(&records, &CompressOptions::default());
        assert_eq!(result.head.len(), 5);
        assert_eq!(result.tail.len(), 10);
        assert_eq!(result.head[0], records[0]);
        assert_eq!(result.tail[9], records[29]);
        assert!(!result.summary.is_empty());
        assert!(result.token_reduction > 0.0);
        // one decimal place
        let scaled = result.token_reduction * 10.0;
        assert!((scaled - scaled.round()).abs() < 1e-9);
    }

    #[test]
    fn test_tail_absorbed_when_too_few_records() {
        // 8 records but huge content: compression triggers, no tail split.
        let records: Vec<Value> = (0..8)
            .map(|i| record(&format!("msg {} {}", i, "x".repeat(3000))))
            .collect();
        let result = compress(&records, &CompressOptions::default());
        assert_eq!(result.head.len(), 5);
        assert!(result.tail.is_empty());
    }

    #[test]
    fn test_key_point_extraction_tags_categories() {
        let mut records = bulky(20);
        records[7] = record(
            "After comparing both options we decided to keep the legacy queue for now. Other text.",
        );
        records[8] = record("A subtle bug appeared in the retry loop during the migration run.");
        let result = compress(&records, &CompressOptions::default());
        assert!(result
            .key_points
            .iter()
            .any(|p| p.starts_with("[decision]") && p.contains("legacy queue")));
        assert!(result.key_points.iter().any(|p| p.starts_with("[error]")));
    }

    #[test]
    fn test_key_points_skip_short_sentences_and_truncate() {
        let long_tail = "decided ".repeat(30);
        let mut records = bulky(20);
        records[7] = record(&format!("We decided. {}", long_tail));
        let result = compress(&records, &CompressOptions::default());
        let decision = result
            .key_points
            .iter()
            .find(|p| p.starts_with("[decision]"))
            .unwrap();
        // "We decided." is under the substance threshold; the long sentence
        // is kept, truncated to 100 characters.
        assert!(decision.chars().count() <= "[decision] ".chars().count() + 100);
        assert!(!decision.contains("We decided."));
    }

    #[test]
    fn test_summary_counts_tools_and_files() {
        let mut records = bulky(20);
        records[6] = record("Used Edit on 'src/main.rs' then ran Bash to check.");
        records[9] = record("Another Edit pass over 'src/lib.rs' here.");
        let result = compress(&records, &CompressOptions::default());
        assert!(result.summary.contains("Edit: 2"));
        assert!(result.summary.contains("Bash: 1"));
        assert!(result.summary.contains("src/main.rs"));
        assert!(result.summary.contains("src/lib.rs"));
    }

    #[test]
    fn test_summary_fallback_phrase() {
        let records: Vec<Value> = (0..30)
            .map(|_| json!({ "role": "user", "content": "zz ".repeat(200) }))
            .collect();
        let result = compress(&records, &CompressOptions::default());
        assert_eq!(result.summary, "(15 messages summarized)");
    }

    #[test]
    fn test_digest_caps_summaries_at_five() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::open(tmp.path()).unwrap();
        for i in 0..7 {
            update_digest(&store, &format!("summary number {}", i), &[]).unwrap();
        }
        let digest = load_digest(&store);
        assert_eq!(digest.summaries.len(), 5);
        assert_eq!(digest.summaries[0].summary, "summary number 2");
        assert_eq!(digest.summaries[4].summary, "summary number 6");
    }

    #[test]
    fn test_digest_dedupes_and_caps_key_points() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::open(tmp.path()).unwrap();
        let first: Vec<String> = (0..15).map(|i| format!("[action] point {}", i)).collect();
        update_digest(&store, "s1", &first).unwrap();
        // Overlapping batch: dupes ignored, new points appended, cap at 20.
        let second: Vec<String> = (10..25).map(|i| format!("[action] point {}", i)).collect();
        update_digest(&store, "s2", &second).unwrap();

        let digest = load_digest(&store);
        assert_eq!(digest.accumulated_key_points.len(), 20);
        assert_eq!(digest.accumulated_key_points[19], "[action] point 24");
        assert!(!digest.accumulated_key_points.contains(&"[action] point 4".to_string()));
    }

    #[test]
    fn test_corrupt_digest_resets() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::open(tmp.path()).unwrap();
        fs::write(store.digest_path(), "{ not json").unwrap();
        let digest = load_digest(&store);
        assert!(digest.summaries.is_empty());
    }

    #[test]
    fn test_compress_and_record_feeds_digest_only_when_summarizing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::open(tmp.path()).unwrap();

        let small = vec![record("tiny")];
        compress_and_record(&store, &small, &CompressOptions::default()).unwrap();
        assert!(load_digest(&store).summaries.is_empty());

        compress_and_record(&store, &bulky(30), &CompressOptions::default()).unwrap();
        assert_eq!(load_digest(&store).summaries.len(), 1);
    }

    #[test]
    fn test_parse_transcript_shapes() {
        assert_eq!(parse_transcript("[]").unwrap().len(), 0);
        assert_eq!(
            parse_transcript("{\"messages\": [{\"content\": \"hi\"}]}").unwrap().len(),
            1
        );
        assert!(parse_transcript("42").is_err());
    }
}

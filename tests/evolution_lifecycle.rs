//! End-to-end lifecycle of the evolution pipeline: propose -> apply ->
//! history -> rollback, including the apply-once and backup round-trip
//! guarantees.

use molt::core::store::Store;
use molt::plugins::evolve::{
    self, AnalysisReport, EfficiencyIssue, MemoryAnalysis, ProposalKind, ProposalStatus,
    Recommendation, RoutingAnalysis,
};
use molt::plugins::skills::{self, SessionOutcome};

fn seeded_store(root: &std::path::Path) -> Store {
    let store = Store::open(root).unwrap();
    let outcome = SessionOutcome {
        session_id: "2026-08-05_001".to_string(),
        task: "implement request logging middleware".to_string(),
        outcome: "success".to_string(),
        tools_used: vec!["Read".to_string(), "Edit".to_string()],
        key_decisions: vec![],
        tokens_used: 900,
    };
    let skill = skills::extract_skill(&outcome).unwrap();
    skills::record_skill(&store, &skill).unwrap();
    store
}

fn skill_analysis(pattern: &str) -> AnalysisReport {
    AnalysisReport {
        status: Some("ok".to_string()),
        memory: MemoryAnalysis {
            common_missed_patterns: vec![(pattern.to_string(), 4)],
        },
        ..Default::default()
    }
}

#[test]
fn test_apply_once_guard() {
    let tmp = tempfile::tempdir().unwrap();
    let store = seeded_store(tmp.path());

    let proposals = evolve::propose(&store, Some(&skill_analysis("kubernetes rollout"))).unwrap();
    assert_eq!(proposals.len(), 1);
    let id = proposals[0].id.clone();

    let first = evolve::apply(&store, &id, false).unwrap();
    assert!(first.success, "{}", first.message);

    let second = evolve::apply(&store, &id, false).unwrap();
    assert!(!second.success);
    assert!(second.message.contains("already applied"));

    // Exactly one new record landed in the collection.
    let (skills, _) = skills::load_skills(&store).unwrap();
    assert_eq!(skills.len(), 2);
    let (history, _) = evolve::load_history(&store).unwrap();
    assert_eq!(history.len(), 1);
}

#[test]
fn test_backup_rollback_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let store = seeded_store(tmp.path());
    let before = std::fs::read(store.skills_path()).unwrap();

    let proposals = evolve::propose(&store, Some(&skill_analysis("kubernetes rollout"))).unwrap();
    let applied = evolve::apply(&store, &proposals[0].id, false).unwrap();
    assert!(applied.success);
    let after = std::fs::read(store.skills_path()).unwrap();
    assert_ne!(before, after);

    let rolled = evolve::rollback(&store).unwrap();
    assert!(rolled.success, "{}", rolled.message);
    let restored = std::fs::read(store.skills_path()).unwrap();
    assert_eq!(before, restored);

    // The rollback entry is now the newest history entry, so a second
    // immediate rollback has nothing reversible to act on.
    let again = evolve::rollback(&store).unwrap();
    assert!(!again.success);
    assert!(again.message.contains("rollback"));
}

#[test]
fn test_rollback_with_no_history_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();
    let result = evolve::rollback(&store).unwrap();
    assert!(!result.success);
    assert!(result.message.contains("No history"));
}

#[test]
fn test_manual_review_is_never_auto_applied() {
    let tmp = tempfile::tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();
    let analysis = AnalysisReport {
        status: Some("ok".to_string()),
        recommendations: vec![Recommendation {
            severity: "high".to_string(),
            details: serde_json::Map::new(),
        }],
        ..Default::default()
    };

    let proposals = evolve::propose(&store, Some(&analysis)).unwrap();
    assert_eq!(proposals.len(), 1);
    let result = evolve::apply(&store, &proposals[0].id, false).unwrap();
    assert!(!result.success);

    // apply-all skips it as well, leaving it pending.
    let results = evolve::apply_all(&store, false).unwrap();
    assert!(results.is_empty());
    let (stored, _) = evolve::load_proposals(&store).unwrap();
    assert_eq!(stored[0].status, ProposalStatus::Pending);
}

#[test]
fn test_recorded_proposal_cannot_be_reapplied() {
    let tmp = tempfile::tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();
    let analysis = AnalysisReport {
        status: Some("ok".to_string()),
        routing: RoutingAnalysis {
            efficiency_issues: vec![EfficiencyIssue {
                issue: "repeated Grep->Read sequences".to_string(),
                count: 6,
            }],
        },
        ..Default::default()
    };

    let proposals = evolve::propose(&store, Some(&analysis)).unwrap();
    assert!(matches!(
        proposals[0].kind,
        ProposalKind::RoutingUpdate { .. }
    ));
    let id = proposals[0].id.clone();

    let first = evolve::apply(&store, &id, false).unwrap();
    assert!(first.success);
    let (stored, _) = evolve::load_proposals(&store).unwrap();
    assert_eq!(stored[0].status, ProposalStatus::Recorded);

    let second = evolve::apply(&store, &id, false).unwrap();
    assert!(!second.success);
    assert!(second.message.contains("already recorded"));
    let (history, _) = evolve::load_history(&store).unwrap();
    assert_eq!(history.len(), 1);

    // Routing updates leave no file mutation behind and are not reversible.
    let rolled = evolve::rollback(&store).unwrap();
    assert!(!rolled.success);
    assert!(rolled.message.contains("routing_update"));
}

#[test]
fn test_covered_pattern_not_reproposed_after_apply() {
    let tmp = tempfile::tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();
    let analysis = skill_analysis("terraform drift");

    let first = evolve::propose(&store, Some(&analysis)).unwrap();
    assert_eq!(first.len(), 1);
    evolve::apply(&store, &first[0].id, false).unwrap();

    // The applied skill's trigger now covers the pattern.
    let second = evolve::propose(&store, Some(&analysis)).unwrap();
    assert!(second.is_empty());
}

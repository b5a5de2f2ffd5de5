//! Contract Test: Merge Semantics
//!
//! This test verifies what a pass produces when every source answers.
//!
//! Constraints verified:
//! - Remote lists fully replace previously fetched content
//! - Manual entries are always included
//! - Empty and whitespace-only lines never reach the whitelist
//! - No sources configured is a no-op
//!
//! If this test fails, the merge rules have drifted.

mod common;

use common::*;
use std::sync::Arc;
use whitelist_core::engine::clean;
use whitelist_core::{Reconciler, RefreshOutcome, WhitelistConfig};

#[tokio::test]
async fn no_sources_skips_and_leaves_whitelist_untouched() {
    let harness = Harness::new(WhitelistConfig::new().with_manual_entry("123"), &["999"]);

    let report = harness.manager.refresh().await;

    assert_eq!(report.outcome, RefreshOutcome::Skipped);
    assert_eq!(report.to_string(), "No whitelist sources configured, skipping.");
    assert_eq!(harness.whitelist().await, strings(&["999"]));
    assert_eq!(harness.whitelist.replace_count(), 0);
    assert_eq!(harness.fetcher.calls(), 0);
}

#[tokio::test]
async fn duplicate_and_blank_lines_are_cleaned_and_manual_entries_added() {
    let url = "https://lists.example/subs.txt";
    let harness = Harness::new(config_with_sources(&[url]).with_manual_entry("333"), &[]);
    harness.fetcher.serve(url, "111\r\n222\r\n\r\n111");

    let report = harness.manager.refresh().await;

    assert!(report.changed());
    assert_eq!(
        report.outcome,
        RefreshOutcome::Updated {
            old_count: 0,
            new_count: 3
        }
    );
    assert_eq!(harness.whitelist().await, strings(&["111", "222", "333"]));
    assert_eq!(harness.whitelist.persist_count(), 1);
}

#[tokio::test]
async fn successful_fetch_drops_entries_no_longer_listed() {
    let a = "https://lists.example/a.txt";
    let b = "https://lists.example/b.txt";
    let harness = Harness::new(
        config_with_sources(&[a, b]).with_manual_entry(" manual-1 "),
        &["stale-1", "111", "stale-2"],
    );
    harness.fetcher.serve(a, "111\n222");
    harness.fetcher.serve(b, "  222  \r333\r\n   \n");

    harness.manager.refresh().await;

    let whitelist = harness.whitelist().await;
    assert_eq!(
        sorted(whitelist.clone()),
        sorted(strings(&["111", "222", "333", "manual-1"]))
    );
    assert!(!whitelist.iter().any(|e| e.starts_with("stale")));
    assert!(whitelist.iter().all(|e| !e.trim().is_empty() && e.trim() == e));
}

#[tokio::test]
async fn reconciler_reports_exact_union_when_all_sources_succeed() {
    let fetcher = ScriptedFetcher::new();
    fetcher.serve("https://lists.example/a.txt", "1\n2\n3");
    fetcher.serve("https://lists.example/b.txt", "3\n4");

    let reconciler = Reconciler::new(Arc::new(fetcher));
    let sources = strings(&["https://lists.example/a.txt", "https://lists.example/b.txt"]);
    let manual = strings(&["5", "1"]);
    let current = strings(&["0", "1"]);

    let result = reconciler.reconcile(&sources, &manual, &current).await;

    assert!(!result.skipped);
    assert!(!result.any_fetch_failed());
    assert!(result.changed);
    assert_eq!(result.snapshot, strings(&["1", "2", "3", "4", "5"]));
}

#[test]
fn clean_is_idempotent_and_drops_blank_entries() {
    let input = strings(&["  a", "", "b", "\t", "a", "c  ", "   ", "b"]);

    let once = clean(&input);
    let twice = clean(&once);

    assert_eq!(once, twice);
    assert_eq!(once, strings(&["a", "b", "c"]));
    assert!(once.iter().all(|e| !e.trim().is_empty()));
}

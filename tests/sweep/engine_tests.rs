// Tests for engine module

use crate::fixtures::{age_tree, TestTree, DUMMY_CONTENT};
use chrono::{Duration, Utc};
use crossbeam_channel::unbounded;
use std::fs;
use std::path::PathBuf;
use sweepy::sweep::{Index, ScanConfig, ScanEngine, ScanResult, ScanStats, SweepError};

fn run(engine: &ScanEngine, config: &ScanConfig) -> (Vec<ScanResult>, ScanStats, Vec<String>) {
    let (sender, receiver) = unbounded();
    let (results, stats) = engine.scan(config, sender).unwrap();
    // The engine has dropped its sender, so this terminates
    let lines: Vec<String> = receiver.iter().collect();
    (results, stats, lines)
}

fn paths(results: &[ScanResult]) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = results.iter().map(|r| r.path.clone()).collect();
    paths.sort();
    paths
}

#[test]
fn test_basic_scan_finds_all_candidates() {
    let tree = TestTree::new();
    let engine = ScanEngine::with_index(tree.index());
    let config = ScanConfig::new(&tree.root).with_no_cache(true);

    let (results, stats, _) = run(&engine, &config);

    assert_eq!(results.len(), 3);
    assert_eq!(paths(&results), tree.candidates);
    for result in &results {
        assert_eq!(result.staleness_days, 0);
        assert_eq!(result.size_bytes, DUMMY_CONTENT.len() as u64);
    }
    assert_eq!(stats.count, 3);
    assert_eq!(stats.total_size, 3 * DUMMY_CONTENT.len() as u64);
    assert_eq!(stats.avg_staleness, 0.0);
}

#[test]
fn test_high_threshold_excludes_fresh_projects() {
    let tree = TestTree::new();
    let engine = ScanEngine::with_index(tree.index());
    let config = ScanConfig::new(&tree.root).with_no_cache(true).with_staleness(365);

    let (results, stats, _) = run(&engine, &config);

    assert!(results.is_empty());
    assert_eq!(stats.total_size, 0);
    assert_eq!(stats.avg_staleness, 0.0);
}

#[test]
fn test_threshold_keeps_only_stale_projects() {
    let tree = TestTree::new();
    age_tree(&tree.root, 400);
    // A recent file anywhere in the project keeps it fresh, even outside node_modules
    fs::write(tree.root.join("project2").join("README.md"), b"active").unwrap();

    let engine = ScanEngine::with_index(tree.index());
    let config = ScanConfig::new(&tree.root).with_no_cache(true).with_staleness(365);
    let (results, stats, _) = run(&engine, &config);

    assert_eq!(results.len(), 2);
    assert!(!paths(&results).contains(&tree.candidates[1]));
    for result in &results {
        assert!(result.staleness_days >= 365);
        assert_eq!(result.staleness_days, 400);
    }
    assert_eq!(stats.avg_staleness, 400.0);
}

#[test]
fn test_results_sorted_stalest_first() {
    let tree = TestTree::new();
    age_tree(&tree.root.join("project1"), 10);
    age_tree(&tree.root.join("project2"), 50);
    age_tree(&tree.root.join("project3"), 30);

    let engine = ScanEngine::with_index(tree.index());
    let (results, stats, _) = run(&engine, &ScanConfig::new(&tree.root).with_no_cache(true));

    let staleness: Vec<u64> = results.iter().map(|r| r.staleness_days).collect();
    assert_eq!(staleness, vec![50, 30, 10]);
    assert_eq!(stats.avg_staleness, 30.0);
}

#[test]
fn test_nested_candidates_are_not_reported() {
    let tree = TestTree::new();
    let nested = tree.candidates[0].join("some-pkg").join("node_modules");
    fs::create_dir_all(&nested).unwrap();
    fs::write(nested.join("inner.js"), b"12345").unwrap();

    let engine = ScanEngine::with_index(tree.index());
    let (results, _, _) = run(&engine, &ScanConfig::new(&tree.root).with_no_cache(true));

    assert_eq!(results.len(), 3);
    let first = results.iter().find(|r| r.path == tree.candidates[0]).unwrap();
    // The nested tree still counts towards its outer candidate's size
    assert_eq!(first.size_bytes, DUMMY_CONTENT.len() as u64 + 5);
}

#[test]
fn test_missing_root_is_fatal_and_closes_sink() {
    let tree = TestTree::new();
    let engine = ScanEngine::with_index(tree.index());
    let config = ScanConfig::new(tree.root.join("missing")).with_verbose(true);

    let (sender, receiver) = unbounded();
    let result = engine.scan(&config, sender);

    assert!(matches!(result, Err(SweepError::DirectoryNotFound { .. })));
    assert_eq!(receiver.iter().count(), 0);
    assert!(!tree.index_path().exists());
}

#[test]
fn test_root_that_is_a_candidate() {
    let tree = TestTree::new();
    let engine = ScanEngine::with_index(tree.index());
    let config = ScanConfig::new(&tree.candidates[0]).with_no_cache(true);

    let (results, _, _) = run(&engine, &config);
    assert_eq!(paths(&results), vec![tree.candidates[0].clone()]);
}

#[test]
fn test_custom_candidate_name() {
    let tree = TestTree::new();
    let vendor = tree.root.join("php-app").join("vendor");
    fs::create_dir_all(&vendor).unwrap();
    fs::write(vendor.join("autoload.php"), b"<?php").unwrap();

    let engine = ScanEngine::with_index(tree.index());
    let config = ScanConfig::new(&tree.root)
        .with_no_cache(true)
        .with_candidate_name("vendor");

    let (results, _, _) = run(&engine, &config);
    assert_eq!(paths(&results), vec![vendor]);
}

#[test]
fn test_single_worker_thread_still_completes() {
    let tree = TestTree::new();
    let engine = ScanEngine::with_index(tree.index());
    let config = ScanConfig::new(&tree.root).with_no_cache(true).with_threads(1);

    let (results, _, _) = run(&engine, &config);
    assert_eq!(results.len(), 3);
}

#[test]
fn test_verbose_reports_discovery_before_completion() {
    let tree = TestTree::new();
    let engine = ScanEngine::with_index(tree.index());
    let config = ScanConfig::new(&tree.root).with_no_cache(true).with_verbose(true);

    let (_, _, lines) = run(&engine, &config);

    for candidate in &tree.candidates {
        let scanning = format!("Scanning {}", candidate.display());
        let scanned = format!("Scanned {}", candidate.display());
        let start = lines.iter().position(|l| *l == scanning).unwrap();
        let done = lines.iter().position(|l| l.starts_with(&scanned)).unwrap();
        assert!(start < done);
    }
}

#[test]
fn test_quiet_scan_sends_nothing() {
    let tree = TestTree::new();
    let engine = ScanEngine::with_index(tree.index());
    let (_, _, lines) = run(&engine, &ScanConfig::new(&tree.root).with_no_cache(true));
    assert!(lines.is_empty());
}

#[test]
fn test_no_cache_never_writes_index() {
    let tree = TestTree::new();
    let index = tree.index();
    let engine = ScanEngine::with_index(index.clone());

    run(&engine, &ScanConfig::new(&tree.root).with_no_cache(true));

    assert!(index.is_empty());
    assert!(!tree.index_path().exists());
}

#[test]
fn test_scan_persists_index() {
    let tree = TestTree::new();
    let engine = ScanEngine::with_index(tree.index());

    run(&engine, &ScanConfig::new(&tree.root));

    let stored = Index::new(tree.index_path());
    assert!(stored.load().unwrap());
    assert_eq!(stored.len(), 3);
    assert!(!stored.is_expired());
    for candidate in &tree.candidates {
        assert_eq!(stored.get(candidate).unwrap().size_bytes, DUMMY_CONTENT.len() as u64);
    }
}

#[test]
fn test_second_scan_answers_from_index_without_walking() {
    let tree = TestTree::new();
    let config = ScanConfig::new(&tree.root).with_verbose(true);

    let (first, _, _) = run(&ScanEngine::with_index(tree.index()), &config);

    // Not visible to the second scan, which never walks
    tree.add_project("project4");

    let (second, _, lines) = run(&ScanEngine::with_index(tree.index()), &config);

    assert_eq!(first, second);
    assert_eq!(lines.len(), 3);
    assert!(lines.iter().all(|l| l.starts_with("Found ") && l.ends_with(" in cache")));
}

#[test]
fn test_full_rescan_finds_new_candidates_and_reuses_cached_ones() {
    let tree = TestTree::new();
    run(&ScanEngine::with_index(tree.index()), &ScanConfig::new(&tree.root));
    let added = tree.add_project("project4");

    let config = ScanConfig::new(&tree.root).with_full_rescan(true).with_verbose(true);
    let (results, _, lines) = run(&ScanEngine::with_index(tree.index()), &config);

    assert_eq!(results.len(), 4);
    assert!(paths(&results).contains(&added));
    assert_eq!(lines.iter().filter(|l| l.starts_with("Found ")).count(), 3);
    assert!(lines.contains(&format!("Scanning {}", added.display())));

    let stored = Index::new(tree.index_path());
    stored.load().unwrap();
    assert_eq!(stored.len(), 4);
}

#[test]
fn test_full_rescan_forgets_vanished_candidates() {
    let tree = TestTree::new();
    run(&ScanEngine::with_index(tree.index()), &ScanConfig::new(&tree.root));

    // Removed behind the index's back
    fs::remove_dir_all(&tree.candidates[2]).unwrap();

    let config = ScanConfig::new(&tree.root).with_full_rescan(true);
    let (results, _, _) = run(&ScanEngine::with_index(tree.index()), &config);
    assert_eq!(results.len(), 2);

    let stored = Index::new(tree.index_path());
    stored.load().unwrap();
    assert!(!stored.contains(&tree.candidates[2]));
    assert_eq!(stored.len(), 2);
}

#[test]
fn test_reset_cache_walks_again() {
    let tree = TestTree::new();
    run(&ScanEngine::with_index(tree.index()), &ScanConfig::new(&tree.root));
    tree.add_project("project4");

    let config = ScanConfig::new(&tree.root).with_reset_cache(true);
    let (results, _, _) = run(&ScanEngine::with_index(tree.index()), &config);

    assert_eq!(results.len(), 4);
    let stored = Index::new(tree.index_path());
    stored.load().unwrap();
    assert_eq!(stored.len(), 4);
}

#[test]
fn test_expired_index_is_rebuilt_with_fresh_window() {
    let tree = TestTree::new();
    run(&ScanEngine::with_index(tree.index()), &ScanConfig::new(&tree.root));

    let stored = Index::new(tree.index_path());
    stored.load().unwrap();
    stored.set_validity((Utc::now() - Duration::hours(1)).timestamp());
    stored.save().unwrap();

    tree.add_project("project4");
    let (results, _, _) = run(&ScanEngine::with_index(tree.index()), &ScanConfig::new(&tree.root));
    assert_eq!(results.len(), 4);

    let rebuilt = Index::new(tree.index_path());
    rebuilt.load().unwrap();
    assert!(!rebuilt.is_expired());
    assert_eq!(rebuilt.len(), 4);
}

#[test]
fn test_cached_results_are_filtered_and_reaged() {
    let tree = TestTree::new();
    let index = tree.index();
    let last_modified = Utc::now() - Duration::days(40);
    for (i, candidate) in tree.candidates.iter().enumerate() {
        index.set(
            candidate.clone(),
            ScanResult {
                path: candidate.clone(),
                size_bytes: 10,
                // The stored staleness is out of date and must be recomputed
                last_modified: if i == 0 { Utc::now() } else { last_modified },
                staleness_days: 0,
            },
        );
    }
    index.save().unwrap();

    let config = ScanConfig::new(&tree.root).with_staleness(30);
    let (results, stats, _) = run(&ScanEngine::with_index(tree.index()), &config);

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.staleness_days == 40 && r.size_bytes == 10));
    assert_eq!(stats.total_size, 20);
}

#[test]
fn test_cached_scan_of_subdirectory_only_returns_its_entries() {
    let tree = TestTree::new();
    run(&ScanEngine::with_index(tree.index()), &ScanConfig::new(&tree.root));

    let config = ScanConfig::new(tree.root.join("project3"));
    let (results, _, _) = run(&ScanEngine::with_index(tree.index()), &config);

    assert_eq!(paths(&results), vec![tree.candidates[2].clone()]);
}

#[test]
fn test_malformed_index_is_reported_and_replaced() {
    let tree = TestTree::new();
    fs::write(tree.index_path(), b"garbage").unwrap();

    let config = ScanConfig::new(&tree.root).with_verbose(true);
    let (results, _, lines) = run(&ScanEngine::with_index(tree.index()), &config);

    assert_eq!(results.len(), 3);
    assert!(lines.iter().any(|l| l.starts_with("Failed to load index")));

    let stored = Index::new(tree.index_path());
    assert!(stored.load().unwrap());
    assert_eq!(stored.len(), 3);
}

#[cfg(unix)]
#[test]
fn test_permission_denied_subtree_is_skipped() {
    use std::os::unix::fs::PermissionsExt;

    let tree = TestTree::new();
    let locked = tree.root.join("locked");
    fs::create_dir_all(locked.join("inner").join("node_modules")).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Privileged users read through the permission bits; nothing to test then
    if fs::read_dir(&locked).is_ok() {
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let engine = ScanEngine::with_index(tree.index());
    let config = ScanConfig::new(&tree.root).with_no_cache(true).with_verbose(true);
    let (sender, receiver) = unbounded();
    let outcome = engine.scan(&config, sender);
    let lines: Vec<String> = receiver.iter().collect();

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    let (results, _) = outcome.unwrap();
    assert_eq!(results.len(), 3);
    assert!(lines.contains(&format!("Permission denied: {}", locked.display())));
}

#[cfg(target_os = "linux")]
#[test]
fn test_non_utf8_candidate_is_returned_but_not_indexed() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let tree = TestTree::new();
    let odd = tree.root.join(OsStr::from_bytes(b"proj\xff")).join("node_modules");
    fs::create_dir_all(&odd).unwrap();
    fs::write(odd.join("dummy.js"), DUMMY_CONTENT).unwrap();

    let config = ScanConfig::new(&tree.root).with_verbose(true);
    let (results, _, lines) = run(&ScanEngine::with_index(tree.index()), &config);

    assert_eq!(results.len(), 4);
    assert!(paths(&results).contains(&odd));
    assert!(lines.iter().any(|l| l.starts_with("Not indexing ")));
    assert!(!lines.iter().any(|l| l.starts_with("Failed to save index")));

    // The other candidates still persist
    let stored = Index::new(tree.index_path());
    assert!(stored.load().unwrap());
    assert_eq!(stored.len(), 3);
    assert!(tree.candidates.iter().all(|c| stored.contains(c)));
}

#[test]
fn test_huge_cache_ttl_scans_and_persists() {
    let tree = TestTree::new();
    let config = ScanConfig::new(&tree.root).with_cache_ttl_hours(u64::MAX / 4);

    let (results, _, _) = run(&ScanEngine::with_index(tree.index()), &config);
    assert_eq!(results.len(), 3);

    let stored = Index::new(tree.index_path());
    assert!(stored.load().unwrap());
    assert!(!stored.is_expired());
    assert_eq!(stored.len(), 3);
}

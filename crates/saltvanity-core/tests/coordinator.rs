//! End-to-end searches through the coordinator against a temp store.

use std::fs;
use std::path::Path;
use std::time::Duration;

use saltvanity_core::{
    create2_address, Address, RawSearchRequest, SearchConfig, SearchCoordinator, SearchError,
    SearchId, SearchRequest, SearchStatus, SearchedRange, SuffixPattern, B256, U256,
};
use tempfile::TempDir;

const DEPLOYER: &str = "0x5c46E63Bc046Fe1109fAEaEC1A6089236DF463C7";
const BYTECODE_HASH: &str = "0xfdac7e7671aa51d6411fa89c76f4951e07966e438c23782b4b78408722640925";
const WAIT: Duration = Duration::from_secs(60);

fn deployer() -> Address {
    DEPLOYER.parse().unwrap()
}

fn bytecode_hash() -> B256 {
    BYTECODE_HASH.parse().unwrap()
}

fn config(dir: &Path, workers: usize) -> SearchConfig {
    SearchConfig {
        workers,
        store_dir: dir.to_path_buf(),
        ..Default::default()
    }
}

fn request(suffix: &str, batch_size: u64) -> SearchRequest {
    SearchRequest::new(SuffixPattern::new(suffix).unwrap(), deployer(), bytecode_hash())
        .with_batch_size(batch_size)
}

fn run(coordinator: &SearchCoordinator, request: SearchRequest) -> (SearchId, SearchStatus) {
    let submitted = coordinator.submit(request).unwrap();
    let status = coordinator.wait(&submitted.search_id, WAIT).unwrap();
    assert!(status.is_terminal(), "search still running: {:?}", status);
    (submitted.search_id, status)
}

fn found(status: &SearchStatus) -> (u64, Address) {
    let (salt, address) = status
        .found_salt()
        .unwrap_or_else(|| panic!("expected a match, got {:?}", status));
    (salt.to::<u64>(), address)
}

#[test]
fn finds_known_salt_end_to_end() {
    let dir = TempDir::new().unwrap();
    let coordinator = SearchCoordinator::open(config(dir.path(), 1)).unwrap();

    let submitted = coordinator.submit(request("00", 1000)).unwrap();
    assert_eq!(submitted.num_workers, 1);
    let status = coordinator.wait(&submitted.search_id, WAIT).unwrap();

    let (salt, address) = found(&status);
    assert_eq!(salt, 222);
    assert_eq!(
        address,
        "0x5b48ab5aea84075b19a642624fa8ba9fb2e52500".parse::<Address>().unwrap()
    );

    match &status {
        SearchStatus::Completed {
            success,
            deployer_address,
            bytecode_hash: hash,
            ..
        } => {
            assert!(success);
            assert_eq!(*deployer_address, Some(deployer()));
            assert_eq!(*hash, Some(bytecode_hash()));
        }
        other => panic!("unexpected status {:?}", other),
    }

    // Committed before the result became visible.
    assert!(coordinator.store().contains(&U256::from(222u64)));
    let result_file = dir
        .path()
        .join("results")
        .join(format!("{}.json", submitted.search_id));
    assert!(result_file.exists());

    assert_eq!(coordinator.poll(&submitted.search_id).unwrap(), status);
    assert!(coordinator.active_searches().is_empty());
}

#[test]
fn multi_worker_result_is_a_real_match() {
    let dir = TempDir::new().unwrap();
    let coordinator = SearchCoordinator::open(config(dir.path(), 4)).unwrap();

    let (_, status) = run(&coordinator, request("d8", 500));
    let (salt, address) = found(&status);

    // Matches for "d8" in the first four batches.
    assert!([42, 1387, 1791].contains(&salt), "unexpected salt {}", salt);
    assert_eq!(create2_address(&deployer(), &U256::from(salt), &bytecode_hash()), address);
    assert!(format!("{:x}", address).ends_with("d8"));
}

#[test]
fn used_salts_are_never_returned_twice() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("used-salts.json"), r#"["42"]"#).unwrap();
    let coordinator = SearchCoordinator::open(config(dir.path(), 1)).unwrap();

    let (_, first) = run(&coordinator, request("d8", 1000));
    assert_eq!(found(&first).0, 1387);

    let (_, second) = run(&coordinator, request("d8", 1000));
    assert_eq!(found(&second).0, 1791);

    let raw = fs::read_to_string(dir.path().join("used-salts.json")).unwrap();
    let persisted: Vec<String> = serde_json::from_str(&raw).unwrap();
    assert_eq!(persisted, vec!["42", "1387", "1791"]);
}

#[test]
fn salts_used_by_another_process_are_picked_up() {
    let dir = TempDir::new().unwrap();
    let coordinator = SearchCoordinator::open(config(dir.path(), 1)).unwrap();

    // Written after open, as a second process sharing the store would.
    fs::write(dir.path().join("used-salts.json"), r#"["222"]"#).unwrap();

    let (_, status) = run(&coordinator, request("00", 1000));
    assert_eq!(found(&status).0, 408);
}

#[test]
fn exhausted_range_reports_no_match() {
    let dir = TempDir::new().unwrap();
    let cfg = SearchConfig {
        max_batches: 2,
        ..config(dir.path(), 1)
    };
    let coordinator = SearchCoordinator::open(cfg).unwrap();

    // "2d8" only occurs at salt 42 below 3000.
    let req = request("2d8", 100).with_start_salt(U256::from(100u64));
    let (_, status) = run(&coordinator, req);

    let expected_range = SearchedRange {
        start_salt: U256::from(100u64),
        end_salt: U256::from(300u64),
    };
    match status {
        SearchStatus::Completed {
            success,
            salt,
            message,
            searched_range,
            ..
        } => {
            assert!(!success);
            assert_eq!(salt, None);
            assert_eq!(message.as_deref(), Some("No matching salt found in range 100-300"));
            assert_eq!(searched_range, Some(expected_range));
        }
        other => panic!("unexpected status {:?}", other),
    }
    assert!(coordinator.store().used().is_empty());
}

#[test]
fn timeout_is_reported_as_timeout() {
    let dir = TempDir::new().unwrap();
    let cfg = SearchConfig {
        timeout_ms: 200,
        max_batches: 0,
        ..config(dir.path(), 1)
    };
    let coordinator = SearchCoordinator::open(cfg).unwrap();

    let (id, status) = run(&coordinator, request("ffffffffffffffffffff", 1_000_000));
    match &status {
        SearchStatus::Timeout { message, .. } => assert!(message.contains("timed out")),
        other => panic!("expected timeout, got {:?}", other),
    }
    assert_eq!(coordinator.poll(&id).unwrap(), status);
}

#[test]
fn running_search_can_be_polled_and_cancelled() {
    let dir = TempDir::new().unwrap();
    let coordinator = SearchCoordinator::open(config(dir.path(), 2)).unwrap();

    let submitted = coordinator
        .submit(request("ffffffffffffffffffff", 1_000_000))
        .unwrap();
    let id = submitted.search_id;

    assert_eq!(
        coordinator.poll(&id).unwrap(),
        SearchStatus::Searching { search_id: id.clone() }
    );
    assert_eq!(coordinator.active_searches(), vec![id.clone()]);
    assert!(coordinator.stats(&id).is_some());

    assert!(coordinator.cancel(&id));
    match coordinator.wait(&id, WAIT).unwrap() {
        SearchStatus::Error { message, .. } => assert!(message.contains("cancelled")),
        other => panic!("expected error, got {:?}", other),
    }
    assert!(!coordinator.cancel(&id));
}

#[test]
fn unknown_search_is_not_found() {
    let dir = TempDir::new().unwrap();
    let coordinator = SearchCoordinator::open(config(dir.path(), 1)).unwrap();

    let missing = SearchId::from("1234567890");
    assert!(matches!(
        coordinator.poll(&missing),
        Err(SearchError::NotFound(id)) if id == missing
    ));
    assert!(matches!(
        coordinator.poll(&SearchId::from("../used-salts")),
        Err(SearchError::NotFound(_))
    ));
}

#[test]
fn results_survive_restart() {
    let dir = TempDir::new().unwrap();
    let (id, status) = {
        let coordinator = SearchCoordinator::open(config(dir.path(), 1)).unwrap();
        run(&coordinator, request("00", 1000))
    };

    let reopened = SearchCoordinator::open(config(dir.path(), 1)).unwrap();
    assert_eq!(reopened.poll(&id).unwrap(), status);
    assert!(reopened.store().contains(&U256::from(222u64)));
}

#[test]
fn invalid_requests_are_rejected_up_front() {
    let dir = TempDir::new().unwrap();
    let coordinator = SearchCoordinator::open(config(dir.path(), 1)).unwrap();

    let valid = RawSearchRequest {
        target_suffix: Some("b00b5".to_string()),
        deployer_address: Some(DEPLOYER.to_string()),
        bytecode_hash: Some(BYTECODE_HASH.to_string()),
        ..Default::default()
    };

    let cases = [
        RawSearchRequest {
            target_suffix: None,
            ..valid.clone()
        },
        RawSearchRequest {
            target_suffix: Some("xyz".to_string()),
            ..valid.clone()
        },
        RawSearchRequest {
            deployer_address: Some("0x1234".to_string()),
            ..valid.clone()
        },
        RawSearchRequest {
            bytecode_hash: Some("not hex".to_string()),
            ..valid.clone()
        },
        RawSearchRequest {
            batch_size: Some(0),
            ..valid.clone()
        },
    ];

    for raw in cases {
        assert!(matches!(
            coordinator.submit_raw(raw),
            Err(SearchError::InvalidRequest(_))
        ));
    }
    assert!(coordinator.active_searches().is_empty());
}

#[test]
fn failed_result_write_keeps_salt_visible() {
    let dir = TempDir::new().unwrap();
    let coordinator = SearchCoordinator::open(config(dir.path(), 1)).unwrap();

    // Swap the results directory for a plain file so the result write fails.
    let results = dir.path().join("results");
    fs::remove_dir(&results).unwrap();
    fs::write(&results, b"").unwrap();

    let (id, status) = run(&coordinator, request("00", 1000));
    match &status {
        SearchStatus::Error { message, .. } => {
            assert!(message.contains("222"), "{}", message);
            assert!(
                message.to_lowercase().contains("0x5b48ab5aea84075b19a642624fa8ba9fb2e52500"),
                "{}",
                message
            );
        }
        other => panic!("expected error, got {:?}", other),
    }
    assert_eq!(coordinator.poll(&id).unwrap(), status);
    assert!(coordinator.store().contains(&U256::from(222u64)));
}

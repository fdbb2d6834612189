//! Integration tests for minerscan-store against a file-backed database.

use std::thread;

use chrono::TimeDelta;
use minerscan_core::{Host, ProbeStatus, ResponsePayload, ScanOutcome};
use minerscan_store::{OutcomeStore, StoreConfig};

fn host(addr: &str) -> Host {
    Host::parse(addr).unwrap()
}

fn success(addr: &str) -> ScanOutcome {
    ScanOutcome::success(
        host(addr),
        "/cgi-bin/stats.cgi",
        ResponsePayload::Structured(serde_json::json!({"STATS": [{"rate_5s": 110.0}]})),
    )
}

#[test]
fn test_rows_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new(dir.path().join("nested").join("miners.db"));

    {
        let store = OutcomeStore::open(&config).unwrap();
        store.upsert_outcome(&success("10.0.1.1")).unwrap();
    }

    let store = OutcomeStore::open(&config).unwrap();
    let stored = store.get_outcome(&host("10.0.1.1")).unwrap().unwrap();
    assert_eq!(stored.status, ProbeStatus::Success);
    assert_eq!(
        stored.payload,
        ResponsePayload::Structured(serde_json::json!({"STATS": [{"rate_5s": 110.0}]}))
    );
}

#[test]
fn test_repeated_scans_keep_one_row_per_host() {
    let store = OutcomeStore::open_in_memory().unwrap();
    let hosts = ["10.0.1.1", "10.0.1.2", "10.0.1.3"];

    for _run in 0..5 {
        for addr in hosts {
            store.upsert_outcome(&ScanOutcome::failed(host(addr))).unwrap();
        }
    }

    assert_eq!(store.count_outcomes().unwrap(), hosts.len());
}

#[test]
fn test_rescan_advances_observed_at() {
    let store = OutcomeStore::open_in_memory().unwrap();
    let first = success("10.0.1.7");
    let second = success("10.0.1.7").observed(first.observed_at + TimeDelta::seconds(30));

    store.upsert_outcome(&first).unwrap();
    let before = store.get_outcome(&host("10.0.1.7")).unwrap().unwrap();
    store.upsert_outcome(&second).unwrap();
    let after = store.get_outcome(&host("10.0.1.7")).unwrap().unwrap();

    assert_eq!(store.count_outcomes().unwrap(), 1);
    assert!(after.observed_at > before.observed_at);
    assert_eq!(after.observed_at, second.observed_at);
}

#[test]
fn test_concurrent_upserts_from_threads() {
    let dir = tempfile::tempdir().unwrap();
    let store = OutcomeStore::open(&StoreConfig::new(dir.path().join("miners.db"))).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let store = store.clone();
            thread::spawn(move || {
                for i in 0..25 {
                    let addr = format!("10.1.{}.{}", worker % 2, i);
                    store.upsert_outcome(&ScanOutcome::failed(host(&addr))).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    // Workers 0,2,4,6 and 1,3,5,7 write the same 25 keys each.
    assert_eq!(store.count_outcomes().unwrap(), 50);
    assert_eq!(store.status_summary().unwrap().failed, 50);
}

#[test]
fn test_rows_from_older_scanner_are_readable_and_rewritten() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("antpool_workers.db");

    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE miner_details (
                ip_address TEXT PRIMARY KEY,
                status TEXT,
                endpoint_used TEXT,
                response_json TEXT,
                updated_at TIMESTAMP
            );
            INSERT INTO miner_details VALUES
                ('10.0.2.1', 'success', '/cgi-bin/stats.cgi', '{\"STATUS\":\"S\"}', '2024-03-01 12:30:05');
            INSERT INTO miner_details VALUES
                ('10.0.2.2', 'failed', NULL, NULL, '2024-03-01 12:30:09');",
        )
        .unwrap();
    }

    let store = OutcomeStore::open(&StoreConfig::new(&path)).unwrap();

    let old = store.get_outcome(&host("10.0.2.2")).unwrap().unwrap();
    assert_eq!(old.status, ProbeStatus::Failed);
    assert_eq!(old.endpoint_used, "");
    assert!(old.payload.is_absent());
    assert_eq!(old.observed_at.to_rfc3339(), "2024-03-01T12:30:09+00:00");

    let listed = store.list_outcomes(None).unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(
        listed[0].payload,
        ResponsePayload::Structured(serde_json::json!({"STATUS": "S"}))
    );

    store.upsert_outcome(&success("10.0.2.2")).unwrap();
    let rewritten = store.get_outcome(&host("10.0.2.2")).unwrap().unwrap();
    assert_eq!(rewritten.status, ProbeStatus::Success);
    assert!(rewritten.observed_at > old.observed_at);
    assert_eq!(store.count_outcomes().unwrap(), 2);
}

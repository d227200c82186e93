// Orchestrator behaviour against mocked sources.
// Run with: cargo test -p shiprecon-sources --test orchestrator

use std::collections::BTreeSet;
use std::error::Error as _;
use std::fs;

use httpmock::prelude::*;
use serde_json::json;
use shiprecon_config::{ConfigError, GroupConfig, Settings, SourceKind};
use shiprecon_recon::TrackingKey;
use shiprecon_sources::{CostReconciler, FetchError};
use tempfile::TempDir;

fn settings(dir: &TempDir) -> Settings {
    Settings {
        data_dir: dir.path().join("output"),
        http_retries: 0,
        http_timeout_secs: 5,
        ..Settings::default()
    }
}

fn web_group(kind: SourceKind, server: &MockServer) -> GroupConfig {
    let mut g = GroupConfig::new(kind);
    g.base_url = Some(server.base_url());
    g.username = Some("me".into());
    g.password = Some("pw".into());
    g
}

fn key(t: &str) -> TrackingKey {
    TrackingKey::single(t).unwrap()
}

#[test]
fn always_failing_source_gives_up_after_five_attempts() {
    let server = MockServer::start();
    let login = server.mock(|when, then| {
        when.method(POST).path("/api/login");
        then.status(500);
    });

    let dir = TempDir::new().unwrap();
    let mut s = settings(&dir);
    s.groups.insert("mysite".into(), web_group(SourceKind::Portal, &server));
    let reconciler = CostReconciler::new(s);

    let err = reconciler
        .fetch_costs_with_retry("mysite", &BTreeSet::new(), false)
        .unwrap_err();

    login.assert_hits(5);
    match &err {
        FetchError::RetriesExhausted { group, attempts, last } => {
            assert_eq!(group, "mysite");
            assert_eq!(*attempts, 5);
            assert!(matches!(**last, FetchError::Upstream { .. }), "{last}");
            assert!(last.to_string().contains("HTTP 500"), "{last}");
        }
        other => panic!("expected RetriesExhausted, got {other}"),
    }
    assert!(err.source().is_some());
    assert!(err.to_string().starts_with("mysite: exceeded retry limit"));
}

#[test]
fn attempt_budget_comes_from_settings() {
    let server = MockServer::start();
    let login = server.mock(|when, then| {
        when.method(POST).path("/buyers/login");
        then.status(503);
    });

    let dir = TempDir::new().unwrap();
    let mut s = settings(&dir);
    s.max_attempts = 2;
    s.groups.insert("usa".into(), web_group(SourceKind::TrackingApi, &server));

    let err = CostReconciler::new(s)
        .fetch_costs_with_retry("usa", &BTreeSet::new(), false)
        .unwrap_err();
    login.assert_hits(2);
    assert!(matches!(err, FetchError::RetriesExhausted { attempts: 2, .. }));
}

#[test]
fn unknown_group_fails_immediately() {
    let dir = TempDir::new().unwrap();
    let reconciler = CostReconciler::new(settings(&dir));
    let err = reconciler
        .fetch_costs_with_retry("nobody", &BTreeSet::new(), false)
        .unwrap_err();
    assert!(matches!(err, FetchError::UnknownGroup(ref g) if g == "nobody"));
}

#[test]
fn missing_password_fails_before_any_request() {
    let server = MockServer::start();
    let login = server.mock(|when, then| {
        when.method(POST).path("/api/login");
        then.status(200).json_body(json!({"token": "tok"}));
    });

    let dir = TempDir::new().unwrap();
    let mut s = settings(&dir);
    let mut group = web_group(SourceKind::Portal, &server);
    group.password = None;
    group.password_env = Some("SHIPRECON_TEST_ORCH_UNSET_PASSWORD".into());
    s.groups.insert("mysite".into(), group);

    let err = CostReconciler::new(s)
        .fetch_costs_with_retry("mysite", &BTreeSet::new(), false)
        .unwrap_err();
    login.assert_hits(0);
    assert!(matches!(
        err,
        FetchError::Config(ConfigError::MissingCredentials { .. })
    ));
}

#[test]
fn fan_out_failure_of_one_key_keeps_the_others() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/buyers/login");
        then.status(200).json_body(json!({"data": {"token": "tok"}}));
    });
    server.mock(|when, then| {
        when.method(GET).path("/buyers/trackings");
        then.status(200).json_body(json!({
            "data": [
                {"tracking_number": "K1", "purchase_id": "P1", "purchase": {"amount": "10.00"}},
                {"tracking_number": "K2", "purchase_id": "P1", "purchase": {"amount": "10.00"}},
                {"tracking_number": "K3", "purchase_id": "P2", "purchase": {"amount": "4.00"}}
            ],
            "totals": {"items": 3}
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/buyers/trackings/K1");
        then.status(200).json_body(json!({"data": {"box": {"total_price": 6.5}}}));
    });
    let k2 = server.mock(|when, then| {
        when.method(GET).path("/buyers/trackings/K2");
        then.status(500);
    });
    server.mock(|when, then| {
        when.method(GET).path("/buyers/trackings/K3");
        then.status(200).json_body(json!({"data": {"box": {"total_price": "4.00"}}}));
    });

    let dir = TempDir::new().unwrap();
    let mut s = settings(&dir);
    s.groups.insert("usa".into(), web_group(SourceKind::TrackingApi, &server));

    let maps = CostReconciler::new(s)
        .fetch_costs_with_retry("usa", &BTreeSet::new(), false)
        .unwrap();

    // no outer retry for a per-key failure
    k2.assert_hits(1);
    assert_eq!(maps.tracking_costs.len(), 2);
    assert_eq!(maps.tracking_costs[&key("K1")], 650);
    assert_eq!(maps.tracking_costs[&key("K3")], 400);
    assert_eq!(maps.po_costs["P1"], 1000);
    assert_eq!(maps.tracking_pos["K2"], BTreeSet::from(["P1".to_string()]));
}

#[test]
fn portal_archives_are_stored_under_archive_dir() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/login");
        then.status(200).json_body(json!({"token": "tok"}));
    });
    server.mock(|when, then| {
        when.method(GET).path("/api/receipts").query_param("site", "mysite");
        then.status(200).json_body(json!({"rows": [], "has_next": false}));
    });
    let old = server.mock(|when, then| {
        when.method(GET).path("/api/receipts").query_param("site", "old");
        then.status(200).json_body(json!({
            "rows": [{"po": "A", "cost": "1.00", "verified": true, "trackings": "X1", "modified_at": "2019-01-01"}],
            "has_next": false
        }));
    });

    let dir = TempDir::new().unwrap();
    let mut s = settings(&dir);
    let mut group = web_group(SourceKind::Portal, &server);
    group.archives = vec!["old".into()];
    s.groups.insert("mysite".into(), group);
    let reconciler = CostReconciler::new(s);

    for _ in 0..2 {
        let maps = reconciler
            .fetch_costs_with_retry("mysite", &BTreeSet::new(), false)
            .unwrap();
        assert_eq!(maps.tracking_costs[&key("X1")], 100);
    }
    old.assert_hits(1);
    assert!(dir.path().join("output").join("archives").join("old.json").exists());
}

#[test]
fn payment_sheet_group() {
    let dir = TempDir::new().unwrap();
    let sheet = dir.path().join("payments.csv");
    fs::write(&sheet, "Tracking,Amount\n1Z1,3.00\n").unwrap();

    let mut s = settings(&dir);
    let mut group = GroupConfig::new(SourceKind::PaymentSheet);
    group.file = Some(sheet);
    s.groups.insert("bfmr".into(), group);

    let maps = CostReconciler::new(s)
        .fetch_costs_with_retry("bfmr", &BTreeSet::new(), false)
        .unwrap();
    assert_eq!(maps.tracking_costs[&key("1Z1")], 300);
}

use std::sync::Arc;

use fundlink::{
    DecisionLog, EngineConfig, FundRegistry, JsonFileStore, JsonlDecisionLog, MatchType,
    RawFundRecord, RegistryStore,
};

fn config() -> EngineConfig {
    EngineConfig::from_toml_str(
        r#"
[policy]
name_threshold = 0.85

[gp_aliases]
"Kohlberg Kravis Roberts" = ["KKR"]
"#,
    )
    .unwrap()
}

#[test]
fn flush_and_reopen_round_trips_registry() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("registry.json");
    let log_path = dir.path().join("decisions.jsonl");

    let (fund_id, fingerprint) = {
        let store = JsonFileStore::open(&store_path).unwrap();
        let log = Arc::new(JsonlDecisionLog::open(&log_path).unwrap());
        let registry = FundRegistry::open(&store, &config(), log).unwrap();

        let created = registry
            .resolve(
                &RawFundRecord::new("KKR 2006 Fund, L.P.", "wsib")
                    .with_general_partner("KKR")
                    .with_vintage_year(2006),
            )
            .unwrap();
        registry
            .resolve(&RawFundRecord::new("Riverside Capital Partners III", "wsib"))
            .unwrap();
        registry.add_gp_alias("The Riverside Company", "Riverside").unwrap();

        let report = registry.flush(&store).unwrap();
        assert_eq!(report.funds_written, 2);
        assert_eq!(report.aliases_written, 2);
        assert_eq!(report.gp_aliases_written, 1);
        assert!(report.is_clean());

        (created.fund_id, registry.topology_fingerprint().unwrap())
    };

    let store = JsonFileStore::open(&store_path).unwrap();
    assert_eq!(store.load().unwrap().funds.len(), 2);

    let log = Arc::new(JsonlDecisionLog::open(&log_path).unwrap());
    let registry = FundRegistry::open(&store, &config(), log.clone()).unwrap();
    assert_eq!(registry.topology_fingerprint().unwrap(), fingerprint);
    assert_eq!(registry.stats().unwrap().pending_funds, 0);

    // Known alias after reopen: no new fund, no new decision.
    let replay = registry
        .resolve(
            &RawFundRecord::new("KKR 2006 Fund, L.P.", "wsib")
                .with_general_partner("KKR")
                .with_vintage_year(2006),
        )
        .unwrap();
    assert_eq!(replay.fund_id, fund_id);
    assert_eq!(replay.match_type, MatchType::Alias);
    assert_eq!(log.len().unwrap(), 2);

    // Cross-source link against the reloaded fund.
    let linked = registry
        .resolve(
            &RawFundRecord::new("KKR 2006 Fund", "calpers")
                .with_general_partner("Kohlberg Kravis Roberts")
                .with_vintage_year(2006),
        )
        .unwrap();
    assert_eq!(linked.fund_id, fund_id);
    assert_eq!(log.for_fund(fund_id).unwrap().len(), 2);
}

#[test]
fn reopened_gp_alias_survives() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("registry.json");

    {
        let store = JsonFileStore::open(&store_path).unwrap();
        let registry = FundRegistry::open(
            &store,
            &EngineConfig::default(),
            Arc::new(fundlink::InMemoryDecisionLog::new()),
        )
        .unwrap();
        registry.add_gp_alias("Blackstone", "BX").unwrap();
        registry.flush(&store).unwrap();
    }

    let store = JsonFileStore::open(&store_path).unwrap();
    let registry = FundRegistry::open(
        &store,
        &EngineConfig::default(),
        Arc::new(fundlink::InMemoryDecisionLog::new()),
    )
    .unwrap();
    let snapshot = registry.snapshot().unwrap();
    assert!(snapshot
        .gp_aliases
        .iter()
        .any(|g| g.alias == "bx" && g.canonical == "Blackstone"));
}

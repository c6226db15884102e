use std::sync::Arc;

use fundlink::{
    AuditError, DecisionLog, DecisionOutcome, EngineConfig, FundId, FundRegistry,
    InMemoryDecisionLog, MatchDecision, MatchType, OverrideEntry, RawFundRecord, ResolutionError,
};

fn kkr_config() -> EngineConfig {
    EngineConfig::from_toml_str(
        r#"
[gp_aliases]
"Kohlberg Kravis Roberts" = ["KKR", "KKR & Co."]
"#,
    )
    .unwrap()
}

fn registry(config: &EngineConfig) -> (FundRegistry, Arc<InMemoryDecisionLog>) {
    let log = Arc::new(InMemoryDecisionLog::new());
    let registry = FundRegistry::new(config, log.clone()).unwrap();
    (registry, log)
}

struct FailingLog;

impl DecisionLog for FailingLog {
    fn record(&self, _decision: MatchDecision) -> Result<(), AuditError> {
        Err(AuditError::Backend {
            message: "disk full".to_string(),
        })
    }

    fn for_fund(&self, _fund_id: FundId) -> Result<Vec<MatchDecision>, AuditError> {
        Ok(Vec::new())
    }

    fn review_queue(&self) -> Result<Vec<MatchDecision>, AuditError> {
        Ok(Vec::new())
    }

    fn len(&self) -> Result<usize, AuditError> {
        Ok(0)
    }
}

#[test]
fn resolving_twice_is_idempotent() {
    let (registry, _log) = registry(&EngineConfig::default());
    let record = RawFundRecord::new("Blackstone Capital Partners VII, L.P.", "wsib")
        .with_general_partner("Blackstone")
        .with_vintage_year(2015);

    let first = registry.resolve(&record).unwrap();
    assert_eq!(first.match_type, MatchType::New);
    assert!(first.created_new);
    let aliases_after_first = registry.stats().unwrap().aliases;

    let second = registry.resolve(&record).unwrap();
    assert_eq!(second.fund_id, first.fund_id);
    assert_eq!(second.match_type, MatchType::Alias);
    assert!(!second.created_new);
    assert_eq!(registry.stats().unwrap().aliases, aliases_after_first);
    assert_eq!(registry.stats().unwrap().funds, 1);
}

#[test]
fn different_sequence_numbers_never_merge() {
    let (registry, log) = registry(&EngineConfig::default());
    let iv = registry
        .resolve(
            &RawFundRecord::new("Acme Partners IV", "wsib")
                .with_general_partner("Acme Capital")
                .with_vintage_year(2014),
        )
        .unwrap();
    let v = registry
        .resolve(
            &RawFundRecord::new("Acme Partners V", "calpers")
                .with_general_partner("Acme Capital")
                .with_vintage_year(2014),
        )
        .unwrap();

    assert_ne!(iv.fund_id, v.fund_id);
    assert!(v.created_new);

    // The vetoed candidate is kept in the audit trail of the new fund.
    let trail = log.for_fund(iv.fund_id).unwrap();
    assert_eq!(trail.len(), 2);
    let veto = &trail[1];
    assert_eq!(veto.outcome, DecisionOutcome::New);
    assert_eq!(veto.fund_id, v.fund_id);
    assert_eq!(veto.candidate_id, Some(iv.fund_id));
}

#[test]
fn cross_source_link_through_gp_alias() {
    let (registry, _log) = registry(&kkr_config());
    let f1 = registry
        .resolve(
            &RawFundRecord::new("KKR 2006 Fund, L.P.", "source-a")
                .with_general_partner("Kohlberg Kravis Roberts")
                .with_vintage_year(2006),
        )
        .unwrap();
    let linked = registry
        .resolve(
            &RawFundRecord::new("KKR 2006 Fund", "source-b")
                .with_general_partner("KKR")
                .with_vintage_year(2006),
        )
        .unwrap();

    assert_eq!(linked.fund_id, f1.fund_id);
    assert!(!linked.created_new);
    assert!(matches!(linked.match_type, MatchType::Exact | MatchType::FuzzyAuto));
    assert!(!linked.needs_review);

    let aliases = registry.aliases_for(f1.fund_id).unwrap();
    assert_eq!(aliases.len(), 2);
    assert_eq!(aliases[1].source_id, "source-b");
    assert_eq!(registry.lookup_alias("KKR 2006 Fund", "source-b").unwrap(), Some(f1.fund_id));
    assert_eq!(registry.lookup_alias("KKR 2006 Fund", "source-c").unwrap(), None);
}

#[test]
fn uncorroborated_name_match_is_flagged_not_merged_silently() {
    let (registry, log) = registry(&EngineConfig::default());
    let existing = registry
        .resolve(
            &RawFundRecord::new("Riverside Capital Partners III", "source-a")
                .with_general_partner("The Riverside Company")
                .with_vintage_year(2009),
        )
        .unwrap();

    let incoming = registry
        .resolve(&RawFundRecord::new("Riverside Capital Partners III", "source-b"))
        .unwrap();

    assert_eq!(incoming.fund_id, existing.fund_id);
    assert_eq!(incoming.match_type, MatchType::FuzzyFlagged);
    assert!(incoming.needs_review);
    assert!(incoming.confidence < 1.0);

    let queue = log.review_queue().unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].outcome, DecisionOutcome::FuzzyFlagged);
    assert_eq!(queue[0].source_id, "source-b");
}

#[test]
fn null_fields_are_backfilled_once() {
    let (registry, log) = registry(&EngineConfig::default());
    let created = registry
        .resolve(&RawFundRecord::new("Acme Growth Partners II", "source-a").with_general_partner("Acme"))
        .unwrap();
    assert_eq!(registry.get(created.fund_id).unwrap().unwrap().vintage_year, None);

    let later = RawFundRecord::new("Acme Growth Partners II, L.P.", "source-b")
        .with_general_partner("Acme")
        .with_vintage_year(2014);
    let linked = registry.resolve(&later).unwrap();
    assert_eq!(linked.fund_id, created.fund_id);
    assert_eq!(
        registry.get(created.fund_id).unwrap().unwrap().vintage_year,
        Some(2014)
    );

    let decisions_before = log.len().unwrap();
    let rerun = registry.resolve(&later).unwrap();
    assert_eq!(rerun.fund_id, created.fund_id);
    assert_eq!(rerun.match_type, MatchType::Alias);
    assert_eq!(log.len().unwrap(), decisions_before);
}

#[test]
fn display_name_comes_from_first_source() {
    let (registry, _log) = registry(&kkr_config());
    let first = registry
        .resolve(
            &RawFundRecord::new("KKR 2006 Fund, L.P.", "source-a")
                .with_general_partner("KKR")
                .with_vintage_year(2006),
        )
        .unwrap();
    registry
        .resolve(
            &RawFundRecord::new("KKR 2006 FUND", "source-b")
                .with_general_partner("KKR")
                .with_vintage_year(2006),
        )
        .unwrap();

    let fund = registry.get(first.fund_id).unwrap().unwrap();
    assert_eq!(fund.display_name, "KKR 2006 Fund");
    assert_eq!(fund.seeded_by, "source-a");
}

#[test]
fn unrelated_records_give_same_topology_in_any_order() {
    let a = RawFundRecord::new("Summit Partners Growth Equity Fund IX", "wsib").with_vintage_year(2015);
    let b = RawFundRecord::new("Oaktree Opportunities Fund X", "calpers").with_vintage_year(2016);

    let (forward, _) = registry(&EngineConfig::default());
    forward.resolve(&a).unwrap();
    forward.resolve(&b).unwrap();

    let (backward, _) = registry(&EngineConfig::default());
    backward.resolve(&b).unwrap();
    backward.resolve(&a).unwrap();

    assert_eq!(forward.topology().unwrap(), backward.topology().unwrap());
    assert_eq!(
        forward.topology_fingerprint().unwrap(),
        backward.topology_fingerprint().unwrap()
    );
}

#[test]
fn configured_override_wins() {
    let (seed, _) = registry(&EngineConfig::default());
    let target = seed
        .resolve(&RawFundRecord::new("Blackstone Capital Partners VII", "wsib"))
        .unwrap();

    let config = EngineConfig {
        overrides: vec![OverrideEntry {
            raw_name: "BX Cap Partners 7".to_string(),
            source_id: "calpers".to_string(),
            fund_id: target.fund_id,
        }],
        ..EngineConfig::default()
    };
    let log = Arc::new(InMemoryDecisionLog::new());
    let registry = FundRegistry::from_snapshot(seed.snapshot().unwrap(), &config, log.clone()).unwrap();

    let result = registry
        .resolve(&RawFundRecord::new("BX Cap Partners 7", "calpers"))
        .unwrap();
    assert_eq!(result.fund_id, target.fund_id);
    assert_eq!(result.match_type, MatchType::ManualOverride);
    assert!((result.confidence - 1.0).abs() < f64::EPSILON);

    let entries = log.entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].outcome, DecisionOutcome::ManualOverride);
}

#[test]
fn vetoed_override_creates_new_fund() {
    let (seed, _) = registry(&EngineConfig::default());
    let iv = seed.resolve(&RawFundRecord::new("Acme Partners IV", "wsib")).unwrap();

    let config = EngineConfig {
        overrides: vec![OverrideEntry {
            raw_name: "Acme Partners V".to_string(),
            source_id: "calpers".to_string(),
            fund_id: iv.fund_id,
        }],
        ..EngineConfig::default()
    };
    let (registry, _log) = {
        let log = Arc::new(InMemoryDecisionLog::new());
        let reg = FundRegistry::from_snapshot(seed.snapshot().unwrap(), &config, log.clone()).unwrap();
        (reg, log)
    };

    let record = RawFundRecord::new("Acme Partners V", "calpers");
    let result = registry.resolve(&record).unwrap();
    assert!(result.created_new);
    assert_ne!(result.fund_id, iv.fund_id);
    assert!(matches!(
        result.issues.as_slice(),
        [ResolutionError::SequenceVetoViolation { incoming: 5, existing: 4, .. }]
    ));

    // Replaying does not create a third fund.
    let again = registry.resolve(&record).unwrap();
    assert_eq!(again.fund_id, result.fund_id);
    assert_eq!(registry.stats().unwrap().funds, 2);
}

#[test]
fn audit_failure_keeps_resolution_working() {
    let registry = FundRegistry::new(&EngineConfig::default(), Arc::new(FailingLog)).unwrap();
    assert!(!registry.audit_incomplete());

    let result = registry
        .resolve(&RawFundRecord::new("Harbor Credit Opportunities Fund", "wsib"))
        .unwrap();
    assert!(result.created_new);
    assert!(!result.audit_recorded);
    assert!(registry.audit_incomplete());

    // State changes still happened.
    assert_eq!(
        registry
            .lookup_alias("Harbor Credit Opportunities Fund", "wsib")
            .unwrap(),
        Some(result.fund_id)
    );
}

#[test]
fn low_distinctiveness_names_go_to_review() {
    let (registry, log) = registry(&EngineConfig::default());
    let result = registry
        .resolve(&RawFundRecord::new("Capital Partners Fund", "wsib"))
        .unwrap();

    assert!(result.created_new);
    assert!(result.needs_review);
    assert!((result.confidence - 0.5).abs() < f64::EPSILON);
    assert_eq!(log.review_queue().unwrap().len(), 1);
}

#[test]
fn new_funds_are_classified() {
    let (registry, _log) = registry(&EngineConfig::default());
    let result = registry
        .resolve(&RawFundRecord::new("Blackstone Real Estate Partners IX", "wsib"))
        .unwrap();
    let fund = registry.get(result.fund_id).unwrap().unwrap();
    assert_eq!(fund.asset_class.as_deref(), Some("Real Assets"));
    assert_eq!(fund.sub_strategy.as_deref(), Some("Real Estate"));
    assert_eq!(fund.sequence_number, Some(9));
}

#[test]
fn lettered_and_offshore_vehicles_keep_their_numbers() {
    let (registry, _log) = registry(&EngineConfig::default());

    let vi = registry
        .resolve(
            &RawFundRecord::new("Vista Equity Partners Fund VI-A, L.P.", "wsib")
                .with_general_partner("Vista Equity Partners")
                .with_vintage_year(2016),
        )
        .unwrap();
    let vii = registry
        .resolve(
            &RawFundRecord::new("Vista Equity Partners Fund VII-A, L.P.", "calpers")
                .with_general_partner("Vista Equity Partners")
                .with_vintage_year(2016),
        )
        .unwrap();
    assert!(vii.created_new);
    assert_ne!(vii.fund_id, vi.fund_id);
    assert_eq!(registry.get(vi.fund_id).unwrap().unwrap().sequence_number, Some(6));
    assert_eq!(registry.get(vii.fund_id).unwrap().unwrap().sequence_number, Some(7));

    let bcp7 = registry
        .resolve(&RawFundRecord::new("Blackstone Capital Partners VII (Cayman)", "wsib"))
        .unwrap();
    let bcp8 = registry
        .resolve(&RawFundRecord::new("Blackstone Capital Partners VIII (Cayman)", "calpers"))
        .unwrap();
    assert!(bcp8.created_new);
    assert_ne!(bcp8.fund_id, bcp7.fund_id);
    assert_eq!(bcp8.match_type, MatchType::New);
}

#[test]
fn stale_alias_is_kept_but_reported_once() {
    let (registry, log) = registry(&EngineConfig::default());
    let a = registry
        .resolve(&RawFundRecord::new("Dover Street Secondaries", "wsib"))
        .unwrap();
    registry
        .repoint_alias("Zeta Growth Fund", "calpers", a.fund_id, "analyst mapping")
        .unwrap();

    let b = registry
        .resolve(
            &RawFundRecord::new("Zeta Growth Fund", "oregon")
                .with_general_partner("Zeta Capital")
                .with_vintage_year(2019),
        )
        .unwrap();
    assert!(b.created_new);
    assert_ne!(b.fund_id, a.fund_id);

    let replay = RawFundRecord::new("Zeta Growth Fund", "calpers")
        .with_general_partner("Zeta Capital")
        .with_vintage_year(2019);
    let first = registry.resolve(&replay).unwrap();
    assert_eq!(first.fund_id, a.fund_id);
    assert_eq!(first.match_type, MatchType::Alias);
    assert!(first.needs_review);
    assert!(matches!(
        first.issues.as_slice(),
        [ResolutionError::DuplicateAliasConflict { existing, computed, .. }]
            if *existing == a.fund_id && *computed == b.fund_id
    ));

    let conflicts = |log: &InMemoryDecisionLog| {
        log.review_queue()
            .unwrap()
            .into_iter()
            .filter(|d| d.outcome == DecisionOutcome::AliasConflict)
            .count()
    };
    assert_eq!(conflicts(&log), 1);

    let logged = log.len().unwrap();
    let second = registry.resolve(&replay).unwrap();
    assert_eq!(second.fund_id, a.fund_id);
    assert!(second.needs_review);
    assert_eq!(second.issues.len(), 1);
    assert_eq!(log.len().unwrap(), logged);
    assert_eq!(conflicts(&log), 1);
}

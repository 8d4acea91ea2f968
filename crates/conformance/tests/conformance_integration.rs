//! Conformance runs against both engine variants
//!
//! Every built-in variant must pass every bundle its capabilities select,
//! and the harness must notice a variant that claims more than it does.

use stowage_cache::{CacheResult, CapabilityDescriptor};
use stowage_conformance::{
    bundles, Blueprint, BundleOutcome, CacheFactory, ConformanceReport, Harness, LocalFactory,
    SharedFactory, TestCache,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("stowage_conformance=debug,stowage_cache=info")
        .with_test_writer()
        .try_init();
}

fn run(factory: &dyn CacheFactory) -> ConformanceReport {
    init_tracing();
    let report = Harness::new(factory).run();
    assert!(report.is_success(), "{report}");
    report
}

/// Local variant with a reduced or inflated capability claim
struct Claiming {
    capabilities: CapabilityDescriptor,
}

impl CacheFactory for Claiming {
    fn variant(&self) -> &'static str {
        "claiming"
    }

    fn capabilities(&self) -> CapabilityDescriptor {
        self.capabilities
    }

    fn create(&self, blueprint: Blueprint) -> CacheResult<TestCache> {
        LocalFactory.create(blueprint)
    }
}

/// Validates the unsynchronized variant.
///
/// Assertions:
/// - Confirms every applicable bundle passes.
/// - Confirms lock bundles run and only the thread-safety bundle is skipped.
#[test]
fn test_local_cache_conforms() {
    let report = run(&LocalFactory);

    assert_eq!(report.skipped(), vec!["concurrency"]);
    assert!(report.executed().contains(&"entry_lock"));
    assert!(report.executed().contains(&"wide_lock"));
    assert!(report.assert_passed().is_ok());
}

#[test]
fn test_wide_shared_cache_conforms() {
    let report = run(&SharedFactory::wide());
    assert!(report.skipped().is_empty(), "{report}");
    assert_eq!(report.executed().len(), bundles::all().len());
}

#[test]
fn test_striped_shared_cache_conforms() {
    let report = run(&SharedFactory::striped(16));
    assert!(report.skipped().is_empty(), "{report}");
    assert_eq!(report.variant, "shared-striped");
}

/// Verifies capability gating.
///
/// # Test Steps
/// 1. Declare no capabilities for a local cache
/// 2. Run the harness
/// 3. Verify optional bundles are skipped while the lock bundles still run
#[test]
fn test_undeclared_features_are_skipped() {
    let report = run(&Claiming { capabilities: CapabilityDescriptor::none() });

    assert_eq!(report.executed(), vec!["basic", "eviction", "entry_lock", "wide_lock"]);
    assert_eq!(report.skipped(), vec!["entry", "loading", "storing", "expiration", "concurrency"]);
    assert!(matches!(
        report.bundle("loading").map(|bundle| &bundle.outcome),
        Some(BundleOutcome::Skipped { reason: "loading not declared" })
    ));
}

/// Verifies the harness catches a false lock claim.
///
/// # Test Steps
/// 1. Declare every capability for the unsynchronized variant
/// 2. Run the harness
/// 3. Verify the lock bundles fail and the report names the checks
#[test]
fn test_false_lock_claim_is_caught() {
    init_tracing();
    let report = Harness::new(&Claiming { capabilities: CapabilityDescriptor::full() }).run();

    assert!(!report.is_success());
    let failed: Vec<_> = report.failures().map(|(bundle, _)| bundle).collect();
    assert!(failed.contains(&"entry_lock"), "{report}");
    assert!(failed.contains(&"wide_lock"), "{report}");
    let lock_bundle = |bundle: &&str| *bundle == "entry_lock" || *bundle == "wide_lock";
    assert!(failed.iter().all(lock_bundle), "{report}");

    let failure = report.assert_passed().unwrap_err();
    assert!(failure.summary.contains("entry_lock::entry_lock_matches_declaration"));
    assert!(failure.to_string().starts_with("claiming:"));
}

#[test]
fn test_bundles_run_in_isolation() {
    init_tracing();
    let expiration: Vec<_> =
        bundles::all().into_iter().filter(|bundle| bundle.name == "expiration").collect();

    for factory in [&LocalFactory as &dyn CacheFactory, &SharedFactory::striped(4)] {
        let report = Harness::with_bundles(factory, expiration.clone()).run();
        assert_eq!(report.executed(), vec!["expiration"]);
        assert!(report.is_success(), "{report}");
    }
}

#[test]
fn test_report_exports_as_json() {
    let report = run(&SharedFactory::default());
    let json = report.to_json().unwrap();
    assert!(json.contains("\"variant\": \"shared-striped\""));
    assert!(json.contains("\"entry_lock_support\": true"));
}

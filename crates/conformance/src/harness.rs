//! Harness: runs applicable bundles and collects the report

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::Serialize;
use stowage_cache::CapabilityDescriptor;
use tracing::{debug, info, warn};

use crate::bundles::{self, Bundle};
use crate::error::{ConformanceError, ConformanceFailure};
use crate::factory::CacheFactory;

/// Runs conformance bundles against one cache factory
pub struct Harness<'a> {
    factory: &'a dyn CacheFactory,
    bundles: Vec<Bundle>,
}

impl<'a> Harness<'a> {
    /// Harness with every built-in bundle
    pub fn new(factory: &'a dyn CacheFactory) -> Self {
        Self { factory, bundles: bundles::all() }
    }

    /// Harness with a custom bundle selection
    pub fn with_bundles(factory: &'a dyn CacheFactory, bundles: Vec<Bundle>) -> Self {
        Self { factory, bundles }
    }

    /// Run every bundle, skipping those the factory does not qualify for
    pub fn run(&self) -> ConformanceReport {
        let variant = self.factory.variant();
        let capabilities = self.factory.capabilities();
        info!(variant, declared = ?capabilities.declared(), "running conformance bundles");

        let bundles = self.bundles.iter().map(|bundle| self.run_bundle(bundle)).collect();
        let report = ConformanceReport { variant, capabilities, bundles };

        if report.is_success() {
            info!(variant, checks = report.checks_run(), "conformance passed");
        } else {
            warn!(variant, failed = report.failures().count(), "conformance failed");
        }
        report
    }

    fn run_bundle(&self, bundle: &Bundle) -> BundleReport {
        if let Some(reason) = (bundle.skip_unless)(self.factory) {
            debug!(bundle = bundle.name, reason, "bundle skipped");
            return BundleReport { name: bundle.name, outcome: BundleOutcome::Skipped { reason } };
        }

        let mut failures = Vec::new();
        for check in &bundle.checks {
            let outcome = catch_unwind(AssertUnwindSafe(|| (check.run)(self.factory)))
                .unwrap_or_else(|panic| Err(ConformanceError::Panicked(panic_message(&*panic))));
            match outcome {
                Ok(()) => debug!(bundle = bundle.name, check = check.name, "check passed"),
                Err(err) => {
                    warn!(bundle = bundle.name, check = check.name, error = %err, "check failed");
                    failures.push(CheckFailure { check: check.name, message: err.to_string() });
                }
            }
        }

        let outcome = if failures.is_empty() {
            BundleOutcome::Passed { checks: bundle.checks.len() }
        } else {
            BundleOutcome::Failed { checks: bundle.checks.len(), failures }
        };
        BundleReport { name: bundle.name, outcome }
    }
}

impl fmt::Debug for Harness<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Harness")
            .field("variant", &self.factory.variant())
            .field("bundles", &self.bundles.iter().map(|b| b.name).collect::<Vec<_>>())
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// One failed check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckFailure {
    /// Check name
    pub check: &'static str,
    /// Rendered error
    pub message: String,
}

/// What happened to a bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BundleOutcome {
    /// Every check passed
    Passed {
        /// Checks executed
        checks: usize,
    },
    /// At least one check failed
    Failed {
        /// Checks executed
        checks: usize,
        /// Failed checks
        failures: Vec<CheckFailure>,
    },
    /// Not applicable to the variant
    Skipped {
        /// Why the bundle did not run
        reason: &'static str,
    },
}

/// Result of one bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleReport {
    /// Bundle name
    pub name: &'static str,
    /// Outcome
    pub outcome: BundleOutcome,
}

/// Result of a harness run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConformanceReport {
    /// Variant under test
    pub variant: &'static str,
    /// Capabilities the variant declared
    pub capabilities: CapabilityDescriptor,
    /// Per-bundle results, in run order
    pub bundles: Vec<BundleReport>,
}

impl ConformanceReport {
    /// True when no check failed
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Report for the bundle called `name`
    pub fn bundle(&self, name: &str) -> Option<&BundleReport> {
        self.bundles.iter().find(|bundle| bundle.name == name)
    }

    /// Names of the bundles that ran
    pub fn executed(&self) -> Vec<&'static str> {
        self.bundles
            .iter()
            .filter(|bundle| !matches!(bundle.outcome, BundleOutcome::Skipped { .. }))
            .map(|bundle| bundle.name)
            .collect()
    }

    /// Names of the bundles that were skipped
    pub fn skipped(&self) -> Vec<&'static str> {
        self.bundles
            .iter()
            .filter(|bundle| matches!(bundle.outcome, BundleOutcome::Skipped { .. }))
            .map(|bundle| bundle.name)
            .collect()
    }

    /// Every failed check as `(bundle, failure)`
    pub fn failures(&self) -> impl Iterator<Item = (&'static str, &CheckFailure)> + '_ {
        self.bundles.iter().flat_map(|bundle| {
            let failures: &[CheckFailure] = match &bundle.outcome {
                BundleOutcome::Failed { failures, .. } => failures,
                _ => &[],
            };
            failures.iter().map(move |failure| (bundle.name, failure))
        })
    }

    /// Number of checks executed
    pub fn checks_run(&self) -> usize {
        self.bundles
            .iter()
            .map(|bundle| match bundle.outcome {
                BundleOutcome::Passed { checks } | BundleOutcome::Failed { checks, .. } => checks,
                BundleOutcome::Skipped { .. } => 0,
            })
            .sum()
    }

    /// `Ok` when every check passed
    pub fn assert_passed(&self) -> Result<(), ConformanceFailure> {
        if self.is_success() {
            return Ok(());
        }
        let names: Vec<String> = self
            .failures()
            .map(|(bundle, failure)| format!("{bundle}::{}", failure.check))
            .collect();
        Err(ConformanceFailure {
            variant: self.variant,
            failed: names.len(),
            total: self.checks_run(),
            summary: names.join(", "),
        })
    }

    /// Report as pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Conformance report for {}", self.variant)?;
        for bundle in &self.bundles {
            match &bundle.outcome {
                BundleOutcome::Passed { checks } => {
                    writeln!(f, "  [pass] {} ({checks} checks)", bundle.name)?;
                }
                BundleOutcome::Failed { checks, failures } => {
                    writeln!(f, "  [FAIL] {} ({}/{checks} failed)", bundle.name, failures.len())?;
                    for failure in failures {
                        writeln!(f, "         {}: {}", failure.check, failure.message)?;
                    }
                }
                BundleOutcome::Skipped { reason } => {
                    writeln!(f, "  [skip] {} ({reason})", bundle.name)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundles::Check;
    use crate::error::CheckResult;
    use crate::factory::LocalFactory;

    fn passes(_: &dyn CacheFactory) -> CheckResult {
        Ok(())
    }

    fn fails(_: &dyn CacheFactory) -> CheckResult {
        Err(ConformanceError::Assertion("nope".into()))
    }

    fn panics(_: &dyn CacheFactory) -> CheckResult {
        panic!("boom")
    }

    fn always(_: &dyn CacheFactory) -> Option<&'static str> {
        None
    }

    fn never(_: &dyn CacheFactory) -> Option<&'static str> {
        Some("not applicable")
    }

    fn bundle(name: &'static str, skip_unless: bundles::Gate, checks: Vec<Check>) -> Bundle {
        Bundle { name, skip_unless, checks }
    }

    /// Validates outcome aggregation.
    ///
    /// Assertions:
    /// - Confirms panicking checks are recorded as failures.
    /// - Confirms skipped bundles run no checks.
    /// - Confirms `assert_passed` names every failure.
    #[test]
    fn test_report_aggregates_outcomes() {
        let bundles = vec![
            bundle("good", always, vec![Check::new("ok", passes)]),
            bundle(
                "bad",
                always,
                vec![
                    Check::new("ok", passes),
                    Check::new("fails", fails),
                    Check::new("panics", panics),
                ],
            ),
            bundle("gated", never, vec![Check::new("fails", fails)]),
        ];
        let report = Harness::with_bundles(&LocalFactory, bundles).run();

        assert!(!report.is_success());
        assert_eq!(report.checks_run(), 4);
        assert_eq!(report.executed(), vec!["good", "bad"]);
        assert_eq!(report.skipped(), vec!["gated"]);
        let failed: Vec<_> = report.failures().map(|(_, failure)| failure.check).collect();
        assert_eq!(failed, vec!["fails", "panics"]);
        assert!(report.failures().any(|(_, failure)| failure.message.contains("boom")));

        let failure = report.assert_passed().unwrap_err();
        assert_eq!(failure.summary, "bad::fails, bad::panics");
        assert!(report.to_string().contains("[skip] gated (not applicable)"));
    }

    #[test]
    fn test_report_serializes_outcomes() {
        let bundles = vec![bundle("good", always, vec![Check::new("ok", passes)])];
        let report = Harness::with_bundles(&LocalFactory, bundles).run();
        let json = report.to_json().unwrap();
        assert!(json.contains("\"status\": \"passed\""));
        assert!(report.assert_passed().is_ok());
    }
}

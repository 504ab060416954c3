//! Cycle orchestration.
//!
//! One cycle walks every configured probe: fresh tolerable verdicts are
//! skipped, everything else is fetched through the production gateway and
//! classified. An unusable verdict triggers recovery: candidates are tried
//! one by one through the trial inbound, the first optimal one is promoted
//! to production, a tolerable one is remembered as fallback. Routing changes
//! land before state is persisted, notifications go out last.

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, instrument, warn};

use crate::config::{Config, ProbeSpec};
use crate::models::{EgressRoute, ProbeState, Quality};
use crate::notify::{dispatch, Alert, Notifier};
use crate::probe::{classify, ProbeDriver, QualityVerdict};
use crate::routing::{RouteRule, RoutingController};
use crate::store::StateStore;

/// How one probe ended up after a cycle pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResolution {
    /// Fresh tolerable verdict, probe not attempted
    Skipped,
    /// Production egress still optimal, nothing changed
    SteadyOptimal,
    /// Production egress degraded but tolerated, route unchanged
    DegradedTolerable,
    /// Recovery promoted an optimal candidate
    SwitchedOptimal { outbound: String },
    /// No optimal candidate; a tolerable one was promoted
    SwitchedTolerable { outbound: String },
    /// Every candidate failed, route left as it was
    RecoveryFailed,
}

impl ProbeResolution {
    pub fn describe(&self) -> &'static str {
        match self {
            ProbeResolution::Skipped => "skipped",
            ProbeResolution::SteadyOptimal => "steady-optimal",
            ProbeResolution::DegradedTolerable => "degraded-tolerable",
            ProbeResolution::SwitchedOptimal { .. } => "switched-optimal",
            ProbeResolution::SwitchedTolerable { .. } => "switched-tolerable",
            ProbeResolution::RecoveryFailed => "recovery-failed",
        }
    }
}

/// Aggregate tally of one cycle
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleSummary {
    pub total: usize,
    pub skipped: usize,
    pub steady: usize,
    pub degraded: usize,
    pub switched: usize,
    pub failed: usize,
}

impl CycleSummary {
    fn record(&mut self, resolution: &ProbeResolution) {
        self.total += 1;
        match resolution {
            ProbeResolution::Skipped => self.skipped += 1,
            ProbeResolution::SteadyOptimal => self.steady += 1,
            ProbeResolution::DegradedTolerable => self.degraded += 1,
            ProbeResolution::SwitchedOptimal { .. } | ProbeResolution::SwitchedTolerable { .. } => {
                self.switched += 1
            }
            ProbeResolution::RecoveryFailed => self.failed += 1,
        }
    }
}

pub struct FailoverOrchestrator {
    config: Arc<Config>,
    driver: Arc<dyn ProbeDriver>,
    routing: Arc<dyn RoutingController>,
    notifier: Arc<dyn Notifier>,
    store: Arc<StateStore>,
}

impl FailoverOrchestrator {
    pub fn new(
        config: Arc<Config>,
        driver: Arc<dyn ProbeDriver>,
        routing: Arc<dyn RoutingController>,
        notifier: Arc<dyn Notifier>,
        store: Arc<StateStore>,
    ) -> Self {
        FailoverOrchestrator {
            config,
            driver,
            routing,
            notifier,
            store,
        }
    }

    /// Handle every configured probe once, bounded by the configured
    /// concurrency, and return the tally.
    pub async fn run_cycle(&self) -> CycleSummary {
        let concurrency = self.config.max_concurrent_probes.max(1);
        let resolutions: Vec<ProbeResolution> = stream::iter(self.config.probes.iter())
            .map(|spec| self.handle_probe(spec))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut summary = CycleSummary::default();
        for resolution in &resolutions {
            summary.record(resolution);
        }
        info!(
            "Cycle complete: {} probes, {} skipped, {} steady, {} degraded, {} switched, {} failed",
            summary.total,
            summary.skipped,
            summary.steady,
            summary.degraded,
            summary.switched,
            summary.failed
        );
        summary
    }

    /// Run the skip check, probe the production route, classify, and either
    /// commit the verdict or enter recovery.
    #[instrument(skip(self, spec), fields(probe = %spec.name))]
    pub async fn handle_probe(&self, spec: &ProbeSpec) -> ProbeResolution {
        let now = Utc::now();
        if self
            .store
            .should_skip(&spec.name, now, self.config.skip_window())
        {
            debug!("Probe {}: tolerable verdict still fresh, skipping", spec.name);
            return ProbeResolution::Skipped;
        }

        let current = self.store.get(&spec.name).and_then(|s| s.outbound);
        let label = current.clone().unwrap_or_else(|| "default".to_string());
        let route = EgressRoute::new(label, Some(self.config.egress.primary.clone()));
        let outcome = self.driver.probe(spec, &route).await;
        let verdict = classify(&outcome, &spec.expect);
        info!(
            "Probe {}: {} via {} ({}) in {}ms",
            spec.name, verdict.quality, outcome.outbound, verdict.rule, outcome.latency_ms
        );

        match verdict.quality {
            Quality::Optimal => {
                self.commit(spec, Quality::Optimal, current, &verdict.reason, None)
                    .await;
                ProbeResolution::SteadyOptimal
            }
            Quality::Tolerable => {
                let alert = Alert::degraded(
                    &spec.name,
                    &spec.url,
                    &verdict.reason,
                    Some(outcome.latency_ms),
                );
                self.commit(spec, Quality::Tolerable, current, &verdict.reason, Some(alert))
                    .await;
                ProbeResolution::DegradedTolerable
            }
            Quality::Unusable => self.recover(spec, current, &verdict.reason).await,
        }
    }

    /// Scan candidates through the trial inbound and switch the production
    /// route to the best one found.
    async fn recover(
        &self,
        spec: &ProbeSpec,
        current: Option<String>,
        cause: &str,
    ) -> ProbeResolution {
        warn!(
            "Probe {}: production egress unusable ({}), scanning candidates",
            spec.name, cause
        );

        let candidates = spec.outbounds.priority(&self.config.default_candidates);
        if candidates.is_empty() {
            return self
                .fail_recovery(spec, current, "no recovery candidates configured")
                .await;
        }

        let trial_tag = trial_tag(&spec.name);
        let mut chosen: Option<(String, QualityVerdict, u64)> = None;
        let mut fallback: Option<(String, QualityVerdict, u64)> = None;

        for candidate in &candidates {
            // Replace whatever trial rule is left from the previous candidate
            // (or from an interrupted earlier run).
            if let Err(e) = self.routing.remove_rule(&trial_tag).await {
                debug!("Probe {}: trial rule removal failed: {}", spec.name, e);
            }
            let rule = RouteRule::trial(
                trial_tag.as_str(),
                candidate.as_str(),
                &spec.domain,
                self.config.router.trial_inbound.as_str(),
                spec.rule.as_ref(),
            );
            if let Err(e) = self.routing.apply_rule(&rule).await {
                warn!(
                    "Probe {}: trial rule for {} not applied ({}), candidate skipped",
                    spec.name, candidate, e
                );
                continue;
            }

            let route = EgressRoute::new(
                candidate.as_str(),
                Some(self.config.egress.trial.clone()),
            );
            let outcome = self.driver.probe(spec, &route).await;
            let verdict = classify(&outcome, &spec.expect);
            info!(
                "Probe {}: candidate {} is {} ({}) in {}ms",
                spec.name, candidate, verdict.quality, verdict.rule, outcome.latency_ms
            );

            match verdict.quality {
                Quality::Optimal => {
                    // A failed promotion counts as a failed candidate and the
                    // scan moves on.
                    if self.promote(spec, candidate).await {
                        chosen = Some((candidate.clone(), verdict, outcome.latency_ms));
                        break;
                    }
                }
                Quality::Tolerable => {
                    if fallback.is_none() {
                        fallback = Some((candidate.clone(), verdict, outcome.latency_ms));
                    }
                }
                Quality::Unusable => {}
            }
        }

        if let Err(e) = self.routing.remove_rule(&trial_tag).await {
            debug!("Probe {}: trial rule cleanup failed: {}", spec.name, e);
        }

        if let Some((outbound, verdict, latency_ms)) = chosen {
            let alert = Alert::switched_optimal(
                &spec.name,
                &spec.url,
                &outbound,
                &verdict.reason,
                Some(latency_ms),
            );
            self.commit(
                spec,
                Quality::Optimal,
                Some(outbound.clone()),
                &verdict.reason,
                Some(alert),
            )
            .await;
            return ProbeResolution::SwitchedOptimal { outbound };
        }

        if let Some((outbound, verdict, latency_ms)) = fallback {
            if self.promote(spec, &outbound).await {
                let alert = Alert::switched_tolerable(
                    &spec.name,
                    &spec.url,
                    &outbound,
                    &verdict.reason,
                    Some(latency_ms),
                );
                self.commit(
                    spec,
                    Quality::Tolerable,
                    Some(outbound.clone()),
                    &verdict.reason,
                    Some(alert),
                )
                .await;
                return ProbeResolution::SwitchedTolerable { outbound };
            }
            let reason = format!("tolerable candidate {} could not be promoted", outbound);
            return self.fail_recovery(spec, current, &reason).await;
        }

        let reason = format!(
            "all {} candidates unusable (production: {})",
            candidates.len(),
            cause
        );
        self.fail_recovery(spec, current, &reason).await
    }

    /// Swap the production rule over to `candidate`. Returns whether the new
    /// rule landed.
    async fn promote(&self, spec: &ProbeSpec, candidate: &str) -> bool {
        let tag = production_tag(&spec.name);
        if let Err(e) = self.routing.remove_rule(&tag).await {
            debug!("Probe {}: production rule removal failed: {}", spec.name, e);
        }
        let rule = RouteRule::production(tag.as_str(), candidate, &spec.domain, spec.rule.as_ref());
        match self.routing.apply_rule(&rule).await {
            Ok(()) => {
                info!("Probe {}: production route switched to {}", spec.name, candidate);
                true
            }
            Err(e) => {
                warn!(
                    "Probe {}: production rule for {} not applied: {}",
                    spec.name, candidate, e
                );
                false
            }
        }
    }

    async fn fail_recovery(
        &self,
        spec: &ProbeSpec,
        current: Option<String>,
        reason: &str,
    ) -> ProbeResolution {
        error!(
            "Probe {}: recovery failed ({}), route left unchanged",
            spec.name, reason
        );
        let alert = Alert::recovery_failed(&spec.name, &spec.url, reason);
        self.commit(spec, Quality::Unusable, current, reason, Some(alert))
            .await;
        ProbeResolution::RecoveryFailed
    }

    /// Persist the verdict, then send the alert. A persist failure is logged
    /// and the cycle carries on; the in-memory record stays correct.
    async fn commit(
        &self,
        spec: &ProbeSpec,
        quality: Quality,
        outbound: Option<String>,
        reason: &str,
        alert: Option<Alert>,
    ) {
        let state = ProbeState::new(quality, outbound, Utc::now(), reason);
        if let Err(e) = self.store.update(&spec.name, state) {
            warn!("Probe {}: state not persisted: {}", spec.name, e);
        }
        if let Some(alert) = alert {
            dispatch(self.notifier.as_ref(), &alert).await;
        }
    }
}

fn trial_tag(name: &str) -> String {
    format!("probe-{}-trial", name)
}

fn production_tag(name: &str) -> String {
    format!("probe-{}-prod", name)
}

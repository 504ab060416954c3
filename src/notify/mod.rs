//! Alert severities, payloads, and the dispatch boundary.
//!
//! Every terminal probe transition maps to exactly one severity tier.
//! Delivery is fire-and-forget: a failed send is logged and swallowed so it
//! can never abort state persistence or the rest of the cycle.

pub mod telegram;

pub use telegram::TelegramNotifier;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::Result;

/// Severity tier for one alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }

    /// Marker prepended to chat messages
    pub fn marker(&self) -> &'static str {
        match self {
            Severity::Info => "🔄",
            Severity::Warning => "⚠️",
            Severity::Critical => "🚨",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured alert payload handed to the notifier
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub severity: Severity,
    pub headline: String,
    pub probe: String,
    pub url: String,
    pub reason: String,
    pub outbound: Option<String>,
    pub latency_ms: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    fn new(
        severity: Severity,
        headline: &str,
        probe: impl Into<String>,
        url: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Alert {
            severity,
            headline: headline.to_string(),
            probe: probe.into(),
            url: url.into(),
            reason: reason.into(),
            outbound: None,
            latency_ms: None,
            timestamp: Utc::now(),
        }
    }

    /// Active route still works but a challenge was present
    pub fn degraded(
        probe: impl Into<String>,
        url: impl Into<String>,
        reason: impl Into<String>,
        latency_ms: Option<u64>,
    ) -> Self {
        let mut alert = Alert::new(
            Severity::Warning,
            "Egress degraded to tolerable",
            probe,
            url,
            reason,
        );
        alert.latency_ms = latency_ms;
        alert
    }

    /// Recovery committed a candidate that probed optimal
    pub fn switched_optimal(
        probe: impl Into<String>,
        url: impl Into<String>,
        outbound: impl Into<String>,
        reason: impl Into<String>,
        latency_ms: Option<u64>,
    ) -> Self {
        let mut alert = Alert::new(
            Severity::Info,
            "Egress switched, quality optimal",
            probe,
            url,
            reason,
        );
        alert.outbound = Some(outbound.into());
        alert.latency_ms = latency_ms;
        alert
    }

    /// Recovery committed a candidate that only probed tolerable
    pub fn switched_tolerable(
        probe: impl Into<String>,
        url: impl Into<String>,
        outbound: impl Into<String>,
        reason: impl Into<String>,
        latency_ms: Option<u64>,
    ) -> Self {
        let mut alert = Alert::new(
            Severity::Warning,
            "Egress switched, quality tolerable",
            probe,
            url,
            reason,
        );
        alert.outbound = Some(outbound.into());
        alert.latency_ms = latency_ms;
        alert
    }

    /// Every candidate failed; the active route is unchanged
    pub fn recovery_failed(
        probe: impl Into<String>,
        url: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Alert::new(
            Severity::Critical,
            "Egress recovery failed, manual intervention required",
            probe,
            url,
            reason,
        )
    }
}

/// Delivers one alert to the operator's channel
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<()>;
}

/// Fire-and-forget dispatch: send errors are logged and dropped, never
/// retried within the cycle.
pub async fn dispatch(notifier: &dyn Notifier, alert: &Alert) {
    if let Err(e) = notifier.send(alert).await {
        warn!(
            "Dropped {} notification for {}: {}",
            alert.severity, alert.probe, e
        );
    }
}

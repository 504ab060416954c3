//! Probe execution boundary.
//!
//! The orchestrator only ever talks to the [`ProbeDriver`] trait; the HTTP
//! implementation lives in [`http`] and deterministic fakes substitute in
//! tests. Classification of the raw signals is in [`evaluator`].

pub mod evaluator;
pub mod http;

pub use evaluator::{classify, QualityVerdict, VerdictRule};
pub use http::HttpProbeDriver;

use async_trait::async_trait;

use crate::config::ProbeSpec;
use crate::models::{EgressRoute, ProbeOutcome};

/// One navigation attempt through a given egress route.
///
/// Drivers never return errors: timeouts, connect failures, and protocol
/// errors are embedded in the outcome so the evaluator classifies them.
#[async_trait]
pub trait ProbeDriver: Send + Sync {
    async fn probe(&self, spec: &ProbeSpec, route: &EgressRoute) -> ProbeOutcome;
}

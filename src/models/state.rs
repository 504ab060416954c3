use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Quality level assigned to a probe target by the expectation evaluator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    /// Reached the target cleanly, no verification challenge
    Optimal,
    /// Reached the target but a verification challenge was present
    Tolerable,
    /// Blocked, challenged without an accepted fallback, or unreachable
    Unusable,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Optimal => "optimal",
            Quality::Tolerable => "tolerable",
            Quality::Unusable => "unusable",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "optimal" => Some(Quality::Optimal),
            "tolerable" => Some(Quality::Tolerable),
            "unusable" => Some(Quality::Unusable),
            _ => None,
        }
    }

    /// Whether the egress still carries traffic at this quality
    pub fn is_usable(&self) -> bool {
        matches!(self, Quality::Optimal | Quality::Tolerable)
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted record of the last classification for one probe target.
///
/// Written only by the orchestrator at the end of a probe's handling and read
/// back at the start of the next cycle to decide skip-or-run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeState {
    pub quality: Quality,
    /// Outbound currently routed for this probe, `None` while on the default
    pub outbound: Option<String>,
    pub last_check_time: DateTime<Utc>,
    pub reason: String,
}

impl ProbeState {
    pub fn new(
        quality: Quality,
        outbound: Option<String>,
        last_check_time: DateTime<Utc>,
        reason: impl Into<String>,
    ) -> Self {
        ProbeState {
            quality,
            outbound,
            last_check_time,
            reason: reason.into(),
        }
    }

    /// Elapsed time since the last check, negative when the stored timestamp
    /// is in the future (clock skew)
    pub fn elapsed_since_check(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_check_time
    }
}

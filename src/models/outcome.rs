use serde::{Deserialize, Serialize};

/// A logical outbound paired with the local gateway used to reach it.
///
/// The gateway is the proxy address a probe attempt dials through; `None`
/// means a direct connection (used by tests and local verification).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EgressRoute {
    pub outbound: String,
    pub gateway: Option<String>,
}

impl EgressRoute {
    pub fn new(outbound: impl Into<String>, gateway: Option<String>) -> Self {
        EgressRoute {
            outbound: outbound.into(),
            gateway,
        }
    }

    pub fn direct(outbound: impl Into<String>) -> Self {
        EgressRoute {
            outbound: outbound.into(),
            gateway: None,
        }
    }
}

/// Raw signals from one navigation attempt.
///
/// Produced by the probe driver, consumed once by the evaluator. Failures are
/// embedded rather than returned as errors so classification always happens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// Outbound the attempt exited through
    pub outbound: String,
    /// Time from request dispatch to response headers (or to the failure)
    pub latency_ms: u64,
    pub fetch: FetchResult,
}

impl ProbeOutcome {
    pub fn page(outbound: impl Into<String>, latency_ms: u64, snapshot: PageSnapshot) -> Self {
        ProbeOutcome {
            outbound: outbound.into(),
            latency_ms,
            fetch: FetchResult::Page(snapshot),
        }
    }

    pub fn failed(outbound: impl Into<String>, latency_ms: u64, reason: impl Into<String>) -> Self {
        ProbeOutcome {
            outbound: outbound.into(),
            latency_ms,
            fetch: FetchResult::Failed {
                reason: reason.into(),
            },
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.fetch, FetchResult::Failed { .. })
    }
}

/// Either a fetched page or the reason the attempt produced no response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum FetchResult {
    Page(PageSnapshot),
    Failed { reason: String },
}

/// Observable content of a fetched page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub status: u16,
    pub title: String,
    /// Raw response markup; challenge markers live in attributes and class
    /// names, so matching runs over the unextracted document
    pub body: String,
}

impl PageSnapshot {
    pub fn new(status: u16, title: impl Into<String>, body: impl Into<String>) -> Self {
        PageSnapshot {
            status,
            title: title.into(),
            body: body.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_constructors() {
        let ok = ProbeOutcome::page("jp-1", 240, PageSnapshot::new(200, "Buyee", "<html>"));
        assert_eq!(ok.outbound, "jp-1");
        assert_eq!(ok.latency_ms, 240);
        assert!(!ok.is_failure());

        let failed = ProbeOutcome::failed("jp-2", 20000, "operation timed out");
        assert!(failed.is_failure());
        match failed.fetch {
            FetchResult::Failed { reason } => assert_eq!(reason, "operation timed out"),
            FetchResult::Page(_) => panic!("expected failure"),
        }
    }

    #[test]
    fn test_egress_route_direct_has_no_gateway() {
        let route = EgressRoute::direct("default");
        assert_eq!(route.outbound, "default");
        assert!(route.gateway.is_none());

        let via = EgressRoute::new("jp-1", Some("socks5://127.0.0.1:1081".to_string()));
        assert_eq!(via.gateway.as_deref(), Some("socks5://127.0.0.1:1081"));
    }
}

//! Application configuration.
//!
//! Loaded once from a JSON document at startup. Validation runs at load
//! time so the rest of the program can assume probe names are unique,
//! URLs carry a host, and gateway addresses are non-empty.

use crate::error::{Result, VigilError};
use crate::models::Expectation;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Top-level configuration document.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Egress gateways the prober dials through.
    pub egress: EgressSettings,
    /// Routing engine endpoint and binary.
    #[serde(default)]
    pub router: RouterSettings,
    /// Telegram delivery credentials. Absent means alerts are logged only.
    #[serde(default)]
    pub telegram: Option<TelegramSettings>,
    /// Where probe verdicts are persisted between cycles.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    /// Tolerable verdicts younger than this many minutes are not re-probed.
    #[serde(default = "default_skip_window_minutes")]
    pub skip_window_minutes: u64,
    /// Fallback outbound candidates appended to every probe's own list.
    #[serde(default)]
    pub default_candidates: Vec<String>,
    /// User-Agent sent with probe requests unless a probe overrides it.
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Per-request timeout for probe fetches.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// How many probes may run concurrently within a cycle.
    #[serde(default = "default_max_concurrent_probes")]
    pub max_concurrent_probes: usize,
    /// Optional wall-clock cap on a whole cycle.
    #[serde(default)]
    pub cycle_deadline_secs: Option<u64>,
    /// The monitored targets.
    #[serde(default)]
    pub probes: Vec<ProbeSpec>,
}

/// Gateways for production traffic and candidate trials.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EgressSettings {
    /// Gateway carrying the routing engine's production traffic.
    pub primary: String,
    /// Gateway bound to the trial inbound, used while scanning candidates.
    pub trial: String,
}

/// Routing engine connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouterSettings {
    /// gRPC API address of the routing engine.
    #[serde(default = "default_router_api")]
    pub api: String,
    /// Binary invoked for rule manipulation.
    #[serde(default = "default_router_exe")]
    pub exe: String,
    /// Inbound tag trial rules are pinned to.
    #[serde(default = "default_trial_inbound")]
    pub trial_inbound: String,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            api: default_router_api(),
            exe: default_router_exe(),
            trial_inbound: default_trial_inbound(),
        }
    }
}

/// Telegram bot credentials.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub chat_id: String,
    /// Allows muting delivery without removing credentials.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// One monitored target: a URL, its health expectations, and the
/// outbounds that may serve it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbeSpec {
    /// Unique name, also embedded in routing rule tags.
    pub name: String,
    /// Page fetched to judge egress health.
    pub url: String,
    /// What a healthy, degraded, or blocked response looks like.
    #[serde(default)]
    pub expect: Expectation,
    /// Candidate outbounds tried during recovery.
    #[serde(default)]
    pub outbounds: OutboundPlan,
    /// Extra fields merged into generated routing rules.
    #[serde(default)]
    pub rule: Option<Map<String, Value>>,
    /// Extra request headers for this probe.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Per-probe User-Agent override.
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Host extracted from `url` during validation.
    #[serde(skip)]
    pub domain: String,
}

impl ProbeSpec {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        let domain = Url::parse(&url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_owned))
            .unwrap_or_default();
        Self {
            name: name.into(),
            url,
            expect: Expectation::default(),
            outbounds: OutboundPlan::default(),
            rule: None,
            headers: HashMap::new(),
            user_agent: None,
            domain,
        }
    }
}

/// Candidate outbounds for a probe and how they combine with the
/// global defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutboundPlan {
    /// Probe-specific candidates, highest priority first.
    #[serde(default)]
    pub candidates: Vec<String>,
    /// When set, the global default candidates are not appended.
    #[serde(default)]
    pub replace_defaults: bool,
}

impl OutboundPlan {
    /// Ordered candidate list: own candidates first, then the defaults
    /// unless replaced. Duplicates keep their first occurrence.
    pub fn priority(&self, defaults: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        let tail: &[String] = if self.replace_defaults { &[] } else { defaults };
        for name in self.candidates.iter().chain(tail.iter()) {
            if seen.insert(name.clone()) {
                ordered.push(name.clone());
            }
        }
        ordered
    }
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(VigilError::ConfigNotFound(path.display().to_string()));
        }
        let raw = std::fs::read_to_string(path).map_err(|e| {
            VigilError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        let mut config: Config = serde_json::from_str(&raw).map_err(|e| {
            VigilError::InvalidConfig(format!("cannot parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants and fill derived fields.
    pub fn validate(&mut self) -> Result<()> {
        if self.egress.primary.trim().is_empty() {
            return Err(VigilError::InvalidConfig(
                "egress.primary must not be empty".into(),
            ));
        }
        if self.egress.trial.trim().is_empty() {
            return Err(VigilError::InvalidConfig(
                "egress.trial must not be empty".into(),
            ));
        }
        if self.probe_timeout_ms == 0 {
            return Err(VigilError::InvalidConfig(
                "probe_timeout_ms must be greater than zero".into(),
            ));
        }
        let mut names = HashSet::new();
        for probe in &mut self.probes {
            if probe.name.trim().is_empty() {
                return Err(VigilError::InvalidConfig(
                    "probe name must not be empty".into(),
                ));
            }
            if !names.insert(probe.name.clone()) {
                return Err(VigilError::InvalidConfig(format!(
                    "duplicate probe name: {}",
                    probe.name
                )));
            }
            let url = Url::parse(&probe.url).map_err(|e| {
                VigilError::InvalidConfig(format!("probe {}: invalid url: {e}", probe.name))
            })?;
            match url.host_str() {
                Some(host) => probe.domain = host.to_owned(),
                None => {
                    return Err(VigilError::InvalidConfig(format!(
                        "probe {}: url has no host",
                        probe.name
                    )))
                }
            }
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn skip_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.skip_window_minutes as i64)
    }

    pub fn cycle_deadline(&self) -> Option<Duration> {
        self.cycle_deadline_secs.map(Duration::from_secs)
    }
}

fn default_state_file() -> PathBuf {
    PathBuf::from("state.json")
}

fn default_skip_window_minutes() -> u64 {
    60
}

fn default_probe_timeout_ms() -> u64 {
    20_000
}

fn default_max_concurrent_probes() -> usize {
    4
}

fn default_router_api() -> String {
    "127.0.0.1:8000".into()
}

fn default_router_exe() -> String {
    "xray".into()
}

fn default_trial_inbound() -> String {
    "socks-probe".into()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn minimal_json() -> Value {
        json!({
            "egress": {"primary": "socks5://127.0.0.1:1080", "trial": "socks5://127.0.0.1:1081"},
            "probes": [{"name": "example", "url": "https://example.com/"}]
        })
    }

    fn load_value(value: Value) -> Result<Config> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();
        Config::load(&path)
    }

    #[test]
    fn test_defaults_applied() {
        let config = load_value(minimal_json()).unwrap();
        assert_eq!(config.state_file, PathBuf::from("state.json"));
        assert_eq!(config.skip_window_minutes, 60);
        assert_eq!(config.probe_timeout_ms, 20_000);
        assert_eq!(config.max_concurrent_probes, 4);
        assert_eq!(config.router.api, "127.0.0.1:8000");
        assert_eq!(config.router.exe, "xray");
        assert_eq!(config.router.trial_inbound, "socks-probe");
        assert!(config.telegram.is_none());
        assert!(config.cycle_deadline_secs.is_none());
        assert_eq!(config.probes[0].domain, "example.com");
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempdir().unwrap();
        let err = Config::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, VigilError::ConfigNotFound(_)));
        assert!(err.is_config());
    }

    #[test]
    fn test_malformed_json_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, VigilError::InvalidConfig(_)));
    }

    #[test]
    fn test_duplicate_probe_names_rejected() {
        let mut value = minimal_json();
        value["probes"] = json!([
            {"name": "dup", "url": "https://a.example/"},
            {"name": "dup", "url": "https://b.example/"}
        ]);
        let err = load_value(value).unwrap_err();
        assert!(err.to_string().contains("duplicate probe name"));
    }

    #[test]
    fn test_url_without_host_rejected() {
        let mut value = minimal_json();
        value["probes"] = json!([{"name": "odd", "url": "data:text/plain,hi"}]);
        let err = load_value(value).unwrap_err();
        assert!(err.to_string().contains("no host"));
    }

    #[test]
    fn test_empty_gateway_rejected() {
        let mut value = minimal_json();
        value["egress"]["trial"] = json!("  ");
        let err = load_value(value).unwrap_err();
        assert!(err.to_string().contains("egress.trial"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut value = minimal_json();
        value["probe_timeout_ms"] = json!(0);
        let err = load_value(value).unwrap_err();
        assert!(err.to_string().contains("probe_timeout_ms"));
    }

    #[test]
    fn test_full_probe_spec_parses() {
        let mut value = minimal_json();
        value["telegram"] = json!({"bot_token": "123:abc", "chat_id": "-100"});
        value["default_candidates"] = json!(["jp-1"]);
        value["probes"] = json!([{
            "name": "portal",
            "url": "https://portal.example.com/login",
            "expect": {
                "status": 200,
                "title": "Sign in",
                "captcha_keywords": ["captcha"],
                "fallback": {"status": 429},
                "must_not": {"status": [502], "body": ["blocked"]}
            },
            "outbounds": {"candidates": ["us-1", "us-2"], "replace_defaults": true},
            "rule": {"network": "tcp"},
            "headers": {"Accept-Language": "en"},
            "user_agent": "probe/1.0"
        }]);
        let config = load_value(value).unwrap();
        let probe = &config.probes[0];
        assert_eq!(probe.domain, "portal.example.com");
        assert_eq!(probe.expect.baseline.status, Some(200));
        assert_eq!(probe.expect.captcha_keywords, vec!["captcha"]);
        assert_eq!(probe.outbounds.candidates, vec!["us-1", "us-2"]);
        assert!(probe.outbounds.replace_defaults);
        assert_eq!(probe.rule.as_ref().unwrap()["network"], json!("tcp"));
        assert_eq!(probe.headers["Accept-Language"], "en");
        assert_eq!(probe.user_agent.as_deref(), Some("probe/1.0"));
        let telegram = config.telegram.unwrap();
        assert!(telegram.enabled);
        assert_eq!(telegram.chat_id, "-100");
    }

    #[test]
    fn test_priority_appends_defaults_deduped() {
        let plan = OutboundPlan {
            candidates: vec!["jp-1".into(), "jp-2".into()],
            replace_defaults: false,
        };
        let defaults = vec!["out-a".into(), "jp-1".into()];
        assert_eq!(plan.priority(&defaults), vec!["jp-1", "jp-2", "out-a"]);
    }

    #[test]
    fn test_priority_replace_drops_defaults() {
        let plan = OutboundPlan {
            candidates: vec!["jp-1".into()],
            replace_defaults: true,
        };
        let defaults = vec!["out-a".into()];
        assert_eq!(plan.priority(&defaults), vec!["jp-1"]);
    }

    #[test]
    fn test_priority_empty_plan_uses_defaults() {
        let plan = OutboundPlan::default();
        let defaults = vec!["out-a".into(), "out-b".into()];
        assert_eq!(plan.priority(&defaults), vec!["out-a", "out-b"]);
        assert!(plan.priority(&[]).is_empty());
    }

    #[test]
    fn test_duration_helpers() {
        let mut config = load_value(minimal_json()).unwrap();
        config.probe_timeout_ms = 1_500;
        config.skip_window_minutes = 90;
        config.cycle_deadline_secs = Some(300);
        assert_eq!(config.probe_timeout(), Duration::from_millis(1_500));
        assert_eq!(config.skip_window(), chrono::Duration::minutes(90));
        assert_eq!(config.cycle_deadline(), Some(Duration::from_secs(300)));
    }
}

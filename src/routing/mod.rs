//! Routing rule mutation boundary.

pub mod xray;

pub use xray::XrayRoutingController;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::error::Result;

/// Applies and removes routing rules on the egress router.
///
/// Operations are idempotent by rule tag: re-applying the same rule or
/// removing a rule that is already gone must be safe for callers to ignore.
#[async_trait]
pub trait RoutingController: Send + Sync {
    async fn apply_rule(&self, rule: &RouteRule) -> Result<()>;
    async fn remove_rule(&self, tag: &str) -> Result<()>;
}

/// One routing rule binding a domain to an outbound.
///
/// Trial rules carry the trial inbound tag so only probe traffic is diverted;
/// production rules carry no inbound tag and apply to all traffic. Template
/// overrides from the probe configuration are merged into the rendered rule
/// but can never displace the rule tag or the outbound binding.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRule {
    pub tag: String,
    pub outbound: String,
    pub domains: Vec<String>,
    pub inbounds: Vec<String>,
    pub overrides: Map<String, Value>,
}

impl RouteRule {
    /// Rule diverting the probe's domain to a candidate on the trial inbound
    pub fn trial(
        tag: impl Into<String>,
        outbound: impl Into<String>,
        domain: &str,
        inbound: impl Into<String>,
        overrides: Option<&Map<String, Value>>,
    ) -> Self {
        RouteRule {
            tag: tag.into(),
            outbound: outbound.into(),
            domains: vec![format!("domain:{}", domain)],
            inbounds: vec![inbound.into()],
            overrides: overrides.cloned().unwrap_or_default(),
        }
    }

    /// Production rule binding the domain for all traffic
    pub fn production(
        tag: impl Into<String>,
        outbound: impl Into<String>,
        domain: &str,
        overrides: Option<&Map<String, Value>>,
    ) -> Self {
        RouteRule {
            tag: tag.into(),
            outbound: outbound.into(),
            domains: vec![format!("domain:{}", domain)],
            inbounds: Vec::new(),
            overrides: overrides.cloned().unwrap_or_default(),
        }
    }

    /// Render the rule as the router's JSON rule object.
    pub fn to_value(&self) -> Value {
        let mut rule = Map::new();
        rule.insert("type".to_string(), json!("field"));
        rule.insert("domain".to_string(), json!(self.domains));
        if !self.inbounds.is_empty() {
            rule.insert("inboundTag".to_string(), json!(self.inbounds));
        }

        for (key, value) in &self.overrides {
            rule.insert(key.clone(), value.clone());
        }

        // Production rules never carry an inbound tag, template or not.
        if self.inbounds.is_empty() {
            rule.remove("inboundTag");
        }

        rule.insert("ruleTag".to_string(), json!(self.tag));
        rule.insert("outboundTag".to_string(), json!(self.outbound));
        Value::Object(rule)
    }

    /// Full config document the router CLI consumes.
    pub fn document(&self) -> Value {
        json!({ "routing": { "rules": [self.to_value()] } })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trial_rule_shape() {
        let rule = RouteRule::trial("probe-buyee-trial", "jp-1", "buyee.jp", "socks-probe", None);
        let value = rule.to_value();

        assert_eq!(value["type"], "field");
        assert_eq!(value["domain"], json!(["domain:buyee.jp"]));
        assert_eq!(value["inboundTag"], json!(["socks-probe"]));
        assert_eq!(value["ruleTag"], "probe-buyee-trial");
        assert_eq!(value["outboundTag"], "jp-1");
    }

    #[test]
    fn test_production_rule_has_no_inbound_tag() {
        let rule = RouteRule::production("probe-buyee-prod", "jp-1", "buyee.jp", None);
        let value = rule.to_value();

        assert!(value.get("inboundTag").is_none());
        assert_eq!(value["ruleTag"], "probe-buyee-prod");
        assert_eq!(value["outboundTag"], "jp-1");
    }

    #[test]
    fn test_overrides_merge_but_cannot_displace_bindings() {
        let mut overrides = Map::new();
        overrides.insert("network".to_string(), json!("tcp"));
        overrides.insert("ruleTag".to_string(), json!("hijacked"));
        overrides.insert("outboundTag".to_string(), json!("hijacked"));

        let rule = RouteRule::trial(
            "probe-buyee-trial",
            "jp-1",
            "buyee.jp",
            "socks-probe",
            Some(&overrides),
        );
        let value = rule.to_value();

        assert_eq!(value["network"], "tcp");
        assert_eq!(value["ruleTag"], "probe-buyee-trial");
        assert_eq!(value["outboundTag"], "jp-1");
    }

    #[test]
    fn test_production_rule_strips_inbound_from_overrides() {
        let mut overrides = Map::new();
        overrides.insert("inboundTag".to_string(), json!(["sneaky"]));

        let rule = RouteRule::production("probe-buyee-prod", "jp-1", "buyee.jp", Some(&overrides));
        assert!(rule.to_value().get("inboundTag").is_none());
    }

    #[test]
    fn test_overrides_can_replace_domain_matcher() {
        let mut overrides = Map::new();
        overrides.insert("domain".to_string(), json!(["geosite:category-ads"]));

        let rule = RouteRule::trial("t", "o", "buyee.jp", "socks-probe", Some(&overrides));
        assert_eq!(rule.to_value()["domain"], json!(["geosite:category-ads"]));
    }

    #[test]
    fn test_document_wraps_rule_in_routing_config() {
        let rule = RouteRule::production("probe-buyee-prod", "jp-1", "buyee.jp", None);
        let doc = rule.document();
        assert_eq!(doc["routing"]["rules"][0]["ruleTag"], "probe-buyee-prod");
    }
}

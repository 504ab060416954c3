//! Rule mutation through the Xray CLI API.
//!
//! Rules are added by writing the config document to a temp file and calling
//! `xray api adrules --append`, and removed by tag with `xray api rmrules`.
//! Dry-run mode logs the command it would run and reports success.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use super::{RouteRule, RoutingController};
use crate::error::{Result, VigilError};

pub struct XrayRoutingController {
    api: String,
    exe: String,
    dry_run: bool,
}

impl XrayRoutingController {
    pub fn new(api: impl Into<String>, exe: impl Into<String>, dry_run: bool) -> Self {
        XrayRoutingController {
            api: api.into(),
            exe: exe.into(),
            dry_run,
        }
    }

    async fn run_api(&self, args: &[&str]) -> std::result::Result<(), anyhow::Error> {
        let rendered = format!("{} api {}", self.exe, args.join(" "));
        if self.dry_run {
            info!("dry-run: {}", rendered);
            return Ok(());
        }
        debug!("Running {}", rendered);

        let output = Command::new(&self.exe).arg("api").args(args).output().await?;
        if !output.status.success() {
            anyhow::bail!(
                "{} failed ({}): {}",
                rendered,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!("xray output: {}", stdout.trim());
        }
        Ok(())
    }
}

#[async_trait]
impl RoutingController for XrayRoutingController {
    async fn apply_rule(&self, rule: &RouteRule) -> Result<()> {
        let file = tempfile::Builder::new()
            .suffix(".json")
            .tempfile()
            .map_err(|e| VigilError::Routing(format!("rule file: {}", e)))?;
        std::fs::write(file.path(), serde_json::to_string(&rule.document())?)
            .map_err(|e| VigilError::Routing(format!("rule file: {}", e)))?;

        let server = format!("--server={}", self.api);
        let path = file.path().to_string_lossy().to_string();
        self.run_api(&["adrules", &server, "--append", &path])
            .await
            .map_err(|e| VigilError::Routing(format!("apply {}: {:#}", rule.tag, e)))?;

        debug!("Applied routing rule {} -> {}", rule.tag, rule.outbound);
        Ok(())
    }

    async fn remove_rule(&self, tag: &str) -> Result<()> {
        if tag.is_empty() {
            return Ok(());
        }

        let server = format!("--server={}", self.api);
        self.run_api(&["rmrules", &server, tag])
            .await
            .map_err(|e| VigilError::Routing(format!("remove {}: {:#}", tag, e)))?;

        debug!("Removed routing rule {}", tag);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule() -> RouteRule {
        RouteRule::trial("probe-buyee-trial", "jp-1", "buyee.jp", "socks-probe", None)
    }

    #[tokio::test]
    async fn test_dry_run_never_executes() {
        // A missing binary would fail loudly if anything were spawned.
        let controller = XrayRoutingController::new("127.0.0.1:8080", "vigil-no-such-binary", true);
        assert!(controller.apply_rule(&rule()).await.is_ok());
        assert!(controller.remove_rule("probe-buyee-trial").await.is_ok());
    }

    #[tokio::test]
    async fn test_zero_exit_is_success() {
        let controller = XrayRoutingController::new("127.0.0.1:8080", "true", false);
        assert!(controller.apply_rule(&rule()).await.is_ok());
        assert!(controller.remove_rule("probe-buyee-trial").await.is_ok());
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_routing_error() {
        let controller = XrayRoutingController::new("127.0.0.1:8080", "false", false);
        let err = controller.apply_rule(&rule()).await.unwrap_err();
        assert!(matches!(err, VigilError::Routing(_)));
        assert!(err.to_string().contains("probe-buyee-trial"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_routing_error() {
        let controller =
            XrayRoutingController::new("127.0.0.1:8080", "vigil-no-such-binary", false);
        let err = controller.remove_rule("probe-buyee-trial").await.unwrap_err();
        assert!(matches!(err, VigilError::Routing(_)));
    }

    #[tokio::test]
    async fn test_empty_tag_removal_is_noop() {
        let controller =
            XrayRoutingController::new("127.0.0.1:8080", "vigil-no-such-binary", false);
        assert!(controller.remove_rule("").await.is_ok());
    }
}

//! Telegram delivery for alerts.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use super::{Alert, Notifier};
use crate::config::TelegramSettings;
use crate::error::{Result, VigilError};

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TelegramNotifier {
    settings: Option<TelegramSettings>,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(settings: Option<TelegramSettings>) -> Self {
        Self::with_api_base(settings, "https://api.telegram.org")
    }

    /// Base URL override for tests against an in-process server
    pub fn with_api_base(settings: Option<TelegramSettings>, api_base: impl Into<String>) -> Self {
        TelegramNotifier {
            settings,
            api_base: api_base.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, alert: &Alert) -> Result<()> {
        let Some(settings) = self.settings.as_ref().filter(|s| s.enabled) else {
            debug!(
                "Telegram disabled, dropping {} alert for {}",
                alert.severity, alert.probe
            );
            return Ok(());
        };

        let url = format!("{}/bot{}/sendMessage", self.api_base, settings.bot_token);
        let payload = json!({
            "chat_id": settings.chat_id,
            "text": format_message(alert),
            "parse_mode": "HTML",
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .timeout(SEND_TIMEOUT)
            .send()
            .await
            .map_err(|e| VigilError::Notify(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VigilError::Notify(format!(
                "telegram returned {}: {}",
                status,
                body.trim()
            )));
        }

        info!("Telegram {} alert delivered for {}", alert.severity, alert.probe);
        Ok(())
    }
}

/// HTML-formatted chat message for one alert
fn format_message(alert: &Alert) -> String {
    let mut lines = vec![
        format!(
            "{} <b>{}</b>",
            alert.severity.marker(),
            escape_html(&alert.headline)
        ),
        String::new(),
        format!("📍 Probe: <code>{}</code>", escape_html(&alert.probe)),
        format!("🌐 URL: <code>{}</code>", escape_html(&alert.url)),
    ];

    if let Some(outbound) = &alert.outbound {
        lines.push(format!("✅ Outbound: <code>{}</code>", escape_html(outbound)));
    }
    if let Some(latency_ms) = alert.latency_ms {
        lines.push(format!("⏱ Latency: {} ms", latency_ms));
    }
    lines.push(format!("ℹ️ Reason: {}", escape_html(&alert.reason)));
    lines.push(format!(
        "🕐 Time: {} UTC",
        alert.timestamp.format("%Y-%m-%d %H:%M:%S")
    ));

    lines.join("\n")
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn settings(enabled: bool) -> TelegramSettings {
        TelegramSettings {
            bot_token: "123:abc".to_string(),
            chat_id: "-100".to_string(),
            enabled,
        }
    }

    fn alert() -> Alert {
        Alert::switched_optimal("buyee", "https://buyee.jp/item", "jp-2", "clean page", Some(412))
    }

    async fn spawn_api_server(status_line: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = vec![0u8; 8192];
                let _ = stream.read(&mut buf).await;
                let body = "{\"ok\":true}";
                let response = format!(
                    "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_line,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_disabled_settings_drop_silently() {
        let notifier = TelegramNotifier::new(Some(settings(false)));
        assert!(notifier.send(&alert()).await.is_ok());

        let notifier = TelegramNotifier::new(None);
        assert!(notifier.send(&alert()).await.is_ok());
    }

    #[tokio::test]
    async fn test_send_succeeds_on_ok_response() {
        let base = spawn_api_server("HTTP/1.1 200 OK").await;
        let notifier = TelegramNotifier::with_api_base(Some(settings(true)), base);
        assert!(notifier.send(&alert()).await.is_ok());
    }

    #[tokio::test]
    async fn test_send_reports_api_rejection() {
        let base = spawn_api_server("HTTP/1.1 400 Bad Request").await;
        let notifier = TelegramNotifier::with_api_base(Some(settings(true)), base);
        let err = notifier.send(&alert()).await.unwrap_err();
        assert!(matches!(err, VigilError::Notify(_)));
        assert!(err.to_string().contains("400"));
    }

    #[tokio::test]
    async fn test_send_reports_connection_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let notifier =
            TelegramNotifier::with_api_base(Some(settings(true)), format!("http://{}", addr));
        let err = notifier.send(&alert()).await.unwrap_err();
        assert!(matches!(err, VigilError::Notify(_)));
    }

    #[test]
    fn test_message_contains_fields_and_escapes_html() {
        let mut alert = alert();
        alert.reason = "title missing <b>required</b> & more".to_string();
        let message = format_message(&alert);

        assert!(message.contains("🔄 <b>Egress switched, quality optimal</b>"));
        assert!(message.contains("<code>buyee</code>"));
        assert!(message.contains("<code>https://buyee.jp/item</code>"));
        assert!(message.contains("<code>jp-2</code>"));
        assert!(message.contains("⏱ Latency: 412 ms"));
        assert!(message.contains("&lt;b&gt;required&lt;/b&gt; &amp; more"));
    }
}

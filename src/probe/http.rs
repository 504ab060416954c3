//! HTTP probe driver.
//!
//! Fetches the target page with a fresh reqwest client per attempt, dialing
//! through the route's gateway when one is set. The page title comes from the
//! first `<title>` element; the body is the raw markup so challenge markers
//! in attributes and class names stay visible to the evaluator.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use super::ProbeDriver;
use crate::config::ProbeSpec;
use crate::models::{EgressRoute, PageSnapshot, ProbeOutcome};

pub struct HttpProbeDriver {
    timeout: Duration,
    user_agent: Option<String>,
}

impl HttpProbeDriver {
    pub fn new(timeout: Duration, user_agent: Option<String>) -> Self {
        HttpProbeDriver {
            timeout,
            user_agent,
        }
    }

    async fn fetch(
        &self,
        spec: &ProbeSpec,
        route: &EgressRoute,
    ) -> std::result::Result<(PageSnapshot, u64), anyhow::Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::limited(10));

        if let Some(ua) = spec.user_agent.as_ref().or(self.user_agent.as_ref()) {
            builder = builder.user_agent(ua.clone());
        }
        if let Some(gateway) = &route.gateway {
            builder = builder.proxy(reqwest::Proxy::all(gateway)?);
        }
        let client = builder.build()?;

        let mut request = client.get(&spec.url);
        for (name, value) in &spec.headers {
            request = request.header(name, value);
        }

        // Latency runs to response headers; body read time is excluded.
        let started = Instant::now();
        let response = request.send().await?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let status = response.status().as_u16();
        let body = response.text().await?;
        let title = extract_title(&body);

        Ok((PageSnapshot::new(status, title, body), latency_ms))
    }
}

#[async_trait]
impl ProbeDriver for HttpProbeDriver {
    async fn probe(&self, spec: &ProbeSpec, route: &EgressRoute) -> ProbeOutcome {
        let started = Instant::now();
        match self.fetch(spec, route).await {
            Ok((page, latency_ms)) => {
                debug!(
                    "Fetched {} via {}: status {} in {}ms",
                    spec.url, route.outbound, page.status, latency_ms
                );
                ProbeOutcome::page(&route.outbound, latency_ms, page)
            }
            Err(e) => {
                let latency_ms = started.elapsed().as_millis() as u64;
                debug!("Fetch of {} via {} failed: {:#}", spec.url, route.outbound, e);
                ProbeOutcome::failed(&route.outbound, latency_ms, format!("{e:#}"))
            }
        }
    }
}

fn title_regex() -> &'static Regex {
    static TITLE: OnceLock<Regex> = OnceLock::new();
    TITLE.get_or_init(|| {
        Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title pattern is valid")
    })
}

/// Text of the first `<title>` element, whitespace-collapsed
pub(crate) fn extract_title(html: &str) -> String {
    title_regex()
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}

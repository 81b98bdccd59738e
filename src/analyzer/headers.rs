use crate::error::{AnalysisError, SetupError};
use crate::model::{Analysis, Finding, Target, Visit};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use tracing::debug;

const USER_AGENT: &str = concat!("techsweep/", env!("CARGO_PKG_VERSION"));

/// Response headers whose values are `product/version` token lists.
const PRODUCT_HEADERS: &[&str] = &["server", "x-powered-by"];

/// Reports products that a target announces in its response headers.
///
/// Needs no external tooling, so it is always available.
pub struct HeaderAnalyzer {
    client: reqwest::Client,
}

impl HeaderAnalyzer {
    pub fn new() -> Result<Self, SetupError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SetupError::NoBackend(format!("http client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl super::Analyzer for HeaderAnalyzer {
    fn name(&self) -> &'static str {
        "Response Headers"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn analyze(&self, target: &Target) -> Result<Analysis, AnalysisError> {
        let response = self
            .client
            .get(target.as_str())
            .send()
            .await
            .map_err(|e| AnalysisError::Execution(format!("request failed: {}", e)))?;

        let final_url = response.url().to_string();
        let status = response.status().as_u16();
        debug!(target = %target, %final_url, status, "fetched target");

        let mut visits = Vec::new();
        if final_url.trim_end_matches('/') != target.as_str().trim_end_matches('/') {
            visits.push(Visit::new(target.as_str(), None));
        }
        visits.push(Visit::new(final_url, Some(status)));

        let findings = findings_from_headers(response.headers(), target);
        Ok(Analysis::new(findings).with_visits(visits))
    }
}

fn findings_from_headers(headers: &HeaderMap, target: &Target) -> Vec<Finding> {
    let mut findings = Vec::new();

    for header in PRODUCT_HEADERS {
        for value in headers.get_all(*header) {
            let Ok(value) = value.to_str() else {
                continue;
            };
            for (name, version) in parse_product_tokens(value) {
                findings.push(Finding::new(name, version, target.clone()));
            }
        }
    }

    if let Some(version) = headers
        .get("x-aspnet-version")
        .and_then(|v| v.to_str().ok())
    {
        findings.push(Finding::new("ASP.NET", Some(version), target.clone()));
    }

    findings
}

/// Splits a header such as `Apache/2.4.41 (Unix) OpenSSL/1.1.1` into
/// `(product, version)` pairs. Parenthesized comments are skipped.
fn parse_product_tokens(value: &str) -> Vec<(&str, Option<&str>)> {
    let mut products = Vec::new();
    let mut depth = 0usize;

    for token in value.split(|c: char| c.is_whitespace() || c == ',') {
        if token.is_empty() {
            continue;
        }
        if depth > 0 || token.starts_with('(') {
            depth += token.matches('(').count();
            depth = depth.saturating_sub(token.matches(')').count());
            continue;
        }

        match token.split_once('/') {
            Some((name, version)) if !name.is_empty() => products.push((name, Some(version))),
            Some(_) => {}
            None => products.push((token, None)),
        }
    }

    products
}

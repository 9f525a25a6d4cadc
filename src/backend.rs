//! HTTP client for the pattern backend.
//!
//! Implements the memory-center [`PatternStore`] seam so the local cache can
//! push and pull patterns, plus the element-finder prefetch call.

use std::time::Duration;

use async_trait::async_trait;
use guidepath_core_types::{PatternScope, WorkflowContext};
use memory_center::{LearnedPattern, PatternError, PatternStore, SOURCE_IMPORTED};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct SavePatternRequest<'a> {
    intent: &'a str,
    selector: &'a str,
    scope: String,
    confidence: f64,
}

/// Pattern record as the backend stores it.
#[derive(Debug, Deserialize)]
struct RemotePattern {
    #[serde(default)]
    id: Option<String>,
    intent: String,
    selector: String,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    success_count: u64,
    #[serde(default)]
    failure_count: u64,
}

impl RemotePattern {
    fn into_pattern(self, fallback_scope: &PatternScope) -> LearnedPattern {
        let scope = self
            .scope
            .as_deref()
            .and_then(|raw| PatternScope::parse(raw).ok())
            .unwrap_or_else(|| fallback_scope.clone());
        let mut pattern = LearnedPattern::new(&self.intent, self.selector, scope, SOURCE_IMPORTED);
        if let Some(id) = self.id.filter(|id| !id.trim().is_empty()) {
            pattern.id = id;
        }
        pattern.confidence = self.confidence;
        pattern.success_count = self.success_count;
        pattern.failure_count = self.failure_count;
        pattern
    }
}

#[derive(Serialize)]
struct ElementFinderRequest<'a> {
    intent: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a WorkflowContext>,
    url: &'a str,
    scope: String,
}

/// Best-effort server-side answer for a page the caller cannot see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementHint {
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub source: Option<String>,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, PatternError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| PatternError::Remote(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST /element-finder`.
    pub async fn find_element(
        &self,
        intent: &str,
        context: Option<&WorkflowContext>,
        url: &str,
        scope: &PatternScope,
    ) -> Result<ElementHint, PatternError> {
        let body = ElementFinderRequest {
            intent,
            context,
            url,
            scope: scope.key(),
        };
        let response = self
            .client
            .post(format!("{}/element-finder", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;
        let hint: ElementHint = checked(response).await?.json().await.map_err(decode_error)?;
        debug!(intent, selector = ?hint.selector, "element finder answered");
        Ok(hint)
    }
}

#[async_trait]
impl PatternStore for BackendClient {
    async fn save(&self, pattern: &LearnedPattern) -> Result<LearnedPattern, PatternError> {
        let body = SavePatternRequest {
            intent: &pattern.intent,
            selector: &pattern.selector,
            scope: pattern.scope.key(),
            confidence: pattern.confidence,
        };
        let response = self
            .client
            .post(format!("{}/patterns", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;
        let stored: RemotePattern = checked(response).await?.json().await.map_err(decode_error)?;
        Ok(stored.into_pattern(&pattern.scope))
    }

    async fn find(
        &self,
        intent: &str,
        scope: &PatternScope,
    ) -> Result<Vec<LearnedPattern>, PatternError> {
        let scope_key = scope.key();
        let response = self
            .client
            .get(format!("{}/patterns", self.base_url))
            .query(&[("intent", intent), ("scope", scope_key.as_str())])
            .send()
            .await
            .map_err(request_error)?;
        let found: Vec<RemotePattern> =
            checked(response).await?.json().await.map_err(decode_error)?;
        Ok(found
            .into_iter()
            .map(|remote| remote.into_pattern(scope))
            .collect())
    }
}

async fn checked(response: Response) -> Result<Response, PatternError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<response unavailable>".to_string());
    Err(PatternError::Remote(format!("backend returned {status}: {body}")))
}

fn request_error(err: reqwest::Error) -> PatternError {
    PatternError::Remote(format!("backend request failed: {err}"))
}

fn decode_error(err: reqwest::Error) -> PatternError {
    PatternError::Remote(format!("backend response was not valid JSON: {err}"))
}

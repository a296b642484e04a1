//! JSON-over-HTTP planner and renderer adapters.
//!
//! Planner: `POST {url}` with `{kind, settings, sources, itemCount}`, answers
//! `{"items": [...]}`. Renderer: `POST {url}` with `{item, context}`, answers
//! `{"content_type": "...", "data": "<base64>"}`.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{
    ContentPlanner, ItemRenderer, PlannerError, RenderContext, RenderError, RenderedItem,
};
use crate::config::EndpointConfig;
use crate::job::{GenerationSettings, JobKind, SourceDocument, SubItemSpec};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Error bodies are truncated before they end up in job records and logs.
const MAX_ERROR_BODY_LENGTH: usize = 200;

fn truncate_body(body: &str) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated)", &body[..end])
    } else {
        body.to_string()
    }
}

fn build_client(endpoint: &EndpointConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(Duration::from_secs(endpoint.timeout_secs))
        .build()
}

/// POSTs `body` as JSON and returns the response text of a 2xx answer.
async fn post_json<B: Serialize + ?Sized>(
    client: &Client,
    url: &str,
    body: &B,
) -> Result<String, String> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    let status = response.status();
    let text = response.text().await.map_err(|e| e.to_string())?;
    if !status.is_success() {
        return Err(format!("HTTP {}: {}", status, truncate_body(&text)));
    }
    Ok(text)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanRequest<'a> {
    kind: JobKind,
    settings: &'a GenerationSettings,
    sources: &'a [SourceDocument],
    item_count: u32,
}

#[derive(Deserialize)]
struct PlanResponse {
    items: Vec<SubItemSpec>,
}

#[derive(Serialize)]
struct RenderRequest<'a> {
    item: &'a SubItemSpec,
    context: &'a RenderContext,
}

#[derive(Deserialize)]
struct RenderResponse {
    content_type: String,
    data: String,
}

pub fn decode_plan_response(body: &str) -> Result<Vec<SubItemSpec>, PlannerError> {
    let response: PlanResponse = serde_json::from_str(body)
        .map_err(|e| PlannerError::InvalidResponse(e.to_string()))?;
    if response.items.is_empty() {
        return Err(PlannerError::EmptyPlan);
    }
    Ok(response.items)
}

pub fn decode_render_response(body: &str) -> Result<RenderedItem, RenderError> {
    let response: RenderResponse = serde_json::from_str(body)
        .map_err(|e| RenderError::InvalidResponse(e.to_string()))?;
    if response.content_type.trim().is_empty() {
        return Err(RenderError::InvalidResponse(
            "missing content_type".to_string(),
        ));
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(response.data.as_bytes())
        .map_err(|e| RenderError::InvalidResponse(format!("invalid base64 data: {}", e)))?;
    Ok(RenderedItem {
        bytes,
        content_type: response.content_type,
    })
}

pub struct HttpPlanner {
    client: Client,
    url: String,
}

impl HttpPlanner {
    pub fn new(endpoint: &EndpointConfig) -> Result<Self, PlannerError> {
        let client = build_client(endpoint)
            .map_err(|e| PlannerError::Request(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: endpoint.url.clone(),
        })
    }
}

#[async_trait]
impl ContentPlanner for HttpPlanner {
    async fn plan(
        &self,
        sources: &[SourceDocument],
        settings: &GenerationSettings,
    ) -> Result<Vec<SubItemSpec>, PlannerError> {
        let request = PlanRequest {
            kind: settings.kind(),
            settings,
            sources,
            item_count: settings.item_count(),
        };
        log::debug!("Requesting plan from {}", self.url);
        let body = post_json(&self.client, &self.url, &request)
            .await
            .map_err(PlannerError::Request)?;
        decode_plan_response(&body)
    }
}

pub struct HttpRenderer {
    client: Client,
    url: String,
}

impl HttpRenderer {
    pub fn new(endpoint: &EndpointConfig) -> Result<Self, RenderError> {
        let client = build_client(endpoint)
            .map_err(|e| RenderError::Request(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: endpoint.url.clone(),
        })
    }
}

#[async_trait]
impl ItemRenderer for HttpRenderer {
    async fn render(
        &self,
        item: &SubItemSpec,
        context: &RenderContext,
    ) -> Result<RenderedItem, RenderError> {
        let request = RenderRequest { item, context };
        let body = post_json(&self.client, &self.url, &request)
            .await
            .map_err(RenderError::Request)?;
        decode_render_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::ItemRole;

    #[test]
    fn test_decode_plan_response() {
        let body = r#"{"items": [
            {"role": "cover", "title": "Photosynthesis"},
            {"role": "body", "title": "Light reactions", "content": {"bullets": ["ATP"]}}
        ]}"#;
        let items = decode_plan_response(body).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].role, ItemRole::Cover);
        assert_eq!(items[1].content["bullets"][0], "ATP");
    }

    #[test]
    fn test_decode_empty_plan_is_error() {
        assert!(matches!(
            decode_plan_response(r#"{"items": []}"#),
            Err(PlannerError::EmptyPlan)
        ));
        assert!(matches!(
            decode_plan_response("not json"),
            Err(PlannerError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_decode_render_response() {
        let body = r#"{"content_type": "text/markdown", "data": "IyBIZWxsbw=="}"#;
        let item = decode_render_response(body).unwrap();
        assert_eq!(item.content_type, "text/markdown");
        assert_eq!(item.bytes, b"# Hello");
    }

    #[test]
    fn test_decode_render_response_rejects_bad_payloads() {
        assert!(matches!(
            decode_render_response(r#"{"content_type": "image/png", "data": "%%%"}"#),
            Err(RenderError::InvalidResponse(_))
        ));
        assert!(matches!(
            decode_render_response(r#"{"content_type": " ", "data": ""}"#),
            Err(RenderError::InvalidResponse(_))
        ));
        assert!(decode_render_response(r#"{"data": ""}"#).is_err());
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(500);
        let truncated = truncate_body(&long);
        assert!(truncated.ends_with("... (truncated)"));
        assert!(truncated.len() < 250);
        assert_eq!(truncate_body("short"), "short");
    }

    #[test]
    fn test_adapters_build_from_endpoint_config() {
        let endpoint = EndpointConfig {
            url: "http://localhost:9000/plan".to_string(),
            timeout_secs: 5,
        };
        assert!(HttpPlanner::new(&endpoint).is_ok());
        assert!(HttpRenderer::new(&endpoint).is_ok());
    }
}

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use infinigpt_config::GatewayConfig;
use infinigpt_core::{
    BotError, BotResult, GatewayClient, GatewayReply, GatewayRequest, ModelInfo,
};
use infinigpt_logging::redact_sensitive_data;

/// Error bodies are cut to this many characters before they are logged.
const MAX_ERROR_BODY: usize = 512;

/// XWiki LLM gateway over HTTP.
///
/// The client enforces its own request timeout on top of the router's turn
/// timeout so that a stuck connection is torn down rather than leaked.
pub struct HttpGateway {
    client: Client,
    endpoint: String,
}

impl HttpGateway {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> BotResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BotError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &GatewayConfig) -> BotResult<Self> {
        Self::new(
            config.endpoint.clone(),
            Duration::from_secs(config.timeout_secs.max(1)),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn models_url(&self) -> String {
        format!("{}/models", self.endpoint)
    }
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_prompt: Option<&'a str>,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    text: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    text: String,
}

#[derive(Deserialize)]
struct ModelListResponse {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    name: String,
    #[serde(default)]
    id: Option<String>,
}

fn completion_body(request: &GatewayRequest) -> CompletionBody<'_> {
    CompletionBody {
        model: &request.model,
        system_prompt: request.system_prompt.as_deref(),
        messages: request
            .messages
            .iter()
            .map(|turn| WireMessage {
                role: turn.role.as_str(),
                text: &turn.text,
            })
            .collect(),
        temperature: request.temperature,
    }
}

fn parse_completion(body: &str) -> BotResult<GatewayReply> {
    let parsed: CompletionResponse = serde_json::from_str(body)
        .map_err(|e| BotError::Gateway(format!("malformed completion response: {e}")))?;
    Ok(GatewayReply {
        text: parsed.text.trim().to_string(),
    })
}

fn parse_models(body: &str) -> BotResult<Vec<ModelInfo>> {
    let parsed: ModelListResponse = serde_json::from_str(body)
        .map_err(|e| BotError::Gateway(format!("malformed model listing: {e}")))?;
    Ok(parsed
        .data
        .into_iter()
        .map(|m| ModelInfo {
            id: m.id.unwrap_or_else(|| m.name.clone()),
            name: m.name,
        })
        .collect())
}

fn status_error(status: StatusCode, body: &str) -> BotError {
    let mut body = redact_sensitive_data(body);
    if body.len() > MAX_ERROR_BODY {
        let cut = (0..=MAX_ERROR_BODY)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        body.truncate(cut);
    }
    BotError::Gateway(format!("gateway returned {status}: {body}"))
}

fn transport_error(err: reqwest::Error) -> BotError {
    BotError::Gateway(redact_sensitive_data(&err.without_url().to_string()))
}

#[async_trait]
impl GatewayClient for HttpGateway {
    async fn complete(&self, request: &GatewayRequest, token: &str) -> BotResult<GatewayReply> {
        let start = Instant::now();
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Sending completion request to gateway"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&completion_body(request))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            let err = status_error(status, &body);
            warn!(status = %status, "Gateway rejected completion request");
            return Err(err);
        }

        let reply = parse_completion(&body)?;
        debug!(
            model = %request.model,
            reply_chars = reply.text.chars().count(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Gateway completion received"
        );
        Ok(reply)
    }

    async fn list_models(&self, token: &str) -> BotResult<Vec<ModelInfo>> {
        let response = self
            .client
            .get(self.models_url())
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        parse_models(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infinigpt_core::Turn;

    fn request() -> GatewayRequest {
        GatewayRequest {
            model: "AI.Models.waise-llama3".into(),
            system_prompt: Some("be brief".into()),
            messages: vec![Turn::user("hi"), Turn::assistant("hello"), Turn::user("again")],
            temperature: 0.5,
        }
    }

    #[test]
    fn body_matches_wire_format() {
        let req = request();
        let json = serde_json::to_value(completion_body(&req)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "AI.Models.waise-llama3",
                "system_prompt": "be brief",
                "messages": [
                    {"role": "user", "text": "hi"},
                    {"role": "assistant", "text": "hello"},
                    {"role": "user", "text": "again"}
                ],
                "temperature": 0.5
            })
        );
    }

    #[test]
    fn stock_mode_omits_system_prompt() {
        let mut req = request();
        req.system_prompt = None;
        let json = serde_json::to_value(completion_body(&req)).unwrap();
        assert!(json.get("system_prompt").is_none());
    }

    #[test]
    fn completion_text_is_trimmed() {
        let reply = parse_completion(r#"{"text": "  hello there\n"}"#).unwrap();
        assert_eq!(reply.text, "hello there");
    }

    #[test]
    fn malformed_completion_is_gateway_error() {
        for body in ["", "not json", r#"{"answer": "x"}"#] {
            assert!(matches!(parse_completion(body), Err(BotError::Gateway(_))));
        }
    }

    #[test]
    fn model_listing_maps_names_to_ids() {
        let models = parse_models(
            r#"{"data": [{"name": "llama", "id": "AI.Models.llama"}, {"name": "bare"}]}"#,
        )
        .unwrap();
        assert_eq!(models[0].id, "AI.Models.llama");
        assert_eq!(models[1].id, "bare");
    }

    #[test]
    fn error_bodies_are_redacted_and_bounded() {
        let body = format!("Authorization: Bearer abc.def.ghi {}", "x".repeat(2000));
        let err = status_error(StatusCode::UNAUTHORIZED, &body);
        let text = err.to_string();
        assert!(!text.contains("abc.def.ghi"));
        assert!(text.len() < MAX_ERROR_BODY + 64);
    }

    #[test]
    fn endpoint_trailing_slash_is_dropped() {
        let gw = HttpGateway::new("https://wiki.example/llm/v1/", Duration::from_secs(5)).unwrap();
        assert_eq!(gw.endpoint(), "https://wiki.example/llm/v1");
        assert_eq!(gw.models_url(), "https://wiki.example/llm/v1/models");
    }
}

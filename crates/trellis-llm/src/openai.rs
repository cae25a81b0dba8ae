use crate::{AgentInvocation, LlmAdapter, LlmError};
use async_trait::async_trait;
use serde_json::{Value, json};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const NO_TEXT_FALLBACK: &str = "Model returned no text output.";

/// Adapter for the OpenAI Responses API.
pub struct OpenAiAdapter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiAdapter {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Builds an adapter from `OPENAI_API_KEY` and optional `OPENAI_BASE_URL`.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key =
            std::env::var("OPENAI_API_KEY").map_err(|_| LlmError::MissingApiKey("OPENAI_API_KEY"))?;
        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Ok(Self::new(api_key, base_url))
    }
}

#[async_trait]
impl LlmAdapter for OpenAiAdapter {
    async fn respond(&self, invocation: &AgentInvocation) -> Result<String, LlmError> {
        let response = self
            .client
            .post(format!("{}/responses", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&build_request_body(invocation))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response.json().await?;
        Ok(extract_output_text(&payload))
    }
}

fn build_request_body(invocation: &AgentInvocation) -> Value {
    let mut body = json!({
        "model": invocation.model,
        "input": [
            {
                "role": "system",
                "content": [{ "type": "input_text", "text": invocation.system_prompt }],
            },
            {
                "role": "user",
                "content": [{ "type": "input_text", "text": invocation.user_content }],
            },
        ],
    });
    if let Some(effort) = invocation.reasoning_effort.as_deref() {
        body["reasoning"] = json!({ "effort": effort });
    }
    if invocation.tools.is_some_and(|tools| tools.web_search) {
        body["tools"] = json!([{ "type": "web_search" }]);
        body["tool_choice"] = json!("auto");
    }
    body
}

/// Pulls the response text out of a Responses API payload.
///
/// Prefers the `output_text` convenience array; falls back to walking
/// `output[].content[]` for `output_text` chunks; a payload with neither
/// yields a fixed placeholder rather than an error.
fn extract_output_text(payload: &Value) -> String {
    if let Some(lines) = payload.get("output_text").and_then(Value::as_array) {
        let joined: Vec<&str> = lines.iter().filter_map(Value::as_str).collect();
        if !joined.is_empty() {
            return joined.join("\n").trim().to_string();
        }
    }

    if let Some(output) = payload.get("output").and_then(Value::as_array) {
        let mut chunks = Vec::new();
        for entry in output {
            if entry.get("type").and_then(Value::as_str) != Some("message") {
                continue;
            }
            let Some(content) = entry.get("content").and_then(Value::as_array) else {
                continue;
            };
            for chunk in content {
                if chunk.get("type").and_then(Value::as_str) == Some("output_text") {
                    if let Some(text) = chunk.get("text").and_then(Value::as_str) {
                        if !text.is_empty() {
                            chunks.push(text);
                        }
                    }
                }
            }
        }
        if !chunks.is_empty() {
            return chunks.join("\n").trim().to_string();
        }
    }

    NO_TEXT_FALLBACK.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolsConfig;

    fn invocation() -> AgentInvocation {
        AgentInvocation {
            system_prompt: "You are a helpful assistant.".to_string(),
            user_content: "hello".to_string(),
            model: "gpt-5".to_string(),
            reasoning_effort: Some("low".to_string()),
            tools: None,
        }
    }

    #[test]
    fn build_request_body_expected_system_and_user_messages() {
        let body = build_request_body(&invocation());
        assert_eq!(body["model"], "gpt-5");
        assert_eq!(body["input"][0]["role"], "system");
        assert_eq!(body["input"][1]["content"][0]["text"], "hello");
        assert_eq!(body["reasoning"]["effort"], "low");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn build_request_body_web_search_expected_tool_entry() {
        let mut invocation = invocation();
        invocation.tools = Some(ToolsConfig { web_search: true });
        let body = build_request_body(&invocation);
        assert_eq!(body["tools"][0]["type"], "web_search");
        assert_eq!(body["tool_choice"], "auto");
    }

    #[test]
    fn build_request_body_no_reasoning_expected_field_absent() {
        let mut invocation = invocation();
        invocation.reasoning_effort = None;
        let body = build_request_body(&invocation);
        assert!(body.get("reasoning").is_none());
    }

    #[test]
    fn extract_output_text_convenience_array_expected_joined() {
        let payload = json!({ "output_text": ["first", "second"] });
        assert_eq!(extract_output_text(&payload), "first\nsecond");
    }

    #[test]
    fn extract_output_text_message_walk_expected_chunks_joined() {
        let payload = json!({
            "output": [
                { "type": "reasoning", "content": [] },
                {
                    "type": "message",
                    "content": [
                        { "type": "output_text", "text": "part one" },
                        { "type": "refusal", "refusal": "n/a" },
                        { "type": "output_text", "text": "part two" },
                    ],
                },
            ],
        });
        assert_eq!(extract_output_text(&payload), "part one\npart two");
    }

    #[test]
    fn extract_output_text_empty_payload_expected_placeholder() {
        assert_eq!(extract_output_text(&json!({})), NO_TEXT_FALLBACK);
        assert_eq!(
            extract_output_text(&json!({ "output": [] })),
            NO_TEXT_FALLBACK
        );
    }
}

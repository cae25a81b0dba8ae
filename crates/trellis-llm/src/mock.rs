use crate::{AgentInvocation, LlmAdapter, LlmError};
use async_trait::async_trait;

/// Deterministic adapter used when no real provider is configured.
///
/// Identical invocations always produce identical text, which keeps the
/// engine testable without network access.
#[derive(Debug, Default)]
pub struct MockLlm;

#[async_trait]
impl LlmAdapter for MockLlm {
    async fn respond(&self, invocation: &AgentInvocation) -> Result<String, LlmError> {
        let prompt = if invocation.user_content.is_empty() {
            "empty prompt"
        } else {
            invocation.user_content.as_str()
        };
        let tool_suffix = if invocation.tools.is_some_and(|tools| tools.web_search) {
            " (web search enabled)"
        } else {
            ""
        };
        Ok(format!(
            "Mock response for \"{prompt}\" using {model}{tool_suffix}.",
            model = invocation.model
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolsConfig;

    fn invocation() -> AgentInvocation {
        AgentInvocation {
            system_prompt: "You are a helpful assistant.".to_string(),
            user_content: "summarize the report".to_string(),
            model: "gpt-5".to_string(),
            reasoning_effort: Some("low".to_string()),
            tools: None,
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn respond_expected_templated_text() {
        let text = MockLlm
            .respond(&invocation())
            .await
            .expect("mock should respond");
        assert_eq!(
            text,
            "Mock response for \"summarize the report\" using gpt-5."
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn respond_empty_prompt_expected_placeholder() {
        let mut invocation = invocation();
        invocation.user_content = String::new();
        let text = MockLlm
            .respond(&invocation)
            .await
            .expect("mock should respond");
        assert_eq!(text, "Mock response for \"empty prompt\" using gpt-5.");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn respond_web_search_enabled_expected_tool_suffix() {
        let mut invocation = invocation();
        invocation.tools = Some(ToolsConfig { web_search: true });
        let text = MockLlm
            .respond(&invocation)
            .await
            .expect("mock should respond");
        assert!(text.ends_with("using gpt-5 (web search enabled)."));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn respond_identical_invocations_expected_identical_text() {
        let first = MockLlm
            .respond(&invocation())
            .await
            .expect("mock should respond");
        let second = MockLlm
            .respond(&invocation())
            .await
            .expect("mock should respond");
        assert_eq!(first, second);
    }
}

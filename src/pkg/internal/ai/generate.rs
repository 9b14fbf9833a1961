use std::sync::Arc;

use ai::{
    chat_completions::{ChatCompletion, ChatCompletionMessage, ChatCompletionRequestBuilder},
    clients::openai::Client,
};
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use standard_error::{Interpolate, StandardError};

use crate::{conf::settings, prelude::Result};

#[async_trait::async_trait]
pub trait GenerateOps {
    async fn structured_query(&self, prompt: &str) -> Result<String>;

    async fn structured_query_inline(
        &self,
        prompt: &str,
        mime_type: &str,
        data: &[u8],
    ) -> Result<String>;
}

#[async_trait::async_trait]
impl GenerateOps for Arc<Client> {
    async fn structured_query(&self, prompt: &str) -> Result<String> {
        let request = ChatCompletionRequestBuilder::default()
            .model(&settings.ai_model)
            .messages(vec![ChatCompletionMessage::User(prompt.into())])
            .build()
            .map_err(|e| StandardError::new("ERR-AI-001").interpolate_err(e.to_string()))?;
        let response = self
            .chat_completions(&request)
            .await
            .map_err(|e| StandardError::new("ERR-AI-002").interpolate_err(e.to_string()))?;
        let answer = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| {
                StandardError::new("ERR-AI-002").interpolate_err("empty completion".into())
            })?;
        Ok(answer)
    }

    // The typed chat messages only carry text parts, so inline payloads go
    // straight to the same OpenAI-compatible endpoint as a data url.
    async fn structured_query_inline(
        &self,
        prompt: &str,
        mime_type: &str,
        data: &[u8],
    ) -> Result<String> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(data);
        let body = json!({
            "model": settings.ai_model,
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": prompt},
                    {"type": "image_url", "image_url": {
                        "url": format!("data:{};base64,{}", mime_type, encoded)
                    }}
                ]
            }]
        });
        let client = reqwest::Client::new();
        let response = client
            .post(format!(
                "{}/chat/completions",
                settings.ai_endpoint.trim_end_matches('/')
            ))
            .bearer_auth(&settings.ai_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(StandardError::new("ERR-AI-002")
                .interpolate_err(format!("{}: {}", status, text)));
        }
        let completion: InlineCompletionResponse = serde_json::from_str(&text)?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                StandardError::new("ERR-AI-002").interpolate_err("empty completion".into())
            })
    }
}

#[derive(Deserialize)]
struct InlineCompletionResponse {
    choices: Vec<InlineChoice>,
}

#[derive(Deserialize)]
struct InlineChoice {
    message: InlineMessage,
}

#[derive(Deserialize)]
struct InlineMessage {
    content: Option<String>,
}

// Remote failures worth retrying: the provider is overloaded, throttling,
// or briefly unavailable. Anything else fails fast.
pub fn is_transient(err: &StandardError) -> bool {
    let msg = err.message.to_lowercase();
    [
        "overloaded",
        "rate limit",
        "rate_limit",
        "429",
        "503",
        "unavailable",
        "resource_exhausted",
        "resource has been exhausted",
        "quota",
        "try again",
    ]
    .iter()
    .any(|marker| msg.contains(marker))
}

pub fn is_quota(err: &StandardError) -> bool {
    let msg = err.message.to_lowercase();
    msg.contains("quota")
        || msg.contains("resource_exhausted")
        || msg.contains("resource has been exhausted")
}

pub fn is_bad_credential(err: &StandardError) -> bool {
    let msg = err.message.to_lowercase();
    msg.contains("401")
        || msg.contains("unauthorized")
        || msg.contains("invalid api key")
        || msg.contains("api key not valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_error(detail: &str) -> StandardError {
        StandardError::new("ERR-AI-002").interpolate_err(detail.into())
    }

    #[test]
    fn overload_and_throttle_errors_are_transient() {
        assert!(is_transient(&model_error("503: the model is overloaded")));
        assert!(is_transient(&model_error("429: Rate limit reached")));
        assert!(is_transient(&model_error("RESOURCE_EXHAUSTED: quota hit")));
        assert!(!is_transient(&model_error("400: invalid request body")));
    }

    #[test]
    fn quota_errors_are_flagged_separately_from_plain_overload() {
        assert!(is_quota(&model_error("429: quota exceeded for this project")));
        assert!(!is_quota(&model_error("503: the model is overloaded")));
    }

    #[test]
    fn credential_rejections_are_not_retried() {
        let err = model_error("401: API key not valid. Please pass a valid key.");
        assert!(is_bad_credential(&err));
        assert!(!is_transient(&err));
    }
}

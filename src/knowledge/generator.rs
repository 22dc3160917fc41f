use crate::config::ProviderConfig;
use crate::error::{GaitError, Result};
use async_openai::types::{
    ChatCompletionRequestMessageArgs, CreateChatCompletionRequestArgs, Role,
};
use async_openai::error::OpenAIError;
use async_openai::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;

pub const SYSTEM_PROMPT: &str = "You are a biomechanics expert.";
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

#[allow(async_fn_in_trait)]
pub trait TextGenerator {
    async fn generate_analysis(&self, prompt: &str) -> Result<String>;
}

/// Chat-style generation: fixed system prompt, analysis prompt as the user turn.
#[derive(Clone)]
pub struct OpenAiGenerator {
    client: Client,
    model: String,
}

impl OpenAiGenerator {
    pub fn new(api_key: &str, model: &str) -> Self {
        OpenAiGenerator {
            client: Client::new().with_api_key(api_key),
            model: model.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.client = self.client.with_api_base(api_base);
        self
    }
}

impl TextGenerator for OpenAiGenerator {
    async fn generate_analysis(&self, prompt: &str) -> Result<String> {
        let openai_error = |e: OpenAIError| GaitError::external("openai", e);

        let start = Instant::now();
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([
                ChatCompletionRequestMessageArgs::default()
                    .role(Role::System)
                    .content(SYSTEM_PROMPT)
                    .build()
                    .map_err(openai_error)?,
                ChatCompletionRequestMessageArgs::default()
                    .role(Role::User)
                    .content(prompt)
                    .build()
                    .map_err(openai_error)?,
            ])
            .build()
            .map_err(openai_error)?;
        info!("send prompt to openai {}, wait for response...", self.model);
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(openai_error)?;
        let analysis = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| GaitError::external("openai", "response has no choices"))?;
        let elapsed = start.elapsed().as_secs_f64();
        info!("query openai spends {}s", elapsed);
        Ok(analysis)
    }
}

/// Single-prompt generation through Gemini's `generateContent`.
#[derive(Clone)]
pub struct GeminiGenerator {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GeminiGenerator {
    pub fn new(api_key: &str, model: &str) -> Self {
        GeminiGenerator {
            client: reqwest::Client::new(),
            api_base: GEMINI_API_BASE.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }
}

impl TextGenerator for GeminiGenerator {
    async fn generate_analysis(&self, prompt: &str) -> Result<String> {
        let gemini_error = |e: String| GaitError::external("gemini", e);

        let start = Instant::now();
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base, self.model
        );
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };
        info!("send prompt to gemini {}, wait for response...", self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| gemini_error(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| gemini_error(e.to_string()))?;
        if !status.is_success() {
            return Err(gemini_error(format!("{} returned {}: {}", url, status, body)));
        }
        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| gemini_error(format!("malformed body: {}", e)))?;
        let analysis = parsed
            .candidates
            .into_iter()
            .find_map(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<String>()
            })
            .ok_or_else(|| gemini_error(format!("response has no candidates: {}", body)))?;
        let elapsed = start.elapsed().as_secs_f64();
        info!("query gemini spends {}s", elapsed);
        Ok(analysis)
    }
}

/// The generation backend, picked once from configuration.
#[derive(Clone)]
pub enum AnalysisProvider {
    OpenAi(OpenAiGenerator),
    Gemini(GeminiGenerator),
}

impl AnalysisProvider {
    pub fn from_config(config: &ProviderConfig) -> Self {
        match config {
            ProviderConfig::OpenAi { api_key, model } => {
                AnalysisProvider::OpenAi(OpenAiGenerator::new(api_key, model))
            }
            ProviderConfig::Gemini { api_key, model } => {
                AnalysisProvider::Gemini(GeminiGenerator::new(api_key, model))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AnalysisProvider::OpenAi(_) => "openai",
            AnalysisProvider::Gemini(_) => "gemini",
        }
    }
}

impl TextGenerator for AnalysisProvider {
    async fn generate_analysis(&self, prompt: &str) -> Result<String> {
        match self {
            AnalysisProvider::OpenAi(g) => g.generate_analysis(prompt).await,
            AnalysisProvider::Gemini(g) => g.generate_analysis(prompt).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn provider_follows_config() {
        let openai = AnalysisProvider::from_config(&ProviderConfig::OpenAi {
            api_key: "sk".to_string(),
            model: "gpt-3.5-turbo".to_string(),
        });
        assert_eq!(openai.name(), "openai");
        let gemini = AnalysisProvider::from_config(&ProviderConfig::Gemini {
            api_key: "gm".to_string(),
            model: "gemini-1.5-flash".to_string(),
        });
        assert_eq!(gemini.name(), "gemini");
    }

    #[tokio::test]
    async fn openai_sends_system_and_user_turns() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("Authorization", "Bearer sk-test")
                .body_contains(SYSTEM_PROMPT)
                .body_contains("analyse me");
            then.status(200).json_body(json!({
                "id": "chatcmpl-1",
                "object": "chat.completion",
                "created": 1700000000,
                "model": "gpt-3.5-turbo",
                "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15},
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "Efficient forefoot runner."},
                    "finish_reason": "stop"
                }]
            }));
        });
        let generator =
            OpenAiGenerator::new("sk-test", "gpt-3.5-turbo").with_api_base(&server.url("/v1"));
        let analysis = generator.generate_analysis("analyse me").await.unwrap();
        m.assert();
        assert_eq!(analysis, "Efficient forefoot runner.");
    }

    #[tokio::test]
    async fn gemini_joins_candidate_parts() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(POST)
                .path("/v1beta/models/gemini-1.5-flash:generateContent")
                .header("x-goog-api-key", "gm-test")
                .json_body(json!({"contents": [{"parts": [{"text": "analyse me"}]}]}));
            then.status(200).json_body(json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "Bouncy "}, {"text": "gait."}]},
                    "finishReason": "STOP"
                }]
            }));
        });
        let generator =
            GeminiGenerator::new("gm-test", "gemini-1.5-flash").with_api_base(&server.base_url());
        let analysis = generator.generate_analysis("analyse me").await.unwrap();
        m.assert();
        assert_eq!(analysis, "Bouncy gait.");
    }

    #[tokio::test]
    async fn gemini_without_candidates_fails() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(200)
                .json_body(json!({"promptFeedback": {"blockReason": "SAFETY"}}));
        });
        let generator =
            GeminiGenerator::new("gm-test", "gemini-1.5-flash").with_api_base(&server.base_url());
        let err = generator.generate_analysis("analyse me").await.unwrap_err();
        match err {
            GaitError::ExternalService { service, message } => {
                assert_eq!(service, "gemini");
                assert!(message.contains("SAFETY"), "{}", message);
            }
            other => panic!("unexpected error variant {:?}", other),
        }
    }

    #[tokio::test]
    async fn gemini_http_error_surfaces() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(403).body("API key not valid");
        });
        let generator =
            GeminiGenerator::new("bad", "gemini-1.5-flash").with_api_base(&server.base_url());
        let err = generator.generate_analysis("analyse me").await.unwrap_err();
        assert!(err.to_string().contains("403"));
    }
}

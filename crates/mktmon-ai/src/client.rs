use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::error::AiError;
use crate::types::{
    ApiErrorBody, ChatMessage, ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse,
    ResponseFormat,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Maximum number of texts per embeddings call.
const EMBED_BATCH_SIZE: usize = 64;

/// Settings for [`AiClient::new`].
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub chat_model: String,
    pub embed_model: String,
    pub timeout_secs: u64,
}

/// Client for an OpenAI-compatible chat + embeddings API.
pub struct AiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    chat_model: String,
    embed_model: String,
}

impl AiClient {
    /// Creates a client from config.
    ///
    /// # Errors
    ///
    /// Returns [`AiError::MissingCredentials`] when no API key is configured,
    /// or [`AiError::Http`] if the HTTP client cannot be constructed.
    pub fn new(config: &AiConfig) -> Result<Self, AiError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or(AiError::MissingCredentials)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            http,
            api_key,
            base_url,
            chat_model: config.chat_model.clone(),
            embed_model: config.embed_model.clone(),
        })
    }

    fn headers(&self) -> Result<HeaderMap, AiError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|_| AiError::MissingCredentials)?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn read_api_error(response: reqwest::Response) -> AiError {
        let status = response.status().as_u16();
        let message = match response.json::<ApiErrorBody>().await {
            Ok(body) => body
                .error
                .map_or_else(|| "unknown error".to_string(), |e| e.message),
            Err(e) => format!("unreadable error body: {e}"),
        };
        AiError::Api { status, message }
    }

    /// One JSON-mode chat completion at temperature 0.
    ///
    /// Returns the model's answer parsed as a JSON value.
    ///
    /// # Errors
    ///
    /// - [`AiError::Api`] if the API rejects the call.
    /// - [`AiError::BadAnswer`] if the answer is empty or not valid JSON.
    /// - [`AiError::Http`] / [`AiError::Deserialize`] on transport or
    ///   envelope failures.
    pub async fn chat_json(
        &self,
        system: &str,
        user: &str,
    ) -> Result<serde_json::Value, AiError> {
        let url = format!("{}/chat/completions", self.base_url);

        let request = ChatRequest {
            model: &self.chat_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.0,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        tracing::debug!(model = %self.chat_model, "chat completion request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::read_api_error(response).await);
        }

        let raw = response.text().await?;
        let parsed: ChatResponse =
            serde_json::from_str(&raw).map_err(|e| AiError::Deserialize {
                context: "chat completion envelope".to_string(),
                source: e,
            })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AiError::BadAnswer("no choices in response".to_string()))?;

        serde_json::from_str(&content)
            .map_err(|e| AiError::BadAnswer(format!("answer is not JSON: {e}")))
    }

    /// Generates embeddings for a batch of texts.
    ///
    /// Texts are batched into groups of 64 per request. Returns one vector
    /// per input text, in the same order.
    ///
    /// # Errors
    ///
    /// Returns [`AiError::Api`] if the API rejects a batch, or
    /// [`AiError::BadAnswer`] if the API returns the wrong number of vectors.
    pub async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AiError> {
        let url = format!("{}/embeddings", self.base_url);
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(EMBED_BATCH_SIZE) {
            let request = EmbeddingRequest {
                model: &self.embed_model,
                input: chunk.to_vec(),
            };

            let response = self
                .http
                .post(&url)
                .headers(self.headers()?)
                .json(&request)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(Self::read_api_error(response).await);
            }

            let raw = response.text().await?;
            let parsed: EmbeddingResponse =
                serde_json::from_str(&raw).map_err(|e| AiError::Deserialize {
                    context: "embeddings envelope".to_string(),
                    source: e,
                })?;

            if parsed.data.len() != chunk.len() {
                return Err(AiError::BadAnswer(format!(
                    "{} embeddings returned for {} inputs",
                    parsed.data.len(),
                    chunk.len()
                )));
            }

            all_embeddings.extend(parsed.data.into_iter().map(|d| d.embedding));
        }

        Ok(all_embeddings)
    }

    /// Convenience wrapper for a single text.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`AiClient::embed`].
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, AiError> {
        let mut vectors = self.embed(&[text]).await?;
        vectors
            .pop()
            .ok_or_else(|| AiError::BadAnswer("no embedding in response".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> AiConfig {
        AiConfig {
            api_key: Some("test-key".to_string()),
            base_url: Some(base_url.to_string()),
            chat_model: "gpt-4o-mini".to_string(),
            embed_model: "text-embedding-3-small".to_string(),
            timeout_secs: 10,
        }
    }

    #[test]
    fn missing_api_key_is_a_typed_error() {
        let config = AiConfig {
            api_key: None,
            base_url: None,
            chat_model: "m".to_string(),
            embed_model: "e".to_string(),
            timeout_secs: 10,
        };
        assert!(matches!(
            AiClient::new(&config),
            Err(AiError::MissingCredentials)
        ));
    }

    #[tokio::test]
    async fn chat_json_parses_model_answer() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "temperature": 0.0,
                "response_format": { "type": "json_object" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [
                    { "message": { "content": "{\"segment_id\": null, \"brand_ids\": []}" } }
                ]
            })))
            .mount(&server)
            .await;

        let client = AiClient::new(&test_config(&server.uri())).expect("client");
        let answer = client.chat_json("system", "user").await.expect("answer");
        assert!(answer["brand_ids"].as_array().is_some_and(Vec::is_empty));
    }

    #[tokio::test]
    async fn chat_json_rejects_non_json_answer() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [ { "message": { "content": "sorry, I cannot" } } ]
            })))
            .mount(&server)
            .await;

        let client = AiClient::new(&test_config(&server.uri())).expect("client");
        let err = client.chat_json("s", "u").await.expect_err("should fail");
        assert!(matches!(err, AiError::BadAnswer(_)));
    }

    #[tokio::test]
    async fn embed_returns_vectors_in_order() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    { "embedding": [0.1, 0.2] },
                    { "embedding": [0.3, 0.4] }
                ]
            })))
            .mount(&server)
            .await;

        let client = AiClient::new(&test_config(&server.uri())).expect("client");
        let vectors = client.embed(&["a", "b"]).await.expect("vectors");
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[1], vec![0.3, 0.4]);
    }

    #[tokio::test]
    async fn embed_count_mismatch_is_bad_answer() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [ { "embedding": [0.1] } ]
            })))
            .mount(&server)
            .await;

        let client = AiClient::new(&test_config(&server.uri())).expect("client");
        let err = client.embed(&["a", "b"]).await.expect_err("should fail");
        assert!(matches!(err, AiError::BadAnswer(_)));
    }

    #[tokio::test]
    async fn api_error_body_is_surfaced() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": { "message": "Incorrect API key provided" }
            })))
            .mount(&server)
            .await;

        let client = AiClient::new(&test_config(&server.uri())).expect("client");
        let err = client.embed(&["a"]).await.expect_err("should fail");
        assert!(
            matches!(err, AiError::Api { status: 401, ref message } if message.contains("Incorrect API key"))
        );
    }
}

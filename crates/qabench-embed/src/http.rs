//! Client for an OpenAI-compatible `/v1/embeddings` service.
//!
//! A DPR-style dual encoder is modelled with two model names on the same
//! endpoint: one for passages, one for questions. Failures of any kind surface
//! as [`Error::Encoder`]; the client never retries.

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use qabench_core::config::EncoderConfig;
use qabench_core::error::{Error, Result};
use qabench_core::traits::Encoder;

use crate::pool::check_widths;

#[derive(Debug)]
pub struct HttpEncoder {
    client: Client,
    endpoint: String,
    passage_model: String,
    query_model: String,
    dim: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    encoding_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl HttpEncoder {
    pub fn new(config: &EncoderConfig) -> Result<Self> {
        if config.dim == 0 { return Err(Error::InvalidConfig("encoder dimension must be greater than zero".to_string())); }
        let query_model = config.query_model.clone().unwrap_or_else(|| config.passage_model.clone());
        info!(endpoint = %config.endpoint, passage_model = %config.passage_model, query_model = %query_model, "initializing HTTP encoder");

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        match std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty()) {
            Some(key) => {
                let value = HeaderValue::from_str(&format!("Bearer {}", key))
                    .map_err(|e| Error::InvalidConfig(format!("invalid API key in {}: {}", config.api_key_env, e)))?;
                headers.insert(AUTHORIZATION, value);
            }
            None => debug!(var = %config.api_key_env, "no API key set; sending unauthenticated requests"),
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, endpoint: config.endpoint.clone(), passage_model: config.passage_model.clone(), query_model, dim: config.dim })
    }

    fn request(&self, model: &str, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() { return Ok(Vec::new()); }
        let request = EmbeddingRequest { model, input: texts.to_vec(), encoding_format: "float" };
        debug!(endpoint = %self.endpoint, model, count = texts.len(), "embedding request");

        let response = self.client.post(&self.endpoint).json(&request).send()
            .map_err(|e| Error::Encoder(format!("HTTP request failed: {}", e)))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);
            warn!(%status, "embedding service returned an error");
            return Err(Error::Encoder(format!("{}: {}", status, message)));
        }

        let mut parsed: EmbeddingResponse = response.json()
            .map_err(|e| Error::Encoder(format!("invalid embedding response: {}", e)))?;
        if parsed.data.len() != texts.len() {
            return Err(Error::Encoder(format!("expected {} embeddings, got {}", texts.len(), parsed.data.len())));
        }
        parsed.data.sort_by_key(|d| d.index);
        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();
        // A bad width from the service is an encoder failure, not a local bug.
        check_widths(&vectors, self.dim).map_err(|e| Error::Encoder(format!("embedding service: {}", e)))?;
        Ok(vectors)
    }
}

impl Encoder for HttpEncoder {
    fn dim(&self) -> usize { self.dim }

    fn encode_passages(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        self.request(&self.passage_model, &refs)
    }

    fn encode_query(&self, text: &str) -> Result<Vec<f32>> {
        self.request(&self.query_model, &[text])?
            .pop()
            .ok_or_else(|| Error::Encoder("empty embedding response".to_string()))
    }
}

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info};

use crate::{error::HarnessError, tokenizer::TokenCounter};

use super::{InferenceSpec, PredictionRequest, PredictionResponse, Predictor};

/// Characters left over by endpoints that wrap or echo the prompt; trimmed
/// from both ends of the generated text.
const STRAY_BOUNDARY_CHARS: &[char] = &['[', '"', ']', '?', '\n'];

/// GET-style transport collaborator. Non-2xx statuses and connect/read
/// timeouts must surface as [`HarnessError::Transport`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        query: &[(String, String)],
        timeout: Duration,
    ) -> Result<String, HarnessError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(
        &self,
        url: &str,
        query: &[(String, String)],
        timeout: Duration,
    ) -> Result<String, HarnessError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| HarnessError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarnessError::Transport(format!(
                "endpoint returned {status}"
            )));
        }

        response
            .text()
            .await
            .map_err(|e| HarnessError::Transport(e.to_string()))
    }
}

/// Predictor backed by a plain REST endpoint that takes the prompt as a
/// query parameter and returns the generated text as the response body.
pub struct RestPredictor {
    endpoint_name: String,
    inference_spec: InferenceSpec,
    counter: Arc<dyn TokenCounter>,
    transport: Box<dyn Transport>,
}

impl RestPredictor {
    pub fn new(
        endpoint_name: String,
        inference_spec: Option<InferenceSpec>,
        counter: Arc<dyn TokenCounter>,
    ) -> Self {
        Self::with_transport(
            endpoint_name,
            inference_spec,
            counter,
            Box::new(HttpTransport::new()),
        )
    }

    pub fn with_transport(
        endpoint_name: String,
        inference_spec: Option<InferenceSpec>,
        counter: Arc<dyn TokenCounter>,
        transport: Box<dyn Transport>,
    ) -> Self {
        let inference_spec = inference_spec.unwrap_or_default();
        info!(
            endpoint = %endpoint_name,
            spec = ?inference_spec,
            "created REST predictor"
        );
        Self {
            endpoint_name,
            inference_spec,
            counter,
            transport,
        }
    }

    /// Builds the outbound query. With `split_input_and_parameters` the
    /// inference parameters travel as one nested JSON field next to the
    /// prompt; otherwise they are merged flat into the query string.
    fn build_query(&self, prompt: &str) -> Vec<(String, String)> {
        let mut query = vec![
            ("sentence".to_string(), prompt.to_string()),
            (
                "timeout".to_string(),
                self.inference_spec.timeout_secs.to_string(),
            ),
        ];
        if let Some(auth) = &self.inference_spec.auth {
            query.push(("auth".to_string(), auth.clone()));
        }

        if let Some(params) = &self.inference_spec.parameters {
            if self.inference_spec.split_input_and_parameters {
                query.push(("parameters".to_string(), params.to_string()));
            } else if let Some(map) = params.as_object() {
                for (key, value) in map {
                    query.push((key.clone(), scalar_to_string(value)));
                }
            } else {
                query.push(("parameters".to_string(), params.to_string()));
            }
        }
        query
    }
}

#[async_trait]
impl Predictor for RestPredictor {
    async fn get_prediction(
        &self,
        request: &PredictionRequest,
    ) -> Result<PredictionResponse, HarnessError> {
        let prompt = request.inputs.as_str();
        if prompt.trim().is_empty() {
            return Err(HarnessError::BadRequest(
                "payload field 'inputs' must not be empty".into(),
            ));
        }

        // Counted before the call so tokenizer time never lands in latency.
        let prompt_tokens = self.counter.count_tokens(prompt)?;

        let timeout = Duration::from_secs(self.inference_spec.timeout_secs);
        let query = self.build_query(prompt);

        let start = Instant::now();
        let outcome = self.transport.fetch(&self.endpoint_name, &query, timeout).await;
        let latency = start.elapsed().as_secs_f64();

        match outcome {
            Ok(full_output) => {
                let generated_text = clean_generated_text(&full_output, prompt);
                let completion_tokens = self.counter.count_tokens(&generated_text)?;
                Ok(PredictionResponse {
                    generated_text: Some(generated_text),
                    latency: Some(latency),
                    prompt_tokens: Some(prompt_tokens),
                    completion_tokens: Some(completion_tokens),
                })
            }
            Err(err) => {
                error!(
                    endpoint = %self.endpoint_name,
                    prompt_tokens,
                    %err,
                    "prediction request failed"
                );
                Ok(PredictionResponse {
                    generated_text: None,
                    latency: None,
                    prompt_tokens: Some(prompt_tokens),
                    completion_tokens: None,
                })
            }
        }
    }

    fn endpoint_name(&self) -> &str {
        &self.endpoint_name
    }

    fn inference_parameters(&self) -> Option<&Value> {
        self.inference_spec.parameters.as_ref()
    }
}

/// Strips the echoed prompt as an exact leading prefix, at most once, then
/// trims stray boundary characters. No fuzzy matching is attempted; a
/// paraphrased or re-tokenized echo passes through unchanged.
fn clean_generated_text(full_output: &str, prompt: &str) -> String {
    let without_echo = full_output.strip_prefix(prompt).unwrap_or(full_output);
    without_echo.trim_matches(STRAY_BOUNDARY_CHARS).to_string()
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

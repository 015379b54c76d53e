mod rest;

pub use rest::{HttpTransport, RestPredictor, Transport};

use std::{fs, path::Path, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::HarnessError,
    pricing::{self, PricingTable},
    tokenizer::TokenCounter,
};

/// One prediction payload. `inputs` carries the prompt text; any further
/// fields are backend-specific and passed through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub inputs: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Outcome of one prediction call. `None` means the measurement failed and
/// is deliberately distinct from a legitimate zero.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PredictionResponse {
    pub generated_text: Option<String>,
    /// Wall-clock seconds around the network call only.
    pub latency: Option<f64>,
    pub prompt_tokens: Option<usize>,
    pub completion_tokens: Option<usize>,
}

/// Per-backend request configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceSpec {
    pub split_input_and_parameters: bool,
    #[serde(rename = "timeout")]
    pub timeout_secs: u64,
    pub auth: Option<String>,
    pub parameters: Option<Value>,
}

impl Default for InferenceSpec {
    fn default() -> Self {
        Self {
            split_input_and_parameters: false,
            timeout_secs: 180,
            auth: None,
            parameters: None,
        }
    }
}

pub fn load_inference_spec_from_path(path: &Path) -> Result<InferenceSpec, HarnessError> {
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw)
        .map_err(|e| HarnessError::Config(format!("invalid inference spec file: {e}")))
}

/// Capability shared by all predictor backends. Each call is independent;
/// implementations hold only their construction-time configuration.
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Runs one prediction. Transport failures are recovered into a response
    /// with absent fields; contract violations and tokenizer failures
    /// propagate as errors.
    async fn get_prediction(
        &self,
        request: &PredictionRequest,
    ) -> Result<PredictionResponse, HarnessError>;

    fn endpoint_name(&self) -> &str;

    fn inference_parameters(&self) -> Option<&Value>;

    /// Cost of one experiment run. Token counts are unused by instance-based
    /// pricing but stay in the signature for token-priced backends.
    fn calculate_cost(
        &self,
        instance_type: &str,
        pricing: &PricingTable,
        duration_secs: f64,
        _prompt_tokens: usize,
        _completion_tokens: usize,
    ) -> Option<f64> {
        pricing::instance_cost(pricing, instance_type, duration_secs)
    }
}

/// Builds the predictor variant named by the configuration.
pub fn create_predictor(
    kind: &str,
    endpoint_name: &str,
    inference_spec: Option<InferenceSpec>,
    counter: Arc<dyn TokenCounter>,
) -> Result<Box<dyn Predictor>, HarnessError> {
    match kind {
        "rest" => Ok(Box::new(RestPredictor::new(
            endpoint_name.to_string(),
            inference_spec,
            counter,
        ))),
        other => Err(HarnessError::BadRequest(format!(
            "unknown predictor kind: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::HeuristicCounter;

    #[test]
    fn payload_without_inputs_is_rejected() {
        let result = serde_json::from_str::<PredictionRequest>(r#"{"max_tokens": 64}"#);
        assert!(result.is_err());
    }

    #[test]
    fn payload_extra_fields_are_preserved() {
        let request: PredictionRequest =
            serde_json::from_str(r#"{"inputs": "hello", "temperature": 0.7}"#).unwrap();
        assert_eq!(request.inputs, "hello");
        assert!(request.extra.contains_key("temperature"));
    }

    #[test]
    fn inference_spec_defaults() {
        let spec: InferenceSpec = serde_json::from_str("{}").unwrap();
        assert!(!spec.split_input_and_parameters);
        assert_eq!(spec.timeout_secs, 180);
        assert!(spec.auth.is_none());
        assert!(spec.parameters.is_none());
    }

    #[test]
    fn factory_rejects_unknown_kind() {
        let result = create_predictor(
            "sagemaker",
            "http://localhost:8080/generate",
            None,
            Arc::new(HeuristicCounter),
        );
        assert!(matches!(result, Err(HarnessError::BadRequest(_))));
    }
}

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use endpoint_bench::{
    HarnessError, InferenceSpec, PredictionRequest,
    benchmark::{self, run_benchmark},
    create_predictor,
    predictor::{RestPredictor, Transport},
    pricing::{PricingTable, PricingTiers, instance_cost},
    tokenizer::HeuristicCounter,
};

/// Echoes the prompt back followed by a fixed completion, the way a naive
/// generation endpoint does.
struct EchoTransport {
    completion: &'static str,
    fail_on: Option<&'static str>,
}

#[async_trait]
impl Transport for EchoTransport {
    async fn fetch(
        &self,
        _url: &str,
        query: &[(String, String)],
        _timeout: Duration,
    ) -> Result<String, HarnessError> {
        let sentence = query
            .iter()
            .find(|(k, _)| k == "sentence")
            .map(|(_, v)| v.as_str())
            .unwrap_or_default();
        if self.fail_on == Some(sentence) {
            return Err(HarnessError::Transport("read timeout".into()));
        }
        Ok(format!("{sentence}{}", self.completion))
    }
}

fn rest_predictor(transport: EchoTransport) -> RestPredictor {
    RestPredictor::with_transport(
        "http://localhost:9000/infer".to_string(),
        Some(InferenceSpec::default()),
        Arc::new(HeuristicCounter),
        Box::new(transport),
    )
}

fn payload(inputs: &str) -> PredictionRequest {
    serde_json::from_str(&serde_json::json!({ "inputs": inputs }).to_string()).unwrap()
}

#[tokio::test]
async fn benchmark_over_mixed_outcomes() {
    let predictor = rest_predictor(EchoTransport {
        completion: "[a short generated answer]",
        fail_on: Some("this one times out"),
    });

    let samples = vec![
        payload("what is the capital of france"),
        payload("this one times out"),
        payload("name three prime numbers"),
    ];

    let report = run_benchmark(&predictor, samples, Duration::from_secs(20))
        .await
        .expect("benchmark should tolerate transport failures");

    assert_eq!(report.aggregate.samples, 3);
    assert_eq!(report.aggregate.failures, 1);

    let failed = &report.samples[1].response;
    assert_eq!(failed.prompt_tokens, Some(4));
    assert!(failed.latency.is_none());
    assert!(failed.completion_tokens.is_none());

    let ok = &report.samples[0].response;
    assert_eq!(ok.generated_text.as_deref(), Some("a short generated answer"));
    assert_eq!(ok.completion_tokens, Some(4));
    assert!(ok.latency.unwrap() >= 0.0);
}

#[tokio::test]
async fn benchmark_rejects_empty_sample_set() {
    let predictor = rest_predictor(EchoTransport {
        completion: "",
        fail_on: None,
    });
    let result = run_benchmark(&predictor, vec![], Duration::from_secs(20)).await;
    assert!(matches!(result, Err(HarnessError::BadRequest(_))));
}

#[test]
fn factory_selects_backend_by_kind() {
    let counter = Arc::new(HeuristicCounter);

    let rest = create_predictor("rest", "http://localhost:9000/infer", None, counter.clone());
    assert!(rest.is_ok());
    assert_eq!(rest.unwrap().endpoint_name(), "http://localhost:9000/infer");

    let unknown = create_predictor("managed", "arn:endpoint", None, counter);
    assert!(matches!(unknown, Err(HarnessError::BadRequest(_))));
}

#[test]
fn cost_model_end_to_end() {
    let mut instance_based = std::collections::HashMap::new();
    instance_based.insert("ml.g5.xlarge".to_string(), 3600.0);
    let pricing = PricingTable {
        pricing: PricingTiers { instance_based },
    };

    assert_eq!(instance_cost(&pricing, "ml.g5.xlarge", 1.0), Some(1.0));
    assert_eq!(instance_cost(&pricing, "ml.m5.large", 1.0), None);
}

#[tokio::test]
async fn results_csv_keeps_absent_cells_empty() {
    let predictor = rest_predictor(EchoTransport {
        completion: " ok",
        fail_on: Some("fails"),
    });
    let samples = vec![payload("works fine"), payload("fails")];
    let report = run_benchmark(&predictor, samples, Duration::from_secs(20))
        .await
        .unwrap();

    let out = std::env::temp_dir().join(format!("endpoint_bench_results_{}.csv", std::process::id()));
    benchmark::write_results_csv(&out, &report).unwrap();
    let written = std::fs::read_to_string(&out).unwrap();
    std::fs::remove_file(&out).ok();

    let mut lines = written.lines();
    assert_eq!(
        lines.next(),
        Some("sample,prompt_tokens,completion_tokens,latency_s")
    );
    let first = lines.next().unwrap();
    assert!(first.starts_with("1,2,1,"));
    let second = lines.next().unwrap();
    // failed sample: prompt tokens measured, everything else absent
    assert_eq!(second, "2,1,,");
}

use std::{fmt::Display, fs, path::Path, time::Duration};

use serde::Serialize;
use tracing::info;

use crate::{
    error::HarnessError,
    predictor::{PredictionRequest, PredictionResponse, Predictor},
};

#[derive(Debug, Clone, Serialize)]
pub struct SampleReport {
    pub inputs: String,
    pub response: PredictionResponse,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregateMetrics {
    pub samples: usize,
    pub failures: usize,
    pub error_rate: f64,
    pub avg_latency_s: Option<f64>,
    pub avg_prompt_tokens: Option<f64>,
    pub avg_completion_tokens: Option<f64>,
    pub total_prompt_tokens: usize,
    pub total_completion_tokens: usize,
    /// Sum of measured latencies; the duration fed into the cost model.
    pub total_measured_duration_s: f64,
    pub transactions_per_minute: Option<f64>,
    pub within_latency_budget_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    pub samples: Vec<SampleReport>,
    pub aggregate: AggregateMetrics,
}

/// Drives the predictor over every sample, one call at a time. A transport
/// failure shows up as a sample with absent measurements, not as an error;
/// only contract violations abort the run.
pub async fn run_benchmark(
    predictor: &dyn Predictor,
    samples: Vec<PredictionRequest>,
    latency_budget: Duration,
) -> Result<BenchmarkReport, HarnessError> {
    if samples.is_empty() {
        return Err(HarnessError::BadRequest(
            "at least one payload sample is required".into(),
        ));
    }

    let mut reports = Vec::with_capacity(samples.len());

    for request in samples {
        let response = predictor.get_prediction(&request).await?;
        reports.push(SampleReport {
            inputs: request.inputs,
            response,
        });
    }

    let aggregate = summarize(&reports, latency_budget);
    info!(
        samples = aggregate.samples,
        failures = aggregate.failures,
        "benchmark pass finished"
    );

    Ok(BenchmarkReport {
        samples: reports,
        aggregate,
    })
}

pub fn load_payloads_from_path(path: &Path) -> Result<Vec<PredictionRequest>, HarnessError> {
    let raw = fs::read_to_string(path)?;
    let mut samples = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let request: PredictionRequest = serde_json::from_str(line).map_err(|e| {
            HarnessError::BadRequest(format!("payload line {}: {e}", idx + 1))
        })?;
        samples.push(request);
    }
    Ok(samples)
}

pub fn fallback_payloads() -> Vec<PredictionRequest> {
    let prompts = [
        "Explain what drives the cost of hosting a large language model endpoint.",
        "Summarize the rust borrow checker in one sentence.",
        "Write a haiku about measuring inference latency.",
    ];
    prompts
        .iter()
        .map(|prompt| PredictionRequest {
            inputs: prompt.to_string(),
            extra: serde_json::Map::new(),
        })
        .collect()
}

/// One row per sample; absent measurements become empty cells so a failed
/// call is never mistaken for a zero.
pub fn write_results_csv(path: &Path, report: &BenchmarkReport) -> Result<(), HarnessError> {
    let mut out = String::from("sample,prompt_tokens,completion_tokens,latency_s\n");
    for (idx, sample) in report.samples.iter().enumerate() {
        let response = &sample.response;
        out.push_str(&format!(
            "{},{},{},{}\n",
            idx + 1,
            csv_cell(response.prompt_tokens),
            csv_cell(response.completion_tokens),
            csv_cell(response.latency),
        ));
    }
    fs::write(path, out)?;
    Ok(())
}

fn csv_cell<T: Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn summarize(reports: &[SampleReport], latency_budget: Duration) -> AggregateMetrics {
    let samples = reports.len();
    let failures = reports
        .iter()
        .filter(|r| r.response.latency.is_none())
        .count();
    let error_rate = if samples == 0 {
        0.0
    } else {
        failures as f64 / samples as f64
    };

    let latencies: Vec<f64> = reports.iter().filter_map(|r| r.response.latency).collect();
    let total_measured_duration_s: f64 = latencies.iter().sum();
    let avg_latency_s = mean(latencies.iter().copied());

    let avg_prompt_tokens = mean(
        reports
            .iter()
            .filter_map(|r| r.response.prompt_tokens)
            .map(|t| t as f64),
    );
    let avg_completion_tokens = mean(
        reports
            .iter()
            .filter_map(|r| r.response.completion_tokens)
            .map(|t| t as f64),
    );

    let total_prompt_tokens: usize = reports.iter().filter_map(|r| r.response.prompt_tokens).sum();
    let total_completion_tokens: usize = reports
        .iter()
        .filter_map(|r| r.response.completion_tokens)
        .sum();

    let transactions_per_minute = if total_measured_duration_s > 0.0 {
        Some(latencies.len() as f64 / (total_measured_duration_s / 60.0))
    } else {
        None
    };

    let within_latency_budget_rate = if latencies.is_empty() {
        None
    } else {
        let budget = latency_budget.as_secs_f64();
        let within = latencies.iter().filter(|&&l| l <= budget).count();
        Some(within as f64 / latencies.len() as f64)
    };

    AggregateMetrics {
        samples,
        failures,
        error_rate,
        avg_latency_s,
        avg_prompt_tokens,
        avg_completion_tokens,
        total_prompt_tokens,
        total_completion_tokens,
        total_measured_duration_s,
        transactions_per_minute,
        within_latency_budget_rate,
    }
}

fn mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let mut count = 0usize;
    let mut acc = 0.0;
    for value in values {
        count += 1;
        acc += value;
    }
    if count == 0 { None } else { Some(acc / count as f64) }
}

use std::sync::Arc;

use chrono::Local;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use endpoint_bench::{
    HarnessConfig, RunPaths, benchmark, create_predictor,
    predictor::load_inference_spec_from_path,
    pricing,
    tokenizer::{HeuristicCounter, HfTokenCounter, TokenCounter},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = HarnessConfig::from_env()?;
    tracing::info!(
        endpoint = %config.endpoint_url,
        kind = %config.predictor_kind,
        "starting benchmark run"
    );

    let paths = RunPaths::derive(&config, Local::now());
    paths.ensure_dirs()?;

    let counter: Arc<dyn TokenCounter> = match config.tokenizer_path.as_deref() {
        Some(path) => Arc::new(HfTokenCounter::from_file(path)?),
        None => Arc::new(HeuristicCounter),
    };

    let inference_spec = config
        .inference_spec_path
        .as_deref()
        .map(load_inference_spec_from_path)
        .transpose()?;

    let predictor = create_predictor(
        &config.predictor_kind,
        &config.endpoint_url,
        inference_spec,
        counter,
    )?;

    let payload_path = config
        .payload_path
        .clone()
        .unwrap_or_else(|| paths.payload_path.clone());
    let samples = if payload_path.exists() {
        benchmark::load_payloads_from_path(&payload_path)?
    } else {
        tracing::info!(path = %payload_path.display(), "no payload file, using fallback prompts");
        benchmark::fallback_payloads()
    };
    tracing::info!(count = samples.len(), "running benchmark");

    let report = benchmark::run_benchmark(predictor.as_ref(), samples, config.latency_budget).await?;

    benchmark::write_results_csv(&paths.results_path, &report)?;
    tracing::info!(results = %paths.results_path.display(), "wrote per-sample results");

    if let Some(path) = config.pricing_path.as_deref() {
        let pricing = pricing::load_pricing_from_path(path)?;
        let aggregate = &report.aggregate;
        match predictor.calculate_cost(
            &config.instance_type,
            &pricing,
            aggregate.total_measured_duration_s,
            aggregate.total_prompt_tokens,
            aggregate.total_completion_tokens,
        ) {
            Some(cost) => {
                tracing::info!(instance_type = %config.instance_type, cost, "experiment cost")
            }
            None => tracing::warn!(
                instance_type = %config.instance_type,
                "experiment cost unavailable"
            ),
        }
    }

    tracing::info!(aggregate = ?report.aggregate, "benchmark complete");

    Ok(())
}

fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,reqwest=warn".into());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

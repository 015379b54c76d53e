use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::{DateTime, Local};

/// Immutable harness configuration, built once at startup and passed by
/// reference to collaborators.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub run_name: String,
    pub account_id: String,
    pub data_prefix: String,
    pub prompts_prefix: String,
    pub endpoint_url: String,
    pub predictor_kind: String,
    pub instance_type: String,
    pub latency_budget: Duration,
    pub pricing_path: Option<PathBuf>,
    pub payload_path: Option<PathBuf>,
    pub tokenizer_path: Option<PathBuf>,
    pub inference_spec_path: Option<PathBuf>,
}

impl HarnessConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let run_name = env::var("RUN_NAME").unwrap_or_else(|_| "endpoint-bench".to_string());
        let account_id = env::var("ACCOUNT_ID").unwrap_or_else(|_| "local".to_string());

        let data_prefix = env::var("DATA_PREFIX").unwrap_or_else(|_| "data".to_string());
        let prompts_prefix = env::var("PROMPTS_PREFIX").unwrap_or_else(|_| "prompts".to_string());

        let endpoint_url = env::var("ENDPOINT_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8080/generate".to_string());
        let predictor_kind = env::var("PREDICTOR_KIND").unwrap_or_else(|_| "rest".to_string());
        let instance_type =
            env::var("INSTANCE_TYPE").unwrap_or_else(|_| "ml.g5.xlarge".to_string());

        let latency_budget = env::var("LATENCY_BUDGET_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(20));

        let pricing_path = env::var("PRICING_PATH").ok().map(PathBuf::from);
        let payload_path = env::var("PAYLOAD_PATH").ok().map(PathBuf::from);
        let tokenizer_path = env::var("TOKENIZER_PATH").ok().map(PathBuf::from);
        let inference_spec_path = env::var("INFERENCE_SPEC_PATH").ok().map(PathBuf::from);

        Ok(Self {
            run_name,
            account_id,
            data_prefix,
            prompts_prefix,
            endpoint_url,
            predictor_kind,
            instance_type,
            latency_budget,
            pricing_path,
            payload_path,
            tokenizer_path,
            inference_spec_path,
        })
    }
}

/// Per-run directory layout, keyed by the run name, the account identity and
/// the startup timestamp. Derived once; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub per_account_dir: PathBuf,
    pub data_dir: PathBuf,
    pub prompts_dir: PathBuf,
    pub metrics_dir: PathBuf,
    pub metrics_per_inference_dir: PathBuf,
    pub metrics_per_chunk_dir: PathBuf,
    pub models_dir: PathBuf,
    pub endpoint_list_path: PathBuf,
    pub payload_path: PathBuf,
    pub results_path: PathBuf,
}

impl RunPaths {
    pub fn derive(config: &HarnessConfig, started_at: DateTime<Local>) -> Self {
        let per_account_dir =
            PathBuf::from(format!("{}-{}", config.run_name, config.account_id));
        let data_dir = per_account_dir.join(&config.data_prefix);
        let prompts_dir = data_dir.join(&config.prompts_prefix);

        // Minute resolution so repeated runs land in distinct metric trees.
        let stamp = started_at.format("%Y/%m/%d/%H/%M").to_string();
        let metrics_dir = data_dir.join("metrics").join(&stamp).join(&config.run_name);
        let metrics_per_inference_dir = metrics_dir.join("per_inference");
        let metrics_per_chunk_dir = metrics_dir.join("per_chunk");

        let models_dir = data_dir.join("models").join(&config.run_name);

        let endpoint_list_path = models_dir.join("endpoints.json");
        let payload_path = prompts_dir.join("payload.jsonl");
        let results_path = metrics_dir.join("results.csv");

        Self {
            per_account_dir,
            data_dir,
            prompts_dir,
            metrics_dir,
            metrics_per_inference_dir,
            metrics_per_chunk_dir,
            models_dir,
            endpoint_list_path,
            payload_path,
            results_path,
        }
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        let dirs: [&Path; 6] = [
            &self.data_dir,
            &self.prompts_dir,
            &self.metrics_dir,
            &self.metrics_per_inference_dir,
            &self.metrics_per_chunk_dir,
            &self.models_dir,
        ];
        for dir in dirs {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_config() -> HarnessConfig {
        HarnessConfig {
            run_name: "llama2-demo".to_string(),
            account_id: "acct-42".to_string(),
            data_prefix: "data".to_string(),
            prompts_prefix: "prompts".to_string(),
            endpoint_url: "http://localhost:9000/infer".to_string(),
            predictor_kind: "rest".to_string(),
            instance_type: "ml.g5.xlarge".to_string(),
            latency_budget: Duration::from_secs(20),
            pricing_path: None,
            payload_path: None,
            tokenizer_path: None,
            inference_spec_path: None,
        }
    }

    #[test]
    fn run_paths_embed_account_and_timestamp() {
        let config = test_config();
        let started_at = Local.with_ymd_and_hms(2024, 3, 7, 14, 5, 0).unwrap();
        let paths = RunPaths::derive(&config, started_at);

        assert_eq!(paths.per_account_dir, PathBuf::from("llama2-demo-acct-42"));
        assert_eq!(
            paths.metrics_dir,
            PathBuf::from("llama2-demo-acct-42/data/metrics/2024/03/07/14/05/llama2-demo")
        );
        assert_eq!(
            paths.payload_path,
            PathBuf::from("llama2-demo-acct-42/data/prompts/payload.jsonl")
        );
        assert!(paths.results_path.ends_with("results.csv"));
    }
}

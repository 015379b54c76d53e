pub mod benchmark;
pub mod config;
pub mod error;
pub mod predictor;
pub mod pricing;
pub mod tokenizer;

pub use benchmark::{AggregateMetrics, BenchmarkReport, run_benchmark};
pub use config::{HarnessConfig, RunPaths};
pub use error::HarnessError;
pub use predictor::{
    InferenceSpec, PredictionRequest, PredictionResponse, Predictor, create_predictor,
};
pub use pricing::PricingTable;

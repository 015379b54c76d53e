use std::{collections::HashMap, fs, path::Path};

use serde::Deserialize;
use tracing::{error, info};

use crate::error::HarnessError;

/// Hourly rates per compute instance type, as loaded from the pricing file.
#[derive(Debug, Clone, Deserialize)]
pub struct PricingTable {
    pub pricing: PricingTiers,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricingTiers {
    pub instance_based: HashMap<String, f64>,
}

pub fn load_pricing_from_path(path: &Path) -> Result<PricingTable, HarnessError> {
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw)
        .map_err(|e| HarnessError::Config(format!("invalid pricing file: {e}")))
}

/// Converts an hourly instance rate to the cost of `duration_secs` of use.
///
/// An instance type missing from the table yields `None` so callers must
/// handle the gap explicitly; it never panics and never propagates.
pub fn instance_cost(
    pricing: &PricingTable,
    instance_type: &str,
    duration_secs: f64,
) -> Option<f64> {
    match pricing.pricing.instance_based.get(instance_type).copied() {
        Some(hourly_rate) => {
            info!(instance_type, hourly_rate, "found hourly rate");
            Some((hourly_rate / 3600.0) * duration_secs)
        }
        None => {
            error!(instance_type, "no hourly rate in pricing table");
            None
        }
    }
}

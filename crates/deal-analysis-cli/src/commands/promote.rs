use clap::Args;
use serde_json::Value;

use deal_analysis_core::sensitivity::{self, PromoteSensitivityInput};
use deal_analysis_core::waterfall::{self, PromoteInput};

use crate::input;

/// Arguments for GP/LP promote waterfall
#[derive(Args)]
pub struct PromoteArgs {
    /// Path to JSON/YAML input file with `base`, `promote` and optional `structure`
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_promote(args: PromoteArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: PromoteInput = input::load(args.input.as_deref(), "promote waterfall")?;
    let result = waterfall::calculate_promote_for_structure(&request)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for promote sensitivity
#[derive(Args)]
pub struct PromoteSensitivityArgs {
    /// Path to JSON/YAML input file with `base`, `promote`, optional `structure` and `axes`
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_promote_sensitivity(
    args: PromoteSensitivityArgs,
) -> Result<Value, Box<dyn std::error::Error>> {
    let request: PromoteSensitivityInput =
        input::load(args.input.as_deref(), "promote sensitivity")?;
    let result = sensitivity::calculate_promote_sensitivity(&request)?;
    Ok(serde_json::to_value(result)?)
}

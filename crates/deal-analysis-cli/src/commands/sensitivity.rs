use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use deal_analysis_core::sensitivity::{self, DealSensitivityInput};

use crate::input;

/// Arguments for exit cap rate x rent growth sensitivity
#[derive(Args)]
pub struct SensitivityArgs {
    /// Path to JSON/YAML input file with `base`, `parameters` and optional `axes`
    #[arg(long)]
    pub input: Option<String>,

    /// Exit cap rate offsets (comma-separated, e.g. "-0.01,0,0.01")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub cap_offsets: Option<Vec<Decimal>>,

    /// Rent growth offsets (comma-separated, e.g. "-0.02,0,0.02")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub growth_offsets: Option<Vec<Decimal>>,
}

pub fn run_sensitivity(args: SensitivityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut request: DealSensitivityInput = input::load(args.input.as_deref(), "sensitivity")?;
    if let Some(offsets) = args.cap_offsets {
        request.axes.exit_cap_offsets = offsets;
    }
    if let Some(offsets) = args.growth_offsets {
        request.axes.rent_growth_offsets = offsets;
    }

    let result =
        sensitivity::analyze_deal_sensitivity(&request.base, &request.parameters, &request.axes)?;
    Ok(serde_json::to_value(result)?)
}

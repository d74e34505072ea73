use clap::Args;
use serde_json::{Map, Value};

use deal_analysis_core::comparison::{self, ComparisonInput};
use deal_analysis_core::projection::DealInputsBase;
use deal_analysis_core::structures::{self, default_structure_parameters, AnalyzeInput, StructureKind};

use crate::input;

/// Arguments for default structure parameters
#[derive(Args)]
pub struct DefaultsArgs {
    /// Path to base deal inputs (JSON or YAML)
    #[arg(long)]
    pub input: Option<String>,

    /// Structure to build defaults for; every structure when omitted
    #[arg(long)]
    pub kind: Option<StructureKind>,
}

pub fn run_defaults(args: DefaultsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let base: DealInputsBase = input::load(args.input.as_deref(), "default parameters")?;

    match args.kind {
        Some(kind) => Ok(serde_json::to_value(default_structure_parameters(kind, &base))?),
        None => {
            let mut all = Map::new();
            for kind in StructureKind::ALL {
                all.insert(
                    kind.as_str().to_string(),
                    serde_json::to_value(default_structure_parameters(kind, &base))?,
                );
            }
            Ok(Value::Object(all))
        }
    }
}

/// Arguments for single-structure analysis
#[derive(Args)]
pub struct AnalyzeArgs {
    /// Path to JSON/YAML input file with `base` and optional `parameters` / `kind`
    #[arg(long)]
    pub input: Option<String>,

    /// Structure to analyze; its defaults are used when the input has no `parameters`
    #[arg(long)]
    pub kind: Option<StructureKind>,
}

pub fn run_analyze(args: AnalyzeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut request: AnalyzeInput = input::load(args.input.as_deref(), "structure analysis")?;
    if args.kind.is_some() {
        request.kind = args.kind;
    }
    let params = request.resolve_parameters()?;
    let result = structures::analyze_structure(&request.base, &params)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for side-by-side structure comparison
#[derive(Args)]
pub struct CompareArgs {
    /// Path to JSON/YAML input file with `base`, optional `kinds` and `overrides`
    #[arg(long)]
    pub input: Option<String>,

    /// Structures to compare (comma-separated); replaces `kinds` from the input
    #[arg(long, value_delimiter = ',')]
    pub kinds: Option<Vec<StructureKind>>,
}

pub fn run_compare(args: CompareArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut request: ComparisonInput = input::load(args.input.as_deref(), "comparison")?;
    if let Some(kinds) = args.kinds {
        request.kinds = kinds;
    }
    let result = comparison::compare_structures(&request.base, &request.kinds, &request.overrides)?;
    Ok(serde_json::to_value(result)?)
}

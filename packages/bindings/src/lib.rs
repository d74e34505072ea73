use napi::Result as NapiResult;
use napi_derive::napi;
use serde::Deserialize;

use deal_analysis_core::comparison::{self, ComparisonInput};
use deal_analysis_core::projection::DealInputsBase;
use deal_analysis_core::sensitivity::{self, DealSensitivityInput, PromoteSensitivityInput};
use deal_analysis_core::structures::{self, AnalyzeInput, StructureKind};
use deal_analysis_core::waterfall::{self, PromoteInput};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

#[derive(Deserialize)]
struct DefaultsInput {
    base: DealInputsBase,
    kind: StructureKind,
}

// ---------------------------------------------------------------------------
// Structures
// ---------------------------------------------------------------------------

#[napi]
pub fn default_parameters(input_json: String) -> NapiResult<String> {
    let input: DefaultsInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let params = structures::default_structure_parameters(input.kind, &input.base);
    serde_json::to_string(&params).map_err(to_napi_error)
}

#[napi]
pub fn analyze_structure(input_json: String) -> NapiResult<String> {
    let input: AnalyzeInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let params = input.resolve_parameters().map_err(to_napi_error)?;
    let output = structures::analyze_structure(&input.base, &params).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn compare_structures(input_json: String) -> NapiResult<String> {
    let input: ComparisonInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = comparison::compare_structures(&input.base, &input.kinds, &input.overrides)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Promote
// ---------------------------------------------------------------------------

#[napi]
pub fn calculate_promote(input_json: String) -> NapiResult<String> {
    let input: PromoteInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = waterfall::calculate_promote_for_structure(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn calculate_promote_sensitivity(input_json: String) -> NapiResult<String> {
    let input: PromoteSensitivityInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = sensitivity::calculate_promote_sensitivity(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn analyze_deal_sensitivity(input_json: String) -> NapiResult<String> {
    let input: DealSensitivityInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = sensitivity::analyze_deal_sensitivity(&input.base, &input.parameters, &input.axes)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

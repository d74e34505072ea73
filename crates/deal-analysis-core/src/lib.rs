pub mod amortization;
pub mod error;
pub mod projection;
pub mod structures;
pub mod time_value;
pub mod types;
pub mod waterfall;

#[cfg(feature = "comparison")]
pub mod comparison;

#[cfg(feature = "sensitivity")]
pub mod sensitivity;

pub use error::DealAnalysisError;
pub use types::*;

/// Standard result type for all deal-analysis operations
pub type DealResult<T> = Result<T, DealAnalysisError>;

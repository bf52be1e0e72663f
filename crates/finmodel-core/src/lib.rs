pub mod assumptions;
pub mod error;
pub mod financials;
pub mod time_value;
pub mod types;

#[cfg(feature = "projection")]
pub mod projection;

#[cfg(feature = "valuation")]
pub mod valuation;

#[cfg(feature = "scenarios")]
pub mod scenarios;

#[cfg(feature = "monte_carlo")]
pub mod monte_carlo;

#[cfg(feature = "distress")]
pub mod distress;

#[cfg(feature = "stress")]
pub mod stress;

#[cfg(feature = "analysis")]
pub mod analysis;

pub use error::FinModelError;
pub use types::*;

/// Standard result type for all modelling operations
pub type FinModelResult<T> = Result<T, FinModelError>;

pub mod analyze;
pub mod model;
pub mod valuation;

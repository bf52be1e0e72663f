pub mod dcf;
pub mod real_options;

pub use dcf::{
    cash_flow_npv, gordon_terminal_value, projection_npv, value_projection, CashFlowSeriesInput,
    DcfInput, DcfValuation,
};
pub use real_options::{
    value_real_option, PricingMethod, RealOptionInput, RealOptionKind, RealOptionValuation,
};

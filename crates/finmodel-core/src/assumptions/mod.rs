pub mod builder;

pub use builder::{
    build, AssumptionSet, BuiltAssumptions, CompanyAssumptions, IndustryAssumptions,
    MacroeconomicAssumptions, PartialAssumptionSet, PricingStrategy,
};

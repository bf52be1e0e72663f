pub mod drivers;
pub mod projector;

pub use drivers::DriverBase;
pub use projector::{
    project, project_with_shock, DriverShock, Projection, ProjectionPeriod, ReasonabilityCheck,
    ShockWindow,
};

mod engine;
mod error;
mod report;
mod session;
mod solver;
mod types;

pub use engine::{AccumulationSchedule, Simulation, derive_target};
pub use error::{PlanError, UnreachableReason};
pub use report::{describe_plan, format_currency, format_percent};
pub use session::PlanSession;
pub use solver::{ContributionSolve, compute_plan, solve_monthly_contribution};
pub use types::{
    Assumptions, DEFAULT_EXPENSE_INTERVAL_MONTHS, DEFAULT_INFLATION_RATE, DEFAULT_RETURN_RATE,
    MAX_AGE, PlanParameters, PlanResult, PostCheck, ProjectionPoint, RetirementTarget,
    SolveConfig,
};

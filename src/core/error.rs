use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("retirement age ({retirement_age}) must be greater than current age ({current_age})")]
    InvalidAgeRange {
        current_age: u32,
        retirement_age: u32,
    },

    #[error("invalid input: {field} {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("goal unreachable with current parameters: {0}")]
    GoalUnreachable(UnreachableReason),
}

/// Why the contribution search gave up.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum UnreachableReason {
    #[error("search did not converge after {iterations} iterations")]
    IterationCap { iterations: u32 },

    #[error("solved contribution only reaches {achieved:.2} of {required:.2}")]
    Shortfall { achieved: f64, required: f64 },

    #[error("non-finite intermediate value")]
    NonFinite,
}

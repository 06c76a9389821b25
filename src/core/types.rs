use serde::{Deserialize, Serialize};

use super::error::PlanError;

pub const DEFAULT_INFLATION_RATE: f64 = 0.04;
pub const DEFAULT_RETURN_RATE: f64 = 0.20;
pub const DEFAULT_EXPENSE_INTERVAL_MONTHS: u32 = 12;
/// Upper bound on either age. Keeps the month count well inside `u32`.
pub const MAX_AGE: u32 = 120;

/// One solve request. Money amounts are in today's currency units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanParameters {
    pub current_age: u32,
    pub retirement_age: u32,
    pub desired_monthly_income: f64,
    pub extra_annual_expense: f64,
    pub current_investment: f64,
}

impl PlanParameters {
    pub fn years_to_retirement(&self) -> u32 {
        self.retirement_age.saturating_sub(self.current_age)
    }

    pub fn months_to_retirement(&self) -> u32 {
        self.years_to_retirement().saturating_mul(12)
    }

    /// Age range is checked first so a bad range is reported even when the
    /// money fields are also wrong.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.retirement_age <= self.current_age {
            return Err(PlanError::InvalidAgeRange {
                current_age: self.current_age,
                retirement_age: self.retirement_age,
            });
        }
        if self.retirement_age > MAX_AGE {
            return Err(PlanError::InvalidInput {
                field: "retirement_age",
                reason: format!("must be <= {MAX_AGE}, got {}", self.retirement_age),
            });
        }

        for (field, value) in [
            ("desired_monthly_income", self.desired_monthly_income),
            ("extra_annual_expense", self.extra_annual_expense),
            ("current_investment", self.current_investment),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PlanError::InvalidInput {
                    field,
                    reason: format!("must be a finite amount >= 0, got {value}"),
                });
            }
        }
        Ok(())
    }
}

/// Economic assumptions shared by every solve. Callers pick these; the solver
/// never falls back to its own constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assumptions {
    pub inflation_rate: f64,
    pub return_rate: f64,
    pub expense_interval_months: u32,
}

impl Default for Assumptions {
    fn default() -> Self {
        Self {
            inflation_rate: DEFAULT_INFLATION_RATE,
            return_rate: DEFAULT_RETURN_RATE,
            expense_interval_months: DEFAULT_EXPENSE_INTERVAL_MONTHS,
        }
    }
}

impl Assumptions {
    pub fn monthly_return_rate(&self) -> f64 {
        self.return_rate / 12.0
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        if !self.return_rate.is_finite() || self.return_rate <= 0.0 {
            return Err(PlanError::InvalidInput {
                field: "return_rate",
                reason: format!("must be > 0, got {}", self.return_rate),
            });
        }
        if !self.inflation_rate.is_finite() || self.inflation_rate <= -1.0 {
            return Err(PlanError::InvalidInput {
                field: "inflation_rate",
                reason: format!("must be > -1, got {}", self.inflation_rate),
            });
        }
        if self.expense_interval_months == 0 {
            return Err(PlanError::InvalidInput {
                field: "expense_interval_months",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostCheck {
    /// Answer with the sufficient end of the bracket and re-simulate it.
    Strict,
    /// Answer with the bracket midpoint, no re-simulation.
    Lenient,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveConfig {
    pub tolerance: f64,
    pub max_iterations: u32,
    pub search_ceiling_multiple: f64,
    pub sufficiency_slack: f64,
    pub post_check: PostCheck,
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.01,
            max_iterations: 1000,
            search_ceiling_multiple: 100.0,
            sufficiency_slack: 1.0,
            post_check: PostCheck::Strict,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementTarget {
    pub future_monthly_income: f64,
    pub required_capital: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionPoint {
    pub age: f64,
    pub capital: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResult {
    pub parameters: PlanParameters,
    pub assumptions: Assumptions,
    pub future_monthly_income: f64,
    pub required_capital: f64,
    pub monthly_investment: f64,
    pub solver_iterations: u32,
    pub projection: Vec<ProjectionPoint>,
}

use super::types::{Assumptions, PlanParameters, ProjectionPoint, RetirementTarget};

const MONTHS_PER_YEAR: u32 = 12;

pub fn derive_target(
    desired_monthly_income: f64,
    years_to_retirement: f64,
    inflation_rate: f64,
    return_rate: f64,
) -> RetirementTarget {
    let future_monthly_income =
        desired_monthly_income * (1.0 + inflation_rate).powf(years_to_retirement);
    RetirementTarget {
        future_monthly_income,
        required_capital: future_monthly_income * 12.0 / return_rate,
    }
}

/// Everything about the accumulation phase except the monthly contribution,
/// which is the quantity being solved for.
#[derive(Debug, Clone, Copy)]
pub struct AccumulationSchedule {
    pub current_investment: f64,
    pub months: u32,
    pub extra_annual_expense: f64,
    pub inflation_rate: f64,
    pub monthly_return_rate: f64,
    pub expense_interval_months: u32,
}

#[derive(Debug, Clone)]
pub struct Simulation {
    pub final_balance: f64,
    pub series: Vec<ProjectionPoint>,
}

impl AccumulationSchedule {
    pub fn for_plan(params: &PlanParameters, assumptions: &Assumptions) -> Self {
        Self {
            current_investment: params.current_investment,
            months: params.months_to_retirement(),
            extra_annual_expense: params.extra_annual_expense,
            inflation_rate: assumptions.inflation_rate,
            monthly_return_rate: assumptions.monthly_return_rate(),
            expense_interval_months: assumptions.expense_interval_months,
        }
    }

    pub fn final_balance(&self, monthly_contribution: f64) -> f64 {
        self.run(monthly_contribution, |_, _| {})
    }

    /// Full reporting run: one point per completed year plus the final month.
    pub fn simulate(&self, monthly_contribution: f64, start_age: u32) -> Simulation {
        let mut series = Vec::with_capacity((self.months / MONTHS_PER_YEAR) as usize + 1);
        let final_balance = self.run(monthly_contribution, |month, balance| {
            if month % MONTHS_PER_YEAR == 0 || month == self.months {
                series.push(ProjectionPoint {
                    age: start_age as f64 + month as f64 / MONTHS_PER_YEAR as f64,
                    capital: round_to_cents(balance),
                });
            }
        });
        Simulation {
            final_balance,
            series,
        }
    }

    /// Inflated expense deducted at the end of `month`, zero off-cadence.
    pub fn expense_due(&self, month: u32) -> f64 {
        if self.extra_annual_expense <= 0.0
            || self.expense_interval_months == 0
            || month % self.expense_interval_months != 0
        {
            return 0.0;
        }
        let years_elapsed = month as f64 / MONTHS_PER_YEAR as f64;
        self.extra_annual_expense * (1.0 + self.inflation_rate).powf(years_elapsed)
    }

    fn run(&self, monthly_contribution: f64, mut on_month: impl FnMut(u32, f64)) -> f64 {
        let growth = 1.0 + self.monthly_return_rate;
        let mut balance = self.current_investment;
        for month in 1..=self.months {
            balance = balance * growth + monthly_contribution;
            balance -= self.expense_due(month);
            on_month(month, balance);
        }
        balance
    }
}

fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

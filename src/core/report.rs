use std::fmt::Write;

use super::types::PlanResult;

/// Two decimals with comma thousands separators, e.g. `1,286,640.00`.
/// Non-finite values render as `0.00`.
pub fn format_currency(value: f64) -> String {
    if !value.is_finite() {
        return "0.00".to_string();
    }

    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(fixed.len() + whole.len() / 3 + 1);
    if value < 0.0 && fixed.bytes().any(|b| b.is_ascii_digit() && b != b'0') {
        grouped.push('-');
    }
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped.push('.');
    grouped.push_str(cents);
    grouped
}

pub fn format_percent(rate: f64) -> String {
    let percent = rate * 100.0;
    if (percent - percent.round()).abs() < 1e-9 {
        format!("{percent:.0}%")
    } else {
        format!("{percent:.2}%")
    }
}

fn interval_phrase(months: u32) -> String {
    match months {
        12 => "every year".to_string(),
        m if m % 12 == 0 => format!("every {} years", m / 12),
        m => format!("every {m} months"),
    }
}

pub fn describe_plan(plan: &PlanResult) -> String {
    let params = &plan.parameters;
    let assumptions = &plan.assumptions;
    let mut text = String::new();

    let _ = write!(
        text,
        "To retire at {} with a monthly income worth ${} in today's money, you will need \
         ${} per month at retirement (adjusted for {} annual inflation) and a capital of \
         about ${}.",
        params.retirement_age,
        format_currency(params.desired_monthly_income),
        format_currency(plan.future_monthly_income),
        format_percent(assumptions.inflation_rate),
        format_currency(plan.required_capital),
    );

    let lead = if params.current_investment > 0.0 {
        format!(
            " Counting your current investment of ${},",
            format_currency(params.current_investment)
        )
    } else {
        String::new()
    };
    let subject = if lead.is_empty() { " You" } else { " you" };

    if plan.monthly_investment > 0.0 {
        let _ = write!(
            text,
            "{lead}{subject} should invest ${} every month from now on at an annual return \
             of at least {}.",
            format_currency(plan.monthly_investment),
            format_percent(assumptions.return_rate),
        );
    } else {
        let _ = write!(
            text,
            "{lead}{subject} already reach that capital at an annual return of {}; no monthly \
             contribution is needed.",
            format_percent(assumptions.return_rate),
        );
    }

    if params.extra_annual_expense > 0.0 {
        let _ = write!(
            text,
            " This includes an extra expense of ${} {}, adjusted for inflation.",
            format_currency(params.extra_annual_expense),
            interval_phrase(assumptions.expense_interval_months),
        );
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Assumptions, PlanParameters, ProjectionPoint};

    fn sample_plan() -> PlanResult {
        PlanResult {
            parameters: PlanParameters {
                current_age: 43,
                retirement_age: 65,
                desired_monthly_income: 9_000.0,
                extra_annual_expense: 0.0,
                current_investment: 0.0,
            },
            assumptions: Assumptions::default(),
            future_monthly_income: 21_329.35,
            required_capital: 1_279_761.0,
            monthly_investment: 275.12,
            solver_iterations: 28,
            projection: vec![ProjectionPoint {
                age: 65.0,
                capital: 1_279_761.0,
            }],
        }
    }

    #[test]
    fn format_currency_groups_thousands() {
        assert_eq!(format_currency(0.0), "0.00");
        assert_eq!(format_currency(999.999), "1,000.00");
        assert_eq!(format_currency(1_286_640.5), "1,286,640.50");
        assert_eq!(format_currency(123_456.0), "123,456.00");
        assert_eq!(format_currency(-4_200.1), "-4,200.10");
    }

    #[test]
    fn format_currency_handles_degenerate_values() {
        assert_eq!(format_currency(f64::NAN), "0.00");
        assert_eq!(format_currency(f64::INFINITY), "0.00");
        assert_eq!(format_currency(-0.001), "0.00");
    }

    #[test]
    fn format_percent_drops_trailing_zeros_for_whole_rates() {
        assert_eq!(format_percent(0.20), "20%");
        assert_eq!(format_percent(0.045), "4.50%");
    }

    #[test]
    fn description_mentions_key_figures() {
        let text = describe_plan(&sample_plan());
        assert!(text.contains("retire at 65"));
        assert!(text.contains("$9,000.00"));
        assert!(text.contains("$21,329.35"));
        assert!(text.contains("$1,279,761.00"));
        assert!(text.contains("$275.12 every month"));
        assert!(text.contains("at least 20%"));
        assert!(!text.contains("extra expense"));
    }

    #[test]
    fn description_covers_lump_sum_and_biennial_expense() {
        let mut plan = sample_plan();
        plan.parameters.current_investment = 50_000.0;
        plan.parameters.extra_annual_expense = 5_000.0;
        plan.assumptions.expense_interval_months = 24;

        let text = describe_plan(&plan);
        assert!(text.contains("current investment of $50,000.00"));
        assert!(text.contains("$5,000.00 every 2 years"));
    }

    #[test]
    fn description_for_funded_plan_says_no_contribution() {
        let mut plan = sample_plan();
        plan.monthly_investment = 0.0;
        let text = describe_plan(&plan);
        assert!(text.contains("no monthly contribution is needed"));
    }
}

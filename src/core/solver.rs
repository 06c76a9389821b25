use super::engine::{AccumulationSchedule, derive_target};
use super::error::{PlanError, UnreachableReason};
use super::types::{
    Assumptions, PlanParameters, PlanResult, PostCheck, RetirementTarget, SolveConfig,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContributionSolve {
    pub monthly_contribution: f64,
    pub achieved_capital: f64,
    pub iterations: u32,
}

/// Derives the target once, solves against it, then rebuilds the projection
/// with the solved contribution. Each step depends on the previous one's
/// exact output, so the order is fixed.
pub fn compute_plan(
    params: &PlanParameters,
    assumptions: &Assumptions,
    config: &SolveConfig,
) -> Result<PlanResult, PlanError> {
    params.validate()?;
    assumptions.validate()?;

    let target = derive_target(
        params.desired_monthly_income,
        params.years_to_retirement() as f64,
        assumptions.inflation_rate,
        assumptions.return_rate,
    );
    let schedule = AccumulationSchedule::for_plan(params, assumptions);

    let solved = match solve_monthly_contribution(&target, &schedule, config) {
        Ok(solved) => solved,
        Err(err) => {
            log::warn!(
                "plan for ages {}..{} rejected: {err}",
                params.current_age,
                params.retirement_age
            );
            return Err(err);
        }
    };
    log::debug!(
        "solved monthly contribution {:.2} in {} iterations (required capital {:.2})",
        solved.monthly_contribution,
        solved.iterations,
        target.required_capital
    );

    let projection = schedule
        .simulate(solved.monthly_contribution, params.current_age)
        .series;

    Ok(PlanResult {
        parameters: *params,
        assumptions: *assumptions,
        future_monthly_income: target.future_monthly_income,
        required_capital: target.required_capital,
        monthly_investment: solved.monthly_contribution,
        solver_iterations: solved.iterations,
        projection,
    })
}

/// Bisection over the monthly contribution. Ending capital is strictly
/// increasing in the contribution because the expense schedule does not depend
/// on it, so the bracket `[lo, hi]` always keeps `lo` short and `hi` sufficient.
///
/// In strict mode the bound on the answer is one-sided: the achieved capital is at
/// least `required_capital - sufficiency_slack`, and one `tolerance` less would fall
/// short. The overshoot above `required_capital` is not bounded by the slack; a
/// cent per month compounded over a long horizon can add tens of units.
///
/// Lenient mode answers with the last contribution the bisection actually tried.
pub fn solve_monthly_contribution(
    target: &RetirementTarget,
    schedule: &AccumulationSchedule,
    config: &SolveConfig,
) -> Result<ContributionSolve, PlanError> {
    let required = target.required_capital;
    let ceiling = target.future_monthly_income * config.search_ceiling_multiple;
    if !required.is_finite() || !ceiling.is_finite() {
        return Err(PlanError::GoalUnreachable(UnreachableReason::NonFinite));
    }

    let baseline = finite_balance(schedule, 0.0)?;
    if baseline >= required {
        return Ok(ContributionSolve {
            monthly_contribution: 0.0,
            achieved_capital: baseline,
            iterations: 0,
        });
    }

    let mut lo = 0.0;
    let mut hi = ceiling.max(0.0);
    let mut iterations = 0;
    let mut last_tried = None;
    while hi - lo > config.tolerance {
        if iterations >= config.max_iterations {
            return Err(PlanError::GoalUnreachable(
                UnreachableReason::IterationCap { iterations },
            ));
        }
        iterations += 1;

        let mid = (lo + hi) * 0.5;
        last_tried = Some(mid);
        if finite_balance(schedule, mid)? > required {
            hi = mid;
        } else {
            lo = mid;
        }
    }

    match config.post_check {
        PostCheck::Strict => {
            let achieved = finite_balance(schedule, hi)?;
            if achieved < required - config.sufficiency_slack {
                return Err(PlanError::GoalUnreachable(UnreachableReason::Shortfall {
                    achieved,
                    required,
                }));
            }
            Ok(ContributionSolve {
                monthly_contribution: hi,
                achieved_capital: achieved,
                iterations,
            })
        }
        PostCheck::Lenient => {
            let answer = last_tried.unwrap_or(hi);
            Ok(ContributionSolve {
                monthly_contribution: answer,
                achieved_capital: finite_balance(schedule, answer)?,
                iterations,
            })
        }
    }
}

fn finite_balance(schedule: &AccumulationSchedule, contribution: f64) -> Result<f64, PlanError> {
    let balance = schedule.final_balance(contribution);
    if balance.is_finite() {
        Ok(balance)
    } else {
        Err(PlanError::GoalUnreachable(UnreachableReason::NonFinite))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::MAX_AGE;
    use proptest::prelude::{prop_assert, proptest};

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn sample_params() -> PlanParameters {
        PlanParameters {
            current_age: 43,
            retirement_age: 65,
            desired_monthly_income: 9_000.0,
            extra_annual_expense: 0.0,
            current_investment: 0.0,
        }
    }

    fn schedule_for(params: &PlanParameters, assumptions: &Assumptions) -> AccumulationSchedule {
        AccumulationSchedule::for_plan(params, assumptions)
    }

    fn target_for(params: &PlanParameters, assumptions: &Assumptions) -> RetirementTarget {
        derive_target(
            params.desired_monthly_income,
            params.years_to_retirement() as f64,
            assumptions.inflation_rate,
            assumptions.return_rate,
        )
    }

    #[test]
    fn strict_solution_reaches_required_capital_to_the_cent() {
        let params = sample_params();
        let assumptions = Assumptions::default();
        let config = SolveConfig::default();
        let schedule = schedule_for(&params, &assumptions);
        let target = target_for(&params, &assumptions);

        let solved =
            solve_monthly_contribution(&target, &schedule, &config).expect("must solve");

        assert!(solved.iterations > 0);
        assert!(solved.achieved_capital >= target.required_capital - 1.0);
        let one_cent_less =
            schedule.final_balance(solved.monthly_contribution - config.tolerance);
        assert!(one_cent_less <= target.required_capital);
    }

    #[test]
    fn matches_closed_form_annuity_without_expenses() {
        let params = sample_params();
        let assumptions = Assumptions::default();
        let schedule = schedule_for(&params, &assumptions);
        let target = target_for(&params, &assumptions);

        let r = assumptions.monthly_return_rate();
        let n = params.months_to_retirement() as i32;
        let closed_form = target.required_capital * r / ((1.0 + r).powi(n) - 1.0);

        let solved = solve_monthly_contribution(&target, &schedule, &SolveConfig::default())
            .expect("must solve");
        assert_close(solved.monthly_contribution, closed_form, 0.011);
    }

    #[test]
    fn funded_lump_sum_short_circuits_to_zero() {
        let mut params = sample_params();
        let assumptions = Assumptions::default();
        params.current_investment = target_for(&params, &assumptions).required_capital;
        let schedule = schedule_for(&params, &assumptions);
        let target = target_for(&params, &assumptions);

        let solved = solve_monthly_contribution(&target, &schedule, &SolveConfig::default())
            .expect("must solve");
        assert_eq!(solved.monthly_contribution, 0.0);
        assert_eq!(solved.iterations, 0);
    }

    #[test]
    fn iteration_cap_reports_unreachable() {
        let params = sample_params();
        let assumptions = Assumptions::default();
        let config = SolveConfig {
            max_iterations: 3,
            ..SolveConfig::default()
        };

        let err = solve_monthly_contribution(
            &target_for(&params, &assumptions),
            &schedule_for(&params, &assumptions),
            &config,
        )
        .expect_err("three halvings cannot reach one cent");
        assert_eq!(
            err,
            PlanError::GoalUnreachable(UnreachableReason::IterationCap { iterations: 3 })
        );
    }

    #[test]
    fn strict_check_rejects_ceiling_that_is_too_low() {
        let params = sample_params();
        let assumptions = Assumptions::default();
        let config = SolveConfig {
            search_ceiling_multiple: 0.001,
            ..SolveConfig::default()
        };

        let err = solve_monthly_contribution(
            &target_for(&params, &assumptions),
            &schedule_for(&params, &assumptions),
            &config,
        )
        .expect_err("ceiling below the answer");
        assert!(matches!(
            err,
            PlanError::GoalUnreachable(UnreachableReason::Shortfall { .. })
        ));
    }

    #[test]
    fn lenient_check_skips_sufficiency_even_when_short() {
        let params = sample_params();
        let assumptions = Assumptions::default();
        let config = SolveConfig {
            search_ceiling_multiple: 0.001,
            post_check: PostCheck::Lenient,
            ..SolveConfig::default()
        };
        let target = target_for(&params, &assumptions);

        let schedule = schedule_for(&params, &assumptions);

        let solved = solve_monthly_contribution(&target, &schedule, &config)
            .expect("lenient mode never re-checks");
        assert!(solved.monthly_contribution <= target.future_monthly_income * 0.001);
        assert!(solved.achieved_capital < target.required_capital);
    }

    #[test]
    fn lenient_answer_is_a_contribution_the_search_tried() {
        let params = sample_params();
        let assumptions = Assumptions::default();
        let target = target_for(&params, &assumptions);
        let schedule = schedule_for(&params, &assumptions);

        let strict = solve_monthly_contribution(&target, &schedule, &SolveConfig::default())
            .expect("solvable");
        let lenient = solve_monthly_contribution(
            &target,
            &schedule,
            &SolveConfig {
                post_check: PostCheck::Lenient,
                ..SolveConfig::default()
            },
        )
        .expect("solvable");

        assert_eq!(lenient.iterations, strict.iterations);
        // The last midpoint became either the final `hi` or the final `lo`.
        if lenient.monthly_contribution != strict.monthly_contribution {
            assert!(lenient.monthly_contribution < strict.monthly_contribution);
            assert!(strict.monthly_contribution - lenient.monthly_contribution <= 0.01);
            assert!(lenient.achieved_capital <= target.required_capital);
        }
    }

    #[test]
    fn compute_plan_rejects_horizon_past_max_age() {
        for retirement_age in [MAX_AGE + 1, 400_000_000, 1 << 30] {
            let params = PlanParameters {
                current_age: 0,
                retirement_age,
                current_investment: 10_000_000.0,
                ..sample_params()
            };
            let err = compute_plan(&params, &Assumptions::default(), &SolveConfig::default())
                .expect_err("must reject");
            assert!(matches!(
                err,
                PlanError::InvalidInput {
                    field: "retirement_age",
                    ..
                }
            ));
        }
    }

    #[test]
    fn month_count_saturates_instead_of_wrapping() {
        let params = PlanParameters {
            current_age: 0,
            retirement_age: 1 << 30,
            ..sample_params()
        };
        assert_eq!(params.months_to_retirement(), u32::MAX);

        let oldest = PlanParameters {
            current_age: 0,
            retirement_age: MAX_AGE,
            ..sample_params()
        };
        assert!(oldest.validate().is_ok());
        assert_eq!(oldest.months_to_retirement(), MAX_AGE * 12);
    }

    #[test]
    fn non_finite_target_is_unreachable() {
        let params = sample_params();
        let assumptions = Assumptions::default();
        let target = RetirementTarget {
            future_monthly_income: f64::NAN,
            required_capital: f64::NAN,
        };

        let err = solve_monthly_contribution(
            &target,
            &schedule_for(&params, &assumptions),
            &SolveConfig::default(),
        )
        .expect_err("NaN target");
        assert_eq!(err, PlanError::GoalUnreachable(UnreachableReason::NonFinite));
    }

    #[test]
    fn compute_plan_rejects_inverted_ages_before_solving() {
        let mut params = sample_params();
        params.retirement_age = 43;
        // Also invalid, but the age range must win.
        params.desired_monthly_income = -1.0;

        let err = compute_plan(&params, &Assumptions::default(), &SolveConfig::default())
            .expect_err("must reject");
        assert_eq!(
            err,
            PlanError::InvalidAgeRange {
                current_age: 43,
                retirement_age: 43
            }
        );
    }

    #[test]
    fn compute_plan_rejects_non_positive_return_rate() {
        let assumptions = Assumptions {
            return_rate: 0.0,
            ..Assumptions::default()
        };

        let err = compute_plan(&sample_params(), &assumptions, &SolveConfig::default())
            .expect_err("must reject");
        assert!(matches!(
            err,
            PlanError::InvalidInput {
                field: "return_rate",
                ..
            }
        ));
    }

    #[test]
    fn compute_plan_packages_target_and_projection() {
        let params = sample_params();
        let plan = compute_plan(&params, &Assumptions::default(), &SolveConfig::default())
            .expect("must solve");

        let expected_income = 9_000.0 * 1.04f64.powi(22);
        assert_close(plan.future_monthly_income, expected_income, 1e-6);
        assert_close(plan.required_capital, expected_income * 12.0 / 0.20, 1e-6);
        assert_eq!(plan.parameters, params);
        assert_eq!(plan.projection.len(), 22);
        let last = plan.projection.last().expect("projection has points");
        assert_close(last.age, 65.0, 1e-9);
        assert!(last.capital >= plan.required_capital - 1.0);
    }

    #[test]
    fn compute_plan_is_idempotent() {
        let mut params = sample_params();
        params.extra_annual_expense = 5_000.0;
        params.current_investment = 25_000.0;
        let first = compute_plan(&params, &Assumptions::default(), &SolveConfig::default())
            .expect("must solve");
        let second = compute_plan(&params, &Assumptions::default(), &SolveConfig::default())
            .expect("must solve");
        assert_eq!(first, second);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_strict_solution_is_sufficient_and_minimal_to_a_cent(
            current_age in 18u32..60,
            span in 1u32..40,
            income in 1_000u32..50_000,
            expense in 0u32..30_000,
            lump_sum in 0u32..500_000,
            interval in expense_intervals()
        ) {
            let params = PlanParameters {
                current_age,
                retirement_age: current_age + span,
                desired_monthly_income: income as f64,
                extra_annual_expense: expense as f64,
                current_investment: lump_sum as f64,
            };
            let assumptions = Assumptions {
                expense_interval_months: interval,
                ..Assumptions::default()
            };
            let config = SolveConfig::default();
            let schedule = schedule_for(&params, &assumptions);
            let target = target_for(&params, &assumptions);

            let solved = solve_monthly_contribution(&target, &schedule, &config);
            prop_assert!(solved.is_ok());
            let solved = solved.unwrap();

            prop_assert!(
                solved.achieved_capital >= target.required_capital - config.sufficiency_slack
            );
            if solved.iterations > 0 {
                let below = (solved.monthly_contribution - config.tolerance).max(0.0);
                prop_assert!(schedule.final_balance(below) <= target.required_capital);
            } else {
                prop_assert!(solved.monthly_contribution == 0.0);
                prop_assert!(schedule.final_balance(0.0) >= target.required_capital);
            }
        }
    }

    fn expense_intervals() -> impl proptest::strategy::Strategy<Value = u32> {
        proptest::sample::select(vec![12u32, 24])
    }
}

use crate::analysis::classifier::{classify, ClassifierThresholds};
use crate::errors::{Error, Result};
use crate::models::deal::{DealInput, DealMetrics};
use crate::models::verdict::Verdict;

/// Monthly principal + interest on a fixed-rate, fully amortizing loan.
/// A zero rate degrades to straight-line repayment (`principal / months`).
/// Terms long enough for `(1 + r)^n` to overflow converge to interest-only (`principal * r`).
pub fn monthly_debt_service(principal: f64, annual_rate: f64, term_months: u32) -> Result<f64> {
    if term_months == 0 {
        return Err(Error::invalid("loan_term_months must be positive, got 0"));
    }
    if principal <= 0.0 {
        return Ok(0.0);
    }

    let n = term_months as f64;
    let r = annual_rate / 12.0;
    if r == 0.0 {
        return Ok(principal / n);
    }

    let growth = (1.0 + r).powf(n);
    if !growth.is_finite() {
        return Ok(principal * r);
    }
    Ok(principal * r * growth / (growth - 1.0))
}

/// Derive every metric for a deal. Input is validated first; nothing is rounded here.
pub fn compute_metrics(input: &DealInput, thresholds: &ClassifierThresholds) -> Result<DealMetrics> {
    input.validate()?;

    let loan_amount = input.loan_amount();
    let debt_service = monthly_debt_service(
        loan_amount,
        input.annual_interest_rate,
        input.loan_term_months,
    )?;

    let effective_gross = input.monthly_gross_rent * (1.0 - input.vacancy_rate);
    let noi = effective_gross - input.monthly_operating_expenses;
    let cash_flow = noi - debt_service;

    let cap_rate = ratio(noi * 12.0, input.purchase_price);

    let total_cash_invested = input.down_payment_amount()
        + input.closing_costs
        + input.rehab_costs
        + loan_amount * input.lender_points;
    let cash_on_cash_return = ratio(cash_flow * 12.0, total_cash_invested);

    let breakeven_rent = ratio(
        input.monthly_operating_expenses + debt_service,
        1.0 - input.vacancy_rate,
    );

    let mut metrics = DealMetrics {
        loan_amount,
        monthly_debt_service: debt_service,
        monthly_effective_gross_income: effective_gross,
        monthly_noi: noi,
        monthly_cash_flow: cash_flow,
        cap_rate,
        cash_on_cash_return,
        total_cash_invested,
        breakeven_rent,
        verdict: Verdict::LikelyNotWorthPursuing,
    };
    metrics.verdict = classify(&metrics, thresholds);

    Ok(metrics)
}

/// `None` when the denominator is not positive or the result is not finite.
fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator <= 0.0 {
        return None;
    }
    let value = numerator / denominator;
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_input() -> DealInput {
        DealInput {
            purchase_price: 200_000.0,
            down_payment_fraction: 0.2,
            annual_interest_rate: 0.06,
            loan_term_months: 360,
            monthly_gross_rent: 1_800.0,
            monthly_operating_expenses: 500.0,
            vacancy_rate: 0.0,
            closing_costs: 0.0,
            rehab_costs: 0.0,
            lender_points: 0.0,
        }
    }

    #[test]
    fn matches_worked_example() {
        let m = compute_metrics(&example_input(), &ClassifierThresholds::default()).unwrap();

        assert!((m.loan_amount - 160_000.0).abs() < 1e-9);
        assert!((m.monthly_debt_service - 959.28).abs() < 0.005);
        assert!((m.monthly_noi - 1_300.0).abs() < 1e-9);
        assert!((m.monthly_cash_flow - 340.72).abs() < 0.005);
        assert!((m.cap_rate.unwrap() - 0.078).abs() < 1e-12);
        // 340.72 * 12 / 40_000 ≈ 10.2%
        assert!((m.cash_on_cash_return.unwrap() - 0.1022).abs() < 0.0001);
        assert_eq!(m.verdict, Verdict::WorthDeeperLook);
    }

    #[test]
    fn zero_rate_is_straight_line() {
        for (principal, months) in [(160_000.0, 360), (12_345.67, 7), (1.0, 1)] {
            let payment = monthly_debt_service(principal, 0.0, months).unwrap();
            assert_eq!(payment, principal / months as f64);
        }
    }

    #[test]
    fn zero_term_is_rejected() {
        assert!(matches!(
            monthly_debt_service(1_000.0, 0.05, 0),
            Err(Error::InvalidInput(_))
        ));

        let mut input = example_input();
        input.loan_term_months = 0;
        assert!(compute_metrics(&input, &ClassifierThresholds::default()).is_err());
    }

    #[test]
    fn cash_flow_identity_holds() {
        let thresholds = ClassifierThresholds::default();
        for down in [0.0, 0.1, 0.25, 1.0] {
            for rate in [0.0, 0.035, 0.07, 0.12] {
                for vacancy in [0.0, 0.05, 0.5, 1.0] {
                    let input = DealInput {
                        down_payment_fraction: down,
                        annual_interest_rate: rate,
                        vacancy_rate: vacancy,
                        ..example_input()
                    };
                    let m = compute_metrics(&input, &thresholds).unwrap();
                    assert_eq!(m.monthly_cash_flow, m.monthly_noi - m.monthly_debt_service);
                }
            }
        }
    }

    #[test]
    fn all_cash_purchase_has_no_debt_service() {
        let input = DealInput {
            down_payment_fraction: 1.0,
            ..example_input()
        };
        let m = compute_metrics(&input, &ClassifierThresholds::default()).unwrap();
        assert_eq!(m.monthly_debt_service, 0.0);
        assert_eq!(m.monthly_cash_flow, m.monthly_noi);
        assert!((m.total_cash_invested - 200_000.0).abs() < 1e-9);
    }

    #[test]
    fn zero_cash_invested_leaves_cash_on_cash_undefined() {
        let input = DealInput {
            down_payment_fraction: 0.0,
            ..example_input()
        };
        let m = compute_metrics(&input, &ClassifierThresholds::default()).unwrap();
        assert_eq!(m.total_cash_invested, 0.0);
        assert_eq!(m.cash_on_cash_return, None);
        assert_eq!(m.verdict, Verdict::LikelyNotWorthPursuing);
    }

    #[test]
    fn closing_and_rehab_costs_count_as_cash_invested() {
        let input = DealInput {
            closing_costs: 4_000.0,
            rehab_costs: 6_000.0,
            ..example_input()
        };
        let m = compute_metrics(&input, &ClassifierThresholds::default()).unwrap();
        assert!((m.total_cash_invested - 50_000.0).abs() < 1e-9);
        let expected = m.monthly_cash_flow * 12.0 / 50_000.0;
        assert_eq!(m.cash_on_cash_return, Some(expected));
    }

    #[test]
    fn lender_points_are_charged_on_the_loan() {
        let input = DealInput {
            lender_points: 0.01,
            ..example_input()
        };
        let m = compute_metrics(&input, &ClassifierThresholds::default()).unwrap();
        // 40_000 down + 1% of the 160_000 loan
        assert!((m.total_cash_invested - 41_600.0).abs() < 1e-9);
    }

    #[test]
    fn very_long_terms_stay_finite() {
        let payment = monthly_debt_service(160_000.0, 0.12, 100_000).unwrap();
        assert!((payment - 1_600.0).abs() < 1e-9);

        let input = DealInput {
            annual_interest_rate: 0.12,
            loan_term_months: 100_000,
            ..example_input()
        };
        let m = compute_metrics(&input, &ClassifierThresholds::default()).unwrap();
        assert!(m.monthly_debt_service.is_finite());
        assert!(m.monthly_cash_flow.is_finite());
        assert_eq!(m.monthly_cash_flow, m.monthly_noi - m.monthly_debt_service);
    }

    #[test]
    fn breakeven_rent_zeroes_cash_flow() {
        let input = DealInput {
            vacancy_rate: 0.08,
            ..example_input()
        };
        let m = compute_metrics(&input, &ClassifierThresholds::default()).unwrap();
        let breakeven = m.breakeven_rent.unwrap();

        let at_breakeven = DealInput {
            monthly_gross_rent: breakeven,
            ..input
        };
        let m2 = compute_metrics(&at_breakeven, &ClassifierThresholds::default()).unwrap();
        assert!(m2.monthly_cash_flow.abs() < 1e-6);
    }

    #[test]
    fn full_vacancy_has_no_breakeven_rent() {
        let input = DealInput {
            vacancy_rate: 1.0,
            ..example_input()
        };
        let m = compute_metrics(&input, &ClassifierThresholds::default()).unwrap();
        assert_eq!(m.breakeven_rent, None);
        assert_eq!(m.monthly_effective_gross_income, 0.0);
    }
}

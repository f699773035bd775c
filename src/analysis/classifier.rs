use crate::models::deal::DealMetrics;
use crate::models::verdict::Verdict;
use serde::{Deserialize, Serialize};

/// Monthly cash flow at or below this is never worth pursuing.
pub const DEFAULT_CASH_FLOW_FLOOR: f64 = 0.0;
pub const DEFAULT_WORTH_MIN_CASH_ON_CASH: f64 = 0.08;
pub const DEFAULT_WORTH_MIN_CAP_RATE: f64 = 0.06;
pub const DEFAULT_WORTH_MIN_MONTHLY_CASH_FLOW: f64 = 250.0;
/// Above the floor but under either of these → LikelyNotWorthPursuing
pub const DEFAULT_MARGINAL_MIN_CASH_ON_CASH: f64 = 0.04;
pub const DEFAULT_MARGINAL_MIN_CAP_RATE: f64 = 0.045;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierThresholds {
    pub cash_flow_floor: f64,
    pub worth_min_cash_on_cash: f64,
    pub worth_min_cap_rate: f64,
    pub worth_min_monthly_cash_flow: f64,
    pub marginal_min_cash_on_cash: f64,
    pub marginal_min_cap_rate: f64,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        ClassifierThresholds {
            cash_flow_floor: DEFAULT_CASH_FLOW_FLOOR,
            worth_min_cash_on_cash: DEFAULT_WORTH_MIN_CASH_ON_CASH,
            worth_min_cap_rate: DEFAULT_WORTH_MIN_CAP_RATE,
            worth_min_monthly_cash_flow: DEFAULT_WORTH_MIN_MONTHLY_CASH_FLOW,
            marginal_min_cash_on_cash: DEFAULT_MARGINAL_MIN_CASH_ON_CASH,
            marginal_min_cap_rate: DEFAULT_MARGINAL_MIN_CAP_RATE,
        }
    }
}

/// Bucket a deal.
/// - Cash flow at or below the floor (never below zero) → LikelyNotWorthPursuing
/// - Undefined or non-finite metrics → LikelyNotWorthPursuing
/// - Cash-on-cash or cap rate under the marginal minimums → LikelyNotWorthPursuing
/// - Every "worth" threshold met → WorthDeeperLook, otherwise Marginal
pub fn classify(metrics: &DealMetrics, thresholds: &ClassifierThresholds) -> Verdict {
    classify_figures(
        metrics.monthly_cash_flow,
        metrics.cash_on_cash_return,
        metrics.cap_rate,
        thresholds,
    )
}

/// Same rules as [`classify`], for callers that only hold the three deciding figures.
pub fn classify_figures(
    cash_flow: f64,
    cash_on_cash_return: Option<f64>,
    cap_rate: Option<f64>,
    thresholds: &ClassifierThresholds,
) -> Verdict {
    let floor = thresholds.cash_flow_floor.max(0.0);

    if !cash_flow.is_finite() || cash_flow <= floor {
        return Verdict::LikelyNotWorthPursuing;
    }

    let (Some(coc), Some(cap)) = (finite(cash_on_cash_return), finite(cap_rate)) else {
        return Verdict::LikelyNotWorthPursuing;
    };

    if coc < thresholds.marginal_min_cash_on_cash || cap < thresholds.marginal_min_cap_rate {
        return Verdict::LikelyNotWorthPursuing;
    }

    if coc >= thresholds.worth_min_cash_on_cash
        && cap >= thresholds.worth_min_cap_rate
        && cash_flow >= thresholds.worth_min_monthly_cash_flow
    {
        Verdict::WorthDeeperLook
    } else {
        Verdict::Marginal
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

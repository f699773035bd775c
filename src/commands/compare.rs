use crate::commands::db::DealStore;
use crate::errors::Result;
use crate::models::deal::{format_currency, format_percent, SavedDeal};
use serde::{Deserialize, Serialize};

/// Fetch two saved deals for side-by-side display. Only the verdict is re-derived,
/// against the store's current thresholds.
pub fn compare(store: &DealStore, id_a: i64, id_b: i64) -> Result<(SavedDeal, SavedDeal)> {
    let left = store.get(id_a)?;
    let right = store.get(id_b)?;
    Ok((left, right))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Currency,
    Percent,
    Months,
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub field: String,
    pub kind: ValueKind,
    pub left: Option<f64>,
    pub right: Option<f64>,
    /// right − left, when both sides are defined
    pub difference: Option<f64>,
    pub left_text: String,
    pub right_text: String,
}

/// Side-by-side table of the stored inputs and cached metrics.
pub fn comparison_rows(left: &SavedDeal, right: &SavedDeal) -> Vec<ComparisonRow> {
    let mut rows = Vec::with_capacity(17);

    let mut push = |field: &str, kind: ValueKind, pick: fn(&SavedDeal) -> Option<f64>| {
        let (l, r) = (pick(left), pick(right));
        rows.push(ComparisonRow {
            field: field.to_string(),
            kind,
            left: l,
            right: r,
            difference: l.zip(r).map(|(l, r)| r - l),
            left_text: render(kind, l),
            right_text: render(kind, r),
        });
    };

    push("Purchase price", ValueKind::Currency, |d| Some(d.input.purchase_price));
    push("Down payment", ValueKind::Percent, |d| Some(d.input.down_payment_fraction));
    push("Interest rate", ValueKind::Percent, |d| Some(d.input.annual_interest_rate));
    push("Term", ValueKind::Months, |d| Some(d.input.loan_term_months as f64));
    push("Gross rent (monthly)", ValueKind::Currency, |d| Some(d.input.monthly_gross_rent));
    push("Operating expenses (monthly)", ValueKind::Currency, |d| {
        Some(d.input.monthly_operating_expenses)
    });
    push("Vacancy", ValueKind::Percent, |d| Some(d.input.vacancy_rate));
    push("Lender points", ValueKind::Percent, |d| Some(d.input.lender_points));
    push("Debt service (monthly)", ValueKind::Currency, |d| {
        Some(d.metrics.monthly_debt_service)
    });
    push("NOI (monthly)", ValueKind::Currency, |d| Some(d.metrics.monthly_noi));
    push("Cash flow (monthly)", ValueKind::Currency, |d| Some(d.metrics.monthly_cash_flow));
    push("Cap rate", ValueKind::Percent, |d| d.metrics.cap_rate);
    push("Cash-on-cash", ValueKind::Percent, |d| d.metrics.cash_on_cash_return);
    push("Cash invested", ValueKind::Currency, |d| Some(d.metrics.total_cash_invested));
    push("Breakeven rent", ValueKind::Currency, |d| d.metrics.breakeven_rent);

    rows.push(ComparisonRow {
        field: "Verdict".to_string(),
        kind: ValueKind::Text,
        left: None,
        right: None,
        difference: None,
        left_text: left.metrics.verdict.label().to_string(),
        right_text: right.metrics.verdict.label().to_string(),
    });

    rows
}

fn render(kind: ValueKind, value: Option<f64>) -> String {
    match (kind, value) {
        (_, None) => "n/a".to_string(),
        (ValueKind::Currency, Some(v)) => format_currency(v),
        (ValueKind::Percent, v) => format_percent(v),
        (ValueKind::Months, Some(v)) => format!("{v:.0} mo"),
        (ValueKind::Text, Some(v)) => v.to_string(),
    }
}

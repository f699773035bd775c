use crate::errors::{Error, Result};
use crate::models::verdict::Verdict;
use serde::{Deserialize, Serialize};

/// Vacancy assumed when the caller leaves it blank and no setting overrides it
pub const DEFAULT_VACANCY_RATE: f64 = 0.05;

/// Both financing fractions may be supplied as long as they describe the same loan
const FRACTION_TOLERANCE: f64 = 1e-9;

/// Deal assumptions as typed into a form. Nothing here is trusted until
/// it goes through [`DealInput::from_raw`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawDealInput {
    pub purchase_price: f64,
    pub down_payment_fraction: Option<f64>,
    pub loan_to_value: Option<f64>,
    pub annual_interest_rate: f64,
    pub loan_term_months: i64,
    pub monthly_gross_rent: f64,
    pub monthly_operating_expenses: f64,
    pub vacancy_rate: Option<f64>,
    pub closing_costs: Option<f64>,
    pub rehab_costs: Option<f64>,
    pub lender_points: Option<f64>,
}

/// Validated deal assumptions. Rates and fractions are plain fractions (0.06 = 6%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealInput {
    pub purchase_price: f64,
    pub down_payment_fraction: f64,
    pub annual_interest_rate: f64,
    pub loan_term_months: u32,
    pub monthly_gross_rent: f64,
    pub monthly_operating_expenses: f64,
    pub vacancy_rate: f64,
    pub closing_costs: f64,
    pub rehab_costs: f64,
    /// Origination points as a fraction of the loan, paid in cash at closing
    pub lender_points: f64,
}

impl DealInput {
    pub fn from_raw(raw: &RawDealInput, default_vacancy_rate: f64) -> Result<Self> {
        let down_payment_fraction = match (raw.down_payment_fraction, raw.loan_to_value) {
            (Some(down), None) => down,
            (None, Some(ltv)) => {
                ensure_fraction("loan_to_value", ltv)?;
                1.0 - ltv
            }
            (Some(down), Some(ltv)) => {
                ensure_fraction("loan_to_value", ltv)?;
                if (down + ltv - 1.0).abs() > FRACTION_TOLERANCE {
                    return Err(Error::invalid(format!(
                        "down_payment_fraction ({down}) and loan_to_value ({ltv}) disagree"
                    )));
                }
                down
            }
            (None, None) => {
                return Err(Error::invalid(
                    "either down_payment_fraction or loan_to_value is required",
                ))
            }
        };

        if raw.loan_term_months <= 0 || raw.loan_term_months > u32::MAX as i64 {
            return Err(Error::invalid(format!(
                "loan_term_months must be between 1 and {}, got {}",
                u32::MAX,
                raw.loan_term_months
            )));
        }

        let input = DealInput {
            purchase_price: raw.purchase_price,
            down_payment_fraction,
            annual_interest_rate: raw.annual_interest_rate,
            loan_term_months: raw.loan_term_months as u32,
            monthly_gross_rent: raw.monthly_gross_rent,
            monthly_operating_expenses: raw.monthly_operating_expenses,
            vacancy_rate: raw.vacancy_rate.unwrap_or(default_vacancy_rate),
            closing_costs: raw.closing_costs.unwrap_or(0.0),
            rehab_costs: raw.rehab_costs.unwrap_or(0.0),
            lender_points: raw.lender_points.unwrap_or(0.0),
        };
        input.validate()?;
        Ok(input)
    }

    /// Domain checks. Out-of-range values are rejected, never clamped.
    pub fn validate(&self) -> Result<()> {
        if !self.purchase_price.is_finite() || self.purchase_price <= 0.0 {
            return Err(Error::invalid(format!(
                "purchase_price must be greater than zero, got {}",
                self.purchase_price
            )));
        }
        ensure_fraction("down_payment_fraction", self.down_payment_fraction)?;
        if !self.annual_interest_rate.is_finite()
            || !(0.0..=1.0).contains(&self.annual_interest_rate)
        {
            return Err(Error::invalid(format!(
                "annual_interest_rate must be a fraction between 0 and 1, got {}",
                self.annual_interest_rate
            )));
        }
        if self.loan_term_months == 0 {
            return Err(Error::invalid("loan_term_months must be positive, got 0"));
        }
        ensure_amount("monthly_gross_rent", self.monthly_gross_rent)?;
        ensure_amount("monthly_operating_expenses", self.monthly_operating_expenses)?;
        ensure_fraction("vacancy_rate", self.vacancy_rate)?;
        ensure_amount("closing_costs", self.closing_costs)?;
        ensure_amount("rehab_costs", self.rehab_costs)?;
        ensure_fraction("lender_points", self.lender_points)?;
        Ok(())
    }

    pub fn loan_amount(&self) -> f64 {
        self.purchase_price * (1.0 - self.down_payment_fraction)
    }

    pub fn down_payment_amount(&self) -> f64 {
        self.purchase_price * self.down_payment_fraction
    }
}

fn ensure_fraction(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::invalid(format!(
            "{field} must be between 0 and 1, got {value}"
        )))
    }
}

fn ensure_amount(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::invalid(format!(
            "{field} must be a non-negative amount, got {value}"
        )))
    }
}

/// Derived figures. `None` means undefined (e.g. no cash invested), never NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealMetrics {
    pub loan_amount: f64,
    pub monthly_debt_service: f64,
    pub monthly_effective_gross_income: f64,
    pub monthly_noi: f64,
    pub monthly_cash_flow: f64,
    pub cap_rate: Option<f64>,
    pub cash_on_cash_return: Option<f64>,
    pub total_cash_invested: f64,
    pub breakeven_rent: Option<f64>,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedDeal {
    pub id: i64,
    pub name: String,
    pub notes: Option<String>,
    pub input: DealInput,
    pub metrics: DealMetrics,
    /// Unix milliseconds, UTC
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealSummary {
    pub id: i64,
    pub name: String,
    pub purchase_price: f64,
    pub monthly_cash_flow: f64,
    pub cap_rate: Option<f64>,
    pub cash_on_cash_return: Option<f64>,
    pub verdict: Verdict,
    pub created_at: i64,
}

impl From<&SavedDeal> for DealSummary {
    fn from(deal: &SavedDeal) -> Self {
        DealSummary {
            id: deal.id,
            name: deal.name.clone(),
            purchase_price: deal.input.purchase_price,
            monthly_cash_flow: deal.metrics.monthly_cash_flow,
            cap_rate: deal.metrics.cap_rate,
            cash_on_cash_return: deal.metrics.cash_on_cash_return,
            verdict: deal.metrics.verdict,
            created_at: deal.created_at,
        }
    }
}

/// Round a currency amount for display. Calculations keep full precision.
pub fn round_currency(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn format_currency(value: f64) -> String {
    let rounded = round_currency(value);
    let sign = if rounded < 0.0 { "-" } else { "" };
    let cents = (rounded.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{sign}${grouped}.{:02}", cents % 100)
}

pub fn format_percent(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}%", v * 100.0),
        None => "n/a".to_string(),
    }
}

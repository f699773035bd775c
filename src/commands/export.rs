//! Flat CSV export of saved deals.
//!
//! One header row followed by one row per deal. Column order is fixed and
//! listed in [`EXPORT_COLUMNS`]. Floats use the shortest representation that
//! parses back to the same value; undefined metrics are empty cells.

use crate::errors::{Error, Result};
use crate::models::deal::{DealInput, DealMetrics, SavedDeal};
use crate::models::verdict::Verdict;
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};

pub const EXPORT_COLUMNS: [&str; 24] = [
    "id",
    "name",
    "notes",
    "created_at",
    "purchase_price",
    "down_payment_fraction",
    "annual_interest_rate",
    "loan_term_months",
    "monthly_gross_rent",
    "monthly_operating_expenses",
    "vacancy_rate",
    "closing_costs",
    "rehab_costs",
    "lender_points",
    "loan_amount",
    "monthly_debt_service",
    "monthly_effective_gross_income",
    "monthly_noi",
    "monthly_cash_flow",
    "cap_rate",
    "cash_on_cash_return",
    "total_cash_invested",
    "breakeven_rent",
    "verdict",
];

/// One CSV row. Field order here is the column order on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub id: i64,
    pub name: String,
    pub notes: Option<String>,
    pub created_at: i64,
    pub purchase_price: f64,
    pub down_payment_fraction: f64,
    pub annual_interest_rate: f64,
    pub loan_term_months: u32,
    pub monthly_gross_rent: f64,
    pub monthly_operating_expenses: f64,
    pub vacancy_rate: f64,
    pub closing_costs: f64,
    pub rehab_costs: f64,
    pub lender_points: f64,
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

impl From<&SavedDeal> for ExportRow {
    fn from(deal: &SavedDeal) -> Self {
        let input = &deal.input;
        let metrics = &deal.metrics;
        ExportRow {
            id: deal.id,
            name: deal.name.clone(),
            notes: deal.notes.clone(),
            created_at: deal.created_at,
            purchase_price: input.purchase_price,
            down_payment_fraction: input.down_payment_fraction,
            annual_interest_rate: input.annual_interest_rate,
            loan_term_months: input.loan_term_months,
            monthly_gross_rent: input.monthly_gross_rent,
            monthly_operating_expenses: input.monthly_operating_expenses,
            vacancy_rate: input.vacancy_rate,
            closing_costs: input.closing_costs,
            rehab_costs: input.rehab_costs,
            lender_points: input.lender_points,
            loan_amount: metrics.loan_amount,
            monthly_debt_service: metrics.monthly_debt_service,
            monthly_effective_gross_income: metrics.monthly_effective_gross_income,
            monthly_noi: metrics.monthly_noi,
            monthly_cash_flow: metrics.monthly_cash_flow,
            cap_rate: metrics.cap_rate,
            cash_on_cash_return: metrics.cash_on_cash_return,
            total_cash_invested: metrics.total_cash_invested,
            breakeven_rent: metrics.breakeven_rent,
            verdict: metrics.verdict,
        }
    }
}

impl From<ExportRow> for SavedDeal {
    fn from(row: ExportRow) -> Self {
        SavedDeal {
            id: row.id,
            name: row.name,
            notes: row.notes,
            created_at: row.created_at,
            input: DealInput {
                purchase_price: row.purchase_price,
                down_payment_fraction: row.down_payment_fraction,
                annual_interest_rate: row.annual_interest_rate,
                loan_term_months: row.loan_term_months,
                monthly_gross_rent: row.monthly_gross_rent,
                monthly_operating_expenses: row.monthly_operating_expenses,
                vacancy_rate: row.vacancy_rate,
                closing_costs: row.closing_costs,
                rehab_costs: row.rehab_costs,
                lender_points: row.lender_points,
            },
            metrics: DealMetrics {
                loan_amount: row.loan_amount,
                monthly_debt_service: row.monthly_debt_service,
                monthly_effective_gross_income: row.monthly_effective_gross_income,
                monthly_noi: row.monthly_noi,
                monthly_cash_flow: row.monthly_cash_flow,
                cap_rate: row.cap_rate,
                cash_on_cash_return: row.cash_on_cash_return,
                total_cash_invested: row.total_cash_invested,
                breakeven_rent: row.breakeven_rent,
                verdict: row.verdict,
            },
        }
    }
}

pub fn export_csv(deal: &SavedDeal) -> Result<Vec<u8>> {
    export_csv_many(std::slice::from_ref(deal))
}

pub fn export_csv_many(deals: &[SavedDeal]) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(Vec::new());

    // Written explicitly so an empty export still carries the header.
    writer.write_record(EXPORT_COLUMNS)?;
    for deal in deals {
        writer.serialize(ExportRow::from(deal))?;
    }

    writer
        .into_inner()
        .map_err(|e| Error::Io(e.into_error()))
}

pub fn read_csv(bytes: &[u8]) -> Result<Vec<ExportRow>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(bytes);

    let headers = reader.headers()?.clone();
    if headers.iter().ne(EXPORT_COLUMNS.iter().copied()) {
        return Err(Error::InvalidInput(format!(
            "unexpected CSV header: {}",
            headers.iter().collect::<Vec<_>>().join(",")
        )));
    }

    let rows = reader
        .deserialize::<ExportRow>()
        .collect::<std::result::Result<Vec<_>, csv::Error>>()?;
    Ok(rows)
}

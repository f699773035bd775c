use crate::analysis::classifier::{classify_figures, ClassifierThresholds};
use crate::analysis::underwriting::compute_metrics;
use crate::errors::{Error, Result};
use crate::models::deal::{DealInput, DealMetrics, DealSummary, SavedDeal};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const DB_SCHEMA_VERSION: i64 = 1;

const DEAL_COLUMNS: &str = "id, name, notes, created_at,
    purchase_price, down_payment_fraction, annual_interest_rate, loan_term_months,
    monthly_gross_rent, monthly_operating_expenses, vacancy_rate, closing_costs, rehab_costs,
    lender_points,
    loan_amount, monthly_debt_service, monthly_effective_gross_income, monthly_noi,
    monthly_cash_flow, cap_rate, cash_on_cash_return, total_cash_invested, breakeven_rent";

const SUMMARY_COLUMNS: &str =
    "id, name, purchase_price, monthly_cash_flow, cap_rate, cash_on_cash_return, created_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

impl ListOrder {
    fn sql(&self) -> &'static str {
        match self {
            ListOrder::NewestFirst => "ORDER BY created_at DESC, id DESC",
            ListOrder::OldestFirst => "ORDER BY created_at ASC, id ASC",
        }
    }
}

pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )?;

    let mut version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version < 1 {
        apply_migration_1(conn)?;
        version = 1;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version > DB_SCHEMA_VERSION {
        log::warn!("Database schema version {version} is newer than supported {DB_SCHEMA_VERSION}");
    }

    Ok(())
}

fn apply_migration_1(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS saved_deals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            notes TEXT,
            created_at INTEGER NOT NULL,
            purchase_price REAL NOT NULL,
            down_payment_fraction REAL NOT NULL,
            annual_interest_rate REAL NOT NULL,
            loan_term_months INTEGER NOT NULL,
            monthly_gross_rent REAL NOT NULL,
            monthly_operating_expenses REAL NOT NULL,
            vacancy_rate REAL NOT NULL,
            closing_costs REAL NOT NULL DEFAULT 0,
            rehab_costs REAL NOT NULL DEFAULT 0,
            lender_points REAL NOT NULL DEFAULT 0,
            loan_amount REAL NOT NULL,
            monthly_debt_service REAL NOT NULL,
            monthly_effective_gross_income REAL NOT NULL,
            monthly_noi REAL NOT NULL,
            monthly_cash_flow REAL NOT NULL,
            cap_rate REAL,
            cash_on_cash_return REAL,
            total_cash_invested REAL NOT NULL,
            breakeven_rent REAL,
            verdict TEXT NOT NULL CHECK(verdict IN ('worth_deeper_look', 'marginal', 'likely_not_worth_pursuing'))
        );

        CREATE INDEX IF NOT EXISTS idx_saved_deals_created_at ON saved_deals(created_at);
        ",
    )
}

/// Saved deal analyses in a single SQLite table. Metrics are computed on save
/// and stored next to the inputs. The stored verdict is informational only: reads
/// reclassify against the store's current thresholds.
pub struct DealStore {
    conn: Connection,
    thresholds: ClassifierThresholds,
}

impl DealStore {
    pub fn open(path: impl AsRef<Path>, thresholds: ClassifierThresholds) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        initialize_schema(&conn)?;
        log::info!("Opened deal store at {}", path.display());

        Ok(DealStore { conn, thresholds })
    }

    pub fn open_in_memory(thresholds: ClassifierThresholds) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(DealStore { conn, thresholds })
    }

    pub fn thresholds(&self) -> &ClassifierThresholds {
        &self.thresholds
    }

    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| Error::Storage(e))?;
        log::debug!("Closed deal store");
        Ok(())
    }

    pub fn save(&self, name: &str, input: &DealInput) -> Result<SavedDeal> {
        self.save_with_notes(name, None, input)
    }

    pub fn save_with_notes(
        &self,
        name: &str,
        notes: Option<&str>,
        input: &DealInput,
    ) -> Result<SavedDeal> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::invalid("deal name must not be empty"));
        }
        let notes = notes
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        let metrics = compute_metrics(input, &self.thresholds)?;
        let created_at = chrono::Utc::now().timestamp_millis();

        self.conn.execute(
            "INSERT INTO saved_deals (
                name, notes, created_at,
                purchase_price, down_payment_fraction, annual_interest_rate, loan_term_months,
                monthly_gross_rent, monthly_operating_expenses, vacancy_rate, closing_costs, rehab_costs,
                lender_points,
                loan_amount, monthly_debt_service, monthly_effective_gross_income, monthly_noi,
                monthly_cash_flow, cap_rate, cash_on_cash_return, total_cash_invested, breakeven_rent,
                verdict
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22,?23)",
            params![
                name,
                notes.as_deref(),
                created_at,
                input.purchase_price,
                input.down_payment_fraction,
                input.annual_interest_rate,
                input.loan_term_months,
                input.monthly_gross_rent,
                input.monthly_operating_expenses,
                input.vacancy_rate,
                input.closing_costs,
                input.rehab_costs,
                input.lender_points,
                metrics.loan_amount,
                metrics.monthly_debt_service,
                metrics.monthly_effective_gross_income,
                metrics.monthly_noi,
                metrics.monthly_cash_flow,
                metrics.cap_rate,
                metrics.cash_on_cash_return,
                metrics.total_cash_invested,
                metrics.breakeven_rent,
                metrics.verdict.as_str(),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        log::info!("Saved deal {id} ({name}) as {}", metrics.verdict.as_str());

        Ok(SavedDeal {
            id,
            name: name.to_string(),
            notes,
            input: input.clone(),
            metrics,
            created_at,
        })
    }

    /// Newest first.
    pub fn list(&self) -> Result<Vec<DealSummary>> {
        self.list_ordered(ListOrder::NewestFirst)
    }

    pub fn list_ordered(&self, order: ListOrder) -> Result<Vec<DealSummary>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SUMMARY_COLUMNS} FROM saved_deals {}",
            order.sql()
        ))?;

        let summaries = stmt
            .query_map([], |row| {
                let monthly_cash_flow: f64 = row.get(3)?;
                let cap_rate: Option<f64> = row.get(4)?;
                let cash_on_cash_return: Option<f64> = row.get(5)?;
                Ok(DealSummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    purchase_price: row.get(2)?,
                    monthly_cash_flow,
                    cap_rate,
                    cash_on_cash_return,
                    verdict: classify_figures(
                        monthly_cash_flow,
                        cash_on_cash_return,
                        cap_rate,
                        &self.thresholds,
                    ),
                    created_at: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(summaries)
    }

    /// Full records, in the requested order. Used for bulk export.
    pub fn all_deals(&self, order: ListOrder) -> Result<Vec<SavedDeal>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DEAL_COLUMNS} FROM saved_deals {}",
            order.sql()
        ))?;

        let deals = stmt
            .query_map([], |row| saved_deal_from_row(row, &self.thresholds))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(deals)
    }

    pub fn get(&self, id: i64) -> Result<SavedDeal> {
        self.conn
            .query_row(
                &format!("SELECT {DEAL_COLUMNS} FROM saved_deals WHERE id = ?1"),
                params![id],
                |row| saved_deal_from_row(row, &self.thresholds),
            )
            .optional()?
            .ok_or(Error::NotFound(id))
    }

    /// Deleting an id that does not exist is reported as `NotFound`.
    pub fn delete(&self, id: i64) -> Result<()> {
        let affected = self
            .conn
            .execute("DELETE FROM saved_deals WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(Error::NotFound(id));
        }

        log::info!("Deleted deal {id}");
        Ok(())
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM saved_deals", [], |r| r.get(0))?;
        Ok(count as usize)
    }
}

fn saved_deal_from_row(
    row: &Row<'_>,
    thresholds: &ClassifierThresholds,
) -> rusqlite::Result<SavedDeal> {
    let monthly_cash_flow: f64 = row.get(18)?;
    let cap_rate: Option<f64> = row.get(19)?;
    let cash_on_cash_return: Option<f64> = row.get(20)?;

    Ok(SavedDeal {
        id: row.get(0)?,
        name: row.get(1)?,
        notes: row.get(2)?,
        created_at: row.get(3)?,
        input: DealInput {
            purchase_price: row.get(4)?,
            down_payment_fraction: row.get(5)?,
            annual_interest_rate: row.get(6)?,
            loan_term_months: row.get(7)?,
            monthly_gross_rent: row.get(8)?,
            monthly_operating_expenses: row.get(9)?,
            vacancy_rate: row.get(10)?,
            closing_costs: row.get(11)?,
            rehab_costs: row.get(12)?,
            lender_points: row.get(13)?,
        },
        metrics: DealMetrics {
            loan_amount: row.get(14)?,
            monthly_debt_service: row.get(15)?,
            monthly_effective_gross_income: row.get(16)?,
            monthly_noi: row.get(17)?,
            monthly_cash_flow,
            cap_rate,
            cash_on_cash_return,
            total_cash_invested: row.get(21)?,
            breakeven_rent: row.get(22)?,
            verdict: classify_figures(monthly_cash_flow, cash_on_cash_return, cap_rate, thresholds),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_input() -> DealInput {
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
    fn schema_initializes_with_expected_version() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        initialize_schema(&conn).expect("schema init");
        let version: i64 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .expect("schema version");
        assert_eq!(version, DB_SCHEMA_VERSION);

        let index: Option<String> = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'index' AND name = 'idx_saved_deals_created_at'",
                [],
                |row| row.get(0),
            )
            .optional()
            .expect("index lookup");
        assert!(index.is_some());
    }

    #[test]
    fn schema_initialization_is_repeatable() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        initialize_schema(&conn).expect("first init");
        initialize_schema(&conn).expect("second init");
    }

    #[test]
    fn saved_deal_round_trip_preserves_input_and_metrics() {
        let store = DealStore::open_in_memory(ClassifierThresholds::default()).expect("store");
        let saved = store
            .save_with_notes("Elm St duplex", Some("  needs roof  "), &sample_input())
            .expect("save");

        let loaded = store.get(saved.id).expect("get");
        assert_eq!(loaded, saved);
        assert_eq!(loaded.notes.as_deref(), Some("needs roof"));
        assert_eq!(
            loaded.metrics,
            compute_metrics(&loaded.input, store.thresholds()).expect("recompute")
        );
    }

    #[test]
    fn rejects_blank_names_and_invalid_input() {
        let store = DealStore::open_in_memory(ClassifierThresholds::default()).expect("store");
        assert!(matches!(
            store.save("   ", &sample_input()),
            Err(Error::InvalidInput(_))
        ));

        let mut bad = sample_input();
        bad.vacancy_rate = 2.0;
        assert!(matches!(store.save("bad", &bad), Err(Error::InvalidInput(_))));
        assert_eq!(store.count().expect("count"), 0);
    }

    #[test]
    fn missing_ids_are_not_found() {
        let store = DealStore::open_in_memory(ClassifierThresholds::default()).expect("store");
        assert!(matches!(store.get(42), Err(Error::NotFound(42))));
        assert!(matches!(store.delete(42), Err(Error::NotFound(42))));
    }

    #[test]
    fn reads_reclassify_under_current_thresholds() {
        let store = DealStore::open_in_memory(ClassifierThresholds::default()).expect("store");
        let saved = store.save("Elm St duplex", &sample_input()).expect("save");

        let raised = ClassifierThresholds {
            cash_flow_floor: 400.0,
            ..ClassifierThresholds::default()
        };
        let reread = DealStore {
            conn: store.conn,
            thresholds: raised,
        };

        let loaded = reread.get(saved.id).expect("get");
        assert_eq!(
            loaded.metrics,
            compute_metrics(&loaded.input, reread.thresholds()).expect("recompute")
        );
        assert_ne!(loaded.metrics.verdict, saved.metrics.verdict);

        let listed = reread.list().expect("list");
        assert_eq!(listed[0], DealSummary::from(&loaded));
    }

    #[test]
    fn list_orders_by_creation_time() {
        let store = DealStore::open_in_memory(ClassifierThresholds::default()).expect("store");
        let first = store.save("first", &sample_input()).expect("save first");
        let second = store.save("second", &sample_input()).expect("save second");

        let newest = store.list().expect("list");
        assert_eq!(
            newest.iter().map(|d| d.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );
        assert_eq!(newest[0], DealSummary::from(&second));

        let oldest = store.list_ordered(ListOrder::OldestFirst).expect("list");
        assert_eq!(
            oldest.iter().map(|d| d.id).collect::<Vec<_>>(),
            vec![first.id, second.id]
        );
    }
}

use crate::analysis::underwriting::compute_metrics;
use crate::commands::compare::{compare, comparison_rows};
use crate::commands::db::{DealStore, ListOrder};
use crate::commands::export::{export_csv, export_csv_many};
use crate::commands::settings::{get_settings, load_effective_settings, save_settings};
use crate::errors::{Error, Result};
use crate::models::deal::{
    format_currency, format_percent, DealInput, DealMetrics, RawDealInput, SavedDeal,
};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "dealscope")]
#[command(about = "Underwrite rental property deals, save them, and compare them")]
pub struct Cli {
    /// Directory holding settings.json and the deals database
    #[arg(long, global = true, env = "DEALSCOPE_DATA_DIR", default_value = ".dealscope")]
    pub data_dir: PathBuf,
    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute metrics without saving
    Analyze {
        #[command(flatten)]
        deal: DealArgs,
    },
    /// Compute metrics and save the deal
    Save {
        #[arg(long)]
        name: String,
        #[arg(long)]
        notes: Option<String>,
        #[command(flatten)]
        deal: DealArgs,
    },
    /// List saved deals, newest first
    List {
        #[arg(long, default_value_t = false)]
        oldest_first: bool,
    },
    Show {
        id: i64,
    },
    /// Side-by-side view of two saved deals
    Compare {
        left: i64,
        right: i64,
    },
    /// Write saved deals as CSV
    Export {
        ids: Vec<i64>,
        #[arg(long, default_value_t = false)]
        all: bool,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    Delete {
        id: i64,
    },
    /// Show settings, or merge a JSON object into them
    Settings {
        #[arg(long)]
        merge: Option<String>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct DealArgs {
    #[arg(long)]
    pub price: f64,
    /// Down payment as a fraction of price (0.2 = 20%)
    #[arg(long, conflicts_with = "ltv")]
    pub down: Option<f64>,
    /// Loan-to-value as a fraction of price
    #[arg(long)]
    pub ltv: Option<f64>,
    /// Annual interest rate as a fraction (0.065 = 6.5%)
    #[arg(long)]
    pub rate: f64,
    #[arg(long, default_value_t = 360)]
    pub term_months: i64,
    /// Monthly gross rent
    #[arg(long)]
    pub rent: f64,
    /// Monthly operating expenses
    #[arg(long, default_value_t = 0.0)]
    pub expenses: f64,
    #[arg(long)]
    pub vacancy: Option<f64>,
    #[arg(long)]
    pub closing_costs: Option<f64>,
    #[arg(long)]
    pub rehab_costs: Option<f64>,
    /// Lender points as a fraction of the loan (0.01 = 1 point)
    #[arg(long)]
    pub points: Option<f64>,
}

impl From<&DealArgs> for RawDealInput {
    fn from(args: &DealArgs) -> Self {
        RawDealInput {
            purchase_price: args.price,
            down_payment_fraction: args.down,
            loan_to_value: args.ltv,
            annual_interest_rate: args.rate,
            loan_term_months: args.term_months,
            monthly_gross_rent: args.rent,
            monthly_operating_expenses: args.expenses,
            vacancy_rate: args.vacancy,
            closing_costs: args.closing_costs,
            rehab_costs: args.rehab_costs,
            lender_points: args.points,
        }
    }
}

pub fn execute(cli: Cli) -> Result<()> {
    let settings = load_effective_settings(&cli.data_dir)?;
    let json = cli.json;

    if let Command::Settings { merge } = &cli.command {
        return run_settings(&cli.data_dir, merge.as_deref());
    }

    if let Command::Analyze { deal } = &cli.command {
        let input = DealInput::from_raw(&RawDealInput::from(deal), settings.default_vacancy_rate)?;
        let metrics = compute_metrics(&input, &settings.thresholds)?;
        if json {
            return print_json(&metrics);
        }
        print_metrics(&metrics);
        return Ok(());
    }

    let store = DealStore::open(&settings.database_path, settings.thresholds.clone())?;
    let outcome = run_store_command(&store, cli.command, settings.default_vacancy_rate, json);
    store.close()?;
    outcome
}

fn run_store_command(
    store: &DealStore,
    command: Command,
    default_vacancy_rate: f64,
    json: bool,
) -> Result<()> {
    match command {
        Command::Save { name, notes, deal } => {
            let input = DealInput::from_raw(&RawDealInput::from(&deal), default_vacancy_rate)?;
            let saved = store.save_with_notes(&name, notes.as_deref(), &input)?;
            if json {
                return print_json(&saved);
            }
            println!("Saved deal {} ({})", saved.id, saved.name);
            print_metrics(&saved.metrics);
        }
        Command::List { oldest_first } => {
            let order = if oldest_first {
                ListOrder::OldestFirst
            } else {
                ListOrder::NewestFirst
            };
            let deals = store.list_ordered(order)?;
            if json {
                return print_json(&deals);
            }
            if deals.is_empty() {
                println!("No saved deals yet.");
            }
            for d in deals {
                println!(
                    "{:>5}  {:<28} {:>15} {:>13}/mo {:>8} {:>8}  {}",
                    d.id,
                    truncate(&d.name, 28),
                    format_currency(d.purchase_price),
                    format_currency(d.monthly_cash_flow),
                    format_percent(d.cap_rate),
                    format_percent(d.cash_on_cash_return),
                    d.verdict
                );
            }
        }
        Command::Show { id } => {
            let deal = store.get(id)?;
            if json {
                return print_json(&deal);
            }
            print_deal(&deal);
        }
        Command::Compare { left, right } => {
            let (a, b) = compare(store, left, right)?;
            let rows = comparison_rows(&a, &b);
            if json {
                return print_json(&rows);
            }
            println!("{:<30} {:>20} {:>20}", "", truncate(&a.name, 20), truncate(&b.name, 20));
            for row in rows {
                println!("{:<30} {:>20} {:>20}", row.field, row.left_text, row.right_text);
            }
        }
        Command::Export { ids, all, out } => {
            let bytes = if all {
                export_csv_many(&store.all_deals(ListOrder::OldestFirst)?)?
            } else {
                match ids.as_slice() {
                    [] => return Err(Error::invalid("pass at least one deal id or --all")),
                    [id] => export_csv(&store.get(*id)?)?,
                    many => {
                        let deals = many
                            .iter()
                            .map(|id| store.get(*id))
                            .collect::<Result<Vec<_>>>()?;
                        export_csv_many(&deals)?
                    }
                }
            };
            write_export(out.as_deref(), &bytes)?;
        }
        Command::Delete { id } => {
            store.delete(id)?;
            println!("Deleted deal {id}");
        }
        Command::Analyze { .. } | Command::Settings { .. } => {}
    }

    Ok(())
}

fn run_settings(data_dir: &Path, merge: Option<&str>) -> Result<()> {
    let value = match merge {
        Some(raw) => {
            let patch = serde_json::from_str(raw)
                .map_err(|e| Error::Settings(format!("--merge is not valid JSON: {e}")))?;
            save_settings(data_dir, patch)?
        }
        None => get_settings(data_dir)?,
    };
    print_json(&value)
}

fn write_export(out: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match out {
        Some(path) => {
            fs::write(path, bytes)?;
            log::info!("Exported {} bytes to {}", bytes.len(), path.display());
        }
        None => print!("{}", String::from_utf8_lossy(bytes)),
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let raw = serde_json::to_string_pretty(value)
        .map_err(|e| Error::Settings(format!("Failed to serialize output: {e}")))?;
    println!("{raw}");
    Ok(())
}

fn print_metrics(m: &DealMetrics) {
    println!("Verdict:              {}", m.verdict);
    println!("Monthly cash flow:    {}", format_currency(m.monthly_cash_flow));
    println!("Cash-on-cash:         {}", format_percent(m.cash_on_cash_return));
    println!("Cap rate:             {}", format_percent(m.cap_rate));
    println!("Debt service (P&I):   {}/mo", format_currency(m.monthly_debt_service));
    println!("NOI:                  {}/mo", format_currency(m.monthly_noi));
    println!("Cash invested:        {}", format_currency(m.total_cash_invested));
    match m.breakeven_rent {
        Some(rent) => println!("Breakeven rent:       {}/mo", format_currency(rent)),
        None => println!("Breakeven rent:       n/a"),
    }
}

fn print_deal(deal: &SavedDeal) {
    let created = chrono::DateTime::from_timestamp_millis(deal.created_at)
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_default();
    println!("#{} {} (saved {created})", deal.id, deal.name);
    if let Some(notes) = &deal.notes {
        println!("Notes: {notes}");
    }
    let i = &deal.input;
    println!("Price:                {}", format_currency(i.purchase_price));
    println!("Down payment:         {}", format_percent(Some(i.down_payment_fraction)));
    println!("Interest rate:        {}", format_percent(Some(i.annual_interest_rate)));
    println!("Term:                 {} months", i.loan_term_months);
    println!("Rent:                 {}/mo", format_currency(i.monthly_gross_rent));
    println!("Operating expenses:   {}/mo", format_currency(i.monthly_operating_expenses));
    println!("Vacancy:              {}", format_percent(Some(i.vacancy_rate)));
    println!();
    print_metrics(&deal.metrics);
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let mut out: String = value.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

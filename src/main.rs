use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::path::PathBuf;

use debt_ledger::{
    add_to_debts, apply_command, get_all_credit_entries, get_all_debts, insert_credit_entries,
    insert_debt, link_debt, load_credit_report, setup_database, AlertEngine, ComparisonResult,
    Config, Debt, DebtSummary, DebtType, MinimumPayment, ReconciliationReport, Severity,
};

#[derive(Parser)]
#[command(name = "debt-ledger")]
#[command(about = "Track debts and reconcile them against your credit report")]
#[command(version)]
struct Cli {
    /// SQLite database path
    #[arg(long, global = true, env = "DEBT_LEDGER_DB")]
    db: Option<PathBuf>,

    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database tables
    Init,

    /// Record a debt
    AddDebt {
        name: String,

        balance: f64,

        #[arg(long)]
        lender: Option<String>,

        /// credit_card, loan, mortgage, overdraft, bnpl, store_card, other
        #[arg(long = "type", default_value = "other")]
        debt_type: String,

        /// Standard APR in percent
        #[arg(long)]
        apr: Option<f64>,

        #[arg(long)]
        promo_apr: Option<f64>,

        /// YYYY-MM-DD
        #[arg(long)]
        promo_end: Option<NaiveDate>,

        /// Fixed minimum payment
        #[arg(long, conflicts_with = "min_payment_pct")]
        min_payment: Option<f64>,

        /// Minimum payment as percent of balance
        #[arg(long)]
        min_payment_pct: Option<f64>,

        /// Day of month the payment is due
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=31))]
        payment_day: Option<u32>,
    },

    /// Import a credit report CSV
    Import { csv: PathBuf },

    /// List tracked debts
    Debts,

    /// Compare the credit report against tracked debts
    Reconcile {
        /// Add every unmatched credit entry as a new debt
        #[arg(long)]
        adopt_unmatched: bool,
    },

    /// Link a credit entry to a debt explicitly
    Link { entry_id: String, debt_id: String },

    /// Add an unmatched credit entry to your debts
    Adopt { entry_id: String },

    /// Show alerts (promo expiry, high APR, upcoming payments)
    Alerts {
        /// Reference date, defaults to today
        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// Show debt totals
    Summary,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    log::debug!("Using database {:?}", config.db_path);

    let conn = Connection::open(&config.db_path)
        .with_context(|| format!("Failed to open database {:?}", config.db_path))?;
    setup_database(&conn)?;

    match cli.command {
        Commands::Init => {
            println!("✓ Database initialized at {:?}", config.db_path);
        }
        Commands::AddDebt {
            name,
            balance,
            lender,
            debt_type,
            apr,
            promo_apr,
            promo_end,
            min_payment,
            min_payment_pct,
            payment_day,
        } => {
            let mut debt = Debt::new(name, lender, balance, DebtType::parse(&debt_type));
            debt.apr = apr;
            debt.promo_apr = promo_apr;
            debt.promo_end_date = promo_end;
            debt.minimum_payment = min_payment
                .map(MinimumPayment::Fixed)
                .or(min_payment_pct.map(MinimumPayment::Percent));
            debt.payment_day = payment_day;

            insert_debt(&conn, &debt)?;
            println!("✓ Added debt {} ({})", debt.name, debt.id);
        }
        Commands::Import { csv } => {
            println!("📂 Loading credit report...");
            let entries = load_credit_report(&csv)?;
            let imported = insert_credit_entries(&conn, &entries)?;
            println!("✓ Imported {} of {} entries", imported.inserted, entries.len());
            if imported.updated > 0 {
                println!("✓ Refreshed changed entries: {}", imported.updated);
            }
            if imported.unchanged > 0 {
                println!("✓ Skipped unchanged: {}", imported.unchanged);
            }
        }
        Commands::Debts => {
            let debts = get_all_debts(&conn)?;
            if debts.is_empty() {
                println!("No debts recorded.");
            }
            for debt in &debts {
                println!(
                    "{}  {:<30} {:<15} {:>12.2}  {}",
                    debt.id,
                    debt.name,
                    debt.lender.as_deref().unwrap_or("-"),
                    debt.balance,
                    debt.debt_type
                );
            }
        }
        Commands::Reconcile { adopt_unmatched } => run_reconcile(&conn, adopt_unmatched)?,
        Commands::Link { entry_id, debt_id } => {
            link_debt(&conn, &entry_id, &debt_id)?;
            println!("✓ Linked {} → {}", entry_id, debt_id);
        }
        Commands::Adopt { entry_id } => {
            let debt = add_to_debts(&conn, &entry_id)?;
            println!("✓ Added {} as debt {}", debt.name, debt.id);
        }
        Commands::Alerts { today } => {
            let today = today.unwrap_or_else(|| Local::now().date_naive());
            let debts = get_all_debts(&conn)?;
            let alerts = AlertEngine::with_settings(config.alerts.clone()).derive(&debts, today);

            if alerts.is_empty() {
                println!("✅ No alerts as of {}", today);
            }
            for alert in &alerts {
                let icon = match alert.severity {
                    Severity::Critical => "❌",
                    Severity::Warning => "⚠️ ",
                    Severity::Info => "ℹ️ ",
                };
                println!("{} {}", icon, alert.title);
                println!("   {}", alert.description);
            }
        }
        Commands::Summary => {
            let summary = DebtSummary::from_debts(&get_all_debts(&conn)?);
            println!("📊 {}", summary.summary());
            for (debt_type, balance) in &summary.balance_by_type {
                println!("   {:<12} ${:.2}", debt_type, balance);
            }
        }
    }

    Ok(())
}

fn run_reconcile(conn: &Connection, adopt_unmatched: bool) -> Result<()> {
    let entries = get_all_credit_entries(conn)?;
    let debts = get_all_debts(conn)?;

    // No credit report imported: nothing to show
    let Some(report) = ReconciliationReport::build(&entries, &debts) else {
        return Ok(());
    };
    log::info!("{}", report.summary());

    println!("⚖️  {}", report.summary());
    print_section("❌ Discrepancies", &report.discrepancies);
    print_section("❓ Not tracked", &report.unmatched);
    print_section("✓ Matched", &report.matched);

    if adopt_unmatched {
        let commands = report.suggested_commands();
        for command in &commands {
            apply_command(conn, command)?;
        }
        println!("\n✓ Added {} unmatched entries to debts", commands.len());
    }

    Ok(())
}

fn print_section(title: &str, results: &[ComparisonResult]) {
    if results.is_empty() {
        return;
    }

    println!("\n{} ({})", title, results.len());
    for result in results {
        let entry = &result.credit_entry;
        match &result.matched_debt {
            Some(debt) => {
                let diff = result
                    .balance_diff
                    .map(|d| format!("  off by ${:.2}", d))
                    .unwrap_or_default();
                println!(
                    "   {} {} ${:.2} ↔ {} ${:.2} [{}]{}",
                    entry.id,
                    entry.name,
                    entry.balance,
                    debt.name,
                    debt.balance,
                    result.matched_by.map(|r| r.as_str()).unwrap_or("-"),
                    diff
                );
            }
            None => println!("   {} {} ${:.2}", entry.id, entry.name, entry.balance),
        }
    }
}

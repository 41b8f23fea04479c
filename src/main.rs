use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use std::env;
use std::path::Path;

use expense_tracker::{
    import, init_tracing, setup_database, Config, Criteria, ExpenseInput, ExpenseService,
    PageRequest, SqliteExpenseStore, SummaryService,
};

const USAGE: &str = "Usage:
  expense-tracker import <csv> <user_id>
  expense-tracker list <user_id> [year] [month] [page]
  expense-tracker summary <user_id> [year] [month]
  expense-tracker add <user_id> <date> <amount> <category> <description>
  expense-tracker delete <user_id> <id>";

fn main() -> Result<()> {
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    let config = Config::from_env().context("Failed to load configuration")?;
    let conn = Connection::open(&config.database_path)
        .with_context(|| format!("Failed to open database {:?}", config.database_path))?;
    setup_database(&conn).context("Failed to set up database")?;

    match command.as_str() {
        "import" => run_import(&conn, &config, &args[1..]),
        "list" => run_list(&conn, &config, &args[1..]),
        "summary" => run_summary(&conn, &config, &args[1..]),
        "add" => run_add(&conn, &config, &args[1..]),
        "delete" => run_delete(&conn, &config, &args[1..]),
        other => bail!("Unknown command '{}'\n{}", other, USAGE),
    }
}

/// Parse the positional argument at `index`, `default` when absent
fn arg<T: std::str::FromStr>(args: &[String], index: usize, name: &str, default: Option<T>) -> Result<T> {
    match args.get(index) {
        Some(raw) => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid {}: '{}'", name, raw)),
        None => default.ok_or_else(|| anyhow::anyhow!("Missing {}\n{}", name, USAGE)),
    }
}

fn run_import(conn: &Connection, config: &Config, args: &[String]) -> Result<()> {
    let path = args
        .first()
        .map(Path::new)
        .ok_or_else(|| anyhow::anyhow!("Missing csv path\n{}", USAGE))?;
    let user_id: i64 = arg(args, 1, "user_id", None)?;

    println!("📂 Loading CSV {:?}...", path);
    let rows = import::read_file(path)?;
    println!("✓ Parsed {} rows", rows.len());

    let store = SqliteExpenseStore::new(conn);
    let service = ExpenseService::new(&store, &config.categories);
    let imported = service.import_rows(user_id, &rows)?;

    println!("✓ Imported {} expenses", imported);
    Ok(())
}

fn run_list(conn: &Connection, config: &Config, args: &[String]) -> Result<()> {
    let user_id: i64 = arg(args, 0, "user_id", None)?;
    let year: i32 = arg(args, 1, "year", Some(0))?;
    let month: u32 = arg(args, 2, "month", Some(0))?;
    let page: i64 = arg(args, 3, "page", Some(1))?;

    let store = SqliteExpenseStore::new(conn);
    let service = ExpenseService::new(&store, &config.categories);
    let criteria = Criteria::new(user_id, year, month)?;
    let listing = service.list(&criteria, PageRequest::new(page, config.page_size))?;

    let years: Vec<String> = listing.years.iter().map(|y| y.to_string()).collect();
    println!("Years with expenses: {}", years.join(", "));
    println!(
        "Page {}/{} ({} matching expenses)",
        listing.page.page,
        listing.page.total_pages().max(1),
        listing.page.total
    );
    for expense in &listing.page.items {
        println!(
            "{:>6}  {}  {:<14} {:>10}  {}",
            expense.id, expense.date, expense.category, expense.amount, expense.description
        );
    }
    if listing.page.has_next() {
        println!("... more on page {}", listing.page.page + 1);
    }
    Ok(())
}

fn run_summary(conn: &Connection, config: &Config, args: &[String]) -> Result<()> {
    let user_id: i64 = arg(args, 0, "user_id", None)?;
    let year: i32 = arg(args, 1, "year", Some(0))?;
    let month: u32 = arg(args, 2, "month", Some(0))?;

    let store = SqliteExpenseStore::new(conn);
    let criteria = Criteria::new(user_id, year, month)?;
    let dashboard = SummaryService::new(&store).dashboard(&criteria, &config.budgets)?;

    println!("Total spent: {}", dashboard.total);

    println!("\nBy category:");
    for total in &dashboard.category_totals {
        println!("  {:<14} {:>10}", total.category, total.total);
    }

    println!("\nAverage per expense:");
    for average in &dashboard.category_averages {
        println!("  {:<14} {:>10.2}", average.category, average.average_major());
    }

    if !dashboard.alerts.is_empty() {
        println!("\n⚠️  Alerts:");
        for alert in &dashboard.alerts {
            println!("  {}", alert);
        }
    }
    Ok(())
}

fn run_add(conn: &Connection, config: &Config, args: &[String]) -> Result<()> {
    let user_id: i64 = arg(args, 0, "user_id", None)?;
    if args.len() < 5 {
        bail!("Missing arguments\n{}", USAGE);
    }

    let input = ExpenseInput {
        date: args[1].clone(),
        amount: args[2].clone(),
        category: args[3].clone(),
        description: args[4..].join(" "),
    };

    let store = SqliteExpenseStore::new(conn);
    let service = ExpenseService::new(&store, &config.categories);
    let expense = service.create(user_id, &input)?;

    println!("✓ Expense {} created", expense.id);
    Ok(())
}

fn run_delete(conn: &Connection, config: &Config, args: &[String]) -> Result<()> {
    let user_id: i64 = arg(args, 0, "user_id", None)?;
    let id: i64 = arg(args, 1, "id", None)?;

    let store = SqliteExpenseStore::new(conn);
    let service = ExpenseService::new(&store, &config.categories);
    service.delete(user_id, id)?;

    println!("✓ Expense {} deleted", id);
    Ok(())
}

use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use serde::Serialize;

use trade_ledger_lib::ledger::validation::parse_date;
use trade_ledger_lib::stats::CalendarDay;
use trade_ledger_lib::{
    compute_summary, equity_curve, open_ledger, CalendarMonth, LedgerConfig, TradeFilters,
    TradeInput, TradeType,
};

#[derive(Parser)]
#[command(name = "trade-ledger", version, about = "Trading journal: log trades, review P&L")]
struct Cli {
    /// Path to a JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print reports as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record a closed trade
    Add {
        #[arg(long)]
        symbol: String,
        /// LONG or SHORT
        #[arg(long = "type", default_value = "LONG")]
        trade_type: String,
        #[arg(long)]
        entry: String,
        #[arg(long)]
        exit: String,
        #[arg(long)]
        quantity: String,
        /// YYYY-MM-DD, defaults to today
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Delete a trade by id
    Delete { id: String },
    /// List trades in the order they were recorded
    List {
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long = "type")]
        trade_type: Option<TradeType>,
        #[arg(long, value_parser = parse_cli_date)]
        from: Option<NaiveDate>,
        #[arg(long, value_parser = parse_cli_date)]
        to: Option<NaiveDate>,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Win rate, totals, best and worst trade
    Summary,
    /// Daily P&L for one month
    Calendar {
        /// YYYY-MM, defaults to the current month
        #[arg(long)]
        month: Option<CalendarMonth>,
    },
    /// Cumulative P&L by date
    Equity,
}

fn parse_cli_date(raw: &str) -> Result<NaiveDate, String> {
    parse_date(raw).map_err(|e| e.to_string())
}

/// `day/pnl` for a calendar cell that has trades.
fn format_day_cell(day: usize, total_pnl: f64) -> String {
    format!("{}/{:+.0}", day, total_pnl)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = LedgerConfig::load_or_default(cli.config.as_deref())?;
    let mut ledger = open_ledger(&config).context("failed to open ledger")?;
    let currency = config.currency.as_str();

    match cli.command {
        Command::Add {
            symbol,
            trade_type,
            entry,
            exit,
            quantity,
            date,
            notes,
        } => {
            let input = TradeInput {
                symbol,
                trade_type,
                entry_price: entry,
                exit_price: exit,
                quantity,
                date: date.unwrap_or_else(|| Local::now().date_naive().to_string()),
                notes,
            };

            let outcome = ledger.record_form(&input)?;
            let trade = &outcome.value;
            println!(
                "Recorded {} {} {} on {}: {:.2} {} ({:.2}%)",
                trade.id, trade.trade_type, trade.symbol, trade.date, trade.pnl, currency, trade.pnl_percentage
            );
            outcome.into_result().context("trade was not saved")?;
        }
        Command::Delete { id } => match ledger.delete_trade(&id).into_result()? {
            Some(trade) => println!("Deleted {} ({})", trade.id, trade.symbol),
            None => println!("No trade with id {}", id),
        },
        Command::List {
            symbol,
            trade_type,
            from,
            to,
            page,
            limit,
        } => {
            if page.is_some() != limit.is_some() {
                bail!("--page and --limit must be given together");
            }
            let filters = TradeFilters {
                symbol,
                trade_type,
                start_date: from,
                end_date: to,
                page,
                limit,
            };
            let trades = ledger.query(&filters);

            if cli.json {
                return print_json(&trades);
            }
            for t in &trades {
                println!(
                    "{}  {}  {:<5} {:<10} {:>12.4} -> {:<12.4} x {:<10} {:>12.2} {} {:>8.2}%  {}",
                    t.id,
                    t.date,
                    t.trade_type,
                    t.symbol,
                    t.entry_price,
                    t.exit_price,
                    t.quantity,
                    t.pnl,
                    currency,
                    t.pnl_percentage,
                    t.notes.as_deref().unwrap_or("")
                );
            }
            let subtotal = compute_summary(trades.iter().copied());
            println!("{} trades, net {:.2} {}", subtotal.total_trades, subtotal.total_pnl, currency);
        }
        Command::Summary => {
            let summary = ledger.summary();
            if cli.json {
                return print_json(&summary);
            }

            println!("Total trades:  {}", summary.total_trades);
            println!("Winning:       {}", summary.winning_trades);
            println!("Losing:        {}", summary.losing_trades);
            println!("Win rate:      {:.1}%", summary.win_rate);
            println!("Total P&L:     {:.2} {}", summary.total_pnl, currency);
            println!("Average P&L:   {:.2} {}", summary.average_pnl, currency);
            match summary.profit_factor {
                Some(pf) => println!("Profit factor: {:.2}", pf),
                None => println!("Profit factor: -"),
            }
            if let Some(best) = &summary.best_trade {
                println!("Best trade:    {} {:.2} {} on {}", best.symbol, best.pnl, currency, best.date);
            }
            if let Some(worst) = &summary.worst_trade {
                println!("Worst trade:   {} {:.2} {} on {}", worst.symbol, worst.pnl, currency, worst.date);
            }
        }
        Command::Calendar { month } => {
            let month = month.unwrap_or_else(|| CalendarMonth::containing(Local::now().date_naive()));
            let days: Vec<CalendarDay> = month.days(&ledger.daily());
            if cli.json {
                return print_json(&days);
            }

            println!("{}", month);
            println!("{:>9}{:>9}{:>9}{:>9}{:>9}{:>9}{:>9}", "Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat");
            let mut line = " ".repeat(9 * month.first_weekday_offset() as usize);
            for (i, day) in days.iter().enumerate() {
                let cell = if day.has_trades() {
                    format_day_cell(i + 1, day.total_pnl)
                } else {
                    format!("{}", i + 1)
                };
                line.push_str(&format!("{:>9}", cell));
                if (month.first_weekday_offset() as usize + i + 1) % 7 == 0 {
                    println!("{}", line);
                    line.clear();
                }
            }
            if !line.is_empty() {
                println!("{}", line);
            }
        }
        Command::Equity => {
            let curve = equity_curve(ledger.trades());
            if cli.json {
                return print_json(&curve);
            }
            for point in &curve {
                println!(
                    "{}  {:>3} trades  {:>12.2}  {:>12.2} {}",
                    point.date, point.trade_count, point.daily_pnl, point.cumulative_pnl, currency
                );
            }
        }
    }

    Ok(())
}

mod analysis;
mod chart;
mod client;
mod config;
mod error;
mod history;
mod indicators;
mod live;
mod markets;
mod registry;
mod storage;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use comfy_table::{Attribute, Cell, CellAlignment, ContentArrangement, Table};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_BORDERS_ONLY};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::analysis::CoinAnalysis;
use crate::chart::{ChartView, spawn_cancel_listener};
use crate::client::GeckoClient;
use crate::config::AppConfig;
use crate::error::MarketError;
use crate::live::{HistoryTicks, LiveOptions, run_live};
use crate::markets::format_usd;
use crate::registry::CoinRegistry;
use crate::storage::StorageManager;

const EXPORT_DIR: &str = "exports";

/// Log to `logs/coinscope.log`; the terminal stays clean for the menu.
fn init_tracing() -> Result<()> {
    std::fs::create_dir_all("logs")?;
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("logs/coinscope.log")
        .context("failed to open log file")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Arc::new(log_file))
        .with_ansi(false)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    std::fs::create_dir_all(EXPORT_DIR)?;

    let storage = StorageManager::new(".cache").await?;
    let config = AppConfig::load(&storage).await;
    let client = GeckoClient::new();

    println!("Loading coin catalog...");
    let registry = CoinRegistry::init(&client, &storage).await;
    if registry.is_empty() {
        println!("Warning: coin catalog unavailable, symbol lookup degraded.");
    }
    info!("coinscope started");

    loop {
        println!("\n=== COINSCOPE ===");
        println!("1. View Top Cryptocurrencies");
        println!("2. Analyze Specific Coin (Historical)");
        println!("3. Live Coin Analysis");
        println!("4. Exit");

        let choice = prompt("\nSelect option (1-4): ").await?;
        match choice.as_str() {
            "1" => top_coins_screen(&client, &config).await?,
            "2" => analyze_screen(&client, &registry, &config).await?,
            "3" => live_screen(&client, &registry, &config).await?,
            "4" => {
                println!("Exiting...");
                break;
            }
            _ => println!("Invalid choice, please try again"),
        }

        prompt("\nPress Enter to continue...").await?;
        let _ = clearscreen::clear();
    }

    Ok(())
}

/// Blocking stdin isolated on the blocking pool.
async fn prompt(label: &str) -> Result<String> {
    let label = label.to_string();
    let line = tokio::task::spawn_blocking(move || -> Result<String> {
        let mut out = std::io::stdout();
        write!(out, "{label}")?;
        out.flush()?;

        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        Ok(line.trim().to_string())
    })
    .await??;
    Ok(line)
}

/// Parse a numeric prompt answer; empty input means `default`.
fn parse_or_default<T: std::str::FromStr>(input: &str, default: T) -> Option<T> {
    if input.is_empty() {
        Some(default)
    } else {
        input.parse().ok()
    }
}

async fn top_coins_screen(client: &GeckoClient, config: &AppConfig) -> Result<()> {
    let input = prompt(&format!(
        "Number of coins to display (default {}): ",
        config.top_limit
    ))
    .await?;
    let Some(limit) = parse_or_default(&input, config.top_limit) else {
        println!("Please enter a valid number");
        return Ok(());
    };

    let coins = match markets::fetch_top_coins(client, limit).await {
        Ok(coins) => coins,
        Err(e) => {
            error!(error = %e, "top coins fetch failed");
            println!("Failed to retrieve data");
            return Ok(());
        }
    };

    println!("\nTOP {limit} CRYPTOCURRENCIES BY MARKET CAP");
    println!("{}", markets::render_table(&coins));
    println!(
        "\nLast updated: {}",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );

    let export = prompt("\nExport to CSV? (y/n): ").await?;
    if export.eq_ignore_ascii_case("y") {
        match markets::export_csv(&coins, Path::new(EXPORT_DIR)) {
            Ok(path) => println!("Data exported to {}", path.display()),
            Err(e) => {
                error!(error = %e, "csv export failed");
                println!("Export failed");
            }
        }
    }

    Ok(())
}

async fn analyze_screen(
    client: &GeckoClient,
    registry: &CoinRegistry,
    config: &AppConfig,
) -> Result<()> {
    let input = prompt("Enter coin ID/symbol: ").await?;
    if input.is_empty() {
        return Ok(());
    }

    println!("\nAnalyzing {}...", input.to_uppercase());
    match analysis::analyze(client, registry, &input, config.history_days).await {
        Ok(result) => print_analysis(&result),
        Err(MarketError::NotFound(_)) => print_not_found(&input),
        Err(e) => {
            error!(error = %e, "analysis failed");
            println!("Failed to get historical data");
        }
    }

    Ok(())
}

fn print_analysis(result: &CoinAnalysis) {
    println!("\n=== SUMMARY: {} ===", result.id.to_uppercase());
    println!("Current Price: {}", format_usd(Some(result.current_price), 2));
    println!("Latest Volume: {}", format_usd(Some(result.latest_volume), 0));
    println!("Period High:   {}", format_usd(Some(result.high), 2));
    println!("Period Low:    {}", format_usd(Some(result.low), 2));
    match result.latest_rsi {
        Some(rsi) => println!("Current RSI:   {rsi:.2}"),
        None => println!("Current RSI:   not enough samples"),
    }

    // Tail of the annotated series, most recent last.
    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Time").add_attribute(Attribute::Bold),
            Cell::new("Price").add_attribute(Attribute::Bold).set_alignment(CellAlignment::Right),
            Cell::new("MA 7").add_attribute(Attribute::Bold).set_alignment(CellAlignment::Right),
            Cell::new("MA 30").add_attribute(Attribute::Bold).set_alignment(CellAlignment::Right),
            Cell::new("RSI").add_attribute(Attribute::Bold).set_alignment(CellAlignment::Right),
        ]);

    let tail = result.series.iter().rev().take(10).rev();
    for point in tail {
        let time = DateTime::from_timestamp_millis(point.timestamp_ms)
            .map(|dt| dt.format("%d-%m-%Y %H:%M").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        table.add_row(vec![
            Cell::new(time),
            Cell::new(format!("{:.2}", point.price)).set_alignment(CellAlignment::Right),
            Cell::new(optional_cell(point.ma_short)).set_alignment(CellAlignment::Right),
            Cell::new(optional_cell(point.ma_long)).set_alignment(CellAlignment::Right),
            Cell::new(optional_cell(point.rsi)).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("\n{table}");
}

fn optional_cell(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.2}"))
        .unwrap_or_else(|| "—".to_string())
}

fn print_not_found(input: &str) {
    println!("\nInvalid coin identifier: '{input}'");
    println!("Please use either:");
    println!("- a provider ID (e.g. 'bitcoin', 'ripple')");
    println!("- a ticker symbol (e.g. 'BTC', 'XRP')");
    println!("\nCommon examples:");
    println!("XRP -> ripple");
    println!("ADA -> cardano");
    println!("DOGE -> dogecoin");
}

async fn live_screen(
    client: &GeckoClient,
    registry: &CoinRegistry,
    config: &AppConfig,
) -> Result<()> {
    let input = prompt("Enter coin ID/symbol for live analysis: ").await?;
    if input.is_empty() {
        return Ok(());
    }

    let interval_input = prompt(&format!(
        "Update interval in seconds (default {}): ",
        config.live_interval_secs
    ))
    .await?;
    let duration_input = prompt(&format!(
        "Total duration in seconds (default {}): ",
        config.live_duration_secs
    ))
    .await?;

    let (Some(interval_secs), Some(duration_secs)) = (
        parse_or_default(&interval_input, config.live_interval_secs),
        parse_or_default(&duration_input, config.live_duration_secs),
    ) else {
        println!("Please enter valid numbers");
        return Ok(());
    };

    let id = match registry.resolve(&input, client).await {
        Ok(id) => id,
        Err(MarketError::NotFound(_)) => {
            print_not_found(&input);
            return Ok(());
        }
        Err(e) => {
            error!(error = %e, "resolution failed");
            println!("Failed to resolve '{input}'");
            return Ok(());
        }
    };

    // The chart view owns the terminal until it drops; the key listener
    // needs raw mode, so it starts after the view.
    let mut view = ChartView::new(&id)?;
    let (cancel, listener) = spawn_cancel_listener();
    let mut source = HistoryTicks { client, id: &id };

    let outcome = run_live(
        &mut source,
        &mut view,
        LiveOptions {
            interval_secs,
            duration_secs,
        },
        cancel,
    )
    .await;

    listener.abort();
    drop(view);

    match outcome {
        Ok(()) => println!("\nLive analysis stopped"),
        Err(e) => {
            error!(error = %e, "live analysis aborted");
            println!("\nLive analysis aborted: {e}");
        }
    }

    Ok(())
}

//! Ranked market snapshot: fetch, terminal table, CSV export.

use chrono::Local;
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ContentArrangement, Table,
    modifiers::UTF8_ROUND_CORNERS, presets::UTF8_BORDERS_ONLY,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::client::GeckoClient;
use crate::error::MarketError;

/// One row of the `coins/markets` snapshot. Numeric fields are nullable on
/// the wire for freshly listed or stale coins.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MarketCoin {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
}

/// Fetch the top `limit` coins by market capitalization, priced in USD.
pub async fn fetch_top_coins(
    client: &GeckoClient,
    limit: usize,
) -> Result<Vec<MarketCoin>, MarketError> {
    let params = [
        ("vs_currency", "usd".to_string()),
        ("order", "market_cap_desc".to_string()),
        ("per_page", limit.to_string()),
        ("page", "1".to_string()),
        ("sparkline", "false".to_string()),
    ];
    client.request("coins/markets", &params).await
}

/// Render the snapshot as a ranked table.
pub fn render_table(coins: &[MarketCoin]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Rank").add_attribute(Attribute::Bold),
            Cell::new("Symbol").add_attribute(Attribute::Bold),
            Cell::new("Name").add_attribute(Attribute::Bold),
            Cell::new("Price (USD)")
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
            Cell::new("Market Cap")
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
            Cell::new("24h %")
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
        ]);

    for (i, coin) in coins.iter().enumerate() {
        let change = coin.price_change_percentage_24h;
        let change_color = match change {
            Some(pct) if pct < 0.0 => Color::Red,
            Some(_) => Color::Green,
            None => Color::DarkGrey,
        };
        let change_text = change
            .map(|pct| format!("{pct:.2}%"))
            .unwrap_or_else(|| "—".to_string());

        table.add_row(vec![
            Cell::new(i + 1).fg(Color::DarkGrey),
            Cell::new(coin.symbol.to_uppercase()).fg(Color::Cyan),
            Cell::new(&coin.name),
            Cell::new(format_usd(coin.current_price, 2)).set_alignment(CellAlignment::Right),
            Cell::new(format_usd(coin.market_cap, 0)).set_alignment(CellAlignment::Right),
            Cell::new(change_text)
                .fg(change_color)
                .set_alignment(CellAlignment::Right),
        ]);
    }

    table
}

/// Write the snapshot to `exports/top_{n}_coins_{stamp}.csv` and return the
/// path.
pub fn export_csv(coins: &[MarketCoin], export_dir: &Path) -> anyhow::Result<PathBuf> {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let path = export_dir.join(format!("top_{}_coins_{stamp}.csv", coins.len()));

    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record([
        "id",
        "symbol",
        "name",
        "current_price",
        "market_cap",
        "price_change_percentage_24h",
    ])?;
    for coin in coins {
        let record = [
            coin.id.clone(),
            coin.symbol.clone(),
            coin.name.clone(),
            optional_number(coin.current_price),
            optional_number(coin.market_cap),
            optional_number(coin.price_change_percentage_24h),
        ];
        writer.write_record(&record)?;
    }
    writer.flush()?;

    Ok(path)
}

fn optional_number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// `$1,234,567.89`-style formatting; `—` when the provider had no value.
pub fn format_usd(value: Option<f64>, decimals: usize) -> String {
    let Some(value) = value else {
        return "—".to_string();
    };

    let negative = value < 0.0;
    let formatted = format!("{:.decimals$}", value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push('$');
    out.push_str(&grouped);
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coin(id: &str, price: Option<f64>) -> MarketCoin {
        MarketCoin {
            id: id.to_string(),
            symbol: id[..3.min(id.len())].to_string(),
            name: id.to_string(),
            current_price: price,
            market_cap: Some(1_000_000.0),
            price_change_percentage_24h: Some(-1.5),
        }
    }

    #[test]
    fn usd_formatting_groups_thousands() {
        assert_eq!(format_usd(Some(1234567.891), 2), "$1,234,567.89");
        assert_eq!(format_usd(Some(999.0), 2), "$999.00");
        assert_eq!(format_usd(Some(1000.0), 0), "$1,000");
        assert_eq!(format_usd(Some(-42.5), 2), "-$42.50");
        assert_eq!(format_usd(None, 2), "—");
    }

    #[test]
    fn table_has_one_row_per_coin_plus_header() {
        let coins = vec![coin("bitcoin", Some(50000.0)), coin("ethereum", Some(3000.0))];
        let table = render_table(&coins);
        // Header is separate from data rows in comfy-table.
        assert_eq!(table.row_iter().count(), 2);
    }

    #[test]
    fn csv_export_writes_header_and_rows() {
        let dir = std::env::temp_dir().join(format!("coinscope-export-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let coins = vec![coin("bitcoin", Some(50000.0)), coin("ethereum", None)];
        let path = export_csv(&coins, &dir).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,symbol,name"));
        assert!(lines[1].starts_with("bitcoin,bit,bitcoin,50000"));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn nullable_market_fields_decode() {
        let payload = r#"[{
            "id": "newcoin",
            "symbol": "new",
            "name": "New Coin",
            "current_price": null,
            "market_cap": null,
            "price_change_percentage_24h": null
        }]"#;
        let coins: Vec<MarketCoin> = serde_json::from_str(payload).unwrap();
        assert_eq!(coins.len(), 1);
        assert!(coins[0].current_price.is_none());
    }
}

//! Historical price/volume series retrieval and alignment.

use serde::Deserialize;

use crate::client::GeckoClient;
use crate::error::MarketError;
use std::collections::HashMap;

/// One aligned sample of the merged price/volume series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    /// Milliseconds since the Unix epoch, as reported by the provider.
    pub timestamp_ms: i64,
    pub price: f64,
    pub volume: f64,
}

/// Raw `market_chart` payload: parallel `[timestamp_ms, value]` series.
#[derive(Deserialize, Debug)]
struct MarketChart {
    #[serde(default)]
    prices: Vec<(i64, f64)>,
    #[serde(default)]
    total_volumes: Vec<(i64, f64)>,
}

/// Fetch the aligned price/volume history for `id` over the last `days`
/// days, priced in USD.
///
/// Zero samples from the provider is not an error: the result is simply an
/// empty series. A failed request propagates as `RemoteUnavailable`.
pub async fn fetch_history(
    client: &GeckoClient,
    id: &str,
    days: u32,
) -> Result<Vec<PricePoint>, MarketError> {
    let endpoint = format!("coins/{id}/market_chart");
    let params = [
        ("vs_currency", "usd".to_string()),
        ("days", days.to_string()),
    ];

    let chart: MarketChart = client.request(&endpoint, &params).await?;
    Ok(merge_series(&chart.prices, &chart.total_volumes))
}

/// Merge the two raw series by exact timestamp match, ordered ascending.
///
/// Inner-join semantics: a timestamp present in only one series is dropped
/// rather than interpolated.
pub fn merge_series(prices: &[(i64, f64)], volumes: &[(i64, f64)]) -> Vec<PricePoint> {
    let volume_by_ts: HashMap<i64, f64> = volumes.iter().copied().collect();

    let mut points: Vec<PricePoint> = prices
        .iter()
        .filter_map(|&(timestamp_ms, price)| {
            volume_by_ts.get(&timestamp_ms).map(|&volume| PricePoint {
                timestamp_ms,
                price,
                volume,
            })
        })
        .collect();

    points.sort_unstable_by_key(|p| p.timestamp_ms);
    points
}

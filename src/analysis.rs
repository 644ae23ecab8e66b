//! One-shot coin analysis: resolve, fetch, annotate, summarize.

use tracing::info;

use crate::client::GeckoClient;
use crate::error::MarketError;
use crate::history;
use crate::indicators::{self, IndicatorPoint};
use crate::registry::CoinRegistry;

/// A fully annotated series plus the scalar summary values presentation
/// layers care about.
#[derive(Debug, Clone)]
pub struct CoinAnalysis {
    pub id: String,
    pub series: Vec<IndicatorPoint>,
    pub current_price: f64,
    pub latest_volume: f64,
    pub high: f64,
    pub low: f64,
    pub latest_rsi: Option<f64>,
}

impl CoinAnalysis {
    /// Derive the summary scalars from an annotated series.
    pub fn from_series(id: String, series: Vec<IndicatorPoint>) -> Result<Self, MarketError> {
        let last = series.last().copied().ok_or(MarketError::InsufficientData)?;
        let high = series.iter().map(|p| p.price).fold(f64::MIN, f64::max);
        let low = series.iter().map(|p| p.price).fold(f64::MAX, f64::min);

        Ok(Self {
            id,
            current_price: last.price,
            latest_volume: last.volume,
            high,
            low,
            latest_rsi: last.rsi,
            series,
        })
    }
}

/// Resolve `input`, pull `days` of history, and annotate it.
///
/// `NotFound` from resolution surfaces untouched; it is never silently
/// retried here.
pub async fn analyze(
    client: &GeckoClient,
    registry: &CoinRegistry,
    input: &str,
    days: u32,
) -> Result<CoinAnalysis, MarketError> {
    let id = registry.resolve(input, client).await?;
    info!(id = %id, days, "analyzing coin");

    let raw = history::fetch_history(client, &id, days).await?;
    let series = indicators::annotate(&raw)?;
    CoinAnalysis::from_series(id, series)
}

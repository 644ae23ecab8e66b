//! Symbol-to-identifier resolution backed by the provider's coin catalog.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use tracing::{debug, info, warn};

use crate::client::GeckoClient;
use crate::error::MarketError;
use crate::history;
use crate::storage::StorageManager;

/// Tickers known to collide with several catalog entries, pinned to one
/// canonical identifier. Applied after the catalog, so they always win.
const SYMBOL_OVERRIDES: &[(&str, &str)] = &[
    ("xrp", "ripple"),
    ("ada", "cardano"),
    ("doge", "dogecoin"),
];

/// One row of the provider's full coin catalog. The cache file holds the
/// verbatim decoded payload, so this mirrors the wire shape.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CatalogEntry {
    pub id: String,
    pub symbol: String,
    pub name: String,
}

/// First-stage resolution outcome. `Unverifiable` carries the lowercased
/// input as a candidate identifier for the probe stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(String),
    Unverifiable(String),
}

/// Owns the symbol→identifier mapping. Built once at startup and passed by
/// reference to everything that resolves user input.
pub struct CoinRegistry {
    symbol_to_id: HashMap<String, String>,
}

impl CoinRegistry {
    /// Load-or-build init: use the persisted catalog cache when it loads,
    /// otherwise fetch the full catalog and persist it. A failed fetch
    /// leaves the registry empty; every resolution then falls through to
    /// the probe path.
    pub async fn init(client: &GeckoClient, storage: &StorageManager) -> Self {
        let catalog: Vec<CatalogEntry> = match storage.load("coin_list").await {
            Ok(cached) => cached,
            Err(_) => match client.request::<Vec<CatalogEntry>>("coins/list", &[]).await {
                Ok(fetched) => {
                    if let Err(e) = storage.save("coin_list", &fetched).await {
                        warn!(error = %e, "failed to persist coin catalog");
                    }
                    fetched
                }
                Err(e) => {
                    warn!(error = %e, "catalog unavailable, registry starts empty");
                    Vec::new()
                }
            },
        };

        let registry = Self::from_catalog(catalog);
        info!(symbols = registry.len(), "coin registry ready");
        registry
    }

    /// Build the mapping from a decoded catalog. Later catalog entries win
    /// over earlier duplicates; the fixed override list wins over both.
    pub fn from_catalog(catalog: Vec<CatalogEntry>) -> Self {
        let mut symbol_to_id = HashMap::with_capacity(catalog.len());
        for entry in catalog {
            symbol_to_id.insert(entry.symbol.to_lowercase(), entry.id);
        }
        for (symbol, id) in SYMBOL_OVERRIDES {
            symbol_to_id.insert((*symbol).to_string(), (*id).to_string());
        }
        Self { symbol_to_id }
    }

    pub fn len(&self) -> usize {
        self.symbol_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbol_to_id.is_empty()
    }

    /// Stage one: pure, case-insensitive map lookup. A miss is not a
    /// failure: the input may still be a literal provider identifier the
    /// catalog does not know about.
    pub fn lookup(&self, input: &str) -> Resolution {
        let key = input.trim().to_lowercase();
        match self.symbol_to_id.get(&key) {
            Some(id) => Resolution::Resolved(id.clone()),
            None => Resolution::Unverifiable(key),
        }
    }

    /// Stage two: resolve `input` to a provider identifier, probing the
    /// provider with a minimal 1-day history request when the catalog has no
    /// answer. Any string the provider itself accepts is accepted here.
    pub async fn resolve(
        &self,
        input: &str,
        client: &GeckoClient,
    ) -> Result<String, MarketError> {
        self.resolve_with_probe(input, |candidate| async move {
            history::fetch_history(client, &candidate, 1).await.map(|_| ())
        })
        .await
    }

    /// Resolution with an injectable probe, so the verification path can be
    /// exercised without a network.
    pub async fn resolve_with_probe<F, Fut>(
        &self,
        input: &str,
        probe: F,
    ) -> Result<String, MarketError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<(), MarketError>>,
    {
        match self.lookup(input) {
            Resolution::Resolved(id) => Ok(id),
            Resolution::Unverifiable(candidate) => match probe(candidate.clone()).await {
                Ok(()) => {
                    debug!(id = %candidate, "provider accepted literal identifier");
                    Ok(candidate)
                }
                Err(e) => {
                    // Nonexistent coin and unreachable provider look the same
                    // from here; the distinction lives in this log line only.
                    warn!(input, error = %e, "identifier probe failed");
                    Err(MarketError::NotFound(input.to_string()))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, symbol: &str) -> CatalogEntry {
        CatalogEntry {
            id: id.to_string(),
            symbol: symbol.to_string(),
            name: id.to_string(),
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let registry = CoinRegistry::from_catalog(vec![entry("bitcoin", "btc")]);
        assert_eq!(
            registry.lookup("BTC"),
            Resolution::Resolved("bitcoin".to_string())
        );
    }

    #[test]
    fn override_wins_over_catalog() {
        // The catalog maps "xrp" elsewhere; the pinned override must win.
        let registry = CoinRegistry::from_catalog(vec![entry("xrp-wrapped-thing", "xrp")]);
        assert_eq!(
            registry.lookup("xrp"),
            Resolution::Resolved("ripple".to_string())
        );
    }

    #[test]
    fn later_catalog_duplicate_wins() {
        let registry = CoinRegistry::from_catalog(vec![
            entry("first-coin", "abc"),
            entry("second-coin", "abc"),
        ]);
        assert_eq!(
            registry.lookup("abc"),
            Resolution::Resolved("second-coin".to_string())
        );
    }

    #[test]
    fn miss_yields_lowercased_candidate() {
        let registry = CoinRegistry::from_catalog(Vec::new());
        assert_eq!(
            registry.lookup("Bitcoin"),
            Resolution::Unverifiable("bitcoin".to_string())
        );
    }

    #[tokio::test]
    async fn accepted_probe_resolves_literal() {
        let registry = CoinRegistry::from_catalog(Vec::new());
        let id = registry
            .resolve_with_probe("wrapped-beacon-eth", |_| async { Ok(()) })
            .await
            .unwrap();
        assert_eq!(id, "wrapped-beacon-eth");
    }

    #[tokio::test]
    async fn failed_probe_is_not_found() {
        let registry = CoinRegistry::from_catalog(vec![entry("bitcoin", "btc")]);
        let err = registry
            .resolve_with_probe("no-such-coin", |_| async {
                Err(MarketError::RemoteUnavailable {
                    endpoint: "coins/no-such-coin/market_chart".to_string(),
                    detail: "error status: 404".to_string(),
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::NotFound(_)));
    }

    #[tokio::test]
    async fn catalog_hit_skips_the_probe() {
        // The probe would reject; a catalog hit must resolve without it.
        let registry = CoinRegistry::from_catalog(vec![entry("bitcoin", "btc")]);
        let id = registry
            .resolve_with_probe("btc", |_| async {
                Err(MarketError::RemoteUnavailable {
                    endpoint: "coins/btc/market_chart".to_string(),
                    detail: "probe must not run".to_string(),
                })
            })
            .await
            .unwrap();
        assert_eq!(id, "bitcoin");
    }
}

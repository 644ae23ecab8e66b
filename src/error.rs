//! Error kinds shared by the data-resolution and indicator pipeline.

use thiserror::Error;

/// Failures the market-data core can surface to its callers.
///
/// None of these is ever treated as process-fatal: the live loop recovers
/// from `RemoteUnavailable` and `InsufficientData` locally, and one-shot
/// callers report them and return to the menu.
#[derive(Error, Debug)]
pub enum MarketError {
    /// A single request failed: transport error, HTTP error status, or a
    /// payload that did not decode. Callers decide whether to retry on a
    /// future cadence; the client itself never does.
    #[error("provider unavailable for `{endpoint}`: {detail}")]
    RemoteUnavailable { endpoint: String, detail: String },

    /// The input neither matched the catalog nor was accepted by the
    /// provider as a literal identifier.
    #[error("`{0}` does not resolve to any known coin")]
    NotFound(String),

    /// An annotate operation was given an empty series.
    #[error("no samples to annotate")]
    InsufficientData,
}

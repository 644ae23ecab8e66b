//! Drift-corrected live refresh loop.
//!
//! `Running → (tick)* → Stopped`. Each tick re-fetches one day of history
//! and re-annotates it; a failed tick is logged and skipped, costing exactly
//! one interval before the next attempt. The loop stops when the configured
//! duration elapses, the cancellation channel fires, or the presentation
//! sink reports an unrecoverable error.

use tokio::sync::watch;
use tokio::time::{Duration, Instant, sleep};
use tracing::{info, warn};

use crate::client::GeckoClient;
use crate::error::MarketError;
use crate::history;
use crate::indicators::{self, IndicatorPoint};

#[derive(Debug, Clone, Copy)]
pub struct LiveOptions {
    pub interval_secs: u64,
    pub duration_secs: u64,
}

/// Produces one freshly annotated series per tick.
pub trait TickSource {
    async fn tick(&mut self) -> Result<Vec<IndicatorPoint>, MarketError>;
}

/// Receives each successful tick's series together with the latest price.
///
/// An `Err` from `present` is treated as unrecoverable and stops the loop,
/// unlike a failed fetch, which never does.
pub trait TickSink {
    fn present(&mut self, series: &[IndicatorPoint], current_price: f64) -> anyhow::Result<()>;
}

/// The production tick source: 1-day history for a resolved identifier.
pub struct HistoryTicks<'a> {
    pub client: &'a GeckoClient,
    pub id: &'a str,
}

impl TickSource for HistoryTicks<'_> {
    async fn tick(&mut self) -> Result<Vec<IndicatorPoint>, MarketError> {
        let raw = history::fetch_history(self.client, self.id, 1).await?;
        indicators::annotate(&raw)
    }
}

/// Create a cancellation channel for [`run_live`]. Sending `true` stops the
/// loop before the next tick, or mid-sleep.
pub fn cancel_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Run the refresh loop until `duration_secs` elapses or `cancel` fires.
///
/// The sleep is aligned to wall-clock interval boundaries:
/// `interval - (elapsed mod interval)`, floored at one second, so the
/// cadence does not drift by the cost of each tick.
pub async fn run_live<T, S>(
    source: &mut T,
    sink: &mut S,
    opts: LiveOptions,
    mut cancel: watch::Receiver<bool>,
) -> anyhow::Result<()>
where
    T: TickSource,
    S: TickSink,
{
    let start = Instant::now();
    let interval = Duration::from_secs(opts.interval_secs.max(1));
    let duration = Duration::from_secs(opts.duration_secs);

    info!(
        interval_secs = interval.as_secs(),
        duration_secs = duration.as_secs(),
        "live analysis started"
    );

    while start.elapsed() < duration {
        if *cancel.borrow() {
            info!("live analysis cancelled");
            break;
        }

        match source.tick().await {
            Ok(series) => {
                // A successful annotate is never empty.
                if let Some(last) = series.last() {
                    if let Err(e) = sink.present(&series, last.price) {
                        warn!(error = %e, "presentation failed, stopping live analysis");
                        return Err(e);
                    }
                }
            }
            Err(e) => warn!(error = %e, "refresh tick failed, retrying next interval"),
        }

        let elapsed = start.elapsed();
        if elapsed >= duration {
            break;
        }

        // Align to the next interval boundary rather than sleeping a full
        // interval from "now".
        let remainder = interval.as_secs_f64() - (elapsed.as_secs_f64() % interval.as_secs_f64());
        let pause = Duration::from_secs_f64(remainder.max(1.0));

        tokio::select! {
            _ = sleep(pause) => {}
            // A closed channel counts as cancellation: nobody can stop the
            // loop any more, so stop it ourselves.
            _ = cancel.changed() => {
                info!("live analysis cancelled");
                break;
            }
        }
    }

    info!("live analysis stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::PricePoint;

    /// Records the virtual instant of every tick call.
    struct RecordingSource {
        fail: bool,
        tick_cost: Duration,
        calls: Vec<Duration>,
        epoch: Instant,
    }

    impl RecordingSource {
        fn new(fail: bool, tick_cost: Duration) -> Self {
            Self {
                fail,
                tick_cost,
                calls: Vec::new(),
                epoch: Instant::now(),
            }
        }
    }

    impl TickSource for RecordingSource {
        async fn tick(&mut self) -> Result<Vec<IndicatorPoint>, MarketError> {
            self.calls.push(self.epoch.elapsed());
            if !self.tick_cost.is_zero() {
                sleep(self.tick_cost).await;
            }
            if self.fail {
                return Err(MarketError::RemoteUnavailable {
                    endpoint: "coins/bitcoin/market_chart".to_string(),
                    detail: "request failed".to_string(),
                });
            }
            let raw = [
                PricePoint { timestamp_ms: 0, price: 10.0, volume: 1.0 },
                PricePoint { timestamp_ms: 1, price: 12.0, volume: 2.0 },
            ];
            indicators::annotate(&raw)
        }
    }

    #[derive(Default)]
    struct CountingSink {
        presented: usize,
        last_price: Option<f64>,
    }

    impl TickSink for CountingSink {
        fn present(&mut self, _series: &[IndicatorPoint], current_price: f64) -> anyhow::Result<()> {
            self.presented += 1;
            self.last_price = Some(current_price);
            Ok(())
        }
    }

    fn secs(calls: &[Duration]) -> Vec<u64> {
        calls.iter().map(|d| d.as_secs()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn zero_duration_performs_zero_ticks() {
        let mut source = RecordingSource::new(false, Duration::ZERO);
        let mut sink = CountingSink::default();
        let (_tx, rx) = cancel_channel();

        run_live(
            &mut source,
            &mut sink,
            LiveOptions { interval_secs: 60, duration_secs: 0 },
            rx,
        )
        .await
        .unwrap();

        assert!(source.calls.is_empty());
        assert_eq!(sink.presented, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_land_on_interval_boundaries() {
        let mut source = RecordingSource::new(false, Duration::from_secs(3));
        let mut sink = CountingSink::default();
        let (_tx, rx) = cancel_channel();

        run_live(
            &mut source,
            &mut sink,
            LiveOptions { interval_secs: 60, duration_secs: 150 },
            rx,
        )
        .await
        .unwrap();

        // Each tick costs 3 virtual seconds, but the drift-corrected sleep
        // still lands the next tick on the wall-clock boundary.
        assert_eq!(secs(&source.calls), vec![0, 60, 120]);
        assert_eq!(sink.presented, 3);
        assert_eq!(sink.last_price, Some(12.0));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_tick_waits_one_interval_not_zero() {
        let mut source = RecordingSource::new(true, Duration::ZERO);
        let mut sink = CountingSink::default();
        let (_tx, rx) = cancel_channel();

        run_live(
            &mut source,
            &mut sink,
            LiveOptions { interval_secs: 60, duration_secs: 150 },
            rx,
        )
        .await
        .unwrap();

        // Identical cadence to the successful case: no immediate retry,
        // no extra backoff, and nothing was presented.
        assert_eq!(secs(&source.calls), vec![0, 60, 120]);
        assert_eq!(sink.presented, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_the_sleep() {
        let (tx, rx) = cancel_channel();

        let handle = tokio::spawn(async move {
            let mut source = RecordingSource::new(false, Duration::ZERO);
            let mut sink = CountingSink::default();
            run_live(
                &mut source,
                &mut sink,
                LiveOptions { interval_secs: 60, duration_secs: 3600 },
                rx,
            )
            .await
            .unwrap();
            (source.calls.len(), Instant::now())
        });

        // Let the first tick run and the loop park in its sleep.
        tokio::task::yield_now().await;
        let cancelled_at = Instant::now();
        tx.send(true).unwrap();

        let (ticks, stopped_at) = handle.await.unwrap();
        assert_eq!(ticks, 1);
        // Stopped inside the sleep, not at the next 60 s boundary.
        assert!(stopped_at.duration_since(cancelled_at) < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_before_start_prevents_all_ticks() {
        let mut source = RecordingSource::new(false, Duration::ZERO);
        let mut sink = CountingSink::default();
        let (tx, rx) = cancel_channel();
        tx.send(true).unwrap();

        run_live(
            &mut source,
            &mut sink,
            LiveOptions { interval_secs: 60, duration_secs: 3600 },
            rx,
        )
        .await
        .unwrap();

        assert!(source.calls.is_empty());
    }

    struct FailingSink;

    impl TickSink for FailingSink {
        fn present(&mut self, _series: &[IndicatorPoint], _price: f64) -> anyhow::Result<()> {
            anyhow::bail!("render target gone")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sink_failure_stops_the_loop_with_an_error() {
        let mut source = RecordingSource::new(false, Duration::ZERO);
        let mut sink = FailingSink;
        let (_tx, rx) = cancel_channel();

        let result = run_live(
            &mut source,
            &mut sink,
            LiveOptions { interval_secs: 60, duration_secs: 3600 },
            rx,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(source.calls.len(), 1);
    }
}

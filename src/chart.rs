//! Live chart view, the presentation sink for the refresh loop.
//!
//! Owns the terminal for the lifetime of one live session: raw mode and the
//! alternate screen are acquired in the constructor and restored in `Drop`,
//! so every exit path (duration elapsed, cancellation, error) releases them.

use anyhow::{Context, Result};
use chrono::DateTime;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Layout},
    style::{Color, Style},
    symbols::Marker,
    text::Span,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
};
use std::io::{Stdout, stdout};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::indicators::IndicatorPoint;
use crate::live::{TickSink, cancel_channel};

pub struct ChartView {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    title: String,
}

impl ChartView {
    pub fn new(id: &str) -> Result<Self> {
        enable_raw_mode().context("failed to enable raw mode")?;
        let mut out = stdout();
        execute!(out, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let terminal = Terminal::new(CrosstermBackend::new(out))?;

        Ok(Self {
            terminal,
            title: id.to_uppercase(),
        })
    }
}

impl TickSink for ChartView {
    fn present(&mut self, series: &[IndicatorPoint], current_price: f64) -> Result<()> {
        let price: Vec<(f64, f64)> = series
            .iter()
            .map(|p| (p.timestamp_ms as f64, p.price))
            .collect();
        let ma_short: Vec<(f64, f64)> = series
            .iter()
            .filter_map(|p| p.ma_short.map(|ma| (p.timestamp_ms as f64, ma)))
            .collect();
        let ma_long: Vec<(f64, f64)> = series
            .iter()
            .filter_map(|p| p.ma_long.map(|ma| (p.timestamp_ms as f64, ma)))
            .collect();

        let latest_rsi = series.last().and_then(|p| p.rsi);
        let title = format!("{} Live Analysis (updated {})", self.title, clock_label(series));

        self.terminal.draw(|f| {
            let chunks =
                Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).split(f.size());

            let (x_bounds, x_labels) = x_axis(series);
            let (y_bounds, y_labels) = y_axis(series);

            let datasets = vec![
                Dataset::default()
                    .name("Price")
                    .marker(Marker::Braille)
                    .graph_type(GraphType::Line)
                    .style(Style::default().fg(Color::Cyan))
                    .data(&price),
                Dataset::default()
                    .name("MA 7")
                    .marker(Marker::Braille)
                    .graph_type(GraphType::Line)
                    .style(Style::default().fg(Color::Yellow))
                    .data(&ma_short),
                Dataset::default()
                    .name("MA 30")
                    .marker(Marker::Braille)
                    .graph_type(GraphType::Line)
                    .style(Style::default().fg(Color::Green))
                    .data(&ma_long),
            ];

            let chart = Chart::new(datasets)
                .block(Block::default().borders(Borders::ALL).title(title.clone()))
                .x_axis(
                    Axis::default()
                        .style(Style::default().fg(Color::DarkGray))
                        .bounds(x_bounds)
                        .labels(x_labels),
                )
                .y_axis(
                    Axis::default()
                        .style(Style::default().fg(Color::DarkGray))
                        .bounds(y_bounds)
                        .labels(y_labels),
                );
            f.render_widget(chart, chunks[0]);

            let rsi_label = match latest_rsi {
                Some(rsi) => format!("{rsi:.2}"),
                None => "—".to_string(),
            };
            let footer = format!(
                " ${current_price:.2}  |  RSI {rsi_label}  |  q / Esc / Ctrl-C stops "
            );
            f.render_widget(
                Paragraph::new(footer).alignment(Alignment::Center),
                chunks[1],
            );
        })?;

        Ok(())
    }
}

impl Drop for ChartView {
    fn drop(&mut self) {
        // Restoration must happen on every exit path; nothing useful can be
        // done about failures at this point.
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

fn clock_label(series: &[IndicatorPoint]) -> String {
    series
        .last()
        .and_then(|p| DateTime::from_timestamp_millis(p.timestamp_ms))
        .map(|dt| dt.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}

fn x_axis(series: &[IndicatorPoint]) -> ([f64; 2], Vec<Span<'static>>) {
    let first = series.first().map(|p| p.timestamp_ms).unwrap_or(0);
    let last = series.last().map(|p| p.timestamp_ms).unwrap_or(1);
    let label = |ts: i64| {
        DateTime::from_timestamp_millis(ts)
            .map(|dt| dt.format("%H:%M").to_string())
            .unwrap_or_default()
    };
    (
        [first as f64, last as f64],
        vec![
            Span::raw(label(first)),
            Span::raw(label((first + last) / 2)),
            Span::raw(label(last)),
        ],
    )
}

fn y_axis(series: &[IndicatorPoint]) -> ([f64; 2], Vec<Span<'static>>) {
    let mut low = f64::MAX;
    let mut high = f64::MIN;
    for p in series {
        low = low.min(p.price);
        high = high.max(p.price);
    }
    // Breathing room so the line does not hug the frame.
    let pad = ((high - low) * 0.05).max(high.abs() * 0.001).max(1e-9);
    let (bottom, top) = (low - pad, high + pad);
    (
        [bottom, top],
        vec![
            Span::raw(format!("{bottom:.2}")),
            Span::raw(format!("{:.2}", (bottom + top) / 2.0)),
            Span::raw(format!("{top:.2}")),
        ],
    )
}

/// Listen for a stop key (`q`, `Esc`, `Ctrl-C`) and flip the cancellation
/// channel. The task ends after the first stop key; abort it if the loop
/// finishes first.
pub fn spawn_cancel_listener() -> (watch::Receiver<bool>, JoinHandle<()>) {
    let (tx, rx) = cancel_channel();

    let handle = tokio::spawn(async move {
        let mut events = EventStream::new();
        while let Some(Ok(event)) = events.next().await {
            if let Event::Key(key) = event {
                let stop = matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
                    || (key.code == KeyCode::Char('c')
                        && key.modifiers.contains(KeyModifiers::CONTROL));
                if stop {
                    let _ = tx.send(true);
                    break;
                }
            }
        }
    });

    (rx, handle)
}

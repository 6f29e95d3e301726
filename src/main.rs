//! DFC Grid Source - Demo Entry Point
//!
//! Scrolls a simulated table over a remote-like provider and logs how the
//! block cache fills, evicts and invalidates.
//!
//! Usage: `dfc-grid-source [config.toml]`

use anyhow::Context;
use crossbeam_channel::Receiver;
use dfc_grid_source::constants::{
    DEMO_FETCH_LATENCY_MS, DEMO_PREFETCH_ROWS, DEMO_ROW_COUNT, DEMO_SETTLE_TIMEOUT_MS,
    DEMO_VIEWPORT_ROWS,
};
use dfc_grid_source::{
    RowSource, ScrollWindow, SortColumn, SortModel, SourceConfig, SourceEvent, VecFetcher,
};
use serde::Serialize;
use std::time::{Duration, Instant};

/// Synthetic telemetry row
#[derive(Clone, Debug, Serialize)]
struct TelemetryRow {
    seq: usize,
    device: String,
    power_kw: f64,
}

fn demo_rows() -> Vec<TelemetryRow> {
    (0..DEMO_ROW_COUNT)
        .map(|seq| TelemetryRow {
            seq,
            device: format!("turbine-{:03}", seq % 120),
            power_kw: ((seq % 3600) as f64 / 10.0).sin().abs() * 2500.0,
        })
        .collect()
}

/// Wait until `range` is loaded or the settle timeout passes
fn settle(
    source: &RowSource<TelemetryRow>,
    events: &Receiver<SourceEvent>,
    range: std::ops::Range<usize>,
) -> anyhow::Result<bool> {
    let deadline = Instant::now() + Duration::from_millis(DEMO_SETTLE_TIMEOUT_MS);
    while !source.is_range_loaded(range.clone())? {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(remaining) {
            Ok(SourceEvent::BlockFailed { index, message }) => {
                tracing::warn!("Block {} failed: {}", index, message);
            }
            Ok(_) => {}
            Err(_) => return Ok(false),
        }
    }
    Ok(true)
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting DFC grid source demo...");

    let config = match std::env::args().nth(1) {
        Some(path) => SourceConfig::load(&path).with_context(|| format!("loading {path}"))?,
        None => SourceConfig::default(),
    };
    tracing::info!("Config: {:?}", config);

    let fetcher = VecFetcher::new(demo_rows())
        .with_latency(Duration::from_millis(DEMO_FETCH_LATENCY_MS));
    let source = RowSource::builder(config).fetcher(fetcher).build()?;

    let (tx, rx) = crossbeam_channel::unbounded();
    let _subscription = source.subscribe(move |event: &SourceEvent| {
        let _ = tx.send(event.clone());
    })?;

    // Learn the total from the first window
    let mut window = ScrollWindow::new(DEMO_VIEWPORT_ROWS, DEMO_PREFETCH_ROWS);
    let first = window.fetch_range(None);
    source.get_rows_in_range(first.start, first.end)?;
    settle(&source, &rx, first)?;
    let total = source.get_total_rows()?;
    tracing::info!("Total rows: {:?}", total);

    for top in [0, 350, 700, 5_000, 90_000, 150_000, DEMO_ROW_COUNT] {
        window.scroll_to(top, total);
        let fetch = window.fetch_range(total);
        let started = Instant::now();
        source.get_rows_in_range(fetch.start, fetch.end)?;
        let loaded = settle(&source, &rx, fetch.clone())?;

        let visible = window.visible_range(total);
        let rows = source.get_rows_in_range(visible.start, visible.end)?;
        let present = rows.iter().filter(|row| row.is_some()).count();
        let stats = source.stats()?;
        tracing::info!(
            "top={} fetch={:?} loaded={} in {:?}: {}/{} visible rows, {} blocks resident",
            window.top,
            fetch,
            loaded,
            started.elapsed(),
            present,
            rows.len(),
            stats.resident_blocks
        );
        if let Some(Some(row)) = rows.first() {
            tracing::info!("First visible row: {}", serde_json::to_string(row)?);
        }
    }

    // Changing the sort drops every block
    source.set_sort_model(SortModel::new([SortColumn::desc("power_kw")]))?;
    let stats = source.stats()?;
    tracing::info!(
        "After sort change: epoch {}, {} blocks resident, total {:?}",
        stats.epoch,
        stats.resident_blocks,
        stats.total_rows
    );

    let fetch = window.fetch_range(None);
    source.get_rows_in_range(fetch.start, fetch.end)?;
    settle(&source, &rx, fetch)?;
    tracing::info!("Reloaded window: {:?}", source.stats()?);

    source.destroy()?;
    tracing::info!("Demo finished");
    Ok(())
}

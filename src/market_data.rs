//! Derived, in-run market state: a bounded tick ring buffer and an
//! incremental OHLCV aggregator (spec §4.5, §6; external collaborator C8
//! depends on; supplemented from `original_source/src/market/market_data.py`,
//! whose `MarketData` class this module generalizes). Persistence across
//! runs stays out of scope (spec §1) — this is purely derived state for the
//! currently running simulation.

use crate::order::Price;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// One Open/High/Low/Close/Volume aggregate over a fixed-width time window
/// (spec GLOSSARY "OHLCV bar").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    /// Start of the bar's interval, in simulation time.
    pub interval_start: u64,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: u64,
}

/// One tick retained in the bounded ring buffer when `store_tick_data` is
/// enabled (spec §6 `market.store_tick_data` / `market.max_ticks`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub time: u64,
    pub transaction_price: Option<Price>,
    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
    pub transaction_volume: u64,
    pub bid_volume: u64,
    pub ask_volume: u64,
}

/// Accumulates the in-progress bar for one period width, and the completed
/// bars behind it, mirroring `update_ohlcv`/`get_ohlcv` in the Python source.
#[derive(Debug, Clone, Default)]
struct BarSeries {
    completed: Vec<OhlcvBar>,
    current: Option<OhlcvBar>,
}

impl BarSeries {
    /// Folds one transaction print into this period's bars. A new interval
    /// starts a fresh bar and closes the previous one out.
    fn record(&mut self, time: u64, period: u64, price: Price, volume: u64) {
        let interval_start = (time / period) * period;
        match &mut self.current {
            Some(bar) if bar.interval_start == interval_start => {
                bar.high = bar.high.max(price);
                bar.low = bar.low.min(price);
                bar.close = price;
                bar.volume += volume;
            }
            Some(bar) => {
                self.completed.push(*bar);
                self.current = Some(OhlcvBar {
                    interval_start,
                    open: price,
                    high: price,
                    low: price,
                    close: price,
                    volume,
                });
            }
            None => {
                self.current = Some(OhlcvBar {
                    interval_start,
                    open: price,
                    high: price,
                    low: price,
                    close: price,
                    volume,
                });
            }
        }
    }

    /// All bars so far, oldest first, including the in-progress one.
    fn bars(&self) -> Vec<OhlcvBar> {
        let mut out = self.completed.clone();
        out.extend(self.current);
        out
    }
}

/// Derived market state for one ticker: best prices, last trade, and OHLCV
/// aggregation across the configured period widths, plus an optional bounded
/// tick history (spec §6 `market.*`, §4.5 `MarketView::bars`).
#[derive(Debug)]
pub struct MarketData {
    ohlcv_periods: Vec<u64>,
    series: HashMap<u64, BarSeries>,
    /// Cached `bars()` output per period, refreshed lazily so `bars()` can
    /// hand out a borrowed slice without recomputing on every read.
    bars_cache: HashMap<u64, Vec<OhlcvBar>>,
    best_bid: Option<Price>,
    best_ask: Option<Price>,
    last_trade_price: Option<Price>,
    bid_volume: u64,
    ask_volume: u64,
    store_tick_data: bool,
    max_ticks: usize,
    ticks: VecDeque<Tick>,
}

impl MarketData {
    pub fn new(ohlcv_periods: Vec<u64>, store_tick_data: bool, max_ticks: usize) -> MarketData {
        let series = ohlcv_periods.iter().map(|&p| (p, BarSeries::default())).collect();
        let bars_cache = ohlcv_periods.iter().map(|&p| (p, Vec::new())).collect();
        MarketData {
            ohlcv_periods,
            series,
            bars_cache,
            best_bid: None,
            best_ask: None,
            last_trade_price: None,
            bid_volume: 0,
            ask_volume: 0,
            store_tick_data,
            max_ticks: max_ticks.max(1),
            ticks: VecDeque::new(),
        }
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.best_bid
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.best_ask
    }

    pub fn last_trade_price(&self) -> Option<Price> {
        self.last_trade_price
    }

    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) => Some((bid.as_decimal() + ask.as_decimal()) / 2.0),
            _ => None,
        }
    }

    /// Bars for a configured period, oldest first, including the in-progress
    /// bar. Returns an empty slice for an unconfigured period rather than an
    /// error — `market_data` is an internal collaborator, not a user-facing
    /// boundary, so there is nothing to reject here.
    pub fn bars(&self, period: u64) -> &[OhlcvBar] {
        self.bars_cache.get(&period).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn configured_periods(&self) -> &[u64] {
        &self.ohlcv_periods
    }

    /// Updates best bid/ask/mid and the per-side resting volume snapshot
    /// (`update_market_parameters` in the Python source).
    pub fn update_market_parameters(
        &mut self,
        best_bid: Option<Price>,
        best_ask: Option<Price>,
        bid_volume: u64,
        ask_volume: u64,
    ) {
        self.best_bid = best_bid;
        self.best_ask = best_ask;
        self.bid_volume = bid_volume;
        self.ask_volume = ask_volume;
    }

    /// Records one print: updates `last_trade_price`, appends to the tick
    /// ring buffer if enabled, and folds the print into every configured
    /// OHLCV period (`add_tick` in the Python source).
    pub fn record_transaction(&mut self, time: u64, price: Price, volume: u64) {
        self.last_trade_price = Some(price);

        if self.store_tick_data {
            if self.ticks.len() >= self.max_ticks {
                self.ticks.pop_front();
            }
            self.ticks.push_back(Tick {
                time,
                transaction_price: Some(price),
                best_bid: self.best_bid,
                best_ask: self.best_ask,
                transaction_volume: volume,
                bid_volume: self.bid_volume,
                ask_volume: self.ask_volume,
            });
        }

        for &period in &self.ohlcv_periods {
            if let Some(bucket) = self.series.get_mut(&period) {
                bucket.record(time, period, price, volume);
                self.bars_cache.insert(period, bucket.bars());
            }
        }
    }

    /// Most recent `n` ticks, oldest first; empty if tick storage is
    /// disabled (`get_recent_ticks` in the Python source, made total rather
    /// than raising).
    pub fn recent_ticks(&self, n: usize) -> Vec<Tick> {
        if !self.store_tick_data {
            return Vec::new();
        }
        let len = self.ticks.len();
        let skip = len.saturating_sub(n);
        self.ticks.iter().skip(skip).copied().collect()
    }
}

//! Technical indicator engine
//!
//! [`IndicatorEngine::compute`] turns an ordered daily series into an
//! [`IndicatorSet`]. Windowed indicators are `None` when the series is
//! shorter than their window; they are never reported as zero.

use chrono::NaiveDate;
use research_core::{Error, Result};
use serde::{Deserialize, Serialize};
use ta::{Next, indicators::ExponentialMovingAverage};

/// One daily bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    /// Trading day
    pub date: NaiveDate,
    /// Opening price
    pub open: f64,
    /// Session high
    pub high: f64,
    /// Session low
    pub low: f64,
    /// Closing price
    pub close: f64,
    /// Shares traded
    pub volume: u64,
}

/// Bars strictly increasing by date
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    bars: Vec<OhlcvBar>,
}

impl TimeSeries {
    /// Wrap bars that are already in order
    pub fn new(bars: Vec<OhlcvBar>) -> Result<Self> {
        ensure_ordered(&bars)?;
        Ok(Self { bars })
    }

    /// Sort provider output by date, rejecting repeated days
    pub fn from_unordered(mut bars: Vec<OhlcvBar>) -> Result<Self> {
        bars.sort_by_key(|bar| bar.date);
        Self::new(bars)
    }

    /// Bars, oldest first
    pub fn bars(&self) -> &[OhlcvBar] {
        &self.bars
    }

    /// Most recent bar
    pub fn latest(&self) -> Option<&OhlcvBar> {
        self.bars.last()
    }

    /// First and last trading day
    pub fn period(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((self.bars.first()?.date, self.bars.last()?.date))
    }

    /// Number of bars
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Whether the series has no bars
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

fn ensure_ordered(bars: &[OhlcvBar]) -> Result<()> {
    match bars.windows(2).find(|pair| pair[0].date >= pair[1].date) {
        Some(pair) if pair[0].date == pair[1].date => Err(Error::InvalidInput(format!(
            "duplicate bar for {}",
            pair[1].date
        ))),
        Some(pair) => Err(Error::InvalidInput(format!(
            "bars out of order: {} before {}",
            pair[0].date, pair[1].date
        ))),
        None => Ok(()),
    }
}

/// Indicators computed over one series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSet {
    /// 20-day simple moving average
    pub sma20: Option<f64>,
    /// 50-day simple moving average
    pub sma50: Option<f64>,
    /// 14-day Wilder RSI
    pub rsi14: Option<f64>,
    /// EMA12 minus EMA26
    pub macd: Option<f64>,
    /// Upper Bollinger band (20, 2)
    pub bollinger_upper: Option<f64>,
    /// Lower Bollinger band (20, 2)
    pub bollinger_lower: Option<f64>,
    /// Percent change from first to last close
    pub price_change_3m_pct: f64,
    /// Mean daily volume
    pub avg_volume: f64,
    /// Population standard deviation of closes
    pub volatility_3m: f64,
}

impl IndicatorSet {
    /// Round prices, percentages and volume to 2 places and MACD to 4
    pub fn rounded(&self) -> Self {
        Self {
            sma20: self.sma20.map(round2),
            sma50: self.sma50.map(round2),
            rsi14: self.rsi14.map(round2),
            macd: self.macd.map(round4),
            bollinger_upper: self.bollinger_upper.map(round2),
            bollinger_lower: self.bollinger_lower.map(round2),
            price_change_3m_pct: round2(self.price_change_3m_pct),
            avg_volume: round2(self.avg_volume),
            volatility_3m: round2(self.volatility_3m),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Computes [`IndicatorSet`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct IndicatorEngine;

impl IndicatorEngine {
    /// RSI look-back
    pub const RSI_PERIOD: usize = 14;
    /// Bollinger look-back
    pub const BOLLINGER_PERIOD: usize = 20;
    /// Bollinger width in standard deviations
    pub const BOLLINGER_WIDTH: f64 = 2.0;

    /// Compute the rounded indicator set for bars ordered oldest first
    pub fn compute(bars: &[OhlcvBar]) -> Result<IndicatorSet> {
        if bars.is_empty() {
            return Err(Error::InvalidInput("price series is empty".to_string()));
        }
        ensure_ordered(bars)?;

        let closes: Vec<f64> = bars.iter().map(|bar| bar.close).collect();
        let first = closes[0];
        let last = closes[closes.len() - 1];
        if !(first > 0.0) {
            return Err(Error::InvalidInput(format!(
                "first close must be positive, got {first}"
            )));
        }

        let sma20 = sma(&closes, 20);
        let bands = sma20.map(|mid| {
            let width = Self::BOLLINGER_WIDTH * std_dev(tail(&closes, Self::BOLLINGER_PERIOD));
            (mid + width, mid - width)
        });
        let avg_volume = bars.iter().map(|bar| bar.volume as f64).sum::<f64>() / bars.len() as f64;

        let set = IndicatorSet {
            sma20,
            sma50: sma(&closes, 50),
            rsi14: rsi(&closes, Self::RSI_PERIOD),
            macd: macd(&closes)?,
            bollinger_upper: bands.map(|(upper, _)| upper),
            bollinger_lower: bands.map(|(_, lower)| lower),
            price_change_3m_pct: (last - first) / first * 100.0,
            avg_volume,
            volatility_3m: std_dev(&closes),
        };

        Ok(set.rounded())
    }

    /// Compute over a validated series
    pub fn compute_series(series: &TimeSeries) -> Result<IndicatorSet> {
        Self::compute(series.bars())
    }
}

fn tail(values: &[f64], n: usize) -> &[f64] {
    &values[values.len().saturating_sub(n)..]
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation
fn std_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn sma(closes: &[f64], period: usize) -> Option<f64> {
    (closes.len() >= period).then(|| mean(tail(closes, period)))
}

/// Wilder RSI; defined once the series holds `period` closes
fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if closes.len() < period {
        return None;
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let seed_len = period.min(deltas.len());
    let (seed, rest) = deltas.split_at(seed_len);

    let mut avg_gain = seed.iter().map(|d| d.max(0.0)).sum::<f64>() / seed_len as f64;
    let mut avg_loss = seed.iter().map(|d| (-d).max(0.0)).sum::<f64>() / seed_len as f64;
    let smoothing = (period - 1) as f64;
    for delta in rest {
        avg_gain = (avg_gain * smoothing + delta.max(0.0)) / period as f64;
        avg_loss = (avg_loss * smoothing + (-delta).max(0.0)) / period as f64;
    }

    Some(match (avg_gain, avg_loss) {
        (g, l) if g == 0.0 && l == 0.0 => 50.0,
        (_, l) if l == 0.0 => 100.0,
        (g, l) => 100.0 - 100.0 / (1.0 + g / l),
    })
}

fn macd(closes: &[f64]) -> Result<Option<f64>> {
    if closes.len() < 26 {
        return Ok(None);
    }

    let mut fast = ExponentialMovingAverage::new(12).map_err(|e| Error::InvalidInput(e.to_string()))?;
    let mut slow = ExponentialMovingAverage::new(26).map_err(|e| Error::InvalidInput(e.to_string()))?;
    let mut value = 0.0;
    for &close in closes {
        value = fast.next(close) - slow.next(close);
    }
    Ok(Some(value))
}

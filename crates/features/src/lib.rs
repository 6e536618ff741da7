// In crates/features/src/lib.rs
//
// The feature engineer: turns a raw bar series into one `FeatureVector` per
// bar past the warm-up index, plus the fixed-width normalized form the
// forecaster consumes. All indicators are computed streaming, one value per
// bar index, so feature rows align with their bars by construction.

use core_types::PriceBar;
use num_traits::ToPrimitive;
use ta::indicators::{
    AverageTrueRange, BollingerBands, ExponentialMovingAverage as Ema,
    MovingAverageConvergenceDivergence as Macd, RelativeStrengthIndex as Rsi,
    SimpleMovingAverage as Sma,
};
use ta::{DataItem, Next};

pub mod error;
pub mod indicators;
pub mod types;

pub use error::{Error, Result};
pub use types::{FeatureVector, NormalizedFeatures, dim};

use crate::indicators::{Adx, Stochastic};

/// Minimum bar history before any feature vector is valid.
pub const WARMUP_BARS: usize = 200;

/// Computes the full feature set for `bars`, emitting one vector per bar
/// from index [`WARMUP_BARS`] onward.
///
/// An optional higher-timeframe series contributes a `higher_tf_trend`
/// percentage (last two higher-TF closes); an optional lower-timeframe
/// series contributes `lower_tf_volatility` (stddev of its last 20 closes).
pub fn compute_features(
    bars: &[PriceBar],
    higher_tf_bars: Option<&[PriceBar]>,
    lower_tf_bars: Option<&[PriceBar]>,
) -> Result<Vec<FeatureVector>> {
    if bars.len() < WARMUP_BARS {
        return Err(Error::InsufficientData {
            required: WARMUP_BARS,
            actual: bars.len(),
        });
    }

    let opens: Vec<f64> = bars.iter().map(|b| b.open.to_f64().unwrap_or(0.0)).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high.to_f64().unwrap_or(0.0)).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low.to_f64().unwrap_or(0.0)).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close.to_f64().unwrap_or(0.0)).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume.to_f64().unwrap_or(0.0)).collect();

    // Streaming indicator state. The constructors only fail on a zero
    // period, which these constants are not.
    let mut sma_20 = Sma::new(20).unwrap();
    let mut sma_50 = Sma::new(50).unwrap();
    let mut sma_200 = Sma::new(200).unwrap();
    let mut ema_9 = Ema::new(9).unwrap();
    let mut ema_21 = Ema::new(21).unwrap();
    let mut ema_50 = Ema::new(50).unwrap();
    let mut rsi_14 = Rsi::new(14).unwrap();
    let mut macd_12_26_9 = Macd::new(12, 26, 9).unwrap();
    let mut bb_20 = BollingerBands::new(20, 2.0).unwrap();
    let mut atr_14 = AverageTrueRange::new(14).unwrap();
    let mut adx_14 = Adx::new(14);
    let mut stoch_14_3 = Stochastic::new(14, 3);
    let mut vol_sma_20 = Sma::new(20).unwrap();

    // One output column per indicator, one entry per bar index.
    let n = bars.len();
    let mut col_sma_20 = Vec::with_capacity(n);
    let mut col_sma_50 = Vec::with_capacity(n);
    let mut col_sma_200 = Vec::with_capacity(n);
    let mut col_ema_9 = Vec::with_capacity(n);
    let mut col_ema_21 = Vec::with_capacity(n);
    let mut col_ema_50 = Vec::with_capacity(n);
    let mut col_rsi = Vec::with_capacity(n);
    let mut col_macd = Vec::with_capacity(n);
    let mut col_bb = Vec::with_capacity(n);
    let mut col_atr = Vec::with_capacity(n);
    let mut col_adx = Vec::with_capacity(n);
    let mut col_stoch = Vec::with_capacity(n);
    let mut col_vol_sma = Vec::with_capacity(n);

    let mut last_atr = 0.0;
    for i in 0..n {
        let close = closes[i];
        col_sma_20.push(sma_20.next(close));
        col_sma_50.push(sma_50.next(close));
        col_sma_200.push(sma_200.next(close));
        col_ema_9.push(ema_9.next(close));
        col_ema_21.push(ema_21.next(close));
        col_ema_50.push(ema_50.next(close));
        col_rsi.push(rsi_14.next(close));
        let macd_out = macd_12_26_9.next(close);
        col_macd.push((macd_out.macd, macd_out.signal, macd_out.histogram));
        let bb_out = bb_20.next(close);
        col_bb.push((bb_out.upper, bb_out.average, bb_out.lower));

        // A malformed bar (e.g. low > high) cannot form a DataItem; carry the
        // previous ATR forward instead of aborting the whole series.
        last_atr = match DataItem::builder()
            .open(opens[i])
            .high(highs[i])
            .low(lows[i])
            .close(close)
            .volume(volumes[i])
            .build()
        {
            Ok(item) => atr_14.next(&item),
            Err(_) => last_atr,
        };
        col_atr.push(last_atr);

        col_adx.push(adx_14.next(highs[i], lows[i], close));
        col_stoch.push(stoch_14_3.next(highs[i], lows[i], close));
        col_vol_sma.push(vol_sma_20.next(volumes[i]));
    }

    // Multi-timeframe enrichment is a property of the series tail, shared by
    // every emitted vector on this tick.
    let higher_tf_trend = higher_tf_bars.filter(|h| !h.is_empty()).map(|h| {
        let last = h[h.len() - 1].close.to_f64().unwrap_or(0.0);
        let prev = if h.len() >= 2 {
            h[h.len() - 2].close.to_f64().unwrap_or(last)
        } else {
            last
        };
        if prev != 0.0 { (last - prev) / prev * 100.0 } else { 0.0 }
    });

    let lower_tf_volatility = lower_tf_bars.filter(|l| !l.is_empty()).map(|l| {
        let tail: Vec<f64> = l
            .iter()
            .rev()
            .take(20)
            .map(|b| b.close.to_f64().unwrap_or(0.0))
            .collect();
        std_dev(&tail)
    });

    let mut features = Vec::with_capacity(n.saturating_sub(WARMUP_BARS));
    for i in WARMUP_BARS..n {
        let close = closes[i];
        let prev_close = closes[i - 1];
        let (macd_line, macd_signal, macd_histogram) = col_macd[i];
        let (bb_upper, bb_middle, bb_lower) = col_bb[i];
        let (stoch_k, stoch_d) = col_stoch[i];

        features.push(FeatureVector {
            open: opens[i],
            high: highs[i],
            low: lows[i],
            close,
            volume: volumes[i],

            returns: if prev_close != 0.0 { (close - prev_close) / prev_close * 100.0 } else { 0.0 },
            log_returns: if prev_close > 0.0 && close > 0.0 { (close / prev_close).ln() } else { 0.0 },

            sma_20: finite_or(col_sma_20[i], close),
            sma_50: finite_or(col_sma_50[i], close),
            sma_200: finite_or(col_sma_200[i], close),
            ema_9: finite_or(col_ema_9[i], close),
            ema_21: finite_or(col_ema_21[i], close),
            ema_50: finite_or(col_ema_50[i], close),

            rsi_14: finite_or(col_rsi[i], 50.0),
            macd: finite_or(macd_line, 0.0),
            macd_signal: finite_or(macd_signal, 0.0),
            macd_histogram: finite_or(macd_histogram, 0.0),
            stoch_k: finite_or(stoch_k, 50.0),
            stoch_d: finite_or(stoch_d, 50.0),

            atr_14: finite_or(col_atr[i], 0.0),
            bb_upper: finite_or(bb_upper, close),
            bb_middle: finite_or(bb_middle, close),
            bb_lower: finite_or(bb_lower, close),
            bb_width: finite_or(bb_upper - bb_lower, 0.0),

            adx_14: finite_or(col_adx[i], 0.0),

            price_slope: if i >= 5 { (closes[i] - closes[i - 5]) / 5.0 } else { 0.0 },
            volume_slope: if i >= 5 { (volumes[i] - volumes[i - 5]) / 5.0 } else { 0.0 },
            volume_sma_20: finite_or(col_vol_sma[i], volumes[i]),
            high_low_range: highs[i] - lows[i],
            close_open_diff: close - opens[i],

            is_doji: is_doji(opens[i], highs[i], lows[i], close),
            is_hammer: is_hammer(opens[i], highs[i], lows[i], close),
            is_engulfing: is_engulfing(
                opens[i - 1],
                closes[i - 1],
                opens[i],
                close,
            ),

            higher_tf_trend,
            lower_tf_volatility,
        });
    }

    Ok(features)
}

/// Maps each feature vector to its fixed 18-dimension scaled form. Pure:
/// the same input always produces the same output.
pub fn normalize(features: &[FeatureVector]) -> Vec<NormalizedFeatures> {
    features
        .iter()
        .map(|f| {
            let close = if f.close != 0.0 { f.close } else { 1.0 };
            let volume_ratio = if f.volume_sma_20 > 0.0 {
                f.volume / f.volume_sma_20
            } else {
                1.0
            };
            NormalizedFeatures([
                f.close,
                f.returns / 10.0,
                f.log_returns,
                f.rsi_14 / 100.0,
                f.macd / close,
                f.macd_signal / close,
                f.macd_histogram / close,
                f.stoch_k / 100.0,
                f.stoch_d / 100.0,
                f.atr_14 / close,
                f.bb_width / close,
                f.adx_14 / 100.0,
                f.price_slope / close,
                volume_ratio,
                f.high_low_range / close,
                f.close_open_diff / close,
                f.higher_tf_trend.unwrap_or(0.0) / 10.0,
                f.lower_tf_volatility.unwrap_or(0.0) / close,
            ])
        })
        .collect()
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn is_doji(open: f64, high: f64, low: f64, close: f64) -> bool {
    let body = (close - open).abs();
    let range = high - low;
    range > 0.0 && body / range < 0.1
}

fn is_hammer(open: f64, high: f64, low: f64, close: f64) -> bool {
    let body = (close - open).abs();
    let lower_shadow = open.min(close) - low;
    let upper_shadow = high - open.max(close);
    lower_shadow > body * 2.0 && upper_shadow < body * 0.5
}

fn is_engulfing(prev_open: f64, prev_close: f64, open: f64, close: f64) -> bool {
    let prev_body = (prev_close - prev_open).abs();
    let body = (close - open).abs();
    let bullish = prev_close < prev_open && close > open && open < prev_close && close > prev_open;
    let bearish = prev_close > prev_open && close < open && open > prev_close && close < prev_open;
    (bullish || bearish) && body > prev_body
}

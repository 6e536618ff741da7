// In crates/patterns/src/lib.rs
//
// Geometric pattern recognition over a bar window. Two stateless entry
// points: candle-shape rules on the latest 1-3 bars, and chart formations
// over fixed trailing windows. Everything is recomputed from scratch on
// every call; nothing here holds state between ticks.

use core_types::PriceBar;
use num_traits::ToPrimitive;

pub mod types;

pub use types::{CandleBias, CandlePattern, ChartKind, ChartPattern, Direction};

/// Minimum window for any chart formation search.
const CHART_MIN_BARS: usize = 20;

/// f64 view of one bar, the unit the shape rules work in.
#[derive(Debug, Clone, Copy)]
struct Candle {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

impl Candle {
    fn from_bar(bar: &PriceBar) -> Self {
        Self {
            open: bar.open.to_f64().unwrap_or(0.0),
            high: bar.high.to_f64().unwrap_or(0.0),
            low: bar.low.to_f64().unwrap_or(0.0),
            close: bar.close.to_f64().unwrap_or(0.0),
        }
    }

    fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    fn range(&self) -> f64 {
        self.high - self.low
    }

    fn is_bullish(&self) -> bool {
        self.close > self.open
    }
}

/// Evaluates the latest bars against the seven candle-shape rules.
/// Multiple patterns may match at once; all matches are returned.
/// Fewer than 3 bars yields no matches.
pub fn detect_candle_patterns(bars: &[PriceBar]) -> Vec<CandlePattern> {
    if bars.len() < 3 {
        return Vec::new();
    }

    let current = Candle::from_bar(&bars[bars.len() - 1]);
    let prev = Candle::from_bar(&bars[bars.len() - 2]);
    let prev2 = Candle::from_bar(&bars[bars.len() - 3]);

    let mut patterns = Vec::new();

    if is_doji(&current) {
        patterns.push(CandlePattern {
            name: "Doji",
            bias: CandleBias::Neutral,
            confidence: 0.7,
        });
    }

    if is_hammer(&current) {
        patterns.push(CandlePattern {
            name: "Hammer",
            bias: CandleBias::Bullish,
            confidence: 0.75,
        });
    }

    if is_inverted_hammer(&current) {
        patterns.push(CandlePattern {
            name: "Inverted Hammer",
            bias: CandleBias::Bullish,
            confidence: 0.7,
        });
    }

    if is_marubozu(&current) {
        patterns.push(CandlePattern {
            name: "Marubozu",
            bias: if current.is_bullish() { CandleBias::Bullish } else { CandleBias::Bearish },
            confidence: 0.8,
        });
    }

    if is_engulfing(&prev, &current) {
        patterns.push(CandlePattern {
            name: "Engulfing",
            bias: if current.is_bullish() { CandleBias::Bullish } else { CandleBias::Bearish },
            confidence: 0.85,
        });
    }

    if is_morning_star(&prev2, &prev, &current) {
        patterns.push(CandlePattern {
            name: "Morning Star",
            bias: CandleBias::Bullish,
            confidence: 0.9,
        });
    }

    if is_evening_star(&prev2, &prev, &current) {
        patterns.push(CandlePattern {
            name: "Evening Star",
            bias: CandleBias::Bearish,
            confidence: 0.9,
        });
    }

    patterns
}

/// Searches fixed trailing windows for chart formations. Each detector
/// contributes at most one match per call; fewer than 20 bars yields none.
pub fn detect_chart_patterns(bars: &[PriceBar]) -> Vec<ChartPattern> {
    if bars.len() < CHART_MIN_BARS {
        return Vec::new();
    }

    [
        detect_head_and_shoulders(bars),
        detect_inverse_head_and_shoulders(bars),
        detect_double_top(bars),
        detect_double_bottom(bars),
        detect_ascending_triangle(bars),
        detect_descending_triangle(bars),
        detect_flag(bars),
    ]
    .into_iter()
    .flatten()
    .collect()
}

// === Candle-shape rules ===

fn is_doji(c: &Candle) -> bool {
    c.range() > 0.0 && c.body() / c.range() < 0.1
}

fn is_hammer(c: &Candle) -> bool {
    let lower_shadow = c.open.min(c.close) - c.low;
    let upper_shadow = c.high - c.open.max(c.close);
    lower_shadow > c.body() * 2.0 && upper_shadow < c.body() * 0.5
}

fn is_inverted_hammer(c: &Candle) -> bool {
    let lower_shadow = c.open.min(c.close) - c.low;
    let upper_shadow = c.high - c.open.max(c.close);
    upper_shadow > c.body() * 2.0 && lower_shadow < c.body() * 0.5
}

fn is_marubozu(c: &Candle) -> bool {
    c.range() > 0.0 && c.body() / c.range() > 0.95
}

fn is_engulfing(prev: &Candle, current: &Candle) -> bool {
    let bullish = !prev.is_bullish()
        && current.is_bullish()
        && current.open <= prev.close
        && current.close >= prev.open;
    let bearish = prev.is_bullish()
        && !current.is_bullish()
        && current.open >= prev.close
        && current.close <= prev.open;
    (bullish || bearish) && current.body() > prev.body() * 1.2
}

fn is_morning_star(c1: &Candle, c2: &Candle, c3: &Candle) -> bool {
    let bearish_first = !c1.is_bullish();
    let small_middle = c2.body() < c1.body() * 0.3;
    let bullish_last = c3.is_bullish();
    let recovery = c3.close > (c1.open + c1.close) / 2.0;
    bearish_first && small_middle && bullish_last && recovery
}

fn is_evening_star(c1: &Candle, c2: &Candle, c3: &Candle) -> bool {
    let bullish_first = c1.is_bullish();
    let small_middle = c2.body() < c1.body() * 0.3;
    let bearish_last = !c3.is_bullish();
    let decline = c3.close < (c1.open + c1.close) / 2.0;
    bullish_first && small_middle && bearish_last && decline
}

// === Chart formations ===

fn detect_head_and_shoulders(bars: &[PriceBar]) -> Option<ChartPattern> {
    if bars.len() < 30 {
        return None;
    }
    let offset = bars.len() - 30;
    let highs: Vec<f64> = bars[offset..].iter().map(|b| b.high.to_f64().unwrap_or(0.0)).collect();

    let peaks = find_peaks(&highs);
    if peaks.len() < 3 {
        return None;
    }
    let [left, head, right] = peaks[peaks.len() - 3..] else { return None };

    // The head must stand above two shoulders of roughly equal height.
    if highs[head] > highs[left]
        && highs[head] > highs[right]
        && (highs[left] - highs[right]).abs() / highs[left] < 0.02
    {
        let neckline = bars[offset + left]
            .low
            .to_f64()
            .unwrap_or(0.0)
            .min(bars[offset + right].low.to_f64().unwrap_or(0.0));
        Some(ChartPattern {
            name: "Head and Shoulders",
            direction: Direction::Bearish,
            kind: ChartKind::Reversal,
            confidence: 0.85,
            start_index: offset + left,
            end_index: offset + right,
            target_price: Some(neckline - (highs[head] - neckline)),
        })
    } else {
        None
    }
}

fn detect_inverse_head_and_shoulders(bars: &[PriceBar]) -> Option<ChartPattern> {
    if bars.len() < 30 {
        return None;
    }
    let offset = bars.len() - 30;
    let lows: Vec<f64> = bars[offset..].iter().map(|b| b.low.to_f64().unwrap_or(0.0)).collect();

    let valleys = find_valleys(&lows);
    if valleys.len() < 3 {
        return None;
    }
    let [left, head, right] = valleys[valleys.len() - 3..] else { return None };

    if lows[head] < lows[left]
        && lows[head] < lows[right]
        && (lows[left] - lows[right]).abs() / lows[left] < 0.02
    {
        let neckline = bars[offset + left]
            .high
            .to_f64()
            .unwrap_or(0.0)
            .max(bars[offset + right].high.to_f64().unwrap_or(0.0));
        Some(ChartPattern {
            name: "Inverse Head and Shoulders",
            direction: Direction::Bullish,
            kind: ChartKind::Reversal,
            confidence: 0.85,
            start_index: offset + left,
            end_index: offset + right,
            target_price: Some(neckline + (neckline - lows[head])),
        })
    } else {
        None
    }
}

fn detect_double_top(bars: &[PriceBar]) -> Option<ChartPattern> {
    let offset = bars.len() - 20;
    let highs: Vec<f64> = bars[offset..].iter().map(|b| b.high.to_f64().unwrap_or(0.0)).collect();

    let peaks = find_peaks(&highs);
    if peaks.len() < 2 {
        return None;
    }
    let [first, second] = peaks[peaks.len() - 2..] else { return None };

    if (highs[first] - highs[second]).abs() / highs[first] < 0.02 {
        Some(ChartPattern {
            name: "Double Top",
            direction: Direction::Bearish,
            kind: ChartKind::Reversal,
            confidence: 0.8,
            start_index: offset + first,
            end_index: offset + second,
            target_price: None,
        })
    } else {
        None
    }
}

fn detect_double_bottom(bars: &[PriceBar]) -> Option<ChartPattern> {
    let offset = bars.len() - 20;
    let lows: Vec<f64> = bars[offset..].iter().map(|b| b.low.to_f64().unwrap_or(0.0)).collect();

    let valleys = find_valleys(&lows);
    if valleys.len() < 2 {
        return None;
    }
    let [first, second] = valleys[valleys.len() - 2..] else { return None };

    if (lows[first] - lows[second]).abs() / lows[first] < 0.02 {
        Some(ChartPattern {
            name: "Double Bottom",
            direction: Direction::Bullish,
            kind: ChartKind::Reversal,
            confidence: 0.8,
            start_index: offset + first,
            end_index: offset + second,
            target_price: None,
        })
    } else {
        None
    }
}

fn detect_ascending_triangle(bars: &[PriceBar]) -> Option<ChartPattern> {
    let offset = bars.len() - 20;
    let window = &bars[offset..];
    let highs: Vec<f64> = window.iter().map(|b| b.high.to_f64().unwrap_or(0.0)).collect();
    let lows: Vec<f64> = window.iter().map(|b| b.low.to_f64().unwrap_or(0.0)).collect();

    // Flat resistance: at least three highs within 1% of the window maximum,
    // against rising support.
    let max_high = highs.iter().cloned().fold(f64::MIN, f64::max);
    let touches = highs.iter().filter(|h| (**h - max_high).abs() / max_high < 0.01).count();
    let support_trend = linear_trend(&lows);

    if touches >= 3 && support_trend > 0.0 {
        Some(ChartPattern {
            name: "Ascending Triangle",
            direction: Direction::Bullish,
            kind: ChartKind::Continuation,
            confidence: 0.75,
            start_index: offset,
            end_index: bars.len() - 1,
            target_price: Some(max_high * 1.05),
        })
    } else {
        None
    }
}

fn detect_descending_triangle(bars: &[PriceBar]) -> Option<ChartPattern> {
    let offset = bars.len() - 20;
    let window = &bars[offset..];
    let highs: Vec<f64> = window.iter().map(|b| b.high.to_f64().unwrap_or(0.0)).collect();
    let lows: Vec<f64> = window.iter().map(|b| b.low.to_f64().unwrap_or(0.0)).collect();

    let min_low = lows.iter().cloned().fold(f64::MAX, f64::min);
    let touches = lows.iter().filter(|l| (**l - min_low).abs() / min_low < 0.01).count();
    let resistance_trend = linear_trend(&highs);

    if touches >= 3 && resistance_trend < 0.0 {
        Some(ChartPattern {
            name: "Descending Triangle",
            direction: Direction::Bearish,
            kind: ChartKind::Continuation,
            confidence: 0.75,
            start_index: offset,
            end_index: bars.len() - 1,
            target_price: Some(min_low * 0.95),
        })
    } else {
        None
    }
}

fn detect_flag(bars: &[PriceBar]) -> Option<ChartPattern> {
    if bars.len() < 15 {
        return None;
    }
    let offset = bars.len() - 15;
    let closes: Vec<f64> = bars[offset..].iter().map(|b| b.close.to_f64().unwrap_or(0.0)).collect();

    // A pole: a strong move over the first five bars.
    let initial_move = (closes[5] - closes[0]) / closes[0];
    if initial_move.abs() < 0.03 {
        return None;
    }

    // Then a tight, flat consolidation channel.
    let consolidation = &closes[5..];
    if linear_trend(consolidation).abs() < 0.01 && relative_volatility(consolidation) < 0.02 {
        Some(ChartPattern {
            name: "Flag",
            direction: if initial_move > 0.0 { Direction::Bullish } else { Direction::Bearish },
            kind: ChartKind::Continuation,
            confidence: 0.7,
            start_index: offset,
            end_index: bars.len() - 1,
            target_price: None,
        })
    } else {
        None
    }
}

// === Window utilities ===

fn find_peaks(data: &[f64]) -> Vec<usize> {
    (1..data.len().saturating_sub(1))
        .filter(|&i| data[i] > data[i - 1] && data[i] > data[i + 1])
        .collect()
}

fn find_valleys(data: &[f64]) -> Vec<usize> {
    (1..data.len().saturating_sub(1))
        .filter(|&i| data[i] < data[i - 1] && data[i] < data[i + 1])
        .collect()
}

/// End-to-end percentage change, the cheap stand-in for a fitted slope.
fn linear_trend(data: &[f64]) -> f64 {
    if data.len() < 2 || data[0] == 0.0 {
        return 0.0;
    }
    (data[data.len() - 1] - data[0]) / data[0]
}

/// Standard deviation relative to the mean.
fn relative_volatility(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let mean = data.iter().sum::<f64>() / data.len() as f64;
    if mean == 0.0 {
        return 0.0;
    }
    let variance = data.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / data.len() as f64;
    variance.sqrt() / mean
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal::prelude::FromPrimitive;

    fn bar(open: f64, high: f64, low: f64, close: f64) -> PriceBar {
        PriceBar {
            timestamp: 0,
            open: Decimal::from_f64(open).unwrap(),
            high: Decimal::from_f64(high).unwrap(),
            low: Decimal::from_f64(low).unwrap(),
            close: Decimal::from_f64(close).unwrap(),
            volume: Decimal::from_f64(1000.0).unwrap(),
        }
    }

    fn flat_bars(n: usize, price: f64) -> Vec<PriceBar> {
        (0..n).map(|_| bar(price, price, price, price)).collect()
    }

    #[test]
    fn marubozu_fires_on_full_body_up_candle() {
        // Three consecutive up-closes; the last candle's body is 96% of its
        // high-low range.
        let bars = vec![
            bar(100.0, 101.2, 99.8, 101.0),
            bar(101.0, 102.4, 100.9, 102.0),
            bar(102.0, 107.0, 102.0, 106.8),
        ];
        let patterns = detect_candle_patterns(&bars);
        let marubozu = patterns.iter().find(|p| p.name == "Marubozu").unwrap();
        assert_eq!(marubozu.bias, CandleBias::Bullish);
        assert!((marubozu.confidence - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn doji_and_hammer_geometry() {
        let mut bars = flat_bars(2, 100.0);
        // Tiny body inside a wide range.
        bars.push(bar(100.0, 102.0, 98.0, 100.1));
        let names: Vec<_> = detect_candle_patterns(&bars).iter().map(|p| p.name).collect();
        assert!(names.contains(&"Doji"));

        let mut bars = flat_bars(2, 100.0);
        // Long lower shadow, short upper shadow.
        bars.push(bar(100.4, 101.2, 96.0, 101.0));
        let patterns = detect_candle_patterns(&bars);
        let hammer = patterns.iter().find(|p| p.name == "Hammer").unwrap();
        assert_eq!(hammer.bias, CandleBias::Bullish);
    }

    #[test]
    fn bullish_engulfing_needs_oversized_body() {
        let mut bars = flat_bars(1, 100.0);
        bars.push(bar(101.0, 101.5, 99.4, 99.5)); // red candle
        bars.push(bar(99.4, 102.2, 99.2, 102.0)); // green candle engulfing it
        let patterns = detect_candle_patterns(&bars);
        let engulfing = patterns.iter().find(|p| p.name == "Engulfing").unwrap();
        assert_eq!(engulfing.bias, CandleBias::Bullish);

        // Same shape but the current body barely exceeds the prior one.
        let mut bars = flat_bars(1, 100.0);
        bars.push(bar(101.0, 101.5, 99.4, 99.5));
        bars.push(bar(99.4, 101.4, 99.2, 101.1));
        assert!(detect_candle_patterns(&bars).iter().all(|p| p.name != "Engulfing"));
    }

    #[test]
    fn morning_star_reversal() {
        let mut bars = flat_bars(1, 100.0);
        bars.push(bar(104.0, 104.5, 99.5, 100.0)); // strong red
        bars.push(bar(100.0, 100.6, 99.4, 100.2)); // small-bodied pause
        bars.push(bar(100.2, 104.0, 100.0, 103.8)); // strong green past the midpoint
        // Only the last three bars participate.
        let patterns = detect_candle_patterns(&bars);
        assert!(patterns.iter().any(|p| p.name == "Morning Star" && p.bias == CandleBias::Bullish));
    }

    #[test]
    fn double_top_on_twin_peaks() {
        let mut bars = flat_bars(25, 100.0);
        bars[8] = bar(100.0, 110.0, 99.0, 100.0);
        bars[18] = bar(100.0, 110.5, 99.0, 100.0);
        let patterns = detect_chart_patterns(&bars);
        let top = patterns.iter().find(|p| p.name == "Double Top").unwrap();
        assert_eq!(top.direction, Direction::Bearish);
        assert_eq!(top.kind, ChartKind::Reversal);
    }

    #[test]
    fn head_and_shoulders_measures_its_target() {
        let mut bars = flat_bars(35, 100.0);
        bars[10] = bar(100.0, 110.0, 98.0, 100.0); // left shoulder
        bars[20] = bar(100.0, 120.0, 98.5, 100.0); // head
        bars[30] = bar(100.0, 110.5, 98.0, 100.0); // right shoulder
        let patterns = detect_chart_patterns(&bars);
        let hns = patterns.iter().find(|p| p.name == "Head and Shoulders").unwrap();
        assert_eq!(hns.direction, Direction::Bearish);
        // Neckline 98.0, head 120.0: measured move lands at 76.0.
        assert!((hns.target_price.unwrap() - 76.0).abs() < 1e-9);
    }

    #[test]
    fn ascending_triangle_needs_flat_resistance_and_rising_support() {
        let mut bars = Vec::new();
        for i in 0..20 {
            let low = 100.0 + i as f64 * 0.4;
            let high = if i % 5 == 0 { 110.0 } else { 108.0 };
            bars.push(bar(low + 0.1, high, low, low + 1.0));
        }
        let patterns = detect_chart_patterns(&bars);
        let tri = patterns.iter().find(|p| p.name == "Ascending Triangle").unwrap();
        assert_eq!(tri.direction, Direction::Bullish);
        assert_eq!(tri.kind, ChartKind::Continuation);
    }

    #[test]
    fn flag_after_a_pole() {
        // Quiet lead-in so the 15-bar flag window starts right at the pole.
        let mut bars = flat_bars(5, 100.0);
        // Pole: 100 -> 105 over five bars.
        for i in 1..6 {
            let c = 100.0 + i as f64;
            bars.push(bar(c - 1.0, c + 0.2, c - 1.2, c));
        }
        // Consolidation: drifting sideways near 105.
        for i in 0..10 {
            let c = 105.0 + if i % 2 == 0 { 0.2 } else { -0.2 };
            bars.push(bar(c, c + 0.3, c - 0.3, c));
        }
        let patterns = detect_chart_patterns(&bars);
        let flag = patterns.iter().find(|p| p.name == "Flag").unwrap();
        assert_eq!(flag.direction, Direction::Bullish);
    }

    #[test]
    fn quiet_markets_yield_nothing() {
        assert!(detect_candle_patterns(&flat_bars(2, 100.0)).is_empty());
        assert!(detect_chart_patterns(&flat_bars(40, 100.0)).is_empty());
    }
}

// In crates/forecast/src/models.rs
//
// The six sub-predictor heuristics. Each reads the normalized feature
// window (dimension 0 is the raw close, the shared price anchor) and
// returns a price. They are deliberately cheap: weighted averages, window
// trends and rule tables, not fitted models.

use features::NormalizedFeatures;

use crate::types::ModelKind;

impl ModelKind {
    /// Runs this sub-predictor over the window. The window is assumed to
    /// hold at least the ensemble's sequence length; callers enforce that.
    pub fn predict(&self, window: &[NormalizedFeatures]) -> f64 {
        match self {
            ModelKind::Recency => recency(window),
            ModelKind::Blend => blend(window),
            ModelKind::WindowTrend => window_trend(window),
            ModelKind::Similarity => similarity(window),
            ModelKind::Rules => rules(window),
            ModelKind::StepCount => step_count(window),
        }
    }
}

fn closes(window: &[NormalizedFeatures]) -> Vec<f64> {
    window.iter().map(|f| f.close()).collect()
}

/// Exponentially recency-weighted average, nudged by 10-point momentum.
fn recency(window: &[NormalizedFeatures]) -> f64 {
    let prices = closes(window);
    let n = prices.len();
    let weights: Vec<f64> = (0..n).map(|i| (i as f64 / n as f64).exp()).collect();
    let total: f64 = weights.iter().sum();

    let mut prediction = 0.0;
    for (price, weight) in prices.iter().zip(&weights) {
        prediction += price * weight / total;
    }

    let tail = &prices[n.saturating_sub(10)..];
    let first = tail[0];
    if first != 0.0 {
        let momentum = (tail[tail.len() - 1] - first) / first;
        prediction *= 1.0 + momentum * 0.3;
    }
    prediction
}

/// 70/30 blend of the recent and historical means, stretched by recent
/// volatility.
fn blend(window: &[NormalizedFeatures]) -> f64 {
    let prices = closes(window);
    let split = prices.len().saturating_sub(20);
    let recent = &prices[split..];
    let historical = &prices[..split];

    let recent_avg = mean(recent);
    let historical_avg = if historical.is_empty() { recent_avg } else { mean(historical) };

    let prediction = recent_avg * 0.7 + historical_avg * 0.3;
    prediction * (1.0 + return_volatility(recent) * 0.1)
}

/// Extrapolates each 5-point sliding window by its own trend and averages
/// the results.
fn window_trend(window: &[NormalizedFeatures]) -> f64 {
    const WINDOW: usize = 5;
    let prices = closes(window);
    if prices.len() < WINDOW {
        return *prices.last().unwrap_or(&0.0);
    }

    let mut predictions = Vec::with_capacity(prices.len() - WINDOW + 1);
    for chunk in prices.windows(WINDOW) {
        let first = chunk[0];
        let last = chunk[WINDOW - 1];
        let trend = if first != 0.0 { (last - first) / first } else { 0.0 };
        predictions.push(last * (1.0 + trend));
    }
    mean(&predictions)
}

/// Attention-style lookup: finds historical 10-point shapes correlated with
/// the current one and averages what followed them.
fn similarity(window: &[NormalizedFeatures]) -> f64 {
    const PATTERN: usize = 10;
    let prices = closes(window);
    let n = prices.len();
    let current_price = prices[n - 1];
    if n <= PATTERN {
        return current_price;
    }
    let current = shape(&prices[n - PATTERN..]);

    let mut prediction = current_price;
    let mut attention = 0.0;
    for i in 0..n - PATTERN {
        let candidate = shape(&prices[i..i + PATTERN]);
        let score = correlation(&current, &candidate);
        if score > 0.7 {
            let next = prices.get(i + PATTERN).copied().unwrap_or(current_price);
            prediction += next * score;
            attention += score;
        }
    }

    if attention > 0.0 { prediction / (attention + 1.0) } else { current_price }
}

/// Rule table over the latest indicator snapshot: RSI extremes pull the
/// price back, MACD drifts it, a volume spike amplifies the 5-point trend.
fn rules(window: &[NormalizedFeatures]) -> f64 {
    let latest = &window[window.len() - 1];
    let current_price = latest.close();
    let mut prediction = current_price;

    let rsi = latest.rsi();
    if rsi > 0.7 {
        prediction *= 0.98;
    }
    if rsi < 0.3 {
        prediction *= 1.02;
    }

    prediction *= 1.0 + latest.macd() * 0.01;

    let volume_tail = &window[window.len().saturating_sub(20)..];
    let avg_ratio =
        volume_tail.iter().map(|f| f.volume_ratio()).sum::<f64>() / volume_tail.len() as f64;
    if latest.volume_ratio() > avg_ratio * 1.5 && window.len() >= 5 {
        let anchor = window[window.len() - 5].close();
        if anchor != 0.0 {
            let trend = (current_price - anchor) / anchor;
            prediction *= 1.0 + trend * 0.2;
        }
    }

    prediction
}

/// Counts directional steps over the last ten points; six or more in one
/// direction scales the price by that run's total extent.
fn step_count(window: &[NormalizedFeatures]) -> f64 {
    let prices = closes(window);
    let current_price = prices[prices.len() - 1];
    if prices.len() < 10 {
        return current_price;
    }
    let recent = &prices[prices.len() - 10..];

    let mut ups = 0;
    let mut downs = 0;
    for pair in recent.windows(2) {
        if pair[1] > pair[0] {
            ups += 1;
        } else if pair[1] < pair[0] {
            downs += 1;
        }
    }

    let extent = if recent[0] != 0.0 { (recent[9] - recent[0]) / recent[0] } else { 0.0 };
    if ups >= 6 {
        current_price * (1.0 + extent.max(0.0) * 0.02)
    } else if downs >= 6 {
        current_price * (1.0 - (-extent).max(0.0) * 0.02)
    } else {
        current_price
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn return_volatility(prices: &[f64]) -> f64 {
    if prices.len() < 2 {
        return 0.0;
    }
    let returns: Vec<f64> = prices
        .windows(2)
        .map(|p| if p[0] != 0.0 { (p[1] - p[0]) / p[0] } else { 0.0 })
        .collect();
    let m = mean(&returns);
    let variance = returns.iter().map(|r| (r - m).powi(2)).sum::<f64>() / returns.len() as f64;
    variance.sqrt()
}

/// Min-max scales a price run into [0, 1]; a flat run maps to all zeros.
fn shape(prices: &[f64]) -> Vec<f64> {
    let min = prices.iter().cloned().fold(f64::MAX, f64::min);
    let max = prices.iter().cloned().fold(f64::MIN, f64::max);
    let range = if max - min != 0.0 { max - min } else { 1.0 };
    prices.iter().map(|p| (p - min) / range).collect()
}

fn correlation(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    (dot / a.len() as f64).abs()
}

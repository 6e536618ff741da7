// In crates/features/src/indicators.rs
//
// Streaming indicators the `ta` crate does not ship: Wilder's ADX and the
// Stochastic oscillator. Both follow `ta`'s `Next` shape (feed one bar, get
// the current value) so the feature loop treats every indicator the same way.

use std::collections::VecDeque;

/// Wilder's Average Directional Index.
///
/// Emits 0.0 until both smoothing stages are warm, which is well inside the
/// 200-bar feature warm-up.
#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
    count: usize,
    prev_high: f64,
    prev_low: f64,
    prev_close: f64,
    tr_sum: f64,
    plus_sum: f64,
    minus_sum: f64,
    smoothed_tr: f64,
    smoothed_plus: f64,
    smoothed_minus: f64,
    dx_sum: f64,
    dx_count: usize,
    adx: f64,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            count: 0,
            prev_high: 0.0,
            prev_low: 0.0,
            prev_close: 0.0,
            tr_sum: 0.0,
            plus_sum: 0.0,
            minus_sum: 0.0,
            smoothed_tr: 0.0,
            smoothed_plus: 0.0,
            smoothed_minus: 0.0,
            dx_sum: 0.0,
            dx_count: 0,
            adx: 0.0,
        }
    }

    pub fn next(&mut self, high: f64, low: f64, close: f64) -> f64 {
        if self.count == 0 {
            self.prev_high = high;
            self.prev_low = low;
            self.prev_close = close;
            self.count = 1;
            return 0.0;
        }

        let tr = (high - low)
            .max((high - self.prev_close).abs())
            .max((low - self.prev_close).abs());
        let up_move = high - self.prev_high;
        let down_move = self.prev_low - low;
        let plus_dm = if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 };
        let minus_dm = if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 };

        if self.count <= self.period {
            // Accumulation phase for the first smoothing stage.
            self.tr_sum += tr;
            self.plus_sum += plus_dm;
            self.minus_sum += minus_dm;
            if self.count == self.period {
                self.smoothed_tr = self.tr_sum;
                self.smoothed_plus = self.plus_sum;
                self.smoothed_minus = self.minus_sum;
            }
        } else {
            let p = self.period as f64;
            self.smoothed_tr = self.smoothed_tr - self.smoothed_tr / p + tr;
            self.smoothed_plus = self.smoothed_plus - self.smoothed_plus / p + plus_dm;
            self.smoothed_minus = self.smoothed_minus - self.smoothed_minus / p + minus_dm;
        }

        if self.count >= self.period && self.smoothed_tr > 0.0 {
            let plus_di = 100.0 * self.smoothed_plus / self.smoothed_tr;
            let minus_di = 100.0 * self.smoothed_minus / self.smoothed_tr;
            let di_sum = plus_di + minus_di;
            let dx = if di_sum > 0.0 {
                100.0 * (plus_di - minus_di).abs() / di_sum
            } else {
                0.0
            };

            if self.dx_count < self.period {
                self.dx_sum += dx;
                self.dx_count += 1;
                if self.dx_count == self.period {
                    self.adx = self.dx_sum / self.period as f64;
                }
            } else {
                self.adx = (self.adx * (self.period as f64 - 1.0) + dx) / self.period as f64;
            }
        }

        self.prev_high = high;
        self.prev_low = low;
        self.prev_close = close;
        self.count += 1;

        self.adx
    }
}

/// Stochastic oscillator: raw %K over a rolling high/low window, %D as an
/// SMA of the last `signal` %K values.
#[derive(Debug, Clone)]
pub struct Stochastic {
    period: usize,
    signal: usize,
    highs: VecDeque<f64>,
    lows: VecDeque<f64>,
    k_values: VecDeque<f64>,
}

impl Stochastic {
    pub fn new(period: usize, signal: usize) -> Self {
        Self {
            period,
            signal,
            highs: VecDeque::with_capacity(period + 1),
            lows: VecDeque::with_capacity(period + 1),
            k_values: VecDeque::with_capacity(signal + 1),
        }
    }

    /// Returns `(%K, %D)`. A flat high/low window reads as neutral (50).
    pub fn next(&mut self, high: f64, low: f64, close: f64) -> (f64, f64) {
        self.highs.push_back(high);
        self.lows.push_back(low);
        if self.highs.len() > self.period {
            self.highs.pop_front();
            self.lows.pop_front();
        }

        let highest = self.highs.iter().cloned().fold(f64::MIN, f64::max);
        let lowest = self.lows.iter().cloned().fold(f64::MAX, f64::min);

        let k = if highest > lowest {
            (close - lowest) / (highest - lowest) * 100.0
        } else {
            50.0
        };

        self.k_values.push_back(k);
        if self.k_values.len() > self.signal {
            self.k_values.pop_front();
        }
        let d = self.k_values.iter().sum::<f64>() / self.k_values.len() as f64;

        (k, d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adx_stays_in_band_and_warms_up() {
        let mut adx = Adx::new(14);
        let mut last = 0.0;
        for i in 0..100 {
            // Trending series: higher highs and higher lows.
            let base = 100.0 + i as f64;
            last = adx.next(base + 1.0, base - 1.0, base);
            assert!((0.0..=100.0).contains(&last));
        }
        // A one-directional trend must register as strong.
        assert!(last > 25.0, "trending ADX was {last}");
    }

    #[test]
    fn stochastic_tracks_extremes() {
        let mut stoch = Stochastic::new(14, 3);
        let mut k = 0.0;
        for i in 0..30 {
            let base = 100.0 + i as f64;
            (k, _) = stoch.next(base + 0.5, base - 0.5, base + 0.5);
        }
        // Closing on the window high pins %K near 100.
        assert!(k > 90.0, "%K was {k}");

        let (flat_k, flat_d) = Stochastic::new(14, 3).next(10.0, 10.0, 10.0);
        assert_eq!(flat_k, 50.0);
        assert_eq!(flat_d, 50.0);
    }
}

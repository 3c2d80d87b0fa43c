use rust_decimal::Decimal;

/// RSI (Relative Strength Index) indicator.
///
/// Uses Wilder's smoothed moving average (same as TradingView / standard RSI).
/// Returns `None` until at least `period + 1` closed price values are available.
#[derive(Debug, Clone)]
pub struct RsiIndicator {
    pub period: usize,
    pub overbought: Decimal,
    pub oversold: Decimal,
}

impl RsiIndicator {
    pub fn new(period: usize, overbought: Decimal, oversold: Decimal) -> Self {
        Self { period, overbought, oversold }
    }

    /// Smallest number of closes `compute` accepts.
    pub fn required_len(&self) -> usize {
        self.period + 1
    }

    /// Compute RSI from a slice of close prices (oldest first).
    /// Returns `None` if there are fewer than `period + 1` values.
    pub fn compute(&self, closes: &[Decimal]) -> Option<Decimal> {
        if self.period < 2 || closes.len() < self.required_len() {
            return None;
        }

        let period = Decimal::from(self.period);
        let changes: Vec<Decimal> = closes.windows(2).map(|w| w[1] - w[0]).collect();
        let (initial, rest) = changes.split_at(self.period);

        let mut avg_gain = initial.iter().map(|c| gain(*c)).sum::<Decimal>() / period;
        let mut avg_loss = initial.iter().map(|c| loss(*c)).sum::<Decimal>() / period;

        // Wilder smoothing over remaining changes
        for &change in rest {
            avg_gain = (avg_gain * (period - Decimal::ONE) + gain(change)) / period;
            avg_loss = (avg_loss * (period - Decimal::ONE) + loss(change)) / period;
        }

        if avg_loss.is_zero() {
            return Some(Decimal::ONE_HUNDRED);
        }

        let rs = avg_gain / avg_loss;
        Some(Decimal::ONE_HUNDRED - Decimal::ONE_HUNDRED / (Decimal::ONE + rs))
    }
}

fn gain(change: Decimal) -> Decimal {
    change.max(Decimal::ZERO)
}

fn loss(change: Decimal) -> Decimal {
    (-change).max(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn closes(values: &[f64]) -> Vec<Decimal> {
        values
            .iter()
            .map(|v| Decimal::try_from(*v).unwrap())
            .collect()
    }

    #[test]
    fn rsi_returns_none_when_insufficient_data() {
        let rsi = RsiIndicator::new(14, dec!(70), dec!(30));
        let prices = vec![dec!(100); 14];
        assert!(rsi.compute(&prices).is_none());
    }

    #[test]
    fn rsi_all_gains_returns_100() {
        let rsi = RsiIndicator::new(3, dec!(70), dec!(30));
        let value = rsi.compute(&closes(&[10.0, 11.0, 12.0, 13.0, 14.0])).unwrap();
        assert_eq!(value, dec!(100));
    }

    #[test]
    fn rsi_all_losses_returns_0() {
        let rsi = RsiIndicator::new(3, dec!(70), dec!(30));
        let value = rsi.compute(&closes(&[14.0, 13.0, 12.0, 11.0, 10.0])).unwrap();
        assert_eq!(value, Decimal::ZERO);
    }

    #[test]
    fn rsi_mixed_series_stays_in_range() {
        let rsi = RsiIndicator::new(14, dec!(70), dec!(30));
        let prices = closes(&[
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.15, 43.61, 44.33, 44.83, 45.10,
            45.15, 44.34, 44.09,
        ]);
        let v = rsi.compute(&prices).unwrap();
        assert!(v > Decimal::ZERO && v < Decimal::ONE_HUNDRED, "RSI out of range: {v}");
    }
}

use crate::indicator::Indicator;

/// Relative Strength Index over trailing simple averages.
///
/// At index `i` the last `period` bar-to-bar deltas are split into gains and
/// losses and averaged without smoothing, so every output depends only on its
/// own trailing window. `avg_loss == 0` maps to 100.
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            name: format!("rsi{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn series(&self, closes: &[f64]) -> Vec<Option<f64>> {
        let mut output = vec![None; closes.len()];
        if self.period == 0 || closes.len() <= self.period {
            return output;
        }

        let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

        for (offset, w) in deltas.windows(self.period).enumerate() {
            let avg_gain = w.iter().map(|&d| d.max(0.0)).sum::<f64>() / self.period as f64;
            let avg_loss = w.iter().map(|&d| (-d).max(0.0)).sum::<f64>() / self.period as f64;
            output[offset + self.period] = Some(rsi_value(avg_gain, avg_loss));
        }
        output
    }
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_until_period_deltas_exist() {
        let rsi = Rsi::new(14);
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let values = rsi.series(&closes);
        for (i, v) in values.iter().enumerate() {
            assert_eq!(v.is_some(), i >= 14, "index {i}");
        }
    }

    #[test]
    fn all_gains_return_100() {
        let rsi = Rsi::new(3);
        let values = rsi.series(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(values[3], Some(100.0));
    }

    #[test]
    fn all_losses_return_0() {
        let rsi = Rsi::new(3);
        let values = rsi.series(&[4.0, 3.0, 2.0, 1.0]);
        assert!((values[3].unwrap() - 0.0).abs() < 1e-9);
    }

    #[test]
    fn balanced_moves_return_50() {
        // Deltas +1, -1, +1, -1: equal average gain and loss.
        let rsi = Rsi::new(4);
        let values = rsi.series(&[10.0, 11.0, 10.0, 11.0, 10.0]);
        assert!((values[4].unwrap() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn flat_series_returns_100_by_zero_loss_rule() {
        let rsi = Rsi::new(3);
        let values = rsi.series(&[5.0; 6]);
        assert_eq!(values[3], Some(100.0));
    }

    #[test]
    fn value_depends_only_on_trailing_window() {
        // Same trailing 4 closes, different prefix: identical RSI at the end.
        let rsi = Rsi::new(3);
        let a = rsi.series(&[900.0, 10.0, 12.0, 11.0, 13.0]);
        let b = rsi.series(&[1.0, 10.0, 12.0, 11.0, 13.0]);
        assert_eq!(a[4], b[4]);
    }

    #[test]
    fn output_is_bounded() {
        let rsi = Rsi::new(5);
        let closes: Vec<f64> = (0..40)
            .map(|i| 500.0 + ((i * 73) % 97) as f64 - 48.0)
            .collect();
        for v in rsi.series(&closes).into_iter().flatten() {
            assert!((0.0..=100.0).contains(&v));
        }
    }
}

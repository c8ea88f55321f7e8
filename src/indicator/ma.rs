use crate::indicator::Indicator;

/// Simple moving average over a trailing window.
pub struct Sma {
    window: usize,
    name: String,
}

impl Sma {
    /// `window` must be at least 1; a zero window produces an all-absent
    /// series rather than a division by zero.
    pub fn new(window: usize) -> Self {
        Self {
            window,
            name: format!("ma{window}"),
        }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn series(&self, closes: &[f64]) -> Vec<Option<f64>> {
        let mut output = vec![None; closes.len()];
        if self.window == 0 || closes.len() < self.window {
            return output;
        }

        for (offset, w) in closes.windows(self.window).enumerate() {
            let mean = w.iter().sum::<f64>() / self.window as f64;
            output[offset + self.window - 1] = Some(mean);
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_before_window_filled() {
        let sma = Sma::new(5);
        let closes = [10.0; 10];
        let values = sma.series(&closes);
        assert_eq!(values.len(), 10);
        for (i, v) in values.iter().enumerate() {
            assert_eq!(v.is_some(), i >= 4, "index {i}");
        }
    }

    #[test]
    fn known_values() {
        let sma = Sma::new(3);
        let values = sma.series(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(values[0], None);
        assert_eq!(values[1], None);
        assert!((values[2].unwrap() - 2.0).abs() < 1e-9);
        assert!((values[3].unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn series_shorter_than_window_is_all_absent() {
        let sma = Sma::new(20);
        let values = sma.series(&[10.0; 10]);
        assert!(values.iter().all(Option::is_none));
    }

    #[test]
    fn flat_prices_yield_flat_average() {
        let sma = Sma::new(4);
        let values = sma.series(&[250.0; 8]);
        for v in values.iter().skip(3) {
            assert!((v.unwrap() - 250.0).abs() < 1e-9);
        }
    }

    #[test]
    fn zero_window_is_all_absent() {
        let sma = Sma::new(0);
        assert!(sma.series(&[1.0, 2.0, 3.0]).iter().all(Option::is_none));
    }
}

pub mod ma;
pub mod rsi;

use crate::model::{IndicatorSet, PriceBar};

use self::ma::Sma;
use self::rsi::Rsi;

/// A technical indicator over an oldest-first close-price series.
///
/// The output is aligned to the input: one slot per bar, `None` where the
/// trailing history is too short. Absence is the only warm-up signal; no
/// implementation may emit a sentinel value instead.
pub trait Indicator: Send {
    /// Unique name of this indicator (e.g., "ma5", "rsi14").
    #[allow(dead_code)]
    fn name(&self) -> &str;

    /// Compute one value slot per input close. Pure and deterministic.
    fn series(&self, closes: &[f64]) -> Vec<Option<f64>>;
}

/// Extract close prices from a slice of bars.
pub fn close_prices(bars: &[PriceBar]) -> Vec<f64> {
    bars.iter().map(|b| b.close as f64).collect()
}

/// The standard indicator set stored per bar: MA5/MA20/MA60 and RSI-14.
pub fn compute_sets(bars: &[PriceBar]) -> Vec<IndicatorSet> {
    let closes = close_prices(bars);

    let ma5 = Sma::new(5).series(&closes);
    let ma20 = Sma::new(20).series(&closes);
    let ma60 = Sma::new(60).series(&closes);
    let rsi = Rsi::new(14).series(&closes);

    (0..closes.len())
        .map(|i| IndicatorSet {
            ma5: ma5[i],
            ma20: ma20[i],
            ma60: ma60[i],
            rsi: rsi[i],
        })
        .collect()
}

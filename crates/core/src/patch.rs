use crate::interval::CandleInterval;
use crate::model::Candlestick;
use crate::normalize::round_up_to_interval;

/// Repair holes in an exchange batch so consecutive timestamps differ by
/// exactly one interval, starting at the first boundary at or after
/// `start_ts`.
///
/// A leading gap is filled with clones of the first real candle, an interior
/// gap with clones of the candle preceding it, each with the timestamp
/// rewritten to the missing slot. Trailing gaps are left alone so the caller
/// refetches to advance. Candles earlier than the expected start are dropped.
///
/// Monthly batches are returned untouched: month lengths vary, so there is no
/// honest way to synthesize a missing month.
pub fn patch_candlestick_holes(
    candles: Vec<Candlestick>,
    start_ts: i64,
    interval: CandleInterval,
) -> Vec<Candlestick> {
    if interval.is_monthly() {
        return candles;
    }

    let secs = interval.secs();
    let mut out = Vec::with_capacity(candles.len());
    let mut next_ts = round_up_to_interval(start_ts, secs);

    for candle in candles {
        if candle.timestamp < next_ts {
            continue;
        }
        while next_ts < candle.timestamp {
            let mut filler = *out.last().unwrap_or(&candle);
            filler.timestamp = next_ts;
            out.push(filler);
            next_ts += secs;
        }
        out.push(candle);
        next_ts = candle.timestamp + secs;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(ts: i64, price: f64) -> Candlestick {
        Candlestick::new(ts, price, price + 1.0, price - 1.0, price + 0.5)
    }

    #[test]
    fn dense_batch_is_unchanged() {
        let batch = vec![candle(60, 10.0), candle(120, 11.0), candle(180, 12.0)];
        let patched = patch_candlestick_holes(batch.clone(), 60, CandleInterval::Minutes1);
        assert_eq!(patched, batch);
    }

    #[test]
    fn leading_gap_clones_the_first_candle() {
        let patched = patch_candlestick_holes(
            vec![candle(180, 12.0), candle(240, 13.0)],
            60,
            CandleInterval::Minutes1,
        );
        assert_eq!(
            patched.iter().map(|c| c.timestamp).collect::<Vec<_>>(),
            vec![60, 120, 180, 240]
        );
        // The synthesized candles carry the first real candle's prices.
        assert_eq!(patched[0].open, 12.0);
        assert_eq!(patched[1].open, 12.0);
    }

    #[test]
    fn interior_gap_clones_the_preceding_candle() {
        let patched = patch_candlestick_holes(
            vec![candle(60, 10.0), candle(240, 13.0)],
            60,
            CandleInterval::Minutes1,
        );
        assert_eq!(
            patched.iter().map(|c| c.timestamp).collect::<Vec<_>>(),
            vec![60, 120, 180, 240]
        );
        assert_eq!(patched[1].open, 10.0);
        assert_eq!(patched[2].open, 10.0);
        assert_eq!(patched[3].open, 13.0);
    }

    #[test]
    fn fills_exactly_to_the_last_candle() {
        let patched = patch_candlestick_holes(
            vec![candle(300, 10.0), candle(600, 11.0), candle(1200, 12.0)],
            60,
            CandleInterval::Minutes1,
        );
        let last_ts = patched.last().unwrap().timestamp;
        assert_eq!(patched.len() as i64, (last_ts - 60) / 60 + 1);
        for pair in patched.windows(2) {
            assert_eq!(pair[1].timestamp - pair[0].timestamp, 60);
        }
    }

    #[test]
    fn drops_candles_before_the_expected_start() {
        let patched = patch_candlestick_holes(
            vec![candle(0, 9.0), candle(60, 10.0)],
            30,
            CandleInterval::Minutes1,
        );
        assert_eq!(
            patched.iter().map(|c| c.timestamp).collect::<Vec<_>>(),
            vec![60]
        );
    }

    #[test]
    fn monthly_batches_are_not_patched() {
        let batch = vec![candle(1656633600, 10.0), candle(1661990400, 11.0)];
        let patched = patch_candlestick_holes(batch.clone(), 1656633600, CandleInterval::Months1);
        assert_eq!(patched, batch);
    }

    #[test]
    fn empty_batch_stays_empty() {
        assert!(patch_candlestick_holes(vec![], 60, CandleInterval::Minutes1).is_empty());
    }
}

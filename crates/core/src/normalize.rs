use chrono::{DateTime, Datelike, Months, TimeZone, Utc};

use crate::interval::CandleInterval;

/// Round `ts` up to the next multiple of `secs` (identity on boundaries).
/// Epoch-aligned, so it behaves for pre-1970 instants too.
pub fn round_up_to_interval(ts: i64, secs: i64) -> i64 {
    let floored = ts.div_euclid(secs) * secs;
    if floored < ts {
        floored + secs
    } else {
        floored
    }
}

/// First candle timestamp at or after `start_time` that a provider will
/// anchor on.
///
/// Sub-day and day-based intervals anchor at UTC multiples of the interval
/// counted from the epoch. Monthly candles anchor on the first of the month
/// at 00:00 UTC. With `start_from_next` the result is advanced by exactly one
/// interval, so a caller that already consumed the candle at `start_time`
/// resumes from the next one without doing the arithmetic itself.
pub fn normalize_timestamp(
    start_time: DateTime<Utc>,
    interval: CandleInterval,
    start_from_next: bool,
) -> i64 {
    if interval.is_monthly() {
        let mut boundary = month_floor(start_time);
        if boundary.timestamp() < start_time.timestamp() {
            boundary = boundary + Months::new(1);
        }
        if start_from_next {
            boundary = boundary + Months::new(1);
        }
        return boundary.timestamp();
    }

    let secs = interval.secs();
    let mut ts = round_up_to_interval(start_time.timestamp(), secs);
    if start_from_next {
        ts += secs;
    }
    ts
}

fn month_floor(t: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(t.year(), t.month(), 1, 0, 0, 0)
        .single()
        .expect("first of month at midnight is a valid UTC instant")
}

use envmon_core::{EffectiveRate, MonitorId, Period, Reading};

use crate::error::ReportError;

/// Percentage of expected slots in `period` that received a valid reading.
///
/// At most one reading is counted per slot, so the rate never exceeds 100.
/// A period with no expected slots yields `DegenerateInput`; callers that
/// need a number use [`ReportError::fallback_rate`], which is 0.
pub fn effective_rate(
    monitor_id: &MonitorId,
    readings: &[Reading],
    period: Period,
    interval_secs: i64,
) -> Result<EffectiveRate, ReportError> {
    let expected = period.expected_samples(interval_secs);
    if expected == 0 {
        return Err(ReportError::degenerate_monitor(monitor_id));
    }

    let received = received_slots(readings, period, interval_secs, expected);
    let rate = round_tenth(received as f64 / expected as f64 * 100.0).min(100.0);

    Ok(EffectiveRate {
        monitor_id: monitor_id.clone(),
        rate,
    })
}

/// Completeness used as classifier input; degenerate periods count as 0.
pub fn completeness(
    monitor_id: &MonitorId,
    readings: &[Reading],
    period: Period,
    interval_secs: i64,
) -> f64 {
    match effective_rate(monitor_id, readings, period, interval_secs) {
        Ok(rate) => rate.rate,
        Err(err) => err.fallback_rate().map(|r| r.rate).unwrap_or(0.0),
    }
}

fn received_slots(readings: &[Reading], period: Period, interval_secs: i64, expected: u64) -> u64 {
    let start = period.start.as_second();
    let mut slots: Vec<i64> = readings
        .iter()
        .filter(|r| r.valid && period.contains(r.timestamp))
        .map(|r| (r.timestamp.as_second() - start) / interval_secs)
        .filter(|slot| (*slot as u64) < expected)
        .collect();
    slots.sort_unstable();
    slots.dedup();
    slots.len() as u64
}

pub(crate) fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use envmon_core::PowerSignal;
    use jiff::Timestamp;

    const DAY_START: i64 = 1_714_521_600;

    fn reading(offset_secs: i64, valid: bool) -> Reading {
        Reading {
            monitor_id: "m1".into(),
            monitor_type: "PM25".into(),
            timestamp: Timestamp::from_second(DAY_START + offset_secs).unwrap(),
            value: 1.0,
            valid,
            power: PowerSignal::Ok,
        }
    }

    fn day() -> Period {
        Period::new(
            Timestamp::from_second(DAY_START).unwrap(),
            Timestamp::from_second(DAY_START + 86_400).unwrap(),
        )
    }

    #[test]
    fn test_two_missing_hours() {
        let readings: Vec<Reading> = (0..24)
            .filter(|h| *h != 5 && *h != 17)
            .map(|h| reading(h * 3600, true))
            .collect();

        let rate = effective_rate(&"m1".into(), &readings, day(), 3600).unwrap();
        assert_eq!(rate.rate, 91.7);
    }

    #[test]
    fn test_duplicates_do_not_push_rate_over_100() {
        let readings: Vec<Reading> = (0..24)
            .flat_map(|h| [reading(h * 3600, true), reading(h * 3600 + 60, true)])
            .collect();

        let rate = effective_rate(&"m1".into(), &readings, day(), 3600).unwrap();
        assert_eq!(rate.rate, 100.0);
    }

    #[test]
    fn test_invalid_and_out_of_period_readings_are_ignored() {
        let readings = vec![
            reading(-3600, true),
            reading(0, false),
            reading(3600, true),
            reading(86_400, true),
        ];

        let rate = effective_rate(&"m1".into(), &readings, day(), 3600).unwrap();
        assert_eq!(rate.rate, round_tenth(100.0 / 24.0));
    }

    #[test]
    fn test_degenerate_period() {
        let ts = Timestamp::from_second(DAY_START).unwrap();
        let empty = Period::new(ts, ts);

        let err = effective_rate(&"m1".into(), &[], empty, 3600).unwrap_err();
        assert!(matches!(err, ReportError::DegenerateInput { .. }));
        assert_eq!(err.fallback_rate().unwrap().rate, 0.0);
        assert_eq!(completeness(&"m1".into(), &[], empty, 3600), 0.0);
    }
}

use jiff::{Timestamp, civil::Date, tz::Offset};
use serde::{Deserialize, Serialize};

/// A half-open time range `[start, end)`.
///
/// The effective-rate calculation and the completeness input of the status
/// classifier must be computed over the very same `Period` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl Period {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    /// The civil day `date` at the given UTC offset.
    pub fn day(date: Date, offset: Offset) -> Result<Self, jiff::Error> {
        let start = offset.to_timestamp(date.at(0, 0, 0, 0))?;
        let end = offset.to_timestamp(date.tomorrow()?.at(0, 0, 0, 0))?;
        Ok(Self { start, end })
    }

    /// The civil month `year`-`month` at the given UTC offset.
    pub fn month(year: i16, month: i8, offset: Offset) -> Result<Self, jiff::Error> {
        let first = Date::new(year, month, 1)?;
        let start = offset.to_timestamp(first.at(0, 0, 0, 0))?;
        let end = offset.to_timestamp(first.last_of_month().tomorrow()?.at(0, 0, 0, 0))?;
        Ok(Self { start, end })
    }

    pub fn duration_secs(&self) -> i64 {
        (self.end.as_second() - self.start.as_second()).max(0)
    }

    pub fn contains(&self, ts: Timestamp) -> bool {
        self.start <= ts && ts < self.end
    }

    pub fn overlaps(&self, other: &Period) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Number of samples a monitor reporting every `interval_secs` delivers
    /// over this period. Zero for an empty period or a zero interval.
    pub fn expected_samples(&self, interval_secs: i64) -> u64 {
        if interval_secs <= 0 {
            return 0;
        }
        (self.duration_secs() / interval_secs) as u64
    }

    /// Start of every sampling slot inside the period.
    pub fn slot_starts(&self, interval_secs: i64) -> impl Iterator<Item = Timestamp> + use<> {
        let start = self.start.as_second();
        let count = self.expected_samples(interval_secs) as i64;
        (0..count).filter_map(move |k| Timestamp::from_second(start + k * interval_secs).ok())
    }

    /// Every sampling slot `[s, s + interval)` inside the period.
    pub fn slots(&self, interval_secs: i64) -> impl Iterator<Item = Period> + use<> {
        self.slot_starts(interval_secs).filter_map(move |start| {
            let end = Timestamp::from_second(start.as_second() + interval_secs).ok()?;
            Some(Period::new(start, end))
        })
    }

    /// The final slot of [`Period::slots`]. Slots are cut from `start`, so a
    /// period that is not a whole number of intervals leaves its tail uncovered.
    pub fn last_slot(&self, interval_secs: i64) -> Option<Period> {
        self.slots(interval_secs).last()
    }

    /// Extends the start backwards by `secs`, used to fetch classifier history.
    pub fn widen_back(&self, secs: i64) -> Result<Self, jiff::Error> {
        let start = Timestamp::from_second(self.start.as_second() - secs)?;
        Ok(Self { start, end: self.end })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;
    use jiff::tz::offset;

    #[test]
    fn test_day_respects_offset() {
        let period = Period::day(date(2024, 5, 1), offset(8)).unwrap();
        assert_eq!(period.start.to_string(), "2024-04-30T16:00:00Z");
        assert_eq!(period.duration_secs(), 86_400);
        assert_eq!(period.expected_samples(3600), 24);
    }

    #[test]
    fn test_month_lengths() {
        let feb = Period::month(2024, 2, offset(0)).unwrap();
        assert_eq!(feb.duration_secs(), 29 * 86_400);

        let dec = Period::month(2023, 12, offset(0)).unwrap();
        assert_eq!(dec.end.to_string(), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn test_degenerate_period_expects_nothing() {
        let ts: Timestamp = "2024-05-01T00:00:00Z".parse().unwrap();
        let empty = Period::new(ts, ts);
        assert_eq!(empty.expected_samples(3600), 0);
        assert_eq!(empty.slot_starts(3600).count(), 0);
        assert!(empty.last_slot(3600).is_none());
        assert_eq!(Period::new(ts, ts).expected_samples(0), 0);
    }

    #[test]
    fn test_last_slot() {
        let period = Period::day(date(2024, 5, 1), offset(0)).unwrap();
        let last = period.last_slot(3600).unwrap();
        assert_eq!(last.start.to_string(), "2024-05-01T23:00:00Z");
        assert_eq!(last.end, period.end);
        assert_eq!(period.slots(3600).last(), Some(last));
    }

    #[test]
    fn test_last_slot_is_cut_from_start() {
        let start: Timestamp = "2024-05-01T00:00:00Z".parse().unwrap();
        let end: Timestamp = "2024-05-01T02:30:00Z".parse().unwrap();
        let period = Period::new(start, end);

        assert_eq!(period.expected_samples(3600), 2);
        let last = period.last_slot(3600).unwrap();
        assert_eq!(last.start.to_string(), "2024-05-01T01:00:00Z");
        assert_eq!(last.end.to_string(), "2024-05-01T02:00:00Z");
    }
}

//! Operational status of a single sampling slot.
//!
//! Rules are evaluated in the order of [`PRECEDENCE`]; the first rule that
//! applies decides the status. `Normal` always applies, so the chain is total.

use envmon_core::{Monitor, MonitorType, Period, PowerSignal, Reading, Status};

use crate::config::ClassifierConfig;
use crate::error::ReportError;

/// Evaluation order of the classification rules.
pub const PRECEDENCE: [Status; 6] = [
    Status::Disconnect,
    Status::PowerError,
    Status::NoPowerInfo,
    Status::Constant,
    Status::LessThanExpected,
    Status::Normal,
];

/// Position of `status` in [`PRECEDENCE`]; lower wins.
pub fn rank(status: Status) -> usize {
    PRECEDENCE
        .iter()
        .position(|s| *s == status)
        .unwrap_or(PRECEDENCE.len())
}

/// The status that comes first in the precedence order, if any.
pub fn most_severe<I>(statuses: I) -> Option<Status>
where
    I: IntoIterator<Item = Status>,
{
    statuses.into_iter().min_by_key(|s| rank(*s))
}

/// Everything the classifier looks at for one slot.
#[derive(Debug, Clone, Copy)]
pub struct SlotObservation<'a> {
    pub monitor_type: &'a MonitorType,
    pub slot: Period,
    /// The representative reading of the slot, if one arrived.
    pub reading: Option<&'a Reading>,
    /// Earlier readings of the same series, ascending.
    pub history: &'a [Reading],
    /// Effective rate of the enclosing period, in percent.
    pub completeness: f64,
}

/// A slot together with its representative reading and status.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedSlot {
    pub slot: Period,
    pub reading: Option<Reading>,
    pub status: Status,
}

#[derive(Debug, Clone)]
pub struct StatusClassifier {
    config: ClassifierConfig,
}

impl StatusClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn classify(
        &self,
        monitor: &Monitor,
        observation: &SlotObservation<'_>,
    ) -> Result<Status, ReportError> {
        check_series(monitor, observation.monitor_type, observation.reading)?;

        Ok(PRECEDENCE
            .into_iter()
            .find(|status| self.applies(*status, observation))
            .unwrap_or(Status::Normal))
    }

    fn applies(&self, status: Status, observation: &SlotObservation<'_>) -> bool {
        let Some(reading) = observation.reading.filter(|r| {
            r.valid && observation.slot.contains(r.timestamp)
        }) else {
            return status == Status::Disconnect;
        };

        match status {
            Status::Disconnect => false,
            Status::PowerError => reading.power == PowerSignal::Fault,
            Status::NoPowerInfo => reading.power == PowerSignal::Absent,
            Status::Constant => self.is_constant(reading, observation.history),
            Status::LessThanExpected => {
                observation.completeness < self.config.completeness_threshold
            }
            Status::Normal => true,
        }
    }

    /// The last K valid readings, ending with `reading`, stay within epsilon
    /// of each other for longer than the configured duration.
    fn is_constant(&self, reading: &Reading, history: &[Reading]) -> bool {
        let window = self.config.constant_window;
        if window < 2 {
            return false;
        }

        let earlier: Vec<&Reading> = history
            .iter()
            .rev()
            .filter(|r| r.valid && r.timestamp < reading.timestamp)
            .take(window - 1)
            .collect();
        if earlier.len() < window - 1 {
            return false;
        }

        let (lo, hi) = earlier
            .iter()
            .map(|r| r.value)
            .fold((reading.value, reading.value), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        if hi - lo > self.config.constant_epsilon {
            return false;
        }

        let Some(oldest) = earlier.last() else {
            return false;
        };
        let span = reading.timestamp.as_second() - oldest.timestamp.as_second();
        span > self.config.constant_min_duration_secs
    }

    /// Classifies consecutive slots of one series.
    ///
    /// `readings` must be sorted by timestamp and may start before the first
    /// slot so the constant-value rule sees enough history.
    pub fn classify_slots<I>(
        &self,
        monitor: &Monitor,
        monitor_type: &MonitorType,
        readings: &[Reading],
        slots: I,
        completeness: f64,
    ) -> Result<Vec<ClassifiedSlot>, ReportError>
    where
        I: IntoIterator<Item = Period>,
    {
        check_series(monitor, monitor_type, None)?;

        slots
            .into_iter()
            .map(|slot| {
                let index = representative_index(readings, slot);
                let reading = index.map(|i| &readings[i]);
                let history = &readings[..index.unwrap_or_else(|| first_at(readings, slot))];

                let status = self.classify(
                    monitor,
                    &SlotObservation {
                        monitor_type,
                        slot,
                        reading,
                        history,
                        completeness,
                    },
                )?;

                Ok(ClassifiedSlot {
                    slot,
                    reading: reading.cloned(),
                    status,
                })
            })
            .collect()
    }
}

fn check_series(
    monitor: &Monitor,
    monitor_type: &MonitorType,
    reading: Option<&Reading>,
) -> Result<(), ReportError> {
    if !monitor.reports(monitor_type) {
        return Err(ReportError::InvalidInput(format!(
            "monitor {} does not report {monitor_type}",
            monitor.id
        )));
    }

    if let Some(reading) = reading {
        if reading.monitor_id != monitor.id || &reading.monitor_type != monitor_type {
            return Err(ReportError::InvalidInput(format!(
                "reading of {}/{} classified as {}/{monitor_type}",
                reading.monitor_id, reading.monitor_type, monitor.id
            )));
        }
        if !reading.value.is_finite() {
            return Err(ReportError::InvalidInput(format!(
                "non-finite value from {} at {}",
                reading.monitor_id, reading.timestamp
            )));
        }
    }

    Ok(())
}

fn first_at(readings: &[Reading], slot: Period) -> usize {
    readings.partition_point(|r| r.timestamp < slot.start)
}

/// Index of the earliest valid reading inside `slot`.
pub fn representative_index(readings: &[Reading], slot: Period) -> Option<usize> {
    let start = first_at(readings, slot);
    readings[start..]
        .iter()
        .take_while(|r| r.timestamp < slot.end)
        .position(|r| r.valid)
        .map(|offset| start + offset)
}

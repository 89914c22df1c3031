//! Hourly grids rendered from classified reading slots.

use envmon_core::{
    CellData, DailyReport, Monitor, MonitorType, MonthlyHourReport, Period, Reading, Report,
    RowData, StatRow,
};
use jiff::{Timestamp, civil::Date, tz::Offset};

use crate::classify::{ClassifiedSlot, StatusClassifier};
use crate::error::ReportError;
use crate::rate;

const HOUR_SECS: i64 = 3600;
const DAY_SECS: i64 = 24 * HOUR_SECS;

/// Names of the summary rows, in render order.
pub const STAT_ROWS: [&str; 5] = ["max", "min", "avg", "count", "excluded"];

/// One monitor-type of one monitor, shown as a single grid column (daily)
/// or spread over the whole grid (monthly).
#[derive(Debug, Clone, Copy)]
pub struct Series<'a> {
    pub name: &'a str,
    pub monitor: &'a Monitor,
    pub monitor_type: &'a MonitorType,
    /// Sorted by timestamp; may start before the report period.
    pub readings: &'a [Reading],
}

pub struct RollupEngine<'a> {
    classifier: &'a StatusClassifier,
    interval_secs: i64,
    offset: Offset,
    decimals: usize,
}

impl<'a> RollupEngine<'a> {
    pub fn new(
        classifier: &'a StatusClassifier,
        interval_secs: i64,
        offset: Offset,
        decimals: usize,
    ) -> Self {
        Self {
            classifier,
            interval_secs,
            offset,
            decimals,
        }
    }

    /// 24 hourly rows for the civil day `date`, one column per series.
    pub fn daily(&self, date: Date, columns: &[Series<'_>]) -> Result<DailyReport, ReportError> {
        let day = Period::day(date, self.offset)?;
        let hours: Vec<Period> = day.slots(HOUR_SECS).collect();

        let by_column = columns
            .iter()
            .map(|series| self.classify_day(series, day))
            .collect::<Result<Vec<_>, _>>()?;

        let rows = hours
            .iter()
            .enumerate()
            .map(|(i, hour)| {
                let cells = by_column.iter().map(|column| column[i].clone()).collect();
                (hour.start, cells)
            })
            .collect();

        let names = columns.iter().map(|s| s.name.to_owned()).collect();
        Ok(self.render(names, rows))
    }

    /// One row per civil day of the month, one column per hour of day.
    pub fn monthly_hour(
        &self,
        year: i16,
        month: i8,
        series: &Series<'_>,
    ) -> Result<MonthlyHourReport, ReportError> {
        let month = Period::month(year, month, self.offset)?;

        let rows = month
            .slots(DAY_SECS)
            .map(|day| -> Result<_, ReportError> {
                Ok((day.start, self.classify_day(series, day)?))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let names = (0..24).map(|h| format!("{h:02}")).collect();
        Ok(self.render(names, rows))
    }

    fn classify_day(
        &self,
        series: &Series<'_>,
        day: Period,
    ) -> Result<Vec<ClassifiedSlot>, ReportError> {
        let completeness =
            rate::completeness(&series.monitor.id, series.readings, day, self.interval_secs);

        self.classifier.classify_slots(
            series.monitor,
            series.monitor_type,
            series.readings,
            day.slots(HOUR_SECS),
            completeness,
        )
    }

    fn render(
        &self,
        column_names: Vec<String>,
        rows: Vec<(Timestamp, Vec<ClassifiedSlot>)>,
    ) -> Report {
        let stat_rows = self.stat_rows(column_names.len(), &rows);

        let rows = rows
            .into_iter()
            .map(|(date, slots)| RowData {
                date,
                cell_data: slots.iter().map(|slot| self.cell(slot)).collect(),
            })
            .collect();

        Report {
            column_names,
            rows,
            stat_rows,
        }
    }

    fn cell(&self, slot: &ClassifiedSlot) -> CellData {
        match &slot.reading {
            Some(reading) => CellData::with_status(self.format(reading.value), slot.status),
            None => CellData::missing(),
        }
    }

    fn format(&self, value: f64) -> String {
        format!("{value:.prec$}", prec = self.decimals)
    }

    fn stat_rows(&self, width: usize, rows: &[(Timestamp, Vec<ClassifiedSlot>)]) -> Vec<StatRow> {
        let columns: Vec<ColumnStats> = (0..width)
            .map(|j| ColumnStats::collect(rows.iter().filter_map(|(_, slots)| slots.get(j))))
            .collect();

        STAT_ROWS
            .iter()
            .map(|name| StatRow {
                name: (*name).to_owned(),
                cell_data: columns
                    .iter()
                    .map(|stats| CellData::plain(self.stat_value(name, stats)))
                    .collect(),
            })
            .collect()
    }

    fn stat_value(&self, name: &str, stats: &ColumnStats) -> String {
        if stats.is_empty() {
            return String::new();
        }

        match name {
            "max" => stats.max().map(|v| self.format(v)).unwrap_or_default(),
            "min" => stats.min().map(|v| self.format(v)).unwrap_or_default(),
            "avg" => stats.avg().map(|v| self.format(v)).unwrap_or_default(),
            "count" => stats.usable.len().to_string(),
            "excluded" => stats.excluded.to_string(),
            _ => String::new(),
        }
    }
}

/// Aggregation input for one column: usable values and the number of
/// present readings left out because of their status.
#[derive(Debug, Default)]
struct ColumnStats {
    usable: Vec<f64>,
    excluded: usize,
}

impl ColumnStats {
    fn collect<'s>(slots: impl Iterator<Item = &'s ClassifiedSlot>) -> Self {
        let mut stats = Self::default();
        for slot in slots {
            let Some(reading) = &slot.reading else {
                continue;
            };
            if slot.status.is_usable() {
                stats.usable.push(reading.value);
            } else {
                stats.excluded += 1;
            }
        }
        stats
    }

    /// No reading arrived at all.
    fn is_empty(&self) -> bool {
        self.usable.is_empty() && self.excluded == 0
    }

    fn max(&self) -> Option<f64> {
        self.usable.iter().copied().reduce(f64::max)
    }

    fn min(&self) -> Option<f64> {
        self.usable.iter().copied().reduce(f64::min)
    }

    fn avg(&self) -> Option<f64> {
        if self.usable.is_empty() {
            return None;
        }
        Some(self.usable.iter().sum::<f64>() / self.usable.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierConfig;
    use envmon_core::{PowerSignal, Status};
    use jiff::civil::date;
    use jiff::tz::offset;

    fn monitor() -> Monitor {
        Monitor {
            id: "m1".into(),
            desc: "Station 1".into(),
            monitor_types: vec![MonitorType::from("PM25"), MonitorType::from("TEMP")]
                .into_boxed_slice(),
            tags: Box::new([]),
            location: None,
            short_code: None,
            code: None,
            enabled: None,
            county: None,
            district: None,
            sensor_detail: None,
        }
    }

    fn hourly(
        monitor_type: &str,
        day: Date,
        hours: impl Iterator<Item = i8>,
        value: f64,
    ) -> Vec<Reading> {
        hours
            .map(|h| Reading {
                monitor_id: "m1".into(),
                monitor_type: monitor_type.into(),
                timestamp: offset(0).to_timestamp(day.at(h, 0, 0, 0)).unwrap(),
                value,
                valid: true,
                power: PowerSignal::Ok,
            })
            .collect()
    }

    fn engine(classifier: &StatusClassifier) -> RollupEngine<'_> {
        RollupEngine::new(classifier, 3600, offset(0), 2)
    }

    #[test]
    fn test_daily_grid_with_missing_hours() {
        let classifier = StatusClassifier::new(ClassifierConfig::default());
        let day = date(2024, 5, 1);
        let monitor = monitor();
        let pm25 = MonitorType::from("PM25");
        let mut readings = hourly("PM25", day, (0..24).filter(|h| *h != 5 && *h != 17), 0.0);
        for (i, r) in readings.iter_mut().enumerate() {
            r.value = i as f64;
        }

        let series = Series {
            name: "PM25",
            monitor: &monitor,
            monitor_type: &pm25,
            readings: &readings,
        };
        let report = engine(&classifier).daily(day, &[series]).unwrap();

        assert!(report.is_consistent());
        assert_eq!(report.rows.len(), 24);
        assert!(report.rows[5].cell_data[0].is_missing());
        assert!(report.rows[17].cell_data[0].is_missing());
        assert_eq!(report.rows[0].cell_data[0].status, Some(Status::Normal));
        assert_eq!(report.rows[0].cell_data[0].v, "0.00");

        let stats: Vec<&str> = report
            .stat_rows
            .iter()
            .map(|r| r.cell_data[0].v.as_str())
            .collect();
        assert_eq!(stats, vec!["21.00", "0.00", "10.50", "22", "0"]);
    }

    #[test]
    fn test_columns_without_data_have_empty_stats() {
        let classifier = StatusClassifier::new(ClassifierConfig::default());
        let day = date(2024, 5, 1);
        let monitor = monitor();
        let (pm25, temp) = (MonitorType::from("PM25"), MonitorType::from("TEMP"));
        let readings = hourly("PM25", day, 0..24, 3.0);

        let columns = [
            Series {
                name: "PM25",
                monitor: &monitor,
                monitor_type: &pm25,
                readings: &readings,
            },
            Series {
                name: "TEMP",
                monitor: &monitor,
                monitor_type: &temp,
                readings: &[],
            },
        ];
        let report = engine(&classifier).daily(day, &columns).unwrap();

        assert_eq!(report.column_names, vec!["PM25", "TEMP"]);
        assert!(report.is_consistent());
        assert!(report.rows.iter().all(|row| row.cell_data[1].is_missing()));
        assert!(report.stat_rows.iter().all(|row| row.cell_data[1].v.is_empty()));
    }

    #[test]
    fn test_constant_cells_are_excluded_from_stats() {
        let classifier = StatusClassifier::new(ClassifierConfig::default());
        let day = date(2024, 5, 1);
        let monitor = monitor();
        let pm25 = MonitorType::from("PM25");
        let readings = hourly("PM25", day, 0..24, 4.0);

        let series = Series {
            name: "PM25",
            monitor: &monitor,
            monitor_type: &pm25,
            readings: &readings,
        };
        let report = engine(&classifier).daily(day, &[series]).unwrap();

        // Hours 0-3 lack history; from hour 4 on the value is stuck.
        assert_eq!(report.rows[3].cell_data[0].status, Some(Status::Normal));
        assert_eq!(report.rows[4].cell_data[0].status, Some(Status::Constant));
        let stats: Vec<&str> = report
            .stat_rows
            .iter()
            .map(|r| r.cell_data[0].v.as_str())
            .collect();
        assert_eq!(stats, vec!["4.00", "4.00", "4.00", "4", "20"]);
    }

    #[test]
    fn test_monthly_grid_shape() {
        let classifier = StatusClassifier::new(ClassifierConfig::default());
        let monitor = monitor();
        let pm25 = MonitorType::from("PM25");
        let mut readings = hourly("PM25", date(2024, 2, 10), [8, 9].into_iter(), 1.0);
        readings[1].value = 3.0;

        let series = Series {
            name: "PM25",
            monitor: &monitor,
            monitor_type: &pm25,
            readings: &readings,
        };
        let report = engine(&classifier).monthly_hour(2024, 2, &series).unwrap();

        assert_eq!(report.rows.len(), 29);
        assert_eq!(report.column_names.len(), 24);
        assert_eq!(report.column_names[8], "08");
        assert!(report.is_consistent());

        let row = &report.rows[9];
        assert_eq!(row.date.to_string(), "2024-02-10T00:00:00Z");
        // Two of 24 slots is far below the completeness threshold.
        assert_eq!(row.cell_data[9].status, Some(Status::LessThanExpected));
        assert_eq!(row.cell_data[9].v, "3.00");
        assert!(row.cell_data[10].is_missing());

        let count = report.stat_rows.iter().find(|r| r.name == "count").unwrap();
        assert_eq!(count.cell_data[8].v, "1");
        assert_eq!(count.cell_data[0].v, "");
    }

    #[test]
    fn test_type_not_reported_by_monitor() {
        let classifier = StatusClassifier::new(ClassifierConfig::default());
        let monitor = monitor();
        let no2 = MonitorType::from("NO2");
        let series = Series {
            name: "NO2",
            monitor: &monitor,
            monitor_type: &no2,
            readings: &[],
        };

        let result = engine(&classifier).daily(date(2024, 5, 1), &[series]);
        assert!(matches!(result, Err(ReportError::InvalidInput(_))));
    }
}

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use envmon_core::catalog::PM25;
use envmon_core::{
    DailyReport, EffectiveRate, GroupId, Monitor, MonitorId, MonitorType, MonthlyHourReport,
    Period, QuartileReport, Reading, Status,
};
use jiff::civil::Date;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::batch::{Omission, TaskOutcome, run_batch};
use crate::classify::{StatusClassifier, most_severe};
use crate::config::Config;
use crate::error::ReportError;
use crate::group::{self, GroupSummaryReport};
use crate::quartile::{self, QuartileReportSet};
use crate::rate;
use crate::registry::DataSource;
use crate::registry::filter::MonitorFilter;
use crate::rollup::{RollupEngine, Series};

/// Grouping axis of a daily report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "camelCase")]
pub enum Axis {
    /// One monitor, one column per monitor-type.
    MonitorTypes {
        monitor: MonitorId,
        types: Vec<MonitorType>,
    },
    /// One monitor-type, one column per monitor.
    Monitors {
        monitor_type: MonitorType,
        monitors: Vec<MonitorId>,
    },
}

/// A resolved report column with its readings.
struct Column {
    name: String,
    monitor: Monitor,
    monitor_type: MonitorType,
    readings: Vec<Reading>,
}

impl Column {
    fn series(&self) -> Series<'_> {
        Series {
            name: &self.name,
            monitor: &self.monitor,
            monitor_type: &self.monitor_type,
            readings: &self.readings,
        }
    }
}

/// The query operations exposed to the rendering layer.
///
/// Every operation reads a fresh view from the data source and returns a
/// complete structure or an error; nothing is cached between calls.
#[derive(Clone)]
pub struct ReportService<S> {
    source: S,
    config: Arc<Config>,
    classifier: Arc<StatusClassifier>,
    cancel: CancellationToken,
}

impl<S> ReportService<S>
where
    S: DataSource + Clone,
{
    pub fn new(source: S, config: Config) -> Self {
        let classifier = StatusClassifier::new(config.classifier.clone());
        Self {
            source,
            config: Arc::new(config),
            classifier: Arc::new(classifier),
            cancel: CancellationToken::new(),
        }
    }

    /// Batches started by this service stop when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn interval_secs(&self) -> i64 {
        self.config.sampling.interval_secs
    }

    fn engine(&self) -> Result<RollupEngine<'_>, ReportError> {
        Ok(RollupEngine::new(
            &self.classifier,
            self.interval_secs(),
            self.config.report.offset()?,
            self.config.report.decimals,
        ))
    }

    /// Readings of `period` plus enough earlier ones for the constant rule.
    async fn readings_with_history(
        &self,
        monitor_id: &MonitorId,
        monitor_type: &MonitorType,
        period: Period,
    ) -> Result<Vec<Reading>, ReportError> {
        let lookback = self.config.classifier.constant_window as i64 * self.interval_secs();
        self.source
            .fetch_readings(monitor_id, monitor_type, period.widen_back(lookback)?)
            .await
            .map_err(ReportError::from_source)
    }

    async fn monitor(&self, id: &MonitorId) -> Result<Monitor, ReportError> {
        self.source
            .fetch_monitor(id)
            .await
            .map_err(ReportError::from_source)?
            .ok_or_else(|| ReportError::MissingMetadata(format!("monitor {id}")))
    }

    fn require_type(monitor: &Monitor, monitor_type: &MonitorType) -> Result<(), ReportError> {
        if monitor.reports(monitor_type) {
            Ok(())
        } else {
            Err(ReportError::InvalidInput(format!(
                "monitor {} does not report {monitor_type}",
                monitor.id
            )))
        }
    }

    /// Fails with `InvalidRange` unless `period` overlaps the combined
    /// coverage of the given series.
    async fn ensure_coverage(
        &self,
        series: &[(&MonitorId, &MonitorType)],
        period: Period,
    ) -> Result<(), ReportError> {
        let mut combined: Option<Period> = None;
        for (monitor_id, monitor_type) in series {
            let coverage = self
                .source
                .coverage(monitor_id, monitor_type)
                .await
                .map_err(ReportError::from_source)?;
            if let Some(coverage) = coverage {
                combined = Some(match combined {
                    Some(c) => Period::new(c.start.min(coverage.start), c.end.max(coverage.end)),
                    None => coverage,
                });
            }
        }

        match combined {
            Some(coverage) if coverage.overlaps(&period) => Ok(()),
            _ => Err(ReportError::InvalidRange { requested: period }),
        }
    }

    async fn load_columns(
        &self,
        targets: Vec<(String, Monitor, MonitorType)>,
        period: Period,
    ) -> Result<Vec<Column>, ReportError> {
        let keys: Vec<(&MonitorId, &MonitorType)> =
            targets.iter().map(|(_, m, t)| (&m.id, t)).collect();
        self.ensure_coverage(&keys, period).await?;

        let mut columns = Vec::with_capacity(targets.len());
        for (name, monitor, monitor_type) in targets {
            let readings = self
                .readings_with_history(&monitor.id, &monitor_type, period)
                .await?;
            columns.push(Column {
                name,
                monitor,
                monitor_type,
                readings,
            });
        }
        Ok(columns)
    }

    #[tracing::instrument(skip(self))]
    pub async fn generate_daily_report(
        &self,
        axis: &Axis,
        date: Date,
    ) -> Result<DailyReport, ReportError> {
        let targets = match axis {
            Axis::MonitorTypes { monitor, types } => {
                let monitor = self.monitor(monitor).await?;
                types
                    .iter()
                    .map(|t| -> Result<_, ReportError> {
                        Self::require_type(&monitor, t)?;
                        Ok((t.to_string(), monitor.clone(), t.clone()))
                    })
                    .collect::<Result<Vec<_>, _>>()?
            }
            Axis::Monitors {
                monitor_type,
                monitors,
            } => {
                let mut targets = Vec::with_capacity(monitors.len());
                for id in monitors {
                    let monitor = self.monitor(id).await?;
                    Self::require_type(&monitor, monitor_type)?;
                    let name = format!("{} ({})", monitor.desc, monitor.id);
                    targets.push((name, monitor, monitor_type.clone()));
                }
                targets
            }
        };
        if targets.is_empty() {
            return Err(ReportError::InvalidInput("no report columns requested".into()));
        }

        let day = Period::day(date, self.config.report.offset()?)?;
        let columns = self.load_columns(targets, day).await?;
        let series: Vec<Series<'_>> = columns.iter().map(Column::series).collect();

        let report = self.engine()?.daily(date, &series)?;
        info!(columns = report.column_names.len(), "daily report generated");
        Ok(report)
    }

    #[tracing::instrument(skip(self))]
    pub async fn generate_monthly_hour_report(
        &self,
        monitor_id: &MonitorId,
        monitor_type: &MonitorType,
        year: i16,
        month: i8,
    ) -> Result<MonthlyHourReport, ReportError> {
        let monitor = self.monitor(monitor_id).await?;
        Self::require_type(&monitor, monitor_type)?;

        let period = Period::month(year, month, self.config.report.offset()?)?;
        let target = (monitor_type.to_string(), monitor, monitor_type.clone());
        let columns = self.load_columns(vec![target], period).await?;

        let report = self
            .engine()?
            .monthly_hour(year, month, &columns[0].series())?;
        info!(rows = report.rows.len(), "monthly hour report generated");
        Ok(report)
    }

    /// One report per peer that has usable values of `monitor_type` in
    /// `period`, in peer order, with the `away` flag set across the set.
    /// Peers without a report are listed as omissions.
    #[tracing::instrument(skip(self))]
    pub async fn compute_quartile_report(
        &self,
        monitor_type: &MonitorType,
        period: Period,
        peers: &[MonitorId],
    ) -> Result<QuartileReportSet, ReportError> {
        if period.expected_samples(self.interval_secs()) == 0 {
            return Err(ReportError::degenerate(format!("{monitor_type} peer set")));
        }

        let tasks = peers
            .iter()
            .map(|id| {
                let service = self.clone();
                let key = id.clone();
                let id = id.clone();
                let monitor_type = monitor_type.clone();
                let task =
                    async move { service.peer_quartile(&id, &monitor_type, period).await };
                (key, task)
            })
            .collect();

        let mut reports = Vec::new();
        let mut omissions = Vec::new();
        for (id, outcome) in run_batch(tasks, &self.config.batch, self.cancel.clone()).await {
            match outcome {
                TaskOutcome::Done(Some(report)) => reports.push(report),
                TaskOutcome::Done(None) => {
                    debug!(monitor_id = %id, "peer has no usable values");
                    omissions.push(Omission::new(id, "no usable values"));
                }
                other => {
                    warn!(monitor_id = %id, reason = %other.reason(), "peer omitted");
                    omissions.push(Omission::new(id, other.reason()));
                }
            }
        }

        Ok(QuartileReportSet {
            reports: quartile::with_away(reports),
            omissions,
        })
    }

    async fn peer_quartile(
        &self,
        monitor_id: &MonitorId,
        monitor_type: &MonitorType,
        period: Period,
    ) -> Result<Option<QuartileReport>, ReportError> {
        let monitor = self.monitor(monitor_id).await?;
        if !monitor.reports(monitor_type) {
            return Ok(None);
        }

        let readings = self
            .readings_with_history(monitor_id, monitor_type, period)
            .await?;
        let completeness = rate::completeness(monitor_id, &readings, period, self.interval_secs());
        let slots = self.classifier.classify_slots(
            &monitor,
            monitor_type,
            &readings,
            period.slots(self.interval_secs()),
            completeness,
        )?;

        let values: Vec<f64> = slots
            .iter()
            .filter(|slot| slot.status.is_usable())
            .filter_map(|slot| slot.reading.as_ref().map(|r| r.value))
            .collect();
        if values.len() < quartile::MIN_SAMPLES {
            debug!(monitor_id = %monitor_id, n = values.len(), "undersized quartile sample");
        }

        Ok(quartile::analyze(monitor.desc.to_string(), &values))
    }

    #[tracing::instrument(skip(self))]
    pub async fn compute_effective_rate(
        &self,
        monitor_id: &MonitorId,
        monitor_type: &MonitorType,
        period: Period,
    ) -> Result<EffectiveRate, ReportError> {
        let monitor = self.monitor(monitor_id).await?;
        Self::require_type(&monitor, monitor_type)?;

        let readings = self
            .source
            .fetch_readings(monitor_id, monitor_type, period)
            .await
            .map_err(ReportError::from_source)?;

        rate::effective_rate(monitor_id, &readings, period, self.interval_secs())
    }

    /// Status of `monitor` over `period`: every monitor-type is classified at
    /// the final slot and the most severe status wins.
    pub async fn monitor_outcome(
        &self,
        monitor: &Monitor,
        period: Period,
    ) -> Result<Status, ReportError> {
        let last = period
            .last_slot(self.interval_secs())
            .ok_or_else(|| ReportError::degenerate_monitor(&monitor.id))?;

        let mut statuses = Vec::with_capacity(monitor.monitor_types.len());
        for monitor_type in monitor.monitor_types.iter() {
            let readings = self
                .readings_with_history(&monitor.id, monitor_type, period)
                .await?;
            let completeness =
                rate::completeness(&monitor.id, &readings, period, self.interval_secs());
            let slots = self.classifier.classify_slots(
                monitor,
                monitor_type,
                &readings,
                [last],
                completeness,
            )?;
            statuses.extend(slots.iter().map(|s| s.status));
        }

        Ok(most_severe(statuses).unwrap_or(Status::Disconnect))
    }

    #[tracing::instrument(skip(self))]
    pub async fn generate_group_summary(
        &self,
        group_id: &GroupId,
        period: Period,
    ) -> Result<GroupSummaryReport, ReportError> {
        let group = self
            .source
            .fetch_group(group_id)
            .await
            .map_err(ReportError::from_source)?
            .ok_or_else(|| ReportError::MissingMetadata(format!("group {group_id}")))?;
        if period.last_slot(self.interval_secs()).is_none() {
            return Err(ReportError::degenerate(format!("group {group_id}")));
        }

        let monitors: HashMap<MonitorId, Monitor> = self
            .source
            .fetch_monitors()
            .await
            .map_err(ReportError::from_source)?
            .into_iter()
            .map(|m| (m.id.clone(), m))
            .collect();

        let mut scheduled = HashSet::new();
        let tasks = group
            .member
            .iter()
            .filter(|id| scheduled.insert(*id))
            .filter_map(|id| monitors.get(id))
            .map(|monitor| {
                let service = self.clone();
                let monitor = monitor.clone();
                let id = monitor.id.clone();
                let task = async move { service.monitor_outcome(&monitor, period).await };
                (id, task)
            })
            .collect();

        let mut outcomes = HashMap::new();
        let mut omissions = Vec::new();
        for (id, outcome) in run_batch(tasks, &self.config.batch, self.cancel.clone()).await {
            match outcome {
                TaskOutcome::Done(status) => {
                    outcomes.insert(id, status);
                }
                other => {
                    warn!(monitor_id = %id, reason = %other.reason(), "group member omitted");
                    omissions.push(Omission::new(id, other.reason()));
                }
            }
        }

        let report = group::summarize(&group.name, &group.member, &monitors, &outcomes, omissions);
        info!(
            group = %group.name,
            total = report.summary.total_count.total(),
            omitted = report.omissions.len(),
            "group summary generated"
        );
        Ok(report)
    }

    /// Latest valid reading of `monitor_type` in `period`.
    async fn latest_value(
        &self,
        monitor: &Monitor,
        monitor_type: &MonitorType,
        period: Period,
    ) -> Result<Option<f64>, ReportError> {
        if !monitor.reports(monitor_type) {
            return Ok(None);
        }
        let readings = self
            .source
            .fetch_readings(&monitor.id, monitor_type, period)
            .await
            .map_err(ReportError::from_source)?;
        Ok(readings.iter().rev().find(|r| r.valid).map(|r| r.value))
    }

    /// Monitors matching `filter`, ordered by id.
    ///
    /// Status and PM2.5 filters are evaluated over the filter's period after
    /// the metadata filters have narrowed the list.
    #[tracing::instrument(skip(self))]
    pub async fn list_monitors(
        &self,
        filter: &MonitorFilter,
    ) -> Result<Vec<Monitor>, ReportError> {
        let monitors = self
            .source
            .fetch_monitors()
            .await
            .map_err(ReportError::from_source)?;
        let monitors = filter.apply(monitors)?;
        let Some(period) = filter.period.filter(|_| filter.needs_readings()) else {
            return Ok(monitors);
        };

        let pm25 = MonitorType::from(PM25);
        let mut selected = Vec::with_capacity(monitors.len());
        for monitor in monitors {
            let outcome = match filter.status {
                Some(_) => Some(self.monitor_outcome(&monitor, period).await?),
                None => None,
            };
            let latest = match filter.pm25 {
                Some(_) => self.latest_value(&monitor, &pm25, period).await?,
                None => None,
            };
            if filter.matches_readings(outcome, latest) {
                selected.push(monitor);
            }
        }
        debug!(selected = selected.len(), "reading filters applied");
        Ok(selected)
    }
}

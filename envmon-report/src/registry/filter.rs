use envmon_core::catalog::{self, Pm25Level, SensorType};
use envmon_core::{Monitor, MonitorId, MonitorType, Period, Status};

use crate::error::ReportError;

#[derive(Debug, Default, Clone)]
pub struct MonitorFilter {
    pub ids: Option<Vec<MonitorId>>,
    pub county: Option<String>,
    pub district: Option<String>,
    pub sensor_type: Option<SensorType>,
    pub monitor_type: Option<MonitorType>,
    pub tag: Option<String>,
    pub enabled_only: bool,
    /// Outcome over `period`, see `ReportService::monitor_outcome`.
    pub status: Option<Status>,
    /// Level of the latest valid PM2.5 reading in `period`.
    pub pm25: Option<Pm25Level>,
    pub period: Option<Period>,
}

impl MonitorFilter {
    pub fn builder() -> MonitorFilterBuilder {
        MonitorFilterBuilder::new()
    }

    /// Whether matching needs readings on top of metadata.
    pub fn needs_readings(&self) -> bool {
        self.status.is_some() || self.pm25.is_some()
    }

    /// Rejects a district that does not belong to the selected county, and
    /// reading filters without a period.
    pub fn validate(&self) -> Result<(), ReportError> {
        if self.needs_readings() && self.period.is_none() {
            return Err(ReportError::InvalidInput(
                "status and PM2.5 filters need a period".into(),
            ));
        }

        match (&self.county, &self.district) {
            (Some(county), Some(district))
                if catalog::district_name(county, district).is_none() =>
            {
                Err(ReportError::InvalidInput(format!(
                    "district {district} is not part of {county}"
                )))
            }
            (None, Some(district)) => Err(ReportError::InvalidInput(format!(
                "district {district} given without a county"
            ))),
            _ => Ok(()),
        }
    }

    pub fn matches(&self, monitor: &Monitor) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(&monitor.id) {
                return false;
            }
        }

        if let Some(county) = &self.county {
            if monitor.county.as_deref() != Some(county.as_str()) {
                return false;
            }
        }

        if let Some(district) = &self.district {
            if monitor.district.as_deref() != Some(district.as_str()) {
                return false;
            }
        }

        if let Some(sensor_type) = self.sensor_type {
            let code = monitor
                .sensor_detail
                .as_ref()
                .map(|detail| &*detail.sensor_type);
            if code != Some(sensor_type.code()) {
                return false;
            }
        }

        if let Some(monitor_type) = &self.monitor_type {
            if !monitor.reports(monitor_type) {
                return false;
            }
        }

        if let Some(tag) = &self.tag {
            if !monitor.tags.iter().any(|t| &**t == tag.as_str()) {
                return false;
            }
        }

        !self.enabled_only || monitor.is_enabled()
    }

    /// Reading-based half of the filter. `latest_pm25` is `None` for a
    /// monitor without a valid PM2.5 reading, which no level matches.
    pub fn matches_readings(&self, outcome: Option<Status>, latest_pm25: Option<f64>) -> bool {
        if let Some(status) = self.status {
            if outcome != Some(status) {
                return false;
            }
        }

        match self.pm25 {
            Some(level) => latest_pm25.is_some_and(|v| level.matches(v)),
            None => true,
        }
    }

    /// Applies the metadata half of the filter.
    pub fn apply(&self, monitors: Vec<Monitor>) -> Result<Vec<Monitor>, ReportError> {
        self.validate()?;
        Ok(monitors.into_iter().filter(|m| self.matches(m)).collect())
    }
}

#[derive(Default)]
pub struct MonitorFilterBuilder {
    filter: MonitorFilter,
}

impl MonitorFilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids<I>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = MonitorId>,
    {
        self.filter.ids = Some(ids.into_iter().collect());
        self
    }

    pub fn county<S>(mut self, county: S) -> Self
    where
        S: Into<String>,
    {
        self.filter.county = Some(county.into());
        self
    }

    pub fn district<S>(mut self, district: S) -> Self
    where
        S: Into<String>,
    {
        self.filter.district = Some(district.into());
        self
    }

    pub fn sensor_type(mut self, sensor_type: SensorType) -> Self {
        self.filter.sensor_type = Some(sensor_type);
        self
    }

    pub fn monitor_type(mut self, monitor_type: MonitorType) -> Self {
        self.filter.monitor_type = Some(monitor_type);
        self
    }

    pub fn tag<S>(mut self, tag: S) -> Self
    where
        S: Into<String>,
    {
        self.filter.tag = Some(tag.into());
        self
    }

    pub fn enabled_only(mut self) -> Self {
        self.filter.enabled_only = true;
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.filter.status = Some(status);
        self
    }

    pub fn pm25(mut self, level: Pm25Level) -> Self {
        self.filter.pm25 = Some(level);
        self
    }

    pub fn period(mut self, period: Period) -> Self {
        self.filter.period = Some(period);
        self
    }

    pub fn build(self) -> MonitorFilter {
        self.filter
    }
}

pub mod catalog;
mod period;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use period::Period;

// We use `Box<str>` and `Box<[T]>` for metadata that is never resized after
// it is loaded. This keeps allocations compact and avoids accidental cloning
// of large values.
type BoxStr = Box<str>;
type BoxList<T> = Box<[T]>;

/// Identity of a monitoring station.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonitorId(pub BoxStr);

/// A measured quantity code, e.g. `PM25`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonitorType(pub BoxStr);

/// Identity of a monitor group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub BoxStr);

macro_rules! str_id {
    ($name:ident) => {
        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.into())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value.into_boxed_str())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

str_id!(MonitorId);
str_id!(MonitorType);
str_id!(GroupId);

/// A monitoring station and the metadata the reports join against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Monitor {
    #[serde(rename = "_id")]
    pub id: MonitorId,
    pub desc: BoxStr,
    /// Monitor-type codes this station reports.
    pub monitor_types: BoxList<MonitorType>,
    #[serde(default)]
    pub tags: BoxList<BoxStr>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub short_code: Option<BoxStr>,
    #[serde(default)]
    pub code: Option<BoxStr>,
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Full county name, e.g. `基隆市`.
    #[serde(default)]
    pub county: Option<BoxStr>,
    /// District code within the county, see [`catalog::districts`].
    #[serde(default)]
    pub district: Option<BoxStr>,
    #[serde(default)]
    pub sensor_detail: Option<SensorDetail>,
}

impl Monitor {
    pub fn reports(&self, monitor_type: &MonitorType) -> bool {
        self.monitor_types.contains(monitor_type)
    }

    /// Monitors without an explicit flag are treated as enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

/// Geographic position, serialised as `[lon, lat]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Location {
    pub lon: f64,
    pub lat: f64,
}

impl From<[f64; 2]> for Location {
    fn from([lon, lat]: [f64; 2]) -> Self {
        Self { lon, lat }
    }
}

impl From<Location> for [f64; 2] {
    fn from(location: Location) -> Self {
        [location.lon, location.lat]
    }
}

/// Installation details of a micro-sensor station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorDetail {
    /// Sensor-type code, see [`catalog::SensorType`].
    pub sensor_type: BoxStr,
    pub road_name: BoxStr,
    pub location_desc: BoxStr,
    pub authority: BoxStr,
    pub epa_code: BoxStr,
    pub target: BoxStr,
    pub target_detail: BoxStr,
    pub height: f64,
    #[serde(default)]
    pub distance: BoxList<f64>,
}

/// A named set of monitors. Membership is joined against monitor metadata
/// at aggregation time; monitors hold no back-reference to their groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorGroup {
    #[serde(rename = "_id")]
    pub id: GroupId,
    pub name: BoxStr,
    pub member: Vec<MonitorId>,
}

/// State of the power channel reported alongside a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PowerSignal {
    Ok,
    Fault,
    /// No power telemetry was delivered with the reading.
    #[default]
    Absent,
}

/// A single time-stamped measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub monitor_id: MonitorId,
    pub monitor_type: MonitorType,
    pub timestamp: jiff::Timestamp,
    pub value: f64,
    /// Whether the source flagged the value as valid.
    #[serde(default = "default_valid")]
    pub valid: bool,
    #[serde(default)]
    pub power: PowerSignal,
}

fn default_valid() -> bool {
    true
}

/// Operational status assigned to a reading or to a monitor over a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    Normal,
    Disconnect,
    LessThanExpected,
    Constant,
    PowerError,
    NoPowerInfo,
}

impl Status {
    /// Whether a value with this status takes part in numeric aggregation.
    pub fn is_usable(self) -> bool {
        matches!(self, Status::Normal | Status::LessThanExpected)
    }

    /// Style class rendered for a cell carrying this status.
    pub fn css_class(self) -> &'static str {
        match self {
            Status::Normal => "normal",
            Status::Disconnect => "disconnect",
            Status::LessThanExpected => "lessThanExpected",
            Status::Constant => "constant",
            Status::PowerError => "powerError",
            Status::NoPowerInfo => "noPowerInfo",
        }
    }

    /// Parses the error-filter codes used by the monitor list views.
    pub fn from_filter_code(code: &str) -> Option<Self> {
        catalog::ERROR_FILTERS
            .iter()
            .find(|(c, _, _)| *c == code)
            .map(|(_, _, status)| *status)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.css_class())
    }
}

/// Class tag for a slot that received no reading.
pub const MISSING_CLASS: &str = "missing";

/// One rendered grid cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellData {
    /// Display value; empty for missing slots and empty stat cells.
    pub v: String,
    pub cell_class_set: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

impl CellData {
    /// A cell for a present reading. The class set is derived from the status.
    pub fn with_status(v: String, status: Status) -> Self {
        Self {
            v,
            cell_class_set: vec![status.css_class().to_owned()],
            status: Some(status),
        }
    }

    /// A slot that received nothing. Rendered distinctly from `Normal`.
    pub fn missing() -> Self {
        Self {
            v: String::new(),
            cell_class_set: vec![MISSING_CLASS.to_owned()],
            status: None,
        }
    }

    /// A summary cell, which carries no status.
    pub fn plain(v: String) -> Self {
        Self {
            v,
            cell_class_set: Vec::new(),
            status: None,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.status.is_none() && self.v.is_empty()
    }
}

/// One grid row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowData {
    pub date: jiff::Timestamp,
    pub cell_data: Vec<CellData>,
}

/// One summary row aligned to the grid columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatRow {
    pub name: String,
    pub cell_data: Vec<CellData>,
}

/// A rendered grid with its summary rows.
///
/// Every row and stat row carries exactly `column_names.len()` cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub column_names: Vec<String>,
    pub rows: Vec<RowData>,
    pub stat_rows: Vec<StatRow>,
}

impl Report {
    pub fn is_consistent(&self) -> bool {
        let width = self.column_names.len();
        self.rows.iter().all(|row| row.cell_data.len() == width)
            && self.stat_rows.iter().all(|row| row.cell_data.len() == width)
    }
}

/// Hourly rows for a single day.
pub type DailyReport = Report;

/// Rows are dates, columns are hours 0-23.
pub type MonthlyHourReport = Report;

/// Five-number summary. `min <= q1 <= q2 <= q3 <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quartile {
    pub min: f64,
    pub q1: f64,
    pub q2: f64,
    pub q3: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuartileReport {
    pub name: String,
    pub quartile: Quartile,
    /// Values fenced out by the 1.5×IQR rule.
    pub outlier: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub away: Option<bool>,
}

/// Counts split by county bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CountByCounty {
    pub kl: u32,
    pub pt: u32,
    pub yl: u32,
    pub rest: u32,
}

impl CountByCounty {
    pub fn add(&mut self, bucket: catalog::CountyBucket) {
        match bucket {
            catalog::CountyBucket::Kl => self.kl += 1,
            catalog::CountyBucket::Pt => self.pt += 1,
            catalog::CountyBucket::Yl => self.yl += 1,
            catalog::CountyBucket::Rest => self.rest += 1,
        }
    }

    pub fn get(&self, bucket: catalog::CountyBucket) -> u32 {
        match bucket {
            catalog::CountyBucket::Kl => self.kl,
            catalog::CountyBucket::Pt => self.pt,
            catalog::CountyBucket::Yl => self.yl,
            catalog::CountyBucket::Rest => self.rest,
        }
    }

    pub fn total(&self) -> u32 {
        self.kl + self.pt + self.yl + self.rest
    }
}

/// Per-category monitor counts for one group over one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub name: String,
    pub total_count: CountByCounty,
    /// Monitors whose outcome is `Normal`.
    pub count: CountByCounty,
    pub less_than_expected: CountByCounty,
    pub constant: CountByCounty,
    pub disconnected: CountByCounty,
    pub power_error: CountByCounty,
}

/// Data completeness of one monitor-type over a period, in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveRate {
    pub monitor_id: MonitorId,
    pub rate: f64,
}

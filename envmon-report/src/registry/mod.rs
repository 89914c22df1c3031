pub mod filter;
pub mod memory;

use async_trait::async_trait;
use envmon_core::{GroupId, Monitor, MonitorGroup, MonitorId, MonitorType, Period, Reading};

/// Read-only view of the external data source the reports are computed from.
///
/// Every query operation works on whatever the source returns at call time;
/// the source is expected to hand out an immutable snapshot per call.
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    /// Error type specific to this source implementation
    type Error: std::error::Error + Send + Sync + 'static;

    /// Readings of one monitor-type with `period.start <= ts < period.end`,
    /// ordered by timestamp ascending.
    async fn fetch_readings(
        &self,
        monitor_id: &MonitorId,
        monitor_type: &MonitorType,
        period: Period,
    ) -> Result<Vec<Reading>, Self::Error>;

    async fn fetch_monitor(&self, id: &MonitorId) -> Result<Option<Monitor>, Self::Error>;

    async fn fetch_monitors(&self) -> Result<Vec<Monitor>, Self::Error>;

    async fn fetch_group(&self, id: &GroupId) -> Result<Option<MonitorGroup>, Self::Error>;

    /// Span from the first reading to just past the last one, or `None` when
    /// the series holds no readings.
    async fn coverage(
        &self,
        monitor_id: &MonitorId,
        monitor_type: &MonitorType,
    ) -> Result<Option<Period>, Self::Error>;
}

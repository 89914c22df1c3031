use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use envmon_core::{GroupId, Monitor, MonitorGroup, MonitorId, MonitorType, Period, Reading};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::DataSource;

#[derive(Debug, thiserror::Error)]
pub enum InMemoryError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("time arithmetic error: {0}")]
    Time(#[from] jiff::Error),
}

/// Serialised form of everything the registry holds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub monitors: Vec<Monitor>,
    #[serde(default)]
    pub groups: Vec<MonitorGroup>,
    #[serde(default)]
    pub readings: Vec<Reading>,
}

type SeriesKey = (MonitorId, MonitorType);

#[derive(Default)]
struct Inner {
    monitors: HashMap<MonitorId, Monitor>,
    groups: HashMap<GroupId, MonitorGroup>,
    // Each series is kept sorted by timestamp.
    readings: HashMap<SeriesKey, Vec<Reading>>,
}

/// In-memory data source, used by the CLI snapshot mode and by tests.
#[derive(Clone, Default)]
pub struct InMemoryRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn from_snapshot(snapshot: Snapshot) -> Self {
        let registry = Self::new();
        registry.batch_register_monitors(snapshot.monitors).await;
        for group in snapshot.groups {
            registry.register_group(group).await;
        }
        registry.store_readings(snapshot.readings).await;
        registry
    }

    pub async fn load_snapshot(path: impl AsRef<Path>) -> Result<Self, InMemoryError> {
        let content = tokio::fs::read_to_string(path).await?;
        let snapshot: Snapshot = serde_json::from_str(&content)?;
        Ok(Self::from_snapshot(snapshot).await)
    }

    pub async fn batch_register_monitors(&self, monitors: Vec<Monitor>) {
        let mut inner = self.inner.write().await;
        for monitor in monitors {
            inner.monitors.insert(monitor.id.clone(), monitor);
        }
    }

    pub async fn register_group(&self, group: MonitorGroup) {
        let mut inner = self.inner.write().await;
        inner.groups.insert(group.id.clone(), group);
    }

    pub async fn store_readings(&self, readings: Vec<Reading>) {
        let mut inner = self.inner.write().await;
        for reading in readings {
            let key = (reading.monitor_id.clone(), reading.monitor_type.clone());
            inner.readings.entry(key).or_default().push(reading);
        }
        for series in inner.readings.values_mut() {
            series.sort_by_key(|r| r.timestamp);
        }
    }
}

#[async_trait]
impl DataSource for InMemoryRegistry {
    type Error = InMemoryError;

    async fn fetch_readings(
        &self,
        monitor_id: &MonitorId,
        monitor_type: &MonitorType,
        period: Period,
    ) -> Result<Vec<Reading>, Self::Error> {
        let inner = self.inner.read().await;
        let key = (monitor_id.clone(), monitor_type.clone());

        Ok(inner
            .readings
            .get(&key)
            .map(|series| {
                series
                    .iter()
                    .filter(|r| period.contains(r.timestamp))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_monitor(&self, id: &MonitorId) -> Result<Option<Monitor>, Self::Error> {
        Ok(self.inner.read().await.monitors.get(id).cloned())
    }

    async fn fetch_monitors(&self) -> Result<Vec<Monitor>, Self::Error> {
        let inner = self.inner.read().await;
        let mut monitors: Vec<Monitor> = inner.monitors.values().cloned().collect();
        monitors.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(monitors)
    }

    async fn fetch_group(&self, id: &GroupId) -> Result<Option<MonitorGroup>, Self::Error> {
        Ok(self.inner.read().await.groups.get(id).cloned())
    }

    async fn coverage(
        &self,
        monitor_id: &MonitorId,
        monitor_type: &MonitorType,
    ) -> Result<Option<Period>, Self::Error> {
        let inner = self.inner.read().await;
        let key = (monitor_id.clone(), monitor_type.clone());

        let Some(series) = inner.readings.get(&key) else {
            return Ok(None);
        };
        let (Some(first), Some(last)) = (series.first(), series.last()) else {
            return Ok(None);
        };

        let end = last
            .timestamp
            .checked_add(jiff::SignedDuration::from_secs(1))?;
        Ok(Some(Period::new(first.timestamp, end)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envmon_core::PowerSignal;
    use jiff::Timestamp;
    use std::io::Write;

    fn reading(ts: &str, value: f64) -> Reading {
        Reading {
            monitor_id: "m1".into(),
            monitor_type: "PM25".into(),
            timestamp: ts.parse().unwrap(),
            value,
            valid: true,
            power: PowerSignal::Ok,
        }
    }

    #[tokio::test]
    async fn test_readings_come_back_sorted_and_bounded() {
        let registry = InMemoryRegistry::new();
        registry
            .store_readings(vec![
                reading("2024-05-01T02:00:00Z", 3.0),
                reading("2024-05-01T00:00:00Z", 1.0),
                reading("2024-05-01T01:00:00Z", 2.0),
            ])
            .await;

        let start: Timestamp = "2024-05-01T00:00:00Z".parse().unwrap();
        let end: Timestamp = "2024-05-01T02:00:00Z".parse().unwrap();
        let fetched = registry
            .fetch_readings(&"m1".into(), &"PM25".into(), Period::new(start, end))
            .await
            .unwrap();

        let values: Vec<f64> = fetched.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![1.0, 2.0]);
    }

    #[tokio::test]
    async fn test_coverage_spans_first_to_last() {
        let registry = InMemoryRegistry::new();
        assert!(
            registry
                .coverage(&"m1".into(), &"PM25".into())
                .await
                .unwrap()
                .is_none()
        );

        registry
            .store_readings(vec![
                reading("2024-05-01T00:00:00Z", 1.0),
                reading("2024-05-03T00:00:00Z", 1.0),
            ])
            .await;

        let coverage = registry
            .coverage(&"m1".into(), &"PM25".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(coverage.start.to_string(), "2024-05-01T00:00:00Z");
        assert_eq!(coverage.end.to_string(), "2024-05-03T00:00:01Z");
    }

    #[tokio::test]
    async fn test_load_snapshot_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "monitors": [{{ "_id": "m1", "desc": "Station 1", "monitorTypes": ["PM25"] }}],
                "groups": [{{ "_id": "g1", "name": "North", "member": ["m1"] }}],
                "readings": [{{
                    "monitorId": "m1",
                    "monitorType": "PM25",
                    "timestamp": "2024-05-01T00:00:00Z",
                    "value": 7.5,
                    "power": "ok"
                }}]
            }}"#
        )
        .unwrap();

        let registry = InMemoryRegistry::load_snapshot(file.path()).await.unwrap();
        assert_eq!(registry.fetch_monitors().await.unwrap().len(), 1);
        let group = registry.fetch_group(&"g1".into()).await.unwrap().unwrap();
        assert_eq!(group.member, vec![MonitorId::from("m1")]);
        assert!(registry.coverage(&"m1".into(), &"PM25".into()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_broken_snapshot_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let result = InMemoryRegistry::load_snapshot(file.path()).await;
        assert!(matches!(result, Err(InMemoryError::Parse(_))));
    }
}

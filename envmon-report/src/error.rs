use envmon_core::{EffectiveRate, MonitorId, Period};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ReportError {
    /// Malformed reading or a monitor-type the monitor does not report.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The requested period lies outside the available reading coverage.
    #[error("requested period {}..{} is outside the available coverage", .requested.start, .requested.end)]
    InvalidRange { requested: Period },

    /// A monitor or group reference has no matching metadata.
    #[error("missing metadata for {0}")]
    MissingMetadata(String),

    /// The period yields no expected samples at the nominal interval.
    /// `subject` names the monitor, group or peer set being computed.
    #[error("degenerate period for {subject}: no samples expected")]
    DegenerateInput {
        subject: String,
        monitor_id: Option<MonitorId>,
    },

    #[error("data source error: {0}")]
    Source(String),

    #[error("time arithmetic error: {0}")]
    Time(#[from] jiff::Error),
}

impl ReportError {
    pub fn degenerate_monitor(monitor_id: &MonitorId) -> Self {
        ReportError::DegenerateInput {
            subject: format!("monitor {monitor_id}"),
            monitor_id: Some(monitor_id.clone()),
        }
    }

    pub fn degenerate(subject: impl Into<String>) -> Self {
        ReportError::DegenerateInput {
            subject: subject.into(),
            monitor_id: None,
        }
    }

    pub fn from_source<E: std::error::Error>(err: E) -> Self {
        ReportError::Source(err.to_string())
    }

    /// The rate reported alongside a per-monitor `DegenerateInput` signal.
    pub fn fallback_rate(&self) -> Option<EffectiveRate> {
        match self {
            ReportError::DegenerateInput {
                monitor_id: Some(monitor_id),
                ..
            } => Some(EffectiveRate {
                monitor_id: monitor_id.clone(),
                rate: 0.0,
            }),
            _ => None,
        }
    }
}

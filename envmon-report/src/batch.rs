use std::future::Future;
use std::sync::Arc;

use envmon_core::MonitorId;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::BatchConfig;
use crate::error::ReportError;

/// How a single batch task ended.
#[derive(Debug)]
pub enum TaskOutcome<T> {
    Done(T),
    Failed(ReportError),
    TimedOut,
    Cancelled,
    Panicked,
}

impl<T> TaskOutcome<T> {
    /// Short reason recorded when the task's subject is omitted.
    pub fn reason(&self) -> String {
        match self {
            TaskOutcome::Done(_) => "completed".into(),
            TaskOutcome::Failed(err) => err.to_string(),
            TaskOutcome::TimedOut => "task timed out".into(),
            TaskOutcome::Cancelled => "task cancelled".into(),
            TaskOutcome::Panicked => "task panicked".into(),
        }
    }
}

/// A monitor that did not contribute to a batch result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Omission {
    pub monitor_id: MonitorId,
    pub reason: String,
}

impl Omission {
    pub fn new(monitor_id: MonitorId, reason: impl Into<String>) -> Self {
        Self {
            monitor_id,
            reason: reason.into(),
        }
    }
}

/// Runs independent report tasks with bounded concurrency.
///
/// Each task is subject to the configured deadline and to `cancel`. A task
/// that fails, times out or is cancelled only affects its own entry. The
/// result is keyed and returned in input order.
pub async fn run_batch<K, T, F>(
    tasks: Vec<(K, F)>,
    config: &BatchConfig,
    cancel: CancellationToken,
) -> Vec<(K, TaskOutcome<T>)>
where
    F: Future<Output = Result<T, ReportError>> + Send + 'static,
    T: Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let deadline = config.task_timeout();
    let mut keys = Vec::with_capacity(tasks.len());
    let mut set = JoinSet::new();

    for (index, (key, task)) in tasks.into_iter().enumerate() {
        keys.push(key);
        let semaphore = semaphore.clone();
        let cancel = cancel.clone();

        set.spawn(async move {
            let run = async {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return TaskOutcome::Cancelled;
                };
                match tokio::time::timeout(deadline, task).await {
                    Ok(Ok(value)) => TaskOutcome::Done(value),
                    Ok(Err(err)) => TaskOutcome::Failed(err),
                    Err(_) => TaskOutcome::TimedOut,
                }
            };

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => TaskOutcome::Cancelled,
                outcome = run => outcome,
            };
            (index, outcome)
        });
    }

    let mut outcomes: Vec<Option<TaskOutcome<T>>> = (0..keys.len()).map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, outcome)) => outcomes[index] = Some(outcome),
            Err(err) => tracing::error!(error = %err, "report task aborted"),
        }
    }

    keys.into_iter()
        .zip(outcomes)
        .map(|(key, outcome)| (key, outcome.unwrap_or(TaskOutcome::Panicked)))
        .collect()
}

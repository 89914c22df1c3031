use std::collections::{HashMap, HashSet};

use envmon_core::catalog::CountyBucket;
use envmon_core::{CountByCounty, GroupSummary, Monitor, MonitorId, Status};
use serde::Serialize;

use crate::batch::Omission;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummaryReport {
    #[serde(flatten)]
    pub summary: GroupSummary,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub omissions: Vec<Omission>,
}

/// Counts each member once in `total_count` and once in the category of its
/// outcome, bucketed by county.
///
/// Members without metadata or without an outcome are omitted and listed,
/// as are repeated member ids. `NoPowerInfo` outcomes count only towards the
/// total, since the summary has no category for them.
pub fn summarize(
    name: &str,
    members: &[MonitorId],
    monitors: &HashMap<MonitorId, Monitor>,
    outcomes: &HashMap<MonitorId, Status>,
    mut omissions: Vec<Omission>,
) -> GroupSummaryReport {
    let mut summary = GroupSummary {
        name: name.to_owned(),
        total_count: CountByCounty::default(),
        count: CountByCounty::default(),
        less_than_expected: CountByCounty::default(),
        constant: CountByCounty::default(),
        disconnected: CountByCounty::default(),
        power_error: CountByCounty::default(),
    };

    let already_omitted: HashSet<MonitorId> =
        omissions.iter().map(|o| o.monitor_id.clone()).collect();
    let mut seen = HashSet::new();

    for id in members {
        if !seen.insert(id) {
            omissions.push(Omission::new(id.clone(), "duplicate group member"));
            continue;
        }
        if already_omitted.contains(id) {
            continue;
        }

        let Some(monitor) = monitors.get(id) else {
            tracing::warn!(monitor = %id, group = name, "group member has no metadata");
            omissions.push(Omission::new(id.clone(), "missing metadata"));
            continue;
        };
        let Some(status) = outcomes.get(id) else {
            omissions.push(Omission::new(id.clone(), "no outcome for period"));
            continue;
        };

        let bucket = CountyBucket::from_county(monitor.county.as_deref());
        summary.total_count.add(bucket);
        match status {
            Status::Normal => summary.count.add(bucket),
            Status::LessThanExpected => summary.less_than_expected.add(bucket),
            Status::Constant => summary.constant.add(bucket),
            Status::Disconnect => summary.disconnected.add(bucket),
            Status::PowerError => summary.power_error.add(bucket),
            Status::NoPowerInfo => {}
        }
    }

    GroupSummaryReport {
        summary,
        omissions,
    }
}

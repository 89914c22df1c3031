//! Declarative column tables for tabular export of monitor metadata.

use envmon_core::Monitor;
use envmon_core::catalog::{self, SensorType};

/// One exported column: a key path, a header label and the accessor that
/// renders the value.
pub struct ExportField<T> {
    pub key: &'static str,
    pub label: &'static str,
    pub format: fn(&T) -> String,
}

pub const MONITOR_FIELDS: &[ExportField<Monitor>] = &[
    ExportField {
        key: "_id",
        label: "代碼",
        format: |m| m.id.to_string(),
    },
    ExportField {
        key: "desc",
        label: "名稱",
        format: |m| m.desc.to_string(),
    },
    ExportField {
        key: "county",
        label: "縣市",
        format: |m| m.county.as_deref().unwrap_or_default().to_owned(),
    },
    ExportField {
        key: "district",
        label: "鄉鎮",
        format: district,
    },
    ExportField {
        key: "sensorDetail.sensorType",
        label: "感測器類別",
        format: sensor_type,
    },
    ExportField {
        key: "sensorDetail.roadName",
        label: "道路名稱",
        format: |m| detail(m, |d| d.road_name.to_string()),
    },
    ExportField {
        key: "sensorDetail.locationDesc",
        label: "位置描述",
        format: |m| detail(m, |d| d.location_desc.to_string()),
    },
    ExportField {
        key: "sensorDetail.authority",
        label: "權責單位",
        format: |m| detail(m, |d| d.authority.to_string()),
    },
    ExportField {
        key: "location",
        label: "經緯度",
        format: |m| {
            m.location
                .map(|l| format!("{},{}", l.lon, l.lat))
                .unwrap_or_default()
        },
    },
    ExportField {
        key: "enabled",
        label: "啟用",
        format: |m| m.is_enabled().to_string(),
    },
];

fn detail(monitor: &Monitor, f: fn(&envmon_core::SensorDetail) -> String) -> String {
    monitor.sensor_detail.as_ref().map(f).unwrap_or_default()
}

fn district(monitor: &Monitor) -> String {
    match (&monitor.county, &monitor.district) {
        (Some(county), Some(code)) => catalog::district_name(county, code)
            .map(str::to_owned)
            .unwrap_or_else(|| code.to_string()),
        (_, Some(code)) => code.to_string(),
        _ => String::new(),
    }
}

fn sensor_type(monitor: &Monitor) -> String {
    detail(monitor, |d| {
        SensorType::from_code(&d.sensor_type)
            .map(|t| t.label().to_owned())
            .unwrap_or_else(|| d.sensor_type.to_string())
    })
}

fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_owned()
    }
}

/// Header line of labels followed by one line per row.
pub fn to_csv<T>(rows: &[T], fields: &[ExportField<T>]) -> String {
    let mut out = String::new();
    let header: Vec<String> = fields.iter().map(|f| quote(f.label)).collect();
    out.push_str(&header.join(","));
    out.push('\n');

    for row in rows {
        let line: Vec<String> = fields.iter().map(|f| quote(&(f.format)(row))).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

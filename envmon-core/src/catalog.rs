//! Static lookup tables shared by the monitor views and the reports.

use serde::{Deserialize, Serialize};

use crate::Status;

pub const KEELUNG: &str = "基隆市";
pub const PINGTUNG: &str = "屏東縣";
pub const YILAN: &str = "宜蘭縣";

/// Four-way county partition used by group summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountyBucket {
    Kl,
    Pt,
    Yl,
    Rest,
}

impl CountyBucket {
    pub const ALL: [CountyBucket; 4] = [
        CountyBucket::Kl,
        CountyBucket::Pt,
        CountyBucket::Yl,
        CountyBucket::Rest,
    ];

    /// Maps a county name to its bucket. Unknown and unset counties go to `Rest`.
    pub fn from_county(county: Option<&str>) -> Self {
        let Some(county) = county.map(str::trim) else {
            return CountyBucket::Rest;
        };

        let english = county
            .trim_end_matches(" City")
            .trim_end_matches(" County")
            .to_ascii_lowercase();

        match (county, english.as_str()) {
            (KEELUNG, _) | (_, "keelung") => CountyBucket::Kl,
            (PINGTUNG, _) | (_, "pingtung") => CountyBucket::Pt,
            (YILAN, _) | (_, "yilan") => CountyBucket::Yl,
            _ => CountyBucket::Rest,
        }
    }
}

const KEELUNG_DISTRICTS: &[(&str, &str)] = &[
    ("AL", "安樂區"),
    ("QD", "七堵區"),
    ("RA", "仁愛區"),
    ("ZZ", "中正區"),
    ("NN", "暖暖區"),
    ("ZS", "中山區"),
    ("XY", "信義區"),
];

const PINGTUNG_DISTRICTS: &[(&str, &str)] = &[
    ("PT", "屏東市"),
    ("HC", "恆春鎮"),
    ("LQ", "琉球鄉"),
    ("NP", "內埔鄉"),
    ("LL", "麟洛鄉"),
    ("CC", "車城鄉"),
    ("JR", "九如鄉"),
    ("SD", "三地門鄉"),
    ("LG", "里港鄉"),
    ("WT", "霧台鄉"),
    ("YP", "鹽埔鄉"),
    ("JD", "佳冬鄉"),
    ("JT", "竹田鄉"),
    ("CJ", "長治鄉"),
    ("DG", "東港鎮"),
    ("FS", "枋山鄉"),
    ("SY", "新園鄉"),
    ("FL", "枋寮鄉"),
    ("MJ", "瑪家鄉"),
    ("TW", "泰武鄉"),
    ("CZ", "潮州鎮"),
    ("LY", "來義鄉"),
    ("SP", "新埤鄉"),
    ("NC", "南州鄉"),
    ("WL", "萬巒鄉"),
    ("LB", "林邊鄉"),
    ("KD", "崁頂鄉"),
    ("SZ", "獅子鄉"),
    ("WD", "萬丹鄉"),
    ("GS", "高樹鄉"),
    ("MZ", "滿州鄉"),
    ("MD", "牡丹鄉"),
    ("CR", "春日鄉"),
];

const YILAN_DISTRICTS: &[(&str, &str)] = &[
    ("SA", "蘇澳鎮"),
    ("DS", "冬山鄉"),
    ("NA", "南澳鄉"),
    ("WJ", "五結鄉"),
    ("ZW", "壯圍鄉"),
    ("YL", "宜蘭市"),
    ("LD", "羅東鎮"),
    ("TC", "頭城鎮"),
    ("JS", "礁溪鄉"),
    ("YS", "員山鄉"),
    ("SS", "三星鄉"),
    ("DT", "大同鄉"),
];

/// District `(code, name)` pairs of a county. Empty for counties without a table.
pub fn districts(county: &str) -> &'static [(&'static str, &'static str)] {
    match CountyBucket::from_county(Some(county)) {
        CountyBucket::Kl => KEELUNG_DISTRICTS,
        CountyBucket::Pt => PINGTUNG_DISTRICTS,
        CountyBucket::Yl => YILAN_DISTRICTS,
        CountyBucket::Rest => &[],
    }
}

pub fn district_name(county: &str, code: &str) -> Option<&'static str> {
    districts(county)
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// Installation category of a micro-sensor station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorType {
    #[serde(rename = "ID")]
    Industrial,
    #[serde(rename = "OT")]
    OtherPollution,
    #[serde(rename = "CO")]
    Community,
    #[serde(rename = "TR")]
    Traffic,
    #[serde(rename = "MO")]
    MonitorComparison,
    #[serde(rename = "LO")]
    LongTermComparison,
    #[serde(rename = "AO")]
    Patrol,
}

impl SensorType {
    pub const ALL: [SensorType; 7] = [
        SensorType::Industrial,
        SensorType::OtherPollution,
        SensorType::Community,
        SensorType::Traffic,
        SensorType::MonitorComparison,
        SensorType::LongTermComparison,
        SensorType::Patrol,
    ];

    pub fn code(self) -> &'static str {
        match self {
            SensorType::Industrial => "ID",
            SensorType::OtherPollution => "OT",
            SensorType::Community => "CO",
            SensorType::Traffic => "TR",
            SensorType::MonitorComparison => "MO",
            SensorType::LongTermComparison => "LO",
            SensorType::Patrol => "AO",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SensorType::Industrial => "工業區",
            SensorType::OtherPollution => "其他汙染",
            SensorType::Community => "社區",
            SensorType::Traffic => "交通",
            SensorType::MonitorComparison => "監測比對",
            SensorType::LongTermComparison => "長期比對",
            SensorType::Patrol => "巡檢機",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        SensorType::ALL.into_iter().find(|t| t.code() == code)
    }
}

/// Error filters offered by the monitor views, as `(code, label, status)`.
///
/// `lt95` is the historical code of the completeness filter; its threshold is 90%.
pub const ERROR_FILTERS: &[(&str, &str, Status)] = &[
    ("disconnect", "通訊中斷", Status::Disconnect),
    ("lt95", "完整率 < 90%", Status::LessThanExpected),
    ("constant", "定值", Status::Constant),
    ("powerError", "電力異常", Status::PowerError),
    ("noPowerInfo", "無電力資訊", Status::NoPowerInfo),
];

/// Monitor-type code of fine particulate matter.
pub const PM25: &str = "PM25";

/// PM2.5 levels offered by the monitor views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Pm25Level {
    Below1,
    Above25,
    Above50,
}

/// PM2.5 filters as `(code, label, level)`.
pub const PM25_FILTERS: &[(&str, &str, Pm25Level)] = &[
    ("-1", "PM2.5 < 1", Pm25Level::Below1),
    ("25", "PM2.5 > 25", Pm25Level::Above25),
    ("50", "PM2.5 > 50", Pm25Level::Above50),
];

impl Pm25Level {
    pub fn from_code(code: &str) -> Option<Self> {
        PM25_FILTERS
            .iter()
            .find(|(c, _, _)| *c == code)
            .map(|(_, _, level)| *level)
    }

    /// Whether a PM2.5 value falls in this level. Bounds are exclusive.
    pub fn matches(self, value: f64) -> bool {
        match self {
            Pm25Level::Below1 => value < 1.0,
            Pm25Level::Above25 => value > 25.0,
            Pm25Level::Above50 => value > 50.0,
        }
    }
}

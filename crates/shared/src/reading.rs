use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MGDL_PER_MMOL: f64 = 18.0182;

pub fn mgdl_to_mmol(mgdl: i32) -> f64 {
    round_tenths(f64::from(mgdl) / MGDL_PER_MMOL)
}

pub fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// mg/dL bounds; always ordered `low <= bottom <= top <= high`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    low: f64,
    bottom: f64,
    top: f64,
    high: f64,
}

impl Thresholds {
    pub fn new(low: f64, bottom: f64, top: f64, high: f64) -> Option<Self> {
        if low <= bottom && bottom <= top && top <= high {
            Some(Self {
                low,
                bottom,
                top,
                high,
            })
        } else {
            None
        }
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn bottom(&self) -> f64 {
        self.bottom
    }

    pub fn top(&self) -> f64 {
        self.top
    }

    pub fn high(&self) -> f64 {
        self.high
    }
}

const TREND_ARROWS: [&str; 10] = ["", "⇈", "↑", "↗", "→", "↘", "↓", "⇊", "-", "⇕"];

const TREND_DIRECTIONS: [&str; 10] = [
    "NONE",
    "DoubleUp",
    "SingleUp",
    "FortyFiveUp",
    "Flat",
    "FortyFiveDown",
    "SingleDown",
    "DoubleDown",
    "NOT COMPUTABLE",
    "RATE OUT OF RANGE",
];

/// Index into the fixed arrow table. Code 0 means unknown and has no arrow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trend(u8);

impl Trend {
    pub const UNKNOWN: Trend = Trend(0);

    pub fn from_code(code: i64) -> Self {
        match u8::try_from(code) {
            Ok(code) if usize::from(code) < TREND_ARROWS.len() => Trend(code),
            _ => Trend::UNKNOWN,
        }
    }

    pub fn from_direction(direction: &str) -> Self {
        TREND_DIRECTIONS
            .iter()
            .position(|name| name.eq_ignore_ascii_case(direction))
            .map(|idx| Trend(idx as u8))
            .unwrap_or(Trend::UNKNOWN)
    }

    pub fn code(self) -> u8 {
        self.0
    }

    pub fn arrow(self) -> &'static str {
        TREND_ARROWS[usize::from(self.0)]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub mmol: f64,
    pub mgdl: i32,
}

impl Delta {
    /// Magnitude of a signed mg/dL change; the sign is returned separately.
    pub fn from_mgdl_change(change: i32) -> (Self, bool) {
        let mgdl = change.abs();
        (
            Self {
                mmol: mgdl_to_mmol(mgdl),
                mgdl,
            },
            change < 0,
        )
    }
}

/// One assembled snapshot. Only ever built from three successful fetches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub captured_at: DateTime<Utc>,
    pub glucose_mmol: f64,
    pub glucose_mgdl: i32,
    pub delta: Option<Delta>,
    pub delta_is_negative: bool,
    pub trend: Trend,
    pub insulin_on_board: f64,
    pub carbs_on_board: i32,
    pub thresholds: Thresholds,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSettings {
    pub title: String,
    pub thresholds: Thresholds,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub mgdl: i32,
    pub captured_at: DateTime<Utc>,
    pub trend: Trend,
}

/// Newest entry first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntrySeries {
    pub entries: Vec<Entry>,
}

impl EntrySeries {
    pub fn latest(&self) -> Option<&Entry> {
        self.entries.first()
    }

    pub fn previous(&self) -> Option<&Entry> {
        self.entries.get(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DeviceStatus {
    pub insulin_on_board: f64,
    pub carbs_on_board: i32,
}

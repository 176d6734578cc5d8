use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A validated vital reading as submitted by a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub thermal_value: i32,
    pub battery_level: f64,
    pub memory_usage: f64,
}

/// A persisted sample, with the row id and ingestion time assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct VitalRecord {
    pub id: i64,
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub thermal_value: i32,
    pub battery_level: f64,
    pub memory_usage: f64,
    pub created_at: DateTime<Utc>,
}

/// Means over the most recent samples of one device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollingAverage {
    pub thermal_value: f64,
    pub battery_level: f64,
    pub memory_usage: f64,
    pub sample_count: usize,
}

/// Min/max over the trailing 24 hours. Every field is absent when the
/// window holds no samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DailyStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_thermal: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_thermal: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_battery: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_battery: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_memory: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_memory: Option<f64>,
}

impl DailyStats {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analytics {
    pub rolling_average: RollingAverage,
    pub daily_stats: DailyStats,
    pub device_id: String,
    pub calculated_at: DateTime<Utc>,
}

/// REST API response wrapper for log listings
#[derive(Debug, Serialize)]
pub struct VitalsResponse {
    pub success: bool,
    pub count: usize,
    pub logs: Vec<VitalRecord>,
}

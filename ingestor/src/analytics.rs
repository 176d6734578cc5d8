use crate::errors::Result;
use crate::model::{Analytics, DailyStats, RollingAverage, VitalRecord};
use crate::store::SampleStore;
use chrono::{DateTime, Duration, Utc};

/// Number of most recent samples averaged per device.
pub const ROLLING_WINDOW: usize = 10;

/// Trailing duration covered by the daily min/max.
pub fn daily_window() -> Duration {
    Duration::hours(24)
}

/// Computes the rolling average and daily min/max for one device.
///
/// The two windows are fetched independently. Store errors are returned
/// as-is and no partial result is produced.
pub async fn compute_analytics(
    store: &dyn SampleStore,
    device_id: &str,
    now: DateTime<Utc>,
) -> Result<Analytics> {
    let recent = store.query_recent(device_id, ROLLING_WINDOW).await?;
    let daily = store.query_window(device_id, now - daily_window()).await?;

    Ok(Analytics {
        rolling_average: rolling_average(&recent),
        daily_stats: daily_stats(&daily),
        device_id: device_id.to_string(),
        calculated_at: now,
    })
}

/// Means over `records`, all zero when there are none.
pub fn rolling_average(records: &[VitalRecord]) -> RollingAverage {
    if records.is_empty() {
        return RollingAverage {
            thermal_value: 0.0,
            battery_level: 0.0,
            memory_usage: 0.0,
            sample_count: 0,
        };
    }

    let n = records.len() as f64;
    let sum = |f: fn(&VitalRecord) -> f64| records.iter().map(f).sum::<f64>();

    RollingAverage {
        thermal_value: sum(|r| f64::from(r.thermal_value)) / n,
        battery_level: sum(|r| r.battery_level) / n,
        memory_usage: sum(|r| r.memory_usage) / n,
        sample_count: records.len(),
    }
}

/// Min/max over `records`, left empty when there are none.
pub fn daily_stats(records: &[VitalRecord]) -> DailyStats {
    let thermal = records.iter().map(|r| r.thermal_value);
    let battery = records.iter().map(|r| r.battery_level);
    let memory = records.iter().map(|r| r.memory_usage);

    DailyStats {
        min_thermal: thermal.clone().min(),
        max_thermal: thermal.max(),
        min_battery: battery.clone().reduce(f64::min),
        max_battery: battery.reduce(f64::max),
        min_memory: memory.clone().reduce(f64::min),
        max_memory: memory.reduce(f64::max),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use crate::model::Sample;
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    fn sample(device_id: &str, age: Duration, t: i32, b: f64, m: f64) -> Sample {
        Sample {
            device_id: device_id.to_string(),
            timestamp: Utc::now() - age,
            thermal_value: t,
            battery_level: b,
            memory_usage: m,
        }
    }

    #[test]
    fn test_no_samples_defaults() {
        tokio_test::block_on(async {
            let store = MemoryStore::new();
            let now = Utc::now();
            let analytics = compute_analytics(&store, "ghost", now).await.unwrap();

            assert_eq!(analytics.rolling_average.thermal_value, 0.0);
            assert_eq!(analytics.rolling_average.battery_level, 0.0);
            assert_eq!(analytics.rolling_average.memory_usage, 0.0);
            assert_eq!(analytics.rolling_average.sample_count, 0);
            assert!(analytics.daily_stats.is_empty());
            assert_eq!(analytics.device_id, "ghost");
            assert_eq!(analytics.calculated_at, now);

            let json = serde_json::to_value(&analytics.daily_stats).unwrap();
            assert_eq!(json, serde_json::json!({}));
        });
    }

    #[test]
    fn test_three_sample_average() {
        tokio_test::block_on(async {
            let store = MemoryStore::new();
            let minutes = Duration::minutes;
            store.append(&sample("dev-1", minutes(3), 1, 80.0, 40.0)).await.unwrap();
            store.append(&sample("dev-1", minutes(2), 2, 75.0, 45.0)).await.unwrap();
            store.append(&sample("dev-1", minutes(1), 1, 70.0, 50.0)).await.unwrap();

            let analytics = compute_analytics(&store, "dev-1", Utc::now()).await.unwrap();
            let avg = &analytics.rolling_average;
            assert!((avg.thermal_value - 4.0 / 3.0).abs() < 1e-9);
            assert!((avg.battery_level - 75.0).abs() < 1e-9);
            assert!((avg.memory_usage - 45.0).abs() < 1e-9);
            assert_eq!(avg.sample_count, 3);

            let daily = &analytics.daily_stats;
            assert_eq!(daily.min_thermal, Some(1));
            assert_eq!(daily.max_thermal, Some(2));
            assert_eq!(daily.min_battery, Some(70.0));
            assert_eq!(daily.max_battery, Some(80.0));
            assert_eq!(daily.min_memory, Some(40.0));
            assert_eq!(daily.max_memory, Some(50.0));
        });
    }

    #[test]
    fn test_rolling_window_uses_ten_most_recent() {
        tokio_test::block_on(async {
            let store = MemoryStore::new();
            // Five old readings at thermal 3, ten newer ones at thermal 0
            for i in 0..5 {
                let age = Duration::minutes(100 + i);
                store.append(&sample("dev-1", age, 3, 10.0, 90.0)).await.unwrap();
            }
            for i in 0..10 {
                let age = Duration::minutes(i);
                store.append(&sample("dev-1", age, 0, 50.0, 20.0)).await.unwrap();
            }

            let analytics = compute_analytics(&store, "dev-1", Utc::now()).await.unwrap();
            assert_eq!(analytics.rolling_average.sample_count, ROLLING_WINDOW);
            assert_eq!(analytics.rolling_average.thermal_value, 0.0);
            assert_eq!(analytics.rolling_average.battery_level, 50.0);

            // The daily window still sees all fifteen
            assert_eq!(analytics.daily_stats.max_thermal, Some(3));
            assert_eq!(analytics.daily_stats.min_battery, Some(10.0));
        });
    }

    #[test]
    fn test_daily_window_excludes_old_samples() {
        tokio_test::block_on(async {
            let store = MemoryStore::new();
            store.append(&sample("dev-1", Duration::hours(1), 1, 60.0, 30.0)).await.unwrap();
            store.append(&sample("dev-1", Duration::hours(30), 3, 5.0, 99.0)).await.unwrap();

            let analytics = compute_analytics(&store, "dev-1", Utc::now()).await.unwrap();

            // Rolling window includes the 30h old reading
            assert_eq!(analytics.rolling_average.sample_count, 2);
            assert_eq!(analytics.rolling_average.thermal_value, 2.0);

            assert_eq!(analytics.daily_stats.min_thermal, Some(1));
            assert_eq!(analytics.daily_stats.max_thermal, Some(1));
            assert_eq!(analytics.daily_stats.max_memory, Some(30.0));
        });
    }

    #[test]
    fn test_daily_window_includes_exact_boundary() {
        tokio_test::block_on(async {
            let store = MemoryStore::new();
            let now = Utc::now();
            let at_boundary = Sample {
                device_id: "dev-1".to_string(),
                timestamp: now - daily_window(),
                thermal_value: 2,
                battery_level: 55.0,
                memory_usage: 65.0,
            };
            let just_outside = Sample {
                timestamp: now - daily_window() - Duration::milliseconds(1),
                thermal_value: 3,
                battery_level: 5.0,
                memory_usage: 95.0,
                ..at_boundary.clone()
            };
            store.append(&at_boundary).await.unwrap();
            store.append(&just_outside).await.unwrap();

            let analytics = compute_analytics(&store, "dev-1", now).await.unwrap();
            let daily = &analytics.daily_stats;
            assert_eq!(daily.min_thermal, Some(2));
            assert_eq!(daily.max_thermal, Some(2));
            assert_eq!(daily.min_battery, Some(55.0));
            assert_eq!(daily.max_memory, Some(65.0));
        });
    }

    #[test]
    fn test_only_old_samples_gives_average_but_empty_daily() {
        tokio_test::block_on(async {
            let store = MemoryStore::new();
            store.append(&sample("dev-1", Duration::days(3), 2, 40.0, 60.0)).await.unwrap();

            let analytics = compute_analytics(&store, "dev-1", Utc::now()).await.unwrap();
            assert_eq!(analytics.rolling_average.sample_count, 1);
            assert_eq!(analytics.rolling_average.thermal_value, 2.0);
            assert!(analytics.daily_stats.is_empty());
        });
    }

    #[test]
    fn test_other_devices_are_ignored() {
        tokio_test::block_on(async {
            let store = MemoryStore::new();
            store.append(&sample("dev-1", Duration::minutes(1), 1, 50.0, 50.0)).await.unwrap();
            store.append(&sample("dev-2", Duration::minutes(1), 3, 10.0, 90.0)).await.unwrap();

            let analytics = compute_analytics(&store, "dev-1", Utc::now()).await.unwrap();
            assert_eq!(analytics.rolling_average.sample_count, 1);
            assert_eq!(analytics.daily_stats.max_thermal, Some(1));
        });
    }

    struct FailingStore;

    #[async_trait]
    impl SampleStore for FailingStore {
        async fn append(&self, _sample: &Sample) -> Result<i64> {
            Err(Error::Storage("offline".to_string()))
        }

        async fn query_recent(&self, _device_id: &str, _limit: usize) -> Result<Vec<VitalRecord>> {
            Ok(Vec::new())
        }

        async fn query_window(
            &self,
            _device_id: &str,
            _since: DateTime<Utc>,
        ) -> Result<Vec<VitalRecord>> {
            Err(Error::Storage("offline".to_string()))
        }

        async fn list(&self, _device_id: Option<&str>, _limit: usize) -> Result<Vec<VitalRecord>> {
            Err(Error::Storage("offline".to_string()))
        }
    }

    #[test]
    fn test_storage_error_propagates() {
        tokio_test::block_on(async {
            let result = compute_analytics(&FailingStore, "dev-1", Utc::now()).await;
            assert!(matches!(result, Err(Error::Storage(msg)) if msg == "offline"));
        });
    }
}

use crate::errors::{Error, Result};
use crate::model::{Sample, VitalRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// Persistence for vital samples. Append-only.
#[async_trait]
pub trait SampleStore: Send + Sync {
    /// Persists a sample and returns the assigned row id.
    async fn append(&self, sample: &Sample) -> Result<i64>;

    /// The `limit` most recent samples of a device, newest first.
    async fn query_recent(&self, device_id: &str, limit: usize) -> Result<Vec<VitalRecord>>;

    /// All samples of a device with `timestamp >= since`.
    async fn query_window(&self, device_id: &str, since: DateTime<Utc>)
        -> Result<Vec<VitalRecord>>;

    /// Newest-first listing across all devices, or one device when given.
    async fn list(&self, device_id: Option<&str>, limit: usize) -> Result<Vec<VitalRecord>>;
}

/// In-memory store for tests and database-less local runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<VitalRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize> {
        self.lock().map(|r| r.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|n| n == 0)
    }

    fn newest_first<'a>(
        &self,
        records: impl Iterator<Item = &'a VitalRecord>,
        limit: usize,
    ) -> Vec<VitalRecord> {
        let mut matching: Vec<VitalRecord> = records.cloned().collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        matching.truncate(limit);
        matching
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<VitalRecord>>> {
        self.records
            .lock()
            .map_err(|e| Error::Storage(format!("Lock error: {}", e)))
    }
}

#[async_trait]
impl SampleStore for MemoryStore {
    async fn append(&self, sample: &Sample) -> Result<i64> {
        let mut records = self.lock()?;
        let id = records.len() as i64 + 1;
        records.push(VitalRecord {
            id,
            device_id: sample.device_id.clone(),
            timestamp: sample.timestamp,
            thermal_value: sample.thermal_value,
            battery_level: sample.battery_level,
            memory_usage: sample.memory_usage,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn query_recent(&self, device_id: &str, limit: usize) -> Result<Vec<VitalRecord>> {
        let records = self.lock()?;
        Ok(self.newest_first(records.iter().filter(|r| r.device_id == device_id), limit))
    }

    async fn query_window(
        &self,
        device_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<VitalRecord>> {
        let records = self.lock()?;
        Ok(records
            .iter()
            .filter(|r| r.device_id == device_id && r.timestamp >= since)
            .cloned()
            .collect())
    }

    async fn list(&self, device_id: Option<&str>, limit: usize) -> Result<Vec<VitalRecord>> {
        let records = self.lock()?;
        Ok(self.newest_first(
            records
                .iter()
                .filter(|r| device_id.map_or(true, |d| r.device_id == d)),
            limit,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample(device_id: &str, minutes_ago: i64, thermal_value: i32) -> Sample {
        Sample {
            device_id: device_id.to_string(),
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
            thermal_value,
            battery_level: 80.0,
            memory_usage: 40.0,
        }
    }

    #[test]
    fn test_append_assigns_sequential_ids() {
        tokio_test::block_on(async {
            let store = MemoryStore::new();
            assert_eq!(store.append(&sample("dev-1", 0, 1)).await.unwrap(), 1);
            assert_eq!(store.append(&sample("dev-2", 0, 1)).await.unwrap(), 2);
            assert_eq!(store.len().unwrap(), 2);
        });
    }

    #[test]
    fn test_query_recent_orders_by_timestamp_not_insertion() {
        tokio_test::block_on(async {
            let store = MemoryStore::new();
            store.append(&sample("dev-1", 5, 0)).await.unwrap();
            store.append(&sample("dev-1", 1, 1)).await.unwrap();
            store.append(&sample("dev-1", 10, 2)).await.unwrap();
            store.append(&sample("dev-2", 0, 3)).await.unwrap();

            let recent = store.query_recent("dev-1", 2).await.unwrap();
            let thermals: Vec<i32> = recent.iter().map(|r| r.thermal_value).collect();
            assert_eq!(thermals, vec![1, 0]);
        });
    }

    #[test]
    fn test_query_window_filters_device_and_time() {
        tokio_test::block_on(async {
            let store = MemoryStore::new();
            store.append(&sample("dev-1", 30, 0)).await.unwrap();
            store.append(&sample("dev-1", 120, 1)).await.unwrap();
            store.append(&sample("dev-2", 30, 2)).await.unwrap();

            let since = Utc::now() - Duration::minutes(60);
            let window = store.query_window("dev-1", since).await.unwrap();
            assert_eq!(window.len(), 1);
            assert_eq!(window[0].thermal_value, 0);
        });
    }

    #[test]
    fn test_list_with_and_without_device() {
        tokio_test::block_on(async {
            let store = MemoryStore::new();
            store.append(&sample("dev-1", 3, 0)).await.unwrap();
            store.append(&sample("dev-2", 2, 1)).await.unwrap();
            store.append(&sample("dev-1", 1, 2)).await.unwrap();

            let all = store.list(None, 100).await.unwrap();
            assert_eq!(all.len(), 3);
            assert_eq!(all[0].thermal_value, 2);

            let dev2 = store.list(Some("dev-2"), 100).await.unwrap();
            assert_eq!(dev2.len(), 1);

            let limited = store.list(None, 1).await.unwrap();
            assert_eq!(limited.len(), 1);
        });
    }

    #[test]
    fn test_poisoned_lock_is_reported() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.records.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert!(matches!(store.len(), Err(Error::Storage(_))));
        assert!(store.is_empty().is_err());
        tokio_test::block_on(async {
            assert!(store.append(&sample("dev-1", 0, 1)).await.is_err());
        });
    }
}

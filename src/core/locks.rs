use crate::domain::model::ProviderId;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

pub type DayKey = (ProviderId, NaiveDate);

/// 超過這個數量時順手清掉沒有人持有的鎖
const PRUNE_THRESHOLD: usize = 1024;

/// 以 (店員, 日期) 為鍵的非同步鎖表，把「先檢查再寫入」串行化
#[derive(Debug, Default)]
pub struct DayLocks {
    locks: Mutex<HashMap<DayKey, Arc<AsyncMutex<()>>>>,
}

impl DayLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, key: DayKey) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.len() > PRUNE_THRESHOLD {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        locks.entry(key).or_default().clone()
    }

    pub async fn lock(&self, provider_id: ProviderId, date: NaiveDate) -> OwnedMutexGuard<()> {
        self.handle((provider_id, date)).lock_owned().await
    }

    /// 一律依鍵值大小順序上鎖，避免兩個跨日更新互相等待
    pub async fn lock_pair(&self, a: DayKey, b: DayKey) -> Vec<OwnedMutexGuard<()>> {
        if a == b {
            return vec![self.handle(a).lock_owned().await];
        }
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        let first_guard = self.handle(first).lock_owned().await;
        let second_guard = self.handle(second).lock_owned().await;
        vec![first_guard, second_guard]
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, d).unwrap()
    }

    #[tokio::test]
    async fn test_same_day_is_exclusive() {
        let locks = Arc::new(DayLocks::new());
        let guard = locks.lock(ProviderId(1), date(15)).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock(ProviderId(1), date(15)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_days_do_not_block() {
        let locks = DayLocks::new();
        let _a = locks.lock(ProviderId(1), date(15)).await;
        let b = tokio::time::timeout(Duration::from_secs(1), locks.lock(ProviderId(1), date(16))).await;
        assert!(b.is_ok());
        let c = tokio::time::timeout(Duration::from_secs(1), locks.lock(ProviderId(2), date(15))).await;
        assert!(c.is_ok());
    }

    #[tokio::test]
    async fn test_lock_pair_in_opposite_order_does_not_deadlock() {
        let locks = Arc::new(DayLocks::new());
        let a = (ProviderId(1), date(15));
        let b = (ProviderId(1), date(16));

        let mut tasks = Vec::new();
        for i in 0..20 {
            let locks = locks.clone();
            let (x, y) = if i % 2 == 0 { (a, b) } else { (b, a) };
            tasks.push(tokio::spawn(async move {
                let _guards = locks.lock_pair(x, y).await;
                tokio::task::yield_now().await;
            }));
        }
        for task in tasks {
            tokio::time::timeout(Duration::from_secs(2), task)
                .await
                .unwrap()
                .unwrap();
        }
        assert_eq!(locks.lock_pair(a, a).await.len(), 1);
    }

    #[test]
    fn test_one_entry_per_day_key() {
        let locks = DayLocks::new();
        assert!(locks.is_empty());

        tokio_test::block_on(async {
            drop(locks.lock(ProviderId(1), date(15)).await);
            drop(locks.lock(ProviderId(1), date(15)).await);
            drop(locks.lock(ProviderId(2), date(15)).await);
        });
        assert_eq!(locks.len(), 2);
    }
}

use crate::adapters::memory_store::{InMemoryStore, StoreSnapshot};
use crate::domain::model::{Appointment, CalendarSlot, ClosureRecord, Provider, ProviderId, TimeOfDay};
use crate::domain::ports::{InsertOutcome, RelocateOutcome, Store};
use crate::utils::error::StoreResult;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

/// 以 JSON 檔保存資料的 `Store`。讀取走記憶體，每次變更後把整份快照寫回檔案。
/// 寫檔失敗時記憶體還原成變更前的快照，呼叫端看到的錯誤與資料一致。
/// 只保證單一行程內的原子性，多個行程共用同一個檔案不受支援。
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: InMemoryStore,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// 檔案不存在時從空資料開始
    pub async fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let snapshot = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<StoreSnapshot>(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No data file at {}, starting empty", path.display());
                StoreSnapshot::default()
            }
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(
            "Loaded {} appointments and {} closures from {}",
            snapshot.appointments.len(),
            snapshot.closures.len(),
            path.display()
        );

        Ok(Self {
            path,
            inner: InMemoryStore::from_snapshot(snapshot),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 設定檔裡的店員名單同步進資料檔
    pub async fn seed_providers(&self, providers: impl IntoIterator<Item = Provider>) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let before = self.inner.snapshot().await;
        for provider in providers {
            self.inner.upsert_provider(provider).await;
        }
        self.commit(before).await
    }

    /// 呼叫端須持有 `write_lock`，`before` 是變更前的快照
    async fn commit(&self, before: StoreSnapshot) -> StoreResult<()> {
        if let Err(e) = self.write_snapshot().await {
            tracing::warn!(
                "Writing {} failed, rolling back the in-memory change: {}",
                self.path.display(),
                e
            );
            self.inner.restore(before).await;
            return Err(e);
        }
        Ok(())
    }

    /// 先寫暫存檔再改名，避免寫到一半的檔案
    async fn write_snapshot(&self) -> StoreResult<()> {
        let snapshot = self.inner.snapshot().await;
        let json = serde_json::to_vec_pretty(&snapshot)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &json).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;

        tracing::debug!("Wrote {} bytes to {}", json.len(), self.path.display());
        Ok(())
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn providers(&self) -> StoreResult<Vec<Provider>> {
        self.inner.providers().await
    }

    async fn find_provider(&self, id: ProviderId) -> StoreResult<Option<Provider>> {
        self.inner.find_provider(id).await
    }

    async fn find_appointment(&self, slot: &CalendarSlot) -> StoreResult<Option<Appointment>> {
        self.inner.find_appointment(slot).await
    }

    async fn find_appointment_by_id(&self, id: Uuid) -> StoreResult<Option<Appointment>> {
        self.inner.find_appointment_by_id(id).await
    }

    async fn find_appointments(
        &self,
        provider_id: ProviderId,
        date: NaiveDate,
    ) -> StoreResult<Vec<Appointment>> {
        self.inner.find_appointments(provider_id, date).await
    }

    async fn find_appointments_between(
        &self,
        provider_id: Option<ProviderId>,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> StoreResult<Vec<Appointment>> {
        self.inner.find_appointments_between(provider_id, from, to).await
    }

    async fn insert_appointment_if_absent(
        &self,
        appointment: Appointment,
    ) -> StoreResult<InsertOutcome> {
        let _guard = self.write_lock.lock().await;
        let before = self.inner.snapshot().await;
        let outcome = self.inner.insert_appointment_if_absent(appointment).await?;
        if matches!(outcome, InsertOutcome::Inserted(_)) {
            self.commit(before).await?;
        }
        Ok(outcome)
    }

    async fn relocate_appointment(&self, updated: Appointment) -> StoreResult<RelocateOutcome> {
        let _guard = self.write_lock.lock().await;
        let before = self.inner.snapshot().await;
        let outcome = self.inner.relocate_appointment(updated).await?;
        if matches!(outcome, RelocateOutcome::Moved(_)) {
            self.commit(before).await?;
        }
        Ok(outcome)
    }

    async fn delete_appointment(&self, id: Uuid) -> StoreResult<bool> {
        let _guard = self.write_lock.lock().await;
        let before = self.inner.snapshot().await;
        let removed = self.inner.delete_appointment(id).await?;
        if removed {
            self.commit(before).await?;
        }
        Ok(removed)
    }

    async fn find_closures(
        &self,
        provider_id: ProviderId,
        date: NaiveDate,
    ) -> StoreResult<Vec<ClosureRecord>> {
        self.inner.find_closures(provider_id, date).await
    }

    async fn insert_closures(&self, records: Vec<ClosureRecord>) -> StoreResult<usize> {
        let _guard = self.write_lock.lock().await;
        let before = self.inner.snapshot().await;
        let inserted = self.inner.insert_closures(records).await?;
        if inserted > 0 {
            self.commit(before).await?;
        }
        Ok(inserted)
    }

    async fn delete_closures(
        &self,
        provider_id: ProviderId,
        date: NaiveDate,
        time_of_day: Option<TimeOfDay>,
    ) -> StoreResult<usize> {
        let _guard = self.write_lock.lock().await;
        let before = self.inner.snapshot().await;
        let removed = self
            .inner
            .delete_closures(provider_id, date, time_of_day)
            .await?;
        if removed > 0 {
            self.commit(before).await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::CustomerDetails;
    use tempfile::TempDir;

    fn slot(time: &str) -> CalendarSlot {
        CalendarSlot::new(
            ProviderId(1),
            NaiveDate::from_ymd_opt(2025, 4, 15).unwrap(),
            time.parse().unwrap(),
        )
    }

    #[tokio::test]
    async fn test_open_missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path().join("bookings.json")).await.unwrap();
        assert!(store.providers().await.unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_mutations_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("bookings.json");

        let appointment = Appointment::new(&slot("10:15"), CustomerDetails::new("Ali Veli", "05321234567"));
        {
            let store = JsonFileStore::open(&path).await.unwrap();
            store
                .seed_providers([Provider {
                    id: ProviderId(1),
                    name: "Mehmet".into(),
                }])
                .await
                .unwrap();
            store.insert_appointment_if_absent(appointment.clone()).await.unwrap();
            store
                .insert_closures(vec![ClosureRecord::new(&slot("11:00"), Some("break".into()))])
                .await
                .unwrap();
        }

        let reopened = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(reopened.providers().await.unwrap().len(), 1);
        assert_eq!(
            reopened.find_appointment(&slot("10:15")).await.unwrap(),
            Some(appointment)
        );
        let closures = reopened.find_closures(ProviderId(1), slot("11:00").date).await.unwrap();
        assert_eq!(closures.len(), 1);
        assert_eq!(closures[0].reason.as_deref(), Some("break"));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bookings.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let result = JsonFileStore::open(&path).await;
        assert!(matches!(result, Err(crate::utils::error::StoreError::Encoding(_))));
    }

    #[tokio::test]
    async fn test_failed_write_rolls_back_memory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bookings.json");
        let store = JsonFileStore::open(&path).await.unwrap();
        store
            .seed_providers([Provider {
                id: ProviderId(1),
                name: "Mehmet".into(),
            }])
            .await
            .unwrap();

        // 暫存檔的位置被目錄佔住，寫檔一定失敗
        std::fs::create_dir(path.with_extension("json.tmp")).unwrap();

        let appointment = Appointment::new(&slot("10:15"), CustomerDetails::new("Ali Veli", "05321234567"));
        assert!(matches!(
            store.insert_appointment_if_absent(appointment.clone()).await,
            Err(crate::utils::error::StoreError::Io(_))
        ));
        assert_eq!(store.find_appointment(&slot("10:15")).await.unwrap(), None);

        std::fs::remove_dir(path.with_extension("json.tmp")).unwrap();
        assert!(matches!(
            store.insert_appointment_if_absent(appointment).await.unwrap(),
            InsertOutcome::Inserted(_)
        ));
    }
}

use crate::core::availability::AvailabilityIndex;
use crate::core::locks::DayLocks;
use crate::domain::model::{CalendarSlot, ClosureRecord, ProviderId, SlotStatus, TimeOfDay};
use crate::domain::ports::Store;
use crate::utils::error::{Operation, Result, StoreContext};
use chrono::NaiveDate;
use std::sync::Arc;

/// 開放/關閉單一時段或整天。所有操作都是冪等的，可以安全重試
#[derive(Clone)]
pub struct ClosureManager {
    store: Arc<dyn Store>,
    index: AvailabilityIndex,
    locks: Arc<DayLocks>,
}

impl ClosureManager {
    pub fn new(store: Arc<dyn Store>, index: AvailabilityIndex, locks: Arc<DayLocks>) -> Self {
        Self {
            store,
            index,
            locks,
        }
    }

    /// 已關閉時回傳原本的紀錄；已被預約時不做事並回傳 `None`
    pub async fn close_slot(
        &self,
        provider_id: ProviderId,
        date: NaiveDate,
        time_of_day: TimeOfDay,
        reason: Option<String>,
    ) -> Result<Option<ClosureRecord>> {
        self.index.calendar().require(date, time_of_day)?;
        self.index
            .require_provider(Operation::CloseSlot, provider_id)
            .await?;

        let slot = CalendarSlot::new(provider_id, date, time_of_day);
        let _guard = self.locks.lock(provider_id, date).await;
        let day = self
            .index
            .classify_for(Operation::CloseSlot, provider_id, date)
            .await?;

        match day.status(time_of_day) {
            Some(SlotStatus::Booked(appointment)) => {
                tracing::debug!(
                    "Not closing {}: booked by appointment {}",
                    slot,
                    appointment.id
                );
                Ok(None)
            }
            Some(SlotStatus::Closed(existing)) => Ok(Some(existing.clone())),
            _ => {
                let record = ClosureRecord::new(&slot, reason);
                let inserted = self
                    .store
                    .insert_closures(vec![record.clone()])
                    .await
                    .during(Operation::CloseSlot)?;
                if inserted == 1 {
                    tracing::info!("Closed {}", slot);
                    return Ok(Some(record));
                }

                // 另一個寫入者搶先了：回報目前存在的紀錄
                let existing = self
                    .store
                    .find_closures(provider_id, date)
                    .await
                    .during(Operation::CloseSlot)?
                    .into_iter()
                    .find(|c| c.slot() == slot);
                Ok(existing)
            }
        }
    }

    /// 回傳是否真的移除了關閉紀錄
    pub async fn open_slot(
        &self,
        provider_id: ProviderId,
        date: NaiveDate,
        time_of_day: TimeOfDay,
    ) -> Result<bool> {
        self.index.calendar().require(date, time_of_day)?;

        let removed = self
            .store
            .delete_closures(provider_id, date, Some(time_of_day))
            .await
            .during(Operation::OpenSlot)?;
        if removed > 0 {
            tracing::info!(
                "Opened {}",
                CalendarSlot::new(provider_id, date, time_of_day)
            );
        }
        Ok(removed > 0)
    }

    /// 關閉所有尚未關閉且未被預約的時段，一次批次寫入。回傳新關閉的數量
    pub async fn close_day(
        &self,
        provider_id: ProviderId,
        date: NaiveDate,
        reason: Option<String>,
    ) -> Result<usize> {
        self.index
            .require_provider(Operation::CloseDay, provider_id)
            .await?;

        let _guard = self.locks.lock(provider_id, date).await;
        let day = self
            .index
            .classify_for(Operation::CloseDay, provider_id, date)
            .await?;

        let records: Vec<ClosureRecord> = day
            .open_slots()
            .into_iter()
            .map(|time| ClosureRecord::new(&day.slot(time), reason.clone()))
            .collect();
        if records.is_empty() {
            tracing::debug!("Nothing to close for provider {} on {}", provider_id, date);
            return Ok(0);
        }

        let inserted = self
            .store
            .insert_closures(records)
            .await
            .during(Operation::CloseDay)?;
        tracing::info!(
            "Closed {} slots for provider {} on {}",
            inserted,
            provider_id,
            date
        );
        Ok(inserted)
    }

    /// 一次刪除當天所有關閉紀錄，預約不受影響
    pub async fn open_day(&self, provider_id: ProviderId, date: NaiveDate) -> Result<usize> {
        let removed = self
            .store
            .delete_closures(provider_id, date, None)
            .await
            .during(Operation::OpenDay)?;
        tracing::info!(
            "Opened {} slots for provider {} on {}",
            removed,
            provider_id,
            date
        );
        Ok(removed)
    }
}

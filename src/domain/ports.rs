use crate::domain::model::{Appointment, CalendarSlot, ClosureRecord, Provider, ProviderId, TimeOfDay};
use crate::utils::error::StoreResult;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

/// `insert_appointment_if_absent` 的結果
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted(Appointment),
    /// 時段已被佔用，附上佔用者
    Conflict(Appointment),
}

/// `relocate_appointment` 的結果
#[derive(Debug, Clone, PartialEq)]
pub enum RelocateOutcome {
    Moved(Appointment),
    Conflict(Appointment),
    Missing,
}

/// 持久層介面。每個方法本身必須是原子的：
/// 預約以 `CalendarSlot` 為唯一索引，批次寫入要嘛全部生效要嘛全部不生效。
#[async_trait]
pub trait Store: Send + Sync {
    async fn providers(&self) -> StoreResult<Vec<Provider>>;

    async fn find_provider(&self, id: ProviderId) -> StoreResult<Option<Provider>>;

    async fn find_appointment(&self, slot: &CalendarSlot) -> StoreResult<Option<Appointment>>;

    async fn find_appointment_by_id(&self, id: Uuid) -> StoreResult<Option<Appointment>>;

    /// 某位店員某一天的所有預約，依時間排序
    async fn find_appointments(
        &self,
        provider_id: ProviderId,
        date: NaiveDate,
    ) -> StoreResult<Vec<Appointment>>;

    /// 包含兩端點；`provider_id` 為 `None` 時回傳所有店員
    async fn find_appointments_between(
        &self,
        provider_id: Option<ProviderId>,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> StoreResult<Vec<Appointment>>;

    async fn insert_appointment_if_absent(
        &self,
        appointment: Appointment,
    ) -> StoreResult<InsertOutcome>;

    /// 以同一 id 覆寫預約，目標時段若被其他預約佔用則不做任何變更
    async fn relocate_appointment(&self, updated: Appointment) -> StoreResult<RelocateOutcome>;

    /// 回傳是否真的刪除了一筆
    async fn delete_appointment(&self, id: Uuid) -> StoreResult<bool>;

    async fn find_closures(
        &self,
        provider_id: ProviderId,
        date: NaiveDate,
    ) -> StoreResult<Vec<ClosureRecord>>;

    /// 批次寫入；已有關閉紀錄或已有預約的時段會被略過。回傳實際寫入筆數
    async fn insert_closures(&self, records: Vec<ClosureRecord>) -> StoreResult<usize>;

    /// `time_of_day` 為 `None` 時刪除整天
    async fn delete_closures(
        &self,
        provider_id: ProviderId,
        date: NaiveDate,
        time_of_day: Option<TimeOfDay>,
    ) -> StoreResult<usize>;
}

use crate::domain::model::{Appointment, CalendarSlot, ClosureRecord, Provider, ProviderId, TimeOfDay};
use crate::domain::ports::{InsertOutcome, RelocateOutcome, Store};
use crate::utils::error::StoreResult;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

/// 可序列化的完整資料快照
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub providers: Vec<Provider>,
    #[serde(default)]
    pub appointments: Vec<Appointment>,
    #[serde(default)]
    pub closures: Vec<ClosureRecord>,
}

#[derive(Debug, Default)]
struct StoreState {
    providers: BTreeMap<ProviderId, Provider>,
    appointments: HashMap<Uuid, Appointment>,
    /// 唯一索引：每個時段最多一筆預約
    slot_index: HashMap<CalendarSlot, Uuid>,
    closures: Vec<ClosureRecord>,
}

impl StoreState {
    /// 舊資料中同一時段的重複預約會保留，但只有第一筆進入唯一索引
    fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let mut state = Self::default();

        for provider in snapshot.providers {
            state.providers.insert(provider.id, provider);
        }
        for appointment in snapshot.appointments {
            let slot = appointment.slot();
            if let Some(existing) = state.slot_index.get(&slot) {
                tracing::warn!(
                    "Snapshot holds two appointments for {} ({} and {})",
                    slot,
                    existing,
                    appointment.id
                );
            } else {
                state.slot_index.insert(slot, appointment.id);
            }
            state.appointments.insert(appointment.id, appointment);
        }
        state.closures = snapshot.closures;
        state
    }

    fn has_closure(&self, slot: &CalendarSlot) -> bool {
        self.closures.iter().any(|c| c.slot() == *slot)
    }
}

/// 記憶體內的 `Store`。每個方法都在同一把寫鎖內完成檢查與寫入
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_providers(providers: impl IntoIterator<Item = Provider>) -> Self {
        Self::from_snapshot(StoreSnapshot {
            providers: providers.into_iter().collect(),
            ..Default::default()
        })
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            state: RwLock::new(StoreState::from_snapshot(snapshot)),
        }
    }

    /// 整份狀態換成 `snapshot` 的內容
    pub async fn restore(&self, snapshot: StoreSnapshot) {
        let state = StoreState::from_snapshot(snapshot);
        *self.state.write().await = state;
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.read().await;
        let mut appointments: Vec<Appointment> = state.appointments.values().cloned().collect();
        appointments.sort_by(|a, b| {
            (a.provider_id, a.starts_at, a.created_at).cmp(&(b.provider_id, b.starts_at, b.created_at))
        });
        let mut closures = state.closures.clone();
        closures.sort_by(|a, b| (a.provider_id, a.starts_at).cmp(&(b.provider_id, b.starts_at)));

        StoreSnapshot {
            providers: state.providers.values().cloned().collect(),
            appointments,
            closures,
        }
    }

    pub async fn upsert_provider(&self, provider: Provider) {
        let mut state = self.state.write().await;
        state.providers.insert(provider.id, provider);
    }

    pub async fn appointment_count(&self) -> usize {
        self.state.read().await.appointments.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn providers(&self) -> StoreResult<Vec<Provider>> {
        Ok(self.state.read().await.providers.values().cloned().collect())
    }

    async fn find_provider(&self, id: ProviderId) -> StoreResult<Option<Provider>> {
        Ok(self.state.read().await.providers.get(&id).cloned())
    }

    async fn find_appointment(&self, slot: &CalendarSlot) -> StoreResult<Option<Appointment>> {
        let state = self.state.read().await;
        Ok(state
            .slot_index
            .get(slot)
            .and_then(|id| state.appointments.get(id))
            .cloned())
    }

    async fn find_appointment_by_id(&self, id: Uuid) -> StoreResult<Option<Appointment>> {
        Ok(self.state.read().await.appointments.get(&id).cloned())
    }

    async fn find_appointments(
        &self,
        provider_id: ProviderId,
        date: NaiveDate,
    ) -> StoreResult<Vec<Appointment>> {
        let state = self.state.read().await;
        let mut found: Vec<Appointment> = state
            .appointments
            .values()
            .filter(|a| a.provider_id == provider_id && a.starts_at.date() == date)
            .cloned()
            .collect();
        found.sort_by_key(|a| (a.starts_at, a.created_at));
        Ok(found)
    }

    async fn find_appointments_between(
        &self,
        provider_id: Option<ProviderId>,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> StoreResult<Vec<Appointment>> {
        let state = self.state.read().await;
        let mut found: Vec<Appointment> = state
            .appointments
            .values()
            .filter(|a| provider_id.map_or(true, |p| a.provider_id == p))
            .filter(|a| a.starts_at >= from && a.starts_at <= to)
            .cloned()
            .collect();
        found.sort_by_key(|a| (a.starts_at, a.provider_id));
        Ok(found)
    }

    async fn insert_appointment_if_absent(
        &self,
        appointment: Appointment,
    ) -> StoreResult<InsertOutcome> {
        let mut state = self.state.write().await;
        let slot = appointment.slot();

        if let Some(existing) = state
            .slot_index
            .get(&slot)
            .and_then(|id| state.appointments.get(id))
        {
            return Ok(InsertOutcome::Conflict(existing.clone()));
        }

        state.slot_index.insert(slot, appointment.id);
        state
            .appointments
            .insert(appointment.id, appointment.clone());
        Ok(InsertOutcome::Inserted(appointment))
    }

    async fn relocate_appointment(&self, updated: Appointment) -> StoreResult<RelocateOutcome> {
        let mut state = self.state.write().await;

        let old_slot = match state.appointments.get(&updated.id) {
            Some(current) => current.slot(),
            None => return Ok(RelocateOutcome::Missing),
        };
        let new_slot = updated.slot();

        if let Some(occupant) = state
            .slot_index
            .get(&new_slot)
            .filter(|id| **id != updated.id)
            .and_then(|id| state.appointments.get(id))
        {
            return Ok(RelocateOutcome::Conflict(occupant.clone()));
        }

        if state.slot_index.get(&old_slot) == Some(&updated.id) {
            state.slot_index.remove(&old_slot);
        }
        state.slot_index.insert(new_slot, updated.id);
        state.appointments.insert(updated.id, updated.clone());
        Ok(RelocateOutcome::Moved(updated))
    }

    async fn delete_appointment(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        match state.appointments.remove(&id) {
            Some(removed) => {
                let slot = removed.slot();
                if state.slot_index.get(&slot) == Some(&id) {
                    state.slot_index.remove(&slot);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_closures(
        &self,
        provider_id: ProviderId,
        date: NaiveDate,
    ) -> StoreResult<Vec<ClosureRecord>> {
        let state = self.state.read().await;
        Ok(state
            .closures
            .iter()
            .filter(|c| c.provider_id == provider_id && c.starts_at.date() == date)
            .cloned()
            .collect())
    }

    async fn insert_closures(&self, records: Vec<ClosureRecord>) -> StoreResult<usize> {
        let mut state = self.state.write().await;
        let mut seen = HashSet::new();
        let mut accepted = Vec::with_capacity(records.len());

        for record in records {
            let slot = record.slot();
            if !seen.insert(slot) || state.has_closure(&slot) || state.slot_index.contains_key(&slot) {
                continue;
            }
            accepted.push(record);
        }

        let inserted = accepted.len();
        state.closures.extend(accepted);
        Ok(inserted)
    }

    async fn delete_closures(
        &self,
        provider_id: ProviderId,
        date: NaiveDate,
        time_of_day: Option<TimeOfDay>,
    ) -> StoreResult<usize> {
        let mut state = self.state.write().await;
        let before = state.closures.len();
        state.closures.retain(|c| {
            let slot = c.slot();
            let matches = slot.provider_id == provider_id
                && slot.date == date
                && time_of_day.map_or(true, |t| slot.time_of_day == t);
            !matches
        });
        Ok(before - state.closures.len())
    }
}

use crate::core::slot_calendar::SlotCalendar;
use crate::domain::model::{
    Appointment, AppointmentSummary, CalendarSlot, ClosureRecord, DaySchedule, IntegrityWarning,
    Provider, ProviderId, RecordKind, ScheduleEntry, SlotState, SlotStatus, TimeOfDay,
};
use crate::domain::ports::Store;
use crate::utils::error::{Operation, Result, SchedulingError, StoreContext};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// 某位店員某一天每個標準時段的狀態
#[derive(Debug, Clone)]
pub struct DayClassification {
    pub provider_id: ProviderId,
    pub date: NaiveDate,
    slots: BTreeMap<TimeOfDay, SlotStatus>,
    warnings: Vec<IntegrityWarning>,
}

impl DayClassification {
    pub fn status(&self, time: TimeOfDay) -> Option<&SlotStatus> {
        self.slots.get(&time)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TimeOfDay, &SlotStatus)> {
        self.slots.iter()
    }

    pub fn warnings(&self) -> &[IntegrityWarning] {
        &self.warnings
    }

    pub fn count(&self, state: SlotState) -> usize {
        self.slots.values().filter(|s| s.state() == state).count()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_fully_closed(&self) -> bool {
        !self.slots.is_empty() && self.count(SlotState::Closed) == self.slots.len()
    }

    /// 目前仍可預約的時段
    pub fn open_slots(&self) -> Vec<TimeOfDay> {
        self.slots
            .iter()
            .filter(|(_, s)| matches!(s, SlotStatus::Open))
            .map(|(t, _)| *t)
            .collect()
    }

    pub fn slot(&self, time: TimeOfDay) -> CalendarSlot {
        CalendarSlot::new(self.provider_id, self.date, time)
    }

    pub fn into_schedule(self) -> DaySchedule {
        let entries = self
            .slots
            .into_iter()
            .map(|(time_of_day, status)| match status {
                SlotStatus::Open => ScheduleEntry {
                    time_of_day,
                    status: SlotState::Open,
                    appointment: None,
                    reason: None,
                },
                SlotStatus::Booked(appointment) => ScheduleEntry {
                    time_of_day,
                    status: SlotState::Booked,
                    appointment: Some(AppointmentSummary {
                        id: appointment.id,
                        customer_name: appointment.customer_name,
                        phone: Some(appointment.phone),
                    }),
                    reason: None,
                },
                SlotStatus::Closed(closure) => ScheduleEntry {
                    time_of_day,
                    status: SlotState::Closed,
                    appointment: None,
                    reason: closure.reason,
                },
            })
            .collect();

        DaySchedule {
            provider_id: self.provider_id,
            date: self.date,
            entries,
            warnings: self.warnings,
        }
    }
}

/// 合併預約與關閉紀錄，對照標準時段分類
#[derive(Clone)]
pub struct AvailabilityIndex {
    store: Arc<dyn Store>,
    calendar: SlotCalendar,
}

impl AvailabilityIndex {
    pub fn new(store: Arc<dyn Store>, calendar: SlotCalendar) -> Self {
        Self { store, calendar }
    }

    pub fn calendar(&self) -> &SlotCalendar {
        &self.calendar
    }

    pub async fn require_provider(
        &self,
        operation: Operation,
        provider_id: ProviderId,
    ) -> Result<Provider> {
        self.store
            .find_provider(provider_id)
            .await
            .during(operation)?
            .ok_or_else(|| SchedulingError::not_found("provider", provider_id))
    }

    pub async fn classify(&self, provider_id: ProviderId, date: NaiveDate) -> Result<DayClassification> {
        self.classify_for(Operation::GetDaySchedule, provider_id, date)
            .await
    }

    pub async fn classify_for(
        &self,
        operation: Operation,
        provider_id: ProviderId,
        date: NaiveDate,
    ) -> Result<DayClassification> {
        let canonical = self.calendar.generate_daily_slots(date);
        let appointments = self
            .store
            .find_appointments(provider_id, date)
            .await
            .during(operation)?;
        let closures = self
            .store
            .find_closures(provider_id, date)
            .await
            .during(operation)?;

        tracing::debug!(
            "Classifying provider {} on {}: {} appointments, {} closures",
            provider_id,
            date,
            appointments.len(),
            closures.len()
        );

        let mut warnings = Vec::new();
        let mut booked = index_by_time(
            provider_id,
            date,
            &canonical,
            appointments,
            RecordKind::Appointment,
            Appointment::slot,
            |a| a.id,
            &mut warnings,
        );
        let mut closed = index_by_time(
            provider_id,
            date,
            &canonical,
            closures,
            RecordKind::Closure,
            ClosureRecord::slot,
            |c| c.id,
            &mut warnings,
        );

        let mut slots = BTreeMap::new();
        for time in canonical {
            let status = match (booked.remove(&time), closed.remove(&time)) {
                (Some(appointment), Some(closure)) => {
                    let slot = CalendarSlot::new(provider_id, date, time);
                    tracing::warn!(
                        "Slot {} is both booked ({}) and closed ({}); keeping the booking",
                        slot,
                        appointment.id,
                        closure.id
                    );
                    warnings.push(IntegrityWarning::BookedAndClosed {
                        slot,
                        appointment_id: appointment.id,
                        closure_id: closure.id,
                    });
                    SlotStatus::Booked(appointment)
                }
                (Some(appointment), None) => SlotStatus::Booked(appointment),
                (None, Some(closure)) => SlotStatus::Closed(closure),
                (None, None) => SlotStatus::Open,
            };
            slots.insert(time, status);
        }

        Ok(DayClassification {
            provider_id,
            date,
            slots,
            warnings,
        })
    }
}

/// 依標準化後的時段建立索引；不在標準時段內或重複的紀錄記成警告
#[allow(clippy::too_many_arguments)]
fn index_by_time<R>(
    provider_id: ProviderId,
    date: NaiveDate,
    canonical: &[TimeOfDay],
    records: Vec<R>,
    kind: RecordKind,
    slot_of: impl Fn(&R) -> CalendarSlot,
    id_of: impl Fn(&R) -> uuid::Uuid,
    warnings: &mut Vec<IntegrityWarning>,
) -> HashMap<TimeOfDay, R> {
    let mut indexed: HashMap<TimeOfDay, R> = HashMap::new();

    for record in records {
        let slot = slot_of(&record);
        if slot.provider_id != provider_id || slot.date != date {
            continue;
        }
        if !canonical.contains(&slot.time_of_day) {
            tracing::warn!(
                "{:?} {} at {} is outside the slot grid",
                kind,
                id_of(&record),
                slot.starts_at()
            );
            warnings.push(IntegrityWarning::OffGrid {
                kind,
                id: id_of(&record),
                provider_id,
                starts_at: slot.starts_at(),
            });
            continue;
        }
        match indexed.get(&slot.time_of_day) {
            Some(kept) => {
                tracing::warn!("Duplicate {:?} records for {}", kind, slot);
                warnings.push(IntegrityWarning::Duplicate {
                    kind,
                    slot,
                    kept: id_of(kept),
                    ignored: id_of(&record),
                });
            }
            None => {
                indexed.insert(slot.time_of_day, record);
            }
        }
    }

    indexed
}

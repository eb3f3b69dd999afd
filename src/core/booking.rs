use crate::core::availability::{AvailabilityIndex, DayClassification};
use crate::core::locks::DayLocks;
use crate::domain::model::{
    Appointment, CalendarSlot, CustomerDetails, ProviderId, SlotStatus, TimeOfDay, UpdateRequest,
};
use crate::domain::ports::{InsertOutcome, RelocateOutcome, Store};
use crate::utils::error::{Operation, Result, SchedulingError, StoreContext};
use crate::utils::validation::Validate;
use chrono::{Datelike, NaiveDate, Utc, Weekday};
use std::sync::Arc;
use uuid::Uuid;

/// 驗證並提交預約、改期與取消
#[derive(Clone)]
pub struct BookingCoordinator {
    store: Arc<dyn Store>,
    index: AvailabilityIndex,
    locks: Arc<DayLocks>,
    closed_weekdays: Vec<Weekday>,
}

impl BookingCoordinator {
    pub fn new(
        store: Arc<dyn Store>,
        index: AvailabilityIndex,
        locks: Arc<DayLocks>,
        closed_weekdays: Vec<Weekday>,
    ) -> Self {
        Self {
            store,
            index,
            locks,
            closed_weekdays,
        }
    }

    /// 不可自動重試：失敗後必須重新查詢可用時段
    pub async fn reserve(
        &self,
        provider_id: ProviderId,
        date: NaiveDate,
        time_of_day: TimeOfDay,
        details: CustomerDetails,
    ) -> Result<Appointment> {
        details.validate()?;
        self.index.calendar().require(date, time_of_day)?;
        self.index
            .require_provider(Operation::Reserve, provider_id)
            .await?;
        self.ensure_weekday_open(provider_id, date)?;

        let slot = CalendarSlot::new(provider_id, date, time_of_day);
        let _guard = self.locks.lock(provider_id, date).await;

        let day = self
            .index
            .classify_for(Operation::Reserve, provider_id, date)
            .await?;
        ensure_bookable(&day, time_of_day, None)?;

        let appointment = Appointment::new(&slot, details);
        match self
            .store
            .insert_appointment_if_absent(appointment)
            .await
            .during(Operation::Reserve)?
        {
            InsertOutcome::Inserted(appointment) => {
                tracing::info!("Reserved {} for appointment {}", slot, appointment.id);
                Ok(appointment)
            }
            InsertOutcome::Conflict(existing) => {
                tracing::debug!("Slot {} taken by {} during insert", slot, existing.id);
                Err(SchedulingError::SlotUnavailable { slot })
            }
        }
    }

    /// 全有或全無：要嘛搬到新時段並釋放舊時段，要嘛什麼都不變
    pub async fn update(&self, appointment_id: Uuid, request: UpdateRequest) -> Result<Appointment> {
        let current = self.find(Operation::UpdateReservation, appointment_id).await?;
        let current_slot = current.slot();
        let target_date = request.date.unwrap_or(current_slot.date);
        let target_time = request.time_of_day.unwrap_or(current_slot.time_of_day);
        let target = CalendarSlot::new(current.provider_id, target_date, target_time);

        let moves = request.moves_slot() && target != current_slot;
        if moves {
            self.index.calendar().require(target_date, target_time)?;
            self.ensure_weekday_open(target.provider_id, target_date)?;
        }

        let _guards = self
            .locks
            .lock_pair(
                (current_slot.provider_id, current_slot.date),
                (target.provider_id, target.date),
            )
            .await;

        // 拿到鎖之後重新讀取，期間可能已被取消或改期
        let current = self.find(Operation::UpdateReservation, appointment_id).await?;
        let target = if current.slot() == current_slot {
            target
        } else if request.moves_slot() {
            tracing::debug!(
                "Appointment {} moved from {} while waiting for the lock",
                appointment_id,
                current_slot
            );
            return Err(SchedulingError::SlotUnavailable { slot: target });
        } else {
            // 只改顧客資料時跟著最新的時段走
            current.slot()
        };

        let details = CustomerDetails::new(
            request
                .customer_name
                .clone()
                .unwrap_or_else(|| current.customer_name.clone()),
            request.phone.clone().unwrap_or_else(|| current.phone.clone()),
        );
        details.validate()?;

        if moves {
            let day = self
                .index
                .classify_for(Operation::UpdateReservation, target.provider_id, target.date)
                .await?;
            ensure_bookable(&day, target.time_of_day, Some(appointment_id))?;
        }

        let mut updated = current.clone();
        updated.starts_at = target.starts_at();
        updated.customer_name = details.customer_name;
        updated.phone = details.phone;
        updated.updated_at = Utc::now();

        match self
            .store
            .relocate_appointment(updated)
            .await
            .during(Operation::UpdateReservation)?
        {
            RelocateOutcome::Moved(appointment) => {
                if moves {
                    tracing::info!(
                        "Moved appointment {} from {} to {}",
                        appointment.id,
                        current_slot,
                        target
                    );
                } else {
                    tracing::info!("Updated details of appointment {}", appointment.id);
                }
                Ok(appointment)
            }
            RelocateOutcome::Conflict(_) => Err(SchedulingError::SlotUnavailable { slot: target }),
            RelocateOutcome::Missing => Err(SchedulingError::not_found("appointment", appointment_id)),
        }
    }

    /// 時段回到 OPEN，除非另外被關閉
    pub async fn cancel(&self, appointment_id: Uuid) -> Result<()> {
        let removed = self
            .store
            .delete_appointment(appointment_id)
            .await
            .during(Operation::Cancel)?;
        if !removed {
            return Err(SchedulingError::not_found("appointment", appointment_id));
        }
        tracing::info!("Cancelled appointment {}", appointment_id);
        Ok(())
    }

    async fn find(&self, operation: Operation, appointment_id: Uuid) -> Result<Appointment> {
        self.store
            .find_appointment_by_id(appointment_id)
            .await
            .during(operation)?
            .ok_or_else(|| SchedulingError::not_found("appointment", appointment_id))
    }

    fn ensure_weekday_open(&self, provider_id: ProviderId, date: NaiveDate) -> Result<()> {
        if self.closed_weekdays.contains(&date.weekday()) {
            return Err(SchedulingError::DayFullyClosed { provider_id, date });
        }
        Ok(())
    }
}

/// `moving` 是正在改期的預約本身，它佔用的時段不算衝突
fn ensure_bookable(day: &DayClassification, time: TimeOfDay, moving: Option<Uuid>) -> Result<()> {
    match day.status(time) {
        None => Err(SchedulingError::InvalidSlotTime {
            date: day.date,
            time,
        }),
        Some(SlotStatus::Open) => Ok(()),
        Some(SlotStatus::Booked(existing)) if Some(existing.id) == moving => Ok(()),
        Some(SlotStatus::Booked(_)) => Err(SchedulingError::SlotUnavailable {
            slot: day.slot(time),
        }),
        Some(SlotStatus::Closed(_)) if day.is_fully_closed() => Err(SchedulingError::DayFullyClosed {
            provider_id: day.provider_id,
            date: day.date,
        }),
        Some(SlotStatus::Closed(closure)) => Err(SchedulingError::SlotClosed {
            slot: day.slot(time),
            reason: closure.reason.clone(),
        }),
    }
}
